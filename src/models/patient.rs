use serde::Serialize;

use super::prediction::Probabilities;

/// Storage type of a patient attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Flag,
}

/// Value of a single patient attribute. `None` inside a variant is SQL NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(Option<String>),
    Integer(Option<i64>),
    Flag(Option<bool>),
}

/// Generates `PatientField` with column name, kind and scorer name lookups.
///
/// The column name doubles as the JSON key. A scorer name of `None` keeps
/// the field out of the remote scoring payload.
macro_rules! patient_fields {
    ($($variant:ident => ($column:literal, $kind:ident, $scorer:expr)),+ $(,)?) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum PatientField {
            $($variant),+
        }

        impl PatientField {
            /// Every patient attribute, in table column order.
            pub const ALL: &'static [PatientField] = &[$(Self::$variant),+];

            pub fn column(&self) -> &'static str {
                match self {
                    $(Self::$variant => $column),+
                }
            }

            pub fn kind(&self) -> FieldKind {
                match self {
                    $(Self::$variant => FieldKind::$kind),+
                }
            }

            pub fn scorer_name(&self) -> Option<&'static str> {
                match self {
                    $(Self::$variant => $scorer),+
                }
            }
        }

        impl std::str::FromStr for PatientField {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($column => Ok(Self::$variant)),+,
                    _ => Err(s.to_string()),
                }
            }
        }
    };
}

patient_fields!(
    Name => ("name", Text, None),
    Sex => ("sex", Text, Some("Sex")),
    Age => ("age", Integer, Some("Age")),
    YearOfDiagnosis => ("year_of_diagnosis", Integer, Some("Year of diagnosis")),
    RaceRecode => ("race_recode_W_B_AI_API", Text, Some("Race recode (W, B, AI, API)")),
    Treatment => ("treatment", Text, Some("Treatment")),
    YearOfFollowUp => ("year_of_follow_up_recode", Integer, Some("Year of follow-up recode")),
    Breast => ("breast", Flag, Some("Breast")),
    Endocrine => ("endocrine", Flag, Some("Endocrine")),
    EyeAndAdnexa => ("eye_and_adnexa", Flag, Some("Eye and Adnexa")),
    Gastrointestinal => ("gastrointestinal", Flag, Some("Gastrointestinal")),
    Gynecological => ("gynecological", Flag, Some("Gynecological")),
    HeadAndNeck => ("head_and_neck", Flag, Some("Head and Neck")),
    Hematopoietic => ("hematopoietic", Flag, Some("Hematopoietic")),
    MaleGenital => ("male_genital", Flag, Some("Male Genital")),
    Musculoskeletal => ("musculoskeletal", Flag, Some("Musculoskeletal")),
    NervousSystem => ("nervous_system", Flag, Some("Nervous System")),
    Respiratory => ("respiratory", Flag, Some("Respiratory")),
    Skin => ("skin", Flag, Some("Skin")),
    Unspecified => ("unspecified", Flag, Some("Unspecified")),
    Urinary => ("urinary", Flag, Some("Urinary")),
    CodStroke => ("cod_strokeYN", Flag, None),
);

impl std::fmt::Display for PatientField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column())
    }
}

/// Cancer-site flags, one per anatomical category.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SiteFlags {
    pub breast: Option<bool>,
    pub endocrine: Option<bool>,
    pub eye_and_adnexa: Option<bool>,
    pub gastrointestinal: Option<bool>,
    pub gynecological: Option<bool>,
    pub head_and_neck: Option<bool>,
    pub hematopoietic: Option<bool>,
    pub male_genital: Option<bool>,
    pub musculoskeletal: Option<bool>,
    pub nervous_system: Option<bool>,
    pub respiratory: Option<bool>,
    pub skin: Option<bool>,
    pub unspecified: Option<bool>,
    pub urinary: Option<bool>,
}

/// Everything stored about a patient apart from the surrogate id.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientAttributes {
    pub name: String,
    pub sex: Option<String>,
    pub age: Option<i64>,
    pub year_of_diagnosis: Option<i64>,
    #[serde(rename = "race_recode_W_B_AI_API")]
    pub race_recode: Option<String>,
    pub treatment: Option<String>,
    pub year_of_follow_up_recode: Option<i64>,
    #[serde(flatten)]
    pub sites: SiteFlags,
    #[serde(rename = "cod_strokeYN")]
    pub cod_stroke: Option<bool>,
}

impl PatientAttributes {
    fn flag_slot(&mut self, field: PatientField) -> Option<&mut Option<bool>> {
        let s = &mut self.sites;
        Some(match field {
            PatientField::Breast => &mut s.breast,
            PatientField::Endocrine => &mut s.endocrine,
            PatientField::EyeAndAdnexa => &mut s.eye_and_adnexa,
            PatientField::Gastrointestinal => &mut s.gastrointestinal,
            PatientField::Gynecological => &mut s.gynecological,
            PatientField::HeadAndNeck => &mut s.head_and_neck,
            PatientField::Hematopoietic => &mut s.hematopoietic,
            PatientField::MaleGenital => &mut s.male_genital,
            PatientField::Musculoskeletal => &mut s.musculoskeletal,
            PatientField::NervousSystem => &mut s.nervous_system,
            PatientField::Respiratory => &mut s.respiratory,
            PatientField::Skin => &mut s.skin,
            PatientField::Unspecified => &mut s.unspecified,
            PatientField::Urinary => &mut s.urinary,
            PatientField::CodStroke => &mut self.cod_stroke,
            _ => return None,
        })
    }

    fn flag(&self, field: PatientField) -> Option<bool> {
        let s = &self.sites;
        match field {
            PatientField::Breast => s.breast,
            PatientField::Endocrine => s.endocrine,
            PatientField::EyeAndAdnexa => s.eye_and_adnexa,
            PatientField::Gastrointestinal => s.gastrointestinal,
            PatientField::Gynecological => s.gynecological,
            PatientField::HeadAndNeck => s.head_and_neck,
            PatientField::Hematopoietic => s.hematopoietic,
            PatientField::MaleGenital => s.male_genital,
            PatientField::Musculoskeletal => s.musculoskeletal,
            PatientField::NervousSystem => s.nervous_system,
            PatientField::Respiratory => s.respiratory,
            PatientField::Skin => s.skin,
            PatientField::Unspecified => s.unspecified,
            PatientField::Urinary => s.urinary,
            PatientField::CodStroke => self.cod_stroke,
            _ => None,
        }
    }

    /// Read one attribute as a typed value.
    pub fn get(&self, field: PatientField) -> FieldValue {
        match field {
            PatientField::Name => FieldValue::Text(Some(self.name.clone())),
            PatientField::Sex => FieldValue::Text(self.sex.clone()),
            PatientField::Age => FieldValue::Integer(self.age),
            PatientField::YearOfDiagnosis => FieldValue::Integer(self.year_of_diagnosis),
            PatientField::RaceRecode => FieldValue::Text(self.race_recode.clone()),
            PatientField::Treatment => FieldValue::Text(self.treatment.clone()),
            PatientField::YearOfFollowUp => FieldValue::Integer(self.year_of_follow_up_recode),
            flag => FieldValue::Flag(self.flag(flag)),
        }
    }

    /// Write one attribute. Returns `false` when the value kind does not
    /// match the field, or when clearing `name`; nothing is written then.
    pub fn set(&mut self, field: PatientField, value: FieldValue) -> bool {
        match (field, value) {
            (PatientField::Name, FieldValue::Text(Some(name))) => self.name = name,
            (PatientField::Name, _) => return false,
            (PatientField::Sex, FieldValue::Text(v)) => self.sex = v,
            (PatientField::Age, FieldValue::Integer(v)) => self.age = v,
            (PatientField::YearOfDiagnosis, FieldValue::Integer(v)) => self.year_of_diagnosis = v,
            (PatientField::RaceRecode, FieldValue::Text(v)) => self.race_recode = v,
            (PatientField::Treatment, FieldValue::Text(v)) => self.treatment = v,
            (PatientField::YearOfFollowUp, FieldValue::Integer(v)) => {
                self.year_of_follow_up_recode = v
            }
            (flag, FieldValue::Flag(v)) => match self.flag_slot(flag) {
                Some(slot) => *slot = v,
                None => return false,
            },
            _ => return false,
        }
        true
    }
}

/// A stored patient.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Patient {
    pub id: i64,
    #[serde(flatten)]
    pub attributes: PatientAttributes,
}

/// Patient list entry enriched with the latest remote prediction, if any.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatientOverview {
    #[serde(flatten)]
    pub patient: Patient,
    pub prediction: Option<Probabilities>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_unique_and_parse_back() {
        for field in PatientField::ALL {
            let parsed: PatientField = field.column().parse().unwrap();
            assert_eq!(&parsed, field);
        }
        let mut columns: Vec<_> = PatientField::ALL.iter().map(|f| f.column()).collect();
        columns.sort_unstable();
        columns.dedup();
        assert_eq!(columns.len(), PatientField::ALL.len());
    }

    #[test]
    fn every_field_round_trips_through_get_and_set() {
        let mut attrs = PatientAttributes {
            name: "Alice".into(),
            ..Default::default()
        };
        for field in PatientField::ALL {
            let value = match field.kind() {
                FieldKind::Text => FieldValue::Text(Some(format!("v-{field}"))),
                FieldKind::Integer => FieldValue::Integer(Some(7)),
                FieldKind::Flag => FieldValue::Flag(Some(true)),
            };
            assert!(attrs.set(*field, value.clone()), "set failed for {field}");
            assert_eq!(attrs.get(*field), value);
        }
    }

    #[test]
    fn set_rejects_mismatched_kind() {
        let mut attrs = PatientAttributes::default();
        assert!(!attrs.set(PatientField::Age, FieldValue::Text(Some("55".into()))));
        assert!(!attrs.set(PatientField::Breast, FieldValue::Integer(Some(1))));
        assert_eq!(attrs.age, None);
    }

    #[test]
    fn name_cannot_be_cleared() {
        let mut attrs = PatientAttributes {
            name: "Bob".into(),
            ..Default::default()
        };
        assert!(!attrs.set(PatientField::Name, FieldValue::Text(None)));
        assert_eq!(attrs.name, "Bob");
    }

    #[test]
    fn serializes_with_column_names() {
        let patient = Patient {
            id: 3,
            attributes: PatientAttributes {
                name: "Carol".into(),
                race_recode: Some("White".into()),
                cod_stroke: Some(false),
                sites: SiteFlags {
                    skin: Some(true),
                    ..Default::default()
                },
                ..Default::default()
            },
        };
        let json = serde_json::to_value(&patient).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["name"], "Carol");
        assert_eq!(json["race_recode_W_B_AI_API"], "White");
        assert_eq!(json["cod_strokeYN"], false);
        assert_eq!(json["skin"], true);
        assert!(json["breast"].is_null());
        assert!(json.get("sites").is_none());
    }

    #[test]
    fn scorer_names_exclude_name_and_stroke() {
        let named: Vec<_> = PatientField::ALL
            .iter()
            .filter_map(|f| f.scorer_name())
            .collect();
        assert_eq!(named.len(), 20);
        assert!(PatientField::Name.scorer_name().is_none());
        assert!(PatientField::CodStroke.scorer_name().is_none());
    }
}
