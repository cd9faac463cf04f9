pub mod patch;
pub mod patient;
pub mod prediction;

pub use patch::*;
pub use patient::*;
pub use prediction::*;
