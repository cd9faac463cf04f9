fn main() {
    if let Err(e) = oncorisk::run() {
        tracing::error!("Fatal: {e}");
        eprintln!("oncorisk: {e}");
        std::process::exit(1);
    }
}
