fn main() {
    if let Err(err) = flo_portal_collector::app::run_snapshot() {
        eprintln!("snapshot collection failed: {err}");
        std::process::exit(1);
    }
}
