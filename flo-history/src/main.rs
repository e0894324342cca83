fn main() {
    if let Err(err) = flo_portal_collector::app::run_history() {
        eprintln!("history collection failed: {err}");
        std::process::exit(1);
    }
}
