fn main() {
    if let Err(err) = flo_portal_collector::app::run() {
        eprintln!("collection failed: {err}");
        std::process::exit(1);
    }
}
