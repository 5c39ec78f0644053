fn main() {
    if let Err(err) = ev_charger_sim::app::run_api() {
        eprintln!("api startup failed: {err}");
        std::process::exit(1);
    }
}
