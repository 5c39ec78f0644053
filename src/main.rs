fn main() {
    if let Err(err) = ev_charger_sim::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
