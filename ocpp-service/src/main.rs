fn main() {
    if let Err(err) = ev_charger_sim::app::run_service() {
        eprintln!("ocpp service startup failed: {err}");
        std::process::exit(1);
    }
}
