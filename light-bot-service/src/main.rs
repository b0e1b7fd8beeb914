fn main() {
    if let Err(err) = light_bot::app::run() {
        eprintln!("application startup failed: {err}");
        std::process::exit(1);
    }
}
