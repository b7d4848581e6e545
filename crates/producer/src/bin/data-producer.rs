use data_producer::cli::run_cli;
use data_producer::logging::init_logging;

fn main() {
    init_logging();

    if let Err(e) = run_cli() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
