use clap::Parser;
use lunacal::cli::Cli;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = lunacal::cli::run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}
