use tracing_subscriber::EnvFilter;

fn main() {
    // stdout carries command output; logs go to stderr
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    quotedesk::cli::run();
}
