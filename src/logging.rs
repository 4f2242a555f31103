use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install the CLI subscriber. Events go to stderr so command output on
/// stdout stays machine-readable. `RUST_LOG` overrides the default filter.
pub fn init_cli_logger(verbose: bool) {
    let default_filter = if verbose {
        "bankroll=debug,warn"
    } else {
        "bankroll=warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}
