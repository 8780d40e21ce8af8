use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Installs the global subscriber, `RUST_LOG` directives still apply on top
pub fn setup_tracing(verbosity: u8, json: bool) {
    let filter = EnvFilter::from_default_env().add_directive(level_for(verbosity).into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}
