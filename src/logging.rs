// ABOUTME: Structured diagnostic logging to stderr
// ABOUTME: Level comes from --debug, overridable with RUST_LOG or GRANARY_LOG

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when no environment override is set.
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "granary=debug"
    } else {
        "granary=warn"
    }
}

pub fn init_tracing(debug: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_from_env("GRANARY_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .compact()
                .with_target(false)
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .try_init()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(true), "granary=debug");
        assert_eq!(default_directive(false), "granary=warn");
    }
}
