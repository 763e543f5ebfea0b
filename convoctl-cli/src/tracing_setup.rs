//! Tracing setup for the convoctl CLI
//!
//! Usage:
//!   convoctl --debug ...              # Debug logging to stderr
//!   RUST_LOG=convoctl_core=trace ...  # Fine-grained log control
//!
//! Logs always go to stderr so rendered output on stdout stays clean.

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

/// Tracing configuration options
#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Enable debug logging (sets the filter to debug if RUST_LOG is unset)
    pub debug: bool,
    /// Only show warnings and errors unless RUST_LOG says otherwise
    pub quiet: bool,
}

impl TracingConfig {
    fn default_directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else if self.quiet {
            "warn"
        } else {
            "info"
        }
    }
}

/// Install the global fmt subscriber.
pub fn init(config: &TracingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(TracingConfig::default().default_directive(), "info");
        let debug = TracingConfig { debug: true, quiet: true };
        assert_eq!(debug.default_directive(), "debug");
        let quiet = TracingConfig { debug: false, quiet: true };
        assert_eq!(quiet.default_directive(), "warn");
    }
}
