//! Output formatting and log setup
//!
//! User-facing messages go to stdout with a status prefix; diagnostics go
//! through `tracing` to stderr.

use tracing_subscriber::EnvFilter;

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}

/// Verbosity selected on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OutputConfig {
    pub quiet: bool,
    pub verbose: u8,
}

impl OutputConfig {
    pub fn new(quiet: bool, verbose: u8) -> Self {
        Self { quiet, verbose }
    }

    /// Default log level for this verbosity
    pub fn level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }

    /// Filter honouring `RUST_LOG`, with the verbosity as the fallback level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level().into())
            .from_env_lossy()
    }

    /// Install the global tracing subscriber
    pub fn init_tracing(&self) {
        tracing_subscriber::fmt()
            .with_env_filter(self.env_filter())
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Print a success line unless quiet
pub fn success(config: OutputConfig, message: &str) {
    if !config.quiet {
        println!("{} {message}", status::SUCCESS);
    }
}

/// Print an info line unless quiet
pub fn info(config: OutputConfig, message: &str) {
    if !config.quiet {
        println!("{} {message}", status::INFO);
    }
}

/// Print an error with its cause chain to stderr
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levels() {
        assert_eq!(OutputConfig::new(false, 0).level(), tracing::Level::WARN);
        assert_eq!(OutputConfig::new(false, 1).level(), tracing::Level::INFO);
        assert_eq!(OutputConfig::new(false, 5).level(), tracing::Level::DEBUG);
        assert_eq!(OutputConfig::new(true, 2).level(), tracing::Level::ERROR);
    }
}
