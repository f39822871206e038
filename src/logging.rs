// 📜 Logging - tracing subscriber setup for the binary
// The TUI owns the terminal, so it only logs when RUST_LOG asks for it

use tracing_subscriber::EnvFilter;

/// Default directive when RUST_LOG is not set
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "listing_console=debug,info"
    } else {
        "info"
    }
}

/// Whether a subscriber should be installed at all
pub fn should_install(headless: bool, rust_log: Option<&str>) -> bool {
    headless || rust_log.is_some_and(|value| !value.trim().is_empty())
}

/// Install the global stderr subscriber. RUST_LOG takes precedence.
/// Calling it twice is harmless.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headless_always_logs() {
        assert!(should_install(true, None));
    }

    #[test]
    fn test_tui_logs_only_when_asked() {
        assert!(!should_install(false, None));
        assert!(!should_install(false, Some("  ")));
        assert!(should_install(false, Some("listing_console=trace")));
    }

    #[test]
    fn test_verbose_raises_crate_level() {
        assert_eq!(default_directive(false), "info");
        assert!(default_directive(true).contains("listing_console=debug"));
    }
}
