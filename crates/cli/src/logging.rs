use anyhow::Result;
use skillverse_core::tracing::{InstrumentationConfig, init_tracing};

/// Initialize logging for the CLI
///
/// `RUST_LOG` still wins over `level`; `SKILLVERSE_LOG_FORMAT=json` switches
/// to structured output.
pub fn init_logging(level: &str) -> Result<()> {
    let config = InstrumentationConfig {
        service_name: "skillverse-cli".to_string(),
        ..InstrumentationConfig::from_env()
    }
    .with_log_level(level);

    init_tracing(&config)
}
