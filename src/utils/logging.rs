//! Logging helpers
//!
//! Subscriber initialization plus the banner-style startup log.

use std::fs;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

/// Initializes the tracing subscriber; `RUST_LOG` overrides the default
/// `info` level.
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// Writes the run header to the plain-text log file
pub fn init_log_file(log_file_path: &str) -> Result<()> {
    let log_header = format!(
        "{}\nbusca de processos - {}\n{}\n\n",
        "=".repeat(60),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    fs::write(log_file_path, log_header)?;
    Ok(())
}

/// Startup banner
pub fn log_startup(config: &Config) {
    info!("{}", "=".repeat(60));
    info!("🚀 busca de processos iniciada");
    info!("📊 concorrência máxima: {}", config.max_concurrent);
    info!("🔁 tentativas por processo: {}", config.max_retries);
    info!("{}", "=".repeat(60));
}

/// Truncates long text for log display
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
