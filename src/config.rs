use clap::Parser;

use crate::sheets::DEFAULT_PREVIEW_ROWS;

/// Startup options. Every flag can also come from the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "graderd", version, about = "Grading assistant sidecar (JSON lines on stdin/stdout)")]
pub struct Config {
    /// Rows shown before the "Show all" toggle on a results sheet.
    #[arg(long, env = "GRADERD_PREVIEW_ROWS", default_value_t = DEFAULT_PREVIEW_ROWS)]
    pub preview_rows: usize,

    /// tracing filter directive; falls back to RUST_LOG, then `info`.
    #[arg(long, env = "GRADERD_LOG")]
    pub log_filter: Option<String>,
}

impl Config {
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.preview_rows > 0, "--preview-rows must be at least 1");
        Ok(())
    }
}
