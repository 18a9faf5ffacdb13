use clap::Parser;
use std::path::PathBuf;

use crate::error::{CohortError, Result};
use crate::time_utils::{get_system_timezone, parse_timezone, TargetTimezone};

// ── Settings (CLI) ─────────────────────────────────────────────────────────────

/// Group customers into weekly signup cohorts and report their id segments
#[derive(Parser, Debug, Clone)]
#[command(
    name = "cohort-segments",
    about = "Group customers into weekly signup cohorts and report their id segments",
    version
)]
pub struct Settings {
    /// Customers CSV file (header row, then `id,created` rows)
    #[arg(value_name = "CUSTOMERS_CSV")]
    pub customers: PathBuf,

    /// Target timezone for signup dates: UTC offset (-0500), IANA name, or auto
    #[arg(long, default_value = "auto", env = "COHORT_TIMEZONE", allow_hyphen_values = true)]
    pub timezone: String,

    /// Output format
    #[arg(long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,

    /// Write the report to this file instead of stdout
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Logging level
    #[arg(long, default_value = "INFO", value_parser = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"])]
    pub log_level: String,

    /// Log file path
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,
}

// ── Settings impl ──────────────────────────────────────────────────────────────

impl Settings {
    /// Parse the process arguments and resolve `"auto"` values.
    ///
    /// Argument errors, `--help` and `--version` are handled by clap and exit
    /// the process.
    pub fn load() -> Result<Self> {
        Settings::parse().resolve()
    }

    /// Same as [`load`](Self::load) but accepts an explicit argument list and
    /// reports argument errors instead of exiting.
    pub fn load_from_args(args: Vec<std::ffi::OsString>) -> Result<Self> {
        let settings = Settings::try_parse_from(args)
            .map_err(|e| CohortError::Config(e.to_string()))?;
        settings.resolve()
    }

    /// Resolve the `"auto"` timezone, apply `--debug`, and validate the
    /// timezone string.
    pub fn resolve(mut self) -> Result<Self> {
        if self.timezone == "auto" {
            self.timezone = get_system_timezone();
        }

        if self.debug {
            self.log_level = "DEBUG".to_string();
        }

        parse_timezone(&self.timezone).map_err(|e| CohortError::Config(e.to_string()))?;
        Ok(self)
    }

    /// The parsed target timezone.
    pub fn target_timezone(&self) -> Result<TargetTimezone> {
        parse_timezone(&self.timezone)
    }

    pub fn is_json(&self) -> bool {
        self.format == "json"
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
