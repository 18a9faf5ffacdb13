mod bootstrap;

use anyhow::{Context, Result};
use cohort_core::formatting::format_elapsed;
use cohort_core::settings::Settings;
use cohort_data::analysis::analyze_customers;
use cohort_data::report::{format_json, format_text};

fn main() -> Result<()> {
    let settings = Settings::load()?;

    bootstrap::setup_logging(&settings.log_level, settings.log_file.as_ref())?;

    tracing::info!("cohort-segments v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        "Customers: {}, Timezone: {}, Format: {}",
        settings.customers.display(),
        settings.timezone,
        settings.format
    );

    let timezone = settings.target_timezone()?;
    let result = analyze_customers(&settings.customers, timezone)
        .with_context(|| format!("failed to analyze {}", settings.customers.display()))?;

    tracing::info!(
        "Built {} cohorts in {}",
        result.metadata.cohorts,
        format_elapsed(result.metadata.build_time_seconds)
    );

    let rendered = if settings.is_json() {
        let mut json = format_json(&result)?;
        json.push('\n');
        json
    } else {
        format_text(&result)
    };

    bootstrap::write_report(&rendered, settings.output.as_deref())?;

    if let Some(path) = &settings.output {
        tracing::info!("Report written to {}", path.display());
    }

    Ok(())
}
