use std::process::ExitCode;

use anyhow::Context;
use veridi_auditor::config::DEFAULT_DATASET_PATH;
use veridi_auditor::{AuditConfig, SessionState, load};

fn main() -> anyhow::Result<ExitCode> {
    env_logger::init();

    let Some(dataset) = load()? else {
        log::error!(
            "Dataset not found! Run the preparation notebook first to generate `{DEFAULT_DATASET_PATH}`."
        );
        return Ok(ExitCode::FAILURE);
    };

    let state = SessionState::new(dataset, AuditConfig::default());
    let Some(report) = &state.report else {
        log::warn!(
            "{}",
            state.status_message.as_deref().unwrap_or("no data to report")
        );
        return Ok(ExitCode::FAILURE);
    };

    log::info!(
        "Report over {} of {} orders: {:.1}% late, {:.1}% super late, avg review {:.2}",
        state.visible_orders,
        dataset.len(),
        report.kpis.pct_late,
        report.kpis.pct_super_late,
        report.kpis.avg_review
    );

    let json = serde_json::to_string_pretty(report).context("serializing report")?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}
