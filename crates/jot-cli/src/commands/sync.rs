use jot_core::sync::SyncOutcome;

use crate::commands::common::{format_sync_timestamp, Context};
use crate::error::CliError;

pub async fn run_sync(ctx: &Context) -> Result<(), CliError> {
    let engine = ctx.open_engine(false).await?;
    let Some(endpoint) = engine.endpoint() else {
        return Err(CliError::SyncDisabled);
    };
    tracing::debug!(%endpoint, "Syncing");

    match engine.sync_notes(true, None).await? {
        SyncOutcome::Completed(report) => {
            println!(
                "Sync completed: {} notes (fetched {}, pushed {})",
                report.merged, report.fetched, report.pushed
            );
            if let Some(at) = engine.status().last_synced_at {
                println!("Last synced: {}", format_sync_timestamp(at));
            }
        }
        SyncOutcome::Disabled => return Err(CliError::SyncDisabled),
        outcome => println!("Sync skipped: {outcome}"),
    }
    Ok(())
}
