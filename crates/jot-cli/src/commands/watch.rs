use jot_core::sync::SyncDriver;

use crate::commands::common::Context;
use crate::error::CliError;

/// Run the background scheduler until Ctrl-C, printing every status change.
pub async fn run_watch(ctx: &Context) -> Result<(), CliError> {
    let engine = ctx.open_engine(true).await?;
    let Some(endpoint) = engine.endpoint() else {
        return Err(CliError::SyncDisabled);
    };
    println!("Watching {endpoint} (Ctrl-C to stop)");

    let mut status = engine.subscribe_status();
    let handle = SyncDriver::new(std::sync::Arc::clone(&engine)).spawn();
    let mut last_summary = String::new();

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let summary = status.borrow_and_update().summary();
                if summary != last_summary {
                    println!("{summary}");
                    last_summary = summary;
                }
            }
        }
    }

    handle.shutdown().await;
    println!("Stopped; {} notes stored locally", engine.notes().len());
    Ok(())
}
