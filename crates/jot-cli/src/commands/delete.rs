use crate::commands::common::{resolve_note, Context};
use crate::error::CliError;

pub async fn run_delete(ctx: &Context, id: &str) -> Result<(), CliError> {
    let engine = ctx.open_engine(false).await?;
    let notes = engine.notes();
    let note = resolve_note(&notes, id)?;

    let tombstone = engine.delete_note(&note.id).await?;
    println!("{}", tombstone.id);
    Ok(())
}
