use crate::commands::common::{resolve_item, resolve_note, Context};
use crate::error::CliError;

pub async fn run_check(ctx: &Context, note_query: &str, item_query: &str) -> Result<(), CliError> {
    let engine = ctx.open_engine(false).await?;
    let notes = engine.notes();
    let note = resolve_note(&notes, note_query)?;
    let item = resolve_item(note, item_query)?;

    let item_id = item.id.clone();
    let checked = engine
        .update_note(&note.id, |note| note.toggle_item(&item_id))
        .await?;

    let mark = if checked { "x" } else { " " };
    println!("[{mark}] {}", item.text);
    Ok(())
}
