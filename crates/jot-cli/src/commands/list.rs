use crate::commands::common::{
    format_note_lines, note_to_list_item, select_notes, Context, NoteListItem,
};
use crate::error::CliError;

pub async fn run_list(
    ctx: &Context,
    limit: usize,
    tag: Option<&str>,
    include_all: bool,
    as_json: bool,
) -> Result<(), CliError> {
    let notes = ctx.load_notes().await?;
    let mut selected = select_notes(&notes, ctx.config.username.as_deref(), tag, include_all);
    selected.truncate(limit);

    if as_json {
        let json_items = selected
            .iter()
            .map(|note| note_to_list_item(note))
            .collect::<Vec<NoteListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if selected.is_empty() {
        println!("No notes found.");
        return Ok(());
    }

    for line in format_note_lines(&selected) {
        println!("{line}");
    }
    Ok(())
}
