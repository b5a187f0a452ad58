use jot_core::models::{Note, Owner};

use crate::commands::common::{normalize_content, short_id, Context};
use crate::error::CliError;

pub async fn run_add(
    ctx: &Context,
    title: &str,
    body_parts: &[String],
    items: &[String],
    tags: &[String],
    shared: bool,
) -> Result<(), CliError> {
    let title = normalize_content(title).ok_or(CliError::EmptyTitle)?;
    let body = normalize_content(&body_parts.join(" ")).unwrap_or_default();

    let items: Vec<&str> = items
        .iter()
        .map(|item| item.trim())
        .filter(|item| !item.is_empty())
        .collect();
    let note = if items.is_empty() {
        Note::text(title, body)
    } else {
        Note::checklist(title, items)
    };

    let owner = if shared {
        Some(Owner::Shared)
    } else {
        ctx.config.username.clone().map(Owner::from_username)
    };
    let mut note = note.with_tags(tags.iter().map(String::as_str));
    note.owner = owner;

    let engine = ctx.open_engine(false).await?;
    let note = engine.upsert_note(note).await?;
    tracing::debug!(id = %note.id, "Created note");

    println!("{}", short_id(&note));
    Ok(())
}
