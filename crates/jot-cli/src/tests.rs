use jot_core::config::{ClientConfig, CONFIG_FILE_NAME};
use jot_core::models::{Collection, Note, NoteId, NoteKind, Owner};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

use crate::commands::add::run_add;
use crate::commands::check::run_check;
use crate::commands::common::{
    format_note_lines, format_relative_time, normalize_content, normalize_note_identifier,
    note_preview, resolve_item, resolve_note, select_notes, Context,
};
use crate::commands::config::{run_config_set_server, run_config_set_username};
use crate::commands::delete::run_delete;
use crate::commands::sync::run_sync;
use crate::error::CliError;

fn note(id: &str, updated_at: i64, title: &str) -> Note {
    let mut note = Note::text(title, "");
    note.id = NoteId::from(id);
    note.updated_at = updated_at;
    note
}

fn test_context(dir: &TempDir, config: ClientConfig) -> Context {
    Context::new(
        config,
        dir.path().join(CONFIG_FILE_NAME),
        dir.path().join("data"),
    )
}

fn offline_config() -> ClientConfig {
    let mut config = ClientConfig::default();
    config.sync.enabled = Some(false);
    config
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_note_identifier_rejects_blank() {
    assert!(matches!(
        normalize_note_identifier("   "),
        Err(CliError::EmptyNoteId)
    ));
    assert_eq!(normalize_note_identifier(" abc ").unwrap(), "abc");
}

#[test]
fn relative_time_buckets() {
    let now = 1_000_000_000_000;
    assert_eq!(format_relative_time(now - 5_000, now), "just now");
    assert_eq!(format_relative_time(now - 5 * 60_000, now), "5m ago");
    assert_eq!(format_relative_time(now - 3 * 3_600_000, now), "3h ago");
    assert_eq!(format_relative_time(now - 2 * 86_400_000, now), "2d ago");
    assert_eq!(format_relative_time(now - 14 * 86_400_000, now), "2w ago");
    assert_eq!(format_relative_time(now + 10_000, now), "just now");
}

#[test]
fn note_preview_collapses_whitespace_and_truncates() {
    let short = note("a", 1, "  Buy\n  milk  ");
    assert_eq!(note_preview(&short, 40), "Buy milk");

    let long = note("b", 1, &"x".repeat(60));
    let preview = note_preview(&long, 40);
    assert_eq!(preview.chars().count(), 40);
    assert!(preview.ends_with("..."));
}

#[test]
fn resolve_note_by_exact_id_and_prefix() {
    let notes = Collection::from_notes([
        note("abc-111", 1, "first"),
        note("abc-222", 2, "second"),
        note("abcd", 3, "exact"),
    ]);

    assert_eq!(resolve_note(&notes, "abc-2").unwrap().title, "second");
    assert_eq!(resolve_note(&notes, "abcd").unwrap().title, "exact");
    assert!(matches!(
        resolve_note(&notes, "abc"),
        Err(CliError::AmbiguousNoteId(_))
    ));
    assert!(matches!(
        resolve_note(&notes, "zzz"),
        Err(CliError::NoteNotFound(_))
    ));
}

#[test]
fn resolve_note_skips_tombstones() {
    let mut gone = note("dead-1", 5, "gone");
    gone.deleted = true;
    let notes = Collection::from_notes([gone, note("dead-2", 1, "alive")]);

    assert_eq!(resolve_note(&notes, "dead").unwrap().title, "alive");
    assert!(matches!(
        resolve_note(&notes, "dead-1"),
        Err(CliError::NoteNotFound(_))
    ));
}

#[test]
fn select_notes_filters_by_owner_tag_and_tombstone() {
    let mut deleted = note("4", 40, "deleted");
    deleted.deleted = true;
    let notes = Collection::from_notes([
        note("1", 10, "mine")
            .with_owner(Owner::from_username("ana"))
            .with_tags(["Work"]),
        note("2", 20, "shared").with_owner(Owner::Shared),
        note("3", 30, "theirs").with_owner(Owner::from_username("bo")),
        deleted,
    ]);

    let titles = |selected: Vec<&Note>| {
        selected
            .into_iter()
            .map(|note| note.title.clone())
            .collect::<Vec<_>>()
    };

    assert_eq!(
        titles(select_notes(&notes, Some("ana"), None, false)),
        vec!["shared", "mine"]
    );
    assert_eq!(
        titles(select_notes(&notes, Some("ana"), Some("work"), false)),
        vec!["mine"]
    );
    assert_eq!(
        titles(select_notes(&notes, None, None, false)),
        vec!["theirs", "shared", "mine"]
    );
    assert_eq!(select_notes(&notes, Some("ana"), None, true).len(), 4);
}

#[test]
fn resolve_item_by_position_or_id_prefix() {
    let list = Note::checklist("groceries", ["eggs", "milk"]);
    let milk_id = list.items[1].id.clone();

    assert_eq!(resolve_item(&list, "1").unwrap().text, "eggs");
    assert_eq!(resolve_item(&list, &milk_id[..milk_id.len() - 2]).unwrap().text, "milk");
    assert!(matches!(
        resolve_item(&list, "0"),
        Err(CliError::ItemNotFound(_))
    ));
    assert!(matches!(
        resolve_item(&list, "3"),
        Err(CliError::ItemNotFound(_))
    ));
}

#[test]
fn format_note_lines_shows_progress_tags_and_tombstones() {
    let mut list = Note::checklist("groceries", ["eggs", "milk"]).with_tags(["home"]);
    list.items[0].checked = true;
    let mut gone = note("gone", 1, "old idea");
    gone.deleted = true;

    let lines = format_note_lines(&[&list, &gone]);
    assert!(lines[0].contains("groceries"), "{}", lines[0]);
    assert!(lines[0].contains("[1/2]"), "{}", lines[0]);
    assert!(lines[0].ends_with("#home"), "{}", lines[0]);
    assert!(lines[1].contains("(deleted) old idea"), "{}", lines[1]);
}

#[tokio::test(flavor = "multi_thread")]
async fn add_then_delete_round_trips_through_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = offline_config();
    config.username = Some("ana".to_string());
    let ctx = test_context(&dir, config);

    run_add(
        &ctx,
        "  Pay rent  ",
        &["before".to_string(), "friday".to_string()],
        &[],
        &["home".to_string(), " ".to_string()],
        false,
    )
    .await
    .unwrap();

    let notes = ctx.load_notes().await.unwrap();
    assert_eq!(notes.len(), 1);
    let created = notes.iter().next().unwrap().clone();
    assert_eq!(created.title, "Pay rent");
    assert_eq!(created.kind, NoteKind::Text);
    assert_eq!(
        created.content.as_ref().map(|content| content.text.as_str()),
        Some("before friday")
    );
    assert_eq!(created.tags, vec!["home"]);
    assert_eq!(created.owner, Some(Owner::from_username("ana")));

    run_delete(&ctx, &created.id.as_str()[..8]).await.unwrap();

    let notes = ctx.load_notes().await.unwrap();
    let tombstone = notes.get(&created.id).unwrap();
    assert!(tombstone.deleted);
    assert!(tombstone.updated_at > created.updated_at);

    let error = run_delete(&ctx, created.id.as_str()).await.unwrap_err();
    assert!(matches!(error, CliError::NoteNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn add_rejects_blank_title() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir, offline_config());

    let error = run_add(&ctx, "  ", &[], &[], &[], false)
        .await
        .unwrap_err();
    assert!(matches!(error, CliError::EmptyTitle));
    assert!(ctx.load_notes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn check_toggles_checklist_items() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir, offline_config());

    run_add(
        &ctx,
        "groceries",
        &[],
        &["eggs".to_string(), "milk".to_string()],
        &[],
        true,
    )
    .await
    .unwrap();
    let list = ctx.load_notes().await.unwrap().into_notes().remove(0);
    assert_eq!(list.kind, NoteKind::Checklist);
    assert_eq!(list.owner, Some(Owner::Shared));

    run_check(&ctx, list.id.as_str(), "2").await.unwrap();
    let checked = ctx.load_notes().await.unwrap().into_notes().remove(0);
    assert!(!checked.items[0].checked);
    assert!(checked.items[1].checked);
    assert!(checked.updated_at > list.updated_at);

    run_check(&ctx, list.id.as_str(), "2").await.unwrap();
    let unchecked = ctx.load_notes().await.unwrap().into_notes().remove(0);
    assert!(!unchecked.items[1].checked);

    let error = run_check(&ctx, list.id.as_str(), "7").await.unwrap_err();
    assert!(matches!(error, CliError::ItemNotFound(_)));
}

#[tokio::test(flavor = "multi_thread")]
async fn sync_requires_an_enabled_server() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir, offline_config());

    let error = run_sync(&ctx).await.unwrap_err();
    assert!(matches!(error, CliError::SyncDisabled));
}

#[test]
fn set_server_validates_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir, ClientConfig::default());

    let error = run_config_set_server(&ctx, "notes.example.com").unwrap_err();
    assert!(matches!(error, CliError::Core(jot_core::Error::Config(_))));

    let mut disabled = offline_config();
    disabled.username = Some("ana".to_string());
    disabled.save_to_path(&ctx.config_path).unwrap();

    run_config_set_server(&ctx, "https://notes.example.com/").unwrap();
    let saved = ClientConfig::load_from_path(&ctx.config_path).unwrap();
    assert_eq!(saved.server_url.as_deref(), Some("https://notes.example.com"));
    assert_eq!(saved.username.as_deref(), Some("ana"));
    assert_eq!(saved.sync.enabled, None);
    assert_eq!(
        saved.endpoint().unwrap().unwrap().as_str(),
        "https://notes.example.com/notes"
    );
}

#[test]
fn set_username_rejects_reserved_and_blank_names() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = test_context(&dir, ClientConfig::default());

    assert!(matches!(
        run_config_set_username(&ctx, " "),
        Err(CliError::Config(_))
    ));
    assert!(matches!(
        run_config_set_username(&ctx, "All"),
        Err(CliError::Config(_))
    ));

    run_config_set_username(&ctx, " ana ").unwrap();
    let saved = ClientConfig::load_from_path(&ctx.config_path).unwrap();
    assert_eq!(saved.username.as_deref(), Some("ana"));
}
