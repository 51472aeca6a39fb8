use std::fmt::Write as _;
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Subcommand};
use time::{format_description::well_known::Rfc3339, OffsetDateTime};

use crate::categories::{CategoryRegistry, CategoryUpdate};
use crate::config::{AppConfig, ConfigPaths};
use crate::export::{self, ExportFormat};
use crate::model::{
    parse_tags, strip_formatting, ContentStats, Note, NoteDraft, NoteId, NotePatch, Section,
};
use crate::render::Renderer;
use crate::storage::{NoteStore, StorageHandle};
use crate::view::{category_counts, project, CategoryFilter, SectionCounts, SortBy, ViewState};

const SHORT_ID_LEN: usize = 8;
const SNIPPET_CHARS: usize = 120;

#[derive(Args, Debug, Clone, Default)]
pub struct ListArgs {
    /// Section to show: home, archive or trash
    #[arg(long)]
    pub section: Option<Section>,
    /// Exact category name, or "all"
    #[arg(long)]
    pub category: Option<String>,
    /// Case-insensitive text matched against title, content and tags
    #[arg(long, short)]
    pub search: Option<String>,
    /// Sort key: date, title or category
    #[arg(long)]
    pub sort: Option<SortBy>,
    /// Print the visible notes as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct NoteRef {
    /// Note id or a unique prefix of it
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Note id or a unique prefix of it
    pub id: String,
    /// Password for a locked note
    #[arg(long)]
    pub password: Option<String>,
    /// Print rendered HTML instead of the raw markdown
    #[arg(long)]
    pub html: bool,
}

#[derive(Args, Debug, Clone)]
pub struct RenderArgs {
    /// Markdown file to render. Reads stdin when omitted.
    pub file: Option<PathBuf>,
    /// Print plain text with formatting markers removed
    #[arg(long)]
    pub strip: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct NewArgs {
    /// Title for the note (prompted if omitted)
    #[arg()]
    pub title: Option<String>,
    /// Provide the note body inline. If omitted, reads from stdin.
    #[arg(long)]
    pub body: Option<String>,
    /// Category name
    #[arg(long)]
    pub category: Option<String>,
    /// Comma separated tags
    #[arg(long)]
    pub tags: Option<String>,
    /// Image URL to attach (repeatable)
    #[arg(long = "image", value_name = "URL")]
    pub images: Vec<String>,
    /// Pin the new note
    #[arg(long)]
    pub pin: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct EditArgs {
    /// Note id or a unique prefix of it
    pub id: String,
    #[arg(long)]
    pub title: Option<String>,
    #[arg(long)]
    pub body: Option<String>,
    #[arg(long)]
    pub category: Option<String>,
    /// Comma separated tags, replacing the current set
    #[arg(long)]
    pub tags: Option<String>,
    /// Image URL (repeatable), replacing the current images
    #[arg(long = "image", value_name = "URL")]
    pub images: Vec<String>,
    /// Remove every image from the note
    #[arg(long, conflicts_with = "images")]
    pub clear_images: bool,
    /// Password for a locked note
    #[arg(long)]
    pub password: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RestoreArgs {
    /// Note id or a unique prefix of it
    #[arg(required_unless_present = "all")]
    pub id: Option<String>,
    /// Restore every note in the trash
    #[arg(long, conflicts_with = "id")]
    pub all: bool,
}

#[derive(Args, Debug, Clone)]
pub struct DeleteArgs {
    /// Note id or a unique prefix of it
    pub id: String,
    /// Delete even when the note is not in the trash
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug, Clone)]
pub struct LockArgs {
    /// Note id or a unique prefix of it
    pub id: String,
    pub password: String,
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// markdown, html or json (defaults to the configured format)
    #[arg(long)]
    pub format: Option<ExportFormat>,
    /// Target directory (defaults to the configured export directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,
    /// Only export notes from this section
    #[arg(long)]
    pub section: Option<Section>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum CategoryCommand {
    /// List categories with home-section note counts
    List,
    /// Add a custom category
    Add(CategoryAddArgs),
    /// Change a custom category's name, color or icon
    Update(CategoryUpdateArgs),
    /// Remove a custom category
    Remove(CategoryIdArgs),
    /// Move a custom category one place earlier
    Up(CategoryIdArgs),
    /// Move a custom category one place later
    Down(CategoryIdArgs),
}

#[derive(Args, Debug, Clone)]
pub struct CategoryAddArgs {
    pub name: String,
    #[arg(long, default_value = "#6b7280")]
    pub color: String,
    #[arg(long, default_value = "Folder")]
    pub icon: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryUpdateArgs {
    pub id: String,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub color: Option<String>,
    #[arg(long)]
    pub icon: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryIdArgs {
    pub id: String,
}

#[derive(Args, Debug, Clone)]
pub struct CategoryArgs {
    #[command(subcommand)]
    pub command: Option<CategoryCommand>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Toggle {
    Pin,
    Archive,
    Trash,
}

pub fn list_notes(config: Arc<AppConfig>, storage: StorageHandle, args: ListArgs) -> Result<()> {
    print!("{}", run_list(&config, &storage, &args)?);
    Ok(())
}

fn run_list(config: &AppConfig, storage: &StorageHandle, args: &ListArgs) -> Result<String> {
    let notes = storage.snapshot().context("loading notes")?;
    let view = ViewState::new(
        args.section.unwrap_or(config.view.section),
        args.sort.unwrap_or(config.view.sort_by),
    )
    .with_search(args.search.clone().unwrap_or_default())
    .with_category(
        args.category
            .as_deref()
            .map(CategoryFilter::parse)
            .unwrap_or_default(),
    );
    let visible = project(&notes, &view);
    if args.json {
        let mut out = serde_json::to_string_pretty(&visible).context("serializing notes")?;
        out.push('\n');
        return Ok(out);
    }

    let counts = SectionCounts::of(&notes);
    let header = [Section::Home, Section::Archive, Section::Trash]
        .iter()
        .map(|&section| {
            let marker = if section == view.section { "*" } else { "" };
            format!("{marker}{section} ({})", counts.get(section))
        })
        .collect::<Vec<_>>()
        .join("  ");
    let mut out = format!("{header}\n\n");
    if visible.is_empty() {
        out.push_str("No notes.\n");
        return Ok(out);
    }
    for note in visible {
        let _ = writeln!(&mut out, "{}", headline(note));
        let _ = write!(&mut out, "    updated {}", format_timestamp(note.updated_at));
        if !note.category.is_empty() {
            let _ = write!(&mut out, "  category {}", note.category);
        }
        out.push('\n');
        if !note.tags.is_empty() {
            let _ = writeln!(&mut out, "    tags    {}", format_tags(&note.tags));
        }
        if let Some(snippet) = build_snippet(note) {
            let _ = writeln!(&mut out, "    {snippet}");
        }
        out.push('\n');
    }
    Ok(out)
}

pub fn show_note(config: Arc<AppConfig>, storage: StorageHandle, args: ShowArgs) -> Result<()> {
    print!("{}", run_show(&config, &storage, &args)?);
    Ok(())
}

fn run_show(config: &AppConfig, storage: &StorageHandle, args: &ShowArgs) -> Result<String> {
    let note = resolve_note(storage, &args.id)?;
    let content = if note.is_password_protected {
        let password = args
            .password
            .as_deref()
            .ok_or_else(|| anyhow!("note {} is locked; pass --password", short_id(&note.id)))?;
        storage.unlock(&note.id, password)?
    } else {
        note.content.clone()
    };
    let stats = ContentStats::of(&content);

    let mut out = String::new();
    let _ = writeln!(&mut out, "{}", note.title);
    let _ = writeln!(&mut out, "  id       {}", note.id);
    let _ = writeln!(&mut out, "  section  {}", note.section());
    if !note.category.is_empty() {
        let _ = writeln!(&mut out, "  category {}", note.category);
    }
    if !note.tags.is_empty() {
        let _ = writeln!(&mut out, "  tags     {}", format_tags(&note.tags));
    }
    for image in &note.images {
        let _ = writeln!(&mut out, "  image    {image}");
    }
    let _ = writeln!(&mut out, "  updated  {}", format_timestamp(note.updated_at));
    let _ = writeln!(
        &mut out,
        "  stats    {} words, {} lines, {} min read",
        stats.words, stats.lines, stats.reading_minutes
    );
    out.push('\n');
    if args.html {
        out.push_str(&Renderer::new(config.render.clone()).render(&content));
    } else {
        out.push_str(&content);
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

pub fn render_markdown(config: Arc<AppConfig>, args: RenderArgs) -> Result<()> {
    let source = match &args.file {
        Some(path) => {
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?
        }
        None => read_stdin()?.unwrap_or_default(),
    };
    println!("{}", run_render(&config, &source, args.strip));
    Ok(())
}

fn run_render(config: &AppConfig, source: &str, strip: bool) -> String {
    if strip {
        strip_formatting(source)
    } else {
        Renderer::new(config.render.clone()).render(source)
    }
}

pub fn new_note(paths: &ConfigPaths, storage: StorageHandle, args: NewArgs) -> Result<()> {
    let registry = CategoryRegistry::load(&paths.categories_file)?;
    let pinned = args.pin;
    let note_id = create_note(&storage, &registry, args)?;
    println!(
        "Created note {}{}",
        short_id(&note_id),
        if pinned { " (pinned)" } else { "" }
    );
    Ok(())
}

fn create_note(storage: &StorageHandle, registry: &CategoryRegistry, args: NewArgs) -> Result<NoteId> {
    let title = match args.title {
        Some(t) => t,
        None => prompt("Title")?,
    };
    let content = match args.body {
        Some(body) => body,
        None => read_stdin()?.unwrap_or_default(),
    };
    let category = match args.category.as_deref() {
        Some(raw) => canonical_category(registry, raw)?,
        None => String::new(),
    };
    let draft = NoteDraft {
        category,
        tags: args.tags.as_deref().map(parse_tags).unwrap_or_default(),
        images: clean_images(args.images),
        ..NoteDraft::new(title, content)
    };
    let note_id = storage.create(draft).context("creating note")?;
    if args.pin {
        storage.update(&note_id, &NotePatch { is_pinned: Some(true), ..NotePatch::default() })?;
    }
    Ok(note_id)
}

pub fn edit_note(paths: &ConfigPaths, storage: StorageHandle, args: EditArgs) -> Result<()> {
    let registry = CategoryRegistry::load(&paths.categories_file)?;
    let note = run_edit(&storage, &registry, args)?;
    println!("Updated note {}", short_id(&note.id));
    Ok(())
}

fn run_edit(storage: &StorageHandle, registry: &CategoryRegistry, args: EditArgs) -> Result<Note> {
    let note = resolve_note(storage, &args.id)?;
    if note.is_password_protected {
        let password = args
            .password
            .as_deref()
            .ok_or_else(|| anyhow!("note {} is locked; pass --password", short_id(&note.id)))?;
        storage.unlock(&note.id, password)?;
    }
    let patch = NotePatch {
        title: args.title,
        content: args.body,
        category: args
            .category
            .as_deref()
            .map(|raw| canonical_category(registry, raw))
            .transpose()?,
        tags: args.tags.as_deref().map(parse_tags),
        images: match (args.clear_images, args.images.is_empty()) {
            (true, _) => Some(Vec::new()),
            (false, false) => Some(clean_images(args.images)),
            (false, true) => None,
        },
        ..NotePatch::default()
    };
    if patch.is_empty() {
        bail!("nothing to change; pass --title, --body, --category, --tags or --image");
    }
    storage.update(&note.id, &patch)
}

pub fn toggle_note(storage: StorageHandle, toggle: Toggle, args: NoteRef) -> Result<()> {
    let note = run_toggle(&storage, toggle, &args.id)?;
    let state = match toggle {
        Toggle::Pin if note.is_pinned => "pinned",
        Toggle::Pin => "unpinned",
        Toggle::Archive if note.is_archived => "archived",
        Toggle::Archive => "unarchived",
        Toggle::Trash if note.is_trashed => "moved to trash",
        Toggle::Trash => "restored from trash",
    };
    println!("Note {} {state}", short_id(&note.id));
    Ok(())
}

fn run_toggle(storage: &StorageHandle, toggle: Toggle, raw_id: &str) -> Result<Note> {
    let note = resolve_note(storage, raw_id)?;
    let patch = match toggle {
        Toggle::Pin => {
            if note.section() != Section::Home {
                bail!("only notes in home can be pinned");
            }
            NotePatch::toggle_pin(&note)
        }
        Toggle::Archive => NotePatch::toggle_archive(&note),
        Toggle::Trash => NotePatch::toggle_trash(&note),
    };
    storage.update(&note.id, &patch)
}

pub fn restore_notes(storage: StorageHandle, args: RestoreArgs) -> Result<()> {
    match (args.all, args.id) {
        (true, _) => {
            let count = storage.restore_all()?;
            println!("Restored {count} note(s)");
        }
        (false, Some(id)) => {
            let note = resolve_note(&storage, &id)?;
            storage.update(&note.id, &NotePatch::restore())?;
            println!("Restored note {}", short_id(&note.id));
        }
        (false, None) => bail!("pass a note id or --all"),
    }
    Ok(())
}

pub fn delete_note(storage: StorageHandle, args: DeleteArgs) -> Result<()> {
    let id = run_delete(&storage, &args)?;
    println!("Deleted note {}", short_id(&id));
    Ok(())
}

fn run_delete(storage: &StorageHandle, args: &DeleteArgs) -> Result<NoteId> {
    let note = resolve_note(storage, &args.id)?;
    if !note.is_trashed && !args.force {
        bail!(
            "note {} is not in the trash; trash it first or pass --force",
            short_id(&note.id)
        );
    }
    storage.delete(&note.id)?;
    Ok(note.id)
}

pub fn purge_trash(storage: StorageHandle) -> Result<()> {
    let count = storage.purge_trash()?;
    println!("Permanently deleted {count} note(s)");
    Ok(())
}

pub fn lock_note(storage: StorageHandle, args: LockArgs) -> Result<()> {
    let note = resolve_note(&storage, &args.id)?;
    if note.is_password_protected {
        bail!("note {} is already locked", short_id(&note.id));
    }
    storage.update(&note.id, &NotePatch::set_password(args.password))?;
    println!("Locked note {}", short_id(&note.id));
    Ok(())
}

pub fn unlock_note(storage: StorageHandle, args: LockArgs) -> Result<()> {
    let note = resolve_note(&storage, &args.id)?;
    if !note.is_password_protected {
        bail!("note {} is not locked", short_id(&note.id));
    }
    storage.unlock(&note.id, &args.password)?;
    storage.update(&note.id, &NotePatch::clear_password())?;
    println!("Removed lock from note {}", short_id(&note.id));
    Ok(())
}

pub fn export_notes(
    config: Arc<AppConfig>,
    paths: &ConfigPaths,
    storage: StorageHandle,
    args: ExportArgs,
) -> Result<()> {
    let written = run_export(&config, paths, &storage, &args)?;
    println!("Exported {} note(s)", written.len());
    for path in written {
        println!("  {}", path.display());
    }
    Ok(())
}

fn run_export(
    config: &AppConfig,
    paths: &ConfigPaths,
    storage: &StorageHandle,
    args: &ExportArgs,
) -> Result<Vec<PathBuf>> {
    let notes: Vec<Note> = storage
        .snapshot()?
        .into_iter()
        .filter(|note| args.section.map_or(true, |section| section.contains(note)))
        .collect();
    let format = args.format.unwrap_or(config.export.format);
    let dir = args
        .dir
        .clone()
        .unwrap_or_else(|| config.export.directory_or(paths).to_path_buf());
    export::export_to_dir(&notes, &dir, format, &config.render)
}

pub fn handle_category_command(
    paths: &ConfigPaths,
    storage: StorageHandle,
    args: CategoryArgs,
) -> Result<()> {
    print!("{}", run_category(paths, &storage, args.command.unwrap_or(CategoryCommand::List))?);
    Ok(())
}

fn run_category(paths: &ConfigPaths, storage: &StorageHandle, command: CategoryCommand) -> Result<String> {
    let mut registry = CategoryRegistry::load(&paths.categories_file)?;
    let message = match command {
        CategoryCommand::List => {
            let notes = storage.snapshot()?;
            let counts = category_counts(&notes, registry.names());
            let mut out = String::new();
            for category in registry.all() {
                let count = counts.get(&category.name).copied().unwrap_or(0);
                let kind = if category.is_default { "built-in" } else { "custom" };
                let _ = writeln!(
                    &mut out,
                    "{:<24} {:<10} {:>4}  {} {}  ({kind})",
                    category.id, category.name, count, category.color, category.icon
                );
            }
            return Ok(out);
        }
        CategoryCommand::Add(args) => {
            let category = registry.add(&args.name, &args.color, &args.icon)?;
            format!("Added category {} ({})\n", category.name, category.id)
        }
        CategoryCommand::Update(args) => {
            registry.update(
                &args.id,
                CategoryUpdate {
                    name: args.name,
                    color: args.color,
                    icon: args.icon,
                },
            )?;
            format!("Updated category {}\n", args.id)
        }
        CategoryCommand::Remove(args) => {
            let removed = registry.delete(&args.id)?;
            format!("Removed category {}\n", removed.name)
        }
        CategoryCommand::Up(args) => {
            if !registry.move_up(&args.id)? {
                return Ok(format!("Category {} is already first\n", args.id));
            }
            format!("Moved category {} up\n", args.id)
        }
        CategoryCommand::Down(args) => {
            if !registry.move_down(&args.id)? {
                return Ok(format!("Category {} is already last\n", args.id));
            }
            format!("Moved category {} down\n", args.id)
        }
    };
    registry.save(&paths.categories_file)?;
    Ok(message)
}

/// Finds a note by full id or unique id prefix.
fn resolve_note(storage: &StorageHandle, raw: &str) -> Result<Note> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("note id cannot be empty");
    }
    let mut matches = storage
        .snapshot()?
        .into_iter()
        .filter(|note| note.id.as_str().starts_with(raw));
    let first = matches
        .next()
        .ok_or_else(|| anyhow!("no note matches id '{raw}'"))?;
    if first.id.as_str() != raw && matches.next().is_some() {
        bail!("id prefix '{raw}' matches more than one note");
    }
    Ok(first)
}

fn clean_images(urls: Vec<String>) -> Vec<String> {
    urls.into_iter()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .collect()
}

fn canonical_category(registry: &CategoryRegistry, raw: &str) -> Result<String> {
    registry
        .by_name(raw.trim())
        .map(|category| category.name.clone())
        .ok_or_else(|| anyhow!("unknown category '{}'", raw.trim()))
}

fn prompt(label: &str) -> Result<String> {
    use std::io::Write;
    let mut stdout = io::stdout();
    write!(stdout, "{}: ", label)?;
    stdout.flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end().to_owned())
}

fn read_stdin() -> Result<Option<String>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(Some(buf))
}

fn headline(note: &Note) -> String {
    let mut headline = format!("{}  {}", short_id(&note.id), note.title);
    if note.is_pinned {
        headline.push_str("  [PINNED]");
    }
    if note.is_password_protected {
        headline.push_str("  [LOCKED]");
    }
    headline
}

fn short_id(id: &NoteId) -> &str {
    let raw = id.as_str();
    raw.char_indices()
        .nth(SHORT_ID_LEN)
        .map_or(raw, |(end, _)| &raw[..end])
}

fn build_snippet(note: &Note) -> Option<String> {
    let plain = strip_formatting(&note.content);
    let joined = plain
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        None
    } else {
        Some(joined.chars().take(SNIPPET_CHARS).collect())
    }
}

fn format_tags(tags: &[String]) -> String {
    tags.iter()
        .map(|tag| format!("#{}", tag))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_timestamp(at: OffsetDateTime) -> String {
    at.format(&Rfc3339)
        .unwrap_or_else(|_| at.unix_timestamp().to_string())
}
