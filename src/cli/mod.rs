use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use once_cell::sync::OnceCell;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{ConfigLoader, CONFIG_ENV, DATA_ENV};
use crate::storage;

pub mod commands;

use self::commands::{
    CategoryArgs, DeleteArgs, EditArgs, ExportArgs, ListArgs, LockArgs, NewArgs, NoteRef,
    RenderArgs, RestoreArgs, ShowArgs, Toggle,
};

#[derive(Parser, Debug)]
#[command(
    name = "sharednotes",
    version,
    about = "Markdown notes with categories, archive and trash"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Override the config file location (takes precedence over SHAREDNOTES_CONFIG)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Override the data directory (takes precedence over SHAREDNOTES_DATA)
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Minimum log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    pub log_level: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the notes in a section (default)
    List(ListArgs),
    /// Print one note with its metadata
    Show(ShowArgs),
    /// Render markdown from a file or stdin to HTML
    Render(RenderArgs),
    /// Create a new note from the command line
    New(NewArgs),
    /// Change a note's title, body, category, tags or images
    Edit(EditArgs),
    /// Pin or unpin a note in home
    Pin(NoteRef),
    /// Move a note into or out of the archive
    Archive(NoteRef),
    /// Move a note into or out of the trash
    Trash(NoteRef),
    /// Bring notes back from the trash
    Restore(RestoreArgs),
    /// Permanently delete a note
    Delete(DeleteArgs),
    /// Permanently delete everything in the trash
    Purge,
    /// Protect a note with a password
    Lock(LockArgs),
    /// Remove a note's password
    Unlock(LockArgs),
    /// Write notes to a directory as markdown, html or json
    Export(ExportArgs),
    /// Manage categories
    Categories(CategoryArgs),
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.config {
        env::set_var(CONFIG_ENV, path);
    }
    if let Some(path) = &cli.data_dir {
        env::set_var(DATA_ENV, path);
    }

    let loader = ConfigLoader::discover()?;
    loader.paths().ensure_directories()?;
    let paths = loader.paths().clone();
    init_tracing(&cli.log_level)
        .with_context(|| format!("initialising logging at level {}", cli.log_level))?;
    let config = loader.load_or_init()?;

    let config = Arc::new(config);
    let command = cli
        .command
        .unwrap_or_else(|| Commands::List(ListArgs::default()));
    if let Commands::Render(args) = command {
        return commands::render_markdown(config, args);
    }

    let storage = storage::init(&paths, &config.storage)?;
    match command {
        Commands::List(args) => commands::list_notes(config, storage, args),
        Commands::Show(args) => commands::show_note(config, storage, args),
        Commands::Render(args) => commands::render_markdown(config, args),
        Commands::New(args) => commands::new_note(&paths, storage, args),
        Commands::Edit(args) => commands::edit_note(&paths, storage, args),
        Commands::Pin(args) => commands::toggle_note(storage, Toggle::Pin, args),
        Commands::Archive(args) => commands::toggle_note(storage, Toggle::Archive, args),
        Commands::Trash(args) => commands::toggle_note(storage, Toggle::Trash, args),
        Commands::Restore(args) => commands::restore_notes(storage, args),
        Commands::Delete(args) => commands::delete_note(storage, args),
        Commands::Purge => commands::purge_trash(storage),
        Commands::Lock(args) => commands::lock_note(storage, args),
        Commands::Unlock(args) => commands::unlock_note(storage, args),
        Commands::Export(args) => commands::export_notes(config, &paths, storage, args),
        Commands::Categories(args) => commands::handle_category_command(&paths, storage, args),
    }
}

fn init_tracing(level: &str) -> Result<()> {
    static INIT: OnceCell<()> = OnceCell::new();
    INIT.get_or_try_init(|| {
        let env_filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));
        fmt()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .init();
        Ok(())
    })
    .map(|_| ())
}
