//! Note persistence behind the narrow store interface the views consume:
//! whole-snapshot reads and pushes, patch-based mutation and an explicit
//! fetch for locked content.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use time::{Duration, OffsetDateTime};

use crate::config::{ConfigPaths, StorageOptions};
use crate::model::{Note, NoteDraft, NoteError, NoteId, NotePatch};

mod schema;

const NOTE_COLUMNS: &str = "id, title, content, category, tags, images, created_at, updated_at, \
                            is_pinned, is_archived, is_trashed, is_password_protected, password";

/// The external document store as seen by the application.
pub trait NoteStore {
    /// Every note, newest update first, with locked content withheld.
    fn snapshot(&self) -> Result<Vec<Note>>;

    /// A single note in snapshot form.
    fn get(&self, id: &NoteId) -> Result<Option<Note>>;

    fn create(&self, draft: NoteDraft) -> Result<NoteId>;

    /// Applies a patch and refreshes `updated_at`; returns the note in
    /// snapshot form.
    fn update(&self, id: &NoteId, patch: &NotePatch) -> Result<Note>;

    fn delete(&self, id: &NoteId) -> Result<()>;

    /// The real content of a note, locked or not.
    fn locked_content(&self, id: &NoteId) -> Result<String>;

    fn unlock(&self, id: &NoteId, candidate: &str) -> Result<String> {
        let note = self
            .get(id)?
            .ok_or_else(|| anyhow!("note {id} not found"))?;
        if !note.verify_password(candidate) {
            return Err(NoteError::WrongPassword(id.clone()).into());
        }
        if note.is_password_protected {
            self.locked_content(id)
        } else {
            Ok(note.content)
        }
    }
}

#[derive(Clone)]
pub struct StorageHandle {
    db_path: Arc<PathBuf>,
    options: Arc<StorageOptions>,
    subscribers: Arc<Mutex<Vec<Sender<Vec<Note>>>>>,
}

impl StorageHandle {
    pub fn connect(&self) -> Result<Connection> {
        let conn = Connection::open(&*self.db_path)
            .with_context(|| format!("opening database {}", self.db_path.display()))?;
        prepare_connection(&conn, &self.options)?;
        Ok(conn)
    }

    pub fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.connect()?;
        f(&conn)
    }

    /// Registers a listener. The receiver gets the current snapshot right
    /// away and a complete replacement snapshot after every mutation.
    pub fn subscribe(&self) -> Result<Receiver<Vec<Note>>> {
        let (tx, rx) = unbounded();
        let mut subscribers = self.subscribers.lock();
        let snapshot = self.snapshot()?;
        tx.send(snapshot)
            .map_err(|_| anyhow!("subscriber dropped before first snapshot"))?;
        subscribers.push(tx);
        Ok(rx)
    }

    fn publish(&self) {
        let mut subscribers = self.subscribers.lock();
        if subscribers.is_empty() {
            return;
        }
        let snapshot = match self.snapshot() {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(?err, "failed to build snapshot for subscribers");
                return;
            }
        };
        subscribers.retain(|tx| tx.send(snapshot.clone()).is_ok());
        tracing::debug!(
            subscribers = subscribers.len(),
            notes = snapshot.len(),
            "pushed snapshot"
        );
    }

    fn load_note(conn: &Connection, id: &NoteId) -> Result<Option<Note>> {
        let sql = format!("SELECT {NOTE_COLUMNS} FROM notes WHERE id = ?1");
        conn.query_row(&sql, params![id.as_str()], note_from_row)
            .optional()
            .with_context(|| format!("loading note {id}"))
    }

    /// Permanently removes every trashed note.
    pub fn purge_trash(&self) -> Result<usize> {
        let count = self.with_connection(|conn| {
            conn.execute("DELETE FROM notes WHERE is_trashed = 1", [])
                .context("purging trash")
        })?;
        tracing::info!(count, "purged trash");
        self.publish();
        Ok(count)
    }

    /// Moves every trashed note back to the home section.
    pub fn restore_all(&self) -> Result<usize> {
        let now = to_millis(now_utc());
        let count = self.with_connection(|conn| {
            conn.execute(
                "UPDATE notes SET is_trashed = 0, is_archived = 0, updated_at = ?1
                 WHERE is_trashed = 1",
                params![now],
            )
            .context("restoring trash")
        })?;
        tracing::info!(count, "restored trash");
        self.publish();
        Ok(count)
    }
}

impl NoteStore for StorageHandle {
    fn snapshot(&self) -> Result<Vec<Note>> {
        self.with_connection(|conn| {
            let sql = format!("SELECT {NOTE_COLUMNS} FROM notes ORDER BY updated_at DESC, rowid DESC");
            let mut stmt = conn.prepare(&sql)?;
            let notes = stmt
                .query_map([], note_from_row)?
                .map(|note| note.map(|note| note.redacted()))
                .collect::<Result<Vec<_>, _>>()
                .context("reading note snapshot")?;
            Ok(notes)
        })
    }

    fn get(&self, id: &NoteId) -> Result<Option<Note>> {
        let note = self.with_connection(|conn| Self::load_note(conn, id))?;
        Ok(note.map(|note| note.redacted()))
    }

    fn create(&self, draft: NoteDraft) -> Result<NoteId> {
        let note = Note::from_draft(NoteId::generate(), draft, now_utc())?;
        self.with_connection(|conn| {
            conn.execute(
                &format!(
                    "INSERT INTO notes ({NOTE_COLUMNS})
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)"
                ),
                params![
                    note.id.as_str(),
                    note.title,
                    note.content,
                    note.category,
                    encode_list(&note.tags)?,
                    encode_list(&note.images)?,
                    to_millis(note.created_at),
                    to_millis(note.updated_at),
                    note.is_pinned,
                    note.is_archived,
                    note.is_trashed,
                    note.is_password_protected,
                    note.password,
                ],
            )
            .context("inserting note")?;
            Ok(())
        })?;
        tracing::info!(id = %note.id, title = %note.title, "created note");
        self.publish();
        Ok(note.id)
    }

    fn update(&self, id: &NoteId, patch: &NotePatch) -> Result<Note> {
        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        let mut note =
            Self::load_note(&tx, id)?.ok_or_else(|| anyhow!("note {id} not found"))?;
        patch.apply(&mut note)?;
        // Keep updates strictly ordered even within one clock tick.
        note.updated_at = now_utc().max(note.updated_at + Duration::milliseconds(1));
        tx.execute(
            "UPDATE notes
             SET title = ?2, content = ?3, category = ?4, tags = ?5, images = ?6,
                 updated_at = ?7, is_pinned = ?8, is_archived = ?9, is_trashed = ?10,
                 is_password_protected = ?11, password = ?12
             WHERE id = ?1",
            params![
                id.as_str(),
                note.title,
                note.content,
                note.category,
                encode_list(&note.tags)?,
                encode_list(&note.images)?,
                to_millis(note.updated_at),
                note.is_pinned,
                note.is_archived,
                note.is_trashed,
                note.is_password_protected,
                note.password,
            ],
        )
        .context("updating note")?;
        tx.commit()?;
        tracing::debug!(%id, section = %note.section(), "updated note");
        self.publish();
        Ok(note.redacted())
    }

    fn delete(&self, id: &NoteId) -> Result<()> {
        self.with_connection(|conn| {
            let deleted = conn
                .execute("DELETE FROM notes WHERE id = ?1", params![id.as_str()])
                .context("deleting note")?;
            if deleted == 0 {
                bail!("note {id} not found");
            }
            Ok(())
        })?;
        tracing::info!(%id, "deleted note");
        self.publish();
        Ok(())
    }

    fn locked_content(&self, id: &NoteId) -> Result<String> {
        self.with_connection(|conn| {
            conn.query_row(
                "SELECT content FROM notes WHERE id = ?1",
                params![id.as_str()],
                |row| row.get::<_, String>(0),
            )
            .optional()
            .context("fetching note content")?
            .ok_or_else(|| anyhow!("note {id} not found"))
        })
    }
}

pub fn init(paths: &ConfigPaths, storage: &StorageOptions) -> Result<StorageHandle> {
    let db_path = &paths.database_path;
    let existed = db_path.exists();
    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating data directory {}", parent.display()))?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("opening database {}", db_path.display()))?;
    prepare_connection(&conn, storage)?;
    schema::apply(&conn)?;
    let handle = StorageHandle {
        db_path: Arc::new(db_path.clone()),
        options: Arc::new(storage.clone()),
        subscribers: Arc::new(Mutex::new(Vec::new())),
    };
    if !existed && storage.seed_on_first_run {
        seed_welcome_note(&handle)?;
    }
    Ok(handle)
}

fn prepare_connection(conn: &Connection, storage: &StorageOptions) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")
        .context("setting journal_mode=WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")
        .context("setting synchronous=NORMAL")?;
    conn.pragma_update(
        None,
        "wal_autocheckpoint",
        storage.wal_autocheckpoint.to_string(),
    )
    .context("setting wal_autocheckpoint")?;
    Ok(())
}

fn seed_welcome_note(handle: &StorageHandle) -> Result<()> {
    tracing::info!("seeding first-run note");
    let draft = NoteDraft {
        title: "Welcome to Shared Notes".into(),
        content: r#"# Welcome

Notes support a small **markdown** dialect:

- [x] *italic*, **bold** and ~~struck~~ text
- [ ] `inline code` and [links](https://example.com)

| Section | Holds |
| --- | --- |
| home | active notes |
| archive | kept for later |
| trash | about to go |
"#
        .into(),
        category: "Personal".into(),
        tags: vec!["welcome".into()],
        images: Vec::new(),
    };
    handle.create(draft).context("inserting seed note")?;
    Ok(())
}

fn note_from_row(row: &Row<'_>) -> rusqlite::Result<Note> {
    let tags: String = row.get(4)?;
    let images: String = row.get(5)?;
    Ok(Note {
        id: NoteId::from(row.get::<_, String>(0)?),
        title: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        tags: decode_list(&tags, 4)?,
        images: decode_list(&images, 5)?,
        created_at: from_millis(row.get(6)?, 6)?,
        updated_at: from_millis(row.get(7)?, 7)?,
        is_pinned: row.get(8)?,
        is_archived: row.get(9)?,
        is_trashed: row.get(10)?,
        is_password_protected: row.get(11)?,
        password: row.get(12)?,
    })
}

fn encode_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items).context("encoding list column")
}

fn decode_list(raw: &str, column: usize) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(raw)
        .map_err(|err| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err)))
}

fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    now.replace_nanosecond(now.nanosecond() / 1_000_000 * 1_000_000)
        .unwrap_or(now)
}

fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

fn from_millis(millis: i64, column: usize) -> rusqlite::Result<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(i128::from(millis) * 1_000_000).map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Integer, Box::new(err))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Section;
    use crate::view::{project, SortBy, ViewState};
    use tempfile::TempDir;

    fn temp_paths(root: &TempDir) -> ConfigPaths {
        let config_dir = root.path().join("config");
        let config_file = config_dir.join("config.toml");
        ConfigPaths::rooted(config_dir, config_file, root.path().join("data"))
    }

    fn init_storage() -> anyhow::Result<(TempDir, StorageHandle)> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        paths.ensure_directories()?;
        let options = StorageOptions {
            seed_on_first_run: false,
            ..StorageOptions::default()
        };
        let storage = init(&paths, &options)?;
        Ok((temp, storage))
    }

    fn draft(title: &str, content: &str) -> NoteDraft {
        NoteDraft {
            category: "Work".into(),
            tags: vec!["alpha".into(), " alpha ".into(), "beta".into()],
            ..NoteDraft::new(title, content)
        }
    }

    #[test]
    fn create_assigns_id_and_timestamps() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let id = storage.create(draft("Plan", "body"))?;
        let note = storage.get(&id)?.expect("note present");
        assert_eq!(note.title, "Plan");
        assert_eq!(note.category, "Work");
        assert_eq!(note.tags, vec!["alpha", "beta"]);
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(note.section(), Section::Home);
        Ok(())
    }

    #[test]
    fn empty_title_blocks_create() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let err = storage.create(NoteDraft::new("  ", "body")).unwrap_err();
        assert_eq!(err.downcast_ref::<NoteError>(), Some(&NoteError::EmptyTitle));
        assert!(storage.snapshot()?.is_empty());
        Ok(())
    }

    #[test]
    fn update_refreshes_updated_at_and_keeps_invariants() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let id = storage.create(draft("Plan", "body"))?;
        let before = storage.get(&id)?.expect("note");

        let pinned = storage.update(&id, &NotePatch::toggle_pin(&before))?;
        assert!(pinned.is_pinned);
        assert!(pinned.updated_at > before.updated_at);

        let archived = storage.update(&id, &NotePatch::toggle_archive(&pinned))?;
        assert!(archived.is_archived);
        assert!(!archived.is_pinned);

        let trashed = storage.update(&id, &NotePatch::toggle_trash(&archived))?;
        assert!(trashed.is_trashed);
        assert!(!trashed.is_archived);
        assert_eq!(storage.get(&id)?.expect("note").section(), Section::Trash);
        Ok(())
    }

    #[test]
    fn snapshot_is_newest_first() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let first = storage.create(draft("First", ""))?;
        let second = storage.create(draft("Second", ""))?;
        std::thread::sleep(std::time::Duration::from_millis(5));
        storage.update(
            &first,
            &NotePatch {
                content: Some("touched".into()),
                ..NotePatch::default()
            },
        )?;
        let ids: Vec<NoteId> = storage.snapshot()?.into_iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![first, second]);
        Ok(())
    }

    #[test]
    fn locked_content_is_withheld_from_snapshots() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let id = storage.create(draft("Diary", "secret words"))?;
        storage.update(&id, &NotePatch::set_password("open sesame"))?;

        let listed = storage.snapshot()?;
        assert_eq!(listed[0].content, "");
        assert!(listed[0].is_password_protected);

        let err = storage.unlock(&id, "wrong").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<NoteError>(),
            Some(NoteError::WrongPassword(_))
        ));
        assert_eq!(storage.unlock(&id, "open sesame")?, "secret words");
        Ok(())
    }

    #[test]
    fn subscribers_receive_whole_snapshots() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let rx = storage.subscribe()?;
        assert!(rx.recv()?.is_empty());

        let id = storage.create(draft("Pushed", "body"))?;
        let pushed = rx.recv()?;
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].id, id);

        storage.delete(&id)?;
        assert!(rx.recv()?.is_empty());
        Ok(())
    }

    #[test]
    fn dropped_subscribers_are_pruned() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        drop(storage.subscribe()?);
        storage.create(draft("After drop", ""))?;
        assert!(storage.subscribers.lock().is_empty());
        Ok(())
    }

    #[test]
    fn restore_all_and_purge_trash() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        let keep = storage.create(draft("Keep", ""))?;
        let toss = storage.create(draft("Toss", ""))?;
        for id in [&keep, &toss] {
            let note = storage.get(id)?.expect("note");
            storage.update(id, &NotePatch::toggle_trash(&note))?;
        }
        assert_eq!(storage.restore_all()?, 2);

        let note = storage.get(&toss)?.expect("note");
        storage.update(&toss, &NotePatch::toggle_trash(&note))?;
        assert_eq!(storage.purge_trash()?, 1);

        let notes = storage.snapshot()?;
        let home = project(&notes, &ViewState::new(Section::Home, SortBy::Title));
        assert_eq!(home.len(), 1);
        assert_eq!(home[0].id, keep);
        Ok(())
    }

    #[test]
    fn deleting_missing_note_fails() -> anyhow::Result<()> {
        let (_temp, storage) = init_storage()?;
        assert!(storage.delete(&NoteId::from("missing")).is_err());
        Ok(())
    }

    #[test]
    fn first_run_seeds_welcome_note() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let paths = temp_paths(&temp);
        let storage = init(&paths, &StorageOptions::default())?;
        let notes = storage.snapshot()?;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].tags.contains(&"welcome".to_string()));
        Ok(())
    }
}
