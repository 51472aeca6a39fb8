use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

mod stats;

pub use stats::{strip_formatting, ContentStats};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for NoteId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for NoteId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NoteError {
    #[error("note title cannot be empty")]
    EmptyTitle,
    #[error("password cannot be empty")]
    EmptyPassword,
    #[error("wrong password for note {0}")]
    WrongPassword(NoteId),
}

/// The three disjoint partitions of the note list.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    #[default]
    Home,
    Archive,
    Trash,
}

impl Section {
    pub fn of(note: &Note) -> Self {
        if note.is_trashed {
            Section::Trash
        } else if note.is_archived {
            Section::Archive
        } else {
            Section::Home
        }
    }

    pub fn contains(self, note: &Note) -> bool {
        match self {
            Section::Home => !note.is_archived && !note.is_trashed,
            Section::Archive => note.is_archived && !note.is_trashed,
            Section::Trash => note.is_trashed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: NoteId,
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_trashed: bool,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_password_protected: bool,
    #[serde(skip)]
    pub password: Option<String>,
}

impl Note {
    pub fn from_draft(id: NoteId, draft: NoteDraft, now: OffsetDateTime) -> Result<Self, NoteError> {
        draft.validate()?;
        Ok(Self {
            id,
            title: draft.title.trim().to_string(),
            content: draft.content,
            category: draft.category,
            tags: normalize_tags(draft.tags),
            created_at: now,
            updated_at: now,
            is_pinned: false,
            is_archived: false,
            is_trashed: false,
            images: draft.images,
            is_password_protected: false,
            password: None,
        })
    }

    pub fn section(&self) -> Section {
        Section::of(self)
    }

    /// Unprotected notes, and protected notes without a stored password,
    /// accept any candidate.
    pub fn verify_password(&self, candidate: &str) -> bool {
        match self.password.as_deref() {
            Some(stored) if self.is_password_protected && !stored.is_empty() => stored == candidate,
            _ => true,
        }
    }

    /// The form delivered by the bulk snapshot feed: locked content is withheld.
    pub fn redacted(&self) -> Note {
        let mut note = self.clone();
        if note.is_password_protected {
            note.content.clear();
        }
        note
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
    pub category: String,
    pub tags: Vec<String>,
    pub images: Vec<String>,
}

impl NoteDraft {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), NoteError> {
        if self.title.trim().is_empty() {
            return Err(NoteError::EmptyTitle);
        }
        Ok(())
    }
}

/// Partial update keyed by note id. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub category: Option<String>,
    pub tags: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub is_pinned: Option<bool>,
    pub is_archived: Option<bool>,
    pub is_trashed: Option<bool>,
    /// `Some(Some(pw))` locks the note, `Some(None)` removes the lock.
    pub password: Option<Option<String>>,
}

impl NotePatch {
    pub fn toggle_pin(note: &Note) -> Self {
        Self {
            is_pinned: Some(!note.is_pinned),
            ..Self::default()
        }
    }

    pub fn toggle_archive(note: &Note) -> Self {
        Self {
            is_archived: Some(!note.is_archived),
            is_trashed: Some(false),
            is_pinned: Some(false),
            ..Self::default()
        }
    }

    pub fn toggle_trash(note: &Note) -> Self {
        Self {
            is_trashed: Some(!note.is_trashed),
            is_archived: Some(false),
            is_pinned: Some(false),
            ..Self::default()
        }
    }

    pub fn restore() -> Self {
        Self {
            is_trashed: Some(false),
            is_archived: Some(false),
            ..Self::default()
        }
    }

    pub fn set_password(password: impl Into<String>) -> Self {
        Self {
            password: Some(Some(password.into())),
            ..Self::default()
        }
    }

    pub fn clear_password() -> Self {
        Self {
            password: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Applies the patch, keeping archive and trash mutually exclusive and
    /// unpinning any note that leaves the home section. Nothing is written
    /// when validation fails.
    pub fn apply(&self, note: &mut Note) -> Result<(), NoteError> {
        if let Some(title) = &self.title {
            if title.trim().is_empty() {
                return Err(NoteError::EmptyTitle);
            }
        }
        if let Some(Some(password)) = &self.password {
            if password.is_empty() {
                return Err(NoteError::EmptyPassword);
            }
        }

        if let Some(title) = &self.title {
            note.title = title.trim().to_string();
        }
        if let Some(content) = &self.content {
            note.content = content.clone();
        }
        if let Some(category) = &self.category {
            note.category = category.clone();
        }
        if let Some(tags) = &self.tags {
            note.tags = normalize_tags(tags.clone());
        }
        if let Some(images) = &self.images {
            note.images = images.clone();
        }
        if let Some(pinned) = self.is_pinned {
            note.is_pinned = pinned;
        }
        if let Some(archived) = self.is_archived {
            note.is_archived = archived;
            if archived {
                note.is_trashed = false;
                note.is_pinned = false;
            }
        }
        if let Some(trashed) = self.is_trashed {
            note.is_trashed = trashed;
            if trashed {
                note.is_archived = false;
                note.is_pinned = false;
            }
        }
        match &self.password {
            Some(Some(password)) => {
                note.password = Some(password.clone());
                note.is_password_protected = true;
            }
            Some(None) => {
                note.password = None;
                note.is_password_protected = false;
            }
            None => {}
        }
        Ok(())
    }
}

/// Splits a comma separated tag list as typed into the editor.
pub fn parse_tags(raw: &str) -> Vec<String> {
    normalize_tags(raw.split(',').map(str::to_string))
}

pub fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for tag in tags {
        let trimmed = tag.trim();
        if trimmed.is_empty() {
            continue;
        }
        if seen.insert(trimmed.to_string()) {
            out.push(trimmed.to_string());
        }
    }
    out
}
