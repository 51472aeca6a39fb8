pub mod categories;
pub mod cli;
pub mod config;
pub mod export;
pub mod model;
pub mod render;
pub mod search;
pub mod storage;
pub mod view;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use model::{Note, NoteDraft, NoteId, NotePatch, Section};
pub use render::{render, RenderOptions, Renderer};
pub use storage::{NoteStore, StorageHandle};
pub use view::{project, SortBy, ViewState};
