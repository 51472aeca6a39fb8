use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

const CATEGORIES_TMP_EXTENSION: &str = "json.tmp";

/// Built-in categories: id, name, color, icon.
const DEFAULT_CATEGORIES: [(&str, &str, &str, &str); 8] = [
    ("personal", "Personal", "#3b82f6", "User"),
    ("work", "Work", "#ef4444", "Briefcase"),
    ("study", "Study", "#10b981", "BookOpen"),
    ("ideas", "Ideas", "#f59e0b", "Lightbulb"),
    ("projects", "Projects", "#8b5cf6", "FolderOpen"),
    ("shopping", "Shopping", "#ec4899", "ShoppingCart"),
    ("travel", "Travel", "#06b6d4", "Plane"),
    ("health", "Health", "#84cc16", "Heart"),
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CategoryError {
    #[error("category '{0}' not found")]
    NotFound(String),
    #[error("built-in category '{0}' cannot be changed")]
    Immutable(String),
    #[error("category name cannot be empty")]
    EmptyName,
    #[error("category '{0}' already exists")]
    Duplicate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub color: String,
    pub icon: String,
    pub position: u32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Default)]
pub struct CategoryUpdate {
    pub name: Option<String>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// User-managed category set. Built-ins are always present and read-only;
/// only custom categories are persisted.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    categories: Vec<Category>,
}

impl Default for CategoryRegistry {
    fn default() -> Self {
        Self {
            categories: default_categories(),
        }
    }
}

impl CategoryRegistry {
    pub fn load(path: &Path) -> Result<Self> {
        let mut registry = Self::default();
        if !path.exists() {
            return Ok(registry);
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading categories {}", path.display()))?;
        let stored: Vec<Category> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing categories {}", path.display()))?;
        for category in stored {
            if category.is_default || registry.by_id(&category.id).is_some() {
                tracing::warn!(id = %category.id, "ignoring stored category shadowing an existing id");
                continue;
            }
            registry.categories.push(category);
        }
        registry.sort();
        tracing::debug!(count = registry.categories.len(), "loaded categories");
        Ok(registry)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let custom: Vec<&Category> = self.custom().collect();
        let json = serde_json::to_string_pretty(&custom).context("serializing categories")?;
        let tmp = path.with_extension(CATEGORIES_TMP_EXTENSION);
        fs::write(&tmp, json).with_context(|| format!("writing {}", tmp.display()))?;
        fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }

    pub fn all(&self) -> &[Category] {
        &self.categories
    }

    pub fn custom(&self) -> impl Iterator<Item = &Category> {
        self.categories.iter().filter(|category| !category.is_default)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|category| category.name.as_str())
    }

    pub fn by_id(&self, id: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.id == id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Category> {
        let wanted = name.to_lowercase();
        self.categories
            .iter()
            .find(|category| category.name.to_lowercase() == wanted)
    }

    pub fn add(&mut self, name: &str, color: &str, icon: &str) -> Result<&Category, CategoryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CategoryError::EmptyName);
        }
        if self.by_name(name).is_some() {
            return Err(CategoryError::Duplicate(name.to_string()));
        }
        let position = self
            .categories
            .iter()
            .map(|category| category.position)
            .max()
            .map_or(0, |max| max + 1);
        self.categories.push(Category {
            id: format!("custom-{}", Uuid::new_v4().simple()),
            name: name.to_string(),
            color: color.to_string(),
            icon: icon.to_string(),
            position,
            is_default: false,
            created_at: OffsetDateTime::now_utc(),
        });
        let index = self.categories.len() - 1;
        Ok(&self.categories[index])
    }

    pub fn update(&mut self, id: &str, update: CategoryUpdate) -> Result<(), CategoryError> {
        if let Some(name) = update.name.as_deref().map(str::trim) {
            if name.is_empty() {
                return Err(CategoryError::EmptyName);
            }
            if self
                .by_name(name)
                .is_some_and(|existing| existing.id != id)
            {
                return Err(CategoryError::Duplicate(name.to_string()));
            }
        }
        let category = self.custom_mut(id)?;
        if let Some(name) = update.name {
            category.name = name.trim().to_string();
        }
        if let Some(color) = update.color {
            category.color = color;
        }
        if let Some(icon) = update.icon {
            category.icon = icon;
        }
        Ok(())
    }

    pub fn delete(&mut self, id: &str) -> Result<Category, CategoryError> {
        self.custom_mut(id)?;
        let index = self
            .categories
            .iter()
            .position(|category| category.id == id)
            .ok_or_else(|| CategoryError::NotFound(id.to_string()))?;
        Ok(self.categories.remove(index))
    }

    /// Assigns custom categories positions after the built-ins in the given
    /// order. Unknown ids are skipped.
    pub fn reorder(&mut self, ids: &[&str]) {
        let base = DEFAULT_CATEGORIES.len() as u32;
        for (index, id) in ids.iter().enumerate() {
            if let Some(category) = self
                .categories
                .iter_mut()
                .find(|category| !category.is_default && category.id == *id)
            {
                category.position = base + index as u32;
            }
        }
        self.sort();
    }

    /// Returns `Ok(false)` when the category is already first.
    pub fn move_up(&mut self, id: &str) -> Result<bool, CategoryError> {
        self.shift(id, -1)
    }

    /// Returns `Ok(false)` when the category is already last.
    pub fn move_down(&mut self, id: &str) -> Result<bool, CategoryError> {
        self.shift(id, 1)
    }

    fn shift(&mut self, id: &str, delta: isize) -> Result<bool, CategoryError> {
        self.custom_mut(id)?;
        let order: Vec<usize> = self
            .categories
            .iter()
            .enumerate()
            .filter(|(_, category)| !category.is_default)
            .map(|(index, _)| index)
            .collect();
        let Some(current) = order.iter().position(|&index| self.categories[index].id == id) else {
            return Err(CategoryError::NotFound(id.to_string()));
        };
        let Some(neighbour) = current
            .checked_add_signed(delta)
            .filter(|neighbour| *neighbour < order.len())
        else {
            return Ok(false);
        };
        let (a, b) = (order[current], order[neighbour]);
        let position = self.categories[a].position;
        self.categories[a].position = self.categories[b].position;
        self.categories[b].position = position;
        self.sort();
        Ok(true)
    }

    fn custom_mut(&mut self, id: &str) -> Result<&mut Category, CategoryError> {
        let category = self
            .categories
            .iter_mut()
            .find(|category| category.id == id)
            .ok_or_else(|| CategoryError::NotFound(id.to_string()))?;
        if category.is_default {
            return Err(CategoryError::Immutable(category.name.clone()));
        }
        Ok(category)
    }

    fn sort(&mut self) {
        self.categories.sort_by_key(|category| category.position);
    }
}

fn default_categories() -> Vec<Category> {
    DEFAULT_CATEGORIES
        .iter()
        .enumerate()
        .map(|(position, (id, name, color, icon))| Category {
            id: (*id).to_string(),
            name: (*name).to_string(),
            color: (*color).to_string(),
            icon: (*icon).to_string(),
            position: position as u32,
            is_default: true,
            created_at: OffsetDateTime::UNIX_EPOCH,
        })
        .collect()
}
