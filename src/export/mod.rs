//! Writes notes out as standalone Markdown, HTML or JSON files.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::format_description::well_known::Rfc3339;

use crate::model::Note;
use crate::render::{escape_html, RenderOptions, Renderer};

const ID_SUFFIX_LEN: usize = 8;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Markdown,
    Html,
    Json,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Markdown => "md",
            ExportFormat::Html => "html",
            ExportFormat::Json => "json",
        }
    }
}

/// Serializes one note. Content is taken as given, so a redacted note
/// exports without its body.
pub fn export_note(note: &Note, format: ExportFormat, options: &RenderOptions) -> Result<String> {
    match format {
        ExportFormat::Markdown => markdown_document(note),
        ExportFormat::Html => Ok(html_document(note, options)),
        ExportFormat::Json => {
            serde_json::to_string_pretty(note).with_context(|| format!("serializing note {}", note.id))
        }
    }
}

/// Writes one file per note into `dir` and returns the written paths.
pub fn export_to_dir(
    notes: &[Note],
    dir: &Path,
    format: ExportFormat,
    options: &RenderOptions,
) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).with_context(|| format!("creating export directory {}", dir.display()))?;
    let mut written = Vec::with_capacity(notes.len());
    for note in notes {
        let path = dir.join(file_name(note, format));
        let body = export_note(note, format, options)?;
        fs::write(&path, body).with_context(|| format!("writing {}", path.display()))?;
        tracing::debug!(id = %note.id, path = %path.display(), "exported note");
        written.push(path);
    }
    tracing::info!(count = written.len(), %format, dir = %dir.display(), "exported notes");
    Ok(written)
}

pub fn file_name(note: &Note, format: ExportFormat) -> String {
    let slug = slugify(&note.title);
    let suffix: String = note
        .id
        .as_str()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(ID_SUFFIX_LEN)
        .collect();
    let stem = match (slug.is_empty(), suffix.is_empty()) {
        (true, true) => "note".to_string(),
        (true, false) => format!("note-{suffix}"),
        (false, true) => slug,
        (false, false) => format!("{slug}-{suffix}"),
    };
    format!("{stem}.{}", format.extension())
}

/// Lowercase ASCII alphanumerics joined by single hyphens.
pub fn slugify(text: &str) -> String {
    text.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

fn markdown_document(note: &Note) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "# {}", note.title)?;
    writeln!(out)?;
    if !note.category.is_empty() {
        writeln!(out, "- category: {}", note.category)?;
    }
    if !note.tags.is_empty() {
        writeln!(out, "- tags: {}", note.tags.join(", "))?;
    }
    if !note.images.is_empty() {
        writeln!(out, "- images: {}", note.images.join(", "))?;
    }
    writeln!(out, "- updated: {}", timestamp(note))?;
    writeln!(out)?;
    out.push_str(&note.content);
    if !note.content.ends_with('\n') {
        out.push('\n');
    }
    Ok(out)
}

fn html_document(note: &Note, options: &RenderOptions) -> String {
    let mut title = String::new();
    escape_html(&note.title, &mut title);
    let body = Renderer::new(options.clone()).render(&note.content);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<h1>{title}</h1>\n<article>{body}</article>\n</body>\n</html>\n"
    )
}

fn timestamp(note: &Note) -> String {
    note.updated_at
        .format(&Rfc3339)
        .unwrap_or_else(|_| note.updated_at.unix_timestamp().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::note;
    use tempfile::TempDir;

    fn sample() -> Note {
        let mut n = note("3f2a9c1e-77aa-4b1d", "Trip <Plans> & Ideas");
        n.category = "Travel".into();
        n.tags = vec!["summer".into(), "beach".into()];
        n.content = "**Pack** light".into();
        n
    }

    #[test]
    fn markdown_lists_image_urls() -> anyhow::Result<()> {
        let mut n = sample();
        n.images = vec!["https://img.example/beach.jpg".into()];
        let out = export_note(&n, ExportFormat::Markdown, &RenderOptions::default())?;
        assert!(out.contains("- tags: summer, beach\n- images: https://img.example/beach.jpg\n"));
        Ok(())
    }

    #[test]
    fn markdown_carries_metadata_and_raw_content() -> anyhow::Result<()> {
        let out = export_note(&sample(), ExportFormat::Markdown, &RenderOptions::default())?;
        insta::assert_snapshot!(out, @r###"
        # Trip <Plans> & Ideas

        - category: Travel
        - tags: summer, beach
        - updated: 2024-05-01T12:00:00Z

        **Pack** light
        "###);
        Ok(())
    }

    #[test]
    fn html_escapes_title_and_renders_body() -> anyhow::Result<()> {
        let out = export_note(&sample(), ExportFormat::Html, &RenderOptions::default())?;
        assert!(out.contains("<title>Trip &lt;Plans&gt; &amp; Ideas</title>"));
        assert!(out.contains("<article><strong>Pack</strong> light</article>"));
        Ok(())
    }

    #[test]
    fn json_uses_camel_case_fields() -> anyhow::Result<()> {
        let out = export_note(&sample(), ExportFormat::Json, &RenderOptions::default())?;
        let value: serde_json::Value = serde_json::from_str(&out)?;
        assert_eq!(value["category"], "Travel");
        assert_eq!(value["isPinned"], false);
        Ok(())
    }

    #[test]
    fn file_names_use_slug_and_id_suffix() {
        assert_eq!(file_name(&sample(), ExportFormat::Html), "trip-plans-ideas-3f2a9c1e.html");
        assert_eq!(file_name(&note("ab", "!!!"), ExportFormat::Json), "note-ab.json");
        assert_eq!(slugify("  Multiple   Spaces  "), "multiple-spaces");
    }

    #[test]
    fn export_to_dir_writes_one_file_per_note() -> anyhow::Result<()> {
        let temp = TempDir::new()?;
        let dir = temp.path().join("out");
        let notes = vec![sample(), note("b1", "Second")];
        let paths = export_to_dir(&notes, &dir, ExportFormat::Markdown, &RenderOptions::default())?;
        assert_eq!(paths.len(), 2);
        for path in &paths {
            assert!(path.starts_with(&dir));
            assert!(fs::read_to_string(path)?.starts_with("# "));
        }
        Ok(())
    }

    #[test]
    fn format_parses_case_insensitively() {
        assert_eq!("HTML".parse::<ExportFormat>().ok(), Some(ExportFormat::Html));
        assert_eq!(ExportFormat::Markdown.to_string(), "markdown");
    }
}
