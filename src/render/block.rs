//! Line classification for the content renderer.
//!
//! Input is split into whole-line blocks first so that fenced code and
//! tables are recognised before any inline markup is touched.

use super::RenderOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Block<'a> {
    Heading { level: u8, text: &'a str },
    Quote(&'a str),
    Code { lang: Option<&'a str>, body: Vec<&'a str> },
    List { kind: ListKind, items: Vec<ListItem<'a>> },
    Table { header: Vec<&'a str>, rows: Vec<Vec<&'a str>> },
    Rule,
    Paragraph(&'a str),
}

impl Block<'_> {
    /// Container blocks own the newline that follows them, so no line break
    /// is emitted after them.
    pub(crate) fn absorbs_trailing_newline(&self) -> bool {
        matches!(
            self,
            Block::Code { .. } | Block::List { .. } | Block::Table { .. }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListKind {
    Bullet,
    Ordered,
    Task,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ListItem<'a> {
    pub kind: ListKind,
    pub text: &'a str,
    pub checked: bool,
}

pub(crate) fn tokenize<'a>(text: &'a str, options: &RenderOptions) -> Vec<Block<'a>> {
    let lines: Vec<&str> = text
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect();

    let mut blocks: Vec<Block<'a>> = Vec::new();
    let mut idx = 0;
    while idx < lines.len() {
        if let Some((block, next)) = fenced_code(&lines, idx) {
            blocks.push(block);
            idx = next;
            continue;
        }
        if let Some((block, next)) = table(&lines, idx) {
            blocks.push(block);
            idx = next;
            continue;
        }

        let line = lines[idx];
        idx += 1;

        if let Some(item) = list_item(line) {
            if let Some(Block::List { kind, items }) = blocks.last_mut() {
                if *kind == item.kind {
                    items.push(item);
                    continue;
                }
            }
            blocks.push(Block::List {
                kind: item.kind,
                items: vec![item],
            });
            continue;
        }

        blocks.push(line_block(line, options));
    }
    blocks
}

fn line_block<'a>(line: &'a str, options: &RenderOptions) -> Block<'a> {
    let max_level = options.max_heading_level.clamp(1, 6) as usize;
    let hashes = line.bytes().take_while(|b| *b == b'#').count();
    if (1..=max_level).contains(&hashes) {
        if let Some(text) = line[hashes..].strip_prefix(' ') {
            return Block::Heading {
                level: hashes as u8,
                text,
            };
        }
    }
    if let Some(text) = line.strip_prefix("> ") {
        return Block::Quote(text);
    }
    if options.horizontal_rules && line.trim() == "---" {
        return Block::Rule;
    }
    Block::Paragraph(line)
}

fn list_item(line: &str) -> Option<ListItem<'_>> {
    if let Some(text) = line.strip_prefix("- [ ] ") {
        return Some(ListItem {
            kind: ListKind::Task,
            text,
            checked: false,
        });
    }
    if let Some(text) = line.strip_prefix("- [x] ") {
        return Some(ListItem {
            kind: ListKind::Task,
            text,
            checked: true,
        });
    }
    if let Some(text) = line.strip_prefix("- ") {
        return Some(ListItem {
            kind: ListKind::Bullet,
            text,
            checked: false,
        });
    }
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if digits > 0 {
        if let Some(text) = line[digits..].strip_prefix(". ") {
            return Some(ListItem {
                kind: ListKind::Ordered,
                text,
                checked: false,
            });
        }
    }
    None
}

/// An unterminated fence yields `None`; its lines then render as plain text.
fn fenced_code<'a>(lines: &[&'a str], start: usize) -> Option<(Block<'a>, usize)> {
    let opening = lines[start].trim_start().strip_prefix("```")?;
    if let Some(inline) = opening.strip_suffix("```") {
        return Some((
            Block::Code {
                lang: None,
                body: vec![inline],
            },
            start + 1,
        ));
    }

    let lang = opening.split_whitespace().next().filter(|lang| {
        lang.chars()
            .all(|ch| ch.is_alphanumeric() || matches!(ch, '-' | '_' | '+' | '#' | '.'))
    });
    let mut body = Vec::new();
    for (offset, &line) in lines[start + 1..].iter().enumerate() {
        if let Some(head) = line.trim_end().strip_suffix("```") {
            if !head.trim().is_empty() {
                body.push(head);
            }
            return Some((Block::Code { lang, body }, start + offset + 2));
        }
        body.push(line);
    }
    None
}

fn table<'a>(lines: &[&'a str], start: usize) -> Option<(Block<'a>, usize)> {
    let header = table_cells(lines[start])?;
    let separator = lines.get(start + 1).and_then(|line| table_cells(*line))?;
    if !separator.iter().all(|cell| is_separator_cell(cell)) {
        return None;
    }

    let mut rows = Vec::new();
    let mut idx = start + 2;
    while let Some(cells) = lines.get(idx).and_then(|line| table_cells(*line)) {
        rows.push(cells);
        idx += 1;
    }
    Some((Block::Table { header, rows }, idx))
}

/// Rows are delimited by an outer pair of pipes; the cells between keep
/// their count, so ragged rows stay ragged.
fn table_cells(line: &str) -> Option<Vec<&str>> {
    let inner = line.trim().strip_prefix('|')?.strip_suffix('|')?;
    if inner.is_empty() {
        return None;
    }
    Some(inner.split('|').map(str::trim).collect())
}

fn is_separator_cell(cell: &str) -> bool {
    let body = cell.strip_prefix(':').unwrap_or(cell);
    let body = body.strip_suffix(':').unwrap_or(body);
    !body.is_empty() && body.bytes().all(|b| b == b'-')
}
