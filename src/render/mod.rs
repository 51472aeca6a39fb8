//! Markdown-to-HTML rendering for note content.
//!
//! Rendering is pure and total: any input produces a fragment, malformed
//! markup is left as literal text, and identical input yields identical
//! output. The fragment is meant for a trusted display surface; literal
//! HTML in the source passes through unless [`RenderOptions::escape_html`]
//! is set.

use serde::{Deserialize, Serialize};

mod block;
mod inline;

use self::block::{Block, ListItem, ListKind};
use self::inline::render_inline;

const LINE_BREAK: &str = "<br>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Deepest `#` heading recognised (1 to 6).
    pub max_heading_level: u8,
    /// Render a line holding only `---` as `<hr>`.
    pub horizontal_rules: bool,
    /// Escape `& < > " '` in literal text before markup is applied.
    pub escape_html: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            max_heading_level: 3,
            horizontal_rules: true,
            escape_html: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Renderer {
    options: RenderOptions,
}

impl Renderer {
    pub fn new(options: RenderOptions) -> Self {
        Self { options }
    }

    pub fn render(&self, text: &str) -> String {
        let blocks = block::tokenize(text, &self.options);
        let mut out = String::with_capacity(text.len() + text.len() / 2);
        let mut previous: Option<&Block<'_>> = None;
        for block in &blocks {
            if previous.is_some_and(|prev| !prev.absorbs_trailing_newline()) {
                out.push_str(LINE_BREAK);
            }
            self.write_block(block, &mut out);
            previous = Some(block);
        }
        out
    }

    fn write_block(&self, block: &Block<'_>, out: &mut String) {
        let options = &self.options;
        match block {
            Block::Heading { level, text } => {
                out.push_str(&format!("<h{level}>"));
                render_inline(text, options, out);
                out.push_str(&format!("</h{level}>"));
            }
            Block::Quote(text) => {
                out.push_str("<blockquote>");
                render_inline(text, options, out);
                out.push_str("</blockquote>");
            }
            Block::Code { lang, body } => {
                match lang {
                    Some(lang) => out.push_str(&format!("<pre><code class=\"language-{lang}\">")),
                    None => out.push_str("<pre><code>"),
                }
                push_text(&body.join("\n"), options, out);
                out.push_str("</code></pre>");
            }
            Block::List { kind, items } => self.write_list(*kind, items, out),
            Block::Table { header, rows } => {
                out.push_str("<table><thead><tr>");
                for cell in header {
                    out.push_str("<th>");
                    render_inline(cell, options, out);
                    out.push_str("</th>");
                }
                out.push_str("</tr></thead><tbody>");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        out.push_str("<td>");
                        render_inline(cell, options, out);
                        out.push_str("</td>");
                    }
                    out.push_str("</tr>");
                }
                out.push_str("</tbody></table>");
            }
            Block::Rule => out.push_str("<hr>"),
            Block::Paragraph(text) => render_inline(text, options, out),
        }
    }

    fn write_list(&self, kind: ListKind, items: &[ListItem<'_>], out: &mut String) {
        let (open, close) = match kind {
            ListKind::Bullet => ("<ul>", "</ul>"),
            ListKind::Ordered => ("<ol>", "</ol>"),
            ListKind::Task => ("<ul class=\"task-list\">", "</ul>"),
        };
        out.push_str(open);
        for item in items {
            out.push_str("<li>");
            match (kind, item.checked) {
                (ListKind::Task, true) => {
                    out.push_str("<input type=\"checkbox\" checked disabled> <del>");
                    render_inline(item.text, &self.options, out);
                    out.push_str("</del>");
                }
                (ListKind::Task, false) => {
                    out.push_str("<input type=\"checkbox\" disabled> ");
                    render_inline(item.text, &self.options, out);
                }
                _ => render_inline(item.text, &self.options, out),
            }
            out.push_str("</li>");
        }
        out.push_str(close);
    }
}

/// Renders with the default options.
pub fn render(text: &str) -> String {
    Renderer::default().render(text)
}

pub fn escape_html(text: &str, out: &mut String) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
}

fn push_text(text: &str, options: &RenderOptions, out: &mut String) {
    if options.escape_html {
        escape_html(text, out);
    } else {
        out.push_str(text);
    }
}

fn push_attr(value: &str, options: &RenderOptions, out: &mut String) {
    if options.escape_html {
        escape_html(value, out);
    } else {
        out.push_str(value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hardened() -> Renderer {
        Renderer::new(RenderOptions {
            escape_html: true,
            ..RenderOptions::default()
        })
    }

    #[test]
    fn empty_in_empty_out() {
        assert_eq!(render(""), "");
    }

    #[test]
    fn bold_and_heading() {
        assert_eq!(render("**bold**"), "<strong>bold</strong>");
        assert_eq!(render("# Title"), "<h1>Title</h1>");
        assert_eq!(render("### Small"), "<h3>Small</h3>");
    }

    #[test]
    fn task_items_render_checked_and_unchecked() {
        assert_eq!(
            render("- [x] done\n- [ ] todo"),
            "<ul class=\"task-list\">\
             <li><input type=\"checkbox\" checked disabled> <del>done</del></li>\
             <li><input type=\"checkbox\" disabled> todo</li>\
             </ul>"
        );
    }

    #[test]
    fn table_gets_header_and_body() {
        assert_eq!(
            render("| A | B |\n| - | - |\n| 1 | 2 |"),
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><td>1</td><td>2</td></tr></tbody></table>"
        );
    }

    #[test]
    fn ragged_table_rows_are_not_padded() {
        assert_eq!(
            render("| A | B |\n|---|---|\n| 1 |"),
            "<table><thead><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><td>1</td></tr></tbody></table>"
        );
    }

    #[test]
    fn fenced_code_is_exempt_from_inline_rules() {
        assert_eq!(
            render("```\n**not bold**\n```"),
            "<pre><code>**not bold**</code></pre>"
        );
        assert_eq!(
            render("```rust\nlet x = 1;\nlet y = 2;\n```\nafter"),
            "<pre><code class=\"language-rust\">let x = 1;\nlet y = 2;</code></pre>after"
        );
    }

    #[test]
    fn remaining_newlines_become_breaks() {
        assert_eq!(render("# T\nbody\n"), "<h1>T</h1><br>body<br>");
        assert_eq!(render("a\n---\nb"), "a<br><hr><br>b");
        assert_eq!(
            render("intro\n- a\n- b\n1. one\ntext"),
            "intro<br><ul><li>a</li><li>b</li></ul><ol><li>one</li></ol>text"
        );
    }

    #[test]
    fn rule_can_be_switched_off() {
        let renderer = Renderer::new(RenderOptions {
            horizontal_rules: false,
            ..RenderOptions::default()
        });
        assert_eq!(renderer.render("a\n---"), "a<br>---");
    }

    #[test]
    fn quote_and_link() {
        assert_eq!(
            render("> wise **words**"),
            "<blockquote>wise <strong>words</strong></blockquote>"
        );
        assert_eq!(
            render("see [site](https://example.com)"),
            "see <a href=\"https://example.com\" target=\"_blank\" rel=\"noopener noreferrer\">site</a>"
        );
    }

    #[test]
    fn unterminated_fence_degrades_to_text() {
        assert_eq!(render("```\ncode"), "```<br>code");
    }

    #[test]
    fn raw_html_passes_through_unless_hardened() {
        assert_eq!(render("<b>x</b> **y**"), "<b>x</b> <strong>y</strong>");
        assert_eq!(
            hardened().render("<b>x</b> **y** & [a](/q?x=1&y=\"2\")"),
            "&lt;b&gt;x&lt;/b&gt; <strong>y</strong> &amp; \
             <a href=\"/q?x=1&amp;y=&quot;2&quot;\" target=\"_blank\" rel=\"noopener noreferrer\">a</a>"
        );
    }

    #[test]
    fn rendering_output_again_is_not_idempotent() {
        let renderer = hardened();
        let once = renderer.render("**a**");
        assert_eq!(once, "<strong>a</strong>");
        assert_ne!(renderer.render(&once), once);
    }

    #[test]
    fn output_is_deterministic() {
        let source = "# A\n- [x] b\n| c | d |\n|---|---|\n| e | f |\n`g` *h*";
        assert_eq!(render(source), render(source));
    }

    #[test]
    fn mixed_document_golden() {
        let source = "# Plan\n**Goal**: ship *v1*\n- [x] draft\n- [ ] code\n| A | B |\n| - | - |\n| 1 | 2 |\n> done";
        insta::assert_snapshot!(
            render(source),
            @r#"<h1>Plan</h1><br><strong>Goal</strong>: ship <em>v1</em><br><ul class="task-list"><li><input type="checkbox" checked disabled> <del>draft</del></li><li><input type="checkbox" disabled> code</li></ul><table><thead><tr><th>A</th><th>B</th></tr></thead><tbody><tr><td>1</td><td>2</td></tr></tbody></table><blockquote>done</blockquote>"#
        );
    }
}
