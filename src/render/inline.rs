use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::{push_attr, push_text, RenderOptions};

static CODE_SPAN: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]+)`").expect("valid code span regex"));
static LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").expect("valid link regex"));
static BOLD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*(.+?)\*").expect("valid italic regex"));
static STRIKE: Lazy<Regex> = Lazy::new(|| Regex::new(r"~~(.+?)~~").expect("valid strike regex"));

// Private-use code points bracket placeholder indices. They never occur in
// the emphasis markers, so emphasis can span a placeholder without seeing
// inside it.
const HOLE_OPEN: char = '\u{E000}';
const HOLE_CLOSE: char = '\u{E001}';

static HOLE: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").expect("valid placeholder regex"));

/// Renders a single line of text. Code spans and links are rendered first
/// and replaced by placeholders; emphasis then runs over the whole line and
/// the rendered fragments are put back. Code contents and link targets are
/// never run through emphasis.
pub(crate) fn render_inline(text: &str, options: &RenderOptions, out: &mut String) {
    let mut fragments: Vec<String> = Vec::new();

    let without_code = CODE_SPAN.replace_all(text, |caps: &Captures<'_>| {
        let mut code = String::from("<code>");
        push_text(&caps[1], options, &mut code);
        code.push_str("</code>");
        hole(&mut fragments, code)
    });

    let without_links = LINK.replace_all(&without_code, |caps: &Captures<'_>| {
        let mut link = String::from("<a href=\"");
        push_attr(&caps[2], options, &mut link);
        link.push_str("\" target=\"_blank\" rel=\"noopener noreferrer\">");
        let label = render_emphasis(&caps[1], options);
        link.push_str(&fill_holes(&label, &fragments));
        link.push_str("</a>");
        hole(&mut fragments, link)
    });

    let emphasised = render_emphasis(&without_links, options);
    out.push_str(&fill_holes(&emphasised, &fragments));
}

fn hole(fragments: &mut Vec<String>, rendered: String) -> String {
    fragments.push(rendered);
    format!("{HOLE_OPEN}{}{HOLE_CLOSE}", fragments.len() - 1)
}

fn fill_holes(text: &str, fragments: &[String]) -> String {
    HOLE.replace_all(text, |caps: &Captures<'_>| {
        caps[1]
            .parse::<usize>()
            .ok()
            .and_then(|index| fragments.get(index))
            .cloned()
            .unwrap_or_default()
    })
    .into_owned()
}

// Emphasis is flat: nested markers are not interpreted as nested tags.
fn render_emphasis(text: &str, options: &RenderOptions) -> String {
    if text.is_empty() {
        return String::new();
    }
    let mut plain = String::with_capacity(text.len());
    push_text(text, options, &mut plain);
    let bold = BOLD.replace_all(&plain, "<strong>${1}</strong>");
    let italic = ITALIC.replace_all(&bold, "<em>${1}</em>");
    STRIKE.replace_all(&italic, "<del>${1}</del>").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inline(text: &str) -> String {
        let mut out = String::new();
        render_inline(text, &RenderOptions::default(), &mut out);
        out
    }

    #[test]
    fn applies_flat_emphasis() {
        assert_eq!(
            inline("**b** *i* ~~s~~"),
            "<strong>b</strong> <em>i</em> <del>s</del>"
        );
    }

    #[test]
    fn code_span_takes_precedence() {
        assert_eq!(
            inline("`**x**` and **y**"),
            "<code>**x**</code> and <strong>y</strong>"
        );
    }

    #[test]
    fn link_target_is_left_alone() {
        assert_eq!(
            inline("[*docs*](https://a.io/x_*y*_z)"),
            "<a href=\"https://a.io/x_*y*_z\" target=\"_blank\" rel=\"noopener noreferrer\"><em>docs</em></a>"
        );
    }

    #[test]
    fn emphasis_wraps_code_spans_and_links() {
        assert_eq!(inline("**`cmd`**"), "<strong><code>cmd</code></strong>");
        assert_eq!(
            inline("**[docs](https://x.io)**"),
            "<strong><a href=\"https://x.io\" target=\"_blank\" rel=\"noopener noreferrer\">docs</a></strong>"
        );
        assert_eq!(inline("*see `x` here*"), "<em>see <code>x</code> here</em>");
        assert_eq!(inline("~~`old`~~ new"), "<del><code>old</code></del> new");
    }

    #[test]
    fn code_inside_link_label_survives() {
        assert_eq!(
            inline("[run `make`](/build)"),
            "<a href=\"/build\" target=\"_blank\" rel=\"noopener noreferrer\">run <code>make</code></a>"
        );
    }

    #[test]
    fn unmatched_markers_stay_literal() {
        assert_eq!(inline("2 * 3 = 6"), "2 * 3 = 6");
        assert_eq!(inline("** alone"), "** alone");
        assert_eq!(inline("`open code"), "`open code");
        assert_eq!(inline("[label](no close"), "[label](no close");
    }
}
