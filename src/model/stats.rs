use once_cell::sync::Lazy;
use regex::Regex;
use unicode_segmentation::UnicodeSegmentation;

const WORDS_PER_MINUTE: usize = 200;

static FORMATTING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*|__|\*|_|~~|`|<[^>]*>").expect("valid formatting regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContentStats {
    pub words: usize,
    pub lines: usize,
    pub characters: usize,
    pub reading_minutes: usize,
}

impl ContentStats {
    pub fn of(text: &str) -> Self {
        let words = text.unicode_words().count();
        let lines = if text.is_empty() {
            0
        } else {
            text.split('\n').count()
        };
        Self {
            words,
            lines,
            characters: text.chars().count(),
            reading_minutes: words.div_ceil(WORDS_PER_MINUTE),
        }
    }
}

/// Drops inline markup and HTML tags, leaving the plain text.
pub fn strip_formatting(text: &str) -> String {
    FORMATTING.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_words_lines_and_reading_time() {
        let stats = ContentStats::of("hello world\nsecond line");
        assert_eq!(stats.words, 4);
        assert_eq!(stats.lines, 2);
        assert_eq!(stats.characters, 23);
        assert_eq!(stats.reading_minutes, 1);
    }

    #[test]
    fn empty_content_has_no_reading_time() {
        assert_eq!(ContentStats::of(""), ContentStats::default());
    }

    #[test]
    fn reading_time_rounds_up() {
        let text = vec!["word"; 201].join(" ");
        assert_eq!(ContentStats::of(&text).reading_minutes, 2);
    }

    #[test]
    fn strip_formatting_removes_markup() {
        assert_eq!(
            strip_formatting("**bold** _it_ ~~gone~~ `code` <b>x</b>"),
            "bold it gone code x"
        );
    }
}
