use crate::model::Note;

/// Which field of a note satisfied the search term.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchField {
    Title,
    Content,
    Tag,
}

/// Case-insensitive substring search over title, content and tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchTerm {
    needle: String,
}

impl SearchTerm {
    pub fn new(raw: &str) -> Self {
        Self {
            needle: raw.to_lowercase(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.needle.is_empty()
    }

    pub fn matches(&self, note: &Note) -> bool {
        self.is_empty() || self.matched_field(note).is_some()
    }

    /// First field containing the term, checked in title, content, tag order.
    /// An empty term reports no field even though it matches every note.
    pub fn matched_field(&self, note: &Note) -> Option<MatchField> {
        if self.is_empty() {
            return None;
        }
        if self.hit(&note.title) {
            return Some(MatchField::Title);
        }
        if self.hit(&note.content) {
            return Some(MatchField::Content);
        }
        if note.tags.iter().any(|tag| self.hit(tag)) {
            return Some(MatchField::Tag);
        }
        None
    }

    fn hit(&self, haystack: &str) -> bool {
        haystack.to_lowercase().contains(&self.needle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::note;

    #[test]
    fn substring_matches_tags() {
        let mut n = note("a", "Groceries");
        n.tags = vec!["category-x".into()];
        let term = SearchTerm::new("cat");
        assert!(term.matches(&n));
        assert_eq!(term.matched_field(&n), Some(MatchField::Tag));
    }

    #[test]
    fn matching_ignores_case() {
        let mut n = note("a", "Meeting Notes");
        n.content = "Discuss the ROADMAP".into();
        assert_eq!(
            SearchTerm::new("meeting").matched_field(&n),
            Some(MatchField::Title)
        );
        assert_eq!(
            SearchTerm::new("roadmap").matched_field(&n),
            Some(MatchField::Content)
        );
        assert!(!SearchTerm::new("budget").matches(&n));
    }

    #[test]
    fn empty_term_matches_everything() {
        let n = note("a", "Anything");
        let term = SearchTerm::new("");
        assert!(term.matches(&n));
        assert_eq!(term.matched_field(&n), None);
    }
}
