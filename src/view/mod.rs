//! Derives the displayed note list from a snapshot plus the current view.
//!
//! Everything here is recomputed from scratch on each call; there is no
//! cached index to keep in step with the store.

use std::cmp::Ordering;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::model::{Note, Section};
use crate::search::SearchTerm;

pub const ALL_CATEGORIES: &str = "all";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Date,
    Title,
    Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CategoryFilter {
    #[default]
    All,
    Named(String),
}

impl CategoryFilter {
    /// `"all"` selects every category; anything else is an exact name.
    pub fn parse(raw: &str) -> Self {
        if raw == ALL_CATEGORIES {
            CategoryFilter::All
        } else {
            CategoryFilter::Named(raw.to_string())
        }
    }

    pub fn matches(&self, note: &Note) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Named(name) => note.category == *name,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewState {
    pub search: String,
    pub category: CategoryFilter,
    pub section: Section,
    pub sort_by: SortBy,
}

impl ViewState {
    pub fn new(section: Section, sort_by: SortBy) -> Self {
        Self {
            section,
            sort_by,
            ..Self::default()
        }
    }

    pub fn with_search(mut self, search: impl Into<String>) -> Self {
        self.search = search.into();
        self
    }

    pub fn with_category(mut self, category: CategoryFilter) -> Self {
        self.category = category;
        self
    }
}

/// Filters by search, category and section, then sorts. The sort is stable
/// and pinned notes lead only in the home section.
pub fn project<'a>(notes: &'a [Note], view: &ViewState) -> Vec<&'a Note> {
    let term = SearchTerm::new(&view.search);
    let mut visible: Vec<&Note> = notes
        .iter()
        .filter(|note| {
            term.matches(note) && view.category.matches(note) && view.section.contains(note)
        })
        .collect();

    let pin_first = view.section == Section::Home;
    visible.sort_by(|a, b| {
        let pinned = if pin_first {
            b.is_pinned.cmp(&a.is_pinned)
        } else {
            Ordering::Equal
        };
        pinned.then_with(|| match view.sort_by {
            SortBy::Date => b.updated_at.cmp(&a.updated_at),
            SortBy::Title => collate(&a.title, &b.title),
            SortBy::Category => collate(&a.category, &b.category),
        })
    });
    visible
}

/// Case-insensitive ordering in the manner of a typical UI locale. Strings
/// compare by their lowercase form with common Latin diacritics folded
/// (`é` sorts with `e`), then unaccented before accented, then lowercase
/// before uppercase, then by raw bytes. Letters outside the folding table
/// keep code-point order.
pub fn collate(a: &str, b: &str) -> Ordering {
    let lower = |s: &str| s.chars().flat_map(char::to_lowercase).collect::<Vec<_>>();
    let (a_lower, b_lower) = (lower(a), lower(b));
    a_lower
        .iter()
        .map(|&c| fold_diacritic(c))
        .cmp(b_lower.iter().map(|&c| fold_diacritic(c)))
        .then_with(|| a_lower.cmp(&b_lower))
        .then_with(|| {
            a.chars()
                .map(char::is_uppercase)
                .cmp(b.chars().map(char::is_uppercase))
        })
        .then_with(|| a.cmp(b))
}

fn fold_diacritic(c: char) -> char {
    match c {
        'à'..='å' | 'ā' | 'ă' | 'ą' => 'a',
        'ç' | 'ć' | 'ĉ' | 'ċ' | 'č' => 'c',
        'ď' | 'đ' => 'd',
        'è'..='ë' | 'ē' | 'ĕ' | 'ė' | 'ę' | 'ě' => 'e',
        'ĝ' | 'ğ' | 'ġ' | 'ģ' => 'g',
        'ĥ' | 'ħ' => 'h',
        'ì'..='ï' | 'ĩ' | 'ī' | 'ĭ' | 'į' | 'ı' => 'i',
        'ĵ' => 'j',
        'ķ' => 'k',
        'ĺ' | 'ļ' | 'ľ' | 'ŀ' | 'ł' => 'l',
        'ñ' | 'ń' | 'ņ' | 'ň' => 'n',
        'ò'..='ö' | 'ø' | 'ō' | 'ŏ' | 'ő' => 'o',
        'ŕ' | 'ŗ' | 'ř' => 'r',
        'ś' | 'ŝ' | 'ş' | 'š' => 's',
        'ţ' | 'ť' | 'ŧ' => 't',
        'ù'..='ü' | 'ũ' | 'ū' | 'ŭ' | 'ů' | 'ű' | 'ų' => 'u',
        'ŵ' => 'w',
        'ý' | 'ÿ' | 'ŷ' => 'y',
        'ź' | 'ż' | 'ž' => 'z',
        other => other,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SectionCounts {
    pub home: usize,
    pub archive: usize,
    pub trash: usize,
}

impl SectionCounts {
    pub fn of(notes: &[Note]) -> Self {
        let mut counts = Self::default();
        for note in notes {
            match Section::of(note) {
                Section::Home => counts.home += 1,
                Section::Archive => counts.archive += 1,
                Section::Trash => counts.trash += 1,
            }
        }
        counts
    }

    pub fn get(&self, section: Section) -> usize {
        match section {
            Section::Home => self.home,
            Section::Archive => self.archive,
            Section::Trash => self.trash,
        }
    }
}

/// Home-section notes per category, in the order the names are given.
pub fn category_counts<'a, I>(notes: &[Note], names: I) -> IndexMap<String, usize>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: IndexMap<String, usize> =
        names.into_iter().map(|name| (name.to_string(), 0)).collect();
    for note in notes.iter().filter(|note| Section::Home.contains(note)) {
        if let Some(count) = counts.get_mut(&note.category) {
            *count += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::fixtures::{aged, note};
    use std::collections::HashSet;

    fn ids(notes: &[&Note]) -> Vec<String> {
        notes.iter().map(|note| note.id.to_string()).collect()
    }

    #[test]
    fn pin_beats_recency_on_home() {
        let mut a = aged(note("a", "Yesterday"), 1);
        a.is_pinned = true;
        let b = note("b", "Today");
        let notes = vec![b, a];
        let view = ViewState::default();
        assert_eq!(ids(&project(&notes, &view)), vec!["a", "b"]);
    }

    #[test]
    fn pin_is_ignored_outside_home() {
        let mut a = aged(note("a", "Old"), 3);
        a.is_pinned = true;
        a.is_archived = true;
        let mut b = note("b", "New");
        b.is_archived = true;
        let notes = vec![a, b];
        let view = ViewState::new(Section::Archive, SortBy::Date);
        assert_eq!(ids(&project(&notes, &view)), vec!["b", "a"]);
    }

    #[test]
    fn title_sort_is_case_insensitive() {
        let notes = vec![note("1", "Banana"), note("2", "apple"), note("3", "Apple")];
        let view = ViewState::new(Section::Home, SortBy::Title);
        assert_eq!(ids(&project(&notes, &view)), vec!["2", "3", "1"]);
    }

    #[test]
    fn accented_titles_sort_with_their_base_letter() {
        let notes = vec![
            note("1", "zebra"),
            note("2", "Élan"),
            note("3", "apple"),
            note("4", "elan"),
            note("5", "Ölfarbe"),
        ];
        let view = ViewState::new(Section::Home, SortBy::Title);
        assert_eq!(ids(&project(&notes, &view)), vec!["3", "4", "2", "5", "1"]);
        assert_eq!(collate("résumé", "resume"), Ordering::Greater);
    }

    #[test]
    fn category_sort_is_stable_for_equal_keys() {
        let mut first = note("1", "First");
        first.category = "Work".into();
        let mut second = note("2", "Second");
        second.category = "Ideas".into();
        let mut third = note("3", "Third");
        third.category = "work".into();
        let mut fourth = note("4", "Fourth");
        fourth.category = "Work".into();
        let notes = vec![first, second, third, fourth];
        let view = ViewState::new(Section::Home, SortBy::Category);
        assert_eq!(ids(&project(&notes, &view)), vec!["2", "3", "1", "4"]);
    }

    #[test]
    fn search_reaches_tags() {
        let mut tagged = note("a", "Groceries");
        tagged.tags = vec!["category-x".into()];
        let notes = vec![tagged, note("b", "Unrelated")];
        let view = ViewState::default().with_search("cat");
        assert_eq!(ids(&project(&notes, &view)), vec!["a"]);
    }

    #[test]
    fn category_filter_is_exact() {
        let mut work = note("a", "Report");
        work.category = "Work".into();
        let notes = vec![work];
        let lower = ViewState::default().with_category(CategoryFilter::parse("work"));
        assert!(project(&notes, &lower).is_empty());
        let exact = ViewState::default().with_category(CategoryFilter::parse("Work"));
        assert_eq!(project(&notes, &exact).len(), 1);
        assert_eq!(CategoryFilter::parse("all"), CategoryFilter::All);
    }

    #[test]
    fn sections_partition_the_snapshot() {
        let mut archived = note("b", "Archived");
        archived.is_archived = true;
        let mut trashed = note("c", "Trashed");
        trashed.is_trashed = true;
        let notes = vec![note("a", "Home"), archived, trashed];

        let mut seen = HashSet::new();
        for section in [Section::Home, Section::Archive, Section::Trash] {
            let view = ViewState::new(section, SortBy::Date);
            let visible = project(&notes, &view);
            assert_eq!(visible.len(), 1);
            for note in visible {
                assert!(section.contains(note));
                assert!(seen.insert(note.id.clone()), "note in two sections");
            }
        }
    }

    #[test]
    fn output_is_a_subsequence_of_input() {
        let notes: Vec<Note> = (0..6)
            .map(|i| aged(note(&i.to_string(), &format!("Note {i}")), i))
            .collect();
        let view = ViewState::new(Section::Home, SortBy::Date).with_search("note");
        let visible = project(&notes, &view);
        assert_eq!(visible.len(), notes.len());
        for shown in &visible {
            assert!(notes.iter().any(|n| std::ptr::eq(n, *shown)));
        }
    }

    #[test]
    fn empty_input_projects_to_empty() {
        assert!(project(&[], &ViewState::default()).is_empty());
    }

    #[test]
    fn counts_sections_and_home_categories() {
        let mut work = note("a", "A");
        work.category = "Work".into();
        let mut archived_work = note("b", "B");
        archived_work.category = "Work".into();
        archived_work.is_archived = true;
        let mut trashed = note("c", "C");
        trashed.is_trashed = true;
        let notes = vec![work, archived_work, trashed];

        assert_eq!(
            SectionCounts::of(&notes),
            SectionCounts {
                home: 1,
                archive: 1,
                trash: 1
            }
        );
        let counts = category_counts(&notes, ["Personal", "Work"]);
        assert_eq!(counts.get("Work"), Some(&1));
        assert_eq!(counts.get("Personal"), Some(&0));
    }
}
