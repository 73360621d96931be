//! Title search over bucketed sections

use crate::bucketing::Section;

/// Case-insensitive substring match against a story title.
///
/// An empty query matches everything.
pub fn title_matches(title: &str, query: &str) -> bool {
    query.is_empty() || title.to_lowercase().contains(&query.to_lowercase())
}

/// Filter sections down to stories whose title contains `query`.
///
/// Only titles are searched, never the body text. Sections left empty by the
/// filter are dropped; an empty query returns the sections unchanged.
pub fn filter_sections(sections: &[Section], query: &str) -> Vec<Section> {
    if query.is_empty() {
        return sections.to_vec();
    }

    sections
        .iter()
        .filter_map(|section| {
            let records: Vec<_> = section
                .records
                .iter()
                .filter(|record| title_matches(&record.title, query))
                .cloned()
                .collect();
            (!records.is_empty()).then(|| Section {
                records,
                ..section.clone()
            })
        })
        .collect()
}
