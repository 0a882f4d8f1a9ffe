//! Section-number → section-heading lookup built once per comparison run.
//!
//! Handed to the verifier as a read-only contextual hint so it can tell
//! which article an election or provision belongs to without relying on
//! its (vendor-specific) numbering.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::item::Item;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SectionHierarchy(BTreeMap<String, String>);

impl SectionHierarchy {
    /// Build from every item of both documents. The first heading seen for a
    /// section number is kept, so passing source items first keeps source
    /// headings intact when numbering collides across documents.
    pub fn build<'a>(items: impl IntoIterator<Item = &'a Item>) -> Self {
        let mut map = BTreeMap::new();
        for item in items {
            let number = item.section_number().trim();
            if number.is_empty() {
                continue;
            }
            if let Some(heading) = item.section_context()
                && !heading.trim().is_empty()
            {
                map.entry(number.to_string())
                    .or_insert_with(|| heading.trim().to_string());
            }
        }
        Self(map)
    }

    pub fn get(&self, section_number: &str) -> Option<&str> {
        self.0.get(section_number).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
