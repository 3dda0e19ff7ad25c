use std::collections::HashSet;

use crate::PluginRecord;

/// Plugin pages already collected, loaded once before a crawl starts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeenPages {
    pages: HashSet<String>,
}

impl SeenPages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a PluginRecord>) -> Self {
        Self {
            pages: records
                .into_iter()
                .map(|record| record.plugin_page.clone())
                .collect(),
        }
    }

    pub fn contains(&self, plugin_page: &str) -> bool {
        self.pages.contains(plugin_page)
    }

    /// Returns `false` when the page was already known.
    pub fn insert(&mut self, plugin_page: impl Into<String>) -> bool {
        self.pages.insert(plugin_page.into())
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}
