//! Episode catalog: the archived broadcasts listed by the station site.
//!
//! The site serves a Next.js data document.  Episodes sit under
//! `pageProps.programData.itemsByDate[].items[]`; each item carries
//! `itemTitle`, `itemDate` and `item_stream_url`.  Missing pieces fall back to
//! placeholders so one malformed item never sinks the whole list.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Title used when an item has no `itemTitle`.
pub const UNTITLED: &str = "Untitled";

/// One archived broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Episode {
    pub title: String,
    /// Display/sort key as published by the site.  Not parsed.
    pub date: String,
    /// Opaque stream URL.  Empty when the site omitted it.
    pub url: String,
}

impl Episode {
    /// True when the entry carries a stream URL that can be played or saved.
    pub fn is_playable(&self) -> bool {
        !self.url.trim().is_empty()
    }

    /// "date title" label used for the now-playing line.
    pub fn display_title(&self) -> String {
        if self.date.is_empty() {
            self.title.clone()
        } else {
            format!("{} {}", self.date, self.title)
        }
    }
}

/// Extract episodes from a catalog document, in document order.
pub fn parse_catalog(doc: &Value) -> Vec<Episode> {
    let groups = doc
        .get("pageProps")
        .and_then(|p| p.get("programData"))
        .and_then(|p| p.get("itemsByDate"))
        .and_then(|g| g.as_array());

    let Some(groups) = groups else {
        return Vec::new();
    };

    groups
        .iter()
        .filter_map(|group| group.get("items").and_then(|i| i.as_array()))
        .flatten()
        .map(parse_item)
        .collect()
}

fn parse_item(item: &Value) -> Episode {
    let text = |key: &str| item.get(key).and_then(|v| v.as_str()).map(str::to_string);
    Episode {
        title: text("itemTitle").unwrap_or_else(|| UNTITLED.to_string()),
        date: text("itemDate").unwrap_or_default(),
        url: text("item_stream_url").unwrap_or_default(),
    }
}
