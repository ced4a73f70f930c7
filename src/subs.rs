// ===============================
// src/subs.rs
// ===============================
//
// Registry of channel subscriptions. A subscribe request is appended
// unconfirmed; the venue's ack binds the channel id. Data frames are
// dispatched by channel id.

use std::collections::HashSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubEntry {
    pub channel: String,
    pub symbol: String,
    pub chan_id: Option<i64>,
    pub confirmed: bool,
}

#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
    entries: Vec<SubEntry>,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, channel: &str, symbol: &str) {
        self.entries.push(SubEntry {
            channel: channel.to_string(),
            symbol: symbol.to_string(),
            chan_id: None,
            confirmed: false,
        });
    }

    /// Bind a venue channel id to exactly one matching unconfirmed request.
    /// An ack with no matching request is ignored.
    pub fn confirm(&mut self, channel: &str, symbol: &str, chan_id: i64) -> bool {
        if let Some(e) = self
            .entries
            .iter_mut()
            .find(|e| !e.confirmed && e.channel == channel && e.symbol == symbol)
        {
            e.chan_id = Some(chan_id);
            e.confirmed = true;
            true
        } else {
            false
        }
    }

    pub fn remove(&mut self, chan_id: i64) {
        self.entries.retain(|e| e.chan_id != Some(chan_id));
    }

    pub fn dispatch(&self, chan_id: i64) -> Option<&SubEntry> {
        self.entries
            .iter()
            .find(|e| e.confirmed && e.chan_id == Some(chan_id))
    }

    /// True iff the confirmed book subscriptions cover exactly the required
    /// symbol set.
    pub fn all_books_ready(&self, required: &[String]) -> bool {
        let confirmed: HashSet<&str> = self
            .entries
            .iter()
            .filter(|e| e.confirmed && e.channel == "book")
            .map(|e| e.symbol.as_str())
            .collect();
        let required: HashSet<&str> = required.iter().map(|s| s.as_str()).collect();
        confirmed == required
    }

    pub fn confirmed_chan_ids(&self) -> Vec<i64> {
        self.entries.iter().filter_map(|e| e.chan_id).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
