//! In-memory duplicate tracking for one ingestion run.
//!
//! Public rooms key participants by name; private rooms by email, with
//! name also unique per the room invariant. The index is owned by a
//! single `add_bulk` invocation and discarded at completion; it is the
//! first tier of the two-tier check, the second being a store existence
//! query (see `ingest::check_existing`).

use std::collections::HashSet;

use crate::db::RoomKind;

use super::normalize::RawRow;

/// The room-scoped unique key for one candidate participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupKey {
    Name(String),
    Email(String),
}

impl DedupKey {
    /// The authoritative key for the room kind. Emails compare lowercased.
    pub fn for_row(row: &RawRow, kind: RoomKind) -> Self {
        if kind.is_public() {
            Self::Name(row.name.clone())
        } else {
            Self::Email(row.email.to_lowercase())
        }
    }

    pub fn field(&self) -> &'static str {
        match self {
            Self::Name(_) => "name",
            Self::Email(_) => "email",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Name(v) | Self::Email(v) => v,
        }
    }
}

#[derive(Debug, Default)]
pub struct DedupIndex {
    seen_names: HashSet<String>,
    seen_emails: HashSet<String>,
}

impl DedupIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the field an earlier in-batch row already claimed, if any.
    pub fn duplicate_field(&self, row: &RawRow, kind: RoomKind) -> Option<&'static str> {
        if kind.is_public() {
            return self.seen_names.contains(&row.name).then_some("name");
        }
        if self.seen_emails.contains(&row.email.to_lowercase()) {
            Some("email")
        } else if self.seen_names.contains(&row.name) {
            Some("name")
        } else {
            None
        }
    }

    pub fn record(&mut self, row: &RawRow, kind: RoomKind) {
        self.seen_names.insert(row.name.clone());
        if !kind.is_public() {
            self.seen_emails.insert(row.email.to_lowercase());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(name: &str, email: &str) -> RawRow {
        RawRow {
            name: name.to_owned(),
            email: email.to_owned(),
            ..RawRow::default()
        }
    }

    #[test]
    fn public_rooms_track_names_only() {
        let mut index = DedupIndex::new();
        let alice = row("Alice", "a@x.com");
        index.record(&alice, RoomKind::Public);

        assert_eq!(index.duplicate_field(&alice, RoomKind::Public), Some("name"));
        // same email, different name: not a duplicate in a public room
        let other = row("Bob", "a@x.com");
        assert_eq!(index.duplicate_field(&other, RoomKind::Public), None);
    }

    #[test]
    fn private_rooms_track_both_email_and_name() {
        let mut index = DedupIndex::new();
        index.record(&row("Alice", "a@x.com"), RoomKind::Normal);

        assert_eq!(
            index.duplicate_field(&row("Bob", "a@x.com"), RoomKind::Normal),
            Some("email")
        );
        assert_eq!(
            index.duplicate_field(&row("Alice", "a2@x.com"), RoomKind::Normal),
            Some("name")
        );
        assert_eq!(
            index.duplicate_field(&row("Bob", "b@x.com"), RoomKind::Normal),
            None
        );
    }

    #[test]
    fn email_comparison_is_case_insensitive() {
        let mut index = DedupIndex::new();
        index.record(&row("Alice", "A@X.com"), RoomKind::Normal);
        assert_eq!(
            index.duplicate_field(&row("Bob", "a@x.COM"), RoomKind::Normal),
            Some("email")
        );
    }
}
