//! CSV row normalization: header keys are lowercased and trimmed, values
//! trimmed, missing fields coerced to empty strings. Runs before
//! validation so rule checks never see stray whitespace or header-case
//! mismatches. Unrecognized columns are ignored.

use chrono::Utc;
use uuid::Uuid;

use crate::db::{Participant, RoomKind};

/// One participant candidate, pre-validation. Empty string means absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRow {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub org: String,
    pub photo_url: String,
    pub desc: String,
}

impl RawRow {
    pub fn trimmed(self) -> Self {
        Self {
            name: self.name.trim().to_owned(),
            email: self.email.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
            org: self.org.trim().to_owned(),
            photo_url: self.photo_url.trim().to_owned(),
            desc: self.desc.trim().to_owned(),
        }
    }

    /// Converts an accepted row into its stored shape: uuid assigned,
    /// email dropped for public rooms and lowercased otherwise, empty
    /// optionals become NULL.
    pub fn into_participant(self, room_id: Uuid, kind: RoomKind) -> Participant {
        Participant {
            uuid: Uuid::now_v7(),
            room_id,
            name: self.name,
            email: if kind.is_public() { None } else { Some(self.email.to_lowercase()) },
            phone: none_if_empty(self.phone),
            org: none_if_empty(self.org),
            photo_url: none_if_empty(self.photo_url),
            description: none_if_empty(self.desc),
            created_at: Utc::now(),
        }
    }
}

fn none_if_empty(value: String) -> Option<String> {
    if value.is_empty() { None } else { Some(value) }
}

pub fn normalize_headers(headers: &csv::StringRecord) -> Vec<String> {
    headers.iter().map(|h| h.trim().to_lowercase()).collect()
}

pub fn row_from_record(headers: &[String], record: &csv::StringRecord) -> RawRow {
    let mut row = RawRow::default();
    for (header, value) in headers.iter().zip(record.iter()) {
        let value = value.trim();
        match header.as_str() {
            "name" => row.name = value.to_owned(),
            "email" => row.email = value.to_owned(),
            "phone" => row.phone = value.to_owned(),
            "org" => row.org = value.to_owned(),
            "photourl" => row.photo_url = value.to_owned(),
            "desc" => row.desc = value.to_owned(),
            _ => {}
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(fields: &[&str]) -> csv::StringRecord {
        csv::StringRecord::from(fields.to_vec())
    }

    #[test]
    fn headers_are_lowercased_and_trimmed() {
        let headers = normalize_headers(&record(&[" Name", "EMAIL ", " PhotoURL "]));
        assert_eq!(headers, vec!["name", "email", "photourl"]);
    }

    #[test]
    fn values_are_trimmed_and_unknown_columns_ignored() {
        let headers = normalize_headers(&record(&["name", "badge", "email"]));
        let row = row_from_record(&headers, &record(&["  Alice Smith ", "17", " A@X.com "]));
        assert_eq!(
            row,
            RawRow {
                name: "Alice Smith".to_owned(),
                email: "A@X.com".to_owned(),
                ..RawRow::default()
            }
        );
    }

    #[test]
    fn short_records_leave_missing_fields_empty() {
        let headers = normalize_headers(&record(&["name", "email", "phone"]));
        let row = row_from_record(&headers, &record(&["Bob"]));
        assert_eq!(row.name, "Bob");
        assert_eq!(row.email, "");
        assert_eq!(row.phone, "");
    }

    #[test]
    fn public_room_participant_drops_email() {
        let room = Uuid::now_v7();
        let row = RawRow {
            name: "Alice".to_owned(),
            email: "KEPT@NOWHERE.COM".to_owned(),
            org: "Justice Minds".to_owned(),
            ..RawRow::default()
        };
        let p = row.into_participant(room, RoomKind::Public);
        assert_eq!(p.email, None);
        assert_eq!(p.org.as_deref(), Some("Justice Minds"));
        assert_eq!(p.phone, None);
    }

    #[test]
    fn private_room_participant_lowercases_email() {
        let row = RawRow {
            name: "Alice".to_owned(),
            email: "A@X.com".to_owned(),
            ..RawRow::default()
        };
        let p = row.into_participant(Uuid::now_v7(), RoomKind::Normal);
        assert_eq!(p.email.as_deref(), Some("a@x.com"));
    }
}
