//! Field validation rules, applied in a fixed order; the first violated
//! rule short-circuits the rest for that row. Reason strings are shown to
//! the operator verbatim, so they stay human-readable.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

use crate::db::{ProfilePatch, RoomKind};

use super::normalize::RawRow;

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s-]{2,}$").expect("name pattern"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s()+.\-]{10,}$").expect("phone pattern"));

const ORG_MAX: usize = 100;
const DESC_MAX: usize = 500;

/// Validates a normalized candidate row. `Ok(())` means acceptable;
/// `Err` carries the first violated rule's reason.
pub fn validate_row(row: &RawRow, kind: RoomKind) -> Result<(), String> {
    let mut missing = Vec::new();
    if row.name.is_empty() {
        missing.push("name");
    }
    if !kind.is_public() && row.email.is_empty() {
        missing.push("email");
    }
    if !missing.is_empty() {
        return Err(format!("Missing required fields: {}", missing.join(", ")));
    }

    if !NAME_RE.is_match(&row.name) {
        return Err(
            "Name must be at least 2 characters and contain only letters, spaces, and hyphens"
                .to_owned(),
        );
    }

    // Email is only authoritative outside public rooms; public rooms key
    // participants by name and ignore the column entirely.
    if !kind.is_public() && !EMAIL_RE.is_match(&row.email) {
        return Err("Invalid email format".to_owned());
    }

    if !row.phone.is_empty() && !PHONE_RE.is_match(&row.phone) {
        return Err("Invalid phone number format".to_owned());
    }

    if !row.photo_url.is_empty() && Url::parse(&row.photo_url).is_err() {
        return Err("Invalid photo URL format".to_owned());
    }

    if row.org.chars().count() > ORG_MAX {
        return Err(format!(
            "Organization name is too long. Maximum {ORG_MAX} characters allowed."
        ));
    }
    if row.desc.chars().count() > DESC_MAX {
        return Err(format!(
            "Description is too long. Maximum {DESC_MAX} characters allowed."
        ));
    }

    Ok(())
}

/// Validates a profile self-edit. Unlike row validation this collects
/// every violation, joined with newlines, since the edit form shows them
/// all at once.
pub fn validate_patch(patch: &ProfilePatch) -> Result<(), String> {
    let mut errors = Vec::new();

    let phone = patch.phone.trim();
    if !phone.is_empty() && !PHONE_RE.is_match(phone) {
        errors.push(
            "Invalid phone number format. Please enter at least 10 digits with optional \
             spaces, brackets, plus, dots, or hyphens."
                .to_owned(),
        );
    }

    let photo_url = patch.photo_url.trim();
    if !photo_url.is_empty() && Url::parse(photo_url).is_err() {
        errors.push(
            "Invalid photo URL format. Please enter a valid URL starting with http:// or https://"
                .to_owned(),
        );
    }

    if patch.org.trim().chars().count() > ORG_MAX {
        errors.push(format!(
            "Organization name is too long. Maximum {ORG_MAX} characters allowed."
        ));
    }
    if patch.description.trim().chars().count() > DESC_MAX {
        errors.push(format!(
            "Description is too long. Maximum {DESC_MAX} characters allowed."
        ));
    }

    if errors.is_empty() { Ok(()) } else { Err(errors.join("\n")) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_private() -> RawRow {
        RawRow {
            name: "Alice Smith".to_owned(),
            email: "alice@example.com".to_owned(),
            ..RawRow::default()
        }
    }

    #[test]
    fn accepts_a_fully_valid_row() {
        assert_eq!(validate_row(&valid_private(), RoomKind::Normal), Ok(()));
    }

    #[test]
    fn name_boundary_two_letters_pass_one_fails() {
        let mut row = valid_private();
        row.name = "Al".to_owned();
        assert!(validate_row(&row, RoomKind::Normal).is_ok());

        row.name = "A".to_owned();
        let err = validate_row(&row, RoomKind::Normal).unwrap_err();
        assert!(err.starts_with("Name must be"));
    }

    #[test]
    fn name_rejects_digits_and_punctuation() {
        let mut row = valid_private();
        row.name = "Alice2".to_owned();
        assert!(validate_row(&row, RoomKind::Normal).is_err());
        row.name = "Anne-Marie Smith".to_owned();
        assert!(validate_row(&row, RoomKind::Normal).is_ok());
    }

    #[test]
    fn missing_required_fields_are_listed_first() {
        let row = RawRow::default();
        assert_eq!(
            validate_row(&row, RoomKind::Normal).unwrap_err(),
            "Missing required fields: name, email"
        );
        assert_eq!(
            validate_row(&row, RoomKind::Public).unwrap_err(),
            "Missing required fields: name"
        );
    }

    #[test]
    fn name_rule_fires_before_email_rule() {
        let row = RawRow {
            name: "A".to_owned(),
            email: "not-an-email".to_owned(),
            ..RawRow::default()
        };
        let err = validate_row(&row, RoomKind::Normal).unwrap_err();
        assert!(err.starts_with("Name must be"), "got: {err}");
    }

    #[test]
    fn email_shape_is_enforced_in_private_rooms_only() {
        let mut row = valid_private();
        row.email = "not-an-email".to_owned();
        assert_eq!(
            validate_row(&row, RoomKind::Normal).unwrap_err(),
            "Invalid email format"
        );
        // same row passes in a public room, where email is ignored
        assert!(validate_row(&row, RoomKind::Public).is_ok());
    }

    #[test]
    fn phone_needs_ten_chars_from_the_allowed_set() {
        let mut row = valid_private();
        row.phone = "+44 7714 303099".to_owned();
        assert!(validate_row(&row, RoomKind::Normal).is_ok());

        row.phone = "12345".to_owned();
        assert_eq!(
            validate_row(&row, RoomKind::Normal).unwrap_err(),
            "Invalid phone number format"
        );

        row.phone = "12345abcde".to_owned();
        assert!(validate_row(&row, RoomKind::Normal).is_err());
    }

    #[test]
    fn photo_url_must_be_absolute() {
        let mut row = valid_private();
        row.photo_url = "https://example.com/a.jpg".to_owned();
        assert!(validate_row(&row, RoomKind::Normal).is_ok());

        row.photo_url = "not a url".to_owned();
        assert_eq!(
            validate_row(&row, RoomKind::Normal).unwrap_err(),
            "Invalid photo URL format"
        );
    }

    #[test]
    fn description_boundary_500_passes_501_fails() {
        let mut row = valid_private();
        row.desc = "d".repeat(500);
        assert!(validate_row(&row, RoomKind::Normal).is_ok());

        row.desc = "d".repeat(501);
        assert!(validate_row(&row, RoomKind::Normal).is_err());
    }

    #[test]
    fn organization_boundary_100_passes_101_fails() {
        let mut row = valid_private();
        row.org = "o".repeat(100);
        assert!(validate_row(&row, RoomKind::Normal).is_ok());

        row.org = "o".repeat(101);
        assert!(validate_row(&row, RoomKind::Normal).is_err());
    }

    #[test]
    fn patch_collects_every_violation() {
        let patch = ProfilePatch {
            org: "o".repeat(101),
            phone: "123".to_owned(),
            description: String::new(),
            photo_url: "nope".to_owned(),
        };
        let err = validate_patch(&patch).unwrap_err();
        assert_eq!(err.lines().count(), 3);
    }

    #[test]
    fn empty_patch_is_valid() {
        assert_eq!(validate_patch(&ProfilePatch::default()), Ok(()));
    }
}
