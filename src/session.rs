//! Session keys and the explicit identity value handed to core
//! operations. Core logic never reads the session itself; handlers
//! resolve an `Identity` once and pass it down.

use tower_sessions::Session;

use crate::db::{Participant, RoomKind};

pub const PARTY_EMAIL: &str = "party_email";
pub const PARTY_NAME: &str = "party_name";
pub const IS_ADMIN: &str = "is_admin";
pub const RETURN_URL: &str = "return_url";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Identity {
    pub email: Option<String>,
    pub name: Option<String>,
    pub admin: bool,
}

impl Identity {
    pub async fn from_session(session: &Session) -> Result<Self, tower_sessions::session::Error> {
        Ok(Self {
            email: session.get::<String>(PARTY_EMAIL).await?,
            name: session.get::<String>(PARTY_NAME).await?,
            admin: session.get::<bool>(IS_ADMIN).await?.unwrap_or(false),
        })
    }

    pub fn is_known(&self) -> bool {
        self.email.is_some() || self.name.is_some()
    }

    /// The caller's own participant row in a room, if any: matched by
    /// name in public rooms, by email otherwise.
    pub fn find_own<'a>(
        &self,
        kind: RoomKind,
        participants: &'a [Participant],
    ) -> Option<&'a Participant> {
        if kind.is_public() {
            let name = self.name.as_deref()?;
            participants.iter().find(|p| p.name == name)
        } else {
            let email = self.email.as_deref()?.to_lowercase();
            participants
                .iter()
                .find(|p| p.email.as_deref() == Some(email.as_str()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn participant(name: &str, email: Option<&str>) -> Participant {
        Participant {
            uuid: Uuid::now_v7(),
            room_id: Uuid::now_v7(),
            name: name.to_owned(),
            email: email.map(str::to_owned),
            phone: None,
            org: None,
            photo_url: None,
            description: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn public_rooms_match_by_name() {
        let identity = Identity {
            name: Some("Alice".to_owned()),
            ..Identity::default()
        };
        let list = vec![participant("Bob", None), participant("Alice", None)];
        assert_eq!(
            identity.find_own(RoomKind::Public, &list).map(|p| p.name.as_str()),
            Some("Alice")
        );
        assert!(identity.find_own(RoomKind::Normal, &list).is_none());
    }

    #[test]
    fn private_rooms_match_by_email_case_insensitively() {
        let identity = Identity {
            email: Some("Alice@X.com".to_owned()),
            name: Some("Impostor".to_owned()),
            ..Identity::default()
        };
        let list = vec![participant("Alice", Some("alice@x.com"))];
        assert!(identity.find_own(RoomKind::Normal, &list).is_some());
    }
}
