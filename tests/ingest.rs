//! End-to-end pipeline tests against an in-memory store, covering the
//! single-add path, CSV bulk import, batching, and the reply round trip.

use std::sync::Mutex;

use async_trait::async_trait;
use caseroom::db::{Message, MessageStatus, Participant, ProfilePatch, RoomKind};
use caseroom::error::{AddError, ImportError, StoreError};
use caseroom::ingest::dedup::DedupKey;
use caseroom::ingest::normalize::RawRow;
use caseroom::ingest::{add_bulk, add_single};
use caseroom::mentions::{compute_unanswered, find_reply, mark_answered};
use caseroom::store::{Store, trimmed_or_null};
use chrono::Utc;
use pretty_assertions::assert_eq;
use uuid::Uuid;

#[derive(Default)]
struct MemStore {
    participants: Mutex<Vec<Participant>>,
    messages: Mutex<Vec<Message>>,
}

impl MemStore {
    /// Mirrors the unique indexes on (room_id, name) and (room_id, email).
    fn conflict(
        existing: &[Participant],
        candidate: &Participant,
    ) -> Option<&'static str> {
        for p in existing.iter().filter(|p| p.room_id == candidate.room_id) {
            if candidate.email.is_some() && p.email == candidate.email {
                return Some("email");
            }
            if p.name == candidate.name {
                return Some("name");
            }
        }
        None
    }
}

#[async_trait]
impl Store for MemStore {
    async fn participant_exists(&self, room_id: Uuid, key: &DedupKey) -> Result<bool, StoreError> {
        let participants = self.participants.lock().unwrap();
        Ok(participants.iter().any(|p| {
            p.room_id == room_id
                && match key {
                    DedupKey::Name(name) => &p.name == name,
                    DedupKey::Email(email) => p.email.as_deref() == Some(email),
                }
        }))
    }

    async fn insert_participant(&self, participant: &Participant) -> Result<(), StoreError> {
        let mut participants = self.participants.lock().unwrap();
        if let Some(field) = Self::conflict(&participants, participant) {
            return Err(StoreError::Duplicate { field });
        }
        participants.push(participant.clone());
        Ok(())
    }

    async fn insert_participants(&self, batch: &[Participant]) -> Result<(), StoreError> {
        let mut participants = self.participants.lock().unwrap();
        for participant in batch {
            if let Some(field) = Self::conflict(&participants, participant) {
                return Err(StoreError::Duplicate { field });
            }
        }
        participants.extend_from_slice(batch);
        Ok(())
    }

    async fn update_participant(
        &self,
        room_id: Uuid,
        key: &DedupKey,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError> {
        let mut participants = self.participants.lock().unwrap();
        let found = participants.iter_mut().find(|p| {
            p.room_id == room_id
                && match key {
                    DedupKey::Name(name) => &p.name == name,
                    DedupKey::Email(email) => p.email.as_deref() == Some(email),
                }
        });
        let Some(p) = found else {
            return Err(StoreError::NotFound("participant"));
        };
        p.org = trimmed_or_null(&patch.org).map(str::to_owned);
        p.phone = trimmed_or_null(&patch.phone).map(str::to_owned);
        p.description = trimmed_or_null(&patch.description).map(str::to_owned);
        p.photo_url = trimmed_or_null(&patch.photo_url).map(str::to_owned);
        Ok(())
    }

    async fn list_participants(&self, room_id: Uuid) -> Result<Vec<Participant>, StoreError> {
        let participants = self.participants.lock().unwrap();
        Ok(participants
            .iter()
            .filter(|p| p.room_id == room_id)
            .cloned()
            .collect())
    }

    async fn list_messages(&self, room_id: Uuid) -> Result<Vec<Message>, StoreError> {
        let participants = self.participants.lock().unwrap();
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .filter(|m| m.room_id == room_id)
            .map(|m| {
                let author = participants
                    .iter()
                    .find(|p| p.uuid == m.participant_id)
                    .map(|p| p.name.clone())
                    .unwrap_or_else(|| "Unknown".to_owned());
                Message { author_name: author, ..m.clone() }
            })
            .collect())
    }

    async fn insert_message(&self, message: &Message) -> Result<(), StoreError> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }

    async fn set_message_status(
        &self,
        message_id: Uuid,
        status: MessageStatus,
    ) -> Result<(), StoreError> {
        let mut messages = self.messages.lock().unwrap();
        let Some(m) = messages.iter_mut().find(|m| m.uuid == message_id) else {
            return Err(StoreError::NotFound("message"));
        };
        m.status = Some(status);
        Ok(())
    }
}

fn raw(name: &str, email: &str) -> RawRow {
    RawRow {
        name: name.to_owned(),
        email: email.to_owned(),
        ..RawRow::default()
    }
}

#[tokio::test]
async fn single_add_stores_a_normalized_participant() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let row = RawRow {
        name: "  Alice Smith ".to_owned(),
        email: " Alice@Example.COM ".to_owned(),
        org: "Justice Minds".to_owned(),
        ..RawRow::default()
    };

    let stored = add_single(&store, room, RoomKind::Normal, row).await.unwrap();
    assert_eq!(stored.name, "Alice Smith");
    assert_eq!(stored.email.as_deref(), Some("alice@example.com"));
    assert_eq!(stored.org.as_deref(), Some("Justice Minds"));
    assert_eq!(stored.phone, None);

    let listed = store.list_participants(room).await.unwrap();
    assert_eq!(listed, vec![stored]);
}

#[tokio::test]
async fn single_add_rejects_invalid_rows_before_touching_the_store() {
    let store = MemStore::default();
    let room = Uuid::now_v7();

    let err = add_single(&store, room, RoomKind::Normal, raw("Alice", "nope"))
        .await
        .unwrap_err();
    assert!(matches!(err, AddError::Invalid(ref r) if r == "Invalid email format"));
    assert!(store.list_participants(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn single_add_refuses_a_second_alice_by_name_in_a_private_room() {
    let store = MemStore::default();
    let room = Uuid::now_v7();

    add_single(&store, room, RoomKind::Normal, raw("Alice", "a@x.com"))
        .await
        .unwrap();
    let err = add_single(&store, room, RoomKind::Normal, raw("Alice", "a2@x.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, AddError::Duplicate(ref r) if r == "Name already exists in this room"));

    // the same details are fine in a different room
    let other_room = Uuid::now_v7();
    add_single(&store, other_room, RoomKind::Normal, raw("Alice", "a@x.com"))
        .await
        .unwrap();
}

#[tokio::test]
async fn bulk_import_accepts_a_clean_file_in_full() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let csv = "name,email,phone\n\
               Alice,a@x.com,+44 7714 303099\n\
               Bob,b@x.com,\n\
               Carol,c@x.com,";

    let summary = add_bulk(&store, room, RoomKind::Normal, csv).await.unwrap();
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.added, 3);
    assert_eq!(summary.validation_rejected, 0);
    assert_eq!(summary.duplicate_rejected, 0);
    assert!(summary.rejections.is_empty());

    let names: Vec<_> = store
        .list_participants(room)
        .await
        .unwrap()
        .into_iter()
        .map(|p| p.name)
        .collect();
    assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
}

#[tokio::test]
async fn bulk_import_reports_each_rejection_with_its_file_line() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let csv = "name,email\n\
               Alice,a@x.com\n\
               Bob,not-an-email\n\
               Alice,a2@x.com";

    let summary = add_bulk(&store, room, RoomKind::Normal, csv).await.unwrap();
    assert_eq!(summary.total_rows, 3);
    assert_eq!(summary.added, 1);
    assert_eq!(summary.validation_rejected, 1);
    assert_eq!(summary.duplicate_rejected, 1);
    assert_eq!(
        summary.rejections,
        vec![
            "Row 3: Invalid email format",
            "Row 4: Duplicate name in file",
        ]
    );

    let listed = store.list_participants(room).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].email.as_deref(), Some("a@x.com"));
}

#[tokio::test]
async fn bulk_import_skips_rows_already_in_the_store() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    add_single(&store, room, RoomKind::Normal, raw("Alice", "a@x.com"))
        .await
        .unwrap();

    let csv = "name,email\nNot Alice,A@X.com\nBob,b@x.com";
    let summary = add_bulk(&store, room, RoomKind::Normal, csv).await.unwrap();
    assert_eq!(summary.added, 1);
    assert_eq!(summary.duplicate_rejected, 1);
    assert_eq!(
        summary.rejections,
        vec!["Row 2: Email already exists in this room"]
    );
}

#[tokio::test]
async fn public_rooms_import_by_name_and_never_store_emails() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let csv = "name,email\n\
               Alice,shared@x.com\n\
               Bob,shared@x.com\n\
               Alice,other@x.com";

    let summary = add_bulk(&store, room, RoomKind::Public, csv).await.unwrap();
    assert_eq!(summary.added, 2);
    assert_eq!(summary.duplicate_rejected, 1);
    assert_eq!(summary.rejections, vec!["Row 4: Duplicate name in file"]);

    for p in store.list_participants(room).await.unwrap() {
        assert_eq!(p.email, None);
    }
}

#[tokio::test]
async fn bulk_import_spans_multiple_batches() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let mut csv = String::from("name,email\n");
    for i in 0..120 {
        // letters only: digits would fail the name rule
        let suffix: String = format!("{i:03}")
            .chars()
            .map(|d| (b'a' + (d as u8 - b'0')) as char)
            .collect();
        csv += &format!("Party {suffix},p{i}@x.com\n");
    }

    let summary = add_bulk(&store, room, RoomKind::Normal, &csv).await.unwrap();
    assert_eq!(summary.total_rows, 120);
    assert_eq!(summary.added, 120);
    assert_eq!(store.list_participants(room).await.unwrap().len(), 120);
}

#[tokio::test]
async fn malformed_csv_aborts_without_storing_anything() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let csv = "name,email\nAlice,a@x.com\nBob,b@x.com,one field too many";

    let err = add_bulk(&store, room, RoomKind::Normal, csv).await.unwrap_err();
    assert!(matches!(err, ImportError::Parse(_)));
    assert!(store.list_participants(room).await.unwrap().is_empty());
}

#[tokio::test]
async fn summary_renders_the_operator_report() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let csv = "name,email\nAlice,a@x.com\nBob,nope";

    let summary = add_bulk(&store, room, RoomKind::Normal, csv).await.unwrap();
    let report = summary.to_string();
    assert!(report.starts_with("Upload Summary:\nTotal rows: 2\nSuccessfully added: 1"));
    assert!(report.contains("Rejected rows:\nRow 3: Invalid email format"));
}

#[tokio::test]
async fn blanking_a_profile_field_clears_it() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let row = RawRow {
        name: "Alice".to_owned(),
        email: "a@x.com".to_owned(),
        phone: "+44 7714 303099".to_owned(),
        ..RawRow::default()
    };
    add_single(&store, room, RoomKind::Normal, row).await.unwrap();

    let patch = ProfilePatch {
        org: "Acme".to_owned(),
        phone: "  ".to_owned(),
        ..ProfilePatch::default()
    };
    store
        .update_participant(room, &DedupKey::Email("a@x.com".to_owned()), &patch)
        .await
        .unwrap();

    let listed = store.list_participants(room).await.unwrap();
    assert_eq!(listed[0].org.as_deref(), Some("Acme"));
    assert_eq!(listed[0].phone, None);
    assert_eq!(listed[0].photo_url, None);
}

#[tokio::test]
async fn replying_moves_a_mention_out_of_the_unanswered_queue() {
    let store = MemStore::default();
    let room = Uuid::now_v7();
    let alice = add_single(&store, room, RoomKind::Normal, raw("Alice", "a@x.com"))
        .await
        .unwrap();
    let ben = add_single(&store, room, RoomKind::Normal, raw("Ben", "b@x.com"))
        .await
        .unwrap();

    let original = Message {
        uuid: Uuid::now_v7(),
        room_id: room,
        participant_id: ben.uuid,
        author_name: ben.name.clone(),
        content: "@Alice please confirm".to_owned(),
        status: Some(MessageStatus::Mentioned),
        replies_to: None,
        created_at: Utc::now(),
    };
    store.insert_message(&original).await.unwrap();

    let queue = compute_unanswered(&store.list_messages(room).await.unwrap());
    assert_eq!(queue.len(), 1);
    assert_eq!(queue[0].mentioned_names, vec!["Alice"]);
    assert_eq!(queue[0].author_name, "Ben");

    let reply = Message {
        uuid: Uuid::now_v7(),
        room_id: room,
        participant_id: alice.uuid,
        author_name: alice.name.clone(),
        content: "confirmed".to_owned(),
        status: Some(MessageStatus::Reply),
        replies_to: Some(original.uuid),
        created_at: Utc::now(),
    };
    mark_answered(&store, original.uuid, &reply).await.unwrap();

    let messages = store.list_messages(room).await.unwrap();
    assert!(compute_unanswered(&messages).is_empty());
    let found = find_reply(&messages, original.uuid).unwrap();
    assert_eq!(found.uuid, reply.uuid);
    assert_eq!(found.author_name, "Alice");
    assert_eq!(
        messages.iter().find(|m| m.uuid == original.uuid).unwrap().status,
        Some(MessageStatus::Replied)
    );
}
