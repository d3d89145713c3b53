use std::collections::BTreeMap;

use axum::{
    debug_handler,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use sqlx::SqlitePool;
use tower_sessions::Session;
use uuid::Uuid;

use crate::db::{Message, MessageStatus, Participant};
use crate::mentions::{find_reply, messages_for_participant};
use crate::res::escape;
use crate::rooms;
use crate::session::Identity;
use crate::store::{SqliteStore, Store};
use crate::{AppResult, AppState, include_res};

/// Groups participants by trimmed organization. Empty organizations fall
/// under "Others"; groups sort alphabetically with "Others" last.
pub fn group_by_org(participants: &[Participant]) -> Vec<(String, Vec<&Participant>)> {
    let mut groups: BTreeMap<String, Vec<&Participant>> = BTreeMap::new();
    for participant in participants {
        let org = participant
            .org
            .as_deref()
            .map(str::trim)
            .filter(|org| !org.is_empty())
            .unwrap_or("Others");
        groups.entry(org.to_owned()).or_default().push(participant);
    }

    let mut sorted: Vec<_> = groups.into_iter().collect();
    if let Some(pos) = sorted.iter().position(|(org, _)| org == "Others") {
        let others = sorted.remove(pos);
        sorted.push(others);
    }
    sorted
}

#[debug_handler(state = AppState)]
pub(crate) async fn directory(
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    session: Session,
    Path(room_id): Path<Uuid>,
) -> AppResult<Response> {
    let Some(room) = rooms::fetch(&db_pool, room_id).await? else {
        return Ok((StatusCode::NOT_FOUND, "no such room").into_response());
    };

    let identity = Identity::from_session(&session).await?;
    let participants = store.list_participants(room_id).await?;
    let messages = store.list_messages(room_id).await?;
    let me = identity.find_own(room.kind, &participants);

    let mut groups_html = String::new();
    for (org, members) in group_by_org(&participants) {
        groups_html += &format!(
            "<details><summary>{} ({})</summary>\n",
            escape(&org),
            members.len()
        );
        for member in members {
            groups_html += &render_member(
                room_id,
                member,
                &messages,
                me.is_some_and(|own| own.uuid == member.uuid),
            );
        }
        groups_html += "</details>\n";
    }

    let body = include_res!(str, "/pages/participants.html")
        .replace("{room_id}", &room_id.to_string())
        .replace("{room_name}", &escape(&room.name))
        .replace("{groups}", &groups_html)
        .replace(
            "{admin_tools}",
            &if identity.admin { admin_tools(room_id) } else { String::new() },
        );
    Ok(Html(body).into_response())
}

fn admin_tools(room_id: Uuid) -> String {
    format!(
        r#"<section class="admin-tools">
<h2>Add Participant</h2>
<form method="post" action="/p/{room_id}/add">
  <input name="name" placeholder="Name*">
  <input name="email" placeholder="Email">
  <input name="phone" placeholder="Phone">
  <input name="org" placeholder="Organization">
  <input name="photourl" placeholder="Photo URL">
  <input name="desc" placeholder="Description">
  <button>Add</button>
</form>
<h2>Bulk Add Participants</h2>
<form method="post" action="/p/{room_id}/bulk" enctype="multipart/form-data">
  <input type="file" name="file" accept=".csv">
  <button>Upload &amp; Process</button>
</form>
</section>"#
    )
}

fn render_member(room_id: Uuid, member: &Participant, messages: &[Message], is_me: bool) -> String {
    let mut html = format!("<article><h3>{}</h3>", escape(&member.name));
    if let Some(email) = &member.email {
        html += &format!("<p>Email - {}</p>", escape(email));
    }
    if let Some(phone) = &member.phone {
        html += &format!("<p>Phone - {}</p>", escape(phone));
    }
    if let Some(desc) = &member.description {
        html += &format!("<p>Comment - {}</p>", escape(desc));
    }

    html += "<h4>Mentions</h4>";
    let feed = messages_for_participant(messages, &member.name);
    if feed.is_empty() {
        html += "<p class=\"muted\">No mentions for this user yet.</p>";
    }
    for message in feed {
        let badge = match message.status {
            Some(MessageStatus::Mentioned) => "Pending",
            Some(MessageStatus::Replied) => "Replied",
            _ => continue,
        };
        html += &format!(
            "<div class=\"mention {}\"><span>{}</span><em>Mentioned by: {}</em><b>{badge}</b>",
            badge.to_lowercase(),
            escape(&message.content),
            escape(&message.author_name),
        );
        if message.status == Some(MessageStatus::Replied) {
            if let Some(reply) = find_reply(messages, message.uuid) {
                html += &format!("<blockquote>{}</blockquote>", escape(&reply.content));
            }
        } else if is_me {
            html += &format!(
                "<form method=\"post\" action=\"/m/{room_id}/reply\">\
                 <input type=\"hidden\" name=\"message_id\" value=\"{}\">\
                 <input name=\"content\" placeholder=\"Type your reply here...\">\
                 <button>Send Reply</button></form>",
                message.uuid
            );
        }
        html += "</div>";
    }

    if is_me {
        html += &format!(
            "<form method=\"post\" action=\"/p/{room_id}/edit\">\
             <input name=\"org\" placeholder=\"Organization\" value=\"{}\">\
             <input name=\"phone\" placeholder=\"Phone\" value=\"{}\">\
             <input name=\"photo_url\" placeholder=\"Photo URL\" value=\"{}\">\
             <input name=\"description\" placeholder=\"Description\" value=\"{}\">\
             <button>Save Changes</button></form>",
            escape(member.org.as_deref().unwrap_or_default()),
            escape(member.phone.as_deref().unwrap_or_default()),
            escape(member.photo_url.as_deref().unwrap_or_default()),
            escape(member.description.as_deref().unwrap_or_default()),
        );
    }
    html += "</article>\n";
    html
}
