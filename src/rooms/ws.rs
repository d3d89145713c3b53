use axum::{
    debug_handler,
    extract::{Path, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use sqlx::SqlitePool;
use tokio::sync::broadcast;
use tower_sessions::Session;
use tracing::warn;
use uuid::Uuid;

use crate::session::Identity;
use crate::store::{SqliteStore, Store};
use crate::{AppResult, MessageEvent};

use super::{fetch, msg};

#[debug_handler(state = crate::AppState)]
pub(crate) async fn room_ws(
    Path(room_id): Path<Uuid>,
    State(db_pool): State<SqlitePool>,
    State(store): State<SqliteStore>,
    State(tx): State<broadcast::Sender<MessageEvent>>,
    session: Session,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let Some(room) = fetch(&db_pool, room_id).await? else {
        return Err("no such room".into());
    };
    let identity = Identity::from_session(&session).await?;
    let participants = store.list_participants(room_id).await?;
    let Some(me) = identity.find_own(room.kind, &participants).cloned() else {
        return Err("not a participant of this room".into());
    };

    Ok(ws
        .on_upgrade(move |stream| async move {
            let mut rx = tx.subscribe();
            let (mut sender, mut receiver) = stream.split();

            let broadcast_task = tokio::spawn(async move {
                while let Ok((event_room, html)) = rx.recv().await {
                    if event_room != room_id {
                        continue;
                    }
                    if sender.send(html.into()).await.is_err() {
                        break;
                    }
                }
            });

            while let Some(Ok(frame)) = receiver.next().await {
                let Ok(msg::SendMessageQuery { content }) =
                    serde_json::from_slice(&frame.into_data())
                else {
                    continue;
                };

                if let Err(e) = msg::send_msg(&store, &tx, &me, room_id, content).await {
                    warn!(room = %room_id, error = %e, "dropping message");
                }
            }

            broadcast_task.abort();
        })
        .into_response())
}
