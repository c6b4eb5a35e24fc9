//! Per-connection handler: join request, event routing and update pump.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive a `JoinRequest` and enter a room
//!   2. Spawn a writer draining the player's `StateUpdate` channel
//!   3. Loop: decode `ClientEvent` frames and submit them to the room
//!   4. On close, tell the room the player left

use std::sync::Arc;

use tokio::sync::mpsc;
use trivium_protocol::{
    ClientEvent, Codec, JoinRequest, JsonCodec, PlayerId, PlayerIdentity, ProtocolError,
    RoomId, ServerMessage, StateUpdate,
};
use trivium_room::{Room, RoomError, RoomManager, UpdateSender};

use crate::TriviumError;
use crate::server::ServerState;
use crate::transport::WebSocketConnection;

/// Handles a single connection from the join request to close.
pub(crate) async fn handle_connection(
    conn: WebSocketConnection,
    state: Arc<ServerState>,
) -> Result<(), TriviumError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();

    let request = read_join_request(&conn, &state).await?;
    let player = request.player_id.clone();
    let identity = PlayerIdentity {
        id: request.player_id,
        pseudo: request.pseudo,
    };

    let (updates_tx, updates_rx): (UpdateSender, _) = mpsc::unbounded_channel();
    // The room owns the only strong sender: once it drops it (leave or
    // replaced by a newer socket), this connection no longer speaks for
    // the player.
    let registered = updates_tx.downgrade();

    let room = match enter_room(&state, request.room_id, identity, updates_tx).await {
        Ok(room) => room,
        Err(e) => {
            send_error(&conn, &state.codec, error_code(&e), &e.to_string()).await?;
            return Err(e.into());
        }
    };
    tracing::info!(%conn_id, %player, room_id = %room.id(), "player entered room");

    let mut writer = tokio::spawn(pump_updates(Arc::clone(&conn), updates_rx, state.codec));

    let result = tokio::select! {
        result = read_events(&conn, &state, &room, &player) => result,
        _ = &mut writer => {
            tracing::debug!(%conn_id, %player, "update stream closed");
            Ok(())
        }
    };

    if registered.upgrade().is_some() {
        if let Err(e) = room.leave(player) {
            tracing::debug!(%conn_id, error = %e, "leave not delivered");
        }
    }
    writer.abort();
    let _ = conn.close().await;
    result
}

/// Reads the first frame, which must be a [`JoinRequest`].
async fn read_join_request(
    conn: &WebSocketConnection,
    state: &ServerState,
) -> Result<JoinRequest, TriviumError> {
    let data = match tokio::time::timeout(state.join_timeout, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before join request".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(ProtocolError::InvalidMessage("join request timed out".into()).into());
        }
    };

    match state.codec.decode::<JoinRequest>(&data) {
        Ok(request) => Ok(request),
        Err(e) => {
            send_error(conn, &state.codec, 400, "expected join request").await?;
            Err(e.into())
        }
    }
}

/// Joins the requested room, creating it on first use, or lets the
/// manager pick one.
async fn enter_room(
    state: &ServerState,
    room_id: Option<RoomId>,
    identity: PlayerIdentity,
    updates: UpdateSender,
) -> Result<Arc<Room>, RoomError> {
    match room_id {
        Some(room_id) => {
            RoomManager::join_room(&state.rooms, room_id, identity, Box::new(updates)).await
        }
        None => RoomManager::join_or_create(&state.rooms, identity, updates).await,
    }
}

/// Forwards every update of the room to the socket.
async fn pump_updates(
    conn: Arc<WebSocketConnection>,
    mut updates: mpsc::UnboundedReceiver<StateUpdate>,
    codec: JsonCodec,
) {
    while let Some(update) = updates.recv().await {
        let bytes = match codec.encode(&ServerMessage::Update(update)) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(conn_id = %conn.id(), error = %e, "update not encoded");
                continue;
            }
        };
        if let Err(e) = conn.send(&bytes).await {
            tracing::debug!(conn_id = %conn.id(), error = %e, "update not sent");
            break;
        }
    }
}

/// Submits client events until the socket closes or goes idle.
async fn read_events(
    conn: &WebSocketConnection,
    state: &ServerState,
    room: &Room,
    player: &PlayerId,
) -> Result<(), TriviumError> {
    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(data))) => data,
            Ok(Ok(None)) => {
                tracing::info!(%player, "connection closed cleanly");
                return Ok(());
            }
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                tracing::info!(%player, "connection timed out");
                return Ok(());
            }
        };

        match state.codec.decode::<ClientEvent>(&data) {
            Ok(event) => {
                if let Err(e) = room.submit_event(player.clone(), event) {
                    tracing::info!(%player, error = %e, "room closed, dropping connection");
                    return Ok(());
                }
            }
            Err(e) => {
                tracing::debug!(%player, error = %e, "failed to decode client event");
                send_error(conn, &state.codec, 400, &format!("invalid event: {e}")).await?;
            }
        }
    }
}

fn error_code(err: &RoomError) -> u16 {
    match err {
        RoomError::NotFound(_) => 404,
        RoomError::GameStarted(_) | RoomError::Full(_) | RoomError::AlreadyExists(_) => 409,
        _ => 400,
    }
}

/// Sends a [`ServerMessage::Error`] frame to the client.
async fn send_error(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    code: u16,
    message: &str,
) -> Result<(), TriviumError> {
    let frame = ServerMessage::Error {
        code,
        message: message.to_string(),
    };
    let bytes = codec.encode(&frame)?;
    conn.send(&bytes).await?;
    Ok(())
}
