//! Client and server event types.
//!
//! Both directions are closed sum types. `#[serde(tag = "kind")]`
//! produces internally tagged JSON, so a dice click is
//! `{ "kind": "DiceClicked" }` and a move is
//! `{ "kind": "ClientMove", "tile": 5 }`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use trivium_board::Category;

use crate::{GameState, PlayerId, QuestionId, RoomId, Serial};

// ---------------------------------------------------------------------------
// Client → server
// ---------------------------------------------------------------------------

/// An action sent by a player's client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ClientEvent {
    /// Keep-alive. Ignored by the game.
    Ping {
        #[serde(default)]
        info: String,
    },

    /// The current player throws the dice.
    DiceClicked,

    /// The current player moves the pawn to `tile`.
    ClientMove { tile: usize },

    /// An answer to the question on screen. The payload is opaque here;
    /// only the question instance knows how to evaluate it.
    Answer { answer: serde_json::Value },

    /// The player is done reading the results. `mark_question` asks to
    /// keep the question for later review.
    WantNextTurn {
        #[serde(default)]
        mark_question: bool,
    },
}

impl ClientEvent {
    /// Variant name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping { .. } => "Ping",
            Self::DiceClicked => "DiceClicked",
            Self::ClientMove { .. } => "ClientMove",
            Self::Answer { .. } => "Answer",
            Self::WantNextTurn { .. } => "WantNextTurn",
        }
    }
}

// ---------------------------------------------------------------------------
// Server → client
// ---------------------------------------------------------------------------

/// Outcome of one player's answer, as shown on the results screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerResult {
    pub correct: bool,
    /// `true` if the player may flag the question for review: only after
    /// a wrong answer, while their marked list is not full.
    pub offer_review_mark: bool,
}

/// A state change produced by the server. Clients animate these in order,
/// then apply the attached [`GameState`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum ServerEvent {
    /// Sent only to the player who just joined the lobby.
    PlayerJoin { player: Serial },

    /// Someone joined or left the lobby (or left a running game).
    LobbyUpdate {
        player: Serial,
        pseudo: String,
        is_joining: bool,
        player_pseudos: BTreeMap<Serial, String>,
    },

    /// A known player came back.
    PlayerReconnected { player: Serial, pseudo: String },

    GameStart,

    /// A new turn begins.
    PlayerTurn { player: Serial, player_name: String },

    DiceThrown { face: u8 },

    /// Where the current player may move, with the path to each tile.
    PossibleMoves {
        player: Serial,
        player_name: String,
        tiles: Vec<usize>,
        #[serde(deserialize_with = "tile_keys::deserialize")]
        paths: BTreeMap<usize, Vec<usize>>,
    },

    /// The pawn moved along `path` to `tile`.
    Move { tile: usize, path: Vec<usize> },

    QuestionShown {
        id: QuestionId,
        category: Category,
        timeout_seconds: u64,
        body: serde_json::Value,
    },

    AnswerResults {
        category: Category,
        results: BTreeMap<Serial, AnswerResult>,
    },

    /// Players still on the results screen.
    PlayersStillInResult {
        players: Vec<Serial>,
        player_names: Vec<String>,
    },

    /// The turn holder left; the turn goes to `player`.
    PlayerTurnReset { player: Serial, player_name: String },

    GameEnd {
        winners: Vec<Serial>,
        winner_names: Vec<String>,
        /// Questions each player should revisit, `None` when review
        /// lists are disabled.
        review_ids: Option<BTreeMap<Serial, Vec<QuestionId>>>,
    },

    /// The game was stopped by an operator.
    GameTerminated,

    /// Sent only to a client whose action was refused.
    Rejected { reason: String },
}

/// What a connection receives: a batch of events and the state they lead to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    pub events: Vec<ServerEvent>,
    pub state: GameState,
}

// ---------------------------------------------------------------------------
// Socket framing
// ---------------------------------------------------------------------------

/// First frame of a WebSocket client: which room to enter and as whom.
///
/// `room_id: None` asks the server to pick a room still in its lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinRequest {
    #[serde(default)]
    pub room_id: Option<RoomId>,
    pub player_id: PlayerId,
    pub pseudo: String,
}

/// Frames the server writes to a socket.
///
/// `#[serde(tag = "type")]` on a newtype variant flattens the inner
/// struct: `{ "type": "Update", "events": [...], "state": {...} }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    Update(StateUpdate),
    /// `code` follows HTTP conventions (400 bad request, 409 conflict...).
    Error { code: u16, message: String },
}

/// Tile-keyed maps arrive with string keys once serde has buffered them
/// for an internally tagged enum; parse them back.
mod tile_keys {
    use std::collections::BTreeMap;

    use serde::de::{self, Deserialize, Deserializer};

    pub(super) fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<BTreeMap<usize, Vec<usize>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        BTreeMap::<String, Vec<usize>>::deserialize(deserializer)?
            .into_iter()
            .map(|(key, path)| {
                key.parse()
                    .map(|tile| (tile, path))
                    .map_err(|_| de::Error::custom(format!("invalid tile key {key:?}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_json_format() {
        let json: serde_json::Value =
            serde_json::to_value(ClientEvent::ClientMove { tile: 5 }).unwrap();
        assert_eq!(json["kind"], "ClientMove");
        assert_eq!(json["tile"], 5);
    }

    #[test]
    fn test_client_event_defaults() {
        let ping: ClientEvent = serde_json::from_str(r#"{"kind":"Ping"}"#).unwrap();
        assert_eq!(ping, ClientEvent::Ping { info: String::new() });

        let next: ClientEvent =
            serde_json::from_str(r#"{"kind":"WantNextTurn"}"#).unwrap();
        assert_eq!(next, ClientEvent::WantNextTurn { mark_question: false });
    }

    #[test]
    fn test_unknown_client_event_is_rejected() {
        let result: Result<ClientEvent, _> =
            serde_json::from_str(r#"{"kind":"Cheat","tile":3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_answer_payload_is_opaque() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"kind":"Answer","answer":{"value":"42"}}"#)
                .unwrap();
        match event {
            ClientEvent::Answer { answer } => assert_eq!(answer["value"], "42"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_server_event_json_format() {
        let mut results = BTreeMap::new();
        results.insert(
            Serial(2),
            AnswerResult {
                correct: false,
                offer_review_mark: true,
            },
        );
        let event = ServerEvent::AnswerResults {
            category: Category::Yellow,
            results,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["kind"], "AnswerResults");
        assert_eq!(json["category"], "Yellow");
        assert_eq!(json["results"]["2"]["offer_review_mark"], true);
    }

    #[test]
    fn test_unit_server_event_json_format() {
        let json = serde_json::to_value(ServerEvent::GameTerminated).unwrap();
        assert_eq!(json, serde_json::json!({ "kind": "GameTerminated" }));
    }

    #[test]
    fn test_server_message_update_is_flattened() {
        let msg = ServerMessage::Update(StateUpdate {
            events: vec![ServerEvent::GameStart],
            state: GameState::default(),
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Update");
        assert_eq!(json["events"][0]["kind"], "GameStart");
        assert_eq!(json["state"]["pawn_tile"], 0);
    }

    #[test]
    fn test_server_message_decodes_back() {
        let mut paths = BTreeMap::new();
        paths.insert(3, vec![0, 1, 2, 3]);
        let mut state = GameState::default();
        state.players.insert(Serial(1), crate::PlayerStatus {
            name: "ana".into(),
            review: crate::QuestionReview::default(),
            success: crate::Success::default(),
            inactive: false,
        });
        let msg = ServerMessage::Update(StateUpdate {
            events: vec![ServerEvent::PossibleMoves {
                player: Serial(1),
                player_name: "ana".into(),
                tiles: vec![3],
                paths,
            }],
            state,
        });

        let text = serde_json::to_string(&msg).unwrap();
        let back: ServerMessage = serde_json::from_str(&text).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn test_join_request_without_room() {
        let req: JoinRequest =
            serde_json::from_str(r#"{"player_id":"p1","pseudo":"Ana"}"#).unwrap();
        assert_eq!(req.room_id, None);
        assert_eq!(req.player_id, PlayerId::from("p1"));
    }
}
