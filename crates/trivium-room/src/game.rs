//! The game state machine.
//!
//! [`Game`] is pure logic: every input is a method call that either
//! returns the events it produced or a [`GameError`], in which case
//! nothing changed. It never touches a connection or a clock other than
//! reading the current instant, so the room decides when inputs happen
//! and who hears about them.
//!
//! ```text
//! Waiting ──start──→ Throwing ──dice, move──→ Question ──answers/timeout──→ Result
//!                       ↑                                                    │
//!                       └───────────────── everyone ready, no winner ────────┤
//!                                                                            ↓
//!                                                                          Over
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::Value;
use tokio::time::Instant;
use trivium_board::Category;
use trivium_protocol::{
    AnswerResult, ClientEvent, GameState, Phase, PlayerId, PlayerIdentity, PlayerStatus,
    QuestionId, QuestionRecord, QuestionReview, Serial, ServerEvent, Success,
};

use crate::questions::{AskedQuestions, QuestionInstance};
use crate::{GameContent, GameError, GameOptions};

/// What the game knows about one player.
#[derive(Debug, Clone)]
pub struct PlayerState {
    pub identity: PlayerIdentity,
    /// `false` once the player left a started game. Disconnected players
    /// keep their progress and may come back.
    pub connected: bool,
    pub success: Success,
    pub review: QuestionReview,
}

/// Result of [`Game::join`].
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub serial: Serial,
    /// `true` if the identity was already known to the game.
    pub reconnected: bool,
    /// Events for the joining player only.
    pub private: Vec<ServerEvent>,
    /// Events for every connected player.
    pub broadcast: Vec<ServerEvent>,
}

struct CurrentQuestion {
    id: QuestionId,
    category: Category,
    instance: Box<dyn QuestionInstance>,
}

/// One game: players, pawn, turn and question.
pub struct Game {
    options: GameOptions,
    content: GameContent,
    rng: StdRng,

    players: BTreeMap<Serial, PlayerState>,
    serials: HashMap<PlayerId, Serial>,
    next_serial: u32,

    phase: Phase,
    pawn_tile: usize,
    player_turn: Option<Serial>,
    /// Face of the current throw, `None` until the turn holder throws.
    dice: Option<u8>,

    question: Option<CurrentQuestion>,
    question_deadline: Option<Instant>,
    last_question: Option<QuestionId>,
    asked: AskedQuestions,
    answers: BTreeMap<Serial, bool>,
    ready: BTreeSet<Serial>,
}

impl Game {
    pub fn new(options: GameOptions, content: GameContent) -> Self {
        let options = options.validated();
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            options,
            content,
            rng,
            players: BTreeMap::new(),
            serials: HashMap::new(),
            next_serial: 0,
            phase: Phase::Waiting,
            pawn_tile: 0,
            player_turn: None,
            dice: None,
            question: None,
            question_deadline: None,
            last_question: None,
            asked: AskedQuestions::new(),
            answers: BTreeMap::new(),
            ready: BTreeSet::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn options(&self) -> &GameOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn pawn_tile(&self) -> usize {
        self.pawn_tile
    }

    pub fn player_turn(&self) -> Option<Serial> {
        self.player_turn
    }

    pub fn players(&self) -> &BTreeMap<Serial, PlayerState> {
        &self.players
    }

    pub fn serial_of(&self, id: &PlayerId) -> Option<Serial> {
        self.serials.get(id).copied()
    }

    pub fn is_connected(&self, serial: Serial) -> bool {
        self.players.get(&serial).is_some_and(|p| p.connected)
    }

    /// Number of connected players.
    pub fn active_count(&self) -> usize {
        self.players.values().filter(|p| p.connected).count()
    }

    /// When unanswered questions count as wrong. Set only in
    /// [`Phase::Question`].
    pub fn question_deadline(&self) -> Option<Instant> {
        self.question_deadline
    }

    /// The most recent question drawn in this game, if any.
    pub fn last_question(&self) -> Option<QuestionId> {
        self.last_question
    }

    /// `true` when an auto-launched game has enough players to start.
    pub fn ready_to_start(&self) -> bool {
        self.phase == Phase::Waiting
            && self
                .options
                .launch
                .target()
                .is_some_and(|target| self.players.len() >= target)
    }

    /// Snapshot sent with every batch of events.
    pub fn state(&self) -> GameState {
        GameState {
            players: self
                .players
                .iter()
                .map(|(serial, p)| {
                    let status = PlayerStatus {
                        name: p.identity.pseudo.clone(),
                        review: p.review.clone(),
                        success: p.success,
                        inactive: !p.connected,
                    };
                    (*serial, status)
                })
                .collect(),
            pawn_tile: self.pawn_tile,
            player_turn: self.player_turn,
            phase: self.phase,
        }
    }

    // -----------------------------------------------------------------------
    // Lobby
    // -----------------------------------------------------------------------

    /// Adds a player, or reconnects a known identity.
    ///
    /// New players are only accepted in the lobby, and not once an
    /// auto-launched lobby has reached its target. A known identity is
    /// accepted in every phase and finds its serial and progress back.
    pub fn join(&mut self, identity: PlayerIdentity) -> Result<Join, GameError> {
        if let Some(serial) = self.serial_of(&identity.id) {
            return Ok(self.reconnect(serial, identity.pseudo));
        }
        if self.phase.has_started() {
            return Err(GameError::AlreadyStarted);
        }
        if self
            .options
            .launch
            .target()
            .is_some_and(|target| self.players.len() >= target)
        {
            return Err(GameError::LobbyFull);
        }

        let serial = Serial(self.next_serial);
        self.next_serial += 1;
        self.serials.insert(identity.id.clone(), serial);
        let pseudo = identity.pseudo.clone();
        self.players.insert(
            serial,
            PlayerState {
                identity,
                connected: true,
                success: Success::default(),
                review: QuestionReview::default(),
            },
        );
        tracing::info!(%serial, %pseudo, players = self.players.len(), "player joined");

        Ok(Join {
            serial,
            reconnected: false,
            private: vec![ServerEvent::PlayerJoin { player: serial }],
            broadcast: vec![self.lobby_update(serial, pseudo, true)],
        })
    }

    fn reconnect(&mut self, serial: Serial, pseudo: String) -> Join {
        if let Some(player) = self.players.get_mut(&serial) {
            player.connected = true;
            player.identity.pseudo = pseudo.clone();
        }
        tracing::info!(%serial, %pseudo, phase = %self.phase, "player reconnected");

        let mut broadcast = vec![ServerEvent::PlayerReconnected {
            player: serial,
            pseudo,
        }];

        // The turn holder may have left while nobody else was around to
        // take over.
        let turn_is_dead = self.phase == Phase::Throwing
            && self.player_turn.is_some_and(|turn| !self.is_connected(turn));
        if turn_is_dead {
            broadcast.extend(self.start_turn().map(|(player, player_name)| {
                ServerEvent::PlayerTurnReset {
                    player,
                    player_name,
                }
            }));
        }

        let mut private = Vec::new();
        if let (Phase::Question, Some(question)) = (self.phase, &self.question) {
            let remaining = self
                .question_deadline
                .map(|deadline| deadline.saturating_duration_since(Instant::now()))
                .unwrap_or_default();
            private.push(ServerEvent::QuestionShown {
                id: question.id,
                category: question.category,
                timeout_seconds: whole_seconds(remaining),
                body: question.instance.body(),
            });
        }

        Join {
            serial,
            reconnected: true,
            private,
            broadcast,
        }
    }

    /// Leaves the game.
    ///
    /// In the lobby the player is removed. Once started, the player is
    /// kept as disconnected and the game moves on without them: a turn
    /// they held passes on, a question or result screen waiting for
    /// them is re-evaluated.
    pub fn leave(&mut self, serial: Serial) -> Vec<ServerEvent> {
        if self.phase == Phase::Waiting {
            let Some(player) = self.players.remove(&serial) else {
                return Vec::new();
            };
            self.serials.remove(&player.identity.id);
            tracing::info!(%serial, players = self.players.len(), "player left the lobby");
            return vec![self.lobby_update(serial, player.identity.pseudo, false)];
        }

        let Some(player) = self.players.get_mut(&serial) else {
            return Vec::new();
        };
        if !player.connected {
            return Vec::new();
        }
        player.connected = false;
        let pseudo = player.identity.pseudo.clone();
        tracing::info!(%serial, phase = %self.phase, "player disconnected");

        let mut events = vec![self.lobby_update(serial, pseudo, false)];
        match self.phase {
            Phase::Throwing => {
                if self.player_turn == Some(serial) && self.active_count() > 0 {
                    events.extend(self.start_turn().map(|(player, player_name)| {
                        ServerEvent::PlayerTurnReset {
                            player,
                            player_name,
                        }
                    }));
                }
            }
            Phase::Question => events.extend(self.try_end_question()),
            Phase::Result => {
                if self.active_count() > 0 {
                    events.extend(self.try_end_turn());
                }
            }
            Phase::Waiting | Phase::Over => {}
        }
        events
    }

    /// Leaves the lobby and gives the first turn.
    pub fn start(&mut self) -> Result<Vec<ServerEvent>, GameError> {
        if self.phase != Phase::Waiting {
            return Err(GameError::CannotStart(self.phase));
        }
        if self.players.is_empty() {
            return Err(GameError::NoPlayers);
        }

        for player in self.players.values_mut() {
            for category in Category::ALL.into_iter().take(self.options.start_successes) {
                player.success.mark(category);
            }
        }
        tracing::info!(players = self.players.len(), "game started");

        let mut events = vec![ServerEvent::GameStart];
        events.extend(
            self.start_turn()
                .map(|(player, player_name)| ServerEvent::PlayerTurn {
                    player,
                    player_name,
                }),
        );
        Ok(events)
    }

    // -----------------------------------------------------------------------
    // Player actions
    // -----------------------------------------------------------------------

    /// Applies an action from `serial`.
    pub fn handle(
        &mut self,
        serial: Serial,
        event: ClientEvent,
    ) -> Result<Vec<ServerEvent>, GameError> {
        match self.players.get(&serial) {
            None => return Err(GameError::UnknownPlayer(serial)),
            Some(player) if !player.connected => return Err(GameError::Inactive(serial)),
            Some(_) => {}
        }

        match event {
            ClientEvent::Ping { .. } => Ok(Vec::new()),
            ClientEvent::DiceClicked => self.throw_dice(serial),
            ClientEvent::ClientMove { tile } => self.move_pawn(serial, tile),
            ClientEvent::Answer { answer } => self.answer(serial, answer),
            ClientEvent::WantNextTurn { mark_question } => {
                self.want_next_turn(serial, mark_question)
            }
        }
    }

    fn throw_dice(&mut self, serial: Serial) -> Result<Vec<ServerEvent>, GameError> {
        self.expect_phase(Phase::Throwing, "DiceClicked")?;
        self.expect_turn(serial)?;
        if self.dice.is_some() {
            return Err(GameError::DiceAlreadyThrown);
        }

        let face = self.rng.random_range(1..=self.options.max_dice_face);
        self.dice = Some(face);
        let reachable = self.content.board.reachable(self.pawn_tile, face as usize);
        tracing::debug!(%serial, face, from = self.pawn_tile, "dice thrown");

        Ok(vec![
            ServerEvent::DiceThrown { face },
            ServerEvent::PossibleMoves {
                player: serial,
                player_name: self.pseudo(serial),
                tiles: reachable.tiles(),
                paths: reachable
                    .into_paths()
                    .into_iter()
                    .map(|(tile, path)| (tile, path.into()))
                    .collect(),
            },
        ])
    }

    fn move_pawn(&mut self, serial: Serial, tile: usize) -> Result<Vec<ServerEvent>, GameError> {
        self.expect_phase(Phase::Throwing, "ClientMove")?;
        self.expect_turn(serial)?;
        let face = self.dice.ok_or(GameError::DiceNotThrown)?;

        let reachable = self.content.board.reachable(self.pawn_tile, face as usize);
        let path: Vec<usize> = reachable
            .path(tile)
            .ok_or(GameError::UnreachableTile(tile))?
            .as_slice()
            .to_vec();

        let category = self.content.categories.category(tile);
        let handle = self
            .content
            .questions
            .sample(category, &self.asked, &mut self.rng)
            .ok_or(GameError::NoQuestion(category))?;
        let id = handle.id();
        let instance = handle.instantiate();
        let body = instance.body();

        *self.asked.entry(id).or_default() += 1;
        self.pawn_tile = tile;
        self.dice = None;
        self.answers.clear();
        self.question = Some(CurrentQuestion {
            id,
            category,
            instance,
        });
        self.last_question = Some(id);
        self.question_deadline = Some(Instant::now() + self.options.question_timeout);
        self.phase = Phase::Question;
        tracing::debug!(%serial, tile, %category, question = %id, "question shown");

        Ok(vec![
            ServerEvent::Move { tile, path },
            ServerEvent::QuestionShown {
                id,
                category,
                timeout_seconds: whole_seconds(self.options.question_timeout),
                body,
            },
        ])
    }

    fn answer(&mut self, serial: Serial, answer: Value) -> Result<Vec<ServerEvent>, GameError> {
        self.expect_phase(Phase::Question, "Answer")?;
        if self.answers.contains_key(&serial) {
            tracing::debug!(%serial, "second answer ignored");
            return Ok(Vec::new());
        }

        let correct = self
            .question
            .as_ref()
            .is_some_and(|q| q.instance.evaluate(&answer));
        self.answers.insert(serial, correct);
        Ok(self.try_end_question())
    }

    fn want_next_turn(
        &mut self,
        serial: Serial,
        mark_question: bool,
    ) -> Result<Vec<ServerEvent>, GameError> {
        self.expect_phase(Phase::Result, "WantNextTurn")?;
        if !self.ready.insert(serial) {
            return Ok(Vec::new());
        }

        if mark_question {
            let question = self.question.as_ref().map(|q| q.id);
            if let (Some(id), Some(player)) = (question, self.players.get_mut(&serial)) {
                let review = &mut player.review;
                if review.can_mark() && !review.marked.contains(&id) {
                    review.marked.push(id);
                }
            }
        }
        Ok(self.try_end_turn())
    }

    /// Concludes the question once it is past its deadline. A stale call
    /// (question already concluded, or deadline moved) does nothing.
    pub fn on_question_timeout(&mut self) -> Vec<ServerEvent> {
        if self.phase != Phase::Question {
            return Vec::new();
        }
        if self
            .question_deadline
            .is_some_and(|deadline| Instant::now() < deadline)
        {
            return Vec::new();
        }
        tracing::debug!(answered = self.answers.len(), "question timed out");
        self.conclude_question()
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    fn try_end_question(&mut self) -> Vec<ServerEvent> {
        let waiting = self
            .players
            .iter()
            .any(|(serial, p)| p.connected && !self.answers.contains_key(serial));
        if waiting {
            return Vec::new();
        }
        self.conclude_question()
    }

    /// Grades every player, connected or not. Missing answers are wrong.
    fn conclude_question(&mut self) -> Vec<ServerEvent> {
        let Some((id, category)) = self.question.as_ref().map(|q| (q.id, q.category)) else {
            return Vec::new();
        };

        let mut results = BTreeMap::new();
        for (serial, player) in self.players.iter_mut() {
            let correct = self.answers.get(serial).copied().unwrap_or(false);
            if correct {
                player.success.mark(category);
            }
            player.review.history.push(QuestionRecord {
                question: id,
                correct,
            });
            results.insert(
                *serial,
                AnswerResult {
                    correct,
                    offer_review_mark: !correct && player.review.can_mark(),
                },
            );
        }

        self.answers.clear();
        self.question_deadline = None;
        self.phase = Phase::Result;
        tracing::debug!(question = %id, %category, "question concluded");

        vec![ServerEvent::AnswerResults { category, results }]
    }

    fn try_end_turn(&mut self) -> Vec<ServerEvent> {
        let still_in_result: Vec<Serial> = self
            .players
            .iter()
            .filter(|(serial, p)| p.connected && !self.ready.contains(serial))
            .map(|(serial, _)| *serial)
            .collect();
        if !still_in_result.is_empty() {
            return vec![ServerEvent::PlayersStillInResult {
                player_names: still_in_result.iter().map(|s| self.pseudo(*s)).collect(),
                players: still_in_result,
            }];
        }
        if self.active_count() == 0 {
            return Vec::new();
        }

        let winners: Vec<Serial> = self
            .players
            .iter()
            .filter(|(_, p)| p.success.is_done())
            .map(|(serial, _)| *serial)
            .collect();
        if !winners.is_empty() {
            return vec![self.end_game(winners)];
        }

        self.start_turn()
            .map(|(player, player_name)| ServerEvent::PlayerTurn {
                player,
                player_name,
            })
            .into_iter()
            .collect()
    }

    /// Resets the per-turn state and hands the turn to the next connected
    /// player. Returns the new turn holder, `None` if nobody is connected.
    fn start_turn(&mut self) -> Option<(Serial, String)> {
        self.phase = Phase::Throwing;
        self.dice = None;
        self.question = None;
        self.question_deadline = None;
        self.answers.clear();
        self.ready.clear();

        let next = self.next_player()?;
        self.player_turn = Some(next);
        tracing::debug!(player = %next, "turn started");
        Some((next, self.pseudo(next)))
    }

    /// The first connected serial after the current turn holder, wrapping
    /// around to the lowest one.
    fn next_player(&self) -> Option<Serial> {
        let mut active = self
            .players
            .iter()
            .filter(|(_, p)| p.connected)
            .map(|(serial, _)| *serial);
        let first = active.next()?;
        match self.player_turn {
            Some(current) => Some(
                std::iter::once(first)
                    .chain(active)
                    .find(|serial| *serial > current)
                    .unwrap_or(first),
            ),
            None => Some(first),
        }
    }

    fn end_game(&mut self, winners: Vec<Serial>) -> ServerEvent {
        self.phase = Phase::Over;
        self.question = None;
        self.question_deadline = None;
        self.dice = None;

        let winner_names = winners.iter().map(|s| self.pseudo(*s)).collect();
        let review_ids = self.options.show_review.then(|| {
            self.players
                .iter()
                .map(|(serial, p)| (*serial, review_list(&p.review)))
                .collect()
        });
        tracing::info!(?winners, "game over");

        ServerEvent::GameEnd {
            winners,
            winner_names,
            review_ids,
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    fn expect_phase(&self, phase: Phase, event: &'static str) -> Result<(), GameError> {
        if self.phase != phase {
            return Err(GameError::WrongPhase {
                event,
                phase: self.phase,
            });
        }
        Ok(())
    }

    fn expect_turn(&self, serial: Serial) -> Result<(), GameError> {
        if self.player_turn != Some(serial) {
            return Err(GameError::NotYourTurn(serial));
        }
        Ok(())
    }

    fn pseudo(&self, serial: Serial) -> String {
        self.players
            .get(&serial)
            .map(|p| p.identity.pseudo.clone())
            .unwrap_or_default()
    }

    fn lobby_update(&self, player: Serial, pseudo: String, is_joining: bool) -> ServerEvent {
        ServerEvent::LobbyUpdate {
            player,
            pseudo,
            is_joining,
            player_pseudos: self
                .players
                .iter()
                .filter(|(_, p)| p.connected)
                .map(|(serial, p)| (*serial, p.identity.pseudo.clone()))
                .collect(),
        }
    }
}

/// Seconds shown to clients, rounded up so a short timeout never reads 0.
fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// Questions a player should revisit: the ones they marked, then the ones
/// they got wrong, oldest first, without duplicates and at most
/// [`QuestionReview::MAX_MARKED`].
pub fn review_list(review: &QuestionReview) -> Vec<QuestionId> {
    let wrong = review
        .history
        .iter()
        .filter(|record| !record.correct)
        .map(|record| record.question);

    let mut ids = Vec::new();
    for id in review.marked.iter().copied().chain(wrong) {
        if ids.len() == QuestionReview::MAX_MARKED {
            break;
        }
        if !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use serde_json::json;
    use trivium_board::{Board, TileCategories};

    use super::*;
    use crate::questions::{QuestionHandle, QuestionPool, StaticQuestion, WeightedQuestions};
    use crate::LaunchStrategy;

    /// One question per category, id = category index, answer "yes".
    fn content(categories: Vec<Category>) -> GameContent {
        let mut pool = QuestionPool::new();
        for category in Category::ALL {
            let question: Arc<dyn QuestionHandle> = Arc::new(StaticQuestion::new(
                category.index() as i64,
                format!("{category}?"),
                "yes",
            ));
            pool.insert(category, WeightedQuestions::uniform(vec![question]).unwrap());
        }
        let board = Board::reference();
        let categories = TileCategories::new(&board, categories).unwrap();
        GameContent::new(board, categories, Arc::new(pool)).unwrap()
    }

    fn mixed_content() -> GameContent {
        content((0..19).map(|tile| Category::ALL[tile % 5]).collect())
    }

    fn options() -> GameOptions {
        GameOptions {
            seed: Some(11),
            question_timeout: Duration::ZERO,
            ..GameOptions::default()
        }
    }

    /// Lobby of three.
    fn trio() -> GameOptions {
        GameOptions {
            launch: LaunchStrategy::Auto { players: 3 },
            ..options()
        }
    }

    fn game_with(options: GameOptions, content: GameContent, names: &[&str]) -> Game {
        let mut game = Game::new(options, content);
        for name in names {
            game.join(PlayerIdentity::new(*name, *name)).unwrap();
        }
        game
    }

    /// Two players, already started.
    fn started() -> Game {
        let mut game = game_with(options(), mixed_content(), &["ana", "bob"]);
        game.start().unwrap();
        game
    }

    /// Throws the dice and moves to the first reachable tile.
    fn throw_and_move(game: &mut Game) -> Vec<ServerEvent> {
        let turn = game.player_turn().unwrap();
        let events = game.handle(turn, ClientEvent::DiceClicked).unwrap();
        let tile = match &events[1] {
            ServerEvent::PossibleMoves { tiles, .. } => tiles[0],
            other => panic!("unexpected {other:?}"),
        };
        game.handle(turn, ClientEvent::ClientMove { tile }).unwrap()
    }

    fn answer(game: &mut Game, serial: u32, value: &str) -> Vec<ServerEvent> {
        game.handle(Serial(serial), ClientEvent::Answer { answer: json!(value) })
            .unwrap()
    }

    fn next(game: &mut Game, serial: u32) -> Vec<ServerEvent> {
        game.handle(Serial(serial), ClientEvent::WantNextTurn { mark_question: false })
            .unwrap()
    }

    /// Plays a full question round where every listed answer is given.
    fn play_round(game: &mut Game, answers: &[(u32, &str)]) -> Vec<ServerEvent> {
        throw_and_move(game);
        let mut events = Vec::new();
        for (serial, value) in answers {
            events.extend(answer(game, *serial, value));
        }
        events
    }

    #[test]
    fn test_join_assigns_increasing_serials() {
        let mut game = Game::new(options(), mixed_content());
        let a = game.join(PlayerIdentity::new("a", "Ana")).unwrap();
        assert_eq!(a.serial, Serial(0));
        assert!(!a.reconnected);
        assert_eq!(a.private, vec![ServerEvent::PlayerJoin { player: Serial(0) }]);
        assert!(!game.ready_to_start());

        let b = game.join(PlayerIdentity::new("b", "Bob")).unwrap();
        assert_eq!(b.serial, Serial(1));
        match &b.broadcast[0] {
            ServerEvent::LobbyUpdate {
                is_joining,
                player_pseudos,
                ..
            } => {
                assert!(is_joining);
                assert_eq!(player_pseudos.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.ready_to_start());
    }

    #[test]
    fn test_lobby_leave_removes_player_and_serials_are_not_reused() {
        let mut game = Game::new(options(), mixed_content());
        game.join(PlayerIdentity::new("a", "Ana")).unwrap();
        game.leave(Serial(0));
        assert!(game.players().is_empty());
        assert_eq!(game.serial_of(&PlayerId::from("a")), None);

        let again = game.join(PlayerIdentity::new("a", "Ana")).unwrap();
        assert_eq!(again.serial, Serial(1));
        assert!(!again.reconnected);
    }

    #[test]
    fn test_start_gives_turn_to_lowest_serial() {
        let mut game = game_with(options(), mixed_content(), &["ana", "bob"]);
        let events = game.start().unwrap();
        assert_eq!(events[0], ServerEvent::GameStart);
        assert_eq!(
            events[1],
            ServerEvent::PlayerTurn {
                player: Serial(0),
                player_name: "ana".into()
            }
        );
        assert_eq!(game.phase(), Phase::Throwing);
        assert_eq!(game.start(), Err(GameError::CannotStart(Phase::Throwing)));
    }

    #[test]
    fn test_manual_game_never_ready_and_empty_start_rejected() {
        let manual = GameOptions {
            launch: LaunchStrategy::Manual,
            ..options()
        };
        let mut game = Game::new(manual.clone(), mixed_content());
        assert_eq!(game.start(), Err(GameError::NoPlayers));

        let game = game_with(manual, mixed_content(), &["a", "b", "c", "d"]);
        assert!(!game.ready_to_start());
    }

    #[test]
    fn test_join_after_start_is_refused_but_reconnect_is_not() {
        let mut game = started();
        assert_eq!(
            game.join(PlayerIdentity::new("carl", "carl")),
            Err(GameError::AlreadyStarted)
        );
        let back = game.join(PlayerIdentity::new("bob", "Bobby")).unwrap();
        assert!(back.reconnected);
        assert_eq!(back.serial, Serial(1));
    }

    #[test]
    fn test_dice_rules() {
        let mut game = started();
        assert_eq!(
            game.handle(Serial(1), ClientEvent::DiceClicked),
            Err(GameError::NotYourTurn(Serial(1)))
        );
        assert_eq!(
            game.handle(Serial(0), ClientEvent::ClientMove { tile: 1 }),
            Err(GameError::DiceNotThrown)
        );

        let events = game.handle(Serial(0), ClientEvent::DiceClicked).unwrap();
        let face = match events[0] {
            ServerEvent::DiceThrown { face } => face,
            ref other => panic!("unexpected {other:?}"),
        };
        assert!((1..=3).contains(&face));
        match &events[1] {
            ServerEvent::PossibleMoves { tiles, paths, .. } => {
                assert_eq!(tiles.len(), paths.len());
                for tile in tiles {
                    assert_eq!(paths[tile].len(), face as usize + 1);
                    assert_eq!(paths[tile][0], 0);
                }
            }
            other => panic!("unexpected {other:?}"),
        }

        assert_eq!(
            game.handle(Serial(0), ClientEvent::DiceClicked),
            Err(GameError::DiceAlreadyThrown)
        );
    }

    #[test]
    fn test_unreachable_move_leaves_state_untouched() {
        let mut game = started();
        game.handle(Serial(0), ClientEvent::DiceClicked).unwrap();
        let before = game.state();
        assert_eq!(
            game.handle(Serial(0), ClientEvent::ClientMove { tile: 9 }),
            Err(GameError::UnreachableTile(9))
        );
        assert_eq!(game.state(), before);
        assert_eq!(game.phase(), Phase::Throwing);
    }

    #[test]
    fn test_move_shows_question_of_tile_category() {
        let mut game = started();
        let events = throw_and_move(&mut game);
        let tile = game.pawn_tile();
        match (&events[0], &events[1]) {
            (ServerEvent::Move { tile: moved, path }, ServerEvent::QuestionShown { category, .. }) => {
                assert_eq!(*moved, tile);
                assert_eq!(path.last(), Some(&tile));
                assert_eq!(*category, Category::ALL[tile % 5]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.phase(), Phase::Question);
        assert!(game.question_deadline().is_some());
        assert!(game.last_question().is_some());
    }

    #[test]
    fn test_all_answers_conclude_question() {
        let mut game = started();
        throw_and_move(&mut game);
        let category = Category::ALL[game.pawn_tile() % 5];

        assert!(answer(&mut game, 0, "yes").is_empty());
        // A second answer does not overwrite the first.
        assert!(answer(&mut game, 0, "no").is_empty());
        let events = answer(&mut game, 1, "no");

        match &events[0] {
            ServerEvent::AnswerResults { results, .. } => {
                assert!(results[&Serial(0)].correct);
                assert!(!results[&Serial(0)].offer_review_mark);
                assert!(!results[&Serial(1)].correct);
                assert!(results[&Serial(1)].offer_review_mark);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.phase(), Phase::Result);
        assert_eq!(game.question_deadline(), None);

        let state = game.state();
        assert!(state.players[&Serial(0)].success.has(category));
        assert!(!state.players[&Serial(1)].success.has(category));
        assert_eq!(state.players[&Serial(1)].review.history.len(), 1);
    }

    #[test]
    fn test_timeout_counts_missing_answers_as_wrong() {
        let mut game = started();
        throw_and_move(&mut game);
        answer(&mut game, 0, "yes");

        let events = game.on_question_timeout();
        match &events[0] {
            ServerEvent::AnswerResults { results, .. } => {
                assert!(results[&Serial(0)].correct);
                assert!(!results[&Serial(1)].correct);
            }
            other => panic!("unexpected {other:?}"),
        }
        // A late timer after the conclusion is ignored.
        assert!(game.on_question_timeout().is_empty());
    }

    #[test]
    fn test_timeout_before_deadline_is_ignored() {
        let mut game = game_with(
            GameOptions {
                question_timeout: Duration::from_secs(60),
                ..options()
            },
            mixed_content(),
            &["ana", "bob"],
        );
        game.start().unwrap();
        throw_and_move(&mut game);
        assert!(game.on_question_timeout().is_empty());
        assert_eq!(game.phase(), Phase::Question);
    }

    #[test]
    fn test_next_turn_waits_for_everyone_and_rotates() {
        let mut game = started();
        play_round(&mut game, &[(0, "no"), (1, "no")]);

        let events = next(&mut game, 0);
        assert_eq!(
            events,
            vec![ServerEvent::PlayersStillInResult {
                players: vec![Serial(1)],
                player_names: vec!["bob".into()],
            }]
        );
        assert!(next(&mut game, 0).is_empty());

        let events = next(&mut game, 1);
        assert_eq!(
            events,
            vec![ServerEvent::PlayerTurn {
                player: Serial(1),
                player_name: "bob".into()
            }]
        );

        play_round(&mut game, &[(0, "no"), (1, "no")]);
        next(&mut game, 0);
        next(&mut game, 1);
        assert_eq!(game.player_turn(), Some(Serial(0)));
    }

    #[test]
    fn test_rotation_skips_disconnected_players() {
        let mut game = game_with(trio(), mixed_content(), &["a", "b", "c"]);
        game.start().unwrap();
        game.leave(Serial(1));

        play_round(&mut game, &[(0, "no"), (2, "no")]);
        next(&mut game, 0);
        next(&mut game, 2);
        assert_eq!(game.player_turn(), Some(Serial(2)));
    }

    #[test]
    fn test_review_mark_and_game_end() {
        let options = GameOptions {
            start_successes: 4,
            ..options()
        };
        let mut game = game_with(options, content(vec![Category::Blue; 19]), &["ana", "bob"]);
        game.start().unwrap();

        play_round(&mut game, &[(0, "no"), (1, "no")]);
        game.handle(Serial(1), ClientEvent::WantNextTurn { mark_question: true })
            .unwrap();
        next(&mut game, 0);

        play_round(&mut game, &[(0, "yes"), (1, "yes")]);
        next(&mut game, 0);
        let events = next(&mut game, 1);
        match &events[0] {
            ServerEvent::GameEnd {
                winners,
                winner_names,
                review_ids,
            } => {
                assert_eq!(winners, &vec![Serial(0), Serial(1)]);
                assert_eq!(winner_names, &vec!["ana".to_string(), "bob".to_string()]);
                let review_ids = review_ids.as_ref().unwrap();
                assert_eq!(review_ids[&Serial(1)], vec![QuestionId(4)]);
                assert_eq!(review_ids[&Serial(0)], vec![QuestionId(4)]);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.phase(), Phase::Over);
        assert!(matches!(
            game.handle(Serial(0), ClientEvent::DiceClicked),
            Err(GameError::WrongPhase { .. })
        ));
    }

    #[test]
    fn test_success_is_never_cleared() {
        let mut game = game_with(options(), content(vec![Category::Blue; 19]), &["ana", "bob"]);
        game.start().unwrap();

        play_round(&mut game, &[(0, "yes"), (1, "no")]);
        next(&mut game, 0);
        next(&mut game, 1);
        play_round(&mut game, &[(0, "no"), (1, "no")]);

        assert!(game.state().players[&Serial(0)].success.has(Category::Blue));
    }

    #[test]
    fn test_turn_holder_leaving_passes_the_turn() {
        let mut game = started();
        let events = game.leave(Serial(0));
        assert!(matches!(
            events[0],
            ServerEvent::LobbyUpdate { is_joining: false, .. }
        ));
        assert_eq!(
            events[1],
            ServerEvent::PlayerTurnReset {
                player: Serial(1),
                player_name: "bob".into()
            }
        );
        assert_eq!(
            game.handle(Serial(0), ClientEvent::DiceClicked),
            Err(GameError::Inactive(Serial(0)))
        );
        assert!(game.state().players[&Serial(0)].inactive);
    }

    #[test]
    fn test_leave_during_question_concludes_with_remaining_answers() {
        let mut game = started();
        throw_and_move(&mut game);
        answer(&mut game, 1, "yes");

        let events = game.leave(Serial(0));
        match &events[1] {
            ServerEvent::AnswerResults { results, .. } => {
                assert!(!results[&Serial(0)].correct);
                assert!(results[&Serial(1)].correct);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.phase(), Phase::Result);
    }

    #[test]
    fn test_last_missing_vote_leaving_passes_the_turn() {
        let mut game = game_with(trio(), mixed_content(), &["a", "b", "c"]);
        game.start().unwrap();
        play_round(&mut game, &[(0, "no"), (1, "no"), (2, "no")]);
        next(&mut game, 0);
        next(&mut game, 1);

        let events = game.leave(Serial(2));
        assert!(matches!(
            events[0],
            ServerEvent::LobbyUpdate { is_joining: false, .. }
        ));
        assert_eq!(
            events[1],
            ServerEvent::PlayerTurn {
                player: Serial(1),
                player_name: "b".into()
            }
        );
        assert_eq!(game.phase(), Phase::Throwing);
    }

    #[test]
    fn test_turn_holder_leaving_result_passes_the_turn() {
        let mut game = started();
        play_round(&mut game, &[(0, "no"), (1, "no")]);
        next(&mut game, 1);

        let events = game.leave(Serial(0));
        assert_eq!(
            events[1],
            ServerEvent::PlayerTurn {
                player: Serial(1),
                player_name: "bob".into()
            }
        );
        assert_eq!(game.player_turn(), Some(Serial(1)));
        assert_eq!(game.phase(), Phase::Throwing);
    }

    #[test]
    fn test_leave_in_result_can_end_the_game() {
        let options = GameOptions {
            start_successes: 4,
            ..options()
        };
        let mut game = game_with(options, content(vec![Category::Blue; 19]), &["ana", "bob"]);
        game.start().unwrap();
        play_round(&mut game, &[(0, "yes"), (1, "no")]);
        next(&mut game, 0);

        let events = game.leave(Serial(1));
        match &events[1] {
            ServerEvent::GameEnd { winners, .. } => assert_eq!(winners, &vec![Serial(0)]),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(game.phase(), Phase::Over);
    }

    #[test]
    fn test_full_lobby_refuses_newcomers() {
        let mut game = game_with(options(), mixed_content(), &["ana", "bob"]);
        assert_eq!(
            game.join(PlayerIdentity::new("carl", "carl")),
            Err(GameError::LobbyFull)
        );
        assert!(game.join(PlayerIdentity::new("bob", "Bobby")).unwrap().reconnected);

        game.leave(Serial(1));
        assert!(game.join(PlayerIdentity::new("carl", "carl")).is_ok());
    }

    #[test]
    fn test_question_timeout_is_shown_rounded_up() {
        let mut game = game_with(
            GameOptions {
                question_timeout: Duration::from_millis(50),
                ..options()
            },
            mixed_content(),
            &["ana", "bob"],
        );
        game.start().unwrap();
        let events = throw_and_move(&mut game);
        match &events[1] {
            ServerEvent::QuestionShown {
                timeout_seconds, ..
            } => assert_eq!(*timeout_seconds, 1),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(whole_seconds(Duration::ZERO), 0);
        assert_eq!(whole_seconds(Duration::from_secs(60)), 60);
    }

    #[test]
    fn test_reconnect_during_question_reshows_it() {
        let mut game = game_with(
            GameOptions {
                question_timeout: Duration::from_secs(60),
                ..trio()
            },
            mixed_content(),
            &["ana", "bob", "carl"],
        );
        game.start().unwrap();
        throw_and_move(&mut game);
        game.leave(Serial(2));

        let back = game.join(PlayerIdentity::new("carl", "Carl")).unwrap();
        assert_eq!(
            back.broadcast[0],
            ServerEvent::PlayerReconnected {
                player: Serial(2),
                pseudo: "Carl".into()
            }
        );
        match &back.private[0] {
            ServerEvent::QuestionShown {
                timeout_seconds, ..
            } => assert!(*timeout_seconds <= 60),
            other => panic!("unexpected {other:?}"),
        }
        assert!(game.is_connected(Serial(2)));
    }

    #[test]
    fn test_reconnect_revives_abandoned_turn() {
        let mut game = started();
        game.leave(Serial(0));
        game.leave(Serial(1));
        assert_eq!(game.active_count(), 0);
        assert_eq!(game.player_turn(), Some(Serial(1)));

        let back = game.join(PlayerIdentity::new("ana", "ana")).unwrap();
        assert_eq!(
            back.broadcast[1],
            ServerEvent::PlayerTurnReset {
                player: Serial(0),
                player_name: "ana".into()
            }
        );
        assert!(game.handle(Serial(0), ClientEvent::DiceClicked).is_ok());
    }

    #[test]
    fn test_review_list_order_and_cap() {
        let mut review = QuestionReview::default();
        for (id, correct) in [(1, false), (2, true), (3, false), (4, false)] {
            review.history.push(QuestionRecord {
                question: QuestionId(id),
                correct,
            });
        }
        review.marked = vec![QuestionId(3), QuestionId(2)];
        assert_eq!(
            review_list(&review),
            vec![QuestionId(3), QuestionId(2), QuestionId(1)]
        );
    }

    #[test]
    fn test_show_review_disabled() {
        let options = GameOptions {
            start_successes: 4,
            show_review: false,
            ..options()
        };
        let mut game = game_with(options, content(vec![Category::Blue; 19]), &["ana"]);
        game.start().unwrap();
        play_round(&mut game, &[(0, "yes")]);
        let events = next(&mut game, 0);
        assert!(matches!(
            events[0],
            ServerEvent::GameEnd {
                review_ids: None,
                ..
            }
        ));
    }
}
