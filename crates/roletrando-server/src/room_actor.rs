//! One task per room. The actor is the only writer of its room: players,
//! scores, turn order and the game engine all live here, and every change
//! is followed by a broadcast in the order it was committed.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot};

use roletrando_core::error::RoomError;
use roletrando_core::game_trait::{GameEngine, GameEvent, GameIntent, IntentGate, PlayerId};
use roletrando_core::net::messages::{
    ClientMessage, FinalScore, GameOverMsg, RoundRevealMsg, ServerMessage, StateUpdateMsg,
    WelcomeMsg,
};
use roletrando_core::net::protocol::encode_server_message;
use roletrando_core::player::Player;
use roletrando_core::room::{GameKind, RoomSnapshot, RoomStatus};
use roletrando_core::session::{RoundScore, SessionView};
use roletrando_quiz::{QuizConfig, QuizGame};
use roletrando_wheel::{WheelConfig, WheelGame};

use crate::config::{RoomsConfig, ServerConfig};
use crate::content::{ContentCatalog, ThemeContent};
use crate::registry::{Binding, ConnId, ConnSender, Outbound, PlayerRegistry};
use crate::state::SharedRoomManager;
use crate::stats::{Ranking, ServerStats};
use crate::turn::TurnScheduler;

/// Commands accepted by a room actor's mailbox.
#[derive(Debug)]
pub enum RoomCommand {
    /// Bind a connection to `name`: a join, or a reconnect if the name is
    /// already registered.
    Connect {
        name: String,
        conn_id: ConnId,
        sender: ConnSender,
        reply: oneshot::Sender<Result<Joined, RoomError>>,
    },
    /// A decoded message from a bound connection.
    Message {
        player_id: PlayerId,
        conn_id: ConnId,
        message: ClientMessage,
    },
    /// The socket behind `conn_id` closed.
    Disconnect {
        player_id: PlayerId,
        conn_id: ConnId,
    },
    Snapshot {
        reply: oneshot::Sender<RoomSnapshot>,
    },
    Shutdown,
}

/// Result of a successful `Connect`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Joined {
    pub player_id: PlayerId,
    pub reconnected: bool,
}

/// Everything a room needs from the rest of the server.
#[derive(Clone)]
pub struct RoomContext {
    pub rooms: SharedRoomManager,
    pub content: Arc<ContentCatalog>,
    pub stats: Arc<ServerStats>,
    pub ranking: Arc<Ranking>,
    pub settings: Arc<RoomsConfig>,
    pub mailbox: usize,
    player_ids: Arc<AtomicU64>,
}

impl RoomContext {
    pub fn new(
        rooms: SharedRoomManager,
        content: Arc<ContentCatalog>,
        stats: Arc<ServerStats>,
        ranking: Arc<Ranking>,
        config: &ServerConfig,
    ) -> Self {
        Self {
            rooms,
            content,
            stats,
            ranking,
            settings: Arc::new(config.rooms.clone()),
            mailbox: config.limits.room_mailbox,
            player_ids: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Player ids are unique across the whole process.
    fn next_player_id(&self) -> PlayerId {
        self.player_ids.fetch_add(1, Ordering::Relaxed)
    }
}

/// Engines read time only through this, so tests can pause tokio's clock.
fn clock() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}

fn build_engine(kind: GameKind, theme: &ThemeContent, settings: &RoomsConfig) -> Box<dyn GameEngine> {
    match kind {
        GameKind::Game => Box::new(WheelGame::new(
            theme.wheel.clone(),
            WheelConfig {
                spin_reveal_timeout: settings.spin_reveal_timeout(),
                segments: settings.wheel_segments.clone(),
            },
        )),
        GameKind::Quiz => Box::new(QuizGame::new(
            theme.quiz.clone(),
            QuizConfig {
                round_duration: settings.quiz_round(),
            },
        )),
    }
}

/// Spawn the actor for a new room and return its mailbox.
pub fn spawn_room(
    code: String,
    kind: GameKind,
    theme: Option<&str>,
    generation: u64,
    ctx: RoomContext,
) -> mpsc::Sender<RoomCommand> {
    let (tx, rx) = mpsc::channel(ctx.mailbox.max(1));
    let (theme_name, content) = ctx.content.resolve(theme);
    let actor = RoomActor {
        code,
        kind,
        theme: theme_name,
        content,
        generation,
        status: RoomStatus::Waiting,
        registry: PlayerRegistry::new(),
        turn: TurnScheduler::new(),
        engine: None,
        seq: 0,
        bot_due: None,
        empty_since: Some(clock()),
        bots_added: 0,
        ctx,
    };
    tokio::spawn(actor.run(rx));
    tx
}

struct RoomActor {
    code: String,
    kind: GameKind,
    theme: String,
    content: Arc<ThemeContent>,
    /// Distinguishes this actor from a later room reusing the same code.
    generation: u64,
    status: RoomStatus,
    registry: PlayerRegistry,
    turn: TurnScheduler,
    /// Created on the first start and reused on restarts.
    engine: Option<Box<dyn GameEngine>>,
    seq: u64,
    bot_due: Option<Instant>,
    /// Since when no human has been connected.
    empty_since: Option<Instant>,
    bots_added: u32,
    ctx: RoomContext,
}

impl RoomActor {
    async fn run(mut self, mut rx: mpsc::Receiver<RoomCommand>) {
        tracing::info!(
            room = %self.code,
            kind = %self.kind,
            theme = %self.theme,
            "Room opened"
        );

        loop {
            let wake = self.next_wake();
            tokio::select! {
                cmd = rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle_command(cmd) {
                        break;
                    }
                },
                () = sleep_until(wake) => self.on_timer(clock()),
            }

            let now = clock();
            self.track_occupancy(now);
            if self
                .empty_since
                .is_some_and(|since| since + self.ctx.settings.empty_room_grace() <= now)
            {
                tracing::info!(room = %self.code, "Closing room with no connected players");
                break;
            }
        }

        rx.close();
        self.expire_connections();
        self.ctx
            .rooms
            .write()
            .await
            .remove_if_current(&self.code, self.generation);
        tracing::info!(room = %self.code, "Room closed");
    }

    /// Returns false when the actor should stop.
    fn handle_command(&mut self, cmd: RoomCommand) -> bool {
        let now = clock();
        match cmd {
            RoomCommand::Connect {
                name,
                conn_id,
                sender,
                reply,
            } => {
                match self.connect(name, conn_id, sender, now) {
                    Ok(joined) => {
                        if reply.send(Ok(joined)).is_err() {
                            // The gateway gave up before the join completed.
                            self.disconnect(joined.player_id, conn_id, now);
                        }
                    },
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    },
                }
            },
            RoomCommand::Message {
                player_id,
                conn_id,
                message,
            } => {
                if !self.registry.is_bound(player_id, conn_id) {
                    tracing::debug!(
                        player_id,
                        conn_id,
                        room = %self.code,
                        "Ignoring message from stale connection"
                    );
                    return true;
                }
                let msg_type = message.message_type();
                if let Err(err) = self.handle_message(player_id, message, now) {
                    tracing::debug!(
                        player_id,
                        room = %self.code,
                        msg_type = msg_type.as_str(),
                        error = %err,
                        "Rejected intent"
                    );
                    self.send_to(player_id, &ServerMessage::error(&err));
                }
            },
            RoomCommand::Disconnect { player_id, conn_id } => {
                self.disconnect(player_id, conn_id, now);
            },
            RoomCommand::Snapshot { reply } => {
                let _ = reply.send(self.snapshot(now));
            },
            RoomCommand::Shutdown => return false,
        }
        true
    }

    fn connect(
        &mut self,
        name: String,
        conn_id: ConnId,
        sender: ConnSender,
        now: Instant,
    ) -> Result<Joined, RoomError> {
        let binding = Binding { conn_id, sender };

        if let Some(player_id) = self.registry.find_human(&name) {
            if let Some(old) = self.registry.bind(player_id, binding)
                && old.sender.try_send(Outbound::Close).is_err()
            {
                tracing::debug!(
                    player_id,
                    room = %self.code,
                    "Older connection already gone"
                );
            }
            tracing::info!(player_id, room = %self.code, conn_id, "Player reconnected");
            self.send_to(
                player_id,
                &ServerMessage::Welcome(WelcomeMsg {
                    player_id,
                    room_id: self.code.clone(),
                    reconnected: true,
                }),
            );
            self.broadcast_state(now);
            return Ok(Joined {
                player_id,
                reconnected: true,
            });
        }

        if self.registry.name_taken(&name) {
            return Err(RoomError::NameTaken);
        }
        // New seats only open in the lobby; reconnects were handled above
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        if self.registry.len() >= self.ctx.settings.max_players(self.kind) {
            return Err(RoomError::RoomFull);
        }

        let player_id = self.ctx.next_player_id();
        tracing::info!(player_id, room = %self.code, name = %name, "Player joined");
        self.registry.add(Player::new(player_id, name), Some(binding));
        self.send_to(
            player_id,
            &ServerMessage::Welcome(WelcomeMsg {
                player_id,
                room_id: self.code.clone(),
                reconnected: false,
            }),
        );
        self.broadcast_state(now);
        Ok(Joined {
            player_id,
            reconnected: false,
        })
    }

    fn disconnect(&mut self, player_id: PlayerId, conn_id: ConnId, now: Instant) {
        if self.registry.unbind(player_id, conn_id, now) {
            tracing::info!(player_id, room = %self.code, "Player disconnected");
            self.broadcast_state(now);
        }
    }

    fn handle_message(
        &mut self,
        player_id: PlayerId,
        message: ClientMessage,
        now: Instant,
    ) -> Result<(), RoomError> {
        match message {
            ClientMessage::StartGame => self.start_game(player_id, now),
            ClientMessage::AddBot => self.add_bot(player_id, now),
            other => match other.into_game_intent() {
                Some(intent) => self.game_intent(player_id, intent, now),
                None => Err(RoomError::invalid("unsupported message")),
            },
        }
    }

    fn start_game(&mut self, requester: PlayerId, now: Instant) -> Result<(), RoomError> {
        if self.registry.host_id() != Some(requester) {
            return Err(RoomError::NotHost);
        }
        if self.status == RoomStatus::Playing {
            return Err(RoomError::AlreadyStarted);
        }

        self.registry.reset_scores();
        self.turn.reset();
        self.bot_due = None;
        let players = self.registry.players();
        let engine = self
            .engine
            .get_or_insert_with(|| build_engine(self.kind, &self.content, &self.ctx.settings));
        let events = engine.init(&players, now);
        self.status = RoomStatus::Playing;
        self.ctx.stats.record_game_created();

        tracing::info!(
            room = %self.code,
            kind = %self.kind,
            players = players.len(),
            "Game started"
        );
        self.broadcast(&ServerMessage::GameStart);
        self.commit(events, now);
        Ok(())
    }

    fn add_bot(&mut self, requester: PlayerId, now: Instant) -> Result<(), RoomError> {
        if self.registry.host_id() != Some(requester) {
            return Err(RoomError::NotHost);
        }
        if self.status != RoomStatus::Waiting {
            return Err(RoomError::AlreadyStarted);
        }
        if self.registry.len() >= self.ctx.settings.max_players(self.kind) {
            return Err(RoomError::RoomFull);
        }

        let name = loop {
            self.bots_added += 1;
            let candidate = format!("Bot {}", self.bots_added);
            if !self.registry.name_taken(&candidate) {
                break candidate;
            }
        };
        let bot_id = self.ctx.next_player_id();
        tracing::info!(player_id = requester, room = %self.code, bot_id, "Bot added");
        self.registry.add(Player::bot(bot_id, name), None);
        self.broadcast_state(now);
        Ok(())
    }

    /// Gate an intent, hand it to the engine and commit the outcome.
    fn game_intent(
        &mut self,
        player_id: PlayerId,
        intent: GameIntent,
        now: Instant,
    ) -> Result<(), RoomError> {
        if self.status != RoomStatus::Playing {
            return Err(RoomError::invalid("no game in progress"));
        }
        let gate = match self.engine.as_ref() {
            Some(engine) => engine.gate(&intent),
            None => return Err(RoomError::invalid("no game in progress")),
        };
        match gate {
            IntentGate::Turn if self.turn_holder() != Some(player_id) => {
                return Err(RoomError::NotYourTurn);
            },
            IntentGate::Host if self.registry.host_id() != Some(player_id) => {
                return Err(RoomError::NotHost);
            },
            _ => {},
        }
        self.drive_engine(now, |engine| engine.apply(player_id, intent, now))?;
        Ok(())
    }

    /// Run `f` against the engine and commit if anything changed. Intents the
    /// engine drops silently leave both the events and the view untouched,
    /// and produce no broadcast.
    fn drive_engine<F>(&mut self, now: Instant, f: F) -> Result<bool, RoomError>
    where
        F: FnOnce(&mut dyn GameEngine) -> Result<Vec<GameEvent>, RoomError>,
    {
        let Some(engine) = self.engine.as_mut() else {
            return Ok(false);
        };
        let before = engine.view(now);
        let events = f(&mut **engine)?;
        let changed = !events.is_empty() || engine.view(now) != before;
        if changed {
            self.commit(events, now);
        }
        Ok(changed)
    }

    /// Apply engine events in order, then broadcast the resulting state.
    fn commit(&mut self, events: Vec<GameEvent>, now: Instant) {
        let mut finished = None;
        for event in events {
            match event {
                GameEvent::SpinDrawn { value } => {
                    tracing::debug!(room = %self.code, value, "Spin drawn");
                    self.broadcast(&ServerMessage::SpinStart(value));
                },
                GameEvent::ScoreAwarded { player_id, points } => {
                    self.registry.add_score(player_id, points);
                },
                GameEvent::ScoreReset { player_id } => self.registry.reset_score(player_id),
                GameEvent::TurnEnded => {
                    let players = self.registry.players();
                    self.turn.advance(&players);
                },
                GameEvent::QuestionOpened { question_index } => {
                    tracing::debug!(room = %self.code, question_index, "Question opened");
                },
                GameEvent::RoundClosed {
                    question_index,
                    correct_index,
                    round_scores,
                } => {
                    let round_scores = round_scores
                        .into_iter()
                        .map(|(player_id, points)| RoundScore { player_id, points })
                        .collect();
                    self.broadcast(&ServerMessage::RoundReveal(RoundRevealMsg {
                        question_index,
                        correct_index,
                        round_scores,
                    }));
                },
                GameEvent::Finished { winner } => finished = Some(winner),
            }
        }

        if finished.is_some() {
            self.status = RoomStatus::Finished;
            self.bot_due = None;
        }
        self.broadcast_state(now);
        match finished {
            Some(winner) => self.finish_game(winner),
            None => self.schedule_bots(now),
        }
    }

    fn finish_game(&mut self, winner: Option<PlayerId>) {
        let players = self.registry.players();
        for player in players.iter().filter(|p| !p.is_bot) {
            self.ctx.ranking.record(
                &player.name,
                self.kind.as_str(),
                player.score,
                winner == Some(player.id),
            );
        }
        tracing::info!(room = %self.code, winner = ?winner, "Game finished");
        let final_scores = players
            .into_iter()
            .map(|p| FinalScore {
                player_id: p.id,
                name: p.name,
                score: p.score,
            })
            .collect();
        self.broadcast(&ServerMessage::GameOver(GameOverMsg {
            winner_id: winner,
            final_scores,
        }));
    }

    fn schedule_bots(&mut self, now: Instant) {
        if self.bot_due.is_none()
            && self.status == RoomStatus::Playing
            && !self.registry.bots().is_empty()
        {
            self.bot_due = Some(now + self.ctx.settings.bot_action_delay());
        }
    }

    fn run_bots(&mut self, now: Instant) {
        let holder = self.turn_holder();
        for bot_id in self.registry.bots() {
            if self.status != RoomStatus::Playing {
                break;
            }
            let Some(intent) = self
                .engine
                .as_mut()
                .and_then(|e| e.bot_intent(bot_id, holder == Some(bot_id)))
            else {
                continue;
            };
            if let Err(err) = self.game_intent(bot_id, intent, now) {
                tracing::debug!(bot_id, room = %self.code, error = %err, "Bot intent rejected");
            }
        }
    }

    fn on_timer(&mut self, now: Instant) {
        for player_id in self
            .registry
            .expired(now, self.ctx.settings.reconnect_grace())
        {
            self.evict(player_id, now);
        }

        let engine_due = self.status == RoomStatus::Playing
            && self
                .engine
                .as_ref()
                .and_then(|e| e.next_deadline())
                .is_some_and(|at| at <= now);
        if engine_due {
            let _ = self.drive_engine(now, |engine| Ok(engine.tick(now)));
        }

        if self.bot_due.is_some_and(|at| at <= now) {
            self.bot_due = None;
            self.run_bots(now);
        }
    }

    /// Remove a player whose reconnect grace ran out.
    fn evict(&mut self, player_id: PlayerId, now: Instant) {
        let Some((index, player)) = self.registry.remove(player_id) else {
            return;
        };
        tracing::info!(
            player_id,
            room = %self.code,
            name = %player.name,
            "Evicted player after reconnect grace"
        );
        self.turn.remove_at(index, self.registry.len());
        let committed = self.status == RoomStatus::Playing
            && self
                .drive_engine(now, |engine| Ok(engine.player_left(player_id, now)))
                .unwrap_or(false);
        if !committed {
            self.broadcast_state(now);
        }
    }

    fn next_wake(&self) -> Option<Instant> {
        let engine = if self.status == RoomStatus::Playing {
            self.engine.as_ref().and_then(|e| e.next_deadline())
        } else {
            None
        };
        let eviction = self
            .registry
            .next_eviction(self.ctx.settings.reconnect_grace());
        let teardown = self
            .empty_since
            .map(|since| since + self.ctx.settings.empty_room_grace());
        [engine, self.bot_due, eviction, teardown]
            .into_iter()
            .flatten()
            .min()
    }

    fn track_occupancy(&mut self, now: Instant) {
        if self.registry.connected_humans() > 0 {
            self.empty_since = None;
        } else if self.empty_since.is_none() {
            self.empty_since = Some(now);
        }
    }

    /// Wheel turn holder while a game runs.
    fn turn_holder(&self) -> Option<PlayerId> {
        if self.kind != GameKind::Game || self.status != RoomStatus::Playing {
            return None;
        }
        self.registry.get_at(self.turn.index()).map(|p| p.id)
    }

    fn snapshot(&self, now: Instant) -> RoomSnapshot {
        let session = match self.status {
            RoomStatus::Waiting => None,
            RoomStatus::Playing | RoomStatus::Finished => {
                self.engine.as_ref().map(|e| e.view(now))
            },
        };
        let (game_session, quiz_session) = match session {
            Some(SessionView::Wheel(view)) => (Some(view), None),
            Some(SessionView::Quiz(view)) => (None, Some(view)),
            None => (None, None),
        };
        RoomSnapshot {
            id: self.code.clone(),
            game_kind: self.kind,
            theme: self.theme.clone(),
            status: self.status,
            players: self.registry.players(),
            current_turn_index: self.turn.index(),
            host_id: self.registry.host_id(),
            game_session,
            quiz_session,
        }
    }

    fn broadcast_state(&mut self, now: Instant) {
        self.seq += 1;
        let msg = ServerMessage::StateUpdate(StateUpdateMsg {
            seq: self.seq,
            room: self.snapshot(now),
            current_player_turn_id: self.turn_holder(),
        });
        self.broadcast(&msg);
    }

    fn encode(&self, msg: &ServerMessage) -> Option<Utf8Bytes> {
        match encode_server_message(msg) {
            Ok(json) => Some(Utf8Bytes::from(json)),
            Err(e) => {
                tracing::error!(
                    room = %self.code,
                    msg_type = msg.message_type().as_str(),
                    error = %e,
                    "Failed to encode server message"
                );
                None
            },
        }
    }

    /// Enqueue one frame to every bound connection. A full queue drops the
    /// frame for that connection only.
    fn broadcast(&self, msg: &ServerMessage) {
        let Some(frame) = self.encode(msg) else {
            return;
        };
        for (player_id, binding) in self.registry.bindings() {
            if let Err(e) = binding.sender.try_send(Outbound::Frame(frame.clone())) {
                tracing::debug!(
                    player_id,
                    room = %self.code,
                    error = %e,
                    "Skipping broadcast to slow client"
                );
            }
        }
    }

    fn send_to(&self, player_id: PlayerId, msg: &ServerMessage) {
        let Some(binding) = self.registry.binding(player_id) else {
            return;
        };
        let Some(frame) = self.encode(msg) else {
            return;
        };
        if let Err(e) = binding.sender.try_send(Outbound::Frame(frame)) {
            tracing::debug!(player_id, room = %self.code, error = %e, "Dropped direct message");
        }
    }

    /// Tell every bound connection the room is gone, then close it.
    fn expire_connections(&mut self) {
        let Some(frame) = self.encode(&ServerMessage::error(&RoomError::SessionExpired)) else {
            return;
        };
        for binding in self.registry.take_bindings() {
            let _ = binding.sender.try_send(Outbound::Frame(frame.clone()));
            let _ = binding.sender.try_send(Outbound::Close);
        }
    }
}
