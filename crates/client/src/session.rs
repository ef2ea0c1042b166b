//! Per-game session owner.
//!
//! A [`GameSession`] pairs one [`WsConnection`] with one projection for a
//! single game id. Inbound frames are decoded and folded by a single task,
//! strictly in arrival order, and each accepted event publishes exactly one
//! new projection value.

use std::sync::Arc;

use quizroom_shared::{decode_event, ClientCommand, DecodeError, GameId, QuestionId, ServerEvent};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::SessionConfig;
use crate::stores::Projection;
use crate::ws::{ConnectionState, Connector, WsConnection, WsHandle};

/// A non-fatal problem worth showing to the user, e.g. a dropped event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Envelope type involved, when it could be read.
    pub kind: Option<String>,
    pub message: String,
}

impl From<&DecodeError> for Diagnostic {
    fn from(err: &DecodeError) -> Self {
        Self {
            kind: err.kind().map(str::to_string),
            message: err.to_string(),
        }
    }
}

/// Live session for one game.
pub struct GameSession {
    game_id: GameId,
    connection: WsConnection,
    projection: watch::Receiver<Arc<Projection>>,
    diagnostics: watch::Receiver<Option<Diagnostic>>,
    fold_task: JoinHandle<()>,
}

impl GameSession {
    /// Start connecting to `game_id` and folding what the server sends.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(game_id: impl Into<GameId>, config: &SessionConfig, connector: Arc<dyn Connector>) -> Self {
        let game_id = game_id.into();
        crate::log_info!("Opening session for game '{}' as {}", game_id, config.role);

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (projection_tx, projection) = watch::channel(Arc::new(Projection::initial()));
        let (diagnostics_tx, diagnostics) = watch::channel(None);

        let fold_task = tokio::spawn(run_fold_loop(
            game_id.clone(),
            inbound_rx,
            projection_tx,
            diagnostics_tx,
        ));
        let connection = WsConnection::open(
            game_id.clone(),
            config.join_command(&game_id),
            connector,
            config.connection_options(),
            inbound_tx,
        );

        Self {
            game_id,
            connection,
            projection,
            diagnostics,
            fold_task,
        }
    }

    pub fn game_id(&self) -> &str {
        &self.game_id
    }

    /// Current projection. Cheap; the value is shared, never mutated.
    pub fn projection(&self) -> Arc<Projection> {
        self.projection.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<Projection>> {
        self.projection.clone()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.watch_state()
    }

    pub fn last_diagnostic(&self) -> Option<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    pub fn watch_diagnostics(&self) -> watch::Receiver<Option<Diagnostic>> {
        self.diagnostics.clone()
    }

    pub fn sender(&self) -> CommandSender {
        CommandSender {
            handle: self.connection.handle(),
            projection: self.projection.clone(),
        }
    }

    pub fn send_command(&self, command: ClientCommand) {
        self.connection.handle().send(command);
    }

    /// Tear down the link and stop folding. Idempotent.
    pub fn close(&mut self) {
        self.connection.close();
        self.fold_task.abort();
    }

    pub async fn shutdown(self) {
        let GameSession {
            connection,
            fold_task,
            ..
        } = self;
        fold_task.abort();
        connection.shutdown().await;
        let _ = fold_task.await;
    }
}

async fn run_fold_loop(
    game_id: GameId,
    mut inbound: mpsc::UnboundedReceiver<String>,
    projection: watch::Sender<Arc<Projection>>,
    diagnostics: watch::Sender<Option<Diagnostic>>,
) {
    while let Some(frame) = inbound.recv().await {
        match decode_event(&frame) {
            Ok(ServerEvent::Unknown { kind }) => {
                crate::log_debug!("Ignoring unknown event '{}' for game '{}'", kind, game_id);
            }
            Ok(event) => {
                let next = projection.borrow().fold(&event);
                projection.send_replace(Arc::new(next));
            }
            Err(e) => {
                crate::log_warn!("Dropping frame for game '{}': {}", game_id, e);
                diagnostics.send_replace(Some(Diagnostic::from(&e)));
            }
        }
    }
}

/// Fire-and-forget command sender for one session.
#[derive(Clone)]
pub struct CommandSender {
    handle: WsHandle,
    projection: watch::Receiver<Arc<Projection>>,
}

impl CommandSender {
    pub fn game_id(&self) -> &str {
        &self.handle.game_id
    }

    pub fn send(&self, command: ClientCommand) {
        self.handle.send(command);
    }

    pub fn change_question(&self, question_id: impl Into<QuestionId>) {
        self.send(ClientCommand::ChangeQuestion {
            question_id: question_id.into(),
        });
    }

    /// Reveal answers for the question currently active.
    pub fn show_answers(&self) {
        let question_id = self.projection.borrow().active_question_id.clone();
        self.send(ClientCommand::ShowAnswers { question_id });
    }

    pub fn show_winners(&self) {
        self.send(ClientCommand::ShowWinners);
    }

    pub fn end_game(&self) {
        self.send(ClientCommand::EndGame);
    }

    pub fn submit_answer(&self, question_id: impl Into<QuestionId>, text: impl Into<String>) {
        self.send(ClientCommand::SubmitAnswer {
            question_id: question_id.into(),
            text: text.into(),
        });
    }

    /// Answer whatever question is active. Returns `false` when none is.
    pub fn answer_active_question(&self, text: impl Into<String>) -> bool {
        let active = self.projection.borrow().active_question_id.clone();
        match active {
            Some(question_id) => {
                self.submit_answer(question_id, text);
                true
            }
            None => false,
        }
    }
}

/// Owns at most one session at a time and swaps it when the game changes.
pub struct SessionHost {
    config: SessionConfig,
    connector: Arc<dyn Connector>,
    current: Option<GameSession>,
}

impl SessionHost {
    pub fn new(config: SessionConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            current: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Make `game_id` the live session. A session for another game is closed
    /// before the new one is opened; the same game is kept as is.
    pub fn mount(&mut self, game_id: &str) -> &GameSession {
        if self
            .current
            .as_ref()
            .is_some_and(|s| s.game_id() != game_id)
        {
            self.unmount();
        }
        let config = &self.config;
        let connector = &self.connector;
        self.current
            .get_or_insert_with(|| GameSession::open(game_id, config, connector.clone()))
    }

    pub fn unmount(&mut self) {
        if let Some(mut session) = self.current.take() {
            crate::log_info!("Tearing down session for game '{}'", session.game_id());
            session.close();
        }
    }

    pub fn current(&self) -> Option<&GameSession> {
        self.current.as_ref()
    }
}

impl Drop for SessionHost {
    fn drop(&mut self) {
        self.unmount();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use quizroom_shared::{GamePhase, Player, Question, Role, SessionSnapshot};
    use tokio::time::timeout;

    use crate::ws::{HeartbeatConfig, MemoryConnector, MemoryListener, MemoryPeer, ReconnectConfig};

    const WAIT: Duration = Duration::from_secs(5);

    fn quick(config: SessionConfig) -> SessionConfig {
        config
            .with_reconnect(ReconnectConfig {
                initial_delay: Duration::from_millis(10),
                max_delay: Duration::from_millis(40),
                backoff_multiplier: 2.0,
            })
            .with_heartbeat(HeartbeatConfig {
                interval: Duration::from_secs(30),
                timeout: Duration::from_secs(60),
            })
    }

    fn snapshot(players: &[&str], active: Option<&str>, phase: GamePhase) -> SessionSnapshot {
        SessionSnapshot {
            players: players
                .iter()
                .map(|id| Player {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    score: 0,
                })
                .collect(),
            all_questions: vec![
                Question {
                    id: "q1".into(),
                    text: "2+2?".into(),
                    img: None,
                },
                Question {
                    id: "q2".into(),
                    text: "Capital of France?".into(),
                    img: None,
                },
            ],
            active_question_id: active.map(str::to_string),
            player_answers: vec![],
            phase,
        }
    }

    async fn accept(listener: &mut MemoryListener) -> MemoryPeer {
        timeout(WAIT, listener.accept()).await.unwrap().unwrap()
    }

    async fn next_command(peer: &mut MemoryPeer) -> ClientCommand {
        timeout(WAIT, peer.recv_command()).await.unwrap().unwrap()
    }

    async fn wait_for_projection(
        session: &GameSession,
        predicate: impl FnMut(&Arc<Projection>) -> bool,
    ) -> Arc<Projection> {
        let mut rx = session.subscribe();
        let projection = timeout(WAIT, rx.wait_for(predicate))
            .await
            .expect("projection never matched")
            .unwrap()
            .clone();
        projection
    }

    fn open(config: SessionConfig) -> (GameSession, MemoryConnector, MemoryListener) {
        let (connector, listener) = MemoryConnector::pair();
        let session = GameSession::open("g1", &quick(config), Arc::new(connector.clone()));
        (session, connector, listener)
    }

    #[tokio::test]
    async fn joins_and_applies_the_snapshot() {
        let (session, _connector, mut listener) = open(SessionConfig::admin());
        let mut peer = accept(&mut listener).await;

        assert_eq!(
            next_command(&mut peer).await,
            ClientCommand::Join {
                game_id: "g1".into(),
                role: Role::Admin,
                player_id: None,
            }
        );

        let snap = snapshot(&["p1"], None, GamePhase::Lobby);
        peer.send_event(&ServerEvent::StateSnapshot(snap.clone())).unwrap();

        let projection = wait_for_projection(&session, |p| !p.players.is_empty()).await;
        assert_eq!(*projection, Projection::from_snapshot(&snap));
        assert!(session.connection_state().is_connected());
    }

    #[tokio::test]
    async fn commands_issued_before_connect_follow_the_join() {
        let (session, connector, mut listener) = open(SessionConfig::admin());
        connector.refuse_next(2);
        let sender = session.sender();
        sender.change_question("q2");
        sender.show_winners();

        let mut peer = accept(&mut listener).await;
        assert!(next_command(&mut peer).await.is_join());
        assert_eq!(
            next_command(&mut peer).await,
            ClientCommand::ChangeQuestion {
                question_id: "q2".into()
            }
        );
        assert_eq!(next_command(&mut peer).await, ClientCommand::ShowWinners);
    }

    #[tokio::test]
    async fn converges_on_the_snapshot_after_reconnect() {
        let (session, _connector, mut listener) = open(SessionConfig::admin());

        let mut first = accept(&mut listener).await;
        next_command(&mut first).await;
        first
            .send_event(&ServerEvent::StateSnapshot(snapshot(&["p1"], None, GamePhase::Lobby)))
            .unwrap();
        first
            .send_event(&ServerEvent::QuestionChanged {
                question_id: "q1".into(),
            })
            .unwrap();
        wait_for_projection(&session, |p| p.active_question_id.is_some()).await;
        drop(first);

        // Events missed while offline are covered by the fresh snapshot
        let fresh = snapshot(&["p1", "p2"], Some("q2"), GamePhase::AnswersShown);
        let mut second = accept(&mut listener).await;
        assert!(next_command(&mut second).await.is_join());
        second
            .send_event(&ServerEvent::StateSnapshot(fresh.clone()))
            .unwrap();

        let projection = wait_for_projection(&session, |p| p.players.len() == 2).await;
        assert_eq!(*projection, Projection::from_snapshot(&fresh));
    }

    #[tokio::test]
    async fn malformed_frames_surface_a_diagnostic_and_change_nothing() {
        let (session, _connector, mut listener) = open(SessionConfig::admin());
        let mut peer = accept(&mut listener).await;
        next_command(&mut peer).await;

        peer.send_text(r#"{"type":"WINNERS_SHOWN","payload":{}}"#).unwrap();
        let mut diagnostics = session.watch_diagnostics();
        let diagnostic = timeout(WAIT, diagnostics.wait_for(Option::is_some))
            .await
            .unwrap()
            .unwrap()
            .clone()
            .unwrap();

        assert_eq!(diagnostic.kind.as_deref(), Some("WINNERS_SHOWN"));
        assert_eq!(*session.projection(), Projection::initial());
        assert!(session.connection_state().is_connected());
    }

    #[tokio::test]
    async fn unknown_events_are_ignored_quietly() {
        let (session, _connector, mut listener) = open(SessionConfig::admin());
        let mut peer = accept(&mut listener).await;
        next_command(&mut peer).await;

        peer.send_text(r#"{"type":"CONFETTI","payload":{"colors":3}}"#).unwrap();
        peer.send_event(&ServerEvent::GameEnded).unwrap();

        let projection = wait_for_projection(&session, |p| p.is_ended()).await;
        assert_eq!(projection.players.len(), 0);
        assert_eq!(session.last_diagnostic(), None);
    }

    #[tokio::test]
    async fn players_answer_the_active_question() {
        let (session, _connector, mut listener) = open(SessionConfig::player("p1"));
        let sender = session.sender();
        assert!(!sender.answer_active_question("too early"));

        let mut peer = accept(&mut listener).await;
        assert_eq!(
            next_command(&mut peer).await,
            ClientCommand::Join {
                game_id: "g1".into(),
                role: Role::Player,
                player_id: Some("p1".into()),
            }
        );
        peer.send_event(&ServerEvent::StateSnapshot(snapshot(
            &["p1"],
            Some("q1"),
            GamePhase::QuestionActive,
        )))
        .unwrap();
        wait_for_projection(&session, |p| p.active_question_id.is_some()).await;

        assert!(sender.answer_active_question("4"));
        assert_eq!(
            next_command(&mut peer).await,
            ClientCommand::SubmitAnswer {
                question_id: "q1".into(),
                text: "4".into(),
            }
        );

        sender.show_answers();
        assert_eq!(
            next_command(&mut peer).await,
            ClientCommand::ShowAnswers {
                question_id: Some("q1".into())
            }
        );
    }

    #[tokio::test]
    async fn winners_scores_are_published() {
        let (session, _connector, mut listener) = open(SessionConfig::admin());
        let mut peer = accept(&mut listener).await;
        next_command(&mut peer).await;

        let mut scores = BTreeMap::new();
        scores.insert("p1".to_string(), 100);
        peer.send_event(&ServerEvent::StateSnapshot(snapshot(&["p1"], None, GamePhase::Lobby)))
            .unwrap();
        peer.send_event(&ServerEvent::WinnersShown { scores }).unwrap();

        let projection =
            wait_for_projection(&session, |p| p.phase == GamePhase::WinnersShown).await;
        assert_eq!(projection.leaderboard()[0].score, 100);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let (mut session, _connector, _listener) = open(SessionConfig::admin());
        let sender = session.sender();

        session.close();
        session.close();
        sender.end_game();

        assert_eq!(session.connection_state(), ConnectionState::Closed);
        timeout(WAIT, session.shutdown()).await.unwrap();
    }

    #[tokio::test]
    async fn host_tears_down_the_old_game_before_opening_the_next() {
        let (connector, mut listener) = MemoryConnector::pair();
        let mut host = SessionHost::new(quick(SessionConfig::admin()), Arc::new(connector));

        host.mount("g1");
        let mut first = accept(&mut listener).await;
        assert_eq!(first.game_id, "g1");
        next_command(&mut first).await;
        let old_state = host.current().unwrap().watch_connection();

        // Same game: nothing changes
        host.mount("g1");
        assert!(old_state.borrow().is_connected());

        let next = host.mount("g2");
        assert_eq!(next.game_id(), "g2");
        assert!(old_state.borrow().is_closed());

        let mut second = accept(&mut listener).await;
        assert_eq!(second.game_id, "g2");
        assert!(next_command(&mut second).await.is_join());
        assert_eq!(timeout(WAIT, first.recv_command()).await.unwrap(), None);

        host.unmount();
        assert!(host.current().is_none());
    }
}
