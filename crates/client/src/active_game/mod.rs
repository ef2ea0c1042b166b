//! Dioxus bindings: a provider that owns the live session for a game and
//! hooks that read it.
//!
//! ```rust,ignore
//! rsx! {
//!     ActiveGameProvider { game_id: "g1", config: SessionConfig::admin(),
//!         AdminConsole {}
//!     }
//! }
//!
//! fn AdminConsole() -> Element {
//!     let game = use_active_game();
//!     let question = game.active_question();
//!     rsx! {
//!         button { onclick: move |_| game.commands().show_answers(), "Show answers" }
//!     }
//! }
//! ```

mod hooks;
mod provider;

use std::sync::Arc;

use dioxus::prelude::*;
use quizroom_shared::{ClientCommand, GameId, Player, PlayerAnswer, Question};
use tokio::sync::watch;

use crate::session::{CommandSender, Diagnostic, GameSession};
use crate::stores::Projection;
use crate::ws::ConnectionState;

pub use hooks::{try_use_active_game, use_active_game, use_connection_state};
pub use provider::{ActiveGameProvider, SharedConnector};

/// Session context provided to everything under [`ActiveGameProvider`].
///
/// Reads are reactive: a component re-renders when the projection,
/// connection state or diagnostic it read changes.
#[derive(Clone, Copy)]
pub struct ActiveGame {
    game_id: CopyValue<GameId>,
    projection: Signal<Arc<Projection>>,
    connection: Signal<ConnectionState>,
    diagnostic: Signal<Option<Diagnostic>>,
    sender: CopyValue<CommandSender>,
}

impl ActiveGame {
    /// Mirror `session` into signals owned by the current scope.
    pub(crate) fn attach(session: &GameSession) -> Self {
        let game = Self {
            game_id: CopyValue::new(session.game_id().to_string()),
            projection: Signal::new(session.projection()),
            connection: Signal::new(session.connection_state()),
            diagnostic: Signal::new(session.last_diagnostic()),
            sender: CopyValue::new(session.sender()),
        };
        bridge(session.subscribe(), game.projection);
        bridge(session.watch_connection(), game.connection);
        bridge(session.watch_diagnostics(), game.diagnostic);
        game
    }

    pub fn game_id(&self) -> GameId {
        self.game_id.read().clone()
    }

    /// The whole projection as of the last accepted event.
    pub fn projection(&self) -> Arc<Projection> {
        self.projection.read().clone()
    }

    /// Players ordered by id.
    pub fn players(&self) -> Vec<Player> {
        self.projection.read().players.values().cloned().collect()
    }

    pub fn all_questions(&self) -> Vec<Question> {
        self.projection.read().all_questions.clone()
    }

    pub fn active_question(&self) -> Option<Question> {
        self.projection.read().active_question().cloned()
    }

    pub fn answers_for(&self, question_id: &str) -> Vec<PlayerAnswer> {
        self.projection
            .read()
            .answers_for(question_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.read()
    }

    pub fn last_diagnostic(&self) -> Option<Diagnostic> {
        self.diagnostic.read().clone()
    }

    /// Typed command helpers for this session.
    pub fn commands(&self) -> CommandSender {
        self.sender.read().clone()
    }

    /// Queue a command for the server. Never fails; see [`CommandSender`].
    pub fn send_message(&self, command: ClientCommand) {
        self.sender.read().send(command);
    }
}

/// Forward every value published on `rx` into `target`. The task belongs to
/// the current scope and stops with it.
fn bridge<T: Clone + 'static>(mut rx: watch::Receiver<T>, mut target: Signal<T>) {
    spawn(async move {
        while rx.changed().await.is_ok() {
            let value = rx.borrow_and_update().clone();
            target.set(value);
        }
    });
}
