//! Session hooks for Dioxus components.
//!
//! Components never touch the connection directly. They read the projection
//! through these hooks and issue commands through [`ActiveGame`].

use dioxus::prelude::*;

use super::ActiveGame;
use crate::error::MissingProviderError;
use crate::ws::ConnectionState;

fn lookup(hook: &'static str) -> Result<ActiveGame, MissingProviderError> {
    try_use_context::<ActiveGame>().ok_or(MissingProviderError { hook })
}

/// Like [`use_active_game`], but reports a missing provider as an error.
pub fn try_use_active_game() -> Result<ActiveGame, MissingProviderError> {
    lookup("use_active_game")
}

/// Hook to get the session of the enclosing [`ActiveGameProvider`].
///
/// # Panics
/// When the component is not rendered inside an `ActiveGameProvider`.
///
/// [`ActiveGameProvider`]: super::ActiveGameProvider
pub fn use_active_game() -> ActiveGame {
    match try_use_active_game() {
        Ok(game) => game,
        Err(e) => panic!("{}", e),
    }
}

/// Hook to get the connection state of the enclosing session.
///
/// # Returns
/// The current connection state (reactive - updates when state changes)
pub fn use_connection_state() -> ConnectionState {
    match lookup("use_connection_state") {
        Ok(game) => game.connection_state(),
        Err(e) => panic!("{}", e),
    }
}
