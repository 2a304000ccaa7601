//! Seams to the game layer.
//!
//! The network layer never renders or runs rules. It reports what arrived
//! through these two traits and the game decides what to do with it. Every
//! method has a no-op default, so a headless process can pass `()`.

use duetnet_protocol::GamePhase;

/// Match state pushed by the server.
pub trait GameHooks: Send {
    fn on_game_state(&mut self, _phase: GamePhase) {}

    /// Seconds left in the round. Whole seconds, as sent on the wire.
    fn on_remaining_time(&mut self, _seconds: f32) {}

    fn on_score(&mut self, _score: i32) {}
}

/// Where chat and roster lines go.
pub trait ChatSink: Send {
    /// A chat line. `name` is the resolved sender: `"you"` for the local
    /// peer, the roster name otherwise.
    fn display(&mut self, _text: &str, _name: &str) {}

    /// A peer finished the handshake. `is_local` is set once, on a client,
    /// for its own entry.
    fn user_connected(&mut self, _name: &str, _is_local: bool) {}
}

impl GameHooks for () {}

impl ChatSink for () {}

/// Writes chat and roster lines to the log. Used by the headless demo.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogChat;

impl ChatSink for LogChat {
    fn display(&mut self, text: &str, name: &str) {
        tracing::info!(name, text, "chat");
    }

    fn user_connected(&mut self, name: &str, is_local: bool) {
        if is_local {
            tracing::info!("you are connected");
        } else {
            tracing::info!("{name} is connected");
        }
    }
}

/// Writes match updates to the log. Used by the headless demo.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHooks;

impl GameHooks for LogHooks {
    fn on_game_state(&mut self, phase: GamePhase) {
        tracing::info!(?phase, "game state");
    }

    fn on_remaining_time(&mut self, seconds: f32) {
        tracing::debug!(seconds, "time remaining");
    }

    fn on_score(&mut self, score: i32) {
        tracing::info!(score, "score");
    }
}
