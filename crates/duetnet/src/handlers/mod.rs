//! Built-in handlers, one set per role.
//!
//! Each handler is a plain function over [`NetContext`], registered into
//! the dispatch table when the manager starts. Handlers never fail: a
//! message that makes no sense in the current state is logged and dropped.

pub(crate) mod client;
pub(crate) mod server;

use duetnet_protocol::{Message, Tag};
use duetnet_replication::Applied;
use duetnet_transport::ConnectionId;

use crate::dispatch::DispatchTable;
use crate::manager::NetContext;

/// Handlers both roles share: Group unpacking and sync application.
fn register_common(table: &mut DispatchTable<NetContext>) {
    table.register(Tag::Group, on_group);
    for tag in [Tag::CharacterSync, Tag::DrawingSync, Tag::PlatformSync] {
        table.register(tag, on_sync);
    }
}

fn on_group(ctx: &mut NetContext, conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::Group(group)) = msg else {
        return;
    };
    tracing::trace!(%conn, count = group.len(), "unpacking group");
    ctx.defer_group(conn, group);
}

fn on_sync(ctx: &mut NetContext, conn: ConnectionId, msg: Option<&Message>) {
    let Some(msg) = msg else {
        return;
    };
    match ctx.coordinator.apply(&mut ctx.directory, msg) {
        Applied::Updated(agent_id) => tracing::trace!(%conn, %agent_id, "sync applied"),
        Applied::OwnedLocally(_) => {}
        Applied::UnknownAgent(agent_id) => {
            tracing::debug!(%conn, %agent_id, "sync for unknown agent dropped");
        }
        Applied::Rejected => tracing::debug!(%conn, tag = %msg.tag(), "sync rejected"),
    }
}

/// Hands a phase, time or score update to the game hooks.
fn apply_match_update(ctx: &mut NetContext, msg: &Message) {
    match msg {
        Message::GameState(m) => ctx.hooks.on_game_state(m.phase),
        Message::TimeSync(m) => ctx.hooks.on_remaining_time(m.remaining_seconds),
        Message::ScoreSync(m) => ctx.hooks.on_score(m.score),
        _ => {}
    }
}
