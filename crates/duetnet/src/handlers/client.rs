//! Client-side handlers.

use duetnet_protocol::{Message, Tag};
use duetnet_replication::Pose;
use duetnet_transport::ConnectionId;

use crate::dispatch::DispatchTable;
use crate::manager::NetContext;

pub(crate) fn register(table: &mut DispatchTable<NetContext>) {
    super::register_common(table);
    table.register(Tag::IdentityRequest, on_identity_reply);
    table.register(Tag::RosterEntry, on_roster_entry);
    table.register(Tag::Spawn, on_spawn);
    table.register(Tag::Delete, on_delete);
    table.register(Tag::Chat, on_chat);
    for tag in [Tag::GameState, Tag::TimeSync, Tag::ScoreSync] {
        table.register(tag, on_match_update);
    }
}

fn on_identity_reply(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::IdentityRequest(reply)) = msg else {
        return;
    };
    ctx.local_peer = reply.owner;
    ctx.directory.set_local_peer(reply.owner);
    tracing::info!(peer = %reply.owner, username = %reply.username, "identified by server");
}

/// The server resends the whole roster on every join, so only lines for
/// peers not seen before are announced.
fn on_roster_entry(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::RosterEntry(entry)) = msg else {
        return;
    };
    let is_new = ctx.roster.record_remote(entry.owner, &entry.username);

    let is_local = !ctx.local_peer.is_unowned() && entry.owner == ctx.local_peer;
    if is_local {
        if !ctx.greeted {
            ctx.greeted = true;
            ctx.chat.user_connected(&entry.username, true);
        }
    } else if is_new {
        ctx.chat.user_connected(&entry.username, false);
    }
}

fn on_spawn(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::Spawn(spawn)) = msg else {
        return;
    };
    ctx.directory.spawn(
        spawn.kind,
        spawn.owner,
        spawn.agent_id,
        Pose::new(spawn.position, spawn.rotation),
    );
}

/// With a payload: drop every agent of that owner. Without one: the link
/// to the server is gone, and there is nothing to clean up here.
fn on_delete(ctx: &mut NetContext, conn: ConnectionId, msg: Option<&Message>) {
    match msg {
        Some(Message::Delete(delete)) => {
            let removed = ctx.directory.delete_by_owner(delete.owner);
            tracing::debug!(owner = %delete.owner, count = removed.len(), "agents deleted");
        }
        Some(_) => {}
        None => tracing::warn!(%conn, "lost connection to server"),
    }
}

fn on_chat(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::Chat(chat)) = msg else {
        return;
    };
    let name = if !chat.sender.is_unowned() && chat.sender == ctx.local_peer {
        Some("you")
    } else {
        ctx.roster.username(chat.sender)
    };
    match name {
        Some(name) => ctx.chat.display(&chat.text, name),
        None => tracing::debug!(sender = %chat.sender, "chat from unknown sender dropped"),
    }
}

fn on_match_update(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    if let Some(msg) = msg {
        super::apply_match_update(ctx, msg);
    }
}
