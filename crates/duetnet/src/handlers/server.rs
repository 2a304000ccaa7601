//! Server-side handlers.

use duetnet_protocol::{
    AgentId, AgentKind, Chat, Delete, Group, IdentityRequest, Message, RosterEntry, Tag,
};
use duetnet_replication::Pose;
use duetnet_session::{EnterOutcome, Identified};
use duetnet_transport::ConnectionId;
use tokio::time::Instant;

use crate::dispatch::DispatchTable;
use crate::manager::NetContext;

/// Broadcast when a peer enters and the match is not yet full.
pub(crate) const STARTED_TEXT: &str = "<i>has started the game!</i>";

pub(crate) fn register(table: &mut DispatchTable<NetContext>) {
    super::register_common(table);
    table.register(Tag::IdentityRequest, on_identity);
    table.register(Tag::EnterGame, on_enter_game);
    table.register(Tag::Delete, on_delete);
    table.register(Tag::Ping, on_ping);
    table.register(Tag::Chat, on_chat);
    for tag in [Tag::GameState, Tag::TimeSync, Tag::ScoreSync] {
        table.register(tag, on_match_update);
    }
}

/// Assigns a peer ID, echoes it back, then sends the whole roster to
/// everyone.
fn on_identity(ctx: &mut NetContext, conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::IdentityRequest(req)) = msg else {
        return;
    };

    let identified = ctx.roster.identify(conn, &req.username);
    let peer = identified.peer();
    let username = ctx.roster.username(peer).unwrap_or_default().to_string();

    ctx.send_to(
        conn,
        IdentityRequest {
            owner: peer,
            username: username.clone(),
        },
    );

    let roster: Group = ctx
        .roster
        .connected()
        .map(|(owner, name)| {
            Message::from(RosterEntry {
                owner,
                username: name.to_string(),
            })
        })
        .collect();
    ctx.broadcast(roster);

    if let Identified::New(_) = identified {
        ctx.chat.user_connected(&username, false);
    }
}

/// Moves the sender into the match. The entrant that fills it triggers
/// the spawn of one agent per player.
fn on_enter_game(ctx: &mut NetContext, conn: ConnectionId, _msg: Option<&Message>) {
    let Some(peer) = ctx.roster.peer_for(conn) else {
        tracing::warn!(%conn, "enter game from unidentified connection ignored");
        return;
    };

    let match_ready = match ctx.roster.enter_game(peer) {
        Ok(EnterOutcome::Entered { match_ready, .. }) => match_ready,
        Ok(EnterOutcome::AlreadyInGame) => {
            tracing::debug!(%peer, "peer already in game");
            return;
        }
        Err(e) => {
            tracing::warn!(%peer, error = %e, "enter game refused");
            return;
        }
    };

    if !match_ready {
        ctx.broadcast(Chat {
            sender: peer,
            text: STARTED_TEXT.to_string(),
        });
        return;
    }

    let players = ctx.roster.in_game().to_vec();
    for (order, owner) in players.into_iter().enumerate() {
        let Some(kind) = AgentKind::for_entry_order(order) else {
            continue;
        };
        ctx.directory
            .spawn(kind, owner, AgentId::default(), Pose::origin());
    }

    let spawns: Group = ctx.directory.spawn_messages().into_iter().collect();
    tracing::info!(agents = spawns.len(), "match full, spawning agents");
    ctx.broadcast(spawns);
}

/// Removes everything the departing peer owned and tells the others.
///
/// Runs both for an explicit Delete and for the payload-less one the node
/// synthesizes on disconnect. Either way the sender is resolved from the
/// connection, not from the message.
///
/// An explicit Delete ends the sender's session even though its connection
/// stays open. The connection is unidentified from then on: its Ping and
/// EnterGame are ignored, and identifying again allocates a new peer ID.
/// The old peer's name is kept so its chat lines still resolve.
fn on_delete(ctx: &mut NetContext, conn: ConnectionId, _msg: Option<&Message>) {
    let Some(peer) = ctx.roster.disconnect(conn) else {
        tracing::debug!(%conn, "unidentified connection left");
        return;
    };

    let removed = ctx.directory.delete_by_owner(peer);
    if removed.is_empty() {
        return;
    }
    tracing::info!(%peer, count = removed.len(), "deleted agents of departed peer");

    let deletes: Group = removed
        .into_iter()
        .map(|agent_id| {
            Message::from(Delete {
                owner: peer,
                agent_id,
            })
        })
        .collect();
    ctx.broadcast(deletes);
}

fn on_ping(ctx: &mut NetContext, conn: ConnectionId, _msg: Option<&Message>) {
    if let Some(peer) = ctx.roster.peer_for(conn) {
        ctx.roster.touch(peer, Instant::now());
        tracing::trace!(%peer, "ping");
    }
}

/// Relays a chat line to everyone, then shows it locally.
fn on_chat(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    let Some(Message::Chat(chat)) = msg else {
        return;
    };
    ctx.broadcast(chat.clone());
    if let Some(name) = ctx.roster.username(chat.sender) {
        ctx.chat.display(&chat.text, name);
    }
}

/// Relays phase, time and score updates, then hands them to the game.
fn on_match_update(ctx: &mut NetContext, _conn: ConnectionId, msg: Option<&Message>) {
    let Some(msg) = msg else {
        return;
    };
    ctx.broadcast(msg.clone());
    super::apply_match_update(ctx, msg);
}
