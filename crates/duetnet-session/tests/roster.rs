use std::time::Duration;

use duetnet_protocol::PeerId;
use duetnet_session::{EnterOutcome, Identified, PeerState, Roster, SessionError};
use duetnet_transport::ConnectionId;
use tokio::time::Instant;

fn conn(id: u64) -> ConnectionId {
    ConnectionId::new(id)
}

#[test]
fn test_match_fills_at_second_entrant_only() {
    let mut roster = Roster::new();
    let alice = roster.identify(conn(1), "alice").peer();
    let bob = roster.identify(conn(2), "bob").peer();
    let carol = roster.identify(conn(3), "carol").peer();

    assert_eq!(
        roster.enter_game(alice),
        Ok(EnterOutcome::Entered { order: 0, match_ready: false })
    );
    assert_eq!(
        roster.enter_game(bob),
        Ok(EnterOutcome::Entered { order: 1, match_ready: true })
    );
    assert_eq!(
        roster.enter_game(carol),
        Ok(EnterOutcome::Entered { order: 2, match_ready: false })
    );
    assert_eq!(roster.enter_game(bob), Ok(EnterOutcome::AlreadyInGame));
    assert_eq!(roster.in_game(), &[alice, bob, carol]);
}

#[test]
fn test_disconnect_keeps_name_and_match_slot() {
    let mut roster = Roster::new();
    let alice = roster.identify(conn(1), "alice").peer();
    let bob = roster.identify(conn(2), "bob").peer();
    roster.enter_game(alice).unwrap();

    assert_eq!(roster.disconnect(conn(1)), Some(alice));
    assert_eq!(roster.disconnect(conn(1)), None);

    assert_eq!(roster.username(alice), Some("alice"));
    assert_eq!(roster.get(alice).map(|r| r.state), Some(PeerState::Disconnected));
    assert_eq!(roster.peer_for(conn(1)), None);
    assert_eq!(roster.in_game(), &[alice]);
    assert_eq!(roster.connected().collect::<Vec<_>>(), vec![(bob, "bob")]);

    // alice's slot still counts, so bob completes the match
    assert_eq!(
        roster.enter_game(bob),
        Ok(EnterOutcome::Entered { order: 1, match_ready: true })
    );
    assert_eq!(roster.enter_game(alice), Err(SessionError::Disconnected(alice)));
}

#[test]
fn test_peer_ids_are_not_reused_after_disconnect() {
    let mut roster = Roster::new();
    roster.identify(conn(1), "alice");
    roster.disconnect(conn(1));
    assert_eq!(roster.identify(conn(1), "alice"), Identified::New(PeerId(2)));
    assert_eq!(roster.len(), 2);
}

#[test]
fn test_unknown_peer_cannot_enter() {
    let mut roster = Roster::new();
    assert_eq!(
        roster.enter_game(PeerId(9)),
        Err(SessionError::UnknownPeer(PeerId(9)))
    );
    assert!(roster.is_empty());
}

#[test]
fn test_client_side_roster_lines() {
    let mut roster = Roster::new();
    assert!(roster.record_remote(PeerId(1), "alice"));
    assert!(roster.record_remote(PeerId(2), "bob"));
    assert!(!roster.record_remote(PeerId(1), "alice"));
    assert_eq!(roster.username(PeerId(2)), Some("bob"));
}

#[tokio::test(start_paused = true)]
async fn test_touch_records_last_ping() {
    let mut roster = Roster::new();
    let alice = roster.identify(conn(1), "alice").peer();
    assert!(roster.get(alice).unwrap().last_ping.is_none());

    tokio::time::advance(Duration::from_secs(5)).await;
    let now = Instant::now();
    roster.touch(alice, now);
    roster.touch(PeerId(42), now);

    assert_eq!(roster.get(alice).unwrap().last_ping, Some(now));
    assert_eq!(roster.len(), 1);
}
