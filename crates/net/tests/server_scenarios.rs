//! End-to-end scenarios against an in-process server.
//!
//! Each test starts its own server on an ephemeral port and drives it with
//! real clients minting HS256 tokens.

use std::net::SocketAddr;
use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Map, Value};

use tearoom_core::event::{ChoicePreset, ChoiceSpec, ClientEvent, ErrorKind, ServerEvent};
use tearoom_net::auth::IdentityClaims;
use tearoom_net::{Client, Error, Server, TokenVerifier};

const SECRET: &[u8] = b"scenario-secret";
const EVENT_WAIT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(400);

fn mint_with_expiry(username: &str, offset: i64) -> String {
    let claims = IdentityClaims {
        username: username.to_string(),
        exp: (Utc::now().timestamp() + offset) as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET),
    )
    .unwrap()
}

fn mint(username: &str) -> String {
    mint_with_expiry(username, 3600)
}

async fn start_server() -> Server {
    Server::start(0, TokenVerifier::hs256_from_secret(SECRET))
        .await
        .unwrap()
}

async fn connect(addr: SocketAddr, username: &str) -> Client {
    Client::connect(addr, mint(username)).await.unwrap()
}

async fn next(client: &mut Client) -> ServerEvent {
    client.expect_event(EVENT_WAIT).await.unwrap()
}

async fn assert_silent(client: &mut Client) {
    match client.expect_event(SILENCE).await {
        Err(Error::Timeout) => {}
        Ok(event) => panic!("Expected silence, got {:?}", event),
        Err(e) => panic!("Connection failed: {}", e),
    }
}

fn text_body(text: &str) -> Map<String, Value> {
    let mut body = Map::new();
    body.insert("text".to_string(), Value::String(text.to_string()));
    body
}

#[tokio::test]
async fn join_replays_snapshot_then_history() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("lobby").await.unwrap();

    match next(&mut alice).await {
        ServerEvent::RoomInfo { room, users } => {
            assert_eq!(room.config.owner, "alice");
            assert_eq!(room.config.capacity, 10);
            assert!(room.title.ends_with("の部屋"));
            assert!(users.contains_key("alice"));
        }
        other => panic!("Expected roomInfo first, got {:?}", other),
    }
    match next(&mut alice).await {
        ServerEvent::Join { username, .. } => assert_eq!(username, "alice"),
        other => panic!("Expected own join, got {:?}", other),
    }

    alice
        .send(ClientEvent::Message {
            body: text_body("hello"),
        })
        .await
        .unwrap();
    match next(&mut alice).await {
        ServerEvent::Message { username, body } => {
            assert_eq!(username, "alice");
            assert_eq!(body.get("text"), Some(&json!("hello")));
        }
        other => panic!("Expected message echo, got {:?}", other),
    }

    // Bob joins with a profile; Alice sees it on his join event.
    let mut bob = connect(server.addr(), "bob").await;
    bob.send(ClientEvent::Join {
        room: "lobby".to_string(),
        info: json!({"avatar": "cat"}),
    })
    .await
    .unwrap();

    match next(&mut alice).await {
        ServerEvent::Join { username, info, .. } => {
            assert_eq!(username, "bob");
            assert_eq!(info, json!({"avatar": "cat"}));
        }
        other => panic!("Expected bob's join, got {:?}", other),
    }

    // Bob's replay: snapshot with both profiles, then the recorded events
    // in order, then his own join.
    match next(&mut bob).await {
        ServerEvent::RoomInfo { users, .. } => {
            assert_eq!(users.get("alice"), Some(&Value::Null));
            assert_eq!(users.get("bob"), Some(&json!({"avatar": "cat"})));
        }
        other => panic!("Expected roomInfo first, got {:?}", other),
    }
    assert!(matches!(next(&mut bob).await, ServerEvent::Join { .. }));
    assert!(matches!(next(&mut bob).await, ServerEvent::Message { .. }));
    match next(&mut bob).await {
        ServerEvent::Join { username, .. } => assert_eq!(username, "bob"),
        other => panic!("Expected own join last, got {:?}", other),
    }

    server.shutdown();
}

#[tokio::test]
async fn relayed_messages_carry_the_verified_sender() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("parlor").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("parlor").await.unwrap();
    next(&mut alice).await; // bob's join
    for _ in 0..3 {
        next(&mut bob).await;
    }

    // The payload claims to be mallory; the broadcast says otherwise.
    let mut body = text_body("the check is in the mail");
    body.insert(
        "username".to_string(),
        Value::String("mallory".to_string()),
    );
    alice.send(ClientEvent::Message { body }).await.unwrap();

    match next(&mut bob).await {
        ServerEvent::Message { username, body } => {
            assert_eq!(username, "alice");
            assert_eq!(body.get("text"), Some(&json!("the check is in the mail")));
            assert!(!body.contains_key("username"));
        }
        other => panic!("Expected alice's message, got {:?}", other),
    }
    next(&mut alice).await;

    // History replays it under the verified name as well.
    let mut carol = connect(server.addr(), "carol").await;
    carol.join("parlor").await.unwrap();
    next(&mut carol).await; // roomInfo
    next(&mut carol).await; // alice's join
    next(&mut carol).await; // bob's join
    match next(&mut carol).await {
        ServerEvent::Message { username, body } => {
            assert_eq!(username, "alice");
            assert!(!body.contains_key("username"));
        }
        other => panic!("Expected replayed message, got {:?}", other),
    }

    server.shutdown();
}

#[tokio::test]
async fn full_room_turns_away_new_members() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("pod").await.unwrap();
    next(&mut alice).await; // roomInfo
    next(&mut alice).await; // own join

    alice
        .send(ClientEvent::SetCapacity { capacity: 2 })
        .await
        .unwrap();
    match next(&mut alice).await {
        ServerEvent::SetCapacity { capacity, username } => {
            assert_eq!(capacity, 2);
            assert_eq!(username, "alice");
        }
        other => panic!("Expected setCapacity, got {:?}", other),
    }

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("pod").await.unwrap();
    match next(&mut alice).await {
        ServerEvent::Join { username, .. } => assert_eq!(username, "bob"),
        other => panic!("Expected bob's join, got {:?}", other),
    }

    // Third seat does not exist.
    let mut carol = connect(server.addr(), "carol").await;
    carol.join("pod").await.unwrap();
    match next(&mut carol).await {
        ServerEvent::Error { error } => assert_eq!(error, ErrorKind::Filled),
        other => panic!("Expected filled error, got {:?}", other),
    }
    assert_silent(&mut alice).await;

    server.shutdown();
}

#[tokio::test]
async fn capacity_changes_are_owner_only() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("attic").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("attic").await.unwrap();
    next(&mut alice).await; // bob's join

    // Not the owner: dropped without a reply.
    bob.send(ClientEvent::SetCapacity { capacity: 2 })
        .await
        .unwrap();
    assert_silent(&mut alice).await;

    // Out of bounds: dropped even for the owner.
    alice
        .send(ClientEvent::SetCapacity { capacity: 50 })
        .await
        .unwrap();
    assert_silent(&mut alice).await;

    server.shutdown();
}

#[tokio::test]
async fn quorum_opens_ballot_with_tally() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("diet").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("diet").await.unwrap();
    next(&mut alice).await; // bob's join
    for _ in 0..3 {
        next(&mut bob).await; // roomInfo, alice's join, own join
    }

    alice
        .send(ClientEvent::PutBallotBox {
            title: "snack?".to_string(),
            choices: ChoiceSpec::Preset(ChoicePreset::Yes),
            notify_votes: true,
            anonymous: false,
            timer: None,
        })
        .await
        .unwrap();
    let ballot_id = match next(&mut alice).await {
        ServerEvent::PutBallotBox { id, username, .. } => {
            assert_eq!(username, "alice");
            assert!(id.starts_with("alice/"));
            id
        }
        other => panic!("Expected putBallotBox, got {:?}", other),
    };
    next(&mut bob).await; // same putBallotBox

    // First vote: notice only, quorum not reached.
    alice
        .send(ClientEvent::UpdateBallotBox {
            id: ballot_id.clone(),
            vote: "Yes".to_string(),
        })
        .await
        .unwrap();
    match next(&mut alice).await {
        ServerEvent::UpdateBallotBox { username, .. } => assert_eq!(username, "alice"),
        other => panic!("Expected vote notice, got {:?}", other),
    }
    next(&mut bob).await;

    // Second vote completes quorum: the open lands before the notice.
    bob.send(ClientEvent::UpdateBallotBox {
        id: ballot_id.clone(),
        vote: "No".to_string(),
    })
    .await
    .unwrap();
    match next(&mut alice).await {
        ServerEvent::OpenBallotBox {
            id, votes, result, ..
        } => {
            assert_eq!(id, ballot_id);
            assert_eq!(votes.get("alice"), Some(&"Yes".to_string()));
            assert_eq!(votes.get("bob"), Some(&"No".to_string()));
            assert_eq!(result.get("Yes"), Some(&1));
            assert_eq!(result.get("No"), Some(&1));
        }
        other => panic!("Expected quorum open, got {:?}", other),
    }
    match next(&mut alice).await {
        ServerEvent::UpdateBallotBox { username, .. } => assert_eq!(username, "bob"),
        other => panic!("Expected trailing notice, got {:?}", other),
    }

    server.shutdown();
}

#[tokio::test]
async fn envelope_timer_reveals_once() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("attic").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    alice
        .send(ClientEvent::PutEnvelope {
            title: "gift".to_string(),
            secret: "cake".to_string(),
            timer: Some(2),
        })
        .await
        .unwrap();
    match next(&mut alice).await {
        ServerEvent::PutEnvelope { title, timer, .. } => {
            assert_eq!(title, "gift");
            assert_eq!(timer, Some(2));
        }
        other => panic!("Expected putEnvelope, got {:?}", other),
    }

    // The secret arrives on its own once the timer runs out.
    match alice.expect_event(Duration::from_secs(4)).await.unwrap() {
        ServerEvent::RevealEnvelope { secret, creator, .. } => {
            assert_eq!(secret, "cake");
            assert_eq!(creator, "alice");
        }
        other => panic!("Expected timed reveal, got {:?}", other),
    }

    // And never a second time.
    match alice.expect_event(Duration::from_millis(2500)).await {
        Err(Error::Timeout) => {}
        Ok(event) => panic!("Expected no further reveal, got {:?}", event),
        Err(e) => panic!("Connection failed: {}", e),
    }

    server.shutdown();
}

#[tokio::test]
async fn envelope_reveal_is_creator_only() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("vault").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("vault").await.unwrap();
    next(&mut alice).await;
    for _ in 0..3 {
        next(&mut bob).await;
    }

    alice
        .send(ClientEvent::PutEnvelope {
            title: "combo".to_string(),
            secret: "1234".to_string(),
            timer: None,
        })
        .await
        .unwrap();
    let envelope_id = match next(&mut alice).await {
        ServerEvent::PutEnvelope { id, .. } => id,
        other => panic!("Expected putEnvelope, got {:?}", other),
    };
    next(&mut bob).await;

    // Bob is not the creator, so his request is dropped.
    bob.send(ClientEvent::RevealEnvelope {
        id: envelope_id.clone(),
    })
    .await
    .unwrap();
    assert_silent(&mut alice).await;

    // The creator's request works, exactly once.
    alice
        .send(ClientEvent::RevealEnvelope {
            id: envelope_id.clone(),
        })
        .await
        .unwrap();
    match next(&mut bob).await {
        ServerEvent::RevealEnvelope { secret, .. } => assert_eq!(secret, "1234"),
        other => panic!("Expected reveal, got {:?}", other),
    }
    next(&mut alice).await;

    alice
        .send(ClientEvent::RevealEnvelope { id: envelope_id })
        .await
        .unwrap();
    assert_silent(&mut bob).await;

    server.shutdown();
}

#[tokio::test]
async fn leave_drops_membership_but_not_the_connection() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("tatami").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("tatami").await.unwrap();
    next(&mut alice).await;
    for _ in 0..3 {
        next(&mut bob).await;
    }

    bob.send(ClientEvent::Leave).await.unwrap();
    match next(&mut alice).await {
        ServerEvent::Leave { username } => assert_eq!(username, "bob"),
        other => panic!("Expected leave, got {:?}", other),
    }
    next(&mut bob).await;

    // A former member's chatter goes nowhere.
    bob.send(ClientEvent::Message {
        body: text_body("still here?"),
    })
    .await
    .unwrap();
    assert_silent(&mut alice).await;

    // But his connection still listens in on the room he left.
    alice
        .send(ClientEvent::Message {
            body: text_body("peace at last"),
        })
        .await
        .unwrap();
    match next(&mut bob).await {
        ServerEvent::Message { username, .. } => assert_eq!(username, "alice"),
        other => panic!("Expected alice's message, got {:?}", other),
    }

    server.shutdown();
}

#[tokio::test]
async fn destroyed_room_lives_through_the_grace_window() {
    let server = start_server().await;

    let mut alice = connect(server.addr(), "alice").await;
    alice.join("doomed").await.unwrap();
    next(&mut alice).await;
    next(&mut alice).await;

    let mut bob = connect(server.addr(), "bob").await;
    bob.join("doomed").await.unwrap();
    next(&mut alice).await;
    for _ in 0..3 {
        next(&mut bob).await;
    }

    // Only the owner's destroy counts.
    bob.send(ClientEvent::DestroyRoom).await.unwrap();
    assert_silent(&mut alice).await;

    alice.send(ClientEvent::DestroyRoom).await.unwrap();
    match next(&mut alice).await {
        ServerEvent::DestroyRoom { username } => assert_eq!(username, "alice"),
        other => panic!("Expected destroy announcement, got {:?}", other),
    }
    match next(&mut bob).await {
        ServerEvent::DestroyRoom { username } => assert_eq!(username, "alice"),
        other => panic!("Expected destroy announcement, got {:?}", other),
    }

    // Inside the grace window the room still works.
    tokio::time::sleep(Duration::from_secs(1)).await;
    bob.send(ClientEvent::Message {
        body: text_body("last words"),
    })
    .await
    .unwrap();
    assert!(matches!(next(&mut alice).await, ServerEvent::Message { .. }));
    next(&mut bob).await;

    // Once the window closes the name maps to a brand-new room.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(server.room_count().await, 0);

    let mut carol = connect(server.addr(), "carol").await;
    carol.join("doomed").await.unwrap();
    match next(&mut carol).await {
        ServerEvent::RoomInfo { room, users } => {
            assert_eq!(room.config.owner, "carol");
            assert_eq!(users.len(), 1);
        }
        other => panic!("Expected fresh room, got {:?}", other),
    }
    assert_silent(&mut bob).await;

    server.shutdown();
}

#[tokio::test]
async fn rejected_tokens_get_verification_errors() {
    let server = start_server().await;

    // Not a token at all.
    let mut mallory = Client::connect(server.addr(), "garbage").await.unwrap();
    mallory.join("lobby").await.unwrap();
    match next(&mut mallory).await {
        ServerEvent::Error { error } => assert_eq!(error, ErrorKind::Verification),
        other => panic!("Expected verification error, got {:?}", other),
    }

    // Expired.
    let mut stale = Client::connect(server.addr(), mint_with_expiry("alice", -3600))
        .await
        .unwrap();
    stale.join("lobby").await.unwrap();
    match next(&mut stale).await {
        ServerEvent::Error { error } => assert_eq!(error, ErrorKind::Verification),
        other => panic!("Expected verification error, got {:?}", other),
    }

    // Heartbeats need no identity.
    mallory.heartbeat().await.unwrap();
    assert!(matches!(next(&mut mallory).await, ServerEvent::Heartbeat));

    // Neither failed join created a room.
    assert_eq!(server.room_count().await, 0);

    server.shutdown();
}
