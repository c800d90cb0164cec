use super::*;
use crate::error::ProtocolError;
use std::num::NonZeroU32;
use std::time::Duration;
use tokio::time::Instant;

#[test]
fn test_parse_wire_commands() {
    assert_eq!(
        Command::from_json(r#"{"cmd":"take_photo","count":3}"#).unwrap(),
        Command::TakePhoto {
            count: NonZeroU32::new(3)
        }
    );
    assert_eq!(
        Command::from_json(r#"{"cmd":"take_video"}"#).unwrap(),
        Command::TakeVideo { count: None }
    );
    assert_eq!(
        Command::from_json(r#"{"cmd":"stop"}"#).unwrap(),
        Command::Stop
    );
}

#[test]
fn test_zero_count_means_maximum() {
    let command = Command::from_json(r#"{"cmd":"take_photo","count":0}"#).unwrap();
    assert_eq!(command, Command::TakePhoto { count: None });
    assert_eq!(command, Command::take_photo(0));
}

#[test]
fn test_malformed_commands_rejected() {
    for raw in [
        r#"{"cmd":"self_destruct"}"#,
        r#"{"cmd":"take_photo","count":-1}"#,
        r#"{"count":2}"#,
        "take_photo",
    ] {
        match Command::from_json(raw) {
            Err(ProtocolError::MalformedCommand { .. }) => {}
            other => panic!("Expected malformed command for {}, got {:?}", raw, other),
        }
    }
}

#[test]
fn test_command_json_round_trip_shape() {
    let json = Command::take_video(2).to_json().unwrap();
    assert_eq!(json, r#"{"cmd":"take_video","count":2}"#);
    assert_eq!(Command::Stop.to_json().unwrap(), r#"{"cmd":"stop"}"#);
}

#[test]
fn test_clamp_count() {
    assert_eq!(clamp_count(None, 3), 3);
    assert_eq!(clamp_count(NonZeroU32::new(2), 3), 2);
    assert_eq!(clamp_count(NonZeroU32::new(3), 3), 3);
    assert_eq!(clamp_count(NonZeroU32::new(50), 3), 3);
}

#[test]
fn test_command_display() {
    assert_eq!(Command::take_photo(4).to_string(), "take_photo(4)");
    assert_eq!(Command::take_video(0).to_string(), "take_video(max)");
    assert_eq!(Command::Stop.to_string(), "stop");
}

#[tokio::test]
async fn test_fifo_delivery_and_ack() {
    let (sender, mut receiver) = command_channel();

    sender.send(Command::take_photo(1)).unwrap();
    sender.send(Command::Stop).unwrap();
    assert_eq!(sender.pending(), 2);

    let first = receiver.recv().await.unwrap();
    assert_eq!(*first.command(), Command::take_photo(1));
    assert_eq!(first.ack(), Command::take_photo(1));
    assert_eq!(sender.pending(), 1);

    let second = receiver.recv().await.unwrap();
    assert_eq!(second.ack(), Command::Stop);
    assert_eq!(sender.pending(), 0);
}

#[tokio::test]
async fn test_drain_waits_for_ack() {
    let (sender, mut receiver) = command_channel();
    sender.send(Command::Stop).unwrap();

    let drainer = sender.clone();
    let drain_task = tokio::spawn(async move { drainer.drain().await });

    tokio::task::yield_now().await;
    assert!(!drain_task.is_finished());

    let delivery = receiver.recv().await.unwrap();
    delivery.ack();

    tokio::time::timeout(Duration::from_secs(1), drain_task)
        .await
        .expect("drain should complete after ack")
        .unwrap();
}

#[tokio::test]
async fn test_dropped_delivery_counts_as_ack() {
    let (sender, mut receiver) = command_channel();
    sender.send(Command::take_video(1)).unwrap();

    let delivery = receiver.recv().await.unwrap();
    drop(delivery);

    assert_eq!(sender.pending(), 0);
    sender.drain().await;
}

#[tokio::test]
async fn test_send_json_rejects_at_boundary() {
    let (sender, mut receiver) = command_channel();

    assert!(sender.send_json(r#"{"cmd":"dance"}"#).is_err());
    assert_eq!(sender.pending(), 0);

    let command = sender.send_json(r#"{"cmd":"take_photo","count":2}"#).unwrap();
    assert_eq!(command, Command::take_photo(2));
    assert_eq!(receiver.recv().await.unwrap().ack(), command);
}

#[tokio::test]
async fn test_send_after_receiver_dropped() {
    let (sender, receiver) = command_channel();
    drop(receiver);

    assert!(sender.is_closed());
    match sender.send(Command::Stop) {
        Err(ProtocolError::ChannelClosed) => {}
        other => panic!("Expected closed channel, got {:?}", other),
    }
    assert_eq!(sender.pending(), 0);
}

#[tokio::test]
async fn test_recv_returns_none_when_senders_gone() {
    let (sender, mut receiver) = command_channel();
    sender.send(Command::Stop).unwrap();
    drop(sender);

    assert!(receiver.recv().await.is_some());
    assert!(receiver.recv().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_recv_until_elapses_at_deadline() {
    let (_sender, mut receiver) = command_channel();

    let start = Instant::now();
    let deadline = start + Duration::from_secs(2);
    match receiver.recv_until(deadline).await {
        CommandPoll::Elapsed => {}
        CommandPoll::Received(delivery) => panic!("Unexpected command {:?}", delivery),
    }
    assert!(Instant::now() >= deadline);
}

#[tokio::test(start_paused = true)]
async fn test_recv_until_keeps_pacing_when_closed() {
    let (sender, mut receiver) = command_channel();
    drop(sender);

    let deadline = Instant::now() + Duration::from_millis(750);
    assert!(matches!(
        receiver.recv_until(deadline).await,
        CommandPoll::Elapsed
    ));
    assert!(Instant::now() >= deadline);
}

#[tokio::test(start_paused = true)]
async fn test_recv_until_returns_queued_command() {
    let (sender, mut receiver) = command_channel();
    sender.send(Command::Stop).unwrap();

    let deadline = Instant::now() + Duration::from_secs(5);
    match receiver.recv_until(deadline).await {
        CommandPoll::Received(delivery) => assert_eq!(delivery.ack(), Command::Stop),
        CommandPoll::Elapsed => panic!("Expected queued command"),
    }
    assert!(Instant::now() < deadline);
}
