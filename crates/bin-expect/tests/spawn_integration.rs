//! End-to-end tests against real spawned targets.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use bin_expect::{
    BinSession, BinaryTransport, Engine, InteractivePrompt, Pattern, SpawnedTarget,
    StatusPropagator,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Propagated {
    Exit(i32),
    Raise(i32),
}

struct Recorder(Arc<Mutex<Vec<Propagated>>>);

impl StatusPropagator for Recorder {
    fn exit(&mut self, code: i32) {
        self.0.lock().unwrap().push(Propagated::Exit(code));
    }

    fn raise(&mut self, signal: i32) {
        self.0.lock().unwrap().push(Propagated::Raise(signal));
    }
}

fn recorder() -> (Box<Recorder>, Arc<Mutex<Vec<Propagated>>>) {
    let record = Arc::new(Mutex::new(Vec::new()));
    (Box::new(Recorder(Arc::clone(&record))), record)
}

#[tokio::test]
async fn cat_round_trip() {
    let target = SpawnedTarget::spawn("cat", &[]).await.unwrap();
    let mut session = BinSession::new(target);

    session.send_line(b"ping").await.unwrap();
    let matched = session
        .expect(&b"ping"[..], Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(matched, b"ping");
}

#[tokio::test]
async fn binary_payload_survives_cat() {
    let target = SpawnedTarget::spawn("cat", &[]).await.unwrap();
    let mut session = BinSession::new(target);

    session.engine_mut().set_echo(false).unwrap();
    session.set_nonlcr().unwrap();

    session.sendbinline(b"=\x01\x02=").await.unwrap();
    let matched = session
        .expect(&b"=\x01\x02="[..], Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(matched, b"=\x01\x02=");

    session.restore_mode().unwrap();
}

#[tokio::test]
async fn expectation_times_out_against_a_silent_target() {
    let target = SpawnedTarget::spawn("cat", &[]).await.unwrap();
    let mut session = BinSession::new(target);

    let err = session
        .expect(&b"never"[..], Some(Duration::from_millis(200)))
        .await
        .unwrap_err();
    assert!(err.is_timeout());
    let msg = err.to_string();
    assert!(msg.contains("never"));
}

#[tokio::test]
async fn exit_status_is_reported_and_mirrored() {
    let target = SpawnedTarget::spawn("sh", &["-c", "exit 3"]).await.unwrap();
    // Let the child finish exiting so its status is reapable.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (propagator, record) = recorder();
    let mut session = BinSession::new(target).with_propagator(propagator);

    let result = session
        .try_expect(
            &Pattern::exact(b"never".as_slice()),
            Some(Duration::from_secs(10)),
            None,
            true,
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(record.lock().unwrap().as_slice(), &[Propagated::Exit(3)]);
    assert_eq!(session.engine().exit_status(), Some(3));
    assert_eq!(session.engine().signal_status(), None);
}

#[tokio::test]
async fn signal_death_is_reported_and_reraised() {
    let target = SpawnedTarget::spawn("sh", &["-c", "kill -9 $$"])
        .await
        .unwrap();
    // Let the child finish dying so its status is reapable.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (propagator, record) = recorder();
    let mut session = BinSession::new(target).with_propagator(propagator);

    let result = session
        .try_expect(
            &Pattern::exact(b"never".as_slice()),
            Some(Duration::from_secs(10)),
            None,
            true,
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert_eq!(record.lock().unwrap().as_slice(), &[Propagated::Raise(9)]);
    assert_eq!(session.engine().signal_status(), Some(9));
}

#[tokio::test]
async fn death_is_swallowed_but_not_mirrored_when_asked() {
    let target = SpawnedTarget::spawn("sh", &["-c", "exit 5"]).await.unwrap();
    // Let the child finish exiting so its status is reapable.
    tokio::time::sleep(Duration::from_millis(100)).await;
    let (propagator, record) = recorder();
    let mut session = BinSession::new(target).with_propagator(propagator);

    let result = session
        .try_expect(
            &Pattern::exact(b"never".as_slice()),
            Some(Duration::from_secs(10)),
            None,
            false,
        )
        .await
        .unwrap();

    assert!(result.is_none());
    assert!(record.lock().unwrap().is_empty());
    assert_eq!(session.engine().exit_status(), Some(5));
}

#[tokio::test]
async fn regex_patterns_match_target_output() {
    let target = SpawnedTarget::spawn("sh", &["-c", "echo value=1337"])
        .await
        .unwrap();
    let mut session = BinSession::new(target);

    let matched = session
        .expect(
            Pattern::regex(r"value=\d+").unwrap(),
            Some(Duration::from_secs(10)),
        )
        .await
        .unwrap();
    assert_eq!(matched, b"value=1337");
}
