//! Tests against a bare tty target, observing the wire from the client side.

use std::os::fd::OwnedFd;
use std::time::Duration;

use bin_expect::{BinSession, BinaryTransport, Engine, LineEnding, Pattern, TtyTarget};
use rustix::fs::{OFlags, fcntl_setfl};
use rustix::termios::{self, OptionalActions};

/// Stop the line discipline from interpreting anything on this terminal.
fn make_raw(client: &OwnedFd) {
    let mut mode = termios::tcgetattr(client).unwrap();
    mode.make_raw();
    termios::tcsetattr(client, OptionalActions::Now, &mode).unwrap();
}

/// Collect at least `want` bytes from a non-blocking descriptor.
async fn read_at_least(fd: &OwnedFd, want: usize) -> Vec<u8> {
    let mut collected = Vec::new();
    for _ in 0..200 {
        let mut buf = [0u8; 256];
        match rustix::io::read(fd, &mut buf) {
            Ok(n) => collected.extend_from_slice(&buf[..n]),
            Err(rustix::io::Errno::AGAIN) => {}
            Err(e) => panic!("client read failed: {e:?}"),
        }
        if collected.len() >= want {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    collected
}

#[tokio::test]
async fn escaped_bytes_reach_a_raw_client_verbatim() {
    let target = TtyTarget::open().unwrap();
    let client = target.open_client().unwrap();
    make_raw(&client);
    fcntl_setfl(&client, OFlags::NONBLOCK).unwrap();

    let mut session = BinSession::new(target);
    session.sendbin(b"abcd").await.unwrap();

    let wire = read_at_least(&client, 8).await;
    assert_eq!(wire, [0x16, 0x61, 0x16, 0x62, 0x16, 0x63, 0x16, 0x64]);
}

#[tokio::test]
async fn canonical_client_sees_the_unescaped_payload() {
    let target = TtyTarget::open().unwrap();
    let client = target.open_client().unwrap();
    fcntl_setfl(&client, OFlags::NONBLOCK).unwrap();

    let mut session = BinSession::new(target);
    session.engine_mut().set_echo(false).unwrap();
    session.sendbinline(b"abcd").await.unwrap();

    // The line discipline strips every escape marker on delivery.
    let payload = read_at_least(&client, 5).await;
    assert_eq!(&payload[..5], b"abcd\n");
}

#[tokio::test]
async fn translation_toggles_round_trip_and_track_the_terminator() {
    let target = TtyTarget::open().unwrap();
    let mut session = BinSession::new(target);

    let before = termios::tcgetattr(session.engine().tty()).unwrap();
    assert_eq!(session.line_ending(), LineEnding::CrLf);

    session.set_nonlcr().unwrap();
    assert_eq!(session.line_ending(), LineEnding::Lf);

    session.set_nlcr().unwrap();
    assert_eq!(session.line_ending(), LineEnding::CrLf);

    session.restore_mode().unwrap();
    session.restore_mode().unwrap();
    assert_eq!(session.mode_depth(), 0);

    let after = termios::tcgetattr(session.engine().tty()).unwrap();
    assert_eq!(before.output_modes, after.output_modes);
    assert_eq!(before.input_modes, after.input_modes);
    assert_eq!(before.local_modes, after.local_modes);
}

#[tokio::test]
async fn expect_matches_what_the_client_writes() {
    let target = TtyTarget::open().unwrap();
    let client = target.open_client().unwrap();

    let mut session = BinSession::new(target);
    rustix::io::write(&client, b"hello marker tail\n").unwrap();

    let matched = session
        .expect(&b"marker"[..], Some(Duration::from_secs(10)))
        .await
        .unwrap();
    assert_eq!(matched, b"marker");
}

#[tokio::test]
async fn a_bare_tty_has_no_termination_status() {
    let target = TtyTarget::open().unwrap();
    let mut session = BinSession::new(target);

    assert!(session.engine_mut().is_alive());
    assert_eq!(session.engine().exit_status(), None);
    assert_eq!(session.engine().signal_status(), None);
    assert!(session.engine().tty_name().starts_with("/dev/"));
}

#[tokio::test]
async fn eof_from_a_bare_tty_propagates() {
    let target = TtyTarget::open().unwrap();
    let client = target.open_client().unwrap();

    let mut session = BinSession::new(target);
    rustix::io::write(&client, b"leftovers").unwrap();
    drop(client);

    let err = session
        .expect(&b"never"[..], Some(Duration::from_secs(10)))
        .await
        .unwrap_err();
    assert!(err.is_eof());
}
