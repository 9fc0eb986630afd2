//! Unit tests for [`SessionPool`] using mocked sessions.

use std::{num::NonZeroUsize, sync::Arc};

use rstest::{fixture, rstest};

use super::{SessionPool, SubmitError, SubmitWindow};
use crate::{
    message::{MessageTemplate, OutboundMessage},
    session::{MockSession, Session, SessionId},
    smpp::TransportError,
};

fn window(max: usize) -> Arc<SubmitWindow> {
    Arc::new(SubmitWindow::new(
        NonZeroUsize::new(max).expect("non-zero"),
    ))
}

fn session(id: u64, fails: bool) -> MockSession {
    let mut session = MockSession::new();
    session.expect_id().return_const(SessionId::new(id));
    session.expect_is_alive().return_const(true);
    session.expect_close().returning(|| ());
    session.expect_submit().returning(move |_| {
        if fails {
            Err(TransportError::Closed)
        } else {
            Ok(())
        }
    });
    session
}

#[fixture]
fn message() -> OutboundMessage { MessageTemplate::default().build("MSG 0").expect("encodable") }

#[rstest]
#[tokio::test]
async fn transport_failure_releases_session_and_slot(message: OutboundMessage) {
    let pool = SessionPool::new([session(1, true)], window(1));

    let err = pool.submit(&message).await.expect_err("send fails");
    assert!(matches!(err, SubmitError::Transport(TransportError::Closed)));
    assert_eq!(pool.outstanding(), 0);
    assert_eq!(pool.available_count(), 1);
    assert_eq!(pool.lent_count(), 0);
}

#[rstest]
#[tokio::test]
async fn successful_submit_counts_outstanding(message: OutboundMessage) {
    let pool = SessionPool::new([session(1, false), session(2, false)], window(5));

    pool.submit(&message).await.expect("first");
    pool.submit(&message).await.expect("second");
    assert_eq!(pool.outstanding(), 2);
    assert_eq!(pool.available_count(), 2);

    assert!(pool.acknowledge());
    assert_eq!(pool.outstanding(), 1);
}

#[test]
fn exhausted_pool_fails_fast() {
    let pool = SessionPool::new([session(1, false)], window(1));
    let lent = pool.acquire().expect("idle session");
    assert_eq!(lent.id(), SessionId::new(1));
    assert!(matches!(
        pool.acquire(),
        Err(SubmitError::NoSessionAvailable)
    ));
    drop(lent);
    assert!(pool.acquire().is_ok());
}

#[tokio::test]
async fn close_reaches_lent_sessions() {
    let pool = SessionPool::new([session(1, false), session(2, false)], window(1));
    let lent = pool.acquire().expect("idle session");

    pool.close().await;
    assert!(pool.is_closed());
    assert!(matches!(pool.acquire(), Err(SubmitError::PoolClosed)));

    drop(lent);
    assert_eq!(pool.available_count(), 0);
    assert_eq!(pool.lent_count(), 0);
    assert_eq!(pool.total_sessions(), 2);
}

#[tokio::test]
async fn close_is_idempotent() {
    let mut only = MockSession::new();
    only.expect_id().return_const(SessionId::new(1));
    only.expect_close().times(1).returning(|| ());
    let pool = SessionPool::new([only], window(1));

    pool.close().await;
    pool.close().await;
}
