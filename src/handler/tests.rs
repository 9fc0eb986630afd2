//! Unit tests for the outbound loop.

use std::{
    num::NonZeroUsize,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use rstest::{fixture, rstest};
use tokio_util::sync::CancellationToken;

use super::{Handler, SendError};
use crate::{
    config::{Config, SmscConfig},
    dispatch::{CompletedMessage, InboundDispatcher},
    message::{DataCoding, EncodingPolicy},
    pool::{SessionPool, SubmitError, SubmitWindow},
    reassembly::ReassemblyPolicy,
    session::{MockSession, SessionId},
    smpp::TransportError,
};

fn non_zero(value: usize) -> NonZeroUsize { NonZeroUsize::new(value).expect("non-zero") }

#[fixture]
fn config() -> Config {
    let mut config = Config::new(SmscConfig::new("smsc.local", 2775, "esme", "secret"));
    config.global_limit = non_zero(2);
    config.per_session_limit = non_zero(2);
    config.max_outstanding = non_zero(100);
    config
}

fn session(sent: &Arc<AtomicUsize>) -> MockSession {
    let sent = Arc::clone(sent);
    let mut session = MockSession::new();
    session.expect_id().return_const(SessionId::new(1));
    session.expect_is_alive().return_const(true);
    session.expect_close().returning(|| ());
    session.expect_submit().returning(move |message| {
        if message.text() == "boom" {
            return Err(TransportError::Closed);
        }
        sent.fetch_add(1, Ordering::SeqCst);
        Ok(())
    });
    session
}

fn handler(config: &Config, sent: &Arc<AtomicUsize>) -> Handler<MockSession> {
    let window = Arc::new(SubmitWindow::new(config.max_outstanding));
    let dispatcher = Arc::new(InboundDispatcher::new(
        Arc::clone(&window),
        ReassemblyPolicy::default(),
        Arc::new(|_: CompletedMessage| {}),
    ));
    let pool = Arc::new(SessionPool::new([session(sent)], window));
    Handler::from_parts(pool, dispatcher, config)
}

#[rstest]
#[tokio::test]
async fn try_send_surfaces_rate_limit(config: Config) {
    let sent = Arc::new(AtomicUsize::new(0));
    let handler = handler(&config, &sent);

    handler.try_send("one").await.expect("first");
    handler.try_send("two").await.expect("second");
    let err = handler.try_send("three").await.expect_err("limited");
    assert!(matches!(err, SendError::Submit(SubmitError::RateLimited)));
    assert_eq!(sent.load(Ordering::SeqCst), 2);
    handler.close().await;
}

#[rstest]
#[tokio::test(start_paused = true)]
async fn rate_limited_messages_wait_for_reset(mut config: Config) {
    config.reset_interval = Duration::from_secs(10);
    config.backoff = Duration::from_secs(1);
    let sent = Arc::new(AtomicUsize::new(0));
    let handler = handler(&config, &sent);
    let start = tokio::time::Instant::now();

    let report = handler
        .send_and_receive(["a", "b", "c"], &CancellationToken::new())
        .await;

    assert_eq!(report.sent, 3);
    assert!(report.failed.is_empty());
    assert!(start.elapsed() >= Duration::from_secs(10));
    handler.close().await;
}

#[rstest]
#[tokio::test]
async fn failures_are_reported_not_dropped(mut config: Config) {
    config.encoding = EncodingPolicy::Fixed(DataCoding::Default);
    config.global_limit = non_zero(10);
    config.per_session_limit = non_zero(10);
    let sent = Arc::new(AtomicUsize::new(0));
    let handler = handler(&config, &sent);

    let report = handler
        .send_and_receive(["ok", "caf\u{e9}", "boom", "fine"], &CancellationToken::new())
        .await;

    assert_eq!(report.sent, 2);
    let failed: Vec<_> = report.failed.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(failed, ["caf\u{e9}", "boom"]);
    assert!(!report.cancelled);
    handler.close().await;
}

#[rstest]
#[tokio::test]
async fn cancelled_token_stops_before_sending(config: Config) {
    let sent = Arc::new(AtomicUsize::new(0));
    let handler = handler(&config, &sent);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = handler.send_and_receive(["a", "b"], &cancel).await;
    assert!(report.cancelled);
    assert_eq!(report.sent, 0);
    assert_eq!(sent.load(Ordering::SeqCst), 0);
    handler.close().await;
}

#[rstest]
#[tokio::test]
async fn cancelled_wait_for_window_spends_no_quota(mut config: Config) {
    config.max_outstanding = non_zero(1);
    let sent = Arc::new(AtomicUsize::new(0));
    let handler = handler(&config, &sent);
    handler.try_send("first").await.expect("window has room");

    let cancel = CancellationToken::new();
    let (report, ()) = tokio::join!(handler.send_and_receive(["second"], &cancel), async {
        tokio::task::yield_now().await;
        cancel.cancel();
    });

    assert!(report.cancelled);
    assert_eq!(report.sent, 0);
    assert!(report.failed.is_empty());
    assert_eq!(sent.load(Ordering::SeqCst), 1);
    assert_eq!(handler.pool().outstanding(), 1);
    assert_eq!(handler.pool().available_count(), 1);
    assert_eq!(handler.limiter().snapshot().global, 1);
    handler.close().await;
}

#[rstest]
#[tokio::test]
async fn closed_pool_ends_the_loop(config: Config) {
    let sent = Arc::new(AtomicUsize::new(0));
    let handler = handler(&config, &sent);
    handler.close().await;

    let report = handler
        .send_and_receive(["a", "b"], &CancellationToken::new())
        .await;
    assert_eq!(report.sent, 0);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].text, "a");
}
