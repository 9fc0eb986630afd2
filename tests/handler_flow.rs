//! End-to-end tests for [`Handler`] over in-memory sessions.

mod common;

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use common::{StubConnector, non_zero};
use rstest::{fixture, rstest};
use smpp_pool::{
    CompletedMessage,
    Config,
    ConfigError,
    Handler,
    HandlerError,
    SmscConfig,
    reassembly::ConcatHeader,
    session::InboundMessage,
};
use tokio::{task::yield_now, time::timeout};
use tokio_util::sync::CancellationToken;

type Received = Arc<Mutex<Vec<CompletedMessage>>>;

#[fixture]
fn config() -> Config {
    let mut config = Config::new(SmscConfig::new("smsc.local", 2775, "esme", "secret"));
    config.pool_size = non_zero(2);
    config.max_outstanding = non_zero(1);
    config.global_limit = non_zero(100);
    config.per_session_limit = non_zero(100);
    config
}

fn collector() -> (Received, smpp_pool::MessageCallback) {
    let received = Received::default();
    let sink = Arc::clone(&received);
    (
        received,
        Arc::new(move |message: CompletedMessage| {
            sink.lock().expect("collector lock").push(message);
        }),
    )
}

async fn settle(handler: &Handler<common::StubSession>) {
    timeout(Duration::from_secs(1), async {
        while handler.pool().outstanding() > 0 {
            yield_now().await;
        }
    })
    .await
    .expect("acknowledgments drain the window");
}

#[rstest]
#[tokio::test]
async fn messages_rotate_across_sessions(config: Config) {
    let connector = StubConnector::auto_ack();
    let (_, on_message) = collector();
    let Ok(handler) = Handler::connect(&config, &connector, on_message).await else {
        panic!("stub sessions bind");
    };

    let report = handler
        .send_and_receive(["a", "b", "c", "d", "e"], &CancellationToken::new())
        .await;
    assert_eq!(report.sent, 5);
    assert!(report.failed.is_empty());
    assert!(!report.cancelled);
    settle(&handler).await;

    let sessions = connector.sessions();
    assert_eq!(sessions[0].submitted(), ["a", "c", "e"]);
    assert_eq!(sessions[1].submitted(), ["b", "d"]);
    let snapshot = handler.limiter().snapshot();
    assert_eq!(snapshot.global, 5);

    handler.close().await;
    assert!(sessions.iter().all(|state| state.is_closed()));
}

#[rstest]
#[tokio::test]
async fn failed_bind_closes_bound_sessions(mut config: Config) {
    config.pool_size = non_zero(3);
    let connector = StubConnector::failing_on(2);
    let (_, on_message) = collector();

    let result = Handler::connect(&config, &connector, on_message).await;
    assert!(matches!(result, Err(HandlerError::Connect(_))));
    let sessions = connector.sessions();
    assert_eq!(sessions.len(), 2);
    assert!(sessions.iter().all(|state| state.is_closed()));
}

#[rstest]
#[tokio::test]
async fn invalid_config_binds_nothing(mut config: Config) {
    config.smsc.system_id.clear();
    let connector = StubConnector::default();
    let (_, on_message) = collector();

    let result = Handler::connect(&config, &connector, on_message).await;
    assert!(matches!(
        result,
        Err(HandlerError::Config(ConfigError::Empty { field: "system_id" }))
    ));
    assert!(connector.sessions().is_empty());
}

#[rstest]
#[tokio::test]
async fn inbound_parts_are_reassembled(config: Config) {
    let connector = StubConnector::default();
    let (received, on_message) = collector();
    let Ok(handler) = Handler::connect(&config, &connector, on_message).await else {
        panic!("stub sessions bind");
    };
    let sessions = connector.sessions();

    for (sequence, text) in [(2, "lo "), (1, "Hel"), (3, "there")] {
        sessions[1].deliver(InboundMessage::part(
            "4477",
            text,
            ConcatHeader::new(0x2A_u8, 3, sequence),
        ));
    }
    let mut receipt = InboundMessage::single("4477", "id:1 stat:DELIVRD");
    receipt.is_receipt = true;
    sessions[0].deliver(receipt);

    let received = received.lock().expect("collector lock").clone();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].text, "Hello there");
    assert_eq!(received[0].source, "4477");
    assert_eq!(received[0].session, sessions[1].id());
    assert!(!received[0].is_receipt);
    assert!(received[1].is_receipt);
    assert_eq!(handler.dispatcher().pending_count(), 0);
    handler.close().await;
}
