//! Integration tests for page pollers
//!
//! These tests use wiremock to create mock HTTP servers and run pollers
//! against them end-to-end.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use website_poller::config::{PageConfig, PollOptions, UserAgentOptions};
use website_poller::poller::{Handler, PagePoller, Poller};
use website_poller::{PollError, PollerError};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// What a handler saw for one poll attempt
#[derive(Debug)]
struct Seen {
    id: String,
    status: Option<u16>,
    error: Option<String>,
}

/// Creates a page config polling `url` every `frequency` seconds
fn create_page(id: &str, url: String, frequency: i64) -> PageConfig {
    let mut page = PageConfig::new(url);
    page.id = Some(id.to_string());
    page.poll_options = Some(PollOptions {
        frequency,
        random_frequency: false,
        offset_range: None,
    });
    page
}

/// Attaches a handler forwarding every result to a channel
fn attach_channel(poller: &PagePoller) -> UnboundedReceiver<Seen> {
    let (tx, rx) = unbounded_channel();
    poller.set_handler(Handler::new(move |id, result| {
        let seen = match result {
            Ok(response) => Seen {
                id: id.to_string(),
                status: Some(response.status().as_u16()),
                error: None,
            },
            Err(e) => Seen {
                id: id.to_string(),
                status: None,
                error: Some(e.to_string()),
            },
        };
        let _ = tx.send(seen);
    }));
    rx
}

fn spawn_poller(
    poller: Arc<PagePoller>,
    cancel: CancellationToken,
    begin_immediately: bool,
) -> JoinHandle<website_poller::Result<()>> {
    tokio::spawn(async move { poller.start(cancel, begin_immediately).await })
}

async fn next_seen(rx: &mut UnboundedReceiver<Seen>, within: Duration) -> Seen {
    tokio::time::timeout(within, rx.recv())
        .await
        .expect("Handler was not called in time")
        .expect("Handler channel closed")
}

#[tokio::test]
async fn test_immediate_poll_reaches_handler() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/status"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let page = create_page("status", format!("{}/status", mock_server.uri()), 30);
    let poller = Arc::new(PagePoller::new(&page).expect("Failed to create poller"));
    let mut rx = attach_channel(&poller);

    let cancel = CancellationToken::new();
    let task = spawn_poller(Arc::clone(&poller), cancel.clone(), true);

    let seen = next_seen(&mut rx, Duration::from_secs(5)).await;
    assert_eq!(seen.id, "status");
    assert_eq!(seen.status, Some(200));
    assert!(seen.error.is_none());

    cancel.cancel();
    task.await.expect("Poller task panicked").expect("Poller failed");
}

#[tokio::test]
async fn test_user_agents_rotate_between_polls() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rotate"))
        .and(header("user-agent", "USER-AGENT-1"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rotate"))
        .and(header("user-agent", "USER-AGENT-2"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut page = create_page("rotate", format!("{}/rotate", mock_server.uri()), 5);
    page.user_agent_options = Some(UserAgentOptions {
        user_agents: vec!["USER-AGENT-1".to_string(), "USER-AGENT-2".to_string()],
        random_ua: false,
    });
    let poller = Arc::new(PagePoller::new(&page).expect("Failed to create poller"));
    let mut rx = attach_channel(&poller);

    let cancel = CancellationToken::new();
    let task = spawn_poller(Arc::clone(&poller), cancel.clone(), true);

    // Immediate poll, then one more after the 5 second period
    assert_eq!(next_seen(&mut rx, Duration::from_secs(5)).await.status, Some(200));
    assert_eq!(next_seen(&mut rx, Duration::from_secs(8)).await.status, Some(200));
    cancel.cancel();
    task.await.expect("Poller task panicked").expect("Poller failed");

    mock_server.verify().await;
}

#[tokio::test]
async fn test_configured_method_and_headers_are_sent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("HEAD"))
        .and(path("/head"))
        .and(header("cache-control", "no-cache"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut page = create_page("head", format!("{}/head", mock_server.uri()), 30);
    page.method = Some("head".to_string());
    let mut headers = BTreeMap::new();
    headers.insert("Cache-Control".to_string(), "no-cache".to_string());
    page.headers = headers;

    let poller = Arc::new(PagePoller::new(&page).expect("Failed to create poller"));
    let mut rx = attach_channel(&poller);

    let cancel = CancellationToken::new();
    let task = spawn_poller(Arc::clone(&poller), cancel.clone(), true);

    let seen = next_seen(&mut rx, Duration::from_secs(5)).await;
    assert_eq!(seen.status, Some(204));

    cancel.cancel();
    task.await.expect("Poller task panicked").expect("Poller failed");
}

#[tokio::test]
async fn test_redirects_are_not_followed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/old"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("location", "/new"),
        )
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/new"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let page = create_page("redirect", format!("{}/old", mock_server.uri()), 30);
    let poller = Arc::new(PagePoller::new(&page).expect("Failed to create poller"));
    let mut rx = attach_channel(&poller);

    let cancel = CancellationToken::new();
    let task = spawn_poller(Arc::clone(&poller), cancel.clone(), true);

    let seen = next_seen(&mut rx, Duration::from_secs(5)).await;
    assert_eq!(seen.status, Some(302));

    cancel.cancel();
    task.await.expect("Poller task panicked").expect("Poller failed");
}

#[tokio::test]
async fn test_transport_errors_reach_handler() {
    // Nothing listens on the discard port locally
    let page = create_page("refused", "http://127.0.0.1:9/".to_string(), 30);
    let poller = Arc::new(PagePoller::new(&page).expect("Failed to create poller"));
    let mut rx = attach_channel(&poller);

    let cancel = CancellationToken::new();
    let task = spawn_poller(Arc::clone(&poller), cancel.clone(), true);

    let seen = next_seen(&mut rx, Duration::from_secs(15)).await;
    assert_eq!(seen.id, "refused");
    assert!(seen.status.is_none());
    assert!(seen.error.is_some());

    // The poller keeps running after a failed attempt
    assert!(!task.is_finished());

    cancel.cancel();
    task.await.expect("Poller task panicked").expect("Poller failed");
}

#[tokio::test]
async fn test_cancel_before_first_interval_sends_nothing() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let page = create_page("idle", format!("{}/", mock_server.uri()), 5);
    let poller = Arc::new(PagePoller::new(&page).expect("Failed to create poller"));
    let mut rx = attach_channel(&poller);

    let cancel = CancellationToken::new();
    let task = spawn_poller(Arc::clone(&poller), cancel.clone(), false);

    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();

    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("Poller did not stop after cancellation")
        .expect("Poller task panicked")
        .expect("Poller failed");
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_pollers_share_one_client_and_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&mock_server)
        .await;

    let client = Arc::new(
        website_poller::poller::build_http_client(Duration::from_secs(5))
            .expect("Failed to build client"),
    );
    let root = CancellationToken::new();
    let (tx, mut rx) = unbounded_channel();

    let mut tasks = Vec::new();
    for name in ["first", "second", "third"] {
        let page = create_page(name, format!("{}/{}", mock_server.uri(), name), 30);
        let poller = PagePoller::with_transport(&page, client.clone())
            .expect("Failed to create poller");
        let tx = tx.clone();
        poller.set_handler(Handler::new(move |id, result| {
            let _ = tx.send((id.to_string(), result.is_ok()));
        }));
        tasks.push(spawn_poller(Arc::new(poller), root.child_token(), true));
    }
    drop(tx);

    let mut ids = Vec::new();
    for _ in 0..3 {
        let (id, ok) = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("Handler was not called in time")
            .expect("Handler channel closed");
        assert!(ok);
        ids.push(id);
    }
    ids.sort();
    assert_eq!(ids, vec!["first", "second", "third"]);

    root.cancel();
    for task in tasks {
        task.await.expect("Poller task panicked").expect("Poller failed");
    }
}

#[tokio::test]
async fn test_construction_rejects_bad_pages() {
    let mut page = create_page("bogus", "https://example.com".to_string(), 30);
    page.method = Some("bogus".to_string());
    let err = PagePoller::new(&page).unwrap_err();
    assert!(matches!(
        err,
        PollerError::Config(website_poller::ConfigError::UnrecognizedMethod(_))
    ));

    let page = create_page("relative", "/just/a/path".to_string(), 30);
    let err = PagePoller::new(&page).unwrap_err();
    assert!(matches!(
        err,
        PollerError::Config(website_poller::ConfigError::MissingScheme(_))
    ));
}

#[test]
fn test_poll_error_display() {
    assert_eq!(
        PollError::Cancelled.to_string(),
        "Request cancelled before completion"
    );
    assert!(!PollError::Cancelled.is_timeout());
}
