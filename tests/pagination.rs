//! List traversal against a wiremock server, one test per pagination shape.

use futures::TryStreamExt;
use mgc_core::{
    Client, Error, ListRequest, PageDescriptor, RequestContext, RequestDescriptor, RetryPolicy,
    StartParams,
};
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    id: u64,
}

fn items(ids: std::ops::Range<u64>) -> Vec<Value> {
    ids.map(|id| json!({"id": id})).collect()
}

/// Prints the crate's logs when run with `RUST_LOG=mgc_core=debug`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn client_for(server: &MockServer) -> Client {
    init_tracing();
    Client::builder()
        .base_url(server.uri())
        .unwrap()
        .retry_policy(RetryPolicy::none())
        .build()
        .unwrap()
}

fn events() -> ListRequest {
    ListRequest::new(RequestDescriptor::get("/v0/events"))
}

async fn queries(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .map(|request| request.url.query().unwrap_or_default().to_string())
        .collect()
}

#[tokio::test]
async fn test_offset_limit_stops_on_short_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v0/events"))
        .and(query_param("_offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"count": 50, "limit": 50, "offset": 0, "total": 75},
            "results": items(0..50)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v0/events"))
        .and(query_param("_offset", "50"))
        .and(query_param("_limit", "50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"count": 25, "limit": 50, "offset": 50, "total": 75},
            "results": items(50..75)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let all: Vec<Item> = client
        .list_all(&RequestContext::new(), events())
        .await
        .unwrap();

    assert_eq!(all.len(), 75);
    assert!(all.iter().enumerate().all(|(i, item)| item.id == i as u64));
}

#[tokio::test]
async fn test_first_page_carries_both_parameter_families() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 0},
            "results": []
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let all: Vec<Item> = client
        .list_all(
            &RequestContext::new(),
            ListRequest::new(
                RequestDescriptor::get("/v0/events").with_query_param("product__like", "network"),
            )
            .page_size(20),
        )
        .await
        .unwrap();

    assert!(all.is_empty());
    assert_eq!(
        queries(&mock_server).await,
        vec!["_limit=20&_offset=0&items_per_page=20&page=1&product__like=network"]
    );
}

#[tokio::test]
async fn test_exact_multiple_makes_no_trailing_call() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("_offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 4},
            "results": items(0..2)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("_offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 4},
            "results": items(2..4)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("_offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 4},
            "results": []
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let all: Vec<Item> = client
        .list_all(
            &RequestContext::new(),
            events().page_size(2).start_params(StartParams::OffsetLimit),
        )
        .await
        .unwrap();

    assert_eq!(all.len(), 4);
}

#[tokio::test]
async fn test_failing_page_discards_collected_items() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("_offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 6},
            "results": items(0..2)
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("_offset", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string(r#"{"error":"shard down"}"#))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("_offset", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 6},
            "results": items(4..6)
        })))
        .expect(0)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .list_all::<Item>(&RequestContext::new(), events().page_size(2))
        .await;

    match result {
        Err(Error::Status { status, message, .. }) => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(message, "shard down");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_page_size_stops_when_total_is_covered() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/volumes"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"page": {"page": 1, "items_per_page": 2, "total": 3}},
            "items": items(0..2)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/volumes"))
        .and(query_param("page", "2"))
        .and(query_param("items_per_page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"page": {"page": 2, "items_per_page": 2, "total": 3}},
            "items": items(2..3)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let all: Vec<Item> = client
        .list_all(
            &RequestContext::new(),
            ListRequest::new(RequestDescriptor::get("/v1/volumes")).page_size(2),
        )
        .await
        .unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(queries(&mock_server).await[1], "items_per_page=2&page=2");
}

#[tokio::test]
async fn test_cursor_links_keep_filters_and_follow_next() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/ports"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"self": "/v1/ports", "next": "/v1/ports?cursor=abc%3D"}},
            "result": items(0..2)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/ports"))
        .and(query_param("cursor", "abc="))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"self": "/v1/ports?cursor=abc%3D", "next": null}},
            "result": items(2..3)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let template = RequestDescriptor::get("/v1/ports").with_query_param("status", "active");
    let all: Vec<Item> = client
        .list_all(&RequestContext::new(), ListRequest::new(template).page_size(2))
        .await
        .unwrap();

    assert_eq!(all.len(), 3);
    assert_eq!(queries(&mock_server).await[1], "cursor=abc%3D&status=active");
}

#[tokio::test]
async fn test_link_that_does_not_advance_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"next": "?cursor=same"}},
            "result": items(0..1)
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .list_all::<Item>(&RequestContext::new(), ListRequest::new(RequestDescriptor::get("/v1/ports")))
        .await;

    assert!(matches!(result, Err(Error::Decode { .. })));
}

#[tokio::test]
async fn test_cycling_links_are_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "a"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"next": "?cursor=b"}},
            "result": items(1..2)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(query_param("cursor", "b"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"next": "?cursor=a"}},
            "result": items(2..3)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"next": "?cursor=a"}},
            "result": items(0..1)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .list_all::<Item>(&RequestContext::new(), ListRequest::new(RequestDescriptor::get("/v1/ports")))
        .await;

    match result {
        Err(Error::Decode { message, .. }) => assert!(message.contains("does not advance")),
        other => panic!("expected Decode error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_scheme_change_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("_offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 10},
            "results": items(0..2)
        })))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(query_param("_offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"links": {"next": "?cursor=x"}},
            "results": items(2..4)
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client
        .list_all::<Item>(&RequestContext::new(), events().page_size(2))
        .await;

    match result {
        Err(Error::Decode { message, .. }) => assert!(message.contains("mid-traversal")),
        other => panic!("expected decode error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unrecognized_list_shape_is_decode_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": items(0..3)})))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let result = client.list_all::<Item>(&RequestContext::new(), events()).await;

    assert!(matches!(result, Err(Error::Decode { .. })));
}

#[tokio::test]
async fn test_pages_stream_is_lazy_and_restartable() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"total": 3},
            "results": items(0..3)
        })))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);

    let pages = client.pages::<Item>(RequestContext::new(), events());
    futures::pin_mut!(pages);
    assert!(mock_server.received_requests().await.unwrap().is_empty());

    let page = pages.try_next().await.unwrap().unwrap();
    assert_eq!(page.items.len(), 3);
    assert_eq!(
        page.descriptor,
        PageDescriptor::OffsetLimit {
            limit: 50,
            offset: 0,
            total: 3
        }
    );
    assert!(pages.try_next().await.unwrap().is_none());

    let again: Vec<_> = client
        .pages::<Item>(RequestContext::new(), events())
        .try_collect()
        .await
        .unwrap();
    assert_eq!(again.len(), 1);
    assert_eq!(mock_server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_list_page_fetches_exactly_one_page() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(query_param("_offset", "40"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {"page": {"count": 2, "limit": 20, "offset": 40, "total": 42}},
            "events": items(40..42)
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server);
    let descriptor = RequestDescriptor::get("/v0/events")
        .with_query_param("_offset", "40")
        .with_query_param("_limit", "20");

    let page = client
        .list_page::<Item>(&RequestContext::new(), descriptor, Some("events"))
        .await
        .unwrap();

    assert_eq!(page.items, vec![Item { id: 40 }, Item { id: 41 }]);
    assert_eq!(page.descriptor.total(), Some(42));
}
