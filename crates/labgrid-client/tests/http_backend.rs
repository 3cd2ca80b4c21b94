use labgrid_client::{
    endpoints, ClientError, HttpBackend, MutationBackend, OptionField, OptionSource, PageSource,
};
use labgrid_types::{Cursor, FilterOp, FilterSet, GridConfig, OptionItem, QueryIdentity, RowId};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer) -> HttpBackend {
    let config = GridConfig::default()
        .with_base_url(server.uri())
        .with_order(3)
        .with_analysis_order(8)
        .with_csrf_token("csrf-123");
    HttpBackend::new(Arc::new(config)).unwrap()
}

#[tokio::test]
async fn first_page_then_cursor() {
    let server = MockServer::start().await;
    let next = format!("{}/api/samples/?cursor=p2", server.uri());

    Mock::given(method("GET"))
        .and(path("/api/samples/"))
        .and(query_param("order", "3"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": next,
            "previous": null,
            "results": [{"id": 1, "guid": "a"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/samples/"))
        .and(query_param("cursor", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "next": null,
            "results": [{"id": 2, "guid": "b"}]
        })))
        .mount(&server)
        .await;

    let backend = backend(&server);
    let identity = QueryIdentity::new(endpoints::SAMPLES).with_param("order", "3");

    let first = backend.fetch_page(&identity, None).await.unwrap();
    assert_eq!(first.results[0].id(), RowId(1));
    assert_eq!(first.next, Some(Cursor::new(next.clone())));

    let second = backend.fetch_page(&identity, first.next.as_ref()).await.unwrap();
    assert_eq!(second.results[0].id(), RowId(2));
    assert!(second.is_last());
}

#[tokio::test]
async fn repeatable_marker_parameters_reach_the_server() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/samples/"))
        .and(query_param("order__status__not", "draft"))
        .and(query_param("markers", "COI"))
        .and(query_param("species", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"results": [], "next": null})))
        .expect(1)
        .mount(&server)
        .await;

    let identity = QueryIdentity::new(endpoints::SAMPLES)
        .with_param("order__status__not", "draft")
        .with_filters(FilterSet::new().with("species", FilterOp::Exact, "4"))
        .with_extra("markers", "COI")
        .with_extra("markers", "Cytb");

    let page = backend(&server).fetch_page(&identity, None).await.unwrap();
    assert!(page.results.is_empty());
}

#[tokio::test]
async fn patch_sends_csrf_and_changed_fields_only() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/samples/5/"))
        .and(header("X-CSRFToken", "csrf-123"))
        .and(body_json(json!({"year": 2020})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 5, "year": 2020})))
        .expect(1)
        .mount(&server)
        .await;

    let mut fields = serde_json::Map::new();
    fields.insert("year".into(), json!(2020));
    let body = backend(&server)
        .patch(endpoints::SAMPLES, RowId(5), fields)
        .await
        .unwrap();
    assert_eq!(body["year"], json!(2020));
}

#[tokio::test]
async fn structured_400_becomes_validation_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/samples/bulk/"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "type": "validation_error",
            "errors": [{"attr": "species", "code": "required", "detail": "This field is required."}]
        })))
        .mount(&server)
        .await;

    let err = backend(&server)
        .bulk_create(endpoints::SAMPLES, json!({"quantity": 1}))
        .await
        .unwrap_err();

    assert!(err.is_structured());
    assert_eq!(err.field_errors()[0].to_string(), "species - This field is required.");
}

#[tokio::test]
async fn unstructured_500_is_status_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/sample-marker-analysis/bulk-delete/"))
        .and(body_json(json!({"ids": [1, 3]})))
        .respond_with(ResponseTemplate::new(500).set_body_string("oops"))
        .mount(&server)
        .await;

    let err = backend(&server)
        .bulk_delete(endpoints::SAMPLE_MARKER_ANALYSIS, &[RowId(1), RowId(3)])
        .await
        .unwrap_err();

    assert_eq!(err, ClientError::status(500, "oops"));
}

#[tokio::test]
async fn delete_accepts_empty_204() {
    let server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/samples/9/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    backend(&server).delete(endpoints::SAMPLES, RowId(9)).await.unwrap();
}

#[tokio::test]
async fn mutation_without_token_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let config = GridConfig::default().with_base_url(server.uri());
    let backend = HttpBackend::new(Arc::new(config)).unwrap();

    let err = backend.delete(endpoints::SAMPLES, RowId(1)).await.unwrap_err();
    assert_eq!(err, ClientError::MissingCsrfToken);
}

#[tokio::test]
async fn marker_options_are_scoped_and_prefix_searched() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/markers/"))
        .and(query_param("analysis_order", "8"))
        .and(query_param("name__istartswith", "CO"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": "COI"}])))
        .mount(&server)
        .await;

    let source = backend(&server).option_source(OptionField::Marker);
    let options = source.search("CO").await.unwrap();
    assert_eq!(options, vec![OptionItem::named("COI")]);
}

#[tokio::test]
async fn transport_failure_has_no_status() {
    let config = GridConfig::default().with_base_url("http://127.0.0.1:9");
    let backend = HttpBackend::new(Arc::new(config)).unwrap();

    let err = backend
        .fetch_page(&QueryIdentity::new(endpoints::SAMPLES), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Transport(_)));
    assert_eq!(err.http_status(), None);
}
