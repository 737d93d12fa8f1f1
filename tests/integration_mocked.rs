/// Integration tests with a mocked CRM
/// Drives the real router end to end without hitting a real CRM
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use portais_crm_webhook::config::{Config, CrmConfig};
use portais_crm_webhook::crm_client::{
    CrmGateway, CrmResponse, DuplicateLookup, GatewayError, LeadId,
};
use portais_crm_webhook::handlers::AppState;
use portais_crm_webhook::server::{create_router, PORTAL_WEBHOOK_PATH};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{any, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TOKEN_PATH: &str = "/rest/1/abc123";

/// Helper function to create test config
fn create_test_config(crm_webhook_url: Option<String>, webhook_secret: Option<&str>) -> Config {
    Config {
        port: 0,
        crm_webhook_url,
        crm_timeout_secs: 2,
        crm_default_responsible_id: 7,
        webhook_secret: webhook_secret.map(String::from),
    }
}

fn crm_url(server: &MockServer) -> String {
    format!("{}{}", server.uri(), TOKEN_PATH)
}

fn create_app(config: Config) -> Router {
    create_router(Arc::new(AppState::new(config).unwrap()))
}

fn gateway_for(server: &MockServer, timeout: Duration) -> CrmGateway {
    CrmGateway::new(CrmConfig {
        base_url: Some(crm_url(server)),
        timeout,
    })
    .unwrap()
}

fn rpc_path(method_name: &str) -> String {
    format!("{}/{}", TOKEN_PATH, method_name)
}

async fn send(
    app: Router,
    http_method: Method,
    body: &str,
    headers: &[(&str, &str)],
) -> (StatusCode, axum::http::HeaderMap, Value) {
    let mut builder = Request::builder()
        .method(http_method)
        .uri(PORTAL_WEBHOOK_PATH)
        .header(header::CONTENT_TYPE, "application/json");
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let request = builder.body(Body::from(body.to_string())).unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, headers, json)
}

async fn post(app: Router, body: &str) -> (StatusCode, Value) {
    let (status, _, json) = send(app, Method::POST, body, &[]).await;
    (status, json)
}

async fn mount_lookup(server: &MockServer, channel: &str, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .and(body_partial_json(json!({ "entity_type": "LEAD", "type": channel })))
        .respond_with(response)
        .mount(server)
        .await;
}

/// Bodies the CRM received for one RPC method.
async fn received_bodies(server: &MockServer, method_name: &str) -> Vec<Value> {
    let wanted = rpc_path(method_name);
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == wanted)
        .map(|r| serde_json::from_slice(&r.body).unwrap())
        .collect()
}

// ============ Gateway ============

#[tokio::test]
async fn test_call_posts_params_to_method_path() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .and(body_partial_json(json!({"fields": {"TITLE": "x"}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 99})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    let result = gateway
        .call("crm.lead.add", &json!({"fields": {"TITLE": "x"}}))
        .await;

    assert_eq!(result, Ok(CrmResponse::Success(json!(99))));
}

#[tokio::test]
async fn test_call_logical_error_is_a_value() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "ERROR_CORE",
            "error_description": "Campo obrigatório"
        })))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    match gateway.call("crm.lead.add", &json!({})).await {
        Ok(CrmResponse::Failure(error)) => {
            assert_eq!(error.code, "ERROR_CORE");
            assert_eq!(error.description.as_deref(), Some("Campo obrigatório"));
        }
        other => panic!("Expected logical error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_call_error_status_with_error_body_is_logical() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "INVALID_ARG_VALUE",
            "error_description": "Bad owner"
        })))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    let result = gateway.call("crm.activity.add", &json!({})).await;

    assert!(matches!(result, Ok(CrmResponse::Failure(_))));
}

#[tokio::test]
async fn test_call_server_error_is_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    let result = gateway.call("crm.lead.add", &json!({})).await;

    assert!(matches!(result, Err(GatewayError::Transport(_))));
}

#[tokio::test]
async fn test_call_timeout_is_transport_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"result": 1}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_millis(300));
    match gateway.call("crm.lead.add", &json!({})).await {
        Err(GatewayError::Transport(msg)) => {
            assert!(msg.contains("timed out"), "unexpected message: {}", msg);
            assert!(!msg.contains("abc123"), "token leaked: {}", msg);
        }
        other => panic!("Expected transport failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_call_success_without_result_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"time": {}})))
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    let result = gateway.call("crm.lead.add", &json!({})).await;

    assert!(matches!(result, Err(GatewayError::MalformedResponse(_))));
}

#[tokio::test]
async fn test_find_duplicates_survives_one_channel_failing() {
    let mock_server = MockServer::start().await;

    mount_lookup(
        &mock_server,
        "PHONE",
        ResponseTemplate::new(503).set_body_string("unavailable"),
    )
    .await;
    mount_lookup(
        &mock_server,
        "EMAIL",
        ResponseTemplate::new(200).set_body_json(json!({"result": {"LEAD": ["42"]}})),
    )
    .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    let result = gateway
        .find_duplicates(&["11999999999".to_string()], Some("ana@example.com"))
        .await
        .unwrap();

    assert!(matches!(result.phone, DuplicateLookup::LookupFailed(_)));
    assert_eq!(result.email, DuplicateLookup::Found(vec![LeadId(42)]));
}

#[tokio::test]
async fn test_find_duplicates_skips_absent_channels() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let gateway = gateway_for(&mock_server, Duration::from_secs(2));
    let result = gateway.find_duplicates(&[], None).await.unwrap();

    assert_eq!(result.phone, DuplicateLookup::NotChecked);
    assert_eq!(result.email, DuplicateLookup::NotChecked);
}

// ============ Webhook flow ============

#[tokio::test]
async fn test_new_contact_creates_lead() {
    let mock_server = MockServer::start().await;

    mount_lookup(
        &mock_server,
        "PHONE",
        ResponseTemplate::new(200).set_body_json(json!({"result": []})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .and(body_partial_json(json!({"type": "EMAIL"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(0)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 321})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(
        app,
        r#"{"name":"Ana","phone":"11999999999","message":"Interesse (Código XYZ-1)"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "LEAD_CREATED");
    assert_eq!(body["lead_id"], 321);
    assert_eq!(body["property_code"], "XYZ-1");

    let leads = received_bodies(&mock_server, "crm.lead.add").await;
    assert_eq!(leads.len(), 1);
    let fields = &leads[0]["fields"];
    assert!(fields["COMMENTS"].as_str().unwrap().contains("XYZ-1"));
    assert_eq!(fields["NAME"], "Ana");
    assert_eq!(fields["SOURCE_ID"], "PORTAIS");
    assert_eq!(
        fields["PHONE"],
        json!([{"VALUE": "11999999999", "VALUE_TYPE": "WORK"}])
    );
    assert!(fields.get("EMAIL").is_none());

    let lookups = received_bodies(&mock_server, "crm.duplicate.findbycomm").await;
    assert_eq!(lookups.len(), 1);
    assert_eq!(lookups[0]["values"], json!(["11999999999"]));
}

#[tokio::test]
async fn test_lead_source_and_pass_through_fields() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": {}})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": "77"})))
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(
        app,
        r#"{
            "email": "bia@example.com",
            "phone": "11 1111-1111; 22 2222-2222",
            "publicationPlan": "wimoveis premium",
            "idNavplat": 9981,
            "eventId": "evt-1"
        }"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lead_id"], 77);
    assert_eq!(body["property_code"], "NÃO INFORMADO");

    let leads = received_bodies(&mock_server, "crm.lead.add").await;
    let fields = &leads[0]["fields"];
    assert_eq!(fields["SOURCE_ID"], "WIMOVEIS");
    assert_eq!(fields["SOURCE_DESCRIPTION"], "wimoveis premium");
    assert_eq!(fields["PHONE"].as_array().unwrap().len(), 2);
    let comments = fields["COMMENTS"].as_str().unwrap();
    assert!(comments.contains("ID Navplat: 9981"));
    assert!(comments.contains("Event ID: evt-1"));
}

#[tokio::test]
async fn test_phone_lookup_failure_still_detects_email_duplicate() {
    let mock_server = MockServer::start().await;

    mount_lookup(
        &mock_server,
        "PHONE",
        ResponseTemplate::new(502).set_body_string("Bad Gateway"),
    )
    .await;
    mount_lookup(
        &mock_server,
        "EMAIL",
        ResponseTemplate::new(200).set_body_json(json!({"result": {"LEAD": [55]}})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.activity.add")))
        .and(body_partial_json(json!({
            "fields": {"OWNER_ID": 55, "OWNER_TYPE_ID": 1, "COMPLETED": "N", "RESPONSIBLE_ID": 7}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 900})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(
        app,
        r#"{"name":"Ana","email":"ana@example.com","phone":"11999999999","message":"Oi (Código Q-9)"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "DUPLICATE_ACTIVITY_CREATED");
    assert_eq!(body["lead_id"], 55);
    assert_eq!(body["activity_id"], 900);
    assert_eq!(body["matched_by"], "email");

    let activities = received_bodies(&mock_server, "crm.activity.add").await;
    let fields = &activities[0]["fields"];
    assert!(fields["SUBJECT"].as_str().unwrap().contains("Q-9"));
    let description = fields["DESCRIPTION"].as_str().unwrap();
    assert!(description.contains("Oi (Código Q-9)"));
    assert!(description.contains("11999999999"));
    assert!(description.contains("ana@example.com"));
    assert!(fields["START_TIME"].as_str().unwrap().ends_with("+00:00"));
    assert_eq!(fields["START_TIME"], fields["END_TIME"]);
}

#[tokio::test]
async fn test_phone_match_preferred_over_email_match() {
    let mock_server = MockServer::start().await;

    mount_lookup(
        &mock_server,
        "PHONE",
        ResponseTemplate::new(200).set_body_json(json!({"result": {"LEAD": [10, 11]}})),
    )
    .await;
    mount_lookup(
        &mock_server,
        "EMAIL",
        ResponseTemplate::new(200).set_body_json(json!({"result": {"LEAD": [20]}})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.activity.add")))
        .and(body_partial_json(json!({"fields": {"OWNER_ID": 10}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 5})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(
        app,
        r#"{"email":"ana@example.com","phone":"11999999999"}"#,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lead_id"], 10);
    assert_eq!(body["matched_by"], "phone");
}

#[tokio::test]
async fn test_lookup_logical_error_is_swallowed() {
    let mock_server = MockServer::start().await;

    mount_lookup(
        &mock_server,
        "EMAIL",
        ResponseTemplate::new(200).set_body_json(json!({
            "error": "QUERY_LIMIT_EXCEEDED",
            "error_description": "Too many requests"
        })),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 12})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(app, r#"{"email":"ana@example.com"}"#).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "LEAD_CREATED");
}

#[tokio::test]
async fn test_missing_identifier_rejected_before_crm() {
    let mock_server = MockServer::start().await;

    Mock::given(any())
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(app, r#"{"message":"Quero visitar (Código A-1)"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "MISSING_IDENTIFIER");
}

#[tokio::test]
async fn test_invalid_and_empty_bodies() {
    let app = create_app(create_test_config(None, None));
    let (status, body) = post(app, "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "INVALID_PAYLOAD");

    let app = create_app(create_test_config(None, None));
    let (status, body) = post(app, "").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "EMPTY_BODY");
}

#[tokio::test]
async fn test_double_encoded_body_accepted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 3})))
        .mount(&mock_server)
        .await;

    let inner = r#"{"name":"Caio","phone":"21 98888-7777"}"#;
    let body = serde_json::to_string(inner).unwrap();

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, json) = post(app, &body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["lead_id"], 3);
}

#[tokio::test]
async fn test_lead_rejected_by_crm_returns_400_with_details() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "ERROR_CORE",
            "error_description": "SOURCE_ID inválido"
        })))
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(app, r#"{"name":"Ana"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "CRM_ERROR");
    assert_eq!(body["operation"], "crm.lead.add");
    assert_eq!(body["error"], "ERROR_CORE");
    assert_eq!(body["error_description"], "SOURCE_ID inválido");
}

#[tokio::test]
async fn test_activity_rejected_by_crm_returns_400() {
    let mock_server = MockServer::start().await;

    mount_lookup(
        &mock_server,
        "PHONE",
        ResponseTemplate::new(200).set_body_json(json!({"result": {"LEAD": [8]}})),
    )
    .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.activity.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "ACCESS_DENIED"
        })))
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(app, r#"{"phone":"11999999999"}"#).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "CRM_ERROR");
    assert_eq!(body["operation"], "crm.activity.add");
    assert_eq!(body["error"], "ACCESS_DENIED");
}

#[tokio::test]
async fn test_lead_transport_failure_returns_500() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, body) = post(app, r#"{"name":"Ana"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "CRM_UNAVAILABLE");
}

#[tokio::test]
async fn test_missing_crm_config_returns_500() {
    let app = create_app(create_test_config(None, None));
    let (status, body) = post(app, r#"{"name":"Ana","phone":"119"}"#).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "CONFIG_MISSING");
}

// ============ HTTP surface ============

#[tokio::test]
async fn test_non_post_method_not_allowed() {
    let app = create_app(create_test_config(None, None));
    let (status, headers, body) = send(app, Method::GET, "", &[]).await;

    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(headers.get(header::ALLOW).unwrap(), "POST");
    assert_eq!(body["status"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_shared_secret_enforced() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 1})))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = create_test_config(Some(crm_url(&mock_server)), Some("portal-secret"));
    let payload = r#"{"name":"Ana"}"#;

    let (status, _, body) = send(create_app(config.clone()), Method::POST, payload, &[]).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "UNAUTHORIZED");

    let (status, _, _) = send(
        create_app(config.clone()),
        Method::POST,
        payload,
        &[("authorization", "Bearer wrong")],
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _, _) = send(
        create_app(config.clone()),
        Method::POST,
        payload,
        &[("authorization", "Bearer portal-secret")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _, _) = send(
        create_app(config),
        Method::POST,
        payload,
        &[("x-webhook-token", "portal-secret")],
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_unauthorized_checked_before_body() {
    let app = create_app(create_test_config(None, Some("portal-secret")));
    let (status, _, body) = send(app, Method::POST, "{not json", &[]).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["status"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_request_id_header_matches_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(rpc_path("crm.duplicate.findbycomm")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": []})))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(rpc_path("crm.lead.add")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"result": 4})))
        .mount(&mock_server)
        .await;

    let app = create_app(create_test_config(Some(crm_url(&mock_server)), None));
    let (status, headers, body) = send(app, Method::POST, r#"{"name":"Ana"}"#, &[]).await;

    assert_eq!(status, StatusCode::OK);
    let header_id = headers.get("x-request-id").unwrap().to_str().unwrap();
    assert_eq!(body["request_id"], header_id);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_app(create_test_config(None, Some("portal-secret")));
    let request = Request::builder()
        .uri("/health")
        .body(Body::empty())
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["crm_configured"], false);
}
