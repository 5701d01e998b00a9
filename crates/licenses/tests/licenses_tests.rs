use std::sync::Arc;
use std::time::Duration;

use lisa_rust_auth::{ApiClient, CookieJar, Grant, ManualClock, SameSite, SessionManager};
use lisa_rust_licenses::{
    LicenseDraft, LicenseError, LicensesClient, ListQuery, SortField, SortOrder,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// 2023-11-14T22:13:20Z
const NOW: i64 = 1_700_000_000_000;

fn client(server: &MockServer, signed_in: bool) -> LicensesClient {
    let clock = Arc::new(ManualClock::new(NOW));
    let jar = CookieJar::in_memory(clock);

    if signed_in {
        Grant::new("tok".to_string(), Some(3600), Duration::from_secs(3600), NOW)
            .with_profile(Some("alice".to_string()), Some("admin".to_string()))
            .persist(&jar, SameSite::Lax, false)
            .unwrap();
    }

    let session = SessionManager::builder(&server.uri(), jar).build();
    let api = ApiClient::new(&server.uri(), reqwest::Client::new(), session);
    LicensesClient::new(api)
}

fn license_json(uuid: &str, name: &str) -> serde_json::Value {
    json!({
        "uuid": uuid,
        "name": name,
        "start_date": "2024-01-01",
        "end_date": "2025-01-01",
        "volume": 2,
        "satuan": "seat",
        "harga_satuan": 1000,
        "jumlah": 2000,
        "username": "admin",
        "password": "secret",
        "status_lisensi": 3
    })
}

fn draft() -> LicenseDraft {
    LicenseDraft {
        name: "Office".to_string(),
        start_date: "2024-01-01".to_string(),
        end_date: "2025-01-01".to_string(),
        volume: 5.0,
        satuan: "seat".to_string(),
        harga_satuan: 100.0,
        username: "admin".to_string(),
        password: "secret".to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_list_sends_paging_and_sort() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/licenses/get"))
        .and(query_param("page", "2"))
        .and(query_param("paginate", "5"))
        .and(query_param("name", "office suite"))
        .and(query_param("sortField", "end_date"))
        .and(query_param("sortOrder", "desc"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "response": "OK",
            "data": {
                "docs": [license_json("l-1", "Office Suite")],
                "pages": 3,
                "total": 11
            }
        })))
        .mount(&server)
        .await;

    let licenses = client(&server, true);
    let query = ListQuery::new()
        .page(2)
        .paginate(5)
        .name("office suite")
        .sort(SortField::EndDate, SortOrder::Desc);
    let page = licenses.list(&query).await.unwrap();

    assert_eq!(page.pages, 3);
    assert_eq!(page.total, 11);
    assert_eq!(page.docs[0].name, "Office Suite");
}

#[tokio::test]
async fn test_list_error_envelope() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/licenses/get"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_json(json!({"status": 500, "response": "Database unavailable"})),
        )
        .mount(&server)
        .await;

    let result = client(&server, true).list_all().await;
    match result {
        Err(LicenseError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "Database unavailable");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_find_license() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/licenses/find"))
        .and(query_param("uuid", "l-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "data": license_json("l-9", "CAD")
        })))
        .mount(&server)
        .await;

    let license = client(&server, true).find("l-9").await.unwrap();
    assert_eq!(license.uuid, "l-9");
    assert_eq!(license.total(), 2000.0);
}

#[tokio::test]
async fn test_create_stamps_current_user() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/licenses/create"))
        .and(body_partial_json(json!({
            "name": "Office",
            "volume": 5.0,
            "last_user_input": "alice"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"status": 201})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, true).create(&draft()).await.unwrap();
}

#[tokio::test]
async fn test_create_requires_session() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/licenses/create"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let result = client(&server, false).create(&draft()).await;
    assert!(matches!(result, Err(LicenseError::SessionInvalid)));
}

#[tokio::test]
async fn test_create_rejects_invalid_draft() {
    let server = MockServer::start().await;
    let invalid = LicenseDraft {
        username: String::new(),
        ..draft()
    };

    match client(&server, true).create(&invalid).await {
        Err(LicenseError::Validation(errors)) => {
            assert_eq!(errors, vec!["Username is required".to_string()])
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_update_recomputes_total() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/licenses/update"))
        .and(body_partial_json(json!({
            "uuid": "l-1",
            "volume": 4.0,
            "jumlah": 4000.0,
            "last_user_input": "alice",
            "updatedAt": "2023-11-14T22:13:20.000Z"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
        .expect(1)
        .mount(&server)
        .await;

    let licenses = client(&server, true);
    let mut license: lisa_rust_licenses::License =
        serde_json::from_value(license_json("l-1", "Office")).unwrap();
    license.volume = 4.0;

    let updated = licenses.update(&license).await.unwrap();
    assert_eq!(updated.jumlah, 4000.0);
}

#[tokio::test]
async fn test_delete_and_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/licenses/delete"))
        .and(body_partial_json(json!({"uuid": "l-1"})))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let licenses = client(&server, true);
    let result = licenses.delete("l-1").await;

    assert!(result.as_ref().err().map_or(false, |e| e.is_unauthorized()));
}

#[tokio::test]
async fn test_upload_sends_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/licenses/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
        .expect(1)
        .mount(&server)
        .await;

    client(&server, true)
        .upload("licenses.xlsx", b"sheet bytes".to_vec())
        .await
        .unwrap();

    let requests = server.received_requests().await.unwrap();
    let content_type = requests[0]
        .headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("multipart/form-data"));

    let body = String::from_utf8_lossy(&requests[0].body);
    assert!(body.contains("filename=\"licenses.xlsx\""));
    assert!(body.contains("name=\"last_user_input\""));
    assert!(body.contains("alice"));
}

#[tokio::test]
async fn test_export_prices_with_history() {
    let server = MockServer::start().await;
    let mut record = license_json("l-1", "Office");
    record["history_licenses"] = json!([
        {"uuid": "h-1", "licenses_uuid": "l-1", "harga_satuan": "900.00", "tanggal": "2023-01-01"}
    ]);
    Mock::given(method("GET"))
        .and(path("/licenses/export"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"status": 200, "data": [record]})),
        )
        .mount(&server)
        .await;

    let licenses = client(&server, true).export_prices().await.unwrap();
    assert_eq!(licenses[0].history_licenses.len(), 1);
    assert_eq!(licenses[0].history_licenses[0].harga_satuan, 900.0);
}
