use std::sync::Arc;
use std::time::Duration;

use lisa_rust_auth::{ApiClient, CookieJar, Grant, ManualClock, SameSite, SessionManager};
use lisa_rust_notifications::{
    EmailType, NotificationError, RecipientForm, RecipientsClient, SaveOutcome, Schedule,
    ScheduleClient,
};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const NOW: i64 = 1_700_000_000_000;

fn api(server: &MockServer) -> ApiClient {
    let clock = Arc::new(ManualClock::new(NOW));
    let jar = CookieJar::in_memory(clock);
    Grant::new("tok".to_string(), Some(3600), Duration::from_secs(3600), NOW)
        .persist(&jar, SameSite::Lax, false)
        .unwrap();

    let session = SessionManager::builder(&server.uri(), jar).build();
    ApiClient::new(&server.uri(), reqwest::Client::new(), session)
}

#[tokio::test]
async fn test_list_recipients() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/email/get"))
        .and(header("Authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "data": [
                {"id": 1, "uuid": "r-1", "name": "Ops", "email": "ops@example.com", "email_type": "to"},
                {"id": 2, "uuid": "r-2", "name": "Audit", "email": "audit@example.com", "email_type": "bcc"}
            ]
        })))
        .mount(&server)
        .await;

    let recipients = RecipientsClient::new(api(&server)).list().await.unwrap();
    assert_eq!(recipients.len(), 2);
    assert_eq!(recipients[1].email_type, EmailType::Bcc);
}

#[tokio::test]
async fn test_list_not_found_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/email/get"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"status": 404, "data": "Not found"})),
        )
        .mount(&server)
        .await;

    let recipients = RecipientsClient::new(api(&server)).list().await.unwrap();
    assert!(recipients.is_empty());
}

#[tokio::test]
async fn test_create_recipient_requires_201() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/email/create"))
        .and(body_json(json!({
            "name": "Ops",
            "email": "ops@example.com",
            "email_type": "cc"
        })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": 400, "data": "Email already registered"})),
        )
        .mount(&server)
        .await;

    let form = RecipientForm::new("Ops", "ops@example.com", EmailType::Cc);
    match RecipientsClient::new(api(&server)).create(&form).await {
        Err(NotificationError::ApiError { status, message }) => {
            assert_eq!(status, 400);
            assert_eq!(message, "Email already registered");
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_update_recipient() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/email/update"))
        .and(body_json(json!({
            "uuid": "r-1",
            "name": "Ops",
            "email": "ops@example.com",
            "email_type": "to"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
        .expect(1)
        .mount(&server)
        .await;

    let form = RecipientForm::new("Ops", "ops@example.com", EmailType::To);
    RecipientsClient::new(api(&server))
        .update("r-1", &form)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_recipient_requires_204() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/email/delete"))
        .and(body_json(json!({"uuid": "r-1"})))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/email/delete"))
        .and(body_json(json!({"uuid": "r-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200})))
        .mount(&server)
        .await;

    let client = RecipientsClient::new(api(&server));
    client.delete("r-1").await.unwrap();
    assert!(matches!(
        client.delete("r-2").await,
        Err(NotificationError::ApiError { status: 200, .. })
    ));
}

#[tokio::test]
async fn test_current_schedule_from_running_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cron/running"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "data": [{"uuid": "c-1", "name": "sendEmail", "time_schedule": "30 8 * * 1-3", "is_running": true}]
        })))
        .mount(&server)
        .await;

    let (job, schedule) = ScheduleClient::new(api(&server)).current().await.unwrap();
    assert_eq!(job.map(|j| j.uuid), Some("c-1".to_string()));
    assert_eq!(schedule.days, vec![1, 2, 3]);
    assert_eq!(schedule.to_cron(), "30 08 * * 1,2,3");
}

#[tokio::test]
async fn test_current_schedule_defaults_without_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cron/running"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": 200, "data": []})))
        .mount(&server)
        .await;

    let (job, schedule) = ScheduleClient::new(api(&server)).current().await.unwrap();
    assert!(job.is_none());
    assert_eq!(schedule, Schedule::default());
}

#[tokio::test]
async fn test_save_creates_when_no_job_runs() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cron/running"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"status": 404})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/cron/create"))
        .and(body_json(json!({
            "name": "sendEmail",
            "time_schedule": "00 09,15 * * 1,2,3,4,5",
            "is_running": true
        })))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let outcome = ScheduleClient::new(api(&server))
        .save(&Schedule::default())
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Created);
}

#[tokio::test]
async fn test_save_updates_running_job() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/cron/running"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": 200,
            "data": [{"uuid": "c-1", "time_schedule": "0 9 * * 1"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/cron/update"))
        .and(body_json(json!({
            "uuid": "c-1",
            "time_schedule": "00 07 * * 0,6",
            "is_running": true
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let schedule = Schedule::parse("0 7 * * 6,0").unwrap();
    let outcome = ScheduleClient::new(api(&server))
        .save(&schedule)
        .await
        .unwrap();
    assert_eq!(outcome, SaveOutcome::Updated);
}

#[tokio::test]
async fn test_empty_schedule_is_not_sent() {
    let server = MockServer::start().await;
    let empty = Schedule::new(Vec::new(), Vec::new());

    let result = ScheduleClient::new(api(&server)).create(&empty).await;
    assert!(matches!(result, Err(NotificationError::Validation(_))));
    assert!(server.received_requests().await.unwrap().is_empty());
}
