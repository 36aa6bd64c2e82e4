use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, TimeZone, Utc};
use promemoria::{
    app,
    clock::Clock,
    config::Config,
    models::NotificationRecord,
    AppState, InjectableServices,
};
use reqwest::Client;
use serde_json::{json, Value};
use sqlx::PgPool;
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};
use tokio::{
    net::TcpListener,
    sync::{Notify, Semaphore},
};
use url::Url;
use uuid::Uuid;
use wiremock::{
    matchers::{body_string_contains, header, method, path},
    Mock, MockServer, ResponseTemplate,
};

#[allow(dead_code)]
pub const ANDREEA_APPOINTMENT: &str = "a0000000-0000-4000-8000-000000000001";
#[allow(dead_code)]
pub const GIULIA_APPOINTMENT: &str = "a0000000-0000-4000-8000-000000000002";
#[allow(dead_code)]
pub const MARTA_APPOINTMENT: &str = "a0000000-0000-4000-8000-000000000003";
#[allow(dead_code)]
pub const NO_PHONE_APPOINTMENT: &str = "a0000000-0000-4000-8000-000000000004";

#[allow(dead_code)]
pub const ANDREEA_PHONE: &str = "393331111111";
#[allow(dead_code)]
pub const GIULIA_PHONE: &str = "393332222222";
#[allow(dead_code)]
pub const MARTA_PHONE: &str = "3333333333";

pub const API_TOKEN: &str = "test-token";
pub const PROVIDER_PATH: &str = "/v19.0/1234567890/messages";
pub const OPERATOR_AUTH: &str = "operator:secret";

/// 17:00 in Rome on 2030-03-14, so "tomorrow" is 2030-03-15.
pub fn test_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2030, 3, 14, 16, 0, 0).unwrap()
}

pub fn test_config() -> Config {
    Config {
        auth: OPERATOR_AUTH.to_string(),
        database_url: Url::parse("postgres://localhost/promemoria_test").unwrap(),
        salon_location: "Via Roma 5".to_string(),
        salon_timezone: chrono_tz::Europe::Rome,
        message_delay: Duration::from_secs(1),
        provider_timeout: Duration::from_secs(5),
        pending_stale_after: Duration::from_secs(900),
        daily_run_at: None,
        port: 0,
    }
}

/// Clock that never waits: sleeping records the pause and moves time on.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Vec<Duration>>,
}

impl ManualClock {
    pub fn new() -> Arc<Self> {
        Arc::new(ManualClock {
            now: Mutex::new(test_now()),
            slept: Mutex::new(Vec::new()),
        })
    }

    #[allow(dead_code)]
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::from_std(duration).unwrap();
    }
}

/// Holds every pause until released, so a run can be caught mid-batch.
#[allow(dead_code)]
pub struct GatedClock {
    open: AtomicBool,
    gate: Semaphore,
    entered: Notify,
}

#[allow(dead_code)]
impl GatedClock {
    pub fn new() -> Arc<Self> {
        Arc::new(GatedClock {
            open: AtomicBool::new(false),
            gate: Semaphore::new(0),
            entered: Notify::new(),
        })
    }

    pub async fn wait_until_paused(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.open.store(true, Ordering::SeqCst);
        self.gate.add_permits(Semaphore::MAX_PERMITS / 2);
    }
}

#[async_trait]
impl Clock for GatedClock {
    fn now(&self) -> DateTime<Utc> {
        test_now()
    }

    async fn sleep(&self, _duration: Duration) {
        if self.open.load(Ordering::SeqCst) {
            return;
        }

        self.entered.notify_one();
        if let Ok(permit) = self.gate.acquire().await {
            permit.forget();
        }
    }
}

pub fn state_with_clock(db: PgPool, clock: Arc<dyn Clock>) -> AppState {
    AppState::new(InjectableServices {
        db,
        config: test_config(),
        clock: Some(clock),
    })
    .expect("Failed to build app state")
}

pub async fn insert_active_config(db: &PgPool, api_url: &str) {
    sqlx::query(
        r#"
        INSERT INTO messaging_configs (id, api_url, api_token, phone_number_id, business_account_id, is_active)
        VALUES ($1, $2, $3, '1234567890', '9876543210', TRUE)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(api_url)
    .bind(API_TOKEN)
    .execute(db)
    .await
    .expect("Failed to insert messaging config");
}

/// Starts a provider mock and points the active messaging config at it.
pub async fn mock_provider(db: &PgPool) -> MockServer {
    let mock_provider = MockServer::start().await;
    insert_active_config(db, &format!("{}/v19.0/1234567890", mock_provider.uri())).await;
    mock_provider
}

#[allow(dead_code)]
pub async fn expect_accepted(mock_provider: &MockServer, phone: &str, times: u64) {
    Mock::given(method("POST"))
        .and(path(PROVIDER_PATH))
        .and(header("Authorization", format!("Bearer {}", API_TOKEN).as_str()))
        .and(body_string_contains(format!("\"to\":\"{}\"", phone)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "messaging_product": "whatsapp",
            "contacts": [{ "input": phone, "wa_id": phone }],
            "messages": [{ "id": format!("wamid.{}", phone) }]
        })))
        .expect(times)
        .named(format!("accept {}", phone))
        .mount(mock_provider)
        .await;
}

#[allow(dead_code)]
pub async fn expect_rejected(mock_provider: &MockServer, phone: &str, status: u16, body: Value) {
    Mock::given(method("POST"))
        .and(path(PROVIDER_PATH))
        .and(body_string_contains(format!("\"to\":\"{}\"", phone)))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(1)
        .named(format!("reject {}", phone))
        .mount(mock_provider)
        .await;
}

#[allow(dead_code)]
pub async fn provider_bodies(mock_provider: &MockServer) -> Vec<Value> {
    mock_provider
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|request| request.body_json::<Value>().expect("Provider body is not JSON"))
        .collect()
}

#[allow(dead_code)]
pub async fn all_records(db: &PgPool) -> Vec<NotificationRecord> {
    sqlx::query_as("SELECT * FROM notification_records ORDER BY created_at, id")
        .fetch_all(db)
        .await
        .expect("Failed to fetch notification records")
}

#[allow(dead_code)]
pub fn uuid(id: &str) -> Uuid {
    Uuid::parse_str(id).unwrap()
}

pub struct TestApp {
    pub address: String,
}

#[allow(dead_code)]
pub async fn get(path: &str, state: AppState) -> Result<reqwest::Response, reqwest::Error> {
    let app_address = spawn_app(state).await.address;

    Client::new()
        .get(format!("{}{}", app_address, path))
        .send()
        .await
}

#[allow(dead_code)]
pub async fn get_with_auth(path: &str, state: AppState) -> Result<reqwest::Response, reqwest::Error> {
    let app_address = spawn_app(state).await.address;

    Client::new()
        .get(format!("{}{}", app_address, path))
        .header("Authorization", basic_auth(OPERATOR_AUTH))
        .send()
        .await
}

#[allow(dead_code)]
pub async fn post(path: &str, state: AppState) -> Result<reqwest::Response, reqwest::Error> {
    let app_address = spawn_app(state).await.address;

    Client::new()
        .post(format!("{}{}", app_address, path))
        .send()
        .await
}

#[allow(dead_code)]
pub async fn post_with_auth(path: &str, state: AppState) -> Result<reqwest::Response, reqwest::Error> {
    let app_address = spawn_app(state).await.address;

    Client::new()
        .post(format!("{}{}", app_address, path))
        .header("Authorization", basic_auth(OPERATOR_AUTH))
        .send()
        .await
}

#[allow(dead_code)]
pub async fn post_with_auth_and_timeout(
    path: &str,
    state: AppState,
    timeout: Duration,
) -> Result<reqwest::Response, reqwest::Error> {
    let app_address = spawn_app(state).await.address;

    Client::new()
        .post(format!("{}{}", app_address, path))
        .header("Authorization", basic_auth(OPERATOR_AUTH))
        .timeout(timeout)
        .send()
        .await
}

fn basic_auth(credentials: &str) -> String {
    format!("Basic {}", general_purpose::STANDARD.encode(credentials))
}

#[allow(dead_code)]
pub async fn spawn_app(state: AppState) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, app(state)).await.unwrap();
    });

    TestApp { address }
}
