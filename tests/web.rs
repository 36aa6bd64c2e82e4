mod helpers;

use helpers::*;

use serde_json::{json, Value};
use speculoos::prelude::*;
use sqlx::postgres::PgPool;

#[sqlx::test]
async fn root_serves_placeholder(db: PgPool) {
    let response = get("/", state_with_clock(db.clone(), ManualClock::new()))
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_that(&response.text().await.unwrap()).contains("promemoria");
}

#[sqlx::test]
async fn health_reports_database_and_runner(db: PgPool) {
    let response = get("/health", state_with_clock(db.clone(), ManualClock::new()))
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());

    let body: Value = response.json().await.expect("Body is not JSON");
    assert_eq!(
        body,
        json!({ "database": true, "confirmations": "not_started" })
    );
}
