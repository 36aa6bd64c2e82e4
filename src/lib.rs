pub mod auth;
pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod manual;
pub mod models;
pub mod notifier;
pub mod routes;
pub mod runner;
pub mod schedule;
pub mod stores;
pub mod templates;

use axum::{
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    clock::{Clock, SystemClock, Throttle},
    config::Config,
    dispatcher::Dispatcher,
    error::Result,
    manual::ManualSender,
    notifier::Notifier,
    routes::*,
    runner::ConfirmationRunner,
};

pub struct InjectableServices {
    pub db: PgPool,
    pub config: Config,
    pub clock: Option<Arc<dyn Clock>>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub db: PgPool,
    pub clock: Arc<dyn Clock>,
    pub runner: Arc<ConfirmationRunner>,
    pub sender: ManualSender,
}

impl AppState {
    pub fn new(services: InjectableServices) -> Result<Self> {
        let InjectableServices { db, config, clock } = services;
        let clock = clock.unwrap_or_else(|| Arc::new(SystemClock));

        let notifier = Notifier::new(
            db.clone(),
            Dispatcher::new(config.provider_timeout)?,
            config.salon_location.clone(),
            config.pending_stale_after,
        );

        let runner = ConfirmationRunner::new(
            notifier.clone(),
            clock.clone(),
            Throttle::new(config.message_delay),
            config.salon_timezone,
        );

        Ok(AppState {
            config,
            db,
            clock,
            runner: Arc::new(runner),
            sender: ManualSender::new(notifier),
        })
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(get_root))
        .route("/health", get(get_health))
        .route("/admin/confirmations", get(get_confirmations))
        .route("/admin/confirmations/run", post(post_run_confirmations))
        .route(
            "/admin/appointments/:id/confirmation",
            post(post_appointment_confirmation),
        )
        .route("/admin/notifications/:id", get(get_notification))
        .route(
            "/admin/notifications/:id/resend",
            post(post_resend_notification),
        )
        .with_state(state)
}
