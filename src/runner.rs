use chrono::{Days, NaiveDate};
use chrono_tz::Tz;
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};

use crate::{
    clock::{Clock, Throttle},
    error::Result,
    models::{AppointmentForNotification, MessageTemplate, MessagingConfig, NotificationStatus},
    notifier::{Dedup, Notifier},
};

pub const ALREADY_RUNNING_ERROR: &str = "confirmation run already in progress";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    NotStarted,
    Running,
    Completed,
    Failed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub success: bool,
    pub sent_count: usize,
    pub failed_count: usize,
    pub skipped_count: usize,
    pub errors: Vec<String>,
}

impl BatchReport {
    fn started() -> Self {
        BatchReport {
            success: true,
            ..Default::default()
        }
    }

    fn aborted(error: String) -> Self {
        BatchReport {
            success: false,
            errors: vec![error],
            ..Default::default()
        }
    }

    pub fn is_already_running(&self) -> bool {
        !self.success && self.errors == [ALREADY_RUNNING_ERROR]
    }
}

enum ItemOutcome {
    Skipped(Dedup),
    Dispatched(NotificationStatus, Option<String>),
}

/// The daily reminder batch. One instance owns one run state, so concurrent
/// invocations through the same instance are rejected.
pub struct ConfirmationRunner {
    notifier: Notifier,
    clock: Arc<dyn Clock>,
    throttle: Throttle,
    timezone: Tz,
    state: Mutex<RunState>,
}

impl ConfirmationRunner {
    pub fn new(notifier: Notifier, clock: Arc<dyn Clock>, throttle: Throttle, timezone: Tz) -> Self {
        ConfirmationRunner {
            notifier,
            clock,
            throttle,
            timezone,
            state: Mutex::new(RunState::NotStarted),
        }
    }

    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The salon-local calendar day after today.
    pub fn tomorrow(&self) -> NaiveDate {
        let today = self.clock.now().with_timezone(&self.timezone).date_naive();
        today.checked_add_days(Days::new(1)).unwrap_or(today)
    }

    pub async fn run_daily_confirmation(&self) -> BatchReport {
        let Some(guard) = RunGuard::acquire(&self.state) else {
            log::warn!("Confirmation run requested while another is in progress");
            return BatchReport::aborted(ALREADY_RUNNING_ERROR.to_string());
        };

        let report = match self.run().await {
            Ok(report) => report,
            Err(e) => {
                log::error!("Confirmation run aborted: {}", e);
                BatchReport::aborted(e.to_string())
            }
        };

        guard.finish(if report.success {
            RunState::Completed
        } else {
            RunState::Failed
        });

        report
    }

    async fn run(&self) -> Result<BatchReport> {
        let config = self.notifier.load_config().await?;

        let day = self.tomorrow();
        let appointments = self.notifier.appointments.pending_for_day(day).await?;
        log::info!(
            "Confirmation run for {}: {} appointment(s)",
            day,
            appointments.len()
        );

        let mut report = BatchReport::started();
        if appointments.is_empty() {
            return Ok(report);
        }

        let template = self.notifier.resolve_template().await;
        self.throttle.reset();

        for appointment in &appointments {
            match self.confirm(&config, &template, appointment).await {
                Ok(ItemOutcome::Skipped(reason)) => {
                    log::info!(
                        "Skipping appointment {}: {:?}",
                        appointment.appointment_id,
                        reason
                    );
                    report.skipped_count += 1;
                }
                Ok(ItemOutcome::Dispatched(NotificationStatus::Sent, _)) => {
                    report.sent_count += 1;
                }
                Ok(ItemOutcome::Dispatched(_, error)) => {
                    report.failed_count += 1;
                    report.errors.push(format!(
                        "{}: {}",
                        appointment.client_name(),
                        error.unwrap_or_default()
                    ));
                }
                Err(e) => {
                    log::error!(
                        "Error confirming appointment {}: {}",
                        appointment.appointment_id,
                        e
                    );
                    report.failed_count += 1;
                    report
                        .errors
                        .push(format!("{}: {}", appointment.client_name(), e));
                }
            }
        }

        log::info!(
            "Confirmation run for {} finished: {} sent, {} failed, {} skipped",
            day,
            report.sent_count,
            report.failed_count,
            report.skipped_count
        );

        Ok(report)
    }

    async fn confirm(
        &self,
        config: &MessagingConfig,
        template: &MessageTemplate,
        appointment: &AppointmentForNotification,
    ) -> Result<ItemOutcome> {
        let dedup = self.notifier.dedup(appointment.appointment_id).await?;
        if dedup != Dedup::Clear {
            return Ok(ItemOutcome::Skipped(dedup));
        }

        self.throttle.acquire(self.clock.as_ref()).await;

        let record = self.notifier.deliver(config, template, appointment).await?;
        Ok(ItemOutcome::Dispatched(record.status, record.error_message))
    }
}

/// Holds the runner in `Running`; dropping it without `finish` (a panic
/// mid-run) leaves the state `Failed` rather than stuck.
struct RunGuard<'a> {
    state: &'a Mutex<RunState>,
    outcome: RunState,
}

impl<'a> RunGuard<'a> {
    fn acquire(state: &'a Mutex<RunState>) -> Option<Self> {
        let mut current = state.lock().unwrap_or_else(PoisonError::into_inner);
        if *current == RunState::Running {
            return None;
        }
        *current = RunState::Running;

        Some(RunGuard {
            state,
            outcome: RunState::Failed,
        })
    }

    fn finish(mut self, outcome: RunState) {
        self.outcome = outcome;
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = self.outcome;
    }
}
