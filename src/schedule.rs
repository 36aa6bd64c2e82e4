use chrono::{DateTime, Days, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::sync::Arc;

use crate::{clock::Clock, runner::ConfirmationRunner};

/// First instant strictly after `now` whose wall-clock time in `tz` is `at`.
/// A time skipped by a DST jump fires at the first valid instant after it;
/// a repeated time fires on its earlier occurrence.
pub fn next_run_after(now: DateTime<Utc>, at: NaiveTime, tz: Tz) -> DateTime<Utc> {
    let mut day = now.with_timezone(&tz).date_naive();

    loop {
        if let Some(candidate) = local_instant(day.and_time(at), tz) {
            if candidate > now {
                return candidate;
            }
        }

        day = match day.checked_add_days(Days::new(1)) {
            Some(next) => next,
            None => return now,
        };
    }
}

fn local_instant(local: chrono::NaiveDateTime, tz: Tz) -> Option<DateTime<Utc>> {
    if let Some(instant) = tz.from_local_datetime(&local).earliest() {
        return Some(instant.with_timezone(&Utc));
    }

    // Inside a DST gap: walk forward to the first local time that exists.
    (1..=180)
        .map(|minutes| local + chrono::Duration::minutes(minutes))
        .find_map(|shifted| tz.from_local_datetime(&shifted).earliest())
        .map(|instant| instant.with_timezone(&Utc))
}

/// Runs the confirmation batch every day at `at` salon time, forever.
pub async fn run_daily(runner: Arc<ConfirmationRunner>, clock: Arc<dyn Clock>, at: NaiveTime, tz: Tz) {
    loop {
        let now = clock.now();
        let next = next_run_after(now, at, tz);
        log::info!("Next confirmation run at {}", next.with_timezone(&tz));

        let wait = (next - now).to_std().unwrap_or_default();
        clock.sleep(wait).await;

        let report = runner.run_daily_confirmation().await;
        if report.success {
            log::info!(
                "Scheduled confirmation run: {} sent, {} failed, {} skipped",
                report.sent_count,
                report.failed_count,
                report.skipped_count
            );
            for error in &report.errors {
                log::warn!("Scheduled confirmation run: {}", error);
            }
        } else {
            log::error!(
                "Scheduled confirmation run did not complete: {}",
                report.errors.join("; ")
            );
        }
    }
}
