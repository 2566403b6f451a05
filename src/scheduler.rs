//! Daily trigger for the draft workflow.
//!
//! Fires once a day at a fixed wall-clock time in the process's local time
//! zone. The next fire time is recomputed after every run, so clock changes
//! and DST shifts are picked up the following day.

use crate::api::{ImageGenerator, TextGenerator};
use crate::app::AppContext;
use crate::feeds::HeadlineSource;
use crate::telegram::Channel;
use crate::workflow::RunOutcome;
use chrono::{DateTime, Duration, Local, LocalResult, NaiveTime, TimeZone};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

/// Next instant strictly after `now` whose local wall-clock time is `at`.
///
/// When `at` does not exist on a given day (DST gap) the run moves one hour
/// later; when it exists twice (DST overlap) the earlier instant wins.
pub fn next_occurrence<Tz: TimeZone>(now: &DateTime<Tz>, at: NaiveTime) -> DateTime<Tz> {
    let tz = now.timezone();
    let mut day = now.date_naive();

    loop {
        let candidate = day.and_time(at);
        let resolved = match tz.from_local_datetime(&candidate) {
            LocalResult::Single(t) => Some(t),
            LocalResult::Ambiguous(earliest, _) => Some(earliest),
            LocalResult::None => tz
                .from_local_datetime(&(candidate + Duration::hours(1)))
                .earliest(),
        };
        if let Some(t) = resolved {
            if t > *now {
                return t;
            }
        }
        day = match day.succ_opt() {
            Some(next) => next,
            None => return now.clone() + Duration::days(1),
        };
    }
}

/// Run the draft (with image) every day at `at` until `shutdown` flips.
#[instrument(level = "info", skip(ctx, shutdown))]
pub async fn run_daily<C, G, H>(
    ctx: Arc<AppContext<C, G, H>>,
    at: NaiveTime,
    mut shutdown: watch::Receiver<bool>,
) where
    C: Channel + 'static,
    G: TextGenerator + ImageGenerator + 'static,
    H: HeadlineSource + 'static,
{
    loop {
        let now = Local::now();
        let next = next_occurrence(&now, at);
        let wait = (next.clone() - now).to_std().unwrap_or_default();
        info!(next = %next.to_rfc3339(), wait_secs = wait.as_secs(), "Next daily draft scheduled");

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(wait) => {}
        }

        // Independent task: a slow run must not delay shutdown handling
        let job = Arc::clone(&ctx);
        tokio::spawn(async move {
            match job.run_post(true).await {
                Ok(RunOutcome::Delivered { with_photo }) => {
                    info!(with_photo, "Daily draft delivered")
                }
                Ok(RunOutcome::Skipped) => warn!("Daily draft skipped; another run in progress"),
                Err(e) => error!(error = %e, "Daily draft failed"),
            }
        });
    }
    info!("Scheduler stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, Utc};
    use chrono_tz::Europe::Berlin;

    fn ten() -> NaiveTime {
        NaiveTime::from_hms_opt(10, 0, 0).unwrap()
    }

    #[test]
    fn test_next_occurrence_later_today() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 8, 30, 0).unwrap();
        assert_eq!(
            next_occurrence(&now, ten()),
            Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_occurrence_rolls_to_tomorrow() {
        let now = Utc.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap();
        assert_eq!(
            next_occurrence(&now, ten()),
            Utc.with_ymd_and_hms(2025, 5, 7, 10, 0, 0).unwrap()
        );

        let now = Utc.with_ymd_and_hms(2025, 12, 31, 23, 59, 0).unwrap();
        assert_eq!(
            next_occurrence(&now, ten()),
            Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_occurrence_respects_offset() {
        let msk = FixedOffset::east_opt(3 * 3600).unwrap();
        let now = msk.with_ymd_and_hms(2025, 5, 6, 9, 59, 59).unwrap();
        let next = next_occurrence(&now, ten());
        assert_eq!(next, msk.with_ymd_and_hms(2025, 5, 6, 10, 0, 0).unwrap());
        assert_eq!(next.with_timezone(&Utc).time(), NaiveTime::from_hms_opt(7, 0, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_in_dst_gap_moves_one_hour_later() {
        // 2025-03-30 02:00 CET jumps straight to 03:00 CEST
        let at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let now = Berlin.with_ymd_and_hms(2025, 3, 30, 0, 0, 0).unwrap();
        let next = next_occurrence(&now, at);

        assert_eq!(next.to_rfc3339(), "2025-03-30T03:30:00+02:00");
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 3, 30, 1, 30, 0).unwrap());
    }

    #[test]
    fn test_next_occurrence_ambiguous_time_takes_earlier() {
        // 2025-10-26 03:00 CEST falls back to 02:00 CET, so 02:30 happens twice
        let at = NaiveTime::from_hms_opt(2, 30, 0).unwrap();
        let now = Berlin.with_ymd_and_hms(2025, 10, 26, 0, 0, 0).unwrap();
        let next = next_occurrence(&now, at);

        assert_eq!(next.to_rfc3339(), "2025-10-26T02:30:00+02:00");
        assert_eq!(next.with_timezone(&Utc), Utc.with_ymd_and_hms(2025, 10, 26, 0, 30, 0).unwrap());
    }
}
