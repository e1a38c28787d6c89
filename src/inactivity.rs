//! Inactivity monitor.
//!
//! A once-per-second loop with two independent timers: a 60-second metric
//! report (per-folder upload-count deltas to the monitoring sink) and the
//! inactivity alert itself. An alert is followed by a ten-minute self-imposed
//! silence so one stuck folder cannot storm the operator's inbox, and an
//! optional daily silence window suppresses alerts on a schedule. The
//! monitor only runs when an SMTP transport is configured.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;

use crate::config::AppSettings;
use crate::mailer::Mailer;
use crate::metrics::MetricsClient;
use crate::observer::UploadObserver;

const REPORT_PERIOD: Duration = Duration::from_secs(60);
const POST_ALERT_SILENCE_MINUTES: i64 = 10;

pub struct InactivityMonitor {
    settings: AppSettings,
    observer: Arc<UploadObserver>,
    mailer: Mailer,
    metrics: Option<MetricsClient>,
    silence_until: DateTime<Utc>,
    last_counts: HashMap<String, u64>,
}

impl InactivityMonitor {
    pub fn new(settings: AppSettings, observer: Arc<UploadObserver>, mailer: Mailer) -> Self {
        let metrics = MetricsClient::from_url(&settings.monitoring_url);
        Self {
            settings,
            observer,
            mailer,
            metrics,
            silence_until: Utc::now(),
            last_counts: HashMap::new(),
        }
    }

    pub async fn run(mut self, token: CancellationToken) {
        let mut last_report = Instant::now();
        loop {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
            if token.is_cancelled() {
                return;
            }

            if last_report.elapsed() >= REPORT_PERIOD {
                self.report().await;
                last_report = Instant::now();
            }

            let now = Utc::now();
            if self.is_silenced(now) {
                continue;
            }
            if self.alert_due(now) {
                tracing::warn!(
                    threshold_seconds = self.settings.inactivity_alert_seconds,
                    "no uploads within threshold, alerting"
                );
                self.mailer
                    .send_alert(self.settings.inactivity_alert_seconds)
                    .await;
                self.note_alert_sent(now);
            }
        }
    }

    fn alert_due(&self, now: DateTime<Utc>) -> bool {
        (now - self.observer.last_upload()).num_seconds()
            > self.settings.inactivity_alert_seconds as i64
    }

    fn is_silenced(&self, now: DateTime<Utc>) -> bool {
        if self.silence_until >= now {
            return true;
        }
        in_daily_window(
            &now.format("%H:%M").to_string(),
            &self.settings.silence_start_time,
            &self.settings.silence_end_time,
        )
    }

    fn note_alert_sent(&mut self, now: DateTime<Utc>) {
        self.silence_until = now + chrono::Duration::minutes(POST_ALERT_SILENCE_MINUTES);
    }

    /// Emit one sample per folder: the count delta since the last report.
    async fn report(&mut self) {
        if self.metrics.is_none() {
            return;
        }
        let now = Utc::now();
        let deltas = self.next_deltas();
        let Some(metrics) = &self.metrics else {
            return;
        };
        for (name, delta) in deltas {
            metrics.report_count(&name, now, delta).await;
        }
    }

    fn next_deltas(&mut self) -> Vec<(String, u64)> {
        self.observer
            .upload_counts()
            .into_iter()
            .map(|(name, current)| {
                let last = self.last_counts.entry(name.clone()).or_insert(0);
                let delta = current - *last;
                *last = current;
                (name, delta)
            })
            .collect()
    }
}

/// Daily silence window check over "HH:mm" strings, compared
/// lexicographically: silenced while `time >= start && end >= time`. Note
/// this cannot express a wrap-around window like 22:00-06:00 (no time of day
/// satisfies both bounds), matching the documented comparison as-is.
fn in_daily_window(time: &str, start: &str, end: &str) -> bool {
    if start.is_empty() || end.is_empty() {
        return false;
    }
    time >= start && end >= time
}

#[cfg(test)]
mod tests {
    use super::*;

    fn monitor(threshold_seconds: u64, start: &str, end: &str) -> InactivityMonitor {
        let settings = AppSettings {
            inactivity_alert_seconds: threshold_seconds,
            smtp_server: "smtp.example.com".to_string(),
            smtp_from: "uploader@example.com".to_string(),
            smtp_to: "ops@example.com".to_string(),
            silence_start_time: start.to_string(),
            silence_end_time: end.to_string(),
            ..Default::default()
        };
        let mailer = Mailer::from_settings(&settings).unwrap().unwrap();
        InactivityMonitor::new(settings, Arc::new(UploadObserver::new()), mailer)
    }

    #[test]
    fn alert_fires_past_threshold_then_silences_ten_minutes() {
        let mut m = monitor(120, "", "");
        let boot = Utc::now();

        // Observer starts at "now": nothing due yet.
        assert!(!m.alert_due(boot));

        // 121 seconds of inactivity crosses the 120s threshold.
        let later = boot + chrono::Duration::seconds(121);
        assert!(!m.is_silenced(later));
        assert!(m.alert_due(later));

        m.note_alert_sent(later);
        assert!(m.is_silenced(later + chrono::Duration::seconds(1)));
        assert!(m.is_silenced(later + chrono::Duration::minutes(10)));
        assert!(!m.is_silenced(later + chrono::Duration::minutes(10) + chrono::Duration::seconds(1)));
        // Still inactive once the silence lapses, so the alert re-arms.
        assert!(m.alert_due(later + chrono::Duration::minutes(11)));
    }

    #[test]
    fn daily_window_contains_time_between_bounds() {
        assert!(in_daily_window("12:00", "09:00", "17:00"));
        assert!(in_daily_window("09:00", "09:00", "17:00"));
        assert!(in_daily_window("17:00", "09:00", "17:00"));
        assert!(!in_daily_window("08:59", "09:00", "17:00"));
        assert!(!in_daily_window("17:01", "09:00", "17:00"));
    }

    #[test]
    fn empty_bound_disables_the_daily_window() {
        assert!(!in_daily_window("12:00", "", "17:00"));
        assert!(!in_daily_window("12:00", "09:00", ""));
    }

    #[test]
    fn wrap_around_window_never_silences() {
        // The lexicographic comparison cannot hold across midnight; a
        // 22:00-06:00 "overnight" window silences nothing.
        assert!(!in_daily_window("23:00", "22:00", "06:00"));
        assert!(!in_daily_window("03:00", "22:00", "06:00"));
    }

    #[test]
    fn report_deltas_reset_between_reports() {
        let mut m = monitor(120, "", "");
        m.observer.record_upload("invoices");
        m.observer.record_upload("invoices");
        m.observer.record_upload("reports");

        let mut deltas = m.next_deltas();
        deltas.sort();
        assert_eq!(
            deltas,
            vec![("invoices".to_string(), 2), ("reports".to_string(), 1)]
        );

        // Nothing new since the last report: every delta drops to zero.
        let mut deltas = m.next_deltas();
        deltas.sort();
        assert_eq!(
            deltas,
            vec![("invoices".to_string(), 0), ("reports".to_string(), 0)]
        );
    }
}
