//! Monitored runner: wraps a pipeline invocation with timing, error capture
//! and alert dispatch. Errors are re-raised after alerting so the caller's
//! exit-code semantics are untouched.

use chrono::Utc;
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tracing::{error, info};

use crate::domain::Result;
use crate::notify::{Alert, AlertSeverity, Notifier};

/// Runs longer than this notify at WARNING even on success.
const LONG_RUN_SECS: f64 = 3600.0;

#[derive(Debug, Clone, Serialize)]
pub struct RunMetrics {
    pub pipeline: String,
    pub success: bool,
    pub duration_seconds: f64,
    pub started_at: String,
    pub finished_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct RunMonitor {
    notifier: Arc<dyn Notifier>,
    last_metrics: Mutex<Option<RunMetrics>>,
}

impl RunMonitor {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            last_metrics: Mutex::new(None),
        }
    }

    pub fn last_metrics(&self) -> Option<RunMetrics> {
        self.last_metrics.lock().unwrap().clone()
    }

    /// Execute a pipeline future under monitoring.
    pub async fn run_monitored<T, F>(&self, name: &str, operation: F) -> Result<T>
    where
        F: std::future::Future<Output = Result<T>>,
    {
        let started_at = Utc::now();
        let timer = Instant::now();
        info!(pipeline = name, "starting monitored run");

        match operation.await {
            Ok(value) => {
                let duration = timer.elapsed().as_secs_f64();
                self.store_metrics(RunMetrics {
                    pipeline: name.to_string(),
                    success: true,
                    duration_seconds: duration,
                    started_at: started_at.to_rfc3339(),
                    finished_at: Utc::now().to_rfc3339(),
                    error: None,
                });
                info!(pipeline = name, duration_seconds = duration, "run succeeded");

                if duration > LONG_RUN_SECS {
                    let alert = Alert::new(
                        format!("Pipeline {name} - long execution time"),
                        format!("Run completed but took {:.1} minutes", duration / 60.0),
                        AlertSeverity::Warning,
                    );
                    let _ = self.notifier.send(&alert, None).await;
                }
                Ok(value)
            }
            Err(err) => {
                let duration = timer.elapsed().as_secs_f64();
                let message = err.to_string();
                self.store_metrics(RunMetrics {
                    pipeline: name.to_string(),
                    success: false,
                    duration_seconds: duration,
                    started_at: started_at.to_rfc3339(),
                    finished_at: Utc::now().to_rfc3339(),
                    error: Some(message.clone()),
                });
                error!(pipeline = name, error = %message, "run failed");

                let alert = Alert::new(
                    format!("Pipeline failed: {name}"),
                    format!("Error: {message}\n\nDuration: {duration:.2}s"),
                    classify_severity(&message),
                )
                .with_metadata(serde_json::json!({
                    "pipeline": name,
                    "duration_seconds": duration,
                }));
                let _ = self.notifier.send(&alert, None).await;

                Err(err)
            }
        }
    }

    fn store_metrics(&self, metrics: RunMetrics) {
        *self.last_metrics.lock().unwrap() = Some(metrics);
    }
}

/// Database and corruption failures page someone; the rest are errors.
fn classify_severity(message: &str) -> AlertSeverity {
    let m = message.to_lowercase();
    if ["database", "connection", "corrupt"].iter().any(|k| m.contains(k)) {
        AlertSeverity::Critical
    } else {
        AlertSeverity::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FiscalOpsError;
    use crate::notify::MemoryNotifier;

    #[tokio::test]
    async fn test_success_records_metrics_without_alert() {
        let notifier = Arc::new(MemoryNotifier::new());
        let monitor = RunMonitor::new(notifier.clone());

        let result = monitor
            .run_monitored("treasury", async { Ok::<_, FiscalOpsError>(42) })
            .await
            .unwrap();
        assert_eq!(result, 42);

        let metrics = monitor.last_metrics().unwrap();
        assert!(metrics.success);
        assert!(notifier.alerts().is_empty());
    }

    #[tokio::test]
    async fn test_database_failure_is_critical_and_reraised() {
        let notifier = Arc::new(MemoryNotifier::new());
        let monitor = RunMonitor::new(notifier.clone());

        let outcome: Result<()> = monitor
            .run_monitored("treasury", async {
                Err(FiscalOpsError::internal("database connection refused"))
            })
            .await;
        assert!(outcome.is_err());

        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);

        let metrics = monitor.last_metrics().unwrap();
        assert!(!metrics.success);
        assert!(metrics.error.as_deref().unwrap().contains("database"));
    }

    #[tokio::test]
    async fn test_parse_failure_is_plain_error() {
        let notifier = Arc::new(MemoryNotifier::new());
        let monitor = RunMonitor::new(notifier.clone());

        let _: Result<()> = monitor
            .run_monitored("oag", async {
                Err(FiscalOpsError::Extraction("bad pdf".into()))
            })
            .await;

        assert_eq!(notifier.alerts()[0].severity, AlertSeverity::Error);
    }
}
