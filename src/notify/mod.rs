//! Notifier port. Alerts fan out to the configured channels; a failing
//! channel is logged and never takes the pipeline down. PagerDuty receives
//! error/critical only.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::config::NotifySettings;
use crate::domain::{FiscalOpsError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Error => "error",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertChannel {
    Log,
    Email,
    Slack,
    Pagerduty,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub severity: AlertSeverity,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Alert {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: AlertSeverity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity,
            metadata: serde_json::Value::Null,
        }
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }
}

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Dispatch to specific channels, or all enabled ones when `None`.
    async fn send(&self, alert: &Alert, channels: Option<&[AlertChannel]>) -> Result<()>;

    fn enabled_channels(&self) -> Vec<AlertChannel>;
}

/// Production notifier wired from configuration. The log channel is always
/// on; email/slack/pagerduty light up when their settings are present.
pub struct AlertManager {
    settings: NotifySettings,
    http: reqwest::Client,
}

impl AlertManager {
    pub fn new(settings: NotifySettings) -> Self {
        let manager = Self {
            settings,
            http: reqwest::Client::new(),
        };
        info!(channels = ?manager.enabled_channels(), "alert manager initialized");
        manager
    }

    async fn send_email(&self, alert: &Alert) -> Result<()> {
        let host = self
            .settings
            .smtp_host
            .as_deref()
            .ok_or_else(|| FiscalOpsError::Notify("smtp host not configured".into()))?;
        let to = self
            .settings
            .email_to
            .as_deref()
            .ok_or_else(|| FiscalOpsError::Notify("email recipient not configured".into()))?;
        let user = self.settings.smtp_user.clone().unwrap_or_default();

        let message = Message::builder()
            .from(
                format!("fiscal-ops <{user}>")
                    .parse()
                    .map_err(|e| FiscalOpsError::Notify(format!("invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| FiscalOpsError::Notify(format!("invalid recipient: {e}")))?)
            .subject(format!(
                "[{}] {}",
                alert.severity.as_str().to_uppercase(),
                alert.title
            ))
            .header(ContentType::TEXT_PLAIN)
            .body(alert.body.clone())
            .map_err(|e| FiscalOpsError::Notify(format!("failed to build email: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| FiscalOpsError::Notify(format!("smtp transport: {e}")))?
            .port(self.settings.smtp_port);
        if let (Some(user), Some(password)) =
            (&self.settings.smtp_user, &self.settings.smtp_password)
        {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        builder
            .build()
            .send(message)
            .await
            .map_err(|e| FiscalOpsError::Notify(format!("smtp send: {e}")))?;
        Ok(())
    }

    async fn send_slack(&self, alert: &Alert) -> Result<()> {
        let webhook = self
            .settings
            .slack_webhook_url
            .as_deref()
            .ok_or_else(|| FiscalOpsError::Notify("slack webhook not configured".into()))?;

        let payload = serde_json::json!({
            "text": format!(
                "*[{}] {}*\n{}",
                alert.severity.as_str().to_uppercase(),
                alert.title,
                alert.body
            ),
        });
        self.http
            .post(webhook)
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_pagerduty(&self, alert: &Alert) -> Result<()> {
        let key = self
            .settings
            .pagerduty_integration_key
            .as_deref()
            .ok_or_else(|| FiscalOpsError::Notify("pagerduty key not configured".into()))?;

        let payload = serde_json::json!({
            "routing_key": key,
            "event_action": "trigger",
            "payload": {
                "summary": alert.title,
                "source": "fiscal-ops",
                "severity": alert.severity.as_str(),
                "custom_details": {
                    "body": alert.body,
                    "metadata": alert.metadata,
                },
            },
        });
        self.http
            .post("https://events.pagerduty.com/v2/enqueue")
            .json(&payload)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    fn log_alert(alert: &Alert) {
        match alert.severity {
            AlertSeverity::Info => info!(title = %alert.title, "{}", alert.body),
            AlertSeverity::Warning => warn!(title = %alert.title, "{}", alert.body),
            AlertSeverity::Error | AlertSeverity::Critical => {
                error!(title = %alert.title, severity = alert.severity.as_str(), "{}", alert.body)
            }
        }
    }
}

#[async_trait]
impl Notifier for AlertManager {
    async fn send(&self, alert: &Alert, channels: Option<&[AlertChannel]>) -> Result<()> {
        let enabled = self.enabled_channels();
        let targets: Vec<AlertChannel> = match channels {
            Some(requested) => requested
                .iter()
                .copied()
                .filter(|c| enabled.contains(c))
                .collect(),
            None => enabled,
        };

        for channel in targets {
            let outcome = match channel {
                AlertChannel::Log => {
                    Self::log_alert(alert);
                    Ok(())
                }
                AlertChannel::Email => self.send_email(alert).await,
                AlertChannel::Slack => self.send_slack(alert).await,
                AlertChannel::Pagerduty => {
                    if alert.severity >= AlertSeverity::Error {
                        self.send_pagerduty(alert).await
                    } else {
                        Ok(())
                    }
                }
            };
            if let Err(err) = outcome {
                error!(channel = ?channel, error = %err, "alert dispatch failed");
            }
        }
        Ok(())
    }

    fn enabled_channels(&self) -> Vec<AlertChannel> {
        let mut channels = vec![AlertChannel::Log];
        if self.settings.smtp_host.is_some() && self.settings.email_to.is_some() {
            channels.push(AlertChannel::Email);
        }
        if self.settings.slack_webhook_url.is_some() {
            channels.push(AlertChannel::Slack);
        }
        if self.settings.pagerduty_integration_key.is_some() {
            channels.push(AlertChannel::Pagerduty);
        }
        channels
    }
}

/// Capturing notifier for tests and dry runs.
#[derive(Default)]
pub struct MemoryNotifier {
    alerts: Mutex<Vec<Alert>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    async fn send(&self, alert: &Alert, _channels: Option<&[AlertChannel]>) -> Result<()> {
        self.alerts.lock().unwrap().push(alert.clone());
        Ok(())
    }

    fn enabled_channels(&self) -> Vec<AlertChannel> {
        vec![AlertChannel::Log]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channels_from_settings() {
        let manager = AlertManager::new(NotifySettings::default());
        assert_eq!(manager.enabled_channels(), vec![AlertChannel::Log]);

        let manager = AlertManager::new(NotifySettings {
            slack_webhook_url: Some("https://hooks.slack.test/x".into()),
            pagerduty_integration_key: Some("pd-key".into()),
            ..Default::default()
        });
        let channels = manager.enabled_channels();
        assert!(channels.contains(&AlertChannel::Slack));
        assert!(channels.contains(&AlertChannel::Pagerduty));
        assert!(!channels.contains(&AlertChannel::Email));
    }

    #[test]
    fn test_severity_ordering_gates_pagerduty() {
        assert!(AlertSeverity::Critical >= AlertSeverity::Error);
        assert!(AlertSeverity::Warning < AlertSeverity::Error);
    }

    #[tokio::test]
    async fn test_memory_notifier_captures() {
        let notifier = MemoryNotifier::new();
        notifier
            .send(
                &Alert::new("t", "b", AlertSeverity::Critical),
                None,
            )
            .await
            .unwrap();
        let alerts = notifier.alerts();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }
}
