//! Notification dispatch: actually sends run summaries to configured channels.
//! Supports: Telegram Bot API, Discord Webhook, HTTP Webhook.

use std::time::Duration;

use async_trait::async_trait;
use farmflow_core::config::NotifyConfig;
use farmflow_core::error::{FarmflowError, Result};
use farmflow_core::traits::Notifier;
use farmflow_core::types::ExecutionSummary;

use super::notify::{Notification, NotifyPriority, has_problems};

/// Notification target configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyTarget {
    /// Telegram Bot API: send via `sendMessage`.
    Telegram { bot_token: String, chat_id: String },
    /// Discord Webhook URL.
    Discord { webhook_url: String },
    /// Generic HTTP webhook: POST with JSON body.
    Webhook {
        url: String,
        headers: Vec<(String, String)>,
    },
}

const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Send one notification to one target; the error is a human-readable reason.
pub async fn dispatch(
    client: &reqwest::Client,
    notification: &Notification,
    target: &NotifyTarget,
) -> std::result::Result<(), String> {
    let (channel, request) = match target {
        NotifyTarget::Telegram { bot_token, chat_id } => (
            "Telegram",
            client
                .post(format!("https://api.telegram.org/bot{bot_token}/sendMessage"))
                .json(&telegram_payload(chat_id, notification)),
        ),
        NotifyTarget::Discord { webhook_url } => {
            ("Discord", client.post(webhook_url).json(&discord_payload(notification)))
        }
        NotifyTarget::Webhook { url, headers } => {
            let mut req = client.post(url).json(notification);
            for (key, value) in headers {
                req = req.header(key.as_str(), value.as_str());
            }
            ("Webhook", req)
        }
    };

    let resp = request
        .timeout(SEND_TIMEOUT)
        .send()
        .await
        .map_err(|e| format!("{channel} send failed: {e}"))?;
    let status = resp.status();
    if status.is_success() {
        tracing::info!("🔔 {channel} notification sent: {}", notification.title);
        return Ok(());
    }
    let body = resp.text().await.unwrap_or_default();
    Err(format!("{channel} responded {status}: {}", body.trim()))
}

fn footer(notification: &Notification) -> String {
    format!("{} • {}", notification.source, notification.timestamp.format("%Y-%m-%d %H:%M UTC"))
}

fn telegram_payload(chat_id: &str, notification: &Notification) -> serde_json::Value {
    let text = format!(
        "{} *{}*\n\n{}\n\n_{}_",
        priority_emoji(notification.priority),
        escape_markdown(&notification.title),
        escape_markdown(&notification.body),
        escape_markdown(&footer(notification)),
    );
    serde_json::json!({
        "chat_id": chat_id,
        "text": text,
        "parse_mode": "Markdown",
        "disable_notification": notification.priority == NotifyPriority::Low,
    })
}

fn discord_payload(notification: &Notification) -> serde_json::Value {
    let color = match notification.priority {
        NotifyPriority::High => 0xD9_3025,
        NotifyPriority::Normal => 0x3B_A55C,
        NotifyPriority::Low => 0x8E_9297,
    };
    serde_json::json!({
        "embeds": [{
            "title": notification.title,
            "description": notification.body,
            "color": color,
            "footer": { "text": footer(notification) },
        }]
    })
}

fn priority_emoji(priority: NotifyPriority) -> &'static str {
    match priority {
        NotifyPriority::High => "🚨",
        NotifyPriority::Normal => "🌾",
        NotifyPriority::Low => "💤",
    }
}

/// Escape Telegram MarkdownV1 special characters.
fn escape_markdown(s: &str) -> String {
    s.replace('_', "\\_")
        .replace('*', "\\*")
        .replace('[', "\\[")
        .replace('`', "\\`")
}

/// Build targets from the `[notify]` config section, skipping disabled or blank ones.
pub fn targets_from_config(config: &NotifyConfig) -> Vec<(String, NotifyTarget)> {
    let mut targets = Vec::new();

    if let Some(tg) = &config.telegram {
        if tg.enabled && !tg.bot_token.is_empty() && !tg.chat_id.is_empty() {
            targets.push((
                "telegram".to_string(),
                NotifyTarget::Telegram {
                    bot_token: tg.bot_token.clone(),
                    chat_id: tg.chat_id.clone(),
                },
            ));
        }
    }

    if let Some(dc) = &config.discord {
        if dc.enabled && !dc.webhook_url.is_empty() {
            targets.push((
                "discord".to_string(),
                NotifyTarget::Discord {
                    webhook_url: dc.webhook_url.clone(),
                },
            ));
        }
    }

    if let Some(wh) = &config.webhook {
        if wh.enabled && !wh.url.is_empty() {
            targets.push((
                "webhook".to_string(),
                NotifyTarget::Webhook {
                    url: wh.url.clone(),
                    headers: wh.headers.clone(),
                },
            ));
        }
    }

    targets
}

/// Sends every run summary to all configured targets.
pub struct ChannelNotifier {
    client: reqwest::Client,
    targets: Vec<(String, NotifyTarget)>,
    only_on_problems: bool,
}

impl ChannelNotifier {
    pub fn new(targets: Vec<(String, NotifyTarget)>, only_on_problems: bool) -> Self {
        Self {
            client: reqwest::Client::new(),
            targets,
            only_on_problems,
        }
    }

    pub fn from_config(config: &NotifyConfig) -> Self {
        Self::new(targets_from_config(config), config.only_on_problems)
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    /// Fails only when every target failed.
    async fn notify(&self, summary: &ExecutionSummary) -> Result<()> {
        if self.targets.is_empty() || (self.only_on_problems && !has_problems(summary)) {
            return Ok(());
        }
        let notification = Notification::from_summary(summary);
        let mut failures = Vec::new();
        for (name, target) in &self.targets {
            if let Err(e) = dispatch(&self.client, &notification, target).await {
                tracing::warn!("⚠️ {name} notification failed: {e}");
                failures.push(format!("{name}: {e}"));
            }
        }
        if failures.len() == self.targets.len() {
            return Err(FarmflowError::Notify(failures.join("; ")));
        }
        Ok(())
    }
}
