use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_API_BASE_URL: &str = "https://api.telegram.org";

pub trait Notifier: Send + Sync {
    fn send(&self, text: &str) -> Result<(), NotifyError>;
}

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("telegram request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("telegram rejected message with status {status}: {description}")]
    Rejected { status: u16, description: String },
}

#[derive(Debug, Deserialize)]
struct TelegramResponse {
    ok: bool,
    description: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    client: Client,
    endpoint: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(client: Client, base_url: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            client,
            endpoint: format!("{}/bot{bot_token}/sendMessage", base_url.trim_end_matches('/')),
            chat_id: chat_id.to_string(),
        }
    }

    pub fn build_client(timeout: Duration) -> Result<Client, NotifyError> {
        Client::builder()
            .timeout(timeout)
            .build()
            .map_err(NotifyError::Client)
    }
}

impl Notifier for TelegramNotifier {
    fn send(&self, text: &str) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "HTML",
            }))
            .send()?;

        let status = response.status();
        let body: Option<TelegramResponse> = response.json().ok();

        match body {
            Some(TelegramResponse { ok: true, .. }) if status.is_success() => {
                tracing::info!(chat_id = %self.chat_id, "telegram message sent");
                Ok(())
            }
            other => Err(NotifyError::Rejected {
                status: status.as_u16(),
                description: other
                    .and_then(|body| body.description)
                    .unwrap_or_else(|| "no description".to_string()),
            }),
        }
    }
}
