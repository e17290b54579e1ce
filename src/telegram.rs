use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TelegramConfig;
use crate::error::DeliveryError;

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

pub struct TelegramPoster {
    token: String,
    chat_id: String,
    api_base: String,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
    result: Option<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    message_id: i64,
}

impl TelegramPoster {
    pub fn from_config(config: &TelegramConfig) -> Result<Self, DeliveryError> {
        let token = config
            .bot_token
            .as_ref()
            .ok_or(DeliveryError::MissingToken)?
            .trim()
            .to_string();
        if token.is_empty() {
            return Err(DeliveryError::MissingToken);
        }

        let chat_id = config
            .chat_id
            .as_ref()
            .ok_or(DeliveryError::MissingChat)?
            .trim()
            .to_string();
        if chat_id.is_empty() {
            return Err(DeliveryError::MissingChat);
        }

        let api_base = config
            .api_base
            .as_deref()
            .map(str::trim)
            .filter(|base| !base.is_empty())
            .unwrap_or(DEFAULT_API_BASE)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            token,
            chat_id,
            api_base,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.token)
    }

    fn payload<'a>(&'a self, text: &'a str) -> SendMessage<'a> {
        SendMessage {
            chat_id: &self.chat_id,
            text,
            parse_mode: "Markdown",
            disable_web_page_preview: true,
        }
    }

    /// Returns the id of the sent message.
    pub async fn post(&self, text: &str) -> Result<i64, DeliveryError> {
        let client = reqwest::Client::new();
        let response = client
            .post(self.endpoint())
            .json(&self.payload(text))
            .send()
            .await
            .map_err(|err| DeliveryError::Http(err.without_url().to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| DeliveryError::Http(err.without_url().to_string()))?;
        let message_id = interpret_response(status.as_u16(), &body)?;
        info!(chat = %self.chat_id, message_id, "telegram message sent");
        Ok(message_id)
    }
}

fn interpret_response(status: u16, body: &str) -> Result<i64, DeliveryError> {
    let parsed: ApiResponse = serde_json::from_str(body)
        .map_err(|_| DeliveryError::Api(format!("status {status}: {body}")))?;
    if !parsed.ok {
        let description = parsed
            .description
            .unwrap_or_else(|| format!("status {status}"));
        return Err(DeliveryError::Api(description));
    }
    Ok(parsed.result.map(|sent| sent.message_id).unwrap_or_default())
}
