//! Async Bot API client.

use std::time::Duration;

use linkrelay_relay::DocumentUpload;
use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::{debug, trace};

use crate::endpoint::ApiEndpointConfig;
use crate::types::{ApiResponse, InlineKeyboardMarkup, Message, Update, User};

/// Timeout for ordinary method calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra time granted on top of the long-poll window.
const POLL_GRACE: Duration = Duration::from_secs(10);

/// Errors from the Bot API client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {code}: {description}")]
    Api { code: u16, description: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bot token must not be empty")]
    InvalidToken,
}

impl Error {
    /// An edit that would not change the message.
    pub fn is_not_modified(&self) -> bool {
        matches!(
            self,
            Self::Api { description, .. } if description.contains("message is not modified")
        )
    }
}

/// Bot API client bound to one token and endpoint.
pub struct BotClient {
    http: reqwest::Client,
    base_url: String,
}

impl BotClient {
    pub fn new(token: &str, endpoint: &ApiEndpointConfig) -> Result<Self, Error> {
        if token.trim().is_empty() {
            return Err(Error::InvalidToken);
        }
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            base_url: endpoint.bot_base_url(token.trim()),
        })
    }

    /// Sets a custom base URL (for testing).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }

    /// Posts a JSON request and unwraps the response envelope.
    async fn call<T, P>(&self, method: &str, params: &P, timeout: Duration) -> Result<T, Error>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        trace!(method, "bot api call");
        let resp = self
            .http
            .post(self.method_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await?;
        parse_response(method, resp).await
    }

    pub async fn get_me(&self) -> Result<User, Error> {
        self.call("getMe", &json!({}), CALL_TIMEOUT).await
    }

    /// Long-polls for updates after `offset`, waiting up to `wait`.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        wait: Duration,
    ) -> Result<Vec<Update>, Error> {
        let params = json!({
            "offset": offset,
            "timeout": wait.as_secs(),
            "allowed_updates": ["message", "callback_query"],
        });
        self.call("getUpdates", &params, wait + POLL_GRACE).await
    }

    /// Sends an HTML message, optionally with an inline keyboard.
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<Message, Error> {
        let mut params = json!({
            "chat_id": chat_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = keyboard {
            params["reply_markup"] = serde_json::to_value(markup)?;
        }
        self.call("sendMessage", &params, CALL_TIMEOUT).await
    }

    /// Replaces a message's text. An inline keyboard is dropped unless given again.
    pub async fn edit_message_text(
        &self,
        chat_id: i64,
        message_id: i64,
        text: &str,
        keyboard: Option<&InlineKeyboardMarkup>,
    ) -> Result<(), Error> {
        let mut params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
            "parse_mode": "HTML",
        });
        if let Some(markup) = keyboard {
            params["reply_markup"] = serde_json::to_value(markup)?;
        }
        // Returns the edited message, or `true` for inline messages.
        let _: serde_json::Value = self.call("editMessageText", &params, CALL_TIMEOUT).await?;
        Ok(())
    }

    pub async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<(), Error> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self.call("deleteMessage", &params, CALL_TIMEOUT).await?;
        Ok(())
    }

    pub async fn answer_callback_query(
        &self,
        query_id: &str,
        text: Option<&str>,
    ) -> Result<(), Error> {
        let params = json!({ "callback_query_id": query_id, "text": text });
        let _: bool = self.call("answerCallbackQuery", &params, CALL_TIMEOUT).await?;
        Ok(())
    }

    /// Uploads a file as a document.
    ///
    /// The file is streamed from disk. Each call uses a dedicated HTTP client
    /// so the upload's connect and read timeouts do not leak into other calls;
    /// the write timeout bounds the whole request.
    pub async fn send_document(&self, upload: &DocumentUpload) -> Result<Message, Error> {
        let file = tokio::fs::File::open(&upload.path).await?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, upload.size)
            .file_name(upload.file_name.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new()
            .percent_encode_noop()
            .text("chat_id", upload.chat.to_string())
            .text("caption", upload.caption.clone())
            .text("parse_mode", "HTML")
            .part("document", part);

        let http = reqwest::Client::builder()
            .connect_timeout(upload.timeouts.connect)
            .read_timeout(upload.timeouts.read)
            .build()?;

        debug!(
            chat = %upload.chat,
            file = %upload.file_name,
            size = upload.size,
            write_timeout_secs = upload.timeouts.write.as_secs(),
            "sending document"
        );
        let resp = http
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .timeout(upload.timeouts.write)
            .send()
            .await?;
        parse_response("sendDocument", resp).await
    }
}

async fn parse_response<T: DeserializeOwned>(
    method: &str,
    resp: reqwest::Response,
) -> Result<T, Error> {
    let status = resp.status();
    let body = resp.bytes().await?;

    let envelope: ApiResponse<T> = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(Error::Api {
                code: status.as_u16(),
                description: String::from_utf8_lossy(&body).into_owned(),
            });
        }
    };

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            error_code,
            description,
            ..
        } => {
            let err = Error::Api {
                code: error_code.unwrap_or(status.as_u16()),
                description: description.unwrap_or_else(|| "no result".into()),
            };
            debug!(method, error = %err, "bot api call failed");
            Err(err)
        }
    }
}
