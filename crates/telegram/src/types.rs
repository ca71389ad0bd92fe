//! Bot API objects, reduced to the fields the relay reads.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub from: Option<User>,
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Chat {
    pub id: i64,
    #[serde(rename = "type", default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct User {
    pub id: i64,
    #[serde(default)]
    pub is_bot: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// A button press on an inline keyboard.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub from: User,
    #[serde(default)]
    pub message: Option<Message>,
    #[serde(default)]
    pub data: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

impl InlineKeyboardMarkup {
    /// One button per row.
    pub fn column(buttons: &[(&str, &str)]) -> Self {
        Self {
            inline_keyboard: buttons
                .iter()
                .map(|(text, data)| {
                    vec![InlineKeyboardButton {
                        text: (*text).to_string(),
                        callback_data: (*data).to_string(),
                    }]
                })
                .collect(),
        }
    }
}

/// Response envelope (internal).
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub error_code: Option<u16>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_message_update() {
        let json = r#"{"update_id":10,"message":{"message_id":5,"date":0,
            "chat":{"id":42,"type":"private"},
            "from":{"id":42,"is_bot":false,"first_name":"Ada"},
            "text":"/start"}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let message = update.message.unwrap();
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.chat.kind, "private");
        assert_eq!(message.text.as_deref(), Some("/start"));
        assert!(update.callback_query.is_none());
    }

    #[test]
    fn parses_callback_update() {
        let json = r#"{"update_id":11,"callback_query":{"id":"abc",
            "from":{"id":42,"first_name":"Ada"},
            "message":{"message_id":7,"chat":{"id":42}},
            "data":"rename"}}"#;
        let update: Update = serde_json::from_str(json).unwrap();
        let query = update.callback_query.unwrap();
        assert_eq!(query.data.as_deref(), Some("rename"));
        assert_eq!(query.message.unwrap().message_id, 7);
    }

    #[test]
    fn keyboard_serializes_as_rows() {
        let markup = InlineKeyboardMarkup::column(&[("A", "a"), ("B", "b")]);
        let json = serde_json::to_value(&markup).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"inline_keyboard": [
                [{"text": "A", "callback_data": "a"}],
                [{"text": "B", "callback_data": "b"}]
            ]})
        );
    }

    #[test]
    fn error_envelope() {
        let json = r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#;
        let resp: ApiResponse<Message> = serde_json::from_str(json).unwrap();
        assert!(!resp.ok);
        assert!(resp.result.is_none());
        assert_eq!(resp.error_code, Some(400));
    }
}
