//! `DeliveryTransport` on top of the Bot API.

use std::future::Future;
use std::pin::Pin;

use linkrelay_relay::{ChatId, DeliveryTransport, DocumentUpload, MessageRef, TransportError};

use crate::client::{BotClient, Error};

impl From<Error> for TransportError {
    fn from(err: Error) -> Self {
        if err.is_not_modified() {
            return TransportError::NotModified;
        }
        match err {
            Error::Http(e) if e.is_timeout() => TransportError::Timeout(e.to_string()),
            Error::Http(e) if e.is_connect() || e.is_request() || e.is_body() => {
                TransportError::Network(e.to_string())
            }
            Error::Http(e) => TransportError::Api {
                code: e.status().map_or(0, |s| s.as_u16()),
                description: e.to_string(),
            },
            Error::Api { code, description } => TransportError::Api { code, description },
            Error::Io(e) => TransportError::Io(e),
            other => TransportError::Api {
                code: 0,
                description: other.to_string(),
            },
        }
    }
}

fn message_ref(chat: ChatId, message_id: i64) -> MessageRef {
    MessageRef { chat, message_id }
}

impl DeliveryTransport for BotClient {
    fn send_message<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let sent = BotClient::send_message(self, chat.0, text, None).await?;
            Ok(message_ref(chat, sent.message_id))
        })
    }

    fn edit_message<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + 'a>> {
        Box::pin(async move {
            self.edit_message_text(message.chat.0, message.message_id, text, None)
                .await?;
            Ok(())
        })
    }

    fn delete_message(
        &self,
        message: MessageRef,
    ) -> Pin<Box<dyn Future<Output = Result<(), TransportError>> + Send + '_>> {
        Box::pin(async move {
            BotClient::delete_message(self, message.chat.0, message.message_id).await?;
            Ok(())
        })
    }

    fn send_document<'a>(
        &'a self,
        upload: &'a DocumentUpload,
    ) -> Pin<Box<dyn Future<Output = Result<MessageRef, TransportError>> + Send + 'a>> {
        Box::pin(async move {
            let sent = BotClient::send_document(self, upload).await?;
            Ok(message_ref(upload.chat, sent.message_id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkrelay_relay::FailureCategory;

    #[test]
    fn not_modified_is_recognised() {
        let err = Error::Api {
            code: 400,
            description: "Bad Request: message is not modified".into(),
        };
        assert!(matches!(TransportError::from(err), TransportError::NotModified));
    }

    #[test]
    fn api_errors_are_other() {
        let err = TransportError::from(Error::Api {
            code: 413,
            description: "Request Entity Too Large".into(),
        });
        assert_eq!(err.category(), FailureCategory::Other);
    }

    #[tokio::test]
    async fn connection_refused_is_network() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let err = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/"))
            .send()
            .await
            .unwrap_err();
        let mapped = TransportError::from(Error::Http(err));
        assert_eq!(mapped.category(), FailureCategory::Network);
    }

    #[tokio::test]
    async fn elapsed_deadline_is_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        // Accept but never answer.
        let server = tokio::spawn(async move {
            let _conn = listener.accept().await;
            std::future::pending::<()>().await;
        });

        let err = reqwest::Client::new()
            .get(format!("http://127.0.0.1:{port}/"))
            .timeout(std::time::Duration::from_millis(200))
            .send()
            .await
            .unwrap_err();
        let mapped = TransportError::from(Error::Http(err));
        assert_eq!(mapped.category(), FailureCategory::Timeout);
        server.abort();
    }
}
