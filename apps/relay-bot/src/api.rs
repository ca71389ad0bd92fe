//! Chat operations the conversation needs beyond plain delivery.

use std::future::Future;
use std::pin::Pin;

use linkrelay_relay::{ChatId, DeliveryTransport, MessageRef, TransportError};
use linkrelay_telegram::{BotClient, InlineKeyboardMarkup};

/// Boxed future returned by [`BotApi`] methods.
pub type ApiFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// A delivery transport that can also show inline keyboards and
/// acknowledge button presses.
pub trait BotApi: DeliveryTransport {
    fn send_with_keyboard<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
        keyboard: &'a InlineKeyboardMarkup,
    ) -> ApiFuture<'a, MessageRef>;

    fn edit_with_keyboard<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
        keyboard: &'a InlineKeyboardMarkup,
    ) -> ApiFuture<'a, ()>;

    fn answer_callback<'a>(&'a self, query_id: &'a str) -> ApiFuture<'a, ()>;
}

impl BotApi for BotClient {
    fn send_with_keyboard<'a>(
        &'a self,
        chat: ChatId,
        text: &'a str,
        keyboard: &'a InlineKeyboardMarkup,
    ) -> ApiFuture<'a, MessageRef> {
        Box::pin(async move {
            let sent = BotClient::send_message(self, chat.0, text, Some(keyboard)).await?;
            Ok(MessageRef {
                chat,
                message_id: sent.message_id,
            })
        })
    }

    fn edit_with_keyboard<'a>(
        &'a self,
        message: MessageRef,
        text: &'a str,
        keyboard: &'a InlineKeyboardMarkup,
    ) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.edit_message_text(message.chat.0, message.message_id, text, Some(keyboard))
                .await?;
            Ok(())
        })
    }

    fn answer_callback<'a>(&'a self, query_id: &'a str) -> ApiFuture<'a, ()> {
        Box::pin(async move {
            self.answer_callback_query(query_id, None).await?;
            Ok(())
        })
    }
}
