use teloxide::{
    payloads::{EditMessageTextSetters, SendMessageSetters},
    requests::Requester,
    types::{
        ChatId, KeyboardButton, KeyboardMarkup, KeyboardRemove, MaybeInaccessibleMessage,
        Recipient, ReplyMarkup,
    },
    ApiError, RequestError,
};

use crate::{types::BotType, views::View};

pub trait BetterSendMessage {
    fn send_message_buttons<C, T, S>(
        &self,
        chat_id: C,
        text: T,
        buttons: Vec<S>,
    ) -> <BotType as Requester>::SendMessage
    where
        C: Into<Recipient>,
        T: Into<String>,
        S: Into<String>;

    fn send_message_easy<C, T>(&self, chat_id: C, text: T) -> <BotType as Requester>::SendMessage
    where
        C: Into<Recipient>,
        T: Into<String>,
    {
        self.send_message_buttons(chat_id, text, vec![] as Vec<&str>)
    }

    fn send_view<C>(&self, chat_id: C, view: View) -> <BotType as Requester>::SendMessage
    where
        C: Into<Recipient>;
}

impl BetterSendMessage for BotType {
    fn send_message_buttons<C, T, S>(
        &self,
        chat_id: C,
        text: T,
        buttons: Vec<S>,
    ) -> <BotType as Requester>::SendMessage
    where
        C: Into<Recipient>,
        T: Into<String>,
        S: Into<String>,
    {
        let mut message = self.send_message(chat_id, text);

        if buttons.is_empty() {
            message = message.reply_markup(ReplyMarkup::KeyboardRemove(KeyboardRemove::new()));
        } else {
            let buttons = buttons
                .into_iter()
                .map(|b| KeyboardButton::new(b.into()))
                .collect::<Vec<KeyboardButton>>();

            message = message.reply_markup(ReplyMarkup::Keyboard(
                KeyboardMarkup::new(vec![buttons])
                    .resize_keyboard()
                    .one_time_keyboard(),
            ));
        }

        message
    }

    fn send_view<C>(&self, chat_id: C, view: View) -> <BotType as Requester>::SendMessage
    where
        C: Into<Recipient>,
    {
        self.send_message(chat_id, view.text)
            .reply_markup(ReplyMarkup::InlineKeyboard(view.markup))
    }
}

/// Replaces the message a callback came from with `view`, or sends a new
/// message when the original can no longer be edited.
pub async fn show_view(
    bot: &BotType,
    chat_id: ChatId,
    origin: Option<&MaybeInaccessibleMessage>,
    view: View,
) -> anyhow::Result<()> {
    if let Some(MaybeInaccessibleMessage::Regular(message)) = origin {
        let result = bot
            .edit_message_text(message.chat.id, message.id, view.text.clone())
            .reply_markup(view.markup.clone())
            .await;

        match result {
            Ok(_) | Err(RequestError::Api(ApiError::MessageNotModified)) => return Ok(()),
            Err(e) => log::debug!("Could not edit message, sending a new one: {:?}", e),
        }
    }

    bot.send_view(chat_id, view).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use teloxide::{
        requests::{HasPayload, RequesterExt},
        types::ParseMode,
        Bot,
    };

    fn bot() -> BotType {
        Bot::new("0:token").parse_mode(ParseMode::Html)
    }

    #[test]
    fn buttons_become_a_one_time_keyboard() {
        let request = bot().send_message_buttons(ChatId(1), "Pick", vec!["/cancel"]);

        match &request.payload_ref().reply_markup {
            Some(ReplyMarkup::Keyboard(markup)) => {
                assert!(markup.one_time_keyboard);
                assert!(markup.resize_keyboard);
                assert_eq!(markup.keyboard[0][0].text, "/cancel");
            }
            other => panic!("unexpected markup {:?}", other),
        }
    }

    #[test]
    fn no_buttons_removes_the_keyboard() {
        let request = bot().send_message_easy(ChatId(1), "Done");
        assert!(matches!(
            request.payload_ref().reply_markup,
            Some(ReplyMarkup::KeyboardRemove(_))
        ));
    }
}
