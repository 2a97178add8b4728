use crate::bot::channel::{ButtonReply, TelegramReply};
use crate::bot::handlers::{identity_of, message_invocation, Command};
use crate::config::BotSettings;
use deskpilot_core::dispatcher::Dispatcher as Controller;
use deskpilot_core::panel::parse_callback_data;
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::CallbackQuery;
use teloxide::utils::command::BotCommands;
use tracing::{debug, info, warn};

/// Run the Telegram transport runtime until Ctrl+C.
///
/// Every update is handed to `controller`; authorization and cooldowns are
/// enforced there, not by update filters.
pub async fn run_bot(settings: Arc<BotSettings>, controller: Arc<Controller>) {
    let bot = Bot::new(settings.telegram.telegram_token.clone());
    publish_commands(&bot).await;

    info!(
        operator = settings.controller.allowed_user_id,
        commands = controller.registry().len(),
        "Bot is running..."
    );

    Dispatcher::builder(bot, setup_handler())
        .dependencies(dptree::deps![controller])
        .default_handler(|_| async {
            debug!("Ignored update without text or callback data");
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
}

async fn publish_commands(bot: &Bot) {
    match bot.set_my_commands(Command::bot_commands()).await {
        Ok(_) => debug!("Command menu published"),
        Err(e) => warn!(error = %e, "Failed to publish command menu"),
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .filter(|msg: Message| msg.text().is_some())
                .endpoint(handle_message),
        )
}

/// Typed commands and plain text.
///
/// Dispatch runs on its own task so a long build never blocks the chat.
async fn handle_message(
    bot: Bot,
    msg: Message,
    controller: Arc<Controller>,
) -> ResponseResult<()> {
    let Some(invocation) = message_invocation(&msg) else {
        return respond(());
    };
    let reply = TelegramReply::new(bot, msg.chat.id);

    tokio::spawn(async move {
        let outcome = controller.dispatch(invocation, &reply).await;
        debug!(?outcome, "Message handled");
    });
    respond(())
}

/// Panel button presses.
async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    controller: Arc<Controller>,
) -> ResponseResult<()> {
    let Some(button_id) = q
        .data
        .as_deref()
        .and_then(parse_callback_data)
        .map(str::to_string)
    else {
        debug!(data = ?q.data, "Ignoring foreign callback data");
        if let Err(e) = bot.answer_callback_query(q.id.clone()).await {
            debug!(error = %e, "Failed to acknowledge callback query");
        }
        return respond(());
    };

    let sender = Some(identity_of(&q.from));
    let chat_id = q
        .message
        .as_ref()
        .map_or_else(|| ChatId::from(q.from.id), |m| m.chat().id);
    let reply = ButtonReply::new(bot, chat_id, q);

    tokio::spawn(async move {
        let outcome = controller.dispatch_button(&button_id, sender, &reply).await;
        reply.acknowledge().await;
        debug!(button = %button_id, ?outcome, "Button handled");
    });
    respond(())
}
