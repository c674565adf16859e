//! Telegram Bot transport
//!
//! Long-polls Telegram and hands every text message and button press to the
//! `CommandDispatcher`. Replies go back split to Telegram's message limit.
//!
//! Uses explicit Dispatcher pattern for reliable message polling.

use anyhow::{Context, Result};
use std::sync::Arc;
use teloxide::{
    dispatching::{Dispatcher, UpdateFilterExt},
    dptree,
    error_handlers::LoggingErrorHandler,
    prelude::*,
    types::Update,
};

use crate::config::{Config, StoreBackend};
use crate::dispatcher::{CommandDispatcher, InboundEvent};
use crate::messages::Reply;
use crate::remote::{RemoteGateway, SshExecutor};
use crate::session::{self, SessionStore};
use crate::store::{PersistenceGateway, PostgresStore, RecordStore, SqliteStore};
use crate::telegram_ui::{keyboard_markup, split_message, utf16_len, MESSAGE_LIMIT};

/// Build the gateways and run the bot until Ctrl-C
pub async fn run_telegram_bot(config: Config) -> Result<()> {
    let store: Arc<dyn RecordStore> = match &config.store {
        StoreBackend::Postgres(pg) => Arc::new(PostgresStore::connect_lazy(pg)),
        StoreBackend::Sqlite(path) => {
            tracing::info!("Record store: sqlite {:?}", path);
            Arc::new(
                SqliteStore::open(path)
                    .with_context(|| format!("Failed to open SQLite store at {:?}", path))?,
            )
        }
    };

    let persistence = PersistenceGateway::new(store);
    if !persistence.bootstrap().await {
        tracing::warn!("Record tables not ready, saves will fail until the store is reachable");
    }

    tracing::info!(
        "Remote host: {}@{}:{}",
        config.ssh.user,
        config.ssh.host,
        config.ssh.port
    );
    let executor = Arc::new(SshExecutor::new(config.ssh.clone()));
    let remote = RemoteGateway::new(executor, config.repl_log_path.clone());

    let dispatcher = Arc::new(CommandDispatcher::new(
        Arc::new(SessionStore::new()),
        remote,
        persistence,
    ));

    let bot = Bot::new(config.telegram_token.clone());

    // Verify bot token by calling getMe
    tracing::info!("Verifying bot token...");
    match bot.get_me().await {
        Ok(me) => {
            tracing::info!(
                "Bot authenticated: @{} (ID: {})",
                me.username.as_deref().unwrap_or("unknown"),
                me.id
            );
        }
        Err(e) => {
            tracing::error!("Failed to authenticate bot: {}", e);
            anyhow::bail!("Bot authentication failed: {}", e);
        }
    }

    // Delete any existing webhook to ensure polling works
    if let Err(e) = bot.delete_webhook().await {
        tracing::warn!("Failed to delete webhook: {} (continuing anyway)", e);
    }

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(message_handler))
        .branch(Update::filter_callback_query().endpoint(callback_handler));

    tracing::info!("Starting dispatcher with long polling...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![dispatcher])
        .default_handler(|upd| async move {
            tracing::debug!("Unhandled update: {:?}", upd);
        })
        .error_handler(LoggingErrorHandler::with_custom_text(
            "Error in message handler",
        ))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    tracing::warn!("Dispatcher stopped");
    Ok(())
}

/// Message handler endpoint for the dispatcher
async fn message_handler(
    bot: Bot,
    msg: Message,
    dispatcher: Arc<CommandDispatcher>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        tracing::debug!("Ignoring non-text message in chat {}", msg.chat.id.0);
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let preview = text.chars().take(50).collect::<String>();
    tracing::info!(
        ">>> Message received: user={}, chat={}, text={:?}",
        user.id.0,
        msg.chat.id.0,
        preview
    );

    let event = InboundEvent::from_text(
        session::UserId(user.id.0 as i64),
        user.full_name(),
        text,
    );
    for reply in dispatcher.dispatch(event).await {
        send_reply(&bot, msg.chat.id, &reply).await?;
    }

    Ok(())
}

/// Callback query handler for inline keyboard buttons
async fn callback_handler(
    bot: Bot,
    query: CallbackQuery,
    dispatcher: Arc<CommandDispatcher>,
) -> ResponseResult<()> {
    bot.answer_callback_query(&query.id).await?;

    let Some(data) = query.data.as_deref() else {
        return Ok(());
    };
    let Some(message) = query.message.as_ref() else {
        return Ok(());
    };
    let chat_id = message.chat().id;

    tracing::info!("Callback query: user={}, data={}", query.from.id.0, data);

    let event = InboundEvent::choice(
        session::UserId(query.from.id.0 as i64),
        query.from.full_name(),
        data,
    );
    let mut replies = dispatcher.dispatch(event).await.into_iter();

    // The first reply replaces the keyboard prompt
    if let Some(first) = replies.next() {
        let fits = first.keyboard.is_none() && utf16_len(&first.text) <= MESSAGE_LIMIT;
        let edited = fits
            && !first.text.trim().is_empty()
            && bot
                .edit_message_text(chat_id, message.id(), &first.text)
                .await
                .map_err(|e| tracing::debug!("Edit failed, sending instead: {}", e))
                .is_ok();
        if !edited {
            send_reply(&bot, chat_id, &first).await?;
        }
    }
    for reply in replies {
        send_reply(&bot, chat_id, &reply).await?;
    }

    Ok(())
}

/// Send a reply in chunks, with its keyboard on the last one
async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> ResponseResult<()> {
    let chunks = split_message(&reply.text, MESSAGE_LIMIT);
    let last = chunks.len() - 1;

    for (i, chunk) in chunks.into_iter().enumerate() {
        let request = bot.send_message(chat_id, chunk);
        match reply.keyboard {
            Some(keyboard) if i == last => {
                request.reply_markup(keyboard_markup(keyboard)).await?;
            }
            _ => {
                request.await?;
            }
        }
    }
    Ok(())
}
