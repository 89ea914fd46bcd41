use std::sync::Arc;

use async_trait::async_trait;
use log::warn;
use teloxide::adaptors::{throttle::Throttle, CacheMe};
use teloxide::dispatching::UpdateFilterExt;
use teloxide::payloads::{SendDocumentSetters, SendMessageSetters};
use teloxide::prelude::{dptree, ChatId, Dispatcher, Message, Requester, Update, UserId};
use teloxide::types::{InputFile, LinkPreviewOptions, ParseMode, Recipient};
use teloxide::{ApiError, Bot, RequestError};

use crate::bot_commands::Command;
use crate::sentinel::SentinelState;

pub type TgBot = CacheMe<Throttle<Bot>>;

/// Telegram refuses text messages longer than this
const MAX_MESSAGE_LENGTH: usize = 4096;

pub struct BotData {
    bot: TgBot,
    bot_id: UserId,
    sentinel: Arc<SentinelState>,
}

impl BotData {
    pub async fn new(bot: TgBot, sentinel: Arc<SentinelState>) -> Result<Self, anyhow::Error> {
        let bot_id = bot.get_me().await?.id;
        Ok(Self {
            bot,
            bot_id,
            sentinel,
        })
    }

    pub async fn start_polling(&self) -> Result<(), anyhow::Error> {
        let bot = self.bot.clone();
        let (msg_sender, mut msg_receiver) = tokio::sync::mpsc::channel(1000);

        tokio::spawn(async move {
            let handler =
                dptree::entry().branch(Update::filter_message().endpoint(move |msg: Message| {
                    let msg_sender = msg_sender.clone();
                    async move {
                        if msg_sender.send(msg).await.is_err() {
                            warn!("Message receiver is gone, dropping update");
                        }
                        Ok::<(), Box<dyn std::error::Error + Send + Sync>>(())
                    }
                }));
            Dispatcher::builder(bot, handler).build().dispatch().await;
        });

        let me = self.id();
        let sentinel = Arc::clone(&self.sentinel);
        tokio::spawn(async move {
            while let Some(msg) = msg_receiver.recv().await {
                let sentinel = Arc::clone(&sentinel);
                tokio::spawn(async move {
                    let text = msg.text().or(msg.caption()).unwrap_or_default();
                    let Some(command) = Command::parse(text) else {
                        return;
                    };
                    log::debug!("chat={:?} command {command:?}", msg.chat.id);
                    let Some(bot) = sentinel.bot(&me) else {
                        warn!("Bot {me} is not registered");
                        return;
                    };
                    for module in sentinel.bot_modules().await.iter() {
                        let result = module
                            .handle_message(
                                &bot,
                                msg.from.as_ref().map(|u| u.id),
                                msg.chat.id,
                                &command,
                                &msg,
                            )
                            .await;
                        if let Err(err) = result {
                            warn!(
                                "Error handling message {} in module {}: {:?}",
                                text,
                                module.name(),
                                err
                            );
                        }
                    }
                    log::debug!("Command {command:?} handled");
                });
            }
        });
        log::info!("Bot {me} is polling for updates");
        Ok(())
    }

    pub fn bot(&self) -> &TgBot {
        &self.bot
    }

    /// Sends a MarkdownV2 message. The caller is responsible for escaping.
    pub async fn send_text_message(
        &self,
        chat_id: ChatId,
        message: String,
    ) -> Result<Message, anyhow::Error> {
        send_markdown(&self.bot, chat_id, message).await
    }

    /// Posts a copy of a message to a public `@channel`.
    pub async fn mirror_to_channel(
        &self,
        channel: &str,
        message: String,
    ) -> Result<Message, anyhow::Error> {
        send_markdown(
            &self.bot,
            Recipient::ChannelUsername(channel.to_owned()),
            message,
        )
        .await
    }

    pub fn id(&self) -> UserId {
        self.bot_id
    }
}

async fn send_markdown(
    bot: &TgBot,
    recipient: impl Into<Recipient>,
    text: String,
) -> Result<Message, anyhow::Error> {
    let recipient = recipient.into();
    if text.len() < MAX_MESSAGE_LENGTH {
        Ok(bot
            .send_message(recipient, &text)
            .parse_mode(ParseMode::MarkdownV2)
            .link_preview_options(LinkPreviewOptions {
                is_disabled: true,
                url: None,
                prefer_small_media: false,
                prefer_large_media: false,
                show_above_text: false,
            })
            .await
            .inspect_err(log_parse_error(text))?)
    } else {
        Ok(bot
            .send_document(
                recipient,
                InputFile::memory(unescape_markdown(&text)).file_name("report.txt"),
            )
            .caption("The report was too long, so it was sent as a file\\.")
            .parse_mode(ParseMode::MarkdownV2)
            .await?)
    }
}

fn unescape_markdown(text: &str) -> String {
    const CHARS: [char; 19] = [
        '\\', '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.',
        '!',
    ];

    let mut text = text.to_string();
    for c in CHARS {
        text = text.replace(&format!("\\{c}"), &c.to_string());
    }
    text
}

/// Where alert reports go. Implemented by the Telegram client, and by
/// recorders in tests.
#[async_trait]
pub trait ReportSink: Send + Sync + 'static {
    async fn send_report(&self, chat_id: ChatId, text: String) -> Result<(), anyhow::Error>;
}

#[async_trait]
impl ReportSink for TgBot {
    async fn send_report(&self, chat_id: ChatId, text: String) -> Result<(), anyhow::Error> {
        send_markdown(self, chat_id, text).await?;
        Ok(())
    }
}

fn log_parse_error(text: impl Into<String>) -> impl FnOnce(&RequestError) {
    let text = text.into();
    move |err| {
        if let RequestError::Api(ApiError::CantParseEntities(s)) = err {
            log::warn!("Can't parse entities in message: {s}\n{text:?}");
        }
    }
}
