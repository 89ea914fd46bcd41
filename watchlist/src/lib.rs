pub mod fanout;
pub mod scheduler;
pub mod store;

use std::sync::Arc;

use async_trait::async_trait;
use itertools::Itertools;
use sentinel_common::bot_commands::Command;
use sentinel_common::gateway::TokenGateway;
use sentinel_common::sentinel::SentinelBotModule;
use sentinel_common::teloxide::prelude::{ChatId, Message, UserId};
use sentinel_common::teloxide::utils::markdown;
use sentinel_common::tgbot::{BotData, ReportSink};

use crate::fanout::AlertFanOut;
use crate::scheduler::{AlertScheduler, TokioAlertScheduler};
use crate::store::{WatchlistError, WatchlistStore};

const EMPTY_INPUT: &str = "⚠️ Please provide at least one token symbol.";
const ALREADY_ADDED: &str = "ℹ️ These tokens are already in your list.";
const NOT_WATCHED: &str = "ℹ️ None of these tokens are in your list.";
const INTERVAL_USAGE: &str =
    "⚠️ Please provide both token and interval. Example: /interval <token> <interval>";
const INVALID_INTERVAL: &str =
    "⚠️ Invalid interval. Supported intervals: 30sec, 1min, 5min, 30min, 1hour.";

/// Per-chat watch-lists and the periodic alerts that go with them.
pub struct WatchlistModule {
    store: Arc<WatchlistStore>,
    scheduler: Arc<dyn AlertScheduler>,
}

impl WatchlistModule {
    pub fn new(gateway: Arc<dyn TokenGateway>, sink: Arc<dyn ReportSink>) -> Self {
        let store = Arc::new(WatchlistStore::new());
        let fan_out = Arc::new(AlertFanOut::new(Arc::clone(&store), gateway, sink));
        let scheduler = TokioAlertScheduler::new(move |chat_id, elapsed| {
            let fan_out = Arc::clone(&fan_out);
            async move {
                let summary = fan_out.tick(chat_id, elapsed).await;
                if summary.skipped > 0 {
                    log::info!(
                        "Alerts for {chat_id}: {} delivered, {} skipped",
                        summary.delivered,
                        summary.skipped
                    );
                }
            }
        });
        Self::with_scheduler(store, Arc::new(scheduler))
    }

    pub fn with_scheduler(store: Arc<WatchlistStore>, scheduler: Arc<dyn AlertScheduler>) -> Self {
        Self { store, scheduler }
    }

    pub fn store(&self) -> &Arc<WatchlistStore> {
        &self.store
    }

    async fn sync_schedule(&self, chat_id: ChatId) {
        self.store
            .sync_schedule(chat_id, self.scheduler.as_ref())
            .await;
    }

    /// Applies a watch-list command and returns the plain-text reply. `None`
    /// if the command isn't a watch-list command.
    pub async fn execute(&self, chat_id: ChatId, command: &Command) -> Option<String> {
        Some(match command {
            Command::Add(symbols) | Command::AddMultiple(symbols) => {
                match self.store.add_tokens(chat_id, symbols).await {
                    Ok(added) if added.is_empty() => ALREADY_ADDED.to_string(),
                    Ok(added) => {
                        if let Command::AddMultiple(_) = command {
                            format!("✅ Added tokens:\n\n{}", added.join("\n"))
                        } else {
                            format!("✅ Added tokens: {}", added.join(", "))
                        }
                    }
                    Err(_) => EMPTY_INPUT.to_string(),
                }
            }
            Command::Remove(symbols) => match self.store.remove_tokens(chat_id, symbols).await {
                Ok(removed) if removed.is_empty() => NOT_WATCHED.to_string(),
                Ok(removed) => {
                    self.sync_schedule(chat_id).await;
                    format!("✅ Removed tokens: {}", removed.join(", "))
                }
                Err(_) => EMPTY_INPUT.to_string(),
            },
            Command::Interval(args) => {
                let [symbol, token, ..] = args.as_slice() else {
                    return Some(INTERVAL_USAGE.to_string());
                };
                match self.store.set_interval(chat_id, symbol, token).await {
                    Ok(interval) => {
                        self.sync_schedule(chat_id).await;
                        format!(
                            "✅ Alert interval set to {interval} for token {}.",
                            symbol.to_uppercase()
                        )
                    }
                    Err(WatchlistError::InvalidInterval(_)) => INVALID_INTERVAL.to_string(),
                    Err(WatchlistError::EmptyInput) => INTERVAL_USAGE.to_string(),
                }
            }
            Command::View => match self.store.entries(chat_id) {
                Some(list) if !list.is_empty() => format!(
                    "✅ Your added tokens:\n\n{}",
                    list.into_iter()
                        .map(|(symbol, interval)| match interval {
                            Some(interval) => format!("{symbol} (every {interval})"),
                            None => symbol,
                        })
                        .join("\n")
                ),
                _ => "⚠️ You have not added any tokens.".to_string(),
            },
            Command::Clear => {
                self.store.clear(chat_id).await;
                self.sync_schedule(chat_id).await;
                "✅ Your token list has been cleared.".to_string()
            }
            _ => return None,
        })
    }
}

#[async_trait]
impl SentinelBotModule for WatchlistModule {
    fn name(&self) -> &'static str {
        "Watchlist"
    }

    async fn handle_message(
        &self,
        bot: &BotData,
        _user_id: Option<UserId>,
        chat_id: ChatId,
        command: &Command,
        _message: &Message,
    ) -> Result<(), anyhow::Error> {
        if let Some(reply) = self.execute(chat_id, command).await {
            bot.send_text_message(chat_id, markdown::escape(&reply))
                .await?;
        }
        Ok(())
    }
}
