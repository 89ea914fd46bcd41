use std::{sync::Arc, time::Duration};

use chrono::Utc;
use sentinel_common::gateway::TokenGateway;
use sentinel_common::teloxide::prelude::ChatId;
use sentinel_common::tgbot::ReportSink;
use sentinel_common::utils::tokens::format_alert_report;

use crate::store::WatchlistStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FanOutSummary {
    pub delivered: usize,
    pub skipped: usize,
}

/// Turns one scheduler tick into one alert message per due symbol.
pub struct AlertFanOut {
    store: Arc<WatchlistStore>,
    gateway: Arc<dyn TokenGateway>,
    sink: Arc<dyn ReportSink>,
}

impl AlertFanOut {
    pub fn new(
        store: Arc<WatchlistStore>,
        gateway: Arc<dyn TokenGateway>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            store,
            gateway,
            sink,
        }
    }

    pub async fn tick(&self, chat_id: ChatId, elapsed: Duration) -> FanOutSummary {
        // Snapshot first, the list may change while requests are in flight
        let symbols = self.store.due_symbols(chat_id, elapsed);
        log::debug!("Alert tick for {chat_id} at {elapsed:?}: {symbols:?}");
        self.deliver(chat_id, &symbols).await
    }

    /// A failure for one symbol is logged and doesn't stop the rest.
    pub async fn deliver(&self, chat_id: ChatId, symbols: &[String]) -> FanOutSummary {
        let mut summary = FanOutSummary::default();
        for symbol in symbols {
            let snapshot = match self.gateway.lookup(symbol).await {
                Ok(snapshot) => snapshot,
                Err(err) => {
                    log::warn!("Skipping alert for {symbol} in {chat_id}: {err}");
                    summary.skipped += 1;
                    continue;
                }
            };
            let text = format_alert_report(&snapshot, Utc::now());
            match self.sink.send_report(chat_id, text).await {
                Ok(()) => summary.delivered += 1,
                Err(err) => {
                    log::warn!("Failed to send alert for {symbol} to {chat_id}: {err:?}");
                    summary.skipped += 1;
                }
            }
        }
        summary
    }
}
