use std::{collections::BTreeMap, fmt, str::FromStr, time::Duration};

use itertools::Itertools;
use sentinel_common::teloxide::prelude::ChatId;
use sentinel_common::utils::{gcd_duration, store::LockedStore};
use thiserror::Error;

use crate::scheduler::AlertScheduler;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WatchlistError {
    #[error("no token symbols given")]
    EmptyInput,
    #[error("unsupported interval {0:?}")]
    InvalidInterval(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AlertInterval {
    ThirtySeconds,
    OneMinute,
    FiveMinutes,
    ThirtyMinutes,
    OneHour,
}

impl AlertInterval {
    pub const ALL: [AlertInterval; 5] = [
        AlertInterval::ThirtySeconds,
        AlertInterval::OneMinute,
        AlertInterval::FiveMinutes,
        AlertInterval::ThirtyMinutes,
        AlertInterval::OneHour,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            AlertInterval::ThirtySeconds => "30sec",
            AlertInterval::OneMinute => "1min",
            AlertInterval::FiveMinutes => "5min",
            AlertInterval::ThirtyMinutes => "30min",
            AlertInterval::OneHour => "1hour",
        }
    }

    pub fn period(&self) -> Duration {
        Duration::from_secs(match self {
            AlertInterval::ThirtySeconds => 30,
            AlertInterval::OneMinute => 60,
            AlertInterval::FiveMinutes => 5 * 60,
            AlertInterval::ThirtyMinutes => 30 * 60,
            AlertInterval::OneHour => 60 * 60,
        })
    }
}

impl FromStr for AlertInterval {
    type Err = WatchlistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|interval| interval.token() == s)
            .ok_or_else(|| WatchlistError::InvalidInterval(s.to_string()))
    }
}

impl fmt::Display for AlertInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Watched symbols of one chat, with the alert interval of each (if any)
pub type WatchList = BTreeMap<String, Option<AlertInterval>>;

/// GCD of every interval in the list, `None` if no symbol has one
fn tick_period(list: &WatchList) -> Option<Duration> {
    list.values()
        .flatten()
        .map(|interval| interval.period())
        .reduce(gcd_duration)
}

/// Uppercases and dedups symbols, keeping the order they were given in
pub fn normalize_symbols(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .map(|symbol| symbol.trim().to_uppercase())
        .filter(|symbol| !symbol.is_empty())
        .unique()
        .collect()
}

#[derive(Debug, Default)]
pub struct WatchlistStore {
    lists: LockedStore<ChatId, WatchList>,
}

impl WatchlistStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the symbols that weren't watched before.
    pub async fn add_tokens(
        &self,
        chat_id: ChatId,
        symbols: &[String],
    ) -> Result<Vec<String>, WatchlistError> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(WatchlistError::EmptyInput);
        }
        self.lists
            .try_edit(
                chat_id,
                |list| {
                    Ok(symbols
                        .into_iter()
                        .filter(|symbol| {
                            if list.contains_key(symbol) {
                                false
                            } else {
                                list.insert(symbol.clone(), None);
                                true
                            }
                        })
                        .collect())
                },
                WatchList::new(),
            )
            .await
    }

    /// Returns the symbols that were actually removed. Absent ones are ignored.
    pub async fn remove_tokens(
        &self,
        chat_id: ChatId,
        symbols: &[String],
    ) -> Result<Vec<String>, WatchlistError> {
        let symbols = normalize_symbols(symbols);
        if symbols.is_empty() {
            return Err(WatchlistError::EmptyInput);
        }
        self.lists
            .try_edit(
                chat_id,
                |list| {
                    Ok(symbols
                        .into_iter()
                        .filter(|symbol| list.remove(symbol).is_some())
                        .collect())
                },
                WatchList::new(),
            )
            .await
    }

    /// Sets the alert interval of a symbol, adding the symbol if it isn't
    /// watched yet. An unknown interval token changes nothing.
    pub async fn set_interval(
        &self,
        chat_id: ChatId,
        symbol: &str,
        token: &str,
    ) -> Result<AlertInterval, WatchlistError> {
        let interval = AlertInterval::from_str(token)?;
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(WatchlistError::EmptyInput);
        }
        self.lists
            .try_edit(
                chat_id,
                |list| {
                    list.insert(symbol, Some(interval));
                    Ok(interval)
                },
                WatchList::new(),
            )
            .await
    }

    /// `None` if the chat has never touched its list, `Some(vec![])` if it's empty.
    pub fn list(&self, chat_id: ChatId) -> Option<Vec<String>> {
        self.lists
            .get(&chat_id)
            .map(|list| list.into_keys().collect())
    }

    /// Snapshot of the whole list, with intervals
    pub fn entries(&self, chat_id: ChatId) -> Option<WatchList> {
        self.lists.get(&chat_id)
    }

    pub async fn clear(&self, chat_id: ChatId) {
        // Nothing can fail with a default present
        let _ = self
            .lists
            .try_edit::<_, WatchlistError>(
                chat_id,
                |list| {
                    list.clear();
                    Ok(())
                },
                WatchList::new(),
            )
            .await;
    }

    /// The tick period of the chat's alert job: the GCD of every interval set
    /// in the chat, or `None` if no symbol has one.
    pub fn schedule_period(&self, chat_id: ChatId) -> Option<Duration> {
        self.lists.get(&chat_id).as_ref().and_then(tick_period)
    }

    /// Makes the chat's job match its list: one job ticking at
    /// [`Self::schedule_period`], or none. Runs under the chat's lock, so the
    /// job always ends up matching the last edit.
    pub async fn sync_schedule(&self, chat_id: ChatId, scheduler: &dyn AlertScheduler) {
        self.lists
            .read_locked(&chat_id, |list| match list.and_then(tick_period) {
                Some(period) => {
                    if scheduler.scheduled_period(chat_id) != Some(period) {
                        scheduler.reschedule(chat_id, period);
                    }
                }
                None => {
                    scheduler.cancel(chat_id);
                }
            })
            .await
    }

    /// Symbols to alert on a tick that happened `elapsed` after the chat was
    /// first scheduled: the ones whose interval divides `elapsed`.
    pub fn due_symbols(&self, chat_id: ChatId, elapsed: Duration) -> Vec<String> {
        let Some(list) = self.lists.get(&chat_id) else {
            return Vec::new();
        };
        list.into_iter()
            .filter_map(|(symbol, interval)| {
                let period = interval?.period().as_secs();
                (elapsed.as_secs() % period == 0).then_some(symbol)
            })
            .collect()
    }
}
