use std::{future::Future, sync::Arc, time::Duration};

use dashmap::DashMap;
use futures_util::{future::BoxFuture, FutureExt};
use sentinel_common::teloxide::prelude::ChatId;
use sentinel_common::utils::format_duration;
use tokio::{
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};

/// Keeps at most one repeating alert job per chat.
pub trait AlertScheduler: Send + Sync + 'static {
    /// Replaces the chat's job with one that ticks every `period`. The first
    /// tick comes one period in. A chat that already has a job keeps its phase,
    /// so ticks stay on multiples of `period` counted from when the chat was
    /// first scheduled.
    fn reschedule(&self, chat_id: ChatId, period: Duration);

    /// Returns `true` if there was a job to stop.
    fn cancel(&self, chat_id: ChatId) -> bool;

    /// Tick period of the chat's job, if it has one
    fn scheduled_period(&self, chat_id: ChatId) -> Option<Duration>;

    fn is_scheduled(&self, chat_id: ChatId) -> bool {
        self.scheduled_period(chat_id).is_some()
    }

    fn active_jobs(&self) -> usize;
}

type TickHandler = Arc<dyn Fn(ChatId, Duration) -> BoxFuture<'static, ()> + Send + Sync>;

struct Job {
    period: Duration,
    epoch: Instant,
    handle: JoinHandle<()>,
}

/// Runs every chat's job as a tokio task. The tick handler receives the time
/// elapsed since the chat was first scheduled, as a whole number of periods.
pub struct TokioAlertScheduler {
    jobs: DashMap<ChatId, Job>,
    on_tick: TickHandler,
}

impl TokioAlertScheduler {
    pub fn new<F, Fut>(on_tick: F) -> Self
    where
        F: Fn(ChatId, Duration) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        Self {
            jobs: DashMap::new(),
            on_tick: Arc::new(move |chat_id, elapsed| on_tick(chat_id, elapsed).boxed()),
        }
    }
}

impl AlertScheduler for TokioAlertScheduler {
    fn reschedule(&self, chat_id: ChatId, period: Duration) {
        if period.is_zero() {
            log::warn!("Refusing to schedule alerts for {chat_id} with a zero period");
            self.cancel(chat_id);
            return;
        }
        let now = Instant::now();
        let epoch = self
            .jobs
            .get(&chat_id)
            .map(|job| job.epoch)
            .unwrap_or(now);
        let passed = now.saturating_duration_since(epoch).as_nanos() / period.as_nanos();
        let mut ticks = u32::try_from(passed)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        let start = epoch + period * ticks;

        let on_tick = Arc::clone(&self.on_tick);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(start, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                // Awaited inline, so ticks of one chat never overlap
                on_tick(chat_id, period * ticks).await;
                ticks = ticks.saturating_add(1);
            }
        });
        let job = Job {
            period,
            epoch,
            handle,
        };
        if let Some(previous) = self.jobs.insert(chat_id, job) {
            previous.handle.abort();
        }
        log::debug!(
            "Alerts for {chat_id} scheduled every {}",
            format_duration(period)
        );
    }

    fn cancel(&self, chat_id: ChatId) -> bool {
        if let Some((_, job)) = self.jobs.remove(&chat_id) {
            job.handle.abort();
            log::debug!("Alerts for {chat_id} cancelled");
            true
        } else {
            false
        }
    }

    fn scheduled_period(&self, chat_id: ChatId) -> Option<Duration> {
        self.jobs.get(&chat_id).map(|job| job.period)
    }

    fn active_jobs(&self) -> usize {
        self.jobs.len()
    }
}

impl Drop for TokioAlertScheduler {
    fn drop(&mut self) {
        for job in self.jobs.iter() {
            job.value().handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;

    const CHAT: ChatId = ChatId(-100);

    fn recording_scheduler() -> (TokioAlertScheduler, Arc<Mutex<Vec<(ChatId, Duration)>>>) {
        let ticks = Arc::new(Mutex::new(Vec::new()));
        let ticks_clone = Arc::clone(&ticks);
        let scheduler = TokioAlertScheduler::new(move |chat_id, elapsed| {
            let ticks = Arc::clone(&ticks_clone);
            async move {
                ticks.lock().unwrap().push((chat_id, elapsed));
            }
        });
        (scheduler, ticks)
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_keeps_a_single_job() {
        let (scheduler, ticks) = recording_scheduler();
        scheduler.reschedule(CHAT, Duration::from_secs(30));
        scheduler.reschedule(CHAT, Duration::from_secs(30));
        assert_eq!(scheduler.active_jobs(), 1);
        assert_eq!(
            scheduler.scheduled_period(CHAT),
            Some(Duration::from_secs(30))
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.lock().unwrap().len(), 0);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(ticks.lock().unwrap().len(), 1);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(
            *ticks.lock().unwrap(),
            vec![
                (CHAT, Duration::from_secs(30)),
                (CHAT, Duration::from_secs(60)),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_keeps_the_phase() {
        let (scheduler, ticks) = recording_scheduler();
        scheduler.reschedule(CHAT, Duration::from_secs(300));
        tokio::time::sleep(Duration::from_secs(100)).await;
        scheduler.reschedule(CHAT, Duration::from_secs(30));
        scheduler.reschedule(CHAT, Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(ticks.lock().unwrap().len(), 0);

        // t = 121
        tokio::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(
            *ticks.lock().unwrap(),
            vec![(CHAT, Duration::from_secs(120))]
        );

        // t = 301, back to the slow period without an extra tick
        tokio::time::sleep(Duration::from_secs(180)).await;
        scheduler.reschedule(CHAT, Duration::from_secs(300));
        tokio::time::sleep(Duration::from_secs(300)).await;
        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.len(), 8);
        assert_eq!(ticks.last(), Some(&(CHAT, Duration::from_secs(600))));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_stops_ticks() {
        let (scheduler, ticks) = recording_scheduler();
        scheduler.reschedule(CHAT, Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert!(scheduler.cancel(CHAT));
        assert!(!scheduler.cancel(CHAT));
        assert!(!scheduler.is_scheduled(CHAT));

        tokio::time::sleep(Duration::from_secs(120)).await;
        assert_eq!(ticks.lock().unwrap().len(), 1);
        assert_eq!(scheduler.active_jobs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn chats_are_independent() {
        let (scheduler, ticks) = recording_scheduler();
        scheduler.reschedule(CHAT, Duration::from_secs(60));
        scheduler.reschedule(ChatId(7), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(31)).await;
        scheduler.cancel(ChatId(7));
        tokio::time::sleep(Duration::from_secs(60)).await;

        let ticks = ticks.lock().unwrap();
        assert_eq!(ticks.iter().filter(|(chat, _)| *chat == CHAT).count(), 1);
        assert_eq!(ticks.iter().filter(|(chat, _)| *chat == ChatId(7)).count(), 1);
    }
}
