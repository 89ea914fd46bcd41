use std::sync::Arc;

use async_trait::async_trait;
use dashmap::{
    mapref::{multiple::RefMulti, one::Ref},
    DashMap,
};
use teloxide::prelude::{ChatId, Message, UserId};
use tokio::sync::{RwLock, RwLockReadGuard};

use crate::{bot_commands::Command, gateway::TokenGateway, tgbot::BotData};

pub struct Sentinel {
    state: Arc<SentinelState>,
}

impl Sentinel {
    pub fn new(gateway: Arc<dyn TokenGateway>) -> Self {
        let state = Arc::new(SentinelState::new(gateway));
        Self { state }
    }

    pub fn state(&self) -> &SentinelState {
        &self.state
    }

    pub fn arc_clone_state(&self) -> Arc<SentinelState> {
        Arc::clone(&self.state)
    }

    pub async fn start_tg_bots(&self) -> Result<(), anyhow::Error> {
        for module in self.state.bot_modules().await.iter() {
            module.start().await?;
            log::info!("Module {} started", module.name());
        }

        for bot in self.state.bots() {
            bot.start_polling().await?;
        }

        Ok(())
    }
}

pub struct SentinelState {
    bots: DashMap<UserId, BotData>,
    bot_modules: RwLock<Vec<Arc<dyn SentinelBotModule>>>,
    gateway: Arc<dyn TokenGateway>,
}

impl SentinelState {
    pub fn new(gateway: Arc<dyn TokenGateway>) -> Self {
        Self {
            bots: DashMap::new(),
            bot_modules: RwLock::new(Vec::new()),
            gateway,
        }
    }

    pub async fn add_bot(&self, bot: BotData) -> Result<(), anyhow::Error> {
        let user_id = bot.id();
        self.bots.insert(user_id, bot);
        Ok(())
    }

    pub fn bot(&self, user_id: &UserId) -> Option<Ref<UserId, BotData>> {
        self.bots.get(user_id)
    }

    pub fn bots(&self) -> Vec<RefMulti<UserId, BotData>> {
        self.bots.iter().collect()
    }

    pub async fn add_bot_module<M: SentinelBotModule>(&self, module: impl Into<Arc<M>>) {
        self.bot_modules.write().await.push(module.into());
    }

    pub async fn bot_modules(&self) -> RwLockReadGuard<Vec<Arc<dyn SentinelBotModule>>> {
        self.bot_modules.read().await
    }

    pub fn gateway(&self) -> Arc<dyn TokenGateway> {
        Arc::clone(&self.gateway)
    }
}

/// A feature of the bot. Every module sees every parsed command and ignores
/// the ones it doesn't own.
#[async_trait]
pub trait SentinelBotModule: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    async fn start(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn handle_message(
        &self,
        bot: &BotData,
        user_id: Option<UserId>,
        chat_id: ChatId,
        command: &Command,
        message: &Message,
    ) -> Result<(), anyhow::Error>;
}
