mod modules;

use std::sync::Arc;
use std::time::Duration;

use log::info;
use modules::hub::HubModule;
use reqwest::Url;
use sentinel_common::gateway::{ProviderGateway, TokenGateway};
use sentinel_common::sentinel::Sentinel;
use sentinel_common::teloxide::adaptors::throttle::Limits;
use sentinel_common::teloxide::adaptors::CacheMe;
use sentinel_common::teloxide::net::default_reqwest_settings;
use sentinel_common::teloxide::prelude::{Bot, RequesterExt};
use sentinel_common::tgbot::{BotData, TgBot};
use sentinel_common::utils::apis::{DexScreenerClient, DextoolsClient, GoPlusClient};
use sentinel_common::utils::DEXTOOLS_API_KEY;
#[cfg(feature = "token-info-module")]
use token_info::TokenInfoModule;
#[cfg(feature = "watchlist-module")]
use watchlist::WatchlistModule;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// The Telegram client uses teloxide's own reqwest settings, so the HTTP
/// client type always matches the one `Bot` was compiled against.
fn build_bot(token: String, api_url: Option<&str>) -> Result<TgBot, anyhow::Error> {
    let base: Url = api_url.unwrap_or(DEFAULT_API_URL).parse()?;
    let client = default_reqwest_settings()
        .timeout(Duration::from_secs(30))
        .build()?;
    Ok(CacheMe::new(
        Bot::with_client(token, client)
            .set_api_url(base)
            .throttle(Limits {
                messages_per_sec_overall: 1000, // just to increase queue size
                ..Limits::default()
            }),
    ))
}

fn main() -> Result<(), anyhow::Error> {
    dotenvy::dotenv().ok();
    let workspace_level = if std::env::var("DEBUG").is_ok() {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .with_module_level("sentinel_common", workspace_level)
        .with_module_level("watchlist", workspace_level)
        .with_module_level("token_info", workspace_level)
        .with_module_level("sentinelbot", workspace_level)
        .env()
        .init()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async {
            let token = std::env::var("TELEGRAM_TOKEN")
                .map_err(|_| anyhow::anyhow!("TELEGRAM_TOKEN not set"))?;
            let bot = build_bot(token, std::env::var("TELEGRAM_API_URL").ok().as_deref())?;

            let mut gateway =
                ProviderGateway::new(Arc::new(DexScreenerClient), Arc::new(GoPlusClient));
            if let Some(api_key) = DEXTOOLS_API_KEY.clone() {
                gateway = gateway.with_socials(Arc::new(DextoolsClient::new(api_key)));
            } else {
                info!("DEXTOOLS_API_KEY not set, reports won't include socials");
            }
            let gateway: Arc<dyn TokenGateway> = Arc::new(gateway);

            let sentinel = Sentinel::new(Arc::clone(&gateway));
            let bot_data = BotData::new(bot.clone(), sentinel.arc_clone_state()).await?;
            sentinel.state().add_bot(bot_data).await?;

            sentinel.state().add_bot_module(HubModule).await;
            #[cfg(feature = "token-info-module")]
            sentinel
                .state()
                .add_bot_module(TokenInfoModule::new(sentinel.state().gateway()))
                .await;
            #[cfg(feature = "watchlist-module")]
            sentinel
                .state()
                .add_bot_module(WatchlistModule::new(
                    sentinel.state().gateway(),
                    Arc::new(bot),
                ))
                .await;

            sentinel.start_tg_bots().await?;

            info!("Starting Sentinel");

            tokio::time::sleep(Duration::from_secs(u64::MAX)).await;

            Ok(())
        })
}
