use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sentinel_common::bot_commands::Command;
use sentinel_common::gateway::{LookupError, TokenGateway};
use sentinel_common::sentinel::SentinelBotModule;
use sentinel_common::teloxide::prelude::{ChatId, Message, UserId};
use sentinel_common::teloxide::utils::markdown;
use sentinel_common::tgbot::BotData;
use sentinel_common::utils::chat::{get_chat_title_cached_5m, is_group_chat};
use sentinel_common::utils::tokens::render_token_report;
use sentinel_common::utils::REQUIRED_CHANNEL;

const MISSING_QUERY: &str =
    "⚠️ Please provide a token symbol or contract address. Example: /i <token>";
const NOT_FOUND: &str = "⚠️ Token not found.";

/// What `/i` answers with
#[derive(Debug, Clone, PartialEq)]
pub enum Inspection {
    /// Plain-text report, also mirrored to the public channel from groups
    Report(String),
    Warning(String),
}

/// One-shot `/i <symbol or address>` lookups.
pub struct TokenInfoModule {
    gateway: Arc<dyn TokenGateway>,
}

impl TokenInfoModule {
    pub fn new(gateway: Arc<dyn TokenGateway>) -> Self {
        Self { gateway }
    }

    pub async fn inspect(&self, query: Option<&str>) -> Inspection {
        let Some(query) = query.map(str::trim).filter(|query| !query.is_empty()) else {
            return Inspection::Warning(MISSING_QUERY.to_string());
        };
        match self.gateway.lookup(query).await {
            Ok(snapshot) => Inspection::Report(render_token_report(&snapshot, Utc::now())),
            Err(LookupError::UnsupportedChain(chain)) => {
                Inspection::Warning(format!("⚠️ Chain {chain} is not supported yet."))
            }
            Err(err) => {
                log::debug!("Lookup of {query} failed: {err}");
                Inspection::Warning(NOT_FOUND.to_string())
            }
        }
    }
}

/// Text posted to the public channel when a group asks for a token
pub fn mirror_text(group_title: Option<&str>, report: &str) -> String {
    format!(
        "👥 Price Request In: @{}\n\n{report}",
        group_title.unwrap_or("Unknown Group")
    )
}

#[async_trait]
impl SentinelBotModule for TokenInfoModule {
    fn name(&self) -> &'static str {
        "TokenInfo"
    }

    async fn handle_message(
        &self,
        bot: &BotData,
        _user_id: Option<UserId>,
        chat_id: ChatId,
        command: &Command,
        _message: &Message,
    ) -> Result<(), anyhow::Error> {
        let Command::Inspect(query) = command else {
            return Ok(());
        };
        match self.inspect(query.as_deref()).await {
            Inspection::Report(report) => {
                bot.send_text_message(chat_id, markdown::escape(&report))
                    .await?;
                if is_group_chat(chat_id) {
                    let title = get_chat_title_cached_5m(bot.bot(), chat_id)
                        .await
                        .unwrap_or_else(|err| {
                            log::warn!("Failed to get title of {chat_id}: {err:?}");
                            None
                        });
                    let text = mirror_text(title.as_deref(), &report);
                    if let Err(err) = bot
                        .mirror_to_channel(&REQUIRED_CHANNEL, markdown::escape(&text))
                        .await
                    {
                        log::warn!("Failed to mirror report to {}: {err:?}", *REQUIRED_CHANNEL);
                    }
                }
            }
            Inspection::Warning(warning) => {
                bot.send_text_message(chat_id, markdown::escape(&warning))
                    .await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sentinel_common::gateway::{MarketPair, SecurityProfile, Socials, TokenSnapshot};

    struct FixedGateway(Result<TokenSnapshot, LookupError>);

    #[async_trait]
    impl TokenGateway for FixedGateway {
        async fn lookup(&self, _query: &str) -> Result<TokenSnapshot, LookupError> {
            self.0.clone()
        }
    }

    fn module(result: Result<TokenSnapshot, LookupError>) -> TokenInfoModule {
        TokenInfoModule::new(Arc::new(FixedGateway(result)))
    }

    fn pepe() -> TokenSnapshot {
        TokenSnapshot {
            pair: MarketPair {
                name: "Pepe".to_string(),
                symbol: "PEPE".to_string(),
                chain_id: "ethereum".to_string(),
                address: "0x6982508145454Ce325dDbE47a25d4ec3d2311933".to_string(),
                ..Default::default()
            },
            security: SecurityProfile::default(),
            socials: Socials::default(),
        }
    }

    #[tokio::test]
    async fn missing_query_is_a_warning() {
        let module = module(Ok(pepe()));
        assert_eq!(
            module.inspect(None).await,
            Inspection::Warning(MISSING_QUERY.to_string())
        );
        assert_eq!(
            module.inspect(Some("  ")).await,
            Inspection::Warning(MISSING_QUERY.to_string())
        );
    }

    #[tokio::test]
    async fn report_has_all_sections() {
        let Inspection::Report(report) = module(Ok(pepe())).inspect(Some("pepe")).await else {
            panic!("expected a report");
        };
        for section in [
            "1️⃣ Token Information",
            "2️⃣ Transactions",
            "3️⃣ Security Check",
            "4️⃣ Socials",
        ] {
            assert!(report.contains(section), "missing {section}");
        }
    }

    #[tokio::test]
    async fn lookup_failures_become_warnings() {
        assert_eq!(
            module(Err(LookupError::NotFound("zzz".to_string())))
                .inspect(Some("zzz"))
                .await,
            Inspection::Warning(NOT_FOUND.to_string())
        );
        assert_eq!(
            module(Err(LookupError::UpstreamUnavailable("timeout".to_string())))
                .inspect(Some("pepe"))
                .await,
            Inspection::Warning(NOT_FOUND.to_string())
        );
        assert_eq!(
            module(Err(LookupError::UnsupportedChain("solana".to_string())))
                .inspect(Some("bonk"))
                .await,
            Inspection::Warning("⚠️ Chain solana is not supported yet.".to_string())
        );
    }

    #[test]
    fn mirrored_report_names_the_group() {
        assert_eq!(
            mirror_text(Some("pepe_traders"), "report"),
            "👥 Price Request In: @pepe_traders\n\nreport"
        );
        assert!(mirror_text(None, "report").starts_with("👥 Price Request In: @Unknown Group"));
    }
}
