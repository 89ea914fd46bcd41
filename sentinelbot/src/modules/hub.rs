use async_trait::async_trait;
use sentinel_common::{
    bot_commands::{Command, HELP_TEXT},
    sentinel::SentinelBotModule,
    teloxide::{
        prelude::{ChatId, Message, UserId},
        utils::markdown,
    },
    tgbot::BotData,
    utils::{chat::is_channel_member, REQUIRED_CHANNEL},
};

/// `/start` and `/joinchannel`: the official channel gate and the help text.
pub struct HubModule;

fn join_prompt(channel: &str) -> String {
    format!("⚠️ To use this bot, please join our official channel: {channel}")
}

fn start_replies(is_member: bool, channel: &str) -> Vec<String> {
    if is_member {
        vec![HELP_TEXT.to_string()]
    } else {
        vec![
            join_prompt(channel),
            "Use /joinchannel after joining the channel to gain access to the bot.".to_string(),
        ]
    }
}

fn join_channel_reply(is_member: bool, channel: &str) -> String {
    if is_member {
        "✅ You have successfully joined the official channel and can now use the bot."
            .to_string()
    } else {
        join_prompt(channel)
    }
}

#[async_trait]
impl SentinelBotModule for HubModule {
    fn name(&self) -> &'static str {
        "Hub"
    }

    async fn handle_message(
        &self,
        bot: &BotData,
        user_id: Option<UserId>,
        chat_id: ChatId,
        command: &Command,
        _message: &Message,
    ) -> Result<(), anyhow::Error> {
        if !matches!(command, Command::Start | Command::JoinChannel) {
            return Ok(());
        }
        let Some(user_id) = user_id.or_else(|| chat_id.as_user()) else {
            return Ok(());
        };
        let is_member = match is_channel_member(bot.bot(), &REQUIRED_CHANNEL, user_id).await {
            Ok(is_member) => is_member,
            Err(err) => {
                log::warn!(
                    "Failed to check if {user_id} is in {}: {err:?}",
                    *REQUIRED_CHANNEL
                );
                false
            }
        };
        let replies = if let Command::Start = command {
            start_replies(is_member, &REQUIRED_CHANNEL)
        } else {
            vec![join_channel_reply(is_member, &REQUIRED_CHANNEL)]
        };
        for reply in replies {
            bot.send_text_message(chat_id, markdown::escape(&reply))
                .await?;
        }
        Ok(())
    }
}
