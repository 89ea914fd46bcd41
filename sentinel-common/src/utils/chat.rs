use cached::{proc_macro::cached, TimedSizedCache};
use teloxide::{
    prelude::{ChatId, Requester, UserId},
    types::Recipient,
};

use crate::tgbot::TgBot;

async fn _internal_get_chat_title<R: Requester>(
    bot: &R,
    chat_id: ChatId,
) -> Result<Option<String>, anyhow::Error>
where
    <R as Requester>::Err: Send + Sync + 'static,
{
    let chat = bot.get_chat(chat_id).await?;
    Ok(chat.title().map(|s| s.to_owned()))
}

#[cached(
    result = true,
    convert = "{ chat_id.0 }",
    ty = "TimedSizedCache<i64, Option<String>>",
    create = "{ TimedSizedCache::with_size_and_lifespan(100, 300) }"
)]
pub async fn get_chat_title_cached_5m(
    bot: &TgBot,
    chat_id: ChatId,
) -> Result<Option<String>, anyhow::Error> {
    _internal_get_chat_title(bot, chat_id).await
}

/// Whether `user_id` is currently present in the public channel `@username`.
/// The bot has to be an administrator of the channel for this to work.
pub async fn is_channel_member(
    bot: &TgBot,
    channel: &str,
    user_id: UserId,
) -> Result<bool, anyhow::Error> {
    let member = bot
        .get_chat_member(Recipient::ChannelUsername(channel.to_owned()), user_id)
        .await?;
    Ok(member.is_present())
}

/// Groups and supergroups have negative ids, private chats positive ones.
pub fn is_group_chat(chat_id: ChatId) -> bool {
    !chat_id.is_user()
}
