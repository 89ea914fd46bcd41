pub mod bot_commands;
pub mod gateway;
pub mod sentinel;
pub mod tgbot;
pub mod utils;

pub use teloxide;
