/// A chat command recognized by the bot. Arguments are kept raw, handlers
/// validate them and answer with a warning if something is missing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    JoinChannel,
    Inspect(Option<String>),
    Add(Vec<String>),
    AddMultiple(Vec<String>),
    Remove(Vec<String>),
    Interval(Vec<String>),
    View,
    Clear,
}

impl Command {
    /// Parses `/cmd[@botname] arg1 arg2 ...`. Returns `None` for plain text and
    /// for commands that belong to nobody.
    pub fn parse(text: &str) -> Option<Self> {
        let mut parts = text.split_whitespace();
        let head = parts.next()?.strip_prefix('/')?;
        let name = head.split('@').next().unwrap_or(head).to_lowercase();
        let args: Vec<String> = parts.map(|s| s.to_string()).collect();
        Some(match name.as_str() {
            "start" => Command::Start,
            "joinchannel" => Command::JoinChannel,
            "i" => Command::Inspect(args.into_iter().next()),
            "add" => Command::Add(args),
            "add_multiple" => Command::AddMultiple(args),
            "remove" => Command::Remove(args),
            "interval" => Command::Interval(args),
            "view" => Command::View,
            "clear" => Command::Clear,
            _ => return None,
        })
    }
}

pub const HELP_TEXT: &str = "ℹ️ Available Commands:

/i <token> - Get token information
/add <token(s)> - Add token(s) to your list
/remove <token(s)> - Remove token(s) from your list
/interval <token> <interval> - Set the alert interval (Supported intervals: 30sec, 1min, 5min, 30min, 1hour)
/view - View all added tokens
/clear - Clear your token list
/add_multiple <token(s)> - Add multiple tokens at once";
