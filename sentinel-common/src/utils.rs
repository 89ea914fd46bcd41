pub mod apis;
pub mod chat;
pub mod requests;
pub mod store;
pub mod tokens;

use std::time::Duration;

pub const DEFAULT_REQUIRED_CHANNEL: &str = "@DeFiSentinelXchannel";

lazy_static::lazy_static! {
    /// Public channel users have to join, and where group price requests are mirrored
    pub static ref REQUIRED_CHANNEL: String = std::env::var("REQUIRED_CHANNEL")
        .unwrap_or_else(|_| DEFAULT_REQUIRED_CHANNEL.to_string());
    pub static ref DEXTOOLS_API_KEY: Option<String> = std::env::var("DEXTOOLS_API_KEY")
        .ok()
        .filter(|key| !key.is_empty());
}

pub fn format_duration(duration: Duration) -> String {
    let mut duration = duration;
    let mut result = String::new();
    let mut components = 0;
    const MAX_COMPONENTS: usize = 2;
    if duration.as_secs() >= 86400 && components < MAX_COMPONENTS {
        result.push_str(&format!("{}d ", duration.as_secs() / 86400));
        duration = Duration::from_secs(duration.as_secs() % 86400);
        components += 1;
    }
    if duration.as_secs() >= 3600 && components < MAX_COMPONENTS {
        result.push_str(&format!("{}h ", duration.as_secs() / 3600));
        duration = Duration::from_secs(duration.as_secs() % 3600);
        components += 1;
    }
    if duration.as_secs() >= 60 && components < MAX_COMPONENTS {
        result.push_str(&format!("{}m ", duration.as_secs() / 60));
        duration = Duration::from_secs(duration.as_secs() % 60);
        components += 1;
    }
    if duration.as_secs() > 0 && components < MAX_COMPONENTS {
        result.push_str(&format!("{}s", duration.as_secs()));
        components += 1;
    }
    if components == 0 {
        result.push_str("in less than a second");
    }
    result.trim_end().to_string()
}

/// Greatest common divisor of two periods, in whole seconds
pub fn gcd_duration(a: Duration, b: Duration) -> Duration {
    let (mut a, mut b) = (a.as_secs(), b.as_secs());
    while b != 0 {
        (a, b) = (b, a % b);
    }
    Duration::from_secs(a)
}
