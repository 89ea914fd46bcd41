use std::fmt::Display;

use chrono::{DateTime, Utc};
use itertools::Itertools;
use teloxide::utils::markdown;

use crate::gateway::{Flag, MarketPair, TokenSnapshot, TxnCount};

fn format_number(num: f64, precision: usize) -> String {
    // First format with the desired precision
    let formatted = format!("{num:.precision$}");

    // Split into integer and decimal parts
    let parts: Vec<&str> = formatted.split('.').collect();
    let int_part = parts[0];

    // Format integer part with separators
    let mut result = String::new();

    // Handle negative numbers
    let (num_str, is_negative) = if let Some(int_part) = int_part.strip_prefix('-') {
        (int_part, true)
    } else {
        (int_part, false)
    };

    for (count, digit) in num_str.chars().rev().enumerate() {
        if count != 0 && count % 3 == 0 {
            result.insert(0, ',');
        }
        result.insert(0, digit);
    }

    if is_negative {
        result.insert(0, '-');
    }

    if parts.len() > 1 {
        result.push('.');
        result.push_str(parts[1]);
    }

    format!("${result}")
}

pub fn format_usd_amount(amount: f64) -> String {
    if amount <= 0.0 || !amount.is_finite() {
        return "$0".to_string();
    }
    format_number(
        amount,
        (3 - amount.log10().clamp(-20.0, 3.0) as isize) as usize,
    )
}

/// `0x4b0bfd...f0c1d2`
pub fn truncate_address(address: &str) -> String {
    let chars: Vec<char> = address.chars().collect();
    if chars.len() <= 12 {
        return address.to_string();
    }
    format!(
        "{}...{}",
        chars[..6].iter().collect::<String>(),
        chars[chars.len() - 6..].iter().collect::<String>()
    )
}

/// Inverted: 📈 on a drop, 📉 on a rise or no change.
pub fn price_change_emoji(change: f64) -> &'static str {
    if change < 0.0 {
        "📈"
    } else {
        "📉"
    }
}

pub fn format_flag(flag: Flag) -> &'static str {
    flag.text()
}

pub fn format_flag_with_emoji(flag: Flag) -> String {
    format!("{} {}", flag.text(), flag.emoji())
}

fn or_unknown(value: Option<impl Display>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "Unknown".to_string())
}

fn format_percent(value: Option<&str>) -> String {
    value
        .map(|v| format!("{v}%"))
        .unwrap_or_else(|| "Unknown".to_string())
}

fn format_price_change_line(label: &str, change: Option<f64>) -> String {
    match change {
        Some(change) => format!(
            "{} Price Change ({label}): {change}%",
            price_change_emoji(change)
        ),
        None => format!("➖ Price Change ({label}): Unknown"),
    }
}

fn format_txns(label: &str, txns: Option<TxnCount>) -> String {
    match txns {
        Some(txns) => format!("    {label}: {} buys, {} sells", txns.buys, txns.sells),
        None => format!("    {label}: Unknown"),
    }
}

fn format_age(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(created_at) = created_at else {
        return "Created: Unknown".to_string();
    };
    let minutes = (now - created_at).num_minutes().max(0);
    format!(
        "Created: {} days, {} hours, and {} minutes ago",
        minutes / (24 * 60),
        (minutes / 60) % 24,
        minutes % 60
    )
}

fn format_age_days(created_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match created_at {
        Some(created_at) => format!("Created: {} days ago", (now - created_at).num_days().max(0)),
        None => "Created: Unknown".to_string(),
    }
}

fn token_information(snapshot: &TokenSnapshot) -> Vec<String> {
    let MarketPair {
        name,
        symbol,
        chain_id,
        price_usd,
        liquidity_usd,
        volume_h24,
        fdv,
        market_cap,
        price_change,
        ..
    } = &snapshot.pair;
    let security = &snapshot.security;
    vec![
        "1️⃣ Token Information".to_string(),
        String::new(),
        format!("📌 Token Name: {name} ({symbol})"),
        format!("⚡ Network: {chain_id}"),
        format!(
            "💵 Price (USD): {}",
            price_usd
                .as_ref()
                .map(|price| format!("${price}"))
                .unwrap_or_else(|| "Unknown".to_string())
        ),
        format!("👥 Holders: {}", or_unknown(security.holder_count.as_ref())),
        format!(
            "🔖 Tax: {} buy, {} sell",
            format_percent(security.buy_tax.as_deref()),
            format_percent(security.sell_tax.as_deref())
        ),
        format_price_change_line("5min", price_change.m5),
        format_price_change_line("1h", price_change.h1),
        format_price_change_line("24h", price_change.h24),
        format!("📊 Volume (24h): {}", or_unknown(volume_h24.map(format_usd_amount))),
        format!(
            "💦 Liquidity (USD): {}",
            or_unknown(liquidity_usd.map(format_usd_amount))
        ),
        format!(
            "💎 MarketCap (FDV): {}",
            or_unknown(fdv.or(*market_cap).map(format_usd_amount))
        ),
    ]
}

fn transactions(snapshot: &TokenSnapshot) -> Vec<String> {
    let txns = &snapshot.pair.transactions;
    vec![
        "2️⃣ Transactions".to_string(),
        String::new(),
        format_txns("5m", txns.m5),
        format_txns("1h", txns.h1),
        format_txns("6h", txns.h6),
        format_txns("24h", txns.h24),
    ]
}

/// Plain text of the full `/i` report
pub fn render_token_report(snapshot: &TokenSnapshot, now: DateTime<Utc>) -> String {
    let s = &snapshot.security;
    let mut lines = token_information(snapshot);
    lines.push(String::new());
    lines.extend(transactions(snapshot));
    lines.push(String::new());
    lines.extend([
        "3️⃣ Security Check".to_string(),
        String::new(),
        format!(
            "    Anti_whale Modifiable: {}",
            format_flag(s.anti_whale_modifiable)
        ),
        format!(
            "    Reclaim Ownership: {}",
            format_flag(s.can_take_back_ownership)
        ),
        format!("    Cannot Buy: {}", format_flag(s.cannot_buy)),
        format!("    Cannot Sell All: {}", format_flag(s.cannot_sell_all)),
        format!("    Anti_whale: {}", format_flag(s.is_anti_whale)),
        format!("    Blacklisted: {}", format_flag(s.is_blacklisted)),
        format!("    Whitelisted: {}", format_flag(s.is_whitelisted)),
        format!("    Honeypot: {}", format_flag_with_emoji(s.is_honeypot)),
        format!("    Mintable: {}", format_flag(s.is_mintable)),
        format!("    Proxy: {}", format_flag(s.is_proxy)),
        format!("    Trading Cooldown: {}", format_flag(s.trading_cooldown)),
        format!("    LP Locked: {}", format_flag(s.lp_locked)),
        format!(
            "    Creator Address: {}",
            or_unknown(s.creator_address.as_deref().map(truncate_address))
        ),
        format!(
            "    Creator Percent: {}",
            format_percent(s.creator_percent.as_deref())
        ),
        String::new(),
        "4️⃣ Socials".to_string(),
        String::new(),
    ]);
    let links = snapshot.socials.links();
    if links.is_empty() {
        lines.push("    No socials available".to_string());
    } else {
        lines.extend(links.into_iter().map(|link| format!("    {link}")));
    }
    lines.push(String::new());
    lines.push(format_age(snapshot.pair.pair_created_at, now));
    if let Some(url) = &snapshot.pair.url {
        lines.push(format!("📊 Chart: {url}"));
    }
    lines.into_iter().join("\n")
}

/// Plain text of a periodic alert
pub fn render_alert_report(snapshot: &TokenSnapshot, now: DateTime<Utc>) -> String {
    let mut lines = token_information(snapshot);
    lines.push(format!(
        "Honeypot: {}",
        format_flag_with_emoji(snapshot.security.is_honeypot)
    ));
    lines.push(format_age_days(snapshot.pair.pair_created_at, now));
    lines.push(String::new());
    lines.extend(transactions(snapshot));
    lines.into_iter().join("\n")
}

pub fn format_token_report(snapshot: &TokenSnapshot, now: DateTime<Utc>) -> String {
    markdown::escape(&render_token_report(snapshot, now))
}

pub fn format_alert_report(snapshot: &TokenSnapshot, now: DateTime<Utc>) -> String {
    markdown::escape(&render_alert_report(snapshot, now))
}
