//! Display helpers shared by the CLI views

use chrono::{DateTime, Utc};

/// Compact age, e.g. `just now`, `42s ago`, `3m ago`, `2h ago`, `5d ago`
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    match secs {
        s if s < 5 => "just now".to_string(),
        s if s < 60 => format!("{}s ago", s),
        s if s < 3600 => format!("{}m ago", s / 60),
        s if s < 86_400 => format!("{}h ago", s / 3600),
        s => format!("{}d ago", s / 86_400),
    }
}

/// Token count with k/M suffixes, e.g. `950`, `12.5k`, `1.2M`
pub fn format_tokens(tokens: u64) -> String {
    if tokens < 1_000 {
        return tokens.to_string();
    }
    let thousands = tokens as f64 / 1_000.0;
    // 999_950 would round to "1000.0k"
    if (thousands * 10.0).round() < 10_000.0 {
        format!("{:.1}k", thousands)
    } else {
        format!("{:.1}M", tokens as f64 / 1_000_000.0)
    }
}

/// Shorten to `max` characters, ending in an ellipsis when cut
pub fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
