//! Small Markdown building blocks shared by the connectors.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// `**Label:** value`
pub fn item(label: &str, value: impl std::fmt::Display) -> String {
    format!("**{label}:** {value}")
}

/// Same as [`item`], rendered as a nested list entry at `depth` (0 = top level).
pub fn list_item(label: &str, value: impl std::fmt::Display, depth: usize) -> String {
    format!("{}- {}", "  ".repeat(depth), item(label, value))
}

pub fn header(text: &str, level: usize) -> String {
    format!("{} {text}", "#".repeat(level.clamp(1, 6)))
}

pub fn link(url: &str, text: &str) -> String {
    format!("[{text}]({url})")
}

/// Coloured inline label, e.g. a "2FA" or "Published" badge.
pub fn highlight(text: &str, color: &str) -> String {
    format!(
        "<span style=\"color: {color}; border: 1px solid {color}; border-radius: 4px; padding: 0 4px\">{text}</span>"
    )
}

/// Label with white text on a coloured background.
pub fn badge(text: &str, background: &str) -> String {
    format!(
        "<span style=\"color: white; background-color: {background}; border-radius: 4px; padding: 0 4px\">{text}</span>"
    )
}

pub fn note(text: &str) -> String {
    format!("*{text}*")
}

/// Opening line of an Obsidian-style callout.
pub fn info_block(title: &str) -> String {
    format!(">[!info] {title}")
}

/// Renders an API timestamp as `January 05, 2024`. Unparseable input is returned as-is.
pub fn format_date(raw: &str) -> String {
    parse_date(raw)
        .map(|date| date.format("%B %d, %Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}

/// Date part of an RFC 3339 timestamp, a naive timestamp or a plain date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.date_naive());
    }
    if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(parsed.date());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

/// Human readable size using binary units, e.g. `1.5 MB`.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{size:.1} {}", UNITS[unit])
}
