use std::time::{SystemTime, UNIX_EPOCH};
use time_humanize::HumanTime;

pub fn get_unix() -> i64 {
  let now = SystemTime::now();
  let unix = now.duration_since(UNIX_EPOCH).unwrap_or_default();
  unix.as_millis() as i64
}

// Calculate humantime from now to unix timestamp in milliseconds
// e.g. "5 hours ago"
pub fn unix_to_humantime(unix: i64) -> String {
  if unix == 0 {
    return "never".to_string();
  }

  match u64::try_from(unix / 1000) {
    Ok(seconds) => HumanTime::from_duration_since_timestamp(seconds).to_string(),
    Err(_) => "never".to_string(),
  }
}

// Render minor units as "12.50 USD"
pub fn format_price(amount: i64, currency: &str) -> String {
  let sign = if amount < 0 { "-" } else { "" };
  let abs = amount.unsigned_abs();
  format!("{}{}.{:02} {}", sign, abs / 100, abs % 100, currency)
}

// Parse "12", "12.5", "12.50" or "12,50" into minor units
pub fn parse_price(text: &str) -> Option<i64> {
  let text = text.trim().replace(',', ".");
  if text.is_empty() || text.starts_with('-') || text.starts_with('+') {
    return None;
  }

  let (major, minor) = match text.split_once('.') {
    Some((major, minor)) => (major, minor),
    None => (text.as_str(), ""),
  };

  if major.is_empty() || !major.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  if minor.len() > 2 || !minor.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }

  let major: i64 = major.parse().ok()?;
  let minor: i64 = match minor.len() {
    0 => 0,
    1 => minor.parse::<i64>().ok()? * 10,
    _ => minor.parse().ok()?,
  };

  major.checked_mul(100)?.checked_add(minor)
}

pub fn escape_html(text: &str) -> String {
  text
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn formats_minor_units() {
    assert_eq!(format_price(1250, "USD"), "12.50 USD");
    assert_eq!(format_price(5, "EUR"), "0.05 EUR");
    assert_eq!(format_price(-300, "USD"), "-3.00 USD");
  }

  #[test]
  fn parses_prices() {
    assert_eq!(parse_price("12"), Some(1200));
    assert_eq!(parse_price("12.5"), Some(1250));
    assert_eq!(parse_price(" 0,99 "), Some(99));
    assert_eq!(parse_price("1.234"), None);
    assert_eq!(parse_price("-4"), None);
    assert_eq!(parse_price("abc"), None);
    assert_eq!(parse_price(".5"), None);
    assert_eq!(parse_price(""), None);
  }

  #[test]
  fn escapes_markup() {
    assert_eq!(escape_html("<b>&</b>"), "&lt;b&gt;&amp;&lt;/b&gt;");
  }

  #[test]
  fn zero_timestamp_is_never() {
    assert_eq!(unix_to_humantime(0), "never");
  }
}
