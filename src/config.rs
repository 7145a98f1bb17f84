use anyhow::{ensure, Context, Result};
use std::env;
use std::str::FromStr;

use crate::database::queries::TicketLimits;
use crate::util;

#[derive(Debug, Clone)]
pub struct Config {
  pub database_location: String,
  pub admin_ids: Vec<u64>,
  pub currency: String,

  pub cart_ttl_minutes: i64,
  pub cart_max_quantity: i64,
  pub cleanup_interval_seconds: u64,

  pub ticket_cooldown_minutes: i64,
  pub ticket_max_open: i64,

  // Minor units
  pub topup_min: i64,
  pub topup_max: i64,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      database_location: "storefront.db".to_string(),
      admin_ids: vec![],
      currency: "USD".to_string(),
      cart_ttl_minutes: 30,
      cart_max_quantity: 10,
      cleanup_interval_seconds: 60,
      ticket_cooldown_minutes: 10,
      ticket_max_open: 3,
      topup_min: 100,
      topup_max: 1_000_000,
    }
  }
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  /// Builds the config from `lookup`, which returns the raw value of a
  /// variable if it is set.
  fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Self::default();

    let admin_ids = match lookup("ADMIN_IDS") {
      Some(raw) => parse_admin_ids(&raw)?,
      None => defaults.admin_ids,
    };

    let config = Self {
      database_location: lookup("DATABASE_LOCATION")
        .context("DATABASE_LOCATION environment variable is required")?,
      admin_ids,
      currency: lookup("CURRENCY").unwrap_or(defaults.currency),
      cart_ttl_minutes: parse_or(&lookup, "CART_TTL_MINUTES", defaults.cart_ttl_minutes)?,
      cart_max_quantity: parse_or(&lookup, "CART_MAX_QUANTITY", defaults.cart_max_quantity)?,
      cleanup_interval_seconds: parse_or(
        &lookup,
        "CLEANUP_INTERVAL_SECONDS",
        defaults.cleanup_interval_seconds,
      )?,
      ticket_cooldown_minutes: parse_or(
        &lookup,
        "TICKET_COOLDOWN_MINUTES",
        defaults.ticket_cooldown_minutes,
      )?,
      ticket_max_open: parse_or(&lookup, "TICKET_MAX_OPEN", defaults.ticket_max_open)?,
      topup_min: price_or(&lookup, "TOPUP_MIN", defaults.topup_min)?,
      topup_max: price_or(&lookup, "TOPUP_MAX", defaults.topup_max)?,
    };

    config.validate()?;

    if config.admin_ids.is_empty() {
      log::warn!("ADMIN_IDS is empty, admin commands are disabled");
    }

    Ok(config)
  }

  fn validate(&self) -> Result<()> {
    ensure!(self.cart_max_quantity > 0, "CART_MAX_QUANTITY must be positive");
    ensure!(self.cart_ttl_minutes > 0, "CART_TTL_MINUTES must be positive");
    minutes_to_ms(self.cart_ttl_minutes).context("CART_TTL_MINUTES is too large")?;
    ensure!(
      self.cleanup_interval_seconds > 0,
      "CLEANUP_INTERVAL_SECONDS must be positive"
    );
    ensure!(
      self.ticket_cooldown_minutes >= 0,
      "TICKET_COOLDOWN_MINUTES must not be negative"
    );
    minutes_to_ms(self.ticket_cooldown_minutes).context("TICKET_COOLDOWN_MINUTES is too large")?;
    ensure!(self.ticket_max_open > 0, "TICKET_MAX_OPEN must be positive");
    ensure!(self.topup_min > 0, "TOPUP_MIN must be positive");
    ensure!(
      self.topup_min <= self.topup_max,
      "TOPUP_MIN must not exceed TOPUP_MAX"
    );
    Ok(())
  }

  pub fn is_admin(&self, user_id: u64) -> bool {
    self.admin_ids.contains(&user_id)
  }

  // Both durations are range checked by `validate`
  pub fn cart_ttl_ms(&self) -> i64 {
    minutes_to_ms(self.cart_ttl_minutes).unwrap_or(i64::MAX)
  }

  pub fn ticket_cooldown_ms(&self) -> i64 {
    minutes_to_ms(self.ticket_cooldown_minutes).unwrap_or(i64::MAX)
  }

  pub fn ticket_limits(&self) -> TicketLimits {
    TicketLimits {
      cooldown_ms: self.ticket_cooldown_ms(),
      max_open: self.ticket_max_open,
    }
  }
}

fn minutes_to_ms(minutes: i64) -> Option<i64> {
  minutes.checked_mul(60_000)
}

fn parse_admin_ids(raw: &str) -> Result<Vec<u64>> {
  raw
    .split(',')
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(|s| {
      s.parse::<u64>()
        .with_context(|| format!("Invalid admin id in ADMIN_IDS: {:?}", s))
    })
    .collect()
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
  F: Fn(&str) -> Option<String>,
  T: FromStr,
  T::Err: std::error::Error + Send + Sync + 'static,
{
  match lookup(key) {
    Some(raw) => raw
      .trim()
      .parse()
      .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
    None => Ok(default),
  }
}

fn price_or<F>(lookup: &F, key: &str, default: i64) -> Result<i64>
where
  F: Fn(&str) -> Option<String>,
{
  match lookup(key) {
    Some(raw) => util::parse_price(&raw)
      .with_context(|| format!("Invalid amount for {}: {:?}", key, raw)),
    None => Ok(default),
  }
}
