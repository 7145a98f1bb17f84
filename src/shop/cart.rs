use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
  Set(i64),
  Remove,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
  #[error("Only {available} more in stock")]
  OutOfStock { available: i64 },
  #[error("You can't have more than {max} of this item in your cart")]
  LimitReached { max: i64 },
  #[error("Nothing to change")]
  NoChange,
  #[error("Your cart is empty")]
  Empty,
  #[error("Not enough balance, you need {missing} more")]
  InsufficientBalance { missing: i64 },
}

/// Validates a change of `delta` units on a cart line currently holding
/// `current` units. `available` is the stock that is not reserved by any cart.
pub fn adjust_quantity(
  current: i64,
  delta: i64,
  available: i64,
  max: i64,
) -> Result<QuantityChange, CartError> {
  if delta == 0 {
    return Err(CartError::NoChange);
  }

  let new_quantity = current + delta;
  if new_quantity <= 0 {
    return Ok(QuantityChange::Remove);
  }

  if new_quantity > max {
    return Err(CartError::LimitReached { max });
  }

  if delta > available {
    return Err(CartError::OutOfStock {
      available: available.max(0),
    });
  }

  Ok(QuantityChange::Set(new_quantity))
}

pub fn is_expired(reserved_at: i64, now: i64, ttl_ms: i64) -> bool {
  now - reserved_at > ttl_ms
}

pub fn cart_total<I>(lines: I) -> i64
where
  I: IntoIterator<Item = (i64, i64)>,
{
  lines
    .into_iter()
    .map(|(price, quantity)| price * quantity)
    .sum()
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn increments_within_bounds() {
    assert_eq!(adjust_quantity(0, 1, 5, 10), Ok(QuantityChange::Set(1)));
    assert_eq!(adjust_quantity(2, 3, 3, 10), Ok(QuantityChange::Set(5)));
  }

  #[test]
  fn rejects_when_stock_runs_out() {
    assert_eq!(
      adjust_quantity(2, 1, 0, 10),
      Err(CartError::OutOfStock { available: 0 })
    );
    assert_eq!(
      adjust_quantity(0, 4, 3, 10),
      Err(CartError::OutOfStock { available: 3 })
    );
  }

  #[test]
  fn rejects_above_line_limit() {
    assert_eq!(
      adjust_quantity(10, 1, 50, 10),
      Err(CartError::LimitReached { max: 10 })
    );
  }

  #[test]
  fn decrement_to_zero_removes_line() {
    assert_eq!(adjust_quantity(1, -1, 0, 10), Ok(QuantityChange::Remove));
    assert_eq!(adjust_quantity(2, -5, 0, 10), Ok(QuantityChange::Remove));
  }

  #[test]
  fn decrement_never_needs_stock() {
    assert_eq!(adjust_quantity(3, -1, 0, 10), Ok(QuantityChange::Set(2)));
  }

  #[test]
  fn zero_delta_is_rejected() {
    assert_eq!(adjust_quantity(3, 0, 5, 10), Err(CartError::NoChange));
  }

  #[test]
  fn expiry_is_strict() {
    assert!(!is_expired(1_000, 1_500, 500));
    assert!(is_expired(1_000, 1_501, 500));
  }

  #[test]
  fn sums_lines() {
    assert_eq!(cart_total(vec![(250, 2), (100, 3)]), 800);
    assert_eq!(cart_total(Vec::<(i64, i64)>::new()), 0);
  }
}
