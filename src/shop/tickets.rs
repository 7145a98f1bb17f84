use thiserror::Error;

use crate::util::unix_to_humantime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, sqlx::Type)]
#[sqlx(rename_all = "lowercase")]
pub enum TicketStatus {
  Open,
  Answered,
  Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TicketEvent {
  UserMessage,
  AdminReply,
  Close,
  Reopen,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TicketError {
  #[error("You already have {max} open tickets, please wait for them to be answered")]
  TooManyOpen { max: i64 },
  #[error("You can open a new ticket {}", retry_hint(.retry_at))]
  Cooldown { retry_at: i64 },
  #[error("This ticket is {from:?}, that action is not possible")]
  InvalidTransition { from: TicketStatus, event: TicketEvent },
}

fn retry_hint(retry_at: &i64) -> String {
  unix_to_humantime(*retry_at)
}

impl TicketStatus {
  pub fn apply(self, event: TicketEvent) -> Result<TicketStatus, TicketError> {
    use TicketEvent::*;
    use TicketStatus::*;

    match (self, event) {
      (Open | Answered, UserMessage) => Ok(Open),
      (Open | Answered, AdminReply) => Ok(Answered),
      (Open | Answered, Close) => Ok(Closed),
      (Closed, Reopen) => Ok(Open),
      (from, event) => Err(TicketError::InvalidTransition { from, event }),
    }
  }

  pub fn is_active(self) -> bool {
    self != TicketStatus::Closed
  }

  pub fn label(self) -> &'static str {
    match self {
      TicketStatus::Open => "open",
      TicketStatus::Answered => "answered",
      TicketStatus::Closed => "closed",
    }
  }
}

/// Checks whether a user may open another ticket. `last_created_at` is the
/// creation time of their newest ticket, 0 if they have none.
pub fn check_rate_limit(
  last_created_at: i64,
  open_count: i64,
  now: i64,
  cooldown_ms: i64,
  max_open: i64,
) -> Result<(), TicketError> {
  if open_count >= max_open {
    return Err(TicketError::TooManyOpen { max: max_open });
  }

  if last_created_at > 0 && now - last_created_at < cooldown_ms {
    return Err(TicketError::Cooldown {
      retry_at: last_created_at + cooldown_ms,
    });
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn user_message_reopens_answered() {
    assert_eq!(
      TicketStatus::Answered.apply(TicketEvent::UserMessage),
      Ok(TicketStatus::Open)
    );
    assert_eq!(
      TicketStatus::Open.apply(TicketEvent::UserMessage),
      Ok(TicketStatus::Open)
    );
  }

  #[test]
  fn admin_reply_answers() {
    assert_eq!(
      TicketStatus::Open.apply(TicketEvent::AdminReply),
      Ok(TicketStatus::Answered)
    );
  }

  #[test]
  fn closed_only_accepts_reopen() {
    for event in [
      TicketEvent::UserMessage,
      TicketEvent::AdminReply,
      TicketEvent::Close,
    ] {
      assert_eq!(
        TicketStatus::Closed.apply(event),
        Err(TicketError::InvalidTransition {
          from: TicketStatus::Closed,
          event
        })
      );
    }
    assert_eq!(
      TicketStatus::Closed.apply(TicketEvent::Reopen),
      Ok(TicketStatus::Open)
    );
  }

  #[test]
  fn reopen_requires_closed() {
    assert!(TicketStatus::Open.apply(TicketEvent::Reopen).is_err());
    assert!(TicketStatus::Answered.apply(TicketEvent::Reopen).is_err());
  }

  #[test]
  fn first_ticket_is_allowed() {
    assert_eq!(check_rate_limit(0, 0, 1_000, 600_000, 3), Ok(()));
  }

  #[test]
  fn cooldown_blocks_until_window_passes() {
    assert_eq!(
      check_rate_limit(1_000, 1, 2_000, 600_000, 3),
      Err(TicketError::Cooldown { retry_at: 601_000 })
    );
    assert_eq!(check_rate_limit(1_000, 1, 601_000, 600_000, 3), Ok(()));
  }

  #[test]
  fn open_limit_wins_over_cooldown() {
    assert_eq!(
      check_rate_limit(1_000, 3, 2_000, 600_000, 3),
      Err(TicketError::TooManyOpen { max: 3 })
    );
  }
}
