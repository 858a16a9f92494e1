//! Booking status state machine.
//!
//! ```text
//! draft ──► confirmed ──► in_progress ──► completed
//!   │           │              │
//!   └───────────┴──────────────┴────────► cancelled
//! ```
//!
//! Forward moves are guarded by [`crate::guards`]; cancellation is always
//! allowed from a non-terminal status. There are no backward moves.

use chrono::{DateTime, Utc};

use freightops_core::{DomainError, DomainResult, UserId};

use crate::booking::BookingStatus;
use crate::events::BookingStatusChanged;
use crate::guards::{self, BookingAggregate, GuardResult};

impl BookingAggregate {
    /// Why `to` is (not) reachable from the current status.
    pub fn check_transition(&self, to: BookingStatus) -> DomainResult<()> {
        self.evaluate(to).map_err(DomainError::transition_not_allowed)
    }

    /// Statuses reachable right now, in chain order.
    pub fn next_valid_statuses(&self) -> Vec<BookingStatus> {
        BookingStatus::ALL
            .into_iter()
            .filter(|to| self.evaluate(*to).is_ok())
            .collect()
    }

    /// Move the booking to `to` if allowed and describe what happened.
    pub fn transition(
        &mut self,
        to: BookingStatus,
        actor: UserId,
        at: DateTime<Utc>,
    ) -> DomainResult<BookingStatusChanged> {
        self.check_transition(to)?;

        let from = self.booking.status();
        self.booking.set_status(to, at);

        Ok(BookingStatusChanged {
            tenant_id: self.booking.tenant_id,
            booking: self.booking.booking_ref(),
            from,
            to,
            actor,
            occurred_at: at,
        })
    }

    fn evaluate(&self, to: BookingStatus) -> GuardResult {
        let from = self.booking.status();

        if from == to {
            return Err(format!("Booking is already {from}"));
        }
        if from.is_terminal() {
            return Err(format!("Booking is {from} and can no longer change status"));
        }
        if to == BookingStatus::Cancelled {
            return Ok(());
        }
        if from.successor() != Some(to) {
            return Err(format!("Cannot move booking from {from} to {to}"));
        }

        match to {
            BookingStatus::Confirmed => guards::can_confirm(self),
            BookingStatus::InProgress => guards::can_start(self),
            BookingStatus::Completed => guards::can_complete(self),
            BookingStatus::Draft | BookingStatus::Cancelled => Ok(()),
        }
    }
}
