//! Outbound notification integration.

use async_trait::async_trait;
use derive_more::{Display, Error as StdError};
use tracing as log;

use crate::domain::booking::{self, guest};
#[cfg(doc)]
use crate::domain::Booking;

/// Notice to deliver to a guest.
#[derive(Clone, Debug)]
pub enum Notice {
    /// [`Booking`] was confirmed by the listing owner.
    BookingConfirmed {
        /// [`booking::Code`] of the confirmed [`Booking`].
        code: booking::Code,

        /// [`guest::Email`] to deliver the notice to.
        email: guest::Email,
    },

    /// [`Booking`] was rejected by the listing owner.
    BookingRejected {
        /// [`booking::Code`] of the rejected [`Booking`].
        code: booking::Code,

        /// [`guest::Email`] to deliver the notice to.
        email: guest::Email,

        /// [`booking::Reason`] of the rejection.
        reason: booking::Reason,
    },
}

/// Sender of [`Notice`]s.
///
/// Delivery is fire-and-forget: failures are logged by callers and never
/// block a booking transition.
#[async_trait]
pub trait Notifier: std::fmt::Debug + Send + Sync {
    /// Delivers the provided [`Notice`].
    ///
    /// # Errors
    ///
    /// If the delivery channel fails.
    async fn send(&self, notice: Notice) -> Result<(), Error>;
}

/// [`Notifier`] writing [`Notice`]s to the log.
#[derive(Clone, Copy, Debug, Default)]
pub struct Tracing;

#[async_trait]
impl Notifier for Tracing {
    async fn send(&self, notice: Notice) -> Result<(), Error> {
        match notice {
            Notice::BookingConfirmed { code, email } => {
                log::info!("`Booking(code: {code})` confirmed, \
                            notifying `{email}`");
            }
            Notice::BookingRejected {
                code,
                email,
                reason,
            } => {
                log::info!("`Booking(code: {code})` rejected ({reason}), \
                            notifying `{email}`");
            }
        }
        Ok(())
    }
}

/// Error of delivering a [`Notice`].
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// Delivery channel failed.
    #[display("delivery failed: {_0}")]
    Delivery(#[error(not(source))] String),
}
