//! [`Command`] for rejecting a [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, listing, user, Booking, Listing},
    infra::{database, notify::Notice, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for rejecting a `Pending` [`Booking`].
///
/// Owner-only. A completed payment is not required: an owner may turn a
/// request down before the seeker ever pays. The claimed room is returned to
/// the [`Listing`] within the same transaction.
#[derive(Clone, Debug)]
pub struct RejectBooking {
    /// ID of the [`Booking`] to reject.
    pub booking_id: booking::Id,

    /// ID of the [`User`] rejecting the [`Booking`].
    pub actor_id: user::Id,

    /// [`booking::Reason`] of the rejection.
    pub reason: booking::Reason,
}

impl<Db, Gw> Command<RejectBooking> for Service<Db, Gw>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Lock<By<Booking, booking::Id>>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<Update<Booking>, Ok = (), Err = Traced<database::Error>>
        + Database<
            Update<listing::Release>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: RejectBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let RejectBooking {
            booking_id,
            actor_id,
            reason,
        } = cmd;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(booking.listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(booking.listing_id))
            .map_err(tracerr::wrap!())?;
        if listing.owner_id != actor_id {
            return Err(tracerr::new!(E::UserNotOwner(actor_id)));
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid concurrent transitions upon the same `Booking`.
        tx.execute(Lock(By::new(booking.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let mut booking = tx
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;

        if !booking.status.allows(booking::Status::Rejected) {
            return Err(tracerr::new!(E::InvalidStatus(booking.status)));
        }

        booking.status = booking::Status::Rejected;
        booking.reason = Some(reason.clone());
        booking.closed_at = Some(DateTime::now().coerce());

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        let released = tx
            .execute(Update(listing::Release {
                listing_id: booking.listing_id,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if !released {
            // The counter is a derived value; the rejection must not fail
            // because of it.
            log::warn!(
                "`Listing(id: {})` is already at full capacity, \
                 nothing to release",
                booking.listing_id,
            );
        }

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        _ = self
            .notifier()
            .send(Notice::BookingRejected {
                code: booking.code.clone(),
                email: booking.guest.email.clone(),
                reason,
            })
            .await
            .map_err(|e| {
                log::warn!(
                    "failed to notify about `Booking(id: {booking_id})` \
                     rejection: {e}",
                );
            });

        Ok(booking)
    }
}

/// Error of [`RejectBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] is not in a status allowing rejection.
    #[display("`Booking` cannot be rejected from `{_0}` status")]
    InvalidStatus(#[error(not(source))] booking::Status),

    /// [`Listing`] of the [`Booking`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`User`] is not the owner of the [`Listing`].
    #[display("`User(id: {_0})` is not the owner of the `Listing`")]
    UserNotOwner(#[error(not(source))] user::Id),
}
