//! [`Command`] for cancelling a [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    Date, DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, listing, user, Booking},
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::{Listing, User};

use super::Command;

/// [`Command`] for cancelling a [`Booking`] by its seeker.
///
/// Permitted while `Pending`, or while `Confirmed` before the check-in date.
/// The claimed room is returned to the [`Listing`] within the same
/// transaction.
#[derive(Clone, Debug)]
pub struct CancelBooking {
    /// ID of the [`Booking`] to cancel.
    pub booking_id: booking::Id,

    /// ID of the [`User`] cancelling the [`Booking`].
    pub actor_id: user::Id,

    /// [`booking::Reason`] of the cancellation.
    pub reason: booking::Reason,
}

impl<Db, Gw> Command<CancelBooking> for Service<Db, Gw>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
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
        cmd: CancelBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CancelBooking {
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
        if booking.seeker_id != actor_id {
            return Err(tracerr::new!(E::UserNotSeeker(actor_id)));
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

        if !booking.status.allows(booking::Status::Cancelled) {
            return Err(tracerr::new!(E::InvalidStatus(booking.status)));
        }
        if booking.status == booking::Status::Confirmed
            && Date::today() >= booking.check_in
        {
            return Err(tracerr::new!(E::StayAlreadyStarted(
                booking.check_in
            )));
        }

        booking.status = booking::Status::Cancelled;
        booking.reason = Some(reason);
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

        Ok(booking)
    }
}

/// Error of [`CancelBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] is not in a status allowing cancellation.
    #[display("`Booking` cannot be cancelled from `{_0}` status")]
    InvalidStatus(#[error(not(source))] booking::Status),

    /// Stay of the [`Booking`] has already started.
    #[display("stay has already started on `{_0}`")]
    StayAlreadyStarted(#[error(not(source))] Date),

    /// [`User`] is not the seeker of the [`Booking`].
    #[display("`User(id: {_0})` is not the seeker of the `Booking`")]
    UserNotSeeker(#[error(not(source))] user::Id),
}
