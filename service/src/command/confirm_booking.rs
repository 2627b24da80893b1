//! [`Command`] for confirming a [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, listing, payment, user, Booking, Listing, Payment},
    infra::{database, notify::Notice, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for confirming a `Pending` [`Booking`].
///
/// Owner-only, and permitted only once the linked [`Payment`] has settled.
/// The claimed room stays claimed: it was consumed when the [`Booking`] was
/// placed.
#[derive(Clone, Copy, Debug)]
pub struct ConfirmBooking {
    /// ID of the [`Booking`] to confirm.
    pub booking_id: booking::Id,

    /// ID of the [`User`] confirming the [`Booking`].
    pub actor_id: user::Id,
}

impl<Db, Gw> Command<ConfirmBooking> for Service<Db, Gw>
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
        > + Database<
            Select<By<Option<Payment>, booking::Id>>,
            Ok = Option<Payment>,
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
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ConfirmBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ConfirmBooking {
            booking_id,
            actor_id,
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

        self.database()
            .execute(Select(By::<Option<Payment>, _>::new(booking.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .filter(|p| p.status == payment::Status::Success)
            .ok_or(E::PaymentNotSettled(booking_id))
            .map_err(tracerr::wrap!())
            .map(drop)?;

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

        if !booking.status.allows(booking::Status::Confirmed) {
            return Err(tracerr::new!(E::InvalidStatus(booking.status)));
        }

        booking.status = booking::Status::Confirmed;
        booking.confirmed_at = Some(DateTime::now().coerce());

        tx.execute(Update(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        // Fire-and-forget: a lost notice never rolls back a confirmation.
        _ = self
            .notifier()
            .send(Notice::BookingConfirmed {
                code: booking.code.clone(),
                email: booking.guest.email.clone(),
            })
            .await
            .map_err(|e| {
                log::warn!(
                    "failed to notify about `Booking(id: {booking_id})` \
                     confirmation: {e}",
                );
            });

        Ok(booking)
    }
}

/// Error of [`ConfirmBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Booking`] is not in a status allowing confirmation.
    #[display("`Booking` cannot be confirmed from `{_0}` status")]
    InvalidStatus(#[error(not(source))] booking::Status),

    /// [`Listing`] of the [`Booking`] does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Payment`] of the [`Booking`] has not settled yet.
    #[display("`Payment` of `Booking(id: {_0})` has not settled")]
    PaymentNotSettled(#[error(not(source))] booking::Id),

    /// [`User`] is not the owner of the [`Listing`].
    #[display("`User(id: {_0})` is not the owner of the `Listing`")]
    UserNotOwner(#[error(not(source))] user::Id),
}
