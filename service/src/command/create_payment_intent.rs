//! [`Command`] for initiating a [`Payment`].

use common::{
    operations::{By, Insert, Select},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{booking, payment, user, Booking, Payment},
    infra::{
        database,
        gateway::{self, Charge, Customer},
        Database, Gateway,
    },
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for initiating a [`Payment`] of a `Pending` [`Booking`].
///
/// Idempotent per [`Booking`]: while a pending [`Payment`] already exists,
/// its intent is returned again instead of charging a second transaction.
#[derive(Clone, Copy, Debug)]
pub struct CreatePaymentIntent {
    /// ID of the [`Booking`] to pay for.
    pub booking_id: booking::Id,

    /// ID of the [`User`] initiating the [`Payment`].
    pub actor_id: user::Id,
}

impl<Db, Gw> Command<CreatePaymentIntent> for Service<Db, Gw>
where
    Db: Database<
            Select<By<Option<Booking>, booking::Id>>,
            Ok = Option<Booking>,
            Err = Traced<database::Error>,
        > + Database<
            Select<By<Option<Payment>, booking::Id>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<Insert<Payment>, Ok = (), Err = Traced<database::Error>>,
    Gw: Gateway<Charge, Ok = gateway::Intent, Err = Traced<gateway::Error>>,
{
    type Ok = (Payment, gateway::Intent);
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreatePaymentIntent,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreatePaymentIntent {
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
        if booking.seeker_id != actor_id {
            return Err(tracerr::new!(E::UserNotSeeker(actor_id)));
        }
        if booking.status != booking::Status::Pending {
            return Err(tracerr::new!(E::InvalidStatus(booking.status)));
        }

        let payment = match self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(booking.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
        {
            Some(p) if p.status == payment::Status::Pending => p,
            Some(p) => {
                return Err(tracerr::new!(E::PaymentAlreadyResolved(
                    p.status
                )));
            }
            None => {
                let payment = Payment {
                    id: payment::Id::new(),
                    booking_id: booking.id,
                    order_id: payment::OrderId::derive(booking.id),
                    status: payment::Status::Pending,
                    method: None,
                    created_at: DateTime::now().coerce(),
                    settled_at: None,
                };
                match self.database().execute(Insert(payment.clone())).await {
                    Ok(()) => payment,
                    // Lost a race against a concurrent intent for the same
                    // booking: fall back to the row that won.
                    Err(e)
                        if e.as_ref().is_unique_violation(Some(
                            "payments_booking_id_key",
                        )) =>
                    {
                        let existing = self
                            .database()
                            .execute(Select(By::<Option<Payment>, _>::new(
                                booking.id,
                            )))
                            .await
                            .map_err(tracerr::map_from_and_wrap!(=> E))?;
                        match existing {
                            Some(p)
                                if p.status == payment::Status::Pending =>
                            {
                                p
                            }
                            Some(p) => {
                                return Err(tracerr::new!(
                                    E::PaymentAlreadyResolved(p.status)
                                ));
                            }
                            None => {
                                return Err(e).map_err(
                                    tracerr::map_from_and_wrap!(=> E),
                                );
                            }
                        }
                    }
                    Err(e) => {
                        return Err(e)
                            .map_err(tracerr::map_from_and_wrap!(=> E));
                    }
                }
            }
        };

        // Charging the same order again re-issues its intent.
        let intent = self
            .gateway()
            .execute(Charge {
                order_id: payment.order_id.clone(),
                amount: booking.total_price,
                customer: Customer {
                    name: booking.guest.name.clone(),
                    email: booking.guest.email.clone(),
                    phone: booking.guest.phone.clone(),
                },
            })
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        Ok((payment, intent))
    }
}

/// Error of [`CreatePaymentIntent`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Payment gateway error.
    #[display("`Gateway` operation failed: {_0}")]
    #[from]
    Gateway(gateway::Error),

    /// [`Booking`] is not in a status allowing payment.
    #[display("`Booking` cannot be paid for in `{_0}` status")]
    InvalidStatus(#[error(not(source))] booking::Status),

    /// [`Payment`] of the [`Booking`] has already reached a terminal status.
    #[display("`Payment` has already resolved into `{_0}` status")]
    PaymentAlreadyResolved(#[error(not(source))] payment::Status),

    /// [`User`] is not the seeker of the [`Booking`].
    #[display("`User(id: {_0})` is not the seeker of the `Booking`")]
    UserNotSeeker(#[error(not(source))] user::Id),
}
