//! [`Command`] for expiring an unpaid [`Booking`].

use common::{
    operations::{By, Commit, Lock, Select, Transact, Transacted, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{booking, listing, payment, Booking, Payment},
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::Listing;

use super::Command;

/// [`Command`] for cancelling a `Pending` [`Booking`] whose payment never
/// settled within the configured timeout.
///
/// System-triggered (see [`task::ExpireUnpaidBookings`]) and idempotent: a
/// [`Booking`] that is already past `Pending`, not old enough, or settled in
/// the meantime is left untouched.
///
/// [`task::ExpireUnpaidBookings`]: crate::task::ExpireUnpaidBookings
#[derive(Clone, Copy, Debug)]
pub struct ExpireUnpaidBooking {
    /// ID of the [`Booking`] to expire.
    pub booking_id: booking::Id,
}

impl<Db, Gw> Command<ExpireUnpaidBooking> for Service<Db, Gw>
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
        > + Database<
            Select<By<Option<Payment>, booking::Id>>,
            Ok = Option<Payment>,
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
        cmd: ExpireUnpaidBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ExpireUnpaidBooking { booking_id } = cmd;

        let booking = self
            .database()
            .execute(Select(By::<Option<Booking>, _>::new(booking_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::BookingNotExists(booking_id))
            .map_err(tracerr::wrap!())?;
        if booking.status != booking::Status::Pending {
            return Ok(booking);
        }

        let deadline = DateTime::now()
            - self.config().expire_unpaid_bookings.timeout;
        if booking.created_at > deadline.coerce() {
            return Ok(booking);
        }

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // Avoid racing a concurrent confirmation or cancellation.
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
        if booking.status != booking::Status::Pending {
            return Ok(booking);
        }

        // A payment settled since the sweep selected this booking keeps it
        // alive for the owner to confirm.
        let settled = tx
            .execute(Select(By::<Option<Payment>, _>::new(booking.id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .is_some_and(|p| p.status == payment::Status::Success);
        if settled {
            return Ok(booking);
        }

        booking.status = booking::Status::Cancelled;
        booking.reason = Some(
            booking::Reason::new("payment was not completed in time")
                .expect("valid `Reason`"),
        );
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

/// Error of [`ExpireUnpaidBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Booking`] with the provided ID does not exist.
    #[display("`Booking(id: {_0})` does not exist")]
    BookingNotExists(#[error(not(source))] booking::Id),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),
}

#[cfg(test)]
mod spec {
    use std::{
        sync::{Arc, Mutex},
        time,
    };

    use common::{
        money::Currency,
        operations::{By, Commit, Lock, Select, Transact, Update},
        Date, DateTime, Money,
    };
    use futures::executor::block_on;
    use rust_decimal::Decimal;
    use tracerr::Traced;

    use crate::{
        domain::{
            booking::{self, guest, Guest},
            listing, payment, user, Booking, Payment,
        },
        infra::{database, Database},
        Service,
    };

    use super::{Command as _, ExpireUnpaidBooking};

    /// In-memory [`Database`] backing the assertions below.
    #[derive(Clone, Debug)]
    struct MockDb {
        booking: Arc<Mutex<Option<Booking>>>,
        payment: Arc<Mutex<Option<Payment>>>,
        /// `(available, total)` rooms of the single listing.
        rooms: Arc<Mutex<(u16, u16)>>,
    }

    impl Database<Transact> for MockDb {
        type Ok = Self;
        type Err = Traced<database::Error>;

        async fn execute(&self, _: Transact) -> Result<Self::Ok, Self::Err> {
            Ok(self.clone())
        }
    }

    impl Database<Commit> for MockDb {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(&self, _: Commit) -> Result<Self::Ok, Self::Err> {
            Ok(())
        }
    }

    impl Database<Lock<By<Booking, booking::Id>>> for MockDb {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Lock<By<Booking, booking::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            Ok(())
        }
    }

    impl Database<Select<By<Option<Booking>, booking::Id>>> for MockDb {
        type Ok = Option<Booking>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Select(by): Select<By<Option<Booking>, booking::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            let id = by.into_inner();
            Ok(self
                .booking
                .lock()
                .unwrap()
                .clone()
                .filter(|b| b.id == id))
        }
    }

    impl Database<Select<By<Option<Payment>, booking::Id>>> for MockDb {
        type Ok = Option<Payment>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Select(by): Select<By<Option<Payment>, booking::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            let id = by.into_inner();
            Ok(self
                .payment
                .lock()
                .unwrap()
                .clone()
                .filter(|p| p.booking_id == id))
        }
    }

    impl Database<Update<Booking>> for MockDb {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Update(booking): Update<Booking>,
        ) -> Result<Self::Ok, Self::Err> {
            *self.booking.lock().unwrap() = Some(booking);
            Ok(())
        }
    }

    impl Database<Update<listing::Release>> for MockDb {
        type Ok = bool;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            _: Update<listing::Release>,
        ) -> Result<Self::Ok, Self::Err> {
            let mut rooms = self.rooms.lock().unwrap();
            Ok(if rooms.0 < rooms.1 {
                rooms.0 += 1;
                true
            } else {
                false
            })
        }
    }

    fn idr(amount: &str) -> Money {
        Money {
            amount: amount.parse::<Decimal>().unwrap(),
            currency: Currency::Idr,
        }
    }

    fn booking(age: time::Duration) -> Booking {
        let id = booking::Id::new();
        Booking {
            id,
            code: booking::Code::derive(id),
            listing_id: listing::Id::new(),
            seeker_id: user::Id::new(),
            guest: Guest {
                name: guest::Name::new("Budi Santoso").unwrap(),
                email: guest::Email::new("budi@example.com").unwrap(),
                phone: guest::Phone::new("081234567890").unwrap(),
            },
            check_in: Date::today().add_weeks(2),
            period: booking::Period::Monthly,
            duration: booking::Duration::new(1).unwrap(),
            check_out: Date::today().add_weeks(2).add_months(1),
            total_price: idr("1000000"),
            status: booking::Status::Pending,
            reason: None,
            created_at: (DateTime::now() - age).coerce(),
            confirmed_at: None,
            closed_at: None,
        }
    }

    fn db(booking: Booking, payment: Option<Payment>) -> MockDb {
        MockDb {
            booking: Arc::new(Mutex::new(Some(booking))),
            payment: Arc::new(Mutex::new(payment)),
            rooms: Arc::new(Mutex::new((4, 5))),
        }
    }

    fn settled(booking_id: booking::Id) -> Payment {
        Payment {
            id: payment::Id::new(),
            booking_id,
            order_id: payment::OrderId::derive(booking_id),
            status: payment::Status::Success,
            method: None,
            created_at: DateTime::now().coerce(),
            settled_at: Some(DateTime::now().coerce()),
        }
    }

    const DAY: time::Duration = time::Duration::from_secs(60 * 60 * 24);

    #[test]
    fn cancels_stale_unpaid_booking_once() {
        let booking = booking(DAY + time::Duration::from_secs(3600));
        let booking_id = booking.id;
        let db = db(booking, None);
        let service = Service::mock(db.clone());

        let expired = block_on(
            service.execute(ExpireUnpaidBooking { booking_id }),
        )
        .expect("expired");
        assert_eq!(expired.status, booking::Status::Cancelled);
        assert!(expired.reason.is_some());
        assert_eq!(db.rooms.lock().unwrap().0, 5);

        // Idempotent: a second pass finds nothing to do and releases
        // nothing.
        let again = block_on(
            service.execute(ExpireUnpaidBooking { booking_id }),
        )
        .expect("no-op");
        assert_eq!(again.status, booking::Status::Cancelled);
        assert_eq!(db.rooms.lock().unwrap().0, 5);
    }

    #[test]
    fn keeps_fresh_booking() {
        let booking = booking(time::Duration::from_secs(3600));
        let booking_id = booking.id;
        let db = db(booking, None);
        let service = Service::mock(db.clone());

        let kept = block_on(
            service.execute(ExpireUnpaidBooking { booking_id }),
        )
        .expect("kept");
        assert_eq!(kept.status, booking::Status::Pending);
        assert_eq!(db.rooms.lock().unwrap().0, 4);
    }

    #[test]
    fn keeps_settled_booking() {
        let booking = booking(DAY + time::Duration::from_secs(3600));
        let booking_id = booking.id;
        let db = db(booking, Some(settled(booking_id)));
        let service = Service::mock(db.clone());

        let kept = block_on(
            service.execute(ExpireUnpaidBooking { booking_id }),
        )
        .expect("kept");
        assert_eq!(kept.status, booking::Status::Pending);
        assert_eq!(db.rooms.lock().unwrap().0, 4);
    }
}
