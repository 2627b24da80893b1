//! [`Command`] for placing a new [`Booking`].

use common::{
    operations::{By, Commit, Insert, Select, Transact, Transacted, Update},
    Date, DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, Guest},
        listing, user, Booking, Listing,
    },
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for placing a new [`Booking`].
///
/// Claims one room of the [`Listing`] and inserts the `Pending` [`Booking`]
/// within a single transaction: either both happen or neither does, so a
/// failed placement can never leave a dangling claim.
#[derive(Clone, Debug)]
pub struct CreateBooking {
    /// ID of the [`Listing`] to book a room in.
    pub listing_id: listing::Id,

    /// ID of the [`User`] placing the [`Booking`].
    pub seeker_id: user::Id,

    /// [`Guest`] contact snapshot to capture.
    pub guest: Guest,

    /// [`Date`] the stay starts on.
    pub check_in: Date,

    /// [`booking::Period`] the stay duration is expressed in.
    pub period: booking::Period,

    /// Number of [`booking::Period`]s the stay lasts.
    pub duration: booking::Duration,
}

impl<Db, Gw> Command<CreateBooking> for Service<Db, Gw>
where
    Db: Database<Transact, Err = Traced<database::Error>>
        + Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        >,
    Transacted<Db>: Database<
            Update<listing::Claim>,
            Ok = bool,
            Err = Traced<database::Error>,
        > + Database<Insert<Booking>, Ok = (), Err = Traced<database::Error>>
        + Database<Commit, Err = Traced<database::Error>>,
{
    type Ok = Booking;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateBooking,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateBooking {
            listing_id,
            seeker_id,
            guest,
            check_in,
            period,
            duration,
        } = cmd;

        if check_in < Date::today() {
            return Err(tracerr::new!(E::CheckInPast(check_in)));
        }

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;
        if !listing.is_approved {
            return Err(tracerr::new!(E::ListingNotApproved(listing_id)));
        }

        let id = booking::Id::new();
        let booking = Booking {
            id,
            code: booking::Code::derive(id),
            listing_id: listing.id,
            seeker_id,
            guest,
            check_in,
            period,
            duration,
            check_out: period.advance(check_in, duration),
            total_price: Booking::quote(&listing, period, duration),
            status: booking::Status::Pending,
            reason: None,
            created_at: DateTime::now().coerce(),
            confirmed_at: None,
            closed_at: None,
        };

        let tx = self
            .database()
            .execute(Transact)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        // A failed claim aborts the transaction before anything is written.
        tx.execute(Update(listing::Claim {
            listing_id: listing.id,
        }))
        .await
        .map_err(tracerr::map_from_and_wrap!(=> E))?
        .then_some(())
        .ok_or(E::NoRoomsAvailable(listing.id))
        .map_err(tracerr::wrap!())?;

        tx.execute(Insert(booking.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        tx.execute(Commit)
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(booking)
    }
}

/// Error of [`CreateBooking`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// Check-in date lies in the past.
    #[display("check-in date `{_0}` lies in the past")]
    CheckInPast(#[error(not(source))] Date),

    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] is not approved yet.
    #[display("`Listing(id: {_0})` is not approved")]
    ListingNotApproved(#[error(not(source))] listing::Id),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// [`Listing`] has no rooms available.
    #[display("`Listing(id: {_0})` has no rooms available")]
    NoRoomsAvailable(#[error(not(source))] listing::Id),
}

#[cfg(test)]
mod spec {
    use std::{
        str::FromStr as _,
        sync::{Arc, Mutex},
    };

    use common::{
        money::Currency,
        operations::{By, Commit, Insert, Select, Transact, Update},
        Date, DateTime, Money,
    };
    use futures::{executor::block_on, future};
    use rust_decimal::Decimal;
    use tracerr::Traced;

    use crate::{
        domain::{
            booking::{self, guest, Guest},
            listing, user, Booking, Listing,
        },
        infra::{database, Database},
        Service,
    };

    use super::{Command as _, CreateBooking, ExecutionError};

    /// In-memory [`Database`] backing the assertions below.
    #[derive(Clone, Debug, Default)]
    struct MockDb {
        listing: Arc<Mutex<Option<Listing>>>,
        bookings: Arc<Mutex<Vec<Booking>>>,
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

    impl Database<Select<By<Option<Listing>, listing::Id>>> for MockDb {
        type Ok = Option<Listing>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Select(by): Select<By<Option<Listing>, listing::Id>>,
        ) -> Result<Self::Ok, Self::Err> {
            let id = by.into_inner();
            Ok(self
                .listing
                .lock()
                .unwrap()
                .clone()
                .filter(|l| l.id == id))
        }
    }

    impl Database<Update<listing::Claim>> for MockDb {
        type Ok = bool;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Update(claim): Update<listing::Claim>,
        ) -> Result<Self::Ok, Self::Err> {
            let mut listing = self.listing.lock().unwrap();
            Ok(match listing.as_mut() {
                Some(l)
                    if l.id == claim.listing_id && l.available_rooms > 0 =>
                {
                    l.available_rooms -= 1;
                    true
                }
                Some(_) | None => false,
            })
        }
    }

    impl Database<Insert<Booking>> for MockDb {
        type Ok = ();
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Insert(booking): Insert<Booking>,
        ) -> Result<Self::Ok, Self::Err> {
            self.bookings.lock().unwrap().push(booking);
            Ok(())
        }
    }

    fn idr(amount: &str) -> Money {
        Money {
            amount: Decimal::from_str(amount).unwrap(),
            currency: Currency::Idr,
        }
    }

    fn listing(available_rooms: u16) -> Listing {
        Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            name: listing::Name::new("Pondok Melati").unwrap(),
            address: listing::Address::new("Jl. Kaliurang No. 12").unwrap(),
            price_weekly: None,
            price_monthly: idr("1000000"),
            price_yearly: None,
            total_rooms: 5,
            available_rooms,
            is_approved: true,
            created_at: DateTime::now().coerce(),
        }
    }

    fn db(listing: Listing) -> MockDb {
        MockDb {
            listing: Arc::new(Mutex::new(Some(listing))),
            bookings: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn cmd(listing_id: listing::Id) -> CreateBooking {
        CreateBooking {
            listing_id,
            seeker_id: user::Id::new(),
            guest: Guest {
                name: guest::Name::new("Budi Santoso").unwrap(),
                email: guest::Email::new("budi@example.com").unwrap(),
                phone: guest::Phone::new("081234567890").unwrap(),
            },
            check_in: Date::today().add_weeks(1),
            period: booking::Period::Monthly,
            duration: booking::Duration::new(2).unwrap(),
        }
    }

    #[test]
    fn places_pending_booking_and_claims_a_room() {
        let listing = listing(5);
        let listing_id = listing.id;
        let db = db(listing);
        let service = Service::mock(db.clone());

        let booking =
            block_on(service.execute(cmd(listing_id))).expect("placed");

        assert_eq!(booking.status, booking::Status::Pending);
        assert_eq!(booking.total_price, idr("2000000"));
        assert_eq!(
            booking.check_out,
            booking::Period::Monthly
                .advance(booking.check_in, booking.duration),
        );
        assert_eq!(
            db.listing.lock().unwrap().as_ref().unwrap().available_rooms,
            4,
        );
        assert_eq!(db.bookings.lock().unwrap().len(), 1);
    }

    #[test]
    fn rejects_past_check_in() {
        let listing = listing(5);
        let listing_id = listing.id;
        let service = Service::mock(db(listing));

        let mut cmd = cmd(listing_id);
        cmd.check_in = Date::from_str("2020-01-01").unwrap();

        let err = block_on(service.execute(cmd)).unwrap_err();
        assert!(matches!(err.as_ref(), ExecutionError::CheckInPast(_)));
    }

    #[test]
    fn rejects_unapproved_listing() {
        let mut listing = listing(5);
        listing.is_approved = false;
        let listing_id = listing.id;
        let service = Service::mock(db(listing));

        let err = block_on(service.execute(cmd(listing_id))).unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::ListingNotApproved(_)
        ));
    }

    #[test]
    fn reports_sold_out_listing_without_placing() {
        let listing = listing(0);
        let listing_id = listing.id;
        let db = db(listing);
        let service = Service::mock(db.clone());

        let err =
            block_on(service.execute(cmd(listing_id))).unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::NoRoomsAvailable(_)
        ));
        assert_eq!(
            db.listing.lock().unwrap().as_ref().unwrap().available_rooms,
            0,
        );
        assert!(db.bookings.lock().unwrap().is_empty());
    }

    #[test]
    fn last_room_goes_to_exactly_one_of_two_racing_seekers() {
        let listing = listing(1);
        let listing_id = listing.id;
        let db = db(listing);
        let service = Service::mock(db.clone());

        let (a, b) = block_on(future::join(
            service.execute(cmd(listing_id)),
            service.execute(cmd(listing_id)),
        ));

        assert_eq!(
            [a.is_ok(), b.is_ok()].into_iter().filter(|ok| *ok).count(),
            1,
        );
        assert_eq!(
            db.listing.lock().unwrap().as_ref().unwrap().available_rooms,
            0,
        );
        assert_eq!(db.bookings.lock().unwrap().len(), 1);
    }
}
