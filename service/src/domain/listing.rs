//! [`Listing`] definitions.

#[cfg(doc)]
use common::DateTime;
use common::{unit, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{booking, user};
#[cfg(doc)]
use crate::domain::{Booking, User};

/// Boarding house listed for rent.
#[derive(Clone, Debug)]
pub struct Listing {
    /// ID of this [`Listing`].
    pub id: Id,

    /// ID of the [`User`] owning this [`Listing`].
    pub owner_id: user::Id,

    /// [`Name`] of this [`Listing`].
    pub name: Name,

    /// [`Address`] of this [`Listing`].
    pub address: Address,

    /// Price of a one week stay.
    ///
    /// [`None`] means the weekly rate is derived from the
    /// [`price_monthly`](Listing::price_monthly).
    pub price_weekly: Option<Money>,

    /// Price of a one month stay.
    pub price_monthly: Money,

    /// Price of a one year stay.
    ///
    /// [`None`] means the yearly rate is derived from the
    /// [`price_monthly`](Listing::price_monthly).
    pub price_yearly: Option<Money>,

    /// Total number of rooms in this [`Listing`].
    pub total_rooms: Rooms,

    /// Number of rooms still available for [`Booking`].
    ///
    /// Always stays within `0..=total_rooms`, enforced by every storage
    /// mutation.
    pub available_rooms: Rooms,

    /// Indicator whether this [`Listing`] was approved by an administrator.
    ///
    /// Unapproved [`Listing`]s are invisible to seekers and cannot be booked.
    pub is_approved: bool,

    /// [`DateTime`] when this [`Listing`] was created.
    pub created_at: CreationDateTime,
}

impl Listing {
    /// Returns the rate of this [`Listing`] for a single [`booking::Period`].
    ///
    /// Falls back to a rate derived from the mandatory
    /// [`price_monthly`](Listing::price_monthly) (a quarter of it for a week,
    /// twelve times it for a year) if the explicit rate is absent.
    #[must_use]
    pub fn price_for(&self, period: booking::Period) -> Money {
        match period {
            booking::Period::Weekly => {
                self.price_weekly.unwrap_or_else(|| Money {
                    amount: self.price_monthly.amount / Decimal::from(4),
                    currency: self.price_monthly.currency,
                })
            }
            booking::Period::Monthly => self.price_monthly,
            booking::Period::Yearly => {
                self.price_yearly.unwrap_or_else(|| Money {
                    amount: self.price_monthly.amount * Decimal::from(12),
                    currency: self.price_monthly.currency,
                })
            }
        }
    }
}

/// ID of a [`Listing`].
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    Deserialize,
    Display,
    Eq,
    From,
    FromStr,
    Hash,
    Into,
    PartialEq,
    Serialize,
)]
#[cfg_attr(feature = "postgres", derive(ToSql, FromSql), postgres(transparent))]
pub struct Id(Uuid);

impl Id {
    /// Creates a new random [`Id`].
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Name of a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Name(String);

impl Name {
    /// Creates a new [`Name`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `name` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a new [`Name`] if the given `name` is valid.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        Self::check(&name).then_some(Self(name))
    }

    /// Checks whether the given `name` is a valid [`Name`].
    fn check(name: impl AsRef<str>) -> bool {
        let name = name.as_ref();
        name.trim() == name && !name.is_empty() && name.len() <= 512
    }
}

impl FromStr for Name {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Name`")
    }
}

/// Full address of a [`Listing`].
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Address(String);

impl Address {
    /// Creates a new [`Address`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `address` matches the format.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    /// Creates a new [`Address`] if the given `address` is valid.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Option<Self> {
        let address = address.into();
        Self::check(&address).then_some(Self(address))
    }

    /// Checks whether the given `address` is a valid [`Address`].
    fn check(address: impl AsRef<str>) -> bool {
        let address = address.as_ref();
        address.trim() == address && !address.is_empty() && address.len() <= 512
    }
}

impl FromStr for Address {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Address`")
    }
}

/// Number of rooms in a [`Listing`].
pub type Rooms = u16;

/// Storage operation atomically claiming one available room of a [`Listing`].
///
/// Executed as a single conditional update (`available_rooms > 0` in the
/// predicate), so concurrent claims on the last room resolve to exactly one
/// winner.
#[derive(Clone, Copy, Debug)]
pub struct Claim {
    /// ID of the [`Listing`] to claim a room of.
    pub listing_id: Id,
}

/// Storage operation returning one claimed room back to a [`Listing`].
///
/// The increment never exceeds [`total_rooms`](Listing::total_rooms): a
/// release at full capacity affects zero rows and is reported back for
/// logging instead of failing.
#[derive(Clone, Copy, Debug)]
pub struct Release {
    /// ID of the [`Listing`] to return a room to.
    pub listing_id: Id,
}

/// Storage operation manually adjusting the available rooms of a [`Listing`].
///
/// The adjustment is bounds-checked in the update predicate, so a `delta`
/// violating `0..=total_rooms` affects zero rows.
#[derive(Clone, Copy, Debug)]
pub struct Adjust {
    /// ID of the [`Listing`] to adjust.
    pub listing_id: Id,

    /// Signed number of rooms to adjust by.
    pub delta: i16,
}

/// Storage operation marking a [`Listing`] as approved by an administrator.
#[derive(Clone, Copy, Debug)]
pub struct Approve {
    /// ID of the [`Listing`] to approve.
    pub listing_id: Id,
}

/// [`DateTime`] when a [`Listing`] was created.
pub type CreationDateTime = DateTimeOf<(Listing, unit::Creation)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{money::Currency, DateTime, Money};
    use rust_decimal::Decimal;

    use crate::domain::booking;

    use super::{Address, Id, Listing, Name};

    fn idr(amount: &str) -> Money {
        Money {
            amount: Decimal::from_str(amount).unwrap(),
            currency: Currency::Idr,
        }
    }

    fn listing() -> Listing {
        Listing {
            id: Id::new(),
            owner_id: crate::domain::user::Id::new(),
            name: Name::new("Pondok Melati").unwrap(),
            address: Address::new("Jl. Kaliurang No. 12, Sleman").unwrap(),
            price_weekly: None,
            price_monthly: idr("1000000"),
            price_yearly: None,
            total_rooms: 5,
            available_rooms: 5,
            is_approved: true,
            created_at: DateTime::now().coerce(),
        }
    }

    #[test]
    fn explicit_rates_win() {
        let mut l = listing();
        l.price_weekly = Some(idr("300000"));
        l.price_yearly = Some(idr("11000000"));

        assert_eq!(l.price_for(booking::Period::Weekly), idr("300000"));
        assert_eq!(l.price_for(booking::Period::Monthly), idr("1000000"));
        assert_eq!(l.price_for(booking::Period::Yearly), idr("11000000"));
    }

    #[test]
    fn absent_rates_derive_from_monthly() {
        let l = listing();

        assert_eq!(l.price_for(booking::Period::Weekly), idr("250000"));
        assert_eq!(l.price_for(booking::Period::Yearly), idr("12000000"));
    }
}
