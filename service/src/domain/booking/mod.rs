//! [`Booking`] definitions.

pub mod guest;

use common::{define_kind, unit, Date, DateTimeOf, Money};
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(doc)]
use common::DateTime;
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xxhash_rust::xxh3;

use crate::domain::{listing, user, Listing};
#[cfg(doc)]
use crate::domain::{Payment, User};

pub use self::guest::Guest;

/// Reservation of a room in a [`Listing`].
#[derive(Clone, Debug)]
pub struct Booking {
    /// ID of this [`Booking`].
    pub id: Id,

    /// Unique human-readable [`Code`] of this [`Booking`].
    pub code: Code,

    /// ID of the [`Listing`] this [`Booking`] reserves a room in.
    pub listing_id: listing::Id,

    /// ID of the [`User`] who placed this [`Booking`].
    pub seeker_id: user::Id,

    /// [`Guest`] contact snapshot captured when this [`Booking`] was placed.
    ///
    /// Independent of the seeker's current profile.
    pub guest: Guest,

    /// [`Date`] the stay starts on.
    pub check_in: Date,

    /// [`Period`] the stay [`Duration`] is expressed in.
    pub period: Period,

    /// Number of [`Period`]s the stay lasts.
    pub duration: Duration,

    /// [`Date`] the stay ends on.
    ///
    /// Derived from [`check_in`](Booking::check_in) once at placement.
    pub check_out: Date,

    /// Total price of the whole stay.
    ///
    /// Computed once at placement from the [`Listing`] rate table and never
    /// recomputed afterwards.
    pub total_price: Money,

    /// Current [`Status`] of this [`Booking`].
    pub status: Status,

    /// [`Reason`] of the rejection or cancellation, if any.
    pub reason: Option<Reason>,

    /// [`DateTime`] when this [`Booking`] was placed.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when this [`Booking`] was confirmed, if it was.
    pub confirmed_at: Option<ConfirmationDateTime>,

    /// [`DateTime`] when this [`Booking`] was rejected or cancelled, if it
    /// was.
    pub closed_at: Option<ClosureDateTime>,
}

impl Booking {
    /// Returns the total price of a stay in the provided [`Listing`] for the
    /// given number of [`Period`]s.
    #[must_use]
    pub fn quote(
        listing: &Listing,
        period: Period,
        duration: Duration,
    ) -> Money {
        let rate = listing.price_for(period);
        Money {
            amount: rate.amount * Decimal::from(duration.get()),
            currency: rate.currency,
        }
    }
}

/// ID of a [`Booking`].
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

/// Unique human-readable code of a [`Booking`].
#[derive(AsRef, Clone, Debug, Display, Eq, Hash, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Code(String);

impl Code {
    /// Derives the [`Code`] of a [`Booking`] from its [`Id`].
    #[must_use]
    pub fn derive(id: Id) -> Self {
        let digest = xxh3::xxh3_64(Uuid::from(id).as_bytes());
        Self(format!("PDK-{digest:016X}"))
    }
}

define_kind! {
    #[doc = "Period a [`Booking`] stay [`Duration`] is expressed in."]
    enum Period {
        #[doc = "Stay lasting whole weeks."]
        Weekly = 1,

        #[doc = "Stay lasting whole months."]
        Monthly = 2,

        #[doc = "Stay lasting whole years."]
        Yearly = 3,
    }
}

impl Period {
    /// Advances the provided [`Date`] by the given number of this [`Period`].
    ///
    /// Month and year arithmetic clamps the day component to the length of
    /// the resulting month.
    #[must_use]
    pub fn advance(self, from: Date, duration: Duration) -> Date {
        let count = u32::from(duration.get());
        match self {
            Self::Weekly => from.add_weeks(count),
            Self::Monthly => from.add_months(count),
            Self::Yearly => from.add_years(count),
        }
    }
}

/// Number of [`Period`]s a [`Booking`] stay lasts.
#[derive(Clone, Copy, Debug, Display, Eq, Into, PartialEq)]
pub struct Duration(u16);

impl Duration {
    /// Longest supported stay, in [`Period`]s.
    pub const MAX: u16 = 520;

    /// Creates a new [`Duration`] if the given `count` is valid.
    #[must_use]
    pub fn new(count: u16) -> Option<Self> {
        (1..=Self::MAX).contains(&count).then_some(Self(count))
    }

    /// Returns the underlying number of [`Period`]s.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

define_kind! {
    #[doc = "Status of a [`Booking`]."]
    enum Status {
        #[doc = "Placed, awaiting payment and owner confirmation."]
        Pending = 1,

        #[doc = "Confirmed by the [`Listing`] owner."]
        Confirmed = 2,

        #[doc = "Rejected by the [`Listing`] owner."]
        Rejected = 3,

        #[doc = "Cancelled by the seeker or by the unpaid-expiry sweep."]
        Cancelled = 4,

        #[doc = "The guest has checked in."]
        CheckedIn = 5,

        #[doc = "The guest has checked out."]
        CheckedOut = 6,
    }
}

impl Status {
    /// Checks whether a [`Booking`] in this [`Status`] may transition into
    /// the provided one.
    ///
    /// Any `(from, to)` pair not named here is forbidden, so callers reject
    /// it instead of silently succeeding.
    #[must_use]
    pub fn allows(self, to: Self) -> bool {
        use Status as S;

        match self {
            S::Pending => {
                matches!(to, S::Confirmed | S::Rejected | S::Cancelled)
            }
            S::Confirmed => matches!(to, S::CheckedIn | S::Cancelled),
            S::CheckedIn => matches!(to, S::CheckedOut),
            S::Rejected | S::Cancelled | S::CheckedOut => false,
        }
    }

    /// Checks whether this [`Status`] is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        use Status as S;

        match self {
            S::Rejected | S::Cancelled | S::CheckedOut => true,
            S::Pending | S::Confirmed | S::CheckedIn => false,
        }
    }
}

/// Storage operation moving `Confirmed` [`Booking`]s whose check-in date has
/// been reached into `CheckedIn`.
///
/// Guarded by the current status, so re-application is a no-op.
#[derive(Clone, Copy, Debug)]
pub struct CheckIns;

/// Storage operation moving `CheckedIn` [`Booking`]s whose check-out date has
/// been reached into `CheckedOut`.
///
/// Guarded by the current status, so re-application is a no-op.
#[derive(Clone, Copy, Debug)]
pub struct CheckOuts;

/// Reason of a [`Booking`] rejection or cancellation.
#[derive(AsRef, Clone, Debug, Display, Eq, PartialEq)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
pub struct Reason(String);

impl Reason {
    /// Creates a new [`Reason`].
    ///
    /// # Safety
    ///
    /// The caller must ensure that the given `reason` is not empty.
    #[expect(unsafe_code, reason = "bypass")]
    #[must_use]
    pub unsafe fn new_unchecked(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Creates a new [`Reason`] if the given `reason` is valid.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Option<Self> {
        let reason = reason.into();
        Self::check(&reason).then_some(Self(reason))
    }

    /// Checks whether the given `reason` is a valid [`Reason`].
    fn check(reason: impl AsRef<str>) -> bool {
        let reason = reason.as_ref();
        reason.trim() == reason && !reason.is_empty() && reason.len() <= 512
    }
}

impl FromStr for Reason {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Reason`")
    }
}

/// [`DateTime`] when a [`Booking`] was placed.
pub type CreationDateTime = DateTimeOf<(Booking, unit::Creation)>;

/// Marker type indicating [`Booking`] confirmation.
#[derive(Clone, Copy, Debug)]
pub struct Confirmation;

/// [`DateTime`] when a [`Booking`] was confirmed.
pub type ConfirmationDateTime = DateTimeOf<(Booking, Confirmation)>;

/// Marker type indicating [`Booking`] rejection or cancellation.
#[derive(Clone, Copy, Debug)]
pub struct Closure;

/// [`DateTime`] when a [`Booking`] was rejected or cancelled.
pub type ClosureDateTime = DateTimeOf<(Booking, Closure)>;

#[cfg(test)]
mod spec {
    use std::str::FromStr as _;

    use common::{money::Currency, Date, DateTime, Money};
    use rust_decimal::Decimal;

    use crate::domain::{listing, user};

    use super::{Booking, Code, Duration, Id, Period, Status};

    fn idr(amount: &str) -> Money {
        Money {
            amount: Decimal::from_str(amount).unwrap(),
            currency: Currency::Idr,
        }
    }

    fn date(s: &str) -> Date {
        Date::from_str(s).unwrap()
    }

    fn duration(count: u16) -> Duration {
        Duration::new(count).unwrap()
    }

    #[test]
    fn transition_table_is_closed() {
        use Status as S;

        const ALL: [Status; 6] = [
            S::Pending,
            S::Confirmed,
            S::Rejected,
            S::Cancelled,
            S::CheckedIn,
            S::CheckedOut,
        ];
        const ALLOWED: [(Status, Status); 6] = [
            (S::Pending, S::Confirmed),
            (S::Pending, S::Rejected),
            (S::Pending, S::Cancelled),
            (S::Confirmed, S::CheckedIn),
            (S::Confirmed, S::Cancelled),
            (S::CheckedIn, S::CheckedOut),
        ];

        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.allows(to),
                    ALLOWED.contains(&(from, to)),
                    "unexpected verdict for {from} -> {to}",
                );
            }
        }
    }

    #[test]
    fn terminal_statuses_allow_nothing() {
        use Status as S;

        for s in [S::Rejected, S::Cancelled, S::CheckedOut] {
            assert!(s.is_terminal());
        }
        for s in [S::Pending, S::Confirmed, S::CheckedIn] {
            assert!(!s.is_terminal());
        }
    }

    #[test]
    fn advances_check_in_date() {
        assert_eq!(
            Period::Monthly.advance(date("2025-06-01"), duration(2)),
            date("2025-08-01"),
        );
        assert_eq!(
            Period::Weekly.advance(date("2025-06-01"), duration(3)),
            date("2025-06-22"),
        );
        assert_eq!(
            Period::Yearly.advance(date("2025-06-01"), duration(1)),
            date("2026-06-01"),
        );
        // Month-end stays clamped.
        assert_eq!(
            Period::Monthly.advance(date("2025-01-31"), duration(1)),
            date("2025-02-28"),
        );
    }

    #[test]
    fn duration_bounds() {
        assert!(Duration::new(0).is_none());
        assert!(Duration::new(1).is_some());
        assert!(Duration::new(Duration::MAX).is_some());
        assert!(Duration::new(Duration::MAX + 1).is_none());
    }

    #[test]
    fn quotes_rate_times_duration() {
        let listing = listing::Listing {
            id: listing::Id::new(),
            owner_id: user::Id::new(),
            name: listing::Name::new("Pondok Melati").unwrap(),
            address: listing::Address::new("Jl. Kaliurang No. 12").unwrap(),
            price_weekly: None,
            price_monthly: idr("1000000"),
            price_yearly: None,
            total_rooms: 5,
            available_rooms: 5,
            is_approved: true,
            created_at: DateTime::now().coerce(),
        };

        assert_eq!(
            Booking::quote(&listing, Period::Monthly, duration(2)),
            idr("2000000"),
        );
        assert_eq!(
            Booking::quote(&listing, Period::Weekly, duration(3)),
            idr("750000"),
        );
    }

    #[test]
    fn code_is_stable_per_id() {
        let id = Id::new();
        assert_eq!(Code::derive(id), Code::derive(id));
        assert!(Code::derive(id).to_string().starts_with("PDK-"));
    }
}
