//! [`Payment`] definitions.

use common::{define_kind, unit, DateTimeOf};
#[cfg(doc)]
use common::DateTime;
use derive_more::{AsRef, Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::booking;
#[cfg(doc)]
use crate::domain::Booking;

/// Record of the payment gateway's view of a [`Booking`] payment.
///
/// Exactly one [`Payment`] exists per [`Booking`], keyed on the gateway side
/// by its [`OrderId`].
#[derive(Clone, Debug)]
pub struct Payment {
    /// ID of this [`Payment`].
    pub id: Id,

    /// ID of the [`Booking`] this [`Payment`] settles.
    pub booking_id: booking::Id,

    /// [`OrderId`] identifying this [`Payment`] on the gateway side.
    pub order_id: OrderId,

    /// Current [`Status`] of this [`Payment`].
    pub status: Status,

    /// [`Method`] the gateway reported this [`Payment`] was made with.
    pub method: Option<Method>,

    /// [`DateTime`] when this [`Payment`] was initiated.
    pub created_at: CreationDateTime,

    /// [`DateTime`] when the gateway settled this [`Payment`], if it did.
    pub settled_at: Option<SettlementDateTime>,
}

/// ID of a [`Payment`].
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

/// Opaque identifier of a [`Payment`] on the gateway side.
///
/// Serves as the natural key for webhook notification lookups.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct OrderId(String);

impl OrderId {
    /// Derives the [`OrderId`] of a [`Payment`] from the [`Booking`] it
    /// settles.
    #[must_use]
    pub fn derive(booking_id: booking::Id) -> Self {
        Self(Uuid::from(booking_id).simple().to_string())
    }

    /// Creates a new [`OrderId`] if the given `id` is valid.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Option<Self> {
        let id = id.into();
        Self::check(&id).then_some(Self(id))
    }

    /// Checks whether the given `id` is a valid [`OrderId`].
    fn check(id: impl AsRef<str>) -> bool {
        let id = id.as_ref();
        id.trim() == id && !id.is_empty() && id.len() <= 64
    }
}

impl TryFrom<String> for OrderId {
    type Error = &'static str;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s).ok_or("invalid `OrderId`")
    }
}

impl From<OrderId> for String {
    fn from(id: OrderId) -> Self {
        id.0
    }
}

impl FromStr for OrderId {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `OrderId`")
    }
}

define_kind! {
    #[doc = "Status of a [`Payment`]."]
    enum Status {
        #[doc = "Initiated, awaiting the gateway outcome."]
        Pending = 1,

        #[doc = "Settled by the gateway."]
        Success = 2,

        #[doc = "Declined by the gateway."]
        Failed = 3,

        #[doc = "Abandoned until the gateway-side deadline passed."]
        Expired = 4,

        #[doc = "Denied by the gateway's fraud assessment."]
        Denied = 5,
    }
}

impl Status {
    /// Checks whether this [`Status`] is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        use Status as S;

        match self {
            S::Success | S::Failed | S::Expired | S::Denied => true,
            S::Pending => false,
        }
    }

    /// Checks whether moving from this [`Status`] into the provided one is
    /// forward progress.
    ///
    /// Gateways redeliver notifications, so a report that does not advance
    /// the state (a duplicate, or a stale `Pending` arriving after a terminal
    /// outcome) must be acknowledged without mutating anything. This is the
    /// single merge rule both the webhook path and the polling path funnel
    /// through.
    #[must_use]
    pub fn advances_to(self, next: Self) -> bool {
        !self.is_terminal() && next.is_terminal()
    }
}

/// Method a [`Payment`] was made with, as reported by the gateway.
#[derive(
    AsRef, Clone, Debug, Deserialize, Display, Eq, PartialEq, Serialize,
)]
#[as_ref(str, String)]
#[cfg_attr(feature = "postgres", derive(FromSql, ToSql), postgres(transparent))]
#[serde(try_from = "String", into = "String")]
pub struct Method(String);

impl Method {
    /// Creates a new [`Method`] if the given `method` is valid.
    #[must_use]
    pub fn new(method: impl Into<String>) -> Option<Self> {
        let method = method.into();
        Self::check(&method).then_some(Self(method))
    }

    /// Checks whether the given `method` is a valid [`Method`].
    fn check(method: impl AsRef<str>) -> bool {
        let method = method.as_ref();
        method.trim() == method && !method.is_empty() && method.len() <= 64
    }
}

impl TryFrom<String> for Method {
    type Error = &'static str;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s).ok_or("invalid `Method`")
    }
}

impl From<Method> for String {
    fn from(method: Method) -> Self {
        method.0
    }
}

impl FromStr for Method {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s).ok_or("invalid `Method`")
    }
}

/// Storage operation advancing a [`Payment`] into a terminal [`Status`].
///
/// Applied as a compare-and-swap guarded by the current `Pending` status, so
/// a duplicated or out-of-order report affects zero rows instead of
/// overwriting a terminal outcome.
#[derive(Clone, Debug)]
pub struct Advance {
    /// [`OrderId`] of the [`Payment`] to advance.
    pub order_id: OrderId,

    /// Terminal [`Status`] to advance into.
    pub to: Status,

    /// [`Method`] reported along with the outcome, if any.
    pub method: Option<Method>,

    /// [`DateTime`] of the gateway-side settlement, if any.
    pub settled_at: Option<SettlementDateTime>,
}

/// [`DateTime`] when a [`Payment`] was initiated.
pub type CreationDateTime = DateTimeOf<(Payment, unit::Creation)>;

/// Marker type indicating [`Payment`] settlement.
#[derive(Clone, Copy, Debug)]
pub struct Settlement;

/// [`DateTime`] when a [`Payment`] was settled.
pub type SettlementDateTime = DateTimeOf<(Payment, Settlement)>;

#[cfg(test)]
mod spec {
    use super::Status;

    #[test]
    fn pending_advances_to_any_terminal() {
        use Status as S;

        for next in [S::Success, S::Failed, S::Expired, S::Denied] {
            assert!(S::Pending.advances_to(next));
        }
        assert!(!S::Pending.advances_to(S::Pending));
    }

    #[test]
    fn terminal_statuses_never_advance() {
        use Status as S;

        for from in [S::Success, S::Failed, S::Expired, S::Denied] {
            for next in [S::Pending, S::Success, S::Failed, S::Expired, S::Denied]
            {
                assert!(!from.advances_to(next));
            }
        }
    }
}
