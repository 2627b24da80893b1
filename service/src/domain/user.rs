//! [`User`] definitions.

use common::define_kind;
use derive_more::{Display, From, FromStr, Into};
#[cfg(feature = "postgres")]
use postgres_types::{FromSql, ToSql};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Platform user.
///
/// Identity and [`Role`] arrive already verified from the authentication
/// boundary, so only the parts the domain acts upon are modeled here.
#[derive(Clone, Copy, Debug)]
pub struct User {
    /// ID of this [`User`].
    pub id: Id,

    /// [`Role`] of this [`User`].
    pub role: Role,
}

/// ID of a [`User`].
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

define_kind! {
    #[doc = "Role of a [`User`] on the platform."]
    enum Role {
        #[doc = "A [`User`] searching for a room to rent."]
        Seeker = 1,

        #[doc = "A [`User`] renting out their listings."]
        Owner = 2,

        #[doc = "A [`User`] administrating the platform."]
        Admin = 3,
    }
}
