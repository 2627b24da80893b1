//! [`Command`] for registering a new [`Listing`].

use common::{operations::Insert, DateTime, Money};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{listing, user, Listing},
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::User;

use super::Command;

/// [`Command`] for registering a new [`Listing`].
///
/// The [`Listing`] starts unapproved with all of its rooms available.
#[derive(Clone, Debug)]
pub struct CreateListing {
    /// ID of the [`User`] owning the new [`Listing`].
    pub owner_id: user::Id,

    /// Name of the new [`Listing`].
    pub name: listing::Name,

    /// Address of the new [`Listing`].
    pub address: listing::Address,

    /// Explicit weekly rate, if any.
    pub price_weekly: Option<Money>,

    /// Monthly rate.
    pub price_monthly: Money,

    /// Explicit yearly rate, if any.
    pub price_yearly: Option<Money>,

    /// Total number of rooms.
    pub total_rooms: listing::Rooms,
}

impl<Db, Gw> Command<CreateListing> for Service<Db, Gw>
where
    Db: Database<Insert<Listing>, Ok = (), Err = Traced<database::Error>>,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: CreateListing,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let CreateListing {
            owner_id,
            name,
            address,
            price_weekly,
            price_monthly,
            price_yearly,
            total_rooms,
        } = cmd;

        if total_rooms == 0 {
            return Err(tracerr::new!(E::NoRooms));
        }

        let listing = Listing {
            id: listing::Id::new(),
            owner_id,
            name,
            address,
            price_weekly,
            price_monthly,
            price_yearly,
            total_rooms,
            available_rooms: total_rooms,
            is_approved: false,
            created_at: DateTime::now().coerce(),
        };

        self.database()
            .execute(Insert(listing.clone()))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))
            .map(drop)?;

        Ok(listing)
    }
}

/// Error of [`CreateListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] must have at least one room.
    #[display("`Listing` must have at least one room")]
    NoRooms,
}
