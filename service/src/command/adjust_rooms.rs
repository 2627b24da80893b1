//! [`Command`] for manually adjusting available rooms of a [`Listing`].

use common::operations::{By, Select, Update};
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

/// [`Command`] for manually adjusting the available rooms of a [`Listing`],
/// e.g. when the owner takes a room offline for maintenance.
///
/// The adjustment is applied as a single bounds-checked conditional update,
/// so it can never drive the counter outside `0..=total_rooms`, no matter
/// what it races with.
#[derive(Clone, Copy, Debug)]
pub struct AdjustRooms {
    /// ID of the [`Listing`] to adjust.
    pub listing_id: listing::Id,

    /// ID of the [`User`] requesting the adjustment.
    pub actor_id: user::Id,

    /// Signed number of rooms to adjust by.
    pub delta: i16,
}

impl<Db, Gw> Command<AdjustRooms> for Service<Db, Gw>
where
    Db: Database<
            Select<By<Option<Listing>, listing::Id>>,
            Ok = Option<Listing>,
            Err = Traced<database::Error>,
        > + Database<
            Update<listing::Adjust>,
            Ok = bool,
            Err = Traced<database::Error>,
        >,
{
    type Ok = Listing;
    type Err = Traced<ExecutionError>;

    async fn execute(&self, cmd: AdjustRooms) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let AdjustRooms {
            listing_id,
            actor_id,
            delta,
        } = cmd;

        let listing = self
            .database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())?;

        if listing.owner_id != actor_id {
            return Err(tracerr::new!(E::UserNotOwner(actor_id)));
        }

        self.database()
            .execute(Update(listing::Adjust { listing_id, delta }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .then_some(())
            .ok_or(E::RoomsOutOfBounds)
            .map_err(tracerr::wrap!())?;

        self.database()
            .execute(Select(By::<Option<Listing>, _>::new(listing_id)))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`AdjustRooms`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),

    /// Adjustment would drive the counter outside its bounds.
    #[display("adjustment would violate `0..=total_rooms`")]
    RoomsOutOfBounds,

    /// [`User`] is not the owner of the [`Listing`].
    #[display("`User(id: {_0})` is not the owner of the `Listing`")]
    UserNotOwner(#[error(not(source))] user::Id),
}
