//! [`Command`] for approving a [`Listing`].

use common::operations::Update;
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::listing,
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::Listing;

use super::Command;

/// [`Command`] for approving a [`Listing`], making it visible to seekers.
///
/// Administrator-only; the role check happens at the API boundary.
#[derive(Clone, Copy, Debug)]
pub struct ApproveListing {
    /// ID of the [`Listing`] to approve.
    pub listing_id: listing::Id,
}

impl<Db, Gw> Command<ApproveListing> for Service<Db, Gw>
where
    Db: Database<
        Update<listing::Approve>,
        Ok = bool,
        Err = Traced<database::Error>,
    >,
{
    type Ok = ();
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ApproveListing,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApproveListing { listing_id } = cmd;

        self.database()
            .execute(Update(listing::Approve { listing_id }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .then_some(())
            .ok_or(E::ListingNotExists(listing_id))
            .map_err(tracerr::wrap!())
    }
}

/// Error of [`ApproveListing`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// [`Listing`] with the provided ID does not exist.
    #[display("`Listing(id: {_0})` does not exist")]
    ListingNotExists(#[error(not(source))] listing::Id),
}
