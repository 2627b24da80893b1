//! [`Booking`] read model definition.

#[cfg(doc)]
use crate::domain::Booking;

pub mod list {
    //! [`Booking`]s list definitions.

    use common::define_pagination;

    use crate::domain::{booking, listing, user};
    #[cfg(doc)]
    use crate::domain::{Booking, Listing, User};

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = booking::Id;

    /// Cursor pointing to a specific [`Booking`] in a list.
    pub type Cursor = booking::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Copy, Debug, Default)]
    pub struct Filter {
        /// ID of the [`User`] whose [`Booking`]s are selected.
        pub seeker_id: Option<user::Id>,

        /// ID of the [`Listing`] whose [`Booking`]s are selected.
        pub listing_id: Option<listing::Id>,

        /// [`booking::Status`] to select [`Booking`]s in.
        pub status: Option<booking::Status>,
    }
}
