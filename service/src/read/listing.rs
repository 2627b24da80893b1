//! [`Listing`] read model definition.

#[cfg(doc)]
use crate::domain::Listing;

pub mod list {
    //! [`Listing`]s list definitions.

    use common::define_pagination;

    use crate::domain::listing;
    #[cfg(doc)]
    use crate::domain::Listing;

    define_pagination!(Cursor, Node, Filter);

    /// Node in a [`Connection`].
    pub type Node = listing::Id;

    /// Cursor pointing to a specific [`Listing`] in a list.
    pub type Cursor = listing::Id;

    /// Filter for [`Selector`].
    #[derive(Clone, Debug, Default)]
    pub struct Filter {
        /// [`listing::Name`] (or its part) to fuzzy search for.
        pub name: Option<listing::Name>,

        /// Indicator whether only administrator-approved [`Listing`]s are
        /// selected.
        pub approved_only: bool,
    }
}
