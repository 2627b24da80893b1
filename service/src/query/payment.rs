//! [`Query`] collection related to a single [`Payment`].

use common::operations::By;

use crate::domain::{booking, Payment};
#[cfg(doc)]
use crate::{domain::Booking, Query};

use super::DatabaseQuery;

/// Queries a [`Payment`] by the [`Booking`] it settles.
pub type ByBookingId = DatabaseQuery<By<Option<Payment>, booking::Id>>;
