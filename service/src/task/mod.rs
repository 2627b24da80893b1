//! Background [`Task`]s definitions.

mod background;
pub mod expire_unpaid_bookings;
pub mod progress_stays;

pub use common::Handler as Task;

pub use self::{
    background::Background, expire_unpaid_bookings::ExpireUnpaidBookings,
    progress_stays::ProgressStays,
};
