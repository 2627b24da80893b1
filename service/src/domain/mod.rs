//! Domain definitions.

pub mod booking;
pub mod listing;
pub mod payment;
pub mod user;

pub use self::{
    booking::Booking, listing::Listing, payment::Payment, user::User,
};
