//! [`Command`] definition.

pub mod adjust_rooms;
pub mod apply_payment_notification;
pub mod approve_listing;
pub mod cancel_booking;
pub mod confirm_booking;
pub mod create_booking;
pub mod create_listing;
pub mod create_payment_intent;
pub mod expire_unpaid_booking;
pub mod poll_payment_status;
pub mod reject_booking;

/// [`Command`] of the [`Service`].
///
/// [`Service`]: crate::Service
pub use common::Handler as Command;

pub use self::{
    adjust_rooms::AdjustRooms,
    apply_payment_notification::ApplyPaymentNotification,
    approve_listing::ApproveListing, cancel_booking::CancelBooking,
    confirm_booking::ConfirmBooking, create_booking::CreateBooking,
    create_listing::CreateListing,
    create_payment_intent::CreatePaymentIntent,
    expire_unpaid_booking::ExpireUnpaidBooking,
    poll_payment_status::PollPaymentStatus, reject_booking::RejectBooking,
};
