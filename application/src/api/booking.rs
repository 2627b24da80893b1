//! [`Booking`]-related API definitions.
//!
//! [`Booking`]: domain::Booking

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use common::{pagination, Date, Handler as _};
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{
        self,
        booking::{self, Guest},
        listing, user,
    },
    query, read,
};
use uuid::Uuid;

use crate::{api, context::Auth, AsError, Error, Service};

/// Request of placing a new [`Booking`].
///
/// [`Booking`]: domain::Booking
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Identifier of the listing to book a room in.
    pub listing_id: Uuid,

    /// Date the stay starts on.
    pub check_in: Date,

    /// Period the stay duration is expressed in.
    pub period: String,

    /// Number of periods the stay lasts.
    pub duration: u16,

    /// Contact details of the person staying.
    pub guest: Guest,
}

/// Request of closing a [`Booking`] with a reason.
///
/// [`Booking`]: domain::Booking
#[derive(Debug, Deserialize)]
pub struct CloseRequest {
    /// Reason of the rejection or cancellation.
    pub reason: String,
}

/// Parameters of listing [`Booking`]s.
///
/// [`Booking`]: domain::Booking
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Number of items to return.
    pub first: Option<u32>,

    /// Cursor to return items after.
    pub after: Option<Uuid>,

    /// Identifier of the listing to select bookings of.
    pub listing_id: Option<Uuid>,

    /// Status to select bookings in.
    pub status: Option<String>,
}

/// A booking.
#[derive(Debug, Serialize)]
pub struct Booking {
    /// Unique identifier of this booking.
    pub id: Uuid,

    /// Unique human-readable code of this booking.
    pub code: String,

    /// Identifier of the booked listing.
    pub listing_id: Uuid,

    /// Identifier of the seeker who placed this booking.
    pub seeker_id: Uuid,

    /// Contact details of the person staying.
    pub guest: Guest,

    /// Date the stay starts on.
    pub check_in: Date,

    /// Period the stay duration is expressed in.
    pub period: String,

    /// Number of periods the stay lasts.
    pub duration: u16,

    /// Date the stay ends on.
    pub check_out: Date,

    /// Total price of the whole stay.
    pub total_price: String,

    /// Current status of this booking.
    pub status: String,

    /// Reason of the rejection or cancellation, if any.
    pub reason: Option<String>,

    /// RFC 3339 timestamp of the booking placement.
    pub created_at: String,

    /// RFC 3339 timestamp of the booking confirmation, if any.
    pub confirmed_at: Option<String>,

    /// RFC 3339 timestamp of the booking rejection or cancellation, if any.
    pub closed_at: Option<String>,
}

impl From<domain::Booking> for Booking {
    fn from(b: domain::Booking) -> Self {
        Self {
            id: b.id.into(),
            code: b.code.to_string(),
            listing_id: b.listing_id.into(),
            seeker_id: b.seeker_id.into(),
            guest: b.guest,
            check_in: b.check_in,
            period: b.period.to_string(),
            duration: b.duration.get(),
            check_out: b.check_out,
            total_price: b.total_price.to_string(),
            status: b.status.to_string(),
            reason: b.reason.map(|r| r.to_string()),
            created_at: b.created_at.to_rfc3339(),
            confirmed_at: b.confirmed_at.map(|at| at.to_rfc3339()),
            closed_at: b.closed_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// A page of [`Booking`]s.
#[derive(Debug, Serialize)]
pub struct Page {
    /// [`Booking`]s on this page.
    pub items: Vec<Booking>,

    /// Cursor of the last item on this page.
    pub end_cursor: Option<Uuid>,

    /// Indicator whether more items follow this page.
    pub has_next_page: bool,
}

/// Issued payment intent of a [`Booking`].
///
/// [`Booking`]: domain::Booking
#[derive(Debug, Serialize)]
pub struct Intent {
    /// Gateway-side order identifier of the payment.
    pub order_id: String,

    /// Opaque token unlocking the gateway-hosted payment page.
    pub token: String,

    /// URL the customer is redirected to for completing the payment.
    pub redirect_url: String,
}

/// Parses the provided closing `reason` input.
fn reason(input: String) -> Result<booking::Reason, Error> {
    booking::Reason::new(input)
        .ok_or_else(|| Error::invalid_input(&"invalid `reason`"))
}

/// `POST /bookings` handler.
pub async fn create(
    Extension(service): Extension<Service>,
    auth: Auth,
    Json(req): Json<CreateRequest>,
) -> Result<(http::StatusCode, Json<Booking>), Error> {
    let period = req
        .period
        .parse::<booking::Period>()
        .map_err(|e| Error::invalid_input(&e))?;
    let duration = booking::Duration::new(req.duration)
        .ok_or_else(|| Error::invalid_input(&"invalid `duration`"))?;

    let booking = service
        .execute(command::CreateBooking {
            listing_id: req.listing_id.into(),
            seeker_id: auth.user_id,
            guest: req.guest,
            check_in: req.check_in,
            period,
            duration,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((http::StatusCode::CREATED, Json(booking.into())))
}

/// Checks that the authenticated actor may inspect the provided [`Booking`].
///
/// Permitted for administrators, the seeker who placed it and the owner of
/// the booked listing; everyone else sees a 404.
///
/// [`Booking`]: domain::Booking
async fn authorize_view(
    service: &Service,
    auth: Auth,
    booking: &domain::Booking,
) -> Result<(), Error> {
    if auth.role == user::Role::Admin || booking.seeker_id == auth.user_id {
        return Ok(());
    }

    let owns = service
        .execute(query::listing::ById::by(booking.listing_id))
        .await
        .map_err(AsError::into_error)?
        .is_some_and(|l| l.owner_id == auth.user_id);
    if owns {
        Ok(())
    } else {
        Err(api::QueryError::NotFound.into())
    }
}

/// `GET /bookings/{id}` handler.
pub async fn get(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = service
        .execute(query::booking::ById::by(booking::Id::from(id)))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| Error::from(api::QueryError::NotFound))?;

    authorize_view(&service, auth, &booking).await?;

    Ok(Json(booking.into()))
}

/// `GET /bookings/{id}/payment` handler.
pub async fn payment_status(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<api::payment::Payment>, Error> {
    let booking = service
        .execute(query::booking::ById::by(booking::Id::from(id)))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| Error::from(api::QueryError::NotFound))?;

    authorize_view(&service, auth, &booking).await?;

    let payment = service
        .execute(query::payment::ByBookingId::by(booking.id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| Error::from(api::QueryError::NotFound))?;

    Ok(Json(payment.into()))
}

/// `GET /bookings` handler.
pub async fn list(
    Extension(service): Extension<Service>,
    auth: Auth,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, Error> {
    let arguments = pagination::Arguments::new(
        params.first,
        params.after.map(booking::Id::from),
        None,
        None,
        20_u32,
    )
    .ok_or(api::PaginationError::Ambiguous)?;

    let listing_id = params.listing_id.map(listing::Id::from);
    if let Some(listing_id) = listing_id {
        if auth.role != user::Role::Admin {
            let owns = service
                .execute(query::listing::ById::by(listing_id))
                .await
                .map_err(AsError::into_error)?
                .is_some_and(|l| l.owner_id == auth.user_id);
            if !owns {
                return Err(api::QueryError::NotFound.into());
            }
        }
    }

    let status = params
        .status
        .map(|s| {
            s.parse::<booking::Status>()
                .map_err(|e| Error::invalid_input(&e))
        })
        .transpose()?;
    let filter = read::booking::list::Filter {
        // Without an explicit (and verified) listing filter,
        // non-administrators only ever see bookings they placed themselves.
        seeker_id: (auth.role != user::Role::Admin && listing_id.is_none())
            .then_some(auth.user_id),
        listing_id,
        status,
    };

    let page = service
        .execute(query::bookings::List::by(read::booking::list::Selector {
            arguments,
            filter,
        }))
        .await
        .map_err(AsError::into_error)?;

    let info = page.page_info();
    let mut items = Vec::with_capacity(page.edges.len());
    for edge in page.edges {
        let Some(booking) = service
            .execute(query::booking::ById::by(edge.node))
            .await
            .map_err(AsError::into_error)?
        else {
            continue;
        };
        items.push(booking.into());
    }

    Ok(Json(Page {
        items,
        end_cursor: info.end_cursor.map(Into::into),
        has_next_page: info.has_next_page,
    }))
}

/// `POST /bookings/{id}/confirm` handler.
pub async fn confirm(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Booking>, Error> {
    let booking = service
        .execute(command::ConfirmBooking {
            booking_id: id.into(),
            actor_id: auth.user_id,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(booking.into()))
}

/// `POST /bookings/{id}/reject` handler.
pub async fn reject(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
    Json(req): Json<CloseRequest>,
) -> Result<Json<Booking>, Error> {
    let booking = service
        .execute(command::RejectBooking {
            booking_id: id.into(),
            actor_id: auth.user_id,
            reason: reason(req.reason)?,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(booking.into()))
}

/// `POST /bookings/{id}/cancel` handler.
pub async fn cancel(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
    Json(req): Json<CloseRequest>,
) -> Result<Json<Booking>, Error> {
    let booking = service
        .execute(command::CancelBooking {
            booking_id: id.into(),
            actor_id: auth.user_id,
            reason: reason(req.reason)?,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(booking.into()))
}

/// `POST /bookings/{id}/payment` handler.
pub async fn pay(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Intent>, Error> {
    let (payment, intent) = service
        .execute(command::CreatePaymentIntent {
            booking_id: id.into(),
            actor_id: auth.user_id,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(Intent {
        order_id: payment.order_id.to_string(),
        token: intent.token.to_string(),
        redirect_url: intent.redirect_url.to_string(),
    }))
}

impl AsError for command::create_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::CheckInPast(_) => Some(Error {
                code: "CHECK_IN_PAST",
                status_code: http::StatusCode::BAD_REQUEST,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::ListingNotApproved(_) => Some(Error {
                code: "LISTING_NOT_APPROVED",
                status_code: http::StatusCode::FORBIDDEN,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::ListingNotExists(_) => Some(Error {
                code: "LISTING_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::NoRoomsAvailable(_) => Some(Error {
                code: "NO_ROOMS_AVAILABLE",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::confirm_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::BookingNotExists(_) | Self::ListingNotExists(_) => {
                Some(Error {
                    code: "BOOKING_NOT_FOUND",
                    status_code: http::StatusCode::NOT_FOUND,
                    message: self.to_string(),
                    backtrace: None,
                })
            }
            Self::InvalidStatus(_) => Some(Error {
                code: "INVALID_STATUS",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::PaymentNotSettled(_) => Some(Error {
                code: "PAYMENT_NOT_SETTLED",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::UserNotOwner(_) => Some(Error {
                code: "NOT_OWNER",
                status_code: http::StatusCode::FORBIDDEN,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::reject_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::BookingNotExists(_) | Self::ListingNotExists(_) => {
                Some(Error {
                    code: "BOOKING_NOT_FOUND",
                    status_code: http::StatusCode::NOT_FOUND,
                    message: self.to_string(),
                    backtrace: None,
                })
            }
            Self::InvalidStatus(_) => Some(Error {
                code: "INVALID_STATUS",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::UserNotOwner(_) => Some(Error {
                code: "NOT_OWNER",
                status_code: http::StatusCode::FORBIDDEN,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::cancel_booking::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::BookingNotExists(_) => Some(Error {
                code: "BOOKING_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::InvalidStatus(_) => Some(Error {
                code: "INVALID_STATUS",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::StayAlreadyStarted(_) => Some(Error {
                code: "STAY_ALREADY_STARTED",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::UserNotSeeker(_) => Some(Error {
                code: "NOT_SEEKER",
                status_code: http::StatusCode::FORBIDDEN,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::create_payment_intent::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Gateway(_) => Some(Error {
                code: "GATEWAY_ERROR",
                status_code: http::StatusCode::BAD_GATEWAY,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::BookingNotExists(_) => Some(Error {
                code: "BOOKING_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::InvalidStatus(_) => Some(Error {
                code: "INVALID_STATUS",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::PaymentAlreadyResolved(_) => Some(Error {
                code: "PAYMENT_ALREADY_RESOLVED",
                status_code: http::StatusCode::CONFLICT,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::UserNotSeeker(_) => Some(Error {
                code: "NOT_SEEKER",
                status_code: http::StatusCode::FORBIDDEN,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}
