//! [`Listing`]-related API definitions.
//!
//! [`Listing`]: domain::Listing

use axum::{
    extract::{Path, Query},
    Extension, Json,
};
use common::{pagination, Handler as _, Money};
use serde::{Deserialize, Serialize};
use service::{
    command,
    domain::{self, listing, user},
    query, read,
};
use uuid::Uuid;

use crate::{api, context::Auth, AsError, Error, Service};

/// Request of creating a new [`Listing`].
///
/// [`Listing`]: domain::Listing
#[derive(Debug, Deserialize)]
pub struct CreateRequest {
    /// Name of the listing.
    pub name: String,

    /// Full address of the listing.
    pub address: String,

    /// Explicit weekly rate, if any, in `{amount}{currency}` format.
    pub price_weekly: Option<String>,

    /// Monthly rate in `{amount}{currency}` format.
    pub price_monthly: String,

    /// Explicit yearly rate, if any, in `{amount}{currency}` format.
    pub price_yearly: Option<String>,

    /// Total number of rooms.
    pub total_rooms: u16,
}

/// Request of adjusting available rooms of a [`Listing`].
///
/// [`Listing`]: domain::Listing
#[derive(Debug, Deserialize)]
pub struct AdjustRequest {
    /// Signed number of rooms to adjust by.
    pub delta: i16,
}

/// Parameters of listing [`Listing`]s.
///
/// [`Listing`]: domain::Listing
#[derive(Debug, Deserialize)]
pub struct ListParams {
    /// Number of items to return.
    pub first: Option<u32>,

    /// Cursor to return items after.
    pub after: Option<Uuid>,

    /// Name (or its part) to fuzzy search for.
    pub name: Option<String>,
}

/// A listing.
#[derive(Debug, Serialize)]
pub struct Listing {
    /// Unique identifier of this listing.
    pub id: Uuid,

    /// Identifier of the owner of this listing.
    pub owner_id: Uuid,

    /// Name of this listing.
    pub name: String,

    /// Full address of this listing.
    pub address: String,

    /// Explicit weekly rate, if any.
    pub price_weekly: Option<String>,

    /// Monthly rate.
    pub price_monthly: String,

    /// Explicit yearly rate, if any.
    pub price_yearly: Option<String>,

    /// Total number of rooms.
    pub total_rooms: u16,

    /// Number of rooms still available for booking.
    pub available_rooms: u16,

    /// Indicator whether this listing was approved by an administrator.
    pub is_approved: bool,

    /// RFC 3339 timestamp of the listing creation.
    pub created_at: String,
}

impl From<domain::Listing> for Listing {
    fn from(l: domain::Listing) -> Self {
        Self {
            id: l.id.into(),
            owner_id: l.owner_id.into(),
            name: l.name.to_string(),
            address: l.address.to_string(),
            price_weekly: l.price_weekly.map(|m| m.to_string()),
            price_monthly: l.price_monthly.to_string(),
            price_yearly: l.price_yearly.map(|m| m.to_string()),
            total_rooms: l.total_rooms,
            available_rooms: l.available_rooms,
            is_approved: l.is_approved,
            created_at: l.created_at.to_rfc3339(),
        }
    }
}

/// A page of [`Listing`]s.
#[derive(Debug, Serialize)]
pub struct Page {
    /// [`Listing`]s on this page.
    pub items: Vec<Listing>,

    /// Cursor of the last item on this page.
    pub end_cursor: Option<Uuid>,

    /// Indicator whether more items follow this page.
    pub has_next_page: bool,
}

/// Parses the provided `money` input.
fn money(input: &str) -> Result<Money, Error> {
    input.parse().map_err(|e| Error::invalid_input(&e))
}

/// `POST /listings` handler.
pub async fn create(
    Extension(service): Extension<Service>,
    auth: Auth,
    Json(req): Json<CreateRequest>,
) -> Result<(http::StatusCode, Json<Listing>), Error> {
    let auth = auth.require(user::Role::Owner)?;

    let name = listing::Name::new(req.name)
        .ok_or_else(|| Error::invalid_input(&"invalid `name`"))?;
    let address = listing::Address::new(req.address)
        .ok_or_else(|| Error::invalid_input(&"invalid `address`"))?;
    let price_weekly = req.price_weekly.as_deref().map(money).transpose()?;
    let price_monthly = money(&req.price_monthly)?;
    let price_yearly = req.price_yearly.as_deref().map(money).transpose()?;

    let listing = service
        .execute(command::CreateListing {
            owner_id: auth.user_id,
            name,
            address,
            price_weekly,
            price_monthly,
            price_yearly,
            total_rooms: req.total_rooms,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok((http::StatusCode::CREATED, Json(listing.into())))
}

/// `POST /listings/{id}/approve` handler.
pub async fn approve(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, Error> {
    _ = auth.require(user::Role::Admin)?;

    let listing_id = listing::Id::from(id);
    service
        .execute(command::ApproveListing { listing_id })
        .await
        .map_err(AsError::into_error)?;

    let listing = service
        .execute(query::listing::ById::by(listing_id))
        .await
        .map_err(AsError::into_error)?
        .ok_or_else(|| Error::from(api::QueryError::NotFound))?;

    Ok(Json(listing.into()))
}

/// `PATCH /listings/{id}/rooms` handler.
pub async fn adjust(
    Extension(service): Extension<Service>,
    auth: Auth,
    Path(id): Path<Uuid>,
    Json(req): Json<AdjustRequest>,
) -> Result<Json<Listing>, Error> {
    let listing = service
        .execute(command::AdjustRooms {
            listing_id: id.into(),
            actor_id: auth.user_id,
            delta: req.delta,
        })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(listing.into()))
}

/// `GET /listings/{id}` handler.
pub async fn get(
    Extension(service): Extension<Service>,
    auth: Option<Auth>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, Error> {
    let listing = service
        .execute(query::listing::ById::by(listing::Id::from(id)))
        .await
        .map_err(AsError::into_error)?
        .filter(|l| {
            l.is_approved
                || auth.is_some_and(|a| {
                    a.role == user::Role::Admin || a.user_id == l.owner_id
                })
        })
        .ok_or_else(|| Error::from(api::QueryError::NotFound))?;

    Ok(Json(listing.into()))
}

/// `GET /listings` handler.
pub async fn list(
    Extension(service): Extension<Service>,
    auth: Option<Auth>,
    Query(params): Query<ListParams>,
) -> Result<Json<Page>, Error> {
    let arguments = pagination::Arguments::new(
        params.first,
        params.after.map(listing::Id::from),
        None,
        None,
        20_u32,
    )
    .ok_or(api::PaginationError::Ambiguous)?;

    let name = params
        .name
        .map(|n| n.parse().map_err(|e| Error::invalid_input(&e)))
        .transpose()?;
    let filter = read::listing::list::Filter {
        name,
        approved_only: !auth.is_some_and(|a| a.role == user::Role::Admin),
    };

    let page = service
        .execute(query::listings::List::by(read::listing::list::Selector {
            arguments,
            filter,
        }))
        .await
        .map_err(AsError::into_error)?;

    let info = page.page_info();
    let mut items = Vec::with_capacity(page.edges.len());
    for edge in page.edges {
        let Some(listing) = service
            .execute(query::listing::ById::by(edge.node))
            .await
            .map_err(AsError::into_error)?
        else {
            continue;
        };
        items.push(listing.into());
    }

    Ok(Json(Page {
        items,
        end_cursor: info.end_cursor.map(Into::into),
        has_next_page: info.has_next_page,
    }))
}

impl AsError for command::create_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::NoRooms => Some(Error {
                code: "NO_ROOMS",
                status_code: http::StatusCode::BAD_REQUEST,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::approve_listing::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => Some(Error {
                code: "LISTING_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::adjust_rooms::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::ListingNotExists(_) => Some(Error {
                code: "LISTING_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::RoomsOutOfBounds => Some(Error {
                code: "ROOMS_OUT_OF_BOUNDS",
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
