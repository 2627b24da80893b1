//! [`Payment`]-related API definitions.
//!
//! [`Payment`]: domain::Payment

use axum::{extract::Path, Extension, Json};
use common::Handler as _;
use serde::Serialize;
use service::{
    command,
    domain::{self, payment},
    infra::gateway,
};

use crate::{context::Auth, AsError, Error, Service};

/// A payment.
#[derive(Debug, Serialize)]
pub struct Payment {
    /// Unique identifier of this payment.
    pub id: uuid::Uuid,

    /// Identifier of the booking this payment settles.
    pub booking_id: uuid::Uuid,

    /// Gateway-side order identifier of this payment.
    pub order_id: String,

    /// Current status of this payment.
    pub status: String,

    /// Method this payment was made with, if reported.
    pub method: Option<String>,

    /// RFC 3339 timestamp of the payment initiation.
    pub created_at: String,

    /// RFC 3339 timestamp of the gateway-side settlement, if any.
    pub settled_at: Option<String>,
}

impl From<domain::Payment> for Payment {
    fn from(p: domain::Payment) -> Self {
        Self {
            id: p.id.into(),
            booking_id: p.booking_id.into(),
            order_id: p.order_id.to_string(),
            status: p.status.to_string(),
            method: p.method.map(|m| m.to_string()),
            created_at: p.created_at.to_rfc3339(),
            settled_at: p.settled_at.map(|at| at.to_rfc3339()),
        }
    }
}

/// `POST /payments/notifications` handler.
///
/// The gateway webhook endpoint: unauthenticated, but every notification is
/// authenticated by its signature before anything is applied.
pub async fn notification(
    Extension(service): Extension<Service>,
    Json(report): Json<gateway::Report>,
) -> Result<Json<Payment>, Error> {
    let payment = service
        .execute(command::ApplyPaymentNotification { report })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(payment.into()))
}

/// `GET /payments/{order_id}` handler.
pub async fn poll(
    Extension(service): Extension<Service>,
    _: Auth,
    Path(order_id): Path<String>,
) -> Result<Json<Payment>, Error> {
    let order_id = payment::OrderId::new(order_id)
        .ok_or_else(|| Error::invalid_input(&"invalid `order_id`"))?;

    let payment = service
        .execute(command::PollPaymentStatus { order_id })
        .await
        .map_err(AsError::into_error)?;

    Ok(Json(payment.into()))
}

impl AsError for command::apply_payment_notification::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::InvalidSignature(_) => Some(Error {
                code: "INVALID_SIGNATURE",
                status_code: http::StatusCode::FORBIDDEN,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::PaymentNotExists(_) => Some(Error {
                code: "PAYMENT_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}

impl AsError for command::poll_payment_status::ExecutionError {
    fn try_as_error(&self) -> Option<Error> {
        match self {
            Self::Db(e) => e.try_as_error(),
            Self::Gateway(_) => Some(Error {
                code: "GATEWAY_ERROR",
                status_code: http::StatusCode::BAD_GATEWAY,
                message: self.to_string(),
                backtrace: None,
            }),
            Self::PaymentNotExists(_) => Some(Error {
                code: "PAYMENT_NOT_FOUND",
                status_code: http::StatusCode::NOT_FOUND,
                message: self.to_string(),
                backtrace: None,
            }),
        }
    }
}
