//! Payment gateway integration.

use common::Money;
use derive_more::{AsRef, Debug, Display, Error as StdError, From, Into};
use secrecy::{ExposeSecret as _, SecretString};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha512};
use tracerr::Traced;

use crate::domain::{booking::guest, payment};
#[cfg(doc)]
use crate::domain::{Booking, Payment};

/// Payment gateway.
///
/// The gateway is an external collaborator: this service only ever creates
/// transactions through it and interprets what it reports back, either
/// asynchronously (webhook notification) or on demand (status fetch).
pub use common::Handler as Gateway;

/// Configuration of the payment [`Gateway`] integration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Merchant server key shared with the gateway.
    ///
    /// Authenticates webhook notifications via their signature.
    #[debug(skip)]
    pub server_key: SecretString,
}

/// Operation charging a new gateway transaction for a [`Booking`] payment.
#[derive(Clone, Debug)]
pub struct Charge {
    /// [`payment::OrderId`] identifying the transaction on the gateway side.
    pub order_id: payment::OrderId,

    /// Amount to charge.
    pub amount: Money,

    /// [`Customer`] the transaction is charged to.
    pub customer: Customer,
}

/// Customer details attached to a [`Charge`].
#[derive(Clone, Debug)]
pub struct Customer {
    /// Name of the customer.
    pub name: guest::Name,

    /// Email of the customer.
    pub email: guest::Email,

    /// Phone of the customer.
    pub phone: guest::Phone,
}

/// Payment intent minted by the [`Gateway`] for a [`Charge`].
#[derive(Clone, Debug)]
pub struct Intent {
    /// Opaque [`Token`] unlocking the gateway-hosted payment page.
    pub token: Token,

    /// URL the customer is redirected to for completing the payment.
    pub redirect_url: RedirectUrl,
}

/// Opaque token unlocking a gateway-hosted payment page.
#[derive(AsRef, Clone, Debug, Display, Eq, From, Into, PartialEq)]
#[as_ref(str, String)]
pub struct Token(String);

/// URL of a gateway-hosted payment page.
#[derive(AsRef, Clone, Debug, Display, Eq, From, Into, PartialEq)]
#[as_ref(str, String)]
pub struct RedirectUrl(String);

/// Operation fetching the gateway-side status of a transaction.
#[derive(Clone, Debug)]
pub struct FetchStatus(pub payment::OrderId);

/// Status of a transaction on the gateway side.
#[derive(
    Clone,
    Copy,
    Debug,
    Deserialize,
    Eq,
    PartialEq,
    Serialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TransactionStatus {
    /// Transaction is created and awaits the customer.
    Pending,

    /// Funds are captured (card flows).
    Capture,

    /// Funds are settled (non-card flows).
    Settlement,

    /// Transaction was denied by the gateway's fraud assessment.
    Deny,

    /// Transaction was cancelled.
    Cancel,

    /// Transaction expired before the customer completed it.
    Expire,

    /// Transaction failed on the gateway side.
    Failure,
}

impl TransactionStatus {
    /// Converts this [`TransactionStatus`] into the [`payment::Status`] it
    /// maps onto.
    #[must_use]
    pub fn into_payment_status(self) -> payment::Status {
        use payment::Status as S;

        match self {
            Self::Pending => S::Pending,
            Self::Capture | Self::Settlement => S::Success,
            Self::Deny => S::Denied,
            Self::Expire => S::Expired,
            Self::Cancel | Self::Failure => S::Failed,
        }
    }
}

/// Webhook notification delivered by the [`Gateway`].
#[derive(Clone, Debug, Deserialize)]
pub struct Report {
    /// [`payment::OrderId`] of the transaction this [`Report`] is about.
    pub order_id: payment::OrderId,

    /// Reported [`TransactionStatus`].
    pub transaction_status: TransactionStatus,

    /// Gateway-side status code of the transaction.
    pub status_code: String,

    /// Gross amount of the transaction, as formatted by the gateway.
    pub gross_amount: String,

    /// Payment method the transaction was made with, if reported.
    pub payment_type: Option<payment::Method>,

    /// Signature authenticating this [`Report`].
    pub signature_key: String,
}

impl Report {
    /// Verifies the [`signature_key`] of this [`Report`] against the merchant
    /// `server_key`.
    ///
    /// An unverified [`Report`] must be discarded without mutating anything.
    ///
    /// [`signature_key`]: Report::signature_key
    #[must_use]
    pub fn verify_signature(&self, server_key: &SecretString) -> bool {
        self.signature_key
            == signature(
                &self.order_id,
                &self.status_code,
                &self.gross_amount,
                server_key,
            )
    }
}

/// Computes the gateway signature of a transaction report.
///
/// SHA-512 over the concatenation of the order ID, the status code, the gross
/// amount and the merchant server key, hex-encoded.
#[must_use]
pub fn signature(
    order_id: &payment::OrderId,
    status_code: &str,
    gross_amount: &str,
    server_key: &SecretString,
) -> String {
    let order_id: &str = order_id.as_ref();

    let mut hasher = Sha512::new();
    hasher.update(order_id.as_bytes());
    hasher.update(status_code.as_bytes());
    hasher.update(gross_amount.as_bytes());
    hasher.update(server_key.expose_secret().as_bytes());
    hex::encode(hasher.finalize())
}

/// In-process [`Gateway`] stand-in.
///
/// Mints deterministic intents and reports every transaction as pending.
/// Backs local environments, where no real gateway is reachable.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sandbox;

impl Gateway<Charge> for Sandbox {
    type Ok = Intent;
    type Err = Traced<Error>;

    async fn execute(&self, charge: Charge) -> Result<Self::Ok, Self::Err> {
        let Charge { order_id, .. } = charge;

        let token = Token(format!("sandbox-{order_id}"));
        let redirect_url = RedirectUrl(format!(
            "https://app.sandbox.gateway.invalid/pay/{token}",
        ));

        Ok(Intent {
            token,
            redirect_url,
        })
    }
}

impl Gateway<FetchStatus> for Sandbox {
    type Ok = TransactionStatus;
    type Err = Traced<Error>;

    async fn execute(
        &self,
        FetchStatus(_): FetchStatus,
    ) -> Result<Self::Ok, Self::Err> {
        Ok(TransactionStatus::Pending)
    }
}

/// Error of interacting with the payment [`Gateway`].
#[derive(Clone, Debug, Display, StdError)]
pub enum Error {
    /// [`Gateway`] rejected the request.
    #[display("gateway rejected the request: {_0}")]
    Rejected(#[error(not(source))] String),
}

#[cfg(test)]
mod spec {
    use secrecy::SecretString;

    use crate::domain::payment::OrderId;

    use super::{signature, Report, TransactionStatus};

    fn server_key() -> SecretString {
        SecretString::from("SB-Mid-server-test".to_owned())
    }

    fn report(signature_key: String) -> Report {
        Report {
            order_id: OrderId::new("a1b2c3").unwrap(),
            transaction_status: TransactionStatus::Settlement,
            status_code: "200".into(),
            gross_amount: "2000000.00".into(),
            payment_type: None,
            signature_key,
        }
    }

    #[test]
    fn accepts_valid_signature() {
        let sig = signature(
            &OrderId::new("a1b2c3").unwrap(),
            "200",
            "2000000.00",
            &server_key(),
        );
        assert!(report(sig).verify_signature(&server_key()));
    }

    #[test]
    fn rejects_forged_signature() {
        assert!(!report("deadbeef".into()).verify_signature(&server_key()));

        let other_key = SecretString::from("SB-Mid-server-other".to_owned());
        let sig = signature(
            &OrderId::new("a1b2c3").unwrap(),
            "200",
            "2000000.00",
            &other_key,
        );
        assert!(!report(sig).verify_signature(&server_key()));
    }

    #[test]
    fn maps_transaction_statuses() {
        use crate::domain::payment::Status as S;
        use TransactionStatus as T;

        assert_eq!(T::Pending.into_payment_status(), S::Pending);
        assert_eq!(T::Capture.into_payment_status(), S::Success);
        assert_eq!(T::Settlement.into_payment_status(), S::Success);
        assert_eq!(T::Deny.into_payment_status(), S::Denied);
        assert_eq!(T::Expire.into_payment_status(), S::Expired);
        assert_eq!(T::Cancel.into_payment_status(), S::Failed);
        assert_eq!(T::Failure.into_payment_status(), S::Failed);
    }
}
