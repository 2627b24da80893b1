//! [`Command`] for polling a [`Payment`] status from the gateway.

use common::{
    operations::{By, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;

use crate::{
    domain::{payment, Payment},
    infra::{
        database,
        gateway::{self, FetchStatus},
        Database, Gateway,
    },
    Service,
};

use super::Command;

/// [`Command`] for synchronously rechecking a [`Payment`] status with the
/// gateway.
///
/// Fallback for a missed webhook notification. The fetched status funnels
/// through the same forward-progress rule as [`ApplyPaymentNotification`],
/// so the end result is identical no matter which path reports first.
///
/// [`ApplyPaymentNotification`]: super::ApplyPaymentNotification
#[derive(Clone, Debug)]
pub struct PollPaymentStatus {
    /// [`payment::OrderId`] of the [`Payment`] to recheck.
    pub order_id: payment::OrderId,
}

impl<Db, Gw> Command<PollPaymentStatus> for Service<Db, Gw>
where
    Db: Database<
            Select<By<Option<Payment>, payment::OrderId>>,
            Ok = Option<Payment>,
            Err = Traced<database::Error>,
        > + Database<
            Update<payment::Advance>,
            Ok = bool,
            Err = Traced<database::Error>,
        >,
    Gw: Gateway<
        FetchStatus,
        Ok = gateway::TransactionStatus,
        Err = Traced<gateway::Error>,
    >,
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: PollPaymentStatus,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let PollPaymentStatus { order_id } = cmd;

        let mut payment = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(order_id.clone())))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(order_id.clone()))
            .map_err(tracerr::wrap!())?;

        let reported = self
            .gateway()
            .execute(FetchStatus(order_id))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;

        let next = reported.into_payment_status();
        if !payment.status.advances_to(next) {
            return Ok(payment);
        }

        let settled_at = (next == payment::Status::Success)
            .then(|| DateTime::now().coerce());

        let advanced = self
            .database()
            .execute(Update(payment::Advance {
                order_id: payment.order_id.clone(),
                to: next,
                method: None,
                settled_at,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if advanced {
            payment.status = next;
            payment.settled_at = settled_at.or(payment.settled_at);
        }

        Ok(payment)
    }
}

/// Error of [`PollPaymentStatus`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Payment gateway error.
    #[display("`Gateway` operation failed: {_0}")]
    #[from]
    Gateway(gateway::Error),

    /// No [`Payment`] matches the provided order.
    #[display("`Payment(order_id: {_0})` does not exist")]
    PaymentNotExists(#[error(not(source))] payment::OrderId),
}
