//! [`Command`] for applying a payment gateway notification.

use common::{
    operations::{By, Select, Update},
    DateTime,
};
use derive_more::{Display, Error, From};
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::{payment, Payment},
    infra::{database, gateway, Database},
    Service,
};

use super::Command;

/// [`Command`] for applying an asynchronous gateway [`Report`] to its
/// [`Payment`].
///
/// Gateways redeliver notifications and deliver them out of order, so the
/// [`Report`] is applied only when it advances the `Pending` status;
/// everything else is acknowledged without mutating anything. Reports failing
/// the signature check are discarded outright.
///
/// [`Report`]: gateway::Report
#[derive(Clone, Debug)]
pub struct ApplyPaymentNotification {
    /// Gateway [`Report`] to apply.
    ///
    /// [`Report`]: gateway::Report
    pub report: gateway::Report,
}

impl<Db, Gw> Command<ApplyPaymentNotification> for Service<Db, Gw>
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
{
    type Ok = Payment;
    type Err = Traced<ExecutionError>;

    async fn execute(
        &self,
        cmd: ApplyPaymentNotification,
    ) -> Result<Self::Ok, Self::Err> {
        use ExecutionError as E;

        let ApplyPaymentNotification { report } = cmd;

        if !report.verify_signature(&self.config().gateway.server_key) {
            log::warn!(
                "discarding gateway notification with an invalid signature \
                 for order `{}`",
                report.order_id,
            );
            return Err(tracerr::new!(E::InvalidSignature(report.order_id)));
        }

        let mut payment = self
            .database()
            .execute(Select(By::<Option<Payment>, _>::new(
                report.order_id.clone(),
            )))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?
            .ok_or(E::PaymentNotExists(report.order_id.clone()))
            .map_err(tracerr::wrap!())?;

        let next = report.transaction_status.into_payment_status();
        if !payment.status.advances_to(next) {
            // Duplicate or stale report: acknowledged, nothing to apply.
            return Ok(payment);
        }

        let method = report.payment_type;
        let settled_at = (next == payment::Status::Success)
            .then(|| DateTime::now().coerce());

        let advanced = self
            .database()
            .execute(Update(payment::Advance {
                order_id: payment.order_id.clone(),
                to: next,
                method: method.clone(),
                settled_at,
            }))
            .await
            .map_err(tracerr::map_from_and_wrap!(=> E))?;
        if advanced {
            payment.status = next;
            payment.method = method.or(payment.method);
            payment.settled_at = settled_at.or(payment.settled_at);
        }

        Ok(payment)
    }
}

/// Error of [`ApplyPaymentNotification`] [`Command`] execution.
#[derive(Debug, Display, Error, From)]
pub enum ExecutionError {
    /// [`Database`] error.
    #[display("`Database` operation failed: {_0}")]
    #[from]
    Db(database::Error),

    /// Notification signature does not match the merchant server key.
    #[display("invalid notification signature for order `{_0}`")]
    InvalidSignature(#[error(not(source))] payment::OrderId),

    /// No [`Payment`] matches the notified order.
    #[display("`Payment(order_id: {_0})` does not exist")]
    PaymentNotExists(#[error(not(source))] payment::OrderId),
}

#[cfg(test)]
mod spec {
    use std::sync::{Arc, Mutex};

    use common::{
        operations::{By, Select, Update},
        DateTime,
    };
    use futures::executor::block_on;
    use secrecy::SecretString;
    use tracerr::Traced;

    use crate::{
        domain::{booking, payment, Payment},
        infra::{database, gateway, Database},
        Service,
    };

    use super::{ApplyPaymentNotification, Command as _, ExecutionError};

    /// In-memory [`Database`] backing the assertions below.
    #[derive(Clone, Debug)]
    struct MockDb {
        payment: Arc<Mutex<Payment>>,
    }

    impl Database<Select<By<Option<Payment>, payment::OrderId>>> for MockDb {
        type Ok = Option<Payment>;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Select(by): Select<By<Option<Payment>, payment::OrderId>>,
        ) -> Result<Self::Ok, Self::Err> {
            let order_id = by.into_inner();
            let payment = self.payment.lock().unwrap().clone();
            Ok((payment.order_id == order_id).then_some(payment))
        }
    }

    impl Database<Update<payment::Advance>> for MockDb {
        type Ok = bool;
        type Err = Traced<database::Error>;

        async fn execute(
            &self,
            Update(advance): Update<payment::Advance>,
        ) -> Result<Self::Ok, Self::Err> {
            let mut payment = self.payment.lock().unwrap();
            Ok(if payment.order_id == advance.order_id
                && payment.status == payment::Status::Pending
            {
                payment.status = advance.to;
                payment.method = advance.method.or(payment.method.take());
                payment.settled_at =
                    advance.settled_at.or(payment.settled_at);
                true
            } else {
                false
            })
        }
    }

    fn pending_payment() -> Payment {
        let booking_id = booking::Id::new();
        Payment {
            id: payment::Id::new(),
            booking_id,
            order_id: payment::OrderId::derive(booking_id),
            status: payment::Status::Pending,
            method: None,
            created_at: DateTime::now().coerce(),
            settled_at: None,
        }
    }

    fn report(
        order_id: &payment::OrderId,
        status: gateway::TransactionStatus,
    ) -> gateway::Report {
        let status_code = "200".to_owned();
        let gross_amount = "2000000.00".to_owned();
        let signature_key = gateway::signature(
            order_id,
            &status_code,
            &gross_amount,
            &server_key(),
        );
        gateway::Report {
            order_id: order_id.clone(),
            transaction_status: status,
            status_code,
            gross_amount,
            payment_type: payment::Method::new("bank_transfer"),
            signature_key,
        }
    }

    fn server_key() -> SecretString {
        SecretString::from("server-key".to_owned())
    }

    #[test]
    fn settles_pending_payment_exactly_once() {
        let db = MockDb {
            payment: Arc::new(Mutex::new(pending_payment())),
        };
        let order_id = db.payment.lock().unwrap().order_id.clone();
        let service = Service::mock(db.clone());

        let settlement =
            report(&order_id, gateway::TransactionStatus::Settlement);

        let first = block_on(service.execute(ApplyPaymentNotification {
            report: settlement.clone(),
        }))
        .expect("applied");
        assert_eq!(first.status, payment::Status::Success);
        assert!(first.settled_at.is_some());

        // Redelivery acknowledges without touching anything.
        let settled_at = db.payment.lock().unwrap().settled_at;
        let second = block_on(service.execute(ApplyPaymentNotification {
            report: settlement,
        }))
        .expect("acknowledged");
        assert_eq!(second.status, payment::Status::Success);
        assert_eq!(db.payment.lock().unwrap().settled_at, settled_at);
    }

    #[test]
    fn stale_report_never_overwrites_terminal_status() {
        let db = MockDb {
            payment: Arc::new(Mutex::new(pending_payment())),
        };
        let order_id = db.payment.lock().unwrap().order_id.clone();
        let service = Service::mock(db.clone());

        _ = block_on(service.execute(ApplyPaymentNotification {
            report: report(
                &order_id,
                gateway::TransactionStatus::Settlement,
            ),
        }))
        .expect("applied");

        // A delayed `expire` report for the already-settled order.
        let stale = block_on(service.execute(ApplyPaymentNotification {
            report: report(&order_id, gateway::TransactionStatus::Expire),
        }))
        .expect("acknowledged");
        assert_eq!(stale.status, payment::Status::Success);
        assert_eq!(
            db.payment.lock().unwrap().status,
            payment::Status::Success,
        );
    }

    #[test]
    fn discards_forged_report() {
        let db = MockDb {
            payment: Arc::new(Mutex::new(pending_payment())),
        };
        let order_id = db.payment.lock().unwrap().order_id.clone();
        let service = Service::mock(db.clone());

        let mut forged =
            report(&order_id, gateway::TransactionStatus::Settlement);
        forged.signature_key = "deadbeef".to_owned();

        let err = block_on(
            service.execute(ApplyPaymentNotification { report: forged }),
        )
        .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::InvalidSignature(_)
        ));
        assert_eq!(
            db.payment.lock().unwrap().status,
            payment::Status::Pending,
        );
    }

    #[test]
    fn unknown_order_is_reported() {
        let db = MockDb {
            payment: Arc::new(Mutex::new(pending_payment())),
        };
        let service = Service::mock(db);

        let unknown = payment::OrderId::new("missing").unwrap();
        let err = block_on(service.execute(ApplyPaymentNotification {
            report: report(
                &unknown,
                gateway::TransactionStatus::Settlement,
            ),
        }))
        .unwrap_err();
        assert!(matches!(
            err.as_ref(),
            ExecutionError::PaymentNotExists(_)
        ));
    }
}
