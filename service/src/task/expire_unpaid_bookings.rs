//! [`ExpireUnpaidBookings`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Select, Start};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    command,
    domain::{booking, Booking},
    infra::{database, Database},
    Service,
};

use super::Task;

/// Configuration for [`ExpireUnpaidBookings`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between sweeps.
    pub interval: time::Duration,

    /// Timeout after which a `Pending` [`Booking`] without a settled payment
    /// is cancelled.
    pub timeout: time::Duration,
}

/// [`Task`] sweeping `Pending` [`Booking`]s whose payment never settled
/// within the configured timeout.
///
/// Each sweep re-applies [`command::ExpireUnpaidBooking`], which is
/// idempotent, so overlapping sweeps and already-expired [`Booking`]s are
/// harmless.
#[derive(Clone, Copy, Debug)]
pub struct ExpireUnpaidBookings<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Gw> Task<Start<By<ExpireUnpaidBookings<Self>, Config>>>
    for Service<Db, Gw>
where
    ExpireUnpaidBookings<Service<Db, Gw>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ExpireUnpaidBookings<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ExpireUnpaidBookings {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::ExpireUnpaidBookings` failed: {e}");
            });
        }
    }
}

impl<Db, Gw> Task<Perform<()>> for ExpireUnpaidBookings<Service<Db, Gw>>
where
    Db: Database<
        Select<By<Vec<booking::Id>, booking::CreationDateTime>>,
        Ok = Vec<booking::Id>,
        Err = Traced<database::Error>,
    >,
    Service<Db, Gw>: command::Command<
        command::ExpireUnpaidBooking,
        Ok = Booking,
        Err = Traced<command::expire_unpaid_booking::ExecutionError>,
    >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let deadline = booking::CreationDateTime::now() - self.config.timeout;
        let ids = self
            .service
            .database()
            .execute(Select(By::new(deadline)))
            .await
            .map_err(tracerr::wrap!())?;

        for booking_id in ids {
            // A failure on one booking must not starve the rest of the
            // sweep.
            _ = self
                .service
                .execute(command::ExpireUnpaidBooking { booking_id })
                .await
                .map_err(|e| {
                    log::error!(
                        "failed to expire `Booking(id: {booking_id})`: {e}",
                    );
                });
        }

        Ok(())
    }
}

/// Error of [`ExpireUnpaidBookings`] execution.
pub type ExecutionError = Traced<database::Error>;
