//! [`ProgressStays`] [`Task`].

use std::{convert::Infallible, error::Error, time};

use common::operations::{By, Perform, Start, Update};
use tokio::time::interval;
use tracerr::Traced;
use tracing as log;

use crate::{
    domain::booking,
    infra::{database, Database},
    Service,
};
#[cfg(doc)]
use crate::domain::Booking;

use super::Task;

/// Configuration for [`ProgressStays`] [`Task`].
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Interval between sweeps.
    pub interval: time::Duration,
}

/// [`Task`] moving [`Booking`]s along their stay as the calendar passes:
/// `Confirmed` ones into `CheckedIn` once the check-in date is reached, and
/// `CheckedIn` ones into `CheckedOut` once the check-out date is reached.
///
/// Both updates are guarded by the current status, so sweeps are idempotent.
#[derive(Clone, Copy, Debug)]
pub struct ProgressStays<S> {
    /// [`Config`] of this [`Task`].
    config: Config,

    /// [`Service`] instance.
    service: S,
}

impl<Db, Gw> Task<Start<By<ProgressStays<Self>, Config>>> for Service<Db, Gw>
where
    ProgressStays<Service<Db, Gw>>:
        Task<Perform<()>, Ok = (), Err: Error> + Send + Sync + 'static,
    Self: Clone,
{
    type Ok = ();
    type Err = Infallible;

    async fn execute(
        &self,
        Start(by): Start<By<ProgressStays<Self>, Config>>,
    ) -> Result<Self::Ok, Self::Err> {
        let config = by.into_inner();
        let task = ProgressStays {
            config,
            service: self.clone(),
        };

        let mut interval = interval(task.config.interval);
        loop {
            let _ = interval.tick().await;
            _ = task.execute(Perform(())).await.map_err(|e| {
                log::error!("`task::ProgressStays` failed: {e}");
            });
        }
    }
}

impl<Db, Gw> Task<Perform<()>> for ProgressStays<Service<Db, Gw>>
where
    Db: Database<
            Update<booking::CheckIns>,
            Ok = u64,
            Err = Traced<database::Error>,
        > + Database<
            Update<booking::CheckOuts>,
            Ok = u64,
            Err = Traced<database::Error>,
        >,
{
    type Ok = ();
    type Err = ExecutionError;

    async fn execute(&self, _: Perform<()>) -> Result<Self::Ok, Self::Err> {
        let checked_in = self
            .service
            .database()
            .execute(Update(booking::CheckIns))
            .await
            .map_err(tracerr::wrap!())?;
        if checked_in > 0 {
            log::info!("checked in {checked_in} booking(s)");
        }

        let checked_out = self
            .service
            .database()
            .execute(Update(booking::CheckOuts))
            .await
            .map_err(tracerr::wrap!())?;
        if checked_out > 0 {
            log::info!("checked out {checked_out} booking(s)");
        }

        Ok(())
    }
}

/// Error of [`ProgressStays`] execution.
pub type ExecutionError = Traced<database::Error>;
