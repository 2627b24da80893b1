//! Service contains the business logic of the application.
//!
//! List of available Cargo features:
#![doc = document_features::document_features!()]
#![deny(
    nonstandard_style,
    rust_2018_idioms,
    rustdoc::all,
    trivial_casts,
    trivial_numeric_casts,
    unsafe_code
)]
#![forbid(non_ascii_idents)]
#![warn(
    clippy::allow_attributes,
    clippy::allow_attributes_without_reason,
    clippy::pedantic,
    clippy::wildcard_enum_match_arm,
    deprecated_in_future,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unreachable_pub,
    unused_crate_dependencies,
    unused_import_braces,
    unused_labels,
    unused_lifetimes,
    unused_qualifications,
    unused_results
)]

pub mod command;
pub mod domain;
pub mod infra;
pub mod query;
pub mod read;
pub mod task;

use std::sync::Arc;

use common::operations::{By, Start};
use derive_more::{Debug, Error};

use crate::infra::{gateway, Notifier};
#[cfg(doc)]
use crate::infra::Database;

pub use self::{command::Command, query::Query, task::Task};

/// [`Service`] configuration.
#[derive(Clone, Debug)]
pub struct Config {
    /// Payment [`gateway`] configuration.
    pub gateway: gateway::Config,

    /// [`task::ExpireUnpaidBookings`] configuration.
    pub expire_unpaid_bookings: task::expire_unpaid_bookings::Config,

    /// [`task::ProgressStays`] configuration.
    pub progress_stays: task::progress_stays::Config,
}

/// Domain service.
#[derive(Clone, Debug)]
pub struct Service<Db, Gw = gateway::Sandbox> {
    /// Configuration of this [`Service`].
    config: Config,

    /// [`Database`] of this [`Service`].
    database: Db,

    /// Payment [`gateway::Gateway`] of this [`Service`].
    gateway: Gw,

    /// [`Notifier`] of this [`Service`].
    notifier: Arc<dyn Notifier>,
}

impl<Db, Gw> Service<Db, Gw> {
    /// Creates a new [`Service`] with the provided parameters.
    pub fn new(
        config: Config,
        database: Db,
        gateway: Gw,
        notifier: Arc<dyn Notifier>,
    ) -> (Self, task::Background)
    where
        Self: Task<
                Start<
                    By<
                        task::ExpireUnpaidBookings<Self>,
                        task::expire_unpaid_bookings::Config,
                    >,
                >,
                Ok = (),
                Err: Error,
            > + Task<
                Start<
                    By<task::ProgressStays<Self>, task::progress_stays::Config>,
                >,
                Ok = (),
                Err: Error,
            > + Clone
            + 'static,
    {
        let this = Service {
            config,
            database,
            gateway,
            notifier,
        };

        let mut bg = task::Background::default();
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().expire_unpaid_bookings)))
                .await
        });
        let svc = this.clone();
        bg.spawn(async move {
            svc.execute(Start(By::new(svc.config().progress_stays))).await
        });

        (this, bg)
    }

    /// Returns [`Config`] of this [`Service`].
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns [`Database`] of this [`Service`].
    #[must_use]
    pub fn database(&self) -> &Db {
        &self.database
    }

    /// Returns the payment [`gateway::Gateway`] of this [`Service`].
    #[must_use]
    pub fn gateway(&self) -> &Gw {
        &self.gateway
    }

    /// Returns the [`Notifier`] of this [`Service`].
    #[must_use]
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }
}

#[cfg(test)]
impl<Db> Service<Db> {
    /// Creates a new [`Service`] over the provided [`Database`] only, without
    /// starting any background [`Task`]s.
    pub(crate) fn mock(database: Db) -> Self {
        Self {
            config: Config {
                gateway: gateway::Config {
                    server_key: secrecy::SecretString::from(
                        "server-key".to_owned(),
                    ),
                },
                expire_unpaid_bookings: task::expire_unpaid_bookings::Config {
                    interval: std::time::Duration::from_secs(60 * 60),
                    timeout: std::time::Duration::from_secs(60 * 60 * 24),
                },
                progress_stays: task::progress_stays::Config {
                    interval: std::time::Duration::from_secs(60 * 10),
                },
            },
            database,
            gateway: gateway::Sandbox,
            notifier: Arc::new(infra::notify::Tracing),
        }
    }
}
