//! Infrastructure layer.

pub mod database;
pub mod gateway;
pub mod notify;

pub use self::{
    database::Database,
    gateway::Gateway,
    notify::{Notice, Notifier},
};
#[cfg(feature = "postgres")]
pub use self::database::{postgres, Postgres};
