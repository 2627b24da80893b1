//! [`Payment`]-related [`Database`] implementations.

use common::operations::{By, Insert, Select, Update};
use tokio_postgres::Row;
use tracerr::Traced;

use crate::{
    domain::{booking, payment, Payment},
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
};

/// Columns selected for a [`Payment`].
const COLUMNS: &str = "\
    id, booking_id, order_id, status, method, created_at, settled_at";

/// Builds a [`Payment`] out of the provided [`Row`].
fn from_row(row: &Row) -> Payment {
    Payment {
        id: row.get("id"),
        booking_id: row.get("booking_id"),
        order_id: row.get("order_id"),
        status: row.get("status"),
        method: row.get("method"),
        created_at: row.get("created_at"),
        settled_at: row.get("settled_at"),
    }
}

impl<C> Database<Select<By<Option<Payment>, payment::OrderId>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, payment::OrderId>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let order_id: payment::OrderId = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE order_id = $1::VARCHAR \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&order_id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| from_row(&row)))
    }
}

impl<C> Database<Select<By<Option<Payment>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Payment>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Payment>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let booking_id: booking::Id = by.into_inner();

        let sql = format!(
            "SELECT {COLUMNS} \
             FROM payments \
             WHERE booking_id = $1::UUID \
             LIMIT 1",
        );
        Ok(self
            .query_opt(&sql, &[&booking_id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| from_row(&row)))
    }
}

impl<C> Database<Insert<Payment>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(payment): Insert<Payment>,
    ) -> Result<Self::Ok, Self::Err> {
        let Payment {
            id,
            booking_id,
            order_id,
            status,
            method,
            created_at,
            settled_at,
        } = payment;

        const SQL: &str = "\
            INSERT INTO payments (\
                id, booking_id, order_id, status, method, \
                created_at, settled_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, $4::INT2, $5::VARCHAR, \
                $6::TIMESTAMPTZ, $7::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &booking_id,
                &order_id,
                &status,
                &method,
                &created_at,
                &settled_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<payment::Advance>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(advance): Update<payment::Advance>,
    ) -> Result<Self::Ok, Self::Err> {
        let payment::Advance {
            order_id,
            to,
            method,
            settled_at,
        } = advance;

        // Guarding on the current `Pending` status makes the advance a
        // compare-and-swap: reports racing on the same payment (webhook vs.
        // poll, or a redelivered webhook) resolve to a single winner.
        const SQL: &str = "\
            UPDATE payments \
            SET status = $2::INT2, \
                method = COALESCE($3::VARCHAR, method), \
                settled_at = COALESCE($4::TIMESTAMPTZ, settled_at) \
            WHERE order_id = $1::VARCHAR \
              AND status = $5::INT2";
        self.exec(
            SQL,
            &[&order_id, &to, &method, &settled_at, &payment::Status::Pending],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(|rows| rows > 0)
    }
}
