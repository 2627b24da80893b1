//! [`Booking`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Lock, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{
        booking::{self, Guest},
        payment, Booking,
    },
    infra::{
        database::{self, postgres::Connection, Postgres},
        Database,
    },
    read,
};

impl<C> Database<Select<By<Option<Booking>, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Booking>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Booking>, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, code, listing_id, seeker_id, \
                   guest_name, guest_email, guest_phone, \
                   check_in, period, duration, check_out, \
                   total_price, total_price_currency, \
                   status, reason, \
                   created_at, confirmed_at, closed_at \
            FROM bookings \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Booking {
                id: row.get("id"),
                code: row.get("code"),
                listing_id: row.get("listing_id"),
                seeker_id: row.get("seeker_id"),
                guest: Guest {
                    name: row.get("guest_name"),
                    email: row.get("guest_email"),
                    phone: row.get("guest_phone"),
                },
                check_in: row.get("check_in"),
                period: row.get("period"),
                duration: booking::Duration::new(
                    u16::try_from(row.get::<_, i32>("duration"))
                        .expect("`duration` overflow"),
                )
                .expect("`duration` out of bounds"),
                check_out: row.get("check_out"),
                total_price: Money {
                    amount: row.get("total_price"),
                    currency: row.get("total_price_currency"),
                },
                status: row.get("status"),
                reason: row.get("reason"),
                created_at: row.get("created_at"),
                confirmed_at: row.get("confirmed_at"),
                closed_at: row.get("closed_at"),
            }))
    }
}

impl<C> Database<Insert<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(booking): Insert<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            code,
            listing_id,
            seeker_id,
            guest: Guest { name, email, phone },
            check_in,
            period,
            duration,
            check_out,
            total_price,
            status,
            reason,
            created_at,
            confirmed_at,
            closed_at,
        } = booking;

        let duration = i32::from(duration.get());

        const SQL: &str = "\
            INSERT INTO bookings (\
                id, code, listing_id, seeker_id, \
                guest_name, guest_email, guest_phone, \
                check_in, period, duration, check_out, \
                total_price, total_price_currency, \
                status, reason, \
                created_at, confirmed_at, closed_at \
            ) VALUES (\
                $1::UUID, $2::VARCHAR, $3::UUID, $4::UUID, \
                $5::VARCHAR, $6::VARCHAR, $7::VARCHAR, \
                $8::DATE, $9::INT2, $10::INT4, $11::DATE, \
                $12::NUMERIC, $13::INT2, \
                $14::INT2, $15::VARCHAR, \
                $16::TIMESTAMPTZ, $17::TIMESTAMPTZ, $18::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &code,
                &listing_id,
                &seeker_id,
                &name,
                &email,
                &phone,
                &check_in,
                &period,
                &duration,
                &check_out,
                &total_price.amount,
                &total_price.currency,
                &status,
                &reason,
                &created_at,
                &confirmed_at,
                &closed_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<Booking>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(booking): Update<Booking>,
    ) -> Result<Self::Ok, Self::Err> {
        let Booking {
            id,
            status,
            reason,
            confirmed_at,
            closed_at,
            ..
        } = booking;

        // Everything besides the lifecycle fields is immutable once placed.
        const SQL: &str = "\
            UPDATE bookings \
            SET status = $2::INT2, \
                reason = $3::VARCHAR, \
                confirmed_at = $4::TIMESTAMPTZ, \
                closed_at = $5::TIMESTAMPTZ \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&id, &status, &reason, &confirmed_at, &closed_at])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Lock<By<Booking, booking::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Lock(by): Lock<By<Booking, booking::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: booking::Id = by.into_inner();

        const SQL: &str = "\
            INSERT INTO bookings_lock \
            VALUES ($1::UUID) \
            ON CONFLICT (id) DO NOTHING";
        self.query(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())
            .map(drop)
    }
}

impl<C> Database<Update<booking::CheckIns>> for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(_): Update<booking::CheckIns>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE bookings \
            SET status = $1::INT2 \
            WHERE status = $2::INT2 \
              AND check_in <= CURRENT_DATE";
        self.exec(
            SQL,
            &[&booking::Status::CheckedIn, &booking::Status::Confirmed],
        )
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Update<booking::CheckOuts>> for Postgres<C>
where
    C: Connection,
{
    type Ok = u64;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(_): Update<booking::CheckOuts>,
    ) -> Result<Self::Ok, Self::Err> {
        const SQL: &str = "\
            UPDATE bookings \
            SET status = $1::INT2 \
            WHERE status = $2::INT2 \
              AND check_out <= CURRENT_DATE";
        self.exec(
            SQL,
            &[&booking::Status::CheckedOut, &booking::Status::CheckedIn],
        )
        .await
        .map_err(tracerr::wrap!())
    }
}

impl<C> Database<Select<By<Vec<booking::Id>, booking::CreationDateTime>>>
    for Postgres<C>
where
    C: Connection,
{
    type Ok = Vec<booking::Id>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Vec<booking::Id>, booking::CreationDateTime>>,
    ) -> Result<Self::Ok, Self::Err> {
        let deadline: booking::CreationDateTime = by.into_inner();

        // Pending bookings placed before the deadline with no settled payment
        // behind them.
        const SQL: &str = "\
            SELECT b.id \
            FROM bookings b \
            WHERE b.status = $1::INT2 \
              AND b.created_at < $2::TIMESTAMPTZ \
              AND NOT EXISTS (\
                  SELECT 1 FROM payments p \
                  WHERE p.booking_id = b.id \
                    AND p.status = $3::INT2)";
        Ok(self
            .query(
                SQL,
                &[
                    &booking::Status::Pending,
                    &deadline,
                    &payment::Status::Success,
                ],
            )
            .await
            .map_err(tracerr::wrap!())?
            .into_iter()
            .map(|row| row.get("id"))
            .collect())
    }
}

impl<C>
    Database<
        Select<By<read::booking::list::Page, read::booking::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::booking::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::booking::list::Page, read::booking::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::booking::list::Selector {
            arguments,
            filter:
                read::booking::list::Filter {
                    seeker_id,
                    listing_id,
                    status,
                },
        } = by.into_inner();

        let limit = i32::try_from(arguments.limit()).unwrap() + 1;

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });
        let seeker_idx = seeker_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });
        let listing_idx = listing_id.as_ref().map(|id| {
            ps.push(id);
            ps.len()
        });
        let status_idx = status.as_ref().map(|s| {
            ps.push(s);
            ps.len()
        });

        let sql = format!(
            "SELECT id \
             FROM bookings \
             WHERE true \
                   {cursor} \
                   {seeker_filtering} \
                   {listing_filtering} \
                   {status_filtering} \
             ORDER BY id {order} \
             LIMIT $1::INT4",
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND id {op} ${idx}::UUID"))
            }),
            order = arguments.kind().order().sql(),
            seeker_filtering =
                seeker_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND seeker_id = ${idx}::UUID"))
                }),
            listing_filtering =
                listing_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND listing_id = ${idx}::UUID"))
                }),
            status_filtering =
                status_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!("AND status = ${idx}::INT2"))
                }),
        );
        let rows = self
            .query(&sql, ps.as_slice())
            .await
            .map_err(tracerr::wrap!())?;

        let has_more = rows.len() > arguments.limit();
        let edges = rows
            .into_iter()
            .take(arguments.limit())
            .map(|row| {
                let id = row.get("id");
                (id, id)
            })
            .collect::<Vec<_>>();

        Ok(read::booking::list::Page::new(&arguments, edges, has_more))
    }
}
