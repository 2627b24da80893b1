//! [`Listing`]-related [`Database`] implementations.

use common::{
    operations::{By, Insert, Select, Update},
    Money,
};
use itertools::Itertools as _;
use postgres_types::ToSql;
use tracerr::Traced;

use crate::{
    domain::{listing, Listing},
    infra::{
        database::{
            self,
            postgres::{Connection, FuzzPattern},
            Postgres,
        },
        Database,
    },
    read,
};

impl<C> Database<Select<By<Option<Listing>, listing::Id>>> for Postgres<C>
where
    C: Connection,
{
    type Ok = Option<Listing>;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<By<Option<Listing>, listing::Id>>,
    ) -> Result<Self::Ok, Self::Err> {
        // Avoid subtle change for SQL.
        let id: listing::Id = by.into_inner();

        const SQL: &str = "\
            SELECT id, owner_id, name, address, \
                   price_weekly, price_weekly_currency, \
                   price_monthly, price_monthly_currency, \
                   price_yearly, price_yearly_currency, \
                   total_rooms, available_rooms, \
                   is_approved, created_at \
            FROM listings \
            WHERE id = $1::UUID \
            LIMIT 1";
        Ok(self
            .query_opt(SQL, &[&id])
            .await
            .map_err(tracerr::wrap!())?
            .map(|row| Listing {
                id: row.get("id"),
                owner_id: row.get("owner_id"),
                name: row.get("name"),
                address: row.get("address"),
                price_weekly: row.get::<_, Option<_>>("price_weekly").map(
                    |amount| Money {
                        amount,
                        currency: row.get("price_weekly_currency"),
                    },
                ),
                price_monthly: Money {
                    amount: row.get("price_monthly"),
                    currency: row.get("price_monthly_currency"),
                },
                price_yearly: row.get::<_, Option<_>>("price_yearly").map(
                    |amount| Money {
                        amount,
                        currency: row.get("price_yearly_currency"),
                    },
                ),
                total_rooms: u16::try_from(row.get::<_, i32>("total_rooms"))
                    .expect("`total_rooms` overflow"),
                available_rooms: u16::try_from(
                    row.get::<_, i32>("available_rooms"),
                )
                .expect("`available_rooms` overflow"),
                is_approved: row.get("is_approved"),
                created_at: row.get("created_at"),
            }))
    }
}

impl<C> Database<Insert<Listing>> for Postgres<C>
where
    C: Connection,
{
    type Ok = ();
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Insert(listing): Insert<Listing>,
    ) -> Result<Self::Ok, Self::Err> {
        let Listing {
            id,
            owner_id,
            name,
            address,
            price_weekly,
            price_monthly,
            price_yearly,
            total_rooms,
            available_rooms,
            is_approved,
            created_at,
        } = listing;

        let total_rooms = i32::from(total_rooms);
        let available_rooms = i32::from(available_rooms);
        let price_weekly_amount = price_weekly.map(|m| m.amount);
        let price_weekly_currency = price_weekly.map(|m| m.currency);
        let price_yearly_amount = price_yearly.map(|m| m.amount);
        let price_yearly_currency = price_yearly.map(|m| m.currency);

        const SQL: &str = "\
            INSERT INTO listings (\
                id, owner_id, name, address, \
                price_weekly, price_weekly_currency, \
                price_monthly, price_monthly_currency, \
                price_yearly, price_yearly_currency, \
                total_rooms, available_rooms, \
                is_approved, created_at \
            ) VALUES (\
                $1::UUID, $2::UUID, $3::VARCHAR, $4::VARCHAR, \
                $5::NUMERIC, $6::INT2, \
                $7::NUMERIC, $8::INT2, \
                $9::NUMERIC, $10::INT2, \
                $11::INT4, $12::INT4, \
                $13::BOOL, $14::TIMESTAMPTZ \
            )";
        self.exec(
            SQL,
            &[
                &id,
                &owner_id,
                &name,
                &address,
                &price_weekly_amount,
                &price_weekly_currency,
                &price_monthly.amount,
                &price_monthly.currency,
                &price_yearly_amount,
                &price_yearly_currency,
                &total_rooms,
                &available_rooms,
                &is_approved,
                &created_at,
            ],
        )
        .await
        .map_err(tracerr::wrap!())
        .map(drop)
    }
}

impl<C> Database<Update<listing::Approve>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(approve): Update<listing::Approve>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing::Approve { listing_id } = approve;

        const SQL: &str = "\
            UPDATE listings \
            SET is_approved = TRUE \
            WHERE id = $1::UUID";
        self.exec(SQL, &[&listing_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows > 0)
    }
}

impl<C> Database<Update<listing::Claim>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(claim): Update<listing::Claim>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing::Claim { listing_id } = claim;

        // The `available_rooms > 0` predicate makes the decrement atomic:
        // out of the claims racing for the last room only one affects a row.
        const SQL: &str = "\
            UPDATE listings \
            SET available_rooms = available_rooms - 1 \
            WHERE id = $1::UUID \
              AND available_rooms > 0";
        self.exec(SQL, &[&listing_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows > 0)
    }
}

impl<C> Database<Update<listing::Release>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(release): Update<listing::Release>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing::Release { listing_id } = release;

        // The `available_rooms < total_rooms` predicate caps the increment at
        // capacity: a release of a room that was never claimed affects zero
        // rows instead of inflating the counter.
        const SQL: &str = "\
            UPDATE listings \
            SET available_rooms = available_rooms + 1 \
            WHERE id = $1::UUID \
              AND available_rooms < total_rooms";
        self.exec(SQL, &[&listing_id])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows > 0)
    }
}

impl<C> Database<Update<listing::Adjust>> for Postgres<C>
where
    C: Connection,
{
    type Ok = bool;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Update(adjust): Update<listing::Adjust>,
    ) -> Result<Self::Ok, Self::Err> {
        let listing::Adjust { listing_id, delta } = adjust;

        let delta = i32::from(delta);

        const SQL: &str = "\
            UPDATE listings \
            SET available_rooms = available_rooms + $2::INT4 \
            WHERE id = $1::UUID \
              AND available_rooms + $2::INT4 BETWEEN 0 AND total_rooms";
        self.exec(SQL, &[&listing_id, &delta])
            .await
            .map_err(tracerr::wrap!())
            .map(|rows| rows > 0)
    }
}

impl<C>
    Database<
        Select<By<read::listing::list::Page, read::listing::list::Selector>>,
    > for Postgres<C>
where
    C: Connection,
{
    type Ok = read::listing::list::Page;
    type Err = Traced<database::Error>;

    async fn execute(
        &self,
        Select(by): Select<
            By<read::listing::list::Page, read::listing::list::Selector>,
        >,
    ) -> Result<Self::Ok, Self::Err> {
        let read::listing::list::Selector {
            arguments,
            filter:
                read::listing::list::Filter {
                    name,
                    approved_only,
                },
        } = by.into_inner();

        let limit = i32::try_from(arguments.limit()).unwrap() + 1;

        let mut ps: Vec<&(dyn ToSql + Sync)> = vec![&limit];

        let cursor_idx = arguments.cursor().map(|c| {
            ps.push(c);
            ps.len()
        });

        let name_pattern = name.as_ref().map(|n| FuzzPattern::new(n.as_ref()));
        let name_pattern_idx = name_pattern.as_ref().map(|n| {
            ps.push(n);
            ps.len()
        });

        let sql = format!(
            "SELECT id \
             FROM listings \
             WHERE true \
                   {approval_filtering} \
                   {cursor} \
                   {name_filtering} \
             ORDER BY id {order} \
             LIMIT $1::INT4",
            approval_filtering =
                if approved_only { "AND is_approved" } else { "" },
            cursor = cursor_idx.into_iter().format_with("", |idx, f| {
                let op = arguments.kind().operator();
                f(&format_args!("AND id {op} ${idx}::UUID"))
            }),
            order = arguments.kind().order().sql(),
            name_filtering =
                name_pattern_idx.into_iter().format_with("", |idx, f| {
                    f(&format_args!(
                        "AND LOWER(name) SIMILAR TO LOWER(${idx}::VARCHAR)"
                    ))
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

        Ok(read::listing::list::Page::new(&arguments, edges, has_more))
    }
}
