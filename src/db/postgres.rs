//! PostgreSQL-backed store for inputs, weekly history and snapshots

use super::store::StatsStore;
use crate::error::{StoreError, StoreResult};
use crate::models::geography::{GeographyKey, Granularity};
use crate::models::observation::{
    CountyReference, DeliveryReport, PriceObservation, Supplier, UserLocation,
};
use crate::models::stats::{CommunityMetrics, CurrentSnapshot, WeeklyStat};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls, Row, Statement};
use tracing::{error, info, warn};

type SqlParam<'a> = &'a (dyn ToSql + Sync);

/// Output tables and key columns of one granularity
struct TableLayout {
    weekly: &'static str,
    snapshot: &'static str,
    key_columns: &'static [&'static str],
    key_definitions: &'static str,
    lock_id: i64,
}

const ZIP3_LAYOUT: TableLayout = TableLayout {
    weekly: "zip3_price_weekly",
    snapshot: "zip3_price_snapshot",
    key_columns: &["zip_prefix"],
    key_definitions: "zip_prefix TEXT NOT NULL",
    lock_id: 0x5A49_5033,
};

const COUNTY_LAYOUT: TableLayout = TableLayout {
    weekly: "county_price_weekly",
    snapshot: "county_price_snapshot",
    key_columns: &["county_name", "state_code"],
    key_definitions: "county_name TEXT NOT NULL, state_code TEXT NOT NULL",
    lock_id: 0x434E_5459,
};

fn layout(granularity: Granularity) -> &'static TableLayout {
    match granularity {
        Granularity::ZipPrefix => &ZIP3_LAYOUT,
        Granularity::County => &COUNTY_LAYOUT,
    }
}

const WEEKLY_VALUE_COLUMNS: &[&str] = &[
    "fuel_type",
    "week_start",
    "median_price",
    "min_price",
    "max_price",
    "avg_price",
    "supplier_count",
    "observation_count",
    "last_observed_at",
    "computed_at",
];

const SNAPSHOT_VALUE_COLUMNS: &[&str] = &[
    "fuel_type",
    "week_start",
    "median_price",
    "min_price",
    "max_price",
    "avg_price",
    "supplier_count",
    "observation_count",
    "weeks_available",
    "percent_change_6w",
    "first_week_price",
    "latest_week_price",
    "data_quality_score",
    "user_count",
    "delivery_count",
    "show_user_count",
    "show_delivery_count",
    "last_computed_at",
];

/// `INSERT ... ON CONFLICT DO UPDATE` overwriting every non-key column
fn upsert_statement(
    table: &str,
    key_columns: &[&str],
    conflict_extra: &[&str],
    values: &[&str],
) -> String {
    let columns: Vec<&str> = key_columns.iter().chain(values).copied().collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("${}", i)).collect();
    let conflict: Vec<&str> = key_columns.iter().chain(conflict_extra).copied().collect();
    let updates: Vec<String> = values
        .iter()
        .filter(|c| !conflict.contains(*c))
        .map(|c| format!("{c} = EXCLUDED.{c}"))
        .collect();

    format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO UPDATE SET {}",
        table,
        columns.join(", "),
        placeholders.join(", "),
        conflict.join(", "),
        updates.join(", ")
    )
}

fn key_params(key: &GeographyKey) -> Vec<SqlParam<'_>> {
    match key {
        GeographyKey::ZipPrefix { prefix } => vec![prefix as SqlParam<'_>],
        GeographyKey::County { name, state } => vec![name as SqlParam<'_>, state],
    }
}

fn key_from_row(
    granularity: Granularity,
    row: &Row,
) -> Result<GeographyKey, tokio_postgres::Error> {
    Ok(match granularity {
        Granularity::ZipPrefix => {
            GeographyKey::zip_prefix(row.try_get::<_, String>("zip_prefix")?)
        }
        Granularity::County => GeographyKey::county(
            row.try_get::<_, String>("county_name")?,
            row.try_get::<_, String>("state_code")?,
        ),
    })
}

fn weekly_from_row(
    granularity: Granularity,
    row: &Row,
) -> Result<WeeklyStat, tokio_postgres::Error> {
    Ok(WeeklyStat {
        geography: key_from_row(granularity, row)?,
        fuel_type: row.try_get("fuel_type")?,
        week_start: row.try_get("week_start")?,
        median_price: row.try_get("median_price")?,
        min_price: row.try_get("min_price")?,
        max_price: row.try_get("max_price")?,
        avg_price: row.try_get("avg_price")?,
        supplier_count: row.try_get("supplier_count")?,
        observation_count: row.try_get("observation_count")?,
        last_observed_at: row.try_get("last_observed_at")?,
    })
}

/// Decode every row, tagging a failure with `context`
fn decode_rows<T, F>(rows: &[Row], context: &'static str, decode: F) -> StoreResult<Vec<T>>
where
    F: Fn(&Row) -> Result<T, tokio_postgres::Error>,
{
    rows.iter()
        .map(|row| decode(row).map_err(StoreError::query(context)))
        .collect()
}

fn is_open(slot: &Option<Client>) -> bool {
    slot.as_ref().is_some_and(|c| !c.is_closed())
}

async fn open_client(database_url: &str) -> StoreResult<Client> {
    let (client, connection) = tokio_postgres::connect(database_url, NoTls)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;

    // Spawn connection task
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!(error = %e, "PostgreSQL connection error");
        }
    });

    Ok(client)
}

/// PostgreSQL store. A closed connection is reopened on the next call, so a
/// dropped session costs one failed pass rather than the process.
pub struct PostgresStore {
    database_url: String,
    client: Arc<RwLock<Option<Client>>>,
    /// Run locks taken through this store. Advisory locks are reentrant
    /// within a session, so exclusivity inside the process is kept here.
    held_locks: Mutex<HashSet<Granularity>>,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let store = Self::disconnected(database_url);
        store.ensure_connected().await?;
        Ok(store)
    }

    /// A store that opens its connection on first use
    pub fn disconnected(database_url: &str) -> Self {
        Self {
            database_url: database_url.to_string(),
            client: Arc::new(RwLock::new(None)),
            held_locks: Mutex::new(HashSet::new()),
        }
    }

    async fn ensure_connected(&self) -> StoreResult<()> {
        if is_open(&*self.client.read().await) {
            return Ok(());
        }

        let mut guard = self.client.write().await;
        if is_open(&guard) {
            return Ok(());
        }
        let reconnecting = guard.take().is_some();

        let client = open_client(&self.database_url).await?;
        Self::init_schema(&client).await?;
        *guard = Some(client);

        if reconnecting {
            warn!("PostgresStore: connection was closed, reconnected");
        } else {
            info!("PostgresStore: connected");
        }
        Ok(())
    }

    /// Create the output tables. Input tables are owned upstream.
    async fn init_schema(c: &Client) -> StoreResult<()> {
        for granularity in Granularity::ALL {
            let l = layout(granularity);
            let keys = l.key_columns.join(", ");

            c.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        {},
                        fuel_type TEXT NOT NULL,
                        week_start DATE NOT NULL,
                        median_price DOUBLE PRECISION NOT NULL,
                        min_price DOUBLE PRECISION NOT NULL,
                        max_price DOUBLE PRECISION NOT NULL,
                        avg_price DOUBLE PRECISION,
                        supplier_count BIGINT NOT NULL,
                        observation_count BIGINT NOT NULL,
                        last_observed_at TIMESTAMPTZ NOT NULL,
                        computed_at TIMESTAMPTZ NOT NULL,
                        PRIMARY KEY ({}, fuel_type, week_start)
                    )",
                    l.weekly, l.key_definitions, keys
                ),
                &[],
            )
            .await
            .map_err(StoreError::query("Failed to create weekly table"))?;

            c.execute(
                &format!(
                    "CREATE TABLE IF NOT EXISTS {} (
                        {},
                        fuel_type TEXT NOT NULL,
                        week_start DATE NOT NULL,
                        median_price DOUBLE PRECISION NOT NULL,
                        min_price DOUBLE PRECISION NOT NULL,
                        max_price DOUBLE PRECISION NOT NULL,
                        avg_price DOUBLE PRECISION,
                        supplier_count BIGINT NOT NULL,
                        observation_count BIGINT NOT NULL,
                        weeks_available BIGINT NOT NULL,
                        percent_change_6w DOUBLE PRECISION,
                        first_week_price DOUBLE PRECISION,
                        latest_week_price DOUBLE PRECISION,
                        data_quality_score DOUBLE PRECISION NOT NULL,
                        user_count BIGINT NOT NULL,
                        delivery_count BIGINT NOT NULL,
                        show_user_count BOOLEAN NOT NULL,
                        show_delivery_count BOOLEAN NOT NULL,
                        last_computed_at TIMESTAMPTZ NOT NULL,
                        PRIMARY KEY ({}, fuel_type)
                    )",
                    l.snapshot, l.key_definitions, keys
                ),
                &[],
            )
            .await
            .map_err(StoreError::query("Failed to create snapshot table"))?;
        }

        Ok(())
    }

    async fn query(
        &self,
        sql: &str,
        params: &[SqlParam<'_>],
        context: &'static str,
    ) -> StoreResult<Vec<Row>> {
        self.ensure_connected().await?;
        let guard = self.client.read().await;
        let c = guard.as_ref().ok_or(StoreError::NotConnected)?;
        c.query(sql, params).await.map_err(StoreError::query(context))
    }
}

#[async_trait]
impl StatsStore for PostgresStore {
    async fn is_available(&self) -> bool {
        is_open(&*self.client.read().await)
    }

    async fn try_acquire_run_lock(&self, granularity: Granularity) -> StoreResult<bool> {
        let mut held = self.held_locks.lock().await;
        if held.contains(&granularity) {
            return Ok(false);
        }

        let lock_id = layout(granularity).lock_id;
        let rows = self
            .query(
                "SELECT pg_try_advisory_lock($1)",
                &[&lock_id],
                "Failed to acquire run lock",
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::InvalidData("advisory lock returned no row".to_string()))?;
        let acquired: bool = row
            .try_get(0)
            .map_err(StoreError::query("Failed to decode run lock result"))?;
        if acquired {
            held.insert(granularity);
        }
        Ok(acquired)
    }

    async fn release_run_lock(&self, granularity: Granularity) -> StoreResult<()> {
        self.held_locks.lock().await.remove(&granularity);
        let lock_id = layout(granularity).lock_id;
        self.query(
            "SELECT pg_advisory_unlock($1)",
            &[&lock_id],
            "Failed to release run lock",
        )
        .await?;
        Ok(())
    }

    async fn load_active_suppliers(&self) -> StoreResult<Vec<Supplier>> {
        let rows = self
            .query(
                "SELECT id, active, postal_codes_served
                 FROM suppliers
                 WHERE active = TRUE
                   AND postal_codes_served IS NOT NULL
                   AND cardinality(postal_codes_served) > 0",
                &[],
                "Failed to query suppliers",
            )
            .await?;

        decode_rows(&rows, "Failed to decode supplier", |row| {
            let postal_codes: Option<Vec<String>> = row.try_get(2)?;
            Ok(Supplier {
                id: row.try_get(0)?,
                active: row.try_get(1)?,
                postal_codes_served: postal_codes.unwrap_or_default(),
            })
        })
    }

    async fn load_county_reference(&self) -> StoreResult<Vec<CountyReference>> {
        let rows = self
            .query(
                "SELECT zip_code, county_name, state_code FROM zip_to_county",
                &[],
                "Failed to query zip_to_county",
            )
            .await?;

        decode_rows(&rows, "Failed to decode county reference", |row| {
            Ok(CountyReference {
                postal_code: row.try_get(0)?,
                county_name: row.try_get(1)?,
                state_code: row.try_get(2)?,
            })
        })
    }

    async fn load_price_observations(
        &self,
        since: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<PriceObservation>> {
        let rows = self
            .query(
                "SELECT supplier_id, price_per_gallon::float8, fuel_type, scraped_at, is_valid
                 FROM supplier_prices
                 WHERE is_valid = TRUE AND scraped_at >= $1 AND scraped_at < $2",
                &[&since, &until],
                "Failed to query price observations",
            )
            .await?;

        decode_rows(&rows, "Failed to decode price observation", |row| {
            Ok(PriceObservation {
                supplier_id: row.try_get(0)?,
                price_per_gallon: row.try_get(1)?,
                fuel_type: row.try_get(2)?,
                observed_at: row.try_get(3)?,
                is_valid: row.try_get(4)?,
            })
        })
    }

    async fn load_user_locations(&self) -> StoreResult<Vec<UserLocation>> {
        let rows = self
            .query(
                "SELECT user_id, zip_code FROM user_locations WHERE zip_code IS NOT NULL",
                &[],
                "Failed to query user locations",
            )
            .await?;

        decode_rows(&rows, "Failed to decode user location", |row| {
            Ok(UserLocation {
                user_id: row.try_get(0)?,
                postal_code: row.try_get(1)?,
            })
        })
    }

    async fn load_delivery_reports(&self) -> StoreResult<Vec<DeliveryReport>> {
        let rows = self
            .query(
                "SELECT id, zip_code, validated
                 FROM delivery_reports
                 WHERE validated = TRUE AND zip_code IS NOT NULL",
                &[],
                "Failed to query delivery reports",
            )
            .await?;

        decode_rows(&rows, "Failed to decode delivery report", |row| {
            Ok(DeliveryReport {
                id: row.try_get(0)?,
                postal_code: row.try_get(1)?,
                validated: row.try_get(2)?,
            })
        })
    }

    async fn upsert_weekly_stats(&self, stats: &[WeeklyStat]) -> StoreResult<usize> {
        self.ensure_connected().await?;
        let mut guard = self.client.write().await;
        let client = guard.as_mut().ok_or(StoreError::NotConnected)?;
        let tx = client
            .transaction()
            .await
            .map_err(StoreError::query("Failed to start weekly transaction"))?;

        let computed_at = Utc::now();
        let mut statements: HashMap<Granularity, Statement> = HashMap::new();

        for stat in stats {
            let granularity = stat.geography.granularity();
            let statement = match statements.get(&granularity) {
                Some(s) => s.clone(),
                None => {
                    let l = layout(granularity);
                    let sql = upsert_statement(
                        l.weekly,
                        l.key_columns,
                        &["fuel_type", "week_start"],
                        WEEKLY_VALUE_COLUMNS,
                    );
                    let s = tx
                        .prepare(&sql)
                        .await
                        .map_err(StoreError::query("Failed to prepare weekly upsert"))?;
                    statements.insert(granularity, s.clone());
                    s
                }
            };

            let mut params = key_params(&stat.geography);
            params.extend_from_slice(&[
                &stat.fuel_type as SqlParam<'_>,
                &stat.week_start,
                &stat.median_price,
                &stat.min_price,
                &stat.max_price,
                &stat.avg_price,
                &stat.supplier_count,
                &stat.observation_count,
                &stat.last_observed_at,
                &computed_at,
            ]);

            tx.execute(&statement, &params)
                .await
                .map_err(StoreError::query("Failed to upsert weekly stat"))?;
        }

        tx.commit()
            .await
            .map_err(StoreError::query("Failed to commit weekly stats"))?;

        Ok(stats.len())
    }

    async fn load_weekly_history(
        &self,
        geography: &GeographyKey,
        per_fuel_limit: usize,
    ) -> StoreResult<Vec<WeeklyStat>> {
        let granularity = geography.granularity();
        let l = layout(granularity);
        let filter: Vec<String> = l
            .key_columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{} = ${}", c, i + 1))
            .collect();
        let limit_placeholder = l.key_columns.len() + 1;

        let sql = format!(
            "SELECT * FROM (
                SELECT {}, fuel_type, week_start, median_price, min_price, max_price, avg_price,
                       supplier_count, observation_count, last_observed_at,
                       ROW_NUMBER() OVER (PARTITION BY fuel_type ORDER BY week_start DESC) AS rn
                FROM {}
                WHERE {}
             ) h
             WHERE rn <= ${}
             ORDER BY fuel_type, week_start DESC",
            l.key_columns.join(", "),
            l.weekly,
            filter.join(" AND "),
            limit_placeholder
        );

        let limit = per_fuel_limit as i64;
        let mut params = key_params(geography);
        params.push(&limit);

        let rows = self
            .query(&sql, &params, "Failed to query weekly history")
            .await?;

        decode_rows(&rows, "Failed to decode weekly row", |row| {
            weekly_from_row(granularity, row)
        })
    }

    async fn upsert_snapshot(&self, snapshot: &CurrentSnapshot) -> StoreResult<()> {
        let l = layout(snapshot.geography.granularity());
        let sql = upsert_statement(
            l.snapshot,
            l.key_columns,
            &["fuel_type"],
            SNAPSHOT_VALUE_COLUMNS,
        );
        let CommunityMetrics {
            user_count,
            delivery_count,
            show_user_count,
            show_delivery_count,
        } = snapshot.community;

        let mut params = key_params(&snapshot.geography);
        params.extend_from_slice(&[
            &snapshot.fuel_type as SqlParam<'_>,
            &snapshot.week_start,
            &snapshot.median_price,
            &snapshot.min_price,
            &snapshot.max_price,
            &snapshot.avg_price,
            &snapshot.supplier_count,
            &snapshot.observation_count,
            &snapshot.weeks_available,
            &snapshot.percent_change_6w,
            &snapshot.first_week_price,
            &snapshot.latest_week_price,
            &snapshot.data_quality_score,
            &user_count,
            &delivery_count,
            &show_user_count,
            &show_delivery_count,
            &snapshot.last_computed_at,
        ]);

        self.ensure_connected().await?;
        let guard = self.client.read().await;
        let c = guard.as_ref().ok_or(StoreError::NotConnected)?;
        c.execute(&sql, &params)
            .await
            .map_err(StoreError::query("Failed to upsert snapshot"))?;

        Ok(())
    }
}
