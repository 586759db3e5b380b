//! `SQLite` implementation of [`PropertyStore`].

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row, SqlitePool};

use propbus_app::ports::PropertyStore;
use propbus_domain::error::BusError;
use propbus_domain::record::PropertyRecord;
use propbus_domain::request::RequestItem;

use crate::error::StorageError;

/// Wrapper for converting database rows into records without polluting
/// domain structs with database concerns.
struct Wrapper(PropertyRecord);

impl<'r> FromRow<'r, SqliteRow> for Wrapper {
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let device: String = row.try_get("device")?;
        let property: String = row.try_get("name")?;
        let items_json: String = row.try_get("items")?;
        let saved_at_str: String = row.try_get("saved_at")?;

        let items: Vec<RequestItem> = serde_json::from_str(&items_json)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;
        let saved_at = chrono::DateTime::parse_from_rfc3339(&saved_at_str)
            .map_err(|err| sqlx::Error::Decode(Box::new(err)))?
            .to_utc();

        Ok(Self(PropertyRecord {
            device,
            property,
            items,
            saved_at,
        }))
    }
}

const UPSERT: &str = r"
    INSERT INTO properties (device, name, items, saved_at)
    VALUES (?, ?, ?, ?)
    ON CONFLICT (device, name) DO UPDATE SET items = excluded.items, saved_at = excluded.saved_at
";

const SELECT_ONE: &str = "SELECT * FROM properties WHERE device = ? AND name = ?";
const EXISTS: &str = "SELECT COUNT(*) FROM properties WHERE device = ? AND name = ?";

/// `SQLite`-backed property store.
pub struct SqlitePropertyStore {
    pool: SqlitePool,
}

impl SqlitePropertyStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PropertyStore for SqlitePropertyStore {
    async fn save(&self, record: PropertyRecord) -> Result<(), BusError> {
        let items_json = serde_json::to_string(&record.items).map_err(StorageError::from)?;

        sqlx::query(UPSERT)
            .bind(&record.device)
            .bind(&record.property)
            .bind(&items_json)
            .bind(record.saved_at.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(StorageError::from)?;

        tracing::trace!(device = %record.device, property = %record.property, "record stored");
        Ok(())
    }

    async fn load(
        &self,
        device: &str,
        property: &str,
    ) -> Result<Option<PropertyRecord>, BusError> {
        let row: Option<Wrapper> = sqlx::query_as(SELECT_ONE)
            .bind(device)
            .bind(property)
            .fetch_optional(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(row.map(|w| w.0))
    }

    async fn exists(&self, device: &str, property: &str) -> Result<bool, BusError> {
        let (count,): (i64,) = sqlx::query_as(EXISTS)
            .bind(device)
            .bind(property)
            .fetch_one(&self.pool)
            .await
            .map_err(StorageError::from)?;

        Ok(count > 0)
    }
}
