use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgRow};
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    AggregateId, EventEnvelope, EventId, EventStoreError, Position, Result, Snapshot, Version,
    store::{EventStore, SnapshotStore, validate_envelope_for_append},
};

const SCHEMA: &str = include_str!("../../../migrations/001_create_events_table.sql");

/// PostgreSQL-backed event store implementation.
///
/// The tables are created on first use; the schema script is idempotent.
#[derive(Clone)]
pub struct PostgresEventStore {
    pool: PgPool,
    schema: Arc<OnceCell<()>>,
}

impl PostgresEventStore {
    /// Creates a new PostgreSQL event store.
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            schema: Arc::new(OnceCell::new()),
        }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Creates the events and snapshots tables if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        self.schema
            .get_or_try_init(|| async {
                sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
                tracing::debug!("event store schema ready");
                Ok::<(), EventStoreError>(())
            })
            .await?;
        Ok(())
    }

    fn row_to_event(row: PgRow) -> Result<EventEnvelope> {
        let payload = match row.try_get::<serde_json::Value, _>("payload")? {
            serde_json::Value::Object(fields) => fields,
            other => {
                return Err(EventStoreError::InvalidEnvelope(format!(
                    "stored payload is not a JSON object: {other}"
                )));
            }
        };

        Ok(EventEnvelope {
            event_id: EventId::from_uuid(row.try_get::<Uuid, _>("id")?),
            event_type: row.try_get("event_type")?,
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            position: Position::new(row.try_get("position")?),
            occurred_on: row.try_get("occurred_on")?,
            payload,
        })
    }

    fn row_to_snapshot(row: PgRow) -> Result<Snapshot> {
        Ok(Snapshot {
            aggregate_id: AggregateId::from_uuid(row.try_get::<Uuid, _>("aggregate_id")?),
            aggregate_type: row.try_get("aggregate_type")?,
            version: Version::new(row.try_get("version")?),
            last_occurred_on: row.try_get::<Option<DateTime<Utc>>, _>("last_occurred_on")?,
            timestamp: row.try_get::<DateTime<Utc>, _>("timestamp")?,
            state: row.try_get("state")?,
        })
    }
}

#[async_trait]
impl EventStore for PostgresEventStore {
    async fn append(&self, event: EventEnvelope) -> Result<Position> {
        validate_envelope_for_append(&event)?;
        self.ensure_schema().await?;

        let event_id = event.event_id;
        let position: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO events (id, event_type, aggregate_id, aggregate_type, occurred_on, payload)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING position
            "#,
        )
        .bind(event.event_id.as_uuid())
        .bind(&event.event_type)
        .bind(event.aggregate_id.as_uuid())
        .bind(&event.aggregate_type)
        .bind(event.occurred_on)
        .bind(serde_json::Value::Object(event.payload))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_event_id")
            {
                return EventStoreError::DuplicateEvent(event_id);
            }
            EventStoreError::Database(e)
        })?;

        Ok(Position::new(position))
    }

    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        self.ensure_schema().await?;
        let rows = sqlx::query(
            r#"
            SELECT position, id, event_type, aggregate_id, aggregate_type, occurred_on, payload
            FROM events
            WHERE aggregate_type = $1 AND aggregate_id = $2
            ORDER BY position ASC
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_event).collect()
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        self.ensure_schema().await?;

        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT aggregate_id
            FROM events
            WHERE aggregate_type = $1
            GROUP BY aggregate_id
            ORDER BY MIN(position) ASC
            "#,
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids.into_iter().map(AggregateId::from_uuid).collect())
    }
}

#[async_trait]
impl SnapshotStore for PostgresEventStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        self.ensure_schema().await?;

        sqlx::query(
            r#"
            INSERT INTO snapshots (aggregate_type, aggregate_id, version, last_occurred_on, timestamp, state)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (aggregate_type, aggregate_id) DO UPDATE SET
                version = EXCLUDED.version,
                last_occurred_on = EXCLUDED.last_occurred_on,
                timestamp = EXCLUDED.timestamp,
                state = EXCLUDED.state
            "#,
        )
        .bind(&snapshot.aggregate_type)
        .bind(snapshot.aggregate_id.as_uuid())
        .bind(snapshot.version.as_i64())
        .bind(snapshot.last_occurred_on)
        .bind(snapshot.timestamp)
        .bind(&snapshot.state)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<Snapshot>> {
        self.ensure_schema().await?;

        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT aggregate_id, aggregate_type, version, last_occurred_on, timestamp, state
            FROM snapshots
            WHERE aggregate_type = $1 AND aggregate_id = $2
            "#,
        )
        .bind(aggregate_type)
        .bind(aggregate_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_snapshot).transpose()
    }

    async fn get_all_snapshots(&self, aggregate_type: &str) -> Result<Vec<Snapshot>> {
        self.ensure_schema().await?;

        let rows = sqlx::query(
            r#"
            SELECT aggregate_id, aggregate_type, version, last_occurred_on, timestamp, state
            FROM snapshots
            WHERE aggregate_type = $1
            ORDER BY aggregate_id ASC
            "#,
        )
        .bind(aggregate_type)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_snapshot).collect()
    }
}
