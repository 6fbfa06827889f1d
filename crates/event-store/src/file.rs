use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::{
    AggregateId, EventEnvelope, EventId, Position, Result, Snapshot,
    memory::{distinct_ids, push_to_stream},
    store::{EventStore, SnapshotStore, validate_envelope_for_append},
};

/// One event as it is laid out on disk: the header fields next to the
/// payload fields in a single flat object.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    event_type: String,
    id: EventId,
    entity_id: AggregateId,
    occurred_on: DateTime<Utc>,
    #[serde(flatten)]
    payload: Map<String, Value>,
}

impl EventRecord {
    fn from_envelope(envelope: &EventEnvelope) -> Self {
        Self {
            event_type: envelope.event_type.clone(),
            id: envelope.event_id,
            entity_id: envelope.aggregate_id,
            occurred_on: envelope.occurred_on,
            payload: envelope.payload.clone(),
        }
    }

    fn into_envelope(self, aggregate_type: &str, position: Position) -> EventEnvelope {
        EventEnvelope {
            event_id: self.id,
            event_type: self.event_type,
            aggregate_id: self.entity_id,
            aggregate_type: aggregate_type.to_string(),
            position,
            occurred_on: self.occurred_on,
            payload: self.payload,
        }
    }
}

/// Event store backed by JSON files under a data directory.
///
/// Layout:
/// - `<root>/events/events-<type>.json`: a JSON array of event records in
///   log order; an event's position is its index plus one.
/// - `<root>/snapshots/snapshots-<type>.json`: a JSON array of snapshots.
///
/// Directories and files are created on first write. Every write replaces
/// the whole file through a temp file, `fsync` and rename, so a crash leaves
/// either the old or the new content. Writers in one process are serialized
/// by an internal mutex; separate processes sharing a directory are not.
#[derive(Clone)]
pub struct FileEventStore {
    root: PathBuf,
    write_lock: Arc<Mutex<()>>,
}

impl FileEventStore {
    /// Creates a store rooted at `root`. Nothing is touched on disk yet.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// The data directory this store reads and writes.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn events_path(&self, aggregate_type: &str) -> PathBuf {
        self.root
            .join("events")
            .join(format!("events-{aggregate_type}.json"))
    }

    fn snapshots_path(&self, aggregate_type: &str) -> PathBuf {
        self.root
            .join("snapshots")
            .join(format!("snapshots-{aggregate_type}.json"))
    }

    async fn read_stream(&self, aggregate_type: &str) -> Result<Vec<EventEnvelope>> {
        let records: Vec<EventRecord> = read_json_array(&self.events_path(aggregate_type)).await?;
        Ok(records
            .into_iter()
            .enumerate()
            .map(|(index, record)| {
                let position = Position::new(i64::try_from(index).unwrap_or(i64::MAX) + 1);
                record.into_envelope(aggregate_type, position)
            })
            .collect())
    }

    async fn read_snapshots(&self, aggregate_type: &str) -> Result<Vec<Snapshot>> {
        read_json_array(&self.snapshots_path(aggregate_type)).await
    }
}

async fn read_json_array<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
    let contents = match tokio::fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    if contents.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(&contents)?)
}

/// Writes `value` to `path` atomically: temp file, sync, rename, then sync
/// the directory so the rename itself survives a power loss.
async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    sync_dir(parent.unwrap_or_else(|| Path::new("."))).await
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

// Directory handles cannot be fsynced here; the rename is as durable as the
// platform makes it.
#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl EventStore for FileEventStore {
    async fn append(&self, event: EventEnvelope) -> Result<Position> {
        validate_envelope_for_append(&event)?;

        let _guard = self.write_lock.lock().await;
        let aggregate_type = event.aggregate_type.clone();
        let mut stream = self.read_stream(&aggregate_type).await?;
        let position = push_to_stream(&mut stream, event)?;

        let records: Vec<EventRecord> = stream.iter().map(EventRecord::from_envelope).collect();
        write_json_atomic(&self.events_path(&aggregate_type), &records).await?;

        tracing::trace!(%aggregate_type, %position, "event written to file");
        Ok(position)
    }

    async fn get_events(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Vec<EventEnvelope>> {
        let stream = self.read_stream(aggregate_type).await?;
        Ok(stream
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .collect())
    }

    async fn aggregate_ids(&self, aggregate_type: &str) -> Result<Vec<AggregateId>> {
        let stream = self.read_stream(aggregate_type).await?;
        Ok(distinct_ids(&stream))
    }
}

#[async_trait]
impl SnapshotStore for FileEventStore {
    async fn save_snapshot(&self, snapshot: Snapshot) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let aggregate_type = snapshot.aggregate_type.clone();
        let mut snapshots = self.read_snapshots(&aggregate_type).await?;

        match snapshots
            .iter_mut()
            .find(|s| s.aggregate_id == snapshot.aggregate_id)
        {
            Some(existing) => *existing = snapshot,
            None => snapshots.push(snapshot),
        }

        write_json_atomic(&self.snapshots_path(&aggregate_type), &snapshots).await
    }

    async fn get_snapshot(
        &self,
        aggregate_type: &str,
        aggregate_id: AggregateId,
    ) -> Result<Option<Snapshot>> {
        let snapshots = self.read_snapshots(aggregate_type).await?;
        Ok(snapshots
            .into_iter()
            .find(|s| s.aggregate_id == aggregate_id))
    }

    async fn get_all_snapshots(&self, aggregate_type: &str) -> Result<Vec<Snapshot>> {
        self.read_snapshots(aggregate_type).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::{EventStoreError, Version};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 10, 1, 12, 0, 0).unwrap()
    }

    fn renamed(aggregate_id: AggregateId, name: &str, occurred_on: DateTime<Utc>) -> EventEnvelope {
        EventEnvelope::builder()
            .aggregate_id(aggregate_id)
            .aggregate_type("Planet")
            .event_type("PlanetRenamed")
            .occurred_on(occurred_on)
            .payload(&json!({ "planetName": name }))
            .unwrap()
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn atomic_write_creates_dirs_and_leaves_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("snapshots-Planet.json");

        write_json_atomic(&path, &json!([{ "name": "Earth" }])).await.unwrap();
        write_json_atomic(&path, &json!([{ "name": "Terra" }])).await.unwrap();

        let written: Value = serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written, json!([{ "name": "Terra" }]));

        let entries: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("snapshots-Planet.json")]);
    }

    #[tokio::test]
    async fn directories_are_created_lazily() {
        let dir = TempDir::new().unwrap();
        let store = FileEventStore::new(dir.path().join("data"));

        assert!(store.get_events("Planet", AggregateId::new()).await.unwrap().is_empty());
        assert!(!dir.path().join("data").exists());

        store
            .append(renamed(AggregateId::new(), "Terra", t0()))
            .await
            .unwrap();
        assert!(dir.path().join("data/events/events-Planet.json").exists());
    }

    #[tokio::test]
    async fn events_survive_a_new_store_instance() {
        let dir = TempDir::new().unwrap();
        let id = AggregateId::new();

        let store = FileEventStore::new(dir.path());
        store.append(renamed(id, "Terra", t0())).await.unwrap();
        let position = store
            .append(renamed(id, "Gaia", t0() - Duration::minutes(1)))
            .await
            .unwrap();
        assert_eq!(position, Position::new(2));

        let reopened = FileEventStore::new(dir.path());
        let events = reopened.get_events("Planet", id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].payload["planetName"], json!("Terra"));
        assert_eq!(events[1].payload["planetName"], json!("Gaia"));
        assert_eq!(events[1].position, Position::new(2));
        assert_eq!(events[1].occurred_on, t0() - Duration::minutes(1));
    }

    #[tokio::test]
    async fn records_are_flat_camel_case_objects() {
        let dir = TempDir::new().unwrap();
        let store = FileEventStore::new(dir.path());
        let id = AggregateId::new();
        let event = renamed(id, "Terra", t0());
        store.append(event.clone()).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("events/events-Planet.json")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        let record = &value[0];

        assert_eq!(record["eventType"], json!("PlanetRenamed"));
        assert_eq!(record["id"], json!(event.event_id.to_string()));
        assert_eq!(record["entityId"], json!(id.to_string()));
        assert_eq!(record["planetName"], json!("Terra"));
        assert!(record.get("payload").is_none());
    }

    #[tokio::test]
    async fn duplicate_event_id_is_rejected() {
        let dir = TempDir::new().unwrap();
        let store = FileEventStore::new(dir.path());
        let event = renamed(AggregateId::new(), "Terra", t0());

        store.append(event.clone()).await.unwrap();
        assert!(matches!(
            store.append(event).await,
            Err(EventStoreError::DuplicateEvent(_))
        ));
    }

    #[tokio::test]
    async fn snapshots_are_upserted() {
        let dir = TempDir::new().unwrap();
        let store = FileEventStore::new(dir.path());
        let id = AggregateId::new();

        for version in 1..=3 {
            let snapshot = Snapshot::from_state(
                id,
                "Planet",
                Version::new(version),
                Some(t0()),
                t0(),
                &json!({ "name": format!("v{version}") }),
            )
            .unwrap();
            store.save_snapshot(snapshot).await.unwrap();
        }

        let all = store.get_all_snapshots("Planet").await.unwrap();
        assert_eq!(all.len(), 1);
        let latest = store.get_snapshot("Planet", id).await.unwrap().unwrap();
        assert_eq!(latest.version, Version::new(3));
        assert_eq!(latest.state["name"], json!("v3"));
        assert!(!dir.path().join("snapshots/snapshots-Planet.json.tmp").exists());
    }

    #[tokio::test]
    async fn concurrent_appends_are_all_kept() {
        let dir = TempDir::new().unwrap();
        let store = FileEventStore::new(dir.path());
        let id = AggregateId::new();

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .append(renamed(id, &format!("name-{i}"), t0()))
                    .await
                    .unwrap()
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let events = store.get_events("Planet", id).await.unwrap();
        assert_eq!(events.len(), 8);
        assert_eq!(store.aggregate_ids("Planet").await.unwrap(), vec![id]);
    }
}
