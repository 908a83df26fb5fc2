use async_trait::async_trait;

use muster_core::event::Event;
use muster_ports::error::PortError;
use muster_ports::outbound::EventStore;

use super::SqliteDb;

fn decode(id: i64, data: &str) -> Result<Event, PortError> {
    let mut event: Event =
        serde_json::from_str(data).map_err(|e| PortError::Persistence(e.to_string()))?;
    event.id = u64::try_from(id).map_err(|e| PortError::Persistence(e.to_string()))?;
    Ok(event)
}

#[async_trait]
impl EventStore for SqliteDb {
    async fn set(&self, event: &Event) -> Result<u64, PortError> {
        let data =
            serde_json::to_string(event).map_err(|e| PortError::Persistence(e.to_string()))?;
        let created_at = event.created_at.map(|t| t.to_rfc3339());

        let result = sqlx::query("INSERT INTO events (data, created_at) VALUES (?, ?)")
            .bind(&data)
            .bind(&created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        u64::try_from(result.last_insert_rowid())
            .map_err(|e| PortError::Persistence(e.to_string()))
    }

    async fn get(&self, id: u64) -> Result<Event, PortError> {
        let id = i64::try_from(id).map_err(|_| PortError::NotFound)?;
        let row: Option<(i64, String)> = sqlx::query_as("SELECT id, data FROM events WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        match row {
            Some((id, data)) => decode(id, &data),
            None => Err(PortError::NotFound),
        }
    }

    async fn all(&self) -> Result<Vec<Event>, PortError> {
        let rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, data FROM events ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PortError::Persistence(e.to_string()))?;

        rows.iter().map(|(id, data)| decode(*id, data)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn db() -> SqliteDb {
        SqliteDb::new("sqlite::memory:").await.unwrap()
    }

    fn ts(s: &str) -> chrono::DateTime<chrono::Utc> {
        chrono::DateTime::parse_from_rfc3339(s)
            .unwrap()
            .with_timezone(&chrono::Utc)
    }

    fn make_event(comment: &str) -> Event {
        Event {
            id: 0,
            alerts: vec!["00000000000000ff".into()],
            comment: comment.into(),
            created_by: "oncall".into(),
            created_at: Some(ts("2025-01-15T10:00:00Z")),
        }
    }

    #[tokio::test]
    async fn set_assigns_sequential_ids() {
        let db = db().await;

        let first = db.set(&make_event("db failover")).await.unwrap();
        let second = db.set(&make_event("rollback")).await.unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 2);
    }

    #[tokio::test]
    async fn get_roundtrips_with_assigned_id() {
        let db = db().await;
        let id = db.set(&make_event("db failover")).await.unwrap();

        let event = db.get(id).await.unwrap();
        assert_eq!(event.id, id);
        assert_eq!(event.comment, "db failover");
        assert_eq!(event.alerts, vec!["00000000000000ff".to_string()]);
        assert_eq!(event.created_at, Some(ts("2025-01-15T10:00:00Z")));
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let db = db().await;
        assert_eq!(db.get(42).await.unwrap_err(), PortError::NotFound);
    }

    #[tokio::test]
    async fn all_returns_events_in_insertion_order() {
        let db = db().await;
        assert!(db.all().await.unwrap().is_empty());

        db.set(&make_event("first")).await.unwrap();
        db.set(&make_event("second")).await.unwrap();

        let comments: Vec<String> = db
            .all()
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.comment)
            .collect();
        assert_eq!(comments, vec!["first", "second"]);
    }
}
