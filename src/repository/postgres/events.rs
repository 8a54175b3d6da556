use async_trait::async_trait;
use uuid::Uuid;

use super::PgStore;
use crate::models::{EventLog, NewEventLog};
use crate::repository::{EventLogStore, StoreResult};

#[async_trait]
impl EventLogStore for PgStore {
    async fn insert_event(&self, new_event: NewEventLog) -> StoreResult<EventLog> {
        let mut conn = self.primary().await?;
        EventLog::create(&mut conn, new_event).await
    }

    async fn events_by_reference(&self, reference_id: Uuid) -> StoreResult<Vec<EventLog>> {
        let mut conn = self.replica().await?;
        EventLog::list_by_reference(&mut conn, reference_id).await
    }
}
