// Domain event audit trail

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::repository::StoreError;
use crate::schema::event_logs;

text_enum! {
    ActorType {
        Client => "client",
        Merchant => "merchant",
        MerchantUser => "merchant_user",
        Superadmin => "superadmin",
    }
}

text_enum! {
    EventType {
        TransactionCreated => "transaction_created",
        RewardRedeemed => "reward_redeemed",
        RedemptionStatusChanged => "redemption_status_changed",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = event_logs)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct EventLog {
    pub id: Uuid,
    pub event_type: EventType,
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub details: serde_json::Value,
    pub event_timestamp: DateTime<Utc>,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// `event_timestamp` is assigned by the store
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = event_logs)]
pub struct NewEventLog {
    pub event_type: EventType,
    pub actor_id: Uuid,
    pub actor_type: ActorType,
    pub details: serde_json::Value,
    pub reference_id: Option<Uuid>,
}

impl EventLog {
    pub async fn create(
        conn: &mut AsyncPgConnection,
        new_event: NewEventLog,
    ) -> Result<Self, StoreError> {
        use crate::schema::event_logs::dsl::*;

        let event = diesel::insert_into(event_logs)
            .values(&new_event)
            .returning(EventLog::as_returning())
            .get_result::<EventLog>(conn)
            .await?;

        Ok(event)
    }

    pub async fn list_by_reference(
        conn: &mut AsyncPgConnection,
        reference: Uuid,
    ) -> Result<Vec<Self>, StoreError> {
        use crate::schema::event_logs::dsl::*;

        let events = event_logs
            .filter(reference_id.eq(reference))
            .order(event_timestamp.asc())
            .select(EventLog::as_select())
            .load::<EventLog>(conn)
            .await?;

        Ok(events)
    }
}
