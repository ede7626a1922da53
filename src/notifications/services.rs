use chrono::Utc;
use sea_orm::ActiveValue::Set;
use sea_orm::{ActiveModelTrait, DatabaseConnection};
use uuid::Uuid;

use super::models::ActiveModel;

/// Structured event handed to the notification collaborator after a
/// successful transition.
#[derive(Debug, Clone)]
pub struct StatusChangeEvent {
    pub request_number: String,
    pub sample_scope: String,
    pub entity_type: String,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<String>,
    pub priority: String,
}

/// Persist a status-change event. Emission failures are logged and swallowed:
/// the transition that triggered the event is already committed and its
/// correctness does not depend on notification delivery.
pub async fn emit(db: &DatabaseConnection, event: StatusChangeEvent) {
    let record = ActiveModel {
        id: Set(Uuid::new_v4()),
        request_number: Set(event.request_number.clone()),
        sample_scope: Set(event.sample_scope),
        entity_type: Set(event.entity_type),
        previous_status: Set(event.previous_status),
        new_status: Set(event.new_status),
        changed_by: Set(event.changed_by),
        priority: Set(event.priority),
        created_at: Set(Utc::now()),
    };

    if let Err(err) = record.insert(db).await {
        tracing::warn!(
            request_number = %event.request_number,
            "failed to emit status-change notification: {err}"
        );
    }
}
