use crate::notifications::models as notifications;
use crate::samples::models as samples;
use chrono::{Datelike, Utc};
use rand::Rng;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, TransactionTrait,
};
use uuid::Uuid;

/// Generate a human-readable request number: `PCRD-<year>-<6 hex digits>`.
pub fn generate_request_number() -> String {
    let mut rng = rand::rng();
    let suffix: u32 = rng.random_range(0..0x100_0000);
    format!("PCRD-{}-{:06X}", Utc::now().year(), suffix)
}

/// Explicit, audited cascading delete of a request.
///
/// Samples cannot outlive their request, and the notification history for the
/// request is removed in the same unit of work. This is application logic by
/// design rather than a store-level foreign-key cascade. Returns `false` when
/// the request does not exist.
pub async fn delete_request_cascade(db: &DatabaseConnection, id: Uuid) -> Result<bool, DbErr> {
    let txn = db.begin().await?;

    let Some(request) = super::models::Entity::find_by_id(id).one(&txn).await? else {
        txn.rollback().await?;
        return Ok(false);
    };

    let samples_deleted = samples::Entity::delete_many()
        .filter(samples::Column::RequestId.eq(id))
        .exec(&txn)
        .await?
        .rows_affected;

    let notifications_deleted = notifications::Entity::delete_many()
        .filter(notifications::Column::RequestNumber.eq(request.request_number.clone()))
        .exec(&txn)
        .await?
        .rows_affected;

    super::models::Entity::delete_by_id(id).exec(&txn).await?;

    txn.commit().await?;

    tracing::info!(
        request_number = %request.request_number,
        samples_deleted,
        notifications_deleted,
        "request deleted with cascade"
    );

    Ok(true)
}
