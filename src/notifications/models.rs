use chrono::{DateTime, Utc};
use crudcrate::{CRUDResource, EntityToModels};
use sea_orm::entity::prelude::*;
use uuid::Uuid;

/// Stored record of a status-change event. Delivery to end users is the
/// messaging layer's concern; this table is only the emission log it reads.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, EntityToModels)]
#[sea_orm(table_name = "notifications")]
#[crudcrate(
    generate_router,
    api_struct = "Notification",
    name_singular = "notification",
    name_plural = "notifications",
    description = "Status-change notifications emitted by the sample lifecycle engine."
)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[crudcrate(sortable, filterable, fulltext)]
    pub request_number: String,
    /// A sample id, or "multiple" for batch transitions.
    #[crudcrate(sortable, filterable)]
    pub sample_scope: String,
    #[crudcrate(sortable, filterable)]
    pub entity_type: String,
    #[sea_orm(nullable)]
    #[crudcrate(filterable)]
    pub previous_status: Option<String>,
    #[crudcrate(sortable, filterable)]
    pub new_status: String,
    #[sea_orm(nullable)]
    #[crudcrate(sortable, filterable)]
    pub changed_by: Option<String>,
    #[crudcrate(sortable, filterable)]
    pub priority: String,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable)]
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
