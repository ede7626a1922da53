use crate::lifecycle::models::SampleStatus;
use chrono::{DateTime, Utc};
use crudcrate::EntityToModels;
use sea_orm::entity::prelude::*;
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "sample_priority")]
#[serde(rename_all = "snake_case")]
pub enum SamplePriority {
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

/// One testing sample: a (physical sample x test method x repeat) row owned
/// by exactly one request. Samples are created with their request and only
/// destroyed by the request's cascading delete; status moves exclusively
/// through the lifecycle engine.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, EntityToModels)]
#[sea_orm(table_name = "testing_samples")]
#[crudcrate(
    api_struct = "Sample",
    name_singular = "sample",
    name_plural = "samples",
    description = "Testing samples belonging to PCRD requests, one per sample/method/repeat combination."
)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[crudcrate(sortable, filterable)]
    pub request_id: Uuid,
    #[sea_orm(column_type = "Text")]
    #[crudcrate(sortable, filterable, fulltext)]
    pub name: String,
    #[sea_orm(column_type = "Text")]
    #[crudcrate(sortable, filterable, fulltext)]
    pub test_method: String,
    #[crudcrate(sortable, filterable)]
    pub repeat_index: i32,
    #[crudcrate(sortable, filterable, update_model = false, create_model = false, on_create = SampleStatus::PendingReceive.as_str().to_string())]
    pub status: String,
    #[crudcrate(sortable, update_model = false, create_model = false)]
    pub receive_date: Option<DateTime<Utc>>,
    #[crudcrate(sortable, update_model = false, create_model = false)]
    pub operation_complete_date: Option<DateTime<Utc>>,
    #[crudcrate(update_model = false, create_model = false)]
    pub operation_complete_by: Option<String>,
    #[crudcrate(sortable, filterable, enum_field)]
    pub priority: SamplePriority,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable, list_model = false)]
    pub created_at: DateTime<Utc>,
    #[crudcrate(update_model = false, create_model = false, on_update = chrono::Utc::now(), on_create = chrono::Utc::now(), sortable)]
    pub last_updated: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "crate::requests::models::Entity",
        from = "Column::RequestId",
        to = "crate::requests::models::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Requests,
}

impl Related<crate::requests::models::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Requests.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
