use crate::lifecycle::aggregation;
use crate::lifecycle::models::{RequestStatus, SampleStatus};
use crate::samples::models::{Sample, SamplePriority};
use chrono::{DateTime, Utc};
use crudcrate::{CRUDResource, EntityToModels};
use sea_orm::ActiveValue::Set;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    TransactionTrait, entity::prelude::*,
};
use uuid::Uuid;

#[derive(
    Debug, Clone, PartialEq, Eq, EnumIter, DeriveActiveEnum, ToSchema, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "request_type")]
#[serde(rename_all = "snake_case")]
pub enum RequestType {
    /// Normal test request
    #[sea_orm(string_value = "ntr")]
    Ntr,
    /// Advanced/special request
    #[sea_orm(string_value = "asr")]
    Asr,
    /// Equipment request
    #[sea_orm(string_value = "er")]
    Er,
}

/// Seed for one physical sample in a new request: expands into one testing
/// sample row per (test method x repeat).
#[derive(Debug, Clone, PartialEq, Eq, ToSchema, Serialize, Deserialize)]
pub struct SampleSeed {
    pub name: String,
    pub test_methods: Vec<String>,
    /// Number of repeats per method, at least 1.
    #[serde(default = "default_repeats")]
    pub repeats: i32,
    #[serde(default = "default_priority")]
    pub priority: SamplePriority,
}

fn default_repeats() -> i32 {
    1
}

fn default_priority() -> SamplePriority {
    SamplePriority::Normal
}

/// A PCRD test request. Status is derived from the owned samples by the
/// aggregation rule, except for the Rejected/Terminated administrative
/// overrides.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, EntityToModels)]
#[sea_orm(table_name = "requests")]
#[crudcrate(
    api_struct = "Request",
    name_singular = "request",
    name_plural = "requests",
    description = "PCRD test requests owning testing samples whose statuses roll up into the request status.",
    fn_get_one = get_one_request,
    fn_create = create_request_with_samples,
)]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    #[crudcrate(primary_key, update_model = false, create_model = false, on_create = Uuid::new_v4())]
    pub id: Uuid,
    #[sea_orm(unique)]
    #[crudcrate(sortable, filterable, fulltext, update_model = false, create_model = false, on_create = super::services::generate_request_number())]
    pub request_number: String,
    #[crudcrate(sortable, filterable, enum_field)]
    pub request_type: RequestType,
    #[sea_orm(column_type = "Text")]
    #[crudcrate(sortable, filterable, fulltext)]
    pub title: String,
    #[crudcrate(sortable, filterable)]
    pub requested_by: Option<String>,
    #[crudcrate(sortable, filterable, update_model = false, create_model = false, on_create = RequestStatus::PendingReceiveSample.as_str().to_string())]
    pub status: String,
    #[crudcrate(update_model = false, create_model = false, on_create = chrono::Utc::now(), sortable, list_model = false)]
    pub created_at: DateTime<Utc>,
    #[crudcrate(update_model = false, create_model = false, on_update = chrono::Utc::now(), on_create = chrono::Utc::now(), sortable)]
    pub last_updated: DateTime<Utc>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = vec![], create_model = false, update_model = false, list_model = false)]
    pub samples: Vec<Sample>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = vec![], list_model = false)]
    pub sample_seeds: Vec<SampleSeed>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = None, create_model = false, update_model = false)]
    pub total_samples_count: Option<u64>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = None, create_model = false, update_model = false)]
    pub received_samples_count: Option<u64>,
    #[sea_orm(ignore)]
    #[crudcrate(non_db_attr = true, default = None, create_model = false, update_model = false)]
    pub all_samples_received: Option<bool>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "crate::samples::models::Entity")]
    Samples,
}

impl Related<crate::samples::models::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Samples.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

/// Custom `get_one` that loads the owned samples and the aggregation rollup.
async fn get_one_request(db: &DatabaseConnection, id: Uuid) -> Result<Request, DbErr> {
    let model = Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| DbErr::RecordNotFound("Request not found".to_string()))?;

    let sample_models = crate::samples::models::Entity::find()
        .filter(crate::samples::models::Column::RequestId.eq(id))
        .order_by_asc(crate::samples::models::Column::CreatedAt)
        .all(db)
        .await?;

    let statuses: Vec<SampleStatus> = sample_models
        .iter()
        .map(|s| SampleStatus::canonicalize(&s.status).unwrap_or(SampleStatus::PendingReceive))
        .collect();
    let rollup = aggregation::rollup(&statuses);

    let mut request: Request = model.into();
    request.samples = sample_models.into_iter().map(Sample::from).collect();
    request.total_samples_count = Some(rollup.total_samples);
    request.received_samples_count = Some(rollup.received_samples);
    request.all_samples_received = Some(rollup.all_samples_received);

    Ok(request)
}

/// Custom `create` that builds the request and its samples atomically: one
/// testing sample per (seed x test method x repeat), all starting in
/// `Pending Receive`. The whole creation runs in one transaction so a failed
/// sample insert never leaves a request with a partial sample set.
async fn create_request_with_samples(
    db: &DatabaseConnection,
    create_data: RequestCreate,
) -> Result<Request, DbErr> {
    let seeds = create_data.sample_seeds.clone();

    let txn = db.begin().await?;

    let active_model: ActiveModel = create_data.into();
    let inserted = active_model.insert(&txn).await?;
    let request_id = inserted.id;

    for seed in seeds {
        let repeats = seed.repeats.max(1);
        for method in &seed.test_methods {
            for repeat_index in 1..=repeats {
                let sample = crate::samples::models::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    request_id: Set(request_id),
                    name: Set(seed.name.clone()),
                    test_method: Set(method.clone()),
                    repeat_index: Set(repeat_index),
                    status: Set(SampleStatus::PendingReceive.as_str().to_string()),
                    receive_date: Set(None),
                    operation_complete_date: Set(None),
                    operation_complete_by: Set(None),
                    priority: Set(seed.priority.clone()),
                    created_at: Set(Utc::now()),
                    last_updated: Set(Utc::now()),
                };
                sample.insert(&txn).await?;
            }
        }
    }

    txn.commit().await?;

    Request::get_one(db, request_id).await
}
