use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    #[allow(clippy::too_many_lines)]
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Enable UUID extension for PostgreSQL
        if manager.get_database_backend() == sea_orm::DatabaseBackend::Postgres {
            manager
                .get_connection()
                .execute_unprepared("CREATE EXTENSION IF NOT EXISTS \"uuid-ossp\";")
                .await?;

            // Create request_type enum
            manager
                .create_type(
                    Type::create()
                        .as_enum(RequestType::Table)
                        .values([RequestType::Ntr, RequestType::Asr, RequestType::Er])
                        .to_owned(),
                )
                .await?;

            // Create sample_priority enum
            manager
                .create_type(
                    Type::create()
                        .as_enum(SamplePriority::Table)
                        .values([SamplePriority::Normal, SamplePriority::Urgent])
                        .to_owned(),
                )
                .await?;
        }

        // Create requests table
        // Status columns are plain text: historical data carries legacy
        // synonym spellings that are canonicalized at the application boundary.
        let mut requests_table = Table::create()
            .table(Requests::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Requests::RequestNumber)
                    .string()
                    .not_null()
                    .unique_key(),
            )
            .col(ColumnDef::new(Requests::Title).text().not_null())
            .col(ColumnDef::new(Requests::RequestedBy).string())
            .col(ColumnDef::new(Requests::Status).string().not_null())
            .col(
                ColumnDef::new(Requests::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(Requests::LastUpdated)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                requests_table.col(
                    ColumnDef::new(Requests::RequestType)
                        .custom(RequestType::Table)
                        .not_null(),
                );
            }
            _ => {
                requests_table.col(ColumnDef::new(Requests::RequestType).text().not_null());
            }
        }
        add_id_column(manager, &mut requests_table, Requests::Id)?;
        manager.create_table(requests_table).await?;

        // Create testing_samples table
        let mut samples_table = Table::create()
            .table(TestingSamples::Table)
            .if_not_exists()
            .col(ColumnDef::new(TestingSamples::RequestId).uuid().not_null())
            .col(ColumnDef::new(TestingSamples::Name).text().not_null())
            .col(ColumnDef::new(TestingSamples::TestMethod).text().not_null())
            .col(
                ColumnDef::new(TestingSamples::RepeatIndex)
                    .integer()
                    .not_null()
                    .default(1),
            )
            .col(ColumnDef::new(TestingSamples::Status).string().not_null())
            .col(ColumnDef::new(TestingSamples::ReceiveDate).timestamp_with_time_zone())
            .col(ColumnDef::new(TestingSamples::OperationCompleteDate).timestamp_with_time_zone())
            .col(ColumnDef::new(TestingSamples::OperationCompleteBy).string())
            .col(
                ColumnDef::new(TestingSamples::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .col(
                ColumnDef::new(TestingSamples::LastUpdated)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk_testing_samples_request_id")
                    .from(TestingSamples::Table, TestingSamples::RequestId)
                    .to(Requests::Table, Requests::Id)
                    // Deleting a request cascades in application code so the
                    // notification history is cleaned up alongside samples.
                    .on_delete(ForeignKeyAction::Restrict)
                    .on_update(ForeignKeyAction::NoAction),
            )
            .to_owned();
        match manager.get_database_backend() {
            sea_orm::DatabaseBackend::Postgres => {
                samples_table.col(
                    ColumnDef::new(TestingSamples::Priority)
                        .custom(SamplePriority::Table)
                        .not_null()
                        .default("normal"),
                );
            }
            _ => {
                samples_table.col(
                    ColumnDef::new(TestingSamples::Priority)
                        .text()
                        .not_null()
                        .default("normal"),
                );
            }
        }
        add_id_column(manager, &mut samples_table, TestingSamples::Id)?;
        manager.create_table(samples_table).await?;

        // Create notifications table
        let mut notifications_table = Table::create()
            .table(Notifications::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Notifications::RequestNumber)
                    .string()
                    .not_null(),
            )
            .col(
                ColumnDef::new(Notifications::SampleScope)
                    .string()
                    .not_null(),
            )
            .col(ColumnDef::new(Notifications::EntityType).string().not_null())
            .col(ColumnDef::new(Notifications::PreviousStatus).string())
            .col(ColumnDef::new(Notifications::NewStatus).string().not_null())
            .col(ColumnDef::new(Notifications::ChangedBy).string())
            .col(
                ColumnDef::new(Notifications::Priority)
                    .string()
                    .not_null()
                    .default("normal"),
            )
            .col(
                ColumnDef::new(Notifications::CreatedAt)
                    .timestamp_with_time_zone()
                    .not_null()
                    .default(Expr::current_timestamp()),
            )
            .to_owned();
        add_id_column(manager, &mut notifications_table, Notifications::Id)?;
        manager.create_table(notifications_table).await?;

        // Indexes for the hot lookup paths: samples by request, samples by
        // status, notifications by request number.
        manager
            .create_index(
                Index::create()
                    .name("idx_testing_samples_request_id")
                    .table(TestingSamples::Table)
                    .col(TestingSamples::RequestId)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_testing_samples_status")
                    .table(TestingSamples::Table)
                    .col(TestingSamples::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_requests_status")
                    .table(Requests::Table)
                    .col(Requests::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_notifications_request_number")
                    .table(Notifications::Table)
                    .col(Notifications::RequestNumber)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notifications::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(TestingSamples::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Requests::Table).to_owned())
            .await?;

        if manager.get_database_backend() == sea_orm::DatabaseBackend::Postgres {
            manager
                .drop_type(Type::drop().name(RequestType::Table).to_owned())
                .await?;
            manager
                .drop_type(Type::drop().name(SamplePriority::Table).to_owned())
                .await?;
        }

        Ok(())
    }
}

/// Add an ID column with appropriate type and default based on database backend
fn add_id_column<T>(
    manager: &SchemaManager<'_>,
    table: &mut TableCreateStatement,
    id_column: T,
) -> Result<(), DbErr>
where
    T: IntoIden + 'static,
{
    match manager.get_database_backend() {
        sea_orm::DatabaseBackend::Postgres => {
            table.col(
                ColumnDef::new(id_column)
                    .uuid()
                    .not_null()
                    .primary_key()
                    .default(Expr::cust("uuid_generate_v4()")),
            );
        }
        sea_orm::DatabaseBackend::Sqlite => {
            table.col(ColumnDef::new(id_column).uuid().not_null().primary_key());
        }
        _ => {
            return Err(DbErr::Custom("Unsupported database backend".to_string()));
        }
    }
    Ok(())
}

#[derive(DeriveIden)]
enum Requests {
    Table,
    Id,
    RequestNumber,
    RequestType,
    Title,
    RequestedBy,
    Status,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum TestingSamples {
    Table,
    Id,
    RequestId,
    Name,
    TestMethod,
    RepeatIndex,
    Status,
    ReceiveDate,
    OperationCompleteDate,
    OperationCompleteBy,
    Priority,
    CreatedAt,
    LastUpdated,
}

#[derive(DeriveIden)]
enum Notifications {
    Table,
    Id,
    RequestNumber,
    SampleScope,
    EntityType,
    PreviousStatus,
    NewStatus,
    ChangedBy,
    Priority,
    CreatedAt,
}

#[derive(DeriveIden)]
enum RequestType {
    Table,
    #[sea_orm(iden = "ntr")]
    Ntr,
    #[sea_orm(iden = "asr")]
    Asr,
    #[sea_orm(iden = "er")]
    Er,
}

#[derive(DeriveIden)]
enum SamplePriority {
    Table,
    #[sea_orm(iden = "normal")]
    Normal,
    #[sea_orm(iden = "urgent")]
    Urgent,
}
