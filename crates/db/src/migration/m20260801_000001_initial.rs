//! Initial database migration.
//!
//! Creates the collaborator tables (clients, tasks, expenses) and the monthly
//! closure tables with their snapshot rows. Written with the schema DSL so
//! the same migration runs on Postgres and on SQLite (used by the repository
//! integration tests).

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Clients::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Clients::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Clients::UserId).uuid().not_null())
                    .col(ColumnDef::new(Clients::Name).string().not_null())
                    .col(
                        ColumnDef::new(Clients::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Clients::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Clients::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tasks::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tasks::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tasks::UserId).uuid().not_null())
                    .col(ColumnDef::new(Tasks::ClientId).uuid().not_null())
                    .col(ColumnDef::new(Tasks::Status).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Tasks::HoursSpent)
                            .decimal_len(10, 2)
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(Tasks::EstimatedHours).decimal_len(10, 2))
                    .col(ColumnDef::new(Tasks::CreatedOn).date().not_null())
                    .col(
                        ColumnDef::new(Tasks::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Tasks::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_tasks_client")
                            .from(Tasks::Table, Tasks::ClientId)
                            .to(Clients::Table, Clients::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // The aggregation query filters on (user, period).
        manager
            .create_index(
                Index::create()
                    .name("idx_tasks_user_created_on")
                    .table(Tasks::Table)
                    .col(Tasks::UserId)
                    .col(Tasks::CreatedOn)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Expenses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Expenses::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Expenses::UserId).uuid().not_null())
                    .col(ColumnDef::new(Expenses::Name).string().not_null())
                    .col(ColumnDef::new(Expenses::Description).string())
                    .col(
                        ColumnDef::new(Expenses::Amount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::IsRecurring)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Expenses::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Expenses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Expenses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonthlyClosures::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MonthlyClosures::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(MonthlyClosures::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(MonthlyClosures::Month)
                            .small_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonthlyClosures::Year).integer().not_null())
                    .col(
                        ColumnDef::new(MonthlyClosures::TaxPercentage)
                            .decimal_len(5, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosures::HourlyRate)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonthlyClosures::Notes).text())
                    .col(
                        ColumnDef::new(MonthlyClosures::Status)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonthlyClosures::ClosedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(MonthlyClosures::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosures::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one closure per (user, month, year); concurrent creates are
        // resolved here, not by application-level locking.
        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_closures_user_period")
                    .table(MonthlyClosures::Table)
                    .col(MonthlyClosures::UserId)
                    .col(MonthlyClosures::Month)
                    .col(MonthlyClosures::Year)
                    .unique()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonthlyClosureClients::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MonthlyClosureClients::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::ClosureId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::ClientId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::TotalHours)
                            .decimal_len(10, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::GrossAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::TaxAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::NetAmount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureClients::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_closure_clients_closure")
                            .from(
                                MonthlyClosureClients::Table,
                                MonthlyClosureClients::ClosureId,
                            )
                            .to(MonthlyClosures::Table, MonthlyClosures::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_closure_clients_client")
                            .from(
                                MonthlyClosureClients::Table,
                                MonthlyClosureClients::ClientId,
                            )
                            .to(Clients::Table, Clients::Id),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_closure_clients_closure")
                    .table(MonthlyClosureClients::Table)
                    .col(MonthlyClosureClients::ClosureId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(MonthlyClosureExpenses::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(MonthlyClosureExpenses::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureExpenses::ClosureId)
                            .uuid()
                            .not_null(),
                    )
                    .col(ColumnDef::new(MonthlyClosureExpenses::ExpenseId).uuid())
                    .col(ColumnDef::new(MonthlyClosureExpenses::Name).string().not_null())
                    .col(ColumnDef::new(MonthlyClosureExpenses::Description).string())
                    .col(
                        ColumnDef::new(MonthlyClosureExpenses::Amount)
                            .decimal_len(12, 2)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureExpenses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(MonthlyClosureExpenses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_closure_expenses_closure")
                            .from(
                                MonthlyClosureExpenses::Table,
                                MonthlyClosureExpenses::ClosureId,
                            )
                            .to(MonthlyClosures::Table, MonthlyClosures::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_monthly_closure_expenses_expense")
                            .from(
                                MonthlyClosureExpenses::Table,
                                MonthlyClosureExpenses::ExpenseId,
                            )
                            .to(Expenses::Table, Expenses::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_monthly_closure_expenses_closure")
                    .table(MonthlyClosureExpenses::Table)
                    .col(MonthlyClosureExpenses::ClosureId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(MonthlyClosureExpenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonthlyClosureClients::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(MonthlyClosures::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Expenses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tasks::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Clients::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum Clients {
    Table,
    Id,
    UserId,
    Name,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Tasks {
    Table,
    Id,
    UserId,
    ClientId,
    Status,
    HoursSpent,
    EstimatedHours,
    CreatedOn,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Expenses {
    Table,
    Id,
    UserId,
    Name,
    Description,
    Amount,
    IsRecurring,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MonthlyClosures {
    Table,
    Id,
    UserId,
    Month,
    Year,
    TaxPercentage,
    HourlyRate,
    Notes,
    Status,
    ClosedAt,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum MonthlyClosureClients {
    Table,
    Id,
    ClosureId,
    ClientId,
    TotalHours,
    GrossAmount,
    TaxAmount,
    NetAmount,
    CreatedAt,
}

#[derive(DeriveIden)]
enum MonthlyClosureExpenses {
    Table,
    Id,
    ClosureId,
    ExpenseId,
    Name,
    Description,
    Amount,
    CreatedAt,
    UpdatedAt,
}
