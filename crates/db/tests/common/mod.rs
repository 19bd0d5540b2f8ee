//! Shared helpers for repository integration tests.
//!
//! Tests run against an in-memory SQLite database with the real migrations
//! applied, so no external services are needed.

#![allow(dead_code)]

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectOptions, Database, DatabaseConnection, Set};
use sea_orm_migration::MigratorTrait;
use uuid::Uuid;

use worklog_db::entities::{clients, expenses, sea_orm_active_enums::TaskStatus, tasks};
use worklog_db::migration::Migrator;

/// Connects to a fresh in-memory database and applies all migrations.
///
/// Each pooled connection would get its own in-memory database, so the pool
/// is pinned to a single connection.
pub async fn setup_db() -> DatabaseConnection {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1);

    let db = Database::connect(options)
        .await
        .expect("Failed to connect to test database");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

fn now() -> DateTime<FixedOffset> {
    Utc::now().into()
}

/// Creates a client and returns its id.
pub async fn seed_client(db: &DatabaseConnection, user_id: Uuid, name: &str) -> Uuid {
    let id = Uuid::new_v4();
    clients::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        name: Set(name.to_string()),
        is_active: Set(true),
        created_at: Set(now()),
        updated_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to seed client");
    id
}

/// Creates a task and returns its id.
pub async fn seed_task(
    db: &DatabaseConnection,
    user_id: Uuid,
    client_id: Uuid,
    status: TaskStatus,
    hours_spent: Decimal,
    created_on: NaiveDate,
) -> Uuid {
    let id = Uuid::new_v4();
    tasks::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        client_id: Set(client_id),
        status: Set(status),
        hours_spent: Set(hours_spent),
        estimated_hours: Set(None),
        created_on: Set(created_on),
        created_at: Set(now()),
        updated_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to seed task");
    id
}

/// Creates a registry expense and returns its id.
pub async fn seed_expense(
    db: &DatabaseConnection,
    user_id: Uuid,
    name: &str,
    amount: Decimal,
    is_recurring: bool,
) -> Uuid {
    let id = Uuid::new_v4();
    expenses::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        name: Set(name.to_string()),
        description: Set(Some(format!("{name} expense"))),
        amount: Set(amount),
        is_recurring: Set(is_recurring),
        is_active: Set(true),
        created_at: Set(now()),
        updated_at: Set(now()),
    }
    .insert(db)
    .await
    .expect("Failed to seed expense");
    id
}

/// A date inside May 2024, the period used by most tests.
pub fn may_2024(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, day).expect("valid date")
}
