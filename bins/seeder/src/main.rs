//! Database seeder for Worklog development and testing.
//!
//! Seeds a test user scope with clients, tasks carrying logged hours, and
//! registry expenses so the monthly closure engine can be exercised locally.
//! The demo billing period is May 2024.
//!
//! Usage: cargo run --bin seeder

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use std::str::FromStr;
use uuid::Uuid;

use worklog_db::entities::{clients, expenses, sea_orm_active_enums::TaskStatus, tasks};

/// Test user ID (consistent for all seeds)
const TEST_USER_ID: &str = "00000000-0000-0000-0000-000000000001";
/// First demo client ID
const CLIENT_ACME_ID: &str = "00000000-0000-0000-0000-000000000010";
/// Second demo client ID
const CLIENT_INITECH_ID: &str = "00000000-0000-0000-0000-000000000011";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let database_url =
        std::env::var("DATABASE_URL").expect("DATABASE_URL must be set in environment");

    println!("Connecting to database...");
    let db = worklog_db::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    println!("Seeding clients...");
    seed_clients(&db).await;

    println!("Seeding tasks for May 2024...");
    seed_tasks(&db).await;

    println!("Seeding expense registry...");
    seed_expenses(&db).await;

    println!("Seeding complete!");
    println!("Test user id: {TEST_USER_ID}");
}

fn test_user_id() -> Uuid {
    Uuid::parse_str(TEST_USER_ID).unwrap()
}

fn amount(value: &str) -> Decimal {
    Decimal::from_str(value).unwrap()
}

/// Seeds two demo clients.
async fn seed_clients(db: &DatabaseConnection) {
    let demo_clients = [
        (CLIENT_ACME_ID, "Acme Web GmbH"),
        (CLIENT_INITECH_ID, "Initech Consulting"),
    ];

    for (id, name) in demo_clients {
        let client_id = Uuid::parse_str(id).unwrap();

        if clients::Entity::find_by_id(client_id)
            .one(db)
            .await
            .ok()
            .flatten()
            .is_some()
        {
            println!("  Client {name} already exists, skipping...");
            continue;
        }

        let now = Utc::now().into();
        clients::ActiveModel {
            id: Set(client_id),
            user_id: Set(test_user_id()),
            name: Set(name.to_string()),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .expect("Failed to seed client");
    }
}

/// Seeds tasks with logged hours inside the demo period, including one
/// pending task so the close gate has something to report.
async fn seed_tasks(db: &DatabaseConnection) {
    if tasks::Entity::find().one(db).await.ok().flatten().is_some() {
        println!("  Tasks already exist, skipping...");
        return;
    }

    let acme = Uuid::parse_str(CLIENT_ACME_ID).unwrap();
    let initech = Uuid::parse_str(CLIENT_INITECH_ID).unwrap();

    let demo_tasks = [
        (acme, TaskStatus::Completed, "12.00", 3),
        (acme, TaskStatus::Completed, "8.00", 17),
        (initech, TaskStatus::Completed, "5.50", 9),
        (initech, TaskStatus::Pending, "2.25", 24),
    ];

    for (client_id, status, hours, day) in demo_tasks {
        let now = Utc::now().into();
        tasks::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(test_user_id()),
            client_id: Set(client_id),
            status: Set(status),
            hours_spent: Set(amount(hours)),
            estimated_hours: Set(None),
            created_on: Set(NaiveDate::from_ymd_opt(2024, 5, day).unwrap()),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .expect("Failed to seed task");
    }
}

/// Seeds recurring and one-off registry expenses.
async fn seed_expenses(db: &DatabaseConnection) {
    if expenses::Entity::find().one(db).await.ok().flatten().is_some() {
        println!("  Expenses already exist, skipping...");
        return;
    }

    let demo_expenses = [
        ("Accounting", "Monthly bookkeeping", "150.00", true),
        ("Hosting", "VPS and backups", "19.90", true),
        ("Conference ticket", "One-off industry event", "490.00", false),
    ];

    for (name, description, value, is_recurring) in demo_expenses {
        let now = Utc::now().into();
        expenses::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(test_user_id()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            amount: Set(amount(value)),
            is_recurring: Set(is_recurring),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(db)
        .await
        .expect("Failed to seed expense");
    }
}
