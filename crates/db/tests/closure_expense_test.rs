//! Integration tests for expense snapshot operations: add/update/remove,
//! open-state guards, and independence from the live registry.

mod common;

use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use uuid::Uuid;

use common::{may_2024, seed_client, seed_expense, seed_task, setup_db};
use worklog_core::closure::ExpenseSelection;
use worklog_db::ClosureRepository;
use worklog_db::entities::{expenses, sea_orm_active_enums::TaskStatus};
use worklog_db::repositories::{ClosureError, CreateClosureInput, UpdateExpenseInput};

fn create_input(user_id: Uuid) -> CreateClosureInput {
    CreateClosureInput {
        user_id,
        month: 5,
        year: 2024,
        tax_percentage: dec!(10),
        hourly_rate: dec!(100),
        notes: None,
        expense_selections: Vec::new(),
    }
}

fn registry_selection(expense_id: Uuid) -> ExpenseSelection {
    ExpenseSelection::Registry {
        expense_id,
        amount: None,
    }
}

#[tokio::test]
async fn test_add_registry_expense_copies_fields() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let expense_id = seed_expense(&db, user_id, "Software license", dec!(49.99), false).await;
    let created = repo.create(create_input(user_id)).await.unwrap();

    let line = repo
        .add_expense(user_id, created.closure.id, registry_selection(expense_id))
        .await
        .unwrap();

    assert_eq!(line.expense_id, Some(expense_id));
    assert_eq!(line.name, "Software license");
    assert_eq!(line.amount, dec!(49.99));

    // Registry edits after the copy must not propagate.
    let registry = expenses::Entity::find_by_id(expense_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut registry: expenses::ActiveModel = registry.into();
    registry.amount = Set(dec!(89.99));
    registry.name = Set("Renamed license".to_string());
    registry.update(&db).await.unwrap();

    let read = repo
        .find_with_totals(user_id, created.closure.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.expenses[0].name, "Software license");
    assert_eq!(read.expenses[0].amount, dec!(49.99));
}

#[tokio::test]
async fn test_add_registry_expense_duplicate_rejected() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let expense_id = seed_expense(&db, user_id, "Accounting", dec!(150.00), true).await;
    // Recurring, so creation already seeds it.
    let created = repo.create(create_input(user_id)).await.unwrap();
    assert_eq!(created.expenses.len(), 1);

    let result = repo
        .add_expense(user_id, created.closure.id, registry_selection(expense_id))
        .await;

    assert!(matches!(
        result,
        Err(ClosureError::DuplicateExpense(id)) if id == expense_id
    ));
}

#[tokio::test]
async fn test_add_manual_expense() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let created = repo.create(create_input(user_id)).await.unwrap();

    let line = repo
        .add_expense(
            user_id,
            created.closure.id,
            ExpenseSelection::Manual {
                name: "Train ticket".to_string(),
                description: Some("Client visit".to_string()),
                amount: dec!(24.50),
            },
        )
        .await
        .unwrap();

    assert_eq!(line.expense_id, None);
    assert_eq!(line.amount, dec!(24.50));

    // Manual lines can repeat; there is no registry id to collide on.
    repo.add_expense(
        user_id,
        created.closure.id,
        ExpenseSelection::Manual {
            name: "Train ticket".to_string(),
            description: None,
            amount: dec!(24.50),
        },
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_add_expense_validation() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let created = repo.create(create_input(user_id)).await.unwrap();

    assert!(matches!(
        repo.add_expense(
            user_id,
            created.closure.id,
            ExpenseSelection::Manual {
                name: "Refund".to_string(),
                description: None,
                amount: dec!(-5.00),
            },
        )
        .await,
        Err(ClosureError::NegativeExpenseAmount)
    ));

    assert!(matches!(
        repo.add_expense(
            user_id,
            created.closure.id,
            ExpenseSelection::Manual {
                name: "  ".to_string(),
                description: None,
                amount: dec!(5.00),
            },
        )
        .await,
        Err(ClosureError::EmptyExpenseName)
    ));

    let ghost = Uuid::new_v4();
    assert!(matches!(
        repo.add_expense(user_id, created.closure.id, registry_selection(ghost))
            .await,
        Err(ClosureError::ExpenseNotFound(id)) if id == ghost
    ));
}

#[tokio::test]
async fn test_update_expense_through_reopen_cycle() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let client_id = seed_client(&db, user_id, "Acme").await;
    seed_task(&db, user_id, client_id, TaskStatus::Completed, dec!(20), may_2024(3)).await;
    seed_expense(&db, user_id, "Accounting", dec!(150.00), true).await;

    let created = repo.create(create_input(user_id)).await.unwrap();
    let closure_id = created.closure.id;
    let line_id = created.expenses[0].id;

    repo.close(user_id, closure_id).await.unwrap();

    // Closed: the line is frozen.
    assert!(matches!(
        repo.update_expense(
            user_id,
            closure_id,
            line_id,
            UpdateExpenseInput {
                amount: dec!(200.00),
                name: None,
                description: None,
            },
        )
        .await,
        Err(ClosureError::ClosureClosed)
    ));

    // Reopened: the update lands and the totals follow.
    repo.reopen(user_id, closure_id).await.unwrap();
    let updated = repo
        .update_expense(
            user_id,
            closure_id,
            line_id,
            UpdateExpenseInput {
                amount: dec!(200.00),
                name: None,
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.amount, dec!(200.00));

    let read = repo
        .find_with_totals(user_id, closure_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.totals.total_expenses, dec!(200.00));
    assert_eq!(read.totals.final_amount, dec!(1600.00)); // 1800 net - 200

    // Re-closed: frozen again.
    repo.close(user_id, closure_id).await.unwrap();
    assert!(matches!(
        repo.update_expense(
            user_id,
            closure_id,
            line_id,
            UpdateExpenseInput {
                amount: dec!(250.00),
                name: None,
                description: None,
            },
        )
        .await,
        Err(ClosureError::ClosureClosed)
    ));
}

#[tokio::test]
async fn test_update_expense_validation() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let created = repo.create(create_input(user_id)).await.unwrap();
    let line = repo
        .add_expense(
            user_id,
            created.closure.id,
            ExpenseSelection::Manual {
                name: "Hosting".to_string(),
                description: None,
                amount: dec!(20.00),
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        repo.update_expense(
            user_id,
            created.closure.id,
            line.id,
            UpdateExpenseInput {
                amount: dec!(-1.00),
                name: None,
                description: None,
            },
        )
        .await,
        Err(ClosureError::NegativeExpenseAmount)
    ));

    let ghost = Uuid::new_v4();
    assert!(matches!(
        repo.update_expense(
            user_id,
            created.closure.id,
            ghost,
            UpdateExpenseInput {
                amount: dec!(1.00),
                name: None,
                description: None,
            },
        )
        .await,
        Err(ClosureError::ExpenseLineNotFound(id)) if id == ghost
    ));
}

#[tokio::test]
async fn test_remove_expense() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    seed_expense(&db, user_id, "Accounting", dec!(150.00), true).await;
    let created = repo.create(create_input(user_id)).await.unwrap();
    let line_id = created.expenses[0].id;

    repo.remove_expense(user_id, created.closure.id, line_id)
        .await
        .unwrap();

    let read = repo
        .find_with_totals(user_id, created.closure.id)
        .await
        .unwrap()
        .unwrap();
    assert!(read.expenses.is_empty());
    assert_eq!(read.totals.total_expenses, dec!(0));

    // Removing it again is not-found.
    assert!(matches!(
        repo.remove_expense(user_id, created.closure.id, line_id).await,
        Err(ClosureError::ExpenseLineNotFound(_))
    ));
}

#[tokio::test]
async fn test_add_expense_requires_open() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let created = repo.create(create_input(user_id)).await.unwrap();
    repo.close(user_id, created.closure.id).await.unwrap();

    assert!(matches!(
        repo.add_expense(
            user_id,
            created.closure.id,
            ExpenseSelection::Manual {
                name: "Late".to_string(),
                description: None,
                amount: dec!(1.00),
            },
        )
        .await,
        Err(ClosureError::ClosureClosed)
    ));
}

#[tokio::test]
async fn test_registry_changes_leave_snapshot_intact() {
    let db = setup_db().await;
    let repo = ClosureRepository::new(db.clone());
    let user_id = Uuid::new_v4();

    let expense_id = seed_expense(&db, user_id, "Accounting", dec!(150.00), true).await;
    let created = repo.create(create_input(user_id)).await.unwrap();

    // Deactivate, then delete the registry entry entirely.
    let registry = expenses::Entity::find_by_id(expense_id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    let mut registry: expenses::ActiveModel = registry.into();
    registry.is_active = Set(false);
    registry.update(&db).await.unwrap();

    let read = repo
        .find_with_totals(user_id, created.closure.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.expenses[0].amount, dec!(150.00));

    expenses::Entity::delete_by_id(expense_id)
        .exec(&db)
        .await
        .unwrap();

    // Only the provenance marker is cleared; the snapshot itself survives.
    let read = repo
        .find_with_totals(user_id, created.closure.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read.expenses.len(), 1);
    assert_eq!(read.expenses[0].name, "Accounting");
    assert_eq!(read.expenses[0].amount, dec!(150.00));
    assert_eq!(read.expenses[0].expense_id, None);
}
