//! `SeaORM` Entity for per-expense snapshot rows.
//!
//! Detached from the live expense registry once created; `expense_id` is only
//! a provenance marker and is nulled if the registry entry is deleted.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_closure_expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub closure_id: Uuid,
    /// Registry reference, null for manually entered lines.
    pub expense_id: Option<Uuid>,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::monthly_closures::Entity",
        from = "Column::ClosureId",
        to = "super::monthly_closures::Column::Id"
    )]
    MonthlyClosures,
    #[sea_orm(
        belongs_to = "super::expenses::Entity",
        from = "Column::ExpenseId",
        to = "super::expenses::Column::Id"
    )]
    Expenses,
}

impl Related<super::monthly_closures::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyClosures.def()
    }
}

impl Related<super::expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
