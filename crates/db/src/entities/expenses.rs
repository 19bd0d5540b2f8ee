//! `SeaORM` Entity for the expenses registry table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub amount: Decimal,
    /// Recurring expenses are auto-proposed for every new closure.
    pub is_recurring: bool,
    pub is_active: bool,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monthly_closure_expenses::Entity")]
    MonthlyClosureExpenses,
}

impl Related<super::monthly_closure_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyClosureExpenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
