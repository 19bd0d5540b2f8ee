//! `SeaORM` Entity for the monthly closures table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::ClosureStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_closures")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    /// Billing month, 1-12. Unique per (user, month, year).
    pub month: i16,
    pub year: i32,
    pub tax_percentage: Decimal,
    /// Applies uniformly to all clients for the period.
    pub hourly_rate: Decimal,
    pub notes: Option<String>,
    pub status: ClosureStatus,
    /// Set while closed, null while open.
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::monthly_closure_clients::Entity")]
    MonthlyClosureClients,
    #[sea_orm(has_many = "super::monthly_closure_expenses::Entity")]
    MonthlyClosureExpenses,
}

impl Related<super::monthly_closure_clients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyClosureClients.def()
    }
}

impl Related<super::monthly_closure_expenses::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyClosureExpenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
