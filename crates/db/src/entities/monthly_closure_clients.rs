//! `SeaORM` Entity for per-client snapshot rows.
//!
//! Written once when the closure is created; never recomputed from live task
//! data afterward.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_closure_clients")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub closure_id: Uuid,
    pub client_id: Uuid,
    pub total_hours: Decimal,
    pub gross_amount: Decimal,
    pub tax_amount: Decimal,
    pub net_amount: Decimal,
    pub created_at: DateTimeWithTimeZone,
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
        belongs_to = "super::clients::Entity",
        from = "Column::ClientId",
        to = "super::clients::Column::Id"
    )]
    Clients,
}

impl Related<super::monthly_closures::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyClosures.def()
    }
}

impl Related<super::clients::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Clients.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
