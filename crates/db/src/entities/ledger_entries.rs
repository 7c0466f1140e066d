//! `SeaORM` Entity for the append-only ledger_entries table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "ledger_entries")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub subject_id: Uuid,
    pub period: i32,
    pub balance_type: String,
    pub entry_type: String,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub amount: Decimal,
    pub reference_type: String,
    pub reference_id: String,
    pub reference_status: Option<String>,
    pub drawn_from: Option<Uuid>,
    pub expires_on: Option<Date>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "Entity",
        from = "Column::DrawnFrom",
        to = "Column::Id"
    )]
    Bucket,
}

impl ActiveModelBehavior for ActiveModel {}
