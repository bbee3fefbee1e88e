use chrono::Months;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    #[sea_orm(unique)]
    pub name: String,
    pub join_date: Date,
    pub status: Status,
    pub position: Option<String>,
}

/// Employment status, stored as its wire string.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(None)")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    #[sea_orm(string_value = "ACTIVE")]
    Active,
    #[sea_orm(string_value = "INACTIVE")]
    Inactive,
    #[sea_orm(string_value = "ON_LEAVE")]
    OnLeave,
}

#[derive(Copy, Clone, Debug, EnumIter)]
pub enum Relation {}

impl RelationTrait for Relation {
    fn def(&self) -> RelationDef {
        panic!("no relations")
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Long-tenured active employee: `ACTIVE` and joined strictly more than
    /// five years before `today`. Not persisted; computed on read. `today`
    /// is a parameter so the predicate stays deterministic under test.
    pub fn is_flagged(&self, today: Date) -> bool {
        if self.status != Status::Active {
            return false;
        }
        self.join_date < today - Months::new(60)
    }
}
