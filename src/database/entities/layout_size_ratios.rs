use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "layout_size_ratios")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub layout_id: i32,
    pub size: String,
    pub ratio: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::layouts::Entity",
        from = "Column::LayoutId",
        to = "super::layouts::Column::Id",
        on_delete = "Cascade"
    )]
    Layouts,
}

impl Related<super::layouts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Layouts.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
