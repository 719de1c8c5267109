use sea_orm::entity::prelude::*;

/// A watchable title. `avg_rating` and `number_rating` are only written by
/// the rating aggregator.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "watch_list")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(indexed)]
    pub platform_id: i32,
    pub title: String,
    pub storyline: String,
    pub active: bool,
    pub avg_rating: f64,
    pub number_rating: i32,
    pub created_at: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::platform::Entity",
        from = "Column::PlatformId",
        to = "super::platform::Column::Id",
        on_delete = "Cascade"
    )]
    Platform,
    #[sea_orm(has_many = "super::review::Entity")]
    Review,
}

impl Related<super::platform::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Platform.def()
    }
}

impl Related<super::review::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Review.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
