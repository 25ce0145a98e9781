use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "redemptions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,

    /// A reward is redeemed at most once.
    #[sea_orm(unique)]
    pub reward_id: Uuid,

    pub processed_by_id: Uuid,

    pub notes: Option<String>,

    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::rewards::Entity",
        from = "Column::RewardId",
        to = "super::rewards::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Rewards,
}

impl Related<super::rewards::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Rewards.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
