use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::CodeStatus;

/// One-time numeric code a customer shows to staff to earn a stamp.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "customer_codes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// 6-digit value. Unique among ACTIVE rows only (partial index), so a
    /// value can be handed out again once its previous holder is terminal.
    pub code: String,

    pub user_id: Uuid,

    pub status: CodeStatus,

    pub expires_at: DateTimeUtc,

    pub created_at: DateTimeUtc,

    pub used_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Users,
    #[sea_orm(has_one = "super::stamps::Entity")]
    Stamps,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::stamps::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Stamps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
