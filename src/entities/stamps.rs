use sea_orm::entity::prelude::*;

use super::sea_orm_active_enums::StampStatus;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
#[sea_orm(table_name = "stamps")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Recipient (customer).
    pub user_id: Uuid,

    /// A code yields at most one stamp.
    #[sea_orm(unique)]
    pub customer_code_id: Option<Uuid>,

    /// Staff member who awarded the stamp.
    pub created_by_id: Uuid,

    pub status: StampStatus,

    pub created_at: DateTimeUtc,

    pub redeemed_at: Option<DateTimeUtc>,
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
    #[sea_orm(
        belongs_to = "super::customer_codes::Entity",
        from = "Column::CustomerCodeId",
        to = "super::customer_codes::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    CustomerCodes,
}

impl Related<super::customer_codes::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CustomerCodes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
