use crate::entities::prelude::*;
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Schema;

#[derive(DeriveMigrationName)]
pub struct Migration;

/// At most one ACTIVE code per customer, and ACTIVE code values never
/// collide. Terminal rows (EXPIRED/USED) are outside both indexes.
const PARTIAL_INDEXES: [&str; 2] = [
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_customer_codes_active_user \
     ON customer_codes (user_id) WHERE status = 'ACTIVE'",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_customer_codes_active_code \
     ON customer_codes (code) WHERE status = 'ACTIVE'",
];

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let backend = manager.get_database_backend();
        let schema = Schema::new(backend);

        manager
            .create_table(
                schema
                    .create_table_from_entity(Users)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(CustomerCodes)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Stamps)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Rewards)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(Redemptions)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(SystemConfig)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                schema
                    .create_table_from_entity(AuditLogs)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        let conn = manager.get_connection();
        for sql in PARTIAL_INDEXES {
            conn.execute_unprepared(sql).await?;
        }

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_stamps_user_status")
                    .table(Stamps)
                    .col(crate::entities::stamps::Column::UserId)
                    .col(crate::entities::stamps::Column::Status)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_rewards_user")
                    .table(Rewards)
                    .col(crate::entities::rewards::Column::UserId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AuditLogs).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SystemConfig).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Redemptions).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Rewards).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Stamps).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CustomerCodes).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users).to_owned())
            .await?;

        Ok(())
    }
}
