use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum RedPackets {
    Table,
    Id,
    TotalAmount,
    RemainingAmount,
    TotalCount,
    RemainingCount,
    Status,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum RedPacketLogs {
    Table,
    Id,
    UserId,
    RedPacketId,
    Amount,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Username,
    Balance,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // red_packets
        manager
            .create_table(
                Table::create()
                    .table(RedPackets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RedPackets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RedPackets::TotalAmount).double().not_null())
                    .col(ColumnDef::new(RedPackets::RemainingAmount).double().not_null())
                    .col(ColumnDef::new(RedPackets::TotalCount).integer().not_null())
                    .col(ColumnDef::new(RedPackets::RemainingCount).integer().not_null())
                    .col(ColumnDef::new(RedPackets::Status).integer().not_null().default(1))
                    .col(
                        ColumnDef::new(RedPackets::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RedPackets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        // red_packet_logs: one row per successful grab, append-only
        manager
            .create_table(
                Table::create()
                    .table(RedPacketLogs::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(RedPacketLogs::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(RedPacketLogs::UserId).big_integer().not_null())
                    .col(
                        ColumnDef::new(RedPacketLogs::RedPacketId)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(RedPacketLogs::Amount).double().not_null())
                    .col(
                        ColumnDef::new(RedPacketLogs::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(RedPacketLogs::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_red_packet_logs_red_packet_id")
                    .table(RedPacketLogs::Table)
                    .col(RedPacketLogs::RedPacketId)
                    .to_owned(),
            )
            .await?;

        // users
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Users::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Users::Username).string().not_null().unique_key())
                    .col(ColumnDef::new(Users::Balance).double().not_null().default(0))
                    .col(
                        ColumnDef::new(Users::CreatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Users::UpdatedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(RedPacketLogs::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(RedPackets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;
        Ok(())
    }
}
