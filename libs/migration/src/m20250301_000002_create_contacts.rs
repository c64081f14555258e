use sea_orm_migration::{prelude::*, schema::*};

use crate::m20250301_000001_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Contacts::Table)
                    .if_not_exists()
                    .col(pk_uuid(Contacts::Id))
                    .col(uuid(Contacts::UserId).unique_key())
                    .col(small_integer(Contacts::CityId))
                    .col(string_len_null(Contacts::Street, 255))
                    .col(string_len_null(Contacts::BuildingNumber, 50))
                    .col(string_len_null(Contacts::FlatNumber, 50))
                    .col(string_len(Contacts::PhoneNumber1, 50))
                    .col(string_len_null(Contacts::PhoneNumber2, 50))
                    .col(
                        timestamp_with_time_zone(Contacts::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Contacts::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(string_len(Contacts::CreatedBy, 155))
                    .col(string_len(Contacts::UpdatedBy, 155))
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_contacts_user_id")
                            .from(Contacts::Table, Contacts::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Contacts::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
enum Contacts {
    Table,
    Id,
    UserId,
    CityId,
    Street,
    BuildingNumber,
    FlatNumber,
    PhoneNumber1,
    PhoneNumber2,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
}
