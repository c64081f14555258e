use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Emails are stored lower-cased, so a plain unique key is case-insensitive
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk_uuid(Users::Id))
                    .col(string_len(Users::Email, 155).unique_key())
                    .col(text(Users::PasswordHash))
                    .col(string_len(Users::Name, 155))
                    .col(string_len_null(Users::LastName, 155))
                    .col(date_null(Users::BirthDate))
                    .col(string_len_null(Users::About, 255))
                    .col(small_integer_null(Users::DoctorTypeId))
                    .col(string_len_null(Users::ProfilePicture, 255))
                    .col(text_null(Users::RefreshToken))
                    .col(
                        timestamp_with_time_zone(Users::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Users::UpdatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .col(string_len(Users::CreatedBy, 155))
                    .col(string_len(Users::UpdatedBy, 155))
                    .col(timestamp_with_time_zone_null(Users::DeletedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_users_created_at")
                    .table(Users::Table)
                    .col(Users::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Users::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Users {
    Table,
    Id,
    Email,
    PasswordHash,
    Name,
    LastName,
    BirthDate,
    About,
    DoctorTypeId,
    ProfilePicture,
    RefreshToken,
    CreatedAt,
    UpdatedAt,
    CreatedBy,
    UpdatedBy,
    DeletedAt,
}
