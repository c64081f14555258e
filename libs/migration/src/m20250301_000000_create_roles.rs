use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Roles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Roles::Id)
                            .small_integer()
                            .not_null()
                            .primary_key(),
                    )
                    .col(string_len(Roles::Name, 50).unique_key())
                    .to_owned(),
            )
            .await?;

        // Fixed reference set; ids are stable across environments
        manager
            .get_connection()
            .execute_unprepared(
                r#"
                INSERT INTO roles (id, name)
                VALUES
                    (1, 'ORGANIZATION'),
                    (2, 'DOCTOR'),
                    (3, 'PATIENT'),
                    (4, 'ADMIN')
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Roles::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub(crate) enum Roles {
    Table,
    Id,
    Name,
}
