pub use sea_orm_migration::prelude::*;

mod m20250301_000000_create_roles;
mod m20250301_000001_create_users;
mod m20250301_000002_create_contacts;
mod m20250301_000003_create_user_roles;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000000_create_roles::Migration),
            Box::new(m20250301_000001_create_users::Migration),
            Box::new(m20250301_000002_create_contacts::Migration),
            Box::new(m20250301_000003_create_user_roles::Migration),
        ]
    }
}
