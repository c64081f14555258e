use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    ConnectionTrait, DatabaseConnection, DbBackend, DbErr, FromQueryResult, Statement,
    TransactionTrait,
};
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{Contact, Role, RoleRecord, User};
use crate::repository::UserRepository;

/// PostgreSQL implementation of UserRepository using SeaORM raw statements
#[derive(Clone)]
pub struct PostgresUserRepository {
    db: DatabaseConnection,
}

impl PostgresUserRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Run a single-row `UPDATE users`; `false` when the id matched nothing.
    async fn execute_for_user(&self, stmt: Statement) -> UserResult<bool> {
        let result = self.db.execute_raw(stmt).await.map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

const USER_COLUMNS: &str = "id, email, password_hash, name, last_name, birth_date, about, \
     doctor_type_id, profile_picture, refresh_token, created_at, updated_at, created_by, \
     updated_by, deleted_at";

#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: Uuid,
    email: String,
    password_hash: String,
    name: String,
    last_name: Option<String>,
    birth_date: Option<NaiveDate>,
    about: Option<String>,
    doctor_type_id: Option<i16>,
    profile_picture: Option<String>,
    refresh_token: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: String,
    updated_by: String,
    deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, FromQueryResult)]
struct ContactRow {
    id: Uuid,
    user_id: Uuid,
    city_id: i16,
    street: Option<String>,
    building_number: Option<String>,
    flat_number: Option<String>,
    phone_number1: String,
    phone_number2: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: String,
    updated_by: String,
}

#[derive(Debug, FromQueryResult)]
struct RoleRow {
    id: i16,
    name: String,
}

impl UserRow {
    fn into_user(self, contact: Option<Contact>, roles: Vec<Role>) -> User {
        User {
            id: self.id,
            email: self.email,
            password_hash: self.password_hash,
            name: self.name,
            last_name: self.last_name,
            birth_date: self.birth_date,
            about: self.about,
            doctor_type_id: self.doctor_type_id,
            profile_picture: self.profile_picture,
            refresh_token: self.refresh_token,
            roles,
            contact,
            created_at: self.created_at,
            updated_at: self.updated_at,
            created_by: self.created_by,
            updated_by: self.updated_by,
            deleted_at: self.deleted_at,
        }
    }
}

impl From<ContactRow> for Contact {
    fn from(row: ContactRow) -> Self {
        Contact {
            id: row.id,
            user_id: row.user_id,
            city_id: row.city_id,
            street: row.street,
            building_number: row.building_number,
            flat_number: row.flat_number,
            phone_number1: row.phone_number1,
            phone_number2: row.phone_number2,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
        }
    }
}

fn db_error(e: DbErr) -> UserError {
    UserError::Database(e.to_string())
}

fn is_unique_violation(e: &DbErr) -> bool {
    let err_str = e.to_string();
    err_str.contains("duplicate key") || err_str.contains("unique constraint")
}

fn statement(sql: &str, values: impl IntoIterator<Item = sea_orm::Value>) -> Statement {
    Statement::from_sql_and_values(DbBackend::Postgres, sql, values)
}

/// Attach contact and role names to a user row.
async fn hydrate<C: ConnectionTrait>(conn: &C, row: UserRow) -> UserResult<User> {
    let contact = ContactRow::find_by_statement(statement(
        "SELECT * FROM contacts WHERE user_id = $1",
        [row.id.into()],
    ))
    .one(conn)
    .await
    .map_err(db_error)?
    .map(Contact::from);

    let roles = RoleRow::find_by_statement(statement(
        r#"
            SELECT r.id, r.name
            FROM user_roles ur
            JOIN roles r ON r.id = ur.role_id
            WHERE ur.user_id = $1
            ORDER BY r.id
        "#,
        [row.id.into()],
    ))
    .all(conn)
    .await
    .map_err(db_error)?
    .into_iter()
    .filter_map(|r| Role::from_str(&r.name).ok())
    .collect();

    Ok(row.into_user(contact, roles))
}

async fn find_user<C: ConnectionTrait>(
    conn: &C,
    filter: &str,
    value: sea_orm::Value,
) -> UserResult<Option<User>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {filter}");

    let row = UserRow::find_by_statement(statement(&sql, [value]))
        .one(conn)
        .await
        .map_err(db_error)?;

    match row {
        Some(row) => hydrate(conn, row).await.map(Some),
        None => Ok(None),
    }
}

#[async_trait]
impl UserRepository for PostgresUserRepository {
    async fn create(&self, user: User, contact: Contact) -> UserResult<User> {
        let email = user.email.to_lowercase();
        let txn = self.db.begin().await.map_err(db_error)?;

        let insert_user = statement(
            r#"
                INSERT INTO users (id, email, password_hash, name, last_name, birth_date, about,
                    doctor_type_id, profile_picture, refresh_token, created_at, updated_at,
                    created_by, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
            [
                user.id.into(),
                email.clone().into(),
                user.password_hash.clone().into(),
                user.name.clone().into(),
                user.last_name.clone().into(),
                user.birth_date.into(),
                user.about.clone().into(),
                user.doctor_type_id.into(),
                user.profile_picture.clone().into(),
                user.refresh_token.clone().into(),
                user.created_at.into(),
                user.updated_at.into(),
                user.created_by.clone().into(),
                user.updated_by.clone().into(),
            ],
        );

        txn.execute_raw(insert_user).await.map_err(|e| {
            if is_unique_violation(&e) {
                UserError::EmailInUse(email.clone())
            } else {
                db_error(e)
            }
        })?;

        let insert_contact = statement(
            r#"
                INSERT INTO contacts (id, user_id, city_id, street, building_number, flat_number,
                    phone_number1, phone_number2, created_at, updated_at, created_by, updated_by)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
            [
                contact.id.into(),
                user.id.into(),
                contact.city_id.into(),
                contact.street.clone().into(),
                contact.building_number.clone().into(),
                contact.flat_number.clone().into(),
                contact.phone_number1.clone().into(),
                contact.phone_number2.clone().into(),
                contact.created_at.into(),
                contact.updated_at.into(),
                contact.created_by.clone().into(),
                contact.updated_by.clone().into(),
            ],
        );
        txn.execute_raw(insert_contact).await.map_err(db_error)?;

        for role in &user.roles {
            let insert_role = statement(
                "INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE name = $2",
                [user.id.into(), role.as_str().into()],
            );
            txn.execute_raw(insert_role).await.map_err(db_error)?;
        }

        txn.commit().await.map_err(db_error)?;

        tracing::info!(user_id = %user.id, email = %email, "Created user");
        Ok(User {
            email,
            contact: Some(contact),
            ..user
        })
    }

    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
        find_user(&self.db, "id = $1", id.into()).await
    }

    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
        find_user(&self.db, "email = lower($1)", email.into()).await
    }

    async fn email_exists(&self, email: &str) -> UserResult<bool> {
        #[derive(FromQueryResult)]
        struct ExistsResult {
            exists: bool,
        }

        let result = ExistsResult::find_by_statement(statement(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = lower($1)) AS exists",
            [email.into()],
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?;

        Ok(result.map(|r| r.exists).unwrap_or(false))
    }

    async fn update(&self, user: User) -> UserResult<User> {
        let txn = self.db.begin().await.map_err(db_error)?;

        let update_user = statement(
            r#"
                UPDATE users
                SET name = $2, last_name = $3, birth_date = $4, about = $5, doctor_type_id = $6,
                    updated_at = $7, updated_by = $8
                WHERE id = $1
            "#,
            [
                user.id.into(),
                user.name.clone().into(),
                user.last_name.clone().into(),
                user.birth_date.into(),
                user.about.clone().into(),
                user.doctor_type_id.into(),
                user.updated_at.into(),
                user.updated_by.clone().into(),
            ],
        );

        let result = txn.execute_raw(update_user).await.map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(UserError::NotFound(user.id));
        }

        if let Some(contact) = &user.contact {
            let update_contact = statement(
                r#"
                    UPDATE contacts
                    SET city_id = $2, street = $3, building_number = $4, flat_number = $5,
                        phone_number1 = $6, phone_number2 = $7, updated_at = $8, updated_by = $9
                    WHERE id = $1
                "#,
                [
                    contact.id.into(),
                    contact.city_id.into(),
                    contact.street.clone().into(),
                    contact.building_number.clone().into(),
                    contact.flat_number.clone().into(),
                    contact.phone_number1.clone().into(),
                    contact.phone_number2.clone().into(),
                    contact.updated_at.into(),
                    contact.updated_by.clone().into(),
                ],
            );
            txn.execute_raw(update_contact).await.map_err(db_error)?;
        }

        txn.commit().await.map_err(db_error)?;

        tracing::info!(user_id = %user.id, "Updated user");
        self.get_by_id(user.id)
            .await?
            .ok_or(UserError::NotFound(user.id))
    }

    async fn set_refresh_token(&self, id: Uuid, token: &str, actor: &str) -> UserResult<bool> {
        self.execute_for_user(statement(
            r#"
                UPDATE users
                SET refresh_token = $2, updated_at = NOW(), updated_by = $3
                WHERE id = $1
            "#,
            [id.into(), token.into(), actor.into()],
        ))
        .await
    }

    async fn set_profile_picture(&self, id: Uuid, key: &str, actor: &str) -> UserResult<bool> {
        self.execute_for_user(statement(
            r#"
                UPDATE users
                SET profile_picture = $2, updated_at = NOW(), updated_by = $3
                WHERE id = $1
            "#,
            [id.into(), key.into(), actor.into()],
        ))
        .await
    }

    async fn soft_delete(&self, id: Uuid, actor: &str) -> UserResult<bool> {
        self.execute_for_user(statement(
            r#"
                UPDATE users
                SET deleted_at = COALESCE(deleted_at, NOW()), updated_at = NOW(), updated_by = $2
                WHERE id = $1
            "#,
            [id.into(), actor.into()],
        ))
        .await
    }

    async fn find_role_by_name(&self, role: Role) -> UserResult<Option<RoleRecord>> {
        let row = RoleRow::find_by_statement(statement(
            "SELECT id, name FROM roles WHERE name = $1",
            [role.as_str().into()],
        ))
        .one(&self.db)
        .await
        .map_err(db_error)?;

        Ok(row.map(|r| RoleRecord { id: r.id, role }))
    }
}
