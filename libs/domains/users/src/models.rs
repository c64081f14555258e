use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Account classification. Governs required fields and access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    Organization,
    Doctor,
    Patient,
    Admin,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Organization, Role::Doctor, Role::Patient, Role::Admin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Organization => "ORGANIZATION",
            Role::Doctor => "DOCTOR",
            Role::Patient => "PATIENT",
            Role::Admin => "ADMIN",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| s.to_string())
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("required"));
    }
    Ok(())
}

/// Seeded role reference row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: i16,
    pub role: Role,
}

/// User entity (domain model)
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: Uuid,
    /// Always stored lower-cased
    pub email: String,
    pub password_hash: String,
    pub name: String,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub about: Option<String>,
    pub doctor_type_id: Option<i16>,
    /// Storage filename, e.g. `{id}.png`
    pub profile_picture: Option<String>,
    pub refresh_token: Option<String>,
    pub roles: Vec<Role>,
    pub contact: Option<Contact>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Refresh the mutation audit fields.
    pub fn touch(&mut self, actor: &str) {
        self.updated_at = Utc::now();
        self.updated_by = actor.to_string();
    }
}

/// Contact details, owned one-to-one by a [`User`].
#[derive(Debug, Clone, PartialEq)]
pub struct Contact {
    pub id: Uuid,
    pub user_id: Uuid,
    pub city_id: i16,
    pub street: Option<String>,
    pub building_number: Option<String>,
    pub flat_number: Option<String>,
    pub phone_number1: String,
    pub phone_number2: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

/// Sign-up payload.
///
/// Structural rules live on the fields; password policy and role-dependent
/// rules are applied by the service and merged into the same error map.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewUserRequest {
    #[serde(default)]
    #[validate(
        email(message = "Email is not valid"),
        custom(function = "not_blank", message = "Email must be provided"),
        length(max = 155, message = "Email max length = 155 characters")
    )]
    #[schema(example = "a@b.com")]
    pub email: String,
    #[schema(example = "Aa123456!")]
    pub password: Option<String>,
    #[serde(default)]
    #[validate(
        custom(function = "not_blank", message = "Name must be provided"),
        length(max = 155, message = "Name max length = 155 characters")
    )]
    pub name: String,
    #[validate(length(max = 155, message = "Last name max length = 155 characters"))]
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub doctor_type_id: Option<i16>,
    #[validate(length(max = 255, message = "Max size is 255 characters"))]
    pub about: Option<String>,
    #[validate(required(message = "Contact must be provided"), nested)]
    pub contact: Option<ContactRequest>,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    #[validate(required(message = "City must be provided"))]
    pub city_id: Option<i16>,
    pub street: Option<String>,
    pub building_number: Option<String>,
    pub flat_number: Option<String>,
    #[validate(
        required(message = "Phone number must be provided"),
        length(min = 1, message = "Phone number must be provided")
    )]
    pub phone_number1: Option<String>,
    pub phone_number2: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct SignInRequest {
    #[serde(default)]
    #[validate(
        email(message = "Email is not valid"),
        custom(function = "not_blank", message = "Email must be provided")
    )]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank", message = "Password must be provided"))]
    pub password: String,
}

/// Partial profile update; `None` keeps the stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUser {
    #[validate(length(min = 1, max = 155, message = "Name must be 1-155 characters"))]
    pub name: Option<String>,
    #[validate(length(max = 155, message = "Last name max length = 155 characters"))]
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub doctor_type_id: Option<i16>,
    #[validate(length(max = 255, message = "Max size is 255 characters"))]
    pub about: Option<String>,
    #[validate(nested)]
    pub contact: Option<UpdateContact>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UpdateContact {
    pub city_id: Option<i16>,
    pub street: Option<String>,
    pub building_number: Option<String>,
    pub flat_number: Option<String>,
    #[validate(length(min = 1, message = "Phone number must be provided"))]
    pub phone_number1: Option<String>,
    pub phone_number2: Option<String>,
}

impl User {
    /// Overwrite fields present in `update`. Audit fields are left to the caller.
    ///
    /// A `contact` patch is ignored when no contact is stored; the service
    /// rejects that case before calling this.
    pub fn apply_update(&mut self, update: UpdateUser) {
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(last_name) = update.last_name {
            self.last_name = Some(last_name);
        }
        if let Some(birth_date) = update.birth_date {
            self.birth_date = Some(birth_date);
        }
        if let Some(doctor_type_id) = update.doctor_type_id {
            self.doctor_type_id = Some(doctor_type_id);
        }
        if let Some(about) = update.about {
            self.about = Some(about);
        }
        if let (Some(patch), Some(contact)) = (update.contact, self.contact.as_mut()) {
            contact.apply_update(patch);
        }
    }
}

impl Contact {
    fn apply_update(&mut self, update: UpdateContact) {
        if let Some(city_id) = update.city_id {
            self.city_id = city_id;
        }
        if let Some(street) = update.street {
            self.street = Some(street);
        }
        if let Some(building_number) = update.building_number {
            self.building_number = Some(building_number);
        }
        if let Some(flat_number) = update.flat_number {
            self.flat_number = Some(flat_number);
        }
        if let Some(phone) = update.phone_number1 {
            self.phone_number1 = phone;
        }
        if let Some(phone) = update.phone_number2 {
            self.phone_number2 = Some(phone);
        }
    }
}

/// Public user profile (no password hash, no refresh token)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub doctor_type_id: Option<i16>,
    pub about: Option<String>,
    pub contact: Option<ContactResponse>,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContactResponse {
    pub id: Uuid,
    pub city_id: i16,
    pub street: Option<String>,
    pub building_number: Option<String>,
    pub flat_number: Option<String>,
    pub phone_number1: String,
    pub phone_number2: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: String,
    pub updated_by: String,
}

impl From<Contact> for ContactResponse {
    fn from(contact: Contact) -> Self {
        Self {
            id: contact.id,
            city_id: contact.city_id,
            street: contact.street,
            building_number: contact.building_number,
            flat_number: contact.flat_number,
            phone_number1: contact.phone_number1,
            phone_number2: contact.phone_number2,
            created_at: contact.created_at,
            updated_at: contact.updated_at,
            created_by: contact.created_by,
            updated_by: contact.updated_by,
        }
    }
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            name: user.name,
            last_name: user.last_name,
            birth_date: user.birth_date,
            doctor_type_id: user.doctor_type_id,
            about: user.about,
            contact: user.contact.map(Into::into),
            roles: user.roles.iter().map(|r| r.to_string()).collect(),
            created_at: user.created_at,
            updated_at: user.updated_at,
            created_by: user.created_by,
            updated_by: user.updated_by,
            deleted_at: user.deleted_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub user: UserResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ProfilePictureUrl {
    /// Empty when the user has no stored picture
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, utoipa::IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EmailQuery {
    pub email: String,
}

/// Minimal profile sent to the patient service after registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPatientEvent {
    pub user_id: Uuid,
    pub first_name: String,
    pub last_name: Option<String>,
    pub birth_date: Option<NaiveDate>,
    pub phone_number: Option<String>,
}

impl From<&User> for NewPatientEvent {
    fn from(user: &User) -> Self {
        Self {
            user_id: user.id,
            first_name: user.name.clone(),
            last_name: user.last_name.clone(),
            birth_date: user.birth_date,
            phone_number: user.contact.as_ref().map(|c| c.phone_number1.clone()),
        }
    }
}

/// An uploaded profile picture as received from the client.
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub content_type: Option<String>,
    pub bytes: bytes::Bytes,
}
