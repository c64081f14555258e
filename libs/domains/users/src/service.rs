use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum_helpers::errors::{InvalidFields, invalid_fields, merge};
use axum_helpers::{AuthContext, JwtAuth, TokenSubject};
use chrono::Utc;
use std::collections::BTreeSet;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{UserError, UserResult};
use crate::media::{MediaError, MediaStore};
use crate::models::{
    Contact, NewPatientEvent, NewUserRequest, PictureUpload, ProfilePictureUrl, Role,
    SignInRequest, SignInResponse, UpdateUser, User, UserResponse,
};
use crate::publisher::PatientPublisher;
use crate::repository::UserRepository;
use crate::validation::{password_required, validate_password, validate_role_fields};

pub const PROFILE_PICTURE_URL_TTL: Duration = Duration::from_secs(3600);
pub const PROFILE_PICTURE_CONTENT_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];
pub const INVALID_FILE_EXTENSION: &str = "Invalid file extension";

/// Roles allowed to read profiles other than their own.
const PROFILE_READERS: [&str; 3] = ["ADMIN", "ORGANIZATION", "DOCTOR"];

/// Verified against when no live account matches the email.
static MISSING_ACCOUNT_HASH: LazyLock<Option<String>> =
    LazyLock::new(|| hash_password("no-account-matches-this").ok());

/// Registration, authentication and profile management.
pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    jwt: JwtAuth,
    publisher: Option<Arc<dyn PatientPublisher>>,
    media: Option<Arc<dyn MediaStore>>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(repository: R, jwt: JwtAuth) -> Self {
        Self {
            repository: Arc::new(repository),
            jwt,
            publisher: None,
            media: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn PatientPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_media_store(mut self, media: Arc<dyn MediaStore>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn jwt(&self) -> &JwtAuth {
        &self.jwt
    }

    /// Create an account with its contact and notify the patient service.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: NewUserRequest) -> UserResult<UserResponse> {
        let requested = self.validate_new_user(&input)?;

        let email = input.email.trim().to_lowercase();
        if self.repository.email_exists(&email).await? {
            return Err(UserError::EmailInUse(email));
        }

        let roles = self.resolve_roles(&requested).await?;
        let password_hash = hash_password(input.password.as_deref().unwrap_or_default())?;

        let now = Utc::now();
        let user_id = Uuid::now_v7();
        let contact_input = input.contact.unwrap_or_default();

        let user = User {
            id: user_id,
            email: email.clone(),
            password_hash,
            name: input.name,
            last_name: input.last_name,
            birth_date: input.birth_date,
            about: input.about,
            doctor_type_id: input.doctor_type_id,
            profile_picture: None,
            refresh_token: None,
            roles,
            contact: None,
            created_at: now,
            updated_at: now,
            created_by: email.clone(),
            updated_by: email.clone(),
            deleted_at: None,
        };
        let contact = Contact {
            id: Uuid::now_v7(),
            user_id,
            city_id: contact_input.city_id.unwrap_or_default(),
            street: contact_input.street,
            building_number: contact_input.building_number,
            flat_number: contact_input.flat_number,
            phone_number1: contact_input.phone_number1.unwrap_or_default(),
            phone_number2: contact_input.phone_number2,
            created_at: now,
            updated_at: now,
            created_by: email.clone(),
            updated_by: email,
        };

        let created = self.repository.create(user, contact).await?;
        tracing::info!(user_id = %created.id, "User registered");

        self.notify_new_patient(&created);

        Ok(created.into())
    }

    /// Structural, password and role-dependent rules in one map; then the
    /// role list itself. Returns the distinct role names requested.
    fn validate_new_user(&self, input: &NewUserRequest) -> UserResult<Vec<String>> {
        let mut fields: InvalidFields = match input.validate() {
            Ok(()) => InvalidFields::new(),
            Err(errors) => invalid_fields(&errors),
        };

        let password = input.password.as_deref();
        if let Some(message) = password_required(password) {
            merge(&mut fields, "password", message);
        }
        for violation in validate_password(password) {
            merge(&mut fields, "password", violation);
        }

        let known: Vec<Role> = input.roles.iter().filter_map(|r| r.parse().ok()).collect();
        for (field, message) in validate_role_fields(&known, input.birth_date, input.doctor_type_id)
        {
            merge(&mut fields, field, message);
        }

        if !fields.is_empty() {
            return Err(UserError::Validation(fields));
        }

        let requested: BTreeSet<String> = input
            .roles
            .iter()
            .map(|r| r.trim().to_uppercase())
            .filter(|r| !r.is_empty())
            .collect();
        if requested.is_empty() {
            return Err(UserError::InvalidRoles);
        }

        Ok(requested.into_iter().collect())
    }

    /// Every name must parse and exist in the role reference set.
    async fn resolve_roles(&self, names: &[String]) -> UserResult<Vec<Role>> {
        let mut roles = Vec::with_capacity(names.len());
        for name in names {
            let role: Role = name
                .parse()
                .map_err(|_| UserError::RoleNotFound(name.clone()))?;
            let record = self
                .repository
                .find_role_by_name(role)
                .await?
                .ok_or_else(|| UserError::RoleNotFound(name.clone()))?;
            if !roles.contains(&record.role) {
                roles.push(record.role);
            }
        }
        Ok(roles)
    }

    fn notify_new_patient(&self, user: &User) {
        let Some(publisher) = self.publisher.clone() else {
            tracing::debug!(user_id = %user.id, "Patient publishing disabled");
            return;
        };

        let event = NewPatientEvent::from(user);
        tokio::spawn(async move {
            if let Err(e) = publisher.publish(&event).await {
                tracing::warn!(user_id = %event.user_id, error = %e, "Failed to publish new patient");
            }
        });
    }

    /// Verify credentials, issue a token pair and rotate the stored refresh token.
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn authenticate(&self, input: SignInRequest) -> UserResult<SignInResponse> {
        let email = input.email.trim().to_lowercase();
        self.verify_credentials(&email, &input.password).await?;

        let mut user = self
            .repository
            .get_by_email(&email)
            .await?
            .ok_or_else(|| UserError::EmailNotFound(email.clone()))?;

        let roles: Vec<String> = user.roles.iter().map(|r| r.to_string()).collect();
        let subject = TokenSubject {
            user_id: user.id,
            email: &user.email,
            name: &user.name,
            roles: &roles,
        };
        let access_token = self.jwt.create_access_token(&subject)?;
        let refresh_token = self.jwt.create_refresh_token(&subject)?;

        let actor = user.email.clone();
        if !self
            .repository
            .set_refresh_token(user.id, &refresh_token, &actor)
            .await?
        {
            return Err(UserError::EmailNotFound(email));
        }
        user.refresh_token = Some(refresh_token.clone());
        user.touch(&actor);

        tracing::info!(user_id = %user.id, "User signed in");
        Ok(SignInResponse {
            access_token,
            refresh_token,
            user: user.into(),
        })
    }

    /// Unknown, soft-deleted and wrong-password accounts are indistinguishable.
    async fn verify_credentials(&self, email: &str, password: &str) -> UserResult<()> {
        let live = self
            .repository
            .get_by_email(email)
            .await?
            .filter(|u| !u.is_deleted());
        let Some(user) = live else {
            if let Some(hash) = MISSING_ACCOUNT_HASH.as_deref() {
                verify_password(password, hash)?;
            }
            return Err(UserError::InvalidCredentials);
        };

        if !verify_password(password, &user.password_hash)? {
            tracing::info!(user_id = %user.id, "Sign-in rejected");
            return Err(UserError::InvalidCredentials);
        }
        Ok(())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn get_by_id(&self, id: Uuid, actor: &AuthContext) -> UserResult<UserResponse> {
        ensure_can_read(actor, id)?;
        Ok(self.find_user(id).await?.into())
    }

    /// Partial update; the merged record must still satisfy the role rules.
    #[instrument(skip(self, patch, actor), fields(actor = %actor.user_id))]
    pub async fn update_by_id(
        &self,
        id: Uuid,
        patch: UpdateUser,
        actor: &AuthContext,
    ) -> UserResult<UserResponse> {
        ensure_can_modify(actor, id)?;

        let mut fields = match patch.validate() {
            Ok(()) => InvalidFields::new(),
            Err(errors) => invalid_fields(&errors),
        };

        let mut user = self.find_user(id).await?;
        if patch.contact.is_some() && user.contact.is_none() {
            merge(&mut fields, "contact", "Contact not found");
        }
        user.apply_update(patch);

        for (field, message) in validate_role_fields(&user.roles, user.birth_date, user.doctor_type_id)
        {
            merge(&mut fields, field, message);
        }
        if !fields.is_empty() {
            return Err(UserError::Validation(fields));
        }

        user.touch(&actor.email);
        if let Some(contact) = user.contact.as_mut() {
            contact.updated_at = user.updated_at;
            contact.updated_by = actor.email.clone();
        }

        let updated = self.repository.update(user).await?;
        tracing::info!(user_id = %id, "User updated");
        Ok(updated.into())
    }

    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn delete_by_id(&self, id: Uuid, actor: &AuthContext) -> UserResult<()> {
        ensure_can_modify(actor, id)?;

        if !self.repository.soft_delete(id, &actor.email).await? {
            return Err(UserError::NotFound(id));
        }
        tracing::info!(user_id = %id, "User soft-deleted");
        Ok(())
    }

    /// Store the picture as `{id}.jpeg` / `{id}.png` and remember the filename.
    #[instrument(skip(self, upload, actor), fields(actor = %actor.user_id, size = upload.bytes.len()))]
    pub async fn upload_profile_picture(
        &self,
        id: Uuid,
        upload: PictureUpload,
        actor: &AuthContext,
    ) -> UserResult<()> {
        ensure_can_modify(actor, id)?;

        self.find_user(id).await?;
        let extension = picture_extension(upload.content_type.as_deref())?;
        let media = self.media.as_ref().ok_or(MediaError::NotConfigured)?;

        let key = format!("{}{}", id, extension);
        media.put(&key, upload.bytes).await?;

        if !self
            .repository
            .set_profile_picture(id, &key, &actor.email)
            .await?
        {
            return Err(UserError::NotFound(id));
        }

        tracing::info!(user_id = %id, "Profile picture stored");
        Ok(())
    }

    /// Empty URL when there is nothing to show.
    #[instrument(skip(self, actor), fields(actor = %actor.user_id))]
    pub async fn profile_picture_url(
        &self,
        id: Uuid,
        actor: &AuthContext,
    ) -> UserResult<ProfilePictureUrl> {
        ensure_can_read(actor, id)?;

        let user = self.find_user(id).await?;
        let (Some(key), Some(media)) = (user.profile_picture, self.media.as_ref()) else {
            return Ok(ProfilePictureUrl { url: String::new() });
        };

        if !media.exists(&key).await? {
            tracing::warn!(user_id = %id, key = %key, "Profile picture missing from storage");
            return Ok(ProfilePictureUrl { url: String::new() });
        }

        let url = media.presign(&key, PROFILE_PICTURE_URL_TTL).await?;
        Ok(ProfilePictureUrl { url })
    }

    pub async fn is_email_available(&self, email: &str) -> UserResult<bool> {
        let email = email.trim().to_lowercase();
        Ok(!self.repository.email_exists(&email).await?)
    }

    async fn find_user(&self, id: Uuid) -> UserResult<User> {
        self.repository
            .get_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))
    }
}

fn ensure_can_read(actor: &AuthContext, id: Uuid) -> UserResult<()> {
    if actor.is_self(id) || actor.has_any_role(&PROFILE_READERS) {
        Ok(())
    } else {
        Err(UserError::Forbidden)
    }
}

fn ensure_can_modify(actor: &AuthContext, id: Uuid) -> UserResult<()> {
    if actor.is_self(id) || actor.has_role(Role::Admin.as_str()) {
        Ok(())
    } else {
        Err(UserError::Forbidden)
    }
}

/// `.jpeg` for jpeg/jpg content types, `.png` for png, anything else is rejected.
fn picture_extension(content_type: Option<&str>) -> UserResult<&'static str> {
    match content_type {
        Some(ct) if PROFILE_PICTURE_CONTENT_TYPES.contains(&ct) => {
            if ct.contains("jpeg") || ct.contains("jpg") {
                Ok(".jpeg")
            } else {
                Ok(".png")
            }
        }
        _ => Err(UserError::invalid_field("file", INVALID_FILE_EXTENSION)),
    }
}

fn hash_password(password: &str) -> UserResult<String> {
    let salt = SaltString::generate(&mut OsRng);

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| UserError::PasswordHash(e.to_string()))
}

fn verify_password(password: &str, hash: &str) -> UserResult<bool> {
    let parsed_hash = PasswordHash::new(hash).map_err(|e| UserError::PasswordHash(e.to_string()))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaStore;
    use crate::models::ContactRequest;
    use crate::publisher::{MockPatientPublisher, PublishError};
    use crate::repository::{InMemoryUserRepository, MockUserRepository};
    use axum_helpers::JwtConfig;
    use crate::models::RoleRecord;
    use crate::repository::fixtures;
    use chrono::NaiveDate;
    use tokio::sync::{Notify, mpsc};

    fn jwt() -> JwtAuth {
        JwtAuth::new(&JwtConfig::new("service-test-secret-with-enough-length").unwrap())
    }

    fn service() -> UserService<InMemoryUserRepository> {
        UserService::new(InMemoryUserRepository::new(), jwt())
    }

    fn sign_up(email: &str, roles: &[&str]) -> NewUserRequest {
        NewUserRequest {
            email: email.to_string(),
            password: Some("Aa123456!".to_string()),
            name: "A".to_string(),
            birth_date: NaiveDate::from_ymd_opt(2000, 1, 1),
            contact: Some(ContactRequest {
                city_id: Some(1),
                phone_number1: Some("1".to_string()),
                ..Default::default()
            }),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            ..Default::default()
        }
    }

    fn actor(user_id: Uuid, roles: &[&str]) -> AuthContext {
        AuthContext {
            user_id,
            email: "actor@clinic.kz".to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
        }
    }

    fn validation_fields(err: UserError) -> InvalidFields {
        match err {
            UserError::Validation(fields) => fields,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_register_patient() {
        let service = service();

        let user = service.register(sign_up("A@B.com", &["PATIENT"])).await.unwrap();

        assert_eq!(user.email, "a@b.com");
        assert_eq!(user.roles, vec!["PATIENT"]);
        assert_eq!(user.created_by, "a@b.com");
        assert_eq!(user.contact.as_ref().unwrap().phone_number1, "1");
        assert!(!serde_json::to_string(&user).unwrap().contains("Aa123456!"));
    }

    #[tokio::test]
    async fn test_register_reports_every_violation_at_once() {
        let service = service();
        let mut input = sign_up("not-an-email", &["DOCTOR"]);
        input.password = Some("short".to_string());
        input.birth_date = None;

        let fields = validation_fields(service.register(input).await.unwrap_err());

        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert_eq!(fields["birthDate"], "Invalid birth date");
        assert_eq!(fields["doctorTypeId"], "Invalid doctor type");
    }

    #[tokio::test]
    async fn test_register_requires_password() {
        let mut input = sign_up("a@b.com", &["ADMIN"]);
        input.password = None;

        let fields = validation_fields(service().register(input).await.unwrap_err());
        assert_eq!(fields["password"], "Password must be provided");
    }

    #[tokio::test]
    async fn test_register_requires_roles() {
        let result = service().register(sign_up("a@b.com", &[])).await;
        assert!(matches!(result, Err(UserError::InvalidRoles)));
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_role_before_writing() {
        let service = service();

        let result = service.register(sign_up("a@b.com", &["NURSE"])).await;

        assert!(matches!(result, Err(UserError::RoleNotFound(r)) if r == "NURSE"));
        assert!(service.is_email_available("a@b.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_register_fails_when_role_is_not_seeded() {
        let service = UserService::new(InMemoryUserRepository::with_roles(Vec::new()), jwt());

        let result = service.register(sign_up("a@b.com", &["ADMIN"])).await;
        assert!(matches!(result, Err(UserError::RoleNotFound(r)) if r == "ADMIN"));
    }

    #[tokio::test]
    async fn test_register_same_email_twice() {
        let service = service();
        let first = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        let result = service.register(sign_up("A@b.COM", &["ADMIN"])).await;
        assert!(matches!(result, Err(UserError::EmailInUse(e)) if e == "a@b.com"));

        let ctx = actor(first.id, &[]);
        let stored = service.get_by_id(first.id, &ctx).await.unwrap();
        assert_eq!(stored.roles, vec!["PATIENT"]);
    }

    #[tokio::test]
    async fn test_register_publishes_new_patient() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut publisher = MockPatientPublisher::new();
        publisher.expect_publish().times(1).returning(move |event| {
            tx.send(event.clone()).ok();
            Ok(())
        });
        let service = service().with_publisher(Arc::new(publisher));

        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.user_id, user.id);
        assert_eq!(event.first_name, "A");
        assert_eq!(event.phone_number.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_register_succeeds_when_publishing_fails() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut publisher = MockPatientPublisher::new();
        publisher.expect_publish().returning(move |_| {
            tx.send(()).ok();
            let err = serde_json::from_str::<u8>("x").unwrap_err();
            Err(PublishError::Serialize(err))
        });
        let service = service().with_publisher(Arc::new(publisher));

        assert!(service.register(sign_up("a@b.com", &["PATIENT"])).await.is_ok());
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_register_translates_store_conflict() {
        let mut repo = MockUserRepository::new();
        repo.expect_email_exists().returning(|_| Ok(false));
        repo.expect_find_role_by_name()
            .returning(|role| Ok(Some(crate::models::RoleRecord { id: 3, role })));
        repo.expect_create()
            .returning(|user, _| Err(UserError::EmailInUse(user.email)));
        let service = UserService::new(repo, jwt());

        let result = service.register(sign_up("race@b.com", &["PATIENT"])).await;
        assert!(matches!(result, Err(UserError::EmailInUse(e)) if e == "race@b.com"));
    }

    #[tokio::test]
    async fn test_authenticate_issues_tokens_and_rotates_refresh_token() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        let credentials = SignInRequest {
            email: "A@B.com".into(),
            password: "Aa123456!".into(),
        };
        let first = service.authenticate(credentials.clone()).await.unwrap();
        let second = service.authenticate(credentials).await.unwrap();

        assert!(!first.access_token.is_empty());
        assert!(!first.refresh_token.is_empty());
        assert_ne!(first.access_token, first.refresh_token);
        assert_ne!(first.refresh_token, second.refresh_token);
        assert_eq!(first.user.id, user.id);
        assert_eq!(first.user.roles, vec!["PATIENT"]);

        let stored = service.repository.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, Some(second.refresh_token));

        let claims = service.jwt().verify_access_token(&second.access_token).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
    }

    #[tokio::test]
    async fn test_authenticate_wrong_password_does_not_write() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let before = service.repository.get_by_id(user.id).await.unwrap().unwrap();

        let result = service
            .authenticate(SignInRequest {
                email: "a@b.com".into(),
                password: "Wrong1234!".into(),
            })
            .await;

        assert!(matches!(result, Err(UserError::InvalidCredentials)));
        let after = service.repository.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(before, after);
    }

    #[tokio::test]
    async fn test_authenticate_unknown_or_deleted_account() {
        let service = service();
        let unknown = service
            .authenticate(SignInRequest {
                email: "nobody@b.com".into(),
                password: "Aa123456!".into(),
            })
            .await;
        assert!(matches!(unknown, Err(UserError::InvalidCredentials)));

        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        service
            .delete_by_id(user.id, &actor(user.id, &[]))
            .await
            .unwrap();

        let deleted = service
            .authenticate(SignInRequest {
                email: "a@b.com".into(),
                password: "Aa123456!".into(),
            })
            .await;
        assert!(matches!(deleted, Err(UserError::InvalidCredentials)));
    }

    #[test]
    fn test_missing_account_hash_matches_no_password() {
        let hash = MISSING_ACCOUNT_HASH.as_deref().unwrap();
        assert!(!verify_password("Aa123456!", hash).unwrap());
        assert!(!verify_password("", hash).unwrap());
    }

    /// Parks every `get_by_id` after its read until released.
    struct GatedRepository {
        inner: InMemoryUserRepository,
        read: Arc<Notify>,
        release: Arc<Notify>,
    }

    #[async_trait::async_trait]
    impl UserRepository for GatedRepository {
        async fn create(&self, user: User, contact: Contact) -> UserResult<User> {
            self.inner.create(user, contact).await
        }

        async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>> {
            let user = self.inner.get_by_id(id).await;
            self.read.notify_one();
            self.release.notified().await;
            user
        }

        async fn get_by_email(&self, email: &str) -> UserResult<Option<User>> {
            self.inner.get_by_email(email).await
        }

        async fn email_exists(&self, email: &str) -> UserResult<bool> {
            self.inner.email_exists(email).await
        }

        async fn update(&self, user: User) -> UserResult<User> {
            self.inner.update(user).await
        }

        async fn set_refresh_token(&self, id: Uuid, token: &str, actor: &str) -> UserResult<bool> {
            self.inner.set_refresh_token(id, token, actor).await
        }

        async fn set_profile_picture(&self, id: Uuid, key: &str, actor: &str) -> UserResult<bool> {
            self.inner.set_profile_picture(id, key, actor).await
        }

        async fn soft_delete(&self, id: Uuid, actor: &str) -> UserResult<bool> {
            self.inner.soft_delete(id, actor).await
        }

        async fn find_role_by_name(&self, role: Role) -> UserResult<Option<RoleRecord>> {
            self.inner.find_role_by_name(role).await
        }
    }

    #[tokio::test]
    async fn test_sign_in_during_profile_update_keeps_new_refresh_token() {
        let store = InMemoryUserRepository::new();
        let read = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());
        let repository = GatedRepository {
            inner: store.clone(),
            read: read.clone(),
            release: release.clone(),
        };
        let service = Arc::new(UserService::new(repository, jwt()));
        let id = service
            .register(sign_up("a@b.com", &["PATIENT"]))
            .await
            .unwrap()
            .id;

        let update = tokio::spawn({
            let service = service.clone();
            async move {
                let patch = UpdateUser {
                    about: Some("Cardiology".into()),
                    ..Default::default()
                };
                service.update_by_id(id, patch, &actor(id, &[])).await
            }
        });
        read.notified().await;

        let signed_in = service
            .authenticate(SignInRequest {
                email: "a@b.com".into(),
                password: "Aa123456!".into(),
            })
            .await
            .unwrap();
        release.notify_one();
        update.await.unwrap().unwrap();

        let stored = store.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token, Some(signed_in.refresh_token));
        assert_eq!(stored.about.as_deref(), Some("Cardiology"));
    }

    #[tokio::test]
    async fn test_update_contact_without_stored_contact() {
        let (user, _) = fixtures::user("a@b.com", vec![Role::Patient]);
        let id = user.id;
        let mut repository = MockUserRepository::new();
        repository
            .expect_get_by_id()
            .returning(move |_| Ok(Some(user.clone())));
        repository.expect_update().never();
        let service = UserService::new(repository, jwt());

        let patch = UpdateUser {
            contact: Some(crate::models::UpdateContact {
                street: Some("Abay 1".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let err = service
            .update_by_id(id, patch, &actor(id, &[]))
            .await
            .unwrap_err();

        assert_eq!(validation_fields(err)["contact"], "Contact not found");
    }

    #[tokio::test]
    async fn test_get_by_id_access_rules() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let stranger = Uuid::now_v7();

        assert!(service.get_by_id(user.id, &actor(user.id, &[])).await.is_ok());
        assert!(service.get_by_id(user.id, &actor(stranger, &["DOCTOR"])).await.is_ok());
        assert!(matches!(
            service.get_by_id(user.id, &actor(stranger, &["PATIENT"])).await,
            Err(UserError::Forbidden)
        ));
        assert!(matches!(
            service.get_by_id(stranger, &actor(stranger, &[])).await,
            Err(UserError::NotFound(id)) if id == stranger
        ));
    }

    #[tokio::test]
    async fn test_update_is_partial_and_audited() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let admin = actor(Uuid::now_v7(), &["ADMIN"]);

        let patch = UpdateUser {
            last_name: Some("Bekova".into()),
            contact: Some(crate::models::UpdateContact {
                street: Some("Abay 1".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let updated = service.update_by_id(user.id, patch, &admin).await.unwrap();

        assert_eq!(updated.name, "A");
        assert_eq!(updated.last_name.as_deref(), Some("Bekova"));
        assert_eq!(updated.updated_by, "actor@clinic.kz");
        assert!(updated.updated_at >= user.updated_at);
        let contact = updated.contact.unwrap();
        assert_eq!(contact.street.as_deref(), Some("Abay 1"));
        assert_eq!(contact.phone_number1, "1");
    }

    #[tokio::test]
    async fn test_update_validates_patch() {
        let service = service();
        let mut input = sign_up("doc@b.com", &["DOCTOR"]);
        input.doctor_type_id = Some(2);
        let user = service.register(input).await.unwrap();

        let patch = UpdateUser {
            about: Some("x".repeat(300)),
            ..Default::default()
        };
        let fields = validation_fields(
            service
                .update_by_id(user.id, patch, &actor(user.id, &[]))
                .await
                .unwrap_err(),
        );
        assert_eq!(fields["about"], "Max size is 255 characters");
        assert_eq!(fields.len(), 1);
    }

    #[tokio::test]
    async fn test_only_self_or_admin_can_modify() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let doctor = actor(Uuid::now_v7(), &["DOCTOR"]);

        assert!(matches!(
            service.update_by_id(user.id, UpdateUser::default(), &doctor).await,
            Err(UserError::Forbidden)
        ));
        assert!(matches!(
            service.delete_by_id(user.id, &doctor).await,
            Err(UserError::Forbidden)
        ));
    }

    #[tokio::test]
    async fn test_soft_delete_keeps_user_readable() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let admin = actor(Uuid::now_v7(), &["ADMIN"]);

        service.delete_by_id(user.id, &admin).await.unwrap();

        let fetched = service.get_by_id(user.id, &admin).await.unwrap();
        assert!(fetched.deleted_at.is_some());
        assert!(fetched.contact.is_some());

        let missing = Uuid::now_v7();
        assert!(matches!(
            service.delete_by_id(missing, &admin).await,
            Err(UserError::NotFound(_))
        ));
    }

    #[test]
    fn test_picture_extension() {
        assert_eq!(picture_extension(Some("image/jpeg")).unwrap(), ".jpeg");
        assert_eq!(picture_extension(Some("image/jpg")).unwrap(), ".jpeg");
        assert_eq!(picture_extension(Some("image/png")).unwrap(), ".png");
        assert!(picture_extension(Some("image/gif")).is_err());
        assert!(picture_extension(None).is_err());
    }

    #[tokio::test]
    async fn test_upload_profile_picture() {
        let mut media = MockMediaStore::new();
        media
            .expect_put()
            .withf(|key, bytes| key.ends_with(".png") && bytes.as_ref() == b"png-bytes")
            .times(1)
            .returning(|_, _| Ok(()));
        let service = service().with_media_store(Arc::new(media));
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        service
            .upload_profile_picture(
                user.id,
                PictureUpload {
                    content_type: Some("image/png".into()),
                    bytes: bytes::Bytes::from_static(b"png-bytes"),
                },
                &actor(user.id, &[]),
            )
            .await
            .unwrap();

        let stored = service.repository.get_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(stored.profile_picture, Some(format!("{}.png", user.id)));
    }

    #[tokio::test]
    async fn test_upload_rejects_unsupported_type() {
        let mut media = MockMediaStore::new();
        media.expect_put().never();
        let service = service().with_media_store(Arc::new(media));
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        let err = service
            .upload_profile_picture(
                user.id,
                PictureUpload {
                    content_type: Some("application/pdf".into()),
                    bytes: bytes::Bytes::from_static(b"%PDF"),
                },
                &actor(user.id, &[]),
            )
            .await
            .unwrap_err();

        assert_eq!(validation_fields(err)["file"], INVALID_FILE_EXTENSION);
    }

    #[tokio::test]
    async fn test_upload_without_media_store_is_upstream_failure() {
        let service = service();
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        let result = service
            .upload_profile_picture(
                user.id,
                PictureUpload {
                    content_type: Some("image/png".into()),
                    bytes: bytes::Bytes::from_static(b"png"),
                },
                &actor(user.id, &[]),
            )
            .await;

        assert!(matches!(result, Err(UserError::Media(MediaError::NotConfigured))));
    }

    #[tokio::test]
    async fn test_profile_picture_url_without_picture_is_empty() {
        let mut media = MockMediaStore::new();
        media.expect_exists().never();
        let service = service().with_media_store(Arc::new(media));
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();

        let url = service
            .profile_picture_url(user.id, &actor(user.id, &[]))
            .await
            .unwrap();
        assert_eq!(url.url, "");
    }

    #[tokio::test]
    async fn test_profile_picture_url_for_missing_object_is_empty() {
        let mut media = MockMediaStore::new();
        media.expect_put().returning(|_, _| Ok(()));
        media.expect_exists().returning(|_| Ok(false));
        media.expect_presign().never();
        let service = service().with_media_store(Arc::new(media));
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let me = actor(user.id, &[]);

        service
            .upload_profile_picture(
                user.id,
                PictureUpload {
                    content_type: Some("image/jpeg".into()),
                    bytes: bytes::Bytes::from_static(b"jpeg"),
                },
                &me,
            )
            .await
            .unwrap();

        assert_eq!(service.profile_picture_url(user.id, &me).await.unwrap().url, "");
    }

    #[tokio::test]
    async fn test_profile_picture_url_is_presigned_for_an_hour() {
        let mut media = MockMediaStore::new();
        media.expect_put().returning(|_, _| Ok(()));
        media.expect_exists().returning(|_| Ok(true));
        media
            .expect_presign()
            .withf(|key, ttl| key.ends_with(".jpeg") && *ttl == PROFILE_PICTURE_URL_TTL)
            .returning(|key, _| Ok(format!("https://s3.local/{key}?sig=1")));
        let service = service().with_media_store(Arc::new(media));
        let user = service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        let me = actor(user.id, &[]);

        service
            .upload_profile_picture(
                user.id,
                PictureUpload {
                    content_type: Some("image/jpg".into()),
                    bytes: bytes::Bytes::from_static(b"jpeg"),
                },
                &me,
            )
            .await
            .unwrap();

        let url = service.profile_picture_url(user.id, &me).await.unwrap().url;
        assert_eq!(url, format!("https://s3.local/{}.jpeg?sig=1", user.id));
    }

    #[tokio::test]
    async fn test_is_email_available() {
        let service = service();
        assert!(service.is_email_available("a@b.com").await.unwrap());

        service.register(sign_up("a@b.com", &["PATIENT"])).await.unwrap();
        assert!(!service.is_email_available(" A@B.COM ").await.unwrap());
    }
}
