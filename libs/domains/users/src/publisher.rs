//! Notification of downstream services about newly registered users.

use async_nats::Client;
use async_trait::async_trait;
use core_config::{ConfigError, FromEnv, env_or_default, env_required};
use thiserror::Error;
use tracing::instrument;

use crate::models::NewPatientEvent;

pub const DEFAULT_NEW_PATIENTS_SUBJECT: &str = "patients.created";

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to publish event: {0}")]
    Nats(#[from] async_nats::PublishError),
}

/// Fire-and-forget sink for [`NewPatientEvent`]s.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatientPublisher: Send + Sync {
    async fn publish(&self, event: &NewPatientEvent) -> Result<(), PublishError>;
}

/// NATS settings.
///
/// - `NATS_URL` (required)
/// - `NEW_PATIENTS_SUBJECT` (default: patients.created)
#[derive(Clone, Debug)]
pub struct NatsConfig {
    pub url: String,
    pub subject: String,
}

impl FromEnv for NatsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            url: env_required("NATS_URL")?,
            subject: env_or_default("NEW_PATIENTS_SUBJECT", DEFAULT_NEW_PATIENTS_SUBJECT),
        })
    }
}

/// Publishes JSON-encoded events to a single NATS subject.
#[derive(Clone)]
pub struct NatsPatientPublisher {
    client: Client,
    subject: String,
}

impl NatsPatientPublisher {
    pub fn new(client: Client, subject: impl Into<String>) -> Self {
        Self {
            client,
            subject: subject.into(),
        }
    }

    pub async fn connect(config: &NatsConfig) -> Result<Self, async_nats::ConnectError> {
        tracing::info!("Connecting to NATS at {}", config.url);
        let client = async_nats::connect(&config.url).await?;
        tracing::info!(subject = %config.subject, "NATS connected successfully");
        Ok(Self::new(client, config.subject.clone()))
    }
}

#[async_trait]
impl PatientPublisher for NatsPatientPublisher {
    #[instrument(skip(self, event), fields(subject = %self.subject, user_id = %event.user_id))]
    async fn publish(&self, event: &NewPatientEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        self.client
            .publish(self.subject.clone(), payload.into())
            .await?;
        tracing::info!("Event published");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_event_payload_shape() {
        let user_id = Uuid::now_v7();
        let event = NewPatientEvent {
            user_id,
            first_name: "Aigerim".into(),
            last_name: Some("Nurlanova".into()),
            birth_date: NaiveDate::from_ymd_opt(1995, 3, 8),
            phone_number: Some("+77010000000".into()),
        };

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(
            value,
            json!({
                "userId": user_id,
                "firstName": "Aigerim",
                "lastName": "Nurlanova",
                "birthDate": "1995-03-08",
                "phoneNumber": "+77010000000"
            })
        );
    }

    #[test]
    fn test_nats_config_default_subject() {
        temp_env::with_vars(
            [
                ("NATS_URL", Some("nats://localhost:4222")),
                ("NEW_PATIENTS_SUBJECT", None),
            ],
            || {
                let config = NatsConfig::from_env().unwrap();
                assert_eq!(config.url, "nats://localhost:4222");
                assert_eq!(config.subject, DEFAULT_NEW_PATIENTS_SUBJECT);
            },
        );
    }
}
