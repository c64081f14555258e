use axum::Router;
use domain_users::{PostgresUserRepository, UserService, handlers};

use crate::state::AppState;

pub fn router(state: &AppState) -> Router {
    let repository = PostgresUserRepository::new(state.db.clone());
    let mut service = UserService::new(repository, state.jwt.clone());

    if let Some(publisher) = &state.publisher {
        service = service.with_publisher(publisher.clone());
    }
    if let Some(media) = &state.media {
        service = service.with_media_store(media.clone());
    }

    handlers::router(service)
}
