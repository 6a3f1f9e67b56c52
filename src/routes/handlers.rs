use std::time::{Duration, Instant};

use bytes::Bytes;
use log::{debug, trace};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;
use time::OffsetDateTime;
use warp::{
    http::StatusCode,
    reject,
    reply::{with_header, with_status, Reply},
};

use crate::albums::{self, pagination::PageQuery, pagination::PageRequest};
use crate::auth::{authorize, clear_cookie, session_cookie, Session};
use crate::category::{self, CategoryFilter, CategoryPatch, CategoryPayload, CategoryQuery};
use crate::contact::{self, ContactPatch, ContactPayload, ContactQuery, Origin};
use crate::environment::Environment;
use crate::errors::{parse_id, BackendError};
use crate::media::{self, MediaPatch, MediaPayload};
use crate::routes::{
    query::{DeleteQuery, MediaQuery},
    rejection::{Context, Rejection},
    response::{success, SuccessResponse},
};
use crate::showcase;
use crate::user::{self, LoginPayload, UserPatch, UserPayload};

const SERVER_TIMING_HEADER: &str = "server-timing";
const SET_COOKIE_HEADER: &str = "set-cookie";

type RouteResult = Result<Box<dyn Reply>, reject::Rejection>;

macro_rules! timed {
    ($($body:tt)*) => {
        let start = Instant::now();

        let result = { $($body)* };

        Ok(Box::new(with_header(
            result,
            SERVER_TIMING_HEADER,
            format_server_timing(start.elapsed()),
        )) as Box<dyn Reply>)
    };
}

pub async fn login(environment: Environment, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::Login, e);

        let payload: LoginPayload = parse_body(&body).map_err(error_handler)?;
        let (user, token) = user::login(environment.db.as_ref(), &environment.config.tokens, payload)
            .await
            .map_err(error_handler)?;
        debug!(environment.logger, "Signed in"; "user" => %user.id);

        let cookie = session_cookie(
            &token,
            environment.config.tokens.ttl_seconds(),
            environment.config.secure_cookies,
        );

        with_header(
            success(SuccessResponse::Session { user: user.session() }),
            SET_COOKIE_HEADER,
            cookie,
        )
    }
}

pub async fn logout(environment: Environment) -> RouteResult {
    timed! {
        with_header(
            success(SuccessResponse::SignedOut {}),
            SET_COOKIE_HEADER,
            clear_cookie(environment.config.secure_cookies),
        )
    }
}

pub async fn me(environment: Environment, token: Option<String>) -> RouteResult {
    timed! {
        let session = require_admin(&environment, token)
            .map_err(|e| Rejection::new(Context::Me, e))?;

        success(SuccessResponse::Session { user: session })
    }
}

pub async fn users_list(environment: Environment, token: Option<String>) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::Users, e);

        require_admin(&environment, token).map_err(error_handler)?;
        let users = environment.db.retrieve_users().await.map_err(error_handler)?;

        success(SuccessResponse::Users { users })
    }
}

pub async fn user_create(
    environment: Environment,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::user(None), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let payload: UserPayload = parse_body(&body).map_err(error_handler)?;
        let user = user::create(environment.db.as_ref(), environment.config.password_cost, payload)
            .await
            .map_err(error_handler)?;
        debug!(environment.logger, "Created user"; "id" => %user.id);

        with_status(success(SuccessResponse::User { user }), StatusCode::CREATED)
    }
}

pub async fn user_update(
    environment: Environment,
    id: String,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::user(Some(id.clone())), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        let patch: UserPatch = parse_body(&body).map_err(error_handler)?;
        let user = user::update(environment.db.as_ref(), environment.config.password_cost, &uuid, patch)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::User { user })
    }
}

pub async fn user_delete(
    environment: Environment,
    id: String,
    token: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::user(Some(id.clone())), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        user::delete(environment.db.as_ref(), &uuid).await.map_err(error_handler)?;
        debug!(environment.logger, "Deleted user"; "id" => %uuid);

        success(SuccessResponse::Deleted { id: uuid })
    }
}

pub async fn categories_list(environment: Environment, query: CategoryQuery) -> RouteResult {
    timed! {
        let categories = environment
            .db
            .retrieve_categories(CategoryFilter::from(&query))
            .await
            .map_err(|e: BackendError| Rejection::new(Context::Categories, e))?;

        success(SuccessResponse::Categories { categories })
    }
}

pub async fn category_retrieve(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::category(id.clone()), e);

        let uuid = parse_id(&id).map_err(error_handler)?;
        let category = environment
            .db
            .retrieve_category(&uuid)
            .await
            .and_then(|c| c.ok_or(BackendError::NotFound))
            .map_err(error_handler)?;

        success(SuccessResponse::Category { category })
    }
}

pub async fn category_create(
    environment: Environment,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::Categories, e);

        require_admin(&environment, token).map_err(error_handler)?;
        let payload: CategoryPayload = parse_body(&body).map_err(error_handler)?;
        let category = category::create(environment.db.as_ref(), payload)
            .await
            .map_err(error_handler)?;
        debug!(environment.logger, "Created category"; "id" => %category.id, "name" => &category.name);

        with_status(success(SuccessResponse::Category { category }), StatusCode::CREATED)
    }
}

pub async fn category_update(
    environment: Environment,
    id: String,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::category(id.clone()), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        let patch: CategoryPatch = parse_body(&body).map_err(error_handler)?;
        let category = category::update(environment.db.as_ref(), &uuid, patch)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Category { category })
    }
}

pub async fn category_delete(
    environment: Environment,
    id: String,
    token: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::category(id.clone()), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        category::delete(environment.db.as_ref(), &uuid)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Deleted { id: uuid })
    }
}

pub async fn media_list(environment: Environment, query: MediaQuery) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::Media, e);

        let filter = query.filter().map_err(error_handler)?;
        trace!(environment.logger, "Listing media..."; "filter" => ?filter);
        let items = environment
            .db
            .retrieve_media(filter)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Items { items })
    }
}

pub async fn media_retrieve(environment: Environment, id: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::media_item(id.clone()), e);

        let uuid = parse_id(&id).map_err(error_handler)?;
        let item = environment
            .db
            .retrieve_media_item(&uuid)
            .await
            .and_then(|m| m.ok_or(BackendError::NotFound))
            .map_err(error_handler)?;

        success(SuccessResponse::Item { item })
    }
}

pub async fn media_create(
    environment: Environment,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::Media, e);

        require_admin(&environment, token).map_err(error_handler)?;
        let payload: MediaPayload = parse_body(&body).map_err(error_handler)?;
        let item = media::create(environment.db.as_ref(), payload)
            .await
            .map_err(error_handler)?;
        debug!(environment.logger, "Created media"; "id" => %item.id, "album" => ?item.album);

        with_status(success(SuccessResponse::Item { item }), StatusCode::CREATED)
    }
}

pub async fn media_update(
    environment: Environment,
    id: String,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::media_item(id.clone()), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        let patch: MediaPatch = parse_body(&body).map_err(error_handler)?;
        let item = media::update(environment.db.as_ref(), &uuid, patch)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Item { item })
    }
}

pub async fn media_delete(
    environment: Environment,
    id: String,
    query: DeleteQuery,
    token: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::media_item(id.clone()), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        let scope = query.scope().map_err(error_handler)?;
        let deletion = media::delete(
            environment.logger.clone(),
            environment.db.as_ref(),
            environment.host.as_ref(),
            &uuid,
            scope,
        )
        .await
        .map_err(error_handler)?;
        debug!(environment.logger, "Deleted media"; "id" => %uuid, "deleted" => deletion.deleted);

        success(SuccessResponse::MediaDeletion(deletion))
    }
}

pub async fn upload_signature(environment: Environment, token: Option<String>) -> RouteResult {
    timed! {
        require_admin(&environment, token).map_err(|e| Rejection::new(Context::Signature, e))?;
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();

        success(SuccessResponse::Signature(environment.host.sign_upload(timestamp)))
    }
}

pub async fn albums_list(environment: Environment, query: PageQuery) -> RouteResult {
    timed! {
        let request = PageRequest::from_query(&query);
        let page = albums::list_albums(environment.db.as_ref(), request)
            .await
            .map_err(|e| Rejection::new(Context::Albums, e))?;

        success(SuccessResponse::Albums(page))
    }
}

pub async fn album_retrieve(environment: Environment, key: String) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::album(key.clone()), e);

        let album = decode_segment(&key).map_err(error_handler)?;
        let detail = albums::album_detail(environment.db.as_ref(), &album)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Album(detail))
    }
}

pub async fn album_delete(
    environment: Environment,
    key: String,
    token: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::album(key.clone()), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let album = decode_segment(&key).map_err(error_handler)?;
        let deletion = albums::delete_album(
            environment.logger.clone(),
            environment.db.as_ref(),
            environment.host.as_ref(),
            &album,
        )
        .await
        .map_err(error_handler)?;

        success(SuccessResponse::AlbumDeletion(deletion))
    }
}

pub async fn contact_create(environment: Environment, origin: Origin, body: Bytes) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::contact(None), e);

        let payload: ContactPayload = parse_body(&body).map_err(error_handler)?;
        let contact = contact::create(environment.db.as_ref(), payload, origin)
            .await
            .map_err(error_handler)?;
        debug!(environment.logger, "Received message"; "id" => %contact.id);

        with_status(success(SuccessResponse::Contact { contact }), StatusCode::CREATED)
    }
}

pub async fn contacts_list(
    environment: Environment,
    query: ContactQuery,
    token: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::Contacts, e);

        require_admin(&environment, token).map_err(error_handler)?;
        let read = query.read.as_deref().and_then(category::parse_flag);
        let messages = environment
            .db
            .retrieve_contacts(read)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Messages { messages })
    }
}

pub async fn contact_update(
    environment: Environment,
    id: String,
    token: Option<String>,
    body: Bytes,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::contact(Some(id.clone())), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        let patch: ContactPatch = parse_body(&body).map_err(error_handler)?;
        let contact = contact::update(environment.db.as_ref(), &uuid, patch)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Contact { contact })
    }
}

pub async fn contact_delete(
    environment: Environment,
    id: String,
    token: Option<String>,
) -> RouteResult {
    timed! {
        let error_handler = |e: BackendError| Rejection::new(Context::contact(Some(id.clone())), e);

        require_admin(&environment, token).map_err(error_handler)?;
        let uuid = parse_id(&id).map_err(error_handler)?;
        contact::delete(environment.db.as_ref(), &uuid)
            .await
            .map_err(error_handler)?;

        success(SuccessResponse::Deleted { id: uuid })
    }
}

pub async fn showcase_retrieve(environment: Environment) -> RouteResult {
    timed! {
        let showcase = showcase::showcase(environment.db.as_ref())
            .await
            .map_err(|e| Rejection::new(Context::Showcase, e))?;

        success(SuccessResponse::Showcase(showcase))
    }
}

fn require_admin(environment: &Environment, token: Option<String>) -> Result<Session, BackendError> {
    authorize(&environment.config.tokens, token.as_deref()).session()
}

fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, BackendError> {
    serde_json::from_slice(body).map_err(|source| BackendError::MalformedBody { source })
}

/// Percent-decodes a path segment.
fn decode_segment(raw: &str) -> Result<String, BackendError> {
    percent_decode_str(raw)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|_| BackendError::InvalidInput("album key is not valid UTF-8".to_owned()))
}

fn format_server_timing(seconds: Duration) -> String {
    format!("handler;dur={}", seconds.as_secs_f64() * 1000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn segments_are_percent_decoded() {
        assert_eq!(decode_segment("Casa%20Azul").unwrap(), "Casa Azul");
        assert_eq!(decode_segment("Cami%C3%B3n").unwrap(), "Camión");
        assert!(matches!(
            decode_segment("%FF"),
            Err(BackendError::InvalidInput(_))
        ));
    }

    #[test]
    fn timings_are_in_milliseconds() {
        assert_eq!(
            format_server_timing(Duration::from_secs(2)),
            "handler;dur=2000"
        );
    }
}
