use std::sync::Arc;

use log::{error, Logger};
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{json, with_status, Json, Reply, WithStatus};
use warp::Filter;

use crate::environment::Environment;
use crate::errors::BackendError;

pub mod admin;
mod handlers;
mod query;
mod rejection;
mod response;

pub use internal::*;

/// The largest JSON body to accept. Uploads go straight to the media
/// host, so bodies only ever carry metadata.
const MAX_CONTENT_LENGTH: u64 = 64 * 1024;

/// Every public and back-office route under the configured API path,
/// with errors rendered as `{ ok: false, error }`.
pub fn api(
    environment: Environment,
) -> impl Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let logger = environment.logger.clone();

    make_login_route(environment.clone())
        .or(make_logout_route(environment.clone()))
        .or(make_me_route(environment.clone()))
        .or(make_users_list_route(environment.clone()))
        .or(make_user_create_route(environment.clone()))
        .or(make_user_update_route(environment.clone()))
        .or(make_user_delete_route(environment.clone()))
        .or(make_categories_list_route(environment.clone()))
        .or(make_category_create_route(environment.clone()))
        .or(make_category_retrieve_route(environment.clone()))
        .or(make_category_update_route(environment.clone()))
        .or(make_category_delete_route(environment.clone()))
        .or(make_media_list_route(environment.clone()))
        .or(make_media_create_route(environment.clone()))
        .or(make_upload_signature_route(environment.clone()))
        .or(make_media_retrieve_route(environment.clone()))
        .or(make_media_update_route(environment.clone()))
        .or(make_media_delete_route(environment.clone()))
        .or(make_albums_list_route(environment.clone()))
        .or(make_album_retrieve_route(environment.clone()))
        .or(make_album_delete_route(environment.clone()))
        .or(make_contact_create_route(environment.clone()))
        .or(make_contacts_list_route(environment.clone()))
        .or(make_contact_update_route(environment.clone()))
        .or(make_contact_delete_route(environment.clone()))
        .or(make_showcase_route(environment))
        .recover(move |r| format_rejection(logger.clone(), r))
}

pub async fn format_rejection(
    logger: Arc<Logger>,
    rej: reject::Rejection,
) -> Result<WithStatus<Json>, reject::Rejection> {
    if let Some(r) = rej.find::<rejection::Rejection>() {
        let e = &r.error;
        error!(logger, "Backend error"; "context" => ?r.context, "error" => ?r.error, "status" => %status_code_for(e), "message" => %r.error);
        let flattened = r.flatten();

        return Ok(with_status(json(&flattened), status_code_for(e)));
    }

    Err(rej)
}

fn status_code_for(e: &BackendError) -> StatusCode {
    use BackendError::*;

    match e {
        InvalidId(..)
        | InvalidInput(..)
        | MalformedBody { .. }
        | CoverLimitReached { .. }
        | CoverWithoutAlbum => StatusCode::BAD_REQUEST,
        Unauthorized(..) | InvalidCredentials => StatusCode::UNAUTHORIZED,
        NotFound => StatusCode::NOT_FOUND,
        EmailAlreadyExists | CategoryInUse | AlbumScopeRequired { .. } => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

mod internal {
    use std::net::SocketAddr;

    use bytes::Bytes;
    use warp::filters::BoxedFilter;
    use warp::path::end;
    use warp::reject::Rejection;
    use warp::Filter;
    use warp::Reply;
    use warp::{delete, get as g, path as p, path::param as par, post, put, query};

    use super::{handlers, query as q, MAX_CONTENT_LENGTH};
    use crate::albums::pagination::PageQuery;
    use crate::auth::TOKEN_COOKIE;
    use crate::category::CategoryQuery;
    use crate::contact::{ContactQuery, Origin};
    use crate::environment::Environment;

    type Route = BoxedFilter<(Box<dyn Reply>,)>;

    macro_rules! route_filter {
    ($route_variable:ident; $first:expr) => (let $route_variable = $route_variable.and($first););
    ($route_variable:ident; $first:expr, $($rest:expr),+) => (
        let $route_variable = $route_variable.and($first);
        route_filter!($route_variable; $($rest),+);
    )
}

    macro_rules! route {
    ($name:ident => $handler:ident, $route_variable:ident; $($filters:expr),+) => (
        pub fn $name(environment: Environment) -> Route {
            let r = environment.config.api_path.clone();

            let $route_variable = warp::any()
                .map(move || environment.clone())
                .and(p(r));

            route_filter!($route_variable; $($filters),+);

            $route_variable.and_then(handlers::$handler)
                .boxed()
        }
    );
}

    /// The session token cookie, if any.
    fn session_token() -> impl Filter<Extract = (Option<String>,), Error = std::convert::Infallible> + Clone {
        warp::cookie::optional::<String>(TOKEN_COOKIE)
    }

    /// A size-limited request body.
    fn body() -> impl Filter<Extract = (Bytes,), Error = Rejection> + Clone {
        warp::body::content_length_limit(MAX_CONTENT_LENGTH).and(warp::body::bytes())
    }

    /// The client address and user agent. A proxy's `x-forwarded-for`
    /// wins over the socket address.
    fn origin() -> impl Filter<Extract = (Origin,), Error = Rejection> + Clone {
        warp::addr::remote()
            .and(warp::header::optional::<String>("x-forwarded-for"))
            .and(warp::header::optional::<String>("user-agent"))
            .map(
                |remote: Option<SocketAddr>, forwarded: Option<String>, user_agent: Option<String>| {
                    let forwarded = forwarded.and_then(|f| {
                        f.split(',')
                            .next()
                            .map(|ip| ip.trim().to_owned())
                            .filter(|ip| !ip.is_empty())
                    });

                    Origin {
                        ip: forwarded.or_else(|| remote.map(|r| r.ip().to_string())),
                        user_agent,
                    }
                },
            )
    }

    route!(make_login_route => login, rt; p!("auth" / "login"), end(), post(), body());
    route!(make_logout_route => logout, rt; p!("auth" / "logout"), end(), post());
    route!(make_me_route => me, rt; p!("auth" / "me"), end(), g(), session_token());

    route!(make_users_list_route => users_list, rt; p("users"), end(), g(), session_token());
    route!(make_user_create_route => user_create, rt; p("users"), end(), post(), session_token(), body());
    route!(make_user_update_route => user_update, rt; p("users"), par::<String>(), end(), put(), session_token(), body());
    route!(make_user_delete_route => user_delete, rt; p("users"), par::<String>(), end(), delete(), session_token());

    route!(make_categories_list_route => categories_list, rt; p("categories"), end(), g(), query::<CategoryQuery>());
    route!(make_category_create_route => category_create, rt; p("categories"), end(), post(), session_token(), body());
    route!(make_category_retrieve_route => category_retrieve, rt; p("categories"), par::<String>(), end(), g());
    route!(make_category_update_route => category_update, rt; p("categories"), par::<String>(), end(), put(), session_token(), body());
    route!(make_category_delete_route => category_delete, rt; p("categories"), par::<String>(), end(), delete(), session_token());

    route!(make_media_list_route => media_list, rt; p("media"), end(), g(), query::<q::MediaQuery>());
    route!(make_media_create_route => media_create, rt; p("media"), end(), post(), session_token(), body());
    route!(make_upload_signature_route => upload_signature, rt; p!("media" / "signature"), end(), post(), session_token());
    route!(make_media_retrieve_route => media_retrieve, rt; p("media"), par::<String>(), end(), g());
    route!(make_media_update_route => media_update, rt; p("media"), par::<String>(), end(), put(), session_token(), body());
    route!(make_media_delete_route => media_delete, rt; p("media"), par::<String>(), end(), delete(), query::<q::DeleteQuery>(), session_token());

    route!(make_albums_list_route => albums_list, rt; p("albums"), end(), g(), query::<PageQuery>());
    route!(make_album_retrieve_route => album_retrieve, rt; p("albums"), par::<String>(), end(), g());
    route!(make_album_delete_route => album_delete, rt; p("albums"), par::<String>(), end(), delete(), session_token());

    route!(make_contact_create_route => contact_create, rt; p("contact"), end(), post(), origin(), body());
    route!(make_contacts_list_route => contacts_list, rt; p("contact"), end(), g(), query::<ContactQuery>(), session_token());
    route!(make_contact_update_route => contact_update, rt; p("contact"), par::<String>(), end(), put(), session_token(), body());
    route!(make_contact_delete_route => contact_delete, rt; p("contact"), par::<String>(), end(), delete(), session_token());

    route!(make_showcase_route => showcase_retrieve, rt; p("showcase"), end(), g());
}
