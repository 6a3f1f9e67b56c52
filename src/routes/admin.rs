use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use log::warn;
use warp::http::StatusCode;
use warp::reject;
use warp::reply::{with_status, Json, Reply, WithStatus};
use warp::Filter;

use super::response::{success, SuccessResponse};
use crate::environment::Environment;

/// Reports the build and whether the database answers.
pub fn make_healthz_route(
    environment: Environment,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone {
    let handler = move || -> BoxFuture<Result<WithStatus<Json>, std::convert::Infallible>> {
        let environment = environment.clone();

        async move {
            let (database, status) = match environment.db.ping().await {
                Ok(()) => ("ok", StatusCode::OK),
                Err(e) => {
                    warn!(environment.logger, "Database ping failed"; "error" => ?e);
                    ("unavailable", StatusCode::SERVICE_UNAVAILABLE)
                }
            };

            Ok(with_status(
                success(SuccessResponse::Healthz {
                    database,
                    revision: info::REVISION,
                    timestamp: info::BUILD_TIMESTAMP,
                    version: info::VERSION,
                }),
                status,
            ))
        }
        .boxed()
    };

    warp::path("healthz").and(warp::get()).and_then(handler)
}

type TerminationFuture<'a> = BoxFuture<'a, ()>;

pub type TerminationFunctionWrapper<'a> =
    Arc<dyn Fn() -> TerminationFuture<'a> + Send + Sync + 'a>;

pub fn make_termination_route<'a>(
    terminate: TerminationFunctionWrapper<'a>,
) -> impl warp::Filter<Extract = (impl Reply,), Error = reject::Rejection> + Clone + 'a {
    let handler = move || -> BoxFuture<Result<StatusCode, std::convert::Infallible>> {
        let terminate = terminate.clone();

        async move {
            let future = terminate();
            future.await;
            Ok(StatusCode::NO_CONTENT)
        }
        .boxed()
    };

    warp::path("terminate").and(warp::post()).and_then(handler)
}
