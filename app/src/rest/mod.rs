use crate::error::ObserverError;
use crate::observer::RoomObserver;
use serde::Serialize;
use std::net::SocketAddr;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use utoipa::ToSchema;
use warp::hyper::StatusCode;
use warp::{Filter, Rejection};

mod doc_routes;
mod metric_routes;
mod room_routes;

#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponseDto {
    pub error: String,
}

pub fn routes(
    observer: &RoomObserver,
    app_name: &str,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    room_routes::routes(observer, app_name)
        .or(metric_routes::routes(observer))
        .or(doc_routes::routes())
}

/// Binds the HTTP server and serves until `shutdown` flips
pub fn dispatch_server_daemon(
    observer: RoomObserver,
    app_name: String,
    port: u16,
    mut shutdown: watch::Receiver<bool>,
) -> Result<JoinHandle<()>, warp::Error> {
    let routes = routes(&observer, &app_name).with(warp::trace::request());
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    let (bound, server) = warp::serve(routes).try_bind_with_graceful_shutdown(addr, async move {
        let _ = shutdown.changed().await;
    })?;
    info!("Starting webserver at: {}", bound);
    Ok(tokio::spawn(server))
}

pub(crate) fn build_response<T: Serialize>(
    resp: Result<T, ObserverError>,
) -> Result<Box<dyn warp::Reply>, Rejection> {
    match resp {
        Ok(data) => Ok(Box::new(warp::reply::json(&data))),
        Err(ObserverError::User(err)) => {
            warn!("{}", err);
            let dto = ErrorResponseDto {
                error: format!("{}", err),
            };
            Ok(Box::new(warp::reply::with_status(
                warp::reply::json(&dto),
                StatusCode::BAD_REQUEST,
            )))
        }
        Err(ObserverError::Internal(err)) => {
            error!("{}", err);
            Ok(Box::new(StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}
