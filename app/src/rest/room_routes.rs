use super::build_response;
use crate::observer::RoomObserver;
use warp::Filter;

pub fn routes(
    observer: &RoomObserver,
    app_name: &str,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    index(app_name.to_owned()).or(list_rooms(observer.clone()))
}

/// GET /
///
/// Liveness banner
fn index(
    app_name: String,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::get()
        .and(warp::path::end())
        .map(move || {
            warp::reply::json(&dto::IndexDto {
                message: "Eve Aether Home Guardian API is running".to_owned(),
                app: app_name.clone(),
            })
        })
        .boxed()
}

/// GET /api/v1/rooms
///
/// Returns a `RoomStateListDto` with the current state of every known room,
/// in the order the rooms were first seen
fn list_rooms(
    observer: RoomObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::get())
        .and(warp::path!("api" / "v1" / "rooms"))
        .and_then(get_rooms)
        .boxed()
}

#[utoipa::path(
    get,
    path = "/api/v1/rooms",
    tag = "rooms",
    responses(
        (status = 200, description = "Current room states", body = dto::RoomStateListDto),
        (status = 500, description = "Database unavailable"),
    )
)]
pub(super) async fn get_rooms(
    observer: RoomObserver,
) -> Result<Box<dyn warp::Reply>, warp::Rejection> {
    let resp = observer.rooms().await.map(|rooms| dto::RoomStateListDto {
        rooms: rooms.into_iter().map(dto::RoomStateDto::from).collect(),
    });
    build_response(resp)
}

///
/// DTO
///
pub mod dto {
    use aether_core::RoomState;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    #[derive(Debug, Serialize, Deserialize)]
    pub struct IndexDto {
        pub message: String,
        pub app: String,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
    pub struct RoomStateDto {
        pub room: String,
        pub last_seen_at: Option<DateTime<Utc>>,
        pub occupied: bool,
        pub door_open: bool,
        pub window_open: bool,
        pub temperature: Option<f64>,
        pub humidity: Option<f64>,
        pub air_quality: Option<f64>,
        pub last_alert_at: Option<DateTime<Utc>>,
    }

    impl From<RoomState> for RoomStateDto {
        fn from(state: RoomState) -> Self {
            RoomStateDto {
                room: state.room,
                last_seen_at: state.last_seen_at,
                occupied: state.occupied,
                door_open: state.door_open,
                window_open: state.window_open,
                temperature: state.temperature,
                humidity: state.humidity,
                air_quality: state.air_quality,
                last_alert_at: state.last_alert_at,
            }
        }
    }

    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct RoomStateListDto {
        pub rooms: Vec<RoomStateDto>,
    }
}
