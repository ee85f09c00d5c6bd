use super::build_response;
use crate::observer::RoomObserver;
use warp::Filter;

pub fn routes(
    observer: &RoomObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    health(observer.clone())
}

fn health(
    observer: RoomObserver,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    warp::any()
        .map(move || observer.clone())
        .and(warp::get())
        .and(warp::path!("api" / "health"))
        .and_then(get_health)
        .boxed()
}

#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    responses((status = 200, description = "Service probe", body = dto::HealthyDto))
)]
pub(super) async fn get_health(
    observer: RoomObserver,
) -> Result<Box<dyn warp::Reply>, warp::Rejection> {
    let resp = observer.room_count().await.map(|room_count| dto::HealthyDto {
        healthy: true,
        mqtt_broker: observer.mqtt_broker(),
        mqtt_state: observer.mqtt_state().map(|state| format!("{:?}", state)),
        database_state: "healthy".to_owned(),
        room_count,
    });
    match resp {
        Ok(ret) => build_response(Ok(ret)),
        // still answer, the probe reports the failure itself
        Err(_) => build_response(Ok(dto::HealthyDto {
            healthy: false,
            mqtt_broker: observer.mqtt_broker(),
            mqtt_state: observer.mqtt_state().map(|state| format!("{:?}", state)),
            database_state: observer.check_db().await,
            room_count: 0,
        })),
    }
}

pub mod dto {
    use serde::{Deserialize, Serialize};
    use utoipa::ToSchema;

    #[derive(Debug, Serialize, Deserialize, ToSchema)]
    pub struct HealthyDto {
        pub healthy: bool,
        pub mqtt_broker: Option<String>,
        pub mqtt_state: Option<String>,
        pub database_state: String,
        pub room_count: i64,
    }
}
