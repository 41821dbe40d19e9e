use axum::{extract::State, routing::get, Json};

use crate::{
    auth::Session,
    context::ServerContext,
    serialized::{TimeSlot, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/schedule/today",
    tag = "schedule",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<TimeSlot>, description = "Every slot scheduled for today")
    )
)]
async fn today(_session: Session, State(context): State<ServerContext>) -> Json<Vec<TimeSlot>> {
    Json(context.station.schedule.today().await.to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/schedule/now",
    tag = "schedule",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = TimeSlot, description = "The slot authorizing the caller right now, null outside any slot")
    )
)]
async fn now(session: Session, State(context): State<ServerContext>) -> Json<Option<TimeSlot>> {
    let slot = context
        .station
        .schedule
        .current_slot(session.user().id)
        .await;

    Json(slot.to_serialized())
}

#[utoipa::path(
    get,
    path = "/v1/schedule/mine",
    tag = "schedule",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<TimeSlot>, description = "Every slot assigned to the caller")
    )
)]
async fn mine(session: Session, State(context): State<ServerContext>) -> Json<Vec<TimeSlot>> {
    let slots = context
        .station
        .schedule
        .slots_for_user(session.user().id)
        .await;

    Json(slots.to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/today", get(today))
        .route("/now", get(now))
        .route("/mine", get(mine))
}
