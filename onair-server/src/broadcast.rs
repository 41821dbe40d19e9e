use axum::{
    extract::State,
    routing::{get, post},
    Json,
};

use onair_station::NewEmergencyAlert;

use crate::{
    auth::Session,
    context::ServerContext,
    errors::ServerResult,
    schemas::{
        EmergencySchema, LogActionSchema, StartBroadcastSchema, SwitchModeSchema, ValidatedJson,
    },
    serialized::{
        BroadcastSession, BroadcastState, EmergencyBroadcast, MicrophoneState, ToSerialized,
    },
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/broadcast",
    tag = "broadcast",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BroadcastState)
    )
)]
async fn broadcast_state(
    session: Session,
    State(context): State<ServerContext>,
) -> Json<BroadcastState> {
    let user = session.user();
    let station = &context.station;

    let capabilities = station.access.capabilities_for(user.id).await;
    let current_slot = station.schedule.current_slot(user.id).await;
    let current = station.broadcast.current_session(user.id);

    let can_broadcast = capabilities.can_go_live
        && (station.access.is_admin(user.id).await || current_slot.is_some());

    Json(BroadcastState {
        microphone_active: station.broadcast.microphone_active(user.id),
        current_mode: station.broadcast.current_mode(user.id).name(),
        is_live: current.is_some(),
        session: current.to_serialized(),
        capabilities: capabilities.to_serialized(),
        current_slot: current_slot.to_serialized(),
        can_broadcast,
    })
}

#[utoipa::path(
    post,
    path = "/v1/broadcast",
    tag = "broadcast",
    request_body = StartBroadcastSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BroadcastSession, description = "The broadcaster is on the air")
    )
)]
async fn start_broadcast(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<StartBroadcastSchema>,
) -> ServerResult<Json<BroadcastSession>> {
    let started = context
        .station
        .broadcast
        .start_session(session.user().id, body.session_type)
        .await?;

    Ok(Json(started.to_serialized()))
}

#[utoipa::path(
    delete,
    path = "/v1/broadcast",
    tag = "broadcast",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BroadcastSession, description = "The session was ended")
    )
)]
async fn end_broadcast(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<BroadcastSession>> {
    let ended = context
        .station
        .broadcast
        .end_session(session.user().id)
        .await?;

    Ok(Json(ended.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/broadcast/microphone",
    tag = "broadcast",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = MicrophoneState)
    )
)]
async fn toggle_microphone(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<MicrophoneState>> {
    let live = context
        .station
        .broadcast
        .toggle_microphone(session.user().id)
        .await?;

    Ok(Json(MicrophoneState { live }))
}

#[utoipa::path(
    post,
    path = "/v1/broadcast/mode",
    tag = "broadcast",
    request_body = SwitchModeSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = BroadcastSession)
    )
)]
async fn switch_mode(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<SwitchModeSchema>,
) -> ServerResult<Json<BroadcastSession>> {
    let updated = context
        .station
        .broadcast
        .switch_mode(session.user().id, body.mode)
        .await?;

    Ok(Json(updated.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/broadcast/emergency",
    tag = "broadcast",
    request_body = EmergencySchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = EmergencyBroadcast)
    )
)]
async fn trigger_emergency(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<EmergencySchema>,
) -> ServerResult<Json<EmergencyBroadcast>> {
    let broadcast = context
        .station
        .broadcast
        .trigger_emergency(
            session.user().id,
            NewEmergencyAlert {
                title: body.title,
                message: body.message,
                priority: body.priority,
                kind: body.kind,
            },
        )
        .await?;

    Ok(Json(broadcast.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/broadcast/actions",
    tag = "broadcast",
    request_body = LogActionSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The action was recorded")
    )
)]
async fn log_action(
    session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<LogActionSchema>,
) -> ServerResult<()> {
    context
        .station
        .broadcast
        .log_action(session.user().id, body.action, body.detail)
        .await?;

    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/broadcast/active",
    tag = "broadcast",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<BroadcastSession>, description = "Every session currently on the air")
    )
)]
async fn active_sessions(
    _session: Session,
    State(context): State<ServerContext>,
) -> Json<Vec<BroadcastSession>> {
    Json(context.station.broadcast.active_sessions().to_serialized())
}

pub fn router() -> Router {
    Router::new()
        .route("/", get(broadcast_state))
        .route("/", post(start_broadcast))
        .route("/", axum::routing::delete(end_broadcast))
        .route("/microphone", post(toggle_microphone))
        .route("/mode", post(switch_mode))
        .route("/emergency", post(trigger_emergency))
        .route("/actions", post(log_action))
        .route("/active", get(active_sessions))
}
