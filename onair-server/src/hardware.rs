use axum::{
    extract::{Path, State},
    routing::{delete, get, post},
    Json,
};

use crate::{
    auth::Session,
    context::ServerContext,
    errors::{ServerError, ServerResult},
    schemas::{FeedMessagesSchema, RegisterPortSchema, ValidatedJson},
    serialized::{HardwareStatus, MicrophoneState, Port, ScannedPort, ToSerialized},
    Router,
};

#[utoipa::path(
    get,
    path = "/v1/hardware/ports",
    tag = "hardware",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Vec<ScannedPort>, description = "Every visible port, probed for availability")
    )
)]
async fn scan_ports(
    _session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<Vec<ScannedPort>>> {
    let scanned = context.station.hardware.scan().await?;

    Ok(Json(scanned.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/hardware/ports",
    tag = "hardware",
    request_body = RegisterPortSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Port, description = "The relay port was registered")
    )
)]
async fn register_port(
    _session: Session,
    State(context): State<ServerContext>,
    ValidatedJson(body): ValidatedJson<RegisterPortSchema>,
) -> ServerResult<Json<Port>> {
    let port_id = context.relay.register(&body.name, body.kind);

    let port = onair_station::PortInfo {
        id: port_id,
        name: body.name,
        kind: body.kind,
    };

    Ok(Json(port.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/hardware/ports/{id}/connect",
    tag = "hardware",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = Port, description = "The port is connected and pumping messages")
    )
)]
async fn connect_port(
    session: Session,
    State(context): State<ServerContext>,
    Path(port_id): Path<String>,
) -> ServerResult<Json<Port>> {
    let user = session.user();
    let capabilities = context.station.access.capabilities_for(user.id).await;

    if !capabilities.can_manage_audio {
        return Err(ServerError::NotAuthorized("manage audio hardware"));
    }

    let info = context.station.hardware.connect(user.id, &port_id).await?;

    Ok(Json(info.to_serialized()))
}

#[utoipa::path(
    post,
    path = "/v1/hardware/ports/{id}/messages",
    tag = "hardware",
    request_body = FeedMessagesSchema,
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The messages were relayed")
    )
)]
async fn feed_messages(
    _session: Session,
    State(context): State<ServerContext>,
    Path(port_id): Path<String>,
    ValidatedJson(body): ValidatedJson<FeedMessagesSchema>,
) -> ServerResult<()> {
    for message in body.messages {
        context.relay.feed(&port_id, message).await?;
    }

    Ok(())
}

#[utoipa::path(
    delete,
    path = "/v1/hardware/connection",
    tag = "hardware",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, description = "The active port was disconnected")
    )
)]
async fn disconnect(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<()> {
    let capabilities = context
        .station
        .access
        .capabilities_for(session.user().id)
        .await;

    if !capabilities.can_manage_audio {
        return Err(ServerError::NotAuthorized("manage audio hardware"));
    }

    context.station.hardware.disconnect();
    Ok(())
}

#[utoipa::path(
    get,
    path = "/v1/hardware/status",
    tag = "hardware",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = HardwareStatus)
    )
)]
async fn status(_session: Session, State(context): State<ServerContext>) -> Json<HardwareStatus> {
    let hardware = &context.station.hardware;

    Json(HardwareStatus {
        mixer: hardware.status().to_serialized(),
        active_port: hardware.active_port().to_serialized(),
        scanning: hardware.is_scanning(),
    })
}

#[utoipa::path(
    post,
    path = "/v1/hardware/live",
    tag = "hardware",
    security(
        ("BearerAuth" = [])
    ),
    responses(
        (status = 200, body = MicrophoneState, description = "The new state of the hardware live flag")
    )
)]
async fn toggle_live(
    session: Session,
    State(context): State<ServerContext>,
) -> ServerResult<Json<MicrophoneState>> {
    let capabilities = context
        .station
        .access
        .capabilities_for(session.user().id)
        .await;

    if !capabilities.can_manage_audio {
        return Err(ServerError::NotAuthorized("manage audio hardware"));
    }

    let live = context.station.hardware.toggle_live();

    Ok(Json(MicrophoneState { live }))
}

pub fn router() -> Router {
    Router::new()
        .route("/ports", get(scan_ports))
        .route("/ports", post(register_port))
        .route("/ports/:id/connect", post(connect_port))
        .route("/ports/:id/messages", post(feed_messages))
        .route("/connection", delete(disconnect))
        .route("/status", get(status))
        .route("/live", post(toggle_live))
}
