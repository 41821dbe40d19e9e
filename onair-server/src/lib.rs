use std::{
    env,
    net::{Ipv6Addr, SocketAddr},
    sync::Arc,
    thread,
};

use axum::routing::get;
use log::info;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use onair_station::{PgDatabase, RelayPortProvider, Station};

mod auth;
mod broadcast;
mod context;
mod docs;
mod errors;
mod hardware;
mod logging;
mod schedule;
mod schemas;
mod serialized;
mod sse;

pub use context::ServerContext;
pub use logging::init_logger;

use sse::ServerSentEvents;

/// The default port the server will listen on.
pub const DEFAULT_PORT: u16 = 9050;

pub type Router = axum::Router<ServerContext>;

/// Starts the onair server
pub async fn run_server(station: Arc<Station<PgDatabase>>, relay: Arc<RelayPortProvider>) {
    let port = env::var("ONAIR_SERVER_PORT")
        .map(|x| x.parse::<u16>().expect("Port must be a number"))
        .unwrap_or(DEFAULT_PORT);

    let addr: SocketAddr = (Ipv6Addr::UNSPECIFIED, port).into();

    let sse = ServerSentEvents::new();
    spawn_event_forwarder(&station, &sse);

    let context = ServerContext {
        station,
        relay,
        sse,
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let version_one_router = Router::new()
        .nest("/auth", auth::router())
        .nest("/broadcast", broadcast::router())
        .nest("/schedule", schedule::router())
        .nest("/hardware", hardware::router())
        .nest("/events", sse::router());

    let root_router = Router::new()
        .nest("/v1", version_one_router)
        .route("/api.json", get(docs::docs))
        .layer(cors)
        .with_state(context);

    let listener = TcpListener::bind(&addr).await.expect("listens on address");

    info!("Listening on port {port}");

    axum::serve(listener, root_router.into_make_service())
        .await
        .expect("server runs");
}

/// Forwards station events to the connected consoles
fn spawn_event_forwarder(station: &Arc<Station<PgDatabase>>, sse: &Arc<ServerSentEvents>) {
    let station = station.clone();
    let sse = sse.clone();

    thread::spawn(move || loop {
        let event = station.wait_for_event();
        sse.broadcast(event.into());
    });
}
