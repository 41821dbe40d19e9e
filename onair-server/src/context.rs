use std::sync::Arc;

use axum::extract::FromRef;
use onair_station::{PgDatabase, RelayPortProvider, Station};

use crate::sse::ServerSentEvents;

#[derive(Clone, FromRef)]
pub struct ServerContext {
    pub station: Arc<Station<PgDatabase>>,
    /// The provider console relays feed controller messages into
    pub relay: Arc<RelayPortProvider>,
    pub sse: Arc<ServerSentEvents>,
}
