use std::{env, error::Error, process, sync::Arc};

use log::error;

use onair_server::{init_logger, run_server};
use onair_station::{LogAuditSink, PgDatabase, RelayPortProvider, Station};

#[tokio::main]
async fn main() {
    init_logger();

    if let Err(e) = run().await {
        error!("Failed to start onair: {e}");
        process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error>> {
    let database_url =
        env::var("ONAIR_DATABASE_URL").map_err(|_| "ONAIR_DATABASE_URL must be set")?;

    let database = PgDatabase::new(&database_url).await?;
    database.migrate().await?;

    let relay = Arc::new(RelayPortProvider::new());
    let audit = Arc::new(LogAuditSink);

    let station = Arc::new(Station::new(database, relay.clone(), audit));
    station.start().await?;

    run_server(station, relay).await;

    Ok(())
}
