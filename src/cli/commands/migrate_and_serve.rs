use anyhow::Result;
use tracing::{debug, error, info, trace};

use super::initdb::init_database;
use super::serve::run_server;
use crate::config::{Settings, initialize_app_state_with_url};

pub async fn migrate_and_serve(database_url: &str, bind_address: &str, settings: &Settings) -> Result<()> {
    trace!("Entering migrate_and_serve function");
    info!("Applying database migrations and starting server");

    init_database(database_url).await?;

    trace!("Initializing application state");
    let state = match initialize_app_state_with_url(database_url, settings).await {
        Ok(state) => {
            debug!("Application state initialized successfully");
            state
        }
        Err(e) => {
            error!("Failed to initialize application state: {}", e);
            return Err(e);
        }
    };

    run_server(state, bind_address).await
}
