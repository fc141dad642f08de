pub mod config;
pub mod database;
pub mod error;
pub mod fairings;
pub mod models;
pub mod routes;
pub mod schema;
pub mod services;
pub mod state;
pub mod version_order;

use rocket::Config;
use rocket_cors::{AllowedOrigins, CorsOptions};
use std::error::Error;
use std::sync::Arc;

pub use config::AppConfig;
pub use error::{ApiError, RegistryError};
pub use fairings::RequestLogger;
pub use services::{DatabaseService, RegistryService};
pub use state::AppState;

pub fn create_rocket(
    config: AppConfig,
) -> Result<rocket::Rocket<rocket::Build>, Box<dyn Error + Send + Sync>> {
    // Initialize database service
    let database = Arc::new(DatabaseService::new(&config.database_url)?);

    // Configure CORS
    let cors = CorsOptions::default()
        .allowed_origins(AllowedOrigins::all())
        .to_cors()?;

    // Configure Rocket with custom host and port
    let rocket_config = Config {
        port: config.port,
        address: config.host.parse()?,
        ..Config::default()
    };

    let state = AppState { config, database };

    Ok(rocket::custom(&rocket_config)
        .manage(state)
        .attach(cors)
        .attach(RequestLogger)
        .mount("/", routes::get_routes()))
}
