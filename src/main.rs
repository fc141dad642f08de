use log::error;
use pkgreg::{AppConfig, create_rocket};
use rocket::launch;

#[launch]
fn rocket() -> _ {
    // Initialize logging
    env_logger::init();

    match create_rocket(AppConfig::from_env()) {
        Ok(rocket) => rocket,
        Err(e) => {
            error!("Failed to start registry: {e}");
            std::process::exit(1);
        }
    }
}
