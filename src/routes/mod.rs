pub mod api;
pub mod packages;

use rocket::routes;

pub fn get_routes() -> Vec<rocket::Route> {
    routes![
        api::health_check,
        api::get_log,
        packages::list_packages,
        packages::get_package,
        packages::get_version,
        packages::get_updates,
    ]
}
