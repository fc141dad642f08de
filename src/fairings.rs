use log::info;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::{Request, Response};

/// Logs every handled request together with the response status.
pub struct RequestLogger;

#[rocket::async_trait]
impl Fairing for RequestLogger {
    fn info(&self) -> Info {
        Info {
            name: "Request Logger",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, req: &'r Request<'_>, res: &mut Response<'r>) {
        info!(
            "{} {} -> {} ({})",
            req.method(),
            req.uri(),
            res.status().code,
            req.headers().get_one("User-Agent").unwrap_or("Unknown")
        );
    }
}
