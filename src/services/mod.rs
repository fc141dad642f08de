pub mod registry;

pub use crate::database::DatabaseService;
pub use registry::{PublishOutcome, PublishRequest, RegistryService, Updates};
