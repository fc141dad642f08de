// Re-export all models from their respective modules
pub mod author;
pub mod descriptor;
pub mod log_entry;
pub mod package;
pub mod user;
pub mod version;
pub mod views;

// Re-export commonly used models
pub use author::*;
pub use descriptor::*;
pub use log_entry::*;
pub use package::*;
pub use user::*;
pub use version::*;
pub use views::*;
