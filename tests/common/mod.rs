#![allow(dead_code)]

use pkgreg::DatabaseService;
use pkgreg::models::{Checksums, User, VersionFile};
use pkgreg::services::{PublishOutcome, PublishRequest, RegistryService};
use serde_json::json;
use tempfile::TempDir;

/// A registry database living in its own temporary directory.
pub struct TestDb {
    pub db: DatabaseService,
    pub temp_dir: TempDir, // Keep alive for cleanup
}

impl TestDb {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let database_url = temp_dir.path().join("registry.db");
        let db = DatabaseService::new(&database_url.to_string_lossy())
            .expect("Failed to initialize database");
        Self { db, temp_dir }
    }

    pub fn user(&self, name: &str) -> User {
        self.db
            .users()
            .create(name, "secret", "salt", &format!("{name}@example.org"))
            .expect("Failed to create user")
    }

    pub fn publish(&self, user: &User, name: &str, version: &str) -> PublishOutcome {
        self.publish_descriptor(user, &descriptor(name, version))
    }

    pub fn publish_descriptor(&self, user: &User, descriptor: &str) -> PublishOutcome {
        RegistryService::publish(&self.db, user, &request(descriptor, false))
            .expect("Failed to publish")
    }
}

pub fn descriptor(name: &str, version: &str) -> String {
    json!({
        "name": name,
        "version": version,
        "description": format!("{name} package"),
    })
    .to_string()
}

pub fn file_for(descriptor: &str) -> VersionFile {
    let parsed: serde_json::Value = serde_json::from_str(descriptor).unwrap_or_default();
    let name = parsed["name"].as_str().unwrap_or("unnamed");
    let version = parsed["version"].as_str().unwrap_or("0.0.0");
    VersionFile {
        filename: format!("{name}-{version}.zip"),
        filesize: 1024,
        checksums: Checksums {
            md5: format!("md5-{name}-{version}"),
            sha1: format!("sha1-{name}-{version}"),
            sha256: format!("sha256-{name}-{version}"),
        },
    }
}

pub fn request(descriptor: &str, overwrite: bool) -> PublishRequest {
    PublishRequest {
        descriptor: descriptor.to_string(),
        file: file_for(descriptor),
        overwrite,
    }
}

/// Lets the clock move so that strictly-after filters can tell writes apart.
pub fn tick() {
    std::thread::sleep(std::time::Duration::from_millis(15));
}
