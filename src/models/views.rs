//! Client-facing projections of packages, versions and authors.
//!
//! Relational fields are merged with the descriptor stored on the relevant
//! version. Building a view never touches the store.

use crate::error::Result;
use crate::models::author::Author;
use crate::models::descriptor::Descriptor;
use crate::models::package::Package;
use crate::models::version::{Checksums, Version};
use crate::version_order::{self, Direction};
use chrono::{NaiveDateTime, Timelike};
use rocket::serde::Serialize;
use serde_json::{Map, Value};

/// Formats a timestamp as `yyyy-MM-dd'T'HH:mm:ss.S'Z'`.
///
/// The fraction is the millisecond count without zero padding, so 5ms renders
/// as `.5` and 120ms as `.120`.
pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    let millis = timestamp.nanosecond() / 1_000_000 % 1000;
    format!("{}.{}Z", timestamp.format("%Y-%m-%dT%H:%M:%S"), millis)
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorView {
    pub name: String,
    pub email: Option<String>,
    pub web: Option<String>,
}

impl From<&Author> for AuthorView {
    fn from(author: &Author) -> Self {
        Self {
            name: author.name.clone(),
            email: author.email.clone(),
            web: author.web.clone(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct PackageView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Value>,
    pub latest: String,
    pub modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implements: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorView>,
    pub maintainers: Vec<AuthorView>,
    pub contributors: Vec<AuthorView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<VersionSummary>>,
}

impl PackageView {
    /// Minimal package view, driven by the descriptor of the latest version.
    pub fn new(
        package: &Package,
        latest: &Version,
        author: Option<&Author>,
        maintainers: &[Author],
        contributors: &[Author],
    ) -> Result<Self> {
        let descriptor = Descriptor::parse(&latest.descriptor)?;

        Ok(Self {
            name: package.name.clone(),
            description: descriptor.description,
            keywords: descriptor.keywords,
            latest: descriptor.version,
            modified: format_timestamp(&latest.updated_at),
            homepage: descriptor.homepage,
            implements: descriptor.implements,
            author: author.map(AuthorView::from),
            maintainers: maintainers.iter().map(AuthorView::from).collect(),
            contributors: contributors.iter().map(AuthorView::from).collect(),
            dependencies: descriptor.dependencies,
            versions: None,
        })
    }

    /// Adds every version, highest first.
    pub fn with_versions(mut self, versions: &[Version]) -> Self {
        let mut summaries: Vec<VersionSummary> = versions
            .iter()
            .map(|v| VersionSummary::new(&self.name, v))
            .collect();
        let cmp = version_order::sorter(Direction::Descending);
        summaries.sort_by(|a, b| cmp(a.version.as_str(), b.version.as_str()));

        self.versions = Some(summaries);
        self
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct VersionSummary {
    pub name: String,
    pub version: String,
    pub checksums: Checksums,
    pub filename: String,
    pub filesize: i64,
    pub modified: String,
}

impl VersionSummary {
    pub fn new(package_name: &str, version: &Version) -> Self {
        Self {
            name: package_name.to_string(),
            version: version.version.clone(),
            checksums: version.checksums(),
            filename: version.filename.clone(),
            modified: format_timestamp(&version.updated_at),
            filesize: version.filesize,
        }
    }
}

/// Package view overlaid with the details of one specific version.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct VersionView {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Value>,
    pub latest: String,
    pub modified: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub implements: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<AuthorView>,
    pub maintainers: Vec<AuthorView>,
    pub contributors: Vec<AuthorView>,
    pub dependencies: Map<String, Value>,
    pub version: String,
    pub checksums: Checksums,
    pub filename: String,
}

impl VersionView {
    pub fn new(package: PackageView, version: &Version) -> Result<Self> {
        let descriptor = Descriptor::parse(&version.descriptor)?;

        Ok(Self {
            name: package.name,
            description: package.description,
            keywords: package.keywords,
            latest: package.latest,
            modified: format_timestamp(&version.updated_at),
            homepage: package.homepage,
            implements: package.implements,
            author: package.author,
            maintainers: package.maintainers,
            contributors: package.contributors,
            dependencies: descriptor.dependencies.unwrap_or_default(),
            version: version.version.clone(),
            checksums: version.checksums(),
            filename: version.filename.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(millis: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2011, 3, 7)
            .unwrap()
            .and_hms_milli_opt(9, 5, 2, millis)
            .unwrap()
    }

    fn package() -> Package {
        Package {
            id: 1,
            name: "stick".to_string(),
            author_id: None,
            latest_version_id: Some(10),
            creator_id: 1,
            modifier_id: 1,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn version(id: i32, number: &str, descriptor: &str) -> Version {
        Version {
            id,
            package_id: 1,
            version: number.to_string(),
            descriptor: descriptor.to_string(),
            filename: format!("stick-{number}.zip"),
            filesize: 2048,
            md5: "m".to_string(),
            sha1: "s1".to_string(),
            sha256: "s256".to_string(),
            creator_id: 1,
            modifier_id: 1,
            created_at: at(0),
            updated_at: at(120),
        }
    }

    #[test]
    fn test_timestamp_format_millis_unpadded() {
        assert_eq!(format_timestamp(&at(0)), "2011-03-07T09:05:02.0Z");
        assert_eq!(format_timestamp(&at(5)), "2011-03-07T09:05:02.5Z");
        assert_eq!(format_timestamp(&at(120)), "2011-03-07T09:05:02.120Z");
        assert_eq!(format_timestamp(&at(999)), "2011-03-07T09:05:02.999Z");
    }

    #[test]
    fn test_package_view_fields_from_latest_descriptor() {
        let latest = version(
            10,
            "1.2.3",
            r#"{"version":"1.2.3","description":"x","dependencies":{"a":"^1.0.0"}}"#,
        );
        let view = PackageView::new(&package(), &latest, None, &[], &[]).unwrap();

        assert_eq!(view.latest, "1.2.3");
        assert_eq!(view.description.as_deref(), Some("x"));
        assert_eq!(view.modified, "2011-03-07T09:05:02.120Z");
        let dependencies = view.dependencies.unwrap();
        assert_eq!(dependencies["a"], "^1.0.0");
    }

    #[test]
    fn test_loosely_typed_manifest_fields_pass_through() {
        let latest = version(
            10,
            "1.2.3",
            r#"{"version":"1.2.3","keywords":"web","dependencies":{"zeta":"1.0.0","alpha":{"version":"2.0.0","optional":true}}}"#,
        );
        let view = PackageView::new(&package(), &latest, None, &[], &[]).unwrap();
        assert_eq!(view.keywords, Some(Value::from("web")));

        let json = serde_json::to_string(&view).unwrap();
        let zeta = json.find("\"zeta\"").unwrap();
        let alpha = json.find("\"alpha\"").unwrap();
        assert!(zeta < alpha, "dependency order must follow the descriptor");
        assert!(json.contains(r#""alpha":{"version":"2.0.0","optional":true}"#));
    }

    #[test]
    fn test_absent_dependencies_are_omitted_from_json() {
        let latest = version(10, "1.2.3", r#"{"version":"1.2.3","description":"x"}"#);
        let view = PackageView::new(&package(), &latest, None, &[], &[]).unwrap();
        let json = serde_json::to_value(&view).unwrap();

        assert!(json.get("dependencies").is_none());
        assert!(json.get("author").is_none());
        assert!(json.get("versions").is_none());
        assert_eq!(json["maintainers"], serde_json::json!([]));
    }

    #[test]
    fn test_malformed_descriptor_fails_projection() {
        let latest = version(10, "1.2.3", "{not json");
        let result = PackageView::new(&package(), &latest, None, &[], &[]);
        assert!(matches!(
            result,
            Err(crate::error::RegistryError::MalformedDescriptor(_))
        ));
    }

    #[test]
    fn test_versions_sorted_descending() {
        let latest = version(10, "1.10.0", r#"{"version":"1.10.0"}"#);
        let versions = vec![
            version(1, "1.2.0", r#"{"version":"1.2.0"}"#),
            latest.clone(),
            version(2, "0.9.0", r#"{"version":"0.9.0"}"#),
            version(3, "1.9.0", r#"{"version":"1.9.0"}"#),
        ];
        let view = PackageView::new(&package(), &latest, None, &[], &[])
            .unwrap()
            .with_versions(&versions);

        let order: Vec<&str> = view
            .versions
            .as_ref()
            .unwrap()
            .iter()
            .map(|v| v.version.as_str())
            .collect();
        assert_eq!(order, vec!["1.10.0", "1.9.0", "1.2.0", "0.9.0"]);
    }

    #[test]
    fn test_version_view_defaults_dependencies_to_empty() {
        let latest = version(10, "2.0.0", r#"{"version":"2.0.0","dependencies":{"b":"1.0.0"}}"#);
        let older = version(3, "1.0.0", r#"{"version":"1.0.0"}"#);
        let package_view = PackageView::new(&package(), &latest, None, &[], &[]).unwrap();
        let view = VersionView::new(package_view, &older).unwrap();

        assert_eq!(view.version, "1.0.0");
        assert_eq!(view.latest, "2.0.0");
        assert!(view.dependencies.is_empty());
        assert_eq!(view.filename, "stick-1.0.0.zip");

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["dependencies"], serde_json::json!({}));
        assert_eq!(json["checksums"]["sha256"], "s256");
    }

    #[test]
    fn test_author_view_excludes_id() {
        let author = Author {
            id: 42,
            name: "Jane".to_string(),
            email: Some("jane@example.org".to_string()),
            web: None,
            created_at: at(0),
        };
        let json = serde_json::to_value(AuthorView::from(&author)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "Jane", "email": "jane@example.org", "web": null})
        );
    }
}
