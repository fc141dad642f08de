mod common;

use chrono::Utc;
use common::{TestDb, descriptor, request, tick};
use pkgreg::RegistryError;
use pkgreg::database::packages;
use pkgreg::models::{LogType, Person, Role};
use pkgreg::services::RegistryService;
use serde_json::json;

#[test]
fn test_latest_version_is_semver_maximum() {
    let t = TestDb::new();
    let alice = t.user("alice");

    for version in ["1.0.0", "2.0.0", "1.5.0", "1.10.0"] {
        t.publish(&alice, "widgets", version);
    }

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let latest = t
        .db
        .versions()
        .get_by_id(package.latest_version_id.unwrap())
        .unwrap()
        .unwrap();
    assert_eq!(latest.version, "2.0.0");
    assert!(package.is_latest_version(&latest));
}

#[test]
fn test_removing_latest_promotes_next_highest() {
    let t = TestDb::new();
    let alice = t.user("alice");
    t.publish(&alice, "widgets", "1.0.0");
    t.publish(&alice, "widgets", "2.0.0");

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let latest = t.db.get_version(&package, "2.0.0").unwrap().unwrap();
    assert!(package.is_latest_version(&latest));

    t.db.remove_version(&package, &latest).unwrap();

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let view = t.db.serialize_package_min(&package).unwrap();
    assert_eq!(view.latest, "1.0.0");
    assert!(t.db.get_version(&package, "2.0.0").unwrap().is_none());
}

#[test]
fn test_removing_only_version_is_invariant_violation() {
    let t = TestDb::new();
    let alice = t.user("alice");
    t.publish(&alice, "widgets", "1.0.0");

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let only = t.db.get_version(&package, "1.0.0").unwrap().unwrap();

    let err = t.db.remove_version(&package, &only).unwrap_err();
    assert!(matches!(err, RegistryError::InvariantViolation(_)));

    // Nothing changed
    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    assert_eq!(package.latest_version_id, Some(only.id));
    assert!(t.db.get_version(&package, "1.0.0").unwrap().is_some());
}

#[test]
fn test_removing_non_latest_keeps_latest() {
    let t = TestDb::new();
    let alice = t.user("alice");
    t.publish(&alice, "widgets", "1.0.0");
    t.publish(&alice, "widgets", "3.0.0");
    t.publish(&alice, "widgets", "2.0.0");

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let middle = t.db.get_version(&package, "2.0.0").unwrap().unwrap();
    t.db.remove_version(&package, &middle).unwrap();

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    assert_eq!(t.db.serialize_package_min(&package).unwrap().latest, "3.0.0");
    assert_eq!(t.db.get_package_versions(&package).unwrap().len(), 2);
}

#[test]
fn test_package_remove_cascades() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.0.0",
        "maintainers": ["Jane <jane@example.org>", {"name": "Joe", "email": "joe@example.org"}]
    })
    .to_string();
    t.publish_descriptor(&alice, &text);
    t.publish(&alice, "widgets", "1.1.0");
    t.publish(&alice, "widgets", "1.2.0");

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    assert_eq!(t.db.get_package_versions(&package).unwrap().len(), 3);
    assert_eq!(t.db.package_authors().maintainers(&package).unwrap().len(), 2);

    t.db.remove_package(&package).unwrap();

    assert!(t.db.get_package_by_name("widgets").unwrap().is_none());
    assert!(t.db.get_package_versions(&package).unwrap().is_empty());
    assert!(t.db.package_authors().maintainers(&package).unwrap().is_empty());
    assert!(t.db.package_authors().contributors(&package).unwrap().is_empty());

    // Authors are shared and survive the package
    let jane = t.db.authors().get_by_email("jane@example.org").unwrap();
    assert_eq!(jane.map(|a| a.name), Some("Jane".to_string()));
}

#[test]
fn test_role_lookup_respects_role() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let package = t.publish(&alice, "widgets", "1.0.0").package;
    let jane = t
        .db
        .authors()
        .create("Jane", Some("jane@example.org"), None)
        .unwrap();

    let links = t.db.package_authors();
    let maintainer = links.create(&package, &jane, Role::Maintainer).unwrap();
    links.create(&package, &jane, Role::Contributor).unwrap();

    links.remove(&maintainer).unwrap();

    assert!(
        links
            .get(&package, &jane, Some(Role::Maintainer))
            .unwrap()
            .is_none()
    );
    let contributor = links
        .get(&package, &jane, Some(Role::Contributor))
        .unwrap()
        .unwrap();
    assert_eq!(contributor.role().unwrap(), Role::Contributor);
    assert!(links.get(&package, &jane, None).unwrap().is_some());
}

#[test]
fn test_duplicate_role_link_is_rejected() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let package = t.publish(&alice, "widgets", "1.0.0").package;
    let jane = t.db.authors().create("Jane", None, None).unwrap();

    let links = t.db.package_authors();
    links.create(&package, &jane, Role::Maintainer).unwrap();
    let err = links.create(&package, &jane, Role::Maintainer).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
}

#[test]
fn test_serialize_min_uses_latest_descriptor() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.2.3",
        "description": "x",
        "dependencies": {"a": "^1.0.0"}
    })
    .to_string();
    let package = t.publish_descriptor(&alice, &text).package;

    let view = t.db.serialize_package_min(&package).unwrap();
    assert_eq!(view.latest, "1.2.3");
    assert_eq!(view.description.as_deref(), Some("x"));
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["dependencies"], json!({"a": "^1.0.0"}));
    assert!(json.get("versions").is_none());
}

#[test]
fn test_serialize_min_omits_missing_dependencies() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let package = t.publish(&alice, "widgets", "1.0.0").package;

    let json = serde_json::to_value(t.db.serialize_package_min(&package).unwrap()).unwrap();
    assert!(json.get("dependencies").is_none());
    assert_eq!(json["maintainers"], json!([]));
}

#[test]
fn test_serialize_sorts_versions_descending() {
    let t = TestDb::new();
    let alice = t.user("alice");
    for version in ["1.2.0", "1.10.0", "0.9.0", "2.0.0-beta.1", "1.2.1"] {
        t.publish(&alice, "widgets", version);
    }

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let view = t.db.serialize_package(&package).unwrap();
    let versions: Vec<String> = view
        .versions
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(
        versions,
        vec!["2.0.0-beta.1", "1.10.0", "1.2.1", "1.2.0", "0.9.0"]
    );
    assert_eq!(view.latest, "2.0.0-beta.1");
}

#[test]
fn test_version_view_overlays_version_details() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let old = json!({"name": "widgets", "version": "1.0.0", "dependencies": {"a": "^1.0.0"}});
    let new = json!({"name": "widgets", "version": "2.0.0", "description": "newest"});
    t.publish_descriptor(&alice, &old.to_string());
    t.publish_descriptor(&alice, &new.to_string());

    let view = RegistryService::version_view(&t.db, "widgets", "1.0.0").unwrap();
    assert_eq!(view.version, "1.0.0");
    assert_eq!(view.latest, "2.0.0");
    assert_eq!(view.description.as_deref(), Some("newest"));
    assert_eq!(view.dependencies.get("a"), Some(&json!("^1.0.0")));
    assert_eq!(view.filename, "widgets-1.0.0.zip");

    let latest = RegistryService::version_view(&t.db, "widgets", "2.0.0").unwrap();
    assert!(latest.dependencies.is_empty());

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let old = t.db.get_version(&package, "1.0.0").unwrap().unwrap();
    let summary = t.db.serialize_version_min(&old).unwrap();
    assert_eq!(summary.name, "widgets");
    assert_eq!(summary.filesize, 1024);
    assert_eq!(summary.checksums.sha1, "sha1-widgets-1.0.0");

    let err = RegistryService::version_view(&t.db, "widgets", "9.9.9").unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[test]
fn test_removed_packages_only_lists_package_deletions_after_cutoff() {
    let t = TestDb::new();
    let log = t.db.log();

    let early = log.append(LogType::Delete, "early", None, None).unwrap();
    tick();
    log.append(LogType::Delete, "widgets", Some("1.0.0"), None).unwrap();
    log.append(LogType::Add, "gadgets", None, None).unwrap();
    log.append(LogType::Delete, "gizmos", None, None).unwrap();
    log.append(LogType::Delete, "gizmos", None, None).unwrap();

    let removed = log.get_removed_packages(early.created_at).unwrap();
    assert_eq!(removed, vec!["gizmos".to_string()]);
}

#[test]
fn test_log_queries() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let before = Utc::now().naive_utc();
    tick();

    t.publish(&alice, "widgets", "1.0.0");
    t.publish(&alice, "widgets", "1.1.0");
    RegistryService::unpublish_version(&t.db, &alice, "widgets", "1.1.0").unwrap();
    RegistryService::publish(&t.db, &alice, &request(&descriptor("widgets", "1.0.0"), true))
        .unwrap();

    let log = t.db.log();
    assert_eq!(log.get_by_package("widgets").unwrap().len(), 4);
    assert_eq!(log.get_by_type(&[LogType::Add]).unwrap().len(), 2);
    assert_eq!(
        log.get_by_type(&[LogType::Update, LogType::Delete])
            .unwrap()
            .len(),
        2
    );

    let since = log.get_entries_since(before, &[]).unwrap();
    assert_eq!(since.len(), 4);
    let deletes = log.get_entries_since(before, &[LogType::Delete]).unwrap();
    assert_eq!(deletes.len(), 1);
    assert_eq!(deletes[0].version.as_deref(), Some("1.1.0"));
    assert!(!deletes[0].is_package_event());
}

#[test]
fn test_duplicate_package_name_is_validation_error() {
    let t = TestDb::new();
    let alice = t.user("alice");
    t.db.create_package("widgets", None, &alice).unwrap();

    let err = t.db.create_package("widgets", None, &alice).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));
}

#[test]
fn test_invalid_package_name_is_rejected() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let long = "x".repeat(256);

    for name in ["", long.as_str()] {
        let err = t.db.create_package(name, None, &alice).unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }
}

#[test]
fn test_publish_rejects_bad_descriptors() {
    let t = TestDb::new();
    let alice = t.user("alice");

    let err = RegistryService::publish(&t.db, &alice, &request("{not json", false)).unwrap_err();
    assert!(matches!(err, RegistryError::MalformedDescriptor(_)));

    let bad_version = descriptor("widgets", "one point oh");
    let err = RegistryService::publish(&t.db, &alice, &request(&bad_version, false)).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    // Failed publishes leave nothing behind
    assert!(t.db.get_package_by_name("widgets").unwrap().is_none());
    assert!(t.db.log().get_by_package("widgets").unwrap().is_empty());
}

#[test]
fn test_republish_requires_overwrite() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let first = t.publish(&alice, "widgets", "1.0.0");
    assert_eq!(first.log_entry.log_type().unwrap(), LogType::Add);

    let text = descriptor("widgets", "1.0.0");
    let err = RegistryService::publish(&t.db, &alice, &request(&text, false)).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    let replaced = RegistryService::publish(&t.db, &alice, &request(&text, true)).unwrap();
    assert_eq!(replaced.log_entry.log_type().unwrap(), LogType::Update);
    assert_eq!(replaced.version.id, first.version.id);
}

#[test]
fn test_publish_by_non_owner_is_forbidden() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let mallory = t.user("mallory");
    let package = t.publish(&alice, "widgets", "1.0.0").package;
    assert!(package.is_owner(&alice));
    assert!(!package.is_owner(&mallory));

    let text = descriptor("widgets", "2.0.0");
    let err = RegistryService::publish(&t.db, &mallory, &request(&text, false)).unwrap_err();
    assert!(matches!(err, RegistryError::Forbidden(_)));

    let err = RegistryService::unpublish_package(&t.db, &mallory, "widgets").unwrap_err();
    assert!(matches!(err, RegistryError::Forbidden(_)));
    assert!(t.db.get_package_by_name("widgets").unwrap().is_some());
}

#[test]
fn test_publish_links_descriptor_people() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.0.0",
        "author": "Jane Doe <jane@example.org> (https://jane.example.org)",
        "maintainers": [{"name": "Jane Doe", "email": "jane@example.org"}],
        "contributors": ["Joe"]
    })
    .to_string();
    let package = t.publish_descriptor(&alice, &text).package;

    let view = t.db.serialize_package_min(&package).unwrap();
    let author = view.author.unwrap();
    assert_eq!(author.name, "Jane Doe");
    assert_eq!(author.web.as_deref(), Some("https://jane.example.org"));
    assert_eq!(view.maintainers.len(), 1);
    assert_eq!(view.maintainers[0].email.as_deref(), Some("jane@example.org"));
    assert_eq!(view.contributors[0].name, "Joe");

    // Same person in two places is one author
    let jane = t.db.authors().get_by_name("Jane Doe").unwrap().unwrap();
    assert_eq!(package.author_id, Some(jane.id));

    // Republishing does not duplicate links
    t.publish_descriptor(
        &alice,
        &json!({"name": "widgets", "version": "1.1.0", "maintainers": ["Jane Doe"]}).to_string(),
    );
    assert_eq!(t.db.package_authors().maintainers(&package).unwrap().len(), 1);

    let person = Person::parse("Jane Doe <jane@example.org>");
    assert_eq!(person.email.as_deref(), Some("jane@example.org"));
}

#[test]
fn test_unpublish_last_version_removes_package() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let before = Utc::now().naive_utc();
    tick();
    t.publish(&alice, "widgets", "1.0.0");

    let entry = RegistryService::unpublish_version(&t.db, &alice, "widgets", "1.0.0").unwrap();
    assert_eq!(entry.log_type().unwrap(), LogType::Delete);
    assert!(entry.is_package_event());

    assert!(t.db.get_package_by_name("widgets").unwrap().is_none());
    assert_eq!(
        t.db.log().get_removed_packages(before).unwrap(),
        vec!["widgets".to_string()]
    );
}

#[test]
fn test_unpublish_unknown_package_is_not_found() {
    let t = TestDb::new();
    let alice = t.user("alice");

    let err = RegistryService::unpublish_package(&t.db, &alice, "ghost").unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));

    t.publish(&alice, "widgets", "1.0.0");
    let err = RegistryService::unpublish_version(&t.db, &alice, "widgets", "2.0.0").unwrap_err();
    assert!(matches!(err, RegistryError::NotFound(_)));
}

#[test]
fn test_updates_since() {
    let t = TestDb::new();
    let alice = t.user("alice");
    t.publish(&alice, "old", "1.0.0");
    t.publish(&alice, "doomed", "1.0.0");
    tick();

    let cutoff = Utc::now().naive_utc();
    tick();
    t.publish(&alice, "fresh", "1.0.0");
    RegistryService::unpublish_package(&t.db, &alice, "doomed").unwrap();

    let updated = t.db.get_packages_updated_since(cutoff).unwrap();
    assert_eq!(updated.len(), 1);
    assert_eq!(updated[0].name, "fresh");

    let updates = RegistryService::updates_since(&t.db, cutoff).unwrap();
    assert_eq!(updates.updated.len(), 1);
    assert_eq!(updates.updated[0].name, "fresh");
    assert_eq!(updates.removed, vec!["doomed".to_string()]);
}

#[test]
fn test_search_returns_every_package() {
    let t = TestDb::new();
    let alice = t.user("alice");
    t.publish(&alice, "beta", "1.0.0");
    t.publish(&alice, "alpha", "1.0.0");
    // A package without versions cannot be shown
    t.db.create_package("empty", None, &alice).unwrap();

    let listed = RegistryService::list_packages(&t.db, "no match whatsoever").unwrap();
    let names: Vec<&str> = listed.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "beta"]);
}

#[test]
fn test_users_and_authors() {
    let t = TestDb::new();
    let alice = t.user("alice");

    let err = t
        .db
        .users()
        .create("alice", "other", "salt", "other@example.org")
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    let found = t.db.users().get_by_name("alice").unwrap().unwrap();
    assert_eq!(found, alice);
    assert_eq!(t.db.users().get_by_id(alice.id).unwrap().unwrap(), alice);
    assert!(t.db.users().get_by_name("bob").unwrap().is_none());

    let jane = t
        .db
        .authors()
        .create("Jane", Some("jane@example.org"), Some("https://jane.example.org"))
        .unwrap();
    assert_eq!(t.db.authors().get_by_id(jane.id).unwrap().unwrap(), jane);
    assert_eq!(t.db.authors().get_by_name("Jane").unwrap().unwrap(), jane);
    assert!(t.db.authors().get_by_email("nobody@example.org").unwrap().is_none());
}

#[test]
fn test_padded_version_cannot_shadow_canonical_one() {
    let t = TestDb::new();
    let alice = t.user("alice");

    let padded = json!({"name": "widgets", "version": " 1.0.0"}).to_string();
    let err = RegistryService::publish(&t.db, &alice, &request(&padded, false)).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    t.publish(&alice, "widgets", "1.0.0");
    let err = RegistryService::publish(&t.db, &alice, &request(&padded, true)).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    let stored: Vec<String> = t
        .db
        .get_package_versions(&package)
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(stored, vec!["1.0.0"]);
}

#[test]
fn test_failed_author_linking_rolls_back_new_package() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.0.0",
        "maintainers": [{"name": "Jane"}, {"name": " "}]
    })
    .to_string();

    let err = RegistryService::publish(&t.db, &alice, &request(&text, false)).unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    assert!(t.db.get_package_by_name("widgets").unwrap().is_none());
    assert!(t.db.packages().all().unwrap().is_empty());
    assert!(t.db.authors().get_by_name("Jane").unwrap().is_none());
    assert!(t.db.log().get_by_package("widgets").unwrap().is_empty());
}

#[test]
fn test_failed_cascade_leaves_package_intact() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.0.0",
        "maintainers": ["Jane <jane@example.org>", "Joe <joe@example.org>"]
    })
    .to_string();
    t.publish_descriptor(&alice, &text);
    t.publish(&alice, "widgets", "2.0.0");
    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();

    // The cascade itself succeeds, a later step in the same transaction does not
    let err = t
        .db
        .transaction(|conn| {
            packages::remove(conn, &package)?;
            packages::create(conn, "", None, alice.id)
        })
        .unwrap_err();
    assert!(matches!(err, RegistryError::Validation(_)));

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    assert_eq!(t.db.get_package_versions(&package).unwrap().len(), 2);
    assert_eq!(t.db.package_authors().maintainers(&package).unwrap().len(), 2);
    assert_eq!(t.db.serialize_package_min(&package).unwrap().latest, "2.0.0");
}

#[test]
fn test_concurrent_publishes_keep_latest_consistent() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let versions = ["1.0.0", "3.0.0", "2.0.0", "0.5.0", "2.5.0", "1.5.0"];

    std::thread::scope(|scope| {
        for version in versions {
            let (db, alice) = (&t.db, &alice);
            scope.spawn(move || {
                let text = descriptor("widgets", version);
                RegistryService::publish(db, alice, &request(&text, false))
                    .expect("concurrent publish failed");
            });
        }
    });

    let package = t.db.get_package_by_name("widgets").unwrap().unwrap();
    assert_eq!(t.db.get_package_versions(&package).unwrap().len(), versions.len());
    assert_eq!(t.db.serialize_package_min(&package).unwrap().latest, "3.0.0");
    assert_eq!(t.db.packages().all().unwrap().len(), 1);
    assert_eq!(
        t.db.log().get_by_type(&[LogType::Add]).unwrap().len(),
        versions.len()
    );
}

#[test]
fn test_email_only_author_is_named_after_email() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.0.0",
        "author": "<jane@example.org>",
        "contributors": [{"name": "", "email": "joe@example.org"}]
    })
    .to_string();

    let package = t.publish_descriptor(&alice, &text).package;
    let view = t.db.serialize_package_min(&package).unwrap();

    let author = view.author.unwrap();
    assert_eq!(author.name, "jane@example.org");
    assert_eq!(author.email.as_deref(), Some("jane@example.org"));
    assert_eq!(view.contributors[0].name, "joe@example.org");
}

#[test]
fn test_loosely_typed_manifest_fields_are_accepted() {
    let t = TestDb::new();
    let alice = t.user("alice");
    let text = json!({
        "name": "widgets",
        "version": "1.0.0",
        "keywords": "web",
        "dependencies": {"gadgets": {"version": "^1.0.0"}}
    })
    .to_string();

    let package = t.publish_descriptor(&alice, &text).package;
    let json = serde_json::to_value(t.db.serialize_package_min(&package).unwrap()).unwrap();
    assert_eq!(json["keywords"], "web");
    assert_eq!(json["dependencies"]["gadgets"]["version"], "^1.0.0");
}
