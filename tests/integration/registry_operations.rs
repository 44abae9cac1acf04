//! Integration tests for the device registry.
//!
//! Every test works on its own temporary directory; persistence failures
//! are injected through `FlakyStorage`.

use std::sync::Arc;
use std::thread;

use kvmm::error::KvmmError;
use kvmm::registry::mock::FlakyStorage;
use kvmm::registry::{DeviceInput, DeviceView, Registry, DEFAULT_PORT};
use uuid::Uuid;

use crate::common::fixtures::{png_bytes, TestRegistry};
use crate::common::init_test_logging;

fn flaky(reg: &TestRegistry) -> (Registry, Arc<FlakyStorage>) {
    let storage = Arc::new(FlakyStorage::new());
    let registry = Registry::load_with_storage(&reg.config_path, storage.clone())
        .expect("Failed to load registry");
    (registry, storage)
}

// === Load ===

#[test]
fn test_load_missing_file_creates_empty_registry() {
    init_test_logging();
    let reg = TestRegistry::new();
    let registry = reg.load();

    assert!(registry.is_empty());
    assert_eq!(registry.port(), DEFAULT_PORT);
    assert!(reg.config_path.exists());
    assert!(reg.contents().contains("port = 8080"));
}

#[test]
fn test_load_creates_parent_directory() {
    let reg = TestRegistry::new();
    let nested = reg.dir.path().join("a").join("b").join("config.toml");
    let registry = Registry::load(&nested).unwrap();
    assert!(registry.is_empty());
    assert!(nested.exists());
}

#[test]
fn test_load_malformed_file_is_config_error() {
    let reg = TestRegistry::with_content("[[devices]\nhost = ");
    assert!(matches!(
        Registry::load(&reg.config_path),
        Err(KvmmError::ConfigParse(_))
    ));
}

#[test]
fn test_load_assigns_ids_and_generates_thumbnails() {
    init_test_logging();
    let reg = TestRegistry::with_content(
        "[server]\nport = 9000\n\n[[devices]]\nhost = \"10.0.0.7\"\nalias = \"Lab\"\n",
    );
    let registry = reg.load();

    assert_eq!(registry.port(), 9000);
    let device = &registry.list()[0];
    assert!(Uuid::parse_str(&device.id).is_ok());
    assert_eq!(device.thumbnail.as_deref(), Some(format!("{}.jpg", device.id).as_str()));
    assert!(reg.thumbnail_dir().join(format!("{}.jpg", device.id)).is_file());

    // The assigned id is durable.
    let reloaded = reg.load();
    assert_eq!(reloaded.list()[0].id, device.id);
}

#[test]
fn test_load_regenerates_dangling_thumbnail() {
    let reg = TestRegistry::with_content(
        "[[devices]]\nid = \"rack-1\"\nhost = \"10.0.0.7\"\nthumbnail = \"rack-1.png\"\n",
    );
    let registry = reg.load();

    let device = registry.get("rack-1").unwrap();
    assert_eq!(device.thumbnail.as_deref(), Some("rack-1.jpg"));
    assert_eq!(reg.thumbnail_files(), vec!["rack-1.jpg".to_string()]);
}

#[test]
fn test_load_keeps_existing_thumbnail() {
    let reg = TestRegistry::with_content(
        "[[devices]]\nid = \"rack-1\"\nhost = \"10.0.0.7\"\nthumbnail = \"rack-1.png\"\n",
    );
    std::fs::create_dir_all(reg.thumbnail_dir()).unwrap();
    let original = png_bytes(20, 10);
    std::fs::write(reg.thumbnail_dir().join("rack-1.png"), &original).unwrap();

    let registry = reg.load();
    assert_eq!(
        registry.get("rack-1").unwrap().thumbnail.as_deref(),
        Some("rack-1.png")
    );
    assert_eq!(
        std::fs::read(reg.thumbnail_dir().join("rack-1.png")).unwrap(),
        original
    );
}

#[test]
fn test_load_ignores_unknown_keys() {
    let reg = TestRegistry::with_content(
        "theme = \"dark\"\n[server]\nport = 8081\nbanner = true\n\n[[devices]]\nid = \"a\"\nhost = \"h\"\nrack_unit = 4\n",
    );
    let registry = reg.load();
    assert_eq!(registry.port(), 8081);
    assert_eq!(registry.len(), 1);
}

// === Add / Get / Update / Delete ===

#[test]
fn test_add_generates_uuid_and_pattern_thumbnail() {
    init_test_logging();
    let reg = TestRegistry::new();
    let registry = reg.load();

    let device = registry.add(DeviceInput::host("10.0.0.5")).unwrap();

    let id = Uuid::parse_str(&device.id).expect("id is a UUID");
    assert_eq!(id.get_version_num(), 4);
    assert_eq!(device.alias, None);
    assert_eq!(device.thumbnail, Some(format!("{}.jpg", device.id)));
    assert!(reg.thumbnail_dir().join(format!("{}.jpg", device.id)).is_file());

    let fetched = registry.get(&device.id).unwrap();
    assert_eq!(fetched, device);
    assert!(fetched.thumbnail.is_some_and(|t| !t.is_empty()));
}

#[test]
fn test_add_rejects_empty_host() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    assert!(matches!(
        registry.add(DeviceInput::host("   ")),
        Err(KvmmError::Validation(_))
    ));
    assert!(registry.is_empty());
    assert!(reg.thumbnail_files().is_empty());
}

#[test]
fn test_insertion_order_survives_reload() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let hosts = ["c.lan", "a.lan", "b.lan"];
    for host in hosts {
        registry.add(DeviceInput::host(host)).unwrap();
    }

    let reloaded = reg.load();
    let listed: Vec<String> = reloaded.list().into_iter().map(|d| d.host).collect();
    assert_eq!(listed, hosts);
}

#[test]
fn test_password_persisted_but_not_exposed() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let device = registry
        .add(DeviceInput::host("10.0.0.5").with_credentials("admin", "s3cret"))
        .unwrap();

    assert!(reg.contents().contains("s3cret"));
    assert_eq!(reg.load().get(&device.id).unwrap().password.as_deref(), Some("s3cret"));

    let json = serde_json::to_string(&DeviceView::from(&device)).unwrap();
    assert!(json.contains("admin"));
    assert!(!json.contains("s3cret"));
}

#[test]
fn test_update_keeps_id_and_thumbnail() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let device = registry
        .add(
            DeviceInput::host("10.0.0.5")
                .with_alias("Old")
                .with_credentials("admin", "pw"),
        )
        .unwrap();

    let updated = registry
        .update(&device.id, DeviceInput::host("10.0.0.6").with_alias("New"))
        .unwrap();

    assert_eq!(updated.id, device.id);
    assert_eq!(updated.thumbnail, device.thumbnail);
    assert_eq!(updated.host, "10.0.0.6");
    assert_eq!(updated.alias.as_deref(), Some("New"));
    // Omitted optional fields are cleared.
    assert_eq!(updated.username, None);
    assert_eq!(updated.password, None);

    assert_eq!(reg.load().get(&device.id).unwrap(), updated);
}

#[test]
fn test_update_unknown_id() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    assert!(matches!(
        registry.update("nope", DeviceInput::host("h")),
        Err(KvmmError::NotFound { .. })
    ));
}

#[test]
fn test_delete_removes_entry_and_thumbnail() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let keep = registry.add(DeviceInput::host("keep.lan")).unwrap();
    let gone = registry.add(DeviceInput::host("gone.lan")).unwrap();

    registry.delete(&gone.id).unwrap();

    assert!(matches!(registry.get(&gone.id), Err(KvmmError::NotFound { .. })));
    assert!(!reg.thumbnail_dir().join(format!("{}.jpg", gone.id)).exists());
    assert_eq!(reg.thumbnail_files(), vec![format!("{}.jpg", keep.id)]);
    assert_eq!(reg.load().len(), 1);
}

#[test]
fn test_delete_unknown_id() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    assert!(matches!(registry.delete("nope"), Err(KvmmError::NotFound { .. })));
}

// === Thumbnails ===

#[test]
fn test_set_thumbnail_replaces_pattern_file() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let device = registry.add(DeviceInput::host("10.0.0.5")).unwrap();

    let bytes = png_bytes(30, 20);
    registry.set_thumbnail(&device.id, &bytes, "PNG").unwrap();

    let path = registry.thumbnail_path(&device.id).unwrap();
    assert_eq!(path, reg.thumbnail_dir().join(format!("{}.png", device.id)));
    assert_eq!(std::fs::read(&path).unwrap(), bytes);
    assert_eq!(reg.thumbnail_files(), vec![format!("{}.png", device.id)]);
}

#[test]
fn test_set_thumbnail_unsupported_extension_writes_nothing() {
    let reg = TestRegistry::new();
    let (registry, storage) = flaky(&reg);
    let device = registry.add(DeviceInput::host("10.0.0.5")).unwrap();
    let files_before = reg.thumbnail_files();
    let writes_before = storage.writes();

    let err = registry
        .set_thumbnail(&device.id, &png_bytes(4, 4), ".bmp")
        .unwrap_err();

    assert!(matches!(err, KvmmError::UnsupportedExtension { .. }));
    assert_eq!(reg.thumbnail_files(), files_before);
    assert_eq!(storage.writes(), writes_before);
    assert_eq!(registry.get(&device.id).unwrap(), device);
}

#[test]
fn test_set_thumbnail_unknown_device() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    assert!(matches!(
        registry.set_thumbnail("ghost", &png_bytes(4, 4), ".png"),
        Err(KvmmError::NotFound { .. })
    ));
    assert!(reg.thumbnail_files().is_empty());
}

#[test]
fn test_delete_thumbnail_then_path_is_none() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let device = registry.add(DeviceInput::host("10.0.0.5")).unwrap();

    registry.delete_thumbnail(&device.id).unwrap();

    assert_eq!(registry.thumbnail_path(&device.id), None);
    assert!(reg.thumbnail_files().is_empty());
    assert_eq!(registry.thumbnail_path("unknown"), None);
}

#[test]
fn test_delete_thumbnail_tolerates_missing_file() {
    let reg = TestRegistry::new();
    let registry = reg.load();
    let device = registry.add(DeviceInput::host("10.0.0.5")).unwrap();
    std::fs::remove_file(registry.thumbnail_path(&device.id).unwrap()).unwrap();

    registry.delete_thumbnail(&device.id).unwrap();
    assert_eq!(registry.get(&device.id).unwrap().thumbnail, None);
}

// === Persistence failures ===

#[test]
fn test_failed_persist_leaves_state_unchanged() {
    init_test_logging();
    let reg = TestRegistry::new();
    let (registry, storage) = flaky(&reg);
    let device = registry
        .add(DeviceInput::host("10.0.0.5").with_alias("Rack"))
        .unwrap();
    let before = registry.list();
    let file_before = reg.contents();
    let files_before = reg.thumbnail_files();

    storage.set_failing(true);

    assert!(matches!(
        registry.add(DeviceInput::host("10.0.0.6")),
        Err(KvmmError::Persistence(_))
    ));
    assert!(registry
        .update(&device.id, DeviceInput::host("10.0.0.9"))
        .is_err());
    assert!(registry.delete(&device.id).is_err());
    assert!(registry
        .set_thumbnail(&device.id, &png_bytes(8, 8), ".png")
        .is_err());
    assert!(registry.delete_thumbnail(&device.id).is_err());

    assert_eq!(registry.list(), before);
    assert_eq!(reg.contents(), file_before);
    assert_eq!(reg.thumbnail_files(), files_before);
    assert_eq!(storage.rejected(), 5);

    storage.set_failing(false);
    registry.add(DeviceInput::host("10.0.0.6")).unwrap();
    assert_eq!(registry.len(), 2);
}

#[test]
fn test_failed_set_thumbnail_keeps_old_file_contents() {
    let reg = TestRegistry::new();
    let (registry, storage) = flaky(&reg);
    let device = registry.add(DeviceInput::host("10.0.0.5")).unwrap();
    let path = registry.thumbnail_path(&device.id).unwrap();
    let original = std::fs::read(&path).unwrap();

    storage.set_failing(true);
    // Same target name as the current file.
    assert!(registry
        .set_thumbnail(&device.id, &png_bytes(8, 8), ".jpg")
        .is_err());

    assert_eq!(std::fs::read(&path).unwrap(), original);
    assert_eq!(reg.thumbnail_files(), vec![format!("{}.jpg", device.id)]);
}

// === Concurrency ===

#[test]
fn test_concurrent_adds_are_all_persisted() {
    let reg = TestRegistry::new();
    let registry = Arc::new(reg.load());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || registry.add(DeviceInput::host(format!("10.0.1.{i}"))))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    assert_eq!(registry.len(), 8);
    assert_eq!(reg.load().len(), 8);
    assert_eq!(reg.thumbnail_files().len(), 8);
}
