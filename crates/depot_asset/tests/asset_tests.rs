//! Integration tests for depot_asset

use depot_asset::payloads::{Material, Model, TextureSrc};
use depot_asset::*;
use serde_json::json;
use std::any::Any;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

fn manager_at(root: &Path) -> AssetManager {
    let config = AssetManagerConfig {
        worker_threads: Some(4),
        ..AssetManagerConfig::with_root(root)
    };
    AssetManager::new(config).unwrap()
}

fn write_json(root: &Path, relative: &str, value: serde_json::Value) {
    let path = root.join(relative);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_string_pretty(&value).unwrap()).unwrap();
}

fn load(manager: &AssetManager, handle: AssetHandle) -> AssetResult<()> {
    wait_result(manager.load_asset(handle)?)
}

fn save(manager: &AssetManager, handle: AssetHandle) -> AssetResult<()> {
    wait_result(manager.save_asset(handle)?)
}

#[test]
fn test_create_load_unload_cube() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());

    let cube = manager.create_asset("cube", "/models/cube.json", "Model").unwrap();
    let asset = manager.get_asset(cube).unwrap();
    assert_eq!(asset.state(), AssetState::Unloaded);
    assert_eq!(asset.path_on_disk(), "/models/cube.json");

    load(&manager, cube).unwrap();
    assert_eq!(asset.state(), AssetState::Loaded);
    assert!(asset.with_payload(|model: &Model| model.materials.len()).is_some());

    wait_result(manager.unload_asset(cube).unwrap()).unwrap();
    assert_eq!(asset.state(), AssetState::Unloaded);
    assert!(asset.with_payload(|_: &Model| ()).is_none());
    assert_eq!(asset.metadata().asset_id, cube);
    assert!(asset.metadata().is_valid());

    // Nothing written without a save
    assert!(!dir.path().join("models").exists());

    let events = manager.drain_events();
    assert_eq!(
        events,
        vec![
            AssetEvent::Created(cube),
            AssetEvent::Loaded(cube),
            AssetEvent::Unloaded(cube)
        ]
    );
}

#[test]
fn test_unknown_handle_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());
    let missing = AssetHandle::new(404);

    assert!(matches!(manager.load_asset(missing), Err(AssetError::NotFound(h)) if h == missing));
    assert!(matches!(manager.save_asset(missing), Err(AssetError::NotFound(_))));
    assert!(matches!(manager.delete_asset(missing), Err(AssetError::NotFound(_))));
    assert!(manager.get_asset(missing).is_none());
}

#[test]
fn test_create_rejects_invalid_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());

    assert!(matches!(
        manager.create_asset("nameless", "", "Model"),
        Err(AssetError::InvalidMetadata { .. })
    ));
    assert!(manager.is_empty());
}

#[derive(Default)]
struct Probe {
    id: AssetHandle,
}

impl SerializableObject for Probe {
    fn class_name(&self) -> &str {
        "Probe"
    }

    fn serialization_id(&self) -> AssetHandle {
        self.id
    }

    fn set_serialization_id(&mut self, id: AssetHandle) {
        self.id = id;
    }

    fn serialize(&self, _ctx: &mut SaveContext<'_>) -> AssetResult<()> {
        Ok(())
    }

    fn deserialize(&mut self, _ctx: &mut LoadContext<'_>) -> AssetResult<()> {
        // Widen the window for a racing second load
        thread::sleep(Duration::from_millis(30));
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn test_concurrent_loads_of_one_handle_construct_once() {
    let dir = tempfile::tempdir().unwrap();
    let constructed = Arc::new(AtomicUsize::new(0));

    let mut factory = ObjectFactory::new();
    let counter = Arc::clone(&constructed);
    factory.register_constructor("Probe", move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Box::new(Probe::default())
    });

    let config = AssetManagerConfig {
        worker_threads: Some(4),
        ..AssetManagerConfig::with_root(dir.path())
    };
    let manager = AssetManager::with_factory(config, factory).unwrap();
    let probe = manager.create_asset("probe", "/probe.json", "Probe").unwrap();

    let tasks: Vec<_> = (0..4).map(|_| manager.load_asset(probe).unwrap()).collect();
    for task in tasks {
        wait_result(task).unwrap();
    }

    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert!(manager.get_asset(probe).unwrap().is_loaded());
}

#[test]
fn test_concurrent_loads_of_different_handles() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());

    let handles: Vec<_> = (0..32)
        .map(|i| {
            manager
                .create_asset(format!("tex{}", i), format!("/textures/tex{}.json", i), "TextureSrc")
                .unwrap()
        })
        .collect();

    let results = manager.load_all();
    assert_eq!(results.len(), 32);
    for (_, task) in results {
        wait_result(task).unwrap();
    }

    for handle in handles {
        assert!(manager.get_asset(handle).unwrap().is_loaded());
    }
}

fn write_sample_project(root: &Path) {
    write_json(
        root,
        "textures/bricks.json",
        json!({
            "ObjectID": 10,
            "DiscPath": "/textures/bricks.json",
            "ClassName": "TextureSrc",
            "AssetName": "bricks",
            "SourceImage": "images/bricks.png",
            "Width": 512,
            "Height": 512
        }),
    );
    write_json(
        root,
        "materials/wall.json",
        json!({
            "ObjectID": 11,
            "ClassName": "Material",
            "AssetName": "wall",
            "Dependencies": [10],
            "AlbedoTexture": 10,
            "Roughness": 0.9
        }),
    );
    write_json(
        root,
        "models/deep/room.json",
        json!({
            "ObjectID": 12,
            "DiscPath": "/models/deep/room.json",
            "ClassName": "Model",
            "AssetName": "room",
            "Dependencies": [11],
            "MeshSource": "meshes/room.obj",
            "Materials": [11]
        }),
    );

    // Skipped: no ObjectID, duplicate id, wrong extension, unparseable
    write_json(root, "broken/no_id.json", json!({ "ClassName": "Model" }));
    write_json(
        root,
        "broken/dupe.json",
        json!({ "ObjectID": 10, "ClassName": "Model", "DiscPath": "/broken/dupe.json" }),
    );
    write_json(root, "notes/readme.txt", json!({ "ObjectID": 99 }));
    fs::write(root.join("broken/garbage.json"), "{ not json").unwrap();
}

#[test]
fn test_load_project_registers_headers_only() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_project(dir.path());
    let manager = manager_at(dir.path());

    // Duplicate id 10 may be seen first from either file
    assert_eq!(manager.scan_project().unwrap(), 3);
    assert_eq!(manager.len(), 3);
    assert_eq!(
        manager.handles(),
        vec![AssetHandle::new(10), AssetHandle::new(11), AssetHandle::new(12)]
    );

    for handle in manager.handles() {
        assert_eq!(manager.get_asset(handle).unwrap().state(), AssetState::Unloaded);
    }

    // DiscPath defaulted from the file location
    let wall = manager.find_by_path("/materials/wall.json").unwrap();
    assert_eq!(wall.handle(), AssetHandle::new(11));
    assert_eq!(wall.dependencies().into_iter().collect::<Vec<_>>(), vec![AssetHandle::new(10)]);

    let discovered = manager
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, AssetEvent::Discovered(_)))
        .count();
    assert_eq!(discovered, 3);
}

#[test]
fn test_load_resolves_dependency_chain() {
    let dir = tempfile::tempdir().unwrap();
    write_sample_project(dir.path());
    fs::remove_file(dir.path().join("broken/dupe.json")).unwrap();
    let manager = manager_at(dir.path());
    manager.scan_project().unwrap();

    let room = AssetHandle::new(12);
    let wall = AssetHandle::new(11);
    let bricks = AssetHandle::new(10);
    load(&manager, room).unwrap();

    for handle in [room, wall, bricks] {
        assert!(manager.get_asset(handle).unwrap().is_loaded());
    }

    let room_asset = manager.get_asset(room).unwrap();
    let wall_asset = manager.get_asset(wall).unwrap();
    let bricks_asset = manager.get_asset(bricks).unwrap();
    assert!(room_asset.children().contains(&wall));
    assert!(wall_asset.parents().contains(&room));
    assert!(wall_asset.children().contains(&bricks));
    assert!(bricks_asset.parents().contains(&wall));

    let roughness = wall_asset.with_payload(|m: &Material| m.roughness).unwrap();
    assert!((roughness - 0.9).abs() < f32::EPSILON);
    let width = bricks_asset.with_payload(|t: &TextureSrc| t.width).unwrap();
    assert_eq!(width, 512);

    // Unload leaves edges and metadata alone
    wait_result(manager.unload_asset(wall).unwrap()).unwrap();
    assert!(wall_asset.parents().contains(&room));
    assert_eq!(wall_asset.metadata().asset_name, "wall");
}

#[test]
fn test_save_then_reload_in_fresh_manager() {
    let dir = tempfile::tempdir().unwrap();
    let texture;
    let material;
    {
        let manager = manager_at(dir.path());
        texture = manager.create_asset("rust", "/textures/rust.json", "TextureSrc").unwrap();
        material = manager.create_asset("rusty_metal", "/materials/rusty_metal.json", "Material").unwrap();

        load(&manager, texture).unwrap();
        load(&manager, material).unwrap();

        manager
            .get_asset(texture)
            .unwrap()
            .with_payload_mut(|t: &mut TextureSrc| {
                t.source_image = "images/rust.png".to_string();
                t.width = 256;
                t.height = 128;
            })
            .unwrap();
        manager
            .get_asset(material)
            .unwrap()
            .with_payload_mut(|m: &mut Material| {
                m.metallic = 1.0;
                m.roughness = 0.7;
                m.albedo_texture = Some(texture);
            })
            .unwrap();

        save(&manager, texture).unwrap();
        save(&manager, material).unwrap();
        assert!(dir.path().join("materials/rusty_metal.json").exists());

        let deps = manager.get_asset(material).unwrap().dependencies();
        assert_eq!(deps.into_iter().collect::<Vec<_>>(), vec![texture]);
    }

    let manager = manager_at(dir.path());
    assert_eq!(manager.scan_project().unwrap(), 2);
    load(&manager, material).unwrap();

    let reloaded = manager.get_asset(material).unwrap();
    assert_eq!(reloaded.name(), "rusty_metal");
    let (metallic, albedo) = reloaded
        .with_payload(|m: &Material| (m.metallic, m.albedo_texture))
        .unwrap();
    assert_eq!(metallic, 1.0);
    assert_eq!(albedo, Some(texture));

    let source = manager
        .get_asset(texture)
        .unwrap()
        .with_payload(|t: &TextureSrc| (t.source_image.clone(), t.width, t.height))
        .unwrap();
    assert_eq!(source, ("images/rust.png".to_string(), 256, 128));

    // New handles never collide with scanned ones
    let fresh = manager.create_asset("new", "/new.json", "Model").unwrap();
    assert!(fresh > texture && fresh > material);
}

#[test]
fn test_save_rejects_dependency_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());
    let a = manager.create_asset("a", "/models/a.json", "Model").unwrap();
    let b = manager.create_asset("b", "/models/b.json", "Model").unwrap();
    load(&manager, a).unwrap();
    load(&manager, b).unwrap();

    let set_materials = |handle: AssetHandle, materials: Vec<AssetHandle>| {
        manager
            .get_asset(handle)
            .unwrap()
            .with_payload_mut(|m: &mut Model| m.materials = materials)
            .unwrap();
    };

    set_materials(a, vec![b]);
    save(&manager, a).unwrap();

    set_materials(b, vec![a]);
    assert!(matches!(save(&manager, b), Err(AssetError::DependencyCycle(h)) if h == b));
    assert!(!dir.path().join("models/b.json").exists());
    assert!(manager.get_asset(b).unwrap().dependencies().is_empty());

    set_materials(b, vec![b]);
    assert!(matches!(save(&manager, b), Err(AssetError::DependencyCycle(_))));

    let failures = manager.drain_events().into_iter().filter(AssetEvent::is_failure).count();
    assert_eq!(failures, 2);
}

#[test]
fn test_load_detects_cycle_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        dir.path(),
        "a.json",
        json!({ "ObjectID": 1, "ClassName": "Model", "Materials": [2] }),
    );
    write_json(
        dir.path(),
        "b.json",
        json!({ "ObjectID": 2, "ClassName": "Model", "Materials": [1] }),
    );
    let manager = manager_at(dir.path());
    manager.scan_project().unwrap();

    let result = load(&manager, AssetHandle::new(1));
    assert!(matches!(result, Err(AssetError::DependencyCycle(h)) if h == AssetHandle::new(1)));
    assert!(!manager.get_asset(AssetHandle::new(1)).unwrap().is_loaded());
    assert!(!manager.get_asset(AssetHandle::new(2)).unwrap().is_loaded());
}

#[test]
fn test_concurrent_opposite_saves_never_close_cycle() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());
    let a = manager.create_asset("a", "/models/a.json", "Model").unwrap();
    let b = manager.create_asset("b", "/models/b.json", "Model").unwrap();
    load(&manager, a).unwrap();
    load(&manager, b).unwrap();

    let set_materials = |handle: AssetHandle, materials: Vec<AssetHandle>| {
        manager
            .get_asset(handle)
            .unwrap()
            .with_payload_mut(|m: &mut Model| m.materials = materials)
            .unwrap();
    };

    for _ in 0..25 {
        set_materials(a, vec![b]);
        set_materials(b, vec![a]);
        let save_a = manager.save_asset(a).unwrap();
        let save_b = manager.save_asset(b).unwrap();
        let results = [wait_result(save_a), wait_result(save_b)];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .any(|r| matches!(r, Err(AssetError::DependencyCycle(_)))));
        let a_deps = manager.get_asset(a).unwrap().dependencies();
        let b_deps = manager.get_asset(b).unwrap().dependencies();
        assert!(!(a_deps.contains(&b) && b_deps.contains(&a)));

        set_materials(a, Vec::new());
        set_materials(b, Vec::new());
        save(&manager, a).unwrap();
        save(&manager, b).unwrap();
    }
}

#[test]
fn test_load_project_outside_root_uses_scanned_file() {
    let root = tempfile::tempdir().unwrap();
    let other = tempfile::tempdir().unwrap();
    write_json(
        other.path(),
        "textures/tex.json",
        json!({ "ObjectID": 7, "ClassName": "TextureSrc", "Width": 64 }),
    );

    let manager = manager_at(root.path());
    assert_eq!(manager.load_project(other.path()).unwrap(), 1);

    let handle = AssetHandle::new(7);
    let asset = manager.get_asset(handle).unwrap();
    assert_eq!(asset.path_on_disk(), "/textures/tex.json");
    assert_eq!(asset.source_file(), Some(other.path().join("textures/tex.json").as_path()));

    load(&manager, handle).unwrap();
    assert_eq!(asset.with_payload(|t: &TextureSrc| t.width), Some(64));

    // Saves go back to the scanned file, not below the project root
    asset.with_payload_mut(|t: &mut TextureSrc| t.width = 128).unwrap();
    save(&manager, handle).unwrap();
    assert!(!root.path().join("textures/tex.json").exists());
    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(other.path().join("textures/tex.json")).unwrap()).unwrap();
    assert_eq!(written["Width"], json!(128));
}

#[test]
fn test_create_never_reuses_referenced_handle() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        dir.path(),
        "mat.json",
        json!({ "ObjectID": 1, "ClassName": "Material", "Dependencies": [2], "AlbedoTexture": 2 }),
    );
    let manager = manager_at(dir.path());
    assert_eq!(manager.scan_project().unwrap(), 1);

    let fresh = manager.create_asset("unrelated", "/scene.json", "Scene").unwrap();
    assert!(fresh > AssetHandle::new(2));

    // The dangling reference still fails instead of resolving to the new asset
    assert!(matches!(
        load(&manager, AssetHandle::new(1)),
        Err(AssetError::NotFound(h)) if h == AssetHandle::new(2)
    ));
}

#[test]
fn test_out_of_range_material_is_not_saved() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());
    let material = manager.create_asset("chrome", "/materials/chrome.json", "Material").unwrap();
    load(&manager, material).unwrap();

    manager
        .get_asset(material)
        .unwrap()
        .with_payload_mut(|m: &mut Material| {
            m.metallic = 1.5;
            m.roughness = 1.5;
        })
        .unwrap();

    assert!(matches!(save(&manager, material), Err(AssetError::InvalidField { .. })));
    assert!(!dir.path().join("materials/chrome.json").exists());
}

fn linked_pair(manager: &AssetManager) -> (AssetHandle, AssetHandle) {
    let texture = manager.create_asset("t", "/t.json", "TextureSrc").unwrap();
    let material = manager.create_asset("m", "/m.json", "Material").unwrap();
    load(manager, texture).unwrap();
    load(manager, material).unwrap();
    manager
        .get_asset(material)
        .unwrap()
        .with_payload_mut(|m: &mut Material| m.normal_texture = Some(texture))
        .unwrap();
    save(manager, texture).unwrap();
    save(manager, material).unwrap();

    // Reload so the edge is established
    wait_result(manager.unload_asset(material).unwrap()).unwrap();
    load(manager, material).unwrap();
    (texture, material)
}

#[test]
fn test_delete_reject_policy() {
    let dir = tempfile::tempdir().unwrap();
    let config = AssetManagerConfig {
        worker_threads: Some(2),
        delete_policy: DeletePolicy::Reject,
        ..AssetManagerConfig::with_root(dir.path())
    };
    let manager = AssetManager::new(config).unwrap();
    let (texture, material) = linked_pair(&manager);

    let result = wait_result(manager.delete_asset(texture).unwrap());
    match result {
        Err(AssetError::HasDependents { handle, dependents }) => {
            assert_eq!(handle, texture);
            assert_eq!(dependents, vec![material]);
        }
        other => panic!("expected HasDependents, got {:?}", other),
    }
    assert!(manager.get_asset(texture).unwrap().is_loaded());

    // Nothing depends on the material
    wait_result(manager.delete_asset(material).unwrap()).unwrap();
    assert!(manager.get_asset(material).is_none());
    assert!(manager.get_asset(texture).unwrap().parents().is_empty());
}

#[test]
fn test_delete_orphan_policy() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager_at(dir.path());
    let (texture, material) = linked_pair(&manager);
    let texture_asset = manager.get_asset(texture).unwrap();

    wait_result(manager.delete_asset(texture).unwrap()).unwrap();

    assert!(manager.get_asset(texture).is_none());
    assert!(!texture_asset.is_loaded());
    assert!(dir.path().join("t.json").exists(), "delete never removes files");

    let material_asset = manager.get_asset(material).unwrap();
    assert!(material_asset.children().is_empty());
    assert!(material_asset.depends_on(texture), "dependency list keeps the dangling handle");
    assert!(manager.drain_events().contains(&AssetEvent::Deleted(texture)));
}

#[test]
fn test_shutdown_abandons_pending_operations() {
    let dir = tempfile::tempdir().unwrap();
    let mut manager = manager_at(dir.path());
    let handle = manager.create_asset("late", "/late.json", "Model").unwrap();

    manager.shutdown();
    let result = wait_result(manager.load_asset(handle).unwrap());
    assert!(matches!(result, Err(AssetError::Task(_))));
    assert!(!manager.get_asset(handle).unwrap().is_loaded());
}
