//! Integration tests for Blockgraph
//!
//! These tests verify that the cache, the transformers and the façade work
//! together, and drive the CLI binary end to end.

use blockgraph_core::BlockKey;
use blockgraph_core::test_utils::library_course;
use std::process::Command;

const COURSE: &str = "course-v1:org+CL101F+run";

fn course_root() -> BlockKey {
    BlockKey::new("course", "course")
}

fn setup(
    store: std::sync::Arc<dyn blockgraph_core::StructureStore>,
) -> (
    std::sync::Arc<blockgraph_transformers::MemoryUserState>,
    blockgraph_access::BlockAccess,
) {
    use blockgraph_access::{BlockAccess, MemoryCourseSource};
    use blockgraph_transformers::{MemoryUserState, TransformerRegistry, TransformersConfig};
    use std::sync::Arc;

    let source = Arc::new(MemoryCourseSource::new());
    source.publish(COURSE, library_course());
    let user_state = Arc::new(MemoryUserState::new());
    let registry =
        TransformerRegistry::from_config(&TransformersConfig::default(), user_state.clone()).unwrap();
    (user_state, BlockAccess::new(source, store, registry))
}

fn user(id: &str) -> blockgraph_transformers::UserContext {
    blockgraph_transformers::UserContext::new(blockgraph_core::UserId::new(id), COURSE)
}

/// The fixture course with and without content selection
#[test]
fn test_library_course_views() {
    use blockgraph_core::{FileStore, GraphBuilder};
    use blockgraph_transformers::{LIBRARY_CONTENT, SelectionRecord};
    use std::sync::Arc;
    use tempfile::TempDir;

    let temp_dir = TempDir::new().unwrap();
    let (user_state, access) = setup(Arc::new(FileStore::new(temp_dir.path())));

    let everything = access.get_blocks(&user("u1"), &course_root(), &[] as &[&str]).unwrap();
    let direct = GraphBuilder::build(&library_course()).unwrap();
    assert_eq!(everything.node_count(), 9);
    assert_eq!(everything.edge_count(), direct.edge_count());

    let selected = access.get_blocks(&user("u1"), &course_root(), &[LIBRARY_CONTENT]).unwrap();
    assert_eq!(selected.node_count(), 7);
    let html1 = selected.contains(&BlockKey::new("html", "html1"));
    let html2 = selected.contains(&BlockKey::new("html", "html2"));
    assert!(html1 != html2, "exactly one library child must survive");

    user_state.record(
        blockgraph_core::UserId::new("u2"),
        COURSE,
        SelectionRecord::new().with_selection(
            BlockKey::new("library_content", "library_content1"),
            vec![BlockKey::new("vertical", "vertical2")],
        ),
    );
    let recorded = access.get_blocks(&user("u2"), &course_root(), &[LIBRARY_CONTENT]).unwrap();
    let keys: Vec<String> = recorded.block_keys().map(ToString::to_string).collect();
    assert_eq!(
        keys,
        vec![
            "chapter@chapter1",
            "course@course",
            "html@html1",
            "library_content@library_content1",
            "sequential@lesson1",
            "vertical@vertical1",
            "vertical@vertical2",
        ]
    );

    // One build; everything after came from the file cache.
    assert_eq!(access.build_count(), 1);
}

/// Concurrent requests share one build and never see each other's views
#[test]
fn test_concurrent_personalization_is_isolated() {
    use blockgraph_core::MemoryStore;
    use blockgraph_transformers::LIBRARY_CONTENT;
    use std::sync::{Arc, Barrier};

    let (_, access) = setup(Arc::new(MemoryStore::new()));
    let users: Vec<String> = (0..16).map(|i| format!("user{}", i)).collect();
    let barrier = Barrier::new(users.len());

    let concurrent: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = users
            .iter()
            .map(|id| {
                let access = &access;
                let barrier = &barrier;
                scope.spawn(move || {
                    barrier.wait();
                    access.get_blocks(&user(id), &course_root(), &[LIBRARY_CONTENT]).unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(access.build_count(), 1);

    for (id, view) in users.iter().zip(&concurrent) {
        let sequential = access.get_blocks(&user(id), &course_root(), &[LIBRARY_CONTENT]).unwrap();
        assert_eq!(view, &sequential, "view of {} changed between calls", id);
        assert_eq!(view.node_count(), 7);
    }

    let base = access.get_blocks(&user("any"), &course_root(), &[] as &[&str]).unwrap();
    assert_eq!(base.node_count(), 9);
}

/// Republishing and invalidation rebuild exactly once
#[test]
fn test_invalidation_rebuilds_once() {
    use blockgraph_core::MemoryStore;
    use std::sync::Arc;

    let (_, access) = setup(Arc::new(MemoryStore::new()));
    let none: &[&str] = &[];

    access.get_blocks(&user("u1"), &course_root(), none).unwrap();
    access.get_blocks(&user("u1"), &course_root(), none).unwrap();
    assert_eq!(access.build_count(), 1);

    access.invalidate(COURSE).unwrap();
    for _ in 0..3 {
        access.get_blocks(&user("u1"), &course_root(), none).unwrap();
    }
    assert_eq!(access.build_count(), 2);
}

/// A cache store that fails every read still serves requests
#[test]
fn test_unavailable_cache_falls_back() {
    use blockgraph_core::{CacheKey, StoreError, StructureStore};
    use blockgraph_transformers::LIBRARY_CONTENT;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct DownStore {
        reads: AtomicUsize,
    }

    impl StructureStore for DownStore {
        fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Backend("timeout".to_string()))
        }

        fn put(&self, _key: &CacheKey, _value: &[u8]) -> Result<(), StoreError> {
            Err(StoreError::Backend("timeout".to_string()))
        }

        fn delete_course(&self, _course_id: &str) -> Result<usize, StoreError> {
            Err(StoreError::Backend("timeout".to_string()))
        }
    }

    let store = Arc::new(DownStore::default());
    let (_, access) = setup(store.clone());

    let view = access.get_blocks(&user("u1"), &course_root(), &[LIBRARY_CONTENT]).unwrap();
    assert_eq!(view.node_count(), 7);
    assert_eq!(store.reads.load(Ordering::SeqCst), 2, "one read plus one retry");
    assert_eq!(access.build_count(), 1);
}

fn write_fixture(dir: &std::path::Path) -> std::path::PathBuf {
    let path = dir.join("cl101.json");
    std::fs::write(&path, serde_json::to_string_pretty(&library_course()).unwrap()).unwrap();
    path
}

/// Test that the CLI can be invoked
#[test]
fn test_cli_invocation() {
    let output = Command::new(env!("CARGO_BIN_EXE_blockgraph"))
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("blockgraph"));
    assert!(stdout.contains("Cached, per-user personalized course block structures"));
}

/// `build` caches the structure, `blocks` personalizes it, `clear` drops the cache
#[test]
fn test_cli_build_blocks_clear() {
    use tempfile::TempDir;

    let temp_dir = TempDir::new().unwrap();
    let definition = write_fixture(temp_dir.path());
    let run = |args: &[&str]| {
        let output = Command::new(env!("CARGO_BIN_EXE_blockgraph"))
            .arg("--root")
            .arg(temp_dir.path())
            .args(args)
            .output()
            .expect("Failed to execute command");
        assert!(
            output.status.success(),
            "{}",
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice::<serde_json::Value>(&output.stdout).unwrap_or_default()
    };
    let definition = definition.to_str().unwrap();

    let built = run(&["build", definition]);
    assert_eq!(built["course"], "cl101");
    assert_eq!(built["blocks"], 9);
    assert_eq!(built["cached"], false);
    assert!(temp_dir.path().join(".blockgraph").is_dir());

    let rebuilt = run(&["build", definition]);
    assert_eq!(rebuilt["cached"], true);
    assert_eq!(rebuilt["fingerprint"], built["fingerprint"]);

    let state = temp_dir.path().join("state.json");
    std::fs::write(
        &state,
        r#"{"u2": {"library_content@library_content1": {"selected": [["vertical", "vertical3"]]}}}"#,
    )
    .unwrap();
    let views = run(&[
        "blocks",
        definition,
        "--user",
        "u1",
        "--user",
        "u2",
        "--transformer",
        "library_content",
        "--state",
        state.to_str().unwrap(),
    ]);
    let views = views.as_array().unwrap();
    assert_eq!(views.len(), 2);
    for view in views {
        assert_eq!(view["blocks"].as_array().unwrap().len(), 7);
        assert_eq!(view["removed"], 2);
    }
    let u2_keys: Vec<&str> = views[1]["blocks"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["key"].as_str())
        .collect();
    assert!(u2_keys.contains(&"html@html2"));
    assert_eq!(u2_keys[0], "course@course");

    run(&["clear"]);
    assert!(!temp_dir.path().join(".blockgraph").exists());
}
