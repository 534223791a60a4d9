//! Unit tests for blockgraph-access

use crate::*;
use blockgraph_core::test_utils::{key, library_course, with_block_field};
use blockgraph_core::{
    BlockKey, CacheKey, GraphBuilder, MemoryStore, RawDefinition, StoreError, StructureStore, UserId,
    definition_fingerprint,
};
use blockgraph_transformers::{
    HIDDEN_CONTENT, LIBRARY_CONTENT, NoUserState, RegistryError, TransformersConfig, TransformerRegistry,
    UserContext,
};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

const COURSE: &str = "course-v1:org+CL101F+run";

/// The shared library course with vertical3 hidden from learners.
fn course() -> RawDefinition {
    with_block_field(
        library_course(),
        &key("vertical", "vertical3"),
        "visible_to_staff_only",
        json!(true),
    )
}

fn registry() -> TransformerRegistry {
    TransformerRegistry::from_config(&TransformersConfig::default(), Arc::new(NoUserState)).unwrap()
}

fn access_with(store: Arc<dyn StructureStore>) -> (Arc<MemoryCourseSource>, BlockAccess) {
    let source = Arc::new(MemoryCourseSource::new());
    source.publish(COURSE, course());
    let access = BlockAccess::new(source.clone(), store, registry());
    (source, access)
}

fn learner() -> UserContext {
    UserContext::new(UserId::new("u1"), COURSE)
}

fn root() -> BlockKey {
    key("course", "course")
}

const NONE: &[&str] = &[];

// ── Configuration ───────────────────────────────────────

#[test]
fn test_config_defaults_without_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = BlockGraphConfig::load(dir.path()).unwrap();

    assert_eq!(config, BlockGraphConfig::default());
    assert_eq!(config.resolved_cache_dir(dir.path()), dir.path().join(".blockgraph"));
    assert_eq!(config.transformers.library_content.default_max_count, 1);
}

#[test]
fn test_config_partial_file() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE),
        r#"
cache_dir = "/var/cache/blockgraph"

[transformers]
order = ["library_content"]

[transformers.library_content]
default_max_count = 3
"#,
    )
    .unwrap();

    let config = BlockGraphConfig::load(dir.path()).unwrap();
    assert_eq!(config.transformers.order, vec![LIBRARY_CONTENT.to_string()]);
    assert_eq!(config.transformers.library_content.default_max_count, 3);
    assert_eq!(
        config.transformers.sequence_icons.class_priority,
        vec!["video".to_string(), "problem".to_string()]
    );
    assert_eq!(
        config.resolved_cache_dir(dir.path()),
        Path::new("/var/cache/blockgraph")
    );
}

#[test]
fn test_config_parse_error() {
    assert!(matches!(
        BlockGraphConfig::from_toml_str("cache_dir = ["),
        Err(ConfigError::Parse(_))
    ));
    assert!(matches!(
        BlockGraphConfig::from_file(Path::new("/nonexistent/blockgraph.toml")),
        Err(ConfigError::Io { .. })
    ));
}

// ── Course sources ──────────────────────────────────────

#[test]
fn test_memory_source_versions() {
    let source = MemoryCourseSource::new();
    assert!(matches!(source.fingerprint(COURSE), Err(SourceError::UnknownCourse(_))));

    assert_eq!(source.publish(COURSE, course()), 1);
    assert_eq!(source.fingerprint(COURSE).unwrap(), "v1");
    assert_eq!(source.publish(COURSE, RawDefinition::new("course", "course")), 2);
    assert_eq!(source.fingerprint(COURSE).unwrap(), "v2");
    let snapshot = source.snapshot(COURSE).unwrap();
    assert_eq!(snapshot.fingerprint, "v2");
    assert!(snapshot.definition.children.is_empty());
}

#[test]
fn test_json_file_source_fingerprint_ignores_formatting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("course.json");
    let source = JsonFileSource::new(COURSE, &path);

    std::fs::write(&path, serde_json::to_string(&course()).unwrap()).unwrap();
    let compact = source.fingerprint(COURSE).unwrap();
    std::fs::write(&path, serde_json::to_string_pretty(&course()).unwrap()).unwrap();
    assert_eq!(source.fingerprint(COURSE).unwrap(), compact);

    std::fs::write(&path, r#"{"type": "course", "id": "other"}"#).unwrap();
    assert_ne!(source.fingerprint(COURSE).unwrap(), compact);

    std::fs::write(&path, "{").unwrap();
    assert!(matches!(source.snapshot(COURSE), Err(SourceError::Parse { .. })));
    assert!(matches!(source.snapshot("other"), Err(SourceError::UnknownCourse(_))));
}

#[test]
fn test_json_file_snapshot_matches_its_definition() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("course.json");
    std::fs::write(&path, serde_json::to_string(&course()).unwrap()).unwrap();

    let snapshot = JsonFileSource::new(COURSE, &path).snapshot(COURSE).unwrap();
    assert_eq!(snapshot.fingerprint, definition_fingerprint(&snapshot.definition));
    assert_eq!(*snapshot.definition, course());
}

// ── Façade ──────────────────────────────────────────────

#[test]
fn test_no_transformers_matches_direct_build() {
    let (_, access) = access_with(Arc::new(MemoryStore::new()));
    let direct = GraphBuilder::build(&course()).unwrap();

    let result = access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(result.node_count(), direct.node_count());
    assert_eq!(result.edge_count(), direct.edge_count());
    assert_eq!(result, direct);
}

#[test]
fn test_base_is_built_once() {
    let (_, access) = access_with(Arc::new(MemoryStore::new()));

    for _ in 0..3 {
        access.get_blocks(&learner(), &root(), &[LIBRARY_CONTENT]).unwrap();
    }
    assert_eq!(access.build_count(), 1);
    assert_eq!(access.cache_stats().hits, 2);
}

#[test]
fn test_requested_transformers_run_in_registry_order() {
    let (_, access) = access_with(Arc::new(MemoryStore::new()));

    // Hidden content runs first, so the library always picks vertical2.
    let result = access
        .get_blocks(&learner(), &root(), &[LIBRARY_CONTENT, HIDDEN_CONTENT])
        .unwrap();
    insta::assert_json_snapshot!(result.block_keys().map(ToString::to_string).collect::<Vec<_>>(), @r#"
    [
      "chapter@chapter1",
      "course@course",
      "html@html1",
      "library_content@library_content1",
      "sequential@lesson1",
      "vertical@vertical1",
      "vertical@vertical2"
    ]
    "#);

    let staff = access
        .get_blocks(&learner().staff(), &root(), &[HIDDEN_CONTENT])
        .unwrap();
    assert_eq!(staff.node_count(), 9);
}

#[test]
fn test_course_root_narrows_structure() {
    let (_, access) = access_with(Arc::new(MemoryStore::new()));

    let result = access
        .get_blocks(&learner(), &key("vertical", "vertical1"), NONE)
        .unwrap();
    assert_eq!(result.root(), &key("vertical", "vertical1"));
    assert_eq!(result.node_count(), 6);
    assert!(!result.contains(&root()));

    assert!(matches!(
        access.get_blocks(&learner(), &key("vertical", "missing"), NONE),
        Err(AccessError::UnknownBlock(k)) if k == key("vertical", "missing")
    ));
}

#[test]
fn test_errors() {
    let (_, access) = access_with(Arc::new(MemoryStore::new()));

    assert!(matches!(
        access.get_blocks(&learner(), &root(), &["grades"]),
        Err(AccessError::Registry(RegistryError::Unknown(_)))
    ));

    let stranger = UserContext::new(UserId::new("u1"), "course-v1:none");
    assert!(matches!(
        access.get_blocks(&stranger, &root(), NONE),
        Err(AccessError::Source(SourceError::UnknownCourse(_)))
    ));
}

#[test]
fn test_invalid_definition_is_not_cached() {
    let source = Arc::new(MemoryCourseSource::new());
    source.publish(
        COURSE,
        RawDefinition::new("course", "course").with_reference(&key("html", "nowhere")),
    );
    let access = BlockAccess::new(source, Arc::new(MemoryStore::new()), registry());

    for _ in 0..2 {
        assert!(matches!(
            access.get_blocks(&learner(), &root(), NONE),
            Err(AccessError::Build(_))
        ));
    }
    assert_eq!(access.build_count(), 2);
}

#[test]
fn test_invalidate_triggers_exactly_one_rebuild() {
    let store = Arc::new(MemoryStore::new());
    let (_, access) = access_with(store.clone());

    access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(access.invalidate(COURSE).unwrap(), 1);
    assert!(store.is_empty());

    access.get_blocks(&learner(), &root(), NONE).unwrap();
    access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(access.build_count(), 2);
}

#[test]
fn test_republish_serves_new_content() {
    let (source, access) = access_with(Arc::new(MemoryStore::new()));
    access.get_blocks(&learner(), &root(), NONE).unwrap();

    source.publish(
        COURSE,
        RawDefinition::new("course", "course").with_child(RawDefinition::new("chapter", "chapter9")),
    );
    let result = access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(result.node_count(), 2);
    assert!(result.contains(&key("chapter", "chapter9")));
    assert_eq!(access.build_count(), 2);
}

struct BrokenStore;

impl StructureStore for BrokenStore {
    fn get(&self, _key: &CacheKey) -> Result<Option<Vec<u8>>, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    fn put(&self, _key: &CacheKey, _value: &[u8]) -> Result<(), StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }

    fn delete_course(&self, _course_id: &str) -> Result<usize, StoreError> {
        Err(StoreError::Backend("connection refused".to_string()))
    }
}

#[test]
fn test_unavailable_store_falls_back_to_direct_build() {
    let (_, access) = access_with(Arc::new(BrokenStore));

    let result = access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(result.node_count(), 9);
    access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(access.build_count(), 2);

    assert!(matches!(access.invalidate(COURSE), Err(AccessError::Cache(_))));
}

#[test]
fn test_file_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = BlockGraphConfig::default();
    let source = Arc::new(MemoryCourseSource::new());
    source.publish(COURSE, course());

    let first =
        BlockAccess::from_config(&config, dir.path(), source.clone(), Arc::new(NoUserState)).unwrap();
    let built = first.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(first.build_count(), 1);

    let second =
        BlockAccess::from_config(&config, dir.path(), source, Arc::new(NoUserState)).unwrap();
    let cached = second.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(second.build_count(), 0);
    assert_eq!(cached, built);
    assert!(dir.path().join(".blockgraph").is_dir());
}

fn single_chapter(chapter: &str) -> RawDefinition {
    RawDefinition::new("course", "course").with_child(RawDefinition::new("chapter", chapter))
}

/// Rewrites the course file right after it has been read, as an author
/// publishing mid-request would.
struct PublishAfterRead {
    inner: JsonFileSource,
    next: std::sync::Mutex<Option<RawDefinition>>,
}

impl CourseSource for PublishAfterRead {
    fn snapshot(&self, course_id: &str) -> Result<CourseSnapshot, SourceError> {
        let snapshot = self.inner.snapshot(course_id)?;
        if let Some(next) = self.next.lock().unwrap().take() {
            std::fs::write(self.inner.path(), serde_json::to_string(&next).unwrap()).unwrap();
        }
        Ok(snapshot)
    }
}

#[test]
fn test_publish_during_request_keeps_entry_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("course.json");
    std::fs::write(&path, serde_json::to_string(&single_chapter("A")).unwrap()).unwrap();
    let store: Arc<dyn StructureStore> = Arc::new(MemoryStore::new());

    let source = Arc::new(PublishAfterRead {
        inner: JsonFileSource::new(COURSE, &path),
        next: std::sync::Mutex::new(Some(single_chapter("B"))),
    });
    let access = BlockAccess::new(source, store.clone(), registry());
    let first = access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert!(first.contains(&key("chapter", "A")));

    // The file now holds B, which gets its own entry.
    let second = access.get_blocks(&learner(), &root(), NONE).unwrap();
    assert!(second.contains(&key("chapter", "B")));
    assert_eq!(access.build_count(), 2);

    // Back to A: a fresh façade must serve A from the entry keyed by A.
    std::fs::write(&path, serde_json::to_string(&single_chapter("A")).unwrap()).unwrap();
    let restarted = BlockAccess::new(Arc::new(JsonFileSource::new(COURSE, &path)), store, registry());
    let reverted = restarted.get_blocks(&learner(), &root(), NONE).unwrap();
    assert_eq!(restarted.build_count(), 0);
    assert_eq!(reverted.children(&root()), &[key("chapter", "A")]);
}
