//! CLI command implementations

use anyhow::Context;
use blockgraph_access::{BlockAccess, BlockGraphConfig, CourseSource, JsonFileSource};
use blockgraph_core::{BlockKey, FileStore, GraphStore, StructureDiff, UserId};
use blockgraph_transformers::{MemoryUserState, SelectionRecord, UserContext};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct BlocksRequest {
    pub definition: PathBuf,
    pub users: Vec<String>,
    pub transformers: Vec<String>,
    pub state: Option<PathBuf>,
    pub from: Option<String>,
    pub course: Option<String>,
    pub staff: bool,
}

pub fn build(root: PathBuf, definition: PathBuf, course: Option<String>) -> anyhow::Result<()> {
    let config = BlockGraphConfig::load(&root)?;
    let course_id = course_id(&definition, course);
    let source = Arc::new(JsonFileSource::new(&course_id, &definition));
    let fingerprint = source.fingerprint(&course_id)?;

    let access = BlockAccess::from_config(&config, &root, source, Arc::new(MemoryUserState::new()))?;
    let structure = access.base_structure(&course_id)?;
    let stats = access.cache_stats();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "course": course_id,
            "fingerprint": fingerprint,
            "root": structure.root().to_string(),
            "blocks": structure.node_count(),
            "edges": structure.edge_count(),
            "cached": stats.hits > 0,
        }))?
    );
    Ok(())
}

pub fn blocks(root: PathBuf, request: BlocksRequest) -> anyhow::Result<()> {
    let config = BlockGraphConfig::load(&root)?;
    let course_id = course_id(&request.definition, request.course);
    let source = Arc::new(JsonFileSource::new(&course_id, &request.definition));

    let user_state = Arc::new(MemoryUserState::new());
    if let Some(path) = &request.state {
        for (user, record) in load_state(path)? {
            user_state.record(UserId::new(user), &course_id, record);
        }
    }

    let access = BlockAccess::from_config(&config, &root, source, user_state)?;
    let base = access.base_structure(&course_id)?;
    let from: BlockKey = match &request.from {
        Some(key) => key.parse()?,
        None => base.root().clone(),
    };
    let scope = base.subgraph(&from)?;

    tracing::info!(
        "Personalizing {} for {} user(s) with [{}]",
        course_id,
        request.users.len(),
        request.transformers.join(", ")
    );

    let views = request
        .users
        .par_iter()
        .map(|user| -> anyhow::Result<_> {
            let mut context = UserContext::new(UserId::new(user), &course_id);
            if request.staff {
                context = context.staff();
            }
            let view = access.get_blocks(&context, &from, request.transformers.as_slice())?;
            Ok((user, view))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let report = views
        .iter()
        .map(|(user, view)| -> anyhow::Result<serde_json::Value> {
            let diff = StructureDiff::between(&scope, view);
            Ok(serde_json::json!({
                "user": user,
                "root": view.root().to_string(),
                "removed": diff.removed_blocks.len(),
                "annotated": diff.annotated_blocks.len(),
                "blocks": render(view)?,
            }))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

pub fn clear(root: PathBuf) -> anyhow::Result<()> {
    let config = BlockGraphConfig::load(&root)?;
    let cache_dir = config.resolved_cache_dir(&root);
    tracing::info!("Clearing cache: {}", cache_dir.display());

    FileStore::new(cache_dir).clear()?;

    tracing::info!("Cache cleared");
    Ok(())
}

fn course_id(definition: &Path, course: Option<String>) -> String {
    course.unwrap_or_else(|| {
        definition
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("course")
            .to_string()
    })
}

/// Recorded selections per user, in the user-state service's export layout.
fn load_state(path: &Path) -> anyhow::Result<BTreeMap<String, SelectionRecord>> {
    let contents =
        std::fs::read_to_string(path).with_context(|| format!("Cannot read {}", path.display()))?;
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&contents)
        .with_context(|| format!("Invalid user state in {}", path.display()))?;

    raw.into_iter()
        .map(|(user, value)| -> anyhow::Result<(String, SelectionRecord)> {
            let record = SelectionRecord::from_json_str(&value.to_string())
                .with_context(|| format!("Invalid selections for {} in {}", user, path.display()))?;
            Ok((user, record))
        })
        .collect()
}

/// Blocks in parents-before-children order.
fn render(structure: &GraphStore) -> anyhow::Result<Vec<serde_json::Value>> {
    structure
        .topological_order()?
        .iter()
        .filter_map(|key| structure.node(key))
        .map(|node| -> anyhow::Result<serde_json::Value> {
            Ok(serde_json::json!({
                "key": node.key.to_string(),
                "children": node.children.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "fields": serde_json::to_value(&node.fields)?,
            }))
        })
        .collect()
}
