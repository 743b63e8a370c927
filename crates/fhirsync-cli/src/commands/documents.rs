use std::path::Path;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use fhirsync_config::AppConfig;
use fhirsync_core::document::{resource_id, resource_type};
use fhirsync_core::{FileLocator, ResourceType, generate_id, set_pending_file, validate_id};
use fhirsync_storage::{LocalResourceStore, StoredResource};
use serde_json::Value;

use crate::app;
use crate::cli::{AttachArgs, OutputFormat};
use crate::output;

pub async fn pending(cfg: &AppConfig, format: OutputFormat) -> Result<()> {
    let stack = app::build_sync_stack(cfg, None).await?;
    let pending = stack
        .reconciler
        .pending_uploads()
        .await
        .context("Failed to list pending uploads")?;

    match format {
        OutputFormat::Json => output::print_json(&pending)?,
        OutputFormat::Table => output::print_pending_table(&pending),
    }
    Ok(())
}

pub async fn attach(cfg: &AppConfig, args: &AttachArgs) -> Result<()> {
    let mut doc = read_json(&args.document)?;
    let parsed = resource_type(&doc).map(str::parse::<ResourceType>);
    if !matches!(parsed, Some(Ok(ResourceType::DocumentReference))) {
        bail!("{} is not a DocumentReference", args.document.display());
    }

    let id = match resource_id(&doc) {
        Some(id) => {
            validate_id(id).with_context(|| format!("Invalid DocumentReference id {id:?}"))?;
            id.to_string()
        }
        None => {
            let id = generate_id();
            doc["id"] = Value::String(id.clone());
            id
        }
    };

    let file_name = args
        .file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("{} has no usable file name", args.file.display()))?;
    let cached_name = format!("{id}-{file_name}");

    tokio::fs::create_dir_all(&cfg.storage.files_dir)
        .await
        .with_context(|| format!("Failed to create {}", cfg.storage.files_dir.display()))?;
    tokio::fs::copy(&args.file, cfg.storage.files_dir.join(&cached_name))
        .await
        .with_context(|| format!("Failed to copy {}", args.file.display()))?;

    set_pending_file(&mut doc, &cfg.sync.pending_file_extension_url, &FileLocator::new(&cached_name))?;
    if let Some(content_type) = &args.content_type {
        set_content_type(&mut doc, content_type);
    }

    let store = app::open_store(cfg).await?;
    let cached_path = cfg.storage.files_dir.join(&cached_name);
    let stored = match upsert(store.as_ref(), &doc).await {
        Ok(stored) => stored,
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&cached_path).await {
                tracing::warn!(
                    path = %cached_path.display(),
                    error = %cleanup,
                    "Failed to remove copied file after store error"
                );
            }
            return Err(e);
        }
    };

    output::print_success(&format!(
        "DocumentReference/{} queued for upload with {}",
        stored.id,
        cached_name.cyan()
    ));
    Ok(())
}

pub async fn import(cfg: &AppConfig, path: &Path) -> Result<()> {
    let value = read_json(path)?;
    let is_bundle = matches!(
        resource_type(&value).map(str::parse::<ResourceType>),
        Some(Ok(ResourceType::Bundle))
    );
    let resources: Vec<Value> = if is_bundle {
        value
            .get("entry")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|e| e.get("resource").cloned())
                    .collect()
            })
            .unwrap_or_default()
    } else {
        vec![value]
    };

    let store = app::open_store(cfg).await?;
    for resource in &resources {
        upsert(store.as_ref(), resource).await?;
    }

    output::print_success(&format!("Imported {} resource(s)", resources.len()));
    Ok(())
}

/// Creates the resource, or replaces it if it already exists locally.
async fn upsert(store: &dyn LocalResourceStore, resource: &Value) -> Result<StoredResource> {
    match store.create(resource).await {
        Ok(stored) => Ok(stored),
        Err(e) if e.is_already_exists() => Ok(store.update(resource).await?),
        Err(e) => Err(e.into()),
    }
}

fn read_json(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {}", path.display()))
}

/// Sets `content[0].attachment.contentType`, creating the path if needed.
fn set_content_type(doc: &mut Value, content_type: &str) {
    let Some(obj) = doc.as_object_mut() else {
        return;
    };
    let content = obj
        .entry("content")
        .or_insert_with(|| Value::Array(Vec::new()));
    let Some(items) = content.as_array_mut() else {
        return;
    };
    if items.is_empty() {
        items.push(serde_json::json!({"attachment": {}}));
    }
    if let Some(first) = items[0].as_object_mut() {
        let attachment = first
            .entry("attachment")
            .or_insert_with(|| Value::Object(Default::default()));
        if let Some(attachment) = attachment.as_object_mut() {
            attachment.insert(
                "contentType".to_string(),
                Value::String(content_type.to_string()),
            );
        }
    }
}
