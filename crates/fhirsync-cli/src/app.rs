//! Builds the sync stack from configuration.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use fhirsync_client::{AuthHeader, BaseUrlHolder, ClientOptions, FhirHttpClient};
use fhirsync_config::{AppConfig, DEFAULT_CONFIG_FILE, RemoteConfig};
use fhirsync_db_fs::FsResourceStore;
use fhirsync_storage::{DynFileAccess, DynStore, FsFileAccess};
use fhirsync_sync::{
    DocumentUploadReconciler, HookError, ReconcilerConfig, SyncHook, SyncListenerRegistry,
    SyncWorker, WorkerConfig,
};

use crate::observability;

/// Explicit `--config`, else `./fhirsync.toml`, else the user config dir.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(p) = explicit {
        return Some(p.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|d| d.join("fhirsync").join(DEFAULT_CONFIG_FILE))
        .filter(|p| p.exists())
}

pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    fhirsync_config::load_config(path).context("Failed to load configuration")
}

pub async fn open_store(cfg: &AppConfig) -> Result<Arc<FsResourceStore>> {
    let store = FsResourceStore::open(&cfg.storage.data_dir)
        .await
        .with_context(|| {
            format!(
                "Failed to open resource store at {}",
                cfg.storage.data_dir.display()
            )
        })?;
    Ok(Arc::new(store))
}

pub fn auth_header(remote: &RemoteConfig) -> Option<AuthHeader> {
    if let Some(token) = &remote.bearer_token {
        return Some(AuthHeader::Bearer {
            token: token.clone(),
        });
    }
    remote.username.as_ref().map(|username| AuthHeader::Basic {
        username: username.clone(),
        password: remote.password.clone().unwrap_or_default(),
    })
}

pub struct SyncStack {
    pub worker: SyncWorker,
    pub reconciler: Arc<DocumentUploadReconciler>,
    pub listeners: SyncListenerRegistry,
}

pub async fn build_sync_stack(cfg: &AppConfig, config_path: Option<PathBuf>) -> Result<SyncStack> {
    let store: DynStore = open_store(cfg).await?;
    let files: DynFileAccess = Arc::new(FsFileAccess::new(&cfg.storage.files_dir));

    let base_url = Arc::new(
        BaseUrlHolder::new(&cfg.remote.base_url).context("Invalid remote.base_url")?,
    );
    let client = FhirHttpClient::new(
        Arc::clone(&base_url),
        ClientOptions {
            connect_timeout: cfg.remote.connect_timeout(),
            request_timeout: cfg.remote.request_timeout(),
            auth: auth_header(&cfg.remote),
        },
    )
    .context("Failed to build HTTP client")?;

    let listeners = SyncListenerRegistry::new();
    let reconciler = Arc::new(
        DocumentUploadReconciler::new(
            store,
            Arc::new(client),
            files,
            ReconcilerConfig::from(&cfg.sync),
        )
        .with_listeners(listeners.clone()),
    );

    let hook = ConfigRefreshHook {
        config_path,
        base_url,
    };
    let worker = SyncWorker::new(Arc::clone(&reconciler), WorkerConfig::from(&cfg.sync))
        .with_hook(Arc::new(hook))
        .with_listeners(listeners.clone());

    Ok(SyncStack {
        worker,
        reconciler,
        listeners,
    })
}

/// Re-reads configuration before each pass and applies the parts that can
/// change without a restart: the remote base URL and the log level.
struct ConfigRefreshHook {
    config_path: Option<PathBuf>,
    base_url: Arc<BaseUrlHolder>,
}

#[async_trait]
impl SyncHook for ConfigRefreshHook {
    async fn before_pass(&self) -> Result<(), HookError> {
        let cfg = fhirsync_config::load_config(self.config_path.as_deref())?;
        self.base_url.refresh_base_url(&cfg.remote.base_url)?;
        observability::apply_logging_level(&cfg.logging.level);
        Ok(())
    }
}
