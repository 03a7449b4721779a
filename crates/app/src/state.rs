//! Application state shared across handlers.

use std::sync::Arc;

use bangun_rumah_core::{ImportItem, ImportSourceError, bundled_source, parse_source};

use crate::backend::{Backend, BackendError, MemoryBackend};
use crate::config::{AppConfig, BackendKind};
use crate::firebase::FirebaseClient;
use crate::services::CatalogService;

/// Path under which the memory backend's uploads are served.
pub const FILES_PATH: &str = "/files";

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
    #[error("import source error: {0}")]
    ImportSource(#[from] ImportSourceError),
    #[error("cannot read import source {path}: {source}")]
    ReadImportSource {
        path: String,
        source: std::io::Error,
    },
    #[error("APP_BACKEND=firebase requires the FIREBASE_* settings")]
    MissingFirebaseConfig,
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    catalog: CatalogService,
    memory: Option<Arc<MemoryBackend>>,
}

impl AppState {
    /// Build the state for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend client cannot be built or the import
    /// source cannot be loaded.
    pub fn new(config: AppConfig) -> Result<Self, StateError> {
        let import_source = load_import_source(&config)?;

        match config.backend {
            BackendKind::Firebase => {
                let firebase = config
                    .firebase
                    .as_ref()
                    .ok_or(StateError::MissingFirebaseConfig)?;
                let client = Arc::new(FirebaseClient::new(firebase)?);
                let catalog = CatalogService::new(Backend::from_shared(client), import_source);
                Ok(Self::assemble(config, catalog, None))
            }
            BackendKind::Memory => {
                let memory = Arc::new(MemoryBackend::new(format!(
                    "{}{FILES_PATH}",
                    config.base_url
                )));
                Ok(Self::with_memory(config, memory, import_source))
            }
        }
    }

    /// Build the state over an existing memory backend.
    #[must_use]
    pub fn with_memory(
        config: AppConfig,
        memory: Arc<MemoryBackend>,
        import_source: Vec<ImportItem>,
    ) -> Self {
        let catalog = CatalogService::new(Backend::from_shared(memory.clone()), import_source);
        Self::assemble(config, catalog, Some(memory))
    }

    fn assemble(
        config: AppConfig,
        catalog: CatalogService,
        memory: Option<Arc<MemoryBackend>>,
    ) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                catalog,
                memory,
            }),
        }
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the catalog action handlers.
    #[must_use]
    pub fn catalog(&self) -> &CatalogService {
        &self.inner.catalog
    }

    /// The memory backend, when it is the active one.
    #[must_use]
    pub fn memory(&self) -> Option<&Arc<MemoryBackend>> {
        self.inner.memory.as_ref()
    }
}

fn load_import_source(config: &AppConfig) -> Result<Vec<ImportItem>, StateError> {
    let Some(path) = &config.import_source_path else {
        return Ok(bundled_source()?);
    };
    let json = std::fs::read_to_string(path).map_err(|source| StateError::ReadImportSource {
        path: path.display().to_string(),
        source,
    })?;
    let items = parse_source(&json)?;
    tracing::info!(path = %path.display(), count = items.len(), "Loaded import source");
    Ok(items)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_state_uses_bundled_source() {
        let config = AppConfig::memory("http://localhost:3000");
        assert!(!load_import_source(&config).unwrap().is_empty());

        let state = AppState::new(config).unwrap();
        assert!(state.memory().is_some());
    }

    #[test]
    fn test_firebase_without_settings_is_rejected() {
        let mut config = AppConfig::memory("http://localhost:3000");
        config.backend = BackendKind::Firebase;
        assert!(matches!(
            AppState::new(config),
            Err(StateError::MissingFirebaseConfig)
        ));
    }

    #[test]
    fn test_missing_import_file_is_reported() {
        let mut config = AppConfig::memory("http://localhost:3000");
        config.import_source_path = Some("/nonexistent/import.json".into());
        assert!(matches!(
            AppState::new(config),
            Err(StateError::ReadImportSource { .. })
        ));
    }
}
