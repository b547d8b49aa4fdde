use backup_session::{version, BrowseCache, ClientConfDir, Config, FsManifestSource, SessionContext};
use std::sync::Arc;
use tokio::sync::Semaphore;

pub type ServerContext = SessionContext<ClientConfDir, FsManifestSource>;

pub struct AppState {
    pub config: Config,
    pub context: Arc<ServerContext>,
    pub session_slots: Arc<Semaphore>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let context = SessionContext {
            store: ClientConfDir::from_config(&config),
            source: FsManifestSource,
            cache: Arc::new(BrowseCache::new()),
            storage_dir: config.storage.directory.clone(),
            server_version: version::SERVER_VERSION.to_string(),
        };
        let max_children = config.server.max_children;
        Self {
            config,
            context: Arc::new(context),
            session_slots: Arc::new(Semaphore::new(max_children)),
        }
    }
}
