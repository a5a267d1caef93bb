pub mod session;
pub mod state_machine;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::state::session::Session;

pub type SharedState = Arc<AppState>;

/// Handle to one live session. Every mutation takes the write lock, which is
/// what makes advancement's compare-and-swap precondition atomic with its
/// side effects.
pub type SessionHandle = Arc<RwLock<Session>>;

/// Central application state: the concurrent registry of live sessions and
/// the immutable runtime configuration.
pub struct AppState {
    config: AppConfig,
    sessions: DashMap<Uuid, SessionHandle>,
    join_codes: DashMap<String, Uuid>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    pub fn new(config: AppConfig) -> SharedState {
        Arc::new(Self {
            config,
            sessions: DashMap::new(),
            join_codes: DashMap::new(),
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Register a freshly built session and its join code.
    pub fn insert_session(&self, session: Session) -> SessionHandle {
        let id = session.id;
        let code = session.join_code.clone();
        let handle: SessionHandle = Arc::new(RwLock::new(session));
        self.sessions.insert(id, handle.clone());
        self.join_codes.insert(code, id);
        handle
    }

    /// Look up a session by id.
    pub fn session(&self, id: Uuid) -> Option<SessionHandle> {
        self.sessions.get(&id).map(|entry| entry.value().clone())
    }

    /// Look up a session by its join code.
    pub fn session_by_code(&self, code: &str) -> Option<SessionHandle> {
        let id = *self.join_codes.get(code)?.value();
        self.session(id)
    }

    /// Whether a join code is already taken by a live session.
    pub fn join_code_in_use(&self, code: &str) -> bool {
        self.join_codes.contains_key(code)
    }

    /// Number of live sessions in the registry.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
