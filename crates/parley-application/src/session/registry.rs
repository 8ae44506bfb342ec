use super::model::ConversationSession;
use parley_core::conversation::CorrespondentId;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Shared handle to one session's state.
pub type SessionHandle = Arc<Mutex<ConversationSession>>;

/// Holds exactly one [`ConversationSession`] per correspondent.
///
/// Sessions are created on first contact and only leave the registry through
/// [`SessionRegistry::remove`] (administrative reset) or process shutdown.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<CorrespondentId, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Gets the session for `sender`, creating it if this is first contact.
    pub async fn get_or_create(&self, sender: &CorrespondentId) -> SessionHandle {
        if let Some(handle) = self.get(sender).await {
            return handle;
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(sender.clone())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationSession::new(sender.clone()))))
            .clone()
    }

    pub async fn get(&self, sender: &CorrespondentId) -> Option<SessionHandle> {
        let sessions = self.sessions.read().await;
        sessions.get(sender).cloned()
    }

    pub async fn remove(&self, sender: &CorrespondentId) -> Option<SessionHandle> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(sender)
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
