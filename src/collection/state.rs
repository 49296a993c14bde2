// ============================================================================
// Collection State Holder
// ============================================================================
//
// Lifecycle:
// ```text
// UninitDisconnected ──attach──> UninitConnected ──read/write gate──> Initializing
//                                                                         │
//                     InitializedDirty <──write gate── InitializedClean <─┘
//                            │                              ▲
//                            └────────── post_action ───────┘
// ```
//
// ============================================================================

use crate::config::CollectionSettings;
use crate::core::{CollectionError, CollectionId, Value, collection_info_string};
use crate::session::{SessionFactory, SessionHandle};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

/// Load progress of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitState {
    Uninitialized,
    Initializing,
    Initialized,
}

/// Observable lifecycle state of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionLifecycle {
    /// Not loaded; no usable session
    UninitDisconnected,
    /// Not loaded; tracked by an open, connected session
    UninitConnected,
    /// Rows are being streamed in
    Initializing,
    InitializedClean,
    InitializedDirty,
}

impl fmt::Display for CollectionLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CollectionLifecycle::UninitDisconnected => "UNINITIALIZED_DISCONNECTED",
            CollectionLifecycle::UninitConnected => "UNINITIALIZED_CONNECTED",
            CollectionLifecycle::Initializing => "INITIALIZING",
            CollectionLifecycle::InitializedClean => "INITIALIZED_CLEAN",
            CollectionLifecycle::InitializedDirty => "INITIALIZED_DIRTY",
        };
        write!(f, "{}", name)
    }
}

/// Owning entity, held weakly; the owner's lifetime is governed elsewhere.
pub type OwnerRef = Weak<dyn Any + Send + Sync>;

pub struct CollectionState {
    pub(crate) id: CollectionId,
    pub(crate) role: Option<String>,
    pub(crate) key: Option<Value>,
    // collections detect changes made through their public interface and
    // mark themselves dirty
    pub(crate) dirty: bool,
    pub(crate) element_removed: bool,
    pub(crate) cached_size: Option<usize>,
    pub(crate) init: InitState,
    pub(crate) directly_accessible: bool,
    pub(crate) owner: Option<OwnerRef>,
    pub(crate) session: Option<SessionHandle>,
    pub(crate) is_temp_session: bool,
    /// Recorded on detach when loading outside the session is enabled.
    pub(crate) temporary_session_factory: Option<Arc<dyn SessionFactory>>,
}

impl CollectionState {
    pub(crate) fn new(session: Option<SessionHandle>, init: InitState) -> Self {
        Self {
            id: CollectionId::new(),
            role: None,
            key: None,
            dirty: false,
            element_removed: false,
            cached_size: None,
            init,
            directly_accessible: false,
            owner: None,
            session,
            is_temp_session: false,
            temporary_session_factory: None,
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.init == InitState::Initialized
    }

    pub(crate) fn is_initializing(&self) -> bool {
        self.init == InitState::Initializing
    }

    pub(crate) fn set_initialized(&mut self) {
        self.init = InitState::Initialized;
    }

    /// Attached to an open session whose persistence context tracks this collection.
    pub(crate) fn is_connected_to_session(&self) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_open() && session.contains_collection(self.id))
    }

    /// Neither loaded nor loading, and reachable through a connected session.
    pub(crate) fn is_uninit_connected(&self) -> bool {
        self.init == InitState::Uninitialized
            && self.is_connected_to_session()
            && self
                .session
                .as_ref()
                .is_some_and(|session| session.is_connected())
    }

    pub(crate) fn lifecycle(&self) -> CollectionLifecycle {
        match self.init {
            InitState::Initializing => CollectionLifecycle::Initializing,
            InitState::Initialized if self.dirty => CollectionLifecycle::InitializedDirty,
            InitState::Initialized => CollectionLifecycle::InitializedClean,
            InitState::Uninitialized if self.is_uninit_connected() => {
                CollectionLifecycle::UninitConnected
            }
            InitState::Uninitialized => CollectionLifecycle::UninitDisconnected,
        }
    }

    pub(crate) fn settings(&self) -> CollectionSettings {
        self.session
            .as_ref()
            .map(|session| session.settings().clone())
            .unwrap_or_default()
    }

    pub(crate) fn info(&self) -> String {
        collection_info_string(self.role.as_deref(), self.key.as_ref())
    }

    pub(crate) fn lazy_initialization_error(&self, message: &str) -> CollectionError {
        CollectionError::lazy_initialization(self.role.as_deref(), self.key.as_ref(), message)
    }

    pub(crate) fn reentrant_initialization_error(&self) -> CollectionError {
        CollectionError::ReentrantInitialization(format!(
            "collection {} was accessed while it was being loaded",
            self.info()
        ))
    }

    /// Lazy-initialization error for a collection the session does not track.
    pub(crate) fn not_connected_error(&self) -> CollectionError {
        if !self.is_connected_to_session() {
            return self.lazy_initialization_error("no session or session was closed");
        }
        match &self.session {
            Some(session) if !session.is_connected() => {
                self.lazy_initialization_error("session is disconnected")
            }
            _ => self.lazy_initialization_error("collection not associated with session"),
        }
    }

    pub(crate) fn owner(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        self.owner.as_ref().and_then(Weak::upgrade)
    }
}

impl fmt::Debug for CollectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionState")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("key", &self.key)
            .field("dirty", &self.dirty)
            .field("element_removed", &self.element_removed)
            .field("cached_size", &self.cached_size)
            .field("init", &self.init)
            .field("directly_accessible", &self.directly_accessible)
            .field("session", &self.session.as_ref().map(|session| session.id()))
            .field("is_temp_session", &self.is_temp_session)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detached_state_is_uninit_disconnected() {
        let state = CollectionState::new(None, InitState::Uninitialized);
        assert_eq!(state.lifecycle(), CollectionLifecycle::UninitDisconnected);
        assert!(!state.is_connected_to_session());
        assert!(state.not_connected_error().is_lazy_initialization());
    }

    #[test]
    fn test_initialized_lifecycle_follows_dirty_flag() {
        let mut state = CollectionState::new(None, InitState::Initialized);
        assert_eq!(state.lifecycle(), CollectionLifecycle::InitializedClean);
        state.dirty = true;
        assert_eq!(state.lifecycle(), CollectionLifecycle::InitializedDirty);
        state.init = InitState::Initializing;
        assert_eq!(state.lifecycle(), CollectionLifecycle::Initializing);
    }

    #[test]
    fn test_owner_is_not_kept_alive() {
        let mut state = CollectionState::new(None, InitState::Initialized);
        let owner: Arc<dyn Any + Send + Sync> = Arc::new(42i64);
        state.owner = Some(Arc::downgrade(&owner));
        assert!(state.owner().is_some());
        drop(owner);
        assert!(state.owner().is_none());
    }
}
