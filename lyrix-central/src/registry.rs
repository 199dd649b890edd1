//! Source registration and liveness
//!
//! [`SourceRegistry::register`] is the handshake a source performs on connect.
//! It validates the descriptor and returns a [`SourceHandle`]: the source's
//! [`PlayerSession`] plus a [`LivenessMonitor`] that the transport fires when
//! the connection dies.
//!
//! Losing a source, by explicit unregister or by liveness loss, releases its
//! session and reports it to the dispatcher exactly once.

use crate::dispatcher::ActiveSourceDispatcher;
use crate::identity::{SourceDescriptor, SourceIdentity};
use crate::session::PlayerSession;
use crate::{Error, Result};
use lyrix_common::config::CentralConfig;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock, Weak};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

type LostCallback = Box<dyn FnOnce() + Send>;

/// Fires a one-shot callback when a source's connection is lost
///
/// The callback is installed when the source connects. The first
/// [`notify_lost`](Self::notify_lost) runs it; later calls do nothing.
pub struct LivenessMonitor {
    on_lost: Mutex<Option<LostCallback>>,
}

impl LivenessMonitor {
    pub fn new<F>(on_lost: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            on_lost: Mutex::new(Some(Box::new(on_lost))),
        }
    }

    /// Report that the connection died
    ///
    /// # Returns
    /// `true` if this call ran the callback
    pub fn notify_lost(&self) -> bool {
        let callback = self
            .on_lost
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        match callback {
            Some(callback) => {
                callback();
                true
            }
            None => false,
        }
    }

    /// `false` once the connection has been reported lost
    pub fn is_alive(&self) -> bool {
        self.on_lost
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_some()
    }
}

/// What a source receives from a successful registration
#[derive(Clone)]
pub struct SourceHandle {
    /// Descriptor held by the registry (the first one, for a duplicate)
    pub descriptor: Arc<SourceDescriptor>,
    pub session: Arc<PlayerSession>,
    pub liveness: Arc<LivenessMonitor>,
}

impl SourceHandle {
    /// Simulate the transport dropping the connection
    pub fn disconnect(&self) -> bool {
        self.liveness.notify_lost()
    }
}

struct Entry {
    descriptor: Arc<SourceDescriptor>,
    session: Arc<PlayerSession>,
    liveness: Arc<LivenessMonitor>,
}

struct RegistryInner {
    dispatcher: Arc<ActiveSourceDispatcher>,
    config: CentralConfig,
    runtime: Handle,
    sources: RwLock<HashMap<SourceIdentity, Entry>>,
}

/// Registered sources keyed by identity
///
/// Cheap to clone; clones share the same table.
#[derive(Clone)]
pub struct SourceRegistry {
    inner: Arc<RegistryInner>,
}

impl SourceRegistry {
    pub fn new(dispatcher: Arc<ActiveSourceDispatcher>, config: CentralConfig, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                dispatcher,
                config,
                runtime,
                sources: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn dispatcher(&self) -> &Arc<ActiveSourceDispatcher> {
        &self.inner.dispatcher
    }

    /// Register a source
    ///
    /// The descriptor (metadata and logo included) is kept for as long as
    /// the source stays registered. An identity that is already registered
    /// gets its existing session and descriptor back.
    ///
    /// # Errors
    /// [`Error::Registration`] if either package name is empty or padded
    pub fn register(&self, descriptor: SourceDescriptor) -> Result<SourceHandle> {
        let identity = descriptor.identity.clone();
        if !identity.is_valid() {
            warn!("Rejecting registration with invalid identity {:?}", identity);
            return Err(Error::Registration(format!(
                "invalid source identity '{}'",
                identity
            )));
        }

        let mut sources = self.inner.write_sources();
        if let Some(existing) = sources.get(&identity) {
            debug!("{} already registered, reusing session", identity);
            return Ok(SourceHandle {
                descriptor: Arc::clone(&existing.descriptor),
                session: Arc::clone(&existing.session),
                liveness: Arc::clone(&existing.liveness),
            });
        }

        let session = Arc::new(PlayerSession::new(
            identity.clone(),
            Arc::clone(&self.inner.dispatcher),
            &self.inner.config,
            self.inner.runtime.clone(),
        ));
        let liveness = Arc::new(self.liveness_for(&identity, session.session_id()));
        let descriptor = Arc::new(descriptor);

        sources.insert(
            identity.clone(),
            Entry {
                descriptor: Arc::clone(&descriptor),
                session: Arc::clone(&session),
                liveness: Arc::clone(&liveness),
            },
        );
        info!(
            "Registered {} (session {}, {} sources)",
            identity,
            session.session_id(),
            sources.len()
        );

        Ok(SourceHandle {
            descriptor,
            session,
            liveness,
        })
    }

    /// Remove a source, release its session and invalidate it once
    ///
    /// # Returns
    /// `false` if the identity was not registered
    pub fn unregister(&self, identity: &SourceIdentity) -> bool {
        self.inner.unregister_matching(identity, None)
    }

    pub fn session(&self, identity: &SourceIdentity) -> Option<Arc<PlayerSession>> {
        self.inner
            .read_sources()
            .get(identity)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Descriptor a registered source connected with
    pub fn descriptor(&self, identity: &SourceIdentity) -> Option<Arc<SourceDescriptor>> {
        self.inner
            .read_sources()
            .get(identity)
            .map(|entry| Arc::clone(&entry.descriptor))
    }

    pub fn len(&self) -> usize {
        self.inner.read_sources().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The callback only unregisters the session it was created for, so a
    /// stale monitor cannot remove a newer registration of the same identity.
    fn liveness_for(&self, identity: &SourceIdentity, session_id: Uuid) -> LivenessMonitor {
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let identity = identity.clone();
        LivenessMonitor::new(move || {
            if let Some(inner) = registry.upgrade() {
                warn!("Connection to {} lost", identity);
                inner.unregister_matching(&identity, Some(session_id));
            }
        })
    }
}

impl RegistryInner {
    fn unregister_matching(&self, identity: &SourceIdentity, session_id: Option<Uuid>) -> bool {
        let removed = {
            let mut sources = self.write_sources();
            let matches = sources
                .get(identity)
                .is_some_and(|e| session_id.map_or(true, |id| e.session.session_id() == id));
            if matches {
                sources.remove(identity)
            } else {
                None
            }
        };

        let Some(entry) = removed else {
            debug!("Unregister of unknown source {}", identity);
            return false;
        };

        entry.session.release();
        self.dispatcher.notify_source_invalid(identity);
        info!("Unregistered {}", identity);
        true
    }

    fn read_sources(&self) -> std::sync::RwLockReadGuard<'_, HashMap<SourceIdentity, Entry>> {
        self.sources.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write_sources(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<SourceIdentity, Entry>> {
        self.sources.write().unwrap_or_else(|e| e.into_inner())
    }
}
