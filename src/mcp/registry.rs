//! Keyed store of live interactive sessions.
//!
//! Sessions are keyed by host. At most one session exists per host; a
//! second request for the same host gets the same session back.
//!
//! # Concurrency
//!
//! The map itself is a `DashMap`. The check-then-act sequences
//! (`get_or_create`, `get_existing`, `close`) for one host run under a
//! per-host async lock, so two concurrent requests never open two
//! connections to the same host. DashMap guards are never held across an
//! `.await`. Work on a session (commands, reads) is serialized by the
//! session's own mutex.
//!
//! # Stale sessions
//!
//! A session whose shell was closed by the remote side is `Disconnected`.
//! Retrieving it reconnects it in place; if that fails the entry is removed
//! and the error returned.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{Mutex, watch};
use tracing::{info, warn};

use crate::mcp::credentials::{CredentialResolver, CredentialSet};
use crate::mcp::error::SessionError;
use crate::mcp::shell::{InteractiveSession, ShellSettings};
use crate::mcp::transport::{ConnectionTarget, Connector};
use crate::mcp::types::{Acquisition, SessionSnapshot, SessionStatus};

pub type SharedSession = Arc<Mutex<InteractiveSession>>;

struct RegistryEntry {
    session: SharedSession,
    created_at: DateTime<Utc>,
    username: String,
    port: u16,
    status: watch::Receiver<SessionStatus>,
}

/// A session handed out by [`SessionRegistry::get_or_create`].
pub struct AcquiredSession {
    pub session: SharedSession,
    pub acquisition: Acquisition,
}

pub struct SessionRegistry {
    connector: Arc<dyn Connector>,
    resolver: Arc<CredentialResolver>,
    settings: ShellSettings,
    sessions: DashMap<String, RegistryEntry>,
    host_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SessionRegistry {
    pub fn new(
        connector: Arc<dyn Connector>,
        resolver: Arc<CredentialResolver>,
        settings: ShellSettings,
    ) -> Self {
        Self {
            connector,
            resolver,
            settings,
            sessions: DashMap::new(),
            host_locks: DashMap::new(),
        }
    }

    fn host_lock(&self, host: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.host_locks.entry(host.to_string()).or_default())
    }

    /// Forget the lock for `host` unless another caller holds or waits on it.
    fn release_host_lock(&self, host: &str, lock: &Arc<Mutex<()>>) {
        // The map and `lock` account for two references
        self.host_locks.remove_if(host, |_, held| {
            Arc::ptr_eq(held, lock) && Arc::strong_count(held) == 2
        });
    }

    fn lookup(&self, host: &str) -> Option<SharedSession> {
        self.sessions
            .get(host)
            .map(|entry| Arc::clone(&entry.session))
    }

    /// Return the live session for the resolved host, creating or reconnecting it as needed.
    ///
    /// Explicit credentials only matter when a connection is actually made:
    /// a connected session is reused as is.
    pub async fn get_or_create(
        &self,
        explicit: &CredentialSet,
    ) -> Result<AcquiredSession, SessionError> {
        let target = self.resolver.resolve(explicit)?;
        let host = target.host.clone();

        let lock = self.host_lock(&host);
        let _guard = lock.lock().await;

        if let Some(session) = self.lookup(&host) {
            let retarget = explicit.has_credentials().then_some(target);
            return match self.revive(&host, &session, retarget).await {
                Ok(acquisition) => Ok(AcquiredSession {
                    session,
                    acquisition,
                }),
                Err(e) => {
                    self.release_host_lock(&host, &lock);
                    Err(e)
                }
            };
        }

        let mut session = InteractiveSession::new(
            target.clone(),
            Arc::clone(&self.connector),
            self.settings.clone(),
        );
        if let Err(e) = session.connect().await {
            self.release_host_lock(&host, &lock);
            return Err(e);
        }

        let status = session.subscribe();
        let session = Arc::new(Mutex::new(session));
        self.sessions.insert(
            host.clone(),
            RegistryEntry {
                session: Arc::clone(&session),
                created_at: Utc::now(),
                username: target.username,
                port: target.port,
                status,
            },
        );
        info!("Registered interactive session for {}", host);

        Ok(AcquiredSession {
            session,
            acquisition: Acquisition::Created,
        })
    }

    /// Return the session for `host`, reconnecting it if stale. Never creates one.
    pub async fn get_existing(&self, host: &str) -> Result<SharedSession, SessionError> {
        let lock = self.host_lock(host);
        let _guard = lock.lock().await;

        let Some(session) = self.lookup(host) else {
            self.release_host_lock(host, &lock);
            return Err(SessionError::NoActiveSession {
                host: host.to_string(),
            });
        };
        if let Err(e) = self.revive(host, &session, None).await {
            self.release_host_lock(host, &lock);
            return Err(e);
        }

        Ok(session)
    }

    /// Reconnect `session` if it is no longer connected. Caller holds the host lock.
    async fn revive(
        &self,
        host: &str,
        session: &SharedSession,
        retarget: Option<ConnectionTarget>,
    ) -> Result<Acquisition, SessionError> {
        let mut guard = session.lock().await;
        if guard.is_connected() {
            return Ok(Acquisition::Reused);
        }

        if let Some(target) = retarget {
            guard.retarget(target);
        }
        info!("Session for {} is {}, reconnecting", host, guard.state());

        match guard.connect().await {
            Ok(()) => {
                let target = guard.target();
                if let Some(mut entry) = self.sessions.get_mut(host) {
                    entry.created_at = Utc::now();
                    entry.username = target.username.clone();
                    entry.port = target.port;
                }
                Ok(Acquisition::Reconnected)
            }
            Err(e) => {
                drop(guard);
                self.sessions.remove(host);
                warn!("Dropped session for {} after failed reconnect: {}", host, e);
                Err(e)
            }
        }
    }

    /// Disconnect and forget the session for `host`. `false` if there was none.
    pub async fn close(&self, host: &str) -> bool {
        let lock = self.host_lock(host);
        let _guard = lock.lock().await;

        let removed = self.sessions.remove(host);
        if let Some((_, entry)) = &removed {
            entry.session.lock().await.disconnect().await;
            info!("Closed interactive session for {}", host);
        }
        self.release_host_lock(host, &lock);
        removed.is_some()
    }

    /// Snapshot of every registered session, sorted by host.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<SessionSnapshot> = self
            .sessions
            .iter()
            .map(|entry| {
                let status = entry.status.borrow().clone();
                SessionSnapshot {
                    host: entry.key().clone(),
                    username: entry.username.clone(),
                    port: entry.port,
                    state: status.state,
                    created_at: entry.created_at,
                    last_activity: status.last_activity,
                }
            })
            .collect();
        snapshots.sort_by(|a, b| a.host.cmp(&b.host));
        snapshots
    }

    /// Disconnect every session, used on shutdown.
    pub async fn close_all(&self) {
        let hosts: Vec<String> = self
            .sessions
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for host in hosts {
            self.close(&host).await;
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.host_locks.len()
    }
}
