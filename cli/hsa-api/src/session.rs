//! Session state shared by every request made through an [crate::ApiClient].
//!
//! A [SessionContext] is created once at startup, optionally backed by a
//! [SessionStore] on disk, and handed to the client explicitly.
//! Everything that wants to react to sign in/out or to an expired token
//! registers a listener on the context.

use std::fmt::Debug;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fslock::LockFile;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Storage key of the persisted session.
/// The session file is called `<key>.json`.
pub const SESSION_STORAGE_KEY: &str = "hsa_auth_v1";

/// Bearer token and profile of the signed in user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub token: Option<String>,
    pub user: Option<SessionUser>,
}

impl Session {
    pub fn is_signed_in(&self) -> bool {
        self.token.is_some()
    }
}

/// Profile fields kept alongside the token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: u64,
    pub username: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl SessionUser {
    /// "First Last", falling back to the username.
    pub fn display_name(&self) -> String {
        let name = [self.first_name.as_deref(), self.last_name.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");
        if !name.is_empty() {
            return name;
        }
        self.username
            .clone()
            .unwrap_or_else(|| format!("user {}", self.id))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("couldn't acquire session file lock")]
    AcquireLock(#[source] fslock::Error),
    #[error("couldn't read session file")]
    ReadFile(#[source] std::io::Error),
    #[error("couldn't parse session file")]
    Parse(#[source] serde_json::Error),
    #[error("session file stored in an invalid location: {0}")]
    InvalidLocation(PathBuf),
    #[error("failed to open temporary file")]
    OpenTmpFile(#[source] std::io::Error),
    #[error("failed to write temporary file")]
    WriteTmpFile(#[source] serde_json::Error),
    #[error("failed to rename temporary file")]
    RenameTmpFile(#[source] tempfile::PersistError),
    #[error("couldn't remove session file")]
    RemoveFile(#[source] std::io::Error),
}

/// The persisted `{token, user}` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    /// A store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The store for the fixed storage key inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(format!("{SESSION_STORAGE_KEY}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The lock file lives next to the session file and is never removed,
    /// its presence does not indicate an active lock.
    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn acquire_lock(&self) -> Result<LockFile, SessionStoreError> {
        let lock_path = self.lock_path();
        let mut lock =
            LockFile::open(lock_path.as_os_str()).map_err(SessionStoreError::AcquireLock)?;
        lock.lock().map_err(SessionStoreError::AcquireLock)?;
        Ok(lock)
    }

    /// Returns the persisted session or `None` if nothing was stored.
    pub fn load(&self) -> Result<Option<Session>, SessionStoreError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "session file not found");
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path).map_err(SessionStoreError::ReadFile)?;
        let session: Session =
            serde_json::from_str(&contents).map_err(SessionStoreError::Parse)?;
        Ok(Some(session))
    }

    pub fn save(&self, session: &Session) -> Result<(), SessionStoreError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| SessionStoreError::InvalidLocation(self.path.clone()))?;
        std::fs::create_dir_all(parent).map_err(SessionStoreError::OpenTmpFile)?;

        let lock = self.acquire_lock()?;
        serialize_atomically(session, &self.path, lock)?;
        debug!(path = %self.path.display(), "wrote session file");
        Ok(())
    }

    pub fn clear(&self) -> Result<(), SessionStoreError> {
        if !self.path.exists() {
            return Ok(());
        }
        let _lock = self.acquire_lock()?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(SessionStoreError::RemoveFile(e)),
        }
        debug!(path = %self.path.display(), "removed session file");
        Ok(())
    }
}

/// Serialize a value and write it to disk atomically.
///
/// The value is written to a temporary file next to `path` which is then
/// renamed over it. Taking the [LockFile] ensures the write only happens
/// while the lock is held.
fn serialize_atomically<T>(
    value: &T,
    path: &Path,
    _lock: LockFile,
) -> Result<(), SessionStoreError>
where
    T: ?Sized + Serialize,
{
    let parent = path
        .parent()
        .ok_or_else(|| SessionStoreError::InvalidLocation(path.to_path_buf()))?;
    let temp_file =
        tempfile::NamedTempFile::new_in(parent).map_err(SessionStoreError::OpenTmpFile)?;

    let writer = BufWriter::new(&temp_file);
    serde_json::to_writer_pretty(writer, value).map_err(SessionStoreError::WriteTmpFile)?;
    temp_file
        .persist(path)
        .map_err(SessionStoreError::RenameTmpFile)?;
    Ok(())
}

/// Changes of the session observable by listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    SignedIn,
    SignedOut,
    /// The upstream API rejected the token.
    /// Whoever drives the front end should send the user back to login.
    LoginRequired,
}

pub type SessionListener = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct SessionInner {
    session: Session,
    store: Option<SessionStore>,
    listeners: Vec<(ListenerId, SessionListener)>,
    next_listener: u64,
}

/// Shared handle to the current session.
///
/// Cloning is cheap, all clones observe the same state.
#[derive(Clone, Default)]
pub struct SessionContext {
    inner: Arc<Mutex<SessionInner>>,
}

impl Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("SessionContext")
            .field("signed_in", &inner.session.is_signed_in())
            .field("store", &inner.store)
            .field("listeners", &inner.listeners.len())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    pub fn new(store: Option<SessionStore>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SessionInner {
                store,
                ..Default::default()
            })),
        }
    }

    /// A context without persistence.
    pub fn in_memory() -> Self {
        Self::new(None)
    }

    fn lock(&self) -> MutexGuard<'_, SessionInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Read the persisted session, if any, into memory.
    ///
    /// Returns whether a session was found. Listeners are not notified.
    pub fn load(&self) -> Result<bool, SessionStoreError> {
        let mut inner = self.lock();
        let Some(store) = &inner.store else {
            return Ok(false);
        };
        match store.load()? {
            Some(session) => {
                inner.session = session;
                Ok(true)
            },
            None => Ok(false),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.lock().session.token.clone()
    }

    pub fn user(&self) -> Option<SessionUser> {
        self.lock().session.user.clone()
    }

    pub fn snapshot(&self) -> Session {
        self.lock().session.clone()
    }

    pub fn is_signed_in(&self) -> bool {
        self.lock().session.is_signed_in()
    }

    /// Replace the session and persist it.
    pub fn set(&self, session: Session) {
        {
            let mut inner = self.lock();
            if let Some(store) = &inner.store {
                if let Err(e) = store.save(&session) {
                    warn!(error = %e, "failed to persist session");
                }
            }
            inner.session = session;
        }
        self.notify(SessionEvent::SignedIn);
    }

    /// Clear the session on user request.
    ///
    /// Returns whether a session was active.
    pub fn logout(&self) -> bool {
        let was_signed_in = self.clear();
        self.notify(SessionEvent::SignedOut);
        was_signed_in
    }

    /// Clear the session after the upstream API rejected its token.
    ///
    /// Only the transition from signed in to signed out clears state and
    /// notifies listeners, so a burst of rejected requests yields a single
    /// [SessionEvent::LoginRequired].
    pub fn expire(&self) -> bool {
        if !self.is_signed_in() {
            debug!("session already cleared");
            return false;
        }
        if !self.clear() {
            return false;
        }
        self.notify(SessionEvent::LoginRequired);
        true
    }

    fn clear(&self) -> bool {
        let mut inner = self.lock();
        let was_signed_in = inner.session.is_signed_in();
        inner.session = Session::default();
        if let Some(store) = &inner.store {
            if let Err(e) = store.clear() {
                warn!(error = %e, "failed to remove persisted session");
            }
        }
        was_signed_in
    }

    pub fn subscribe(&self, listener: impl Fn(&SessionEvent) + Send + Sync + 'static) -> ListenerId {
        let mut inner = self.lock();
        let id = ListenerId(inner.next_listener);
        inner.next_listener += 1;
        inner.listeners.push((id, Arc::new(listener)));
        id
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut inner = self.lock();
        let before = inner.listeners.len();
        inner.listeners.retain(|(listener_id, _)| *listener_id != id);
        inner.listeners.len() != before
    }

    /// Listeners run after the lock is released so they may use the context.
    fn notify(&self, event: SessionEvent) {
        let listeners = self
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect::<Vec<_>>();
        debug!(?event, listeners = listeners.len(), "session changed");
        for listener in listeners {
            listener(&event);
        }
    }
}
