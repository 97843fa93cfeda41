//! Session storage for the authentication flow.
//!
//! A [`SessionStore`] is the single owner of the current [`Session`]. Callers
//! read it with [`SessionStore::current`] and change it only through
//! [`SessionStore::replace_access_token`] and [`SessionStore::clear`], each of
//! which is an atomic read-modify-write.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::RwLock;

use super::errors::SessionError;
use super::models::Session;

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn current(&self) -> Result<Session, SessionError>;

    async fn replace_access_token(&self, token: &str) -> Result<(), SessionError>;

    /// Empties the store and returns the session that was held.
    async fn clear(&self) -> Result<Session, SessionError>;
}

#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    session: RwLock<Session>,
}

impl InMemorySessionStore {
    pub fn new(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }

    pub async fn sign_in(&self, session: Session) {
        *self.session.write().await = session;
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn current(&self) -> Result<Session, SessionError> {
        Ok(self.session.read().await.clone())
    }

    async fn replace_access_token(&self, token: &str) -> Result<(), SessionError> {
        self.session.write().await.access_token = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> Result<Session, SessionError> {
        Ok(std::mem::take(&mut *self.session.write().await))
    }
}

/// Session store persisted as JSON on disk.
///
/// Every change is written to a sibling temp file that replaces the session
/// file by rename, so readers never see a half-written session. On unix the
/// file is created owner-only (`0600`). `clear` removes it.
#[derive(Debug)]
pub struct FileSessionStore {
    path: PathBuf,
    session: RwLock<Session>,
}

impl FileSessionStore {
    /// Loads the session at `path`; a missing file is an empty session.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let session = match tokio::fs::read(&path).await {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Session::default(),
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(err) if err.kind() == ErrorKind::NotFound => Session::default(),
            Err(err) => return Err(err.into()),
        };

        Ok(Self {
            path,
            session: RwLock::new(session),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn sign_in(&self, session: Session) -> Result<(), SessionError> {
        let mut guard = self.session.write().await;
        persist(&self.path, &session).await?;
        *guard = session;
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn current(&self) -> Result<Session, SessionError> {
        Ok(self.session.read().await.clone())
    }

    async fn replace_access_token(&self, token: &str) -> Result<(), SessionError> {
        let mut guard = self.session.write().await;
        let mut updated = guard.clone();
        updated.access_token = Some(token.to_string());
        persist(&self.path, &updated).await?;
        *guard = updated;
        Ok(())
    }

    async fn clear(&self) -> Result<Session, SessionError> {
        let mut guard = self.session.write().await;
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        Ok(std::mem::take(&mut *guard))
    }
}

async fn persist(path: &Path, session: &Session) -> Result<(), SessionError> {
    let bytes = serde_json::to_vec_pretty(session)?;
    let staging = staging_path(path);
    match tokio::fs::remove_file(&staging).await {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => return Err(err.into()),
    }

    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(&staging).await?;
    file.write_all(&bytes).await?;
    file.sync_all().await?;
    drop(file);

    if let Err(err) = tokio::fs::rename(&staging, path).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(err.into());
    }
    Ok(())
}

fn staging_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "session".to_string());
    path.with_file_name(format!(".{name}.tmp"))
}
