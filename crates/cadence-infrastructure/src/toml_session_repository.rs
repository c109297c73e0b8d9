//! TOML-based SessionRepository implementation

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use cadence_core::error::{CadenceError, Result};
use cadence_core::session::{Session, SessionRepository};

use crate::dto::SessionDTO;
use crate::paths::CadencePaths;
use crate::storage::AtomicTomlFile;

/// A repository storing each session as its own TOML file.
///
/// - Uses DTOs ([`SessionDTO`]) for persistence
/// - Every write happens under the session file's exclusive lock, so the
///   revision check and the write form one atomic step across processes
///
/// ```text
/// sessions_dir/
/// ├── <session-id-1>.toml
/// └── <session-id-2>.toml
/// ```
pub struct TomlSessionRepository {
    sessions_dir: PathBuf,
}

impl TomlSessionRepository {
    /// Creates a repository rooted at `sessions_dir`, creating the directory
    /// if needed.
    pub fn new(sessions_dir: impl AsRef<Path>) -> Result<Self> {
        let sessions_dir = sessions_dir.as_ref().to_path_buf();
        fs::create_dir_all(&sessions_dir).map_err(|e| {
            CadenceError::io(format!(
                "Failed to create sessions directory {:?}: {}",
                sessions_dir, e
            ))
        })?;
        Ok(Self { sessions_dir })
    }

    /// Repository in the platform data directory, or below `data_dir` when given.
    pub fn default_location(data_dir: Option<&PathBuf>) -> Result<Self> {
        Self::new(CadencePaths::sessions_dir(data_dir)?)
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.sessions_dir
    }

    fn file(&self, session_id: &str) -> Result<AtomicTomlFile<SessionDTO>> {
        // Session ids become file names
        let valid = !session_id.is_empty()
            && session_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(CadenceError::not_found("Session", session_id));
        }
        Ok(AtomicTomlFile::new(
            self.sessions_dir.join(format!("{}.toml", session_id)),
        ))
    }

    fn load(file: &AtomicTomlFile<SessionDTO>) -> Result<Option<Session>> {
        file.load()?.map(SessionDTO::into_domain).transpose()
    }

    fn store(file: &AtomicTomlFile<SessionDTO>, session: &Session) -> Result<()> {
        let dto = SessionDTO::try_from(session)?;
        file.save(&dto)?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for TomlSessionRepository {
    async fn find_by_id(&self, session_id: &str) -> Result<Option<Session>> {
        let file = match self.file(session_id) {
            Ok(file) => file,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        Self::load(&file)
    }

    async fn insert(&self, session: &Session) -> Result<Session> {
        let file = self.file(&session.id)?;
        file.with_lock(|file| {
            if file.load()?.is_some() {
                return Err(CadenceError::data_access(format!(
                    "Session '{}' already exists",
                    session.id
                )));
            }
            let mut stored = session.clone();
            stored.revision = 1;
            Self::store(file, &stored)?;
            tracing::debug!("[TomlSessionRepository] Inserted session {}", stored.id);
            Ok(stored)
        })
    }

    async fn update(&self, session: &Session) -> Result<Session> {
        let file = self.file(&session.id)?;
        file.with_lock(|file| {
            let current = Self::load(file)?.ok_or_else(|| CadenceError::not_found("Session", &session.id))?;
            if current.revision != session.revision {
                tracing::debug!(
                    "[TomlSessionRepository] Revision conflict on {}: expected {}, found {}",
                    session.id,
                    session.revision,
                    current.revision
                );
                return Err(CadenceError::Conflict {
                    session_id: session.id.clone(),
                    expected: session.revision,
                    actual: current.revision,
                });
            }
            let mut stored = session.clone();
            stored.revision = current.revision + 1;
            Self::store(file, &stored)?;
            Ok(stored)
        })
    }

    async fn delete(&self, session_id: &str) -> Result<()> {
        let file = match self.file(session_id) {
            Ok(file) => file,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => return Err(e),
        };
        let removed = file.with_lock(|file| file.remove())?;
        if removed {
            tracing::debug!("[TomlSessionRepository] Deleted session {}", session_id);
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<Session>> {
        let entries = fs::read_dir(&self.sessions_dir).map_err(|e| {
            CadenceError::io(format!(
                "Failed to read sessions directory {:?}: {}",
                self.sessions_dir, e
            ))
        })?;

        let mut sessions = Vec::new();
        for entry in entries {
            let path = entry?.path();
            let is_session_file = path.extension().and_then(|s| s.to_str()) == Some("toml")
                && !path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .is_some_and(|name| name.starts_with('.'));
            if !is_session_file {
                continue;
            }

            let file = AtomicTomlFile::<SessionDTO>::new(path.clone());
            match Self::load(&file) {
                Ok(Some(session)) => sessions.push(session),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!("[TomlSessionRepository] Skipping unreadable session file {:?}: {}", path, e);
                }
            }
        }

        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }
}
