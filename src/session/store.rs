//! Session stores.
//!
//! Every store exposes the same three writes: a full replace after an exchange
//! or refresh, a role-only mutation after a role switch, and a full clear.
//! Each write is atomic and last-writer-wins; readers always observe a whole
//! record.

use super::{Role, Session, SessionTokens};
use parking_lot::RwLock;
use std::{
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, error, warn};

/// File name (without extension) of the persisted session record.
pub const STORAGE_KEY: &str = "rentauth.session";

/// Holder of the current internal session.
///
/// Only the reconciler, the identity exchange, role switch and sign-out write
/// to a store; everything else reads.
pub trait SessionStore: Send + Sync {
    /// Snapshot of the current record.
    fn get(&self) -> Session;

    /// Replace the whole record with a fresh token pair.
    fn set_session(&self, tokens: SessionTokens);

    /// Change the active role without touching the tokens.
    fn set_active_role(&self, role: Role);

    /// Reset every field to `None`.
    fn clear_role(&self);
}

fn apply_role(session: &mut Session, role: Role) -> bool {
    if session.access_token.is_none() {
        debug!(%role, "ignoring role change without an access token");
        return false;
    }
    session.active_role = Some(role);
    true
}

/// Process-scoped store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    session: RwLock<Session>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing record, e.g. one hydrated from elsewhere.
    #[must_use]
    pub fn with_session(session: Session) -> Self {
        Self {
            session: RwLock::new(session),
        }
    }
}

impl SessionStore for MemoryStore {
    fn get(&self) -> Session {
        self.session.read().clone()
    }

    fn set_session(&self, tokens: SessionTokens) {
        *self.session.write() = Session::from(tokens);
    }

    fn set_active_role(&self, role: Role) {
        apply_role(&mut self.session.write(), role);
    }

    fn clear_role(&self) {
        *self.session.write() = Session::default();
    }
}

/// Store persisted as one JSON record under [`STORAGE_KEY`].
///
/// The record is cached in memory; each write replaces the file through a
/// temporary sibling and a rename. Persistence failures are logged and the
/// in-memory record stays authoritative for the rest of the process.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    session: RwLock<Session>,
}

impl FileStore {
    /// Open (or create) the store inside `dir`.
    ///
    /// A missing file yields an empty session, as does a corrupt one.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` cannot be created or the file exists but
    /// cannot be read.
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("{STORAGE_KEY}.json"));

        let session = match fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(path = %path.display(), "discarding unreadable session record: {err}");
                Session::default()
            }),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Session::default(),
            Err(err) => return Err(err),
        };

        Ok(Self {
            path,
            session: RwLock::new(session),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, session: &Session) {
        if let Err(err) = write_atomically(&self.path, session) {
            error!(path = %self.path.display(), "failed to persist session: {err}");
        }
    }
}

fn write_atomically(path: &Path, session: &Session) -> io::Result<()> {
    let bytes = serde_json::to_vec(session).map_err(io::Error::other)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)
}

impl SessionStore for FileStore {
    fn get(&self) -> Session {
        self.session.read().clone()
    }

    fn set_session(&self, tokens: SessionTokens) {
        let mut session = self.session.write();
        *session = Session::from(tokens);
        self.persist(&session);
    }

    fn set_active_role(&self, role: Role) {
        let mut session = self.session.write();
        if apply_role(&mut session, role) {
            self.persist(&session);
        }
    }

    fn clear_role(&self) {
        let mut session = self.session.write();
        *session = Session::default();
        self.persist(&session);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::session::Token;

    fn tokens(access: &str, refresh: &str, role: Option<Role>) -> SessionTokens {
        SessionTokens {
            access_token: Token::from(access),
            refresh_token: Token::from(refresh),
            active_role: role,
        }
    }

    #[test]
    fn memory_store_replace_and_clear() {
        let store = MemoryStore::new();
        assert!(store.get().is_empty());

        store.set_session(tokens("A1", "R1", Some(Role::Locataire)));
        let session = store.get();
        assert_eq!(session.access_token, Some(Token::from("A1")));
        assert_eq!(session.refresh_token, Some(Token::from("R1")));
        assert_eq!(session.active_role, Some(Role::Locataire));

        store.clear_role();
        assert!(store.get().is_empty());
    }

    #[test]
    fn role_switch_keeps_tokens() {
        let store = MemoryStore::new();
        store.set_session(tokens("A1", "R1", Some(Role::Locataire)));

        store.set_active_role(Role::Proprietaire);

        let session = store.get();
        assert_eq!(session.access_token, Some(Token::from("A1")));
        assert_eq!(session.refresh_token, Some(Token::from("R1")));
        assert_eq!(session.active_role, Some(Role::Proprietaire));
    }

    #[test]
    fn role_switch_without_session_is_ignored() {
        let store = MemoryStore::new();
        store.set_active_role(Role::Admin);
        assert!(store.get().is_empty());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        store.set_session(tokens("A1", "R1", Some(Role::Locataire)));
        store.set_active_role(Role::Proprietaire);
        drop(store);

        let reopened = FileStore::open(dir.path()).unwrap();
        let session = reopened.get();
        assert_eq!(session.access_token, Some(Token::from("A1")));
        assert_eq!(session.refresh_token, Some(Token::from("R1")));
        assert_eq!(session.active_role, Some(Role::Proprietaire));
        assert!(reopened.path().ends_with("rentauth.session.json"));
    }

    #[test]
    fn file_store_clear_is_persisted() {
        let dir = tempfile::tempdir().unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        store.set_session(tokens("A1", "R1", None));
        store.clear_role();

        let reopened = FileStore::open(dir.path()).unwrap();
        assert!(reopened.get().is_empty());
    }

    #[test]
    fn file_store_discards_corrupt_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("rentauth.session.json"), b"{not json").unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        assert!(store.get().is_empty());
    }

    #[test]
    fn file_store_loads_partial_record() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("rentauth.session.json"),
            br#"{"accessToken":"A1","refreshToken":null,"activeRole":"LOCATAIRE"}"#,
        )
        .unwrap();

        let store = FileStore::open(dir.path()).unwrap();
        let session = store.get();
        assert_eq!(session.access_token, Some(Token::from("A1")));
        assert_eq!(session.refresh_token, None);
    }
}
