use std::{
    collections::BTreeMap,
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    sync::{PoisonError, RwLock},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    domain::{Chirp, User},
    password::{PasswordError, PasswordHasher},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFound {
    Chirp { id: u64 },
    UserId { id: u64 },
    UserEmail { email: String },
}

impl std::fmt::Display for NotFound {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chirp { id } => write!(f, "chirp not found: {id}"),
            Self::UserId { id } => write!(f, "user not found: {id}"),
            Self::UserEmail { email } => write!(f, "user not found: {email}"),
        }
    }
}

#[derive(Debug)]
pub enum StoreError {
    Io(io::Error),
    Decode(serde_json::Error),
    NotFound(NotFound),
    Password(PasswordError),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Decode(e) => write!(f, "json error: {e}"),
            Self::NotFound(e) => write!(f, "{e}"),
            Self::Password(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Decode(e) => Some(e),
            Self::Password(e) => Some(e),
            Self::NotFound(_) => None,
        }
    }
}

impl From<io::Error> for StoreError {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Decode(value)
    }
}

impl From<NotFound> for StoreError {
    fn from(value: NotFound) -> Self {
        Self::NotFound(value)
    }
}

impl From<PasswordError> for StoreError {
    fn from(value: PasswordError) -> Self {
        Self::Password(value)
    }
}

/// The whole on-disk state. Every operation reads and writes it in full.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Document {
    pub chirps: BTreeMap<u64, Chirp>,
    pub users: BTreeMap<u64, User>,
    /// 0 means "derive from the highest existing id".
    #[serde(default)]
    pub next_chirp_id: u64,
    #[serde(default)]
    pub next_user_id: u64,
}

impl Document {
    pub fn empty() -> Self {
        Self::default()
    }

    fn allocate_chirp_id(&mut self) -> u64 {
        allocate_id(&mut self.next_chirp_id, &self.chirps)
    }

    fn allocate_user_id(&mut self) -> u64 {
        allocate_id(&mut self.next_user_id, &self.users)
    }
}

fn allocate_id<T>(next: &mut u64, records: &BTreeMap<u64, T>) -> u64 {
    let after_highest = records.keys().next_back().map_or(1, |id| id + 1);
    let id = (*next).max(after_highest).max(1);
    *next = id + 1;
    id
}

/// Single-file JSON store for chirps and users.
///
/// There is no in-memory copy of the document: each call loads the file,
/// and mutating calls write it back before returning. `lock` spans the whole
/// load/mutate/persist sequence, so concurrent calls on one store never
/// observe each other's intermediate state.
#[derive(Debug)]
pub struct ChirpStore {
    path: PathBuf,
    hasher: PasswordHasher,
    lock: RwLock<()>,
}

impl ChirpStore {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::open_with_hasher(path, PasswordHasher::default())
    }

    pub fn open_with_hasher(
        path: impl Into<PathBuf>,
        hasher: PasswordHasher,
    ) -> Result<Self, StoreError> {
        let store = Self {
            path: path.into(),
            hasher,
            lock: RwLock::new(()),
        };
        store.ensure_document()?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_document(&self) -> Result<(), StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);

        match fs::read(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(dir)?;
                }
                self.persist(&Document::empty())?;
                info!(path = %self.path.display(), "created empty database");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn load(&self) -> Result<Document, StoreError> {
        let bytes = fs::read(&self.path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    fn persist(&self, doc: &Document) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(doc)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }

    /// Runs `f` against a freshly loaded document and persists the result,
    /// all under the write guard. Nothing is written if `f` fails.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Document) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut doc = self.load()?;
        let out = f(&mut doc)?;
        self.persist(&doc)?;
        Ok(out)
    }

    fn read<T>(&self, f: impl FnOnce(Document) -> Result<T, StoreError>) -> Result<T, StoreError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let doc = self.load()?;
        f(doc)
    }

    pub fn create_chirp(&self, body: String) -> Result<Chirp, StoreError> {
        let chirp = self.mutate(|doc| {
            let id = doc.allocate_chirp_id();
            let chirp = Chirp { id, body };
            doc.chirps.insert(id, chirp.clone());
            Ok(chirp)
        })?;
        debug!(chirp_id = chirp.id, "chirp created");
        Ok(chirp)
    }

    /// All chirps in ascending id order, which is also creation order.
    pub fn list_chirps(&self) -> Result<Vec<Chirp>, StoreError> {
        self.read(|doc| Ok(doc.chirps.into_values().collect()))
    }

    pub fn get_chirp(&self, id: u64) -> Result<Chirp, StoreError> {
        self.read(|mut doc| {
            doc.chirps
                .remove(&id)
                .ok_or_else(|| NotFound::Chirp { id }.into())
        })
    }

    /// Hashes `password` before inserting. The returned record still carries
    /// the hash; strip it before it leaves the process.
    pub fn create_user(&self, email: String, password: &str) -> Result<User, StoreError> {
        let user = self.mutate(|doc| {
            let password_hash = self.hasher.hash(password)?;
            let id = doc.allocate_user_id();
            let user = User {
                id,
                email,
                password_hash,
            };
            doc.users.insert(id, user.clone());
            Ok(user)
        })?;
        debug!(user_id = user.id, "user created");
        Ok(user)
    }

    /// Exact, case-sensitive match. Emails are not unique; the lowest id wins.
    pub fn find_user_by_email(&self, email: &str) -> Result<User, StoreError> {
        self.read(|doc| {
            doc.users
                .into_values()
                .find(|user| user.email == email)
                .ok_or_else(|| {
                    NotFound::UserEmail {
                        email: email.to_string(),
                    }
                    .into()
                })
        })
    }

    pub fn replace_user(&self, id: u64, email: String, password: &str) -> Result<User, StoreError> {
        let user = self.mutate(|doc| {
            let user = doc.users.get_mut(&id).ok_or(NotFound::UserId { id })?;
            user.password_hash = self.hasher.hash(password)?;
            user.email = email;
            Ok(user.clone())
        })?;
        debug!(user_id = user.id, "user replaced");
        Ok(user)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), io::Error> {
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"))?;
    let tmp_path = path.with_file_name(format!("{}.tmp", file_name.to_string_lossy()));
    {
        let mut file = open_owner_only(&tmp_path)?;
        file.write_all(bytes)?;
        file.write_all(b"\n")?;
        file.sync_all()?;
    }

    #[cfg(windows)]
    {
        if path.exists() {
            let _ = fs::remove_file(path);
        }
    }

    fs::rename(tmp_path, path)?;
    Ok(())
}

fn open_owner_only(path: &Path) -> Result<fs::File, io::Error> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}
