//! Guarded on-disk persistence for the single session token.
//!
//! The store holds exactly one record in a JSON file. Reads fail closed:
//! an absent file, a file that fails the ownership check, unparsable
//! content, missing keys, or an expired record all yield `None` and the
//! caller establishes a fresh session. Writes are stricter: a pre-write
//! check on an existing file and a post-write re-check both surface as
//! [`Error::SessionStore`], since either means another principal touched
//! the file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// On-disk record shape. `created` is unix seconds serialized as a
/// string, matching what other consumers of the file expect.
#[derive(Debug, Serialize, Deserialize)]
struct SessionRecord {
    created: String,
    session_id: String,
    #[serde(default)]
    is_legacy: bool,
}

/// File-backed store for one session token with an expiry window.
#[derive(Debug)]
pub struct SessionStore {
    path: PathBuf,
    timeout_secs: i64,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>, timeout_secs: i64) -> Self {
        SessionStore {
            path: path.into(),
            timeout_secs,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the stored token if the file passes the ownership check and
    /// the record has not expired. Any failure reads as `None`.
    pub fn read(&self) -> Option<(String, bool)> {
        if !self.path.is_file() {
            return None;
        }
        if !validate_exclusive_ownership(&self.path) {
            return None;
        }
        let raw = fs::read_to_string(&self.path).ok()?;
        let record: SessionRecord = serde_json::from_str(&raw).ok()?;
        let created: i64 = record.created.parse().ok()?;
        let expires_at = created + self.timeout_secs;
        if Utc::now().timestamp() >= expires_at {
            return None;
        }
        if record.session_id.is_empty() {
            return None;
        }
        Some((record.session_id, record.is_legacy))
    }

    /// Persist a token. An existing file that fails the ownership check
    /// is never overwritten (tamper); a file that fails the re-check
    /// after writing signals a race. Both are fatal.
    pub fn write(&self, token: &str, is_legacy: bool) -> Result<()> {
        if self.path.exists() && !validate_exclusive_ownership(&self.path) {
            return Err(Error::SessionStore(format!(
                "refusing to overwrite {}: not exclusively owned by the current user",
                self.path.display()
            )));
        }
        let record = SessionRecord {
            created: Utc::now().timestamp().to_string(),
            session_id: token.to_string(),
            is_legacy,
        };
        let raw = serde_json::to_string(&record)
            .map_err(|e| Error::SessionStore(format!("cannot encode session record: {e}")))?;
        fs::write(&self.path, raw).map_err(|e| {
            Error::SessionStore(format!("cannot write {}: {e}", self.path.display()))
        })?;
        restrict_permissions(&self.path)?;
        if !validate_exclusive_ownership(&self.path) {
            return Err(Error::SessionStore(format!(
                "{} changed hands during write",
                self.path.display()
            )));
        }
        Ok(())
    }

    /// Reserved. The file is intentionally left in place so a later
    /// client run can restore the session.
    pub fn delete(&self) -> Result<()> {
        Err(Error::Unimplemented("SessionStore::delete"))
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .map_err(|e| Error::SessionStore(format!("cannot chmod {}: {e}", path.display())))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

/// True when the file is owned by the current user and readable by no
/// one else (mode exactly 0600). On platforms without POSIX ownership
/// the check is trivially true.
#[cfg(unix)]
fn validate_exclusive_ownership(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    // SAFETY: getuid has no failure mode and touches no memory.
    let uid = unsafe { libc::getuid() };
    meta.uid() == uid && meta.mode() & 0o777 == 0o600
}

#[cfg(not(unix))]
fn validate_exclusive_ownership(_path: &Path) -> bool {
    true
}
