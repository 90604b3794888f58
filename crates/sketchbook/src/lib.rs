//! Namespaced on-disk store for fragment shader sketches.
//!
//! Each [`SketchStore`] owns one namespace inside a shared directory. Sources
//! live in flat files named `<namespace>.<name>.glsl`, and an ordered index
//! (`<namespace>.index.json`) records which names the namespace owns. Other
//! namespaces sharing the directory are never touched, not even by
//! [`SketchStore::cleanup`].
//!
//! Storage is best-effort by contract: the public operations never fail the
//! caller. When the backing directory is unavailable or an I/O error occurs,
//! the operation logs a warning and degrades to a no-op (reads return `None`
//! or an empty list). The process keeps running on in-memory state alone.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// One owned sketch: its user-facing name and a stable numeric id.
///
/// Ids are assigned when a name is first stored and survive source updates,
/// so hosts can use them as durable keys for UI state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SketchEntry {
    pub name: String,
    pub id: u64,
}

#[derive(Debug, Error)]
enum StoreError {
    #[error("invalid sketch name {0:?}")]
    InvalidName(String),
    #[error("store I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("index at {path} is corrupt: {source}")]
    CorruptIndex {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Handle on one namespace inside a shared sketch directory.
pub struct SketchStore {
    root: PathBuf,
    namespace: String,
}

impl SketchStore {
    /// Opens the store rooted at `root` for `namespace`. Creates the root
    /// directory if missing; failure to create it is logged and the store
    /// still comes up, with every later operation degrading to a no-op.
    pub fn open(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        let store = Self {
            root: root.into(),
            namespace: namespace.into(),
        };
        if let Err(err) = fs::create_dir_all(&store.root) {
            warn!(root = %store.root.display(), %err, "sketch directory unavailable; running without persistence");
        }
        store
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// On-disk location of a sketch's source, so hosts can watch it for
    /// external edits. `None` for names the store would reject.
    pub fn path(&self, name: &str) -> Option<PathBuf> {
        self.sketch_path(name).ok()
    }

    /// Inserts or updates a sketch. The entry keeps its id across updates;
    /// new names are appended to the index in arrival order.
    pub fn put(&self, name: &str, source: &str) {
        if let Err(err) = self.try_put(name, source) {
            warn!(name, %err, "failed to persist sketch; keeping in-memory copy only");
        }
    }

    /// Loads a sketch's source, or `None` if it is missing or unreadable.
    pub fn get(&self, name: &str) -> Option<String> {
        match self.try_get(name) {
            Ok(source) => source,
            Err(err) => {
                warn!(name, %err, "failed to load sketch");
                None
            }
        }
    }

    /// Removes a sketch and its index entry. Unknown names are a no-op.
    pub fn delete(&self, name: &str) {
        if let Err(err) = self.try_delete(name) {
            warn!(name, %err, "failed to delete sketch");
        }
    }

    /// Lists the entries this namespace owns, in insertion order. An
    /// unreadable index lists as empty.
    pub fn list_owned(&self) -> Vec<SketchEntry> {
        match self.read_index() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(%err, "failed to read sketch index");
                Vec::new()
            }
        }
    }

    /// Removes owned files whose name is in neither `keep` nor the index.
    /// Indexed sketches always survive; files from other namespaces in the
    /// same directory are never touched.
    pub fn cleanup(&self, keep: &[String]) {
        if let Err(err) = self.try_cleanup(keep) {
            warn!(%err, "sketch cleanup failed");
        }
    }

    fn try_put(&self, name: &str, source: &str) -> Result<(), StoreError> {
        let path = self.sketch_path(name)?;
        fs::write(&path, source).map_err(|source| StoreError::Io { path, source })?;

        let mut entries = self.read_index()?;
        if !entries.iter().any(|entry| entry.name == name) {
            let id = entries.iter().map(|entry| entry.id).max().unwrap_or(0) + 1;
            entries.push(SketchEntry {
                name: name.to_owned(),
                id,
            });
            self.write_index(&entries)?;
        }
        debug!(name, "sketch stored");
        Ok(())
    }

    fn try_get(&self, name: &str) -> Result<Option<String>, StoreError> {
        let path = self.sketch_path(name)?;
        match fs::read_to_string(&path) {
            Ok(source) => Ok(Some(source)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io { path, source }),
        }
    }

    fn try_delete(&self, name: &str) -> Result<(), StoreError> {
        let path = self.sketch_path(name)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(source) => return Err(StoreError::Io { path, source }),
        }

        let mut entries = self.read_index()?;
        let before = entries.len();
        entries.retain(|entry| entry.name != name);
        if entries.len() != before {
            self.write_index(&entries)?;
        }
        Ok(())
    }

    fn try_cleanup(&self, keep: &[String]) -> Result<(), StoreError> {
        let entries = self.read_index()?;
        let dir = match fs::read_dir(&self.root) {
            Ok(dir) => dir,
            Err(source) => {
                return Err(StoreError::Io {
                    path: self.root.clone(),
                    source,
                })
            }
        };

        let index_name = format!("{}.index.json", self.namespace);
        for entry in dir.flatten() {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if !owned_by(file_name, &self.namespace) || file_name == index_name {
                continue;
            }
            let name = file_name
                .strip_prefix(&self.namespace)
                .and_then(|rest| rest.strip_prefix('.'))
                .and_then(|rest| rest.strip_suffix(".glsl"));
            let orphaned = match name {
                Some(name) => {
                    !keep.iter().any(|kept| kept == name)
                        && !entries.iter().any(|entry| entry.name == name)
                }
                None => true,
            };
            if orphaned {
                let path = entry.path();
                match fs::remove_file(&path) {
                    Ok(()) => debug!(file = file_name, "removed orphaned sketch file"),
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(source) => return Err(StoreError::Io { path, source }),
                }
            }
        }
        Ok(())
    }

    fn read_index(&self) -> Result<Vec<SketchEntry>, StoreError> {
        let path = self.index_path();
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        serde_json::from_str(&raw).map_err(|source| StoreError::CorruptIndex { path, source })
    }

    fn write_index(&self, entries: &[SketchEntry]) -> Result<(), StoreError> {
        let path = self.index_path();
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|source| StoreError::CorruptIndex {
                path: path.clone(),
                source,
            })?;
        fs::write(&path, raw).map_err(|source| StoreError::Io { path, source })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(format!("{}.index.json", self.namespace))
    }

    fn sketch_path(&self, name: &str) -> Result<PathBuf, StoreError> {
        if !valid_name(name) {
            return Err(StoreError::InvalidName(name.to_owned()));
        }
        Ok(self
            .root
            .join(format!("{}.{}.glsl", self.namespace, name)))
    }
}

/// Sketch names become file name segments, so anything that could escape the
/// store directory or collide with the index suffix is rejected.
fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 128
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ' '))
}

/// True if `file_name` in a shared directory belongs to `namespace`.
pub fn owned_by(file_name: &str, namespace: &str) -> bool {
    file_name
        .strip_prefix(namespace)
        .is_some_and(|rest| rest.starts_with('.'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use tempfile::TempDir;

    fn store_in(dir: &Path, namespace: &str) -> SketchStore {
        SketchStore::open(dir, namespace)
    }

    #[test]
    fn put_then_get_roundtrips_source() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        store.put("plasma", "void main(){O=vec4(1.0);}");
        assert_eq!(
            store.get("plasma").as_deref(),
            Some("void main(){O=vec4(1.0);}")
        );
    }

    #[test]
    fn get_missing_sketch_is_none() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        assert_eq!(store.get("nothing"), None);
    }

    #[test]
    fn index_preserves_insertion_order_and_ids() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        store.put("a", "1");
        store.put("b", "2");
        store.put("a", "updated");

        let entries = store.list_owned();
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        // Update in place keeps the original id.
        assert_eq!(entries[0].id, 1);
        assert_eq!(entries[1].id, 2);
        assert_eq!(store.get("a").as_deref(), Some("updated"));
    }

    #[test]
    fn delete_removes_file_and_index_entry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        store.put("gone", "x");
        store.delete("gone");
        assert_eq!(store.get("gone"), None);
        assert!(store.list_owned().is_empty());
        // Deleting again is a quiet no-op.
        store.delete("gone");
    }

    #[test]
    fn cleanup_only_touches_own_namespace() {
        let dir = TempDir::new().unwrap();
        let mine = store_in(dir.path(), "ns1");
        let theirs = store_in(dir.path(), "ns2");
        mine.put("indexed", "i");
        fs::write(dir.path().join("ns1.orphan.glsl"), "o").unwrap();
        fs::write(dir.path().join("ns2.orphan.glsl"), "o").unwrap();
        theirs.put("foreign", "f");

        mine.cleanup(&[]);

        // Indexed sketches survive; only this namespace's orphan goes.
        assert_eq!(mine.get("indexed").as_deref(), Some("i"));
        assert!(!dir.path().join("ns1.orphan.glsl").exists());
        assert!(dir.path().join("ns2.orphan.glsl").exists());
        assert_eq!(theirs.get("foreign").as_deref(), Some("f"));
    }

    #[test]
    fn cleanup_keep_list_protects_unindexed_files() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        fs::write(dir.path().join("ns1.pinned.glsl"), "p").unwrap();
        fs::write(dir.path().join("ns1.orphan.glsl"), "o").unwrap();

        store.cleanup(&["pinned".to_owned()]);

        assert_eq!(store.get("pinned").as_deref(), Some("p"));
        assert!(!dir.path().join("ns1.orphan.glsl").exists());
    }

    #[test]
    fn invalid_names_never_escape_the_store() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        store.put("../evil", "x");
        store.put("", "x");
        assert_eq!(store.get("../evil"), None);
        assert!(store.list_owned().is_empty());
    }

    #[test]
    fn unavailable_root_degrades_to_noop() {
        let store = SketchStore::open("/proc/definitely/not/writable", "ns1");
        store.put("a", "x");
        assert_eq!(store.get("a"), None);
        assert!(store.list_owned().is_empty());
        store.cleanup(&[]);
    }

    #[test]
    fn path_points_at_the_stored_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(dir.path(), "ns1");
        store.put("plasma", "x");
        let path = store.path("plasma").unwrap();
        assert_eq!(fs::read_to_string(path).unwrap(), "x");
        assert_eq!(store.path("../evil"), None);
    }

    #[test]
    fn ownership_check_requires_dot_boundary() {
        assert!(owned_by("ns1.plasma.glsl", "ns1"));
        assert!(owned_by("ns1.index.json", "ns1"));
        assert!(!owned_by("ns10.plasma.glsl", "ns1"));
        assert!(!owned_by("other.plasma.glsl", "ns1"));
    }
}
