//! Local-filesystem object store.

use super::{validate_bucket, validate_key, ObjectStore, StoreError, StoreResult};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Stores each key as a file under `{root}/{bucket}/{key}`.
///
/// Writes go to a temporary file in the target directory and are renamed
/// into place, so readers never observe a partial blob.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Opens a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl AsRef<Path>) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn bucket_dir(&self, bucket: &str) -> StoreResult<PathBuf> {
        validate_bucket(bucket)?;
        Ok(self.root.join(bucket))
    }

    fn path_for(&self, bucket: &str, key: &str) -> StoreResult<PathBuf> {
        validate_key(key)?;
        let mut path = self.bucket_dir(bucket)?;
        path.extend(key.split('/'));
        Ok(path)
    }

    fn persist(&self, path: &Path, tmp: NamedTempFile) -> StoreResult<()> {
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|err| StoreError::Io(err.error))?;
        Ok(())
    }

    fn temp_in(path: &Path) -> StoreResult<NamedTempFile> {
        let parent = path
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(path.display().to_string()))?;
        fs::create_dir_all(parent)?;
        Ok(NamedTempFile::new_in(parent)?)
    }
}

impl ObjectStore for LocalStore {
    fn exists(&self, bucket: &str, key: &str) -> StoreResult<bool> {
        Ok(self.path_for(bucket, key)?.is_file())
    }

    fn get(&self, bucket: &str, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(bucket, key)?;
        match fs::read(&path) {
            Ok(data) => Ok(data),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(StoreError::NotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    fn set(&self, bucket: &str, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(bucket, key)?;
        let mut tmp = Self::temp_in(&path)?;
        tmp.write_all(data)?;
        self.persist(&path, tmp)?;
        debug!("Wrote {} bytes to {}", data.len(), path.display());
        Ok(())
    }

    fn set_from_file(&self, bucket: &str, key: &str, source: &Path) -> StoreResult<()> {
        let path = self.path_for(bucket, key)?;
        let mut tmp = Self::temp_in(&path)?;
        let mut input = fs::File::open(source)?;
        let bytes = io::copy(&mut input, &mut tmp)?;
        self.persist(&path, tmp)?;
        debug!("Copied {} bytes from {} to {}", bytes, source.display(), path.display());
        Ok(())
    }

    fn list_names(&self, bucket: &str, prefix: &str) -> StoreResult<Vec<String>> {
        let dir = self.bucket_dir(bucket)?;
        let mut names = Vec::new();
        if dir.is_dir() {
            collect_keys(&dir, "", &mut names)?;
        }
        names.retain(|name| name.starts_with(prefix));
        names.sort();
        Ok(names)
    }

    fn delete(&self, bucket: &str, key: &str) -> StoreResult<()> {
        let path = self.path_for(bucket, key)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(err.into()),
        }

        // Prune now-empty directories up to the bucket root.
        let bucket_dir = self.bucket_dir(bucket)?;
        let mut dir = path.parent();
        while let Some(current) = dir {
            if current == bucket_dir || fs::remove_dir(current).is_err() {
                break;
            }
            dir = current.parent();
        }
        Ok(())
    }
}

fn collect_keys(dir: &Path, prefix: &str, out: &mut Vec<String>) -> StoreResult<()> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        // Temporary files from in-flight writes.
        if name.starts_with('.') {
            continue;
        }
        let key = if prefix.is_empty() {
            name.to_string()
        } else {
            format!("{prefix}/{name}")
        };
        if entry.file_type()?.is_dir() {
            collect_keys(&entry.path(), &key, out)?;
        } else {
            out.push(key);
        }
    }
    Ok(())
}
