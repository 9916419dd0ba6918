use std::fs;
use std::io::Write;
use std::path::Path;

use chrono::Utc;
use serde::Serialize;

use crate::{DockError, Result};

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path).map_err(|e| DockError::io(path, e))
}

/// Writes to a sibling temp file and renames it over `path`.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&tmp);
        return Err(DockError::io(path, e));
    }
    Ok(())
}

pub fn atomic_write_json_pretty<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| DockError::io(path, std::io::Error::other(e)))?;
    atomic_write_bytes(path, &bytes)
}

/// Removes `path` if present and recreates it empty.
pub fn reset_directory(path: &Path) -> Result<()> {
    if path.exists() {
        fs::remove_dir_all(path).map_err(|e| DockError::io(path, e))?;
    }
    ensure_dir(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "mzdock_fsutil_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ))
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let root = scratch("atomic");
        let path = root.join("nested").join("params.json");
        atomic_write_bytes(&path, b"old").expect("first write");
        atomic_write_bytes(&path, b"new").expect("second write");
        assert_eq!(fs::read(&path).expect("read"), b"new");
        let leftovers: Vec<_> = fs::read_dir(path.parent().expect("parent"))
            .expect("list")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind");
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn reset_directory_empties_contents() {
        let root = scratch("reset");
        ensure_dir(&root).expect("root");
        fs::write(root.join("a_deconv.mzML"), b"x").expect("seed");
        reset_directory(&root).expect("reset");
        assert!(root.is_dir());
        assert_eq!(fs::read_dir(&root).expect("list").count(), 0);
        let _ = fs::remove_dir_all(root);
    }
}
