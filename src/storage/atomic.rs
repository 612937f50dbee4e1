//! Crash-safe file replacement.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::Path;

use fs2::FileExt;

/// Replace `path` with `content` so a reader sees either the old file or the new one,
/// never a torn write.
///
/// 1. Take an exclusive lock on the destination (creating it if needed).
/// 2. Write a unique temp file in the same directory and fsync it.
/// 3. Rename the temp file over the destination.
/// 4. Fsync the directory (best-effort) and release the lock.
///
/// On any error before the rename the destination is untouched and the temp file is
/// removed.
pub fn write_file_locked(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(path)?;
    lock_file.lock_exclusive()?;

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path.file_name().and_then(|s| s.to_str()).unwrap_or("data.json");
    let mut counter = 0u32;
    let tmp_path = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(mut tmp) => {
                let written = tmp.write_all(content).and_then(|_| tmp.flush()).and_then(|_| tmp.sync_all());
                if let Err(e) = written {
                    let _ = fs::remove_file(&candidate);
                    return Err(e);
                }
                break candidate;
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(e),
        }
    };

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }

    drop(lock_file);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn replaces_content_and_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("doc.json");
        write_file_locked(&path, b"{\"v\":1}").unwrap();
        write_file_locked(&path, b"{\"v\":2}").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\":2}");
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp-"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn missing_directory_fails_without_side_effects() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nope").join("doc.json");
        assert!(write_file_locked(&path, b"x").is_err());
        assert!(!path.exists());
    }
}
