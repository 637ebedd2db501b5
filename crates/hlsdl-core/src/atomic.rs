//! Write-to-temp, flush, rename primitive (C2) used everywhere persistence matters:
//! the bitfield state file, decrypted segment files in place, and the concat manifest.

use std::fs;
use std::io;
use std::path::Path;

fn temp_path(path: &Path) -> std::path::PathBuf {
    let mut s = path.as_os_str().to_owned();
    s.push(".tmp");
    std::path::PathBuf::from(s)
}

/// Write `bytes` to `path` atomically: write to `path.tmp`, flush, fsync, rename.
///
/// On any error the partial temp file is removed and `path` is left untouched.
pub fn write_bytes(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = temp_path(path);
    let result = (|| -> io::Result<()> {
        let file = fs::File::create(&tmp)?;
        {
            use io::Write;
            let mut file = &file;
            file.write_all(bytes)?;
            file.flush()?;
        }
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        Ok(())
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

/// Write the output of `writer` (a closure that streams into an [`io::Write`])
/// to `path` atomically, following the same write-to-temp-then-rename contract
/// as [`write_bytes`].
///
/// Generic over the writer's success value `T` and error type `E` so callers
/// needing a richer error (e.g. a classified transfer error rather than bare
/// `io::Error`) can still go through this single rename primitive — any
/// `io::Error` arising from the temp-file plumbing itself converts via `E`'s
/// `From<io::Error>`. A writer that returns `Err` aborts the commit: the temp
/// file is removed and `path` is left untouched, exactly as on an I/O error.
pub fn write_stream<F, T, E>(path: &Path, writer: F) -> Result<T, E>
where
    F: FnOnce(&mut fs::File) -> Result<T, E>,
    E: From<io::Error>,
{
    let tmp = temp_path(path);
    let result = (|| -> Result<T, E> {
        let mut file = fs::File::create(&tmp)?;
        let value = writer(&mut file)?;
        {
            use io::Write;
            file.flush()?;
        }
        file.sync_all()?;
        drop(file);
        fs::rename(&tmp, path)?;
        Ok(value)
    })();

    if result.is_err() {
        let _ = fs::remove_file(&tmp);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn write_bytes_then_read_yields_same_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        write_bytes(&path, b"hello world").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"hello world");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn write_bytes_overwrites_existing_file_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.bin");
        write_bytes(&path, b"first").unwrap();
        write_bytes(&path, b"second, and longer").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"second, and longer");
    }

    #[test]
    fn write_stream_flushes_and_renames() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ts");
        write_stream(&path, |f| f.write_all(b"segment-bytes")).unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"segment-bytes");
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn failed_write_stream_leaves_original_untouched_and_removes_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.ts");
        write_bytes(&path, b"original").unwrap();

        let result = write_stream(&path, |_f| {
            Err(io::Error::new(io::ErrorKind::Other, "boom"))
        });
        assert!(result.is_err());
        assert_eq!(fs::read(&path).unwrap(), b"original");
        assert!(!temp_path(&path).exists());
    }
}
