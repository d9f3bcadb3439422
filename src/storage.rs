//! Atomic output files.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::crypto::aead::secure_random;
use crate::error::Result;

/// An output file that only appears at its final path after [`commit`](Self::commit).
///
/// Data is written to a temporary sibling created with `create_new`. Committing
/// flushes, syncs and atomically replaces the target. Dropping an uncommitted
/// `AtomicFile` (including on every error path) closes and removes the
/// temporary file, so a failed encrypt or decrypt never leaves partial output.
pub struct AtomicFile {
    path: PathBuf,
    tmp_path: PathBuf,
    file: Option<BufWriter<File>>,
}

impl AtomicFile {
    /// Creates the temporary file next to `path`, creating parent directories
    /// if they don't exist.
    pub fn create(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp_path = random_tmp_path(path)?;

        // securely create temp file (fail if exists)
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&tmp_path)?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            file: Some(BufWriter::new(file)),
        })
    }

    /// Returns the final path of the file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Syncs the data and moves it into place.
    ///
    /// If a crash occurs during commit, either the old or the new file will be
    /// present, never a partial write.
    pub fn commit(mut self) -> Result<()> {
        let Some(writer) = self.file.take() else {
            return Ok(());
        };

        // fsync file
        let synced = writer
            .into_inner()
            .map_err(|e| e.into_error())
            .and_then(|file| file.sync_all());
        if let Err(e) = synced {
            let _ = fs::remove_file(&self.tmp_path);
            return Err(e.into());
        }

        atomic_replace(&self.tmp_path, &self.path)?;

        // fsync directory
        #[cfg(not(target_os = "windows"))]
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                File::open(parent)?.sync_all()?;
            }
        }

        tracing::debug!(path = %self.path.display(), "committed output file");
        Ok(())
    }

    fn writer(&mut self) -> io::Result<&mut BufWriter<File>> {
        self.file
            .as_mut()
            .ok_or_else(|| io::Error::other("output file already committed"))
    }
}

impl Write for AtomicFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer()?.flush()
    }
}

impl Drop for AtomicFile {
    fn drop(&mut self) {
        if let Some(writer) = self.file.take() {
            drop(writer);
            let _ = fs::remove_file(&self.tmp_path);
            tracing::debug!(path = %self.path.display(), "discarded uncommitted output file");
        }
    }
}

/// Generates a unique temporary file path in the same directory.
///
/// Format: `filename.tmp.<randomhex>`
fn random_tmp_path(path: &Path) -> Result<PathBuf> {
    let mut buf = [0u8; 8]; // 64 bit entropy
    secure_random(&mut buf)?;

    let rand_string = buf.iter().map(|b| format!("{:02x}", b)).collect::<String>();

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    let tmp_name = format!("{}.tmp.{}", file_name, rand_string);

    Ok(path.with_file_name(tmp_name))
}

/// Atomically replaces the target file with the temporary file.
///
/// Uses Windows `ReplaceFileW` API with `REPLACEFILE_WRITE_THROUGH` flag
/// when the target exists, and a plain rename otherwise.
#[cfg(target_os = "windows")]
fn atomic_replace(tmp_path: &Path, target: &Path) -> Result<()> {
    use std::ffi::OsStr;
    use std::os::windows::ffi::OsStrExt;
    use windows_sys::Win32::Storage::FileSystem::{REPLACEFILE_WRITE_THROUGH, ReplaceFileW};

    if !target.exists() {
        fs::rename(tmp_path, target)?;
        return Ok(());
    }

    fn to_wide(s: &OsStr) -> Vec<u16> {
        s.encode_wide().chain(std::iter::once(0)).collect()
    }

    let target_w = to_wide(target.as_os_str());
    let tmp_w = to_wide(tmp_path.as_os_str());

    // SAFETY:
    // - Strings are valid UTF-16 and null-terminated
    // - Pointers remain valid during the call
    // - Windows does not retain the pointers after return
    let result = unsafe {
        ReplaceFileW(
            target_w.as_ptr(),
            tmp_w.as_ptr(),
            std::ptr::null(),
            REPLACEFILE_WRITE_THROUGH,
            std::ptr::null(),
            std::ptr::null(),
        )
    };

    if result == 0 {
        let err = io::Error::last_os_error();
        let _ = fs::remove_file(tmp_path);
        return Err(err.into());
    }

    Ok(())
}

/// Atomically replaces the target file with the temporary file.
///
/// On Unix, `rename()` is atomic when both paths are on the same filesystem.
#[cfg(not(target_os = "windows"))]
fn atomic_replace(tmp_path: &Path, target: &Path) -> Result<()> {
    if let Err(e) = fs::rename(tmp_path, target) {
        let _ = fs::remove_file(tmp_path);
        return Err(e.into());
    }
    Ok(())
}
