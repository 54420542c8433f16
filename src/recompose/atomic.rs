use std::ffi::{OsStr, OsString};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};

static SEQUENCE: AtomicUsize = AtomicUsize::new(0);

/// Temporary sibling of the destination; removed on drop unless committed.
struct TempFile {
    path: PathBuf,
    committed: bool,
}

impl TempFile {
    fn beside(dest: &Path, file_name: &OsStr) -> TempFile {
        let mut name = OsString::from(".");
        name.push(file_name);
        name.push(format!(
            ".{}.{}.tmp",
            std::process::id(),
            SEQUENCE.fetch_add(1, Ordering::Relaxed)
        ));
        TempFile {
            path: dest.with_file_name(name),
            committed: false,
        }
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if !self.committed {
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Write `dest` through `write` so readers see either the old file or the
/// complete new one, never a partial write.
pub fn write_atomic<F>(dest: &Path, write: F) -> Result<()>
where
    F: FnOnce(&mut BufWriter<File>) -> Result<()>,
{
    // A root or `..` would otherwise get a temp file and rename with no name
    let file_name = dest.file_name().ok_or_else(|| {
        Error::io(
            dest,
            io::Error::new(io::ErrorKind::InvalidInput, "destination has no file name"),
        )
    })?;
    let mut temp = TempFile::beside(dest, file_name);
    let file = File::create(&temp.path).map_err(|err| Error::io(&temp.path, err))?;
    let mut writer = BufWriter::new(file);

    write(&mut writer)?;

    writer.flush().map_err(|err| Error::io(&temp.path, err))?;
    let file = writer
        .into_inner()
        .map_err(|err| Error::io(&temp.path, err.into_error()))?;
    file.sync_all().map_err(|err| Error::io(&temp.path, err))?;
    drop(file);

    fs::rename(&temp.path, dest).map_err(|err| Error::io(dest, err))?;
    temp.committed = true;
    Ok(())
}
