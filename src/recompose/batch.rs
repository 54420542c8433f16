use std::ffi::OsStr;
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use super::{Recompositor, Summary};
use crate::error::{Error, Result};

/// Suffix appended to the stem of every recomposed file.
pub const RESIZED_SUFFIX: &str = "_resized";

/// Destination used when none is given: `<stem>_resized.gif` beside the source.
pub fn resized_path(source: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(OsStr::to_str)
        .unwrap_or("out");
    source.with_file_name(format!("{stem}{RESIZED_SUFFIX}.gif"))
}

/// One source file and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Work {
    /// Position in the sorted worklist, from 0
    pub id: usize,
    pub source: PathBuf,
    pub dest: PathBuf,
}

/// Per-file outcomes of a batch.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub done: Vec<Summary>,
    pub failed: Vec<(PathBuf, Error)>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Recomposes every GIF below a directory.
#[derive(Debug)]
pub struct Batch<'a> {
    /// Batch root
    path: &'a Path,
    /// Accepted file extensions
    extension: &'a [&'a str],
    recompositor: Recompositor,
    worklist: Vec<Work>,
}

impl<'a> Batch<'a> {
    pub fn new(path: &'a Path, recompositor: Recompositor) -> Batch<'a> {
        Batch {
            path,
            extension: &["gif"],
            recompositor,
            worklist: vec![],
        }
    }

    fn visit_dirs(&self, dir: &Path, cb: &mut dyn FnMut(DirEntry)) -> io::Result<()> {
        for entry in fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.is_dir() {
                self.visit_dirs(&path, cb)?;
            } else {
                cb(entry);
            }
        }
        Ok(())
    }

    fn has_extension(&self, path: &Path) -> bool {
        if let Some(extension) = path.extension().and_then(OsStr::to_str) {
            return self
                .extension
                .iter()
                .any(|x| x.eq_ignore_ascii_case(extension));
        }

        false
    }

    /// Earlier outputs are skipped so reruns do not resize them again.
    fn is_output(path: &Path) -> bool {
        path.file_stem()
            .and_then(OsStr::to_str)
            .is_some_and(|stem| stem.ends_with(RESIZED_SUFFIX))
    }

    /// Collect the worklist in sorted path order.
    pub fn generate_worklist(&mut self) -> Result<&[Work]> {
        let mut sources: Vec<PathBuf> = vec![];
        self.visit_dirs(self.path, &mut |entry| {
            let path = entry.path();
            if !self.has_extension(&path) {
                return;
            }
            if Self::is_output(&path) {
                warn!(path = %path.display(), "skipping previous output");
                return;
            }
            sources.push(path);
        })
        .map_err(|err| Error::io(self.path, err))?;
        sources.sort();

        self.worklist = sources
            .into_iter()
            .enumerate()
            .map(|(id, source)| Work {
                id,
                dest: resized_path(&source),
                source,
            })
            .collect();
        Ok(&self.worklist)
    }

    /// Run every queued work item; `progress` sees each item as it finishes.
    pub fn run(&self, mut progress: impl FnMut(&Work, &Result<Summary>)) -> BatchReport {
        let mut report = BatchReport::default();
        for work in &self.worklist {
            let result = self.recompositor.run(&work.source, &work.dest);
            progress(work, &result);
            match result {
                Ok(summary) => {
                    info!(
                        id = work.id,
                        source = %work.source.display(),
                        frames = summary.frames,
                        "recomposed"
                    );
                    report.done.push(summary);
                }
                Err(err) => {
                    warn!(
                        id = work.id,
                        source = %work.source.display(),
                        error = %err,
                        "recompose failed"
                    );
                    report.failed.push((work.source.clone(), err));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recompose::{RecomposeOptions, TargetSize};

    #[test]
    fn resized_path_appends_suffix() {
        assert_eq!(
            resized_path(Path::new("outgifs/rain.gif")),
            PathBuf::from("outgifs/rain_resized.gif")
        );
        assert_eq!(
            resized_path(Path::new("Snow.GIF")),
            PathBuf::from("Snow_resized.gif")
        );
    }

    #[test]
    fn worklist_skips_outputs_and_other_files() {
        let dir = std::env::temp_dir().join(format!("gif-recompose-batch-{}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(dir.join("nested")).unwrap();
        for name in ["b.gif", "a.GIF", "a_resized.gif", "notes.txt", "nested/c.gif"] {
            fs::write(dir.join(name), b"").unwrap();
        }

        let size = TargetSize::new(1, 1).unwrap();
        let recompositor = Recompositor::new(RecomposeOptions::new(size));
        let mut batch = Batch::new(&dir, recompositor);
        let sources: Vec<PathBuf> = batch
            .generate_worklist()
            .unwrap()
            .iter()
            .map(|w| w.source.clone())
            .collect();
        assert_eq!(
            sources,
            vec![dir.join("a.GIF"), dir.join("b.gif"), dir.join("nested/c.gif")]
        );

        // Empty files are not GIFs: every item fails, none stops the batch
        let mut seen = vec![];
        let report = batch.run(|work, _| seen.push(work.id));
        assert_eq!(seen, vec![0, 1, 2]);
        assert_eq!(report.failed.len(), 3);
        assert!(!report.is_success());
        assert!(!dir.join("b_resized.gif").exists());
        fs::remove_dir_all(&dir).unwrap();
    }
}
