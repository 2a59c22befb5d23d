//! Campaign progress persisted as a TOML file.

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use immune_defence_core::{Progress, ProgressStore};
use thiserror::Error;

/// Failures while reading or writing the progress file.
#[derive(Debug, Error)]
pub(crate) enum ProgressFileError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{path} is not a valid progress file")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("failed to encode progress")]
    Encode(#[from] toml::ser::Error),
}

/// Progress store backed by a single TOML file.
///
/// A missing file reads as fresh progress.
#[derive(Clone, Debug)]
pub(crate) struct TomlProgressFile {
    path: PathBuf,
}

impl TomlProgressFile {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl ProgressStore for TomlProgressFile {
    type Error = ProgressFileError;

    fn load_progress(&self) -> Result<Progress, Self::Error> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return Ok(Progress::default())
            }
            Err(source) => {
                return Err(ProgressFileError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        toml::from_str(&text).map_err(|source| ProgressFileError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save_progress(&mut self, progress: &Progress) -> Result<(), Self::Error> {
        let text = toml::to_string(progress)?;
        fs::write(&self.path, text).map_err(|source| ProgressFileError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_file(name: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!(
            "immune-defence-{name}-{}.toml",
            std::process::id()
        ));
        let _ = fs::remove_file(&path);
        path
    }

    #[test]
    fn missing_file_reads_as_fresh_progress() {
        let store = TomlProgressFile::new(scratch_file("missing"));
        assert_eq!(store.load_progress().expect("fresh"), Progress::default());
    }

    #[test]
    fn saved_progress_loads_back() {
        let path = scratch_file("saved");
        let mut store = TomlProgressFile::new(&path);
        let mut progress = Progress::default();
        assert!(progress.record_completion("level_1", Some("level_2")));

        store.save_progress(&progress).expect("writes");
        assert_eq!(store.load_progress().expect("reads"), progress);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_reports_its_path() {
        let path = scratch_file("corrupt");
        fs::write(&path, "completed_levels = 7").expect("writes");

        let error = TomlProgressFile::new(&path)
            .load_progress()
            .expect_err("rejects bad file");
        assert!(matches!(error, ProgressFileError::Parse { .. }));
        assert!(error.to_string().contains("corrupt"));

        let _ = fs::remove_file(path);
    }
}
