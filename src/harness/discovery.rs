//! Finding candidate engine executables.

use std::collections::BTreeSet;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Error reading one of the harness's list files.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("cannot read {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot write {path}: {source}")]
    Write { path: PathBuf, source: io::Error },
}

/// Executables found, plus a warning for everything that was passed over.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Discovered {
    pub engines: BTreeSet<PathBuf>,
    pub warnings: Vec<String>,
}

impl Discovered {
    fn warn(&mut self, message: String) {
        self.warnings.push(message);
    }
}

/// Whether `path` is a regular file the current user may execute.
#[must_use]
pub fn is_executable(path: &Path) -> bool {
    let Ok(meta) = fs::metadata(path) else {
        return false;
    };
    if !meta.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        meta.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("exe"))
    }
}

/// Expand a leading `~` and make the path absolute.
#[must_use]
pub fn normalize_target(raw: &str) -> PathBuf {
    let expanded = match raw.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => std::env::var_os("HOME")
            .map(|home| PathBuf::from(home).join(rest.trim_start_matches('/')))
            .unwrap_or_else(|| PathBuf::from(raw)),
        _ => PathBuf::from(raw),
    };
    if expanded.is_absolute() {
        expanded
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    }
}

/// Executables directly inside `dir` and the names of its subdirectories.
fn scan_dir(dir: &Path) -> io::Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    let mut exes = Vec::new();
    let mut subdirs = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            subdirs.push(path);
        } else if is_executable(&path) {
            exes.push(path);
        }
    }
    Ok((exes, subdirs))
}

/// Collect executables from files and directories, optionally one level of
/// subdirectories deep. Missing targets are skipped with a warning.
#[must_use]
pub fn find_engines(targets: &[String], include_subdirs: bool) -> Discovered {
    let mut found = Discovered::default();
    for raw in targets {
        let target = normalize_target(raw);
        if !target.exists() {
            found.warn(format!("{} does not exist.", target.display()));
            continue;
        }
        if target.is_file() {
            if is_executable(&target) {
                found.engines.insert(target);
            } else {
                found.warn(format!("{} is not executable.", target.display()));
            }
            continue;
        }
        match scan_dir(&target) {
            Ok((exes, subdirs)) => {
                found.engines.extend(exes);
                if include_subdirs {
                    for sub in subdirs {
                        match scan_dir(&sub) {
                            Ok((sub_exes, _)) => found.engines.extend(sub_exes),
                            Err(err) => found.warn(format!("cannot scan {}: {err}", sub.display())),
                        }
                    }
                }
            }
            Err(err) => found.warn(format!("cannot scan {}: {err}", target.display())),
        }
    }
    found
}

fn read_lines(path: &Path) -> Result<Vec<String>, DiscoveryError> {
    let text = fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// Read an engine-list file: one absolute executable path per line.
pub fn read_engine_list(path: &Path) -> Result<Discovered, DiscoveryError> {
    let mut found = Discovered::default();
    for line in read_lines(path)? {
        let candidate = PathBuf::from(&line);
        if !candidate.is_absolute() {
            found.warn(format!("{line}: not an absolute path, skipping"));
        } else if !candidate.exists() {
            found.warn(format!("{line}: does not exist, skipping"));
        } else if !is_executable(&candidate) {
            found.warn(format!("{line}: not executable, skipping"));
        } else {
            found.engines.insert(candidate);
        }
    }
    Ok(found)
}

/// Paths or bare names of programs and folders to leave out.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExcludeList {
    entries: Vec<String>,
}

impl ExcludeList {
    pub fn from_file(path: &Path) -> Result<Self, DiscoveryError> {
        Ok(Self::from_entries(read_lines(path)?))
    }

    #[must_use]
    pub fn from_entries(entries: Vec<String>) -> Self {
        ExcludeList { entries }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Matches the full path, the file name, or the name of any folder on
    /// the way to it.
    #[must_use]
    pub fn excludes(&self, engine: &Path) -> bool {
        self.entries.iter().any(|entry| {
            let entry_path = Path::new(entry);
            if entry_path.is_absolute() {
                engine.starts_with(entry_path)
            } else {
                engine
                    .components()
                    .any(|c| c.as_os_str() == entry_path.as_os_str())
            }
        })
    }

    /// Drop excluded engines.
    pub fn apply(&self, engines: &mut BTreeSet<PathBuf>) {
        engines.retain(|engine| !self.excludes(engine));
    }
}

/// Engines that refused to die in earlier runs.
pub fn read_blacklist(path: &Path) -> Result<ExcludeList, DiscoveryError> {
    if !path.exists() {
        return Ok(ExcludeList::default());
    }
    ExcludeList::from_file(path)
}

/// Record an engine in the blacklist file, creating it if needed.
pub fn append_blacklist(path: &Path, engine: &Path) -> Result<(), DiscoveryError> {
    let write_err = |source| DiscoveryError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(write_err)?;
    writeln!(file, "{}", engine.display()).map_err(write_err)
}
