//! The `golden` Odin runtime package shipped next to every translation.

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use walkdir::WalkDir;

use crate::error::CoreError;

/// Environment variable overriding the runtime location.
pub const RUNTIME_ENV: &str = "GOLDEN_RUNTIME";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeFile {
    /// Path relative to the runtime root.
    pub path: PathBuf,
    pub contents: String,
}

pub fn default_runtime_root() -> PathBuf {
    match std::env::var_os(RUNTIME_ENV) {
        Some(path) if !path.is_empty() => PathBuf::from(path),
        _ => PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../runtime"),
    }
}

/// Every `.odin` file under `root`, in path order.
pub fn runtime_files(root: impl AsRef<Path>) -> Result<Vec<RuntimeFile>, CoreError> {
    let root = root.as_ref();
    if !root.is_dir() {
        return Err(CoreError::MissingRuntime(root.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
    {
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "odin") {
            let contents = fs::read_to_string(path)?;
            let relative = path.strip_prefix(root).unwrap_or(path).to_path_buf();
            files.push(RuntimeFile {
                path: relative,
                contents,
            });
        }
    }

    if files.is_empty() {
        return Err(CoreError::MissingRuntime(root.to_path_buf()));
    }
    Ok(files)
}

/// Copy the runtime into `<dest>/golden/`, where the generated
/// `import golden "golden"` finds it. Returns the written paths.
pub fn install_runtime(
    root: impl AsRef<Path>,
    dest: impl AsRef<Path>,
) -> Result<Vec<PathBuf>, CoreError> {
    let target = dest.as_ref().join("golden");
    let mut written = Vec::new();
    for file in runtime_files(root)? {
        let path = target.join(&file.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, file.contents)?;
        debug!("installed runtime file {}", path.display());
        written.push(path);
    }
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shipped_root() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../runtime")
    }

    #[test]
    fn loads_files_from_shipped_root() {
        let files = runtime_files(shipped_root()).expect("runtime should load");
        let paths: Vec<_> = files.iter().map(|f| f.path.clone()).collect();
        assert!(paths.contains(&PathBuf::from("golden.odin")));
        assert!(paths.contains(&PathBuf::from("os").join("golden_os.odin")));
    }

    #[test]
    fn installs_under_golden_directory() {
        let out = tempfile::tempdir().expect("tempdir");
        let written = install_runtime(shipped_root(), out.path()).expect("install");
        assert!(!written.is_empty());
        assert!(out.path().join("golden").join("golden.odin").is_file());
        assert!(out.path().join("golden").join("os").join("golden_os.odin").is_file());
    }

    #[test]
    fn missing_root_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = runtime_files(dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, CoreError::MissingRuntime(_)));

        let err = runtime_files(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::MissingRuntime(_)));
    }
}
