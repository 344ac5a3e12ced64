//! Loading Go sources into a single translation unit.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use walkdir::WalkDir;

use crate::ast::File;
use crate::error::CoreError;
use crate::parser::parse_file;

/// One or more `main`-package files merged into a single `File`.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    pub file: File,
    /// Files that contributed declarations, in merge order.
    pub sources: Vec<PathBuf>,
}

/// Parse a file, or merge every `main`-package `.go` file directly inside a
/// directory. Directory entries are merged in sorted path order.
pub fn load_unit(path: impl AsRef<Path>) -> Result<SourceUnit, CoreError> {
    let path = path.as_ref();
    let metadata = fs::metadata(path).map_err(|source| CoreError::UnreadableInput {
        path: path.to_path_buf(),
        source,
    })?;

    if !metadata.is_dir() {
        let file = parse_path(path)?;
        return Ok(SourceUnit {
            file,
            sources: vec![path.to_path_buf()],
        });
    }

    let mut candidates: Vec<PathBuf> = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|p| is_package_source(p))
        .collect();
    candidates.sort();

    if candidates.is_empty() {
        return Err(CoreError::NoSources(path.to_path_buf()));
    }

    let mut merged = File {
        package: "main".to_string(),
        decls: Vec::new(),
    };
    let mut sources = Vec::new();
    for candidate in candidates {
        let file = parse_path(&candidate)?;
        if file.package != "main" {
            debug!(
                "skipping {} (package {})",
                candidate.display(),
                file.package
            );
            continue;
        }
        merged.decls.extend(file.decls);
        sources.push(candidate);
    }

    if sources.is_empty() {
        return Err(CoreError::MissingMainPackage(path.to_path_buf()));
    }
    info!(
        "merged {} file(s) from {} into one unit",
        sources.len(),
        path.display()
    );
    Ok(SourceUnit {
        file: merged,
        sources,
    })
}

fn is_package_source(path: &Path) -> bool {
    path.is_file()
        && path.extension().is_some_and(|ext| ext == "go")
        && !path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with("_test.go"))
}

fn parse_path(path: &Path) -> Result<File, CoreError> {
    let source = fs::read_to_string(path).map_err(|source| CoreError::UnreadableInput {
        path: path.to_path_buf(),
        source,
    })?;
    parse_file(&source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Decl;

    fn func_names(file: &File) -> Vec<&str> {
        file.decls
            .iter()
            .filter_map(|decl| match decl {
                Decl::Func(func) => Some(func.name.as_str()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn merges_directory_in_sorted_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("b_worker.go"), "package main\nfunc work() {}\n").unwrap();
        fs::write(dir.path().join("a_main.go"), "package main\nfunc main() {}\n").unwrap();
        fs::write(dir.path().join("main_test.go"), "package main\nfunc helper() {}\n").unwrap();
        fs::write(dir.path().join("lib.go"), "package util\nfunc util() {}\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "not go").unwrap();

        let unit = load_unit(dir.path()).expect("load");
        assert_eq!(func_names(&unit.file), vec!["main", "work"]);
        assert_eq!(unit.sources.len(), 2);
        assert!(unit.sources[0].ends_with("a_main.go"));
    }

    #[test]
    fn loads_a_single_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("prog.go");
        fs::write(&path, "package main\nfunc main() {}\n").unwrap();
        let unit = load_unit(&path).expect("load");
        assert_eq!(func_names(&unit.file), vec!["main"]);
    }

    #[test]
    fn reports_directories_without_main() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_unit(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::NoSources(_)));

        fs::write(dir.path().join("lib.go"), "package util\n").unwrap();
        let err = load_unit(dir.path()).unwrap_err();
        assert!(matches!(err, CoreError::MissingMainPackage(_)));
    }

    #[test]
    fn reports_unreadable_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = load_unit(dir.path().join("missing.go")).unwrap_err();
        assert!(matches!(err, CoreError::UnreadableInput { .. }));
    }
}
