//! Expanding a `--targets` list of module names or filesystem paths into
//! concrete `target_name -> file_path` entries, ported from `coven.py`'s
//! `expand_targets`/`expand_module_name_or_path`/`expand_module_path`.
//! Rust has no `sys.path`/import-machinery analogue, so name resolution is
//! relative to an explicit search root rather than the running
//! interpreter's module search path.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Resolve every raw target into `name -> Some(path)` (found) or
/// `name -> None` (named but never located), matching the snapshot
/// format's `target_paths` (spec.md §6).
pub fn expand_targets(raw: &[String], search_root: &Path) -> HashMap<String, Option<PathBuf>> {
    let mut out = HashMap::new();
    for target in raw {
        let (name, path) = expand_module_name_or_path(target, search_root);
        out.insert(name, path);
    }
    out
}

/// A single target: either a literal path (file or package directory) or
/// a dotted module name to resolve under `search_root`.
fn expand_module_name_or_path(target: &str, search_root: &Path) -> (String, Option<PathBuf>) {
    let literal = Path::new(target);
    if literal.exists() {
        return (module_name_for_path(literal), expand_module_path(literal));
    }

    let relative = target.replace('.', "/");
    let as_file = search_root.join(format!("{relative}.py"));
    if as_file.is_file() {
        return (target.to_string(), Some(as_file));
    }
    let as_package = search_root.join(&relative).join("__init__.py");
    if as_package.is_file() {
        return (target.to_string(), Some(as_package));
    }

    (target.to_string(), None)
}

/// A literal path target: a directory is a package (its `__init__.py`
/// stands in for the whole package's coverage root), a file is used as-is.
fn expand_module_path(path: &Path) -> Option<PathBuf> {
    if path.is_dir() {
        let init = path.join("__init__.py");
        init.is_file().then_some(init)
    } else {
        Some(path.to_path_buf())
    }
}

fn module_name_for_path(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("<module>")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn a_literal_existing_file_is_used_directly() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("mod.py");
        fs::write(&file, "").unwrap();

        let (name, path) = expand_module_name_or_path(file.to_str().unwrap(), dir.path());
        assert_eq!(name, "mod");
        assert_eq!(path, Some(file));
    }

    #[test]
    fn a_literal_directory_resolves_to_its_init_file() {
        let dir = tempfile::tempdir().unwrap();
        let pkg = dir.path().join("pkg");
        fs::create_dir(&pkg).unwrap();
        fs::write(pkg.join("__init__.py"), "").unwrap();

        let (_, path) = expand_module_name_or_path(pkg.to_str().unwrap(), dir.path());
        assert_eq!(path, Some(pkg.join("__init__.py")));
    }

    #[test]
    fn a_dotted_name_resolves_under_the_search_root() {
        let dir = tempfile::tempdir().unwrap();
        let sub = dir.path().join("pkg");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("mod.py"), "").unwrap();

        let targets = expand_targets(&["pkg.mod".to_string()], dir.path());
        assert_eq!(targets["pkg.mod"], Some(sub.join("mod.py")));
    }

    #[test]
    fn an_unresolvable_target_is_recorded_as_never_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let targets = expand_targets(&["nope.mod".to_string()], dir.path());
        assert_eq!(targets["nope.mod"], None);
    }
}
