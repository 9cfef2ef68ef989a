//! Filesystem and process helpers shared by the build drivers.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{BuildError, Result};

/// Creates the directory (and parents) if nothing exists at the path yet.
pub fn mkdir_p(path: &Path) -> Result<()> {
    if !path.exists() {
        println!("creating directory: {}", path.display());
        fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Removes files and/or directories recursively. Missing paths are not an
/// error, so removal is idempotent.
pub fn rm_rf<I, P>(paths: I) -> Result<()>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    for path in paths {
        let path = path.as_ref();
        if path.is_file() {
            println!("removing file: {}", path.display());
            fs::remove_file(path)?;
        } else if path.is_dir() {
            println!("removing directory and its contents: {}", path.display());
            fs::remove_dir_all(path)?;
        }
    }
    Ok(())
}

/// Creates an empty file, or updates nothing if it already exists.
/// Stamp files gate one-time steps so re-runs are idempotent.
pub fn touch(path: &Path) -> Result<()> {
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    Ok(())
}

/// Non-recursive listing of files in `dir` whose name ends with one of the
/// given suffixes, in sorted order.
pub fn files_with_suffixes(dir: &Path, suffixes: &[&str]) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let Ok(entries) = fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if suffixes.iter().any(|suffix| name.ends_with(suffix)) {
            files.push(path);
        }
    }
    files.sort();
    files
}

/// Recursively copies a directory tree.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<()> {
    for entry in walkdir::WalkDir::new(src) {
        let entry = entry.map_err(|e| {
            BuildError::Config(format!("cannot walk '{}': {}", src.display(), e))
        })?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Recursively removes files under `dir` matched by `predicate` on the
/// file name. Best-effort: unreadable entries are skipped.
pub fn prune_files(dir: &Path, predicate: impl Fn(&str) -> bool) -> Result<()> {
    for entry in walkdir::WalkDir::new(dir).into_iter().flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if predicate(&name) {
            println!("removing file: {}", entry.path().display());
            fs::remove_file(entry.path())?;
        }
    }
    Ok(())
}

/// Copies `src_file` to `dst_file`, replacing every occurrence of `search`.
pub fn replace_in_new_file(
    src_file: &Path,
    search: &str,
    replace: &str,
    dst_file: &Path,
) -> Result<()> {
    let content = fs::read_to_string(src_file)?;
    fs::write(dst_file, content.replace(search, replace))?;
    Ok(())
}

/// Writes a file and marks it executable.
pub fn write_executable(path: &Path, content: &str) -> Result<()> {
    fs::write(path, content)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_mode(perms.mode() | 0o111);
        fs::set_permissions(path, perms)?;
    }
    Ok(())
}

/// Looks up an executable on `PATH`.
pub fn find_executable(name: &str) -> Option<PathBuf> {
    which::which(name).ok()
}

/// Runs a command and returns its trimmed stdout, or `None` when it cannot
/// be started or exits non-zero.
pub fn capture_stdout(program: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Asks `xcrun` for an SDK sysroot path. Only meaningful on macOS hosts.
pub fn xcrun_find_sdk(sdk_name: &str) -> Option<PathBuf> {
    let path = capture_stdout(
        Path::new("xcrun"),
        &["--sdk", sdk_name, "--show-sdk-path"],
    )?;
    if path.is_empty() || path.starts_with("xcrun: error") {
        return None;
    }
    Some(PathBuf::from(path))
}

/// Asks a clang command for its resource directory.
pub fn clang_resource_dir(clang: &crate::env::ToolCommand) -> Option<String> {
    let mut args: Vec<&str> = clang.args.iter().map(String::as_str).collect();
    args.push("-print-resource-dir");
    capture_stdout(&clang.program, &args)
}

/// Locates the emscripten SDK root from the active emscripten
/// configuration file (`$EM_CONFIG`, defaulting to `~/.emscripten`).
///
/// The configuration file holds simple `KEY = 'value'` assignments. The
/// new style nests emscripten under `BINARYEN_ROOT`; the old style names
/// `EMSCRIPTEN_ROOT` directly, and is probed last since it may linger from
/// a previous activation.
pub fn emsdk_root(em_config_override: Option<&Path>, home: &Path) -> Result<PathBuf> {
    let config_file = match em_config_override {
        Some(path) => path.to_path_buf(),
        None => home.join(".emscripten"),
    };
    if !config_file.exists() {
        return Err(BuildError::Config(format!(
            "Emscripten configuration file '{}' does not exist",
            config_file.display()
        )));
    }

    let content = fs::read_to_string(&config_file)?;
    let mut binaryen_root = None;
    let mut emscripten_root = None;
    for line in content.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim().trim_matches(|c| c == '\'' || c == '"');
        match key.trim() {
            "BINARYEN_ROOT" => binaryen_root = Some(PathBuf::from(value)),
            "EMSCRIPTEN_ROOT" => emscripten_root = Some(PathBuf::from(value)),
            _ => {}
        }
    }

    if let Some(root) = binaryen_root {
        let nested = root.join("emscripten");
        if nested.is_dir() {
            return Ok(nested);
        }
    }
    if let Some(root) = emscripten_root {
        return Ok(root);
    }
    Err(BuildError::Config(format!(
        "'BINARYEN_ROOT' or 'EMSCRIPTEN_ROOT' missing in Emscripten configuration file '{}'",
        config_file.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rm_rf_is_idempotent_on_missing_paths() {
        let dir = tempfile::tempdir().unwrap();
        let victim = dir.path().join("gone");
        fs::create_dir(&victim).unwrap();
        fs::write(victim.join("file"), b"x").unwrap();

        rm_rf([&victim]).unwrap();
        assert!(!victim.exists());
        // Second removal of the same paths must not error.
        rm_rf([&victim]).unwrap();
    }

    #[test]
    fn files_with_suffixes_filters_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["libz.a", "libm.so", "readme.txt", "libc.so"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        let found = files_with_suffixes(dir.path(), &[".a", ".so"]);
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["libc.so", "libm.so", "libz.a"]);
    }

    #[test]
    fn emsdk_root_prefers_nested_binaryen_layout() {
        let dir = tempfile::tempdir().unwrap();
        let binaryen = dir.path().join("binaryen");
        fs::create_dir_all(binaryen.join("emscripten")).unwrap();
        let config = dir.path().join("emscripten-config");
        fs::write(
            &config,
            format!(
                "BINARYEN_ROOT = '{}'\nEMSCRIPTEN_ROOT = '/old/emscripten'\n",
                binaryen.display()
            ),
        )
        .unwrap();

        let root = emsdk_root(Some(&config), dir.path()).unwrap();
        assert_eq!(root, binaryen.join("emscripten"));
    }

    #[test]
    fn emsdk_root_falls_back_to_emscripten_root() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("emscripten-config");
        fs::write(&config, "EMSCRIPTEN_ROOT = '/opt/emscripten'\n").unwrap();
        let root = emsdk_root(Some(&config), dir.path()).unwrap();
        assert_eq!(root, PathBuf::from("/opt/emscripten"));
    }

    #[test]
    fn touch_then_touch_again_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let stamp = dir.path().join(".stamp-bcl-make");
        touch(&stamp).unwrap();
        touch(&stamp).unwrap();
        assert!(stamp.is_file());
    }
}
