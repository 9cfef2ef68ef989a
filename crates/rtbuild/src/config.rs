//! Configuration file support.
//!
//! An optional `rtbuild.toml` persists machine-local defaults (SDK roots,
//! output directories) so they need not be repeated on every invocation.
//! CLI flags always win over the file; the file wins over built-in
//! defaults. The file is searched for in the working directory and then
//! upward to the filesystem root.
//!
//! ```toml
//! [paths]
//! runtime_sources = "/work/runtime"
//! configure_dir = "/work/build/configs"
//! install_dir = "/work/build/installs"
//!
//! [android]
//! sdk_root = "/opt/android-sdk"
//! ndk_version = "23.2.8568313"
//!
//! [ios]
//! version_min = "10.0"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "rtbuild.toml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RtbuildConfig {
    pub paths: PathsConfig,
    pub android: AndroidConfig,
    pub ios: IosConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub runtime_sources: Option<PathBuf>,
    pub configure_dir: Option<PathBuf>,
    pub install_dir: Option<PathBuf>,
    pub mxe_prefix: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AndroidConfig {
    pub sdk_root: Option<PathBuf>,
    pub ndk_version: Option<String>,
    pub api_version: Option<u32>,
    pub cmake_version: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct IosConfig {
    pub toolchain: Option<PathBuf>,
    pub sdk: Option<PathBuf>,
    pub version_min: Option<String>,
    pub osx_toolchain: Option<PathBuf>,
    pub osx_sdk: Option<PathBuf>,
    pub osx_triple_abi: Option<String>,
}

impl RtbuildConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        toml::from_str(&content).with_context(|| format!("invalid {}", path.display()))
    }

    /// Searches for `rtbuild.toml` from `start_dir` upward. Returns the
    /// parsed configuration and where it was found, or `None` when no file
    /// exists anywhere up the tree.
    pub fn find_and_load(start_dir: &Path) -> Result<Option<(Self, PathBuf)>> {
        let mut dir = Some(start_dir);
        while let Some(current) = dir {
            let candidate = current.join(CONFIG_FILE_NAME);
            if candidate.is_file() {
                return Ok(Some((Self::load(&candidate)?, candidate)));
            }
            dir = current.parent();
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(RtbuildConfig::find_and_load(dir.path()).unwrap().is_none());
    }

    #[test]
    fn config_is_found_in_a_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "[paths]\nruntime_sources = \"/work/runtime\"\n\n[android]\napi_version = 21\n",
        )
        .unwrap();
        let nested = dir.path().join("a/b");
        std::fs::create_dir_all(&nested).unwrap();

        let (config, path) = RtbuildConfig::find_and_load(&nested).unwrap().unwrap();
        assert_eq!(path, dir.path().join(CONFIG_FILE_NAME));
        assert_eq!(
            config.paths.runtime_sources,
            Some(PathBuf::from("/work/runtime"))
        );
        assert_eq!(config.android.api_version, Some(21));
        assert_eq!(config.ios.version_min, None);
    }

    #[test]
    fn unknown_sections_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[future]\nflag = true\n").unwrap();
        assert!(RtbuildConfig::load(&path).is_ok());
    }
}
