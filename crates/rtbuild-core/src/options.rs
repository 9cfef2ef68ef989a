//! Immutable option records describing a build run.
//!
//! Options are constructed once from CLI input (plus environment-variable
//! fallbacks resolved at construction time) and then threaded as read-only
//! parameters through every resolver and planner call. Nothing in this
//! module mutates after construction; per-target state never leaks between
//! loop iterations.

use std::path::{Path, PathBuf};

/// Build configuration, mirroring the `--configuration` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Configuration {
    Release,
    Debug,
}

impl Configuration {
    pub fn as_str(&self) -> &'static str {
        match self {
            Configuration::Release => "release",
            Configuration::Debug => "debug",
        }
    }
}

/// Options shared by every driver: output locations, the runtime source
/// tree, and `make` verbosity/parallelism.
///
/// Paths are absolutized by the CLI before construction since build steps
/// run with per-step working directories.
#[derive(Debug, Clone)]
pub struct BaseOpts {
    pub verbose_make: bool,
    /// Job count forwarded to `make -j<N>`.
    pub jobs: u32,
    pub configure_dir: PathBuf,
    pub install_dir: PathBuf,
    pub runtime_source_root: PathBuf,
    /// Prefix of the MinGW cross toolchain used for windows targets.
    pub mxe_prefix: PathBuf,
}

/// Options for runtime builds (everything except the class-library and
/// LLVM drivers).
#[derive(Debug, Clone)]
pub struct RuntimeOpts {
    pub base: BaseOpts,
    pub configuration: Configuration,
    pub enable_cxx: bool,
    pub strip_libs: bool,
    /// Compiler cache command, captured from `$CCACHE` at startup. When
    /// set it is prepended to CC/CXX/CPP/CXXCPP, never replacing them.
    pub ccache: Option<String>,
}

impl RuntimeOpts {
    pub fn release(&self) -> bool {
        self.configuration == Configuration::Release
    }

    /// `<product>-<target>-<configuration>`, the slug used for build,
    /// install, and cache paths alike.
    pub fn build_slug(&self, product: &str, target: &str) -> String {
        format!("{}-{}-{}", product, target, self.configuration.as_str())
    }

    pub fn build_dir(&self, product: &str, target: &str) -> PathBuf {
        self.base.configure_dir.join(self.build_slug(product, target))
    }

    pub fn product_install_dir(&self, product: &str, target: &str) -> PathBuf {
        self.base.install_dir.join(self.build_slug(product, target))
    }

    pub fn cache_file(&self, product: &str, target: &str) -> PathBuf {
        self.base
            .configure_dir
            .join(format!("{}.config.cache", self.build_slug(product, target)))
    }
}

/// Android-specific options. The SDK root hosts both the NDK
/// (`<sdk>/ndk/<version>`) and the bundled CMake (`<sdk>/cmake/<version>`).
#[derive(Debug, Clone)]
pub struct AndroidOpts {
    pub runtime: RuntimeOpts,
    pub sdk_root: PathBuf,
    pub ndk_version: String,
    /// Requested API level; clamped up to the per-target minimum during
    /// resolution.
    pub api_version: u32,
    pub cmake_version: String,
}

impl AndroidOpts {
    pub fn ndk_root(&self) -> PathBuf {
        self.sdk_root.join("ndk").join(&self.ndk_version)
    }

    pub fn cmake_dir(&self) -> PathBuf {
        self.sdk_root.join("cmake").join(&self.cmake_version)
    }

    pub fn sdkmanager(&self) -> PathBuf {
        self.sdk_root.join("cmdline-tools/latest/bin/sdkmanager")
    }
}

/// Desktop-specific options.
#[derive(Debug, Clone)]
pub struct DesktopOpts {
    pub runtime: RuntimeOpts,
    pub with_llvm: bool,
    /// osxcross toolchain root, captured from `$OSXCROSS_ROOT`. Required
    /// when cross-compiling to macOS.
    pub osxcross_root: Option<PathBuf>,
    /// Explicit osxcross SDK suffix, captured from `$OSXCROSS_SDK`.
    pub osxcross_sdk: Option<String>,
}

/// iOS-specific options.
#[derive(Debug, Clone)]
pub struct IosOpts {
    pub runtime: RuntimeOpts,
    pub ios_toolchain_path: PathBuf,
    /// iOS SDK sysroot; auto-detected through `xcrun` on macOS hosts when
    /// absent.
    pub ios_sdk_path: Option<PathBuf>,
    pub ios_version_min: String,
    pub osx_toolchain_path: PathBuf,
    pub osx_sdk_path: Option<PathBuf>,
    /// Triple ABI suffix of the osxcross toolchain binaries.
    pub osx_triple_abi: String,
    /// libclang override, captured from `$LIBCLANG_PATH`.
    pub libclang_path: Option<PathBuf>,
}

/// Options for the class-library (BCL) driver.
#[derive(Debug, Clone)]
pub struct BclOpts {
    pub base: BaseOpts,
    /// Also build the test profiles.
    pub tests: bool,
    /// Strip `*.pdb` debug files from the installed profiles.
    pub remove_pdb: bool,
}

/// Returns `path` if it names a directory, otherwise a configuration error.
pub fn require_dir(path: &Path, what: &str) -> crate::error::Result<()> {
    if !path.is_dir() {
        return Err(crate::error::BuildError::Config(format!(
            "{} not found: {}",
            what,
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runtime_opts() -> RuntimeOpts {
        RuntimeOpts {
            base: BaseOpts {
                verbose_make: false,
                jobs: 1,
                configure_dir: PathBuf::from("/tmp/configs"),
                install_dir: PathBuf::from("/tmp/installs"),
                runtime_source_root: PathBuf::from("/tmp/src"),
                mxe_prefix: PathBuf::from("/usr"),
            },
            configuration: Configuration::Release,
            enable_cxx: false,
            strip_libs: true,
            ccache: None,
        }
    }

    #[test]
    fn build_slug_joins_product_target_configuration() {
        let opts = runtime_opts();
        assert_eq!(opts.build_slug("android", "x86"), "android-x86-release");
        assert_eq!(
            opts.build_dir("android", "x86"),
            PathBuf::from("/tmp/configs/android-x86-release")
        );
        assert_eq!(
            opts.cache_file("android", "x86"),
            PathBuf::from("/tmp/configs/android-x86-release.config.cache")
        );
    }
}
