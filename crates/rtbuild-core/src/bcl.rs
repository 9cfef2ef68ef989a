//! Class library (BCL) driver.
//!
//! The class library is configured and built once for all products
//! (stamp-gated), then the per-product profiles are built and copied into
//! `<install_dir>/<product>-bcl`. Re-running `make` is idempotent: the
//! shared configure/make steps are skipped when their stamps exist.

use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::msbuild;
use crate::options::BclOpts;
use crate::runtime;
use crate::step::BuildStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BclProduct {
    Desktop,
    DesktopWin32,
    Android,
    Ios,
    Wasm,
}

impl BclProduct {
    pub const ALL: [BclProduct; 5] = [
        BclProduct::Desktop,
        BclProduct::DesktopWin32,
        BclProduct::Android,
        BclProduct::Ios,
        BclProduct::Wasm,
    ];

    pub fn lookup(name: &str) -> Result<Self> {
        match name {
            "desktop" => Ok(BclProduct::Desktop),
            "desktop-win32" => Ok(BclProduct::DesktopWin32),
            "android" => Ok(BclProduct::Android),
            "ios" => Ok(BclProduct::Ios),
            "wasm" => Ok(BclProduct::Wasm),
            _ => Err(BuildError::UnknownTarget {
                family: "bcl",
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BclProduct::Desktop => "desktop",
            BclProduct::DesktopWin32 => "desktop-win32",
            BclProduct::Android => "android",
            BclProduct::Ios => "ios",
            BclProduct::Wasm => "wasm",
        }
    }

    pub fn profiles(&self) -> &'static [&'static str] {
        match self {
            BclProduct::Desktop | BclProduct::DesktopWin32 => &["net_4_x"],
            BclProduct::Android => &["monodroid", "monodroid_tools"],
            BclProduct::Ios => &["monotouch", "monotouch_runtime", "monotouch_tools"],
            BclProduct::Wasm => &["wasm", "wasm_tools"],
        }
    }

    pub fn test_profiles(&self) -> &'static [&'static str] {
        match self {
            BclProduct::Desktop | BclProduct::DesktopWin32 => &[],
            BclProduct::Android => &["monodroid", "monodroid_tools"],
            BclProduct::Ios => &["monotouch"],
            BclProduct::Wasm => &["wasm"],
        }
    }

    /// Profile output directory name; the win32 build writes its profiles
    /// with a platform suffix.
    fn profile_dir(&self, profile: &str) -> String {
        match self {
            BclProduct::DesktopWin32 => format!("{}-win32", profile),
            _ => profile.to_string(),
        }
    }
}

fn bcl_build_dir(opts: &BclOpts) -> PathBuf {
    opts.base.configure_dir.join("bcl")
}

fn product_install_dir(opts: &BclOpts, product: BclProduct) -> PathBuf {
    opts.base.install_dir.join(format!("{}-bcl", product.name()))
}

fn configure_stamp(opts: &BclOpts) -> PathBuf {
    opts.base.configure_dir.join(".stamp-bcl-configure")
}

fn make_stamp(opts: &BclOpts) -> PathBuf {
    opts.base.configure_dir.join(".stamp-bcl-make")
}

/// Configures the class library build once; a stamp file makes re-runs
/// no-ops.
pub fn configure(opts: &BclOpts) -> Result<()> {
    let stamp = configure_stamp(opts);
    if stamp.is_file() {
        return Ok(());
    }

    let mut steps = Vec::new();
    if runtime::needs_autogen(&opts.base) {
        steps.push(runtime::autogen_step(&opts.base));
    }

    let configure_flags = [
        "--disable-boehm",
        "--disable-btls-lib",
        "--disable-nls",
        "--disable-support-build",
        "--with-mcs-docs=no",
    ];
    steps.push(
        BuildStep::new("configure bcl", opts.base.runtime_source_root.join("configure"))
            .args(configure_flags.iter().copied())
            .cwd(bcl_build_dir(opts)),
    );

    crate::step::run_steps(&steps)?;
    fsutil::mkdir_p(&opts.base.configure_dir)?;
    fsutil::touch(&stamp)
}

/// Builds the class library runtime once, stamp-gated like configure.
fn make_bcl(opts: &BclOpts) -> Result<()> {
    let stamp = make_stamp(opts);
    if stamp.is_file() {
        return Ok(());
    }

    let mut make_args = runtime::make_default_args(&opts.base);
    make_args.extend([
        "-C".to_string(),
        bcl_build_dir(opts).display().to_string(),
        "-C".to_string(),
        "mono".to_string(),
    ]);
    BuildStep::new("make bcl", "make").args(make_args).run()?;
    fsutil::touch(&stamp)
}

fn build_bcl(opts: &BclOpts) -> Result<()> {
    configure(opts)?;
    make_bcl(opts)
}

/// Builds one product's profiles and installs them.
pub fn make_product(opts: &BclOpts, product: BclProduct) -> Result<()> {
    build_bcl(opts)?;

    let build_dir = bcl_build_dir(opts);
    let install_dir = product_install_dir(opts, product);
    fsutil::mkdir_p(&install_dir)?;

    let mut make_args = runtime::make_default_args(&opts.base);
    make_args.extend([
        "-C".to_string(),
        build_dir.display().to_string(),
        "-C".to_string(),
        "runtime".to_string(),
        "all-mcs".to_string(),
        format!("build_profiles={}", product.profiles().join(" ")),
    ]);
    if product == BclProduct::DesktopWin32 {
        make_args.push("PROFILE_PLATFORM=win32".to_string());
    }
    BuildStep::new("make profiles", "make").args(make_args).run()?;

    if opts.tests && !product.test_profiles().is_empty() {
        let mut test_args = runtime::make_default_args(&opts.base);
        test_args.extend([
            "-C".to_string(),
            build_dir.display().to_string(),
            "-C".to_string(),
            "runtime".to_string(),
            "test".to_string(),
            "xunit-test".to_string(),
            format!("test_profiles={}", product.test_profiles().join(" ")),
        ]);
        BuildStep::new("make tests", "make").args(test_args).run()?;
    }

    // Copy the built profiles to the product install directory.
    let class_lib_dir = opts.base.runtime_source_root.join("mcs/class/lib");
    for profile in product.profiles() {
        let profile_dir = product.profile_dir(profile);
        fsutil::copy_tree(
            &class_lib_dir.join(&profile_dir),
            &install_dir.join(&profile_dir),
        )?;
    }

    prune_unneeded_files(opts, &install_dir)?;

    if product == BclProduct::Wasm {
        build_wasm_framework(opts, &install_dir)?;
    }
    Ok(())
}

/// Removes files the copied profile trees should not ship: hidden files
/// (stamps), pre-built AOT modules, and optionally debug symbol files.
fn prune_unneeded_files(opts: &BclOpts, install_dir: &Path) -> Result<()> {
    let remove_pdb = opts.remove_pdb;
    fsutil::prune_files(install_dir, |name| {
        name.starts_with('.')
            || name.ends_with(".dll.so")
            || name.ends_with(".exe.so")
            || (remove_pdb && name.ends_with(".pdb"))
    })
}

/// Builds the WebAssembly framework solution and installs its assemblies
/// next to the wasm profile.
fn build_wasm_framework(opts: &BclOpts, install_dir: &Path) -> Result<()> {
    let source_root = &opts.base.runtime_source_root;
    let framework_output_dir = source_root.join("sdks/wasm/framework/netstandard2.0");
    let framework_sln = source_root.join("sdks/wasm/framework/src/WebAssembly.Framework.sln");
    let output_dir = install_dir.join("wasm");

    msbuild::build_solution(&framework_sln, "Release", &[])?;

    fsutil::mkdir_p(&output_dir)?;
    let mut suffixes = vec![".dll"];
    if !opts.remove_pdb {
        suffixes.push(".pdb");
    }
    for file in fsutil::files_with_suffixes(&framework_output_dir, &suffixes) {
        let name = file.file_name().expect("listing yields file names");
        std::fs::copy(&file, output_dir.join(name))?;
    }
    Ok(())
}

fn clean_bcl(opts: &BclOpts) -> Result<()> {
    fsutil::rm_rf([
        configure_stamp(opts),
        make_stamp(opts),
        bcl_build_dir(opts),
    ])
}

pub fn clean_product(opts: &BclOpts, product: BclProduct) -> Result<()> {
    clean_bcl(opts)?;
    fsutil::rm_rf([product_install_dir(opts, product)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::BaseOpts;

    fn bcl_opts(dir: &Path) -> BclOpts {
        BclOpts {
            base: BaseOpts {
                verbose_make: false,
                jobs: 1,
                configure_dir: dir.join("cfg"),
                install_dir: dir.join("inst"),
                runtime_source_root: dir.join("src"),
                mxe_prefix: PathBuf::from("/usr"),
            },
            tests: false,
            remove_pdb: true,
        }
    }

    #[test]
    fn product_profile_tables_are_fixed() {
        assert_eq!(BclProduct::Desktop.profiles(), &["net_4_x"]);
        assert_eq!(
            BclProduct::Ios.profiles(),
            &["monotouch", "monotouch_runtime", "monotouch_tools"]
        );
        assert_eq!(BclProduct::Desktop.test_profiles(), &[] as &[&str]);
    }

    #[test]
    fn win32_profiles_get_a_platform_suffix() {
        assert_eq!(BclProduct::DesktopWin32.profile_dir("net_4_x"), "net_4_x-win32");
        assert_eq!(BclProduct::Desktop.profile_dir("net_4_x"), "net_4_x");
    }

    #[test]
    fn existing_stamp_makes_configure_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let opts = bcl_opts(dir.path());
        std::fs::create_dir_all(&opts.base.configure_dir).unwrap();
        fsutil::touch(&configure_stamp(&opts)).unwrap();

        // Would otherwise attempt to run a configure script that does not
        // exist in the fixture tree.
        configure(&opts).unwrap();
    }

    #[test]
    fn clean_product_removes_stamps_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let opts = bcl_opts(dir.path());
        std::fs::create_dir_all(&opts.base.configure_dir).unwrap();
        std::fs::create_dir_all(bcl_build_dir(&opts)).unwrap();
        fsutil::touch(&configure_stamp(&opts)).unwrap();
        fsutil::touch(&make_stamp(&opts)).unwrap();

        clean_product(&opts, BclProduct::Android).unwrap();
        assert!(!configure_stamp(&opts).exists());
        assert!(!bcl_build_dir(&opts).exists());
        clean_product(&opts, BclProduct::Android).unwrap();
    }

    #[test]
    fn prune_drops_hidden_and_aot_files() {
        let dir = tempfile::tempdir().unwrap();
        let opts = bcl_opts(dir.path());
        let install = dir.path().join("inst/android-bcl/monodroid");
        std::fs::create_dir_all(&install).unwrap();
        for name in [
            ".stamp",
            "mscorlib.dll",
            "mscorlib.dll.so",
            "mcs.exe.so",
            "System.pdb",
        ] {
            std::fs::write(install.join(name), b"").unwrap();
        }

        prune_unneeded_files(&opts, &install).unwrap();
        assert!(install.join("mscorlib.dll").exists());
        assert!(!install.join(".stamp").exists());
        assert!(!install.join("mscorlib.dll.so").exists());
        assert!(!install.join("mcs.exe.so").exists());
        assert!(!install.join("System.pdb").exists());
    }
}
