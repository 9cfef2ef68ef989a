//! LLVM backend builds.
//!
//! The runtime's AOT compilers link against a bundled LLVM; this driver
//! runs the source tree's `build.mk` against a per-variant build and
//! install directory. Builds are stamp-gated so dependent drivers (the
//! iOS cross builds) can request them repeatedly for free.

use std::env;
use std::path::PathBuf;

use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::options::BaseOpts;
use crate::runtime;
use crate::step::BuildStep;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlvmTarget {
    Llvm32,
    Llvm64,
    Llvmwin32,
    Llvmwin64,
}

impl LlvmTarget {
    pub const ALL: [LlvmTarget; 4] = [
        LlvmTarget::Llvm32,
        LlvmTarget::Llvm64,
        LlvmTarget::Llvmwin32,
        LlvmTarget::Llvmwin64,
    ];

    pub fn lookup(name: &str) -> Result<Self> {
        match name {
            "llvm32" => Ok(LlvmTarget::Llvm32),
            "llvm64" => Ok(LlvmTarget::Llvm64),
            "llvmwin32" => Ok(LlvmTarget::Llvmwin32),
            "llvmwin64" => Ok(LlvmTarget::Llvmwin64),
            _ => Err(BuildError::UnknownTarget {
                family: "llvm",
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LlvmTarget::Llvm32 => "llvm32",
            LlvmTarget::Llvm64 => "llvm64",
            LlvmTarget::Llvmwin32 => "llvmwin32",
            LlvmTarget::Llvmwin64 => "llvmwin64",
        }
    }

    fn is_32_bit(&self) -> bool {
        matches!(self, LlvmTarget::Llvm32 | LlvmTarget::Llvmwin32)
    }

    /// `(arch, toolchain-file stem)` for the MinGW cross variants.
    fn mxe(&self) -> Option<(&'static str, &'static str)> {
        match self {
            LlvmTarget::Llvmwin32 => Some(("i686", "mxe-Win32")),
            LlvmTarget::Llvmwin64 => Some(("x86_64", "mxe-Win64")),
            _ => None,
        }
    }
}

fn stamp_file(opts: &BaseOpts, target: LlvmTarget) -> PathBuf {
    opts.configure_dir
        .join(format!(".stamp-{}-make", target.name()))
}

fn build_dir(opts: &BaseOpts, target: LlvmTarget) -> PathBuf {
    opts.configure_dir.join(format!("llvm-{}", target.name()))
}

fn install_dir(opts: &BaseOpts, target: LlvmTarget) -> PathBuf {
    opts.install_dir.join(format!("llvm-{}", target.name()))
}

fn cmake_args(opts: &BaseOpts, target: LlvmTarget) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let source_root = &opts.runtime_source_root;

    if let Some((arch, mxe)) = target.mxe() {
        let modules_dir = source_root.join("external/llvm-project/llvm/cmake/modules");
        args.push("-DCMAKE_EXE_LINKER_FLAGS=\"-static\"".to_string());
        args.push(format!(
            "-DCROSS_TOOLCHAIN_FLAGS_NATIVE=-DCMAKE_TOOLCHAIN_FILE={}",
            modules_dir.join("NATIVE.cmake").display()
        ));
        args.push(format!(
            "-DCMAKE_TOOLCHAIN_FILE={}",
            modules_dir.join(format!("{}.cmake", mxe)).display()
        ));
        args.push("-DLLVM_ENABLE_THREADS=Off".to_string());
        args.push("-DLLVM_BUILD_EXECUTION_ENGINE=Off".to_string());

        if env::consts::OS == "macos" {
            // Homebrew MXE may carry a separate mingw zlib prefix.
            let mut mingw_zlib_prefix = opts.mxe_prefix.join("opt/mingw-zlib/usr");
            if !mingw_zlib_prefix.is_dir() {
                mingw_zlib_prefix = opts.mxe_prefix.clone();
            }
            let mingw_root = mingw_zlib_prefix.join(format!("{}-w64-mingw32", arch));
            args.push(format!("-DZLIB_ROOT={}", mingw_root.display()));
            args.push(format!(
                "-DZLIB_LIBRARY={}",
                mingw_root.join("lib/libz.a").display()
            ));
            args.push(format!(
                "-DZLIB_INCLUDE_DIR={}",
                mingw_root.join("include").display()
            ));
        }

        // The toolchain file template ships with the source tree and needs
        // the MXE path substituted in.
        fsutil::replace_in_new_file(
            &source_root.join(format!("sdks/builds/{}.cmake.in", mxe)),
            "@MXE_PATH@",
            &opts.mxe_prefix.display().to_string(),
            &modules_dir.join(format!("{}.cmake", mxe)),
        )?;
    }

    if target.is_32_bit() {
        args.push("-DLLVM_BUILD_32_BITS=On".to_string());
    }
    Ok(args)
}

/// Builds one LLVM variant, skipping entirely when its stamp exists.
pub fn make(opts: &BaseOpts, target: LlvmTarget) -> Result<()> {
    let stamp = stamp_file(opts, target);
    if stamp.is_file() {
        return Ok(());
    }

    let build_dir = build_dir(opts, target);
    let install_dir = install_dir(opts, target);
    fsutil::mkdir_p(&build_dir)?;
    fsutil::mkdir_p(&install_dir)?;

    let cmake_args = cmake_args(opts, target)?;

    if fsutil::find_executable("cmake").is_none() {
        println!("WARNING: Cannot find CMake. Required by the llvm Makefile.");
    }

    // The job count must be explicit: build.mk re-invokes make with '-j'
    // and inherits the count from this invocation.
    let mut make_args = runtime::make_default_args(opts);
    make_args.extend([
        "-C".to_string(),
        opts.runtime_source_root.join("llvm").display().to_string(),
        "-f".to_string(),
        "build.mk".to_string(),
        "install-llvm".to_string(),
        format!("LLVM_BUILD={}", build_dir.display()),
        format!("LLVM_PREFIX={}", install_dir.display()),
        format!("LLVM_CMAKE_ARGS={}", cmake_args.join(" ")),
    ]);

    BuildStep::new("make", "make").args(make_args).run()?;
    fsutil::touch(&stamp)
}

pub fn clean(opts: &BaseOpts, target: LlvmTarget) -> Result<()> {
    fsutil::rm_rf([stamp_file(opts, target)])?;

    let mut make_args = runtime::make_default_args(opts);
    make_args.extend([
        "-C".to_string(),
        opts.runtime_source_root.join("llvm").display().to_string(),
        "-f".to_string(),
        "build.mk".to_string(),
        "clean-llvm".to_string(),
        format!("LLVM_BUILD={}", build_dir(opts, target).display()),
        format!("LLVM_PREFIX={}", install_dir(opts, target).display()),
    ]);

    BuildStep::new("make clean", "make").args(make_args).run()
}
