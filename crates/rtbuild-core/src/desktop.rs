//! Desktop build driver: native builds plus MinGW (windows) and osxcross
//! (macOS) cross builds.

use std::env;
use std::path::{Path, PathBuf};

use crate::env::{ResolvedEnvironment, Tool, ToolCommand};
use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::options::DesktopOpts;
use crate::runtime;
use crate::step::{BuildStep, run_steps};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopPlatform {
    Linux,
    Windows,
    Osx,
}

impl DesktopPlatform {
    pub fn name(&self) -> &'static str {
        match self {
            DesktopPlatform::Linux => "linux",
            DesktopPlatform::Windows => "windows",
            DesktopPlatform::Osx => "osx",
        }
    }

    pub fn product(&self) -> &'static str {
        match self {
            DesktopPlatform::Linux => "desktop-linux",
            DesktopPlatform::Windows => "desktop-windows",
            DesktopPlatform::Osx => "desktop-osx",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DesktopTarget {
    I686,
    X86_64,
    Arm64,
}

impl DesktopTarget {
    pub fn name(&self) -> &'static str {
        match self {
            DesktopTarget::I686 => "i686",
            DesktopTarget::X86_64 => "x86_64",
            DesktopTarget::Arm64 => "arm64",
        }
    }

    fn arch(&self, platform: DesktopPlatform) -> &'static str {
        match (self, platform) {
            (DesktopTarget::Arm64, DesktopPlatform::Linux) => "aarch64",
            (DesktopTarget::Arm64, _) => "arm64",
            (DesktopTarget::I686, _) => "i686",
            (DesktopTarget::X86_64, _) => "x86_64",
        }
    }

    /// LLVM build variant for `--with-llvm`.
    pub fn llvm_variant(&self) -> &'static str {
        match self {
            DesktopTarget::I686 => "llvm32",
            _ => "llvm64",
        }
    }
}

/// Valid targets per desktop platform. windows has no arm64 toolchain in
/// the MXE prefix layout.
pub fn targets(platform: DesktopPlatform) -> &'static [DesktopTarget] {
    match platform {
        DesktopPlatform::Linux => &[
            DesktopTarget::I686,
            DesktopTarget::X86_64,
            DesktopTarget::Arm64,
        ],
        DesktopPlatform::Windows => &[DesktopTarget::I686, DesktopTarget::X86_64],
        DesktopPlatform::Osx => &[DesktopTarget::X86_64, DesktopTarget::Arm64],
    }
}

pub fn lookup(platform: DesktopPlatform, name: &str) -> Result<DesktopTarget> {
    targets(platform)
        .iter()
        .copied()
        .find(|t| t.name() == name)
        .ok_or_else(|| BuildError::UnknownTarget {
            family: platform.product(),
            name: name.to_string(),
        })
}

pub fn host_triple(platform: DesktopPlatform, target: DesktopTarget) -> String {
    let arch = target.arch(platform);
    match platform {
        DesktopPlatform::Linux => format!("{}-linux-gnu", arch),
        DesktopPlatform::Windows => format!("{}-w64-mingw32", arch),
        DesktopPlatform::Osx => format!("{}-apple-darwin", arch),
    }
}

fn host_os() -> &'static str {
    env::consts::OS
}

pub fn is_cross_compiling(platform: DesktopPlatform) -> bool {
    is_cross_compiling_from(host_os(), platform)
}

fn is_cross_compiling_from(host: &str, platform: DesktopPlatform) -> bool {
    (host == "macos" && platform != DesktopPlatform::Osx)
        || (host == "linux" && platform != DesktopPlatform::Linux)
}

/// Probes the osxcross toolchain for its SDK suffix. An explicit
/// `OSXCROSS_SDK` wins; otherwise darwin14 then darwin15 are tried.
fn osxcross_sdk(opts: &DesktopOpts, arch: &str, osxcross_bin: &Path) -> Result<String> {
    let tool_for = |sdk: &str| osxcross_bin.join(format!("{}-apple-darwin{}-ar", arch, sdk));

    if let Some(sdk) = &opts.osxcross_sdk {
        return Ok(sdk.clone());
    }
    for sdk in ["14", "15"] {
        if tool_for(sdk).is_file() {
            return Ok(sdk.to_string());
        }
    }
    Err(BuildError::Config(
        "Specify a valid osxcross SDK with the environment variable 'OSXCROSS_SDK'".to_string(),
    ))
}

pub fn resolve(
    opts: &DesktopOpts,
    platform: DesktopPlatform,
    target: DesktopTarget,
) -> Result<ResolvedEnvironment> {
    resolve_from(host_os(), opts, platform, target)
}

fn resolve_from(
    host: &str,
    opts: &DesktopOpts,
    platform: DesktopPlatform,
    target: DesktopTarget,
) -> Result<ResolvedEnvironment> {
    let triple = host_triple(platform, target);
    let mut env = ResolvedEnvironment::default();

    env.configure_flags = vec![
        "--disable-boehm".to_string(),
        "--disable-iconv".to_string(),
        "--disable-mcs-build".to_string(),
        "--disable-nls".to_string(),
        "--enable-dynamic-btls".to_string(),
        "--enable-maintainer-mode".to_string(),
        "--with-sigaltstack=yes".to_string(),
        "--with-tls=pthread".to_string(),
        "--without-ikvm-native".to_string(),
    ];

    match platform {
        DesktopPlatform::Windows => {
            let mxe_bin = opts.runtime.base.mxe_prefix.join("bin");
            let arch = target.arch(platform);
            let tool = |name: &str| {
                ToolCommand::new(mxe_bin.join(format!("{}-w64-mingw32-{}", arch, name)))
            };
            env.set_tool(Tool::Ar, tool("ar"));
            env.set_tool(Tool::As, tool("as"));
            env.set_tool(Tool::Cc, tool("gcc"));
            env.set_tool(Tool::Cxx, tool("g++"));
            env.set_tool(Tool::Dlltool, tool("dlltool"));
            env.set_tool(Tool::Ld, tool("ld"));
            env.set_tool(Tool::Objdump, tool("objdump"));
            env.set_tool(Tool::Ranlib, tool("ranlib"));
            env.set_tool(Tool::Strip, tool("strip"));
            env.extra_path = Some(mxe_bin);
            env.configure_flags.push("--enable-static-gcc-libs".to_string());
        }
        DesktopPlatform::Osx if is_cross_compiling_from(host, platform) => {
            let osxcross_root = opts.osxcross_root.clone().ok_or_else(|| {
                BuildError::Config(
                    "The 'OSXCROSS_ROOT' environment variable is required for cross-compiling \
                     to macOS"
                        .to_string(),
                )
            })?;
            let osxcross_bin = osxcross_root.join("target/bin");
            let arch = target.arch(platform);
            let sdk = osxcross_sdk(opts, arch, &osxcross_bin)?;
            let tool = |name: &str| {
                ToolCommand::new(osxcross_bin.join(format!("{}-apple-darwin{}-{}", arch, sdk, name)))
            };
            env.set_tool(Tool::Ar, tool("ar"));
            env.set_tool(Tool::As, tool("as"));
            env.set_tool(Tool::Cc, tool("cc"));
            env.set_tool(Tool::Cxx, tool("c++"));
            env.set_tool(Tool::Ld, tool("ld"));
            env.set_tool(Tool::Ranlib, tool("ranlib"));
            env.set_tool(Tool::Cmake, tool("cmake"));
            env.set_tool(Tool::Strip, tool("strip"));
            env.extra_path = Some(osxcross_bin);
        }
        _ => {
            // Native build: the system compiler, everything else from PATH.
            env.set_tool(Tool::Cc, ToolCommand::new("cc"));
        }
    }

    let llvm = opts.with_llvm.then(|| target.llvm_variant());
    runtime::apply_template(
        &mut env,
        &opts.runtime,
        platform.product(),
        target.name(),
        &triple,
        &[],
        llvm,
    );
    Ok(env)
}

pub fn plan_configure(
    opts: &DesktopOpts,
    platform: DesktopPlatform,
    target: DesktopTarget,
) -> Result<Vec<BuildStep>> {
    let env = resolve(opts, platform, target)?;
    let mut steps = Vec::new();
    if runtime::needs_autogen(&opts.runtime.base) {
        steps.push(runtime::autogen_step(&opts.runtime.base));
    }
    steps.push(runtime::configure_step(
        &env,
        &opts.runtime,
        platform.product(),
        target.name(),
    ));
    Ok(steps)
}

pub fn configure(
    opts: &DesktopOpts,
    platform: DesktopPlatform,
    target: DesktopTarget,
) -> Result<()> {
    let env = resolve(opts, platform, target)?;
    env.warn_missing_tools();
    run_steps(&plan_configure(opts, platform, target)?)
}

pub fn make(opts: &DesktopOpts, platform: DesktopPlatform, target: DesktopTarget) -> Result<()> {
    let steps = runtime::make_steps(
        &opts.runtime,
        platform.product(),
        target.name(),
        &["mono", "support", "data"],
    );
    run_steps(&steps)?;

    if opts.runtime.strip_libs {
        strip_libs(opts, platform, target)?;
    }
    Ok(())
}

/// Strips installed libraries; windows targets additionally strip the
/// installed DLLs.
pub fn strip_libs(
    opts: &DesktopOpts,
    platform: DesktopPlatform,
    target: DesktopTarget,
) -> Result<()> {
    let strip: PathBuf = if is_cross_compiling(platform) {
        match platform {
            DesktopPlatform::Windows => opts.runtime.base.mxe_prefix.join("bin").join(format!(
                "{}-w64-mingw32-strip",
                target.arch(platform)
            )),
            DesktopPlatform::Osx => {
                let osxcross_root = opts.osxcross_root.clone().ok_or_else(|| {
                    BuildError::Config("'OSXCROSS_ROOT' is required to strip macOS libraries".to_string())
                })?;
                let osxcross_bin = osxcross_root.join("target/bin");
                let arch = target.arch(platform);
                let sdk = osxcross_sdk(opts, arch, &osxcross_bin)?;
                osxcross_bin.join(format!("{}-apple-darwin{}-strip", arch, sdk))
            }
            DesktopPlatform::Linux => PathBuf::from("strip"),
        }
    } else {
        PathBuf::from("strip")
    };

    let install_dir = opts
        .runtime
        .product_install_dir(platform.product(), target.name());

    let lib_files = fsutil::files_with_suffixes(&install_dir.join("lib"), &[".a", ".so"]);
    if !lib_files.is_empty() {
        BuildStep::new("strip", &strip)
            .arg("--strip-unneeded")
            .args(lib_files.iter().map(|p| p.display().to_string()))
            .run()?;
    }

    if platform == DesktopPlatform::Windows {
        let dll_files = fsutil::files_with_suffixes(&install_dir.join("bin"), &[".dll"]);
        if !dll_files.is_empty() {
            BuildStep::new("strip", &strip)
                .arg("--strip-unneeded")
                .args(dll_files.iter().map(|p| p.display().to_string()))
                .run()?;
        }
    }
    Ok(())
}

pub fn clean(opts: &DesktopOpts, platform: DesktopPlatform, target: DesktopTarget) -> Result<()> {
    runtime::clean(&opts.runtime, platform.product(), target.name())
}
