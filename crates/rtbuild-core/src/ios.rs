//! iOS build driver: device and simulator runtime builds, plus the
//! AOT cross-compiler builds that target them.
//!
//! Device and simulator builds run against the Xcode toolchain on macOS
//! hosts, or through an osxcross toolchain elsewhere. Cross builds
//! additionally need the LLVM backend and a structure-offsets header
//! generated by the runtime's offsets tool.

use std::env;
use std::path::PathBuf;

use crate::env::{ResolvedEnvironment, Tool, ToolCommand, WrapperScript};
use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::llvm;
use crate::options::IosOpts;
use crate::runtime;
use crate::step::{BuildStep, run_steps};

pub const PRODUCT: &str = "ios";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IosTarget {
    Armv7,
    Arm64,
    I386,
    X86_64,
    CrossArmv7,
    CrossArm64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IosTargetKind {
    Device,
    Simulator,
    Cross,
}

impl IosTarget {
    pub const DEVICE: [IosTarget; 2] = [IosTarget::Armv7, IosTarget::Arm64];
    pub const SIMULATOR: [IosTarget; 2] = [IosTarget::I386, IosTarget::X86_64];
    pub const CROSS: [IosTarget; 2] = [IosTarget::CrossArmv7, IosTarget::CrossArm64];

    pub fn lookup(name: &str) -> Result<Self> {
        match name {
            "armv7" => Ok(IosTarget::Armv7),
            "arm64" => Ok(IosTarget::Arm64),
            "i386" => Ok(IosTarget::I386),
            "x86_64" => Ok(IosTarget::X86_64),
            "cross-armv7" => Ok(IosTarget::CrossArmv7),
            "cross-arm64" => Ok(IosTarget::CrossArm64),
            _ => Err(BuildError::UnknownTarget {
                family: "ios",
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IosTarget::Armv7 => "armv7",
            IosTarget::Arm64 => "arm64",
            IosTarget::I386 => "i386",
            IosTarget::X86_64 => "x86_64",
            IosTarget::CrossArmv7 => "cross-armv7",
            IosTarget::CrossArm64 => "cross-arm64",
        }
    }

    pub fn kind(&self) -> IosTargetKind {
        match self {
            IosTarget::Armv7 | IosTarget::Arm64 => IosTargetKind::Device,
            IosTarget::I386 | IosTarget::X86_64 => IosTargetKind::Simulator,
            IosTarget::CrossArmv7 | IosTarget::CrossArm64 => IosTargetKind::Cross,
        }
    }

    fn arch(&self) -> &'static str {
        match self {
            IosTarget::Armv7 => "arm",
            IosTarget::Arm64 => "arm64",
            IosTarget::I386 => "i386",
            IosTarget::X86_64 => "x86_64",
            // Cross compilers are host binaries; they have no device arch.
            IosTarget::CrossArmv7 | IosTarget::CrossArm64 => "",
        }
    }

    fn host_triple(&self) -> &'static str {
        match self {
            IosTarget::Armv7 => "arm-apple-darwin11",
            IosTarget::Arm64 => "aarch64-apple-darwin11",
            IosTarget::I386 => "i386-apple-darwin11",
            IosTarget::X86_64 => "x86_64-apple-darwin11",
            // Cross compilers run on the build host.
            IosTarget::CrossArmv7 | IosTarget::CrossArm64 => "x86_64-apple-darwin11",
        }
    }

    fn osxcross_tool_triple(&self) -> &'static str {
        match self {
            IosTarget::Armv7 | IosTarget::Arm64 => "arm-apple-darwin11",
            IosTarget::I386 => "i386-apple-darwin11",
            _ => "x86_64-apple-darwin11",
        }
    }

    /// The device target a cross compiler emits code for.
    pub fn device_target(&self) -> Option<IosTarget> {
        match self {
            IosTarget::CrossArmv7 => Some(IosTarget::Armv7),
            IosTarget::CrossArm64 => Some(IosTarget::Arm64),
            _ => None,
        }
    }

    fn cross_target_triple(&self) -> &'static str {
        match self {
            IosTarget::CrossArmv7 => "arm-apple-darwin",
            IosTarget::CrossArm64 => "aarch64-apple-darwin",
            _ => "",
        }
    }

    /// ABI string handed to the offsets tool; its clang invocation has the
    /// darwin10 suffix baked in.
    fn offsets_dumper_abi(&self) -> &'static str {
        match self {
            IosTarget::CrossArmv7 => "arm-apple-darwin10",
            IosTarget::CrossArm64 => "aarch64-apple-darwin10",
            _ => "",
        }
    }
}

fn host_os() -> &'static str {
    env::consts::OS
}

fn ios_sysroot(opts: &IosOpts, host: &str, sdk_name: &str) -> Result<PathBuf> {
    if let Some(path) = &opts.ios_sdk_path {
        return Ok(path.clone());
    }
    if host == "macos" {
        if let Some(path) = fsutil::xcrun_find_sdk(sdk_name) {
            return Ok(path);
        }
    }
    Err(BuildError::Config(
        "Cannot find iOS SDK; specify one manually with '--ios-sdk'".to_string(),
    ))
}

fn osx_sysroot(opts: &IosOpts, host: &str) -> Result<PathBuf> {
    if let Some(path) = &opts.osx_sdk_path {
        return Ok(path.clone());
    }
    if host == "macos" {
        if let Some(path) = fsutil::xcrun_find_sdk("macosx") {
            return Ok(path);
        }
    }
    Err(BuildError::Config(
        "Cannot find macOS SDK; specify one manually with '--osx-sdk'".to_string(),
    ))
}

/// Tool table for device/simulator targets: Xcode toolchain binaries on
/// macOS, osxcross-prefixed binaries behind the rpath wrapper elsewhere.
fn device_tools(
    env: &mut ResolvedEnvironment,
    opts: &IosOpts,
    host: &str,
    target: IosTarget,
) {
    let tools_path = opts.ios_toolchain_path.join("usr/bin");

    let tool = |name: &str| -> ToolCommand {
        if host == "macos" {
            ToolCommand::new(tools_path.join(name))
        } else {
            let wrapper = opts
                .runtime
                .build_dir(PRODUCT, target.name())
                .join("osxcross_cmd_wrapper.sh");
            ToolCommand::new(
                tools_path.join(format!("{}-{}", target.osxcross_tool_triple(), name)),
            )
            .wrapped_with(wrapper)
        }
    };

    let cc = tool("clang");
    let cxx = tool("clang++");
    let (cc, cxx) = match &opts.runtime.ccache {
        Some(ccache) => (cc.wrapped_with(ccache), cxx.wrapped_with(ccache)),
        None => (cc, cxx),
    };

    env.set_tool(Tool::Ar, tool("ar"));
    env.set_tool(Tool::As, tool("as"));
    env.set_tool(Tool::Cc, cc);
    env.set_tool(Tool::Cxx, cxx);
    env.set_tool(Tool::Ld, tool("ld"));
    env.set_tool(Tool::Ranlib, tool("ranlib"));
    env.set_tool(Tool::Strip, tool("strip"));

    if host != "macos" {
        env.wrapper_script = Some(WrapperScript {
            path: opts
                .runtime
                .build_dir(PRODUCT, target.name())
                .join("osxcross_cmd_wrapper.sh"),
            toolchain_lib_dir: opts.ios_toolchain_path.join("lib"),
        });
    }
}

fn resolve_device(opts: &IosOpts, host: &str, target: IosTarget) -> Result<ResolvedEnvironment> {
    let sysroot = ios_sysroot(opts, host, "iphoneos")?;
    let sysroot_flags = vec![
        "-isysroot".to_string(),
        sysroot.display().to_string(),
        format!("-miphoneos-version-min={}", opts.ios_version_min),
    ];
    let arch = target.arch();

    let mut env = ResolvedEnvironment::default();
    device_tools(&mut env, opts, host, target);

    env.ac_vars = [
        "ac_cv_c_bigendian=no",
        "ac_cv_func_fstatat=no",
        "ac_cv_func_readlinkat=no",
        "ac_cv_func_getpwuid_r=no",
        "ac_cv_func_posix_getpwuid_r=yes",
        "ac_cv_header_curses_h=no",
        "ac_cv_header_localcharset_h=no",
        "ac_cv_header_sys_user_h=no",
        "ac_cv_func_getentropy=no",
        "ac_cv_func_futimens=no",
        "ac_cv_func_utimensat=no",
        "ac_cv_func_shm_open_working_with_mmap=no",
        "ac_cv_func_pthread_jit_write_protect_np=no",
        "ac_cv_func_preadv=no",
        "ac_cv_func_pwritev=no",
        "mono_cv_sizeof_sunpath=104",
        "mono_cv_uscore=yes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    env.cflags = sysroot_flags.clone();
    env.cflags.extend([
        "-arch".to_string(),
        arch.to_string(),
        "-Wl,-application_extension".to_string(),
        "-fexceptions".to_string(),
    ]);

    env.cxxflags = sysroot_flags.clone();
    env.cxxflags.extend([
        "-arch".to_string(),
        arch.to_string(),
        "-Wl,-application_extension".to_string(),
    ]);

    env.cppflags = sysroot_flags;
    env.cppflags.extend([
        "-DMONOTOUCH=1".to_string(),
        "-arch".to_string(),
        arch.to_string(),
        "-DSMALL_CONFIG".to_string(),
        "-D_XOPEN_SOURCE".to_string(),
        "-DHOST_IOS".to_string(),
        "-DHAVE_LARGE_FILE_SUPPORT=1".to_string(),
    ]);

    env.ldflags = vec![
        "-arch".to_string(),
        arch.to_string(),
        "-framework".to_string(),
        "CoreFoundation".to_string(),
        "-lobjc".to_string(),
        "-lc++".to_string(),
    ];

    env.configure_flags = [
        "--disable-boehm",
        "--disable-btls",
        "--disable-executables",
        "--disable-icall-tables",
        "--disable-iconv",
        "--disable-mcs-build",
        "--disable-nls",
        "--disable-visibility-hidden",
        "--enable-dtrace=no",
        "--enable-icall-export",
        "--enable-maintainer-mode",
        "--enable-minimal=ssa,com,interpreter,jit,portability,assembly_remapping,attach,verifier,\
         full_messages,appdomains,security,sgen_remset,sgen_marksweep_par,sgen_marksweep_fixed,\
         sgen_marksweep_fixed_par,sgen_copying,logging,remoting,shared_perfcounters,gac",
        "--enable-monotouch",
        "--with-tls=pthread",
        "--without-ikvm-native",
        "--without-sigaltstack",
        "--disable-cooperative-suspend",
        "--disable-hybrid-suspend",
        "--disable-crash-reporting",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    runtime::apply_template(
        &mut env,
        &opts.runtime,
        PRODUCT,
        target.name(),
        target.host_triple(),
        &[],
        None,
    );
    Ok(env)
}

fn resolve_simulator(opts: &IosOpts, host: &str, target: IosTarget) -> Result<ResolvedEnvironment> {
    let sysroot = ios_sysroot(opts, host, "iphonesimulator")?;
    let sysroot_flags = vec![
        "-isysroot".to_string(),
        sysroot.display().to_string(),
        format!("-miphoneos-version-min={}", opts.ios_version_min),
    ];
    let arch = target.arch();

    let mut env = ResolvedEnvironment::default();
    device_tools(&mut env, opts, host, target);

    env.ac_vars = [
        "ac_cv_func_clock_nanosleep=no",
        "ac_cv_func_fstatat=no",
        "ac_cv_func_readlinkat=no",
        "ac_cv_func_system=no",
        "ac_cv_func_getentropy=no",
        "ac_cv_func_futimens=no",
        "ac_cv_func_utimensat=no",
        "ac_cv_func_shm_open_working_with_mmap=no",
        "ac_cv_func_pthread_jit_write_protect_np=no",
        "ac_cv_func_preadv=no",
        "ac_cv_func_pwritev=no",
        "mono_cv_uscore=yes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    env.cflags = sysroot_flags.clone();
    env.cflags.extend([
        "-arch".to_string(),
        arch.to_string(),
        "-Wl,-application_extension".to_string(),
    ]);
    env.cxxflags = env.cflags.clone();

    env.cppflags = sysroot_flags;
    env.cppflags.extend([
        "-DMONOTOUCH=1".to_string(),
        "-arch".to_string(),
        arch.to_string(),
        "-Wl,-application_extension".to_string(),
        "-DHOST_IOS".to_string(),
    ]);

    env.configure_flags = [
        "--disable-boehm",
        "--disable-btls",
        "--disable-executables",
        "--disable-iconv",
        "--disable-mcs-build",
        "--disable-nls",
        "--disable-visibility-hidden",
        "--enable-maintainer-mode",
        "--enable-minimal=com,remoting,shared_perfcounters,gac",
        "--enable-monotouch",
        "--with-tls=pthread",
        "--without-ikvm-native",
        "--disable-cooperative-suspend",
        "--disable-hybrid-suspend",
        "--disable-crash-reporting",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if host != "macos" {
        // DTrace is unavailable when building through osxcross.
        env.configure_flags.push("--enable-dtrace=no".to_string());
    }

    runtime::apply_template(
        &mut env,
        &opts.runtime,
        PRODUCT,
        target.name(),
        target.host_triple(),
        &[],
        None,
    );
    Ok(env)
}

/// A resolved cross-compiler environment plus the offsets-tool invocation
/// that must run before configure.
#[derive(Debug, Clone)]
pub struct ResolvedCross {
    pub env: ResolvedEnvironment,
    pub offsets_dumper_args: Vec<String>,
}

fn find_libclang(opts: &IosOpts) -> Result<PathBuf> {
    if let Some(libclang) = &opts.libclang_path {
        if !libclang.is_file() {
            return Err(BuildError::Config(format!(
                "Specified libclang file not found: '{}'",
                libclang.display()
            )));
        }
        return Ok(libclang.clone());
    }

    let toolchain_libclang = opts.ios_toolchain_path.join("usr/lib/libclang.dylib");
    if toolchain_libclang.is_file() {
        println!("Found libclang at: '{}'", toolchain_libclang.display());
        return Ok(toolchain_libclang);
    }

    if let Some(llvm_config) = fsutil::find_executable("llvm-config") {
        if let Some(libdir) = fsutil::capture_stdout(&llvm_config, &["--libdir"]) {
            let suffix = if host_os() == "macos" { ".dylib" } else { ".so" };
            for hint in ["libclang", "clang"] {
                let candidate = PathBuf::from(&libdir).join(format!("{}{}", hint, suffix));
                if candidate.is_file() {
                    println!("Found libclang at: '{}'", candidate.display());
                    return Ok(candidate);
                }
            }
        }
    }

    Err(BuildError::Config(
        "Cannot find libclang shared library; specify a path manually with the 'LIBCLANG_PATH' \
         environment variable"
            .to_string(),
    ))
}

fn resolve_cross(opts: &IosOpts, host: &str, target: IosTarget) -> Result<ResolvedCross> {
    let device_target = target
        .device_target()
        .expect("cross targets map to a device target");
    let ios_sysroot_path = ios_sysroot(opts, host, "iphoneos")?;
    let osx_sysroot_path = osx_sysroot(opts, host)?;

    let mut env = ResolvedEnvironment::default();

    let tool = |name: &str| -> ToolCommand {
        if host == "macos" {
            ToolCommand::new(opts.osx_toolchain_path.join("usr/bin").join(name))
        } else {
            let osxcross_bin = opts.osx_toolchain_path.join("bin");
            let wrapper = opts
                .runtime
                .build_dir(PRODUCT, target.name())
                .join("osxcross_cmd_wrapper.sh");
            ToolCommand::new(osxcross_bin.join(format!(
                "x86_64-apple-{}-{}",
                opts.osx_triple_abi, name
            )))
            .wrapped_with(wrapper)
        }
    };

    env.set_tool(Tool::Ar, tool("ar"));
    env.set_tool(Tool::As, tool("as"));
    env.set_tool(Tool::Cc, tool("clang"));
    env.set_tool(Tool::Cxx, tool("clang++"));
    env.set_tool(Tool::Ld, tool("ld"));
    env.set_tool(Tool::Ranlib, tool("ranlib"));
    env.set_tool(Tool::Strip, tool("strip"));

    if host != "macos" {
        let osxcross_bin = opts.osx_toolchain_path.join("bin");
        env.extra_path = Some(osxcross_bin);
        env.wrapper_script = Some(WrapperScript {
            path: opts
                .runtime
                .build_dir(PRODUCT, target.name())
                .join("osxcross_cmd_wrapper.sh"),
            toolchain_lib_dir: opts.osx_toolchain_path.join("lib"),
        });
    }

    let libclang = find_libclang(opts)?;
    let mut offsets_dumper_args = vec![
        format!("--libclang={}", libclang.display()),
        format!("--sysroot={}", ios_sysroot_path.display()),
    ];

    if host != "macos" {
        // The offsets tool needs the device toolchain's clang resource
        // directory to parse the runtime headers through osxcross. The
        // device tools run behind the wrapper script, so write it first.
        let device_env = resolve_device(opts, host, device_target)?;
        runtime::materialize_wrapper(&device_env)?;
        let device_cc = device_env
            .tools
            .get(&Tool::Cc)
            .expect("device template always sets CC");
        let resource_dir = fsutil::clang_resource_dir(device_cc).ok_or_else(|| {
            BuildError::Config("cannot query the iOS toolchain clang for its resource directory".to_string())
        })?;
        for cflag in [
            "-target".to_string(),
            "aarch64-apple-darwin".to_string(),
            "-resource-dir".to_string(),
            resource_dir,
        ] {
            offsets_dumper_args.push(format!("--extra-cflag={}", cflag));
        }
    }

    env.ac_vars = vec!["ac_cv_func_shm_open_working_with_mmap=no".to_string()];

    env.cflags = vec![
        "-isysroot".to_string(),
        osx_sysroot_path.display().to_string(),
        "-mmacosx-version-min=10.9".to_string(),
        "-Qunused-arguments".to_string(),
    ];
    env.cxxflags = env.cflags.clone();
    env.cxxflags.push("-stdlib=libc++".to_string());
    env.cppflags = vec!["-DMONOTOUCH=1".to_string()];
    env.ldflags = vec!["-stdlib=libc++".to_string()];

    env.configure_flags = [
        "--disable-boehm",
        "--disable-btls",
        "--disable-iconv",
        "--disable-libraries",
        "--disable-mcs-build",
        "--disable-nls",
        "--enable-dtrace=no",
        "--enable-icall-symbol-map",
        "--enable-minimal=com,remoting",
        "--enable-monotouch",
        "--disable-crash-reporting",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    let cross_flags = vec![
        format!("--target={}", target.cross_target_triple()),
        format!("--with-cross-offsets={}.h", target.cross_target_triple()),
        format!(
            "--with-llvm={}",
            opts.runtime.base.install_dir.join("llvm-llvm64").display()
        ),
    ];

    runtime::apply_template(
        &mut env,
        &opts.runtime,
        PRODUCT,
        target.name(),
        target.host_triple(),
        &cross_flags,
        None,
    );
    Ok(ResolvedCross {
        env,
        offsets_dumper_args,
    })
}

/// Resolves a device or simulator environment. Cross targets resolve
/// through [`resolve_cross_target`] since they carry extra state.
pub fn resolve(opts: &IosOpts, target: IosTarget) -> Result<ResolvedEnvironment> {
    match target.kind() {
        IosTargetKind::Device => resolve_device(opts, host_os(), target),
        IosTargetKind::Simulator => resolve_simulator(opts, host_os(), target),
        IosTargetKind::Cross => Ok(resolve_cross(opts, host_os(), target)?.env),
    }
}

pub fn resolve_cross_target(opts: &IosOpts, target: IosTarget) -> Result<ResolvedCross> {
    resolve_cross(opts, host_os(), target)
}

/// The offsets-tool step for a cross target: generates the structure
/// offsets header the cross configure consumes.
fn offsets_tool_step(
    opts: &IosOpts,
    target: IosTarget,
    offsets_dumper_args: &[String],
) -> Result<BuildStep> {
    let device_target = target
        .device_target()
        .expect("cross targets map to a device target");
    let source_root = &opts.runtime.base.runtime_source_root;
    let offsets_tool = source_root.join("mono/tools/offsets-tool/offsets-tool.py");
    if !offsets_tool.is_file() {
        return Err(BuildError::Config(format!(
            "offsets tool not found in the runtime source tree: {}",
            offsets_tool.display()
        )));
    }

    let build_dir = opts.runtime.build_dir(PRODUCT, target.name());
    let device_build_dir = opts.runtime.build_dir(PRODUCT, device_target.name());

    Ok(BuildStep::new("offsets-tool", "python3")
        .arg(offsets_tool.display().to_string())
        .arg(format!("--targetdir={}", device_build_dir.display()))
        .arg(format!("--abi={}", target.offsets_dumper_abi()))
        .arg(format!("--monodir={}", source_root.display()))
        .arg(format!(
            "--outfile={}",
            build_dir.join(format!("{}.h", target.cross_target_triple())).display()
        ))
        .args(offsets_dumper_args.iter().cloned())
        .cwd(build_dir))
}

pub fn configure(opts: &IosOpts, target: IosTarget) -> Result<()> {
    let mut steps = Vec::new();

    let env = match target.kind() {
        IosTargetKind::Cross => {
            // The cross compiler links against the LLVM backend; build it
            // first (stamp-gated, so re-runs are cheap).
            llvm::make(&opts.runtime.base, llvm::LlvmTarget::Llvm64)?;

            let cross = resolve_cross_target(opts, target)?;
            steps.push(offsets_tool_step(opts, target, &cross.offsets_dumper_args)?);
            cross.env
        }
        _ => resolve(opts, target)?,
    };

    env.warn_missing_tools();
    runtime::materialize_wrapper(&env)?;

    if runtime::needs_autogen(&opts.runtime.base) {
        steps.insert(0, runtime::autogen_step(&opts.runtime.base));
    }
    steps.push(runtime::configure_step(&env, &opts.runtime, PRODUCT, target.name()));
    run_steps(&steps)
}

pub fn make(opts: &IosOpts, target: IosTarget) -> Result<()> {
    let steps = runtime::make_steps(
        &opts.runtime,
        PRODUCT,
        target.name(),
        &["mono", "support", "data"],
    );
    run_steps(&steps)?;

    // 'strip' has no '--strip-unneeded' on macOS, so installed libraries
    // are left as-is regardless of --strip-libs.
    Ok(())
}

pub fn clean(opts: &IosOpts, target: IosTarget) -> Result<()> {
    runtime::clean(&opts.runtime, PRODUCT, target.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BaseOpts, Configuration, RuntimeOpts};

    fn ios_opts() -> IosOpts {
        IosOpts {
            runtime: RuntimeOpts {
                base: BaseOpts {
                    verbose_make: false,
                    jobs: 1,
                    configure_dir: PathBuf::from("/cfg"),
                    install_dir: PathBuf::from("/inst"),
                    runtime_source_root: PathBuf::from("/src"),
                    mxe_prefix: PathBuf::from("/usr"),
                },
                configuration: Configuration::Release,
                enable_cxx: false,
                strip_libs: true,
                ccache: None,
            },
            ios_toolchain_path: PathBuf::from("/xcode/toolchain"),
            ios_sdk_path: Some(PathBuf::from("/sdk/iPhoneOS.sdk")),
            ios_version_min: "10.0".to_string(),
            osx_toolchain_path: PathBuf::from("/xcode/toolchain"),
            osx_sdk_path: Some(PathBuf::from("/sdk/MacOSX.sdk")),
            osx_triple_abi: "darwin18".to_string(),
            libclang_path: None,
        }
    }

    #[test]
    fn lookup_covers_device_sim_and_cross() {
        assert_eq!(IosTarget::lookup("arm64").unwrap().kind(), IosTargetKind::Device);
        assert_eq!(
            IosTarget::lookup("x86_64").unwrap().kind(),
            IosTargetKind::Simulator
        );
        assert_eq!(
            IosTarget::lookup("cross-arm64").unwrap().kind(),
            IosTargetKind::Cross
        );
        assert!(IosTarget::lookup("watchos").is_err());
    }

    #[test]
    fn device_template_targets_the_ios_sysroot() {
        let env = resolve_device(&ios_opts(), "macos", IosTarget::Arm64).unwrap();
        assert!(env.cflags.contains(&"-isysroot".to_string()));
        assert!(env.cflags.contains(&"/sdk/iPhoneOS.sdk".to_string()));
        assert!(
            env.cflags
                .contains(&"-miphoneos-version-min=10.0".to_string())
        );
        assert!(env.cppflags.contains(&"-DHOST_IOS".to_string()));
        assert!(env.configure_flags.contains(&"--enable-monotouch".to_string()));
        assert!(
            env.configure_flags
                .contains(&"--host=aarch64-apple-darwin11".to_string())
        );
        assert_eq!(
            env.tools.get(&Tool::Cc).unwrap().rendered(),
            "/xcode/toolchain/usr/bin/clang"
        );
    }

    #[test]
    fn device_without_sdk_on_non_mac_host_is_a_configuration_error() {
        let mut opts = ios_opts();
        opts.ios_sdk_path = None;
        let err = resolve_device(&opts, "linux", IosTarget::Arm64).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn simulator_on_non_mac_host_disables_dtrace() {
        let opts = ios_opts();
        let mac = resolve_simulator(&opts, "macos", IosTarget::X86_64).unwrap();
        let cross = resolve_simulator(&opts, "linux", IosTarget::X86_64).unwrap();
        assert!(!mac.configure_flags.contains(&"--enable-dtrace=no".to_string()));
        assert!(cross.configure_flags.contains(&"--enable-dtrace=no".to_string()));
    }

    #[test]
    fn non_mac_host_wraps_tools_with_the_osxcross_wrapper() {
        let opts = ios_opts();
        let env = resolve_device(&opts, "linux", IosTarget::Arm64).unwrap();
        let cc = env.tools.get(&Tool::Cc).unwrap().rendered();
        assert!(cc.starts_with("/cfg/ios-arm64-release/osxcross_cmd_wrapper.sh "));
        assert!(cc.ends_with("arm-apple-darwin11-clang"));
        assert!(env.wrapper_script.is_some());
    }

    #[test]
    fn cross_template_carries_target_and_offsets_flags() {
        let mut opts = ios_opts();
        // Pin libclang so resolution stays filesystem-independent.
        let dir = tempfile::tempdir().unwrap();
        let libclang = dir.path().join("libclang.dylib");
        std::fs::write(&libclang, b"").unwrap();
        opts.libclang_path = Some(libclang.clone());

        let cross = resolve_cross(&opts, "macos", IosTarget::CrossArm64).unwrap();
        assert!(
            cross
                .env
                .configure_flags
                .contains(&"--target=aarch64-apple-darwin".to_string())
        );
        assert!(
            cross
                .env
                .configure_flags
                .contains(&"--with-cross-offsets=aarch64-apple-darwin.h".to_string())
        );
        assert!(
            cross
                .env
                .configure_flags
                .contains(&"--with-llvm=/inst/llvm-llvm64".to_string())
        );
        assert_eq!(
            cross.offsets_dumper_args[0],
            format!("--libclang={}", libclang.display())
        );
        assert_eq!(cross.offsets_dumper_args[1], "--sysroot=/sdk/iPhoneOS.sdk");
    }

    #[test]
    fn cross_with_missing_libclang_override_fails_loudly() {
        let mut opts = ios_opts();
        opts.libclang_path = Some(PathBuf::from("/does/not/exist/libclang.dylib"));
        let err = resolve_cross(&opts, "macos", IosTarget::CrossArm64).unwrap_err();
        assert!(matches!(err, BuildError::Config(_)));
    }

    #[test]
    fn device_resolution_is_deterministic() {
        let opts = ios_opts();
        let first = resolve_device(&opts, "macos", IosTarget::Armv7).unwrap();
        let second = resolve_device(&opts, "macos", IosTarget::Armv7).unwrap();
        assert_eq!(first.configure_args(), second.configure_args());
    }
}
