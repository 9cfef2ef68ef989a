//! Android build driver.
//!
//! Resolves NDK toolchain paths and per-ABI flag sets, then drives
//! configure/make/clean for the runtime against the Android targets. The
//! NDK's unified llvm toolchain layout is assumed: compiler binaries named
//! `<triple><api>-clang` under `toolchains/llvm/prebuilt/<host>/bin`.

use std::env;
use std::path::Path;

use crate::env::{ResolvedEnvironment, Tool, ToolCommand};
use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::options::AndroidOpts;
use crate::runtime;
use crate::step::{BuildStep, run_steps};

pub const PRODUCT: &str = "android";

/// Logical Android targets, named by ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AndroidTarget {
    ArmeabiV7a,
    Arm64V8a,
    X86,
    X86_64,
}

impl AndroidTarget {
    pub const ALL: [AndroidTarget; 4] = [
        AndroidTarget::ArmeabiV7a,
        AndroidTarget::Arm64V8a,
        AndroidTarget::X86,
        AndroidTarget::X86_64,
    ];

    pub fn lookup(name: &str) -> Result<Self> {
        match name {
            "armeabi-v7a" => Ok(AndroidTarget::ArmeabiV7a),
            "arm64-v8a" => Ok(AndroidTarget::Arm64V8a),
            "x86" => Ok(AndroidTarget::X86),
            "x86_64" => Ok(AndroidTarget::X86_64),
            _ => Err(BuildError::UnknownTarget {
                family: "android",
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            AndroidTarget::ArmeabiV7a => "armeabi-v7a",
            AndroidTarget::Arm64V8a => "arm64-v8a",
            AndroidTarget::X86 => "x86",
            AndroidTarget::X86_64 => "x86_64",
        }
    }

    pub fn arch(&self) -> &'static str {
        match self {
            AndroidTarget::ArmeabiV7a => "arm",
            AndroidTarget::Arm64V8a => "arm64",
            AndroidTarget::X86 => "x86",
            AndroidTarget::X86_64 => "x86_64",
        }
    }

    /// Triple prefixed onto the NDK compiler wrappers.
    pub fn triple(&self) -> &'static str {
        match self {
            AndroidTarget::ArmeabiV7a => "armv7a-linux-androideabi",
            AndroidTarget::Arm64V8a => "aarch64-linux-android",
            AndroidTarget::X86 => "i686-linux-android",
            AndroidTarget::X86_64 => "x86_64-linux-android",
        }
    }

    /// Triple used for the binutils subdirectory, which differs from the
    /// compiler triple on 32-bit arm.
    pub fn binutils_triple(&self) -> &'static str {
        match self {
            AndroidTarget::ArmeabiV7a => "arm-linux-androideabi",
            other => other.triple(),
        }
    }

    /// Minimum supported API level. Kept in sync with the engine's own
    /// Android platform requirements.
    pub fn min_api_version(&self) -> u32 {
        match self {
            AndroidTarget::ArmeabiV7a | AndroidTarget::X86 => 19,
            AndroidTarget::Arm64V8a | AndroidTarget::X86_64 => 21,
        }
    }

    fn extra_cflags(&self) -> &'static [&'static str] {
        match self {
            AndroidTarget::ArmeabiV7a => &[
                "-D__POSIX_VISIBLE=201002",
                "-DSK_RELEASE",
                "-DNDEBUG",
                "-UDEBUG",
                "-fpic",
                "-march=armv7-a",
                "-mtune=cortex-a8",
                "-mfpu=vfp",
                "-mfloat-abi=softfp",
            ],
            AndroidTarget::Arm64V8a => &[
                "-D__POSIX_VISIBLE=201002",
                "-DSK_RELEASE",
                "-DNDEBUG",
                "-UDEBUG",
                "-fpic",
                "-DL_cuserid=9",
                "-DANDROID64",
            ],
            AndroidTarget::X86 => &[],
            AndroidTarget::X86_64 => &["-DL_cuserid=9"],
        }
    }

    fn extra_ldflags(&self) -> &'static [&'static str] {
        match self {
            AndroidTarget::ArmeabiV7a => &["-Wl,--fix-cortex-a8"],
            _ => &[],
        }
    }
}

/// The `prebuilt/<host>` subdirectory of the NDK toolchain for the host OS.
pub fn ndk_host_subpath() -> &'static str {
    match env::consts::OS {
        "linux" => "linux-x86_64",
        "macos" => "darwin-x86_64",
        "windows" => {
            if cfg!(target_pointer_width = "64") {
                "windows-x86_64"
            } else {
                "windows"
            }
        }
        // The NDK ships no other host toolchains; fall back to the linux
        // layout and let the tool lookup warn.
        _ => "linux-x86_64",
    }
}

/// The requested API level, clamped up to the target's minimum. Clamping
/// warns but never fails: a too-low request would produce a broken build,
/// so correctness wins over literal intent.
pub fn api_version_or_min(opts: &AndroidOpts, target: AndroidTarget) -> u32 {
    let min = target.min_api_version();
    if opts.api_version < min {
        println!(
            "WARNING: API version {} is less than the minimum for target {}; using {}",
            opts.api_version,
            target.name(),
            min
        );
        return min;
    }
    opts.api_version
}

/// Installs the configured NDK through `sdkmanager` when it is missing.
pub fn ensure_ndk(opts: &AndroidOpts) -> Result<()> {
    ensure_sdk_package(opts, &opts.ndk_root(), "ndk", &opts.ndk_version)
}

/// Installs the SDK-bundled CMake through `sdkmanager` when it is missing.
pub fn ensure_cmake(opts: &AndroidOpts) -> Result<()> {
    ensure_sdk_package(opts, &opts.cmake_dir(), "cmake", &opts.cmake_version)
}

fn ensure_sdk_package(
    opts: &AndroidOpts,
    expected_dir: &Path,
    package: &str,
    version: &str,
) -> Result<()> {
    if expected_dir.exists() {
        return Ok(());
    }
    println!("Attempting to install Android {} version {}", package, version);
    let sdkmanager = opts.sdkmanager();
    if !sdkmanager.exists() {
        return Err(BuildError::Config(format!(
            "Cannot find {}. Ensure the Android SDK root is correct and cmdline-tools are installed",
            sdkmanager.display()
        )));
    }
    BuildStep::new("sdkmanager", sdkmanager)
        .arg(format!("{};{}", package, version))
        .run()
}

/// Resolves the full build environment for one Android target.
pub fn resolve(opts: &AndroidOpts, target: AndroidTarget) -> ResolvedEnvironment {
    let api = api_version_or_min(opts, target);

    let ndk_root = opts.ndk_root();
    let toolchain_path = ndk_root
        .join("toolchains/llvm/prebuilt")
        .join(ndk_host_subpath());
    let compiler_path = toolchain_path.join("bin");
    let binutils_path = toolchain_path.join(target.binutils_triple()).join("bin");
    let compiler_prefix = format!("{}{}-", target.triple(), api);

    let mut env = ResolvedEnvironment::default();

    let cc = ToolCommand::new(compiler_path.join(format!("{}clang", compiler_prefix)));
    let cxx = ToolCommand::new(compiler_path.join(format!("{}clang++", compiler_prefix)));
    // Prefer a dedicated preprocessor when the toolchain ships one; the
    // unified llvm NDKs do not, so the compilers preprocess explicitly.
    let dedicated_cpp = compiler_path.join(format!("{}cpp", compiler_prefix));
    let (cpp, cxxcpp) = if dedicated_cpp.is_file() {
        (
            ToolCommand::new(&dedicated_cpp),
            ToolCommand::new(&dedicated_cpp),
        )
    } else {
        (cc.clone().with_arg("-E"), cxx.clone().with_arg("-E"))
    };

    let (cc, cxx, cpp, cxxcpp) = match &opts.runtime.ccache {
        Some(ccache) => (
            cc.wrapped_with(ccache),
            cxx.wrapped_with(ccache),
            cpp.wrapped_with(ccache),
            cxxcpp.wrapped_with(ccache),
        ),
        None => (cc, cxx, cpp, cxxcpp),
    };

    env.set_tool(Tool::Ar, ToolCommand::new(compiler_path.join("llvm-ar")));
    env.set_tool(Tool::As, ToolCommand::new(binutils_path.join("as")));
    env.set_tool(Tool::Cc, cc);
    env.set_tool(Tool::Cpp, cpp);
    env.set_tool(Tool::Cxx, cxx);
    env.set_tool(Tool::Cxxcpp, cxxcpp);
    env.set_tool(Tool::Ld, ToolCommand::new(compiler_path.join("ld")));
    env.set_tool(Tool::Objdump, ToolCommand::new(compiler_path.join("llvm-objdump")));
    env.set_tool(Tool::Ranlib, ToolCommand::new(compiler_path.join("llvm-ranlib")));
    env.set_tool(Tool::Cmake, ToolCommand::new(opts.cmake_dir().join("bin/cmake")));
    env.set_tool(Tool::Strip, ToolCommand::new(compiler_path.join("llvm-strip")));

    env.ac_vars = vec![
        "mono_cv_uscore=yes".to_string(),
        "ac_cv_func_sched_getaffinity=no".to_string(),
        "ac_cv_func_sched_setaffinity=no".to_string(),
        "ac_cv_func_shm_open_working_with_mmap=no".to_string(),
    ];

    // The runtime relocates its libdir relative to the native library
    // directory the app loader hands it; that relocated path does not
    // exist on Android, so the relocation is pinned to '.'.
    env.cppflags.push("-DMONO_RELOC_LIBDIR=\\\".\\\"".to_string());

    let common_cflags = [
        "-fstack-protector".to_string(),
        "-DMONODROID=1".to_string(),
        format!("-D__ANDROID_API__={}", api),
    ];
    env.cflags.extend(common_cflags.iter().cloned());
    env.cxxflags.extend(common_cflags.iter().cloned());
    env.cflags
        .extend(target.extra_cflags().iter().map(|s| s.to_string()));
    env.cxxflags
        .extend(target.extra_cflags().iter().map(|s| s.to_string()));

    env.ldflags.extend(
        [
            "-z", "now", "-z", "relro", "-z", "noexecstack", "-ldl", "-lm", "-llog", "-lc",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    // Without this the system linker rejects the produced libraries:
    // 'dlopen failed: empty/missing DT_HASH'.
    env.ldflags.push("-Wl,--hash-style=both".to_string());
    env.ldflags
        .extend(target.extra_ldflags().iter().map(|s| s.to_string()));

    env.configure_flags = vec![
        "--disable-boehm".to_string(),
        "--disable-executables".to_string(),
        "--disable-iconv".to_string(),
        "--disable-mcs-build".to_string(),
        "--disable-nls".to_string(),
        "--enable-dynamic-btls".to_string(),
        "--enable-maintainer-mode".to_string(),
        "--enable-minimal=ssa,portability,attach,verifier,full_messages,sgen_remset\
         ,sgen_marksweep_par,sgen_marksweep_fixed,sgen_marksweep_fixed_par\
         ,sgen_copying,logging,security,shared_handles,interpreter"
            .to_string(),
        format!("--with-btls-android-ndk={}", ndk_root.display()),
        format!("--with-btls-android-api={}", api),
        "--enable-monodroid".to_string(),
        "--with-btls-android-ndk-asm-workaround".to_string(),
        format!(
            "--with-btls-android-cmake-toolchain={}/build/cmake/android.toolchain.cmake",
            ndk_root.display()
        ),
        "--with-sigaltstack=yes".to_string(),
        "--with-tls=pthread".to_string(),
        "--without-ikvm-native".to_string(),
        "--disable-cooperative-suspend".to_string(),
        "--disable-hybrid-suspend".to_string(),
        "--disable-crash-reporting".to_string(),
    ];

    runtime::apply_template(
        &mut env,
        &opts.runtime,
        PRODUCT,
        target.name(),
        target.triple(),
        &[],
        None,
    );
    env
}

/// Plans the configure action: autogen when the source tree has no
/// `configure` yet, then the configure invocation itself.
pub fn plan_configure(opts: &AndroidOpts, target: AndroidTarget) -> Vec<BuildStep> {
    let env = resolve(opts, target);
    let mut steps = Vec::new();
    if runtime::needs_autogen(&opts.runtime.base) {
        steps.push(runtime::autogen_step(&opts.runtime.base));
    }
    steps.push(runtime::configure_step(&env, &opts.runtime, PRODUCT, target.name()));
    steps
}

pub fn configure(opts: &AndroidOpts, target: AndroidTarget) -> Result<()> {
    let env = resolve(opts, target);
    env.warn_missing_tools();
    run_steps(&plan_configure(opts, target))
}

pub fn make(opts: &AndroidOpts, target: AndroidTarget) -> Result<()> {
    let steps = runtime::make_steps(
        &opts.runtime,
        PRODUCT,
        target.name(),
        &["mono", "support", "data"],
    );
    run_steps(&steps)?;

    if opts.runtime.strip_libs {
        strip_libs(opts, target)?;
    }
    Ok(())
}

/// Strips installed static and shared libraries with the NDK's llvm-strip.
pub fn strip_libs(opts: &AndroidOpts, target: AndroidTarget) -> Result<()> {
    let strip = opts
        .ndk_root()
        .join("toolchains/llvm/prebuilt")
        .join(ndk_host_subpath())
        .join("bin/llvm-strip");

    let out_libs_dir = opts
        .runtime
        .product_install_dir(PRODUCT, target.name())
        .join("lib");

    let lib_files = fsutil::files_with_suffixes(&out_libs_dir, &[".a", ".so"]);
    if lib_files.is_empty() {
        return Ok(());
    }
    BuildStep::new("strip", strip)
        .arg("--strip-unneeded")
        .args(lib_files.iter().map(|p| p.display().to_string()))
        .run()
}

pub fn clean(opts: &AndroidOpts, target: AndroidTarget) -> Result<()> {
    runtime::clean(&opts.runtime, PRODUCT, target.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BaseOpts, Configuration, RuntimeOpts};
    use std::path::PathBuf;

    fn android_opts(api_version: u32, configuration: Configuration) -> AndroidOpts {
        AndroidOpts {
            runtime: RuntimeOpts {
                base: BaseOpts {
                    verbose_make: false,
                    jobs: 2,
                    configure_dir: PathBuf::from("/cfg"),
                    install_dir: PathBuf::from("/inst"),
                    runtime_source_root: PathBuf::from("/src"),
                    mxe_prefix: PathBuf::from("/usr"),
                },
                configuration,
                enable_cxx: false,
                strip_libs: true,
                ccache: None,
            },
            sdk_root: PathBuf::from("/sdk"),
            ndk_version: "23.2.8568313".to_string(),
            api_version,
            cmake_version: "3.18.1".to_string(),
        }
    }

    #[test]
    fn lookup_rejects_unknown_names() {
        assert!(AndroidTarget::lookup("arm64-v8a").is_ok());
        match AndroidTarget::lookup("bogus-target") {
            Err(BuildError::UnknownTarget { family, name }) => {
                assert_eq!(family, "android");
                assert_eq!(name, "bogus-target");
            }
            other => panic!("expected unknown target, got {:?}", other),
        }
    }

    #[test]
    fn api_version_below_minimum_is_clamped_up() {
        let opts = android_opts(16, Configuration::Release);
        assert_eq!(api_version_or_min(&opts, AndroidTarget::ArmeabiV7a), 19);
        assert_eq!(api_version_or_min(&opts, AndroidTarget::Arm64V8a), 21);

        let opts = android_opts(24, Configuration::Release);
        assert_eq!(api_version_or_min(&opts, AndroidTarget::ArmeabiV7a), 24);
    }

    #[test]
    fn clamped_api_version_reaches_the_flag_lists() {
        let opts = android_opts(16, Configuration::Release);
        let env = resolve(&opts, AndroidTarget::ArmeabiV7a);
        assert!(env.cflags.contains(&"-D__ANDROID_API__=19".to_string()));
        assert!(
            env.configure_flags
                .contains(&"--with-btls-android-api=19".to_string())
        );
    }

    #[test]
    fn armeabi_v7a_carries_its_arch_flags() {
        let opts = android_opts(19, Configuration::Release);
        let env = resolve(&opts, AndroidTarget::ArmeabiV7a);
        for flag in ["-march=armv7-a", "-mfpu=vfp", "-mfloat-abi=softfp"] {
            assert!(env.cflags.contains(&flag.to_string()), "missing {}", flag);
        }
        assert!(env.ldflags.contains(&"-Wl,--fix-cortex-a8".to_string()));
    }

    #[test]
    fn release_and_debug_optimization_flags_are_exclusive() {
        for target in AndroidTarget::ALL {
            let release = resolve(&android_opts(21, Configuration::Release), target);
            let debug = resolve(&android_opts(21, Configuration::Debug), target);

            assert_eq!(&release.cflags[..2], &["-O2", "-g"]);
            assert_eq!(
                &debug.cflags[..3],
                &["-O0", "-ggdb3", "-fno-omit-frame-pointer"]
            );
            assert!(!release.cflags.contains(&"-O0".to_string()));
            assert!(!debug.cflags.contains(&"-O2".to_string()));
        }
    }

    #[test]
    fn resolve_is_deterministic() {
        let opts = android_opts(21, Configuration::Release);
        let first = resolve(&opts, AndroidTarget::X86_64);
        let second = resolve(&opts, AndroidTarget::X86_64);
        assert_eq!(first.configure_args(), second.configure_args());
    }

    #[test]
    fn ccache_prefixes_compilers_without_replacing_them() {
        let mut opts = android_opts(21, Configuration::Release);
        opts.runtime.ccache = Some("/usr/bin/ccache".to_string());
        let env = resolve(&opts, AndroidTarget::Arm64V8a);

        let cc = env.tools.get(&Tool::Cc).unwrap().rendered();
        assert!(cc.starts_with("/usr/bin/ccache "));
        assert!(cc.contains("aarch64-linux-android21-clang"));
        // AR stays unwrapped.
        let ar = env.tools.get(&Tool::Ar).unwrap().rendered();
        assert!(!ar.contains("ccache"));
    }

    #[test]
    fn preprocessor_falls_back_to_compiler_with_explicit_flag() {
        let opts = android_opts(21, Configuration::Release);
        let env = resolve(&opts, AndroidTarget::X86);
        let cpp = env.tools.get(&Tool::Cpp).unwrap().rendered();
        assert!(cpp.ends_with("i686-linux-android21-clang -E"));
    }

    #[test]
    fn bitness_is_appended_for_x86_targets_only() {
        let opts = android_opts(21, Configuration::Release);
        let x86 = resolve(&opts, AndroidTarget::X86);
        let arm64 = resolve(&opts, AndroidTarget::Arm64V8a);
        assert_eq!(x86.cflags.last().map(String::as_str), Some("-m32"));
        assert!(!arm64.cflags.contains(&"-m64".to_string()));
        assert!(!arm64.cflags.contains(&"-m32".to_string()));
    }
}
