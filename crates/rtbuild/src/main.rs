//! Cross-compilation driver CLI for building managed runtime toolchains.
//!
//! One subcommand per platform family; each takes a positional action
//! (`configure`, `make`, `clean`, `env`) and one or more `--target`
//! selections, expands shortcuts like `all-targets`, and drives the
//! per-target build sequentially. The first failure aborts the remaining
//! targets and exits non-zero; completed targets' outputs stay on disk.

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand, ValueEnum};

use rtbuild_core::android::{self, AndroidTarget};
use rtbuild_core::bcl::{self, BclProduct};
use rtbuild_core::desktop::{self, DesktopPlatform};
use rtbuild_core::ios::{self, IosTarget};
use rtbuild_core::llvm::{self, LlvmTarget};
use rtbuild_core::options::{
    AndroidOpts, BaseOpts, BclOpts, Configuration, DesktopOpts, IosOpts, RuntimeOpts, require_dir,
};
use rtbuild_core::orchestrator::{expand_targets, run_targets};
use rtbuild_core::refassemblies;
use rtbuild_core::wasm::{self, WasmOpts, WasmTarget};
use rtbuild_core::{BuildError, ResolvedEnvironment};

mod config;
use config::RtbuildConfig;

const DEFAULT_NDK_VERSION: &str = "23.2.8568313";
const DEFAULT_ANDROID_CMAKE_VERSION: &str = "3.18.1";
const DEFAULT_XCODE_TOOLCHAIN: &str =
    "/Applications/Xcode.app/Contents/Developer/Toolchains/XcodeDefault.xctoolchain";

/// Builds the managed runtime for desktop, Android, iOS, and WebAssembly
/// targets by driving the runtime source tree's own build system.
#[derive(Parser, Debug)]
#[command(
    name = "rtbuild",
    version,
    about = "Cross-compilation driver for managed runtime toolchains",
    after_help = "environment variables:\n    \
        RUNTIME_SOURCE_ROOT: Overrides default value for --runtime-sources\n    \
        ANDROID_SDK_ROOT: Overrides default value for --android-sdk\n    \
        CCACHE: Compiler cache command prepended to CC/CXX\n    \
        OSXCROSS_ROOT: osxcross toolchain root for macOS cross builds\n    \
        EM_CONFIG: Emscripten configuration file for wasm builds"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the runtime for Android.
    Android {
        #[arg(value_enum)]
        action: Action,
        #[arg(long = "target", required = true, help = "Target name or 'all-targets'")]
        targets: Vec<String>,
        #[arg(long, help = "Android SDK root (env: ANDROID_SDK_ROOT)")]
        android_sdk: Option<PathBuf>,
        #[arg(long)]
        android_ndk_version: Option<String>,
        #[arg(long, help = "Requested API level; clamped up to the target minimum")]
        android_api_version: Option<u32>,
        #[arg(long)]
        android_cmake_version: Option<String>,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Build the runtime for the desktop.
    Desktop {
        #[arg(value_enum)]
        action: Action,
        #[arg(long, value_enum, help = "Defaults to the host platform")]
        target_platform: Option<DesktopPlatformArg>,
        #[arg(long = "target", required = true, help = "Target name or 'all-targets'")]
        targets: Vec<String>,
        #[arg(long, help = "Link the runtime against the built LLVM backend")]
        with_llvm: bool,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Build the runtime for iOS devices, simulators, and AOT cross-compilers.
    Ios {
        #[arg(value_enum)]
        action: Action,
        #[arg(
            long = "target",
            required = true,
            help = "Target name or 'all-device'/'all-sim'/'all-cross'"
        )]
        targets: Vec<String>,
        #[arg(long)]
        ios_toolchain: Option<PathBuf>,
        #[arg(long, help = "iOS SDK sysroot; auto-detected through xcrun on macOS")]
        ios_sdk: Option<PathBuf>,
        #[arg(long)]
        ios_version_min: Option<String>,
        #[arg(long)]
        osx_toolchain: Option<PathBuf>,
        #[arg(long)]
        osx_sdk: Option<PathBuf>,
        #[arg(long, help = "Triple ABI suffix of the osxcross toolchain binaries")]
        osx_triple_abi: Option<String>,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Build the runtime for WebAssembly through emscripten.
    Wasm {
        #[arg(value_enum)]
        action: Action,
        #[arg(long = "target", required = true, help = "Target name or 'all-runtime'")]
        targets: Vec<String>,
        #[command(flatten)]
        runtime: RuntimeArgs,
    },
    /// Build the class libraries (BCL) for one or more products.
    Bcl {
        #[arg(value_enum)]
        action: MakeCleanAction,
        #[arg(long = "product", required = true)]
        products: Vec<String>,
        #[arg(long, help = "Also build the test profiles")]
        tests: bool,
        #[arg(
            long,
            default_value_t = true,
            action = clap::ArgAction::Set,
            value_parser = clap::builder::BoolishValueParser::new(),
            help = "Strip *.pdb debug files from the installed profiles"
        )]
        remove_pdb: bool,
        #[command(flatten)]
        base: BaseArgs,
    },
    /// Build the LLVM backend used by the AOT compilers.
    Llvm {
        #[arg(value_enum)]
        action: MakeCleanAction,
        #[arg(long = "target", required = true)]
        targets: Vec<String>,
        #[command(flatten)]
        base: BaseArgs,
    },
    /// Build and install the API reference assemblies.
    RefAssemblies {
        #[arg(value_enum)]
        action: RefAction,
        #[command(flatten)]
        base: BaseArgs,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    Configure,
    Make,
    Clean,
    /// Print the resolved build environment as JSON without running anything.
    Env,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum MakeCleanAction {
    Make,
    Clean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum RefAction {
    Build,
    Install,
    Clean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ConfigurationArg {
    Release,
    Debug,
}

impl From<ConfigurationArg> for Configuration {
    fn from(arg: ConfigurationArg) -> Self {
        match arg {
            ConfigurationArg::Release => Configuration::Release,
            ConfigurationArg::Debug => Configuration::Debug,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DesktopPlatformArg {
    Linux,
    Windows,
    Osx,
}

impl From<DesktopPlatformArg> for DesktopPlatform {
    fn from(arg: DesktopPlatformArg) -> Self {
        match arg {
            DesktopPlatformArg::Linux => DesktopPlatform::Linux,
            DesktopPlatformArg::Windows => DesktopPlatform::Windows,
            DesktopPlatformArg::Osx => DesktopPlatform::Osx,
        }
    }
}

/// Flags shared by every subcommand.
#[derive(Args, Debug)]
struct BaseArgs {
    #[arg(long, help = "Pass V=1 to make")]
    verbose_make: bool,
    /// Job count for make. Bare `-j` uses all host cores; the default is 1.
    #[arg(long, short = 'j', num_args = 0..=1, value_name = "N")]
    jobs: Option<Option<u32>>,
    #[arg(long, help = "Build directory root (default: ~/runtime-configs)")]
    configure_dir: Option<PathBuf>,
    #[arg(long, help = "Install directory root (default: ~/runtime-installs)")]
    install_dir: Option<PathBuf>,
    #[arg(long, help = "Runtime source tree (env: RUNTIME_SOURCE_ROOT)")]
    runtime_sources: Option<PathBuf>,
    #[arg(long, help = "MinGW cross toolchain prefix (default: /usr)")]
    mxe_prefix: Option<PathBuf>,
}

/// Flags shared by the runtime subcommands.
#[derive(Args, Debug)]
struct RuntimeArgs {
    #[command(flatten)]
    base: BaseArgs,
    #[arg(long, value_enum, default_value_t = ConfigurationArg::Release)]
    configuration: ConfigurationArg,
    #[arg(long)]
    enable_cxx: bool,
    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        value_parser = clap::builder::BoolishValueParser::new(),
        help = "Strip the libraries if possible after running make"
    )]
    strip_libs: bool,
}

fn home_dir() -> Result<PathBuf> {
    env::var_os("HOME")
        .map(PathBuf::from)
        .context("the HOME environment variable is not set")
}

/// Paths must be absolute before any step changes working directories.
fn abspath(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        cwd.join(path)
    }
}

fn base_opts(args: &BaseArgs, config: &RtbuildConfig, cwd: &Path) -> Result<BaseOpts> {
    let home = home_dir()?;
    let runtime_sources = args
        .runtime_sources
        .clone()
        .or_else(|| env::var_os("RUNTIME_SOURCE_ROOT").map(PathBuf::from))
        .or_else(|| config.paths.runtime_sources.clone())
        .context("runtime sources not set; pass --runtime-sources or set RUNTIME_SOURCE_ROOT")?;

    let jobs = match args.jobs {
        None => 1,
        Some(None) => std::thread::available_parallelism()
            .map(|n| n.get() as u32)
            .unwrap_or(1),
        Some(Some(n)) => n,
    };

    let configure_dir = args
        .configure_dir
        .clone()
        .or_else(|| config.paths.configure_dir.clone())
        .unwrap_or_else(|| home.join("runtime-configs"));
    let install_dir = args
        .install_dir
        .clone()
        .or_else(|| config.paths.install_dir.clone())
        .unwrap_or_else(|| home.join("runtime-installs"));
    let mxe_prefix = args
        .mxe_prefix
        .clone()
        .or_else(|| config.paths.mxe_prefix.clone())
        .unwrap_or_else(|| PathBuf::from("/usr"));

    Ok(BaseOpts {
        verbose_make: args.verbose_make,
        jobs,
        configure_dir: abspath(&configure_dir, cwd),
        install_dir: abspath(&install_dir, cwd),
        runtime_source_root: abspath(&runtime_sources, cwd),
        mxe_prefix: abspath(&mxe_prefix, cwd),
    })
}

fn runtime_opts(args: &RuntimeArgs, config: &RtbuildConfig, cwd: &Path) -> Result<RuntimeOpts> {
    Ok(RuntimeOpts {
        base: base_opts(&args.base, config, cwd)?,
        configuration: args.configuration.into(),
        enable_cxx: args.enable_cxx,
        strip_libs: args.strip_libs,
        ccache: env::var("CCACHE").ok().filter(|s| !s.is_empty()),
    })
}

fn print_env(env: &ResolvedEnvironment) -> rtbuild_core::Result<()> {
    let json = serde_json::to_string_pretty(env)
        .map_err(|e| BuildError::Config(format!("cannot serialize environment: {}", e)))?;
    println!("{}", json);
    Ok(())
}

fn run_android(
    action: Action,
    targets: &[String],
    opts: &AndroidOpts,
) -> Result<()> {
    if matches!(action, Action::Configure | Action::Make) {
        require_dir(
            &opts.runtime.base.runtime_source_root,
            "Runtime sources directory",
        )?;
        android::ensure_ndk(opts)?;
        android::ensure_cmake(opts)?;
    }

    let all: Vec<&str> = AndroidTarget::ALL.iter().map(|t| t.name()).collect();
    let expanded = expand_targets(targets, &[("all-targets", all.as_slice())]);

    run_targets(&expanded, AndroidTarget::lookup, |target| match action {
        Action::Configure => android::configure(opts, target),
        Action::Make => android::make(opts, target),
        Action::Clean => android::clean(opts, target),
        Action::Env => print_env(&android::resolve(opts, target)),
    })?;
    Ok(())
}

fn run_desktop(
    action: Action,
    platform: DesktopPlatform,
    targets: &[String],
    opts: &DesktopOpts,
) -> Result<()> {
    if matches!(action, Action::Configure | Action::Make) {
        require_dir(
            &opts.runtime.base.runtime_source_root,
            "Runtime sources directory",
        )?;
        if platform == DesktopPlatform::Osx
            && env::consts::OS != "macos"
            && opts.osxcross_root.is_none()
        {
            bail!(
                "The 'OSXCROSS_ROOT' environment variable is required for cross-compiling to macOS"
            );
        }
        if desktop::is_cross_compiling(platform) && env::consts::OS == "macos" {
            bail!("Cross-compiling from macOS is not supported");
        }
    }

    let all: Vec<&str> = desktop::targets(platform).iter().map(|t| t.name()).collect();
    let expanded = expand_targets(targets, &[("all-targets", all.as_slice())]);

    run_targets(
        &expanded,
        |name| desktop::lookup(platform, name),
        |target| match action {
            Action::Configure => desktop::configure(opts, platform, target),
            Action::Make => desktop::make(opts, platform, target),
            Action::Clean => desktop::clean(opts, platform, target),
            Action::Env => print_env(&desktop::resolve(opts, platform, target)?),
        },
    )?;
    Ok(())
}

fn run_ios(action: Action, targets: &[String], opts: &IosOpts) -> Result<()> {
    if matches!(action, Action::Configure | Action::Make) {
        require_dir(
            &opts.runtime.base.runtime_source_root,
            "Runtime sources directory",
        )?;
    }

    let device: Vec<&str> = IosTarget::DEVICE.iter().map(|t| t.name()).collect();
    let sim: Vec<&str> = IosTarget::SIMULATOR.iter().map(|t| t.name()).collect();
    let cross: Vec<&str> = IosTarget::CROSS.iter().map(|t| t.name()).collect();
    let expanded = expand_targets(
        targets,
        &[
            ("all-device", device.as_slice()),
            ("all-sim", sim.as_slice()),
            ("all-cross", cross.as_slice()),
        ],
    );

    run_targets(&expanded, IosTarget::lookup, |target| match action {
        Action::Configure => ios::configure(opts, target),
        Action::Make => ios::make(opts, target),
        Action::Clean => ios::clean(opts, target),
        Action::Env => print_env(&ios::resolve(opts, target)?),
    })?;
    Ok(())
}

fn run_wasm(action: Action, targets: &[String], opts: &WasmOpts) -> Result<()> {
    if matches!(action, Action::Configure | Action::Make) {
        require_dir(
            &opts.runtime.base.runtime_source_root,
            "Runtime sources directory",
        )?;
    }

    let all: Vec<&str> = WasmTarget::ALL.iter().map(|t| t.name()).collect();
    let expanded = expand_targets(targets, &[("all-runtime", all.as_slice())]);

    run_targets(&expanded, WasmTarget::lookup, |target| match action {
        Action::Configure => wasm::configure(opts, target),
        Action::Make => wasm::make(opts, target),
        Action::Clean => wasm::clean(opts, target),
        Action::Env => print_env(&wasm::resolve(opts, target)),
    })?;
    Ok(())
}

fn default_desktop_platform() -> Result<DesktopPlatform> {
    match env::consts::OS {
        "linux" => Ok(DesktopPlatform::Linux),
        "macos" => Ok(DesktopPlatform::Osx),
        "windows" => Ok(DesktopPlatform::Windows),
        other => bail!(
            "unsupported host platform '{}'; pass --target-platform explicitly",
            other
        ),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let cwd = env::current_dir()?;
    let file_config = RtbuildConfig::find_and_load(&cwd)?
        .map(|(config, path)| {
            println!("Using configuration from {}", path.display());
            config
        })
        .unwrap_or_default();

    match cli.command {
        Command::Android {
            action,
            targets,
            android_sdk,
            android_ndk_version,
            android_api_version,
            android_cmake_version,
            runtime,
        } => {
            let sdk_root = match android_sdk
                .or_else(|| env::var_os("ANDROID_SDK_ROOT").map(PathBuf::from))
                .or_else(|| file_config.android.sdk_root.clone())
            {
                Some(path) => path,
                None => home_dir()?.join("Android/Sdk"),
            };

            let opts = AndroidOpts {
                runtime: runtime_opts(&runtime, &file_config, &cwd)?,
                sdk_root: abspath(&sdk_root, &cwd),
                ndk_version: android_ndk_version
                    .or_else(|| file_config.android.ndk_version.clone())
                    .unwrap_or_else(|| DEFAULT_NDK_VERSION.to_string()),
                api_version: android_api_version
                    .or(file_config.android.api_version)
                    .unwrap_or_else(|| AndroidTarget::ArmeabiV7a.min_api_version()),
                cmake_version: android_cmake_version
                    .or_else(|| file_config.android.cmake_version.clone())
                    .unwrap_or_else(|| DEFAULT_ANDROID_CMAKE_VERSION.to_string()),
            };
            run_android(action, &targets, &opts)
        }
        Command::Desktop {
            action,
            target_platform,
            targets,
            with_llvm,
            runtime,
        } => {
            let platform = match target_platform {
                Some(arg) => arg.into(),
                None => default_desktop_platform()?,
            };
            let opts = DesktopOpts {
                runtime: runtime_opts(&runtime, &file_config, &cwd)?,
                with_llvm,
                osxcross_root: env::var_os("OSXCROSS_ROOT").map(PathBuf::from),
                osxcross_sdk: env::var("OSXCROSS_SDK").ok(),
            };
            run_desktop(action, platform, &targets, &opts)
        }
        Command::Ios {
            action,
            targets,
            ios_toolchain,
            ios_sdk,
            ios_version_min,
            osx_toolchain,
            osx_sdk,
            osx_triple_abi,
            runtime,
        } => {
            let opts = IosOpts {
                runtime: runtime_opts(&runtime, &file_config, &cwd)?,
                ios_toolchain_path: ios_toolchain
                    .or_else(|| file_config.ios.toolchain.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_XCODE_TOOLCHAIN)),
                ios_sdk_path: ios_sdk.or_else(|| file_config.ios.sdk.clone()),
                ios_version_min: ios_version_min
                    .or_else(|| file_config.ios.version_min.clone())
                    .unwrap_or_else(|| "10.0".to_string()),
                osx_toolchain_path: osx_toolchain
                    .or_else(|| file_config.ios.osx_toolchain.clone())
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_XCODE_TOOLCHAIN)),
                osx_sdk_path: osx_sdk.or_else(|| file_config.ios.osx_sdk.clone()),
                osx_triple_abi: osx_triple_abi
                    .or_else(|| file_config.ios.osx_triple_abi.clone())
                    .unwrap_or_else(|| "darwin18".to_string()),
                libclang_path: env::var_os("LIBCLANG_PATH").map(PathBuf::from),
            };
            run_ios(action, &targets, &opts)
        }
        Command::Wasm {
            action,
            targets,
            runtime,
        } => {
            let opts = WasmOpts {
                runtime: runtime_opts(&runtime, &file_config, &cwd)?,
                em_config: env::var_os("EM_CONFIG").map(PathBuf::from),
                home: home_dir()?,
            };
            run_wasm(action, &targets, &opts)
        }
        Command::Bcl {
            action,
            products,
            tests,
            remove_pdb,
            base,
        } => {
            let opts = BclOpts {
                base: base_opts(&base, &file_config, &cwd)?,
                tests,
                remove_pdb,
            };
            if action == MakeCleanAction::Make {
                require_dir(&opts.base.runtime_source_root, "Runtime sources directory")?;
            }
            run_targets(&products, BclProduct::lookup, |product| match action {
                MakeCleanAction::Make => bcl::make_product(&opts, product),
                MakeCleanAction::Clean => bcl::clean_product(&opts, product),
            })?;
            Ok(())
        }
        Command::Llvm {
            action,
            targets,
            base,
        } => {
            let opts = base_opts(&base, &file_config, &cwd)?;
            if action == MakeCleanAction::Make {
                require_dir(&opts.runtime_source_root, "Runtime sources directory")?;
            }
            run_targets(&targets, LlvmTarget::lookup, |target| match action {
                MakeCleanAction::Make => llvm::make(&opts, target),
                MakeCleanAction::Clean => llvm::clean(&opts, target),
            })?;
            Ok(())
        }
        Command::RefAssemblies { action, base } => {
            let opts = base_opts(&base, &file_config, &cwd)?;
            match action {
                RefAction::Build => refassemblies::build(&opts)?,
                RefAction::Install => refassemblies::install(&opts)?,
                RefAction::Clean => refassemblies::clean(&opts)?,
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_a_representative_android_invocation() {
        let cli = Cli::try_parse_from([
            "rtbuild",
            "android",
            "configure",
            "--target",
            "arm64-v8a",
            "--target",
            "x86",
            "--runtime-sources",
            "/work/runtime",
            "--configuration",
            "debug",
            "-j",
            "8",
        ])
        .unwrap();
        match cli.command {
            Command::Android {
                action,
                targets,
                runtime,
                ..
            } => {
                assert_eq!(action, Action::Configure);
                assert_eq!(targets, vec!["arm64-v8a", "x86"]);
                assert_eq!(runtime.configuration, ConfigurationArg::Debug);
                assert_eq!(runtime.base.jobs, Some(Some(8)));
                assert!(runtime.strip_libs);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn strip_libs_accepts_boolish_values() {
        let cli = Cli::try_parse_from([
            "rtbuild",
            "ios",
            "make",
            "--target",
            "arm64",
            "--strip-libs",
            "no",
        ])
        .unwrap();
        match cli.command {
            Command::Ios { runtime, .. } => assert!(!runtime.strip_libs),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn bare_jobs_flag_means_all_cores() {
        let cli = Cli::try_parse_from([
            "rtbuild", "wasm", "make", "--target", "runtime", "-j",
        ])
        .unwrap();
        match cli.command {
            Command::Wasm { runtime, .. } => assert_eq!(runtime.base.jobs, Some(None)),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn missing_target_flag_is_a_parse_error() {
        assert!(Cli::try_parse_from(["rtbuild", "android", "configure"]).is_err());
    }
}
