//! WebAssembly build driver.
//!
//! Builds run through the emscripten wrappers (`emconfigure`/`emmake`)
//! with the active emsdk prepended to `PATH`. Unlike the other runtime
//! products, the compile flags travel inside the configure flag list as
//! `CFLAGS=...` entries; there is no tool table since emscripten provides
//! the whole toolchain.

use std::path::PathBuf;

use crate::env::ResolvedEnvironment;
use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::options::RuntimeOpts;
use crate::runtime;
use crate::step::{BuildStep, run_steps};

pub const PRODUCT: &str = "wasm";

/// WASM options: the runtime options plus the emscripten configuration
/// location, captured from `$EM_CONFIG`/`$HOME` at startup.
#[derive(Debug, Clone)]
pub struct WasmOpts {
    pub runtime: RuntimeOpts,
    pub em_config: Option<PathBuf>,
    pub home: PathBuf,
}

impl WasmOpts {
    pub fn emsdk_root(&self) -> Result<PathBuf> {
        fsutil::emsdk_root(self.em_config.as_deref(), &self.home)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WasmTarget {
    Runtime,
    RuntimeThreads,
    RuntimeDynamic,
}

impl WasmTarget {
    pub const ALL: [WasmTarget; 3] = [
        WasmTarget::Runtime,
        WasmTarget::RuntimeThreads,
        WasmTarget::RuntimeDynamic,
    ];

    pub fn lookup(name: &str) -> Result<Self> {
        match name {
            "runtime" => Ok(WasmTarget::Runtime),
            "runtime-threads" => Ok(WasmTarget::RuntimeThreads),
            "runtime-dynamic" => Ok(WasmTarget::RuntimeDynamic),
            _ => Err(BuildError::UnknownTarget {
                family: "wasm",
                name: name.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            WasmTarget::Runtime => "runtime",
            WasmTarget::RuntimeThreads => "runtime-threads",
            WasmTarget::RuntimeDynamic => "runtime-dynamic",
        }
    }

    fn extra_cflags(&self) -> &'static [&'static str] {
        match self {
            WasmTarget::Runtime => &[],
            WasmTarget::RuntimeThreads => &["-s", "USE_PTHREADS=1", "-pthread"],
            WasmTarget::RuntimeDynamic => &["-s", "WASM_OBJECT_FILES=0"],
        }
    }
}

/// WASM optimizes for size in release builds.
fn optimization_flags(opts: &RuntimeOpts) -> Vec<String> {
    if opts.release() {
        vec!["-Os".to_string(), "-g".to_string()]
    } else {
        vec![
            "-O0".to_string(),
            "-ggdb3".to_string(),
            "-fno-omit-frame-pointer".to_string(),
        ]
    }
}

pub fn resolve(opts: &WasmOpts, target: WasmTarget) -> ResolvedEnvironment {
    let rt = &opts.runtime;
    let mut env = ResolvedEnvironment::default();

    let mut cflags = vec!["-fexceptions".to_string()];
    cflags.extend(optimization_flags(rt));
    let mut cxxflags = cflags.clone();
    cxxflags.extend(["-s".to_string(), "DISABLE_EXCEPTION_CATCHING=0".to_string()]);

    cflags.extend(target.extra_cflags().iter().map(|s| s.to_string()));
    cxxflags.extend(target.extra_cflags().iter().map(|s| s.to_string()));

    let mut configure_flags: Vec<String> = [
        "--disable-mcs-build",
        "--disable-nls",
        "--disable-boehm",
        "--disable-btls",
        "--with-lazy-gc-thread-creation=yes",
        "--with-libgc=none",
        "--disable-executables",
        "--disable-support-build",
        "--disable-visibility-hidden",
        "--enable-maintainer-mode",
        "--enable-minimal=ssa,com,jit,reflection_emit_save,portability,assembly_remapping,attach,\
         verifier,full_messages,appdomains,security,sgen_marksweep_conc,sgen_split_nursery,\
         sgen_gc_bridge,logging,remoting,shared_perfcounters,sgen_debug_helpers,soft_debug,\
         interpreter,assert_messages,cleanup,mdb,gac",
        "--host=wasm32",
        "--enable-llvm-runtime",
        "--enable-icall-export",
        "--disable-icall-tables",
        "--disable-crash-reporting",
        "--with-bitcode=yes",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if rt.enable_cxx {
        configure_flags.push("--enable-cxx".to_string());
    }

    configure_flags.push(format!(
        "--cache-file={}",
        rt.cache_file(PRODUCT, target.name()).display()
    ));
    configure_flags.push(format!(
        "--prefix={}",
        rt.product_install_dir(PRODUCT, target.name()).display()
    ));
    configure_flags.push(format!("CFLAGS={}", cflags.join(" ")));
    configure_flags.push(format!("CXXFLAGS={}", cxxflags.join(" ")));

    env.ac_vars = vec!["ac_cv_func_shm_open_working_with_mmap=no".to_string()];
    env.cflags = cflags;
    env.cxxflags = cxxflags;
    env.configure_flags = configure_flags;
    env
}

pub fn configure(opts: &WasmOpts, target: WasmTarget) -> Result<()> {
    let env = resolve(opts, target);
    let emsdk_root = opts.emsdk_root()?;
    let rt = &opts.runtime;

    let mut steps = Vec::new();
    if runtime::needs_autogen(&rt.base) {
        steps.push(runtime::autogen_step(&rt.base));
    }

    // emconfigure drives the real configure script with the emscripten
    // toolchain substituted in.
    let mut args = vec![rt.base.runtime_source_root.join("configure").display().to_string()];
    args.extend(env.ac_vars.iter().cloned());
    args.extend(env.configure_flags.iter().cloned());
    steps.push(
        BuildStep::new("configure", "emconfigure")
            .args(args)
            .cwd(rt.build_dir(PRODUCT, target.name()))
            .prepend_path(&emsdk_root),
    );

    run_steps(&steps)
}

const SUPPORT_HEADERS: [&str; 10] = [
    "crc32.h",
    "deflate.h",
    "inffast.h",
    "inffixed.h",
    "inflate.h",
    "inftrees.h",
    "trees.h",
    "zconf.h",
    "zlib.h",
    "zutil.h",
];

const WASM_SRC_FILES: [&str; 7] = [
    "driver.c",
    "corebindings.c",
    "zlib-helper.c",
    "pinvoke-tables-default.h",
    "library_mono.js",
    "binding_support.js",
    "dotnet_support.js",
];

pub fn make(opts: &WasmOpts, target: WasmTarget) -> Result<()> {
    let emsdk_root = opts.emsdk_root()?;
    let rt = &opts.runtime;
    let build_dir = rt.build_dir(PRODUCT, target.name());
    let install_dir = rt.product_install_dir(PRODUCT, target.name());

    let mut make_args = vec!["make".to_string()];
    make_args.extend(runtime::make_default_args(&rt.base));
    make_args.push("-C".to_string());
    make_args.push(build_dir.display().to_string());

    let steps = vec![
        BuildStep::new("make", "emmake")
            .args(make_args)
            .prepend_path(&emsdk_root),
        BuildStep::new("make install mono", "make")
            .arg("-C")
            .arg(build_dir.join("mono").display().to_string())
            .arg("install"),
        BuildStep::new("make install data", "make")
            .arg("-C")
            .arg(build_dir.join("data").display().to_string())
            .arg("install"),
    ];
    run_steps(&steps)?;

    copy_support_headers(rt, &install_dir)?;
    copy_wasm_sources(rt, &install_dir)?;
    Ok(())
}

/// Installs the zlib support headers the downstream SDK build includes.
fn copy_support_headers(rt: &RuntimeOpts, install_dir: &std::path::Path) -> Result<()> {
    let source_root = &rt.base.runtime_source_root;
    let hints = [source_root.join("mono/zlib"), source_root.join("support")];
    let src_dir = hints
        .iter()
        .find(|dir| dir.join("zlib.h").is_file())
        .ok_or_else(|| {
            BuildError::Config(format!(
                "Cannot find the support zlib headers in the runtime source tree. Tried: {:?}",
                hints
            ))
        })?;

    let dst_dir = install_dir.join("include/support");
    fsutil::mkdir_p(&dst_dir)?;
    for header in SUPPORT_HEADERS {
        std::fs::copy(src_dir.join(header), dst_dir.join(header))?;
    }
    Ok(())
}

/// Installs the wasm glue sources (driver, bindings, JS support) next to
/// the built runtime.
fn copy_wasm_sources(rt: &RuntimeOpts, install_dir: &std::path::Path) -> Result<()> {
    let source_root = &rt.base.runtime_source_root;
    let hints = [
        source_root.join("sdks/wasm/src"),
        source_root.join("sdks/wasm/support"),
        source_root.join("sdks/wasm"),
    ];
    let dir_with_file = |file: &str| hints.iter().find(|dir| dir.join(file).is_file());

    let dst_dir = install_dir.join("src");
    fsutil::mkdir_p(&dst_dir)?;

    for file in WASM_SRC_FILES {
        let src_dir = dir_with_file(file).ok_or_else(|| {
            BuildError::Config(format!("File '{}' not found. Probed locations: {:?}", file, hints))
        })?;
        std::fs::copy(src_dir.join(file), dst_dir.join(file))?;
    }

    // Older runtime versions predate .NET Core support.
    if let Some(src_dir) = dir_with_file("pinvoke-tables-default-netcore.h") {
        std::fs::copy(
            src_dir.join("pinvoke-tables-default-netcore.h"),
            dst_dir.join("pinvoke-tables-default-netcore.h"),
        )?;
    }
    Ok(())
}

pub fn clean(opts: &WasmOpts, target: WasmTarget) -> Result<()> {
    runtime::clean(&opts.runtime, PRODUCT, target.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{BaseOpts, Configuration};

    fn wasm_opts(configuration: Configuration) -> WasmOpts {
        WasmOpts {
            runtime: RuntimeOpts {
                base: BaseOpts {
                    verbose_make: false,
                    jobs: 1,
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
            em_config: None,
            home: PathBuf::from("/home/builder"),
        }
    }

    #[test]
    fn release_optimizes_for_size() {
        let env = resolve(&wasm_opts(Configuration::Release), WasmTarget::Runtime);
        assert_eq!(&env.cflags[..3], &["-fexceptions", "-Os", "-g"]);

        let debug = resolve(&wasm_opts(Configuration::Debug), WasmTarget::Runtime);
        assert_eq!(
            &debug.cflags[..4],
            &["-fexceptions", "-O0", "-ggdb3", "-fno-omit-frame-pointer"]
        );
    }

    #[test]
    fn threads_variant_enables_pthreads() {
        let env = resolve(&wasm_opts(Configuration::Release), WasmTarget::RuntimeThreads);
        assert!(env.cflags.contains(&"USE_PTHREADS=1".to_string()));
        assert!(env.cflags.contains(&"-pthread".to_string()));
    }

    #[test]
    fn configure_flags_embed_the_compile_flags() {
        let env = resolve(&wasm_opts(Configuration::Release), WasmTarget::Runtime);
        assert!(env.configure_flags.contains(&"--host=wasm32".to_string()));
        assert!(
            env.configure_flags
                .iter()
                .any(|f| f.starts_with("CFLAGS=-fexceptions -Os -g"))
        );
        assert!(
            env.configure_flags
                .contains(&"--cache-file=/cfg/wasm-runtime-release.config.cache".to_string())
        );
    }

    #[test]
    fn cxxflags_keep_exception_catching_enabled() {
        let env = resolve(&wasm_opts(Configuration::Release), WasmTarget::Runtime);
        assert!(
            env.cxxflags
                .windows(2)
                .any(|w| w == ["-s", "DISABLE_EXCEPTION_CATCHING=0"])
        );
    }

    #[test]
    fn resolve_is_deterministic() {
        let opts = wasm_opts(Configuration::Release);
        assert_eq!(
            resolve(&opts, WasmTarget::RuntimeDynamic).configure_flags,
            resolve(&opts, WasmTarget::RuntimeDynamic).configure_flags
        );
    }
}
