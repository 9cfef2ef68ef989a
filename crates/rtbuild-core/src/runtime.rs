//! Shared runtime build template.
//!
//! Every runtime product (desktop, android, ios) assembles its compile and
//! configure flag lists the same way; the per-platform resolvers fill in
//! target-specific tools and flags, then hand the environment to
//! [`apply_template`] to prepend the configuration-derived optimization
//! flags, append the bitness flag, and build the final configure flag list.
//! Flag order is load-bearing: later flags override earlier ones when the
//! downstream compiler sees them.

use std::path::PathBuf;

use crate::env::ResolvedEnvironment;
use crate::error::Result;
use crate::fsutil;
use crate::options::{BaseOpts, RuntimeOpts};
use crate::step::BuildStep;

/// Base optimization/debug flags derived from the configuration.
/// Exactly one of the two sets is ever emitted.
pub fn optimization_flags(opts: &RuntimeOpts) -> Vec<String> {
    if opts.release() {
        vec!["-O2".to_string(), "-g".to_string()]
    } else {
        vec![
            "-O0".to_string(),
            "-ggdb3".to_string(),
            "-fno-omit-frame-pointer".to_string(),
        ]
    }
}

/// Bitness flag inferred from the host triple, when inferable at all.
pub fn bitness_flag(host_triple: &str) -> Option<&'static str> {
    if host_triple.contains("i686") || host_triple.contains("i386") {
        Some("-m32")
    } else if host_triple.contains("x86_64") {
        Some("-m64")
    } else {
        None
    }
}

fn finish_flag_list(platform_flags: Vec<String>, opts: &RuntimeOpts, bitness: Option<&str>) -> Vec<String> {
    let mut flags = optimization_flags(opts);
    flags.extend(platform_flags);
    if let Some(bitness) = bitness {
        flags.push(bitness.to_string());
    }
    flags
}

/// Merges the shared runtime template into a platform-resolved environment.
///
/// On entry the flag lists hold only the platform/target-specific flags;
/// on exit each compile-flag list reads: optimization flags, platform
/// flags, bitness. The configure flag list is rebuilt as: host triple,
/// cache file, install prefix, optional `--enable-cxx`, cross-template
/// flags, platform flags, optional LLVM install path.
pub fn apply_template(
    env: &mut ResolvedEnvironment,
    opts: &RuntimeOpts,
    product: &str,
    target: &str,
    host_triple: &str,
    cross_configure_flags: &[String],
    llvm: Option<&str>,
) {
    let bitness = bitness_flag(host_triple);

    env.cflags = finish_flag_list(std::mem::take(&mut env.cflags), opts, bitness);
    env.cxxflags = finish_flag_list(std::mem::take(&mut env.cxxflags), opts, bitness);
    env.cppflags = finish_flag_list(std::mem::take(&mut env.cppflags), opts, bitness);
    env.cxxcppflags = finish_flag_list(std::mem::take(&mut env.cxxcppflags), opts, bitness);

    let platform_flags = std::mem::take(&mut env.configure_flags);
    let mut configure_flags = Vec::new();
    if !host_triple.is_empty() {
        configure_flags.push(format!("--host={}", host_triple));
    }
    configure_flags.push(format!(
        "--cache-file={}",
        opts.cache_file(product, target).display()
    ));
    configure_flags.push(format!(
        "--prefix={}",
        opts.product_install_dir(product, target).display()
    ));
    if opts.enable_cxx {
        configure_flags.push("--enable-cxx".to_string());
    }
    configure_flags.extend(cross_configure_flags.iter().cloned());
    configure_flags.extend(platform_flags);
    if let Some(llvm) = llvm {
        configure_flags.push(format!(
            "--with-llvm={}",
            opts.base.install_dir.join(format!("llvm-{}", llvm)).display()
        ));
    }
    env.configure_flags = configure_flags;
}

/// Default `make` arguments: job count, then `V=1` when verbose.
///
/// The job count must be passed explicitly; some of the runtime's
/// Makefiles re-invoke make and inherit the parent's job server settings.
pub fn make_default_args(base: &BaseOpts) -> Vec<String> {
    let mut args = vec![format!("-j{}", base.jobs)];
    if base.verbose_make {
        args.push("V=1".to_string());
    }
    args
}

/// True when the source tree has no generated `configure` script yet.
pub fn needs_autogen(base: &BaseOpts) -> bool {
    !base.runtime_source_root.join("configure").is_file()
}

/// The `autogen.sh` step that generates `configure`. `NOCONFIGURE` keeps
/// autogen from running configure itself. `CUSTOM_GLIBTOOLIZE_PATH` covers
/// hosts where libtool is installed under a non-default prefix.
pub fn autogen_step(base: &BaseOpts) -> BuildStep {
    let mut step = BuildStep::new("autogen", base.runtime_source_root.join("autogen.sh"))
        .cwd(&base.runtime_source_root)
        .env_var("NOCONFIGURE", "1");
    if fsutil::find_executable("glibtoolize").is_none() {
        if let Some(path) = std::env::var_os("CUSTOM_GLIBTOOLIZE_PATH") {
            step = step.prepend_path(PathBuf::from(path));
        }
    }
    step
}

/// The configure step for a resolved environment: the source tree's
/// `configure` run inside the per-target build directory with the rendered
/// argument list.
pub fn configure_step(
    env: &ResolvedEnvironment,
    opts: &RuntimeOpts,
    product: &str,
    target: &str,
) -> BuildStep {
    let mut step = BuildStep::new("configure", opts.base.runtime_source_root.join("configure"))
        .args(env.configure_args())
        .cwd(opts.build_dir(product, target));
    if let Some(extra) = &env.extra_path {
        step = step.append_path(extra);
    }
    step
}

/// The `make` step followed by per-component install sub-steps.
pub fn make_steps(
    opts: &RuntimeOpts,
    product: &str,
    target: &str,
    install_subdirs: &[&str],
) -> Vec<BuildStep> {
    let build_dir = opts.build_dir(product, target);

    let mut steps = vec![
        BuildStep::new("make", "make")
            .args(make_default_args(&opts.base))
            .arg("-C")
            .arg(build_dir.display().to_string()),
    ];
    for subdir in install_subdirs {
        steps.push(
            BuildStep::new(format!("make install {}", subdir), "make")
                .arg("-C")
                .arg(build_dir.join(subdir).display().to_string())
                .arg("install"),
        );
    }
    steps
}

/// Removes the per-target build directory, its autoconf cache file, and
/// its install directory. Idempotent; missing paths are fine.
pub fn clean(opts: &RuntimeOpts, product: &str, target: &str) -> Result<()> {
    fsutil::rm_rf([
        opts.build_dir(product, target),
        opts.cache_file(product, target),
        opts.product_install_dir(product, target),
    ])
}

/// Writes the environment's wrapper script, if it carries one, before any
/// of its tools run.
pub fn materialize_wrapper(env: &ResolvedEnvironment) -> Result<()> {
    if let Some(wrapper) = &env.wrapper_script {
        if let Some(parent) = wrapper.path.parent() {
            fsutil::mkdir_p(parent)?;
        }
        let script = format!(
            "#!/bin/bash\n\
             OSXCROSS_COMMAND=$1;\n\
             shift;\n\
             export LD_LIBRARY_PATH=\"${{LD_LIBRARY_PATH}}:{}\";\n\
             ${{OSXCROSS_COMMAND}} \"$@\";\n\
             exit $?;\n",
            wrapper.toolchain_lib_dir.display()
        );
        fsutil::write_executable(&wrapper.path, &script)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Configuration;
    use std::path::PathBuf;

    fn opts(configuration: Configuration) -> RuntimeOpts {
        RuntimeOpts {
            base: BaseOpts {
                verbose_make: false,
                jobs: 4,
                configure_dir: PathBuf::from("/cfg"),
                install_dir: PathBuf::from("/inst"),
                runtime_source_root: PathBuf::from("/src"),
                mxe_prefix: PathBuf::from("/usr"),
            },
            configuration,
            enable_cxx: false,
            strip_libs: true,
            ccache: None,
        }
    }

    #[test]
    fn optimization_flags_release_xor_debug() {
        let release = optimization_flags(&opts(Configuration::Release));
        let debug = optimization_flags(&opts(Configuration::Debug));
        assert_eq!(release, vec!["-O2", "-g"]);
        assert_eq!(debug, vec!["-O0", "-ggdb3", "-fno-omit-frame-pointer"]);
        for flag in &release {
            assert!(!debug.contains(flag));
        }
    }

    #[test]
    fn bitness_only_when_inferable() {
        assert_eq!(bitness_flag("i686-linux-gnu"), Some("-m32"));
        assert_eq!(bitness_flag("i386-apple-darwin11"), Some("-m32"));
        assert_eq!(bitness_flag("x86_64-w64-mingw32"), Some("-m64"));
        assert_eq!(bitness_flag("aarch64-linux-gnu"), None);
        assert_eq!(bitness_flag("armv7a-linux-androideabi"), None);
    }

    #[test]
    fn template_orders_host_cache_prefix_then_platform_flags() {
        let opts = opts(Configuration::Release);
        let mut env = ResolvedEnvironment::default();
        env.configure_flags = vec!["--disable-nls".to_string()];
        apply_template(&mut env, &opts, "desktop-linux", "x86_64", "x86_64-linux-gnu", &[], None);

        assert_eq!(env.configure_flags[0], "--host=x86_64-linux-gnu");
        assert_eq!(
            env.configure_flags[1],
            "--cache-file=/cfg/desktop-linux-x86_64-release.config.cache"
        );
        assert_eq!(
            env.configure_flags[2],
            "--prefix=/inst/desktop-linux-x86_64-release"
        );
        assert_eq!(env.configure_flags[3], "--disable-nls");
        // Bitness trails the flag lists.
        assert_eq!(env.cflags.first().map(String::as_str), Some("-O2"));
        assert_eq!(env.cflags.last().map(String::as_str), Some("-m64"));
    }

    #[test]
    fn llvm_install_path_is_appended_last() {
        let opts = opts(Configuration::Release);
        let mut env = ResolvedEnvironment::default();
        apply_template(&mut env, &opts, "desktop-linux", "x86_64", "x86_64-linux-gnu", &[], Some("llvm64"));
        assert_eq!(
            env.configure_flags.last().map(String::as_str),
            Some("--with-llvm=/inst/llvm-llvm64")
        );
    }

    #[test]
    fn make_args_carry_jobs_and_verbosity() {
        let mut base = opts(Configuration::Release).base;
        assert_eq!(make_default_args(&base), vec!["-j4"]);
        base.verbose_make = true;
        assert_eq!(make_default_args(&base), vec!["-j4", "V=1"]);
    }

    #[test]
    fn make_steps_install_each_component() {
        let opts = opts(Configuration::Release);
        let steps = make_steps(&opts, "android", "x86", &["mono", "support", "data"]);
        let names: Vec<_> = steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "make",
                "make install mono",
                "make install support",
                "make install data"
            ]
        );
    }

    #[test]
    fn clean_twice_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut opts = opts(Configuration::Release);
        opts.base.configure_dir = dir.path().join("cfg");
        opts.base.install_dir = dir.path().join("inst");
        std::fs::create_dir_all(opts.build_dir("android", "x86")).unwrap();
        std::fs::create_dir_all(opts.product_install_dir("android", "x86")).unwrap();

        clean(&opts, "android", "x86").unwrap();
        assert!(!opts.build_dir("android", "x86").exists());
        clean(&opts, "android", "x86").unwrap();
    }
}
