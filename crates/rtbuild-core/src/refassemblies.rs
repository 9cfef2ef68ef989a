//! Reference assemblies driver: builds and installs the API reference
//! assemblies shipped with the class library.

use crate::error::Result;
use crate::fsutil;
use crate::options::BaseOpts;
use crate::runtime;
use crate::step::BuildStep;

fn class_build_dir(opts: &BaseOpts) -> std::path::PathBuf {
    opts.runtime_source_root.join("mcs/class/reference-assemblies")
}

fn assemblies_install_dir(opts: &BaseOpts) -> std::path::PathBuf {
    opts.install_dir.join("reference-assemblies")
}

pub fn build(opts: &BaseOpts) -> Result<()> {
    fsutil::mkdir_p(&assemblies_install_dir(opts))?;

    let mut make_args = runtime::make_default_args(opts);
    make_args.extend([
        "-C".to_string(),
        class_build_dir(opts).display().to_string(),
        "build-reference-assemblies".to_string(),
    ]);
    BuildStep::new("make build-reference-assemblies", "make")
        .args(make_args)
        .run()
}

pub fn install(opts: &BaseOpts) -> Result<()> {
    let install_dir = assemblies_install_dir(opts);
    fsutil::mkdir_p(&install_dir)?;

    let mut make_args = runtime::make_default_args(opts);
    make_args.extend([
        "-C".to_string(),
        class_build_dir(opts).display().to_string(),
        "install-local".to_string(),
        format!("DESTDIR={}", install_dir.display()),
        "prefix=/".to_string(),
    ]);
    BuildStep::new("make install-local", "make").args(make_args).run()
}

pub fn clean(opts: &BaseOpts) -> Result<()> {
    fsutil::rm_rf([assemblies_install_dir(opts)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn clean_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let opts = BaseOpts {
            verbose_make: false,
            jobs: 1,
            configure_dir: dir.path().join("cfg"),
            install_dir: dir.path().join("inst"),
            runtime_source_root: PathBuf::from("/src"),
            mxe_prefix: PathBuf::from("/usr"),
        };
        std::fs::create_dir_all(assemblies_install_dir(&opts)).unwrap();
        clean(&opts).unwrap();
        clean(&opts).unwrap();
    }
}
