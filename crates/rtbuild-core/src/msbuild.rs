//! MSBuild solution builds.
//!
//! Prefers `dotnet msbuild`; falls back to a standalone `msbuild` from
//! PATH or the usual macOS framework locations.

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{BuildError, Result};
use crate::fsutil;
use crate::step::BuildStep;

fn find_msbuild() -> Option<PathBuf> {
    if env::consts::OS == "macos" {
        let hint_dirs = [
            "/Library/Frameworks/Mono.framework/Versions/Current/bin",
            "/usr/local/var/homebrew/linked/mono/bin",
        ];
        for hint_dir in hint_dirs {
            let hint_path = Path::new(hint_dir).join("msbuild");
            if hint_path.is_file() {
                return Some(hint_path);
            }
        }
    }
    fsutil::find_executable("msbuild")
}

/// Restores and builds a solution in the given configuration.
pub fn build_solution(
    solution_path: &Path,
    build_config: &str,
    extra_msbuild_args: &[String],
) -> Result<()> {
    let mut args: Vec<String> = Vec::new();

    let msbuild_path = match fsutil::find_executable("dotnet") {
        Some(dotnet) => {
            args.push("msbuild".to_string());
            dotnet
        }
        None => find_msbuild().ok_or_else(|| {
            BuildError::Config("Cannot find MSBuild executable".to_string())
        })?,
    };

    println!("MSBuild path: {}", msbuild_path.display());

    args.push(solution_path.display().to_string());
    args.push("/restore".to_string());
    args.push("/t:Build".to_string());
    args.push(format!("/p:Configuration={}", build_config));
    args.extend(extra_msbuild_args.iter().cloned());

    BuildStep::new("msbuild", msbuild_path).args(args).run()
}
