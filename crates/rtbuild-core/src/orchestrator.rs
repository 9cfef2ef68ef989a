//! Target-list expansion and the sequential per-target run loop.

use crate::error::Result;

/// Expands shortcut names (e.g. `all-targets`) into their members and
/// deduplicates while preserving first-seen order. Shortcut members come
/// first, in shortcut-table order; explicitly named targets follow.
pub fn expand_targets(input: &[String], shortcuts: &[(&str, &[&str])]) -> Vec<String> {
    let mut targets: Vec<String> = Vec::new();

    for (shortcut, members) in shortcuts {
        if input.iter().any(|t| t == shortcut) {
            for member in *members {
                if !targets.iter().any(|t| t == member) {
                    targets.push((*member).to_string());
                }
            }
        }
    }

    for name in input {
        if shortcuts.iter().any(|(shortcut, _)| shortcut == name) {
            continue;
        }
        if !targets.iter().any(|t| t == name) {
            targets.push(name.clone());
        }
    }

    targets
}

/// Runs `action` for each named target in order, resolving names through
/// `lookup` as they come up. The first error aborts the remaining targets;
/// outputs of already-completed targets are left in place.
pub fn run_targets<T>(
    names: &[String],
    lookup: impl Fn(&str) -> Result<T>,
    action: impl Fn(T) -> Result<()>,
) -> Result<()> {
    for name in names {
        let target = lookup(name)?;
        action(target)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::android::AndroidTarget;
    use crate::error::BuildError;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn shortcut_expands_to_members_in_table_order() {
        let shortcuts: &[(&str, &[&str])] =
            &[("all-targets", &["armeabi-v7a", "arm64-v8a", "x86", "x86_64"])];
        let expanded = expand_targets(&strings(&["all-targets"]), shortcuts);
        assert_eq!(expanded, strings(&["armeabi-v7a", "arm64-v8a", "x86", "x86_64"]));
    }

    #[test]
    fn explicit_targets_are_deduplicated_preserving_order() {
        let shortcuts: &[(&str, &[&str])] = &[("all-sim", &["i386", "x86_64"])];
        let expanded = expand_targets(&strings(&["x86_64", "all-sim", "armv7", "x86_64"]), shortcuts);
        // Shortcut members first, then the remaining explicit names.
        assert_eq!(expanded, strings(&["i386", "x86_64", "armv7"]));
    }

    #[test]
    fn no_shortcut_passes_input_through() {
        let expanded = expand_targets(&strings(&["x86", "arm64-v8a"]), &[]);
        assert_eq!(expanded, strings(&["x86", "arm64-v8a"]));
    }

    #[test]
    fn unknown_target_aborts_after_earlier_targets_completed() {
        let dir = tempfile::tempdir().unwrap();
        let processed = dir.path().to_path_buf();

        let result = run_targets(
            &strings(&["x86", "bogus-target"]),
            AndroidTarget::lookup,
            |target| {
                std::fs::write(processed.join(target.name()), b"done")?;
                Ok(())
            },
        );

        match result {
            Err(BuildError::UnknownTarget { family, name }) => {
                assert_eq!(family, "android");
                assert_eq!(name, "bogus-target");
            }
            other => panic!("expected unknown target, got {:?}", other),
        }
        // The first target ran to completion and left its output behind;
        // the bogus one never got an action invocation.
        assert!(processed.join("x86").exists());
        assert!(!processed.join("bogus-target").exists());
    }

    #[test]
    fn first_action_failure_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let processed = dir.path().to_path_buf();

        let result = run_targets(
            &strings(&["armeabi-v7a", "arm64-v8a", "x86"]),
            AndroidTarget::lookup,
            |target| {
                if target == AndroidTarget::Arm64V8a {
                    return Err(BuildError::Step {
                        name: "configure".to_string(),
                        code: 2,
                    });
                }
                std::fs::write(processed.join(target.name()), b"done")?;
                Ok(())
            },
        );

        assert!(matches!(result, Err(BuildError::Step { .. })));
        assert!(processed.join("armeabi-v7a").exists());
        assert!(!processed.join("x86").exists());
    }
}
