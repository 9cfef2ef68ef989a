//! Resolved build environments.
//!
//! A [`ResolvedEnvironment`] is the output of a platform resolver: the full
//! set of tool commands, flag lists, autoconf cache variables, and configure
//! flags for one `(product, target)` pair. It is built fresh per invocation
//! and never shared across targets. All collections preserve insertion
//! order, so rendering the same environment twice yields byte-identical
//! command lines.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

/// Symbolic tool variables understood by the downstream `configure` script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tool {
    Ar,
    As,
    Cc,
    Cpp,
    Cxx,
    Cxxcpp,
    Dlltool,
    Ld,
    Objdump,
    Ranlib,
    Cmake,
    Strip,
}

impl Tool {
    /// The `KEY` used in `KEY=value` configure assignments.
    pub fn var_name(&self) -> &'static str {
        match self {
            Tool::Ar => "AR",
            Tool::As => "AS",
            Tool::Cc => "CC",
            Tool::Cpp => "CPP",
            Tool::Cxx => "CXX",
            Tool::Cxxcpp => "CXXCPP",
            Tool::Dlltool => "DLLTOOL",
            Tool::Ld => "LD",
            Tool::Objdump => "OBJDUMP",
            Tool::Ranlib => "RANLIB",
            Tool::Cmake => "CMAKE",
            Tool::Strip => "STRIP",
        }
    }
}

/// A tool invocation: a program plus leading arguments.
///
/// Most tools are a bare binary path; wrapped tools carry arguments, e.g.
/// a preprocessor rendered as `clang -E`, or a ccache-prefixed compiler
/// rendered as `ccache /path/to/clang`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ToolCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Prepends a wrapper command; the current program becomes the first
    /// argument. Used for ccache and the osxcross rpath wrapper.
    pub fn wrapped_with(self, wrapper: impl Into<PathBuf>) -> Self {
        let mut args = vec![self.program.display().to_string()];
        args.extend(self.args);
        ToolCommand {
            program: wrapper.into(),
            args,
        }
    }

    /// Space-joined form used as a configure assignment value.
    pub fn rendered(&self) -> String {
        let mut out = self.program.display().to_string();
        for arg in &self.args {
            out.push(' ');
            out.push_str(arg);
        }
        out
    }
}

/// Shell wrapper materialized into the build directory before use.
///
/// osxcross tool binaries locate their shared libraries through rpaths that
/// break when the toolchain is relocated; the wrapper overrides
/// `LD_LIBRARY_PATH` so the generated build configuration stays independent
/// of this driver.
#[derive(Debug, Clone, Serialize)]
pub struct WrapperScript {
    pub path: PathBuf,
    pub toolchain_lib_dir: PathBuf,
}

/// The fully resolved environment for one `(product, target)` pair.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolvedEnvironment {
    /// Tool commands in the fixed order expected by the configure
    /// invocation.
    pub tools: IndexMap<Tool, ToolCommand>,
    pub cflags: Vec<String>,
    pub cxxflags: Vec<String>,
    pub cppflags: Vec<String>,
    pub cxxcppflags: Vec<String>,
    pub ldflags: Vec<String>,
    /// Autoconf cache variables (`ac_cv_...=...`), passed before any other
    /// configure argument.
    pub ac_vars: Vec<String>,
    /// Extra `KEY=value` assignments beyond tools and flag lists.
    pub configure_environment: IndexMap<String, String>,
    pub configure_flags: Vec<String>,
    /// Directory appended to `PATH` for configure/make children.
    pub extra_path: Option<PathBuf>,
    /// Wrapper script to write before any tool from this environment runs.
    pub wrapper_script: Option<WrapperScript>,
}

impl ResolvedEnvironment {
    pub fn set_tool(&mut self, tool: Tool, command: ToolCommand) {
        self.tools.insert(tool, command);
    }

    /// Renders the complete configure argv: cache variables, `KEY=value`
    /// assignments (tools, then flag lists, then extras), then configure
    /// flags. The order is part of the downstream wire format: later
    /// assignments and flags override earlier ones.
    pub fn configure_args(&self) -> Vec<String> {
        let mut args = self.ac_vars.clone();

        for (tool, command) in &self.tools {
            args.push(format!("{}={}", tool.var_name(), command.rendered()));
        }

        for (name, flags) in [
            ("CFLAGS", &self.cflags),
            ("CXXFLAGS", &self.cxxflags),
            ("CPPFLAGS", &self.cppflags),
            ("CXXCPPFLAGS", &self.cxxcppflags),
            ("LDFLAGS", &self.ldflags),
        ] {
            args.push(format!("{}={}", name, flags.join(" ")));
        }

        for (key, value) in &self.configure_environment {
            args.push(format!("{}={}", key, value));
        }

        args.extend(self.configure_flags.iter().cloned());
        args
    }

    /// Warns about tool binaries that do not exist yet. Resolution is
    /// lazy-verified: a missing tool is reported here but the downstream
    /// build tool gets to produce the authoritative failure.
    pub fn warn_missing_tools(&self) {
        for (tool, command) in &self.tools {
            let program = &command.program;
            if program.is_absolute() && !program.is_file() {
                eprintln!(
                    "WARNING: {} tool not found at '{}'",
                    tool.var_name(),
                    program.display()
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_command_renders_with_args() {
        let cpp = ToolCommand::new("/ndk/bin/clang").with_arg("-E");
        assert_eq!(cpp.rendered(), "/ndk/bin/clang -E");
    }

    #[test]
    fn wrapping_preserves_the_underlying_command() {
        let cc = ToolCommand::new("/ndk/bin/clang")
            .with_arg("-E")
            .wrapped_with("/usr/bin/ccache");
        assert_eq!(cc.rendered(), "/usr/bin/ccache /ndk/bin/clang -E");
    }

    #[test]
    fn configure_args_orders_ac_vars_tools_flags() {
        let mut env = ResolvedEnvironment::default();
        env.ac_vars.push("mono_cv_uscore=yes".to_string());
        env.set_tool(Tool::Cc, ToolCommand::new("cc"));
        env.cflags = vec!["-O2".to_string(), "-g".to_string()];
        env.configure_flags.push("--disable-nls".to_string());

        let args = env.configure_args();
        assert_eq!(args[0], "mono_cv_uscore=yes");
        assert_eq!(args[1], "CC=cc");
        assert_eq!(args[2], "CFLAGS=-O2 -g");
        assert_eq!(args.last().unwrap(), "--disable-nls");
    }

    #[test]
    fn configure_args_is_deterministic() {
        let mut env = ResolvedEnvironment::default();
        env.set_tool(Tool::Ar, ToolCommand::new("/t/ar"));
        env.set_tool(Tool::Cc, ToolCommand::new("/t/cc"));
        env.set_tool(Tool::Strip, ToolCommand::new("/t/strip"));
        env.cflags = vec!["-O2".to_string()];
        assert_eq!(env.configure_args(), env.clone().configure_args());
    }
}
