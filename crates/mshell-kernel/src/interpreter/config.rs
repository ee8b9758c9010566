//! Interpreter configuration.

use std::path::PathBuf;

/// Environment variable naming the standard-library file.
pub const STDLIB_ENV: &str = "MSHSTDLIB";

/// Iteration cap applied to every `loop`.
pub const DEFAULT_MAX_LOOP_ITERATIONS: usize = 150_000;

/// Configuration for a [`Shell`](super::Shell).
#[derive(Debug, Clone)]
pub struct ShellConfig {
    /// A `loop` running more iterations than this is a fatal error.
    pub max_loop_iterations: usize,

    /// Launch each child in its own process group.
    ///
    /// The CLI turns this on only when stdin is not a terminal; a child in
    /// a background group that reads the terminal would be stopped.
    pub process_group: bool,

    /// Standard-library file evaluated before the program.
    pub stdlib: Option<PathBuf>,

    /// Arguments visible as `$1`, `$2`, ... and through `args`.
    pub positional_args: Vec<String>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            max_loop_iterations: DEFAULT_MAX_LOOP_ITERATIONS,
            process_group: false,
            stdlib: None,
            positional_args: Vec::new(),
        }
    }
}

impl ShellConfig {
    /// Defaults plus the stdlib path from `MSHSTDLIB`.
    pub fn from_env() -> Self {
        let stdlib = std::env::var_os(STDLIB_ENV)
            .filter(|path| !path.is_empty())
            .map(PathBuf::from);
        Self {
            stdlib,
            ..Self::default()
        }
    }

    /// Set the loop iteration cap.
    pub fn with_max_loop_iterations(mut self, max: usize) -> Self {
        self.max_loop_iterations = max;
        self
    }

    /// Enable or disable per-child process groups.
    pub fn with_process_group(mut self, enabled: bool) -> Self {
        self.process_group = enabled;
        self
    }

    /// Set the standard-library file.
    pub fn with_stdlib(mut self, path: impl Into<PathBuf>) -> Self {
        self.stdlib = Some(path.into());
        self
    }

    /// Set the positional arguments.
    pub fn with_positional_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.positional_args = args.into_iter().map(Into::into).collect();
        self
    }
}
