//! Home directory lookup and tilde expansion.

use std::path::PathBuf;

use directories::BaseDirs;

/// The user's home directory: `$HOME`, else the platform's notion of it.
pub fn home_dir() -> Option<PathBuf> {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => Some(PathBuf::from(home)),
        _ => BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf()),
    }
}

/// Expand a leading `~` or `~/` to the home directory.
///
/// `~user` forms are left alone, as is everything when no home directory
/// can be found.
pub fn expand_tilde(s: &str) -> String {
    let rest = match s.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest,
        _ => return s.to_string(),
    };
    match home_dir() {
        Some(home) => format!("{}{}", home.display(), rest),
        None => s.to_string(),
    }
}
