//! Filesystem globbing for the `glob` built-in.
//!
//! Patterns support:
//! - `*` matches zero or more characters
//! - `?` matches exactly one character
//! - `[abc]`, `[a-z]`, `[!abc]` character classes
//! - `{a,b}` brace alternatives
//!
//! Wildcards never cross a `/`. Hidden entries only match a component that
//! itself starts with `.`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Match a single name against a glob pattern.
///
/// ```
/// use mshell_kernel::glob::glob_match;
///
/// assert!(glob_match("*.rs", "main.rs"));
/// assert!(glob_match("file?.txt", "file1.txt"));
/// assert!(glob_match("*.{rs,toml}", "Cargo.toml"));
/// assert!(!glob_match("*.rs", "main.go"));
/// ```
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let name: Vec<char> = name.chars().collect();
    expand_braces(pattern).iter().any(|alt| {
        let pat: Vec<char> = alt.chars().collect();
        match_chars(&pat, &name)
    })
}

/// True if the pattern contains any glob metacharacter.
pub fn has_wildcards(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', '{'])
}

/// Expand `{a,b}` groups into every alternative, left to right.
pub fn expand_braces(pattern: &str) -> Vec<String> {
    let Some((open, close)) = first_brace_group(pattern) else {
        return vec![pattern.to_string()];
    };
    let prefix = &pattern[..open];
    let suffix = &pattern[close + 1..];
    split_alternatives(&pattern[open + 1..close])
        .into_iter()
        .flat_map(|alt| expand_braces(&format!("{prefix}{alt}{suffix}")))
        .collect()
}

/// Byte offsets of the first balanced top-level `{...}`.
fn first_brace_group(pattern: &str) -> Option<(usize, usize)> {
    let mut depth = 0usize;
    let mut open = None;
    for (i, c) in pattern.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    open = Some(i);
                }
                depth += 1;
            }
            '}' if depth > 0 => {
                depth -= 1;
                if depth == 0 {
                    return open.map(|o| (o, i));
                }
            }
            _ => {}
        }
    }
    None
}

fn split_alternatives(content: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in content.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&content[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&content[start..]);
    parts
}

/// Iterative matcher: on mismatch, backtrack to the most recent `*`.
fn match_chars(pat: &[char], name: &[char]) -> bool {
    let (mut p, mut n) = (0, 0);
    let mut star: Option<(usize, usize)> = None;

    while n < name.len() {
        if p < pat.len() {
            match pat[p] {
                '*' => {
                    star = Some((p, n));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    n += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, len)) = match_class(&pat[p..], name[n]) {
                        if matched {
                            p += len;
                            n += 1;
                            continue;
                        }
                    } else if name[n] == '[' {
                        p += 1;
                        n += 1;
                        continue;
                    }
                }
                '\\' if p + 1 < pat.len() => {
                    if pat[p + 1] == name[n] {
                        p += 2;
                        n += 1;
                        continue;
                    }
                }
                c if c == name[n] => {
                    p += 1;
                    n += 1;
                    continue;
                }
                _ => {}
            }
        }
        match star {
            Some((sp, sn)) => {
                p = sp + 1;
                n = sn + 1;
                star = Some((sp, sn + 1));
            }
            None => return false,
        }
    }

    pat[p..].iter().all(|&c| c == '*')
}

/// Match one character against a class at the start of `pat`.
///
/// Returns `(matched, pattern_len)`, or `None` when the class is unclosed
/// and the `[` should be taken literally.
fn match_class(pat: &[char], ch: char) -> Option<(bool, usize)> {
    let mut i = 1;
    let negate = matches!(pat.get(i), Some('!') | Some('^'));
    if negate {
        i += 1;
    }
    let first = i;
    let mut matched = false;

    while i < pat.len() {
        let c = pat[i];
        if c == ']' && i > first {
            return Some((matched != negate, i + 1));
        }
        if i + 2 < pat.len() && pat[i + 1] == '-' && pat[i + 2] != ']' {
            matched |= (c..=pat[i + 2]).contains(&ch);
            i += 3;
        } else {
            matched |= c == ch;
            i += 1;
        }
    }
    None
}

/// Expand a pattern against the filesystem, relative to `cwd`.
///
/// Returns matching paths sorted, spelled the way the pattern was spelled
/// (relative patterns give relative paths). A pattern that matches nothing
/// yields an empty vector.
pub fn glob_paths(pattern: &str, cwd: &Path) -> io::Result<Vec<String>> {
    let mut results = Vec::new();
    for alt in expand_braces(pattern) {
        let absolute = alt.starts_with('/');
        let components: Vec<&str> = alt.split('/').filter(|c| !c.is_empty()).collect();
        let root = if absolute { PathBuf::from("/") } else { PathBuf::new() };
        walk(cwd, root, &components, &mut results)?;
    }
    results.sort();
    results.dedup();
    Ok(results)
}

fn walk(cwd: &Path, prefix: PathBuf, components: &[&str], out: &mut Vec<String>) -> io::Result<()> {
    let Some((first, rest)) = components.split_first() else {
        if !prefix.as_os_str().is_empty() {
            out.push(prefix.display().to_string());
        }
        return Ok(());
    };

    if !has_wildcards(first) {
        let next = prefix.join(first);
        if cwd.join(&next).symlink_metadata().is_ok() {
            walk(cwd, next, rest, out)?;
        }
        return Ok(());
    }

    let dir = cwd.join(&prefix);
    let dir = if dir.as_os_str().is_empty() { PathBuf::from(".") } else { dir };
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound || e.kind() == io::ErrorKind::NotADirectory => {
            return Ok(());
        }
        Err(e) => return Err(e),
    };

    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.starts_with('.') && !first.starts_with('.') {
            continue;
        }
        if glob_match(first, name) {
            let next = prefix.join(name);
            if rest.is_empty() || entry.path().is_dir() {
                walk(cwd, next, rest, out)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_and_star() {
        assert!(glob_match("hello", "hello"));
        assert!(!glob_match("hello", "hell"));
        assert!(glob_match("*", ""));
        assert!(glob_match("a*b*c", "aXXbYYc"));
        assert!(!glob_match("test*", "mytest"));
    }

    #[test]
    fn question_and_classes() {
        assert!(glob_match("?x", "ax"));
        assert!(!glob_match("?x", "x"));
        assert!(glob_match("[a-c]1", "b1"));
        assert!(!glob_match("[!a-c]1", "b1"));
        assert!(glob_match("[unclosed", "[unclosed"));
    }

    #[test]
    fn braces() {
        assert_eq!(expand_braces("a{b,c}d"), vec!["abd", "acd"]);
        assert_eq!(expand_braces("{x,{y,z}}"), vec!["x", "y", "z"]);
        assert_eq!(expand_braces("plain"), vec!["plain"]);
    }

    #[test]
    fn walks_directories() {
        let dir = tempfile::tempdir().expect("tempdir");
        for name in ["b.txt", "a.txt", "c.rs", ".hidden.txt"] {
            fs::write(dir.path().join(name), "").expect("write");
        }
        fs::create_dir(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("sub/d.txt"), "").expect("write");

        let found = glob_paths("*.txt", dir.path()).expect("glob");
        assert_eq!(found, vec!["a.txt", "b.txt"]);

        let found = glob_paths("*/*.txt", dir.path()).expect("glob");
        assert_eq!(found, vec!["sub/d.txt"]);

        let found = glob_paths("*.{rs,txt}", dir.path()).expect("glob");
        assert_eq!(found, vec!["a.txt", "b.txt", "c.rs"]);

        assert!(glob_paths("*.none", dir.path()).expect("glob").is_empty());
    }
}
