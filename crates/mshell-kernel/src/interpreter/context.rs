//! Per-invocation streams and process-wide evaluator state.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::os::fd::AsFd;
use std::process::Stdio;
use std::sync::Arc;

use crate::error::{ErrorKind, KindResult};
use crate::value::Redirects;

use super::scope::Variables;

/// Where a standard stream goes.
#[derive(Debug, Clone, Default)]
pub enum Stream {
    /// The shell's own stdin, stdout or stderr.
    #[default]
    Inherit,
    /// A redirect file or a pipe end.
    File(Arc<File>),
}

impl Stream {
    pub fn file(file: File) -> Self {
        Stream::File(Arc::new(file))
    }

    /// A child-process handle for this stream.
    pub fn to_stdio(&self) -> io::Result<Stdio> {
        match self {
            Stream::Inherit => Ok(Stdio::inherit()),
            Stream::File(file) => Ok(Stdio::from(file.try_clone()?)),
        }
    }
}

/// Which standard stream an [`Stream::Inherit`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Std {
    Out,
    Err,
}

/// Streams and variables for one evaluator invocation.
#[derive(Debug, Clone, Default)]
pub struct ExecuteContext {
    pub stdin: Stream,
    pub stdout: Stream,
    pub stderr: Stream,
    pub variables: Variables,
}

impl ExecuteContext {
    pub fn new(variables: Variables) -> Self {
        Self {
            variables,
            ..Self::default()
        }
    }

    /// Same streams, different variables.
    pub fn with_variables(&self, variables: Variables) -> Self {
        Self {
            variables,
            ..self.clone()
        }
    }

    /// Open the redirect files that are set, keeping the other streams.
    pub fn redirected(&self, redirects: &Redirects) -> KindResult<Self> {
        let mut ctx = self.clone();
        if let Some(path) = &redirects.stdin {
            let file = File::open(path)
                .map_err(|e| ErrorKind::io(format!("cannot open '{}'", path.display()), e))?;
            ctx.stdin = Stream::file(file);
        }
        if let Some(path) = &redirects.stdout {
            ctx.stdout = Stream::file(create(path)?);
        }
        if let Some(path) = &redirects.stderr {
            ctx.stderr = Stream::file(create(path)?);
        }
        Ok(ctx)
    }

    pub fn write_stdout(&self, bytes: &[u8]) -> KindResult<()> {
        write_stream(&self.stdout, Std::Out, bytes).map_err(|e| ErrorKind::io("write to stdout", e))
    }

    pub fn write_stderr(&self, bytes: &[u8]) -> KindResult<()> {
        write_stream(&self.stderr, Std::Err, bytes).map_err(|e| ErrorKind::io("write to stderr", e))
    }

    /// A handle on stdin sharing its file offset.
    fn stdin_file(&self) -> io::Result<File> {
        match &self.stdin {
            Stream::Inherit => Ok(File::from(io::stdin().as_fd().try_clone_to_owned()?)),
            Stream::File(file) => file.try_clone(),
        }
    }

    /// Read one line from stdin without the trailing `\n` / `\r\n`.
    ///
    /// Returns `None` at end of input. Seekable inputs are read through a
    /// buffer and the offset is moved back to just past the line; other
    /// inputs are read a byte at a time so nothing past the line is consumed.
    pub fn read_line(&self) -> KindResult<Option<String>> {
        self.read_line_inner().map_err(|e| ErrorKind::io("read from stdin", e))
    }

    fn read_line_inner(&self) -> io::Result<Option<String>> {
        let mut file = self.stdin_file()?;
        let mut line = Vec::new();

        match file.stream_position() {
            Ok(start) => {
                let consumed = {
                    let mut reader = BufReader::new(&file);
                    reader.read_until(b'\n', &mut line)?
                };
                file.seek(SeekFrom::Start(start + consumed as u64))?;
            }
            Err(_) => {
                let mut byte = [0u8; 1];
                while file.read(&mut byte)? == 1 {
                    line.push(byte[0]);
                    if byte[0] == b'\n' {
                        break;
                    }
                }
            }
        }

        if line.is_empty() {
            return Ok(None);
        }
        if line.last() == Some(&b'\n') {
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
        }
        Ok(Some(String::from_utf8_lossy(&line).into_owned()))
    }

    /// Read stdin to the end.
    pub fn read_all(&self) -> KindResult<String> {
        let mut buf = Vec::new();
        self.stdin_file()
            .and_then(|mut file| file.read_to_end(&mut buf))
            .map_err(|e| ErrorKind::io("read from stdin", e))?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }
}

fn create(path: &std::path::Path) -> KindResult<File> {
    File::create(path).map_err(|e| ErrorKind::io(format!("cannot create '{}'", path.display()), e))
}

fn write_stream(stream: &Stream, which: Std, bytes: &[u8]) -> io::Result<()> {
    match (stream, which) {
        (Stream::File(file), _) => {
            let mut file: &File = file;
            file.write_all(bytes)
        }
        (Stream::Inherit, Std::Out) => {
            let mut out = io::stdout().lock();
            out.write_all(bytes)?;
            out.flush()
        }
        (Stream::Inherit, Std::Err) => io::stderr().lock().write_all(bytes),
    }
}

/// Process-wide evaluator state.
///
/// Cloned into each pipeline stage; everything else shares one copy.
#[derive(Debug, Clone, Default)]
pub struct EvalState {
    pub positional_args: Vec<String>,
    pub loop_depth: usize,
    pub stop_on_error: bool,
    /// Environment overlay given to every child (`export`, `cd`).
    pub exported: HashMap<String, String>,
}

impl EvalState {
    pub fn new(positional_args: Vec<String>) -> Self {
        Self {
            positional_args,
            ..Self::default()
        }
    }

    /// Look up a name in the overlay, then the process environment.
    pub fn env_var(&self, name: &str) -> Option<String> {
        self.exported
            .get(name)
            .cloned()
            .or_else(|| std::env::var(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn stdin_from(contents: &str) -> (tempfile::NamedTempFile, ExecuteContext) {
        let mut tmp = tempfile::NamedTempFile::new().expect("tempfile");
        tmp.write_all(contents.as_bytes()).expect("write");
        let file = File::open(tmp.path()).expect("open");
        let ctx = ExecuteContext {
            stdin: Stream::file(file),
            ..ExecuteContext::default()
        };
        (tmp, ctx)
    }

    #[test]
    fn read_line_is_exact_on_files() {
        let (_tmp, ctx) = stdin_from("one\r\ntwo\nthree");
        assert_eq!(ctx.read_line().expect("read").as_deref(), Some("one"));
        assert_eq!(ctx.read_line().expect("read").as_deref(), Some("two"));
        assert_eq!(ctx.read_all().expect("read"), "three");
        assert_eq!(ctx.read_line().expect("read"), None);
    }

    #[test]
    fn read_line_on_empty_input() {
        let (_tmp, ctx) = stdin_from("");
        assert_eq!(ctx.read_line().expect("read"), None);
    }

    #[test]
    fn read_line_on_pipe_reads_byte_at_a_time() {
        let (reader, mut writer) = io::pipe().expect("pipe");
        writer.write_all(b"a\nb\n").expect("write");
        drop(writer);
        let ctx = ExecuteContext {
            stdin: Stream::file(File::from(std::os::fd::OwnedFd::from(reader))),
            ..ExecuteContext::default()
        };
        assert_eq!(ctx.read_line().expect("read").as_deref(), Some("a"));
        assert_eq!(ctx.read_line().expect("read").as_deref(), Some("b"));
        assert_eq!(ctx.read_line().expect("read"), None);
    }

    #[test]
    fn redirected_opens_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("out.txt");
        let redirects = Redirects {
            stdout: Some(out.clone()),
            ..Redirects::default()
        };
        let ctx = ExecuteContext::default().redirected(&redirects).expect("redirect");
        ctx.write_stdout(b"hello").expect("write");
        assert_eq!(std::fs::read_to_string(&out).expect("read"), "hello");
    }

    #[test]
    fn redirect_from_missing_file_fails() {
        let redirects = Redirects {
            stdin: Some("/nonexistent/mshell/input".into()),
            ..Redirects::default()
        };
        assert!(matches!(
            ExecuteContext::default().redirected(&redirects),
            Err(ErrorKind::Io { .. })
        ));
    }

    #[test]
    fn env_overlay_wins() {
        let mut state = EvalState::default();
        state.exported.insert("MSHELL_TEST_OVERLAY".into(), "yes".into());
        assert_eq!(state.env_var("MSHELL_TEST_OVERLAY").as_deref(), Some("yes"));
        assert_eq!(state.env_var("MSHELL_TEST_SURELY_UNSET_VAR"), None);
    }
}
