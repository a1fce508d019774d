//! Pipe menus: submenus generated by running an external command
//!
//! The command runs out of process on the tokio runtime, its output is parsed
//! off the compositor thread and handed back through a channel. The session
//! applies a result only if it is still the in-flight generation for that
//! menu, so nothing completes into a menu that was closed or torn down.
//!
//! Output format, one entry per line:
//!
//! ```text
//! ---                      separator
//! [Recent files]           title
//! Notes                    inert item
//! Terminal<TAB>foot        item running `foot`
//! Bookmarks<TAB>pipe:cmd   nested pipe menu generated by `cmd`
//! ```

use std::collections::HashMap;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::{
    io::AsyncReadExt,
    process::{Child, ChildStdout, Command},
    sync::mpsc,
    task::JoinHandle,
};
use tracing::debug;

use super::tree::MenuId;
use crate::config::PipeMenuConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipeMenuPolicy {
    /// Run the command every time the menu is about to be shown
    #[default]
    Regenerate,
    /// Keep the first successful output
    Cache,
}

#[derive(Debug, Error)]
pub enum PipeMenuError {
    #[error("pipe menu command is empty")]
    EmptyCommand,
    #[error("invalid pipe menu command `{command}`: {source}")]
    InvalidCommand {
        command: String,
        #[source]
        source: shell_words::ParseError,
    },
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read output of `{command}`: {source}")]
    Io {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`{command}` exited with {status}")]
    Exit { command: String, status: ExitStatus },
    #[error("`{command}` timed out after {timeout_ms}ms")]
    Timeout { command: String, timeout_ms: u64 },
    #[error("`{command}` produced more than {limit} bytes")]
    OutputTooLarge { command: String, limit: usize },
    #[error("pipe menu output is not valid UTF-8")]
    NotUtf8,
    #[error("pipe menu output line {line}: {reason}")]
    Parse { line: usize, reason: &'static str },
    #[error("no async runtime available to run pipe menus")]
    NoRuntime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipeMenuState {
    /// Never generated, or the last generation was cancelled
    Idle,
    Loading,
    Ready,
    Failed,
}

/// Generation state attached to a pipemenu
#[derive(Debug, Clone, PartialEq)]
pub struct PipeMenuContext {
    command: String,
    state: PipeMenuState,
    has_succeeded: bool,
}

impl PipeMenuContext {
    pub fn new(command: impl Into<String>) -> Result<Self, PipeMenuError> {
        let command = command.into();
        match shell_words::split(&command) {
            Ok(words) if words.is_empty() => Err(PipeMenuError::EmptyCommand),
            Ok(_) => Ok(Self {
                command,
                state: PipeMenuState::Idle,
                has_succeeded: false,
            }),
            Err(source) => Err(PipeMenuError::InvalidCommand { command, source }),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn state(&self) -> PipeMenuState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state == PipeMenuState::Loading
    }

    pub fn has_succeeded(&self) -> bool {
        self.has_succeeded
    }

    pub fn needs_generation(&self, policy: PipeMenuPolicy) -> bool {
        match policy {
            PipeMenuPolicy::Regenerate => true,
            PipeMenuPolicy::Cache => !self.has_succeeded,
        }
    }

    pub(crate) fn start(&mut self) {
        self.state = PipeMenuState::Loading;
    }

    pub(crate) fn finish(&mut self, success: bool) {
        self.has_succeeded |= success;
        self.state = if success {
            PipeMenuState::Ready
        } else {
            PipeMenuState::Failed
        };
    }

    pub(crate) fn cancel(&mut self) {
        if self.state == PipeMenuState::Loading {
            self.state = PipeMenuState::Idle;
        }
    }
}

/// One parsed line of pipe menu output
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipeItemSpec {
    Item {
        label: String,
        command: Option<String>,
    },
    Separator,
    Title(String),
    Pipe {
        label: String,
        command: String,
    },
}

pub fn parse_pipe_output(text: &str) -> Result<Vec<PipeItemSpec>, PipeMenuError> {
    let mut specs = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let parse_error = |reason| PipeMenuError::Parse {
            line: line_no,
            reason,
        };

        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        if line.chars().any(|c| c.is_control() && c != '\t') {
            return Err(parse_error("control character"));
        }
        if line == "---" {
            specs.push(PipeItemSpec::Separator);
            continue;
        }
        if let Some(title) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let title = title.trim();
            if title.is_empty() {
                return Err(parse_error("empty title"));
            }
            specs.push(PipeItemSpec::Title(title.to_string()));
            continue;
        }

        let mut fields = line.split('\t');
        let label = fields.next().unwrap_or_default().trim();
        let command = fields.next().map(str::trim);
        if fields.next().is_some() {
            return Err(parse_error("too many fields"));
        }
        if label.is_empty() {
            return Err(parse_error("empty label"));
        }

        let spec = match command {
            None | Some("") => PipeItemSpec::Item {
                label: label.to_string(),
                command: None,
            },
            Some(command) => match command.strip_prefix("pipe:") {
                Some(pipe) if pipe.trim().is_empty() => {
                    return Err(parse_error("empty pipe command"));
                }
                Some(pipe) => PipeItemSpec::Pipe {
                    label: label.to_string(),
                    command: pipe.trim().to_string(),
                },
                None => PipeItemSpec::Item {
                    label: label.to_string(),
                    command: Some(command.to_string()),
                },
            },
        };
        specs.push(spec);
    }
    Ok(specs)
}

/// Result of one generation, delivered on the loader channel
#[derive(Debug)]
pub struct PipeMenuOutput {
    pub menu: MenuId,
    pub generation: u64,
    pub result: Result<Vec<PipeItemSpec>, PipeMenuError>,
}

#[derive(Debug)]
struct InFlight {
    generation: u64,
    task: JoinHandle<()>,
}

/// Spawns pipe menu commands and collects their results
#[derive(Debug)]
pub struct PipeMenuLoader {
    timeout: Duration,
    max_output_bytes: usize,
    tx: mpsc::UnboundedSender<PipeMenuOutput>,
    rx: mpsc::UnboundedReceiver<PipeMenuOutput>,
    in_flight: HashMap<MenuId, InFlight>,
    next_generation: u64,
}

impl PipeMenuLoader {
    pub fn new(config: &PipeMenuConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            timeout: Duration::from_millis(config.timeout_ms),
            max_output_bytes: config.max_output_bytes,
            tx,
            rx,
            in_flight: HashMap::new(),
            next_generation: 0,
        }
    }

    /// Start generating `menu`, replacing any generation already running for it
    pub fn generate(&mut self, menu: MenuId, command: &str) -> Result<u64, PipeMenuError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PipeMenuError::NoRuntime)?;
        self.cancel(menu);

        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.tx.clone();
        let command = command.to_string();
        let timeout = self.timeout;
        let limit = self.max_output_bytes;

        debug!(%menu, generation, %command, "starting pipe menu generation");
        let task = runtime.spawn(async move {
            let result = run_pipe_command(&command, timeout, limit).await;
            // The receiver is gone once the loader is dropped
            let _ = tx.send(PipeMenuOutput {
                menu,
                generation,
                result,
            });
        });
        self.in_flight.insert(menu, InFlight { generation, task });
        Ok(generation)
    }

    /// Abort the generation of `menu`, killing its process
    pub fn cancel(&mut self, menu: MenuId) -> bool {
        match self.in_flight.remove(&menu) {
            Some(in_flight) => {
                in_flight.task.abort();
                debug!(%menu, generation = in_flight.generation, "cancelled pipe menu generation");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&mut self) {
        for (menu, in_flight) in self.in_flight.drain() {
            in_flight.task.abort();
            debug!(%menu, generation = in_flight.generation, "cancelled pipe menu generation");
        }
    }

    pub fn is_pending(&self, menu: MenuId) -> bool {
        self.in_flight.contains_key(&menu)
    }

    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Non-blocking poll, for event loops that can't await
    pub fn try_recv(&mut self) -> Option<PipeMenuOutput> {
        self.rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<PipeMenuOutput> {
        self.rx.recv().await
    }

    /// Consume the in-flight slot matching `output`, false when it is stale
    pub(crate) fn accept(&mut self, output: &PipeMenuOutput) -> bool {
        match self.in_flight.get(&output.menu) {
            Some(in_flight) if in_flight.generation == output.generation => {
                self.in_flight.remove(&output.menu);
                true
            }
            _ => false,
        }
    }
}

impl Drop for PipeMenuLoader {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

async fn run_pipe_command(
    command: &str,
    timeout: Duration,
    limit: usize,
) -> Result<Vec<PipeItemSpec>, PipeMenuError> {
    let mut child = Command::new("sh")
        .arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| PipeMenuError::Spawn {
            command: command.to_string(),
            source,
        })?;

    let Some(stdout) = child.stdout.take() else {
        return Err(PipeMenuError::Io {
            command: command.to_string(),
            source: std::io::Error::other("stdout was not captured"),
        });
    };

    let (output, status) =
        match tokio::time::timeout(timeout, read_output(&mut child, stdout, limit)).await {
            Err(_) => {
                return Err(PipeMenuError::Timeout {
                    command: command.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
            Ok(Err(source)) => {
                return Err(PipeMenuError::Io {
                    command: command.to_string(),
                    source,
                })
            }
            Ok(Ok(None)) => {
                return Err(PipeMenuError::OutputTooLarge {
                    command: command.to_string(),
                    limit,
                })
            }
            Ok(Ok(Some(read))) => read,
        };

    if !status.success() {
        return Err(PipeMenuError::Exit {
            command: command.to_string(),
            status,
        });
    }

    let text = String::from_utf8(output).map_err(|_| PipeMenuError::NotUtf8)?;
    parse_pipe_output(&text)
}

/// Read stdout up to `limit` bytes then reap the child, `None` when over the limit
async fn read_output(
    child: &mut Child,
    stdout: ChildStdout,
    limit: usize,
) -> std::io::Result<Option<(Vec<u8>, ExitStatus)>> {
    let mut output = Vec::new();
    stdout
        .take(limit as u64 + 1)
        .read_to_end(&mut output)
        .await?;
    if output.len() > limit {
        return Ok(None);
    }
    let status = child.wait().await?;
    Ok(Some((output, status)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader(timeout_ms: u64, max_output_bytes: usize) -> PipeMenuLoader {
        PipeMenuLoader::new(&PipeMenuConfig {
            timeout_ms,
            max_output_bytes,
            ..Default::default()
        })
    }

    #[test]
    fn parses_every_entry_kind() {
        let output = "[Places]\nHome\tnautilus ~\n---\n\nNotes\nRecent\tpipe:recent-menu --all\n";
        let specs = parse_pipe_output(output).unwrap();
        assert_eq!(
            specs,
            vec![
                PipeItemSpec::Title("Places".into()),
                PipeItemSpec::Item {
                    label: "Home".into(),
                    command: Some("nautilus ~".into()),
                },
                PipeItemSpec::Separator,
                PipeItemSpec::Item {
                    label: "Notes".into(),
                    command: None,
                },
                PipeItemSpec::Pipe {
                    label: "Recent".into(),
                    command: "recent-menu --all".into(),
                },
            ]
        );
    }

    #[test]
    fn rejects_malformed_lines() {
        assert!(matches!(
            parse_pipe_output("ok\n\tno label\n"),
            Err(PipeMenuError::Parse { line: 2, .. })
        ));
        assert!(matches!(
            parse_pipe_output("a\tb\tc"),
            Err(PipeMenuError::Parse { line: 1, .. })
        ));
        assert!(matches!(
            parse_pipe_output("bell\u{7}"),
            Err(PipeMenuError::Parse { .. })
        ));
        assert!(matches!(
            parse_pipe_output("[ ]"),
            Err(PipeMenuError::Parse { .. })
        ));
        assert!(matches!(
            parse_pipe_output("Sub\tpipe:"),
            Err(PipeMenuError::Parse { .. })
        ));
    }

    #[test]
    fn empty_output_is_an_empty_menu() {
        assert_eq!(parse_pipe_output("").unwrap(), Vec::new());
        assert_eq!(parse_pipe_output("\n\n  \n").unwrap(), Vec::new());
    }

    #[test]
    fn context_validates_command() {
        assert!(PipeMenuContext::new("ls -1 ~/Documents").is_ok());
        assert!(matches!(
            PipeMenuContext::new("  "),
            Err(PipeMenuError::EmptyCommand)
        ));
        assert!(matches!(
            PipeMenuContext::new("echo \"unterminated"),
            Err(PipeMenuError::InvalidCommand { .. })
        ));
    }

    #[test]
    fn cache_policy_stops_after_success() {
        let mut ctx = PipeMenuContext::new("true").unwrap();
        assert!(ctx.needs_generation(PipeMenuPolicy::Cache));

        ctx.start();
        assert!(ctx.is_loading());
        ctx.finish(false);
        assert_eq!(ctx.state(), PipeMenuState::Failed);
        assert!(ctx.needs_generation(PipeMenuPolicy::Cache));

        ctx.start();
        ctx.finish(true);
        assert!(!ctx.needs_generation(PipeMenuPolicy::Cache));
        assert!(ctx.needs_generation(PipeMenuPolicy::Regenerate));
    }

    #[test]
    fn generate_without_runtime_fails() {
        let mut loader = loader(1000, 1024);
        assert!(matches!(
            loader.generate(MenuId::next(), "true"),
            Err(PipeMenuError::NoRuntime)
        ));
        assert_eq!(loader.pending(), 0);
    }

    #[tokio::test]
    async fn runs_command_and_parses_output() {
        let mut loader = loader(5000, 1024);
        let menu = MenuId::next();
        let generation = loader.generate(menu, r#"printf "item1\nitem2""#).unwrap();
        assert!(loader.is_pending(menu));

        let output = loader.recv().await.unwrap();
        assert_eq!(output.menu, menu);
        assert_eq!(output.generation, generation);
        assert!(loader.accept(&output));
        assert!(!loader.is_pending(menu));
        assert_eq!(
            output.result.unwrap(),
            vec![
                PipeItemSpec::Item {
                    label: "item1".into(),
                    command: None,
                },
                PipeItemSpec::Item {
                    label: "item2".into(),
                    command: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let mut loader = loader(5000, 1024);
        loader.generate(MenuId::next(), "exit 1").unwrap();
        let output = loader.recv().await.unwrap();
        assert!(matches!(output.result, Err(PipeMenuError::Exit { .. })));
    }

    #[tokio::test]
    async fn slow_command_times_out() {
        let mut loader = loader(100, 1024);
        loader.generate(MenuId::next(), "sleep 5").unwrap();
        let output = loader.recv().await.unwrap();
        assert!(matches!(output.result, Err(PipeMenuError::Timeout { .. })));
    }

    #[tokio::test]
    async fn oversized_output_is_rejected() {
        let mut loader = loader(5000, 16);
        loader
            .generate(MenuId::next(), "printf 'aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa'")
            .unwrap();
        let output = loader.recv().await.unwrap();
        assert!(matches!(
            output.result,
            Err(PipeMenuError::OutputTooLarge { limit: 16, .. })
        ));
    }

    #[tokio::test]
    async fn restarting_a_generation_makes_the_old_one_stale() {
        let mut loader = loader(5000, 1024);
        let menu = MenuId::next();
        let first = loader.generate(menu, "echo first").unwrap();
        let second = loader.generate(menu, "echo second").unwrap();
        assert_ne!(first, second);
        assert_eq!(loader.pending(), 1);

        let stale = PipeMenuOutput {
            menu,
            generation: first,
            result: Ok(Vec::new()),
        };
        assert!(!loader.accept(&stale));

        let output = loader.recv().await.unwrap();
        assert_eq!(output.generation, second);
        assert!(loader.accept(&output));
    }

    #[tokio::test]
    async fn cancelled_generation_is_not_accepted() {
        let mut loader = loader(5000, 1024);
        let menu = MenuId::next();
        let generation = loader.generate(menu, "sleep 5; echo late").unwrap();
        assert!(loader.cancel(menu));
        assert!(!loader.cancel(menu));

        let late = PipeMenuOutput {
            menu,
            generation,
            result: Ok(Vec::new()),
        };
        assert!(!loader.accept(&late));
        assert!(loader.try_recv().is_none());
    }
}
