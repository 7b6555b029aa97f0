//! The boundary to the external `cbsd` tool.
//!
//! [`Cbsd`] knows the argument grammar of each subcommand and produces
//! [`Invocation`]s; a [`ToolRunner`] executes them. Production uses
//! [`ProcessRunner`]; tests substitute a recording fake.

use std::fmt;
use std::process::Stdio;

use async_trait::async_trait;

use crate::descriptor::CreateDescriptor;
use crate::error::CapiError;

/// Columns requested from `bls`, in the order the record parser expects.
const LIST_COLUMNS: &str = "display=jname,jid,vm_ram,vm_cpus,vm_os_type,status,vnc_port";

// ── Invocation ──────────────────────────────────────────────────────

/// A fully built command line: program followed by its arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    tokens: Vec<String>,
}

impl Invocation {
    pub fn new(tokens: Vec<String>) -> Self {
        Self { tokens }
    }

    pub fn program(&self) -> &str {
        self.tokens.first().map(String::as_str).unwrap_or_default()
    }

    pub fn args(&self) -> &[String] {
        self.tokens.get(1..).unwrap_or_default()
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

// ── Lifecycle verbs ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Start,
    Stop,
    Remove,
}

impl Lifecycle {
    pub fn verb(self) -> &'static str {
        match self {
            Lifecycle::Start => "bstart",
            Lifecycle::Stop => "bstop",
            Lifecycle::Remove => "bremove",
        }
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}

// ── Command builders ────────────────────────────────────────────────

/// Builds cbsd command lines. Every command runs through `env` so the
/// colour setting is explicit; listing and lifecycle output is captured and
/// must stay plain, `bcreate` is attached to the console.
#[derive(Debug, Clone)]
pub struct Cbsd {
    path: String,
}

impl Cbsd {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }

    fn prologue(&self, nocolor: &str, subcommand: &str) -> Vec<String> {
        vec![
            "env".to_string(),
            format!("NOCOLOR={nocolor}"),
            self.path.clone(),
            subcommand.to_string(),
        ]
    }

    /// `bls` without header, restricted to the columns the parser reads.
    pub fn list(&self) -> Invocation {
        let mut tokens = self.prologue("0", "bls");
        tokens.push("header=0".into());
        tokens.push(LIST_COLUMNS.into());
        Invocation::new(tokens)
    }

    /// Non-interactive `bstart`/`bstop`/`bremove` for one VM.
    pub fn lifecycle(&self, op: Lifecycle, name: &str) -> Invocation {
        let mut tokens = self.prologue("0", op.verb());
        tokens.push("inter=0".into());
        tokens.push(format!("jname={name}"));
        Invocation::new(tokens)
    }

    /// Non-interactive `bcreate` followed by one token per present attribute.
    pub fn create(&self, descriptor: &CreateDescriptor) -> Invocation {
        let mut tokens = self.prologue("1", "bcreate");
        tokens.push("inter=0".into());
        tokens.extend(descriptor.to_args());
        Invocation::new(tokens)
    }
}

// ── Runner ──────────────────────────────────────────────────────────

#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run to completion and return stdout. A non-zero exit is an error.
    async fn capture(&self, invocation: &Invocation) -> Result<String, CapiError>;

    /// Run to completion with stdin/stdout/stderr inherited from this process.
    async fn attached(&self, invocation: &Invocation) -> Result<(), CapiError>;
}

/// Spawns real processes via `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner;

impl ProcessRunner {
    fn command(invocation: &Invocation) -> tokio::process::Command {
        let mut cmd = tokio::process::Command::new(invocation.program());
        cmd.args(invocation.args());
        cmd
    }
}

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn capture(&self, invocation: &Invocation) -> Result<String, CapiError> {
        let output = Self::command(invocation)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CapiError::Io {
                context: format!("running {invocation}"),
                source: e,
            })?;

        if !output.status.success() {
            return Err(CapiError::ExternalCommand {
                command: invocation.to_string(),
                message: format!(
                    "{}: {}",
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn attached(&self, invocation: &Invocation) -> Result<(), CapiError> {
        let status = Self::command(invocation)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|e| CapiError::Io {
                context: format!("running {invocation}"),
                source: e,
            })?;

        if !status.success() {
            return Err(CapiError::ExternalCommand {
                command: invocation.to_string(),
                message: status.to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;

    /// Records every invocation it is asked to run and answers `capture`
    /// with a canned listing (or a failure when none is set).
    ///
    /// The listing is taken when the call starts, like real `bls` output
    /// reflects the moment it ran; the answer arrives after the delay.
    pub struct FakeRunner {
        listing: Mutex<Option<String>>,
        delay: Duration,
        queued_delays: Mutex<VecDeque<Duration>>,
        seen_tx: mpsc::UnboundedSender<Invocation>,
    }

    impl FakeRunner {
        pub fn new(listing: Option<&str>) -> (Self, mpsc::UnboundedReceiver<Invocation>) {
            let (seen_tx, seen_rx) = mpsc::unbounded_channel();
            let runner = Self {
                listing: Mutex::new(listing.map(str::to_string)),
                delay: Duration::ZERO,
                queued_delays: Mutex::new(VecDeque::new()),
                seen_tx,
            };
            (runner, seen_rx)
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        pub fn set_listing(&self, listing: Option<&str>) {
            *self.listing.lock().unwrap() = listing.map(str::to_string);
        }

        /// Delay for the next call only; later calls fall back to `delay`.
        pub fn queue_delay(&self, delay: Duration) {
            self.queued_delays.lock().unwrap().push_back(delay);
        }

        fn next_delay(&self) -> Duration {
            self.queued_delays
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(self.delay)
        }
    }

    #[async_trait]
    impl ToolRunner for FakeRunner {
        async fn capture(&self, invocation: &Invocation) -> Result<String, CapiError> {
            let _ = self.seen_tx.send(invocation.clone());
            let listing = self.listing.lock().unwrap().clone();
            tokio::time::sleep(self.next_delay()).await;
            listing.ok_or_else(|| CapiError::ExternalCommand {
                command: invocation.to_string(),
                message: "exit status: 1".into(),
            })
        }

        async fn attached(&self, invocation: &Invocation) -> Result<(), CapiError> {
            let _ = self.seen_tx.send(invocation.clone());
            tokio::time::sleep(self.next_delay()).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cbsd() -> Cbsd {
        Cbsd::new("/usr/local/bin/cbsd")
    }

    #[test]
    fn list_invocation() {
        assert_eq!(
            cbsd().list().to_string(),
            "env NOCOLOR=0 /usr/local/bin/cbsd bls header=0 \
             display=jname,jid,vm_ram,vm_cpus,vm_os_type,status,vnc_port"
        );
    }

    #[test]
    fn lifecycle_invocations() {
        for (op, verb) in [
            (Lifecycle::Start, "bstart"),
            (Lifecycle::Stop, "bstop"),
            (Lifecycle::Remove, "bremove"),
        ] {
            let inv = cbsd().lifecycle(op, "vm1");
            assert_eq!(inv.program(), "env");
            assert_eq!(
                inv.args(),
                ["NOCOLOR=0", "/usr/local/bin/cbsd", verb, "inter=0", "jname=vm1"]
            );
        }
    }

    #[test]
    fn create_with_only_name_has_one_attribute_token() {
        let desc = CreateDescriptor::default().with_name("vm1");
        let inv = cbsd().create(&desc);
        assert_eq!(
            inv.tokens(),
            ["env", "NOCOLOR=1", "/usr/local/bin/cbsd", "bcreate", "inter=0", "jname=vm1"]
        );
    }

    #[test]
    fn create_keeps_whitespace_inside_a_token() {
        let desc = CreateDescriptor {
            bhyve_flags: "-w -H".into(),
            ..Default::default()
        }
        .with_name("vm1");
        let inv = cbsd().create(&desc);
        assert_eq!(inv.tokens().last().map(String::as_str), Some("bhyve_flags=-w -H"));
    }

    fn sh(script: &str) -> Invocation {
        Invocation::new(vec!["sh".into(), "-c".into(), script.into()])
    }

    #[tokio::test]
    async fn process_runner_captures_stdout() {
        let out = ProcessRunner
            .capture(&sh("printf 'vm1  1  512  2  linux  On  0\\n'"))
            .await
            .unwrap();
        assert_eq!(out, "vm1  1  512  2  linux  On  0\n");
    }

    #[tokio::test]
    async fn process_runner_reports_non_zero_exit() {
        let err = ProcessRunner
            .capture(&sh("echo boom >&2; exit 3"))
            .await
            .unwrap_err();
        match err {
            CapiError::ExternalCommand { message, .. } => assert!(message.contains("boom")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn process_runner_reports_missing_program() {
        let inv = Invocation::new(vec!["/nonexistent/cbsd".into(), "bls".into()]);
        let err = ProcessRunner.capture(&inv).await.unwrap_err();
        assert!(matches!(err, CapiError::Io { .. }));
    }

    #[tokio::test]
    async fn attached_runner_reports_exit_status() {
        ProcessRunner.attached(&sh("exit 0")).await.unwrap();
        assert!(ProcessRunner.attached(&sh("exit 2")).await.is_err());
    }
}
