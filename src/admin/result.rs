use std::collections::BTreeMap;
use std::process::ExitStatus;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokio::process::Child;
use tokio::sync::Mutex;

/// Execution state of one submitted command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    NotSubmitted,
    Running,
    Completed,
    Failed,
}

/// What caused the most recent state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEvent {
    /// Queued on the worker, nothing sent yet.
    Submit,
    /// Runner picked the command up.
    Start,
    /// Server executed the command and reported success.
    Completed,
    /// Server executed the command and reported failure.
    Failed,
    /// Credentials rejected (HTTP 401/403).
    AuthFailed,
    /// Intermediate proxy answered instead of the DAS.
    BadGateway,
    /// DAS is still starting and asked us to come back later. Recoverable,
    /// not an error; retry-flagged commands are resubmitted automatically.
    Busy,
    /// Connection refused, reset, DNS failure or socket timeout.
    IoError,
    /// Response arrived but could not be parsed.
    BadResponse,
    /// The configured Java VM executable does not exist.
    NoJavaVm,
    /// Local DAS process could not be spawned.
    ProcessFailed,
}

/// One state transition, as delivered on the event stream of
/// [`ServerAdmin::exec_watched`](crate::admin::ServerAdmin::exec_watched).
#[derive(Debug, Clone, Serialize)]
pub struct TaskTransition {
    pub command: String,
    pub state: TaskState,
    pub event: TaskEvent,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Typed payload extracted from a successful (or diagnostically useful
/// failed) command response.
#[derive(Debug, Clone)]
pub enum ResultValue {
    None,
    String(String),
    List(Vec<String>),
    Map(BTreeMap<String, String>),
    Log {
        lines: Vec<String>,
        /// Query string for the next fetch, from `X-Text-Append-Next`.
        /// `None` means the server has nothing further to offer yet.
        next_query: Option<String>,
    },
    Process(ProcessHandle),
}

/// Outcome of one command execution. Built exactly once by the runner after
/// the response is fully parsed; never mutated afterward.
#[derive(Debug, Clone)]
pub struct AdminResult {
    /// Logical command name, for logging and event correlation.
    pub command: String,
    pub state: TaskState,
    pub event: TaskEvent,
    /// False only when the server rejected our credentials.
    pub auth_success: bool,
    /// Primary human-readable server message, when one was extracted.
    /// Failed results keep it as diagnostic text.
    pub message: Option<String>,
    pub value: ResultValue,
}

impl AdminResult {
    pub fn completed(command: &str, message: Option<String>, value: ResultValue) -> Self {
        Self {
            command: command.to_string(),
            state: TaskState::Completed,
            event: TaskEvent::Completed,
            auth_success: true,
            message,
            value,
        }
    }

    pub fn failed(command: &str, event: TaskEvent, message: Option<String>) -> Self {
        Self {
            command: command.to_string(),
            state: TaskState::Failed,
            event,
            auth_success: !matches!(event, TaskEvent::AuthFailed),
            message,
            value: ResultValue::None,
        }
    }

    /// Attach a value extracted from a failed response (servers often send
    /// usable diagnostics alongside a FAILURE exit code).
    pub fn with_value(mut self, value: ResultValue) -> Self {
        self.value = value;
        self
    }

    /// The DAS said "please wait"; the command may simply be resubmitted.
    pub fn is_retryable(&self) -> bool {
        matches!(self.event, TaskEvent::Busy)
    }

    pub fn is_completed(&self) -> bool {
        self.state == TaskState::Completed
    }

    pub fn string_value(&self) -> Option<&str> {
        match &self.value {
            ResultValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn list_value(&self) -> Option<&[String]> {
        match &self.value {
            ResultValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn map_value(&self) -> Option<&BTreeMap<String, String>> {
        match &self.value {
            ResultValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn log_value(&self) -> Option<(&[String], Option<&str>)> {
        match &self.value {
            ResultValue::Log { lines, next_query } => Some((lines, next_query.as_deref())),
            _ => None,
        }
    }

    pub fn process(&self) -> Option<&ProcessHandle> {
        match &self.value {
            ResultValue::Process(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Handle on a locally started DAS process. Cloneable; all clones share the
/// same underlying child.
#[derive(Debug, Clone)]
pub struct ProcessHandle {
    pid: Option<u32>,
    child: Arc<Mutex<Child>>,
}

impl ProcessHandle {
    pub fn new(child: Child) -> Self {
        Self {
            pid: child.id(),
            child: Arc::new(Mutex::new(child)),
        }
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Exit status if the process has already terminated.
    pub async fn try_wait(&self) -> Result<Option<ExitStatus>> {
        let mut child = self.child.lock().await;
        child.try_wait().context("polling DAS process status")
    }

    /// Kill the process and reap it.
    pub async fn stop(&self) -> Result<ExitStatus> {
        let mut child = self.child.lock().await;
        child.start_kill().context("killing DAS process")?;
        child.wait().await.context("waiting for DAS process to exit")
    }

    /// Block until the process exits on its own.
    pub async fn wait(&self) -> Result<ExitStatus> {
        let mut child = self.child.lock().await;
        child.wait().await.context("waiting for DAS process")
    }
}
