//! Asynchronous submission façade.
//!
//! Commands become jobs on a worker queue; callers get a [`PendingResult`]
//! and block on it with an explicit timeout. The default is one worker, so
//! back-to-back commands against the same DAS execute in submission order;
//! sequences like stop, reconfigure, start depend on that. Callers that know
//! their operations are independent (say, polling several servers' status)
//! opt into a wider pool with [`ServerAdmin::with_parallelism`].

pub mod factory;
pub mod result;

pub use factory::AdminFactory;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::admin::result::{AdminResult, TaskEvent, TaskState, TaskTransition};
use crate::commands::Command;
use crate::error::{AdminError, CommandError, WaitError};
use crate::server::ServerConnection;
use crate::transport::Runner;

/// Total attempts for a retry-flagged command that keeps getting "please
/// wait" from a starting DAS.
const MAX_BUSY_ATTEMPTS: usize = 3;
const BUSY_RETRY_DELAY: Duration = Duration::from_secs(3);

const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

struct Job {
    server: ServerConnection,
    command: Command,
    runner: Box<dyn Runner>,
    retry: bool,
    events: Option<mpsc::UnboundedSender<TaskTransition>>,
    reply: oneshot::Sender<AdminResult>,
}

/// Handle on one submitted command's eventual result.
pub struct PendingResult {
    command: &'static str,
    rx: oneshot::Receiver<AdminResult>,
}

impl PendingResult {
    pub fn command(&self) -> &'static str {
        self.command
    }

    /// Block until the result arrives or the timeout expires. Expiry
    /// abandons the receiver; the in-flight request is bounded separately
    /// by the socket timeouts every runner sets on its connections.
    pub async fn wait(self, limit: Duration) -> Result<AdminResult, WaitError> {
        match timeout(limit, self.rx).await {
            Err(_) => {
                warn!(command = self.command, timeout = ?limit, "wait for admin result timed out");
                Err(WaitError::Timeout(limit))
            }
            Ok(Err(_)) => Err(WaitError::Cancelled),
            Ok(Ok(result)) => Ok(result),
        }
    }
}

/// Submission façade over the worker pool. Cheap to clone; clones feed the
/// same queue.
#[derive(Clone)]
pub struct ServerAdmin {
    queue: mpsc::UnboundedSender<Job>,
}

impl ServerAdmin {
    /// Serialized executor: one worker, commands run in submission order.
    pub fn new() -> Self {
        Self::with_workers(1)
    }

    /// Parallel executor with `workers` concurrent jobs. Opt-in escape
    /// hatch for independent operations; ordering across commands is gone.
    pub fn with_parallelism(workers: usize) -> Self {
        Self::with_workers(workers.max(1))
    }

    fn with_workers(workers: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel::<Job>();
        let rx = Arc::new(Mutex::new(rx));
        for _ in 0..workers {
            let rx = Arc::clone(&rx);
            tokio::spawn(async move {
                loop {
                    let job = { rx.lock().await.recv().await };
                    match job {
                        Some(job) => run_job(job).await,
                        None => break,
                    }
                }
            });
        }
        Self { queue: tx }
    }

    /// Submit a command for execution. Construction-time misuse (bad
    /// parameters, command the interface cannot carry) errors here,
    /// synchronously; everything later lands in the result.
    pub fn exec(
        &self,
        server: &ServerConnection,
        command: Command,
    ) -> Result<PendingResult, CommandError> {
        self.submit(server, command, None, None)
    }

    /// Like [`exec`](Self::exec), additionally yielding a stream of state
    /// transitions observed while the command runs. Best effort: the final
    /// state is authoritative in the result itself.
    pub fn exec_watched(
        &self,
        server: &ServerConnection,
        command: Command,
    ) -> Result<(PendingResult, mpsc::UnboundedReceiver<TaskTransition>), CommandError> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let pending = self.submit(server, command, None, Some(events_tx))?;
        Ok((pending, events_rx))
    }

    /// Fluent per-call builder: timeout, retry override and a non-fatal
    /// failure callback.
    pub fn call<'a>(&'a self, server: &'a ServerConnection, command: Command) -> AdminCall<'a> {
        AdminCall {
            admin: self,
            server,
            command,
            limit: DEFAULT_CALL_TIMEOUT,
            retry: None,
            on_failure: None,
        }
    }

    fn submit(
        &self,
        server: &ServerConnection,
        command: Command,
        retry_override: Option<bool>,
        events: Option<mpsc::UnboundedSender<TaskTransition>>,
    ) -> Result<PendingResult, CommandError> {
        let runner = AdminFactory::runner(server, &command)?;
        let name = command.name();
        let retry = retry_override.unwrap_or_else(|| command.retryable());
        let (reply, rx) = oneshot::channel();

        emit(&events, name, TaskState::NotSubmitted, TaskEvent::Submit, None);
        debug!(command = name, host = %server.host, "admin command queued");

        let job = Job {
            server: server.clone(),
            command,
            runner,
            retry,
            events,
            reply,
        };
        self.queue.send(job).map_err(|_| CommandError::RunnerInit {
            command: name,
            reason: "admin worker pool has shut down".to_string(),
        })?;

        Ok(PendingResult { command: name, rx })
    }
}

impl Default for ServerAdmin {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_job(job: Job) {
    let Job {
        server,
        command,
        runner,
        retry,
        events,
        reply,
    } = job;
    let name = command.name();

    let mut attempt = 1;
    let result = loop {
        emit(&events, name, TaskState::Running, TaskEvent::Start, None);
        let result = runner.run(&server, &command).await;

        if result.is_retryable() && retry && attempt < MAX_BUSY_ATTEMPTS {
            attempt += 1;
            info!(
                command = name,
                attempt,
                "DAS busy, resubmitting after {:?}",
                BUSY_RETRY_DELAY
            );
            emit(
                &events,
                name,
                TaskState::Running,
                TaskEvent::Busy,
                result.message.clone(),
            );
            sleep(BUSY_RETRY_DELAY).await;
            continue;
        }
        break result;
    };

    match result.state {
        TaskState::Completed => debug!(command = name, "admin command completed"),
        _ => warn!(
            command = name,
            event = ?result.event,
            message = result.message.as_deref().unwrap_or(""),
            "admin command did not complete"
        ),
    }
    emit(&events, name, result.state, result.event, result.message.clone());

    // receiver may have timed out and gone away; that is its business
    let _ = reply.send(result);
}

fn emit(
    events: &Option<mpsc::UnboundedSender<TaskTransition>>,
    command: &str,
    state: TaskState,
    event: TaskEvent,
    message: Option<String>,
) {
    if let Some(events) = events {
        let _ = events.send(TaskTransition {
            command: command.to_string(),
            state,
            event,
            message,
        });
    }
}

/// Builder returned by [`ServerAdmin::call`].
pub struct AdminCall<'a> {
    admin: &'a ServerAdmin,
    server: &'a ServerConnection,
    command: Command,
    limit: Duration,
    retry: Option<bool>,
    on_failure: Option<Box<dyn FnOnce(&AdminResult) + Send>>,
}

impl<'a> AdminCall<'a> {
    pub fn timeout(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }

    /// Override the command's default busy-retry behaviour.
    pub fn retry(mut self, retry: bool) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Invoked when the final state is anything but Completed, before the
    /// result is returned. For non-fatal diagnostics; nothing is thrown.
    pub fn on_failure(mut self, callback: impl FnOnce(&AdminResult) + Send + 'static) -> Self {
        self.on_failure = Some(Box::new(callback));
        self
    }

    pub async fn run(self) -> Result<AdminResult, AdminError> {
        let pending = self
            .admin
            .submit(self.server, self.command, self.retry, None)?;
        let result = pending.wait(self.limit).await?;
        if !result.is_completed() {
            if let Some(callback) = self.on_failure {
                callback(&result);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn construction_misuse_errors_synchronously() {
        let admin = ServerAdmin::new();
        let server = ServerConnection::localhost(4848);
        let err = admin
            .exec(
                &server,
                Command::Undeploy {
                    name: String::new(),
                    target: None,
                    cascade: false,
                },
            )
            .err()
            .expect("must not queue");
        assert!(matches!(err, CommandError::MissingParameter { .. }));
    }

    #[tokio::test]
    async fn pending_result_carries_command_name() {
        let admin = ServerAdmin::new();
        let server = ServerConnection::localhost(4848);
        let pending = admin.exec(&server, Command::Version).unwrap();
        assert_eq!(pending.command(), "version");
    }
}
