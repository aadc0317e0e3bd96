//! Local-process bootstrap of the DAS.
//!
//! Starting a domain is the one operation with no endpoint to call: the
//! admin server is not running yet. This runner assembles the java command
//! line, launches the bootstrap main class and hands back the OS process.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command as OsCommand;
use tracing::{debug, info, warn};

use crate::admin::result::{AdminResult, ProcessHandle, ResultValue, TaskEvent};
use crate::commands::Command;
use crate::server::ServerConnection;
use crate::transport::Runner;

const BOOTSTRAP_MAIN: &str = "com.sun.enterprise.glassfish.bootstrap.ASMain";

pub struct LocalStartRunner;

#[async_trait]
impl Runner for LocalStartRunner {
    async fn run(&self, _server: &ServerConnection, command: &Command) -> AdminResult {
        let name = command.name();
        let args = match command {
            Command::StartDas(args) => args,
            _ => {
                return AdminResult::failed(
                    name,
                    TaskEvent::ProcessFailed,
                    Some(format!("local start runner bound to command `{name}`")),
                )
            }
        };

        let java = java_executable(&args.java_home);
        if !java.is_file() {
            warn!(java = %java.display(), "Java VM executable not found");
            return AdminResult::failed(
                name,
                TaskEvent::NoJavaVm,
                Some(format!("no Java VM at {}", java.display())),
            );
        }

        let mut os_command = OsCommand::new(&java);
        os_command
            .arg("-cp")
            .arg(&args.classpath)
            .args(&args.java_options)
            .arg(BOOTSTRAP_MAIN)
            .args(&args.glassfish_args)
            .current_dir(&args.domain_dir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .stdin(Stdio::null())
            .kill_on_drop(false);

        debug!(
            java = %java.display(),
            domain_dir = %args.domain_dir.display(),
            "spawning DAS bootstrap process"
        );

        let mut child = match os_command.spawn() {
            Ok(child) => child,
            Err(e) => {
                warn!(error = %e, "failed to spawn DAS process");
                return AdminResult::failed(
                    name,
                    TaskEvent::ProcessFailed,
                    Some(format!("spawning DAS process: {e}")),
                );
            }
        };

        stream_output(&mut child);
        let handle = ProcessHandle::new(child);
        info!(pid = ?handle.pid(), "DAS process started");
        AdminResult::completed(name, None, ResultValue::Process(handle))
    }
}

fn java_executable(java_home: &Path) -> PathBuf {
    let binary = if cfg!(windows) { "java.exe" } else { "java" };
    java_home.join("bin").join(binary)
}

/// Forward the bootstrap's stdout/stderr into our log, line by line, until
/// the pipes close.
fn stream_output(child: &mut tokio::process::Child) {
    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                info!(target: "glassfish_admin::das", "{line}");
            }
        });
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!(target: "glassfish_admin::das", "{line}");
            }
        });
    }
}
