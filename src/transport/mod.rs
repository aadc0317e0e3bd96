pub mod local;
pub mod manifest;
pub mod rest;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::admin::result::{AdminResult, TaskEvent};
use crate::commands::Command;
use crate::error::CommandError;
use crate::server::ServerConnection;

pub(crate) const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Socket timeout set on every request; deploy of a large archive is the
/// slowest operation we issue.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Marker the DAS puts in responses while it is still booting and not yet
/// willing to execute commands.
pub(crate) const BUSY_MARKER: &str = "please wait";

/// Executes one command against one transport. Implementations never return
/// errors: everything that goes wrong after construction is folded into the
/// result's state, so a pending result always resolves.
#[async_trait]
pub trait Runner: Send + Sync {
    async fn run(&self, server: &ServerConnection, command: &Command) -> AdminResult;
}

/// Application-level exit indicator in both response formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExitCode {
    Success,
    Warning,
    Failure,
}

impl ExitCode {
    pub(crate) fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => Some(ExitCode::Success),
            "WARNING" => Some(ExitCode::Warning),
            "FAILURE" => Some(ExitCode::Failure),
            _ => None,
        }
    }

    /// Default success predicate is SUCCESS only; a handful of resource
    /// commands opt into also accepting WARNING (server quirk, see the
    /// factory's binding table).
    pub(crate) fn is_success(&self, accepts_warning: bool) -> bool {
        match self {
            ExitCode::Success => true,
            ExitCode::Warning => accepts_warning,
            ExitCode::Failure => false,
        }
    }
}

pub(crate) fn is_busy_message(message: &str) -> bool {
    message.to_ascii_lowercase().contains(BUSY_MARKER)
}

/// Wire parameters for a command, in a fixed order. Both interfaces share
/// the same parameter names; they differ only in how the pairs are carried
/// (query string vs POST body). Property maps are B-tree ordered, so the
/// output is stable for a given command value.
pub(crate) fn param_pairs(command: &Command) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = Vec::new();
    let mut push = |name: &str, value: String| pairs.push((name.to_string(), value));

    match command {
        Command::Version | Command::Location | Command::StopDas | Command::StartDas(_) => {}
        Command::ListApplications { target } => {
            if let Some(target) = target {
                push("target", target.clone());
            }
        }
        Command::Deploy {
            path,
            name,
            context_root,
            target,
            libraries,
            properties,
            force,
            keep_state,
        } => {
            push("DEFAULT", path.to_string_lossy().into_owned());
            if let Some(name) = name {
                push("name", name.clone());
            }
            if let Some(context_root) = context_root {
                push("contextroot", context_root.clone());
            }
            if let Some(target) = target {
                push("target", target.clone());
            }
            push("force", force.to_string());
            if *keep_state {
                push("keepstate", "true".to_string());
            }
            if !libraries.is_empty() {
                push("libraries", libraries.join(":"));
            }
            if !properties.is_empty() {
                push("properties", join_multi(properties));
            }
        }
        Command::Undeploy {
            name,
            target,
            cascade,
        } => {
            push("DEFAULT", name.clone());
            if let Some(target) = target {
                push("target", target.clone());
            }
            if *cascade {
                push("cascade", "true".to_string());
            }
        }
        Command::Enable { name, target } | Command::Disable { name, target } => {
            push("DEFAULT", name.clone());
            if let Some(target) = target {
                push("target", target.clone());
            }
        }
        Command::RestartDas { debug } => {
            push("debug", debug.to_string());
        }
        Command::GetProperty { pattern } => {
            push("pattern", pattern.clone());
        }
        Command::SetProperty { name, value } => {
            push("DEFAULT", format!("{name}={value}"));
        }
        Command::CreateJdbcConnectionPool {
            name,
            datasource_class,
            resource_type,
            properties,
        } => {
            push("DEFAULT", name.clone());
            push("datasourceclassname", datasource_class.clone());
            push("restype", resource_type.clone());
            if !properties.is_empty() {
                push("property", join_multi(properties));
            }
        }
        Command::CreateJdbcResource {
            jndi_name,
            pool_name,
            target,
            properties,
        } => {
            push("DEFAULT", jndi_name.clone());
            push("connectionpoolid", pool_name.clone());
            if let Some(target) = target {
                push("target", target.clone());
            }
            if !properties.is_empty() {
                push("property", join_multi(properties));
            }
        }
        Command::DeleteJdbcResource { jndi_name, target } => {
            push("DEFAULT", jndi_name.clone());
            if let Some(target) = target {
                push("target", target.clone());
            }
        }
        Command::DeleteJdbcConnectionPool { name, cascade } => {
            push("DEFAULT", name.clone());
            if *cascade {
                push("cascade", "true".to_string());
            }
        }
        // The cursor is already a complete query string; it is appended
        // verbatim by the log runner, not assembled from pairs.
        Command::FetchLog { .. } => {}
    }

    pairs
}

/// `key1=val1:key2=val2` joining for multi-valued parameters.
fn join_multi(map: &BTreeMap<String, String>) -> String {
    map.iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(":")
}

/// `name=value` pairs joined with `&`, values percent-encoded.
pub(crate) fn encode_pairs(pairs: &[(String, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={}", encode_value(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Percent-encode one parameter value. `:` separates multi-value sublists
/// and must reach the server literally.
fn encode_value(value: &str) -> String {
    urlencoding::encode(value).replace("%3A", ":")
}

pub(crate) fn build_client(command: &'static str) -> Result<Client, CommandError> {
    Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
        .map_err(|e| CommandError::RunnerInit {
            command,
            reason: e.to_string(),
        })
}

pub(crate) fn apply_auth(
    request: reqwest::RequestBuilder,
    server: &ServerConnection,
) -> reqwest::RequestBuilder {
    match &server.password {
        Some(password) => request.basic_auth(&server.user, Some(password)),
        None => request.basic_auth(&server.user, None::<&str>),
    }
}

/// Map a non-2xx status straight to a failed result; `None` means the
/// response is worth parsing.
pub(crate) fn status_failure(command: &str, status: StatusCode) -> Option<AdminResult> {
    if status.is_success() {
        return None;
    }
    let event = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TaskEvent::AuthFailed,
        StatusCode::BAD_GATEWAY => TaskEvent::BadGateway,
        _ => TaskEvent::BadResponse,
    };
    Some(AdminResult::failed(
        command,
        event,
        Some(format!("HTTP status {status}")),
    ))
}

/// Transport-level failure (connect refused, reset, timeout) to a result.
pub(crate) fn io_failure(command: &str, err: &reqwest::Error) -> AdminResult {
    AdminResult::failed(command, TaskEvent::IoError, Some(err.to_string()))
}
