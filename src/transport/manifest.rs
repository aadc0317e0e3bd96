//! Legacy manifest-over-HTTP interface of pre-3.1 servers.
//!
//! Requests go to `/__asadmin/{command}?{query}`; the response body is a
//! Java-manifest-style `key: value` block with newlines in the message
//! escaped as the literal token `%%%EOL%%%`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, trace, warn};

use crate::admin::factory::{ResponseShape, RunnerBinding};
use crate::admin::result::{AdminResult, ResultValue, TaskEvent};
use crate::commands::Command;
use crate::error::CommandError;
use crate::server::ServerConnection;
use crate::transport::{
    apply_auth, build_client, encode_pairs, io_failure, is_busy_message, param_pairs,
    status_failure, ExitCode, Runner,
};

pub(crate) const EOL_TOKEN: &str = "%%%EOL%%%";

pub struct ManifestRunner {
    binding: RunnerBinding,
    client: Client,
}

impl ManifestRunner {
    pub(crate) fn new(
        command: &'static str,
        binding: RunnerBinding,
    ) -> Result<Self, CommandError> {
        Ok(Self {
            binding,
            client: build_client(command)?,
        })
    }
}

#[async_trait]
impl Runner for ManifestRunner {
    async fn run(&self, server: &ServerConnection, command: &Command) -> AdminResult {
        let name = command.name();
        let wire = self.binding.wire_name.unwrap_or(name);
        let query = encode_pairs(&param_pairs(command));
        let mut url = format!("{}/__asadmin/{}", server.admin_url(), wire);
        if !query.is_empty() {
            url.push('?');
            url.push_str(&query);
        }
        debug!(command = name, %url, "issuing manifest admin request");

        let response = match apply_auth(self.client.get(&url), server).send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(command = name, error = %e, "manifest request failed");
                return io_failure(name, &e);
            }
        };

        if let Some(failed) = status_failure(name, response.status()) {
            return failed;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return io_failure(name, &e),
        };
        trace!(command = name, body = %body, "manifest response body");

        let attrs = parse_manifest(&body);
        let message = attrs.get("message").map(|m| unescape_eol(m));

        if let Some(message) = &message {
            if is_busy_message(message) {
                debug!(command = name, "DAS not ready yet, signalling busy");
                return AdminResult::failed(name, TaskEvent::Busy, Some(message.clone()));
            }
        }

        let exit_code = match attrs.get("exit-code").and_then(|v| ExitCode::parse(v)) {
            Some(code) => code,
            None => {
                return AdminResult::failed(
                    name,
                    TaskEvent::BadResponse,
                    Some("manifest response carries no exit-code attribute".to_string()),
                )
            }
        };

        let value = extract_value(self.binding.shape, message.as_deref(), &attrs);
        if exit_code.is_success(self.binding.accepts_warning) {
            AdminResult::completed(name, message, value)
        } else {
            AdminResult::failed(name, TaskEvent::Failed, message).with_value(value)
        }
    }
}

/// Parse a manifest body into its attribute map. Continuation lines (a
/// leading space, per the JAR manifest format) append to the previous
/// attribute's value.
pub(crate) fn parse_manifest(body: &str) -> BTreeMap<String, String> {
    let mut attrs: BTreeMap<String, String> = BTreeMap::new();
    let mut last_key: Option<String> = None;

    for line in body.lines() {
        if line.is_empty() {
            continue;
        }
        if let Some(continuation) = line.strip_prefix(' ') {
            if let Some(key) = &last_key {
                if let Some(value) = attrs.get_mut(key) {
                    value.push_str(continuation);
                }
            }
            continue;
        }
        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim().to_string();
            attrs.insert(key.clone(), value.trim_start().to_string());
            last_key = Some(key);
        }
    }

    attrs
}

pub(crate) fn unescape_eol(message: &str) -> String {
    message.replace(EOL_TOKEN, "\n")
}

fn extract_value(
    shape: ResponseShape,
    message: Option<&str>,
    attrs: &BTreeMap<String, String>,
) -> ResultValue {
    match shape {
        ResponseShape::Message => ResultValue::String(message.unwrap_or_default().to_string()),
        ResponseShape::List => ResultValue::List(
            message
                .unwrap_or_default()
                .lines()
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
        ),
        ResponseShape::Map => ResultValue::Map(message_lines_to_map(message.unwrap_or_default())),
        ResponseShape::Location => {
            let mut map = BTreeMap::new();
            for key in ["Base-Root", "Domain-Root"] {
                if let Some(value) = attrs.get(key) {
                    map.insert(key.to_string(), value.clone());
                }
            }
            ResultValue::Map(map)
        }
        // Log and Process never bind to this runner
        ResponseShape::Log | ResponseShape::Process => ResultValue::None,
    }
}

/// Split `key=value` message lines into a map. Lines without `=` are
/// dropped; no matching lines at all yields an empty map, not a failure.
pub(crate) fn message_lines_to_map(message: &str) -> BTreeMap<String, String> {
    message
        .lines()
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_attributes_and_continuation_lines() {
        let body = "exit-code: SUCCESS\nmessage: first part\n  of the message\nchildren: none\n";
        let attrs = parse_manifest(body);
        assert_eq!(attrs.get("exit-code").unwrap(), "SUCCESS");
        // one leading space is the continuation marker, the rest is content
        assert_eq!(attrs.get("message").unwrap(), "first part of the message");
        assert_eq!(attrs.len(), 3);
    }

    #[test]
    fn unescapes_eol_token_in_messages() {
        let raw = "server.port=8080%%%EOL%%%server.host=localhost";
        assert_eq!(
            unescape_eol(raw),
            "server.port=8080\nserver.host=localhost"
        );
    }

    #[test]
    fn message_lines_split_on_first_equals() {
        let map = message_lines_to_map("a=1\nconfig.jdbc.url=jdbc:h2=mem\nplain line\n");
        assert_eq!(map.get("a").unwrap(), "1");
        assert_eq!(map.get("config.jdbc.url").unwrap(), "jdbc:h2=mem");
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn no_matching_lines_yields_empty_map() {
        let map = message_lines_to_map("");
        assert!(map.is_empty());
    }
}
