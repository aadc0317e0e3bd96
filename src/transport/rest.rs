//! REST/JSON administration interface (GlassFish 3.1+, all Payara releases).
//!
//! Commands POST a form-style body to `/management/domain/{command}` and get
//! back a JSON action report: an exit code, a top-level message and a tree
//! of child message parts. Log fetching is the odd one out: a GET that
//! returns plain text, possibly gzip-encoded, with the continuation cursor
//! in a response header.

use std::collections::BTreeMap;
use std::io::Read;

use anyhow::Context;
use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
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

/// CSRF guard header the REST interface insists on for POSTs.
const REQUESTED_BY: (&str, &str) = ("X-Requested-By", "glassfish-admin");
/// Response header carrying the query string for the next log fetch.
pub(crate) const APPEND_NEXT_HEADER: &str = "X-Text-Append-Next";

/// Response envelope of the REST command interface.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionReport {
    #[serde(rename = "exit-code")]
    pub exit_code: ExitCode,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub children: Vec<MessagePart>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessagePart {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub children: Vec<MessagePart>,
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

pub struct RestRunner {
    binding: RunnerBinding,
    client: Client,
}

impl RestRunner {
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
impl Runner for RestRunner {
    async fn run(&self, server: &ServerConnection, command: &Command) -> AdminResult {
        let name = command.name();
        let wire = self.binding.wire_name.unwrap_or(name);
        let url = format!("{}/management/domain/{}", server.admin_url(), wire);
        let body = encode_pairs(&param_pairs(command));
        debug!(command = name, %url, "issuing REST admin request");

        let request = apply_auth(self.client.post(&url), server)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(ACCEPT, "application/json")
            .header(REQUESTED_BY.0, REQUESTED_BY.1)
            .body(body);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(command = name, error = %e, "REST request failed");
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
        trace!(command = name, body = %body, "REST response body");

        let report: ActionReport = match serde_json::from_str(&body) {
            Ok(report) => report,
            Err(e) => {
                return AdminResult::failed(
                    name,
                    TaskEvent::BadResponse,
                    Some(format!("undecodable action report: {e}")),
                )
            }
        };

        if is_busy_message(&report.message) {
            debug!(command = name, "DAS not ready yet, signalling busy");
            return AdminResult::failed(name, TaskEvent::Busy, Some(report.message));
        }

        let value = extract_value(self.binding.shape, &report);
        let message = if report.message.is_empty() {
            None
        } else {
            Some(report.message.clone())
        };
        if report.exit_code.is_success(self.binding.accepts_warning) {
            AdminResult::completed(name, message, value)
        } else {
            AdminResult::failed(name, TaskEvent::Failed, message).with_value(value)
        }
    }
}

fn extract_value(shape: ResponseShape, report: &ActionReport) -> ResultValue {
    match shape {
        ResponseShape::Message => ResultValue::String(report.message.clone()),
        ResponseShape::List => ResultValue::List(
            report
                .children
                .iter()
                .map(|part| part.message.clone())
                .filter(|m| !m.is_empty())
                .collect(),
        ),
        ResponseShape::Map => ResultValue::Map(children_to_map(&report.children)),
        ResponseShape::Location => ResultValue::Map(report.properties.clone()),
        ResponseShape::Log | ResponseShape::Process => ResultValue::None,
    }
}

/// Child message parts of the form `key=value` become map entries, split on
/// the first `=`. An empty children list yields an empty map: a pattern
/// matching no dotted names is a successful query with no results.
pub(crate) fn children_to_map(children: &[MessagePart]) -> BTreeMap<String, String> {
    children
        .iter()
        .filter_map(|part| part.message.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), decode_property_value(value)))
        .collect()
}

/// Percent-decode a property value twice.
///
/// Old servers double-encoded property values on this interface; decoding
/// twice recovers them, and is a no-op for values without escapes. Either
/// decode failing falls back to the input as-is. Compatibility workaround,
/// kept deliberately narrow: nothing else uses it.
pub(crate) fn decode_property_value(raw: &str) -> String {
    let once = match urlencoding::decode(raw) {
        Ok(once) => once.into_owned(),
        Err(_) => return raw.to_string(),
    };
    match urlencoding::decode(&once) {
        Ok(twice) => twice.into_owned(),
        Err(_) => once,
    }
}

/// Log fetches diverge enough from command execution (GET, text body, gzip,
/// header cursor) to warrant their own runner.
pub struct RestFetchLogRunner {
    client: Client,
}

impl RestFetchLogRunner {
    pub(crate) fn new(command: &'static str) -> Result<Self, CommandError> {
        Ok(Self {
            client: build_client(command)?,
        })
    }
}

#[async_trait]
impl Runner for RestFetchLogRunner {
    async fn run(&self, server: &ServerConnection, command: &Command) -> AdminResult {
        let name = command.name();
        let cursor = match command {
            Command::FetchLog { query } => query.as_deref(),
            _ => {
                return AdminResult::failed(
                    name,
                    TaskEvent::BadResponse,
                    Some(format!("log runner bound to command `{name}`")),
                )
            }
        };

        let mut url = format!("{}/management/domain/view-log", server.admin_url());
        if let Some(cursor) = cursor {
            url.push('?');
            url.push_str(cursor);
        }
        debug!(command = name, %url, "fetching server log chunk");

        let request = apply_auth(self.client.get(&url), server).header(ACCEPT, "text/plain");
        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!(command = name, error = %e, "log fetch failed");
                return io_failure(name, &e);
            }
        };

        if let Some(failed) = status_failure(name, response.status()) {
            return failed;
        }

        let next_query = next_cursor(response.headers());
        let gzipped = is_gzip(response.headers());
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => return io_failure(name, &e),
        };

        match decode_log_body(&body, gzipped) {
            Ok(lines) => {
                debug!(
                    command = name,
                    lines = lines.len(),
                    has_next = next_query.is_some(),
                    "log chunk decoded"
                );
                AdminResult::completed(name, None, ResultValue::Log { lines, next_query })
            }
            Err(e) => AdminResult::failed(name, TaskEvent::BadResponse, Some(e.to_string())),
        }
    }
}

/// A missing `X-Text-Append-Next` header is not an error: it means the
/// server has no further log data to offer right now.
pub(crate) fn next_cursor(headers: &HeaderMap) -> Option<String> {
    headers
        .get(APPEND_NEXT_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

pub(crate) fn is_gzip(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_ENCODING)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.eq_ignore_ascii_case("gzip"))
}

/// Decode a log response body into its lines, inflating first when the
/// server compressed it.
pub(crate) fn decode_log_body(body: &[u8], gzipped: bool) -> anyhow::Result<Vec<String>> {
    let text = if gzipped {
        let mut text = String::new();
        GzDecoder::new(body)
            .read_to_string(&mut text)
            .context("inflating gzip log body")?;
        text
    } else {
        String::from_utf8(body.to_vec()).context("log body is not valid UTF-8")?
    };
    Ok(text.lines().map(str::to_string).collect())
}
