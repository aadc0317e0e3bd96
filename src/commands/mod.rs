use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// One administrative operation against a DAS, as pure data.
///
/// A command says what to do, on which target, with which parameters; it
/// knows nothing about how either admin interface puts it on the wire.
/// Parameter maps are ordered so that building the same command twice
/// produces byte-identical requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    /// Server version banner; the standard "is it up yet" probe.
    Version,
    /// Installation and domain root directories of the DAS.
    Location,
    ListApplications {
        target: Option<String>,
    },
    Deploy {
        path: PathBuf,
        name: Option<String>,
        context_root: Option<String>,
        target: Option<String>,
        #[serde(default)]
        libraries: Vec<String>,
        #[serde(default)]
        properties: BTreeMap<String, String>,
        #[serde(default)]
        force: bool,
        /// Preserve HTTP sessions across the redeploy.
        #[serde(default)]
        keep_state: bool,
    },
    Undeploy {
        name: String,
        target: Option<String>,
        #[serde(default)]
        cascade: bool,
    },
    Enable {
        name: String,
        target: Option<String>,
    },
    Disable {
        name: String,
        target: Option<String>,
    },
    StopDas,
    RestartDas {
        #[serde(default)]
        debug: bool,
    },
    /// Dotted-name query, e.g. `*.server-config.*.http-listener-1.port`.
    GetProperty {
        pattern: String,
    },
    SetProperty {
        name: String,
        value: String,
    },
    CreateJdbcConnectionPool {
        name: String,
        datasource_class: String,
        resource_type: String,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    CreateJdbcResource {
        jndi_name: String,
        pool_name: String,
        target: Option<String>,
        #[serde(default)]
        properties: BTreeMap<String, String>,
    },
    DeleteJdbcResource {
        jndi_name: String,
        target: Option<String>,
    },
    DeleteJdbcConnectionPool {
        name: String,
        #[serde(default)]
        cascade: bool,
    },
    /// Pull a chunk of server.log; `query` is the continuation cursor from
    /// the previous fetch, verbatim, or `None` for the first chunk.
    FetchLog {
        query: Option<String>,
    },
    /// Boot the DAS process itself. The only command that never touches
    /// HTTP: there is no endpoint to talk to before this one runs.
    StartDas(StartDasArgs),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartDasArgs {
    pub java_home: PathBuf,
    pub classpath: String,
    #[serde(default)]
    pub java_options: Vec<String>,
    #[serde(default)]
    pub glassfish_args: Vec<String>,
    pub domain_dir: PathBuf,
}

impl Command {
    /// Logical command name. The wire-level name may differ when a runner
    /// binding overrides it (see `admin::factory`).
    pub fn name(&self) -> &'static str {
        match self {
            Command::Version => "version",
            Command::Location => "location",
            Command::ListApplications { .. } => "list-applications",
            Command::Deploy { .. } => "deploy",
            Command::Undeploy { .. } => "undeploy",
            Command::Enable { .. } => "enable",
            Command::Disable { .. } => "disable",
            Command::StopDas => "stop-domain",
            Command::RestartDas { .. } => "restart-domain",
            Command::GetProperty { .. } => "get",
            Command::SetProperty { .. } => "set",
            Command::CreateJdbcConnectionPool { .. } => "create-jdbc-connection-pool",
            Command::CreateJdbcResource { .. } => "create-jdbc-resource",
            Command::DeleteJdbcResource { .. } => "delete-jdbc-resource",
            Command::DeleteJdbcConnectionPool { .. } => "delete-jdbc-connection-pool",
            Command::FetchLog { .. } => "view-log",
            Command::StartDas(_) => "start-das",
        }
    }

    /// Whether the façade may resubmit this command when the DAS answers
    /// "please wait" during startup. Read-only probes are; anything that
    /// mutates the domain is not, there the caller decides.
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Command::Version
                | Command::Location
                | Command::ListApplications { .. }
                | Command::GetProperty { .. }
                | Command::FetchLog { .. }
        )
    }

    /// Reject parameter combinations no runner could turn into a request.
    /// Runs before runner construction, so misuse fails synchronously.
    pub fn validate(&self) -> Result<(), CommandError> {
        let missing = |parameter| CommandError::MissingParameter {
            command: self.name(),
            parameter,
        };
        match self {
            Command::Deploy { path, .. } if path.as_os_str().is_empty() => Err(missing("path")),
            Command::Undeploy { name, .. } if name.is_empty() => Err(missing("name")),
            Command::Enable { name, .. } | Command::Disable { name, .. } if name.is_empty() => {
                Err(missing("name"))
            }
            Command::GetProperty { pattern } if pattern.is_empty() => Err(missing("pattern")),
            Command::SetProperty { name, .. } if name.is_empty() => Err(missing("name")),
            Command::CreateJdbcConnectionPool {
                name,
                datasource_class,
                ..
            } => {
                if name.is_empty() {
                    Err(missing("name"))
                } else if datasource_class.is_empty() {
                    Err(missing("datasource_class"))
                } else {
                    Ok(())
                }
            }
            Command::CreateJdbcResource {
                jndi_name,
                pool_name,
                ..
            } => {
                if jndi_name.is_empty() {
                    Err(missing("jndi_name"))
                } else if pool_name.is_empty() {
                    Err(missing("pool_name"))
                } else {
                    Ok(())
                }
            }
            Command::DeleteJdbcResource { jndi_name, .. } if jndi_name.is_empty() => {
                Err(missing("jndi_name"))
            }
            Command::DeleteJdbcConnectionPool { name, .. } if name.is_empty() => {
                Err(missing("name"))
            }
            Command::StartDas(args) => {
                if args.classpath.is_empty() {
                    Err(missing("classpath"))
                } else if args.java_home.as_os_str().is_empty() {
                    Err(missing("java_home"))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probes_are_retryable_mutations_are_not() {
        assert!(Command::Version.retryable());
        assert!(Command::GetProperty {
            pattern: "*.port".into()
        }
        .retryable());
        assert!(!Command::StopDas.retryable());
        assert!(!Command::Undeploy {
            name: "app".into(),
            target: None,
            cascade: false,
        }
        .retryable());
    }

    #[test]
    fn validate_rejects_empty_required_fields() {
        let cmd = Command::Undeploy {
            name: String::new(),
            target: None,
            cascade: false,
        };
        assert!(matches!(
            cmd.validate(),
            Err(CommandError::MissingParameter {
                command: "undeploy",
                parameter: "name",
            })
        ));
        assert!(Command::Version.validate().is_ok());
    }
}
