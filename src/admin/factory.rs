//! Strategy selection: which runner executes which command over which
//! interface, declared once as a static binding table.

use crate::commands::Command;
use crate::error::CommandError;
use crate::server::{AdminInterface, ServerConnection};
use crate::transport::local::LocalStartRunner;
use crate::transport::manifest::ManifestRunner;
use crate::transport::rest::{RestFetchLogRunner, RestRunner};
use crate::transport::Runner;

/// Which piece of the response a runner extracts as the result value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// Top-level message string.
    Message,
    /// Child message parts as an ordered list.
    List,
    /// `key=value` child messages as a map.
    Map,
    /// Installation/domain directory properties.
    Location,
    /// Log lines plus continuation cursor.
    Log,
    /// Handle of a locally spawned process.
    Process,
}

/// Declarative association of one command variant with the runner behaviour
/// that executes it on one interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerBinding {
    /// Literal command name sent to the server when it differs from the
    /// command's logical name.
    pub wire_name: Option<&'static str>,
    pub shape: ResponseShape,
    /// Whether a WARNING exit code still counts as success. Old servers
    /// report WARNING from resource create/delete commands that did in fact
    /// succeed; the override set is kept closed and explicit.
    pub accepts_warning: bool,
}

impl RunnerBinding {
    const fn message() -> Self {
        Self {
            wire_name: None,
            shape: ResponseShape::Message,
            accepts_warning: false,
        }
    }

    const fn tolerant_message() -> Self {
        Self {
            wire_name: None,
            shape: ResponseShape::Message,
            accepts_warning: true,
        }
    }
}

/// Resolve the binding for a command on the given interface.
///
/// Every command resolvable here executes through the generic runner of its
/// interface unless the shape says otherwise; commands the interface cannot
/// carry are rejected synchronously.
pub fn binding_for(
    command: &Command,
    interface: AdminInterface,
) -> Result<RunnerBinding, CommandError> {
    let binding = match command {
        Command::Version => RunnerBinding::message(),
        Command::Location => RunnerBinding {
            // logical "location", literal endpoint name on both interfaces
            wire_name: Some("__locations"),
            shape: ResponseShape::Location,
            accepts_warning: false,
        },
        Command::ListApplications { .. } => RunnerBinding {
            // pre-3.1 servers only know the old command name
            wire_name: match interface {
                AdminInterface::Http => Some("list-components"),
                AdminInterface::Rest => None,
            },
            shape: ResponseShape::List,
            accepts_warning: false,
        },
        Command::GetProperty { .. } => RunnerBinding {
            wire_name: None,
            shape: ResponseShape::Map,
            accepts_warning: false,
        },
        Command::CreateJdbcConnectionPool { .. }
        | Command::CreateJdbcResource { .. }
        | Command::DeleteJdbcResource { .. }
        | Command::DeleteJdbcConnectionPool { .. } => RunnerBinding::tolerant_message(),
        Command::FetchLog { .. } => {
            if interface == AdminInterface::Http {
                return Err(CommandError::IllegalCommand {
                    command: command.name(),
                    interface: interface.as_str(),
                });
            }
            RunnerBinding {
                wire_name: None,
                shape: ResponseShape::Log,
                accepts_warning: false,
            }
        }
        Command::StartDas(_) => RunnerBinding {
            wire_name: None,
            shape: ResponseShape::Process,
            accepts_warning: false,
        },
        Command::Deploy { .. }
        | Command::Undeploy { .. }
        | Command::Enable { .. }
        | Command::Disable { .. }
        | Command::StopDas
        | Command::RestartDas { .. }
        | Command::SetProperty { .. } => RunnerBinding::message(),
    };
    Ok(binding)
}

/// Literal command name that goes on the wire.
pub fn wire_name(command: &Command, interface: AdminInterface) -> Result<&'static str, CommandError> {
    Ok(binding_for(command, interface)?
        .wire_name
        .unwrap_or(command.name()))
}

/// Stateless runner factory. Construct once, share freely; it holds nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdminFactory;

impl AdminFactory {
    /// Validate the command and bind it to the runner for the server's
    /// admin interface. All construction-time misuse surfaces here, before
    /// any I/O happens.
    pub fn runner(
        server: &ServerConnection,
        command: &Command,
    ) -> Result<Box<dyn Runner>, CommandError> {
        command.validate()?;
        let name = command.name();

        // StartDas bypasses HTTP entirely, whatever interface is configured.
        if matches!(command, Command::StartDas(_)) {
            return Ok(Box::new(LocalStartRunner));
        }

        let binding = binding_for(command, server.admin_interface)?;
        match server.admin_interface {
            AdminInterface::Rest => {
                if binding.shape == ResponseShape::Log {
                    Ok(Box::new(RestFetchLogRunner::new(name)?))
                } else {
                    Ok(Box::new(RestRunner::new(name, binding)?))
                }
            }
            AdminInterface::Http => Ok(Box::new(ManifestRunner::new(name, binding)?)),
        }
    }
}
