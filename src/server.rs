use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CommandError;

/// Connection descriptor for one server's DAS (Domain Administration Server).
///
/// Owned by whatever configuration layer sits above this crate; the admin
/// core only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConnection {
    pub host: String,
    pub admin_port: u16,
    #[serde(default)]
    pub protocol: Protocol,
    #[serde(default)]
    pub admin_interface: AdminInterface,
    #[serde(default = "default_admin_user")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// False for a server whose domain directory lives on this machine.
    #[serde(default)]
    pub remote: bool,
    /// Domain directory, local servers only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain_dir: Option<PathBuf>,
}

fn default_admin_user() -> String {
    "admin".to_string()
}

impl ServerConnection {
    /// Local server on 127.0.0.1 with the default anonymous admin account.
    pub fn localhost(admin_port: u16) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            admin_port,
            protocol: Protocol::Http,
            admin_interface: AdminInterface::Rest,
            user: default_admin_user(),
            password: None,
            remote: false,
            domain_dir: None,
        }
    }

    pub fn with_interface(mut self, admin_interface: AdminInterface) -> Self {
        self.admin_interface = admin_interface;
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = Some(password.into());
        self
    }

    /// Base URL of the admin endpoint, e.g. `https://dashost:4848`.
    pub fn admin_url(&self) -> String {
        format!(
            "{}://{}:{}",
            self.protocol.scheme(),
            self.host,
            self.admin_port
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Http,
    Https,
}

impl Protocol {
    pub fn scheme(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::Https => "https",
        }
    }
}

/// Which administration interface the DAS speaks.
///
/// `Rest` is the JSON interface of GlassFish 3.1+ and every Payara release;
/// `Http` is the legacy manifest-over-HTTP interface of older servers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminInterface {
    #[default]
    Rest,
    Http,
}

impl AdminInterface {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminInterface::Rest => "rest",
            AdminInterface::Http => "http",
        }
    }
}

impl FromStr for AdminInterface {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rest" => Ok(AdminInterface::Rest),
            "http" => Ok(AdminInterface::Http),
            other => Err(CommandError::UnknownAdminInterface(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admin_url_uses_protocol_scheme() {
        let mut server = ServerConnection::localhost(4848);
        assert_eq!(server.admin_url(), "http://127.0.0.1:4848");
        server.protocol = Protocol::Https;
        assert_eq!(server.admin_url(), "https://127.0.0.1:4848");
    }

    #[test]
    fn admin_interface_parses_known_values() {
        assert_eq!("rest".parse::<AdminInterface>().unwrap(), AdminInterface::Rest);
        assert_eq!(" HTTP ".parse::<AdminInterface>().unwrap(), AdminInterface::Http);
        assert!(matches!(
            "jmx".parse::<AdminInterface>(),
            Err(CommandError::UnknownAdminInterface(v)) if v == "jmx"
        ));
    }
}
