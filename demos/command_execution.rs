/// Example: probe a local Payara/GlassFish DAS and list its applications.
///
/// Run with: cargo run --example command_execution
use std::time::Duration;

use glassfish_admin::{Command, ServerAdmin, ServerConnection};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    glassfish_admin::utils::logging::init();

    let server = ServerConnection::localhost(4848);
    let admin = ServerAdmin::new();

    let version = admin
        .call(&server, Command::Version)
        .timeout(Duration::from_secs(10))
        .on_failure(|result| {
            tracing::warn!(event = ?result.event, "version probe failed; is the DAS running?")
        })
        .run()
        .await?;

    if let Some(banner) = version.string_value() {
        tracing::info!("server answered: {banner}");
    }

    if version.is_completed() {
        let apps = admin
            .call(&server, Command::ListApplications { target: None })
            .timeout(Duration::from_secs(10))
            .run()
            .await?;
        for app in apps.list_value().unwrap_or_default() {
            tracing::info!("deployed application: {app}");
        }
    }

    Ok(())
}
