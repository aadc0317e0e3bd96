use std::io::Write;
use std::time::Duration;

use flate2::write::GzEncoder;
use flate2::Compression;
use glassfish_admin::{
    AdminInterface, Command, ServerAdmin, ServerConnection, TaskEvent, TaskState,
};
use mockito::ServerGuard;

fn connection(server: &ServerGuard) -> ServerConnection {
    let host_with_port = server.host_with_port();
    let (host, port) = host_with_port.rsplit_once(':').unwrap();
    let mut connection = ServerConnection::localhost(port.parse().unwrap());
    connection.host = host.to_string();
    connection.with_interface(AdminInterface::Rest)
}

const WAIT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn version_reports_server_banner() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/management/domain/version")
        .match_header("X-Requested-By", "glassfish-admin")
        .with_status(200)
        .with_header("Content-Type", "application/json")
        .with_body(r#"{"exit-code":"SUCCESS","message":"Payara Server 5.2021.0 #badassfish"}"#)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(&connection(&server), Command::Version)
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Completed);
    assert!(result.string_value().unwrap().contains("5.2021.0"));
    mock.assert_async().await;
}

#[tokio::test]
async fn get_property_extracts_child_messages_into_map() {
    let mut server = mockito::Server::new_async().await;
    let body = r#"{
        "exit-code": "SUCCESS",
        "message": "",
        "children": [
            {"message": "server.http-listener-1.port=8080"},
            {"message": "server.docroot=%2Fvar%2520www"}
        ]
    }"#;
    let _mock = server
        .mock("POST", "/management/domain/get")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(
            &connection(&server),
            Command::GetProperty {
                pattern: "server.*".to_string(),
            },
        )
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Completed);
    let map = result.map_value().unwrap();
    assert_eq!(map.get("server.http-listener-1.port").unwrap(), "8080");
    // double-encoded value comes back fully decoded
    assert_eq!(map.get("server.docroot").unwrap(), "/var www");
}

#[tokio::test]
async fn get_property_with_no_matches_is_an_empty_completed_map() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/management/domain/get")
        .with_status(200)
        .with_body(r#"{"exit-code":"SUCCESS","message":"","children":[]}"#)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(
            &connection(&server),
            Command::GetProperty {
                pattern: "*.server-config.*.http-listener-1.port".to_string(),
            },
        )
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Completed);
    assert!(result.map_value().unwrap().is_empty());
}

#[tokio::test]
async fn undeploy_failure_drives_callers_delete_fallback() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/management/domain/undeploy")
        .with_status(200)
        .with_body(r#"{"exit-code":"FAILURE","message":"Application myapp is not deployed"}"#)
        .create_async()
        .await;

    // directory the caller removes by hand when undeploy is refused
    let deploy_dir = tempfile::tempdir().unwrap();
    let leftover = deploy_dir.path().join("myapp");
    std::fs::create_dir(&leftover).unwrap();

    let admin = ServerAdmin::new();
    let cleanup = leftover.clone();
    let result = admin
        .call(
            &connection(&server),
            Command::Undeploy {
                name: "myapp".to_string(),
                target: None,
                cascade: false,
            },
        )
        .timeout(WAIT)
        .on_failure(move |result| {
            assert_eq!(result.event, TaskEvent::Failed);
            std::fs::remove_dir_all(&cleanup).unwrap();
        })
        .run()
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Failed);
    assert!(result.message.unwrap().contains("not deployed"));
    assert!(!leftover.exists(), "fallback cleanup must have run");
}

#[tokio::test]
async fn warning_is_success_for_resource_commands_only() {
    let mut server = mockito::Server::new_async().await;
    let _create = server
        .mock("POST", "/management/domain/create-jdbc-resource")
        .with_status(200)
        .with_body(r#"{"exit-code":"WARNING","message":"resource created with warnings"}"#)
        .create_async()
        .await;
    let _enable = server
        .mock("POST", "/management/domain/enable")
        .with_status(200)
        .with_body(r#"{"exit-code":"WARNING","message":"partial"}"#)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let conn = connection(&server);

    let created = admin
        .exec(
            &conn,
            Command::CreateJdbcResource {
                jndi_name: "jdbc/test".to_string(),
                pool_name: "testPool".to_string(),
                target: None,
                properties: Default::default(),
            },
        )
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();
    assert_eq!(created.state, TaskState::Completed);

    let enabled = admin
        .exec(
            &conn,
            Command::Enable {
                name: "myapp".to_string(),
                target: None,
            },
        )
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();
    assert_eq!(enabled.state, TaskState::Failed);
    assert_eq!(enabled.event, TaskEvent::Failed);
}

#[tokio::test]
async fn busy_server_is_retried_then_reported_as_busy() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/management/domain/version")
        .with_status(200)
        .with_body(
            r#"{"exit-code":"FAILURE","message":"The server cannot process this command at this time, please wait"}"#,
        )
        .expect(3)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(&connection(&server), Command::Version)
        .unwrap()
        .wait(Duration::from_secs(30))
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Failed);
    assert_eq!(result.event, TaskEvent::Busy);
    assert!(result.is_retryable());
    mock.assert_async().await;
}

#[tokio::test]
async fn rejected_credentials_surface_as_auth_failure() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/management/domain/stop-domain")
        .with_status(401)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(
            &connection(&server).with_credentials("admin", "wrong"),
            Command::StopDas,
        )
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Failed);
    assert_eq!(result.event, TaskEvent::AuthFailed);
    assert!(!result.auth_success);
}

#[tokio::test]
async fn fetch_log_surfaces_lines_and_continuation_cursor() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/management/domain/view-log")
        .with_status(200)
        .with_header("X-Text-Append-Next", "start=4321&instanceName=server")
        .with_body("[INFO] line one\n[WARN] line two")
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(&connection(&server), Command::FetchLog { query: None })
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Completed);
    let (lines, next) = result.log_value().unwrap();
    assert_eq!(lines.join("\n"), "[INFO] line one\n[WARN] line two");
    assert_eq!(next, Some("start=4321&instanceName=server"));
}

#[tokio::test]
async fn fetch_log_inflates_gzip_bodies() {
    let lines = "[INFO] compressed one\n[INFO] compressed two";
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(lines.as_bytes()).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/management/domain/view-log?start=100")
        .with_status(200)
        .with_header("Content-Encoding", "gzip")
        .with_header("X-Text-Append-Next", "start=200")
        .with_body(compressed)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(
            &connection(&server),
            Command::FetchLog {
                query: Some("start=100".to_string()),
            },
        )
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    let (log_lines, next) = result.log_value().unwrap();
    assert_eq!(
        log_lines.join("\n"),
        "[INFO] compressed one\n[INFO] compressed two"
    );
    assert_eq!(next, Some("start=200"));
}

#[tokio::test]
async fn fetch_log_without_next_header_ends_the_stream() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("GET", "/management/domain/view-log")
        .with_status(200)
        .with_body("")
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let result = admin
        .exec(&connection(&server), Command::FetchLog { query: None })
        .unwrap()
        .wait(WAIT)
        .await
        .unwrap();

    assert_eq!(result.state, TaskState::Completed);
    let (lines, next) = result.log_value().unwrap();
    assert!(lines.is_empty());
    assert_eq!(next, None, "missing header means no more data, not an error");
}

#[tokio::test]
async fn watched_execution_streams_state_transitions() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
        .mock("POST", "/management/domain/version")
        .with_status(200)
        .with_body(r#"{"exit-code":"SUCCESS","message":"Payara Server 6.2024.1"}"#)
        .create_async()
        .await;

    let admin = ServerAdmin::new();
    let (pending, mut events) = admin
        .exec_watched(&connection(&server), Command::Version)
        .unwrap();
    let result = pending.wait(WAIT).await.unwrap();
    assert_eq!(result.state, TaskState::Completed);

    let mut seen = Vec::new();
    while let Ok(transition) = events.try_recv() {
        seen.push((transition.state, transition.event));
    }
    assert_eq!(
        seen,
        [
            (TaskState::NotSubmitted, TaskEvent::Submit),
            (TaskState::Running, TaskEvent::Start),
            (TaskState::Completed, TaskEvent::Completed),
        ]
    );
}
