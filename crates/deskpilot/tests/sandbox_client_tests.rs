//! HTTP sandbox client against a mock sandbox API.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use deskpilot::sandbox::{
    Desktop, HttpSandboxConfig, HttpSandboxProvider, MouseButton, Point, SandboxError,
    SandboxProvider, ScrollDirection,
};

const ID: &str = "sbx_abc";

fn provider(server: &MockServer) -> HttpSandboxProvider {
    HttpSandboxProvider::new(HttpSandboxConfig {
        api_url: server.uri(),
        api_key: "sandbox-key".to_string(),
        template: "desktop".to_string(),
        request_timeout: Duration::from_secs(5),
    })
    .unwrap()
}

async fn mount_running(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(format!("/sandboxes/{ID}")))
        .and(header("X-API-Key", "sandbox-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"sandboxID": ID})))
        .mount(server)
        .await;
}

async fn expect_command(server: &MockServer, op: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(format!("/sandboxes/{ID}/desktop/{op}")))
        .and(header("X-API-Key", "sandbox-key"))
        .and(body_json(body))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_create_sends_template() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/sandboxes"))
        .and(header("X-API-Key", "sandbox-key"))
        .and(body_json(json!({"templateID": "desktop"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"sandboxID": ID})))
        .expect(1)
        .mount(&server)
        .await;

    let info = provider(&server).create().await.unwrap();
    assert_eq!(info.sandbox_id, ID);
}

#[tokio::test]
async fn test_connect_unknown_sandbox_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sandboxes/sbx_gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = match provider(&server).connect("sbx_gone").await {
        Ok(_) => panic!("expected not found"),
        Err(e) => e,
    };
    assert!(matches!(err, SandboxError::NotFound(ref id) if id == "sbx_gone"));
}

#[tokio::test]
async fn test_desktop_commands_hit_one_endpoint_each() {
    let server = MockServer::start().await;
    mount_running(&server).await;
    expect_command(
        &server,
        "mouse/click",
        json!({"x": 10, "y": 20, "button": "right", "double": false}),
    )
    .await;
    expect_command(&server, "keyboard/press", json!({"key": "enter"})).await;
    expect_command(
        &server,
        "mouse/scroll",
        json!({"direction": "down", "amount": 3}),
    )
    .await;
    expect_command(
        &server,
        "mouse/drag",
        json!({"from": {"x": 1, "y": 2}, "to": {"x": 3, "y": 4}}),
    )
    .await;

    let desktop = provider(&server).connect(ID).await.unwrap();
    assert_eq!(desktop.sandbox_id(), ID);
    desktop
        .click(MouseButton::Right, Point::new(10, 20))
        .await
        .unwrap();
    desktop.press("enter").await.unwrap();
    desktop.scroll(ScrollDirection::Down, 3).await.unwrap();
    desktop
        .drag(Point::new(1, 2), Point::new(3, 4))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_run_command_and_screenshot() {
    let server = MockServer::start().await;
    mount_running(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("/sandboxes/{ID}/desktop/commands/run")))
        .and(body_json(json!({"cmd": "ls nope"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stdout": "",
            "stderr": "no such file",
            "exitCode": 2
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/sandboxes/{ID}/desktop/screenshot")))
        .respond_with(ResponseTemplate::new(200).set_body_raw(b"\x89PNG".to_vec(), "image/png"))
        .mount(&server)
        .await;

    let desktop = provider(&server).connect(ID).await.unwrap();
    let output = desktop.run_command("ls nope").await.unwrap();
    assert_eq!(output.stderr, "no such file");
    assert_eq!(output.exit_code, 2);

    let png = desktop.screenshot().await.unwrap();
    assert_eq!(png, b"\x89PNG".to_vec());
}

#[tokio::test]
async fn test_api_errors_are_mapped() {
    let server = MockServer::start().await;
    mount_running(&server).await;
    Mock::given(method("POST"))
        .and(path(format!("/sandboxes/{ID}/desktop/keyboard/type")))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"message": "xdotool crashed"})),
        )
        .mount(&server)
        .await;

    let desktop = provider(&server).connect(ID).await.unwrap();
    match desktop.write("hello").await {
        Err(SandboxError::ApiError { status, message }) => {
            assert_eq!(status, 500);
            assert_eq!(message, "xdotool crashed");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_kill_tolerates_missing_sandbox() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/sandboxes/sbx_gone"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(format!("/sandboxes/{ID}")))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let provider = provider(&server);
    provider.kill("sbx_gone").await.unwrap();
    assert!(matches!(
        provider.kill(ID).await,
        Err(SandboxError::Unauthorized)
    ));
}

#[tokio::test]
async fn test_path_like_ids_never_reach_the_api() {
    let server = MockServer::start().await;
    Mock::given(wiremock::matchers::any())
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let provider = provider(&server);
    assert!(matches!(
        provider.kill("../admin/everything").await,
        Err(SandboxError::InvalidId(_))
    ));
    assert!(matches!(
        provider.connect("../../admin").await,
        Err(SandboxError::InvalidId(_))
    ));
}
