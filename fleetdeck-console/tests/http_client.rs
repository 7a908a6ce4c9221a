use std::sync::Arc;

use fleetdeck_console::config::{ApiConf, PollerConf};
use fleetdeck_console::models::{
    AgentAction, DeploymentConfig, DeploymentMode, DiscoverRequest, HardwareReport, HardwareRequest,
    Platform, ProbeKind, ProbeReply, ProbeRequest,
};
use fleetdeck_console::{ApiError, DeploymentPoller, FleetApi, HttpFleetApi};
use fleetdeck_devkit::{
    spawn_mock_server, AgentStatusBuilder, MockFleetApi, MockServer, RecordedCall, ScriptedStatus,
};

async fn client(stub: &Arc<MockFleetApi>) -> (MockServer, HttpFleetApi) {
    let server = spawn_mock_server(stub.clone()).await.unwrap();
    let api = HttpFleetApi::new(&server.api_conf()).unwrap();
    (server, api)
}

#[tokio::test]
async fn node_list_round_trip() {
    let stub = Arc::new(MockFleetApi::new());
    let (_server, api) = client(&stub).await;

    api.save_nodes(&["10.0.0.5:22".to_string(), "10.0.0.6".to_string()]).await.unwrap();
    assert_eq!(api.list_nodes().await.unwrap(), vec!["10.0.0.5:22", "10.0.0.6"]);

    api.remove_node("10.0.0.6").await.unwrap();
    assert_eq!(stub.registered_nodes(), vec!["10.0.0.5:22"]);
}

#[tokio::test]
async fn failed_probe_still_yields_its_reply() {
    let stub = Arc::new(MockFleetApi::new());
    stub.set_probe_reply(ProbeKind::Ssh, ProbeReply::error("Connection timed out"));
    let (_server, api) = client(&stub).await;

    let req = ProbeRequest {
        kind: ProbeKind::Ssh,
        host: "10.0.0.5\n10.0.0.6".into(),
        port: "22".into(),
    };
    let reply = api.test_connection(&req).await.unwrap();
    assert!(!reply.is_success());
    assert_eq!(reply.message, "Connection timed out");
    stub_saw(&stub, RecordedCall::TestConnection(req));

    let ok = ProbeRequest {
        kind: ProbeKind::Inference,
        host: "10.0.0.5".into(),
        port: "8000".into(),
    };
    assert!(api.test_connection(&ok).await.unwrap().is_success());
}

#[tokio::test]
async fn models_and_hardware_decode() {
    let stub = Arc::new(MockFleetApi::new());
    stub.set_models(["llama-3-8b", "qwen2-7b"]);
    stub.set_hardware(HardwareReport {
        status: "success".into(),
        platform: Some("ascend".into()),
        details: String::new(),
    });
    let (_server, api) = client(&stub).await;

    let req = DiscoverRequest {
        host: "10.0.0.5".into(),
        port: "8000".into(),
        mode: DeploymentMode::NewDeployment,
    };
    let models = api.discover_models(&req).await.unwrap();
    let ids: Vec<String> = models.into_iter().map(|m| m.id).collect();
    assert_eq!(ids, vec!["llama-3-8b", "qwen2-7b"]);

    let report = api
        .detect_hardware(&HardwareRequest { host: "10.0.0.5".into(), port: "22".into() })
        .await
        .unwrap();
    assert_eq!(report.detected_platform(), Some(Platform::Ascend));
}

#[tokio::test]
async fn unknown_agent_is_none_not_an_error() {
    let stub = Arc::new(MockFleetApi::new());
    stub.set_status("10.0.0.5", AgentStatusBuilder::ready("10.0.0.5").build());
    let (_server, api) = client(&stub).await;

    let status = api.agent_status("10.0.0.5").await.unwrap().unwrap();
    assert!(status.is_online());
    assert_eq!(status.services[0].name, "vllm");
    assert_eq!(api.agent_status("10.0.0.7").await.unwrap(), None);
    stub_saw(&stub, RecordedCall::AgentStatus("10.0.0.7".into()));
}

#[tokio::test]
async fn poller_queries_status_by_ip() {
    let stub = Arc::new(MockFleetApi::new());
    stub.script_status(
        "10.0.0.5",
        vec![
            ScriptedStatus::Unknown,
            ScriptedStatus::Report(AgentStatusBuilder::ready("10.0.0.5").build()),
        ],
    );
    let (_server, api) = client(&stub).await;

    let conf = PollerConf { interval_ms: 10, max_attempts: 50 };
    let poller = DeploymentPoller::new(Arc::new(api), &conf);
    let outcome = poller.start("10.0.0.5:22").unwrap().finish().await.unwrap();
    assert!(outcome.is_ready());
    assert_eq!(outcome.attempts, 2);
    assert_eq!(stub.status_queries("10.0.0.5"), 2);
}

#[tokio::test]
async fn control_and_generate_report_api_errors() {
    let stub = Arc::new(MockFleetApi::new());
    stub.set_nodes(["10.0.0.5"]);
    stub.fail_generate("ansible inventory error");
    let (_server, api) = client(&stub).await;

    let message = api.agent_control("10.0.0.5", AgentAction::Restart).await.unwrap();
    assert_eq!(message, "restart command sent to 10.0.0.5");

    match api.agent_control("10.0.0.9", AgentAction::Stop).await {
        Err(ApiError::Status { status, message }) => {
            assert_eq!(status, 404);
            assert_eq!(message, "agent not found");
        }
        other => panic!("unexpected {other:?}"),
    }

    let cfg: DeploymentConfig = serde_json::from_value(serde_json::json!({
        "mgmt_host": "10.0.0.1", "mgmt_port": "3000",
        "mode": "new_deployment", "platform": "nvidia",
        "target_nodes": ["10.0.0.5:22"],
        "model_name": "llama-3-8b", "inference_host": "10.0.0.5", "inference_port": "8000",
        "enable_rag": false, "enable_vectordb": false, "enable_parser": false
    }))
    .unwrap();
    let err = api.generate(&cfg).await.unwrap_err();
    assert_eq!(err.operator_message(), "ansible inventory error");
    assert_eq!(stub.generate_calls(), vec![cfg]);
}

#[tokio::test]
async fn bearer_token_is_sent_when_configured() {
    let stub = Arc::new(MockFleetApi::new());
    stub.set_nodes(["10.0.0.5"]);
    let server = MockServer::start(stub.clone(), Some("s3cret")).await.unwrap();

    let anonymous = HttpFleetApi::new(&server.api_conf()).unwrap();
    match anonymous.list_nodes().await {
        Err(ApiError::Status { status, .. }) => assert_eq!(status, 401),
        other => panic!("unexpected {other:?}"),
    }

    let mut conf = server.api_conf();
    conf.token = Some("s3cret".into());
    let api = HttpFleetApi::new(&conf).unwrap();
    assert_eq!(api.list_nodes().await.unwrap(), vec!["10.0.0.5"]);
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let conf = ApiConf {
        base_url: "http://127.0.0.1:9".into(),
        timeout_secs: 2,
        ..ApiConf::default()
    };
    let api = HttpFleetApi::new(&conf).unwrap();

    let err = api.list_nodes().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
    assert_eq!(err.operator_message(), "failed to contact the management server");
}

fn stub_saw(stub: &MockFleetApi, call: RecordedCall) {
    assert!(stub.calls().contains(&call), "missing {call:?}");
}
