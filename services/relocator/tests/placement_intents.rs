
use std::sync::Arc;

use harness::{app_intent_path, gpi_path, Fixture};
use relo_placement::{ClusterSelector, Phase};
use relo_relocator::{
    DeploymentUnitClient, RelocationConfig, RelocationError, RelocationRun, Relocator,
};
use relo_testing::{app_intent, params, ScriptedStatusSource, StaticResolver, DIG_PATH};
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn source() -> Arc<ScriptedStatusSource> {
    Arc::new(ScriptedStatusSource::default())
}

#[tokio::test]
async fn fetch_matches_app_case_insensitively() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[
            (
                "gpi-a",
                vec![
                    app_intent("web-a", "WEB", vec![ClusterSelector::by_name("p1", "c1")]),
                    app_intent("db-a", "db", vec![ClusterSelector::by_name("p1", "c1")]),
                ],
            ),
            (
                "gpi-b",
                vec![app_intent("web-b", "Web", vec![ClusterSelector::by_name("p2", "c9")])],
            ),
        ])
        .await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();

    assert_eq!(
        run.intents_url,
        Some(format!("{}{}", fixture.orchestrator.uri(), gpi_path()))
    );
    assert_eq!(run.placements.len(), 2);

    let records = &run.placements["gpi-a"];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].app_intent_name, "web-a");
    assert_eq!(records[0].application_name, "WEB");
    assert_eq!(records[0].phase, Phase::Apply);
    assert!(records[0].planned_policy.is_none());

    assert_eq!(run.placements["gpi-b"][0].app_intent_name, "web-b");
}

#[tokio::test]
async fn fetch_folds_non_ascii_app_names() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[(
            "gpi-a",
            vec![
                app_intent("aerzte-a", "ÄRZTE", vec![ClusterSelector::by_name("p1", "c1")]),
                app_intent("web-a", "web", vec![ClusterSelector::by_name("p1", "c1")]),
            ],
        )])
        .await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    run.config.target_app = "ärzte".to_string();
    relocator.fetch(&mut run).await.unwrap();

    let records = &run.placements["gpi-a"];
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].app_intent_name, "aerzte-a");
    assert_eq!(records[0].application_name, "ÄRZTE");
}

#[tokio::test]
async fn fetch_app_missing_from_an_intent_is_not_found() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[
            ("gpi-a", vec![app_intent("web-a", "web", vec![])]),
            ("gpi-b", vec![app_intent("db-b", "db", vec![])]),
        ])
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fixture.orchestrator)
        .await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    let err = relocator.fetch(&mut run).await.unwrap_err();

    assert!(matches!(err, RelocationError::NotFound { ref app } if app == "web"));
    assert!(run.placements.is_empty());
}

#[tokio::test]
async fn fetch_without_intents_is_not_found() {
    let fixture = Fixture::start().await;
    fixture.mount_placement(&[]).await;

    let relocator = fixture.relocator(source());
    let err = relocator.fetch(&mut fixture.run()).await.unwrap_err();

    assert!(matches!(err, RelocationError::NotFound { .. }));
}

#[tokio::test]
async fn fetch_malformed_body_is_decode_error() {
    let fixture = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path(gpi_path()))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
        .mount(&fixture.orchestrator)
        .await;

    let relocator = fixture.relocator(source());
    let err = relocator.fetch(&mut fixture.run()).await.unwrap_err();

    assert!(matches!(err, RelocationError::Decode { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn fetch_server_error_is_retryable_status() {
    let fixture = Fixture::start().await;
    Mock::given(method("GET"))
        .and(path(gpi_path()))
        .respond_with(ResponseTemplate::new(503))
        .mount(&fixture.orchestrator)
        .await;

    let relocator = fixture.relocator(source());
    let err = relocator.fetch(&mut fixture.run()).await.unwrap_err();

    let RelocationError::HttpStatus { url, status, .. } = &err else {
        panic!("expected status error, got {err:?}");
    };
    assert_eq!(status.as_u16(), 503);
    assert!(url.ends_with(&gpi_path()));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn fetch_unreachable_orchestrator_is_transport_error() {
    let fixture = Fixture::start().await;
    let config =
        RelocationConfig::from_params(&params("http://127.0.0.1:1", &fixture.clm.uri())).unwrap();
    let relocator = Relocator::new(
        DeploymentUnitClient::new(&config).unwrap(),
        Arc::new(StaticResolver::new()),
        harness::fast_gate(source()),
    );

    let mut run = RelocationRun::new(config);
    let err = relocator.fetch(&mut run).await.unwrap_err();

    assert!(matches!(err, RelocationError::Transport { method: "GET", .. }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn commit_writes_planned_policy_then_rolls_out() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[(
            "gpi-a",
            vec![app_intent("web-a", "web", vec![ClusterSelector::by_name("p1", "c1")])],
        )])
        .await;
    Mock::given(method("PUT"))
        .and(path(app_intent_path("gpi-a", "web-a")))
        .and(body_json(json!({
            "metadata": {"name": "web-a"},
            "spec": {
                "app": "web",
                "intent": {
                    "allOf": [
                        {"clusterProvider": "p1", "cluster": "c2"},
                        {"clusterProvider": "p1", "cluster": "c1"}
                    ],
                    "anyOf": [{"clusterProvider": "p1", "cluster": "c2"}]
                }
            }
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&fixture.orchestrator)
        .await;
    fixture.mount_update(202, 1).await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();
    relocator.merge(&mut run).await.unwrap();
    relocator.commit(&run).await.unwrap();

    assert_eq!(run.placements["gpi-a"][0].phase, Phase::Delete);
}

#[tokio::test]
async fn commit_is_repeatable() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[("gpi-a", vec![app_intent("web-a", "web", vec![])])])
        .await;
    Mock::given(method("PUT"))
        .and(path(app_intent_path("gpi-a", "web-a")))
        .respond_with(ResponseTemplate::new(200))
        .expect(2)
        .mount(&fixture.orchestrator)
        .await;
    fixture.mount_update(202, 2).await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();
    relocator.merge(&mut run).await.unwrap();
    relocator.commit(&run).await.unwrap();
    relocator.commit(&run).await.unwrap();
}

#[tokio::test]
async fn rejected_write_stops_before_rollout() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[(
            "gpi-a",
            vec![
                app_intent("web-a", "web", vec![]),
                app_intent("web-b", "web", vec![]),
            ],
        )])
        .await;
    Mock::given(method("PUT"))
        .and(path(app_intent_path("gpi-a", "web-a")))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&fixture.orchestrator)
        .await;
    Mock::given(method("PUT"))
        .and(path(app_intent_path("gpi-a", "web-b")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fixture.orchestrator)
        .await;
    fixture.mount_update(202, 0).await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();
    relocator.merge(&mut run).await.unwrap();
    let err = relocator.commit(&run).await.unwrap_err();

    let RelocationError::Commit { url, status } = &err else {
        panic!("expected commit error, got {err:?}");
    };
    assert_eq!(status.as_u16(), 500);
    assert!(url.ends_with(&app_intent_path("gpi-a", "web-a")));
}

#[tokio::test]
async fn rollout_must_be_accepted() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[("gpi-a", vec![app_intent("web-a", "web", vec![])])])
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&fixture.orchestrator)
        .await;
    fixture.mount_update(200, 1).await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();
    relocator.merge(&mut run).await.unwrap();
    let err = relocator.commit(&run).await.unwrap_err();

    let RelocationError::RolloutTrigger { url, status } = &err else {
        panic!("expected rollout error, got {err:?}");
    };
    assert_eq!(status.as_u16(), 200);
    assert!(url.ends_with(&format!("{DIG_PATH}/update")));
}

#[tokio::test]
async fn commit_before_merge_writes_nothing() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[("gpi-a", vec![app_intent("web-a", "web", vec![])])])
        .await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&fixture.orchestrator)
        .await;
    fixture.mount_update(202, 0).await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();
    let err = relocator.commit(&run).await.unwrap_err();

    assert!(matches!(err, RelocationError::NotPlanned { ref app_intent } if app_intent == "web-a"));
}

#[tokio::test]
async fn label_covering_target_is_dropped_on_apply() {
    let fixture = Fixture::start().await;
    fixture
        .mount_placement(&[(
            "gpi-a",
            vec![app_intent(
                "web-a",
                "web",
                vec![
                    ClusterSelector::by_label("p1", "edge"),
                    ClusterSelector::by_label("p1", "core"),
                ],
            )],
        )])
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/cluster-providers/p1/clusters"))
        .and(query_param("label", "edge"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["c2", "c3"])))
        .mount(&fixture.clm)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/cluster-providers/p1/clusters"))
        .and(query_param("label", "core"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(["c1"])))
        .mount(&fixture.clm)
        .await;

    let relocator = fixture.relocator(source());
    let mut run = fixture.run();
    relocator.fetch(&mut run).await.unwrap();
    relocator.merge(&mut run).await.unwrap();

    let planned = run.placements["gpi-a"][0].planned_policy.clone().unwrap();
    assert_eq!(
        planned.all_of,
        vec![
            ClusterSelector::by_name("p1", "c2"),
            ClusterSelector::by_label("p1", "core"),
        ]
    );
}

#[tokio::test]
async fn merge_before_fetch_is_not_found() {
    let fixture = Fixture::start().await;
    let relocator = fixture.relocator(source());
    let mut run = fixture.run();

    let err = relocator.merge(&mut run).await.unwrap_err();

    assert!(matches!(err, RelocationError::NotFound { .. }));
    assert!(run.placements.is_empty());
}
