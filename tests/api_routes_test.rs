use httpmock::prelude::*;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use sticker_cutout::config::Credential;
use sticker_cutout::{router, AppState, ProviderKind, ServiceConfig};

const PNG_INPUT: &str = "data:image/png;base64,iVBORw0KGgo=";

/// 在本機隨機埠啟動服務，回傳 base url
async fn spawn_app(config: ServiceConfig) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let app = router(AppState::from_config(&config));

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", address)
}

fn generative_config(server: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.generative.api_key = Some(Credential::new("sk-or-test"));
    config.generative.endpoint = server.url("/api/v1/chat/completions");
    config
}

fn segmentation_config(server: &MockServer) -> ServiceConfig {
    let mut config = ServiceConfig::default();
    config.segmentation.api_key = Some(Credential::new("rbg-test"));
    config.segmentation.endpoint = server.url("/v1.0/removebg");
    config
}

async fn post_json(url: &str, body: Value) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status().as_u16();
    let body = response.json::<Value>().await.unwrap();
    (status, body)
}

#[tokio::test]
async fn test_health() {
    let base_url = spawn_app(ServiceConfig::default()).await;
    let body: Value = reqwest::get(format!("{}/health", base_url))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_unconfigured_returns_original_without_network() {
    let server = MockServer::start();
    let upstream = server.mock(|when, then| {
        when.any_request();
        then.status(200);
    });

    // 端點指向 mock，但沒有金鑰
    let mut config = ServiceConfig::default();
    config.generative.endpoint = server.url("/api/v1/chat/completions");
    config.segmentation.endpoint = server.url("/v1.0/removebg");
    let base_url = spawn_app(config).await;

    let input = "data:image/png;base64,iVBORw0KGgo...";
    for route in ["/api/removebg-gemini", "/api/removebg", "/api/cutout"] {
        let (status, body) =
            post_json(&format!("{}{}", base_url, route), json!({ "imageBase64": input })).await;

        assert_eq!(status, 200, "{}", route);
        assert_eq!(body["success"], true);
        assert_eq!(body["isSimulated"], true);
        assert_eq!(body["imageUrl"], input);
    }

    upstream.assert_hits(0);
}

#[tokio::test]
async fn test_missing_image_is_bad_request() {
    let base_url = spawn_app(ServiceConfig::default()).await;

    let (status, body) = post_json(
        &format!("{}/api/removebg-gemini", base_url),
        json!({ "subjectHint": "apple" }),
    )
    .await;
    assert_eq!(status, 400);
    assert!(body["error"].is_string());

    let response = reqwest::Client::new()
        .post(format!("{}/api/removebg", base_url))
        .header("Content-Type", "application/json")
        .body("{ not json")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn test_generative_structured_image_url() {
    let server = MockServer::start();
    let upstream = server.mock(|when, then| {
        when.method(POST)
            .path("/api/v1/chat/completions")
            .header("Authorization", "Bearer sk-or-test")
            .body_contains("keep only the apple (蘋果)");
        then.status(200).json_body(json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": "",
                    "images": [{
                        "type": "image_url",
                        "image_url": { "url": "https://cdn.example.com/sticker.png" }
                    }]
                }
            }]
        }));
    });

    let base_url = spawn_app(generative_config(&server)).await;
    let (status, body) = post_json(
        &format!("{}/api/removebg-gemini", base_url),
        json!({
            "imageBase64": PNG_INPUT,
            "subjectHint": "apple",
            "subjectHintLocalized": "蘋果"
        }),
    )
    .await;

    upstream.assert();
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["isSimulated"], false);
    assert_eq!(body["imageUrl"], "https://cdn.example.com/sticker.png");
    assert!(body.get("error").is_none());
}

#[tokio::test]
async fn test_generative_text_embedded_image() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat/completions");
        then.status(200).json_body(json!({
            "choices": [{
                "message": { "content": "Here you go: data:image/png;base64,QUJDRA== done" }
            }]
        }));
    });

    let base_url = spawn_app(generative_config(&server)).await;
    let (_, body) = post_json(
        &format!("{}/api/removebg-gemini", base_url),
        json!({ "imageBase64": PNG_INPUT }),
    )
    .await;

    assert_eq!(body["isSimulated"], false);
    assert_eq!(body["imageUrl"], "data:image/png;base64,QUJDRA==");
}

#[tokio::test]
async fn test_generative_upstream_failure_degrades() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat/completions");
        then.status(402).json_body(json!({ "error": { "message": "Insufficient credits" } }));
    });

    let base_url = spawn_app(generative_config(&server)).await;
    let (status, body) = post_json(
        &format!("{}/api/removebg-gemini", base_url),
        json!({ "imageBase64": PNG_INPUT }),
    )
    .await;

    // 生成式服務的任何失敗都不對外報錯
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["isSimulated"], true);
    assert_eq!(body["imageUrl"], PNG_INPUT);
    assert_eq!(body["error"], "openrouter API call failed: 402");
}

#[tokio::test]
async fn test_generative_timeout_degrades_within_budget() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/api/v1/chat/completions");
        then.status(200)
            .delay(Duration::from_secs(10))
            .json_body(json!({}));
    });

    let mut config = generative_config(&server);
    config.pipeline.timeout_seconds = 1;
    let base_url = spawn_app(config).await;

    let started = Instant::now();
    let (status, body) = post_json(
        &format!("{}/api/removebg-gemini", base_url),
        json!({ "imageBase64": PNG_INPUT }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["isSimulated"], true);
    assert_eq!(body["imageUrl"], PNG_INPUT);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_segmentation_success_with_credits() {
    let server = MockServer::start();
    let upstream = server.mock(|when, then| {
        when.method(POST)
            .path("/v1.0/removebg")
            .header("X-Api-Key", "rbg-test");
        then.status(200)
            .header("Content-Type", "image/png")
            .header("X-Ratelimit-Remaining", "7")
            .body(b"ABCD".to_vec());
    });

    let base_url = spawn_app(segmentation_config(&server)).await;
    let (status, body) = post_json(
        &format!("{}/api/removebg", base_url),
        json!({ "imageBase64": PNG_INPUT }),
    )
    .await;

    upstream.assert();
    assert_eq!(status, 200);
    assert_eq!(body["isSimulated"], false);
    assert_eq!(body["imageUrl"], "data:image/png;base64,QUJDRA==");
    assert_eq!(body["remainingCredits"], 7);
}

#[tokio::test]
async fn test_segmentation_quota_and_rate_limit() {
    let cases = [(402u16, "QUOTA_EXCEEDED"), (429, "RATE_LIMITED")];

    for (upstream_status, code) in cases {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/v1.0/removebg");
            then.status(upstream_status)
                .json_body(json!({ "errors": [{ "title": "limit" }] }));
        });

        let base_url = spawn_app(segmentation_config(&server)).await;
        let (status, body) = post_json(
            &format!("{}/api/removebg", base_url),
            json!({ "imageBase64": PNG_INPUT }),
        )
        .await;

        assert_eq!(status, upstream_status);
        assert_eq!(body["code"], code);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_segmentation_other_failure_degrades() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/v1.0/removebg");
        then.status(500).body("boom");
    });

    let base_url = spawn_app(segmentation_config(&server)).await;
    let (status, body) = post_json(
        &format!("{}/api/removebg", base_url),
        json!({ "imageBase64": PNG_INPUT }),
    )
    .await;

    assert_eq!(status, 200);
    assert_eq!(body["isSimulated"], true);
    assert_eq!(body["imageUrl"], PNG_INPUT);
}

#[tokio::test]
async fn test_cutout_route_follows_default_provider() {
    let server = MockServer::start();
    let segmentation = server.mock(|when, then| {
        when.method(POST).path("/v1.0/removebg");
        then.status(200)
            .header("Content-Type", "image/png")
            .body(b"ABCD".to_vec());
    });

    let mut config = segmentation_config(&server);
    config.pipeline.default_provider = ProviderKind::Segmentation;
    let base_url = spawn_app(config).await;

    let (status, body) = post_json(
        &format!("{}/api/cutout", base_url),
        json!({ "imageBase64": PNG_INPUT }),
    )
    .await;

    segmentation.assert();
    assert_eq!(status, 200);
    assert_eq!(body["isSimulated"], false);
}
