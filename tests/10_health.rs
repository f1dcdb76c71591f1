mod common;

use anyhow::Result;
use reqwest::StatusCode;

#[tokio::test]
async fn health_endpoint_responds() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/health")).await?;

    let status = res.status();
    if common::test_database_url().is_some() {
        assert_eq!(status, StatusCode::OK);
    } else {
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    // Should be valid JSON either way
    let _body = res.json::<serde_json::Value>().await?;
    Ok(())
}

#[tokio::test]
async fn root_describes_the_service() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/")).await?;
    assert_eq!(res.status(), StatusCode::OK);

    let body = res.json::<serde_json::Value>().await?;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["name"], "Birthday Admin API");
    assert!(body["data"]["endpoints"]["dashboard"].is_string());
    Ok(())
}

#[tokio::test]
async fn unknown_route_uses_error_envelope() -> Result<()> {
    let server = common::ensure_server().await?;
    let res = reqwest::get(server.url("/api/does-not-exist")).await?;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(common::error_code(res).await?, "NOT_FOUND");
    Ok(())
}
