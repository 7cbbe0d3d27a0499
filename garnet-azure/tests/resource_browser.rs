//! Resource browser calls against a mock Resource Manager.

mod common;

use common::*;
use garnet_azure::arm::ResourceBrowser;
use garnet_azure::auth::TokenStore;
use garnet_azure::error::ArmError;
use serde_json::json;
use wiremock::Mock;
use wiremock::MockServer;
use wiremock::ResponseTemplate;
use wiremock::matchers::header;
use wiremock::matchers::method;
use wiremock::matchers::path;
use wiremock::matchers::query_param as query;

fn browser(server: &MockServer, store: TokenStore) -> ResourceBrowser {
    ResourceBrowser::builder()
        .token_store(store)
        .management_url(server.uri())
        .build()
        .unwrap()
}

async fn signed_in_browser(server: &MockServer) -> ResourceBrowser {
    let browser = browser(server, TokenStore::new());
    browser.set_management_token("mgmt-token").await;
    browser
}

#[tokio::test]
async fn every_call_needs_a_management_token() {
    let server = MockServer::start().await;
    let browser = browser(&server, TokenStore::new());

    assert!(!browser.has_management_token().await);
    assert!(matches!(
        browser.list_subscriptions().await,
        Err(ArmError::Unauthenticated)
    ));
    assert!(matches!(
        browser.list_resource_groups("sub-1").await,
        Err(ArmError::Unauthenticated)
    ));
    assert!(matches!(
        browser.list_garnet_clusters("sub-1", "rg-1").await,
        Err(ArmError::Unauthenticated)
    ));
    assert!(matches!(
        browser.get_garnet_cluster("sub-1", "rg-1", "cache").await,
        Err(ArmError::Unauthenticated)
    ));

    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn lists_subscriptions_with_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(query("api-version", "2020-01-01"))
        .and(header("authorization", "Bearer mgmt-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [
                {
                    "id": "/subscriptions/sub-1",
                    "subscriptionId": "sub-1",
                    "displayName": "Dev",
                    "state": "Enabled",
                    "tenantId": TENANT_ID,
                    "subscriptionPolicies": { "quotaId": "ignored" },
                },
                { "subscriptionId": "sub-2", "displayName": "" },
            ],
            "nextLink": "https://management.azure.com/subscriptions?page=2",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let browser = signed_in_browser(&server).await;
    let page = browser.list_subscriptions().await.unwrap();

    assert_eq!(page.value.len(), 2);
    assert_eq!(page.value[0].label(), "Dev");
    assert_eq!(page.value[1].label(), "sub-2");
    assert!(page.has_more());
}

#[tokio::test]
async fn lists_resource_groups_and_clusters() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions/sub-1/resourcegroups"))
        .and(query("api-version", "2021-04-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{ "id": "/subscriptions/sub-1/resourceGroups/rg-1", "name": "rg-1", "location": "westus" }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subscriptions/sub-1/resourceGroups/rg-1/resources"))
        .and(query("api-version", "2025-04-01"))
        .and(query(
            "$filter",
            "resourceType eq 'Microsoft.DocumentDB/garnetClusters'",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "value": [{
                "id": "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.DocumentDB/garnetClusters/cache",
                "name": "cache",
                "type": "Microsoft.DocumentDB/garnetClusters",
            }],
        })))
        .mount(&server)
        .await;

    let browser = signed_in_browser(&server).await;

    let groups = browser.list_resource_groups("sub-1").await.unwrap();
    assert_eq!(groups.value[0].name, "rg-1");
    assert_eq!(groups.value[0].location.as_deref(), Some("westus"));

    let clusters = browser.list_garnet_clusters("sub-1", "rg-1").await.unwrap();
    assert_eq!(clusters.value.len(), 1);
    assert_eq!(clusters.value[0].name, "cache");
    assert!(!clusters.has_more());
}

#[tokio::test]
async fn fetches_cluster_nodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/subscriptions/sub-1/resourceGroups/rg-1/providers/Microsoft.DocumentDB/garnetClusters/cache",
        ))
        .and(query("api-version", "2025-11-01-preview"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "name": "cache",
            "properties": {
                "provisioningState": "Succeeded",
                "nodes": [
                    { "ipAddress": "10.0.0.4", "port": 6379, "zone": "1" },
                    { "ipAddress": "10.0.0.5", "port": 6379 },
                ],
            },
        })))
        .mount(&server)
        .await;

    let browser = signed_in_browser(&server).await;
    let cluster = browser
        .get_garnet_cluster("sub-1", "rg-1", "cache")
        .await
        .unwrap();

    let node = cluster.primary_node().unwrap();
    assert_eq!(node.ip_address.as_deref(), Some("10.0.0.4"));
    assert_eq!(node.port, Some(6379));
}

#[tokio::test]
async fn forbidden_keeps_status_and_arm_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {
                "code": "AuthorizationFailed",
                "message": "The client does not have authorization to perform action.",
            },
        })))
        .mount(&server)
        .await;

    let browser = signed_in_browser(&server).await;
    let err = browser.list_subscriptions().await.unwrap_err();

    assert!(matches!(err, ArmError::Http { status: 403, .. }));
    assert_eq!(err.error_code(), Some("AuthorizationFailed"));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn throttling_and_outages_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(429).set_body_string("Too many requests"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/subscriptions/sub-1/resourcegroups"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let browser = signed_in_browser(&server).await;

    let throttled = browser.list_subscriptions().await.unwrap_err();
    assert_eq!(throttled.status_code(), Some(429));
    assert!(throttled.is_retryable());

    let unavailable = browser.list_resource_groups("sub-1").await.unwrap_err();
    assert_eq!(unavailable.status_code(), Some(503));
    assert!(unavailable.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_a_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let browser = signed_in_browser(&server).await;
    let err = browser.list_subscriptions().await.unwrap_err();

    assert!(matches!(err, ArmError::Parse { body: Some(ref b), .. } if b.contains("oops")));
}

#[tokio::test]
async fn user_profile_reads_management_token() {
    let server = MockServer::start().await;
    let browser = browser(&server, TokenStore::new());

    let anonymous = browser.user_profile().await;
    assert_eq!(anonymous.name, "Azure User");
    assert_eq!(anonymous.oid, None);

    browser
        .set_management_token(fake_jwt(json!({ "email": "ada@example.com", "oid": USER_OID })))
        .await;
    let profile = browser.user_profile().await;
    assert_eq!(profile.name, "ada@example.com");
    assert_eq!(profile.oid.as_deref(), Some(USER_OID));

    browser.set_management_token("not-a-jwt").await;
    let placeholder = browser.user_profile().await;
    assert_eq!(placeholder.name, "default");
    assert_eq!(placeholder.oid.as_deref(), Some("default"));
}

#[tokio::test]
async fn token_set_directly_is_used_without_an_account() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/subscriptions"))
        .and(header("authorization", "Bearer direct-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let store = TokenStore::new();
    let browser = ResourceBrowser::builder()
        .token_store(store.clone())
        .token_provider(auth_service(&server, store))
        .management_url(server.uri())
        .build()
        .unwrap();
    browser.set_management_token("direct-token").await;

    let page = browser.list_subscriptions().await.unwrap();
    assert!(page.value.is_empty());
}
