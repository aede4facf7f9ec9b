//! Integration tests for the REST remote client using wiremock
//!
//! These tests verify the HTTP client behavior against mocked endpoints,
//! and that a module on top of it caches absences, keeps its cache on
//! failed reloads and deletes by full resource id.

use cloudmirror::{
    ErrorLog, GenericKind, HttpRemoteClient, Module, NullSink, RemoteClient, RemoteError,
    ResourceKind, RootScope, Scope, SyncContext,
};
use cloudmirror::config::CacheOptions;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};
use wiremock::matchers::{bearer_token, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> HttpRemoteClient<Value> {
    HttpRemoteClient::new(&server.uri(), "apps").expect("valid endpoint")
}

/// Test module for raw client behavior
mod http_client_tests {
    use super::*;

    /// Test list sends the bearer token and reads the `value` array
    #[tokio::test]
    async fn test_list_success_returns_items() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .and(bearer_token("test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [
                    {"name": "web", "status": "Running"},
                    {"name": "api", "status": "Stopped"}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server)
            .with_token("test-token")
            .list()
            .await
            .expect("list should succeed");

        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["name"], "web");
    }

    /// Test list follows nextLink until it disappears
    #[tokio::test]
    async fn test_list_follows_pagination() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "a"}],
                "nextLink": format!("{}/apps-page-2", server.uri())
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/apps-page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "b"}, {"name": "c"}],
                "nextLink": ""
            })))
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server).list().await.expect("list should succeed");
        let names: Vec<&str> = items.iter().filter_map(|i| i["name"].as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    /// Test a backend that names its continuation field differently
    #[tokio::test]
    async fn test_list_with_custom_next_link_field() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "value": [{"name": "a"}],
                "@odata.nextLink": format!("{}/apps-next", server.uri())
            })))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/apps-next"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "b"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let items = client(&server)
            .with_next_link_field("@odata.nextLink")
            .list()
            .await
            .expect("list should succeed");
        assert_eq!(items.len(), 2);
    }

    /// Test custom item paths
    #[tokio::test]
    async fn test_list_with_nested_items_path() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"items": [{"name": "only"}]}})),
            )
            .mount(&server)
            .await;

        let items = client(&server)
            .with_items_path("data.items")
            .list()
            .await
            .expect("list should succeed");
        assert_eq!(items.len(), 1);
    }

    /// Test 404 maps to a status error the kind recognizes as not found
    #[tokio::test]
    async fn test_404_is_a_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let err = client(&server).get_by_name("missing").await.unwrap_err();
        assert_eq!(err.status_code(), Some(404));
        assert!(GenericKind::default().is_not_found(&err));
    }

    /// Test long error bodies are truncated
    #[tokio::test]
    async fn test_error_body_is_truncated() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(ResponseTemplate::new(500).set_body_string("E".repeat(5000)))
            .mount(&server)
            .await;

        let err = client(&server).list().await.unwrap_err();
        let RemoteError::Status { code, message } = err else {
            panic!("expected a status error, got {err:?}");
        };
        assert_eq!(code, 500);
        assert!(message.contains("truncated"));
        assert!(message.len() < 300);
    }

    /// Test empty 200 bodies read as "absent"
    #[tokio::test]
    async fn test_empty_body_is_absent() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps/ghost"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        assert_eq!(client(&server).get_by_name("ghost").await, Ok(None));
    }

    /// Test invalid JSON surfaces as a decode error
    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{not json"))
            .mount(&server)
            .await;

        assert!(matches!(
            client(&server).list().await,
            Err(RemoteError::Decode(_))
        ));
    }
}

/// Test module for a module driving the HTTP client
mod module_over_http_tests {
    use super::*;

    fn module(
        server: &MockServer,
        root: &Arc<RootScope>,
        errors: Arc<ErrorLog>,
    ) -> Arc<Module<Value>> {
        let parent: Weak<dyn Scope> = Arc::downgrade(root) as Weak<dyn Scope>;
        let kind: Arc<dyn ResourceKind<Value>> = Arc::new(GenericKind::new("App"));
        let client: Arc<dyn RemoteClient<Value>> = Arc::new(client(server));
        let context = SyncContext::new(Arc::new(NullSink), errors, CacheOptions::default());
        Module::new("apps", parent, kind, client, context)
    }

    /// Test a missing resource is fetched once by id, then served as absent
    #[tokio::test]
    async fn test_absence_is_cached() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subs/s1/apps/ghost"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let root = Arc::new(RootScope::new("/subs/s1"));
        let apps = module(&server, &root, Arc::new(ErrorLog::new()));

        assert!(apps.get("ghost", None).await.unwrap().is_none());
        assert!(apps.get("GHOST", None).await.unwrap().is_none());
        assert!(!apps.exists("ghost", None).await.unwrap());
    }

    /// Test a failed reload keeps the previous cache and reports the error
    #[tokio::test]
    async fn test_failed_reload_keeps_cache() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "web"}]})),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
            .mount(&server)
            .await;

        let root = Arc::new(RootScope::new("/subs/s1"));
        let errors = Arc::new(ErrorLog::new());
        let apps = module(&server, &root, errors.clone());

        assert_eq!(apps.list().await.len(), 1);
        apps.refresh();

        let after = apps.list().await;
        assert_eq!(after.len(), 1);
        assert_eq!(after[0].name(), "web");
        assert!(apps.is_stale());
        assert_eq!(errors.len(), 1);
        assert!(errors.messages()[0].contains("temporarily unavailable"));
    }

    /// Test lookups by id resolve beside the listing when the module sits
    /// under the collection's own scope
    #[tokio::test]
    async fn test_collection_scope_shares_url_space() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/s1/sites"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "web"}]})),
            )
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/subscriptions/s1/sites/api"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "api"})))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/subscriptions/s1/sites/web"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let http: HttpRemoteClient<Value> =
            HttpRemoteClient::new(&server.uri(), "subscriptions/s1/sites").expect("valid endpoint");
        let root = Arc::new(RootScope::new(http.scope_id()));
        let parent: Weak<dyn Scope> = Arc::downgrade(&root) as Weak<dyn Scope>;
        let kind: Arc<dyn ResourceKind<Value>> = Arc::new(GenericKind::new("Site"));
        let name = http.collection_name().to_string();
        let client: Arc<dyn RemoteClient<Value>> = Arc::new(http);
        let sites = Module::new(name, parent, kind, client, SyncContext::default());

        assert_eq!(sites.list().await.len(), 1);
        let api = sites.get("api", None).await.unwrap().expect("api is served by id");
        assert_eq!(api.id(), "/subscriptions/s1/sites/api");
        assert!(api.exists());

        sites.delete("web", None).await.expect("delete should succeed");
        assert_eq!(sites.list_cached().len(), 1);
    }

    /// Test delete goes to the full resource id
    #[tokio::test]
    async fn test_delete_by_id() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/apps"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"value": [{"name": "web"}]})),
            )
            .mount(&server)
            .await;

        Mock::given(method("DELETE"))
            .and(path("/subs/s1/apps/web"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let root = Arc::new(RootScope::new("/subs/s1"));
        let apps = module(&server, &root, Arc::new(ErrorLog::new()));

        let web = apps.list().await.remove(0);
        apps.delete("web", None).await.expect("delete should succeed");

        assert!(!web.exists());
        assert!(apps.list_cached().is_empty());
    }
}
