use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use vendor_access::config::{ApiConfig, AuthConfig, CacheConfig, NetworkConfig, Settings, StorageConfig};
use vendor_access::models::{RequestBody, VendorStatus};
use vendor_access::storage::{seed, Collection};
use vendor_access::{
    BulkOperation, ConnectivityMonitor, DataOrigin, Error, FileStore, FormPayload, KeyValueStore, ListParams,
    MemoryStore, OutboundRequest, RawResponse, Record, RecordId, Result, Transport, VendorDataService,
};

const BASE_URL: &str = "http://api.test/api";

#[derive(Clone)]
enum Reply {
    Json(u16, Value),
    Empty(u16),
    Unreachable,
}

/// Answers requests from per-route queues; unmatched routes get the
/// default reply.
struct ScriptedTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Reply>>>,
    default: Mutex<Reply>,
    log: Mutex<Vec<OutboundRequest>>,
}

impl ScriptedTransport {
    fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            routes: Mutex::new(HashMap::new()),
            default: Mutex::new(Reply::Unreachable),
            log: Mutex::new(Vec::new()),
        })
    }

    fn on(&self, method: Method, path: &str, reply: Reply) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(reply);
    }

    fn requests_to(&self, method: &Method, path: &str) -> usize {
        let url = format!("{}{}", BASE_URL, path);
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: OutboundRequest) -> Result<RawResponse> {
        let path = request.url.trim_start_matches(BASE_URL).to_string();
        let reply = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&(request.method.clone(), path))
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| self.default.lock().unwrap().clone());
        self.log.lock().unwrap().push(request);

        match reply {
            Reply::Json(status, body) => Ok(RawResponse {
                status: StatusCode::from_u16(status).unwrap(),
                body: serde_json::to_vec(&body).unwrap(),
            }),
            Reply::Empty(status) => Ok(RawResponse {
                status: StatusCode::from_u16(status).unwrap(),
                body: Vec::new(),
            }),
            Reply::Unreachable => Err(Error::Network {
                status: None,
                message: "connection refused".to_string(),
                body: None,
            }),
        }
    }
}

fn settings(dir: &Path) -> Settings {
    Settings {
        api: ApiConfig {
            base_url: BASE_URL.to_string(),
            timeout_secs: 5,
            emulation: "chrome133".to_string(),
            headers: HashMap::new(),
        },
        storage: StorageConfig { dir: dir.to_path_buf() },
        cache: CacheConfig { max_entries: 64 },
        auth: AuthConfig {
            dev_token: "dev-token".to_string(),
            dev_role: "organizer".to_string(),
            dev_user_id: "1".to_string(),
        },
        network: NetworkConfig { assume_online: true },
    }
}

async fn service_with(transport: Arc<ScriptedTransport>) -> VendorDataService {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    VendorDataService::with_parts(
        &settings(Path::new("unused")),
        transport,
        store,
        ConnectivityMonitor::new(true),
    )
    .await
    .unwrap()
}

fn record(value: Value) -> Record {
    Record::from_value(value).unwrap()
}

fn acme() -> Record {
    record(json!({
        "name": "Acme",
        "email": "a@x.com",
        "phone": "+1-555-0199",
        "business_type": "catering",
        "services_provided": ["catering"]
    }))
}

#[tokio::test]
async fn offline_create_then_list_returns_only_the_new_vendor() {
    let transport = ScriptedTransport::unreachable();
    let service = service_with(transport).await;

    let created = service.create_vendor(acme().into()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::LocalWrite));
    assert_eq!(created.status(), Some(VendorStatus::PendingApproval.as_str()));
    assert!(created.id().unwrap().is_local());
    assert!(created.get("created_at").is_some());
    assert_eq!(created.get("created_at"), created.get("updated_at"));

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0].get_str("name"), Some("Acme"));
    assert_eq!(vendors[0].get_str("email"), Some("a@x.com"));
    assert_eq!(service.last_origin(), Some(DataOrigin::Mirror));
}

#[tokio::test]
async fn confirmed_create_is_listed_after_going_offline() {
    let transport = ScriptedTransport::unreachable();
    transport.on(
        Method::POST,
        "/vendors",
        Reply::Json(
            201,
            json!({"success": true, "data": {
                "id": 41,
                "name": "Acme",
                "email": "a@x.com",
                "status": "pending_approval",
                "services_provided": "[\"catering\"]"
            }}),
        ),
    );
    let service = service_with(transport).await;

    let created = service.create_vendor(acme().into()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::Network));
    assert_eq!(created.id(), Some(RecordId::Number(41)));
    assert_eq!(created.get("services_provided"), Some(&json!(["catering"])));
    assert_eq!(created.get("total_events"), Some(&json!(0)));

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0].id(), Some(RecordId::Number(41)));
}

#[tokio::test]
async fn failed_list_with_empty_mirror_returns_seed() {
    let service = service_with(ScriptedTransport::unreachable()).await;

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(vendors, seed::vendors());
    assert_eq!(service.last_origin(), Some(DataOrigin::Seed));

    let pending = service
        .list_vendors(&ListParams::new().status("pending_approval"))
        .await
        .unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].get_str("name"), Some("Harbor AV Rentals"));
}

#[tokio::test]
async fn update_of_unknown_id_while_offline_is_not_found() {
    let service = service_with(ScriptedTransport::unreachable()).await;

    let err = service
        .update_vendor(&RecordId::Number(999), record(json!({"name": "Ghost"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { collection: "vendors", .. }));
}

#[tokio::test]
async fn offline_update_merges_and_restamps() {
    let service = service_with(ScriptedTransport::unreachable()).await;
    let created = service.create_vendor(acme().into()).await.unwrap();
    let id = created.id().unwrap();

    let updated = service
        .update_vendor(&id, record(json!({"phone": "+1-555-0000", "services_provided": "sound, lighting"})))
        .await
        .unwrap();

    assert_eq!(updated.get_str("phone"), Some("+1-555-0000"));
    assert_eq!(updated.get_str("name"), Some("Acme"));
    assert_eq!(updated.get("services_provided"), Some(&json!(["sound", "lighting"])));
    assert_eq!(updated.id(), Some(id));
    assert!(updated.get_str("updated_at") >= created.get_str("updated_at"));
}

#[tokio::test]
async fn server_not_found_on_update_is_surfaced() {
    let transport = ScriptedTransport::unreachable();
    transport.on(
        Method::PUT,
        "/vendors/5",
        Reply::Json(404, json!({"message": "Vendor not found"})),
    );
    let service = service_with(transport).await;

    let err = service
        .update_vendor(&RecordId::Number(5), record(json!({"name": "x"})))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 404, .. }));
}

#[tokio::test]
async fn delete_removes_vendor_even_when_remote_delete_fails() {
    let service = service_with(ScriptedTransport::unreachable()).await;
    let kept = service.create_vendor(acme().into()).await.unwrap();
    let doomed = service
        .create_vendor(record(json!({"name": "Doomed Co", "email": "d@x.com"})).into())
        .await
        .unwrap();

    service.delete_vendor(&doomed.id().unwrap()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::LocalWrite));

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0].id(), kept.id());

    let err = service.delete_vendor(&doomed.id().unwrap()).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
}

#[tokio::test]
async fn delete_of_local_record_acknowledged_by_server_404() {
    let service_transport = ScriptedTransport::unreachable();
    let service = service_with(service_transport.clone()).await;
    let local = service.create_vendor(acme().into()).await.unwrap();
    let id = local.id().unwrap();

    service_transport.on(
        Method::DELETE,
        &format!("/vendors/{}", id),
        Reply::Json(404, json!({"message": "No query results"})),
    );
    service.delete_vendor(&id).await.unwrap();
    assert!(service.mirror().load(Collection::Vendors).await.is_empty());
}

#[tokio::test]
async fn validation_error_on_create_is_surfaced_and_nothing_is_stored() {
    let transport = ScriptedTransport::unreachable();
    transport.on(
        Method::POST,
        "/vendors",
        Reply::Json(
            422,
            json!({"message": "The given data was invalid.", "errors": {"email": ["invalid"]}}),
        ),
    );
    let service = service_with(transport).await;

    let err = service
        .create_vendor(record(json!({"name": "Acme", "email": "nope"})).into())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation { .. }));
    assert_eq!(err.validation_errors().unwrap()["email"], vec!["invalid".to_string()]);
    assert!(service.mirror().load(Collection::Vendors).await.is_empty());
}

#[tokio::test]
async fn offline_statistics_are_the_seed_constant() {
    let service = service_with(ScriptedTransport::unreachable()).await;
    service.create_vendor(acme().into()).await.unwrap();
    service.create_vendor(acme().into()).await.unwrap();

    let statistics = service.statistics().await.unwrap();
    assert_eq!(statistics.into_value(), seed::statistics());
    assert_eq!(service.last_origin(), Some(DataOrigin::Seed));
}

#[tokio::test]
async fn online_list_is_normalized_and_not_merged_with_mirror() {
    let transport = ScriptedTransport::unreachable();
    let service = service_with(transport.clone()).await;
    service.create_vendor(acme().into()).await.unwrap();

    transport.on(
        Method::GET,
        "/vendors",
        Reply::Json(
            200,
            json!({"success": true, "data": {"data": [
                {"id": 7, "name": "Server Vendor", "services_provided": "[\"staging\"]", "status": "active"}
            ], "current_page": 1}}),
        ),
    );

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::Network));
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0].get("services_provided"), Some(&json!(["staging"])));

    // The offline-created record is still in the mirror.
    assert_eq!(service.mirror().load(Collection::Vendors).await.len(), 1);
}

#[tokio::test]
async fn cached_list_serves_until_a_write_clears_it() {
    let transport = ScriptedTransport::unreachable();
    transport.on(
        Method::GET,
        "/vendors",
        Reply::Json(200, json!([{"id": 7, "name": "Server Vendor", "services_provided": []}])),
    );
    let service = service_with(transport).await;

    service.list_vendors(&ListParams::new()).await.unwrap();
    let cached = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::Cache));
    assert_eq!(cached[0].get_str("name"), Some("Server Vendor"));

    service.create_vendor(acme().into()).await.unwrap();
    let after_write = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::Mirror));
    assert_eq!(after_write.len(), 1);
    assert_eq!(after_write[0].get_str("name"), Some("Acme"));
}

#[tokio::test]
async fn hard_delete_refuses_ids_missing_from_current_list() {
    let transport = ScriptedTransport::unreachable();
    let service = service_with(transport.clone()).await;

    let err = service.hard_delete_vendor(&RecordId::Number(77)).await.unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }));
    assert_eq!(transport.requests_to(&Method::DELETE, "/vendors/77/force"), 0);
}

#[tokio::test]
async fn hard_delete_of_listed_vendor_hits_force_endpoint() {
    let transport = ScriptedTransport::unreachable();
    transport.on(Method::GET, "/vendors", Reply::Json(200, json!([{"id": 12, "name": "Old Vendor"}])));
    transport.on(Method::DELETE, "/vendors/12/force", Reply::Json(200, json!({"success": true, "data": null})));
    let service = service_with(transport.clone()).await;

    service.hard_delete_vendor(&RecordId::Number(12)).await.unwrap();
    assert_eq!(transport.requests_to(&Method::DELETE, "/vendors/12/force"), 1);
    assert_eq!(service.last_origin(), Some(DataOrigin::Network));
}

#[tokio::test]
async fn offline_bulk_operation_reports_per_id() {
    let service = service_with(ScriptedTransport::unreachable()).await;
    let first = service.create_vendor(acme().into()).await.unwrap().id().unwrap();
    let second = service.create_vendor(acme().into()).await.unwrap().id().unwrap();

    let outcome = service
        .bulk_operation(BulkOperation::Activate, &[first.clone(), RecordId::Number(404)])
        .await
        .unwrap();
    assert_eq!(outcome.processed, 1);
    assert_eq!(outcome.failed, 1);
    assert!(outcome.results[0].success);
    assert!(!outcome.results[1].success);

    let active = service.list_vendors(&ListParams::new().status("active")).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id(), Some(first));

    let deleted = service.bulk_operation(BulkOperation::Delete, &[second]).await.unwrap();
    assert_eq!(deleted.processed, 1);
    assert_eq!(service.list_vendors(&ListParams::new()).await.unwrap().len(), 1);

    assert!(matches!(
        service.bulk_operation(BulkOperation::Deactivate, &[]).await,
        Err(Error::InvalidRequest(_))
    ));
}

#[tokio::test]
async fn online_bulk_operation_updates_mirror() {
    let transport = ScriptedTransport::unreachable();
    let service = service_with(transport.clone()).await;
    let id = service.create_vendor(acme().into()).await.unwrap().id().unwrap();

    transport.on(Method::POST, "/vendors/bulk", Reply::Json(200, json!({"success": true, "message": "done"})));
    let outcome = service.bulk_operation(BulkOperation::Deactivate, &[id.clone()]).await.unwrap();
    assert_eq!(outcome.processed, 1);

    let stored = service
        .mirror()
        .find(Collection::Vendors, &id)
        .await
        .unwrap();
    assert_eq!(stored.status(), Some("inactive"));
}

#[tokio::test]
async fn quotation_lifecycle_offline() {
    let service = service_with(ScriptedTransport::unreachable()).await;

    let quotation = service
        .create_quotation(record(json!({"vendor_id": 1, "event_id": 3, "title": "Stage build", "amount": 900})))
        .await
        .unwrap();
    assert_eq!(quotation.status(), Some("pending"));
    let id = quotation.id().unwrap();

    let approved = service.approve_quotation(&id, Some("fits budget".to_string())).await.unwrap();
    assert_eq!(approved.status(), Some("approved"));
    assert_eq!(approved.get_str("approval_notes"), Some("fits budget"));

    let listed = service.approved_quotations().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].id(), Some(id));

    let err = service.reject_quotation(&RecordId::Number(555), "late").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { collection: "quotations", .. }));
}

#[tokio::test]
async fn quotations_fall_back_to_seed_and_events_to_empty() {
    let service = service_with(ScriptedTransport::unreachable()).await;

    let quotations = service.list_quotations(&ListParams::new()).await.unwrap();
    assert_eq!(quotations, seed::quotations());

    let approved = service.approved_quotations().await.unwrap();
    assert!(approved.iter().all(|q| q.status() == Some("approved")));

    let events = service.organizer_events().await.unwrap();
    assert!(events.is_empty());
    assert_eq!(service.last_origin(), Some(DataOrigin::Empty));
}

#[tokio::test]
async fn multipart_create_leaves_content_type_to_transport() {
    let transport = ScriptedTransport::unreachable();
    let service = service_with(transport.clone()).await;

    let form = FormPayload::new()
        .text("name", "Lens & Light")
        .text("email", "hi@lens.test")
        .text("services_provided", "[\"photography\",\"video\"]")
        .file("logo", "logo.png", "image/png", vec![0x89, 0x50, 0x4e, 0x47]);

    let created = service.create_vendor(form.into()).await.unwrap();
    assert_eq!(created.get("services_provided"), Some(&json!(["photography", "video"])));
    assert_eq!(created.get_str("logo"), Some("logo.png"));

    let log = transport.log.lock().unwrap();
    let sent = log.iter().find(|r| r.method == Method::POST).unwrap();
    assert!(matches!(sent.body, RequestBody::Form(_)));
    assert!(sent.headers.get(http::header::CONTENT_TYPE).is_none());
    assert_eq!(sent.headers[http::header::AUTHORIZATION], "Bearer dev-token");
}

#[tokio::test]
async fn application_errors_on_reads_propagate() {
    let transport = ScriptedTransport::unreachable();
    transport.on(Method::GET, "/vendors", Reply::Json(403, json!({"message": "This action is unauthorized."})));
    let service = service_with(transport).await;

    let err = service.list_vendors(&ListParams::new()).await.unwrap_err();
    assert!(matches!(err, Error::Api { status: 403, .. }));
}

#[tokio::test]
async fn offline_monitor_short_circuits_the_network() {
    let transport = ScriptedTransport::unreachable();
    transport.on(Method::GET, "/vendors/2", Reply::Json(200, json!({"id": 2, "name": "Should not be used"})));
    let service = service_with(transport.clone()).await;
    service.connectivity().set_reachable(false);

    let vendor = service.get_vendor(&RecordId::Number(2)).await.unwrap();
    assert_eq!(vendor.get_str("name"), Some("Lumen Stage & Lighting"));
    assert_eq!(service.last_origin(), Some(DataOrigin::Seed));
    assert_eq!(transport.requests_to(&Method::GET, "/vendors/2"), 0);

    let missing = service.get_vendor(&RecordId::Number(404)).await.unwrap_err();
    assert!(matches!(missing, Error::NotFound { .. }));
}

#[tokio::test]
async fn offline_writes_survive_a_restart() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());

    {
        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings.origin_storage_dir()).await.unwrap());
        let service = VendorDataService::with_parts(
            &settings,
            ScriptedTransport::unreachable(),
            store,
            ConnectivityMonitor::new(true),
        )
        .await
        .unwrap();
        service.create_vendor(acme().into()).await.unwrap();
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings.origin_storage_dir()).await.unwrap());
    assert_eq!(
        store.read("auth_token").await.unwrap().as_deref(),
        Some("dev-token")
    );
    let service = VendorDataService::with_parts(
        &settings,
        ScriptedTransport::unreachable(),
        store,
        ConnectivityMonitor::new(true),
    )
    .await
    .unwrap();

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(vendors.len(), 1);
    assert_eq!(vendors[0].get_str("name"), Some("Acme"));
}

async fn open_offline(settings: &Settings) -> VendorDataService {
    let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(settings.origin_storage_dir()).await.unwrap());
    VendorDataService::with_parts(
        settings,
        ScriptedTransport::unreachable(),
        store,
        ConnectivityMonitor::new(true),
    )
    .await
    .unwrap()
}

fn ids(records: &[Record]) -> Vec<RecordId> {
    records.iter().filter_map(Record::id).collect()
}

#[tokio::test]
async fn offline_delete_hides_a_vendor_known_only_from_the_cache() {
    let transport = ScriptedTransport::unreachable();
    transport.on(Method::GET, "/vendors", Reply::Json(200, json!([{"id": 7, "name": "Server Vendor"}])));
    let service = service_with(transport).await;

    let online = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(ids(&online), vec![RecordId::Number(7)]);

    service.delete_vendor(&RecordId::Number(7)).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::LocalWrite));

    let offline = service.list_vendors(&ListParams::new()).await.unwrap();
    assert!(!ids(&offline).contains(&RecordId::Number(7)));
    assert_ne!(service.last_origin(), Some(DataOrigin::Cache));
}

#[tokio::test]
async fn offline_delete_of_a_seed_vendor_hides_it() {
    let service = service_with(ScriptedTransport::unreachable()).await;

    service.delete_vendor(&RecordId::Number(1)).await.unwrap();

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(ids(&vendors), vec![RecordId::Number(2), RecordId::Number(3)]);
    assert!(matches!(
        service.get_vendor(&RecordId::Number(1)).await,
        Err(Error::NotFound { .. })
    ));
    assert!(matches!(
        service.delete_vendor(&RecordId::Number(1)).await,
        Err(Error::NotFound { .. })
    ));
}

#[tokio::test]
async fn offline_hard_delete_of_a_seed_vendor_hides_it() {
    let service = service_with(ScriptedTransport::unreachable()).await;

    service.hard_delete_vendor(&RecordId::Number(3)).await.unwrap();

    let vendors = service.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(ids(&vendors), vec![RecordId::Number(1), RecordId::Number(2)]);
}

#[tokio::test]
async fn deleted_seed_vendor_stays_hidden_after_restart() {
    let temp_dir = TempDir::new().unwrap();
    let settings = settings(temp_dir.path());
    open_offline(&settings).await.delete_vendor(&RecordId::Number(2)).await.unwrap();

    let vendors = open_offline(&settings).await.list_vendors(&ListParams::new()).await.unwrap();
    assert_eq!(ids(&vendors), vec![RecordId::Number(1), RecordId::Number(3)]);
}

#[tokio::test]
async fn confirmed_create_without_server_id_gets_a_local_id() {
    let transport = ScriptedTransport::unreachable();
    transport.on(Method::POST, "/vendors", Reply::Empty(201));
    transport.on(Method::POST, "/vendors", Reply::Empty(201));
    let service = service_with(transport).await;

    let first = service.create_vendor(acme().into()).await.unwrap();
    let second = service.create_vendor(acme().into()).await.unwrap();
    assert_eq!(service.last_origin(), Some(DataOrigin::Network));

    let (first, second) = (first.id().unwrap(), second.id().unwrap());
    assert!(first.is_local());
    assert_ne!(first, second);

    let mirrored = service.mirror().load(Collection::Vendors).await;
    assert_eq!(mirrored.len(), 2);
    assert!(mirrored.iter().all(|r| r.id().is_some()));
    assert_eq!(mirrored[0].get_str("name"), Some("Acme"));

    service.delete_vendor(&second).await.unwrap();
    assert_eq!(ids(&service.mirror().load(Collection::Vendors).await), vec![first]);
}
