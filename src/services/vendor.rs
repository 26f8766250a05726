use http::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use crate::clients::{ConnectivityMonitor, HttpClient, Transport};
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::models::{
    normalize_vendor, normalize_vendors, records_from_value, zero_activity_counters, BulkItemResult,
    BulkOperation, BulkOutcome, ListParams, QuotationDecision, QuotationStatus, Record, RecordFilter,
    RecordId, RequestKey, RequestOptions, VendorPayload, VendorStatus,
};
use crate::services::api::RequestGateway;
use crate::services::auth::AuthHeaderProvider;
use crate::services::resolver::{
    CacheSource, ConstantSource, DataOrigin, FallbackChain, MirrorSource, Resolved, SeedSource, Selector,
};
use crate::storage::{seed, Collection, FileStore, KeyValueStore, PersistentMirror, ResponseCache};
use crate::utils::now_iso;

const VENDORS: &str = "/vendors";
const STATISTICS: &str = "/vendors/statistics";
const BULK: &str = "/vendors/bulk";
const QUOTATIONS: &str = "/vendors/quotations";
const APPROVED_QUOTATIONS: &str = "/vendors/quotations/approved";
const ORGANIZER_EVENTS: &str = "/vendors/organizer/events";

/// Vendor-domain data access that keeps answering while the backend is
/// unreachable.
///
/// Every operation makes one network attempt. Reads then fall back to the
/// response cache, the persistent mirror and the seed dataset, in that
/// order. Writes that cannot reach the server are applied to the mirror
/// and reported as successful. Validation and other application errors
/// from a reachable server are returned unchanged.
///
/// The service owns its cache and mirror; construct one per application
/// and share it by reference.
pub struct VendorDataService {
    gateway: RequestGateway,
    cache: ResponseCache,
    mirror: PersistentMirror,
    origin: watch::Sender<Option<DataOrigin>>,
}

impl VendorDataService {
    pub async fn new(settings: &Settings) -> Result<Self> {
        let store: Arc<dyn KeyValueStore> =
            Arc::new(FileStore::new(settings.origin_storage_dir()).await?);
        let transport: Arc<dyn Transport> = Arc::new(HttpClient::new(settings)?);
        let connectivity = ConnectivityMonitor::new(settings.network.assume_online);
        Self::with_parts(settings, transport, store, connectivity).await
    }

    pub async fn with_parts(
        settings: &Settings,
        transport: Arc<dyn Transport>,
        store: Arc<dyn KeyValueStore>,
        connectivity: ConnectivityMonitor,
    ) -> Result<Self> {
        let auth = AuthHeaderProvider::new(store.clone(), settings.auth.clone(), &settings.api.headers)?;
        let gateway = RequestGateway::new(transport, Arc::new(auth), connectivity, &settings.api.base_url);
        let mirror = PersistentMirror::open(store).await;
        let (origin, _) = watch::channel(None);

        info!(base_url = %settings.api.base_url, "Vendor data service ready");

        Ok(Self {
            gateway,
            cache: ResponseCache::new(settings.cache.max_entries),
            mirror,
            origin,
        })
    }

    pub fn connectivity(&self) -> &ConnectivityMonitor {
        self.gateway.connectivity()
    }

    pub fn mirror(&self) -> &PersistentMirror {
        &self.mirror
    }

    /// Origin of the most recent operation's result.
    pub fn last_origin(&self) -> Option<DataOrigin> {
        *self.origin.borrow()
    }

    pub fn origin_updates(&self) -> watch::Receiver<Option<DataOrigin>> {
        self.origin.subscribe()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    // Vendors

    pub async fn list_vendors(&self, params: &ListParams) -> Result<Vec<Record>> {
        let options = RequestOptions::get().with_query(params);
        let (key, network) = self.fetch(VENDORS, &options).await;
        let selector = Selector::All(params.filter());

        let resolved = FallbackChain::new()
            .then(CacheSource { cache: &self.cache, key: &key })
            .then(MirrorSource {
                mirror: &self.mirror,
                collection: Collection::Vendors,
                selector: selector.clone(),
            })
            .then(SeedSource {
                collection: Collection::Vendors,
                selector,
                hidden: self.mirror.buried(Collection::Vendors).await,
            })
            .resolve("list_vendors", network)
            .await?;

        let mut records = records_from_value(self.settle(resolved, json!([])));
        normalize_vendors(&mut records);
        Ok(records)
    }

    pub async fn get_vendor(&self, id: &RecordId) -> Result<Record> {
        let endpoint = format!("{}/{}", VENDORS, id);
        let (key, network) = self.fetch(&endpoint, &RequestOptions::get()).await;

        let resolved = FallbackChain::new()
            .then(CacheSource { cache: &self.cache, key: &key })
            .then(MirrorSource {
                mirror: &self.mirror,
                collection: Collection::Vendors,
                selector: Selector::ById(id.clone()),
            })
            .then(SeedSource {
                collection: Collection::Vendors,
                selector: Selector::ById(id.clone()),
                hidden: self.mirror.buried(Collection::Vendors).await,
            })
            .resolve("get_vendor", network)
            .await?
            .ok_or_else(|| not_found(Collection::Vendors, id))?;

        self.publish(resolved.origin);
        let mut record = expect_record(resolved.value, "vendor")?;
        normalize_vendor(&mut record);
        Ok(record)
    }

    /// Always appears to succeed unless the server rejects the payload; an
    /// unreachable server yields a locally stored `pending_approval` vendor.
    pub async fn create_vendor(&self, payload: VendorPayload) -> Result<Record> {
        let options = match &payload {
            VendorPayload::Fields(record) => RequestOptions::json(Method::POST, record.clone().into_value()),
            VendorPayload::Form(form) => RequestOptions::form(Method::POST, form.clone()),
        };

        match self.gateway.call(VENDORS, &options).await {
            Ok(value) => {
                let mut record = Record::from_value(value).unwrap_or_default();
                if record.id().is_none() {
                    warn!("Vendor create succeeded without a server id, keeping a local id");
                    let mut fields = payload.to_record();
                    fields.merge(&record);
                    record = fields;
                }
                zero_activity_counters(&mut record);
                normalize_vendor(&mut record);
                let record = self.mirror_confirmed(Collection::Vendors, record).await;
                self.cache.clear();
                self.publish(DataOrigin::Network);
                Ok(record)
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(error = %e, "Vendor create could not reach the server, storing locally");
                let now = now_iso();
                let mut fields = payload.to_record();
                let record = self
                    .mirror
                    .insert_local(Collection::Vendors, move |_| {
                        fields.set("status", VendorStatus::PendingApproval.as_str());
                        fields.set("created_at", now.clone());
                        fields.set("updated_at", now);
                        normalize_vendor(&mut fields);
                        fields
                    })
                    .await;
                self.cache.clear();
                self.publish(DataOrigin::LocalWrite);
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn update_vendor(&self, id: &RecordId, data: Record) -> Result<Record> {
        let mut data = data;
        data.remove("id");
        let endpoint = format!("{}/{}", VENDORS, id);
        let options = RequestOptions::json(Method::PUT, data.clone().into_value());

        match self.gateway.call(&endpoint, &options).await {
            Ok(value) => {
                let patch = match Record::from_value(value) {
                    Some(server) if !server.fields().is_empty() => server,
                    _ => data.with("updated_at", now_iso()),
                };
                let merged = self
                    .mirror
                    .update(Collection::Vendors, id, |record| {
                        record.merge(&patch);
                        normalize_vendor(record);
                    })
                    .await;
                self.cache.clear();
                self.publish(DataOrigin::Network);

                let mut record = merged.unwrap_or_else(|| patch.with("id", id.to_value()));
                normalize_vendor(&mut record);
                Ok(record)
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(error = %e, id = %id, "Vendor update could not reach the server, applying locally");
                let now = now_iso();
                let record = self
                    .mirror
                    .update(Collection::Vendors, id, |record| {
                        record.merge(&data);
                        record.touch(&now);
                        normalize_vendor(record);
                    })
                    .await
                    .ok_or_else(|| not_found(Collection::Vendors, id))?;
                self.cache.clear();
                self.publish(DataOrigin::LocalWrite);
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    /// Soft delete. The id leaves the local mirror even when the server
    /// could not be reached.
    pub async fn delete_vendor(&self, id: &RecordId) -> Result<()> {
        let endpoint = format!("{}/{}", VENDORS, id);
        self.delete_at(&endpoint, id).await
    }

    /// Permanent delete. Refuses ids that the current vendor list does not
    /// contain, so a stale screen cannot delete something it no longer shows.
    pub async fn hard_delete_vendor(&self, id: &RecordId) -> Result<()> {
        let current = self.list_vendors(&ListParams::new()).await?;
        if !current.iter().any(|record| record.has_id(id)) {
            warn!(id = %id, "Refusing hard delete of a vendor missing from the current list");
            return Err(not_found(Collection::Vendors, id));
        }

        let endpoint = format!("{}/{}/force", VENDORS, id);
        self.delete_at(&endpoint, id).await
    }

    async fn delete_at(&self, endpoint: &str, id: &RecordId) -> Result<()> {
        match self.gateway.call(endpoint, &RequestOptions::delete()).await {
            Ok(_) => {
                self.forget_vendor(id).await;
                self.publish(DataOrigin::Network);
                Ok(())
            }
            Err(Error::Api { status: 404, .. }) => {
                info!(id = %id, "Vendor already absent on the server, removing locally");
                self.forget_vendor(id).await;
                self.publish(DataOrigin::Network);
                Ok(())
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(error = %e, id = %id, "Vendor delete could not reach the server, removing locally");
                if !self.is_visible_locally(id).await {
                    return Err(not_found(Collection::Vendors, id));
                }
                self.forget_vendor(id).await;
                self.publish(DataOrigin::LocalWrite);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether some fallback source would still show vendor `id`.
    async fn is_visible_locally(&self, id: &RecordId) -> bool {
        if self.mirror.find(Collection::Vendors, id).await.is_some() || self.cache.contains_record(id) {
            return true;
        }
        !self.mirror.is_buried(Collection::Vendors, id).await
            && seed::vendors().iter().any(|record| record.has_id(id))
    }

    /// Drops `id` from the mirror and hides it from cache and seed answers.
    async fn forget_vendor(&self, id: &RecordId) -> bool {
        let removed = self.mirror.remove(Collection::Vendors, id).await;
        self.mirror.bury(Collection::Vendors, id).await;
        self.cache.clear();
        removed
    }

    /// Server snapshot, or the seed snapshot when offline. Never derived
    /// from the mirror.
    pub async fn statistics(&self) -> Result<Record> {
        let (key, network) = self.fetch(STATISTICS, &RequestOptions::get()).await;

        let resolved = FallbackChain::new()
            .then(CacheSource { cache: &self.cache, key: &key })
            .then(ConstantSource(seed::statistics()))
            .resolve("statistics", network)
            .await?;

        Ok(Record::from_value(self.settle(resolved, json!({}))).unwrap_or_default())
    }

    pub async fn bulk_operation(&self, operation: BulkOperation, ids: &[RecordId]) -> Result<BulkOutcome> {
        if ids.is_empty() {
            return Err(Error::InvalidRequest("bulk operation needs at least one id".to_string()));
        }

        let body = json!({
            "operation": operation.as_str(),
            "vendor_ids": ids.iter().map(RecordId::to_value).collect::<Vec<_>>(),
        });

        match self.gateway.call(BULK, &RequestOptions::json(Method::POST, body)).await {
            Ok(value) => {
                let outcome = serde_json::from_value::<BulkOutcome>(value)
                    .unwrap_or_else(|_| BulkOutcome::all_succeeded(operation, ids));
                for id in outcome.succeeded_ids() {
                    self.apply_bulk_locally(operation, id).await;
                }
                self.cache.clear();
                self.publish(DataOrigin::Network);
                Ok(outcome)
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(
                    error = %e,
                    operation = operation.as_str(),
                    count = ids.len(),
                    "Bulk operation could not reach the server, applying locally"
                );
                let mut results = Vec::with_capacity(ids.len());
                for id in ids {
                    let applied = self.apply_bulk_locally(operation, id).await;
                    results.push(BulkItemResult {
                        id: id.clone(),
                        success: applied,
                        message: (!applied).then(|| "vendor not found in local data".to_string()),
                    });
                }
                self.cache.clear();
                self.publish(DataOrigin::LocalWrite);
                Ok(BulkOutcome::from_results(operation, results))
            }
            Err(e) => Err(e),
        }
    }

    async fn apply_bulk_locally(&self, operation: BulkOperation, id: &RecordId) -> bool {
        match operation.target_status() {
            Some(status) => {
                let now = now_iso();
                self.mirror
                    .update(Collection::Vendors, id, |record| {
                        record.set("status", status.as_str());
                        record.touch(&now);
                    })
                    .await
                    .is_some()
            }
            None => {
                let present = self.mirror.find(Collection::Vendors, id).await.is_some();
                if present {
                    self.forget_vendor(id).await;
                }
                present
            }
        }
    }

    // Quotations

    pub async fn list_quotations(&self, params: &ListParams) -> Result<Vec<Record>> {
        let options = RequestOptions::get().with_query(params);
        let (key, network) = self.fetch(QUOTATIONS, &options).await;
        self.resolve_quotations("list_quotations", &key, network, params.filter())
            .await
    }

    pub async fn approved_quotations(&self) -> Result<Vec<Record>> {
        let (key, network) = self.fetch(APPROVED_QUOTATIONS, &RequestOptions::get()).await;
        let filter = RecordFilter::with_status(QuotationStatus::Approved.as_str());
        self.resolve_quotations("approved_quotations", &key, network, filter)
            .await
    }

    async fn resolve_quotations(
        &self,
        context: &str,
        key: &RequestKey,
        network: Result<Value>,
        filter: RecordFilter,
    ) -> Result<Vec<Record>> {
        let resolved = FallbackChain::new()
            .then(CacheSource { cache: &self.cache, key })
            .then(MirrorSource {
                mirror: &self.mirror,
                collection: Collection::Quotations,
                selector: Selector::All(filter.clone()),
            })
            .then(SeedSource {
                collection: Collection::Quotations,
                selector: Selector::All(filter),
                hidden: self.mirror.buried(Collection::Quotations).await,
            })
            .resolve(context, network)
            .await?;

        Ok(records_from_value(self.settle(resolved, json!([]))))
    }

    pub async fn create_quotation(&self, data: Record) -> Result<Record> {
        let options = RequestOptions::json(Method::POST, data.clone().into_value());

        match self.gateway.call(QUOTATIONS, &options).await {
            Ok(value) => {
                let mut record = Record::from_value(value).unwrap_or_default();
                if record.id().is_none() {
                    warn!("Quotation create succeeded without a server id, keeping a local id");
                    let mut fields = data;
                    fields.merge(&record);
                    record = fields;
                }
                let record = self.mirror_confirmed(Collection::Quotations, record).await;
                self.cache.clear();
                self.publish(DataOrigin::Network);
                Ok(record)
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(error = %e, "Quotation create could not reach the server, storing locally");
                let now = now_iso();
                let mut fields = data;
                let record = self
                    .mirror
                    .insert_local(Collection::Quotations, move |_| {
                        fields.set("status", QuotationStatus::Pending.as_str());
                        fields.set("created_at", now.clone());
                        fields.set("updated_at", now);
                        fields
                    })
                    .await;
                self.cache.clear();
                self.publish(DataOrigin::LocalWrite);
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn approve_quotation(&self, id: &RecordId, notes: Option<String>) -> Result<Record> {
        self.decide_quotation(id, QuotationDecision::Approve { notes }).await
    }

    pub async fn reject_quotation(&self, id: &RecordId, reason: impl Into<String>) -> Result<Record> {
        self.decide_quotation(id, QuotationDecision::Reject { reason: reason.into() })
            .await
    }

    async fn decide_quotation(&self, id: &RecordId, decision: QuotationDecision) -> Result<Record> {
        let endpoint = format!("{}/{}/{}", QUOTATIONS, id, decision.action());
        let options = RequestOptions::json(Method::POST, decision.body());

        match self.gateway.call(&endpoint, &options).await {
            Ok(value) => {
                let patch = match Record::from_value(value) {
                    Some(server) if !server.fields().is_empty() => server,
                    _ => decision_patch(&decision, &now_iso()),
                };
                let merged = self
                    .mirror
                    .update(Collection::Quotations, id, |record| record.merge(&patch))
                    .await;
                self.cache.clear();
                self.publish(DataOrigin::Network);
                Ok(merged.unwrap_or_else(|| patch.with("id", id.to_value())))
            }
            Err(e) if e.is_fallback_eligible() => {
                warn!(
                    error = %e,
                    id = %id,
                    action = decision.action(),
                    "Quotation decision could not reach the server, applying locally"
                );
                let patch = decision_patch(&decision, &now_iso());
                let record = self
                    .mirror
                    .update(Collection::Quotations, id, |record| record.merge(&patch))
                    .await
                    .ok_or_else(|| not_found(Collection::Quotations, id))?;
                self.cache.clear();
                self.publish(DataOrigin::LocalWrite);
                Ok(record)
            }
            Err(e) => Err(e),
        }
    }

    // Lookups

    /// Events of the signed-in organizer. Only the cache backs this up.
    pub async fn organizer_events(&self) -> Result<Vec<Record>> {
        let (key, network) = self.fetch(ORGANIZER_EVENTS, &RequestOptions::get()).await;
        let resolved = FallbackChain::new()
            .then(CacheSource { cache: &self.cache, key: &key })
            .resolve("organizer_events", network)
            .await?;
        Ok(records_from_value(self.settle(resolved, json!([]))))
    }

    /// Mirrors a server-confirmed record. One that came back without an id
    /// gets a local id so the mirror never holds an unaddressable record.
    async fn mirror_confirmed(&self, collection: Collection, record: Record) -> Record {
        if record.id().is_some() {
            self.mirror.upsert(collection, record.clone()).await;
            return record;
        }
        self.mirror.insert_local(collection, move |_| record).await
    }

    /// One network attempt; a success becomes the cached answer for `key`
    /// unless a write cleared the cache while the call was in flight.
    async fn fetch(&self, endpoint: &str, options: &RequestOptions) -> (RequestKey, Result<Value>) {
        let key = RequestKey::new(endpoint, options);
        let generation = self.cache.generation();
        let result = self.gateway.call(endpoint, options).await;
        if let Ok(value) = &result {
            self.cache.set_at(generation, &key, value.clone());
        }
        (key, result)
    }

    fn settle(&self, resolved: Option<Resolved>, empty: Value) -> Value {
        match resolved {
            Some(resolved) => {
                self.publish(resolved.origin);
                resolved.value
            }
            None => {
                self.publish(DataOrigin::Empty);
                empty
            }
        }
    }

    fn publish(&self, origin: DataOrigin) {
        self.origin.send_replace(Some(origin));
    }
}

fn decision_patch(decision: &QuotationDecision, now: &str) -> Record {
    let patch = Record::new()
        .with("status", decision.status().as_str())
        .with("updated_at", now);
    match decision {
        QuotationDecision::Approve { notes } => {
            let patch = patch.with("approved_at", now);
            match notes {
                Some(notes) => patch.with("approval_notes", notes.clone()),
                None => patch,
            }
        }
        QuotationDecision::Reject { reason } => patch
            .with("rejected_at", now)
            .with("rejection_reason", reason.clone()),
    }
}

fn not_found(collection: Collection, id: &RecordId) -> Error {
    Error::NotFound {
        collection: collection.label(),
        id: id.clone(),
    }
}

fn expect_record(value: Value, what: &str) -> Result<Record> {
    match value {
        Value::Object(map) => Ok(Record::from(map)),
        other => Err(Error::Parse {
            message: format!("expected a {} object", what),
            body: other.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decision_patch_fields() {
        let approve = decision_patch(
            &QuotationDecision::Approve { notes: Some("ok".to_string()) },
            "2024-07-01T00:00:00.000Z",
        );
        assert_eq!(approve.status(), Some("approved"));
        assert_eq!(approve.get_str("approval_notes"), Some("ok"));
        assert_eq!(approve.get_str("approved_at"), Some("2024-07-01T00:00:00.000Z"));

        let reject = decision_patch(
            &QuotationDecision::Reject { reason: "over budget".to_string() },
            "2024-07-01T00:00:00.000Z",
        );
        assert_eq!(reject.status(), Some("rejected"));
        assert_eq!(reject.get_str("rejection_reason"), Some("over budget"));
        assert!(reject.get("approved_at").is_none());
    }

    #[test]
    fn test_expect_record_rejects_non_objects() {
        assert!(expect_record(json!({"id": 1}), "vendor").is_ok());
        assert!(matches!(
            expect_record(json!([1, 2]), "vendor"),
            Err(Error::Parse { .. })
        ));
    }
}
