mod bulk;
mod form;
mod quotation;
mod record;
mod request;
mod response;
mod vendor;

pub use bulk::{BulkItemResult, BulkOperation, BulkOutcome};
pub use form::{FormField, FormPayload, FormValue};
pub use quotation::{QuotationDecision, QuotationStatus};
pub use record::{records_from_value, records_to_value, Record, RecordId};
pub use request::{ListParams, RecordFilter, RequestBody, RequestKey, RequestOptions};
pub use response::{envelope_failure, unwrap_envelope, ErrorBody};
pub use vendor::{
    normalize_services_provided, normalize_vendor, normalize_vendors, zero_activity_counters,
    VendorPayload, VendorStatus, SERVICES_PROVIDED,
};
