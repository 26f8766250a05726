//! Built-in illustrative records, served only when neither the network
//! nor the local mirror has anything for a collection.

use serde_json::{json, Value};

use super::mirror::Collection;
use crate::models::{records_from_value, Record};

pub fn vendors() -> Vec<Record> {
    records_from_value(json!([
        {
            "id": 1,
            "name": "Stellar Catering Co.",
            "business_name": "Stellar Catering Co. Ltd",
            "email": "bookings@stellarcatering.test",
            "phone": "+1-555-0101",
            "contact_person": "Maya Ortiz",
            "business_type": "catering",
            "services_provided": ["catering", "bar_service", "staffing"],
            "status": "active",
            "rating": 4.7,
            "total_events": 18,
            "total_quotations": 24,
            "completed_events": 17,
            "created_at": "2024-01-15T09:00:00.000Z",
            "updated_at": "2024-06-02T14:30:00.000Z"
        },
        {
            "id": 2,
            "name": "Lumen Stage & Lighting",
            "business_name": "Lumen Productions LLC",
            "email": "hello@lumenstage.test",
            "phone": "+1-555-0142",
            "contact_person": "Jon Baptiste",
            "business_type": "production",
            "services_provided": ["lighting", "staging", "rigging"],
            "status": "active",
            "rating": 4.4,
            "total_events": 9,
            "total_quotations": 12,
            "completed_events": 9,
            "created_at": "2024-02-03T11:20:00.000Z",
            "updated_at": "2024-05-21T08:10:00.000Z"
        },
        {
            "id": 3,
            "name": "Harbor AV Rentals",
            "business_name": "Harbor Audio Visual Inc.",
            "email": "ops@harborav.test",
            "phone": "+1-555-0177",
            "contact_person": "Priya Nair",
            "business_type": "audio_visual",
            "services_provided": ["sound", "projection"],
            "status": "pending_approval",
            "rating": 0,
            "total_events": 0,
            "total_quotations": 1,
            "completed_events": 0,
            "created_at": "2024-06-10T16:45:00.000Z",
            "updated_at": "2024-06-10T16:45:00.000Z"
        }
    ]))
}

pub fn quotations() -> Vec<Record> {
    records_from_value(json!([
        {
            "id": 1,
            "vendor_id": 1,
            "event_id": 101,
            "title": "Gala dinner catering for 250 guests",
            "amount": 12500.0,
            "currency": "USD",
            "status": "approved",
            "notes": "Includes vegetarian and vegan options",
            "created_at": "2024-05-01T10:00:00.000Z",
            "updated_at": "2024-05-03T09:15:00.000Z"
        },
        {
            "id": 2,
            "vendor_id": 3,
            "event_id": 102,
            "title": "Conference AV package, two days",
            "amount": 6000.0,
            "currency": "USD",
            "status": "pending",
            "notes": null,
            "created_at": "2024-06-11T13:30:00.000Z",
            "updated_at": "2024-06-11T13:30:00.000Z"
        }
    ]))
}

pub fn statistics() -> Value {
    json!({
        "total_vendors": 3,
        "active_vendors": 2,
        "pending_approval": 1,
        "suspended_vendors": 0,
        "inactive_vendors": 0,
        "total_quotations": 2,
        "pending_quotations": 1,
        "approved_quotations": 1,
        "rejected_quotations": 0,
        "total_quoted_amount": 18500.0,
        "average_rating": 4.55
    })
}

pub fn seed(collection: Collection) -> Vec<Record> {
    match collection {
        Collection::Vendors => vendors(),
        Collection::Quotations => quotations(),
    }
}
