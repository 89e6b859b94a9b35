//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Order sync (outcomes, durations, composed line items)
//! - Contact resolution and status transitions
//! - The remote CRM API

use once_cell::sync::Lazy;
use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts};

// =============================================================================
// Order Sync Metrics
// =============================================================================

/// Order sync runs by trigger and outcome.
pub static ORDER_SYNCS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("crmsync_order_syncs_total", "Total order sync runs"),
        &["trigger", "outcome"], // outcome: "synced", "skipped", "empty", "failed"
    )
    .unwrap()
});

/// Order sync duration in seconds.
pub static ORDER_SYNC_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "crmsync_order_sync_duration_seconds",
            "Duration of an order sync run",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["trigger"],
    )
    .unwrap()
});

/// Line items per submitted contribution.
pub static LINE_ITEMS_COMPOSED: Lazy<Histogram> = Lazy::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "crmsync_line_items_composed",
            "Number of line items per submitted contribution",
        )
        .buckets(vec![0.0, 1.0, 2.0, 3.0, 5.0, 10.0, 25.0]),
    )
    .unwrap()
});

/// Order items dropped during composition.
pub static LINE_ITEMS_SKIPPED: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crmsync_line_items_skipped_total",
            "Order items dropped during composition",
        ),
        &["stage"],
    )
    .unwrap()
});

/// Contributions created.
pub static CONTRIBUTIONS_CREATED: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "crmsync_contributions_created_total",
        "Total contributions created",
    )
    .unwrap()
});

// =============================================================================
// Contact Metrics
// =============================================================================

/// Contact resolutions by how the contact was found.
pub static CONTACT_RESOLUTIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crmsync_contact_resolutions_total",
            "Total contact resolutions",
        ),
        &["source"], // "linked", "user", "dedupe", "created", "failed"
    )
    .unwrap()
});

// =============================================================================
// Status Metrics
// =============================================================================

/// Status transitions applied to contributions.
pub static STATUS_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "crmsync_status_transitions_total",
            "Contribution status transitions",
        ),
        &["result"], // "payment", "updated", "noop", "not_linked", "failed"
    )
    .unwrap()
});

// =============================================================================
// CRM API Metrics
// =============================================================================

/// CRM call duration by operation.
pub static CRM_CALL_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "crmsync_crm_call_duration_seconds",
            "Duration of CRM API calls",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// CRM calls by operation and status.
pub static CRM_CALLS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("crmsync_crm_calls_total", "Total CRM API calls"),
        &["operation", "status"], // status: "success", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Order sync
        Box::new(ORDER_SYNCS.clone()),
        Box::new(ORDER_SYNC_DURATION.clone()),
        Box::new(LINE_ITEMS_COMPOSED.clone()),
        Box::new(LINE_ITEMS_SKIPPED.clone()),
        Box::new(CONTRIBUTIONS_CREATED.clone()),
        // Contacts
        Box::new(CONTACT_RESOLUTIONS.clone()),
        // Status
        Box::new(STATUS_TRANSITIONS.clone()),
        // CRM API
        Box::new(CRM_CALL_DURATION.clone()),
        Box::new(CRM_CALLS.clone()),
    ]
}
