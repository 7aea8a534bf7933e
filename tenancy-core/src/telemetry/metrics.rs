//! Prometheus metrics setup and metric definitions

use anyhow::Context;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let buckets = [
        0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
    ];

    PrometheusBuilder::new()
        .set_buckets(&buckets)
        .context("failed to set histogram buckets")?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup.
pub fn describe_metrics() {
    describe_counter!("tenancy_http_requests_total", "Total number of HTTP requests");
    describe_histogram!(
        "tenancy_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "tenancy_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "tenancy_guard_decisions_total",
        "Permission guard evaluations by outcome (allow/deny)"
    );
    describe_counter!(
        "tenancy_role_override_fallback_total",
        "Sessions that fell back to the static role matrix"
    );
    describe_counter!(
        "tenancy_scope_columns_stripped_total",
        "Caller-supplied tenant_id/franchise_id values discarded from write payloads"
    );
    describe_counter!(
        "tenancy_lifecycle_transitions_total",
        "Quote version transitions by outcome (applied/rejected/conflict)"
    );
    describe_counter!(
        "tenancy_admin_override_requests_total",
        "Requests carrying the admin override header by outcome (applied/refused)"
    );
    describe_counter!(
        "tenancy_access_context_failures_total",
        "Access context construction failures by reason"
    );

    for outcome in ["allow", "deny"] {
        counter!("tenancy_guard_decisions_total", "outcome" => outcome).absolute(0);
    }
    for outcome in ["applied", "rejected", "conflict"] {
        counter!("tenancy_lifecycle_transitions_total", "outcome" => outcome).absolute(0);
    }
    counter!("tenancy_role_override_fallback_total").absolute(0);
}
