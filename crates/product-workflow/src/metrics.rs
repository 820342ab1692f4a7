use lazy_static::lazy_static;
use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry, Encoder,
    IntCounter, IntCounterVec, Registry, TextEncoder,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();
    pub static ref DETAIL_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "productworkflow_detail_lookups_total",
        "Product workflow detail lookups by outcome.",
        &["outcome"],
        REGISTRY
    )
    .expect("detail lookup counter registers once");
    pub static ref CONSTRAINT_VIOLATIONS_TOTAL: IntCounterVec = register_int_counter_vec_with_registry!(
        "productworkflow_constraint_violations_total",
        "Writes rejected by a uniqueness constraint.",
        &["constraint"],
        REGISTRY
    )
    .expect("constraint violation counter registers once");
    pub static ref DOMAIN_ERRORS_TOTAL: IntCounter = register_int_counter_with_registry!(
        "productworkflow_domain_errors_total",
        "Writes rejected because steps crossed workflow boundaries.",
        REGISTRY
    )
    .expect("domain error counter registers once");
    pub static ref CURRENT_STEP_CHANGES_TOTAL: IntCounter = register_int_counter_with_registry!(
        "productworkflow_current_step_changes_total",
        "Updates of a product workflow's current step.",
        REGISTRY
    )
    .expect("current step counter registers once");
}

/// Count a rejected write by error kind. Other errors are not counted.
pub fn record_error(err: &crate::Error) {
    match err {
        crate::Error::ConstraintViolation { constraint, .. } => {
            CONSTRAINT_VIOLATIONS_TOTAL
                .with_label_values(&[constraint.as_str()])
                .inc();
        }
        crate::Error::Domain(_) => DOMAIN_ERRORS_TOTAL.inc(),
        _ => {}
    }
}

// Text exposition of everything in REGISTRY
pub fn gather_metrics() -> crate::Result<String> {
    let mut buffer = vec![];
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| crate::Error::Internal(format!("Failed to encode metrics: {}", e)))?;
    String::from_utf8(buffer)
        .map_err(|e| crate::Error::Internal(format!("Metrics are not valid UTF-8: {}", e)))
}
