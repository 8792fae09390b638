// Observability: metrics catalog and Prometheus recorder setup

pub mod metrics;
