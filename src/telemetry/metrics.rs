//! `metrics` facade recording for the pipeline.
//!
//! No exporter is installed here; the host application chooses one.

use ::metrics::{counter, histogram};

pub fn record_enqueued() {
    counter!("gateway_telemetry_records_enqueued_total").increment(1);
}

pub fn record_record_dropped(reason: &'static str) {
    counter!("gateway_telemetry_records_dropped_total", "reason" => reason).increment(1);
}

pub fn record_batch_flushed(trigger: &'static str, bytes: usize) {
    counter!("gateway_telemetry_batches_flushed_total", "trigger" => trigger).increment(1);
    histogram!("gateway_telemetry_batch_bytes").record(bytes as f64);
}

pub fn record_batch_delivered(attempts: u32) {
    counter!("gateway_telemetry_batches_delivered_total").increment(1);
    histogram!("gateway_telemetry_delivery_attempts").record(f64::from(attempts));
}

pub fn record_batch_dropped() {
    counter!("gateway_telemetry_batches_dropped_total").increment(1);
}
