// /////////////////////////////////////////////////////////////////////////////
// Bill Ingest Pipeline
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Metrics Service
//!
//! Prometheus-based observability for the pipeline's stage processors.
//! Tracks per-stage throughput, chunk-processor retry/rotation behavior,
//! Entrata post outcomes, and error counts by category
//! (`PipelineError::category`). One `MetricsService` is constructed at
//! process start and shared (`Arc`) across every use case a CLI invocation
//! runs.

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};

use billpipe_domain::error::PipelineError;

/// Prometheus metrics for pipeline observability.
#[derive(Clone)]
pub struct MetricsService {
    registry: Registry,

    objects_processed_total: IntCounterVec,
    stage_duration_seconds: Histogram,
    errors_total: IntCounterVec,

    llm_calls_total: IntCounter,
    llm_retries_total: IntCounter,
    llm_key_rotations_total: IntCounter,

    entrata_posts_total: IntCounterVec,
}

impl MetricsService {
    pub fn new() -> Result<Self, PipelineError> {
        let registry = Registry::new();

        let objects_processed_total = IntCounterVec::new(
            Opts::new("objects_processed_total", "Objects processed by a pipeline stage").namespace("billpipe"),
            &["stage"],
        )
        .map_err(|e| PipelineError::internal(format!("failed to create objects_processed_total: {e}")))?;

        let stage_duration_seconds = Histogram::with_opts(
            HistogramOpts::new("stage_duration_seconds", "Time spent in one stage-processor invocation")
                .namespace("billpipe")
                .buckets(vec![0.1, 0.5, 1.0, 5.0, 10.0, 30.0, 60.0, 300.0]),
        )
        .map_err(|e| PipelineError::internal(format!("failed to create stage_duration_seconds: {e}")))?;

        let errors_total = IntCounterVec::new(
            Opts::new("errors_total", "Errors by domain category").namespace("billpipe"),
            &["category"],
        )
        .map_err(|e| PipelineError::internal(format!("failed to create errors_total: {e}")))?;

        let llm_calls_total = IntCounter::with_opts(
            Opts::new("llm_calls_total", "LLM extraction calls issued").namespace("billpipe"),
        )
        .map_err(|e| PipelineError::internal(format!("failed to create llm_calls_total: {e}")))?;

        let llm_retries_total = IntCounter::with_opts(
            Opts::new("llm_retries_total", "LLM extraction call retries").namespace("billpipe"),
        )
        .map_err(|e| PipelineError::internal(format!("failed to create llm_retries_total: {e}")))?;

        let llm_key_rotations_total = IntCounter::with_opts(
            Opts::new("llm_key_rotations_total", "API key rotations triggered by rate limiting").namespace("billpipe"),
        )
        .map_err(|e| PipelineError::internal(format!("failed to create llm_key_rotations_total: {e}")))?;

        let entrata_posts_total = IntCounterVec::new(
            Opts::new("entrata_posts_total", "Entrata posts by outcome").namespace("billpipe"),
            &["outcome"],
        )
        .map_err(|e| PipelineError::internal(format!("failed to create entrata_posts_total: {e}")))?;

        registry
            .register(Box::new(objects_processed_total.clone()))
            .map_err(|e| PipelineError::internal(e.to_string()))?;
        registry
            .register(Box::new(stage_duration_seconds.clone()))
            .map_err(|e| PipelineError::internal(e.to_string()))?;
        registry.register(Box::new(errors_total.clone())).map_err(|e| PipelineError::internal(e.to_string()))?;
        registry.register(Box::new(llm_calls_total.clone())).map_err(|e| PipelineError::internal(e.to_string()))?;
        registry.register(Box::new(llm_retries_total.clone())).map_err(|e| PipelineError::internal(e.to_string()))?;
        registry
            .register(Box::new(llm_key_rotations_total.clone()))
            .map_err(|e| PipelineError::internal(e.to_string()))?;
        registry
            .register(Box::new(entrata_posts_total.clone()))
            .map_err(|e| PipelineError::internal(e.to_string()))?;

        Ok(Self {
            registry,
            objects_processed_total,
            stage_duration_seconds,
            errors_total,
            llm_calls_total,
            llm_retries_total,
            llm_key_rotations_total,
            entrata_posts_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_object_processed(&self, stage: &str) {
        self.objects_processed_total.with_label_values(&[stage]).inc();
    }

    pub fn observe_stage_duration(&self, seconds: f64) {
        self.stage_duration_seconds.observe(seconds);
    }

    pub fn record_error(&self, error: &PipelineError) {
        self.errors_total.with_label_values(&[error.category()]).inc();
    }

    pub fn record_llm_call(&self) {
        self.llm_calls_total.inc();
    }

    pub fn record_llm_retry(&self) {
        self.llm_retries_total.inc();
    }

    pub fn record_key_rotation(&self) {
        self.llm_key_rotations_total.inc();
    }

    pub fn record_entrata_post(&self, outcome: &str) {
        self.entrata_posts_total.with_label_values(&[outcome]).inc();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_registers_without_panicking() {
        let metrics = MetricsService::new().unwrap();
        metrics.record_object_processed("router");
        metrics.record_error(&PipelineError::rate_limit("429"));
        metrics.record_entrata_post("duplicate");
        let families = metrics.registry().gather();
        assert!(!families.is_empty());
    }
}
