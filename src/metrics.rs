//! Supplier metrics, feature-gated behind `metrics` the same way this
//! codebase's other metrics structs compile down to a no-op type when the
//! feature is disabled instead of scattering `#[cfg]` through the call
//! sites.

use crate::error::AppResult;

#[cfg(feature = "metrics")]
use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};

#[derive(Clone, Debug)]
pub struct SupplierMetrics {
    #[cfg(feature = "metrics")]
    registry: Registry,

    #[cfg(feature = "metrics")]
    pub records_delivered_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub end_of_shard_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub buffer_depth: IntGauge,
    #[cfg(feature = "metrics")]
    pub worker_failures_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub throttled_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub offer_timeouts_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub reseeks_total: IntCounter,
    #[cfg(feature = "metrics")]
    pub fetch_latency_seconds: Histogram,

    #[cfg(not(feature = "metrics"))]
    _noop: (),
}

impl SupplierMetrics {
    pub fn new() -> AppResult<Self> {
        #[cfg(feature = "metrics")]
        {
            let registry = Registry::new();

            let records_delivered_total = IntCounter::with_opts(Opts::new(
                "supplier_records_delivered_total",
                "Records returned from poll() total",
            ))?;
            let end_of_shard_total = IntCounter::with_opts(Opts::new(
                "supplier_end_of_shard_total",
                "END_OF_SHARD sentinels delivered total",
            ))?;
            let buffer_depth = IntGauge::with_opts(Opts::new(
                "supplier_buffer_depth",
                "Current bounded buffer occupancy",
            ))?;
            let worker_failures_total = IntCounter::with_opts(Opts::new(
                "supplier_worker_failures_total",
                "Partition workers that stopped on a fatal upstream error",
            ))?;
            let throttled_total = IntCounter::with_opts(Opts::new(
                "supplier_throttled_total",
                "Ticks that observed a Throttled response",
            ))?;
            let offer_timeouts_total = IntCounter::with_opts(Opts::new(
                "supplier_offer_timeouts_total",
                "Buffer offer timeouts observed mid-batch",
            ))?;
            let reseeks_total = IntCounter::with_opts(Opts::new(
                "supplier_reseeks_total",
                "Reseek protocol invocations total",
            ))?;
            let fetch_latency_seconds = Histogram::with_opts(HistogramOpts::new(
                "supplier_fetch_latency_seconds",
                "getRecords call latency in seconds",
            ))?;

            registry.register(Box::new(records_delivered_total.clone()))?;
            registry.register(Box::new(end_of_shard_total.clone()))?;
            registry.register(Box::new(buffer_depth.clone()))?;
            registry.register(Box::new(worker_failures_total.clone()))?;
            registry.register(Box::new(throttled_total.clone()))?;
            registry.register(Box::new(offer_timeouts_total.clone()))?;
            registry.register(Box::new(reseeks_total.clone()))?;
            registry.register(Box::new(fetch_latency_seconds.clone()))?;

            Ok(Self {
                registry,
                records_delivered_total,
                end_of_shard_total,
                buffer_depth,
                worker_failures_total,
                throttled_total,
                offer_timeouts_total,
                reseeks_total,
                fetch_latency_seconds,
            })
        }

        #[cfg(not(feature = "metrics"))]
        {
            Ok(Self { _noop: () })
        }
    }

    #[cfg(feature = "metrics")]
    pub fn encode_text(&self) -> AppResult<String> {
        use prometheus::{Encoder, TextEncoder};
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&mf, &mut buf)?;
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    #[cfg(not(feature = "metrics"))]
    pub fn encode_text(&self) -> AppResult<String> {
        Ok(String::new())
    }

    #[inline]
    pub fn add_records_delivered(&self, _n: u64) {
        #[cfg(feature = "metrics")]
        self.records_delivered_total.inc_by(_n);
    }

    #[inline]
    pub fn inc_end_of_shard(&self) {
        #[cfg(feature = "metrics")]
        self.end_of_shard_total.inc();
    }

    #[inline]
    pub fn set_buffer_depth(&self, _depth: i64) {
        #[cfg(feature = "metrics")]
        self.buffer_depth.set(_depth);
    }

    #[inline]
    pub fn inc_worker_failure(&self) {
        #[cfg(feature = "metrics")]
        self.worker_failures_total.inc();
    }

    #[inline]
    pub fn inc_throttled(&self) {
        #[cfg(feature = "metrics")]
        self.throttled_total.inc();
    }

    #[inline]
    pub fn inc_offer_timeout(&self) {
        #[cfg(feature = "metrics")]
        self.offer_timeouts_total.inc();
    }

    #[inline]
    pub fn inc_reseek(&self) {
        #[cfg(feature = "metrics")]
        self.reseeks_total.inc();
    }

    #[inline]
    pub fn observe_fetch_latency(&self, _secs: f64) {
        #[cfg(feature = "metrics")]
        self.fetch_latency_seconds.observe(_secs);
    }
}
