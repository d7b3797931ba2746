//! KPI service with pluggable cache and warehouse clients

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::{CacheKeyBuilder, CacheStatsSnapshot, CacheStore, ComputeOrchestrator, InMemoryCacheStore};
use crate::config::{CacheConfig, EngineConfig};
use crate::error::{Error, Result};
use crate::filters::FilterSet;
use crate::metrics::{MetricsEngine, OverviewMetrics};
use crate::observability::{PrometheusConfig, PrometheusExporter, ServiceMetrics};
use crate::warehouse::WarehouseClient;

/// Cache sections served by the service
pub mod sections {
    /// Inventory overview (DOH / DRR / boxes)
    pub const OVERVIEW: &str = "overview";
}

/// Builder for a [`KpiService`] with injected clients
pub struct KpiServiceBuilder {
    cache_store: Option<Arc<dyn CacheStore>>,
    warehouse: Option<Arc<dyn WarehouseClient>>,
    engine_config: EngineConfig,
    cache_config: CacheConfig,
}

impl KpiServiceBuilder {
    /// Create a new service builder
    pub fn new() -> Self {
        Self {
            cache_store: None,
            warehouse: None,
            engine_config: EngineConfig::default(),
            cache_config: CacheConfig::default(),
        }
    }

    /// Set the cache store. Defaults to an [`InMemoryCacheStore`].
    pub fn with_cache_store<S>(mut self, store: S) -> Self
    where
        S: CacheStore + 'static,
    {
        self.cache_store = Some(Arc::new(store));
        self
    }

    /// Set an already shared cache store
    pub fn with_shared_cache_store(mut self, store: Arc<dyn CacheStore>) -> Self {
        self.cache_store = Some(store);
        self
    }

    /// Set the warehouse client (required)
    pub fn with_warehouse<W>(mut self, warehouse: W) -> Self
    where
        W: WarehouseClient + 'static,
    {
        self.warehouse = Some(Arc::new(warehouse));
        self
    }

    /// Set an already shared warehouse client
    pub fn with_shared_warehouse(mut self, warehouse: Arc<dyn WarehouseClient>) -> Self {
        self.warehouse = Some(warehouse);
        self
    }

    /// Set engine configuration
    pub fn with_engine_config(mut self, config: EngineConfig) -> Self {
        self.engine_config = config;
        self
    }

    /// Set cache configuration
    pub fn with_cache_config(mut self, config: CacheConfig) -> Self {
        self.cache_config = config;
        self
    }

    /// Build the service
    pub fn build(self) -> Result<KpiService> {
        let warehouse = self
            .warehouse
            .ok_or_else(|| Error::Configuration("No warehouse client configured".to_string()))?;

        let store = self
            .cache_store
            .unwrap_or_else(|| Arc::new(InMemoryCacheStore::new()));

        if self.cache_config.namespace.trim().is_empty() {
            return Err(Error::Configuration(
                "Cache namespace must not be empty".to_string(),
            ));
        }

        info!(
            warehouse = warehouse.name(),
            cache = store.backend_name(),
            cache_enabled = self.cache_config.enabled,
            namespace = %self.cache_config.namespace,
            "KPI service initialized"
        );

        Ok(KpiService {
            engine: MetricsEngine::new(warehouse, self.engine_config),
            orchestrator: ComputeOrchestrator::new(store),
            keys: CacheKeyBuilder::new(self.cache_config.namespace.clone()),
            cache_config: self.cache_config,
            metrics: ServiceMetrics::new()?,
        })
    }
}

impl Default for KpiServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Cached KPI sections over a warehouse
pub struct KpiService {
    engine: MetricsEngine,
    orchestrator: ComputeOrchestrator,
    keys: CacheKeyBuilder,
    cache_config: CacheConfig,
    metrics: ServiceMetrics,
}

impl KpiService {
    /// Start building a service
    pub fn builder() -> KpiServiceBuilder {
        KpiServiceBuilder::new()
    }

    /// Inventory overview for `filters`, served from cache when possible.
    ///
    /// Returns [`Error::Cancelled`] if `cancel` fires first; nothing is
    /// cached in that case.
    pub async fn overview(
        &self,
        filters: &FilterSet,
        cancel: &CancellationToken,
    ) -> Result<OverviewMetrics> {
        let timer = self.metrics.start_timer(sections::OVERVIEW);

        let result = if self.cache_config.enabled {
            let key = self.keys.build_key(sections::OVERVIEW, filters);
            self.orchestrator
                .get_or_compute_cancellable(
                    &key,
                    || self.engine.compute_overview(filters),
                    self.cache_config.overview_ttl.secs(),
                    cancel,
                )
                .await
        } else {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = self.engine.compute_overview(filters) => result,
            }
        };

        timer.observe_duration();
        self.metrics.record_request(sections::OVERVIEW, &result);
        result
    }

    /// Delete every cached entry of `section`, returning how many were removed.
    ///
    /// Only keys equal to the section prefix or continuing it with `:` are
    /// removed, so `overview` never matches an `overview_v2` section.
    pub async fn invalidate_section(&self, section: &str) -> Result<usize> {
        let prefix = self.keys.section_prefix(section);
        let scoped = format!("{}:", prefix);

        let store = self.orchestrator.store();
        let keys: Vec<String> = store
            .keys(&self.keys.section_pattern(section))
            .await?
            .into_iter()
            .filter(|k| *k == prefix || k.starts_with(&scoped))
            .collect();

        if keys.is_empty() {
            debug!(section = %section, "No cached entries to invalidate");
            return Ok(0);
        }

        let removed = store.del(&keys).await?;
        info!(section = %section, removed, "Invalidated cache section");
        Ok(removed)
    }

    /// Cache hit/miss/write counters
    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.orchestrator.stats().snapshot()
    }

    /// Request counters and latency histograms
    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    /// Exporter over this service's cache counters and request metrics
    pub fn exporter(&self, config: PrometheusConfig) -> PrometheusExporter {
        PrometheusExporter::new(
            config,
            Arc::clone(self.orchestrator.stats()),
            self.metrics.registry().clone(),
        )
    }

    /// Whether the cache store is currently serving requests
    pub fn cache_ready(&self) -> bool {
        self.orchestrator.store().is_ready()
    }

    /// Cache backend name
    pub fn cache_backend(&self) -> &'static str {
        self.orchestrator.store().backend_name()
    }

    /// Wait for pending background cache writes
    pub async fn shutdown(&self) {
        self.orchestrator.flush().await;
        info!("KPI service shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WarehouseError;
    use crate::filters::{dims, FilterValue, RawFilter};
    use crate::types::EntityPairDaily;
    use crate::warehouse::{InMemoryWarehouse, QueryDescriptor};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Counts queries and delegates to an in-memory warehouse
    struct CountingWarehouse {
        inner: InMemoryWarehouse,
        queries: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl WarehouseClient for CountingWarehouse {
        async fn query(
            &self,
            query: &QueryDescriptor,
        ) -> std::result::Result<Vec<serde_json::Value>, WarehouseError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            self.inner.query(query).await
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    fn fact() -> EntityPairDaily {
        EntityPairDaily {
            product_id: "A".to_string(),
            location_id: "L1".to_string(),
            date: NaiveDate::from_ymd_opt(2026, 1, 7).unwrap(),
            platform: "Amazon".to_string(),
            brand: "Acme".to_string(),
            category: "Home".to_string(),
            inventory: 50.0,
            qty_sold: 70.0,
        }
    }

    fn filters() -> FilterSet {
        let mut raw = HashMap::new();
        raw.insert(dims::PLATFORM.to_string(), RawFilter::from("Amazon"));
        raw.insert(dims::START_DATE.to_string(), RawFilter::from("2026-01-01"));
        raw.insert(dims::END_DATE.to_string(), RawFilter::from("2026-01-07"));
        FilterSet::from_raw(&raw)
    }

    fn service(cache_enabled: bool) -> (KpiService, Arc<AtomicUsize>, Arc<InMemoryCacheStore>) {
        let queries = Arc::new(AtomicUsize::new(0));
        let store = Arc::new(InMemoryCacheStore::new());
        let service = KpiService::builder()
            .with_warehouse(CountingWarehouse {
                inner: InMemoryWarehouse::new(vec![fact()]),
                queries: Arc::clone(&queries),
            })
            .with_shared_cache_store(store.clone())
            .with_cache_config(CacheConfig {
                enabled: cache_enabled,
                ..Default::default()
            })
            .with_engine_config(EngineConfig {
                max_window_days: 36_500,
                ..Default::default()
            })
            .build()
            .unwrap();
        (service, queries, store)
    }

    #[test]
    fn test_build_requires_warehouse() {
        let result = KpiService::builder().build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn test_build_rejects_empty_namespace() {
        let result = KpiService::builder()
            .with_warehouse(InMemoryWarehouse::default())
            .with_cache_config(CacheConfig {
                namespace: "  ".to_string(),
                ..Default::default()
            })
            .build();
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[tokio::test]
    async fn test_overview_is_cached() {
        let (service, queries, store) = service(true);
        let cancel = CancellationToken::new();

        let first = service.overview(&filters(), &cancel).await.unwrap();
        service.shutdown().await;
        let issued = queries.load(Ordering::SeqCst);
        assert_eq!(issued, 3);
        assert_eq!(store.len(), 1);

        let second = service.overview(&filters(), &cancel).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(queries.load(Ordering::SeqCst), issued);

        let stats = service.cache_stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(first.metrics.drr.value, 10.0);
    }

    #[tokio::test]
    async fn test_disabled_cache_always_computes() {
        let (service, queries, store) = service(false);
        let cancel = CancellationToken::new();

        service.overview(&filters(), &cancel).await.unwrap();
        service.overview(&filters(), &cancel).await.unwrap();
        service.shutdown().await;

        assert_eq!(queries.load(Ordering::SeqCst), 6);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_invalidate_section() {
        let (service, queries, store) = service(true);
        let cancel = CancellationToken::new();

        service.overview(&filters(), &cancel).await.unwrap();
        service.shutdown().await;

        // Unrelated keys that share the textual prefix survive
        store
            .set_ex("kpi:overview_v2:amazon", 60, "{}".to_string())
            .await
            .unwrap();

        assert_eq!(service.invalidate_section("Overview").await.unwrap(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(service.invalidate_section("overview").await.unwrap(), 0);

        service.overview(&filters(), &cancel).await.unwrap();
        assert_eq!(queries.load(Ordering::SeqCst), 6);
    }

    #[tokio::test]
    async fn test_cancelled_overview_caches_nothing() {
        let store = Arc::new(InMemoryCacheStore::new());
        let service = KpiService::builder()
            .with_warehouse(
                InMemoryWarehouse::new(vec![fact()]).with_latency(Duration::from_secs(60)),
            )
            .with_shared_cache_store(store.clone())
            .build()
            .unwrap();

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let err = service.overview(&filters(), &cancel).await.unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        service.shutdown().await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_extended_year_is_rejected() {
        let (service, queries, store) = service(true);
        let mut raw = HashMap::new();
        raw.insert(dims::START_DATE.to_string(), RawFilter::from("-200000-01-01"));
        let filters = FilterSet::from_raw(&raw);

        let err = service
            .overview(&filters, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidWindow(_)));

        service.shutdown().await;
        assert_eq!(queries.load(Ordering::SeqCst), 0);
        assert!(store.is_empty());
        assert_eq!(service.metrics().request_count(sections::OVERVIEW, "error"), 1);
    }

    #[tokio::test]
    async fn test_start_only_and_end_only_use_separate_entries() {
        let (service, _queries, store) = service(true);
        let cancel = CancellationToken::new();

        let day = FilterValue::Single("2026-01-07".to_string());
        let from = FilterSet::new().with(dims::START_DATE, day.clone());
        let until = FilterSet::new().with(dims::END_DATE, day);

        let first = service.overview(&from, &cancel).await.unwrap();
        service.shutdown().await;
        let second = service.overview(&until, &cancel).await.unwrap();
        service.shutdown().await;

        assert_eq!(first.date_range.start, NaiveDate::from_ymd_opt(2026, 1, 7).unwrap());
        assert_eq!(second.date_range.start, NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        assert_eq!(service.cache_stats().hits, 0);
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_multi_value_order_shares_cache_entry() {
        let (service, queries, _store) = service(true);
        let cancel = CancellationToken::new();

        let a = filters().with(
            dims::BRAND,
            FilterValue::Multi(vec!["Acme".to_string(), "Zenith".to_string()]),
        );
        let b = filters().with(
            dims::BRAND,
            FilterValue::Multi(vec!["zenith".to_string(), "acme".to_string()]),
        );

        service.overview(&a, &cancel).await.unwrap();
        service.shutdown().await;
        service.overview(&b, &cancel).await.unwrap();

        assert_eq!(queries.load(Ordering::SeqCst), 3);
    }
}
