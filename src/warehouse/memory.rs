//! In-process warehouse over a vector of daily facts

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{PairDailyRow, PairTotalsRow, QueryDescriptor, QueryKind, WarehouseClient};
use crate::error::{Error, Result, WarehouseError};
use crate::filters::{dims, FilterSet};
use crate::types::{EntityPair, EntityPairDaily};

/// Default per-query timeout
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(30);

/// Warehouse that evaluates queries over facts held in memory.
///
/// Backs the server when no external warehouse is wired in, and serves as
/// the fixture warehouse in tests. An artificial latency can be configured
/// to exercise concurrency and timeout paths.
///
/// Scans run on the blocking pool, so the query timeout bounds the scan as
/// well as the latency. A scan that times out keeps its blocking thread
/// until it finishes; only its result is dropped.
pub struct InMemoryWarehouse {
    facts: Arc<RwLock<Vec<EntityPairDaily>>>,
    latency: Duration,
    timeout: Duration,
    queries_served: AtomicU64,
}

impl InMemoryWarehouse {
    /// Create a warehouse over `facts`
    pub fn new(facts: Vec<EntityPairDaily>) -> Self {
        Self {
            facts: Arc::new(RwLock::new(facts)),
            latency: Duration::ZERO,
            timeout: DEFAULT_QUERY_TIMEOUT,
            queries_served: AtomicU64::new(0),
        }
    }

    /// Load facts from a JSON-lines file, one [`EntityPairDaily`] per line
    pub async fn from_json_lines(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await?;

        let mut facts = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let fact: EntityPairDaily = serde_json::from_str(line).map_err(|e| {
                Error::Serialization(format!("{}:{}: {}", path.display(), line_num + 1, e))
            })?;
            facts.push(fact);
        }

        info!(path = %path.display(), facts = facts.len(), "Loaded warehouse facts");
        Ok(Self::new(facts))
    }

    /// Delay every query by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail queries that run longer than `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Append facts
    pub fn append(&self, facts: impl IntoIterator<Item = EntityPairDaily>) {
        self.facts.write().extend(facts);
    }

    /// Number of facts held
    pub fn len(&self) -> usize {
        self.facts.read().len()
    }

    /// Check if no facts are held
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of queries answered so far
    pub fn queries_served(&self) -> u64 {
        self.queries_served.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryWarehouse {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

fn evaluate(
    facts: &RwLock<Vec<EntityPairDaily>>,
    query: &QueryDescriptor,
) -> std::result::Result<Vec<serde_json::Value>, WarehouseError> {
    let facts = facts.read();
    let matched = facts
        .iter()
        .filter(|f| query.window.contains(f.date) && fact_matches(f, &query.filters));

    let rows = match query.kind {
        QueryKind::PairTotals => {
            // pair -> (latest date, inventory at latest date, units sold)
            let mut groups: BTreeMap<EntityPair, (NaiveDate, f64, f64)> = BTreeMap::new();
            for fact in matched {
                let entry = groups
                    .entry(fact.pair())
                    .or_insert((fact.date, fact.inventory, 0.0));
                if fact.date > entry.0 {
                    entry.0 = fact.date;
                    entry.1 = fact.inventory;
                }
                entry.2 += fact.qty_sold;
            }

            groups
                .into_iter()
                .map(|(pair, (_, latest_inventory, units_sold))| {
                    serde_json::to_value(PairTotalsRow {
                        product_id: pair.product_id,
                        location_id: pair.location_id,
                        latest_inventory,
                        units_sold,
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
        }
        QueryKind::PairDaily => {
            // (pair, date) -> (inventory, units sold)
            let mut groups: BTreeMap<(EntityPair, NaiveDate), (f64, f64)> = BTreeMap::new();
            for fact in matched {
                let entry = groups
                    .entry((fact.pair(), fact.date))
                    .or_insert((fact.inventory, 0.0));
                entry.1 += fact.qty_sold;
            }

            groups
                .into_iter()
                .map(|((pair, date), (inventory, units_sold))| {
                    serde_json::to_value(PairDailyRow {
                        product_id: pair.product_id,
                        location_id: pair.location_id,
                        date,
                        inventory,
                        units_sold,
                    })
                })
                .collect::<std::result::Result<Vec<_>, _>>()
        }
    };

    rows.map_err(|e| WarehouseError::Query(e.to_string()))
}

fn fact_matches(fact: &EntityPairDaily, filters: &FilterSet) -> bool {
    filters.get(dims::PLATFORM).matches(&fact.platform)
        && filters.get(dims::BRAND).matches(&fact.brand)
        && filters.get(dims::LOCATION).matches(&fact.location_id)
        && filters.get(dims::CATEGORY).matches(&fact.category)
}

#[async_trait]
impl WarehouseClient for InMemoryWarehouse {
    async fn query(&self, query: &QueryDescriptor) -> std::result::Result<Vec<serde_json::Value>, WarehouseError> {
        let facts = Arc::clone(&self.facts);
        let scan_query = query.clone();
        let latency = self.latency;
        let work = async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            tokio::task::spawn_blocking(move || evaluate(&facts, &scan_query))
                .await
                .map_err(|e| WarehouseError::Query(format!("scan task failed: {}", e)))?
        };

        let rows = tokio::time::timeout(self.timeout, work)
            .await
            .map_err(|_| WarehouseError::Timeout(self.timeout.as_millis() as u64))??;

        self.queries_served.fetch_add(1, Ordering::Relaxed);
        debug!(kind = ?query.kind, window = %query.window, rows = rows.len(), "Warehouse query served");
        Ok(rows)
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::FilterValue;
    use crate::types::DateWindow;
    use std::io::Write;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn fact(product: &str, location: &str, day: &str, inventory: f64, sold: f64) -> EntityPairDaily {
        EntityPairDaily {
            product_id: product.to_string(),
            location_id: location.to_string(),
            date: date(day),
            platform: "Amazon".to_string(),
            brand: "Acme".to_string(),
            category: "Home".to_string(),
            inventory,
            qty_sold: sold,
        }
    }

    fn window() -> DateWindow {
        DateWindow::new(date("2026-01-01"), date("2026-01-07"))
    }

    #[tokio::test]
    async fn test_pair_totals_uses_latest_inventory() {
        let warehouse = InMemoryWarehouse::new(vec![
            fact("A", "L1", "2026-01-03", 50.0, 4.0),
            fact("A", "L1", "2026-01-01", 80.0, 6.0),
            fact("A", "L1", "2026-01-05", 30.0, 10.0),
            fact("A", "L1", "2026-01-09", 5.0, 99.0), // outside window
            fact("B", "L1", "2026-01-02", 12.0, 0.0),
        ]);

        let rows = warehouse
            .query(&QueryDescriptor::pair_totals(window(), &FilterSet::new()))
            .await
            .unwrap();
        let rows: Vec<PairTotalsRow> = rows
            .into_iter()
            .map(|r| serde_json::from_value(r).unwrap())
            .collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].product_id, "A");
        assert_eq!(rows[0].latest_inventory, 30.0);
        assert_eq!(rows[0].units_sold, 20.0);
        assert_eq!(rows[1].product_id, "B");
        assert_eq!(warehouse.queries_served(), 1);
    }

    #[tokio::test]
    async fn test_pair_daily_rows() {
        let warehouse = InMemoryWarehouse::new(vec![
            fact("A", "L1", "2026-01-02", 40.0, 2.0),
            fact("A", "L1", "2026-01-01", 42.0, 3.0),
            fact("A", "L2", "2026-01-01", 10.0, 1.0),
        ]);

        let rows = warehouse
            .query(&QueryDescriptor::pair_daily(window(), &FilterSet::new()))
            .await
            .unwrap();
        let rows: Vec<PairDailyRow> = rows
            .into_iter()
            .map(|r| serde_json::from_value(r).unwrap())
            .collect();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].date, date("2026-01-01"));
        assert_eq!(rows[0].location_id, "L1");
        assert_eq!(rows[1].date, date("2026-01-02"));
    }

    #[tokio::test]
    async fn test_filters_restrict_facts() {
        let mut other = fact("C", "L9", "2026-01-02", 7.0, 1.0);
        other.platform = "Shopify".to_string();
        let warehouse = InMemoryWarehouse::new(vec![fact("A", "L1", "2026-01-02", 1.0, 1.0), other]);

        let filters =
            FilterSet::new().with(dims::PLATFORM, FilterValue::Single("shopify".to_string()));
        let rows = warehouse
            .query(&QueryDescriptor::pair_totals(window(), &filters))
            .await
            .unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["product_id"], "C");
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_query_times_out() {
        let warehouse = InMemoryWarehouse::default()
            .with_latency(Duration::from_secs(5))
            .with_timeout(Duration::from_secs(1));

        let err = warehouse
            .query(&QueryDescriptor::pair_totals(window(), &FilterSet::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::Timeout(1000)));
        assert_eq!(warehouse.queries_served(), 0);
    }

    #[tokio::test]
    async fn test_timeout_bounds_the_scan() {
        let facts: Vec<EntityPairDaily> = (0..200_000)
            .map(|i| fact(&format!("SKU-{}", i), "L1", "2026-01-03", 10.0, 1.0))
            .collect();
        let warehouse = InMemoryWarehouse::new(facts).with_timeout(Duration::ZERO);

        let err = warehouse
            .query(&QueryDescriptor::pair_totals(window(), &FilterSet::new()))
            .await
            .unwrap_err();
        assert!(matches!(err, WarehouseError::Timeout(0)));
        assert_eq!(warehouse.queries_served(), 0);
    }

    #[tokio::test]
    async fn test_load_json_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"product_id":"A","location_id":"L1","date":"2026-01-01","platform":"Amazon","inventory":10,"qty_sold":2}}"#
        )
        .unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"product_id":"B","location_id":"L1","date":"2026-01-02","inventory":5,"qty_sold":1}}"#
        )
        .unwrap();

        let warehouse = InMemoryWarehouse::from_json_lines(file.path()).await.unwrap();
        assert_eq!(warehouse.len(), 2);
    }

    #[tokio::test]
    async fn test_load_json_lines_reports_bad_line() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{{broken").unwrap();

        let err = InMemoryWarehouse::from_json_lines(file.path())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Serialization(msg) if msg.contains(":1:")));
    }
}
