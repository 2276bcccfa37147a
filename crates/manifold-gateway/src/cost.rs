//! # Cost tracking
//!
//! Token-priced usage records. The price table maps model ids to USD per
//! 1K input/output tokens, exact-match first, then family patterns;
//! unknown models price at zero. Records append in completion order and are
//! evicted by age and count. Budget thresholds fire their callbacks once
//! per crossing, off the tracking path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Datelike, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use manifold_core::messages::Usage;
use manifold_core::{ids, ChatResponse};

/// USD prices per 1K tokens.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelPrice {
    /// Input price per 1K tokens.
    pub input_per_1k: f64,
    /// Output price per 1K tokens.
    pub output_per_1k: f64,
}

const fn price(input_per_1k: f64, output_per_1k: f64) -> ModelPrice {
    ModelPrice { input_per_1k, output_per_1k }
}

/// Exact model pricing.
fn exact_match(model: &str) -> Option<ModelPrice> {
    Some(match model {
        "gpt-4.1" => price(0.002, 0.008),
        "gpt-4.1-mini" => price(0.0004, 0.0016),
        "gpt-4.1-nano" => price(0.0001, 0.0004),
        "gpt-4o" => price(0.0025, 0.01),
        "gpt-4o-mini" => price(0.000_15, 0.0006),
        "o3" => price(0.01, 0.04),
        "o4-mini" => price(0.0011, 0.0044),
        "claude-opus-4-5" => price(0.005, 0.025),
        "claude-sonnet-4-5" => price(0.003, 0.015),
        "claude-haiku-4-5" => price(0.001, 0.005),
        "claude-3-haiku-20240307" => price(0.000_25, 0.001_25),
        "gemini-2.5-pro" => price(0.001_25, 0.005),
        "gemini-2.5-flash" => price(0.000_075, 0.0003),
        "deepseek-chat" => price(0.000_27, 0.0011),
        "command-r-plus" => price(0.0025, 0.01),
        "command-r" => price(0.000_15, 0.0006),
        _ => return None,
    })
}

/// Family-pattern pricing for dated or suffixed variants.
fn pattern_match(model: &str) -> Option<ModelPrice> {
    let m = model.to_lowercase();
    if m.contains("opus-4") {
        return Some(price(0.005, 0.025));
    }
    if m.contains("sonnet-4") || m.contains("sonnet-3-7") {
        return Some(price(0.003, 0.015));
    }
    if m.contains("haiku-4") {
        return Some(price(0.001, 0.005));
    }
    if m.contains("gemini") && m.contains("pro") {
        return Some(price(0.001_25, 0.005));
    }
    if m.contains("gemini") && m.contains("flash") {
        return Some(price(0.000_075, 0.0003));
    }
    if m.starts_with("gpt-4.1-nano") {
        return Some(price(0.0001, 0.0004));
    }
    if m.starts_with("gpt-4.1-mini") {
        return Some(price(0.0004, 0.0016));
    }
    if m.starts_with("gpt-4.1") {
        return Some(price(0.002, 0.008));
    }
    if m.starts_with("o3") {
        return Some(price(0.01, 0.04));
    }
    if m.starts_with("o4") {
        return Some(price(0.0011, 0.0044));
    }
    None
}

/// Look up pricing for a model. Unknown models cost nothing.
pub fn price_for(model: &str) -> ModelPrice {
    exact_match(model)
        .or_else(|| pattern_match(model))
        .unwrap_or(price(0.0, 0.0))
}

/// Compute the USD cost of a usage record under a price.
#[allow(clippy::cast_precision_loss)] // token counts never approach 2^52
pub fn cost_of(usage: &Usage, model_price: &ModelPrice) -> f64 {
    usage.prompt_tokens as f64 / 1000.0 * model_price.input_per_1k
        + usage.completion_tokens as f64 / 1000.0 * model_price.output_per_1k
}

/// One tracked request.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRecord {
    /// Record id (UUID v7).
    pub id: String,
    /// Serving provider.
    pub provider: String,
    /// Serving model.
    pub model: String,
    /// Token usage.
    pub usage: Usage,
    /// USD cost.
    pub cost_usd: f64,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

/// Tracker tuning and budget thresholds.
#[derive(Clone)]
pub struct CostConfig {
    /// Record cap; oldest evicted first.
    pub max_records: usize,
    /// Record lifetime.
    pub retention: Duration,
    /// Warn when month-to-date spend crosses this (USD).
    pub warning_threshold: Option<f64>,
    /// Hard budget (USD).
    pub limit_threshold: Option<f64>,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self {
            max_records: 10_000,
            retention: Duration::from_secs(30 * 24 * 60 * 60),
            warning_threshold: None,
            limit_threshold: None,
        }
    }
}

/// Fired when a budget threshold is crossed; receives month-to-date spend.
pub type BudgetCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// One row of a billing report.
#[derive(Clone, Debug, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BillingRow {
    /// Provider.
    pub provider: String,
    /// Model.
    pub model: String,
    /// UTC date, `YYYY-MM-DD`.
    pub date: String,
    /// Requests in the bucket.
    pub requests: u64,
    /// Total tokens in the bucket.
    pub total_tokens: u64,
    /// USD cost of the bucket.
    pub cost_usd: f64,
}

/// Appends usage records and answers spend queries.
pub struct CostTracker {
    config: CostConfig,
    records: Mutex<Vec<CostRecord>>,
    warning_fired: AtomicBool,
    limit_fired: AtomicBool,
    on_warning: Mutex<Option<BudgetCallback>>,
    on_limit: Mutex<Option<BudgetCallback>>,
}

impl CostTracker {
    /// Create a tracker.
    pub fn new(config: CostConfig) -> Self {
        Self {
            config,
            records: Mutex::new(Vec::new()),
            warning_fired: AtomicBool::new(false),
            limit_fired: AtomicBool::new(false),
            on_warning: Mutex::new(None),
            on_limit: Mutex::new(None),
        }
    }

    /// Install the warning-threshold callback.
    pub fn on_warning(&self, callback: BudgetCallback) {
        *self.on_warning.lock() = Some(callback);
    }

    /// Install the limit-threshold callback.
    pub fn on_limit(&self, callback: BudgetCallback) {
        *self.on_limit.lock() = Some(callback);
    }

    /// Record a completed response. Returns the appended record.
    pub fn track(&self, response: &ChatResponse, provider: &str) -> CostRecord {
        let usage = response.usage.unwrap_or_default();
        let model_price = price_for(&response.model);
        let record = CostRecord {
            id: ids::new_v7(),
            provider: provider.to_string(),
            model: response.model.clone(),
            usage,
            cost_usd: cost_of(&usage, &model_price),
            timestamp: Utc::now(),
        };

        {
            let mut records = self.records.lock();
            records.push(record.clone());
            self.evict(&mut records);
        }

        self.check_thresholds();
        record
    }

    /// Evict by retention age, then by count, oldest first.
    fn evict(&self, records: &mut Vec<CostRecord>) {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.retention)
                .unwrap_or_else(|_| chrono::Duration::days(30));
        records.retain(|r| r.timestamp > cutoff);

        if records.len() > self.config.max_records {
            let excess = records.len() - self.config.max_records;
            let _ = records.drain(..excess);
        }
    }

    /// Fire budget callbacks once per crossing, without blocking tracking.
    fn check_thresholds(&self) {
        let month_cost = self.current_month_cost();

        if let Some(limit) = self.config.limit_threshold {
            if month_cost >= limit && !self.limit_fired.swap(true, Ordering::SeqCst) {
                Self::fire(self.on_limit.lock().clone(), month_cost);
            }
        }
        if let Some(warning) = self.config.warning_threshold {
            if month_cost >= warning && !self.warning_fired.swap(true, Ordering::SeqCst) {
                Self::fire(self.on_warning.lock().clone(), month_cost);
            }
        }
    }

    fn fire(callback: Option<BudgetCallback>, month_cost: f64) {
        let Some(callback) = callback else { return };
        if tokio::runtime::Handle::try_current().is_ok() {
            let _ = tokio::spawn(async move { callback(month_cost) });
        } else {
            callback(month_cost);
        }
    }

    /// Sum of costs since the start of the current UTC month.
    pub fn current_month_cost(&self) -> f64 {
        let now = Utc::now();
        let month_start = now
            .date_naive()
            .with_day(1)
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default().and_utc())
            .unwrap_or(now);
        self.records
            .lock()
            .iter()
            .filter(|r| r.timestamp >= month_start)
            .map(|r| r.cost_usd)
            .sum()
    }

    /// Billing rows grouped by provider, model, and UTC date.
    pub fn billing(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Vec<BillingRow> {
        let records = self.records.lock();
        let mut buckets: BTreeMap<(String, String, String), (u64, u64, f64)> = BTreeMap::new();

        for record in records.iter().filter(|r| r.timestamp >= start && r.timestamp < end) {
            let key = (
                record.provider.clone(),
                record.model.clone(),
                record.timestamp.format("%Y-%m-%d").to_string(),
            );
            let bucket = buckets.entry(key).or_insert((0, 0, 0.0));
            bucket.0 += 1;
            bucket.1 += record.usage.total_tokens;
            bucket.2 += record.cost_usd;
        }

        buckets
            .into_iter()
            .map(|((provider, model, date), (requests, total_tokens, cost_usd))| BillingRow {
                provider,
                model,
                date,
                requests,
                total_tokens,
                cost_usd,
            })
            .collect()
    }

    /// Number of retained records.
    pub fn record_count(&self) -> usize {
        self.records.lock().len()
    }

    /// All retained records, oldest first.
    pub fn records(&self) -> Vec<CostRecord> {
        self.records.lock().clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
