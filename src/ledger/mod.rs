//! Append-only usage ledger with per-campaign cost aggregation.
//!
//! Every completed upstream call sequence lands here as a [`UsageRecord`]. Records are
//! never mutated; per-campaign totals are folded incrementally as records arrive and
//! can be recomputed from the raw records with the same result.
//!
//! Author: kelexine (<https://github.com/kelexine>)

use crate::config::PricingConfig;
use crate::metrics;
use crate::selector::ModelTier;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Dollar rates per 1,000 units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TierPrice {
    pub input_per_1k: f64,
    pub output_per_1k: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriceTable {
    pub fast: TierPrice,
    pub capable: TierPrice,
    pub voice_per_1k_chars: f64,
}

impl PriceTable {
    pub fn from_config(config: &PricingConfig) -> Self {
        Self {
            fast: TierPrice {
                input_per_1k: config.fast_input_per_1k,
                output_per_1k: config.fast_output_per_1k,
            },
            capable: TierPrice {
                input_per_1k: config.capable_input_per_1k,
                output_per_1k: config.capable_output_per_1k,
            },
            voice_per_1k_chars: config.voice_per_1k_chars,
        }
    }

    pub fn tier(&self, tier: ModelTier) -> TierPrice {
        match tier {
            ModelTier::Fast => self.fast,
            ModelTier::Capable => self.capable,
        }
    }

    pub fn text_cost(&self, tier: ModelTier, input_tokens: u64, output_tokens: u64) -> f64 {
        let price = self.tier(tier);
        (input_tokens as f64 / 1000.0) * price.input_per_1k
            + (output_tokens as f64 / 1000.0) * price.output_per_1k
    }

    pub fn voice_cost(&self, characters: u64) -> f64 {
        (characters as f64 / 1000.0) * self.voice_per_1k_chars
    }
}

impl Default for PriceTable {
    fn default() -> Self {
        Self::from_config(&PricingConfig::default())
    }
}

/// Which upstream the record bills for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UsageKind {
    Text { tier: ModelTier },
    Voice { characters: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutcome {
    Success,
    Failed,
}

/// One completed upstream call sequence. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageRecord {
    pub id: Uuid,
    pub campaign_id: String,
    pub kind: UsageKind,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cost: f64,
    pub outcome: CallOutcome,
    pub attempts: u32,
    pub recorded_at: DateTime<Utc>,
}

impl UsageRecord {
    /// A text generation call that returned tokens, priced from the tier table.
    pub fn text(
        campaign_id: impl Into<String>,
        tier: ModelTier,
        input_tokens: u64,
        output_tokens: u64,
        outcome: CallOutcome,
        attempts: u32,
        prices: &PriceTable,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: campaign_id.into(),
            kind: UsageKind::Text { tier },
            input_tokens,
            output_tokens,
            cost: prices.text_cost(tier, input_tokens, output_tokens),
            outcome,
            attempts,
            recorded_at: Utc::now(),
        }
    }

    /// A voice synthesis call billed by script length.
    pub fn voice(
        campaign_id: impl Into<String>,
        characters: u64,
        outcome: CallOutcome,
        attempts: u32,
        prices: &PriceTable,
    ) -> Self {
        let cost = match outcome {
            CallOutcome::Success => prices.voice_cost(characters),
            CallOutcome::Failed => 0.0,
        };
        Self {
            id: Uuid::new_v4(),
            campaign_id: campaign_id.into(),
            kind: UsageKind::Voice { characters },
            input_tokens: 0,
            output_tokens: 0,
            cost,
            outcome,
            attempts,
            recorded_at: Utc::now(),
        }
    }

    /// A call sequence that failed without billable output.
    pub fn failed(campaign_id: impl Into<String>, kind: UsageKind, attempts: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id: campaign_id.into(),
            kind,
            input_tokens: 0,
            output_tokens: 0,
            cost: 0.0,
            outcome: CallOutcome::Failed,
            attempts,
            recorded_at: Utc::now(),
        }
    }

    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }

    /// True for a text call that produced a usable ad.
    pub fn is_completed_ad(&self) -> bool {
        matches!(self.kind, UsageKind::Text { .. }) && self.outcome == CallOutcome::Success
    }
}

/// Aggregate view of one campaign's usage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UsageSummary {
    pub campaign_id: String,
    pub total_tokens: u64,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub voice_characters: u64,
    pub total_cost: f64,
    pub avg_cost_per_ad: f64,
    pub ad_count: u64,
    pub call_count: u64,
    pub failed_calls: u64,
}

impl UsageSummary {
    fn empty(campaign_id: &str) -> Self {
        Self {
            campaign_id: campaign_id.to_string(),
            ..Default::default()
        }
    }

    /// Fold one more record into the totals.
    fn absorb(&mut self, record: &UsageRecord) {
        self.input_tokens += record.input_tokens;
        self.output_tokens += record.output_tokens;
        self.total_tokens += record.total_tokens();
        if let UsageKind::Voice { characters } = record.kind {
            if record.outcome == CallOutcome::Success {
                self.voice_characters += characters;
            }
        }
        self.total_cost += record.cost;
        self.call_count += 1;
        if record.outcome == CallOutcome::Failed {
            self.failed_calls += 1;
        }
        if record.is_completed_ad() {
            self.ad_count += 1;
        }
        self.avg_cost_per_ad = if self.ad_count == 0 {
            0.0
        } else {
            self.total_cost / self.ad_count as f64
        };
    }
}

#[derive(Default)]
struct LedgerState {
    records: Vec<UsageRecord>,
    totals: HashMap<String, UsageSummary>,
}

/// Thread-safe append-only usage store.
///
/// Appends and the incremental fold happen under one write lock, so a reader never
/// sees a record without its contribution to the totals.
#[derive(Default)]
pub struct CostLedger {
    prices: PriceTable,
    state: RwLock<LedgerState>,
}

impl CostLedger {
    pub fn new(prices: PriceTable) -> Self {
        Self {
            prices,
            state: RwLock::new(LedgerState::default()),
        }
    }

    pub fn prices(&self) -> &PriceTable {
        &self.prices
    }

    /// Append a record.
    pub fn record(&self, record: UsageRecord) {
        match record.kind {
            UsageKind::Text { tier } => {
                metrics::record_tokens(tier.as_str(), record.input_tokens, record.output_tokens);
                metrics::record_cost("text", record.cost);
            }
            UsageKind::Voice { .. } => metrics::record_cost("voice", record.cost),
        }
        debug!(
            "Recording usage for campaign {}: {} tokens, ${:.6} ({:?})",
            record.campaign_id,
            record.total_tokens(),
            record.cost,
            record.outcome
        );

        let mut state = self.state.write();
        state
            .totals
            .entry(record.campaign_id.clone())
            .or_insert_with(|| UsageSummary::empty(&record.campaign_id))
            .absorb(&record);
        state.records.push(record);
    }

    /// Incrementally maintained totals for a campaign.
    pub fn aggregate(&self, campaign_id: &str) -> UsageSummary {
        self.state
            .read()
            .totals
            .get(campaign_id)
            .cloned()
            .unwrap_or_else(|| UsageSummary::empty(campaign_id))
    }

    /// Totals folded from the raw records, ignoring the incremental state.
    pub fn recompute(&self, campaign_id: &str) -> UsageSummary {
        let state = self.state.read();
        state
            .records
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .fold(UsageSummary::empty(campaign_id), |mut summary, record| {
                summary.absorb(record);
                summary
            })
    }

    /// A campaign's records in append order.
    pub fn records(&self, campaign_id: &str) -> Vec<UsageRecord> {
        self.state
            .read()
            .records
            .iter()
            .filter(|r| r.campaign_id == campaign_id)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.state.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn test_aggregate_matches_price_table() {
        let prices = PriceTable::default();
        let ledger = CostLedger::new(prices.clone());

        ledger.record(UsageRecord::text("c1", ModelTier::Fast, 100, 50, CallOutcome::Success, 1, &prices));
        ledger.record(UsageRecord::text("c1", ModelTier::Capable, 200, 80, CallOutcome::Success, 1, &prices));

        let expected = (100.0 / 1000.0) * prices.fast.input_per_1k
            + (50.0 / 1000.0) * prices.fast.output_per_1k
            + (200.0 / 1000.0) * prices.capable.input_per_1k
            + (80.0 / 1000.0) * prices.capable.output_per_1k;

        let summary = ledger.aggregate("c1");
        assert_eq!(summary.total_tokens, 430);
        assert!(approx(summary.total_cost, expected));
        assert_eq!(summary.ad_count, 2);
        assert!(approx(summary.avg_cost_per_ad, expected / 2.0));
        assert_eq!(summary, ledger.recompute("c1"));
    }

    #[test]
    fn test_failed_calls_count_but_not_as_ads() {
        let prices = PriceTable::default();
        let ledger = CostLedger::new(prices.clone());

        ledger.record(UsageRecord::failed("c1", UsageKind::Text { tier: ModelTier::Fast }, 4));
        ledger.record(UsageRecord::text("c1", ModelTier::Fast, 120, 40, CallOutcome::Failed, 1, &prices));

        let summary = ledger.aggregate("c1");
        assert_eq!(summary.call_count, 2);
        assert_eq!(summary.failed_calls, 2);
        assert_eq!(summary.ad_count, 0);
        assert_eq!(summary.avg_cost_per_ad, 0.0);
        assert!(summary.total_cost > 0.0);
    }

    #[test]
    fn test_campaigns_are_isolated() {
        let prices = PriceTable::default();
        let ledger = CostLedger::new(prices.clone());
        ledger.record(UsageRecord::text("a", ModelTier::Fast, 10, 10, CallOutcome::Success, 1, &prices));
        ledger.record(UsageRecord::voice("b", 500, CallOutcome::Success, 1, &prices));

        assert_eq!(ledger.aggregate("a").total_tokens, 20);
        assert_eq!(ledger.aggregate("b").voice_characters, 500);
        assert!(approx(ledger.aggregate("b").total_cost, 0.05));
        assert_eq!(ledger.aggregate("missing"), UsageSummary::empty("missing"));
        assert_eq!(ledger.records("a").len(), 1);
    }

    #[test]
    fn test_concurrent_appends_are_not_lost() {
        let prices = PriceTable::default();
        let ledger = Arc::new(CostLedger::new(prices.clone()));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = ledger.clone();
                let prices = prices.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        ledger.record(UsageRecord::text("c1", ModelTier::Fast, 1, 1, CallOutcome::Success, 1, &prices));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(ledger.len(), 800);
        let summary = ledger.aggregate("c1");
        assert_eq!(summary.total_tokens, 1600);
        assert_eq!(summary, ledger.recompute("c1"));
    }
}
