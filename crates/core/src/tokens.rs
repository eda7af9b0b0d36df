//! Token cost accounting: operation pricing, estimates, balance checks, and
//! usage analytics.
//!
//! All arithmetic is exact over integers. Rates are expressed in hundredths
//! of a token so that `0.01` per input token and `0.03` per output token never
//! pass through floating point before the final floor.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Input tokens per word, scaled by 10 (1.3 tokens per word).
const INPUT_TOKENS_PER_WORD_X10: i64 = 13;

/// Cost per input token in hundredths of a token.
const INPUT_RATE_HUNDREDTHS: i64 = 1;

/// Cost per output token in hundredths of a token.
const OUTPUT_RATE_HUNDREDTHS: i64 = 3;

/// Default expected output is this many times the operation's base cost.
const DEFAULT_OUTPUT_FACTOR: i64 = 10;

/// Largest `expected_output_tokens` a client may ask to be quoted.
pub const MAX_EXPECTED_OUTPUT_TOKENS: i64 = 1_000_000;

/// A multiplier of 1.0 expressed in basis points.
pub const MULTIPLIER_ONE_BP: i64 = 10_000;

/// Remaining balance below which analytics recommend buying tokens.
pub const LOW_BALANCE_THRESHOLD: i64 = 100;

/// Average daily usage above which analytics recommend a bigger plan.
pub const HEAVY_DAILY_USAGE: f64 = 100.0;

/// Default analytics window in days.
pub const DEFAULT_ANALYTICS_DAYS: i64 = 30;

/// Largest analytics window accepted from clients.
pub const MAX_ANALYTICS_DAYS: i64 = 365;

// ---------------------------------------------------------------------------
// Operation types
// ---------------------------------------------------------------------------

/// Every billable operation and its base cost in tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationType {
    AnalyzeIdea,
    CreateProjectFromIdea,
    AnalyzeStructure,
    SuggestScenes,
    GenerateStory,
    AiCritics,
    CreateScene,
    DialogCritique,
    PacingCritique,
    GenreExpert,
    PlotHoleDetection,
    CharacterArcAnalysis,
    ConflictEscalation,
    CollaborationSync,
    RealTimeSuggestion,
}

impl OperationType {
    pub const ALL: [OperationType; 15] = [
        Self::AnalyzeIdea,
        Self::CreateProjectFromIdea,
        Self::AnalyzeStructure,
        Self::SuggestScenes,
        Self::GenerateStory,
        Self::AiCritics,
        Self::CreateScene,
        Self::DialogCritique,
        Self::PacingCritique,
        Self::GenreExpert,
        Self::PlotHoleDetection,
        Self::CharacterArcAnalysis,
        Self::ConflictEscalation,
        Self::CollaborationSync,
        Self::RealTimeSuggestion,
    ];

    /// Base cost charged regardless of input/output size.
    pub fn base_cost(self) -> i64 {
        match self {
            Self::AnalyzeIdea => 8,
            Self::CreateProjectFromIdea => 12,
            Self::AnalyzeStructure => 15,
            Self::SuggestScenes => 10,
            Self::GenerateStory => 25,
            Self::AiCritics => 20,
            Self::CreateScene => 5,
            Self::DialogCritique => 8,
            Self::PacingCritique => 12,
            Self::GenreExpert => 10,
            Self::PlotHoleDetection => 15,
            Self::CharacterArcAnalysis => 12,
            Self::ConflictEscalation => 8,
            Self::CollaborationSync => 2,
            Self::RealTimeSuggestion => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::AnalyzeIdea => "analyze_idea",
            Self::CreateProjectFromIdea => "create_project_from_idea",
            Self::AnalyzeStructure => "analyze_structure",
            Self::SuggestScenes => "suggest_scenes",
            Self::GenerateStory => "generate_story",
            Self::AiCritics => "ai_critics",
            Self::CreateScene => "create_scene",
            Self::DialogCritique => "dialog_critique",
            Self::PacingCritique => "pacing_critique",
            Self::GenreExpert => "genre_expert",
            Self::PlotHoleDetection => "plot_hole_detection",
            Self::CharacterArcAnalysis => "character_arc_analysis",
            Self::ConflictEscalation => "conflict_escalation",
            Self::CollaborationSync => "collaboration_sync",
            Self::RealTimeSuggestion => "real_time_suggestion",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OperationType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| CoreError::Validation(format!("Unknown operation type '{s}'")))
    }
}

// ---------------------------------------------------------------------------
// Estimation
// ---------------------------------------------------------------------------

/// Number of whitespace-separated words in `text`.
pub fn word_count(text: &str) -> i64 {
    text.split_whitespace().count() as i64
}

/// Approximate the LLM input tokens for `text` (1.3 tokens per word, floored).
pub fn estimate_input_tokens(text: &str) -> i64 {
    word_count(text) * INPUT_TOKENS_PER_WORD_X10 / 10
}

/// Per-component view of an estimate, in (fractional) tokens.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostBreakdown {
    pub base_operation: i64,
    pub input_tokens: f64,
    pub output_tokens: f64,
}

/// Quote for a single operation before it runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CostEstimate {
    pub operation_type: OperationType,
    pub base_cost: i64,
    pub estimated_input_tokens: i64,
    pub estimated_output_tokens: i64,
    pub estimated_total_cost: i64,
    pub breakdown: CostBreakdown,
}

/// Estimate the cost of running `op` on `input_text`.
///
/// `expected_output_tokens` defaults to ten times the base cost; negative
/// values count as zero. The total uses the unrounded 1.3 tokens/word so
/// that `base + 0.013 * words + 0.03 * output` is floored exactly once, and
/// saturates at `i64::MAX` instead of overflowing.
pub fn estimate(
    op: OperationType,
    input_text: &str,
    expected_output_tokens: Option<i64>,
) -> CostEstimate {
    let base = op.base_cost();
    let words = word_count(input_text);
    let output = expected_output_tokens
        .unwrap_or(base * DEFAULT_OUTPUT_FACTOR)
        .max(0);

    // Thousandths of a token: 13/1000 per word, 30/1000 per output token.
    let input_thousandths = i128::from(words) * i128::from(INPUT_TOKENS_PER_WORD_X10);
    let output_thousandths = i128::from(output) * i128::from(OUTPUT_RATE_HUNDREDTHS * 10);
    let total = i128::from(base) + (input_thousandths + output_thousandths) / 1000;

    CostEstimate {
        operation_type: op,
        base_cost: base,
        estimated_input_tokens: saturate(input_thousandths / 10),
        estimated_output_tokens: output,
        estimated_total_cost: saturate(total),
        breakdown: CostBreakdown {
            base_operation: base,
            input_tokens: input_thousandths as f64 / 1000.0,
            output_tokens: output_thousandths as f64 / 1000.0,
        },
    }
}

fn saturate(tokens: i128) -> i64 {
    i64::try_from(tokens).unwrap_or(i64::MAX)
}

/// Actual cost of an operation given measured token counts.
///
/// `multiplier_bp` is in basis points (`10_000` = 1.0).
pub fn operation_cost(
    op: OperationType,
    input_tokens: i64,
    output_tokens: i64,
    multiplier_bp: i64,
) -> i64 {
    let hundredths = i128::from(op.base_cost()) * 100
        + i128::from(input_tokens.max(0)) * i128::from(INPUT_RATE_HUNDREDTHS)
        + i128::from(output_tokens.max(0)) * i128::from(OUTPUT_RATE_HUNDREDTHS);
    let scaled =
        hundredths * i128::from(multiplier_bp.max(0)) / (100 * i128::from(MULTIPLIER_ONE_BP));
    saturate(scaled)
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Outcome of comparing a user's balance against a required amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceCheck {
    pub allowed: bool,
    pub required: i64,
    pub remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_after: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deficit: Option<i64>,
    /// Share of the limit in use once the operation is charged; for a
    /// refused check, the share in use now.
    pub percentage_used: f64,
}

fn percentage(used: i64, limit: i64) -> f64 {
    if limit > 0 {
        (used as f64 / limit as f64 * 10_000.0).round() / 100.0
    } else {
        100.0
    }
}

/// Check whether `required` tokens fit within `limit - used`.
pub fn check_balance(limit: i64, used: i64, required: i64) -> BalanceCheck {
    let remaining = limit - used;

    if remaining >= required {
        BalanceCheck {
            allowed: true,
            required,
            remaining,
            remaining_after: Some(remaining - required),
            deficit: None,
            percentage_used: percentage(used.saturating_add(required), limit),
        }
    } else {
        BalanceCheck {
            allowed: false,
            required,
            remaining,
            remaining_after: None,
            deficit: Some(required - remaining),
            percentage_used: percentage(used, limit),
        }
    }
}

impl BalanceCheck {
    /// Convert a denied check into the matching domain error.
    pub fn into_result(self) -> Result<BalanceCheck, CoreError> {
        if self.allowed {
            Ok(self)
        } else {
            Err(CoreError::InsufficientTokens {
                required: self.required,
                remaining: self.remaining,
                deficit: self.deficit.unwrap_or(self.required - self.remaining),
            })
        }
    }
}

// ---------------------------------------------------------------------------
// Usage analytics
// ---------------------------------------------------------------------------

/// One charged operation, as read back from the usage log.
#[derive(Debug, Clone)]
pub struct UsageRecord {
    pub operation_type: String,
    pub total_cost: i64,
    pub created_at: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OperationStats {
    pub count: i64,
    pub tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct UsageAnalytics {
    pub period_days: i64,
    pub tokens_limit: i64,
    pub tokens_used_lifetime: i64,
    pub used_in_period: i64,
    pub remaining: i64,
    pub operations_by_type: BTreeMap<String, OperationStats>,
    /// Keyed by ISO date (`YYYY-MM-DD`).
    pub daily_usage: BTreeMap<String, i64>,
    pub most_used_operation: Option<String>,
    pub average_daily_usage: f64,
    pub recommendations: Vec<String>,
}

/// Aggregate usage log rows from the last `days` days.
///
/// `records` must already be filtered to the window; the average divides by
/// the number of active days, capped at `days`.
pub fn summarize_usage(
    records: &[UsageRecord],
    days: i64,
    tokens_limit: i64,
    tokens_used: i64,
) -> UsageAnalytics {
    let mut operations_by_type: BTreeMap<String, OperationStats> = BTreeMap::new();
    let mut daily_usage: BTreeMap<String, i64> = BTreeMap::new();
    let mut used_in_period = 0;

    for record in records {
        used_in_period += record.total_cost;

        let stats = operations_by_type
            .entry(record.operation_type.clone())
            .or_default();
        stats.count += 1;
        stats.tokens += record.total_cost;

        let day = record.created_at.date_naive().to_string();
        *daily_usage.entry(day).or_insert(0) += record.total_cost;
    }

    // Ties resolve to the alphabetically first operation.
    let most_used_operation = operations_by_type
        .iter()
        .fold(None::<(&String, i64)>, |best, (name, stats)| match best {
            Some((_, tokens)) if tokens >= stats.tokens => best,
            _ => Some((name, stats.tokens)),
        })
        .map(|(name, _)| name.clone());

    let active_days = (daily_usage.len() as i64).min(days.max(1));
    let average_daily_usage = if active_days > 0 {
        used_in_period as f64 / active_days as f64
    } else {
        0.0
    };

    let remaining = tokens_limit - tokens_used;
    let recommendations =
        usage_recommendations(remaining, most_used_operation.as_deref(), average_daily_usage);

    UsageAnalytics {
        period_days: days,
        tokens_limit,
        tokens_used_lifetime: tokens_used,
        used_in_period,
        remaining,
        operations_by_type,
        daily_usage,
        most_used_operation,
        average_daily_usage,
        recommendations,
    }
}

/// Human-readable hints derived from a usage summary.
pub fn usage_recommendations(
    remaining: i64,
    most_used_operation: Option<&str>,
    average_daily_usage: f64,
) -> Vec<String> {
    let mut out = Vec::new();
    if remaining < LOW_BALANCE_THRESHOLD {
        out.push(
            "Your tokens are running low. Consider buying a token pack or upgrading your plan."
                .to_string(),
        );
    }
    if let Some(op) = most_used_operation {
        out.push(format!(
            "'{op}' is your most token-intensive feature. Consider batching those requests."
        ));
    }
    if average_daily_usage > HEAVY_DAILY_USAGE {
        out.push("High daily usage. A larger plan would give better value.".to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    fn words(n: usize) -> String {
        vec!["word"; n].join(" ")
    }

    #[test]
    fn base_costs_match_price_list() {
        assert_eq!(OperationType::AnalyzeIdea.base_cost(), 8);
        assert_eq!(OperationType::GenerateStory.base_cost(), 25);
        assert_eq!(OperationType::CollaborationSync.base_cost(), 2);
        assert_eq!(OperationType::RealTimeSuggestion.base_cost(), 3);
    }

    #[test]
    fn operation_names_round_trip_through_from_str() {
        for op in OperationType::ALL {
            assert_eq!(op.as_str().parse::<OperationType>().unwrap(), op);
        }
        assert_matches!(
            "teleport".parse::<OperationType>(),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn serde_name_matches_as_str() {
        let json = serde_json::to_string(&OperationType::PlotHoleDetection).unwrap();
        assert_eq!(json, "\"plot_hole_detection\"");
    }

    #[test]
    fn input_tokens_are_floored() {
        assert_eq!(estimate_input_tokens(""), 0);
        assert_eq!(estimate_input_tokens("one"), 1);
        assert_eq!(estimate_input_tokens(&words(10)), 13);
        assert_eq!(estimate_input_tokens(&words(100)), 130);
    }

    #[test]
    fn generate_story_estimate_floors_to_56() {
        let est = estimate(OperationType::GenerateStory, &words(100), Some(1000));
        assert_eq!(est.base_cost, 25);
        assert_eq!(est.estimated_input_tokens, 130);
        assert_eq!(est.estimated_output_tokens, 1000);
        assert_eq!(est.estimated_total_cost, 56);
    }

    #[test]
    fn default_output_is_ten_times_base() {
        let est = estimate(OperationType::AnalyzeIdea, "", None);
        assert_eq!(est.estimated_output_tokens, 80);
        // 8 + 80 * 0.03 = 10.4
        assert_eq!(est.estimated_total_cost, 10);
    }

    #[test]
    fn estimate_never_below_base_cost() {
        for op in OperationType::ALL {
            for n in [0, 1, 7, 50, 999] {
                let est = estimate(op, &words(n), Some(0));
                assert!(est.estimated_total_cost >= op.base_cost());
                let est = estimate(op, &words(n), None);
                assert!(est.estimated_total_cost >= op.base_cost());
            }
        }
    }

    #[test]
    fn huge_expected_output_saturates_instead_of_overflowing() {
        let est = estimate(OperationType::AnalyzeIdea, "", Some(i64::MAX));
        assert_eq!(est.estimated_output_tokens, i64::MAX);
        assert_eq!(
            est.estimated_total_cost,
            8 + (i128::from(i64::MAX) * 30 / 1000) as i64
        );
        assert!(est.estimated_total_cost >= est.base_cost);
        assert!(est.breakdown.output_tokens > 0.0);
    }

    #[test]
    fn negative_expected_output_counts_as_zero() {
        let est = estimate(OperationType::AnalyzeIdea, "", Some(i64::MIN));
        assert_eq!(est.estimated_output_tokens, 0);
        assert_eq!(est.estimated_total_cost, 8);
    }

    #[test]
    fn operation_cost_applies_rates_and_multiplier() {
        // 25 + 130 * 0.01 + 1000 * 0.03 = 56.3
        assert_eq!(
            operation_cost(OperationType::GenerateStory, 130, 1000, MULTIPLIER_ONE_BP),
            56
        );
        // 56.3 * 1.5 = 84.45
        assert_eq!(
            operation_cost(OperationType::GenerateStory, 130, 1000, 15_000),
            84
        );
        assert_eq!(operation_cost(OperationType::CreateScene, 0, 0, MULTIPLIER_ONE_BP), 5);
    }

    #[test]
    fn balance_exactly_sufficient_is_allowed() {
        let check = check_balance(1000, 995, 5);
        assert!(check.allowed);
        assert_eq!(check.remaining, 5);
        assert_eq!(check.remaining_after, Some(0));
        assert_eq!(check.deficit, None);
    }

    #[test]
    fn balance_one_short_reports_deficit() {
        let check = check_balance(1000, 995, 6);
        assert!(!check.allowed);
        assert_eq!(check.deficit, Some(1));
        assert_matches!(
            check.into_result(),
            Err(CoreError::InsufficientTokens { required: 6, remaining: 5, deficit: 1 })
        );
    }

    #[test]
    fn percentage_used_is_rounded() {
        let check = check_balance(3000, 999, 1);
        assert_eq!(check.percentage_used, 33.33);
        assert_eq!(check_balance(0, 0, 0).percentage_used, 100.0);
    }

    #[test]
    fn percentage_used_counts_the_pending_charge() {
        assert_eq!(check_balance(1000, 800, 50).percentage_used, 85.0);
        assert_eq!(check_balance(1000, 995, 5).percentage_used, 100.0);
        // Refused: nothing will be charged, so the figure is today's usage.
        assert_eq!(check_balance(1000, 995, 6).percentage_used, 99.5);
    }

    #[test]
    fn summarize_groups_by_type_and_day() {
        let day1 = Utc.with_ymd_and_hms(2026, 3, 1, 10, 0, 0).unwrap();
        let day2 = Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap();
        let records = vec![
            UsageRecord { operation_type: "analyze_idea".into(), total_cost: 10, created_at: day1 },
            UsageRecord { operation_type: "analyze_idea".into(), total_cost: 12, created_at: day1 },
            UsageRecord { operation_type: "generate_story".into(), total_cost: 56, created_at: day2 },
        ];

        let summary = summarize_usage(&records, 30, 1000, 950);

        assert_eq!(summary.used_in_period, 78);
        assert_eq!(summary.remaining, 50);
        assert_eq!(
            summary.operations_by_type["analyze_idea"],
            OperationStats { count: 2, tokens: 22 }
        );
        assert_eq!(summary.daily_usage["2026-03-01"], 22);
        assert_eq!(summary.daily_usage["2026-03-02"], 56);
        assert_eq!(summary.most_used_operation.as_deref(), Some("generate_story"));
        assert_eq!(summary.average_daily_usage, 39.0);
        assert!(summary.recommendations[0].contains("running low"));
    }

    #[test]
    fn summarize_empty_log() {
        let summary = summarize_usage(&[], 30, 1000, 0);
        assert_eq!(summary.used_in_period, 0);
        assert_eq!(summary.most_used_operation, None);
        assert_eq!(summary.average_daily_usage, 0.0);
        assert!(summary.recommendations.is_empty());
    }
}
