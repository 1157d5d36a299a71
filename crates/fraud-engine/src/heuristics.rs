//! Per-account threshold heuristics.
//!
//! Merchant and payroll classification run before loop/dispersal detection
//! and exclude known-legitimate high-fan-out accounts from seeding those
//! searches. The shell check runs after them, adding suspicion for short-
//! lived pass-through accounts.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration};
use tracing::info;

use crate::account::{Accounts, PatternTag};
use crate::graph::TransactionGraph;
use crate::EngineConfig;

const MERCHANT_MIN_DEGREE: usize = 15;
const MERCHANT_MIN_COUNTERPARTIES: usize = 2;
const MERCHANT_MIN_SPAN_DAYS: i64 = 15;
const MERCHANT_FLOW_RATIO_MIN: f64 = 0.15;
const MERCHANT_FLOW_RATIO_MAX: f64 = 0.35;
const MERCHANT_MIN_AMOUNT_STDDEV: f64 = 70.0;

const PAYROLL_MIN_RECEIVERS: usize = 5;
const PAYROLL_MIN_MONTHS: usize = 3;
const PAYROLL_MONTH_WINDOW_DAYS: u32 = 7;
const PAYROLL_PAYDAY_DRIFT_DAYS: u32 = 7;

const SHELL_MAX_LIFECYCLE_DAYS: i64 = 3;
const SHELL_MAX_TX_COUNT: u32 = 10;
const SHELL_MAX_BALANCE_RATIO: f64 = 0.1;

/// Tags accounts whose traffic looks like ordinary commerce: sustained
/// activity, many counterparties on both sides, a modest net margin, and
/// widely varying transaction amounts.
pub fn classify_merchants(graph: &TransactionGraph, accounts: &mut Accounts) {
    let mut tagged = 0usize;
    for &node in graph.nodes_in_order() {
        let id = graph.id_of(node);
        let Some(profile) = accounts.get(id) else {
            continue;
        };

        if graph.degree(node) <= MERCHANT_MIN_DEGREE
            || profile.unique_senders.len() <= MERCHANT_MIN_COUNTERPARTIES
            || profile.unique_receivers.len() <= MERCHANT_MIN_COUNTERPARTIES
        {
            continue;
        }
        let (Some(first), Some(last)) = (profile.first_seen, profile.last_seen) else {
            continue;
        };
        if last - first < Duration::days(MERCHANT_MIN_SPAN_DAYS) {
            continue;
        }

        let turnover = profile.total_sent + profile.total_received;
        if turnover <= 0.0 {
            continue;
        }
        let flow_ratio = (profile.total_sent - profile.total_received) / turnover;
        if !(MERCHANT_FLOW_RATIO_MIN..=MERCHANT_FLOW_RATIO_MAX).contains(&flow_ratio) {
            continue;
        }
        if std_deviation(&graph.touching_amounts(node)) < MERCHANT_MIN_AMOUNT_STDDEV {
            continue;
        }

        if let Some(profile) = accounts.get_mut(id) {
            profile.reclassify(PatternTag::Merchant);
            tagged += 1;
        }
    }
    info!(merchants = tagged, "merchant classification complete");
}

/// Tags accounts that pay a stable group of receivers on a consistent
/// monthly schedule.
pub fn classify_payroll(graph: &TransactionGraph, accounts: &mut Accounts) {
    let mut tagged = 0usize;
    for &node in graph.nodes_in_order() {
        let id = graph.id_of(node);
        let Some(profile) = accounts.get(id) else {
            continue;
        };
        if profile.has_tag(PatternTag::Merchant)
            || profile.unique_receivers.len() <= PAYROLL_MIN_RECEIVERS
        {
            continue;
        }
        let outgoing = graph.outgoing_sorted(node);
        if outgoing.is_empty() {
            continue;
        }

        // Group payment days by calendar month.
        let mut days_by_month: BTreeMap<(i32, u32), Vec<u32>> = BTreeMap::new();
        for (_, edge) in &outgoing {
            let date = edge.timestamp.date();
            days_by_month
                .entry((date.year(), date.month()))
                .or_default()
                .push(date.day());
        }
        if days_by_month.len() < PAYROLL_MIN_MONTHS {
            continue;
        }

        let mut is_payroll = true;
        let mut anchor_payday: Option<u32> = None;
        for days in days_by_month.values() {
            let min_day = *days.iter().min().unwrap_or(&0);
            let max_day = *days.iter().max().unwrap_or(&0);
            if max_day - min_day > PAYROLL_MONTH_WINDOW_DAYS - 1 {
                is_payroll = false;
                break;
            }
            match anchor_payday {
                None => anchor_payday = Some(min_day),
                Some(anchor) => {
                    if min_day.abs_diff(anchor) > PAYROLL_PAYDAY_DRIFT_DAYS {
                        is_payroll = false;
                        break;
                    }
                }
            }
        }

        if is_payroll {
            if let Some(profile) = accounts.get_mut(id) {
                profile.reclassify(PatternTag::Payroll);
                tagged += 1;
            }
        }
    }
    info!(payroll = tagged, "payroll classification complete");
}

/// Flags short-lived pass-through accounts: a brief lifecycle, few
/// transactions, and outflow closely matching inflow.
pub fn detect_shells(accounts: &mut Accounts, config: &EngineConfig) {
    let mut tagged = 0usize;
    for profile in accounts.iter_mut() {
        let (Some(first), Some(last)) = (profile.first_seen, profile.last_seen) else {
            continue;
        };
        let short_lifecycle = last - first < Duration::days(SHELL_MAX_LIFECYCLE_DAYS);
        let few_transactions = profile.tx_count < SHELL_MAX_TX_COUNT;
        let balanced_flow = profile.total_received > 0.0
            && (profile.total_sent - profile.total_received).abs() / profile.total_received
                < SHELL_MAX_BALANCE_RATIO;

        if short_lifecycle && few_transactions && balanced_flow {
            profile.add_score(config.shell_score_bonus);
            profile.add_tag(PatternTag::Shell);
            tagged += 1;
        }
    }
    info!(shells = tagged, "shell detection complete");
}

fn std_deviation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}
