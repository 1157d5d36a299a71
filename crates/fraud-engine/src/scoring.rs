//! Account-level score adjustments and network risk evaluation.

use std::collections::BTreeSet;

use tracing::info;

use crate::account::Accounts;
use crate::network::{NetworkProfile, RiskLevel};

const MULTI_PATTERN_BONUS: f64 = 25.0;
const HIGH_VOLUME_BONUS: f64 = 30.0;
const HIGH_VOLUME_THRESHOLD: f64 = 100_000.0;

const RISK_AVG_WEIGHT: f64 = 0.5;
const RISK_DIVERSITY_WEIGHT: f64 = 10.0;
const RISK_VOLUME_DIVISOR: f64 = 10_000.0;
const RISK_VOLUME_CAP: f64 = 20.0;
const RISK_SHELL_WEIGHT: f64 = 10.0;

/// Applies cross-pattern bonuses after all detectors have run.
#[derive(Debug, Default)]
pub struct AccountScorer;

impl AccountScorer {
    pub fn apply(&self, accounts: &mut Accounts) {
        let mut bumped = 0usize;
        for profile in accounts.iter_mut() {
            let ring_tags = profile
                .tags()
                .iter()
                .filter(|tag| tag.is_ring_type())
                .collect::<BTreeSet<_>>();
            if ring_tags.len() >= 2 {
                profile.add_score(MULTI_PATTERN_BONUS);
                bumped += 1;
            }
            if profile.total_sent > HIGH_VOLUME_THRESHOLD {
                profile.add_score(HIGH_VOLUME_BONUS);
            }
        }
        info!(multi_pattern = bumped, "account score adjustments applied");
    }
}

/// Rolls member-level suspicion up into a per-network risk score and level.
#[derive(Debug, Default)]
pub struct RiskEngine;

impl RiskEngine {
    pub fn evaluate(&self, networks: &mut [NetworkProfile], accounts: &Accounts) {
        for network in networks.iter_mut() {
            let mut score_sum = 0.0;
            let mut volume = 0.0;
            let mut shell_count = 0usize;
            let mut tag_names = BTreeSet::new();

            for member in &network.members {
                let Some(profile) = accounts.get(member) else {
                    continue;
                };
                score_sum += profile.suspicion;
                volume += profile.total_sent + profile.total_received;
                if profile.has_tag(crate::account::PatternTag::Shell) {
                    shell_count += 1;
                }
                for tag in profile.tags() {
                    tag_names.insert(tag.as_str().to_owned());
                }
            }

            let avg = if network.members.is_empty() {
                0.0
            } else {
                score_sum / network.members.len() as f64
            };
            let volume_score = (volume / RISK_VOLUME_DIVISOR).min(RISK_VOLUME_CAP);
            let risk = avg * RISK_AVG_WEIGHT
                + tag_names.len() as f64 * RISK_DIVERSITY_WEIGHT
                + volume_score
                + shell_count as f64 * RISK_SHELL_WEIGHT;

            network.avg_suspicious_score = avg;
            network.total_amount_moved = volume;
            network.pattern_types_present = tag_names.into_iter().collect();
            network.risk_score = risk;
            network.risk_level = Self::level(risk);
        }
        info!(networks = networks.len(), "network risk evaluation complete");
    }

    fn level(risk: f64) -> RiskLevel {
        if risk > 80.0 {
            RiskLevel::Critical
        } else if risk > 60.0 {
            RiskLevel::High
        } else if risk > 30.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::PatternTag;
    use crate::network::{NetworkAssembler, RingDetail};

    fn accounts_with(profiles: &[(&str, f64, f64, &[PatternTag])]) -> Accounts {
        let mut accounts = Accounts::default();
        for &(id, score, sent, tags) in profiles {
            let profile = accounts.get_or_create(id);
            profile.add_score(score);
            profile.total_sent = sent;
            for &tag in tags {
                profile.add_tag(tag);
            }
        }
        accounts
    }

    fn network_of(members: &[&str], accounts: &Accounts) -> NetworkProfile {
        let mut assembler = NetworkAssembler::default();
        let mut accounts = accounts.clone();
        assembler.materialize(
            RingDetail {
                ring_id: "LOOP_1".to_owned(),
                members: members.iter().map(|m| (*m).to_owned()).collect(),
                nodes_by_distance: vec![members.iter().map(|m| (*m).to_owned()).collect()],
            },
            &mut accounts,
        );
        assembler.into_networks().remove(0)
    }

    #[test]
    fn multi_pattern_accounts_get_a_bonus() {
        let mut accounts = accounts_with(&[
            ("A", 80.0, 0.0, &[PatternTag::Loop, PatternTag::Shell]),
            ("B", 80.0, 0.0, &[PatternTag::Loop]),
        ]);
        AccountScorer.apply(&mut accounts);
        assert_eq!(accounts.get("A").unwrap().suspicion, 105.0);
        assert_eq!(accounts.get("B").unwrap().suspicion, 80.0);
    }

    #[test]
    fn payroll_and_merchant_tags_do_not_count_as_patterns() {
        let mut accounts = accounts_with(&[(
            "A",
            0.0,
            0.0,
            &[PatternTag::Payroll, PatternTag::Merchant],
        )]);
        AccountScorer.apply(&mut accounts);
        assert_eq!(accounts.get("A").unwrap().suspicion, 0.0);
    }

    #[test]
    fn high_volume_senders_get_a_bonus() {
        let mut accounts = accounts_with(&[
            ("A", 40.0, 150_000.0, &[]),
            ("B", 40.0, 100_000.0, &[]),
        ]);
        AccountScorer.apply(&mut accounts);
        assert_eq!(accounts.get("A").unwrap().suspicion, 70.0);
        assert_eq!(accounts.get("B").unwrap().suspicion, 40.0);
    }

    #[test]
    fn risk_score_combines_all_components() {
        let mut accounts = accounts_with(&[
            ("A", 80.0, 0.0, &[PatternTag::Loop]),
            ("B", 120.0, 0.0, &[PatternTag::Shell]),
        ]);
        accounts.get_mut("A").unwrap().total_sent = 30_000.0;
        accounts.get_mut("B").unwrap().total_received = 500_000.0;

        let mut networks = vec![network_of(&["A", "B"], &accounts)];
        RiskEngine.evaluate(&mut networks, &accounts);

        let net = &networks[0];
        // avg 100 * 0.5 + 2 tags * 10 + capped volume 20 + 1 shell * 10
        assert_eq!(net.avg_suspicious_score, 100.0);
        assert_eq!(net.total_amount_moved, 530_000.0);
        assert_eq!(net.risk_score, 100.0);
        assert_eq!(net.risk_level, RiskLevel::Critical);
        assert_eq!(
            net.pattern_types_present,
            vec!["ringtype:loop".to_owned(), "ringtype:shell".to_owned()]
        );
    }

    #[test]
    fn risk_levels_band_on_thresholds() {
        assert_eq!(RiskEngine::level(100.0), RiskLevel::Critical);
        assert_eq!(RiskEngine::level(80.0), RiskLevel::High);
        assert_eq!(RiskEngine::level(60.0), RiskLevel::Medium);
        assert_eq!(RiskEngine::level(30.0), RiskLevel::Low);
        assert_eq!(RiskEngine::level(0.0), RiskLevel::Low);
    }
}
