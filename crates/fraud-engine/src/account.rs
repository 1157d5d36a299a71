use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDateTime;

/// Pattern classification attached to an account by a detector.
///
/// The variant order is the fixed classification precedence used when an
/// account carries several tags: known-legitimate classifications dominate,
/// then structural evidence (loop), then lifecycle and dispersal signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternTag {
    Payroll,
    Merchant,
    Loop,
    Shell,
    DispersalFanOut,
    DispersalFanIn,
}

impl PatternTag {
    pub fn as_str(self) -> &'static str {
        match self {
            PatternTag::Payroll => "payroll",
            PatternTag::Merchant => "merchant",
            PatternTag::Loop => "ringtype:loop",
            PatternTag::Shell => "ringtype:shell",
            PatternTag::DispersalFanOut => "ringtype:dispersal_fan_out",
            PatternTag::DispersalFanIn => "ringtype:dispersal_fan_in",
        }
    }

    /// Tags that describe detected fraud structures, as opposed to the
    /// legitimate pre-classifications.
    pub fn is_ring_type(self) -> bool {
        matches!(
            self,
            PatternTag::Loop
                | PatternTag::Shell
                | PatternTag::DispersalFanOut
                | PatternTag::DispersalFanIn
        )
    }
}

/// Aggregate statistics and detection state for a single account.
///
/// Profiles are created lazily the first time an account appears as sender
/// or receiver, mutated once per touching transaction, and never deleted
/// within a run.
#[derive(Debug, Clone)]
pub struct AccountProfile {
    pub account_id: String,
    pub total_sent: f64,
    pub total_received: f64,
    pub unique_senders: BTreeSet<String>,
    pub unique_receivers: BTreeSet<String>,
    pub first_seen: Option<NaiveDateTime>,
    pub last_seen: Option<NaiveDateTime>,
    pub tx_count: u32,
    pub suspicion: f64,
    tags: Vec<PatternTag>,
    pub network_id: Option<String>,
    pub bursts: u32,
}

impl AccountProfile {
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            total_sent: 0.0,
            total_received: 0.0,
            unique_senders: BTreeSet::new(),
            unique_receivers: BTreeSet::new(),
            first_seen: None,
            last_seen: None,
            tx_count: 0,
            suspicion: 0.0,
            tags: Vec::new(),
            network_id: None,
            bursts: 0,
        }
    }

    pub fn record_outbound(&mut self, amount: f64, receiver: &str, timestamp: NaiveDateTime) {
        self.touch(timestamp);
        self.total_sent += amount;
        if receiver != self.account_id {
            self.unique_receivers.insert(receiver.to_owned());
        }
    }

    pub fn record_inbound(&mut self, amount: f64, sender: &str, timestamp: NaiveDateTime) {
        self.touch(timestamp);
        self.total_received += amount;
        if sender != self.account_id {
            self.unique_senders.insert(sender.to_owned());
        }
    }

    fn touch(&mut self, timestamp: NaiveDateTime) {
        self.tx_count += 1;
        if self.first_seen.map_or(true, |t| timestamp < t) {
            self.first_seen = Some(timestamp);
        }
        if self.last_seen.map_or(true, |t| timestamp > t) {
            self.last_seen = Some(timestamp);
        }
    }

    pub fn add_score(&mut self, amount: f64) {
        self.suspicion += amount;
    }

    /// Idempotent: the tag list is a set, not a multiset.
    pub fn add_tag(&mut self, tag: PatternTag) {
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    pub fn has_tag(&self, tag: PatternTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn tags(&self) -> &[PatternTag] {
        &self.tags
    }

    /// Replaces all detection state with a single legitimate classification.
    /// Used by the merchant/payroll heuristics, which overrule any prior
    /// suspicion for accounts they recognize.
    pub fn reclassify(&mut self, tag: PatternTag) {
        self.tags.clear();
        self.tags.push(tag);
        self.suspicion = 0.0;
    }

    /// Payroll and merchant accounts are known-legitimate high-fan-out
    /// sources and must not seed loop or dispersal search.
    pub fn is_preclassified(&self) -> bool {
        self.has_tag(PatternTag::Payroll) || self.has_tag(PatternTag::Merchant)
    }

    pub fn record_burst(&mut self) {
        self.bursts += 1;
    }

    /// Resolves the account's pattern classification by fixed precedence.
    pub fn classify(&self) -> Option<PatternTag> {
        self.tags.iter().min().copied()
    }
}

/// Arena of account profiles keyed by account id.
#[derive(Debug, Default, Clone)]
pub struct Accounts {
    map: HashMap<String, AccountProfile>,
}

impl Accounts {
    pub fn get_or_create(&mut self, id: &str) -> &mut AccountProfile {
        self.map
            .entry(id.to_owned())
            .or_insert_with(|| AccountProfile::new(id))
    }

    pub fn get(&self, id: &str) -> Option<&AccountProfile> {
        self.map.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut AccountProfile> {
        self.map.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &AccountProfile> {
        self.map.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut AccountProfile> {
        self.map.values_mut()
    }

    /// Profiles ordered by account id, for deterministic reporting.
    pub fn iter_sorted(&self) -> Vec<&AccountProfile> {
        let mut profiles: Vec<_> = self.map.values().collect();
        profiles.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        profiles
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn update_tracks_aggregates() {
        let mut profile = AccountProfile::new("A1");
        profile.record_outbound(100.0, "B1", ts("2024-01-02 09:00:00"));
        profile.record_inbound(40.0, "C1", ts("2024-01-01 12:00:00"));
        profile.record_outbound(60.0, "B2", ts("2024-01-03 10:00:00"));

        assert_eq!(profile.total_sent, 160.0);
        assert_eq!(profile.total_received, 40.0);
        assert_eq!(profile.tx_count, 3);
        assert_eq!(profile.unique_receivers.len(), 2);
        assert_eq!(profile.unique_senders.len(), 1);
        assert_eq!(profile.first_seen, Some(ts("2024-01-01 12:00:00")));
        assert_eq!(profile.last_seen, Some(ts("2024-01-03 10:00:00")));
        assert!(profile.first_seen <= profile.last_seen);
    }

    #[test]
    fn own_id_never_a_counterparty() {
        let mut profile = AccountProfile::new("A1");
        profile.record_outbound(10.0, "A1", ts("2024-01-01 00:00:00"));
        profile.record_inbound(10.0, "A1", ts("2024-01-01 00:00:00"));
        assert!(profile.unique_receivers.is_empty());
        assert!(profile.unique_senders.is_empty());
    }

    #[test]
    fn tag_insertion_is_idempotent() {
        let mut profile = AccountProfile::new("A1");
        profile.add_tag(PatternTag::Loop);
        profile.add_tag(PatternTag::Loop);
        profile.add_tag(PatternTag::Shell);
        profile.add_tag(PatternTag::Loop);
        assert_eq!(profile.tags(), &[PatternTag::Loop, PatternTag::Shell]);
    }

    #[test]
    fn classification_follows_precedence() {
        let mut profile = AccountProfile::new("A1");
        profile.add_tag(PatternTag::DispersalFanIn);
        profile.add_tag(PatternTag::Shell);
        profile.add_tag(PatternTag::Loop);
        assert_eq!(profile.classify(), Some(PatternTag::Loop));

        profile.add_tag(PatternTag::Payroll);
        assert_eq!(profile.classify(), Some(PatternTag::Payroll));
    }

    #[test]
    fn reclassify_clears_prior_state() {
        let mut profile = AccountProfile::new("A1");
        profile.add_score(120.0);
        profile.add_tag(PatternTag::Loop);
        profile.reclassify(PatternTag::Merchant);

        assert_eq!(profile.suspicion, 0.0);
        assert_eq!(profile.tags(), &[PatternTag::Merchant]);
        assert!(profile.is_preclassified());
    }

    #[test]
    fn arena_creates_lazily() {
        let mut accounts = Accounts::default();
        assert!(accounts.get("A1").is_none());
        accounts.get_or_create("A1").add_score(5.0);
        accounts.get_or_create("A1").add_score(5.0);
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts.get("A1").unwrap().suspicion, 10.0);
    }
}
