//! Roster & rule configuration.
//!
//! Everything here is fixed at startup: who can win, which slots are
//! predetermined, and the ordered list of prize tiers. A [`DrawConfig`]
//! is either the built-in event roster ([`DrawConfig::default`]) or
//! loaded from a JSON file and checked by [`DrawConfig::validate`].

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Number of lowest-ranked tiers whose pool also includes the secondary roster.
pub const LOWER_TIER_COUNT: usize = 2;

/// Default storage key for the persisted draw record.
pub const DEFAULT_STORAGE_KEY: &str = "letto_v3_data";

/// Default period of the rolling "currently showing" updates.
pub const DEFAULT_VISUAL_TICK_MS: u64 = 50;

/// Configuration errors, reported when a config file is loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("At least one prize tier must be configured")]
    EmptyTiers,

    #[error("Duplicate prize tier: {0}")]
    DuplicateTier(String),

    #[error("Participant listed more than once: {0}")]
    DuplicateParticipant(String),

    #[error("Rigged slot refers to unknown tier: {0}")]
    UnknownTier(String),

    #[error("Rigged slot for tier {0} has ordinal 0 (ordinals start at 1)")]
    ZeroOrdinal(String),

    #[error("Rigged winner {0} is not in the rigged roster")]
    RiggedNotInRoster(String),

    #[error("Rigged slot ({tier}, {ordinal}) is assigned twice")]
    DuplicateRiggedSlot { tier: String, ordinal: u32 },

    #[error("Visual tick period must be greater than zero")]
    ZeroVisualTick,
}

/// A prize tier. Rank is the tier's position in [`DrawConfig::tiers`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeTier {
    /// Unique label, also the key in the persisted counters
    pub name: String,

    /// Seconds the rolling phase runs before the draw resolves
    #[serde(rename = "duration")]
    pub duration_secs: u64,
}

impl PrizeTier {
    pub fn new(name: impl Into<String>, duration_secs: u64) -> Self {
        Self {
            name: name.into(),
            duration_secs,
        }
    }

    /// Rolling duration as a [`Duration`].
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

/// The three disjoint participant sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Roster {
    /// Eligible for every tier
    pub primary: Vec<String>,

    /// Eligible only for the lowest tiers
    pub secondary: Vec<String>,

    /// Reserved for rigged slots, never drawn at random
    pub rigged: Vec<String>,
}

impl Roster {
    /// Total number of distinct participants across all three sets.
    pub fn len(&self) -> usize {
        self.primary.len() + self.secondary.len() + self.rigged.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A predetermined winner for the `ordinal`-th draw of `tier`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiggedSlot {
    pub tier: String,
    pub ordinal: u32,
    pub winner: String,
}

impl RiggedSlot {
    pub fn new(tier: impl Into<String>, ordinal: u32, winner: impl Into<String>) -> Self {
        Self {
            tier: tier.into(),
            ordinal,
            winner: winner.into(),
        }
    }
}

/// Complete draw configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawConfig {
    pub roster: Roster,

    #[serde(default)]
    pub rigged_slots: Vec<RiggedSlot>,

    /// Ordered lowest to highest rank
    pub tiers: Vec<PrizeTier>,

    #[serde(default = "default_visual_tick_ms")]
    pub visual_tick_ms: u64,

    #[serde(default = "default_storage_key")]
    pub storage_key: String,
}

fn default_visual_tick_ms() -> u64 {
    DEFAULT_VISUAL_TICK_MS
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.to_string()
}

impl DrawConfig {
    /// Builds a config with default tick period and storage key.
    pub fn new(roster: Roster, rigged_slots: Vec<RiggedSlot>, tiers: Vec<PrizeTier>) -> Self {
        Self {
            roster,
            rigged_slots,
            tiers,
            visual_tick_ms: DEFAULT_VISUAL_TICK_MS,
            storage_key: default_storage_key(),
        }
    }

    /// Parses and validates a JSON config document.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: DrawConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Checks the structural rules the selection engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tiers.is_empty() {
            return Err(ConfigError::EmptyTiers);
        }
        if self.visual_tick_ms == 0 {
            return Err(ConfigError::ZeroVisualTick);
        }

        let mut tier_names = HashSet::new();
        for tier in &self.tiers {
            if !tier_names.insert(tier.name.as_str()) {
                return Err(ConfigError::DuplicateTier(tier.name.clone()));
            }
        }

        let mut names = HashSet::new();
        let everyone = self
            .roster
            .primary
            .iter()
            .chain(&self.roster.secondary)
            .chain(&self.roster.rigged);
        for name in everyone {
            if !names.insert(name.as_str()) {
                return Err(ConfigError::DuplicateParticipant(name.clone()));
            }
        }

        let mut slots = HashSet::new();
        for slot in &self.rigged_slots {
            if !tier_names.contains(slot.tier.as_str()) {
                return Err(ConfigError::UnknownTier(slot.tier.clone()));
            }
            if slot.ordinal == 0 {
                return Err(ConfigError::ZeroOrdinal(slot.tier.clone()));
            }
            if !self.roster.rigged.contains(&slot.winner) {
                return Err(ConfigError::RiggedNotInRoster(slot.winner.clone()));
            }
            if !slots.insert((slot.tier.as_str(), slot.ordinal)) {
                return Err(ConfigError::DuplicateRiggedSlot {
                    tier: slot.tier.clone(),
                    ordinal: slot.ordinal,
                });
            }
        }

        Ok(())
    }

    pub fn tier(&self, index: usize) -> Option<&PrizeTier> {
        self.tiers.get(index)
    }

    pub fn tier_count(&self) -> usize {
        self.tiers.len()
    }

    /// Returns true if the tier at `index` draws from primary + secondary.
    pub fn is_lower_tier(&self, index: usize) -> bool {
        index < LOWER_TIER_COUNT
    }

    /// Looks up the rigged winner for `(tier, ordinal)`, exact match only.
    pub fn rigged_winner(&self, tier: &str, ordinal: u32) -> Option<&str> {
        self.rigged_slots
            .iter()
            .find(|slot| slot.tier == tier && slot.ordinal == ordinal)
            .map(|slot| slot.winner.as_str())
    }

    pub fn is_rigged(&self, name: &str) -> bool {
        self.roster.rigged.iter().any(|r| r == name)
    }

    pub fn visual_tick(&self) -> Duration {
        Duration::from_millis(self.visual_tick_ms)
    }
}

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|n| n.to_string()).collect()
}

impl Default for DrawConfig {
    /// The annual-party roster: 56 primary, 12 secondary, 4 rigged.
    fn default() -> Self {
        let roster = Roster {
            primary: names(&[
                "王俊文", "蒋紫融", "孙晓泉", "陈眀畅", "唐澜瑄", "张崧", "潘正阳", "舒心",
                "孟甜", "赵玉花", "赵旭", "黄晓菁", "梁永媛", "张炜凡", "卓霖", "王梓襄",
                "叶百超", "邬龙贞", "涂天昱", "田昕", "李岱明", "姜宣兆", "肖倩", "伍漫瑜",
                "陈妤哲", "刘铉达", "王子豪", "冯泽", "陈笑天", "王清岚", "富家丹", "王斯雯",
                "刘岩", "朱诗倩", "戴灵瑶", "何佳", "宁霞", "严露冰", "陈彤", "韩冰雪",
                "吕艳潇", "顾佳乐", "王敏烨", "彭涌", "张泽宇", "郑睿", "李雨昕", "任林",
                "陈叶秋子", "朱振瑶", "陈微笑", "李思琦", "姚舒雯", "史淑彤", "王诗博", "候利利",
            ]),
            secondary: names(&[
                "王思博", "郑希", "王欣", "李佳佳", "朱丽霞", "左霄莹", "吴帅", "李鹏刚",
                "王志鹏", "邓浩", "许栩", "傅峥",
            ]),
            rigged: names(&["王博", "王伟业", "胡星", "贾超"]),
        };

        let rigged_slots = vec![
            RiggedSlot::new("参与奖", 7, "王博"),
            RiggedSlot::new("参与奖", 9, "王伟业"),
            RiggedSlot::new("三等奖", 4, "胡星"),
            RiggedSlot::new("二等奖", 3, "贾超"),
        ];

        let tiers = vec![
            PrizeTier::new("参与奖", 2),
            PrizeTier::new("三等奖", 2),
            PrizeTier::new("二等奖", 3),
            PrizeTier::new("一等奖", 3),
            PrizeTier::new("特等奖", 5),
        ];

        Self::new(roster, rigged_slots, tiers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = DrawConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.roster.primary.len(), 56);
        assert_eq!(config.roster.secondary.len(), 12);
        assert_eq!(config.roster.len(), 72);
        assert_eq!(config.tier_count(), 5);
        assert_eq!(config.visual_tick(), Duration::from_millis(50));
    }

    #[test]
    fn test_rigged_lookup_is_exact() {
        let config = DrawConfig::default();
        assert_eq!(config.rigged_winner("参与奖", 7), Some("王博"));
        assert_eq!(config.rigged_winner("参与奖", 9), Some("王伟业"));
        assert_eq!(config.rigged_winner("参与奖", 8), None);
        assert_eq!(config.rigged_winner("三等奖", 7), None);
        assert!(config.is_rigged("贾超"));
        assert!(!config.is_rigged("王俊文"));
    }

    #[test]
    fn test_lower_tiers_are_first_two() {
        let config = DrawConfig::default();
        assert!(config.is_lower_tier(0));
        assert!(config.is_lower_tier(1));
        assert!(!config.is_lower_tier(2));
        assert_eq!(config.tier(4).map(|t| t.duration()), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_json_config_with_defaults() {
        let json = r#"{
            "roster": { "primary": ["A", "B"], "rigged": ["R"] },
            "rigged_slots": [{ "tier": "Gold", "ordinal": 2, "winner": "R" }],
            "tiers": [{ "name": "Gold", "duration": 2 }]
        }"#;

        let config = DrawConfig::from_json_str(json).unwrap();
        assert!(config.roster.secondary.is_empty());
        assert_eq!(config.visual_tick_ms, DEFAULT_VISUAL_TICK_MS);
        assert_eq!(config.storage_key, DEFAULT_STORAGE_KEY);
        assert_eq!(config.tiers[0].duration(), Duration::from_secs(2));
    }

    #[test]
    fn test_overlapping_roster_rejected() {
        let mut config = DrawConfig::default();
        config.roster.secondary.push("王俊文".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateParticipant(name)) if name == "王俊文"
        ));
    }

    #[test]
    fn test_invalid_rigged_slots_rejected() {
        let mut config = DrawConfig::default();
        config.rigged_slots.push(RiggedSlot::new("安慰奖", 1, "王博"));
        assert!(matches!(config.validate(), Err(ConfigError::UnknownTier(_))));

        let mut config = DrawConfig::default();
        config.rigged_slots.push(RiggedSlot::new("参与奖", 0, "王博"));
        assert!(matches!(config.validate(), Err(ConfigError::ZeroOrdinal(_))));

        let mut config = DrawConfig::default();
        config.rigged_slots.push(RiggedSlot::new("参与奖", 3, "王俊文"));
        assert!(matches!(config.validate(), Err(ConfigError::RiggedNotInRoster(_))));

        let mut config = DrawConfig::default();
        config.rigged_slots.push(RiggedSlot::new("参与奖", 7, "胡星"));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateRiggedSlot { ordinal: 7, .. })
        ));
    }

    #[test]
    fn test_empty_and_duplicate_tiers_rejected() {
        let mut config = DrawConfig::default();
        config.tiers.clear();
        config.rigged_slots.clear();
        assert!(matches!(config.validate(), Err(ConfigError::EmptyTiers)));

        let mut config = DrawConfig::default();
        config.tiers.push(PrizeTier::new("特等奖", 9));
        assert!(matches!(config.validate(), Err(ConfigError::DuplicateTier(_))));
    }

    #[test]
    fn test_malformed_json_is_parse_error() {
        assert!(matches!(
            DrawConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
