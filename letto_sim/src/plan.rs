//! Ceremony plans: how many winners each tier gives out.

use letto_core::DrawConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Plan errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("Malformed quota '{0}' (expected tier=count)")]
    Malformed(String),

    #[error("Plan names a tier that is not configured: {0}")]
    UnknownTier(String),

    #[error("Plan tiers must follow the configured order; {0} is out of place")]
    OutOfOrder(String),
}

/// Winners to draw for one tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierQuota {
    pub tier: String,
    pub quota: u32,
}

impl TierQuota {
    pub fn new(tier: impl Into<String>, quota: u32) -> Self {
        Self {
            tier: tier.into(),
            quota,
        }
    }
}

/// Ordered quotas, drawn lowest tier first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CeremonyPlan {
    pub quotas: Vec<TierQuota>,
}

impl Default for CeremonyPlan {
    /// The annual-party split: 10 / 5 / 3 / 2 / 1.
    fn default() -> Self {
        Self {
            quotas: vec![
                TierQuota::new("参与奖", 10),
                TierQuota::new("三等奖", 5),
                TierQuota::new("二等奖", 3),
                TierQuota::new("一等奖", 2),
                TierQuota::new("特等奖", 1),
            ],
        }
    }
}

impl CeremonyPlan {
    /// Same quota for every configured tier.
    pub fn uniform(config: &DrawConfig, quota: u32) -> Self {
        Self {
            quotas: config
                .tiers
                .iter()
                .map(|t| TierQuota::new(t.name.clone(), quota))
                .collect(),
        }
    }

    pub fn total(&self) -> u32 {
        self.quotas.iter().map(|q| q.quota).sum()
    }

    /// Checks every planned tier exists and appears in configured order.
    pub fn validate(&self, config: &DrawConfig) -> Result<(), PlanError> {
        let mut last = None;
        for quota in &self.quotas {
            let index = config
                .tiers
                .iter()
                .position(|t| t.name == quota.tier)
                .ok_or_else(|| PlanError::UnknownTier(quota.tier.clone()))?;
            if last.map_or(false, |prev| index <= prev) {
                return Err(PlanError::OutOfOrder(quota.tier.clone()));
            }
            last = Some(index);
        }
        Ok(())
    }
}

impl std::str::FromStr for CeremonyPlan {
    type Err = PlanError;

    /// Parses `参与奖=10,三等奖=5,...`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let quotas = s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                let (tier, count) = part
                    .split_once('=')
                    .ok_or_else(|| PlanError::Malformed(part.to_string()))?;
                let quota = count
                    .trim()
                    .parse()
                    .map_err(|_| PlanError::Malformed(part.to_string()))?;
                Ok(TierQuota::new(tier.trim(), quota))
            })
            .collect::<Result<Vec<_>, PlanError>>()?;
        Ok(Self { quotas })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_plan_matches_default_config() {
        let plan = CeremonyPlan::default();
        assert_eq!(plan.total(), 21);
        assert!(plan.validate(&DrawConfig::default()).is_ok());
    }

    #[test]
    fn test_parse_plan() {
        let plan: CeremonyPlan = "参与奖=3, 二等奖 = 1".parse().unwrap();
        assert_eq!(
            plan.quotas,
            vec![TierQuota::new("参与奖", 3), TierQuota::new("二等奖", 1)]
        );
        assert!(plan.validate(&DrawConfig::default()).is_ok());
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(matches!(
            "参与奖:3".parse::<CeremonyPlan>(),
            Err(PlanError::Malformed(_))
        ));
        assert!(matches!(
            "参与奖=many".parse::<CeremonyPlan>(),
            Err(PlanError::Malformed(_))
        ));
    }

    #[test]
    fn test_validate_order_and_names() {
        let config = DrawConfig::default();

        let plan: CeremonyPlan = "特等奖=1,参与奖=2".parse().unwrap();
        assert_eq!(plan.validate(&config), Err(PlanError::OutOfOrder("参与奖".to_string())));

        let plan: CeremonyPlan = "安慰奖=1".parse().unwrap();
        assert_eq!(plan.validate(&config), Err(PlanError::UnknownTier("安慰奖".to_string())));
    }

    #[test]
    fn test_uniform_plan() {
        let config = DrawConfig::default();
        let plan = CeremonyPlan::uniform(&config, 4);
        assert_eq!(plan.total(), 20);
        assert!(plan.validate(&config).is_ok());
    }
}
