use serde::{Deserialize, Serialize};

/// Subscription plan of a business account (also a Postgres enum)
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "subscription_plan", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    #[default]
    Free,
    Pro,
    Enterprise,
}

/// Limits and feature flags attached to a plan. `None` means unlimited.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub struct PlanLimits {
    pub max_surveys: Option<i64>,
    pub max_branches: Option<i64>,
    pub max_team_members: Option<i64>,
    pub roulette: bool,
    pub loyalty: bool,
}

/// Features that can be switched off per plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Feature {
    Roulette,
    Loyalty,
}

impl Feature {
    fn label(self) -> &'static str {
        match self {
            Feature::Roulette => "roulette",
            Feature::Loyalty => "loyalty",
        }
    }
}

impl Plan {
    pub fn limits(self) -> PlanLimits {
        match self {
            Plan::Free => PlanLimits {
                max_surveys: Some(1),
                max_branches: Some(1),
                max_team_members: Some(2),
                roulette: false,
                loyalty: false,
            },
            Plan::Pro => PlanLimits {
                max_surveys: Some(10),
                max_branches: Some(5),
                max_team_members: Some(15),
                roulette: true,
                loyalty: true,
            },
            Plan::Enterprise => PlanLimits {
                max_surveys: None,
                max_branches: None,
                max_team_members: None,
                roulette: true,
                loyalty: true,
            },
        }
    }
}

impl PlanLimits {
    /// Checks whether one more item can be created given the current count.
    pub fn check_count(current: i64, limit: Option<i64>, what: &str) -> Result<(), String> {
        match limit {
            Some(max) if current >= max => Err(format!(
                "Plan limit reached: {what} ({current}/{max}), upgrade to add more"
            )),
            _ => Ok(()),
        }
    }

    pub fn check_feature(&self, feature: Feature) -> Result<(), String> {
        let enabled = match feature {
            Feature::Roulette => self.roulette,
            Feature::Loyalty => self.loyalty,
        };

        if enabled {
            Ok(())
        } else {
            Err(format!("Feature '{}' is not included in your plan", feature.label()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_plan_allows_a_single_survey() {
        let limits = Plan::Free.limits();
        assert!(PlanLimits::check_count(0, limits.max_surveys, "surveys").is_ok());
        let err = PlanLimits::check_count(1, limits.max_surveys, "surveys").unwrap_err();
        assert!(err.contains("surveys (1/1)"));
    }

    #[test]
    fn enterprise_has_no_limits() {
        let limits = Plan::Enterprise.limits();
        assert!(PlanLimits::check_count(10_000, limits.max_branches, "branches").is_ok());
        assert!(limits.check_feature(Feature::Roulette).is_ok());
    }

    #[test]
    fn free_plan_excludes_games_and_loyalty() {
        let limits = Plan::Free.limits();
        assert!(limits.check_feature(Feature::Roulette).is_err());
        assert!(limits.check_feature(Feature::Loyalty).is_err());
        assert!(Plan::Pro.limits().check_feature(Feature::Loyalty).is_ok());
    }

    #[test]
    fn plan_deserializes_from_snake_case() {
        let plan: Plan = serde_json::from_str("\"enterprise\"").unwrap();
        assert_eq!(plan, Plan::Enterprise);
        assert_eq!(Plan::default(), Plan::Free);
    }
}
