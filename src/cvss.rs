//! CVSS v3 vector breakdown.
//!
//! Scores are never computed here. The base score reported by the scanner is
//! carried verbatim next to the metric values parsed from its vector string.

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};

/// Base metrics of a CVSS v3 vector, in Grafeas wire form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvssV3 {
    pub base_score: f32,
    pub attack_vector: AttackVector,
    pub attack_complexity: AttackComplexity,
    pub privileges_required: PrivilegesRequired,
    pub user_interaction: UserInteraction,
    pub scope: Scope,
    pub confidentiality_impact: Impact,
    pub integrity_impact: Impact,
    pub availability_impact: Impact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackVector {
    #[default]
    AttackVectorUnspecified,
    AttackVectorNetwork,
    AttackVectorAdjacent,
    AttackVectorLocal,
    AttackVectorPhysical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttackComplexity {
    #[default]
    AttackComplexityUnspecified,
    AttackComplexityLow,
    AttackComplexityHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrivilegesRequired {
    #[default]
    PrivilegesRequiredUnspecified,
    PrivilegesRequiredNone,
    PrivilegesRequiredLow,
    PrivilegesRequiredHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserInteraction {
    #[default]
    UserInteractionUnspecified,
    UserInteractionNone,
    UserInteractionRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Scope {
    #[default]
    ScopeUnspecified,
    ScopeUnchanged,
    ScopeChanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Impact {
    #[default]
    ImpactUnspecified,
    ImpactHigh,
    ImpactLow,
    ImpactNone,
}

impl CvssV3 {
    /// Parse a vector such as `CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H`.
    ///
    /// The `CVSS:3.x` prefix is optional. Temporal and environmental metrics and
    /// segments without a `:` are ignored; base metrics missing from the vector
    /// stay unspecified. An unknown value for a base metric is an error.
    pub fn parse(base_score: f32, vector: &str) -> Result<Self> {
        let mut cvss = Self {
            base_score,
            ..Self::default()
        };

        for part in vector.trim().split('/').filter(|p| !p.is_empty()) {
            // Truncated segment such as "..."
            let Some((metric, value)) = part.split_once(':') else {
                continue;
            };

            let bad_value =
                || ConvertError::invalid_cvss_vector(vector, format!("unknown value '{part}'"));

            match metric {
                "CVSS" if value.starts_with('3') => {}
                "CVSS" => {
                    return Err(ConvertError::invalid_cvss_vector(
                        vector,
                        format!("unsupported version '{value}'"),
                    ));
                }
                "AV" => {
                    cvss.attack_vector = match value {
                        "N" => AttackVector::AttackVectorNetwork,
                        "A" => AttackVector::AttackVectorAdjacent,
                        "L" => AttackVector::AttackVectorLocal,
                        "P" => AttackVector::AttackVectorPhysical,
                        _ => return Err(bad_value()),
                    }
                }
                "AC" => {
                    cvss.attack_complexity = match value {
                        "L" => AttackComplexity::AttackComplexityLow,
                        "H" => AttackComplexity::AttackComplexityHigh,
                        _ => return Err(bad_value()),
                    }
                }
                "PR" => {
                    cvss.privileges_required = match value {
                        "N" => PrivilegesRequired::PrivilegesRequiredNone,
                        "L" => PrivilegesRequired::PrivilegesRequiredLow,
                        "H" => PrivilegesRequired::PrivilegesRequiredHigh,
                        _ => return Err(bad_value()),
                    }
                }
                "UI" => {
                    cvss.user_interaction = match value {
                        "N" => UserInteraction::UserInteractionNone,
                        "R" => UserInteraction::UserInteractionRequired,
                        _ => return Err(bad_value()),
                    }
                }
                "S" => {
                    cvss.scope = match value {
                        "U" => Scope::ScopeUnchanged,
                        "C" => Scope::ScopeChanged,
                        _ => return Err(bad_value()),
                    }
                }
                "C" => cvss.confidentiality_impact = parse_impact(value).ok_or_else(bad_value)?,
                "I" => cvss.integrity_impact = parse_impact(value).ok_or_else(bad_value)?,
                "A" => cvss.availability_impact = parse_impact(value).ok_or_else(bad_value)?,
                // E, RL, RC, CR, MAV, ...
                _ => {}
            }
        }

        Ok(cvss)
    }
}

fn parse_impact(value: &str) -> Option<Impact> {
    match value {
        "H" => Some(Impact::ImpactHigh),
        "L" => Some(Impact::ImpactLow),
        "N" => Some(Impact::ImpactNone),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_vector() {
        let cvss = CvssV3::parse(9.8, "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H").unwrap();
        assert_eq!(cvss.base_score, 9.8);
        assert_eq!(cvss.attack_vector, AttackVector::AttackVectorNetwork);
        assert_eq!(cvss.attack_complexity, AttackComplexity::AttackComplexityLow);
        assert_eq!(
            cvss.privileges_required,
            PrivilegesRequired::PrivilegesRequiredNone
        );
        assert_eq!(cvss.user_interaction, UserInteraction::UserInteractionNone);
        assert_eq!(cvss.scope, Scope::ScopeUnchanged);
        assert_eq!(cvss.confidentiality_impact, Impact::ImpactHigh);
        assert_eq!(cvss.integrity_impact, Impact::ImpactHigh);
        assert_eq!(cvss.availability_impact, Impact::ImpactHigh);
    }

    #[test]
    fn test_parse_without_prefix_and_partial() {
        let cvss = CvssV3::parse(5.3, "AV:L/AC:H/S:C/E:P").unwrap();
        assert_eq!(cvss.attack_vector, AttackVector::AttackVectorLocal);
        assert_eq!(cvss.attack_complexity, AttackComplexity::AttackComplexityHigh);
        assert_eq!(cvss.scope, Scope::ScopeChanged);
        assert_eq!(cvss.user_interaction, UserInteraction::UserInteractionUnspecified);
        assert_eq!(cvss.availability_impact, Impact::ImpactUnspecified);
    }

    #[test]
    fn test_parse_rejects_bad_values() {
        assert!(CvssV3::parse(7.5, "AV:X/AC:L").is_err());
        assert!(CvssV3::parse(7.5, "AV:N/C:Q").is_err());
        assert!(CvssV3::parse(7.5, "CVSS:2.0/AV:N").is_err());
    }

    #[test]
    fn test_parse_ignores_truncated_segments() {
        let cvss = CvssV3::parse(7.5, "AV:N/...").unwrap();
        assert_eq!(cvss.attack_vector, AttackVector::AttackVectorNetwork);
        assert_eq!(cvss.scope, Scope::ScopeUnspecified);
    }

    #[test]
    fn test_wire_names() {
        let cvss = CvssV3::parse(7.5, "AV:N/C:H").unwrap();
        let value = serde_json::to_value(&cvss).unwrap();
        assert_eq!(value["attackVector"], "ATTACK_VECTOR_NETWORK");
        assert_eq!(value["confidentialityImpact"], "IMPACT_HIGH");
        assert_eq!(value["scope"], "SCOPE_UNSPECIFIED");
    }
}
