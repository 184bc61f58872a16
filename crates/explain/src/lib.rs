//! Explanation generation for lookup results.
//!
//! Converts match reasons and statuses into human-readable explanations
//! suitable for display in data-quality reports and the eval CLI.

use scicoll_model::{CandidateEntity, Match, MatchStatus, MatchType, Reason};
use serde::{Deserialize, Serialize};

/// A structured explanation for one matching signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Detailed explanation (1-2 sentences)
    pub detail: String,

    /// Evidence items supporting this explanation
    pub evidence: Vec<EvidenceItem>,
}

/// A piece of evidence supporting a reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Type of evidence
    pub kind: String,

    /// The specific value or match
    pub value: String,
}

/// Generate explanations for every reason on a match.
pub fn explain_match<T: CandidateEntity>(m: &Match<T>) -> Vec<Explanation> {
    let Some(entity) = m.entity_matched.as_ref() else {
        return Vec::new();
    };
    m.reasons.iter().map(|reason| explain_reason(*reason, entity)).collect()
}

/// Generate an explanation for a single reason.
pub fn explain_reason<T: CandidateEntity>(reason: Reason, entity: &T) -> Explanation {
    match reason {
        Reason::CodeMatch => Explanation {
            summary: "Code match".to_string(),
            detail: format!(
                "The supplied code equals the primary code '{}' of '{}'.",
                entity.code(),
                entity.name()
            ),
            evidence: vec![EvidenceItem {
                kind: "code".to_string(),
                value: entity.code().to_string(),
            }],
        },

        Reason::NameMatch => Explanation {
            summary: "Name match".to_string(),
            detail: format!(
                "The supplied code equals the full name '{}'; the record likely \
                 carries a name where a code was expected.",
                entity.name()
            ),
            evidence: vec![EvidenceItem {
                kind: "name".to_string(),
                value: entity.name().to_string(),
            }],
        },

        Reason::IdentifierMatch => Explanation {
            summary: "Identifier match".to_string(),
            detail: format!(
                "The supplied identifier equals a registered external identifier \
                 of '{}'.",
                entity.name()
            ),
            evidence: entity
                .identifiers()
                .iter()
                .map(|i| EvidenceItem {
                    kind: "identifier".to_string(),
                    value: i.value.clone(),
                })
                .collect(),
        },

        Reason::AlternativeCodeMatch => Explanation {
            summary: "Alternative code match".to_string(),
            detail: format!(
                "The supplied code equals one of the alternative codes of '{}' \
                 (primary code '{}').",
                entity.name(),
                entity.code()
            ),
            evidence: entity
                .alternative_codes()
                .iter()
                .map(|code| EvidenceItem {
                    kind: "alternative_code".to_string(),
                    value: code.clone(),
                })
                .collect(),
        },

        Reason::KeyMatch => Explanation {
            summary: "Key match".to_string(),
            detail: format!(
                "The supplied identifier is the registry key of '{}'.",
                entity.name()
            ),
            evidence: vec![EvidenceItem {
                kind: "key".to_string(),
                value: entity.key().to_string(),
            }],
        },

        Reason::CountryMatch => Explanation {
            summary: "Country match".to_string(),
            detail: format!(
                "The record's country equals the country of '{}'.",
                entity.name()
            ),
            evidence: entity
                .country()
                .map(|country| EvidenceItem {
                    kind: "country".to_string(),
                    value: country.to_string(),
                })
                .into_iter()
                .collect(),
        },

        Reason::DifferentOwner => Explanation {
            summary: "Different owner".to_string(),
            detail: format!(
                "The record declares an owner institution other than '{}'.",
                entity.name()
            ),
            evidence: Vec::new(),
        },

        Reason::InstCollMismatch => Explanation {
            summary: "Institution/collection mismatch".to_string(),
            detail: "The matched collection is not owned by the matched institution."
                .to_string(),
            evidence: Vec::new(),
        },

        Reason::ProbablyOnLoan => Explanation {
            summary: "Probably on loan".to_string(),
            detail: format!(
                "The specimen may be held by '{}' but catalogued under a \
                 different owner institution.",
                entity.name()
            ),
            evidence: Vec::new(),
        },
    }
}

/// Generate a one-line verdict for a match.
pub fn summarize<T: CandidateEntity>(m: &Match<T>) -> String {
    let verdict = match (m.match_type, m.status) {
        (MatchType::None, Some(MatchStatus::AmbiguousExplicitMappings)) => {
            return "NO MATCH: conflicting explicit mappings".to_string();
        }
        (MatchType::None, _) => return "NO MATCH".to_string(),
        (MatchType::ExplicitMapping, _) => "EXPLICIT MAPPING",
        (_, Some(MatchStatus::Accepted)) => "ACCEPTED",
        (_, Some(MatchStatus::Doubtful)) => "DOUBTFUL",
        (_, Some(MatchStatus::AmbiguousOwner)) => "AMBIGUOUS OWNER",
        (_, Some(MatchStatus::AmbiguousInstitutionMismatch)) => "AMBIGUOUS MISMATCH",
        (_, Some(MatchStatus::AmbiguousExplicitMappings)) => "AMBIGUOUS MAPPINGS",
        (_, None) => "UNRESOLVED",
    };

    if m.reasons.is_empty() {
        verdict.to_string()
    } else {
        let labels: Vec<_> = m.reasons.iter().map(|r| r.label()).collect();
        format!("{}: {}", verdict, labels.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scicoll_model::Institution;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn kew() -> Institution {
        Institution::new(Uuid::nil(), "K", "Royal Botanic Gardens, Kew")
    }

    #[test]
    fn test_explain_code_match() {
        let explanation = explain_reason(Reason::CodeMatch, &kew());
        assert_eq!(explanation.summary, "Code match");
        assert!(explanation.detail.contains("'K'"));
    }

    #[test]
    fn test_explain_match_skips_unmatched() {
        let m: Match<Institution> = Match::none();
        assert!(explain_match(&m).is_empty());
    }

    #[test]
    fn test_summarize_exact() {
        let mut reasons = BTreeSet::new();
        reasons.insert(Reason::CodeMatch);
        reasons.insert(Reason::IdentifierMatch);
        let m = Match {
            match_type: MatchType::Exact,
            status: Some(MatchStatus::Accepted),
            reasons,
            entity_matched: Some(kew()),
        };
        let summary = summarize(&m);
        assert!(summary.starts_with("ACCEPTED"));
        assert!(summary.contains("Code Match"));
        assert!(summary.contains("Identifier Match"));
    }

    #[test]
    fn test_summarize_none() {
        let m: Match<Institution> = Match::none();
        assert_eq!(summarize(&m), "NO MATCH");
    }

    #[test]
    fn test_summarize_explicit_mapping() {
        let m = Match::explicit_mapping(kew());
        assert_eq!(summarize(&m), "EXPLICIT MAPPING");
    }
}
