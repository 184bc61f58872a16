//! Lookup resolution for collection and institution records.
//!
//! Takes the identifying fields of one specimen record and resolves them
//! against a registry snapshot: explicit dataset mappings short-circuit
//! everything, then candidates are gathered per entity class, each candidate
//! accumulates its matching reasons, and a ranked selection decides the
//! match type and confidence status. Institutions and collections run
//! through one generic code path so the two classes cannot drift apart.

use scicoll_model::{
    AlternativeMatches, CandidateEntity, Collection, ExplicitMapping, Institution, LookupQuery,
    LookupResult, Match, MatchStatus, MatchType, Reason,
};
use scicoll_normalize::{codes_equal, countries_equal, identifiers_equal, parse_key};
use scicoll_snapshot::{EntityIndex, RegistrySnapshot};
use std::collections::{BTreeSet, HashSet};
use uuid::Uuid;

/// The identifying fields of one entity class, projected out of a
/// [`LookupQuery`].
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityQuery<'a> {
    pub code: Option<&'a str>,
    pub identifier: Option<&'a str>,
    pub country: Option<&'a str>,
}

impl<'a> EntityQuery<'a> {
    fn institution(query: &'a LookupQuery) -> Self {
        Self {
            code: query.institution_code.as_deref(),
            identifier: query.institution_id.as_deref(),
            country: query.country.as_deref(),
        }
    }

    fn collection(query: &'a LookupQuery) -> Self {
        Self {
            code: query.collection_code.as_deref(),
            identifier: query.collection_id.as_deref(),
            country: query.country.as_deref(),
        }
    }
}

/// Evaluate every matching signal of one candidate against the query.
///
/// Each predicate is independent; several reasons can accumulate on the same
/// candidate. Country corroborates only: it is evaluated once another field
/// already matched, so country alone never justifies a candidate.
pub fn evaluate_reasons<T: CandidateEntity>(query: &EntityQuery<'_>, entity: &T) -> BTreeSet<Reason> {
    let mut reasons = BTreeSet::new();

    if let Some(code) = query.code {
        if codes_equal(code, entity.code()) {
            reasons.insert(Reason::CodeMatch);
        }
        if codes_equal(code, entity.name()) {
            reasons.insert(Reason::NameMatch);
        }
        if entity.alternative_codes().iter().any(|alt| codes_equal(code, alt)) {
            reasons.insert(Reason::AlternativeCodeMatch);
        }
    }

    if let Some(identifier) = query.identifier {
        if entity
            .identifiers()
            .iter()
            .any(|i| identifiers_equal(identifier, &i.value))
        {
            reasons.insert(Reason::IdentifierMatch);
        }
        if parse_key(identifier) == Some(entity.key()) {
            reasons.insert(Reason::KeyMatch);
        }
    }

    if !reasons.is_empty() {
        if let (Some(query_country), Some(entity_country)) = (query.country, entity.country()) {
            if countries_equal(query_country, entity_country) {
                reasons.insert(Reason::CountryMatch);
            }
        }
    }

    reasons
}

/// Gather the candidate set for one entity class, duplicate-free by key.
fn gather<'s, T: CandidateEntity>(index: &'s EntityIndex<T>, query: &EntityQuery<'_>) -> Vec<&'s T> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    let mut candidates: Vec<&'s T> = Vec::new();
    let mut push = |entity: &'s T| {
        if seen.insert(entity.key()) {
            candidates.push(entity);
        }
    };

    if let Some(code) = query.code {
        for entity in index.find_by_code(code) {
            push(entity);
        }
        for entity in index.find_by_name(code) {
            push(entity);
        }
        for entity in index.find_by_alternative_code(code) {
            push(entity);
        }
    }

    if let Some(identifier) = query.identifier {
        for entity in index.find_by_identifier(identifier) {
            push(entity);
        }
        if let Some(key) = parse_key(identifier) {
            if let Some(entity) = index.find_by_key(key) {
                push(entity);
            }
        }
    }

    candidates
}

/// Outcome of the explicit-mapping check for one entity class.
enum ExplicitOutcome<'s, T> {
    /// No mapping applies; continue with fuzzy resolution.
    NoMapping,
    /// Exactly one entity is pinned for this dataset/query.
    Matched(&'s T),
    /// Distinct mappings pin different entities; fuzzy resolution still runs
    /// but its status is overridden.
    Ambiguous,
}

/// Test whether a stored mapping applies to the query.
///
/// Every field the mapping declares must match the corresponding query
/// field; a mapping declaring neither code nor identifier is dataset-wide.
fn mapping_applies(mapping: &ExplicitMapping, query: &EntityQuery<'_>) -> bool {
    let code_ok = match &mapping.code {
        Some(declared) => query.code.is_some_and(|code| codes_equal(code, declared)),
        None => true,
    };
    let identifier_ok = match &mapping.identifier {
        Some(declared) => query
            .identifier
            .is_some_and(|identifier| identifiers_equal(identifier, declared)),
        None => true,
    };
    code_ok && identifier_ok
}

fn resolve_explicit<'s, T: CandidateEntity>(
    index: &'s EntityIndex<T>,
    mappings: &[ExplicitMapping],
    dataset_key: Uuid,
    query: &EntityQuery<'_>,
) -> ExplicitOutcome<'s, T> {
    let mut targets: BTreeSet<Uuid> = BTreeSet::new();
    for mapping in mappings.iter().filter(|m| m.dataset_key == dataset_key) {
        if mapping_applies(mapping, query) {
            targets.insert(mapping.entity_key);
        }
    }

    let mut iter = targets.into_iter();
    match (iter.next(), iter.next()) {
        (None, _) => ExplicitOutcome::NoMapping,
        (Some(_), Some(_)) => ExplicitOutcome::Ambiguous,
        (Some(target), None) => match index.find_by_key(target) {
            Some(entity) => ExplicitOutcome::Matched(entity),
            None => {
                tracing::warn!(entity_key = %target, "Explicit mapping points at unknown entity");
                ExplicitOutcome::NoMapping
            }
        },
    }
}

/// EXACT requires a code-grade signal and an identifier-grade signal on the
/// same candidate; anything else is FUZZY.
fn match_type_for(reasons: &BTreeSet<Reason>) -> MatchType {
    let code_side = reasons.contains(&Reason::CodeMatch)
        || reasons.contains(&Reason::AlternativeCodeMatch)
        || reasons.contains(&Reason::NameMatch);
    let identifier_side =
        reasons.contains(&Reason::IdentifierMatch) || reasons.contains(&Reason::KeyMatch);
    if code_side && identifier_side {
        MatchType::Exact
    } else {
        MatchType::Fuzzy
    }
}

fn priority_score(reasons: &BTreeSet<Reason>) -> u32 {
    reasons.iter().map(|r| u32::from(r.priority())).sum()
}

/// Strict dominance: `a` holds every reason of `b` plus at least one more.
fn dominates(a: &BTreeSet<Reason>, b: &BTreeSet<Reason>) -> bool {
    a.len() > b.len() && b.is_subset(a)
}

fn as_alternative<T>(entity: T, reasons: BTreeSet<Reason>) -> Match<T> {
    Match {
        match_type: match_type_for(&reasons),
        status: None,
        reasons,
        entity_matched: Some(entity),
    }
}

/// Rank the scored candidates and pick a primary match, if any.
///
/// The full ranked list is always computed; verbose output is only a
/// projection of it.
fn resolve_candidates<T: CandidateEntity + Clone>(
    scored: Vec<(T, BTreeSet<Reason>)>,
) -> (Match<T>, Vec<Match<T>>) {
    // Zero-reason candidates never make it to ranking.
    let mut ranked: Vec<(T, BTreeSet<Reason>)> =
        scored.into_iter().filter(|(_, reasons)| !reasons.is_empty()).collect();

    ranked.sort_by(|(entity_a, reasons_a), (entity_b, reasons_b)| {
        reasons_b
            .len()
            .cmp(&reasons_a.len())
            .then_with(|| priority_score(reasons_b).cmp(&priority_score(reasons_a)))
            .then_with(|| entity_a.key().cmp(&entity_b.key()))
    });

    if ranked.is_empty() {
        return (Match::none(), Vec::new());
    }

    if ranked.len() == 1 {
        let (entity, reasons) = ranked.remove(0);
        let match_type = match_type_for(&reasons);
        let status = if match_type == MatchType::Exact {
            MatchStatus::Accepted
        } else {
            MatchStatus::Doubtful
        };
        let primary = Match {
            match_type,
            status: Some(status),
            reasons,
            entity_matched: Some(entity),
        };
        return (primary, Vec::new());
    }

    // Several candidates: a winner must strictly dominate the runner-up,
    // otherwise no primary match is declared.
    if dominates(&ranked[0].1, &ranked[1].1) {
        let (entity, reasons) = ranked.remove(0);
        let primary = Match {
            match_type: match_type_for(&reasons),
            status: Some(MatchStatus::Doubtful),
            reasons,
            entity_matched: Some(entity),
        };
        let alternatives = ranked
            .into_iter()
            .map(|(entity, reasons)| as_alternative(entity, reasons))
            .collect();
        (primary, alternatives)
    } else {
        let alternatives = ranked
            .into_iter()
            .map(|(entity, reasons)| as_alternative(entity, reasons))
            .collect();
        (Match::none(), alternatives)
    }
}

/// Resolve one entity class end to end: explicit-mapping short-circuit,
/// candidate gathering, reason evaluation, ambiguity resolution.
///
/// Returns the primary match plus the ranked alternatives.
pub fn resolve_entity<T: CandidateEntity + Clone>(
    index: &EntityIndex<T>,
    mappings: &[ExplicitMapping],
    dataset_key: Option<Uuid>,
    query: &EntityQuery<'_>,
) -> (Match<T>, Vec<Match<T>>) {
    let mut explicit_ambiguous = false;
    if let Some(dataset_key) = dataset_key {
        match resolve_explicit(index, mappings, dataset_key, query) {
            ExplicitOutcome::Matched(entity) => {
                return (Match::explicit_mapping(entity.clone()), Vec::new());
            }
            ExplicitOutcome::Ambiguous => explicit_ambiguous = true,
            ExplicitOutcome::NoMapping => {}
        }
    }

    let scored = gather(index, query)
        .into_iter()
        .map(|entity| (entity.clone(), evaluate_reasons(query, entity)))
        .collect();

    let (mut primary, alternatives) = resolve_candidates(scored);

    // Conflicting curator overrides taint whatever the fuzzy path produced,
    // including a NONE match: the caller must be able to observe the conflict.
    if explicit_ambiguous {
        primary.status = Some(MatchStatus::AmbiguousExplicitMappings);
    }

    (primary, alternatives)
}

/// Resolve a lookup query against a registry snapshot.
///
/// Institution and collection are resolved independently, then cross-checked:
/// a resolved collection owned by a different institution than the resolved
/// one is flagged, and a supplied owner code naming someone other than the
/// matched institution marks the record as probably on loan.
pub fn lookup(snapshot: &RegistrySnapshot, query: &LookupQuery) -> LookupResult {
    let (mut institution_match, institution_alternatives) = resolve_entity(
        snapshot.institutions(),
        snapshot.institution_mappings(),
        query.dataset_key,
        &EntityQuery::institution(query),
    );
    let (mut collection_match, collection_alternatives) = resolve_entity(
        snapshot.collections(),
        snapshot.collection_mappings(),
        query.dataset_key,
        &EntityQuery::collection(query),
    );

    check_ownership(&institution_match, &mut collection_match);
    check_owner_code(query.owner_institution_code.as_deref(), &mut institution_match);

    tracing::debug!(
        institution = ?institution_match.match_type,
        collection = ?collection_match.match_type,
        "Lookup resolved"
    );

    LookupResult {
        institution_match,
        collection_match,
        alternative_matches: query.verbose.then(|| AlternativeMatches {
            institution_matches: institution_alternatives,
            collection_matches: collection_alternatives,
        }),
    }
}

/// Flag a resolved collection whose declared owner is not the resolved
/// institution. An exact collection match survives the mismatch with the
/// reason recorded; a fuzzy one is downgraded to an ambiguous status.
///
/// Explicit-mapping matches are left untouched: their reason set stays empty.
fn check_ownership(institution: &Match<Institution>, collection: &mut Match<Collection>) {
    let Some(resolved) = institution.entity_matched.as_ref() else {
        return;
    };
    if !matches!(collection.match_type, MatchType::Fuzzy | MatchType::Exact) {
        return;
    }
    let Some(owner) = collection.entity_matched.as_ref().and_then(|c| c.institution_key) else {
        // No declared owner, nothing to contradict.
        return;
    };
    if owner != resolved.key {
        collection.reasons.insert(Reason::InstCollMismatch);
        if collection.match_type != MatchType::Exact
            && collection.status != Some(MatchStatus::AmbiguousExplicitMappings)
        {
            collection.status = Some(MatchStatus::AmbiguousInstitutionMismatch);
        }
    }
}

/// Flag a record whose owner code names someone other than the matched
/// institution: the specimen is probably on loan, catalogued by the borrower.
fn check_owner_code(owner_code: Option<&str>, institution: &mut Match<Institution>) {
    let Some(owner_code) = owner_code else {
        return;
    };
    if !matches!(institution.match_type, MatchType::Fuzzy | MatchType::Exact) {
        return;
    }
    let Some(entity) = institution.entity_matched.as_ref() else {
        return;
    };

    let owner_is_holder = codes_equal(owner_code, &entity.code)
        || entity.alternative_codes.iter().any(|alt| codes_equal(owner_code, alt));

    if !owner_is_holder {
        institution.reasons.insert(Reason::DifferentOwner);
        institution.reasons.insert(Reason::ProbablyOnLoan);
        if institution.status != Some(MatchStatus::AmbiguousExplicitMappings) {
            institution.status = Some(MatchStatus::AmbiguousOwner);
        }
    }
}
