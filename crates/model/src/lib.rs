//! Core domain model for SciColl collection/institution lookup.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `Institution` / `Collection`: registry entity snapshots
//! - `LookupQuery`: the incoming identifying fields for one specimen record
//! - `Reason`: a single matching signal on a candidate
//! - `Match` / `LookupResult`: the resolution outcome

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Type of an external identifier attached to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IdentifierType {
    /// Digital Object Identifier
    Doi,
    /// Life Science Identifier
    Lsid,
    /// Research Organization Registry id
    Ror,
    /// GRID id
    Grid,
    /// Wikidata item
    Wikidata,
    /// Plain URL
    Url,
    /// Raw UUID
    Uuid,
    /// Unrecognized scheme
    Unknown,
}

impl Default for IdentifierType {
    fn default() -> Self {
        Self::Unknown
    }
}

impl From<&str> for IdentifierType {
    fn from(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "DOI" => Self::Doi,
            "LSID" => Self::Lsid,
            "ROR" => Self::Ror,
            "GRID" => Self::Grid,
            "WIKIDATA" => Self::Wikidata,
            "URL" => Self::Url,
            "UUID" => Self::Uuid,
            _ => Self::Unknown,
        }
    }
}

/// An external identifier as a (type, value) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type", default)]
    pub kind: IdentifierType,
    pub value: String,
}

impl Identifier {
    pub fn new(kind: IdentifierType, value: impl Into<String>) -> Self {
        Self {
            kind,
            value: value.into(),
        }
    }
}

/// Common read surface of the two candidate entity classes.
///
/// Resolution is written once, generically over this trait, and invoked for
/// institutions and collections separately so the two code paths cannot
/// drift apart.
pub trait CandidateEntity {
    fn key(&self) -> Uuid;
    fn code(&self) -> &str;
    fn name(&self) -> &str;
    fn alternative_codes(&self) -> &[String];
    fn identifiers(&self) -> &[Identifier];
    fn country(&self) -> Option<&str>;
}

/// An institution holding one or more natural-history collections.
///
/// A read-only projection of the registry entity: immutable for the duration
/// of a single lookup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Institution {
    /// Registry key, unique and immutable once assigned
    pub key: Uuid,

    /// Primary institution code (e.g. "NHMUK")
    pub code: String,

    /// Full institution name
    #[serde(default)]
    pub name: String,

    /// Other codes the institution is known under, unique per entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_codes: Vec<String>,

    /// External identifiers (ROR, GRID, LSID, ...)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,

    /// ISO country code of the institution's location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

impl Institution {
    /// Create a minimal institution for testing.
    pub fn new(key: Uuid, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key,
            code: code.into(),
            name: name.into(),
            alternative_codes: Vec::new(),
            identifiers: Vec::new(),
            country: None,
        }
    }
}

impl CandidateEntity for Institution {
    fn key(&self) -> Uuid {
        self.key
    }
    fn code(&self) -> &str {
        &self.code
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn alternative_codes(&self) -> &[String] {
        &self.alternative_codes
    }
    fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }
    fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

/// A natural-history collection, optionally owned by an institution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    /// Registry key, unique and immutable once assigned
    pub key: Uuid,

    /// Primary collection code (e.g. "Herps")
    pub code: String,

    /// Full collection name
    #[serde(default)]
    pub name: String,

    /// Other codes the collection is known under, unique per entity
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternative_codes: Vec<String>,

    /// External identifiers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifiers: Vec<Identifier>,

    /// ISO country code of the collection's location
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Key of the owning institution, when declared
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_key: Option<Uuid>,
}

impl Collection {
    /// Create a minimal collection for testing.
    pub fn new(key: Uuid, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key,
            code: code.into(),
            name: name.into(),
            alternative_codes: Vec::new(),
            identifiers: Vec::new(),
            country: None,
            institution_key: None,
        }
    }
}

impl CandidateEntity for Collection {
    fn key(&self) -> Uuid {
        self.key
    }
    fn code(&self) -> &str {
        &self.code
    }
    fn name(&self) -> &str {
        &self.name
    }
    fn alternative_codes(&self) -> &[String] {
        &self.alternative_codes
    }
    fn identifiers(&self) -> &[Identifier] {
        &self.identifiers
    }
    fn country(&self) -> Option<&str> {
        self.country.as_deref()
    }
}

/// A curator-declared override pinning a dataset's code/identifier directly
/// to an entity, bypassing fuzzy resolution.
///
/// A mapping with neither code nor identifier applies to every record of the
/// dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplicitMapping {
    pub dataset_key: Uuid,

    /// Key of the pinned institution or collection
    pub entity_key: Uuid,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// Query parameters for a lookup.
///
/// All fields are optional; a meaningful query supplies at least one
/// identifying field. Codes are compared case-insensitively after trimming,
/// identifiers after scheme-prefix stripping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub institution_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,

    /// Code of the institution the record is catalogued under, which may
    /// differ from the holding institution for specimens on loan
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_institution_code: Option<String>,

    /// ISO country code; corroborating only, never sufficient alone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,

    /// Source dataset; enables explicit-mapping overrides
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dataset_key: Option<Uuid>,

    /// Include ranked alternative matches in the result
    #[serde(default)]
    pub verbose: bool,
}

impl LookupQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_institution_code(mut self, code: impl Into<String>) -> Self {
        self.institution_code = Some(code.into());
        self
    }

    pub fn with_institution_id(mut self, id: impl Into<String>) -> Self {
        self.institution_id = Some(id.into());
        self
    }

    pub fn with_collection_code(mut self, code: impl Into<String>) -> Self {
        self.collection_code = Some(code.into());
        self
    }

    pub fn with_collection_id(mut self, id: impl Into<String>) -> Self {
        self.collection_id = Some(id.into());
        self
    }

    pub fn with_owner_institution_code(mut self, code: impl Into<String>) -> Self {
        self.owner_institution_code = Some(code.into());
        self
    }

    pub fn with_country(mut self, country: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self
    }

    pub fn with_dataset_key(mut self, key: Uuid) -> Self {
        self.dataset_key = Some(key);
        self
    }

    pub fn verbose(mut self) -> Self {
        self.verbose = true;
        self
    }

    /// True when no identifying field at all is present.
    pub fn is_empty(&self) -> bool {
        self.institution_code.is_none()
            && self.institution_id.is_none()
            && self.collection_code.is_none()
            && self.collection_id.is_none()
            && self.owner_institution_code.is_none()
            && self.dataset_key.is_none()
    }
}

/// A single matching signal contributing to a candidate's confidence.
///
/// Ordered so reason sets have a stable iteration order; the numeric
/// priority used for ranking lives in [`Reason::priority`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    /// Query code equals the candidate's primary code
    CodeMatch,
    /// Query code equals the candidate's name
    NameMatch,
    /// Query identifier equals one of the candidate's identifier values
    IdentifierMatch,
    /// Query code equals one of the candidate's alternative codes
    AlternativeCodeMatch,
    /// Query identifier parses as the candidate's registry key
    KeyMatch,
    /// Query country equals the candidate's country
    CountryMatch,
    /// Supplied owner code names a different institution
    DifferentOwner,
    /// Resolved collection is not owned by the resolved institution
    InstCollMismatch,
    /// Record is probably catalogued by a borrower, not the holder
    ProbablyOnLoan,
}

impl Reason {
    /// Ranking weight used to break cardinality ties between candidates.
    ///
    /// Identifier-grade signals outrank code-grade ones, names rank below
    /// codes, country is corroborating only. Cross-entity reasons never
    /// influence ranking.
    pub fn priority(&self) -> u8 {
        match self {
            Self::IdentifierMatch | Self::KeyMatch => 4,
            Self::CodeMatch | Self::AlternativeCodeMatch => 3,
            Self::NameMatch => 2,
            Self::CountryMatch => 1,
            Self::DifferentOwner | Self::InstCollMismatch | Self::ProbablyOnLoan => 0,
        }
    }

    /// Get a human-readable label for this reason.
    pub fn label(&self) -> &'static str {
        match self {
            Self::CodeMatch => "Code Match",
            Self::NameMatch => "Name Match",
            Self::IdentifierMatch => "Identifier Match",
            Self::AlternativeCodeMatch => "Alternative Code Match",
            Self::KeyMatch => "Key Match",
            Self::CountryMatch => "Country Match",
            Self::DifferentOwner => "Different Owner",
            Self::InstCollMismatch => "Institution/Collection Mismatch",
            Self::ProbablyOnLoan => "Probably On Loan",
        }
    }
}

/// The resolution category of a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchType {
    None,
    Fuzzy,
    Exact,
    ExplicitMapping,
}

impl Default for MatchType {
    fn default() -> Self {
        Self::None
    }
}

/// Confidence/ambiguity verdict attached to a non-NONE match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MatchStatus {
    Accepted,
    Doubtful,
    AmbiguousOwner,
    AmbiguousInstitutionMismatch,
    AmbiguousExplicitMappings,
}

/// The resolved outcome for one entity class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match<T> {
    pub match_type: MatchType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<MatchStatus>,

    /// Empty for NONE and EXPLICIT_MAPPING matches
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub reasons: BTreeSet<Reason>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_matched: Option<T>,
}

impl<T> Match<T> {
    /// The empty outcome: nothing matched.
    pub fn none() -> Self {
        Self {
            match_type: MatchType::None,
            status: None,
            reasons: BTreeSet::new(),
            entity_matched: None,
        }
    }

    /// An explicit-mapping override: the mapping itself is the sole
    /// justification, so the reason set stays empty.
    pub fn explicit_mapping(entity: T) -> Self {
        Self {
            match_type: MatchType::ExplicitMapping,
            status: Some(MatchStatus::Accepted),
            reasons: BTreeSet::new(),
            entity_matched: Some(entity),
        }
    }

    pub fn is_none(&self) -> bool {
        self.match_type == MatchType::None
    }
}

impl<T> Default for Match<T> {
    fn default() -> Self {
        Self::none()
    }
}

/// Ranked lower-confidence matches, surfaced only on verbose queries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlternativeMatches {
    #[serde(default)]
    pub institution_matches: Vec<Match<Institution>>,

    #[serde(default)]
    pub collection_matches: Vec<Match<Collection>>,
}

/// The full outcome of one lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupResult {
    pub institution_match: Match<Institution>,

    pub collection_match: Match<Collection>,

    /// Present only when the query asked for verbose output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternative_matches: Option<AlternativeMatches>,
}
