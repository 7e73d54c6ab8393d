//! Ranked symbol search.
//!
//! Ranking, highest first:
//! 1. match tier: exact name, then prefix, then substring
//! 2. reference count (incoming CALLS + REFERENCES edges), descending
//! 3. name, then symbol id
//!
//! Matching is against the symbol name and is case-insensitive unless the
//! query asks otherwise. Module symbols match on their file stem.

use crate::error::{AnalysisError, AnalysisResult};
use crate::graph::SymbolGraph;
use crate::types::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SEARCH_LIMIT: usize = 20;

/// Edge types counted as references for ranking.
const REFERENCE_EDGES: &[RelationType] = &[RelationType::Calls, RelationType::References];

/// A symbol search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchQuery {
    pub text: String,
    /// Restrict to these kinds; empty means any.
    pub kinds: Vec<SymbolKind>,
    pub language: Option<Language>,
    pub path_prefix: Option<String>,
    pub case_sensitive: bool,
    /// Only exact name matches.
    pub exact: bool,
    pub limit: usize,
    pub offset: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            text: String::new(),
            kinds: Vec::new(),
            language: None,
            path_prefix: None,
            case_sensitive: false,
            exact: false,
            limit: DEFAULT_SEARCH_LIMIT,
            offset: 0,
        }
    }
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_kinds(mut self, kinds: impl IntoIterator<Item = SymbolKind>) -> Self {
        self.kinds = kinds.into_iter().collect();
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = Some(prefix.into());
        self
    }

    pub fn case_sensitive(mut self, enabled: bool) -> Self {
        self.case_sensitive = enabled;
        self
    }

    pub fn exact(mut self, enabled: bool) -> Self {
        self.exact = enabled;
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    fn accepts(&self, symbol: &Symbol) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&symbol.kind))
            && self.language.is_none_or(|l| l == symbol.language)
            && self
                .path_prefix
                .as_deref()
                .is_none_or(|p| symbol.file_path.starts_with(p))
    }
}

/// How a name matched the query text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    Exact,
    Prefix,
    Substring,
}

impl MatchKind {
    fn of(name: &str, needle: &str) -> Option<Self> {
        if name == needle {
            Some(MatchKind::Exact)
        } else if name.starts_with(needle) {
            Some(MatchKind::Prefix)
        } else if name.contains(needle) {
            Some(MatchKind::Substring)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub symbol: Symbol,
    pub match_kind: MatchKind,
    pub references_count: usize,
}

/// Run a search over one snapshot.
pub fn search(graph: &SymbolGraph, query: &SearchQuery) -> AnalysisResult<Vec<SearchHit>> {
    let text = query.text.trim();
    if text.is_empty() {
        return Err(AnalysisError::InvalidInput("search text is empty".into()));
    }
    let fold = |s: &str| {
        if query.case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    let needle = fold(text);

    let mut hits: Vec<SearchHit> = graph
        .symbols()
        .filter(|s| query.accepts(s))
        .filter_map(|symbol| {
            let match_kind = MatchKind::of(&fold(&symbol.name), &needle)?;
            if query.exact && match_kind != MatchKind::Exact {
                return None;
            }
            Some(SearchHit {
                symbol: symbol.clone(),
                match_kind,
                references_count: graph.in_degree(&symbol.id, REFERENCE_EDGES),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.match_kind
            .cmp(&b.match_kind)
            .then_with(|| b.references_count.cmp(&a.references_count))
            .then_with(|| a.symbol.name.cmp(&b.symbol.name))
            .then_with(|| a.symbol.id.cmp(&b.symbol.id))
    });

    Ok(hits
        .into_iter()
        .skip(query.offset)
        .take(query.limit)
        .collect())
}
