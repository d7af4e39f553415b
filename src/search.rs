//! Unit search: literal or regex scan across cached unit texts.

use regex::RegexBuilder;
use serde::Serialize;

use crate::bundle::Bundle;
use crate::error::{QueryError, QueryResult};

/// One matching unit; the match position inside the unit is not reported.
#[derive(Debug, Clone, Serialize)]
pub struct UnitHit {
    pub id: String,
    pub path: String,
}

/// Scan every unit's raw text, in snapshot order, truncated at `limit`.
///
/// Literal queries are case-sensitive substring containment. Regex queries
/// compile case-insensitively; an invalid pattern fails `InvalidPattern`
/// before any unit is scanned.
pub fn search_units(
    bundle: &Bundle,
    query: &str,
    is_regex: bool,
    limit: usize,
) -> QueryResult<Vec<UnitHit>> {
    let pattern = if is_regex {
        Some(
            RegexBuilder::new(query)
                .case_insensitive(true)
                .build()
                .map_err(|e| QueryError::InvalidPattern(e.to_string()))?,
        )
    } else {
        None
    };

    let mut hits = Vec::new();
    for unit in bundle.units() {
        if hits.len() >= limit {
            break;
        }
        let matched = match &pattern {
            Some(re) => re.is_match(&unit.code),
            None => unit.code.contains(query),
        };
        if matched {
            hits.push(UnitHit {
                id: unit.id.clone(),
                path: unit.path.clone(),
            });
        }
    }
    Ok(hits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::Unit;

    fn fruit_bundle() -> Bundle {
        Bundle::new(vec![
            Unit::new("1", "a.js", "const a='apple';"),
            Unit::new("2", "b.js", "const b='banana';"),
        ])
    }

    #[test]
    fn literal_search_matches_the_owning_unit_only() {
        let bundle = fruit_bundle();
        let hits = search_units(&bundle, "apple", false, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");

        let hits = search_units(&bundle, "banana", false, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "2");
    }

    #[test]
    fn literal_search_is_case_sensitive() {
        let hits = search_units(&fruit_bundle(), "APPLE", false, 10).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn regex_search_is_case_insensitive() {
        let hits = search_units(&fruit_bundle(), "APP.E", true, 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, "1");
    }

    #[test]
    fn invalid_regex_fails_before_scanning() {
        let err = search_units(&fruit_bundle(), "(unclosed", true, 10).unwrap_err();
        assert!(matches!(err, QueryError::InvalidPattern(_)));
    }

    #[test]
    fn results_follow_snapshot_order_and_limit() {
        let bundle = Bundle::new(vec![
            Unit::new("x", "x.js", "shared token"),
            Unit::new("y", "y.js", "shared token"),
            Unit::new("z", "z.js", "shared token"),
        ]);
        let hits = search_units(&bundle, "shared", false, 2).unwrap();
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["x", "y"]);
    }
}
