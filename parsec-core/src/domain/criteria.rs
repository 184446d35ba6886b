//! Search criteria and the compact criteria-string grammar
//!
//! A criteria string has two delimiter levels: `.` separates the three
//! ordered groups (given names, surnames, postal codes) and `,` separates
//! alternatives inside a group, e.g. `John,Johnny.Doe.30305,30306`.

use serde::{Deserialize, Serialize};

use crate::domain::result::{Error, Result};

/// Parsed search criteria. At least one group is non-empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchCriteria {
    pub given_names: Vec<String>,
    pub surnames: Vec<String>,
    pub zip_codes: Vec<String>,
}

impl SearchCriteria {
    /// Parse a criteria string
    ///
    /// Names are trimmed and upper-cased, zip tokens that are not exactly
    /// five digits are dropped, blank alternatives are dropped, and
    /// segments past the third are ignored.
    pub fn parse(input: &str) -> Result<Self> {
        if input.trim().is_empty() {
            return Err(Error::invalid_query("query must be a non-empty string"));
        }

        let mut segments = input.split('.');
        let given_names = name_group(segments.next());
        let surnames = name_group(segments.next());
        let zip_codes = zip_group(segments.next());

        Self::new(given_names, surnames, zip_codes)
    }

    /// Build criteria from already-separated groups, applying the same
    /// normalization as [`SearchCriteria::parse`]
    pub fn new(
        given_names: impl IntoIterator<Item = String>,
        surnames: impl IntoIterator<Item = String>,
        zip_codes: impl IntoIterator<Item = String>,
    ) -> Result<Self> {
        let criteria = Self {
            given_names: dedup(given_names.into_iter().filter_map(|n| normalize_name(&n))),
            surnames: dedup(surnames.into_iter().filter_map(|n| normalize_name(&n))),
            zip_codes: dedup(zip_codes.into_iter().filter_map(|z| normalize_zip(&z))),
        };

        if criteria.is_empty() {
            return Err(Error::invalid_query(
                "at least one search criterion required (name, lastname, or zip)",
            ));
        }

        Ok(criteria)
    }

    pub fn is_empty(&self) -> bool {
        self.given_names.is_empty() && self.surnames.is_empty() && self.zip_codes.is_empty()
    }

    /// Render back to the compact string form
    pub fn to_query_string(&self) -> String {
        format!(
            "{}.{}.{}",
            self.given_names.join(","),
            self.surnames.join(","),
            self.zip_codes.join(",")
        )
    }
}

fn name_group(segment: Option<&str>) -> Vec<String> {
    segment
        .map(|s| s.split(',').filter_map(normalize_name).collect())
        .unwrap_or_default()
}

fn zip_group(segment: Option<&str>) -> Vec<String> {
    segment
        .map(|s| s.split(',').filter_map(normalize_zip).collect())
        .unwrap_or_default()
}

fn normalize_name(raw: &str) -> Option<String> {
    let name = raw.trim().to_uppercase();
    (!name.is_empty()).then_some(name)
}

fn normalize_zip(raw: &str) -> Option<String> {
    let zip = raw.trim();
    is_zip5(zip).then(|| zip.to_string())
}

/// True when `s` is exactly five ASCII digits
pub fn is_zip5(s: &str) -> bool {
    s.len() == 5 && s.bytes().all(|b| b.is_ascii_digit())
}

fn dedup(items: impl Iterator<Item = String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_query() {
        let c = SearchCriteria::parse("John,Johnny.Doe.30305").unwrap();
        assert_eq!(c.given_names, vec!["JOHN", "JOHNNY"]);
        assert_eq!(c.surnames, vec!["DOE"]);
        assert_eq!(c.zip_codes, vec!["30305"]);
    }

    #[test]
    fn test_parse_drops_bad_zips_and_blanks() {
        let c = SearchCriteria::parse(" john , ,.doe,,.3030,30305,abcde,303055").unwrap();
        assert_eq!(c.given_names, vec!["JOHN"]);
        assert_eq!(c.surnames, vec!["DOE"]);
        assert_eq!(c.zip_codes, vec!["30305"]);
    }

    #[test]
    fn test_parse_missing_segments_default_empty() {
        let c = SearchCriteria::parse("Mary").unwrap();
        assert_eq!(c.given_names, vec!["MARY"]);
        assert!(c.surnames.is_empty());
        assert!(c.zip_codes.is_empty());

        let c = SearchCriteria::parse("..27006").unwrap();
        assert!(c.given_names.is_empty());
        assert_eq!(c.zip_codes, vec!["27006"]);
    }

    #[test]
    fn test_parse_ignores_extra_segments() {
        let c = SearchCriteria::parse("A.B.12345.EXTRA.99999").unwrap();
        assert_eq!(c.zip_codes, vec!["12345"]);
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert!(matches!(SearchCriteria::parse(""), Err(Error::InvalidQuery(_))));
        assert!(matches!(SearchCriteria::parse("   "), Err(Error::InvalidQuery(_))));
        assert!(matches!(SearchCriteria::parse(".."), Err(Error::InvalidQuery(_))));
        assert!(matches!(SearchCriteria::parse(" , . , .123"), Err(Error::InvalidQuery(_))));
    }

    #[test]
    fn test_duplicate_alternatives_collapse() {
        let c = SearchCriteria::parse("john,JOHN,John.doe").unwrap();
        assert_eq!(c.given_names, vec!["JOHN"]);
    }

    #[test]
    fn test_round_trip_query_string() {
        let c = SearchCriteria::parse("ann,anne.smith.30305,30306").unwrap();
        assert_eq!(c.to_query_string(), "ANN,ANNE.SMITH.30305,30306");
    }
}
