//! Multi-criteria identity lookup planner
//!
//! Turns [`SearchCriteria`] into one parameterized statement. Each
//! non-empty group becomes an OR of alternatives and the groups are ANDed:
//! names are case-insensitive prefix matches, zip codes exact matches.
//! No criteria value is ever interpolated into the SQL text.

use crate::domain::SearchCriteria;

/// Columns selected for every identity lookup, in `row_to_identity` order
pub(crate) const IDENTITY_COLUMNS: &str = "id, first_name, last_name, middle_names, aka, \
     dob::VARCHAR, address, city, county, state, zip, phone, ssn, source, created_at::VARCHAR";

/// A planned identity lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub sql: String,
    /// Bound in order of the `?` placeholders
    pub params: Vec<String>,
    /// Row cap; a result with exactly this many rows is reported truncated
    pub cap: usize,
}

/// Escape LIKE wildcards so user text only ever matches literally
pub fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn prefix_group(column: &str, values: &[String], params: &mut Vec<String>) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    let alternatives: Vec<String> = values
        .iter()
        .map(|v| {
            params.push(format!("{}%", escape_like(v)));
            format!(r"{} ILIKE ? ESCAPE '\'", column)
        })
        .collect();
    Some(format!("({})", alternatives.join(" OR ")))
}

fn exact_group(column: &str, values: &[String], params: &mut Vec<String>) -> Option<String> {
    if values.is_empty() {
        return None;
    }
    params.extend(values.iter().cloned());
    let placeholders = vec!["?"; values.len()].join(", ");
    Some(format!("{} IN ({})", column, placeholders))
}

/// Plan a capped, id-ordered lookup for the given criteria
pub fn plan(criteria: &SearchCriteria, cap: usize) -> QueryPlan {
    let mut params = Vec::new();
    let clauses: Vec<String> = [
        prefix_group("first_name", &criteria.given_names, &mut params),
        prefix_group("last_name", &criteria.surnames, &mut params),
        exact_group("zip", &criteria.zip_codes, &mut params),
    ]
    .into_iter()
    .flatten()
    .collect();

    let where_clause = if clauses.is_empty() {
        // Criteria construction rejects this; keep the statement bounded anyway
        "WHERE FALSE".to_string()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };

    QueryPlan {
        sql: format!(
            "SELECT {} FROM identities {} ORDER BY id LIMIT {}",
            IDENTITY_COLUMNS, where_clause, cap
        ),
        params,
        cap,
    }
}
