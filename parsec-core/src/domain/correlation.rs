//! Address correlation heuristic
//!
//! Compares a result's street address with addresses observed on the
//! source page. Two addresses correlate when they share the house number
//! and the first letter of the street name, so `3055 Nc Highway 135`
//! matches `3055 NC HWY 135`. This is a coarse pre-filter that highlights
//! candidates for a person to confirm; it tolerates false positives.

/// House number and street initial extracted from an address
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressKey {
    pub house_number: String,
    pub street_initial: char,
}

/// Upper-case, keep only ASCII alphanumerics and whitespace, collapse runs
/// of whitespace into single spaces
pub fn normalize_address(address: &str) -> String {
    let cleaned: String = address
        .to_uppercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Leading digit run plus the letter right after it (spaces allowed in
/// between). Addresses that do not start with a number have no key.
pub fn address_key(address: &str) -> Option<AddressKey> {
    let normalized = normalize_address(address);
    let house_number: String = normalized
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    if house_number.is_empty() {
        return None;
    }

    let street_initial = normalized[house_number.len()..].trim_start().chars().next()?;
    if !street_initial.is_ascii_uppercase() {
        return None;
    }

    Some(AddressKey {
        house_number,
        street_initial,
    })
}

/// True when `candidate` correlates with at least one source address
pub fn addresses_match<S: AsRef<str>>(candidate: &str, sources: &[S]) -> bool {
    let Some(candidate_key) = address_key(candidate) else {
        return false;
    };
    sources
        .iter()
        .filter_map(|s| address_key(s.as_ref()))
        .any(|key| key == candidate_key)
}

/// Flag each candidate address against the same source set
pub fn flag_matches<S: AsRef<str>>(candidates: &[&str], sources: &[S]) -> Vec<bool> {
    candidates
        .iter()
        .map(|candidate| addresses_match(candidate, sources))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_address() {
        assert_eq!(normalize_address(" 107 Old   Dutch Rd., Apt #4 "), "107 OLD DUTCH RD APT 4");
    }

    #[test]
    fn test_highway_abbreviation_matches() {
        assert!(addresses_match("3055 Nc Highway 135", &["3055 NC HWY 135"]));
    }

    #[test]
    fn test_different_house_number_does_not_match() {
        assert!(!addresses_match("3057 NC Hwy 135", &["3055 NC Hwy 135"]));
    }

    #[test]
    fn test_different_street_initial_does_not_match() {
        assert!(!addresses_match("12 Main St", &["12 Oak St"]));
    }

    #[test]
    fn test_any_source_may_match() {
        let sources = vec!["9 Elm St".to_string(), "".to_string(), "44 Birch Ln".to_string()];
        assert!(addresses_match("44 B Street", &sources));
    }

    #[test]
    fn test_no_key_never_matches() {
        assert_eq!(address_key("PO Box 12"), None);
        assert_eq!(address_key("123"), None);
        assert!(!addresses_match("PO Box 12", &["PO Box 12"]));
    }

    #[test]
    fn test_punctuation_between_number_and_street() {
        let key = address_key("1600-A, Pennsylvania Ave").unwrap();
        assert_eq!(key.house_number, "1600");
        assert_eq!(key.street_initial, 'A');
    }

    #[test]
    fn test_flag_matches_aligns_with_input() {
        let flags = flag_matches(&["3055 NC HWY 135", "1 Main St", ""], &["3055 Nc Highway 135"]);
        assert_eq!(flags, vec![true, false, false]);
    }
}
