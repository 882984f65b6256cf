//! Mandatory-field submission gate

use crate::catalogue::Catalogue;
use std::collections::BTreeMap;

/// Whether an answer counts as given
#[inline]
#[must_use]
pub fn is_answered(value: Option<&String>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

/// Mandatory ids, across every step, with no non-blank answer
#[must_use]
pub fn missing_mandatory<'c>(
    catalogue: &'c Catalogue,
    answers: &BTreeMap<String, String>,
) -> Vec<&'c str> {
    catalogue
        .mandatory_ids()
        .filter(|id| !is_answered(answers.get(*id)))
        .collect()
}

/// Submission gate: every mandatory field holds a non-blank answer
///
/// Optional fields never affect the outcome.
#[must_use]
pub fn mandatory_complete(catalogue: &Catalogue, answers: &BTreeMap<String, String>) -> bool {
    missing_mandatory(catalogue, answers).is_empty()
}

/// Answers worth persisting: trimmed-non-blank ones only
#[must_use]
pub fn non_blank(answers: &BTreeMap<String, String>) -> BTreeMap<String, String> {
    answers
        .iter()
        .filter(|(_, v)| !v.trim().is_empty())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn answers(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn whitespace_does_not_count() {
        assert!(!is_answered(Some(&"  \t".to_string())));
        assert!(!is_answered(None));
        assert!(is_answered(Some(&" 40 ".to_string())));
    }

    #[test]
    fn missing_lists_blank_mandatory_fields_in_catalogue_order() {
        let catalogue = Catalogue::standard();
        let given = answers(&[("business_name", "Hillside Dairy"), ("region", " ")]);
        let missing = missing_mandatory(&catalogue, &given);
        assert_eq!(missing.first(), Some(&"region"));
        assert!(!missing.contains(&"business_name"));
    }

    #[test]
    fn optional_fields_are_irrelevant() {
        let catalogue = Catalogue::standard();
        let mut given: BTreeMap<String, String> = catalogue
            .mandatory_ids()
            .map(|id| (id.to_string(), "x".to_string()))
            .collect();
        assert!(mandatory_complete(&catalogue, &given));
        given.insert("equity".to_string(), String::new());
        assert!(mandatory_complete(&catalogue, &given));
    }
}
