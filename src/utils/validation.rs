//! Centralized validation and helper functions.

use crate::core::types::NUCLEOTIDES;

/// Maximum number of transcripts allowed in a single table (DOS protection)
pub const MAX_TRANSCRIPTS: usize = 100_000;

/// Longest transcript sequence accepted from input files
pub const MAX_SEQUENCE_LENGTH: usize = 1_000_000;

/// Upper-case a nucleotide string and write DNA thymine as uracil.
///
/// # Examples
///
/// ```
/// use duplex_designer::utils::validation::normalize_nucleotides;
///
/// assert_eq!(normalize_nucleotides("acgt"), "ACGU");
/// assert_eq!(normalize_nucleotides(" GGUUA "), "GGUUA");
/// ```
#[must_use]
pub fn normalize_nucleotides(s: &str) -> String {
    s.trim()
        .chars()
        .map(|c| match c.to_ascii_uppercase() {
            'T' => 'U',
            other => other,
        })
        .collect()
}

/// First character outside {A, C, G, U}, if any
#[must_use]
pub fn find_invalid_nucleotide(s: &str) -> Option<char> {
    s.chars().find(|c| !NUCLEOTIDES.contains(c))
}

/// True for a non-empty string over {A, C, G, U}
#[must_use]
pub fn is_valid_rna(s: &str) -> bool {
    !s.is_empty() && find_invalid_nucleotide(s).is_none()
}

/// Check if adding another transcript would exceed the maximum allowed.
///
/// Call this with the current count BEFORE adding a new transcript.
/// Returns an error message if adding would exceed the limit, None if safe to add.
#[must_use]
pub fn check_transcript_limit(count: usize) -> Option<String> {
    if count >= MAX_TRANSCRIPTS {
        Some(format!(
            "Too many transcripts: adding another would exceed maximum of {MAX_TRANSCRIPTS}"
        ))
    } else {
        None
    }
}

/// Split a comma-separated list of names, dropping blanks
#[must_use]
pub fn split_names(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_nucleotides() {
        assert_eq!(normalize_nucleotides("aacgTT"), "AACGUU");
        assert_eq!(normalize_nucleotides("\tGGUUA\n"), "GGUUA");
    }

    #[test]
    fn test_find_invalid_nucleotide() {
        assert_eq!(find_invalid_nucleotide("ACGU"), None);
        assert_eq!(find_invalid_nucleotide("ACNGU"), Some('N'));
        assert!(is_valid_rna("GGUUA"));
        assert!(!is_valid_rna(""));
        assert!(!is_valid_rna("ACGT"));
    }

    #[test]
    fn test_check_transcript_limit() {
        assert!(check_transcript_limit(0).is_none());
        assert!(check_transcript_limit(MAX_TRANSCRIPTS - 1).is_none());
        assert!(check_transcript_limit(MAX_TRANSCRIPTS).is_some());
    }

    #[test]
    fn test_split_names() {
        assert_eq!(split_names("tx1, tx2,,tx3 "), vec!["tx1", "tx2", "tx3"]);
        assert!(split_names(" , ").is_empty());
    }
}
