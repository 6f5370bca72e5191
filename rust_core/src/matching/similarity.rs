//! String similarity backends for scorer name matching.
//!
//! The default backend computes a trigram similarity (Dice coefficient over
//! padded word trigrams), matching the behavior of Postgres-style trigram
//! comparison closely enough that near-miss spellings and accent variants
//! clear the matcher threshold while unrelated names stay far below it.

use super::SimilarityBackend;
use rustc_hash::FxHashSet;
use strsim::jaro_winkler;

/// Normalize a player name for comparison: lowercase, fold common Latin
/// diacritics, strip everything but alphanumerics and spaces, collapse
/// whitespace.
pub fn normalize_name(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(fold_diacritic)
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn fold_diacritic(c: char) -> char {
    match c {
        'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => 'a',
        'é' | 'è' | 'ê' | 'ë' => 'e',
        'í' | 'ì' | 'î' | 'ï' => 'i',
        'ó' | 'ò' | 'ô' | 'ö' | 'õ' => 'o',
        'ú' | 'ù' | 'û' | 'ü' => 'u',
        'ñ' => 'n',
        'ç' => 'c',
        'ý' | 'ÿ' => 'y',
        other => other,
    }
}

/// Collect padded trigrams for every word of an already-normalized name.
/// Each word is padded with two leading spaces and one trailing space, the
/// same framing pg_trgm uses.
fn trigrams(normalized: &str) -> FxHashSet<String> {
    let mut set = FxHashSet::default();
    for word in normalized.split_whitespace() {
        let padded: Vec<char> = format!("  {} ", word).chars().collect();
        for window in padded.windows(3) {
            set.insert(window.iter().collect());
        }
    }
    set
}

/// Trigram similarity backend (Dice coefficient over padded word trigrams).
#[derive(Debug, Clone, Copy, Default)]
pub struct TrigramSimilarity;

impl TrigramSimilarity {
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityBackend for TrigramSimilarity {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = trigrams(&normalize_name(a));
        let b = trigrams(&normalize_name(b));

        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let shared = a.intersection(&b).count();
        (2 * shared) as f64 / (a.len() + b.len()) as f64
    }

    fn backend_name(&self) -> &str {
        "trigram"
    }
}

/// Edit-distance backend built on strsim's Jaro-Winkler metric.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditDistanceSimilarity;

impl EditDistanceSimilarity {
    pub fn new() -> Self {
        Self
    }
}

impl SimilarityBackend for EditDistanceSimilarity {
    fn score(&self, a: &str, b: &str) -> f64 {
        let a = normalize_name(a);
        let b = normalize_name(b);

        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        jaro_winkler(&a, &b)
    }

    fn backend_name(&self) -> &str {
        "jaro_winkler"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_accents_and_punctuation() {
        assert_eq!(normalize_name("José  María"), "jose maria");
        assert_eq!(normalize_name("O'Brien"), "obrien");
        assert_eq!(normalize_name("  Müller "), "muller");
    }

    #[test]
    fn test_identical_names_score_one() {
        let backend = TrigramSimilarity::new();
        assert!((backend.score("Lionel Messi", "Lionel Messi") - 1.0).abs() < f64::EPSILON);
        assert!((backend.score("lionel messi", "LIONEL MESSI") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_near_miss_spelling_clears_threshold() {
        let backend = TrigramSimilarity::new();
        assert!(backend.score("Leonel Mesi", "Lionel Messi") >= 0.6);
        assert!(backend.score("Julian Alvares", "Julián Álvarez") >= 0.6);
    }

    #[test]
    fn test_accent_variant_scores_one() {
        let backend = TrigramSimilarity::new();
        assert!((backend.score("Jose Maria Gimenez", "José María Giménez") - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unrelated_names_stay_low() {
        let backend = TrigramSimilarity::new();
        assert!(backend.score("Lionel Messi", "Julian Alvarez") < 0.3);
        assert!(backend.score("Enzo Fernandez", "Emiliano Martinez") < 0.3);
    }

    #[test]
    fn test_empty_input_scores_zero() {
        let backend = TrigramSimilarity::new();
        assert_eq!(backend.score("", "Lionel Messi"), 0.0);
        assert_eq!(backend.score("???", "Lionel Messi"), 0.0);
    }

    #[test]
    fn test_edit_distance_backend() {
        let backend = EditDistanceSimilarity::new();
        assert!(backend.score("Leonel Mesi", "Lionel Messi") >= 0.6);
        assert!(backend.score("", "anything") == 0.0);
        assert_eq!(backend.backend_name(), "jaro_winkler");
    }
}
