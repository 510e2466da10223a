use std::collections::HashSet;

/// Cosine similarity between two vectors: `dot(a, b) / (|a| * |b|)`.
///
/// Returns 0.0 for mismatched dimensions or a zero-magnitude side, so a
/// degenerate embedding can never qualify as a match.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
	if a.len() != b.len() || a.is_empty() {
		return 0.0;
	}

	let mut dot = 0.0_f32;
	let mut norm_a = 0.0_f32;
	let mut norm_b = 0.0_f32;

	for (lhs, rhs) in a.iter().zip(b.iter()) {
		dot += lhs * rhs;
		norm_a += lhs * lhs;
		norm_b += rhs * rhs;
	}

	if norm_a == 0.0 || norm_b == 0.0 {
		return 0.0;
	}

	dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Lowercased alphanumeric tokens, at least two characters, deduplicated,
/// capped at `max_terms`.
pub fn tokenize(text: &str, max_terms: usize) -> Vec<String> {
	let mut normalized = String::with_capacity(text.len());

	for ch in text.chars() {
		if ch.is_ascii_alphanumeric() {
			normalized.push(ch.to_ascii_lowercase());
		} else {
			normalized.push(' ');
		}
	}

	let mut out = Vec::new();
	let mut seen = HashSet::new();

	for token in normalized.split_whitespace() {
		if token.len() < 2 {
			continue;
		}
		if seen.insert(token.to_string()) {
			out.push(token.to_string());
		}
		if out.len() >= max_terms {
			break;
		}
	}

	out
}

/// Count of query tokens that appear in `text` (case-insensitive).
pub fn term_overlap(tokens: &[String], text: &str) -> usize {
	if tokens.is_empty() {
		return 0;
	}

	let haystack = text.to_lowercase();

	tokens.iter().filter(|token| haystack.contains(token.as_str())).count()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cosine_of_identical_vectors_is_one() {
		let vec = [0.5_f32, 0.5, 0.7];

		assert!((cosine_similarity(&vec, &vec) - 1.0).abs() < 1e-6);
	}

	#[test]
	fn cosine_of_orthogonal_vectors_is_zero() {
		assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
	}

	#[test]
	fn cosine_guards_against_mismatch_and_zero_norm() {
		assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
		assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
	}

	#[test]
	fn tokenize_dedups_and_caps() {
		let tokens = tokenize("Fintech fintech startups in Berlin", 2);

		assert_eq!(tokens, vec!["fintech".to_string(), "startups".to_string()]);
	}

	#[test]
	fn term_overlap_counts_contained_tokens() {
		let tokens = tokenize("fintech berlin payments", 8);

		assert_eq!(term_overlap(&tokens, "PayFlow Berlin Fintech"), 2);
		assert_eq!(term_overlap(&tokens, "unrelated"), 0);
	}
}
