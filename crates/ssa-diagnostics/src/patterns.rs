//! Ordered message pattern tables.
//!
//! The API server reports conflicts, schema violations and validation rule
//! failures as free text only. Each shape a message can take is one entry
//! of a table; supporting a new upstream wording means adding an entry.

use std::ops::Range;

use regex::{Captures, Regex};
use tracing::error;

/// Turns the captures of one match into a value, or rejects the match.
pub type Extractor<T> = fn(&Captures<'_>) -> Option<T>;

struct Pattern<T> {
	name: &'static str,
	regex: Regex,
	extract: Extractor<T>,
}

/// Regexes tried in order, each paired with an extractor.
pub struct PatternTable<T> {
	patterns: Vec<Pattern<T>>,
}

impl<T> PatternTable<T> {
	/// Compile `(name, regex, extractor)` entries.
	///
	/// An entry whose regex fails to compile is logged and left out, the
	/// table stays usable with the remaining entries.
	pub fn new(entries: &[(&'static str, &str, Extractor<T>)]) -> Self {
		let patterns = entries
			.iter()
			.filter_map(|&(name, pattern, extract)| match Regex::new(pattern) {
				Ok(regex) => Some(Pattern {
					name,
					regex,
					extract,
				}),
				Err(err) => {
					error!(name, %err, "message pattern failed to compile");
					None
				}
			})
			.collect();
		Self { patterns }
	}

	pub fn len(&self) -> usize {
		self.patterns.len()
	}

	pub fn is_empty(&self) -> bool {
		self.patterns.is_empty()
	}

	/// Whether any entry matches `text`, extractors aside.
	pub fn is_match(&self, text: &str) -> bool {
		self.patterns.iter().any(|p| p.regex.is_match(text))
	}

	/// Name of the first entry matching `text`.
	pub fn matched_pattern(&self, text: &str) -> Option<&'static str> {
		self.patterns
			.iter()
			.find(|p| p.regex.is_match(text))
			.map(|p| p.name)
	}

	/// Value of the first entry, in table order, that extracts something.
	pub fn first(&self, text: &str) -> Option<T> {
		self.patterns.iter().find_map(|p| {
			p.regex
				.captures_iter(text)
				.find_map(|captures| (p.extract)(&captures))
		})
	}

	/// Values of every match of every entry, in text order.
	///
	/// A match overlapping text already claimed by an earlier entry is
	/// dropped, so a general entry listed after a specific one does not
	/// report the same fragment twice.
	pub fn all(&self, text: &str) -> Vec<T> {
		let mut claimed: Vec<(Range<usize>, T)> = Vec::new();
		for pattern in &self.patterns {
			for captures in pattern.regex.captures_iter(text) {
				let Some(whole) = captures.get(0) else {
					continue;
				};
				let range = whole.range();
				if claimed.iter().any(|(taken, _)| overlaps(taken, &range)) {
					continue;
				}
				if let Some(value) = (pattern.extract)(&captures) {
					claimed.push((range, value));
				}
			}
		}
		claimed.sort_by_key(|(range, _)| range.start);
		claimed.into_iter().map(|(_, value)| value).collect()
	}
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
	a.start < b.end && b.start < a.end
}

/// Text of capture group `index`, if it participated in the match.
pub(crate) fn group<'t>(captures: &Captures<'t>, index: usize) -> Option<&'t str> {
	captures.get(index).map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
	use super::*;

	fn number(captures: &Captures<'_>) -> Option<u32> {
		group(captures, 1)?.parse().ok()
	}

	fn word(captures: &Captures<'_>) -> Option<u32> {
		Some(group(captures, 1)?.len() as u32 * 100)
	}

	fn table() -> PatternTable<u32> {
		PatternTable::<u32>::new(&[("number", r"n=(\d+)", number), ("word", r"w=(\w+)", word)])
	}

	#[test]
	fn test_invalid_entries_are_left_out() {
		let table = PatternTable::<u32>::new(&[("broken", r"(", number), ("number", r"(\d+)", number)]);
		assert_eq!(table.len(), 1);
		assert_eq!(table.first("abc 42"), Some(42));
	}

	#[test]
	fn test_first_respects_table_order() {
		assert_eq!(table().first("w=abc n=7"), Some(7));
		assert_eq!(table().first("nothing here"), None);
	}

	#[test]
	fn test_all_is_in_text_order() {
		assert_eq!(table().all("w=ab n=1 n=2"), vec![200, 1, 2]);
	}

	#[test]
	fn test_all_drops_overlapping_matches() {
		let table = PatternTable::new(&[("pair", r"n=(\d+)", number), ("digits", r"(\d+)", number)]);
		assert_eq!(table.all("n=5 and 6"), vec![5, 6]);
	}

	#[test]
	fn test_rejected_match_does_not_claim_text() {
		let table = PatternTable::<u32>::new(&[("number", r"n=(\w+)", number), ("word", r"n=(\w+)", word)]);
		assert_eq!(table.all("n=abc"), vec![300]);
	}

	#[test]
	fn test_matched_pattern() {
		assert_eq!(table().matched_pattern("x w=a"), Some("word"));
		assert_eq!(table().matched_pattern("x"), None);
		assert!(table().is_match("n=1"));
	}
}
