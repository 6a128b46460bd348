//! Tokenizers consumed by the model.
//!
//! The model treats tokens as opaque strings; it only needs `split` on the way
//! in and `join` on the way out. Tokens must never contain a newline.

use std::sync::LazyLock;

use regex::Regex;

/// Narrow capability interface between the model and a tokenization strategy.
pub trait Tokenizer: Send + Sync {
	fn split(&self, text: &str) -> Vec<String>;

	fn join(&self, tokens: &[String]) -> String;
}

/// Splits on whitespace and joins with a single space.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceTokenizer;

impl Tokenizer for WhitespaceTokenizer {
	fn split(&self, text: &str) -> Vec<String> {
		text.split_whitespace().map(str::to_owned).collect()
	}

	fn join(&self, tokens: &[String]) -> String {
		tokens.join(" ")
	}
}

// urls, words, multiple punctuation, single punctuation, whitespace
static PUNCTUATION_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"(\w+:\S+|[\w'-]+|[^\w\s][^\w]*[^\w\s]|[^\w\s]|\s+)").expect("static token pattern")
});

/// Punctuation-preserving tokenizer.
///
/// Tokens are URLs (`word:` followed by non-space), words (with apostrophe and
/// hyphen), runs of punctuation (possibly with inner whitespace), single
/// punctuation characters, and the whitespace between them. Every whitespace
/// token is collapsed to a single space, so `join` is plain concatenation.
/// Case is preserved.
#[derive(Debug, Default, Clone, Copy)]
pub struct PunctuationTokenizer;

impl Tokenizer for PunctuationTokenizer {
	fn split(&self, text: &str) -> Vec<String> {
		let text = text.trim();
		PUNCTUATION_TOKEN
			.find_iter(text)
			.map(|m| {
				let token = m.as_str();
				if token.starts_with(char::is_whitespace) {
					" ".to_owned()
				} else {
					token.replace(['\n', '\t'], " ")
				}
			})
			.collect()
	}

	fn join(&self, tokens: &[String]) -> String {
		tokens.concat()
	}
}

static MEGAHAL_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"([A-Z']+|[0-9]+|[^A-Z'0-9]+)").expect("static token pattern")
});

/// MegaHAL style uppercasing tokenizer.
///
/// Splits uppercased text into letter runs, digit runs and everything else,
/// adding a final period when the text does not end with `.`, `!` or `?`.
/// `join` restores sentence capitalisation.
#[derive(Debug, Default, Clone, Copy)]
pub struct MegaHalTokenizer;

impl Tokenizer for MegaHalTokenizer {
	fn split(&self, text: &str) -> Vec<String> {
		if text.is_empty() {
			return Vec::new();
		}

		let mut text = text.to_uppercase();
		if !text.ends_with(['.', '!', '?']) {
			text.push('.');
		}

		MEGAHAL_TOKEN
			.find_iter(&text)
			.map(|m| m.as_str().replace(['\n', '\t'], " "))
			.collect()
	}

	/// Capitalizes the first letter of the reply and the first letter
	/// following one of `.?!` plus a space; every other letter is lowercased.
	fn join(&self, tokens: &[String]) -> String {
		let chars: Vec<char> = tokens.concat().chars().collect();
		let mut out = String::with_capacity(chars.len());
		let mut start = true;

		for (i, &c) in chars.iter().enumerate() {
			if c.is_alphabetic() {
				if start {
					out.extend(c.to_uppercase());
				} else {
					out.extend(c.to_lowercase());
				}
				start = false;
			} else {
				if i > 2 && c.is_whitespace() && matches!(chars[i - 1], '.' | '?' | '!') {
					start = true;
				}
				out.push(c);
			}
		}

		out
	}
}
