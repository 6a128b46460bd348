use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::io::LineLog;

/// Dense integer identifier of a token, allocated in first-seen order.
pub type TokenId = u32;

/// Characters that delimit tokens in logs and counted keys.
pub(crate) const SEPARATORS: [char; 3] = ['\n', '\t', '\0'];

/// Two-way map between token strings and dense ids, backed by an append-only log.
///
/// The log holds one token per line; line `i` (0-based) is the token with id `i`.
///
/// # Invariants
/// - Ids are unique and contiguous from 0
/// - An id, once assigned, is never removed or renumbered
/// - Every registered token is on disk before `get_id` returns it
#[derive(Debug)]
pub struct TokenRegistry {
	ids: HashMap<String, TokenId>,
	tokens: Vec<String>,
	log: LineLog,
}

impl TokenRegistry {
	/// Opens the registry log at `path`, creating it if needed, and replays it.
	///
	/// # Errors
	/// - `Corruption` if a line is not UTF-8 or repeats an already registered token.
	/// - `Io` on any file error.
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		let mut ids = HashMap::new();
		let mut tokens = Vec::new();

		let log = LineLog::open(path, |line| -> Result<()> {
			let token = std::str::from_utf8(line)
				.map_err(|e| Error::Corruption(format!("token {} is not UTF-8: {e}", tokens.len())))?;
			if ids.contains_key(token) {
				return Err(Error::Corruption(format!(
					"token {token:?} registered twice (line {})",
					tokens.len() + 1
				)));
			}
			let id = TokenId::try_from(tokens.len()).map_err(|_| Error::RecordOverflow(tokens.len() as u64))?;
			ids.insert(token.to_owned(), id);
			tokens.push(token.to_owned());
			Ok(())
		})?;

		log::debug!("{}: {} tokens replayed", log.path().display(), tokens.len());
		Ok(Self { ids, tokens, log })
	}

	/// Returns the id of `token`, registering it first if it is new.
	///
	/// A new token is appended to the log and flushed before its id is returned.
	///
	/// # Errors
	/// - `InvalidToken` if the token contains a newline, a tab or a NUL.
	/// - `Io` if the log write fails; the token is then not registered.
	pub fn get_id(&mut self, token: &str) -> Result<TokenId> {
		if let Some(&id) = self.ids.get(token) {
			return Ok(id);
		}
		if token.contains(SEPARATORS) {
			return Err(Error::InvalidToken(token.to_owned()));
		}

		let id = TokenId::try_from(self.tokens.len()).map_err(|_| Error::RecordOverflow(self.tokens.len() as u64))?;
		self.log.append(token.as_bytes())?;
		self.log.flush()?;

		self.ids.insert(token.to_owned(), id);
		self.tokens.push(token.to_owned());
		Ok(id)
	}

	/// Looks up a token without registering it.
	pub fn find(&self, token: &str) -> Option<TokenId> {
		self.ids.get(token).copied()
	}

	/// Like [`find`](Self::find), but fails with `UnknownToken`.
	pub fn id_of(&self, token: &str) -> Result<TokenId> {
		self.find(token).ok_or_else(|| Error::UnknownToken(token.to_owned()))
	}

	pub fn get_token(&self, id: TokenId) -> Result<&str> {
		self.tokens
			.get(id as usize)
			.map(String::as_str)
			.ok_or(Error::UnknownId(id))
	}

	pub fn len(&self) -> usize {
		self.tokens.len()
	}

	pub fn is_empty(&self) -> bool {
		self.tokens.is_empty()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	#[test]
	fn test_get_new_tokens() {
		let dir = tempfile::tempdir().unwrap();
		let mut tokens = TokenRegistry::open(dir.path().join("tokens.log")).unwrap();

		for (id, token) in "this is a test".split(' ').enumerate() {
			assert_eq!(id as TokenId, tokens.get_id(token).unwrap());
		}

		// not re-registered
		for (id, token) in "this is a test".split(' ').enumerate() {
			assert_eq!(id as TokenId, tokens.get_id(token).unwrap());
		}
		assert_eq!(4, tokens.len());
		assert_eq!("test", tokens.get_token(3).unwrap());
		assert!(matches!(tokens.get_token(4), Err(Error::UnknownId(4))));
	}

	#[test]
	fn test_reopen() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tokens.log");

		let strs = ["foo", "bar", "<∅>", "baz", "quux"];
		let ids1: Vec<TokenId> = {
			let mut tokens = TokenRegistry::open(&path).unwrap();
			strs.iter().map(|s| tokens.get_id(s).unwrap()).collect()
		};

		let mut tokens = TokenRegistry::open(&path).unwrap();
		assert_eq!(strs.len(), tokens.len());

		let ids2: Vec<TokenId> = strs.iter().map(|s| tokens.get_id(s).unwrap()).collect();
		assert_eq!(ids1, ids2);
		for (id, token) in ids2.iter().zip(strs) {
			assert_eq!(token, tokens.get_token(*id).unwrap());
		}
	}

	#[test]
	fn test_invalid_token() {
		let dir = tempfile::tempdir().unwrap();
		let mut tokens = TokenRegistry::open(dir.path().join("tokens.log")).unwrap();

		assert!(matches!(tokens.get_id("two\nlines"), Err(Error::InvalidToken(_))));
		assert!(matches!(tokens.get_id("tab\there"), Err(Error::InvalidToken(_))));
		assert!(matches!(tokens.get_id("nul\0"), Err(Error::InvalidToken(_))));
		assert!(tokens.is_empty());
	}

	#[test]
	fn test_find_does_not_register() {
		let dir = tempfile::tempdir().unwrap();
		let tokens = TokenRegistry::open(dir.path().join("tokens.log")).unwrap();

		assert_eq!(None, tokens.find("ghost"));
		assert!(matches!(tokens.id_of("ghost"), Err(Error::UnknownToken(_))));
		assert!(tokens.is_empty());
	}

	#[test]
	fn test_duplicate_on_replay() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tokens.log");
		fs::write(&path, "foo\nbar\nfoo\n").unwrap();

		assert!(matches!(TokenRegistry::open(&path), Err(Error::Corruption(_))));
	}

	#[test]
	fn test_non_utf8_on_replay() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("tokens.log");
		fs::write(&path, b"foo\n\xff\xfe\n").unwrap();

		assert!(matches!(TokenRegistry::open(&path), Err(Error::Corruption(_))));
	}
}
