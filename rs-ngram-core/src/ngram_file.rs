//! Queries over sorted textual n-gram files.
//!
//! A record is one line, `tok1\ttok2\t...\ttokK\tcount\n`, and lines are sorted
//! by byte comparison. Every query binary-searches on raw byte offsets, so no
//! index is needed: a probe lands anywhere, skips the partial line and
//! compares the next complete one.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, SeekFrom, Write};
use std::path::Path;

use crate::counter::sort_external;
use crate::error::{Error, Result};

/// Textual prefix shared by every record that starts with `tokens`.
fn record_prefix<S: AsRef<str>>(tokens: &[S]) -> Vec<u8> {
	let mut prefix = Vec::new();
	for token in tokens {
		prefix.extend_from_slice(token.as_ref().as_bytes());
		prefix.push(b'\t');
	}
	prefix
}

/// Returns whether `line` (without its newline) is a well-formed record.
pub fn is_ngram(line: &str) -> bool {
	line_ngram(line).is_some()
}

/// Splits a record into its tokens and count.
pub fn line_ngram(line: &str) -> Option<(Vec<&str>, u64)> {
	let line = line.strip_suffix('\n').unwrap_or(line);
	let (tokens, count) = line.rsplit_once('\t')?;
	let count = count.parse().ok()?;
	let tokens: Vec<&str> = tokens.split('\t').collect();
	if tokens.iter().any(|t| t.is_empty()) {
		return None;
	}
	Some((tokens, count))
}

/// Count field of a record.
pub fn line_count(line: &str) -> Option<u64> {
	line_ngram(line).map(|(_, count)| count)
}

/// Rotates an n-gram left: `(a, b, c)` becomes `(b, c, a)`.
///
/// In a file of rotated n-grams, the records sharing a prefix `(b, c)` list the
/// predecessors of `(b, c)` in their last token.
pub fn reverse_ngram<S: AsRef<str>>(ngram: &[S]) -> Vec<String> {
	let mut out: Vec<String> = ngram.iter().map(|t| t.as_ref().to_owned()).collect();
	if !out.is_empty() {
		out.rotate_left(1);
	}
	out
}

/// Undoes [`reverse_ngram`].
pub fn unreverse_ngram<S: AsRef<str>>(ngram: &[S]) -> Vec<String> {
	let mut out: Vec<String> = ngram.iter().map(|t| t.as_ref().to_owned()).collect();
	if !out.is_empty() {
		out.rotate_right(1);
	}
	out
}

/// Rotates the n-gram of a record, keeping its count.
pub fn reverse_line(line: &str) -> Option<String> {
	let (tokens, count) = line_ngram(line)?;
	let mut out = reverse_ngram(&tokens).join("\t");
	out.push('\t');
	out.push_str(&count.to_string());
	Some(out)
}

/// Writes the rotated form of every record of `src` to `dst`, sorted.
///
/// The output answers predecessor queries through
/// [`NgramFile::prev_tokens`]. Returns the number of records written.
///
/// # Errors
/// `Corruption` if a line of `src` is not a record.
pub fn write_reversed<P: AsRef<Path>, Q: AsRef<Path>>(src: P, dst: Q, max_bytes: usize) -> Result<u64> {
	let reader = BufReader::new(File::open(src.as_ref())?);

	let mut rotated = Vec::new();
	for (i, line) in reader.lines().enumerate() {
		let line = line?;
		let reversed = reverse_line(&line).ok_or_else(|| {
			Error::Corruption(format!("{}:{}: not an n-gram record", src.as_ref().display(), i + 1))
		})?;
		rotated.push(reversed.into_bytes());
	}

	let mut out = BufWriter::new(File::create(dst.as_ref())?);
	let mut written = 0;
	for line in sort_external(rotated, max_bytes)? {
		out.write_all(&line?)?;
		out.write_all(b"\n")?;
		written += 1;
	}
	out.flush()?;

	log::debug!("{}: {} reversed records", dst.as_ref().display(), written);
	Ok(written)
}

/// Reader over a sorted n-gram file.
pub struct NgramFile<R> {
	reader: R,
	size: u64,
	line: Vec<u8>,
}

impl NgramFile<BufReader<File>> {
	pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
		Self::new(BufReader::new(File::open(path)?))
	}
}

impl<R: BufRead + Seek> NgramFile<R> {
	pub fn new(mut reader: R) -> Result<Self> {
		let size = reader.seek(SeekFrom::End(0))?;
		Ok(Self { reader, size, line: Vec::new() })
	}

	/// Reads the line starting at the current position into `self.line`,
	/// without its newline. Returns false at end of file.
	fn read_line(&mut self) -> Result<bool> {
		self.line.clear();
		if self.reader.read_until(b'\n', &mut self.line)? == 0 {
			return Ok(false);
		}
		if self.line.last() == Some(&b'\n') {
			self.line.pop();
		}
		Ok(true)
	}

	/// Positions the reader on the first complete line starting at or after
	/// `offset`, returning that line's offset.
	fn seek_line(&mut self, offset: u64) -> Result<u64> {
		if offset == 0 {
			self.reader.seek(SeekFrom::Start(0))?;
			return Ok(0);
		}

		// a line starts at `offset` only if the byte before it is a newline
		self.reader.seek(SeekFrom::Start(offset - 1))?;
		let mut skipped = Vec::new();
		let skip = self.reader.read_until(b'\n', &mut skipped)?;
		Ok(offset - 1 + skip as u64)
	}

	/// Byte offset of the first line that compares >= `prefix`.
	fn lower_bound(&mut self, prefix: &[u8]) -> Result<u64> {
		let (mut lo, mut hi) = (0, self.size);
		while lo < hi {
			let mid = lo + (hi - lo) / 2;
			self.seek_line(mid)?;
			let at_or_after = !self.read_line()? || self.line.as_slice() >= prefix;
			if at_or_after {
				hi = mid;
			} else {
				lo = mid + 1;
			}
		}
		self.seek_line(lo)
	}

	/// Calls `f` with every line starting with `prefix`, in file order.
	fn scan<F>(&mut self, prefix: &[u8], mut f: F) -> Result<()>
	where
		F: FnMut(&[u8]) -> Result<()>,
	{
		let start = self.lower_bound(prefix)?;
		self.reader.seek(SeekFrom::Start(start))?;
		while self.read_line()? && self.line.starts_with(prefix) {
			f(&self.line)?;
		}
		Ok(())
	}

	fn parse(line: &[u8]) -> Result<(Vec<String>, u64)> {
		let text = std::str::from_utf8(line).map_err(|e| Error::Corruption(format!("record is not UTF-8: {e}")))?;
		let (tokens, count) =
			line_ngram(text).ok_or_else(|| Error::Corruption(format!("not an n-gram record: {text:?}")))?;
		Ok((tokens.into_iter().map(str::to_owned).collect(), count))
	}

	/// Sums the counts of every record starting with `ngram`.
	pub fn count<S: AsRef<str>>(&mut self, ngram: &[S]) -> Result<u64> {
		let mut total = 0;
		self.scan(&record_prefix(ngram), |line| {
			total += Self::parse(line)?.1;
			Ok(())
		})?;
		Ok(total)
	}

	/// Distinct tokens that follow `ngram` in some record, ascending.
	pub fn next_tokens<S: AsRef<str>>(&mut self, ngram: &[S]) -> Result<Vec<String>> {
		let depth = ngram.len();
		let mut tokens: Vec<String> = Vec::new();
		self.scan(&record_prefix(ngram), |line| {
			let (record, _) = Self::parse(line)?;
			if let Some(next) = record.into_iter().nth(depth) {
				if tokens.last() != Some(&next) {
					tokens.push(next);
				}
			}
			Ok(())
		})?;
		Ok(tokens)
	}

	/// Predecessors of `ngram`, when this file holds rotated records
	/// (see [`write_reversed`]).
	pub fn prev_tokens<S: AsRef<str>>(&mut self, ngram: &[S]) -> Result<Vec<String>> {
		self.next_tokens(ngram)
	}

	/// Every n-gram whose first token is `token`, with its count.
	pub fn token_ngrams(&mut self, token: &str) -> Result<Vec<(Vec<String>, u64)>> {
		let mut out = Vec::new();
		self.scan(&record_prefix(&[token]), |line| {
			out.push(Self::parse(line)?);
			Ok(())
		})?;
		Ok(out)
	}

	/// Every n-gram whose text starts with `prefix`.
	///
	/// Unlike the other queries the last token may be partial, so
	/// `complete(&["the", "be"])` finds `the best ...` and `the bears ...`.
	pub fn complete<S: AsRef<str>>(&mut self, prefix: &[S]) -> Result<Vec<Vec<String>>> {
		let mut raw = record_prefix(prefix);
		raw.pop();

		let mut out = Vec::new();
		self.scan(&raw, |line| {
			out.push(Self::parse(line)?.0);
			Ok(())
		})?;
		Ok(out)
	}

	/// Number of records in the file.
	pub fn length(&mut self) -> Result<u64> {
		self.reader.seek(SeekFrom::Start(0))?;
		let mut lines = 0;
		while self.read_line()? {
			lines += 1;
		}
		Ok(lines)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Cursor;

	const LISTING: &str = "\
a\tcat\tsat\t1
a\tdog\tsat\t2
cat\tsat\ton\t1
dog\tsat\tdown\t2
sat\tdown\t</∅>\t2
sat\ton\tthe\t1
the\tcat\tsat\t4
the\tdog\t3
the\tmat\t</∅>\t1
";

	fn listing() -> NgramFile<Cursor<Vec<u8>>> {
		NgramFile::new(Cursor::new(LISTING.as_bytes().to_vec())).unwrap()
	}

	#[test]
	fn test_count() {
		let mut file = listing();

		// first and last line
		assert_eq!(1, file.count(&["a", "cat", "sat"]).unwrap());
		assert_eq!(1, file.count(&["the", "mat", "</∅>"]).unwrap());

		assert_eq!(3, file.count(&["a"]).unwrap());
		assert_eq!(8, file.count(&["the"]).unwrap());
		assert_eq!(4, file.count(&["the", "cat"]).unwrap());

		// not found, before, between and after the records
		assert_eq!(0, file.count(&["0"]).unwrap());
		assert_eq!(0, file.count(&["b"]).unwrap());
		assert_eq!(0, file.count(&["zzz"]).unwrap());

		// "th" must not match "the"
		assert_eq!(0, file.count(&["th"]).unwrap());
	}

	#[test]
	fn test_next_tokens() {
		let mut file = listing();
		assert_eq!(vec!["cat", "dog", "mat"], file.next_tokens(&["the"]).unwrap());
		assert_eq!(vec!["sat"], file.next_tokens(&["a", "cat"]).unwrap());
		// "the dog" ends a record
		assert!(file.next_tokens(&["the", "dog"]).unwrap().is_empty());
		assert!(file.next_tokens(&["nothing"]).unwrap().is_empty());
	}

	#[test]
	fn test_token_ngrams() {
		let mut file = listing();
		let ngrams = file.token_ngrams("sat").unwrap();
		assert_eq!(
			vec![
				(vec!["sat".to_owned(), "down".to_owned(), "</∅>".to_owned()], 2),
				(vec!["sat".to_owned(), "on".to_owned(), "the".to_owned()], 1),
			],
			ngrams
		);
	}

	#[test]
	fn test_complete() {
		let mut file = listing();
		let found = file.complete(&["the", "d"]).unwrap();
		assert_eq!(vec![vec!["the".to_owned(), "dog".to_owned()]], found);

		assert_eq!(3, file.complete(&["th"]).unwrap().len());
	}

	#[test]
	fn test_length() {
		assert_eq!(9, listing().length().unwrap());

		let mut empty = NgramFile::new(Cursor::new(Vec::new())).unwrap();
		assert_eq!(0, empty.length().unwrap());
		assert_eq!(0, empty.count(&["a"]).unwrap());
	}

	#[test]
	fn test_line_helpers() {
		assert!(is_ngram("the\tcat\t4"));
		assert!(!is_ngram("the cat 4"));
		assert!(!is_ngram("the\tcat\tfour"));
		assert!(!is_ngram("\t4"));

		assert_eq!(Some((vec!["the", "cat"], 4)), line_ngram("the\tcat\t4\n"));
		assert_eq!(Some(4), line_count("the\tcat\t4"));

		assert_eq!(Some("cat\tsat\tthe\t4".to_owned()), reverse_line("the\tcat\tsat\t4"));
		assert_eq!(None, reverse_line("garbage"));

		let ngram = ["the", "cat", "sat"];
		assert_eq!(vec!["cat", "sat", "the"], reverse_ngram(&ngram));
		assert_eq!(ngram.to_vec(), unreverse_ngram(&reverse_ngram(&ngram)));
	}

	#[test]
	fn test_write_reversed() {
		let dir = tempfile::tempdir().unwrap();
		let src = dir.path().join("fwd");
		let dst = dir.path().join("rev");
		std::fs::write(&src, LISTING).unwrap();

		assert_eq!(9, write_reversed(&src, &dst, 16).unwrap());

		let mut rev = NgramFile::open(&dst).unwrap();
		assert_eq!(9, rev.length().unwrap());
		// predecessors of "cat sat" and of "sat on"
		assert_eq!(vec!["a", "the"], rev.prev_tokens(&["cat", "sat"]).unwrap());
		assert_eq!(vec!["cat"], rev.prev_tokens(&["sat", "on"]).unwrap());
	}
}
