//! Bounded-memory counting and sorting of byte strings.
//!
//! [`MergeCounter`] sums `(key, count)` items that may not fit in memory by
//! spilling sorted runs to temporary files and k-way merging them at the end.
//! [`NgramCounter`] feeds it the n-grams of a corpus, and [`sort_external`]
//! applies the same spill-and-merge scheme to a plain stream of strings.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, VecDeque};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::iter::Peekable;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::model::config::CounterConfig;
use crate::model::ngram_model::sentence;
use crate::skiplist::Skiplist;
use crate::tokenizer::Tokenizer;
use crate::varint;

/// A counted item: key bytes and the number of times it was seen.
pub type KeyCount = (Vec<u8>, u64);

type Source<'a, T> = Box<dyn Iterator<Item = Result<T>> + 'a>;

/// Sizing hint for the in-memory count buffer.
const BUFFER_HINT: usize = 1 << 20;

/// K-way merge of already sorted, fallible sources.
///
/// Yields items in ascending order; equal items come out in source order.
/// The first error from any source is yielded once and ends the merge.
pub struct KMerge<'a, T> {
	sources: Vec<Source<'a, T>>,
	heap: BinaryHeap<Reverse<(T, usize)>>,
	primed: bool,
	failed: bool,
}

impl<'a, T: Ord> KMerge<'a, T> {
	pub fn new(sources: Vec<Source<'a, T>>) -> Self {
		let heap = BinaryHeap::with_capacity(sources.len());
		Self { sources, heap, primed: false, failed: false }
	}

	fn pull(&mut self, source: usize) -> Result<()> {
		match self.sources[source].next() {
			Some(Ok(item)) => self.heap.push(Reverse((item, source))),
			Some(Err(e)) => return Err(e),
			None => {}
		}
		Ok(())
	}
}

impl<T: Ord> Iterator for KMerge<'_, T> {
	type Item = Result<T>;

	fn next(&mut self) -> Option<Self::Item> {
		if self.failed {
			return None;
		}
		if !self.primed {
			self.primed = true;
			for source in 0..self.sources.len() {
				if let Err(e) = self.pull(source) {
					self.failed = true;
					return Some(Err(e));
				}
			}
		}

		let Reverse((item, source)) = self.heap.pop()?;
		if let Err(e) = self.pull(source) {
			self.failed = true;
			return Some(Err(e));
		}
		Some(Ok(item))
	}
}

/// Merges sorted `(key, count)` sources, summing the counts of equal keys.
///
/// Output keys are strictly ascending.
pub struct SumMerge<'a> {
	inner: Peekable<KMerge<'a, KeyCount>>,
}

impl<'a> SumMerge<'a> {
	pub fn new(sources: Vec<Source<'a, KeyCount>>) -> Self {
		Self { inner: KMerge::new(sources).peekable() }
	}
}

impl Iterator for SumMerge<'_> {
	type Item = Result<KeyCount>;

	fn next(&mut self) -> Option<Self::Item> {
		let (key, mut count) = match self.inner.next()? {
			Ok(item) => item,
			Err(e) => return Some(Err(e)),
		};

		while let Some(Ok((next, _))) = self.inner.peek() {
			if *next != key {
				break;
			}
			if let Some(Ok((_, more))) = self.inner.next() {
				count += more;
			}
		}

		Some(Ok((key, count)))
	}
}

/// Sorted counts produced by [`MergeCounter::count`].
pub type MergedCounts = SumMerge<'static>;

/// A sorted run of `key SP count\n` records in an anonymous temporary file.
struct Spill {
	file: File,
}

impl Spill {
	fn write<I>(file: File, items: I) -> Result<Self>
	where
		I: Iterator<Item = Result<KeyCount>>,
	{
		let mut out = BufWriter::new(file);
		for item in items {
			let (key, count) = item?;
			if key.contains(&b'\n') {
				return Err(Error::InvalidToken(String::from_utf8_lossy(&key).into_owned()));
			}
			out.write_all(&key)?;
			writeln!(out, " {count}")?;
		}

		let mut file = out.into_inner().map_err(|e| e.into_error())?;
		file.seek(SeekFrom::Start(0))?;
		Ok(Self { file })
	}

	fn into_counts(self) -> SpillCounts {
		SpillCounts { reader: BufReader::new(self.file), line: Vec::new() }
	}
}

struct SpillCounts {
	reader: BufReader<File>,
	line: Vec<u8>,
}

impl SpillCounts {
	fn read(&mut self) -> Result<Option<KeyCount>> {
		self.line.clear();
		if self.reader.read_until(b'\n', &mut self.line)? == 0 {
			return Ok(None);
		}
		if self.line.pop() != Some(b'\n') {
			return Err(Error::Corruption("spill record without newline".to_owned()));
		}

		let split = self
			.line
			.iter()
			.rposition(|&b| b == b' ')
			.ok_or_else(|| Error::Corruption("spill record without count".to_owned()))?;
		let count = std::str::from_utf8(&self.line[split + 1..])
			.ok()
			.and_then(|s| s.parse::<u64>().ok())
			.ok_or_else(|| Error::Corruption("spill record with a bad count".to_owned()))?;

		Ok(Some((self.line[..split].to_vec(), count)))
	}
}

impl Iterator for SpillCounts {
	type Item = Result<KeyCount>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read().transpose()
	}
}

/// Counts byte-string items with tunable memory usage.
///
/// Keeps an in-memory count until the buffered key bytes exceed `max_bytes`,
/// then flushes the counts to a sorted spill file. Once `max_fds` spills
/// exist, a flush merges the oldest spill with the in-memory run instead of
/// opening one more, so at most `max_fds + 1` files are open at any time.
///
/// Keys must not contain `\n`. They may contain spaces: a spill record is
/// split on its last space.
#[derive(Clone, Debug)]
pub struct MergeCounter {
	max_bytes: usize,
	max_fds: usize,
	spill_dir: Option<PathBuf>,
}

impl Default for MergeCounter {
	fn default() -> Self {
		Self::with_config(&CounterConfig::default())
	}
}

impl MergeCounter {
	pub fn new(max_bytes: usize, max_fds: usize) -> Self {
		Self { max_bytes, max_fds: max_fds.max(1), spill_dir: None }
	}

	pub fn with_config(config: &CounterConfig) -> Self {
		Self {
			max_bytes: config.max_bytes,
			max_fds: config.max_fds.max(1),
			spill_dir: config.spill_dir.clone(),
		}
	}

	fn tempfile(&self) -> Result<File> {
		let file = match &self.spill_dir {
			Some(dir) => tempfile::tempfile_in(dir)?,
			None => tempfile::tempfile()?,
		};
		Ok(file)
	}

	/// Counts `items`, returning `(key, total)` pairs in ascending key order.
	///
	/// The whole input is consumed before this returns; the merge of the
	/// spills happens lazily while the result is iterated.
	///
	/// # Errors
	/// Any spill I/O error. An error yielded by the returned iterator means
	/// everything it produced so far must be discarded.
	pub fn count<I>(&self, items: I) -> Result<MergedCounts>
	where
		I: IntoIterator<Item = KeyCount>,
	{
		let mut buffer: Skiplist<Vec<u8>, u64> = Skiplist::new(BUFFER_HINT);
		let mut spills = VecDeque::new();
		let mut used = 0usize;

		for (key, count) in items {
			match buffer.get(&key).copied() {
				Some(seen) => buffer.insert(key, seen + count),
				None => {
					used += key.len();
					buffer.insert(key, count);
				}
			}

			if used > self.max_bytes {
				log::debug!("overflow: {} items, {} bytes", buffer.len(), used);
				self.overflow(&mut buffer, &mut spills)?;
				used = 0;
			}
		}

		log::debug!("merging {} overflow files", spills.len());

		let mut sources: Vec<Source<'static, KeyCount>> = Vec::with_capacity(spills.len() + 1);
		sources.push(Box::new(buffer.drain().into_iter().map(Ok)));
		for spill in spills {
			sources.push(Box::new(spill.into_counts()));
		}

		Ok(SumMerge::new(sources))
	}

	fn overflow(&self, buffer: &mut Skiplist<Vec<u8>, u64>, spills: &mut VecDeque<Spill>) -> Result<()> {
		let run: Source<'static, KeyCount> = Box::new(buffer.drain().into_iter().map(Ok));

		let spill = if spills.len() >= self.max_fds {
			match spills.pop_front() {
				Some(oldest) => {
					let merged = SumMerge::new(vec![run, Box::new(oldest.into_counts())]);
					Spill::write(self.tempfile()?, merged)?
				}
				None => Spill::write(self.tempfile()?, run)?,
			}
		} else {
			Spill::write(self.tempfile()?, run)?
		};

		spills.push_back(spill);
		Ok(())
	}
}

/// Extracts lexically sorted n-gram counts from a corpus.
///
/// Each line is tokenized and, when padding is on, wrapped in the sentence
/// sentinels exactly as training does. Keys are the tokens of an n-gram
/// joined by TAB unless another separator is set.
pub struct NgramCounter<'t> {
	tokenizer: &'t dyn Tokenizer,
	counter: MergeCounter,
	pad: bool,
	separator: char,
}

impl<'t> NgramCounter<'t> {
	pub fn new(tokenizer: &'t dyn Tokenizer, counter: MergeCounter) -> Self {
		Self { tokenizer, counter, pad: false, separator: '\t' }
	}

	pub fn padded(mut self, pad: bool) -> Self {
		self.pad = pad;
		self
	}

	/// Joins the tokens of a key with `separator`.
	///
	/// With `'\0'`, every n-gram sorts right after its own prefix and before
	/// any other key starting with the same bytes.
	pub fn separated_by(mut self, separator: char) -> Self {
		self.separator = separator;
		self
	}

	/// Counts the n-grams of the given `orders` found in `lines`.
	pub fn count<I, S>(&self, lines: I, orders: &[usize]) -> Result<MergedCounts>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let tokenizer = self.tokenizer;
		let pad = self.pad;

		self.count_tokens(
			lines.into_iter().map(move |line| {
				let tokens = tokenizer.split(line.as_ref());
				if pad { sentence(tokens) } else { tokens }
			}),
			orders,
		)
	}

	/// Counts the n-grams of already tokenized sentences. No padding is added.
	pub fn count_tokens<I>(&self, sentences: I, orders: &[usize]) -> Result<MergedCounts>
	where
		I: IntoIterator<Item = Vec<String>>,
	{
		let orders: Vec<usize> = orders.iter().copied().filter(|&n| n > 0).collect();
		let mut separator = [0u8; 4];
		let separator: &str = self.separator.encode_utf8(&mut separator);

		let items = sentences.into_iter().flat_map(|tokens| {
			let mut keys = Vec::new();
			for &n in &orders {
				for ngram in tokens.windows(n) {
					keys.push((ngram.join(separator).into_bytes(), 1));
				}
			}
			keys
		});

		self.counter.count(items)
	}
}

/// Records of a sorted chunk: varint length followed by the bytes.
struct ChunkStrings {
	reader: BufReader<File>,
}

impl ChunkStrings {
	fn read(&mut self) -> Result<Option<Vec<u8>>> {
		let Some(len) = varint::read_one(&mut self.reader)? else {
			return Ok(None);
		};
		let mut item = vec![0u8; len as usize];
		self.reader.read_exact(&mut item)?;
		Ok(Some(item))
	}
}

impl Iterator for ChunkStrings {
	type Item = Result<Vec<u8>>;

	fn next(&mut self) -> Option<Self::Item> {
		self.read().transpose()
	}
}

/// Sorted strings produced by [`sort_external`].
pub type SortedStrings = KMerge<'static, Vec<u8>>;

fn flush_chunk(items: &mut Vec<Vec<u8>>) -> Result<ChunkStrings> {
	items.sort_unstable();

	let mut out = BufWriter::new(tempfile::tempfile()?);
	for item in items.drain(..) {
		varint::write_one(item.len() as u64, &mut out)?;
		out.write_all(&item)?;
	}

	let mut file = out.into_inner().map_err(|e| e.into_error())?;
	file.seek(SeekFrom::Start(0))?;
	Ok(ChunkStrings { reader: BufReader::new(file) })
}

/// Sorts the byte strings of `items`, spilling to disk when they don't fit.
///
/// Strings are buffered until their total length exceeds `max_bytes`, then
/// written to a sorted chunk file. The result merges the chunks with the
/// final in-memory batch. Duplicates are kept.
pub fn sort_external<I>(items: I, max_bytes: usize) -> Result<SortedStrings>
where
	I: IntoIterator<Item = Vec<u8>>,
{
	let mut batch = Vec::new();
	let mut chunks = Vec::new();
	let mut used = 0usize;

	for item in items {
		used += item.len();
		batch.push(item);

		if used > max_bytes {
			log::debug!("sort chunk: {} items, {} bytes", batch.len(), used);
			chunks.push(flush_chunk(&mut batch)?);
			used = 0;
		}
	}

	batch.sort_unstable();

	let mut sources: Vec<Source<'static, Vec<u8>>> = Vec::with_capacity(chunks.len() + 1);
	sources.push(Box::new(batch.into_iter().map(Ok)));
	for chunk in chunks {
		sources.push(Box::new(chunk));
	}

	Ok(KMerge::new(sources))
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::tokenizer::WhitespaceTokenizer;
	use rand::SeedableRng;
	use rand::rngs::StdRng;
	use rand::seq::SliceRandom;

	/// A few n-grams of a short README.
	fn readme_items() -> Vec<(&'static str, u64)> {
		vec![
			("an", 1),
			("an on-disk", 1),
			("an on-disk data", 1),
			("can", 3),
			("can read", 2),
			("can read about", 1),
			("can read about its", 1),
		]
	}

	/// Repeats each key as many times as its count, shuffled.
	fn unit_increments(items: &[(&str, u64)], seed: u64) -> Vec<KeyCount> {
		let mut out: Vec<KeyCount> = items
			.iter()
			.flat_map(|(key, count)| (0..*count).map(move |_| (key.as_bytes().to_vec(), 1)))
			.collect();
		out.shuffle(&mut StdRng::seed_from_u64(seed));
		out
	}

	fn as_strings(counts: MergedCounts) -> Vec<(String, u64)> {
		counts
			.map(|item| {
				let (key, count) = item.unwrap();
				(String::from_utf8(key).unwrap(), count)
			})
			.collect()
	}

	fn expected(items: &[(&str, u64)]) -> Vec<(String, u64)> {
		let mut out: Vec<(String, u64)> = items.iter().map(|(k, c)| (k.to_string(), *c)).collect();
		out.sort();
		out
	}

	#[test]
	fn test_count() {
		let counter = MergeCounter::default();
		let counts = counter.count(unit_increments(&readme_items(), 1)).unwrap();
		assert_eq!(expected(&readme_items()), as_strings(counts));
	}

	#[test]
	fn test_count_overflow() {
		// every new key forces a spill
		let counter = MergeCounter::new(1, 32);
		let counts = counter.count(unit_increments(&readme_items(), 2)).unwrap();
		assert_eq!(expected(&readme_items()), as_strings(counts));
	}

	#[test]
	fn test_count_overflow_merge() {
		// every spill is merged into the single allowed file
		let counter = MergeCounter::new(1, 1);
		let counts = counter.count(unit_increments(&readme_items(), 3)).unwrap();
		assert_eq!(expected(&readme_items()), as_strings(counts));
	}

	#[test]
	fn test_bounded_memory_scenario() {
		let items = [("an", 1), ("can", 3), ("can read", 2)];
		for seed in 0..10 {
			let counter = MergeCounter::new(1, 32);
			let counts = counter.count(unit_increments(&items, seed)).unwrap();
			assert_eq!(
				vec![("an".to_owned(), 1), ("can".to_owned(), 3), ("can read".to_owned(), 2)],
				as_strings(counts)
			);
		}
	}

	#[test]
	fn test_count_empty() {
		let counter = MergeCounter::new(1, 1);
		assert!(as_strings(counter.count(Vec::new()).unwrap()).is_empty());
	}

	#[test]
	fn test_newline_key() {
		let counter = MergeCounter::new(1, 1);
		let result = counter.count(vec![(b"bad\nkey".to_vec(), 1)]);
		assert!(matches!(result, Err(Error::InvalidToken(_))));
	}

	#[test]
	fn test_spill_format() {
		let items: Vec<Result<KeyCount>> =
			expected(&readme_items()).into_iter().map(|(k, c)| Ok((k.into_bytes(), c))).collect();

		let mut spill = Spill::write(tempfile::tempfile().unwrap(), items.into_iter()).unwrap();
		let mut contents = String::new();
		spill.file.read_to_string(&mut contents).unwrap();
		assert_eq!(
			"an 1\nan on-disk 1\nan on-disk data 1\ncan 3\ncan read 2\ncan read about 1\ncan read about its 1\n",
			contents
		);

		spill.file.seek(SeekFrom::Start(0)).unwrap();
		let read: Vec<KeyCount> = spill.into_counts().map(Result::unwrap).collect();
		assert_eq!(7, read.len());
		assert_eq!((b"can read".to_vec(), 2), read[4]);
	}

	#[test]
	fn test_sum_merge() {
		let items = || -> Source<'static, KeyCount> {
			Box::new(vec![(b"one".to_vec(), 1), (b"two".to_vec(), 2)].into_iter().map(Ok))
		};

		let merged: Vec<KeyCount> = SumMerge::new(vec![items(), items()]).map(Result::unwrap).collect();
		assert_eq!(vec![(b"one".to_vec(), 2), (b"two".to_vec(), 4)], merged);
	}

	#[test]
	fn test_merge_stops_on_error() {
		let good: Source<'static, KeyCount> = Box::new(vec![Ok((b"a".to_vec(), 1))].into_iter());
		let bad: Source<'static, KeyCount> = Box::new(vec![Err(Error::Truncated)].into_iter());

		let mut merged = SumMerge::new(vec![good, bad]);
		assert!(matches!(merged.next(), Some(Err(Error::Truncated))));
		assert!(merged.next().is_none());
	}

	#[test]
	fn test_ngram_counter() {
		let tokenizer = WhitespaceTokenizer;
		let counter = NgramCounter::new(&tokenizer, MergeCounter::default());

		let lines = [
			"foo bar",
			"foo bar baz",
			"foo bar baz",
			"foo bar baz",
			"foo bar baz",
			"foo bar baz2",
			"foo bar baz2",
		];

		let expected = vec![
			("bar".to_owned(), 7),
			("bar\tbaz".to_owned(), 4),
			("bar\tbaz2".to_owned(), 2),
			("baz".to_owned(), 4),
			("baz2".to_owned(), 2),
			("foo".to_owned(), 7),
			("foo\tbar".to_owned(), 7),
			("foo\tbar\tbaz".to_owned(), 4),
			("foo\tbar\tbaz2".to_owned(), 2),
		];
		assert_eq!(expected, as_strings(counter.count(lines, &[3, 2, 1]).unwrap()));

		// no 4-grams in the above
		assert!(as_strings(counter.count(lines, &[4]).unwrap()).is_empty());
	}

	#[test]
	fn test_ngram_counter_padded() {
		let tokenizer = WhitespaceTokenizer;
		let counter = NgramCounter::new(&tokenizer, MergeCounter::new(1, 2)).padded(true);

		let counts = as_strings(counter.count(["a b", "a"], &[2]).unwrap());
		assert_eq!(
			vec![
				("<∅>\ta".to_owned(), 2),
				("a\t</∅>".to_owned(), 1),
				("a\tb".to_owned(), 1),
				("b\t</∅>".to_owned(), 1),
			],
			counts
		);
	}

	#[test]
	fn test_ngram_counter_tokens() {
		let tokenizer = WhitespaceTokenizer;
		let counter = NgramCounter::new(&tokenizer, MergeCounter::new(1, 2)).separated_by('\0');

		let sentences = vec![vec!["a".to_owned(), "a\u{1}".to_owned()], vec!["a".to_owned(), "b".to_owned()]];
		let counts = as_strings(counter.count_tokens(sentences, &[1, 2]).unwrap());
		assert_eq!(
			vec![
				("a".to_owned(), 2),
				("a\0a\u{1}".to_owned(), 1),
				("a\0b".to_owned(), 1),
				("a\u{1}".to_owned(), 1),
				("b".to_owned(), 1),
			],
			counts
		);
	}

	#[test]
	fn test_sort_external() {
		let mut words: Vec<Vec<u8>> = (0..500).map(|i| format!("word{}", i % 97).into_bytes()).collect();
		words.shuffle(&mut StdRng::seed_from_u64(4));

		let sorted: Vec<Vec<u8>> = sort_external(words.clone(), 64).unwrap().map(Result::unwrap).collect();

		words.sort();
		assert_eq!(words, sorted);
	}
}
