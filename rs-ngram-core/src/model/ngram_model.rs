use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::counter::{MergeCounter, NgramCounter, sort_external};
use crate::error::{Error, Result};
use crate::io::LineLog;
use crate::model::config::ModelConfig;
use crate::model::frozen::FreezeWriter;
use crate::model::registry::{SEPARATORS, TokenId, TokenRegistry};
use crate::tokenizer::{Tokenizer, WhitespaceTokenizer};

/// Sentinel opening every trained text.
pub const START_TOKEN: &str = "<∅>";

/// Sentinel closing every trained text.
pub const END_TOKEN: &str = "</∅>";

pub const TOKENS_LOG: &str = "tokens.log";
pub const NGRAM_LOG: &str = "ngram.log";

/// Highest order a model can be opened with.
pub const MAX_ORDER: usize = 32;

/// Wraps a token sequence in the sentence sentinels.
pub fn sentence(tokens: Vec<String>) -> Vec<String> {
	let mut padded = Vec::with_capacity(tokens.len() + 2);
	padded.push(START_TOKEN.to_owned());
	padded.extend(tokens);
	padded.push(END_TOKEN.to_owned());
	padded
}

fn insert_sorted(list: &mut Vec<TokenId>, token: TokenId) {
	if let Err(pos) = list.binary_search(&token) {
		list.insert(pos, token);
	}
}

/// In-memory counts of every order, plus the graph used for generation.
#[derive(Debug, Default)]
struct Tables {
	/// `counts[k - 1]` holds the k-grams.
	counts: Vec<HashMap<Vec<TokenId>, u64>>,

	/// Sum of the unigram counts.
	observations: u64,

	/// (N-1)-gram to the sorted tokens seen after it.
	next: HashMap<Vec<TokenId>, Vec<TokenId>>,

	/// (N-1)-gram to the sorted tokens seen before it.
	prev: HashMap<Vec<TokenId>, Vec<TokenId>>,

	/// Token to the N-grams starting with it, in first-seen order.
	pivots: HashMap<TokenId, Vec<Box<[TokenId]>>>,
}

impl Tables {
	fn new(order: usize) -> Self {
		Self { counts: vec![HashMap::new(); order], ..Self::default() }
	}

	fn order(&self) -> usize {
		self.counts.len()
	}

	/// Counts every n-gram of every order in a padded sentence.
	fn observe(&mut self, ids: &[TokenId]) {
		let order = self.order();
		self.observations += ids.len() as u64;

		for k in 1..=order {
			for ngram in ids.windows(k) {
				let count = self.counts[k - 1].entry(ngram.to_vec()).or_insert(0);
				*count += 1;
				let first = *count == 1;
				if k == order && first {
					self.link(ngram);
				}
			}
		}
	}

	fn link(&mut self, ngram: &[TokenId]) {
		let n = ngram.len();
		insert_sorted(self.next.entry(ngram[..n - 1].to_vec()).or_default(), ngram[n - 1]);
		insert_sorted(self.prev.entry(ngram[1..].to_vec()).or_default(), ngram[0]);
		self.pivots.entry(ngram[0]).or_default().push(ngram.into());
	}
}

/// Rebuilds sentences from the n-gram log.
///
/// A transaction is the run of N-grams of one trained text: it starts with
/// the n-gram the previous one completed, and ends with an n-gram whose
/// last token is the end sentinel.
struct Replay {
	order: usize,
	start: TokenId,
	end: TokenId,
	/// Padded sentence of the open transaction.
	pending: Vec<TokenId>,
	ngrams: usize,
	transactions: usize,
	skipped: usize,
}

impl Replay {
	fn new(order: usize, start: TokenId, end: TokenId) -> Self {
		Self { order, start, end, pending: Vec::new(), ngrams: 0, transactions: 0, skipped: 0 }
	}

	fn record(&mut self, line: &[u8], registry: &TokenRegistry, tables: &mut Tables) -> Result<()> {
		if line.is_empty() {
			return Ok(());
		}

		let text = std::str::from_utf8(line)
			.map_err(|e| Error::Corruption(format!("{NGRAM_LOG} record is not UTF-8: {e}")))?;
		let ngram = text
			.split('\t')
			.map(|token| {
				registry
					.find(token)
					.ok_or_else(|| Error::Corruption(format!("{NGRAM_LOG} references unknown token {token:?}")))
			})
			.collect::<Result<Vec<_>>>()?;

		if ngram.len() != self.order {
			return Err(Error::Corruption(format!(
				"{NGRAM_LOG} record {text:?} has {} tokens, expected {}",
				ngram.len(),
				self.order
			)));
		}

		if ngram[0] == self.start && self.ngrams > 0 {
			log::warn!("skipping incomplete ngram transaction");
			self.reset();
			self.skipped += 1;
		}

		if self.ngrams == 0 {
			self.pending.extend_from_slice(&ngram);
		} else {
			let overlap = &self.pending[self.pending.len() - (self.order - 1)..];
			if overlap != &ngram[..self.order - 1] {
				return Err(Error::Corruption(format!(
					"{NGRAM_LOG} record {text:?} does not continue its transaction"
				)));
			}
			self.pending.push(ngram[self.order - 1]);
		}
		self.ngrams += 1;

		if ngram[self.order - 1] == self.end {
			tables.observe(&self.pending);
			self.transactions += 1;
			self.reset();
		}
		Ok(())
	}

	fn reset(&mut self) {
		self.pending.clear();
		self.ngrams = 0;
	}

	fn finish(&mut self) {
		if self.ngrams > 0 {
			log::warn!("skipping incomplete ngram transaction at end");
			self.skipped += 1;
			self.reset();
		}
	}
}

/// Trainable n-gram language model stored in a directory.
///
/// # Responsibilities
/// - Register tokens and log the N-grams of every trained text
/// - Keep the counts of every order 1..=N in memory
/// - Answer count and probability queries
/// - Freeze its counts to per-order record files
///
/// # Invariants
/// - Every trained text is padded with exactly one start and one end sentinel
/// - The n-gram log is enough to rebuild every in-memory count
/// - Writes go to the token log, then the n-gram log, then memory
///
/// # Directory layout
/// - `model.toml`: settings, see [`ModelConfig`]
/// - `tokens.log`: one token per line
/// - `ngram.log`: TAB-joined N-grams, one per line
/// - `1grams` .. `Ngrams`: frozen records, see [`crate::model::frozen`]
pub struct Model {
	path: PathBuf,
	config: ModelConfig,
	registry: TokenRegistry,
	tables: Tables,
	log: LineLog,
	tokenizer: Box<dyn Tokenizer>,
	start: TokenId,
	end: TokenId,
}

impl Model {
	/// Opens the model in `path` with whitespace tokenization.
	pub fn open<P: AsRef<Path>>(path: P, order: usize) -> Result<Self> {
		Self::open_with(path, ModelConfig::with_order(order), Box::new(WhitespaceTokenizer))
	}

	/// Opens (or creates) the model in `path` and replays its logs.
	///
	/// Settings already stored in the directory take precedence over `config`,
	/// except for the order, which must match.
	///
	/// # Errors
	/// - `OrderOutOfRange` if `config.order` is not in `1..=MAX_ORDER`.
	/// - `OrderMismatch` if the directory holds a model of another order.
	/// - `Corruption` if a log cannot be replayed.
	pub fn open_with<P: AsRef<Path>>(path: P, config: ModelConfig, tokenizer: Box<dyn Tokenizer>) -> Result<Self> {
		let order = config.order;
		if !(1..=MAX_ORDER).contains(&order) {
			return Err(Error::OrderOutOfRange { order, max: MAX_ORDER });
		}

		let path = path.as_ref().to_path_buf();
		fs::create_dir_all(&path)?;
		let config = ModelConfig::load_or_store(&path, config)?;

		let mut registry = TokenRegistry::open(path.join(TOKENS_LOG))?;
		let start = registry.get_id(START_TOKEN)?;
		let end = registry.get_id(END_TOKEN)?;

		let mut tables = Tables::new(order);
		let mut replay = Replay::new(order, start, end);
		let log = LineLog::open(path.join(NGRAM_LOG), |line| replay.record(line, &registry, &mut tables))?;
		replay.finish();

		log::info!(
			"{}: order {order}, {} tokens, {} transactions replayed ({} skipped)",
			path.display(),
			registry.len(),
			replay.transactions,
			replay.skipped
		);

		Ok(Self { path, config, registry, tables, log, tokenizer, start, end })
	}

	pub fn order(&self) -> usize {
		self.tables.order()
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	pub fn config(&self) -> &ModelConfig {
		&self.config
	}

	pub fn registry(&self) -> &TokenRegistry {
		&self.registry
	}

	pub fn tokenizer(&self) -> &dyn Tokenizer {
		self.tokenizer.as_ref()
	}

	pub(crate) fn start_id(&self) -> TokenId {
		self.start
	}

	pub(crate) fn end_id(&self) -> TokenId {
		self.end
	}

	pub(crate) fn successors(&self) -> &HashMap<Vec<TokenId>, Vec<TokenId>> {
		&self.tables.next
	}

	pub(crate) fn predecessors(&self) -> &HashMap<Vec<TokenId>, Vec<TokenId>> {
		&self.tables.prev
	}

	/// N-grams starting with `token`.
	pub(crate) fn pivots(&self, token: TokenId) -> &[Box<[TokenId]>] {
		self.tables.pivots.get(&token).map(Vec::as_slice).unwrap_or_default()
	}

	/// Tokenizes `text` and pads it. Sentinel look-alikes and empty tokens are dropped.
	fn padded(&self, text: &str) -> Vec<String> {
		let mut tokens = self.tokenizer.split(text);
		tokens.retain(|t| !t.is_empty() && t != START_TOKEN && t != END_TOKEN);
		sentence(tokens)
	}

	/// Padded tokens of `text` as training sees them, or `None` when the text
	/// is too short to contain an N-gram.
	///
	/// # Errors
	/// `InvalidToken` if a token contains a newline, a tab or a NUL.
	fn training_sentence(&self, text: &str) -> Result<Option<Vec<String>>> {
		let padded = self.padded(text);
		let order = self.order();
		if padded.len() < order {
			log::debug!("skipping text shorter than order {order}: {text:?}");
			return Ok(None);
		}
		if let Some(token) = padded.iter().find(|t| t.contains(SEPARATORS)) {
			return Err(Error::InvalidToken(token.clone()));
		}
		Ok(Some(padded))
	}

	/// Learns one text.
	///
	/// Texts too short to contain an N-gram once padded are skipped.
	///
	/// # Errors
	/// - `InvalidToken` if a token contains a newline, a tab or a NUL.
	///   Nothing is written in that case.
	/// - `Io` if a log write fails.
	pub fn train(&mut self, text: &str) -> Result<()> {
		let Some(padded) = self.training_sentence(text)? else {
			return Ok(());
		};
		let order = self.order();

		let ids = padded.iter().map(|token| self.registry.get_id(token)).collect::<Result<Vec<_>>>()?;

		for ngram in padded.windows(order) {
			self.log.append(ngram.join("\t").as_bytes())?;
		}
		self.log.flush()?;

		self.tables.observe(&ids);
		Ok(())
	}

	/// Learns every text of `texts`, returning how many were given.
	pub fn train_all<I, S>(&mut self, texts: I) -> Result<usize>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut trained = 0;
		for text in texts {
			self.train(text.as_ref())?;
			trained += 1;
		}
		Ok(trained)
	}

	fn check_order(&self, len: usize) -> Result<()> {
		if len == 0 || len > self.order() {
			return Err(Error::OrderOutOfRange { order: len, max: self.order() });
		}
		Ok(())
	}

	/// Ids of `tokens`, or `None` if one of them was never registered.
	fn lookup<S: AsRef<str>>(&self, tokens: &[S]) -> Option<Vec<TokenId>> {
		tokens.iter().map(|t| self.registry.find(t.as_ref())).collect()
	}

	/// Count of an n-gram given by ids. The empty n-gram counts every
	/// unigram observation.
	pub fn count_ids(&self, ids: &[TokenId]) -> u64 {
		match ids.len() {
			0 => self.tables.observations,
			k if k > self.order() => 0,
			k => self.tables.counts[k - 1].get(ids).copied().unwrap_or(0),
		}
	}

	/// Number of times `ngram` was observed.
	///
	/// # Errors
	/// `OrderOutOfRange` unless `1 <= ngram.len() <= N`.
	pub fn get_ngram_count<S: AsRef<str>>(&self, ngram: &[S]) -> Result<u64> {
		self.check_order(ngram.len())?;
		Ok(self.lookup(ngram).map_or(0, |ids| self.count_ids(&ids)))
	}

	/// Counts of `context` and of `context` followed by `token`.
	fn context_counts<S: AsRef<str>>(&self, token: &str, context: &[S]) -> Result<(u64, u64)> {
		self.check_order(context.len() + 1)?;

		let mut ngram: Vec<&str> = context.iter().map(AsRef::as_ref).collect();
		let context_count = self.lookup(&ngram).map_or(0, |ids| self.count_ids(&ids));
		ngram.push(token);
		let count = self.lookup(&ngram).map_or(0, |ids| self.count_ids(&ids));

		Ok((context_count, count))
	}

	/// `log2(count(context)) - log2(count(context + token))`, the information
	/// content of `token` after `context`, in bits.
	///
	/// # Errors
	/// `Unseen` if either count is zero.
	pub fn logprob<S: AsRef<str>>(&self, token: &str, context: &[S]) -> Result<f64> {
		let (context_count, count) = self.context_counts(token, context)?;
		if context_count == 0 || count == 0 {
			let mut ngram: Vec<&str> = context.iter().map(AsRef::as_ref).collect();
			ngram.push(token);
			return Err(Error::Unseen(ngram.join(" ")));
		}
		Ok((context_count as f64).log2() - (count as f64).log2())
	}

	/// Relative frequency of `token` after `context`; 0 if either was never seen.
	pub fn prob<S: AsRef<str>>(&self, token: &str, context: &[S]) -> Result<f64> {
		let (context_count, count) = self.context_counts(token, context)?;
		if context_count == 0 || count == 0 {
			return Ok(0.0);
		}
		Ok(count as f64 / context_count as f64)
	}

	/// Sum of the information content of every N-gram of the padded text.
	///
	/// Returns 0 as soon as one of them was never seen.
	pub fn entropy(&self, text: &str) -> Result<f64> {
		let padded = self.padded(text);

		let mut bits = 0.0;
		for window in padded.windows(self.order()) {
			let Some((token, context)) = window.split_last() else {
				continue;
			};
			match self.logprob(token, context) {
				Ok(b) => bits += b,
				Err(Error::Unseen(_)) => return Ok(0.0),
				Err(e) => return Err(e),
			}
		}
		Ok(bits)
	}

	/// Tokens of an id sequence.
	pub fn spell(&self, ids: &[TokenId]) -> Result<Vec<String>> {
		ids.iter().map(|&id| self.registry.get_token(id).map(str::to_owned)).collect()
	}

	/// Every counted n-gram of every order, in ascending id order.
	///
	/// A prefix always comes right before its extensions, which is the order
	/// [`freeze`](Self::freeze) expects.
	pub fn ngram_counts(&self) -> Vec<(Vec<TokenId>, u64)> {
		let mut all: Vec<(Vec<TokenId>, u64)> = self
			.tables
			.counts
			.iter()
			.flat_map(|counts| counts.iter().map(|(ngram, &count)| (ngram.clone(), count)))
			.collect();
		all.sort_unstable();
		all
	}

	/// Writes `ngrams` to the frozen per-order files of the model directory.
	///
	/// Returns the number of records of each order.
	pub fn freeze<I>(&self, ngrams: I) -> Result<Vec<u32>>
	where
		I: IntoIterator<Item = Result<(Vec<TokenId>, u64)>>,
	{
		log::info!("{}: freezing order {}", self.path.display(), self.order());

		let mut writer = FreezeWriter::create(&self.path, self.order())?;
		for item in ngrams {
			let (ngram, count) = item?;
			writer.push(&ngram, count)?;
		}
		writer.finish()
	}

	/// Freezes the in-memory counts.
	pub fn freeze_counts(&self) -> Result<Vec<u32>> {
		self.freeze(self.ngram_counts().into_iter().map(Ok))
	}

	/// Counts the n-grams of a corpus with bounded memory and freezes them,
	/// without training. New tokens are registered.
	///
	/// Lines are prepared exactly as [`train`](Self::train) prepares texts, so
	/// the frozen counts equal those of training on the same lines.
	///
	/// # Errors
	/// `InvalidToken` as for `train`, in which case nothing is frozen.
	pub fn freeze_corpus<I, S>(&mut self, lines: I) -> Result<Vec<u32>>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let order = self.order();
		let orders: Vec<usize> = (1..=order).collect();

		let mut failed = None;
		let sentences = lines
			.into_iter()
			.map_while(|line| match self.training_sentence(line.as_ref()) {
				Ok(sentence) => Some(sentence),
				Err(e) => {
					failed = Some(e);
					None
				}
			})
			.flatten();
		let counts = NgramCounter::new(self.tokenizer.as_ref(), MergeCounter::with_config(&self.config.counter))
			.separated_by('\0')
			.count_tokens(sentences, &orders)?;
		if let Some(e) = failed {
			return Err(e);
		}

		let mut writer = FreezeWriter::create(&self.path, order)?;
		for item in counts {
			let (key, count) = item?;
			let text = std::str::from_utf8(&key).map_err(|e| Error::Corruption(format!("counted key: {e}")))?;
			let ids = text.split('\0').map(|token| self.registry.get_id(token)).collect::<Result<Vec<_>>>()?;
			writer.push(&ids, count)?;
		}
		writer.finish()
	}

	/// Writes the N-gram counts to `path` as a sorted text file readable by
	/// [`NgramFile`](crate::ngram_file::NgramFile). Returns the record count.
	pub fn export_ngrams<P: AsRef<Path>>(&self, path: P) -> Result<u64> {
		let mut lines = Vec::new();
		for (ngram, count) in &self.tables.counts[self.order() - 1] {
			let mut line = self.spell(ngram)?.join("\t");
			line.push('\t');
			line.push_str(&count.to_string());
			lines.push(line.into_bytes());
		}

		let mut out = BufWriter::new(File::create(path.as_ref())?);
		let mut written = 0;
		for line in sort_external(lines, self.config.counter.max_bytes)? {
			out.write_all(&line?)?;
			out.write_all(b"\n")?;
			written += 1;
		}
		out.flush()?;

		log::info!("{}: exported {written} {}-grams", path.as_ref().display(), self.order());
		Ok(written)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn open(dir: &Path, order: usize) -> Model {
		Model::open(dir, order).unwrap()
	}

	#[test]
	fn test_sentence() {
		let padded = sentence(vec!["row".to_owned(), "boat".to_owned()]);
		assert_eq!(vec!["<∅>", "row", "boat", "</∅>"], padded);
		assert_eq!(vec!["<∅>", "</∅>"], sentence(Vec::new()));
	}

	#[test]
	fn test_order_out_of_range() {
		let dir = tempfile::tempdir().unwrap();
		assert!(matches!(Model::open(dir.path(), 0), Err(Error::OrderOutOfRange { .. })));

		let model = open(dir.path(), 2);
		assert!(matches!(model.get_ngram_count(&["a", "b", "c"]), Err(Error::OrderOutOfRange { order: 3, max: 2 })));
		assert!(matches!(model.get_ngram_count::<&str>(&[]), Err(Error::OrderOutOfRange { order: 0, .. })));
		assert!(model.prob("c", &["a", "b"]).is_err());
	}

	#[test]
	fn test_reopen_with_other_order() {
		let dir = tempfile::tempdir().unwrap();
		drop(open(dir.path(), 3));
		assert!(matches!(Model::open(dir.path(), 2), Err(Error::OrderMismatch { expected: 2, found: 3 })));
	}

	#[test]
	fn test_sentinels_registered_first() {
		let dir = tempfile::tempdir().unwrap();
		let model = open(dir.path(), 3);
		assert_eq!(Some(0), model.registry().find(START_TOKEN));
		assert_eq!(Some(1), model.registry().find(END_TOKEN));
	}

	#[test]
	fn test_ngram_log_format() {
		let dir = tempfile::tempdir().unwrap();
		let mut model = open(dir.path(), 3);
		model.train("a b").unwrap();

		let log = fs::read_to_string(dir.path().join(NGRAM_LOG)).unwrap();
		assert_eq!("<∅>\ta\tb\na\tb\t</∅>\n", log);
	}

	#[test]
	fn test_short_text_skipped() {
		let dir = tempfile::tempdir().unwrap();
		let mut model = open(dir.path(), 4);
		model.train("one").unwrap();
		model.train("").unwrap();

		assert_eq!(0, model.get_ngram_count(&["one"]).unwrap());
		assert!(fs::read(dir.path().join(NGRAM_LOG)).unwrap().is_empty());
	}

	#[test]
	fn test_sentinel_lookalikes_dropped() {
		let dir = tempfile::tempdir().unwrap();
		let mut model = open(dir.path(), 1);
		model.train("a <∅> b </∅>").unwrap();

		assert_eq!(1, model.get_ngram_count(&[START_TOKEN]).unwrap());
		assert_eq!(1, model.get_ngram_count(&["b"]).unwrap());
	}

	#[test]
	fn test_invalid_token() {
		struct TabTokenizer;
		impl Tokenizer for TabTokenizer {
			fn split(&self, text: &str) -> Vec<String> {
				vec![text.to_owned()]
			}
			fn join(&self, tokens: &[String]) -> String {
				tokens.concat()
			}
		}

		let dir = tempfile::tempdir().unwrap();
		let mut model = Model::open_with(dir.path(), ModelConfig::with_order(2), Box::new(TabTokenizer)).unwrap();
		assert!(matches!(model.train("a\tb"), Err(Error::InvalidToken(_))));
		assert!(model.registry().find("a\tb").is_none());
		assert!(matches!(model.train("a\0b"), Err(Error::InvalidToken(_))));
		assert!(fs::read(dir.path().join(NGRAM_LOG)).unwrap().is_empty());
	}

	#[test]
	fn test_replay_skips_incomplete_transactions() {
		let dir = tempfile::tempdir().unwrap();
		{
			let mut model = open(dir.path(), 2);
			model.train("a b").unwrap();
		}

		// an interrupted training followed by a complete one, then a torn record
		let mut log = fs::OpenOptions::new().append(true).open(dir.path().join(NGRAM_LOG)).unwrap();
		log.write_all("<∅>\ta\na\tb\n<∅>\tb\nb\t</∅>\n<∅>\ta".as_bytes()).unwrap();
		drop(log);

		let model = open(dir.path(), 2);
		assert_eq!(2, model.get_ngram_count(&[START_TOKEN]).unwrap());
		assert_eq!(1, model.get_ngram_count(&[START_TOKEN, "a"]).unwrap());
		assert_eq!(1, model.get_ngram_count(&[START_TOKEN, "b"]).unwrap());
		assert_eq!(2, model.get_ngram_count(&["b", END_TOKEN]).unwrap());
	}

	#[test]
	fn test_replay_corruption() {
		let cases: [&str; 3] = [
			// unknown token
			"<∅>\tnever\n",
			// wrong width
			"<∅>\ta\tb\n",
			// does not continue the transaction
			"<∅>\ta\nb\t</∅>\n",
		];

		for case in cases {
			let dir = tempfile::tempdir().unwrap();
			{
				let mut model = open(dir.path(), 2);
				model.train("a b").unwrap();
			}
			let mut log = fs::OpenOptions::new().append(true).open(dir.path().join(NGRAM_LOG)).unwrap();
			log.write_all(case.as_bytes()).unwrap();
			drop(log);

			assert!(matches!(Model::open(dir.path(), 2), Err(Error::Corruption(_))), "{case:?}");
		}
	}

	#[test]
	fn test_empty_context() {
		let dir = tempfile::tempdir().unwrap();
		let mut model = open(dir.path(), 2);
		model.train("a a").unwrap();

		// 4 unigram observations, 2 of them "a"
		assert_eq!(0.5, model.prob::<&str>("a", &[]).unwrap());
		assert_eq!(1.0, model.logprob::<&str>("a", &[]).unwrap());
		assert!(matches!(model.logprob::<&str>("z", &[]), Err(Error::Unseen(_))));
		assert_eq!(0.0, model.prob::<&str>("z", &[]).unwrap());
	}

	#[test]
	fn test_adjacency() {
		let dir = tempfile::tempdir().unwrap();
		let mut model = open(dir.path(), 2);
		model.train("a c").unwrap();
		model.train("a b").unwrap();
		model.train("a b").unwrap();

		let a = model.registry().find("a").unwrap();
		let b = model.registry().find("b").unwrap();
		let c = model.registry().find("c").unwrap();

		// sorted by id, each successor once
		let mut expected = vec![b, c];
		expected.sort();
		assert_eq!(Some(&expected), model.successors().get(&vec![a]));
		assert_eq!(Some(&vec![a]), model.predecessors().get(&vec![b]));
		assert_eq!(2, model.pivots(a).len());
		assert!(model.pivots(model.end_id()).is_empty());
	}

	#[test]
	fn test_export_ngrams() {
		let dir = tempfile::tempdir().unwrap();
		let mut model = open(dir.path(), 2);
		model.train("b a").unwrap();
		model.train("b a").unwrap();

		let out = dir.path().join("export.ngrams");
		assert_eq!(3, model.export_ngrams(&out).unwrap());
		assert_eq!("<∅>\tb\t2\na\t</∅>\t2\nb\ta\t2\n", fs::read_to_string(&out).unwrap());
	}
}
