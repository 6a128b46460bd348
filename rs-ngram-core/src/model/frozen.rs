//! Frozen per-order record files.
//!
//! File `k` (`<dir>/{k}grams`) holds one fixed-size record per k-gram:
//! `(context, token, count)` as big-endian `u32`s. `context` is the 1-based
//! record number, in file `k-1`, of the k-gram's prefix (0 for unigrams).
//! A 12-byte header comes first, so record `r` starts at byte `12 * r`.
//!
//! Header: magic `NG01`, the file's order, the record count.

use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;

use crate::error::{Error, Result};
use crate::model::registry::TokenId;

pub const MAGIC: &[u8; 4] = b"NG01";

/// Size of a record, and of the header.
pub const RECORD_SIZE: usize = 12;

/// Path of the frozen file for `order` in `dir`.
pub fn order_path<P: AsRef<Path>>(dir: P, order: usize) -> PathBuf {
	dir.as_ref().join(format!("{order}grams"))
}

fn to_u32(value: u64) -> Result<u32> {
	u32::try_from(value).map_err(|_| Error::RecordOverflow(value))
}

/// One frozen record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Record {
	pub context: u32,
	pub token: TokenId,
	pub count: u32,
}

impl Record {
	fn to_bytes(self) -> [u8; RECORD_SIZE] {
		let mut out = [0u8; RECORD_SIZE];
		out[0..4].copy_from_slice(&self.context.to_be_bytes());
		out[4..8].copy_from_slice(&self.token.to_be_bytes());
		out[8..12].copy_from_slice(&self.count.to_be_bytes());
		out
	}

	fn from_bytes(bytes: &[u8]) -> Self {
		let field = |i: usize| u32::from_be_bytes([bytes[i], bytes[i + 1], bytes[i + 2], bytes[i + 3]]);
		Self { context: field(0), token: field(4), count: field(8) }
	}
}

fn header(order: usize, records: u32) -> Result<[u8; RECORD_SIZE]> {
	let mut out = [0u8; RECORD_SIZE];
	out[0..4].copy_from_slice(MAGIC);
	out[4..8].copy_from_slice(&to_u32(order as u64)?.to_be_bytes());
	out[8..12].copy_from_slice(&records.to_be_bytes());
	Ok(out)
}

/// Writes the frozen files of one model from n-grams in ascending order.
///
/// The input interleaves every order and must be sorted so that each
/// n-gram's prefix comes right before its extensions, e.g. `(a)`, `(a, b)`,
/// `(a, b, c)`, `(a, c)`, `(b)`. A k-gram is then always an extension of the
/// current record of file `k-1`.
pub struct FreezeWriter {
	dir: PathBuf,
	files: Vec<BufWriter<File>>,
	records: Vec<u32>,
	current: Vec<Vec<TokenId>>,
}

impl FreezeWriter {
	/// Creates (or truncates) the files for orders `1..=order` in `dir`.
	pub fn create<P: AsRef<Path>>(dir: P, order: usize) -> Result<Self> {
		let dir = dir.as_ref().to_path_buf();
		let mut files = Vec::with_capacity(order);
		for k in 1..=order {
			let mut file = BufWriter::new(File::create(order_path(&dir, k))?);
			// rewritten with the final count by `finish`
			file.write_all(&header(k, 0)?)?;
			files.push(file);
		}

		Ok(Self { dir, files, records: vec![0; order], current: vec![Vec::new(); order] })
	}

	/// Appends one n-gram.
	///
	/// # Errors
	/// - `OrderOutOfRange` for an empty or too long n-gram.
	/// - `Corruption` if the prefix is not the current record of the file below.
	/// - `RecordOverflow` if the count or the record number exceeds `u32`.
	pub fn push(&mut self, ngram: &[TokenId], count: u64) -> Result<()> {
		let order = ngram.len();
		if order == 0 || order > self.files.len() {
			return Err(Error::OrderOutOfRange { order, max: self.files.len() });
		}

		let context = if order == 1 {
			0
		} else {
			let prefix = &ngram[..order - 1];
			if self.current[order - 2] != prefix || self.records[order - 2] == 0 {
				return Err(Error::Corruption(format!(
					"{order}-gram {ngram:?} does not extend the current {}-gram {:?}",
					order - 1,
					self.current[order - 2]
				)));
			}
			self.records[order - 2]
		};

		let record = Record { context, token: ngram[order - 1], count: to_u32(count)? };
		self.files[order - 1].write_all(&record.to_bytes())?;

		self.records[order - 1] = self.records[order - 1]
			.checked_add(1)
			.ok_or(Error::RecordOverflow(u64::from(u32::MAX) + 1))?;
		self.current[order - 1].clear();
		self.current[order - 1].extend_from_slice(ngram);
		Ok(())
	}

	/// Writes the headers and closes the files, returning the record count
	/// of every order.
	pub fn finish(self) -> Result<Vec<u32>> {
		for (k, (file, &records)) in self.files.into_iter().zip(&self.records).enumerate() {
			let mut file = file.into_inner().map_err(|e| e.into_error())?;
			file.seek(SeekFrom::Start(0))?;
			file.write_all(&header(k + 1, records)?)?;
			file.sync_all()?;
		}

		log::info!("{}: froze {:?} records", self.dir.display(), self.records);
		Ok(self.records)
	}
}

/// Read-only view of the frozen files of a model.
pub struct FrozenStore {
	maps: Vec<Mmap>,
}

impl FrozenStore {
	/// Maps the files of orders `1..=order` from `dir` and checks their headers.
	///
	/// # Errors
	/// `Corruption` on a bad magic, a wrong order, or a record count that
	/// does not match the file size.
	pub fn open<P: AsRef<Path>>(dir: P, order: usize) -> Result<Self> {
		let mut maps = Vec::with_capacity(order);
		for k in 1..=order {
			let path = order_path(&dir, k);
			let file = File::open(&path)?;
			let size = file.metadata()?.len();
			if size < RECORD_SIZE as u64 || size % RECORD_SIZE as u64 != 0 {
				return Err(Error::Corruption(format!("{}: bad size {size}", path.display())));
			}

			// SAFETY: frozen files are never modified once written. Nothing in
			// this crate writes to a file while a store maps it.
			let map = unsafe { Mmap::map(&file)? };

			let head = Record::from_bytes(&map[..RECORD_SIZE]);
			let records = size / RECORD_SIZE as u64 - 1;
			if &map[..4] != MAGIC {
				return Err(Error::Corruption(format!("{}: bad magic", path.display())));
			}
			if head.token as usize != k || u64::from(head.count) != records {
				return Err(Error::Corruption(format!(
					"{}: header says order {} with {} records, expected order {k} with {records}",
					path.display(),
					head.token,
					head.count
				)));
			}
			maps.push(map);
		}

		Ok(Self { maps })
	}

	pub fn order(&self) -> usize {
		self.maps.len()
	}

	fn map(&self, order: usize) -> Result<&Mmap> {
		if order == 0 {
			return Err(Error::OrderOutOfRange { order, max: self.maps.len() });
		}
		self.maps.get(order - 1).ok_or(Error::OrderOutOfRange { order, max: self.maps.len() })
	}

	/// Number of records in the file of `order`.
	pub fn len(&self, order: usize) -> Result<u32> {
		Ok((self.map(order)?.len() / RECORD_SIZE - 1) as u32)
	}

	/// Record `recno` (1-based) of the file of `order`.
	pub fn record(&self, order: usize, recno: u32) -> Result<Record> {
		let map = self.map(order)?;
		let start = recno as usize * RECORD_SIZE;
		if recno == 0 || start + RECORD_SIZE > map.len() {
			return Err(Error::Corruption(format!("record {recno} out of range for order {order}")));
		}
		Ok(Record::from_bytes(&map[start..start + RECORD_SIZE]))
	}

	/// Token ids of the n-gram stored as record `recno` of `order`, found by
	/// following the context links down to the unigram.
	pub fn spell(&self, order: usize, recno: u32) -> Result<Vec<TokenId>> {
		let mut ids = vec![0; order];
		let mut recno = recno;
		for k in (1..=order).rev() {
			let record = self.record(k, recno)?;
			ids[k - 1] = record.token;
			recno = record.context;
		}
		Ok(ids)
	}

	/// Record number of the extension of `context` by `token` in the file of
	/// `order`, if any.
	///
	/// Extensions of one context are contiguous and contexts ascend, so the
	/// range is found by binary search and then scanned.
	fn find(&self, order: usize, context: u32, token: TokenId) -> Result<Option<u32>> {
		let len = self.len(order)?;

		let (mut lo, mut hi) = (1u32, len + 1);
		while lo < hi {
			let mid = lo + (hi - lo) / 2;
			if self.record(order, mid)?.context < context {
				lo = mid + 1;
			} else {
				hi = mid;
			}
		}

		for recno in lo..=len {
			let record = self.record(order, recno)?;
			if record.context != context {
				break;
			}
			if record.token == token {
				return Ok(Some(recno));
			}
		}
		Ok(None)
	}

	/// Count of the n-gram `ids`, 0 when it was not frozen.
	pub fn count(&self, ids: &[TokenId]) -> Result<u64> {
		if ids.is_empty() || ids.len() > self.order() {
			return Err(Error::OrderOutOfRange { order: ids.len(), max: self.order() });
		}

		let mut context = 0;
		for (i, &token) in ids.iter().enumerate() {
			match self.find(i + 1, context, token)? {
				Some(recno) => context = recno,
				None => return Ok(0),
			}
		}
		Ok(u64::from(self.record(ids.len(), context)?.count))
	}
}
