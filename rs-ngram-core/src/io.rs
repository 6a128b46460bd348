use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::env;

/// Append-only, newline-terminated record log.
///
/// Used by the token registry and by the model's n-gram log. Records are
/// opaque byte strings that never contain `\n`.
///
/// # Recovery
/// A crash can leave a final record without its newline. `open` detects that
/// partial record, drops it, and truncates the file back to the last complete
/// line so later appends start on a fresh line.
#[derive(Debug)]
pub struct LineLog {
	path: PathBuf,
	writer: BufWriter<File>,
}

impl LineLog {
	/// Opens (or creates) the log at `path` and replays every complete record.
	///
	/// `replay` is called once per record, in file order, without the newline.
	/// The first error returned by `replay` aborts the open.
	pub fn open<P, F, E>(path: P, mut replay: F) -> Result<Self, E>
	where
		P: AsRef<Path>,
		F: FnMut(&[u8]) -> Result<(), E>,
		E: From<io::Error>,
	{
		let path = path.as_ref().to_path_buf();
		let mut file = OpenOptions::new()
			.read(true)
			.append(true)
			.create(true)
			.open(&path)?;

		let mut complete = 0u64;
		{
			let mut reader = BufReader::new(&mut file);
			let mut line = Vec::new();
			loop {
				line.clear();
				let read = reader.read_until(b'\n', &mut line)?;
				if read == 0 {
					break;
				}
				if line.last() != Some(&b'\n') {
					log::warn!(
						"{}: dropping partial trailing record ({} bytes)",
						path.display(),
						line.len()
					);
					break;
				}
				complete += read as u64;
				replay(&line[..line.len() - 1])?;
			}
		}

		if file.metadata()?.len() != complete {
			file.set_len(complete)?;
		}
		file.seek(SeekFrom::End(0))?;

		Ok(Self { path, writer: BufWriter::new(file) })
	}

	/// Buffers one record. The caller decides when to [`flush`](Self::flush).
	pub fn append(&mut self, record: &[u8]) -> io::Result<()> {
		self.writer.write_all(record)?;
		self.writer.write_all(b"\n")
	}

	pub fn flush(&mut self) -> io::Result<()> {
		self.writer.flush()
	}

	pub fn path(&self) -> &Path {
		&self.path
	}
}

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Normalize a folder path.
///
/// - `"."` or `"./"` resolves to the current working directory
/// - Other paths are returned as-is (not canonicalized)
pub fn normalize_folder(input: &str) -> PathBuf {
	if input == "." || input == "./" {
		env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
	} else {
		PathBuf::from(input)
	}
}

/// Lists all files with a given extension in a directory.
///
/// Returns file names only (no paths), sorted so callers see a stable order.
pub fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<String>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();

		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			if let Some(name) = path.file_name() {
				files.push(name.to_string_lossy().to_string());
			}
		}
	}

	files.sort();
	Ok(files)
}
