use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Extension of ephemeral model snapshots.
pub(crate) const SNAPSHOT_EXTENSION: &str = "bin";

/// Reads a whole file as raw bytes.
pub(crate) fn read_bytes<P: AsRef<Path>>(filename: P) -> io::Result<Vec<u8>> {
	fs::read(filename)
}

/// Builds the snapshot path of a named model inside `dir`.
///
/// Example:
/// `data` + `"wiki"` → `data/wiki.bin`
pub(crate) fn snapshot_path<P: AsRef<Path>>(dir: P, name: &str) -> io::Result<PathBuf> {
	if matches!(name, "" | "." | "..") || name.contains(['/', '\\']) {
		return Err(io::Error::new(io::ErrorKind::InvalidInput, format!("Invalid model name: {name:?}")));
	}
	// Appended, not set: dots inside the name are kept.
	Ok(dir.as_ref().join(format!("{name}.{SNAPSHOT_EXTENSION}")))
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/model.bin"` → `"model"`
/// - `"model.bin"` → `"model"`
pub(crate) fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Lists all files with a given extension in a directory.
///
/// Returns full paths, sorted.
pub(crate) fn list_files<P: AsRef<Path>>(dir: P, extension: &str) -> io::Result<Vec<PathBuf>> {
	let mut files = Vec::new();

	for entry in fs::read_dir(dir)? {
		let path = entry?.path();
		if path.is_file() && path.extension() == Some(std::ffi::OsStr::new(extension)) {
			files.push(path);
		}
	}

	files.sort();
	Ok(files)
}
