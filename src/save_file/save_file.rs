use std::{
    fs::File,
    io::{self, Read, Write},
    path::Path,
    process::{Command, Stdio},
    string::FromUtf8Error,
    thread,
};

use derive_more::{Display, Error, From};

use super::{parser::parse_save_file, record::SaveFileRecord};

/// An error that can occur when opening a save file.
#[derive(Debug, From, Display, Error)]
pub enum SaveFileError {
    /// Something went wrong with stdlib IO.
    IoError(io::Error),
    /// The external decompressor failed
    #[display("{} failed: {}", _0, _1)]
    DecompressionError(#[error(not(source))] &'static str, #[error(not(source))] String),
    /// Decoding bytes failed
    DecodingError(FromUtf8Error),
}

/// The compression schemes the engine writes save files with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Compression {
    None,
    Xz,
    Zstd,
}

impl Compression {
    fn from_filename(filename: &str) -> Self {
        if filename.ends_with(".zst") {
            Compression::Zstd
        } else if filename.ends_with(".xz") {
            Compression::Xz
        } else {
            Compression::None
        }
    }

    /// The external program doing the decompression
    fn program(&self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Xz => Some("xz"),
            Compression::Zstd => Some("zstd"),
        }
    }
}

/// Pipes the bytes through `<program> -d -c`.
fn run_decompressor(program: &'static str, contents: Vec<u8>) -> Result<Vec<u8>, SaveFileError> {
    let mut child = Command::new(program)
        .args(["-d", "-c"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;
    let mut stdin = child
        .stdin
        .take()
        .ok_or(SaveFileError::DecompressionError(program, "no stdin".to_owned()))?;
    // feed the input from another thread, so a full stdout pipe can't deadlock us
    let writer = thread::spawn(move || stdin.write_all(&contents));
    let output = child.wait_with_output()?;
    match writer.join() {
        Ok(res) => res?,
        Err(_) => {
            return Err(SaveFileError::DecompressionError(
                program,
                "writer thread panicked".to_owned(),
            ))
        }
    }
    if !output.status.success() {
        return Err(SaveFileError::DecompressionError(
            program,
            String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        ));
    }
    Ok(output.stdout)
}

/// A decompressed save file.
/// It is just a wrapper around the text of the save file, so that we can
/// abstract away the compression.
pub struct SaveFile {
    contents: String,
}

impl SaveFile {
    /// Open a save file.
    /// The compression is deduced from the file extension.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<SaveFile, SaveFileError> {
        let path = filename.as_ref();
        let mut file = File::open(path)?;
        let metadata = file.metadata()?;
        let mut contents = Vec::with_capacity(metadata.len() as usize);
        file.read_to_end(&mut contents)?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        SaveFile::decompress(contents, &name)
    }

    /// Create a new SaveFile instance from raw, possibly compressed bytes.
    ///
    /// # Compression
    ///
    /// `.sav.xz` and `.sav.zst` files are decompressed by shelling out to
    /// `xz` and `zstd` respectively, anything else is read as plain text.
    pub fn decompress(contents: Vec<u8>, filename: &str) -> Result<SaveFile, SaveFileError> {
        let raw = match Compression::from_filename(filename).program() {
            Some(program) => run_decompressor(program, contents)?,
            None => contents,
        };
        Ok(SaveFile {
            contents: String::from_utf8(raw)?,
        })
    }

    /// Parses the contents, see [parse_save_file]
    pub fn parse(&self) -> SaveFileRecord {
        parse_save_file(&self.contents)
    }
}
