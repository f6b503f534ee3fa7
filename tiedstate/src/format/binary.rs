//! Reader for the `s3` binary model file format.
//!
//! Layout: the token `s3`, whitespace separated `key value` header pairs
//! ending with `endhdr`, a 4-byte byte-order magic, the payload of 32-bit
//! integers and floats, and an optional trailing checksum.

use crate::error::{ConfigError, FormatError, Result};
use ndarray::Array1;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::{Path, PathBuf};

/// Byte-order magic following the header.
pub const BYTE_ORDER_MAGIC: u32 = 0x1122_3344;

/// File identifier token.
const FILE_ID: &str = "s3";

/// Header terminator token.
const END_HEADER: &str = "endhdr";

/// Reads header fields and byte-order corrected values from a binary model file.
pub struct BinaryModelReader<R> {
    path: PathBuf,
    reader: R,
    header: HashMap<String, String>,
    /// Payload is little-endian
    swap: bool,
}

impl BinaryModelReader<BufReader<File>> {
    /// Open `path` and read its header.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::ResourceNotFound {
                path: path.to_path_buf(),
            }
            .into(),
            _ => crate::error::Error::from(FormatError::io(path, e)),
        })?;
        Self::new(path, BufReader::new(file))
    }
}

impl<R: Read> BinaryModelReader<R> {
    /// Read the header and byte-order magic from `reader`.
    ///
    /// `path` is only used in error messages.
    pub fn new(path: impl Into<PathBuf>, mut reader: R) -> Result<Self> {
        let path = path.into();
        let io_err = |e| FormatError::io(&path, e);

        let id = read_word(&mut reader).map_err(io_err)?;
        if id != FILE_ID {
            return Err(FormatError::NotBinaryModel { path, found: id }.into());
        }

        let mut header = HashMap::new();
        loop {
            let name = read_word(&mut reader).map_err(io_err)?;
            if name == END_HEADER {
                break;
            }
            let value = read_word(&mut reader).map_err(io_err)?;
            header.insert(name, value);
        }

        let mut buf = [0u8; 4];
        reader.read_exact(&mut buf).map_err(io_err)?;
        let magic = u32::from_be_bytes(buf);
        let swap = if magic == BYTE_ORDER_MAGIC {
            false
        } else if magic.swap_bytes() == BYTE_ORDER_MAGIC {
            true
        } else {
            return Err(FormatError::BadMagic { path, magic }.into());
        };

        tracing::debug!(path = %path.display(), swap, ?header, "binary header");

        Ok(Self {
            path,
            reader,
            header,
            swap,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Header value for `key`.
    pub fn header(&self, key: &str) -> Option<&str> {
        self.header.get(key).map(String::as_str)
    }

    /// Whether the payload is stored little-endian.
    pub fn is_swapped(&self) -> bool {
        self.swap
    }

    /// Fail unless the header `version` equals `expected`.
    pub fn expect_version(&self, expected: &'static str) -> Result<()> {
        match self.header("version") {
            Some(found) if found == expected => Ok(()),
            found => Err(FormatError::UnsupportedVersion {
                path: self.path.clone(),
                expected,
                found: found.map(str::to_string),
            }
            .into()),
        }
    }

    /// Whether the header declares a trailing checksum.
    pub fn has_checksum(&self) -> bool {
        self.header("chksum0") == Some("yes")
    }

    fn read_word4(&mut self) -> Result<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.reader
            .read_exact(&mut buf)
            .map_err(|e| FormatError::io(&self.path, e))?;
        Ok(buf)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let buf = self.read_word4()?;
        Ok(if self.swap {
            i32::from_le_bytes(buf)
        } else {
            i32::from_be_bytes(buf)
        })
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let buf = self.read_word4()?;
        Ok(if self.swap {
            f32::from_le_bytes(buf)
        } else {
            f32::from_be_bytes(buf)
        })
    }

    /// Read a non-negative integer count.
    pub fn read_count(&mut self, label: &'static str) -> Result<usize> {
        let value = self.read_i32()?;
        usize::try_from(value).map_err(|_| {
            FormatError::NegativeCount {
                path: self.path.clone(),
                label,
                value: i64::from(value),
            }
            .into()
        })
    }

    /// Read `len` floats.
    pub fn read_f32_array(&mut self, len: usize) -> Result<Array1<f32>> {
        (0..len).map(|_| self.read_f32()).collect()
    }

    /// Read the trailing checksum if the header declares one.
    ///
    /// The value is returned as stored and never verified against the payload.
    pub fn read_checksum(&mut self) -> Result<Option<u32>> {
        if !self.has_checksum() {
            return Ok(None);
        }
        let checksum = self.read_i32()?;
        Ok(Some(checksum as u32))
    }
}

/// Next whitespace-delimited word; consumes the single byte ending it.
fn read_word<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut byte = [0u8; 1];

    loop {
        reader.read_exact(&mut byte)?;
        if !byte[0].is_ascii_whitespace() {
            break;
        }
    }

    let mut word = vec![byte[0]];
    loop {
        reader.read_exact(&mut byte)?;
        if byte[0].is_ascii_whitespace() {
            break;
        }
        word.push(byte[0]);
    }

    Ok(String::from_utf8_lossy(&word).into_owned())
}
