//! Checksum plumbing for content addressing.
//!
//! Every stored object (blob, snapshot, commit) is keyed by the SHA-1 digest
//! of its content, rendered as 40 lowercase hex characters. The digest is
//! computed by streaming the content through the hasher with a read buffer
//! sized to the filesystem's preferred block size.

use std::{fmt::Display, io, io::Read, str::FromStr};

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

/// Hex string length of a checksum.
pub const CHECKSUM_HEX_LEN: usize = 40;

/// Read buffer size used when the filesystem reports no preferred block size.
pub const FALLBACK_READ_SIZE: usize = 4096;

/// SHA-1 digest of some object content.
///
/// Supports conversion to and from hex strings; `Display` renders the
/// canonical lowercase 40-character form used as CAS key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Checksum([u8; 20]);

impl Checksum {
    /// Digest an in-memory byte slice.
    pub fn of_bytes(data: &[u8]) -> Checksum {
        let digest = Sha1::digest(data);
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Checksum(bytes)
    }

    /// Digest a stream, reading `buf_size` bytes at a time.
    pub fn of_reader(read: &mut dyn Read, buf_size: usize) -> io::Result<Checksum> {
        let mut hasher = Sha1::new();
        let mut buf = vec![0u8; buf_size.max(1)];
        loop {
            let n = read.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        let digest = hasher.finalize();
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(&digest);
        Ok(Checksum(bytes))
    }
}

impl Display for Checksum {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl AsRef<[u8]> for Checksum {
    fn as_ref(&self) -> &[u8] {
        self.0.as_slice()
    }
}

/// Parse 40 hex characters into a `Checksum`.
impl FromStr for Checksum {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != CHECKSUM_HEX_LEN {
            return Err("invalid checksum length".to_string());
        }
        let bytes = hex::decode(s).map_err(|e| e.to_string())?;
        let mut h = [0u8; 20];
        h.copy_from_slice(&bytes);
        Ok(Checksum(h))
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, str::FromStr};

    use super::Checksum;

    /// Hashing "Hello, world!" should match the known SHA-1 value.
    #[test]
    fn test_of_bytes() {
        let sum = Checksum::of_bytes("Hello, world!".as_bytes());
        assert_eq!(sum.to_string(), "943a702d06f34599aee1f8da8ef9f7296031d699");
    }

    /// Streaming with a buffer smaller than the input yields the same digest.
    #[test]
    fn test_of_reader_small_buffer() {
        let data = b"Hello, world!";
        let mut reader = Cursor::new(data);
        let sum = Checksum::of_reader(&mut reader, 4).unwrap();
        assert_eq!(sum, Checksum::of_bytes(data));
    }

    /// Hex strings round-trip through parse and display.
    #[test]
    fn test_from_str_roundtrip() {
        let hex = "8ab686eafeb1f44702738c8b0f24f2567c36da6d";
        let sum = Checksum::from_str(hex).unwrap();
        assert_eq!(sum.to_string(), hex);
    }

    /// Parsing rejects strings of the wrong length.
    #[test]
    fn test_from_str_rejects_bad_length() {
        assert!(Checksum::from_str("ab12").is_err());
    }
}
