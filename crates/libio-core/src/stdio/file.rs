//! Open modes and positioning vocabulary.
//!
//! Parses the six canonical `fopen` mode strings (`r`, `w`, `a`, `r+`,
//! `w+`, `a+`), each optionally carrying a binary marker `b` after the
//! first character (`rb`, `rb+`, `r+b`, ...). Anything else is rejected.
//!
//! Reference: ISO C11 7.21.5.3

use std::fs::OpenOptions;
use std::io::SeekFrom;

// ---------------------------------------------------------------------------
// Open mode
// ---------------------------------------------------------------------------

/// Which directions a stream may move data in.
///
/// Fixed for the lifetime of a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    ReadOnly,
    WriteOnly,
    ReadWrite,
}

impl Access {
    pub fn readable(self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    pub fn writable(self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }
}

/// The leading mode character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// `r`: the file must exist; position starts at 0.
    Read,
    /// `w`: create or truncate.
    Write,
    /// `a`: create if missing; every write lands at end of file.
    Append,
}

/// A parsed `fopen` mode string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenMode {
    pub disposition: Disposition,
    /// `+` present: open for update (reading and writing).
    pub update: bool,
    /// `b` present. Has no effect on POSIX systems beyond being reported.
    pub binary: bool,
}

impl OpenMode {
    /// Parse a mode string. Returns `None` if it is not one of the
    /// canonical forms.
    pub fn parse(mode: &str) -> Option<OpenMode> {
        let bytes = mode.as_bytes();
        let (&first, rest) = bytes.split_first()?;

        let disposition = match first {
            b'r' => Disposition::Read,
            b'w' => Disposition::Write,
            b'a' => Disposition::Append,
            _ => return None,
        };

        let (update, binary) = match rest {
            b"" => (false, false),
            b"b" => (false, true),
            b"+" => (true, false),
            b"b+" | b"+b" => (true, true),
            _ => return None,
        };

        Some(OpenMode {
            disposition,
            update,
            binary,
        })
    }

    pub fn access(&self) -> Access {
        match (self.disposition, self.update) {
            (_, true) => Access::ReadWrite,
            (Disposition::Read, false) => Access::ReadOnly,
            (Disposition::Write | Disposition::Append, false) => Access::WriteOnly,
        }
    }

    pub fn is_append(&self) -> bool {
        self.disposition == Disposition::Append
    }

    /// `std::fs::OpenOptions` equivalent to this mode (`O_*` flags).
    pub fn open_options(&self) -> OpenOptions {
        let access = self.access();
        let mut opts = OpenOptions::new();
        opts.read(access.readable());
        match self.disposition {
            Disposition::Read => {
                opts.write(access.writable());
            }
            Disposition::Write => {
                opts.write(true).create(true).truncate(true);
            }
            Disposition::Append => {
                opts.append(true).create(true);
            }
        }
        opts
    }
}

// ---------------------------------------------------------------------------
// Positioning
// ---------------------------------------------------------------------------

/// POSIX `whence` values.
pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// Reference point for a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

impl SeekOrigin {
    /// Convert from a POSIX `whence` constant.
    pub fn from_whence(whence: i32) -> Option<SeekOrigin> {
        match whence {
            SEEK_SET => Some(SeekOrigin::Start),
            SEEK_CUR => Some(SeekOrigin::Current),
            SEEK_END => Some(SeekOrigin::End),
            _ => None,
        }
    }

    /// Build the `SeekFrom` for `offset` relative to this origin.
    ///
    /// Returns `None` for a negative offset from the start.
    pub fn to_seek_from(self, offset: i64) -> Option<SeekFrom> {
        match self {
            SeekOrigin::Start => u64::try_from(offset).ok().map(SeekFrom::Start),
            SeekOrigin::Current => Some(SeekFrom::Current(offset)),
            SeekOrigin::End => Some(SeekFrom::End(offset)),
        }
    }
}

/// Opaque saved stream position (`fpos_t`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(pub(crate) u64);

impl Position {
    /// Byte offset from the start of the file.
    pub fn offset(&self) -> u64 {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_six_canonical_forms() {
        let cases = [
            ("r", Disposition::Read, false, Access::ReadOnly),
            ("w", Disposition::Write, false, Access::WriteOnly),
            ("a", Disposition::Append, false, Access::WriteOnly),
            ("r+", Disposition::Read, true, Access::ReadWrite),
            ("w+", Disposition::Write, true, Access::ReadWrite),
            ("a+", Disposition::Append, true, Access::ReadWrite),
        ];
        for (text, disposition, update, access) in cases {
            let m = OpenMode::parse(text).unwrap();
            assert_eq!(m.disposition, disposition, "{text}");
            assert_eq!(m.update, update, "{text}");
            assert_eq!(m.access(), access, "{text}");
            assert!(!m.binary, "{text}");
        }
    }

    #[test]
    fn parse_binary_variants() {
        for text in ["rb", "wb", "ab", "rb+", "wb+", "ab+", "r+b", "w+b", "a+b"] {
            let m = OpenMode::parse(text).unwrap();
            assert!(m.binary, "{text}");
        }
        assert_eq!(OpenMode::parse("rb+"), OpenMode::parse("r+b"));
    }

    #[test]
    fn parse_rejects_everything_else() {
        for text in ["", "x", "R", "rw", "r++", "rbb", "wx", "a+x", "b", "+r", "r b"] {
            assert!(OpenMode::parse(text).is_none(), "{text:?} should be rejected");
        }
    }

    #[test]
    fn append_flag() {
        assert!(OpenMode::parse("a").unwrap().is_append());
        assert!(OpenMode::parse("ab+").unwrap().is_append());
        assert!(!OpenMode::parse("w+").unwrap().is_append());
    }

    #[test]
    fn whence_conversion() {
        assert_eq!(SeekOrigin::from_whence(0), Some(SeekOrigin::Start));
        assert_eq!(SeekOrigin::from_whence(1), Some(SeekOrigin::Current));
        assert_eq!(SeekOrigin::from_whence(2), Some(SeekOrigin::End));
        assert_eq!(SeekOrigin::from_whence(3), None);
        assert_eq!(SeekOrigin::from_whence(-1), None);
    }

    #[test]
    fn negative_start_offset_rejected() {
        assert_eq!(SeekOrigin::Start.to_seek_from(-1), None);
        assert_eq!(SeekOrigin::Start.to_seek_from(7), Some(SeekFrom::Start(7)));
        assert_eq!(
            SeekOrigin::End.to_seek_from(-3),
            Some(SeekFrom::End(-3))
        );
    }
}
