//! File metadata facade.
//!
//! Decodes one `struct stat` record into typed accessors: identity,
//! ownership, size, timestamps, file type and permission predicates.
//!
//! [`FileStatus`] is the decoded record. [`StatusView`] wraps the result
//! of a status query that may have failed; every accessor on it returns
//! a neutral value (`0`, `false`) instead of an error so callers can query
//! unconditionally.

use std::fmt;
use std::fs::Metadata;
use std::os::unix::fs::MetadataExt;

use serde::Serialize;

// ---------------------------------------------------------------------------
// Mode bits (<sys/stat.h>)
// ---------------------------------------------------------------------------

pub const S_IFMT: u32 = 0o170000;
pub const S_IFSOCK: u32 = 0o140000;
pub const S_IFLNK: u32 = 0o120000;
pub const S_IFREG: u32 = 0o100000;
pub const S_IFBLK: u32 = 0o060000;
pub const S_IFDIR: u32 = 0o040000;
pub const S_IFCHR: u32 = 0o020000;
pub const S_IFIFO: u32 = 0o010000;

pub const S_ISUID: u32 = 0o4000;
pub const S_ISGID: u32 = 0o2000;

pub const S_IRUSR: u32 = 0o400;
pub const S_IWUSR: u32 = 0o200;
pub const S_IXUSR: u32 = 0o100;
pub const S_IRGRP: u32 = 0o040;
pub const S_IWGRP: u32 = 0o020;
pub const S_IXGRP: u32 = 0o010;
pub const S_IROTH: u32 = 0o004;
pub const S_IWOTH: u32 = 0o002;
pub const S_IXOTH: u32 = 0o001;

// ---------------------------------------------------------------------------
// File type
// ---------------------------------------------------------------------------

/// The seven POSIX file types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileType {
    BlockDevice,
    CharDevice,
    Fifo,
    Regular,
    Directory,
    Symlink,
    Socket,
}

impl FileType {
    /// Decode the `S_IFMT` bits of a mode. `None` for an unknown type.
    pub fn from_mode(mode: u32) -> Option<FileType> {
        match mode & S_IFMT {
            S_IFBLK => Some(FileType::BlockDevice),
            S_IFCHR => Some(FileType::CharDevice),
            S_IFIFO => Some(FileType::Fifo),
            S_IFREG => Some(FileType::Regular),
            S_IFDIR => Some(FileType::Directory),
            S_IFLNK => Some(FileType::Symlink),
            S_IFSOCK => Some(FileType::Socket),
            _ => None,
        }
    }
}

/// Permission class (owner, group, everyone else).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Class {
    User,
    Group,
    Other,
}

/// Permission kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Perm {
    Read,
    Write,
    Execute,
}

fn perm_bit(class: Class, perm: Perm) -> u32 {
    match (class, perm) {
        (Class::User, Perm::Read) => S_IRUSR,
        (Class::User, Perm::Write) => S_IWUSR,
        (Class::User, Perm::Execute) => S_IXUSR,
        (Class::Group, Perm::Read) => S_IRGRP,
        (Class::Group, Perm::Write) => S_IWGRP,
        (Class::Group, Perm::Execute) => S_IXGRP,
        (Class::Other, Perm::Read) => S_IROTH,
        (Class::Other, Perm::Write) => S_IWOTH,
        (Class::Other, Perm::Execute) => S_IXOTH,
    }
}

// ---------------------------------------------------------------------------
// Human-readable size
// ---------------------------------------------------------------------------

const SIZE_UNITS: [&str; 7] = ["B", "KB", "MB", "GB", "TB", "PB", "EB"];

/// A byte count scaled to the largest unit (powers of 1024) it reaches.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HumanSize {
    pub value: f64,
    pub unit: &'static str,
}

impl HumanSize {
    pub fn from_bytes(bytes: u64) -> HumanSize {
        let mut value = bytes as f64;
        let mut idx = 0;
        while value >= 1024.0 && idx < SIZE_UNITS.len() - 1 {
            value /= 1024.0;
            idx += 1;
        }
        HumanSize {
            value,
            unit: SIZE_UNITS[idx],
        }
    }
}

impl fmt::Display for HumanSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} {}", self.value, self.unit)
    }
}

// ---------------------------------------------------------------------------
// Status record
// ---------------------------------------------------------------------------

/// Decoded filesystem status of one open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileStatus {
    pub dev: u64,
    pub ino: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub size: u64,
    pub atime: i64,
    pub mtime: i64,
    pub ctime: i64,
    pub mode: u32,
}

impl From<&Metadata> for FileStatus {
    fn from(md: &Metadata) -> Self {
        FileStatus {
            dev: md.dev(),
            ino: md.ino(),
            nlink: md.nlink(),
            uid: md.uid(),
            gid: md.gid(),
            size: md.size(),
            atime: md.atime(),
            mtime: md.mtime(),
            ctime: md.ctime(),
            mode: md.mode(),
        }
    }
}

impl FileStatus {
    pub fn file_type(&self) -> Option<FileType> {
        FileType::from_mode(self.mode)
    }

    pub fn human_size(&self) -> HumanSize {
        HumanSize::from_bytes(self.size)
    }

    pub fn permits(&self, class: Class, perm: Perm) -> bool {
        self.mode & perm_bit(class, perm) != 0
    }

    pub fn is_setuid(&self) -> bool {
        self.mode & S_ISUID != 0
    }

    pub fn is_setgid(&self) -> bool {
        self.mode & S_ISGID != 0
    }
}

// ---------------------------------------------------------------------------
// Neutral-value view
// ---------------------------------------------------------------------------

/// Accessor facade over a status query that may have failed.
///
/// A failed query (closed handle, in-memory handle, `fstat` error) yields
/// `0` for every number and `false` for every predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusView {
    status: Option<FileStatus>,
}

macro_rules! type_predicate {
    ($name:ident, $ty:ident) => {
        pub fn $name(&self) -> bool {
            self.file_type() == Some(FileType::$ty)
        }
    };
}

macro_rules! perm_predicate {
    ($name:ident, $class:ident, $perm:ident) => {
        pub fn $name(&self) -> bool {
            self.status
                .is_some_and(|s| s.permits(Class::$class, Perm::$perm))
        }
    };
}

impl StatusView {
    pub fn new(status: Option<FileStatus>) -> Self {
        StatusView { status }
    }

    /// The underlying record, if the query succeeded.
    pub fn status(&self) -> Option<&FileStatus> {
        self.status.as_ref()
    }

    pub fn is_available(&self) -> bool {
        self.status.is_some()
    }

    pub fn device_id(&self) -> u64 {
        self.status.map_or(0, |s| s.dev)
    }

    pub fn inode(&self) -> u64 {
        self.status.map_or(0, |s| s.ino)
    }

    pub fn link_count(&self) -> u64 {
        self.status.map_or(0, |s| s.nlink)
    }

    pub fn uid(&self) -> u32 {
        self.status.map_or(0, |s| s.uid)
    }

    pub fn gid(&self) -> u32 {
        self.status.map_or(0, |s| s.gid)
    }

    pub fn size(&self) -> u64 {
        self.status.map_or(0, |s| s.size)
    }

    /// Size scaled to a readable unit; `0 B` when unavailable.
    pub fn human_size(&self) -> HumanSize {
        HumanSize::from_bytes(self.size())
    }

    pub fn accessed(&self) -> i64 {
        self.status.map_or(0, |s| s.atime)
    }

    pub fn modified(&self) -> i64 {
        self.status.map_or(0, |s| s.mtime)
    }

    pub fn changed(&self) -> i64 {
        self.status.map_or(0, |s| s.ctime)
    }

    pub fn file_type(&self) -> Option<FileType> {
        self.status.and_then(|s| s.file_type())
    }

    type_predicate!(is_block_device, BlockDevice);
    type_predicate!(is_char_device, CharDevice);
    type_predicate!(is_fifo, Fifo);
    type_predicate!(is_regular, Regular);
    type_predicate!(is_dir, Directory);
    type_predicate!(is_symlink, Symlink);
    type_predicate!(is_socket, Socket);

    perm_predicate!(user_read, User, Read);
    perm_predicate!(user_write, User, Write);
    perm_predicate!(user_exec, User, Execute);
    perm_predicate!(group_read, Group, Read);
    perm_predicate!(group_write, Group, Write);
    perm_predicate!(group_exec, Group, Execute);
    perm_predicate!(other_read, Other, Read);
    perm_predicate!(other_write, Other, Write);
    perm_predicate!(other_exec, Other, Execute);

    pub fn is_setuid(&self) -> bool {
        self.status.is_some_and(|s| s.is_setuid())
    }

    pub fn is_setgid(&self) -> bool {
        self.status.is_some_and(|s| s.is_setgid())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
