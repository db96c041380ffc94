//! ABI layer for the file metadata accessors.
//!
//! Every accessor reads the stream's cached status record. An unknown
//! stream or a failed status query yields 0 / false, with `errno` set to
//! `EBADF` for the unknown-stream case.

use std::ffi::{c_char, c_void};

use libio_core::meta::StatusView;

use crate::stdio_abi::with_stream;

fn view(stream: *mut c_void) -> StatusView {
    with_stream(stream, StatusView::default(), |s| s.metadata())
}

macro_rules! stat_number {
    ($(#[$meta:meta])* $name:ident -> $ty:ty, $accessor:ident) => {
        $(#[$meta])*
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(stream: *mut c_void) -> $ty {
            view(stream).$accessor() as $ty
        }
    };
}

macro_rules! stat_flag {
    ($(#[$meta:meta])* $name:ident, $accessor:ident) => {
        $(#[$meta])*
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn $name(stream: *mut c_void) -> bool {
            view(stream).$accessor()
        }
    };
}

// ---------------------------------------------------------------------------
// Identity, ownership, size, timestamps
// ---------------------------------------------------------------------------

stat_number!(
    /// Device id of the file.
    fdevid -> libc::dev_t, device_id
);
stat_number!(
    /// Inode number.
    finoid -> libc::ino_t, inode
);
stat_number!(
    /// Hard-link count.
    fnlink -> libc::nlink_t, link_count
);
stat_number!(fuid -> libc::uid_t, uid);
stat_number!(fgid -> libc::gid_t, gid);
stat_number!(fatime -> libc::time_t, accessed);
stat_number!(fmtime -> libc::time_t, modified);
stat_number!(fctime -> libc::time_t, changed);

/// Size in bytes (saturates on 32-bit targets).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsize(stream: *mut c_void) -> usize {
    usize::try_from(view(stream).size()).unwrap_or(usize::MAX)
}

/// Size scaled to the largest unit that keeps the value at or above 1.
///
/// When `unit` is non-null the unit label (`B`, `KB`, ... `EB`) is stored
/// there NUL-terminated; the buffer must hold at least 3 bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fhsize(stream: *mut c_void, unit: *mut c_char) -> f64 {
    let human = view(stream).human_size();
    if !unit.is_null() {
        let label = human.unit.as_bytes();
        for (i, &b) in label.iter().enumerate() {
            unsafe { *unit.add(i) = b as c_char };
        }
        unsafe { *unit.add(label.len()) = 0 };
    }
    human.value
}

// ---------------------------------------------------------------------------
// File type
// ---------------------------------------------------------------------------

stat_flag!(fblock, is_block_device);
stat_flag!(fchar, is_char_device);
stat_flag!(ffifo, is_fifo);
stat_flag!(freg, is_regular);
stat_flag!(fdir, is_dir);
stat_flag!(flink, is_symlink);
stat_flag!(fsock, is_socket);

// ---------------------------------------------------------------------------
// Permissions
// ---------------------------------------------------------------------------

stat_flag!(fuser_r, user_read);
stat_flag!(fuser_w, user_write);
stat_flag!(fuser_x, user_exec);
stat_flag!(fgroup_r, group_read);
stat_flag!(fgroup_w, group_write);
stat_flag!(fgroup_x, group_exec);
stat_flag!(fother_r, other_read);
stat_flag!(fother_w, other_write);
stat_flag!(fother_x, other_exec);
stat_flag!(fsuid, is_setuid);
stat_flag!(fsgid, is_setgid);
