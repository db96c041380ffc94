//! ABI layer for the `libio_*` stdio replacement and the bit extensions.
//!
//! Architecture: the process-wide `StreamTable` from libio-core owns every
//! stream. The opaque `FILE*` handed to C is the stream's `StreamId`
//! reinterpreted as an address; stdin/stdout/stderr sit at fixed ids.
//!
//! Sentinels follow `<stdio.h>`: `EOF` for single-unit calls, `-1` for
//! `ftell`/`fseek`, short item counts for `fread`/`fwrite`, null for
//! `fopen`. The reason is left in `errno`.

use std::collections::HashMap;
use std::ffi::{CStr, CString, OsStr, c_char, c_int, c_long, c_uint, c_void};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::sync::{Once, OnceLock};

use libio_core::errno;
use libio_core::stdio::{
    BufMode, EOF, FileHandle, SeekOrigin, StdioError, Stream, StreamId, copy_file, flush_all,
    global_table,
};
use parking_lot::Mutex;

use crate::errno_abi::{fail, fail_with};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

static EXIT_HOOK: Once = Once::new();

extern "C" fn flush_at_exit() {
    let _ = flush_all();
}

/// Register the exit-time flush exactly once per process.
fn ensure_exit_hook() {
    EXIT_HOOK.call_once(|| {
        // A failed registration only loses the implicit flush.
        let _ = unsafe { libc::atexit(flush_at_exit) };
    });
}

#[inline]
fn as_file(id: StreamId) -> *mut c_void {
    id.as_raw() as *mut c_void
}

#[inline]
fn as_id(stream: *mut c_void) -> StreamId {
    StreamId::from_raw(stream as usize)
}

/// Run `op` on the stream behind `stream`, or set `EBADF` and return
/// `sentinel` when no such stream is open.
pub(crate) fn with_stream<T>(
    stream: *mut c_void,
    sentinel: T,
    op: impl FnOnce(&mut Stream<FileHandle>) -> T,
) -> T {
    ensure_exit_hook();
    let mut table = global_table().lock();
    match table.get_mut(as_id(stream)) {
        Ok(s) => op(s),
        Err(err) => fail(&err, sentinel),
    }
}

#[inline]
fn status_code(result: Result<(), StdioError>) -> c_int {
    match result {
        Ok(()) => 0,
        Err(err) => fail(&err, EOF),
    }
}

/// NUL-terminated copies of `name()` / `mode()` handed out by
/// `fname` / `fmode`. Valid until the stream is closed.
struct Labels {
    name: CString,
    mode: CString,
}

fn labels() -> &'static Mutex<HashMap<StreamId, Labels>> {
    static LABELS: OnceLock<Mutex<HashMap<StreamId, Labels>>> = OnceLock::new();
    LABELS.get_or_init(|| Mutex::new(HashMap::new()))
}

fn label_ptr(stream: *mut c_void, pick: fn(&Labels) -> *const c_char) -> *const c_char {
    let id = as_id(stream);
    with_stream(stream, std::ptr::null(), |s| {
        let mut map = labels().lock();
        let entry = map.entry(id).or_insert_with(|| Labels {
            // Names from Rust callers may carry interior NULs.
            name: CString::new(s.name().replace('\0', "")).unwrap_or_default(),
            mode: CString::new(s.mode()).unwrap_or_default(),
        });
        pick(entry)
    })
}

unsafe fn c_path<'a>(ptr: *const c_char) -> &'a Path {
    let bytes = unsafe { CStr::from_ptr(ptr) }.to_bytes();
    Path::new(OsStr::from_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Standard streams
// ---------------------------------------------------------------------------

/// Handle of the standard input stream.
#[unsafe(no_mangle)]
pub extern "C" fn libio_stdin() -> *mut c_void {
    ensure_exit_hook();
    let _ = global_table();
    as_file(StreamId::STDIN)
}

/// Handle of the standard output stream.
#[unsafe(no_mangle)]
pub extern "C" fn libio_stdout() -> *mut c_void {
    ensure_exit_hook();
    let _ = global_table();
    as_file(StreamId::STDOUT)
}

/// Handle of the standard error stream.
#[unsafe(no_mangle)]
pub extern "C" fn libio_stderr() -> *mut c_void {
    ensure_exit_hook();
    let _ = global_table();
    as_file(StreamId::STDERR)
}

// ---------------------------------------------------------------------------
// fopen / fflush / fclose
// ---------------------------------------------------------------------------

/// `fopen`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fopen(filename: *const c_char, mode: *const c_char) -> *mut c_void {
    if filename.is_null() || mode.is_null() {
        return fail_with(errno::EINVAL, std::ptr::null_mut());
    }
    ensure_exit_hook();

    let path = unsafe { c_path(filename) };
    let Ok(mode) = unsafe { CStr::from_ptr(mode) }.to_str() else {
        return fail_with(errno::EINVAL, std::ptr::null_mut());
    };

    match global_table().lock().open(path, mode) {
        Ok(id) => as_file(id),
        Err(err) => fail(&err, std::ptr::null_mut()),
    }
}

/// `fflush`. A null stream flushes every writable stream.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fflush(stream: *mut c_void) -> c_int {
    if stream.is_null() {
        ensure_exit_hook();
        return status_code(global_table().lock().flush(None));
    }
    with_stream(stream, EOF, |s| status_code(s.flush()))
}

/// `fclose`. The stream is gone afterwards even when the final flush fails.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fclose(stream: *mut c_void) -> c_int {
    let id = as_id(stream);
    let result = global_table().lock().close(id);
    labels().lock().remove(&id);
    status_code(result)
}

// ---------------------------------------------------------------------------
// Single-unit byte I/O
// ---------------------------------------------------------------------------

/// `fgetc`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fgetc(stream: *mut c_void) -> c_int {
    with_stream(stream, EOF, |s| match s.get_byte() {
        Ok(byte) => c_int::from(byte),
        Err(err) => fail(&err, EOF),
    })
}

/// `fputc`. Writes `c` converted to `unsigned char`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fputc(c: c_int, stream: *mut c_void) -> c_int {
    with_stream(stream, EOF, |s| match s.put_byte(c as u8) {
        Ok(byte) => c_int::from(byte),
        Err(err) => fail(&err, EOF),
    })
}

/// `fputs`. Returns a non-negative count on success.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fputs(s: *const c_char, stream: *mut c_void) -> c_int {
    if s.is_null() {
        return fail_with(errno::EINVAL, EOF);
    }
    let bytes = unsafe { CStr::from_ptr(s) }.to_bytes();
    with_stream(stream, EOF, |st| match st.write(bytes) {
        Ok(n) if n < bytes.len() => fail_with(st.last_errno(), EOF),
        Ok(n) => c_int::try_from(n).unwrap_or(c_int::MAX),
        Err(err) => fail(&err, EOF),
    })
}

/// `ungetc`. Pushing back `EOF` fails and leaves the stream unchanged.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_ungetc(c: c_int, stream: *mut c_void) -> c_int {
    if c == EOF {
        return EOF;
    }
    with_stream(stream, EOF, |s| match s.unget_byte(c as u8) {
        Ok(byte) => c_int::from(byte),
        Err(err) => fail(&err, EOF),
    })
}

// ---------------------------------------------------------------------------
// fread / fwrite
// ---------------------------------------------------------------------------

/// `fread`. Returns the number of complete items read.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fread(
    ptr: *mut c_void,
    size: usize,
    nobj: usize,
    stream: *mut c_void,
) -> usize {
    let Some(total) = size.checked_mul(nobj) else {
        return fail_with(errno::EINVAL, 0);
    };
    if ptr.is_null() || total == 0 {
        return 0;
    }
    let dst = unsafe { std::slice::from_raw_parts_mut(ptr.cast::<u8>(), total) };
    with_stream(stream, 0, |s| match s.read(dst) {
        Ok(n) => n / size,
        Err(err) => fail(&err, 0),
    })
}

/// `fwrite`. Returns the number of whole objects that were accepted.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fwrite(
    ptr: *const c_void,
    size: usize,
    nobj: usize,
    stream: *mut c_void,
) -> usize {
    let Some(total) = size.checked_mul(nobj) else {
        return fail_with(errno::EINVAL, 0);
    };
    if ptr.is_null() || total == 0 {
        return 0;
    }
    let src = unsafe { std::slice::from_raw_parts(ptr.cast::<u8>(), total) };
    with_stream(stream, 0, |s| match s.write(src) {
        Ok(n) if n < total => fail_with(s.last_errno(), n / size),
        Ok(_) => nobj,
        Err(err) => fail(&err, 0),
    })
}

// ---------------------------------------------------------------------------
// Positioning
// ---------------------------------------------------------------------------

/// `fseek`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fseek(stream: *mut c_void, offset: c_long, origin: c_int) -> c_int {
    let Some(origin) = SeekOrigin::from_whence(origin) else {
        return fail_with(errno::EINVAL, -1);
    };
    with_stream(stream, -1, |s| match s.seek(i64::from(offset), origin) {
        Ok(_) => 0,
        Err(err) => fail(&err, -1),
    })
}

/// `ftell`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_ftell(stream: *mut c_void) -> c_long {
    with_stream(stream, -1, |s| match s.tell() {
        Ok(pos) => c_long::try_from(pos).unwrap_or_else(|_| fail_with(errno::EINVAL, -1)),
        Err(err) => fail(&err, -1),
    })
}

/// `rewind`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_rewind(stream: *mut c_void) {
    with_stream(stream, (), |s| {
        if let Err(err) = s.rewind() {
            fail(&err, ())
        }
    });
}

/// `fgetpos`. The position is the byte offset from the start.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fgetpos(stream: *mut c_void, pos: *mut libc::off_t) -> c_int {
    if pos.is_null() {
        return fail_with(errno::EINVAL, -1);
    }
    with_stream(stream, -1, |s| match s.get_pos() {
        Ok(p) => match libc::off_t::try_from(p.offset()) {
            Ok(off) => {
                unsafe { *pos = off };
                0
            }
            Err(_) => fail_with(errno::EINVAL, -1),
        },
        Err(err) => fail(&err, -1),
    })
}

/// `fsetpos`. Accepts a value produced by `libio_fgetpos`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_fsetpos(stream: *mut c_void, pos: *const libc::off_t) -> c_int {
    if pos.is_null() {
        return fail_with(errno::EINVAL, -1);
    }
    let offset = unsafe { *pos };
    with_stream(stream, -1, |s| match s.seek(offset, SeekOrigin::Start) {
        Ok(_) => 0,
        Err(err) => fail(&err, -1),
    })
}

// ---------------------------------------------------------------------------
// Flags and buffering
// ---------------------------------------------------------------------------

/// `clearerr`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_clearerr(stream: *mut c_void) {
    with_stream(stream, (), |s| s.clear_err());
}

/// `feof`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_feof(stream: *mut c_void) -> c_int {
    with_stream(stream, 0, |s| c_int::from(s.is_eof()))
}

/// `ferror`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_ferror(stream: *mut c_void) -> c_int {
    with_stream(stream, 0, |s| c_int::from(s.is_error()))
}

/// `setvbuf`. Caller-supplied storage is not adopted; only the mode and
/// size are honored. Fails once I/O has happened.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn libio_setvbuf(
    stream: *mut c_void,
    _buf: *mut c_char,
    mode: c_int,
    size: usize,
) -> c_int {
    let Some(mode) = BufMode::from_posix(mode) else {
        return fail_with(errno::EINVAL, -1);
    };
    with_stream(stream, -1, |s| {
        if s.set_buffering(mode, size) {
            0
        } else {
            fail_with(errno::EINVAL, -1)
        }
    })
}

// ---------------------------------------------------------------------------
// Stream properties
// ---------------------------------------------------------------------------

/// Path the stream was opened with, or null for an unknown stream.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fname(stream: *mut c_void) -> *const c_char {
    label_ptr(stream, |l| l.name.as_ptr())
}

/// Mode string the stream was opened with, or null for an unknown stream.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fmode(stream: *mut c_void) -> *const c_char {
    label_ptr(stream, |l| l.mode.as_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn freadable(stream: *mut c_void) -> bool {
    with_stream(stream, false, |s| s.is_readable())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn fwriteable(stream: *mut c_void) -> bool {
    with_stream(stream, false, |s| s.is_writable())
}

/// Copy file `name` to `new_name` (created or truncated).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fcopy(name: *const c_char, new_name: *const c_char) -> bool {
    if name.is_null() || new_name.is_null() {
        return fail_with(errno::EINVAL, false);
    }
    let (src, dst) = unsafe { (c_path(name), c_path(new_name)) };
    match copy_file(src, dst) {
        Ok(_) => true,
        Err(err) => fail(&err, false),
    }
}

// ---------------------------------------------------------------------------
// Bit I/O
// ---------------------------------------------------------------------------

/// Read one bit (0 or 1), or `EOF`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fgetbit(stream: *mut c_void) -> c_int {
    with_stream(stream, EOF, |s| match s.get_bit() {
        Ok(bit) => c_int::from(bit),
        Err(err) => fail(&err, EOF),
    })
}

/// Write one bit; any nonzero `bit` is a 1. Returns the bit written or `EOF`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fputbit(stream: *mut c_void, bit: u8) -> c_int {
    with_stream(stream, EOF, |s| match s.put_bit(bit != 0) {
        Ok(written) => c_int::from(written),
        Err(err) => fail(&err, EOF),
    })
}

/// Read `count` bits (at most 64) MSB-first into `*value`.
///
/// Returns 0 on success and `EOF` on failure; `*value` is untouched on
/// failure.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fgetbits(stream: *mut c_void, count: c_uint, value: *mut u64) -> c_int {
    if value.is_null() {
        return fail_with(errno::EINVAL, EOF);
    }
    with_stream(stream, EOF, |s| match s.get_bits(count) {
        Ok(bits) => {
            unsafe { *value = bits };
            0
        }
        Err(err) => fail(&err, EOF),
    })
}

/// Write the `count` low bits of `bits` MSB-first. Returns 0 or `EOF`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fputbits(stream: *mut c_void, bits: u64, count: c_uint) -> c_int {
    with_stream(stream, EOF, |s| status_code(s.put_bits(bits, count)))
}
