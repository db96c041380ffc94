//! Integration tests for the C boundary: sentinels, errno and the bit and
//! metadata extensions, driven through the exported functions.

use std::ffi::{CStr, CString, c_char, c_void};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::ptr;
use std::sync::{Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use libio_abi::stat_abi::*;
use libio_abi::stdio_abi::*;

const EOF: i32 = -1;

// Every test shares the process-wide stream table, and `fflush(NULL)` would
// pad another test's partial bits.
static TEST_LOCK: Mutex<()> = Mutex::new(());

fn serial() -> MutexGuard<'static, ()> {
    TEST_LOCK.lock().unwrap_or_else(|e| e.into_inner())
}

fn temp_path(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
}

fn c(s: &str) -> CString {
    CString::new(s).unwrap()
}

fn c_path(p: &PathBuf) -> CString {
    c(p.to_str().unwrap())
}

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(0)
}

unsafe fn open(path: &PathBuf, mode: &str) -> *mut c_void {
    let f = unsafe { libio_fopen(c_path(path).as_ptr(), c(mode).as_ptr()) };
    assert!(!f.is_null(), "fopen {} {mode}", path.display());
    f
}

#[test]
fn fopen_invalid_mode_returns_null_with_einval() {
    let _guard = serial();
    let path = temp_path("libio-abi-mode");
    let f = unsafe { libio_fopen(c_path(&path).as_ptr(), c("rw").as_ptr()) };
    assert!(f.is_null());
    assert_eq!(last_errno(), libc::EINVAL);
    assert!(!path.exists());
}

#[test]
fn fopen_missing_file_returns_null_with_enoent() {
    let _guard = serial();
    let path = temp_path("libio-abi-missing");
    let f = unsafe { libio_fopen(c_path(&path).as_ptr(), c("r").as_ptr()) };
    assert!(f.is_null());
    assert_eq!(last_errno(), libc::ENOENT);
}

#[test]
fn null_arguments_are_rejected() {
    let _guard = serial();
    unsafe {
        assert!(libio_fopen(ptr::null(), c("r").as_ptr()).is_null());
        assert_eq!(libio_fclose(ptr::null_mut()), EOF);
        assert_eq!(libio_fgetc(ptr::null_mut()), EOF);
        assert_eq!(last_errno(), libc::EBADF);
        assert_eq!(libio_feof(ptr::null_mut()), 0);
        assert!(fname(ptr::null_mut()).is_null());
    }
}

#[test]
fn bytes_round_trip_through_abi() {
    let _guard = serial();
    let path = temp_path("libio-abi-bytes");
    unsafe {
        let f = open(&path, "w+b");
        let payload = b"hello, libio";
        assert_eq!(
            libio_fwrite(payload.as_ptr().cast(), 1, payload.len(), f),
            payload.len()
        );
        assert_eq!(libio_ftell(f), payload.len() as i64);
        libio_rewind(f);
        assert_eq!(libio_ftell(f), 0);

        let mut back = [0u8; 32];
        let n = libio_fread(back.as_mut_ptr().cast(), 1, back.len(), f);
        assert_eq!(n, payload.len());
        assert_eq!(&back[..n], payload);
        assert_eq!(libio_feof(f), 1);
        assert_eq!(libio_fgetc(f), EOF);

        assert_eq!(libio_fseek(f, 7, libc::SEEK_SET), 0);
        assert_eq!(libio_feof(f), 0);
        assert_eq!(libio_fgetc(f), i32::from(b'l'));
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fread_counts_whole_items() {
    let _guard = serial();
    let path = temp_path("libio-abi-items");
    fs::write(&path, [1u8; 10]).unwrap();
    unsafe {
        let f = open(&path, "r");
        let mut buf = [0u8; 12];
        assert_eq!(libio_fread(buf.as_mut_ptr().cast(), 4, 3, f), 2);
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fputc_fputs_and_ungetc() {
    let _guard = serial();
    let path = temp_path("libio-abi-chars");
    unsafe {
        let f = open(&path, "w+");
        assert_eq!(libio_fputc(0x141, f), 0x41);
        assert!(libio_fputs(c("BC").as_ptr(), f) >= 0);
        libio_rewind(f);
        assert_eq!(libio_fgetc(f), i32::from(b'A'));
        assert_eq!(libio_ungetc(i32::from(b'z'), f), i32::from(b'z'));
        assert_eq!(libio_fgetc(f), i32::from(b'z'));
        assert_eq!(libio_fgetc(f), i32::from(b'B'));
        assert_eq!(libio_ungetc(EOF, f), EOF);
        assert_eq!(libio_fclose(f), 0);
    }
    assert_eq!(fs::read(&path).unwrap(), b"ABC");
    let _ = fs::remove_file(&path);
}

#[test]
fn write_to_read_only_stream_sets_error() {
    let _guard = serial();
    let path = temp_path("libio-abi-ro");
    fs::write(&path, b"x").unwrap();
    unsafe {
        let f = open(&path, "r");
        assert_eq!(libio_fputc(i32::from(b'y'), f), EOF);
        assert_eq!(last_errno(), libc::EBADF);
        assert_eq!(libio_ferror(f), 1);
        libio_clearerr(f);
        assert_eq!(libio_ferror(f), 0);
        assert!(freadable(f));
        assert!(!fwriteable(f));
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fseek_rejects_bad_origin() {
    let _guard = serial();
    let path = temp_path("libio-abi-origin");
    unsafe {
        let f = open(&path, "w");
        assert_eq!(libio_fseek(f, 0, 17), -1);
        assert_eq!(last_errno(), libc::EINVAL);
        assert_eq!(libio_fseek(f, -1, libc::SEEK_SET), -1);
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fgetpos_fsetpos_round_trip() {
    let _guard = serial();
    let path = temp_path("libio-abi-pos");
    fs::write(&path, b"0123456789").unwrap();
    unsafe {
        let f = open(&path, "r");
        libio_fgetc(f);
        libio_fgetc(f);
        libio_fgetc(f);
        let mut pos: libc::off_t = -1;
        assert_eq!(libio_fgetpos(f, &mut pos), 0);
        assert_eq!(pos, 3);
        libio_fgetc(f);
        assert_eq!(libio_fsetpos(f, &pos), 0);
        assert_eq!(libio_fgetc(f), i32::from(b'3'));
        assert_eq!(libio_fgetpos(f, ptr::null_mut()), -1);
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn setvbuf_only_before_io() {
    let _guard = serial();
    let path = temp_path("libio-abi-setvbuf");
    unsafe {
        let f = open(&path, "w");
        assert_eq!(libio_setvbuf(f, ptr::null_mut(), 2, 0), 0);
        assert_eq!(libio_fputc(i32::from(b'u'), f), i32::from(b'u'));
        // Unbuffered: the byte is already on disk.
        assert_eq!(fs::read(&path).unwrap(), b"u");
        assert_eq!(libio_setvbuf(f, ptr::null_mut(), 0, 64), -1);
        assert_eq!(libio_setvbuf(f, ptr::null_mut(), 9, 64), -1);
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fflush_null_flushes_every_stream() {
    let _guard = serial();
    let a = temp_path("libio-abi-flush-a");
    let b = temp_path("libio-abi-flush-b");
    unsafe {
        let fa = open(&a, "w");
        let fb = open(&b, "w");
        libio_fputs(c("alpha").as_ptr(), fa);
        libio_fputs(c("beta").as_ptr(), fb);
        assert!(fs::read(&a).unwrap().is_empty());
        assert_eq!(libio_fflush(ptr::null_mut()), 0);
        assert_eq!(fs::read(&a).unwrap(), b"alpha");
        assert_eq!(fs::read(&b).unwrap(), b"beta");
        assert_eq!(libio_fclose(fa), 0);
        assert_eq!(libio_fclose(fb), 0);
    }
    let _ = fs::remove_file(&a);
    let _ = fs::remove_file(&b);
}

#[test]
fn closed_stream_is_bad() {
    let _guard = serial();
    let path = temp_path("libio-abi-closed");
    unsafe {
        let f = open(&path, "w");
        assert_eq!(libio_fclose(f), 0);
        assert_eq!(libio_fputc(i32::from(b'x'), f), EOF);
        assert_eq!(last_errno(), libc::EBADF);
        assert_eq!(libio_fclose(f), EOF);
        assert_eq!(fsize(f), 0);
        assert!(!freg(f));
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn name_and_mode_strings() {
    let _guard = serial();
    let path = temp_path("libio-abi-name");
    unsafe {
        let f = open(&path, "a+b");
        let name = CStr::from_ptr(fname(f)).to_str().unwrap().to_string();
        assert_eq!(name, path.to_str().unwrap());
        assert_eq!(CStr::from_ptr(fmode(f)).to_bytes(), b"a+b");
        assert_eq!(libio_fclose(f), 0);

        let out = libio_stdout();
        assert_eq!(CStr::from_ptr(fname(out)).to_bytes(), b"<stdout>");
        assert!(fwriteable(out));
        assert!(freadable(libio_stdin()));
        assert!(!freadable(libio_stderr()));
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn bits_through_abi() {
    let _guard = serial();
    let path = temp_path("libio-abi-bits");
    unsafe {
        let f = open(&path, "w+b");
        assert_eq!(fputbit(f, 1), 1);
        assert_eq!(fputbit(f, 7), 1);
        assert_eq!(fputbit(f, 0), 0);
        assert_eq!(fputbits(f, 0x2D, 6), 0);
        assert_eq!(fputbits(f, 0, 65), EOF);
        assert_eq!(last_errno(), libc::EINVAL);
        assert_eq!(libio_fclose(f), 0);
    }
    // 110 101101 + 7 padding zeros
    assert_eq!(fs::read(&path).unwrap(), vec![0b1101_0110, 0b1000_0000]);

    unsafe {
        let f = open(&path, "rb");
        let mut v = 0u64;
        assert_eq!(fgetbits(f, 3, &mut v), 0);
        assert_eq!(v, 0b110);
        assert_eq!(fgetbits(f, 6, &mut v), 0);
        assert_eq!(v, 0x2D);
        assert_eq!(fgetbits(f, 7, &mut v), 0);
        assert_eq!(v, 0);
        v = 99;
        assert_eq!(fgetbits(f, 1, &mut v), EOF);
        assert_eq!(v, 99);
        assert_eq!(libio_feof(f), 1);
        assert_eq!(fgetbit(f), EOF);
        assert_eq!(fgetbits(f, 1, ptr::null_mut()), EOF);
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn metadata_accessors() {
    let _guard = serial();
    let path = temp_path("libio-abi-meta");
    fs::write(&path, vec![0u8; 3 * 1024]).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o640)).unwrap();
    let md = fs::metadata(&path).unwrap();
    unsafe {
        let f = open(&path, "r");
        assert_eq!(fsize(f), 3 * 1024);
        assert!(freg(f));
        assert!(!fdir(f) && !flink(f) && !fsock(f) && !ffifo(f));
        assert!(!fblock(f) && !fchar(f));
        assert!(fuser_r(f) && fuser_w(f) && !fuser_x(f));
        assert!(fgroup_r(f) && !fgroup_w(f) && !fgroup_x(f));
        assert!(!fother_r(f) && !fother_w(f) && !fother_x(f));
        assert!(!fsuid(f) && !fsgid(f));
        assert!(fnlink(f) >= 1);
        assert_eq!(finoid(f) as u64, std::os::unix::fs::MetadataExt::ino(&md));
        assert_eq!(fuid(f), std::os::unix::fs::MetadataExt::uid(&md));
        assert_eq!(fgid(f), std::os::unix::fs::MetadataExt::gid(&md));
        assert_eq!(fmtime(f), std::os::unix::fs::MetadataExt::mtime(&md));
        assert!(fdevid(f) == std::os::unix::fs::MetadataExt::dev(&md) as libc::dev_t);

        let mut unit = [0 as c_char; 4];
        let value = fhsize(f, unit.as_mut_ptr());
        assert!((value - 3.0).abs() < f64::EPSILON);
        assert_eq!(CStr::from_ptr(unit.as_ptr()).to_bytes(), b"KB");
        assert!((fhsize(f, ptr::null_mut()) - 3.0).abs() < f64::EPSILON);
        assert_eq!(libio_fclose(f), 0);
    }
    let _ = fs::remove_file(&path);
}

#[test]
fn fcopy_copies_and_reports_failure() {
    let _guard = serial();
    let src = temp_path("libio-abi-copy-src");
    let dst = temp_path("libio-abi-copy-dst");
    fs::write(&src, b"copy me").unwrap();
    unsafe {
        assert!(fcopy(c_path(&src).as_ptr(), c_path(&dst).as_ptr()));
        assert!(!fcopy(c_path(&temp_path("libio-abi-nope")).as_ptr(), c_path(&dst).as_ptr()));
        assert_eq!(last_errno(), libc::ENOENT);
        assert!(!fcopy(ptr::null(), c_path(&dst).as_ptr()));
    }
    assert_eq!(fs::read(&dst).unwrap(), b"copy me");
    let _ = fs::remove_file(&src);
    let _ = fs::remove_file(&dst);
}

#[test]
fn fwrite_to_full_device_reports_enospc() {
    let _guard = serial();
    let full = PathBuf::from("/dev/full");
    if !full.exists() {
        return;
    }
    unsafe {
        let f = open(&full, "w");
        assert_eq!(libio_setvbuf(f, ptr::null_mut(), libc::_IONBF, 0), 0);
        let payload = [7u8; 16];
        assert_eq!(libio_fwrite(payload.as_ptr().cast(), 4, 4, f), 0);
        assert_eq!(last_errno(), libc::ENOSPC);
        assert_eq!(libio_ferror(f), 1);
        assert_eq!(libio_fputs(c("x").as_ptr(), f), EOF);
        assert_eq!(libio_fclose(f), 0);
    }
}
