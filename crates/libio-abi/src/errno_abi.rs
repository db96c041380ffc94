//! Errno plumbing for the C boundary.
//!
//! Failures are reported in the calling thread's C `errno`, the same slot
//! the platform stdio uses, so `perror` / `strerror(errno)` keep working
//! at redirected call sites.

use std::ffi::c_int;

use libio_core::stdio::StdioError;

#[inline]
pub(crate) unsafe fn set_abi_errno(val: c_int) {
    #[cfg(any(target_os = "linux", target_os = "android"))]
    let p = unsafe { libc::__errno_location() };
    #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
    let p = unsafe { libc::__error() };
    unsafe { *p = val };
}

/// Store the errno for `err` (end of data leaves errno alone) and hand
/// back the caller's sentinel.
pub(crate) fn fail<T>(err: &StdioError, sentinel: T) -> T {
    let code = err.errno();
    if code != 0 {
        unsafe { set_abi_errno(code) };
    }
    sentinel
}

/// Store an explicit errno and hand back the caller's sentinel.
pub(crate) fn fail_with<T>(code: c_int, sentinel: T) -> T {
    unsafe { set_abi_errno(code) };
    sentinel
}
