//! Whole-file copy through two buffered streams.

use std::path::Path;

use super::buffer::BUFSIZ;
use super::error::StdioError;
use super::stream::Stream;
use crate::errno;

/// Copy the contents of `src` into `dst` (created or truncated).
///
/// Returns the number of bytes copied.
pub fn copy_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> Result<u64, StdioError> {
    let mut input = Stream::open(src, "rb")?;
    let mut output = Stream::open(dst, "wb")?;

    let mut chunk = vec![0u8; BUFSIZ];
    let mut copied = 0u64;
    loop {
        let n = input.read(&mut chunk)?;
        if n == 0 {
            break;
        }
        let written = output.write(&chunk[..n])?;
        copied += written as u64;
        if written < n {
            return Err(StdioError::Io(std::io::Error::from_raw_os_error(
                output.last_errno(),
            )));
        }
    }
    if input.is_error() {
        return Err(StdioError::Io(std::io::Error::from_raw_os_error(errno::EIO)));
    }

    input.close()?;
    output.close()?;
    Ok(copied)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_path(prefix: &str) -> std::path::PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!("{prefix}-{}-{nanos}", std::process::id()))
    }

    #[test]
    fn copies_multi_buffer_file() {
        let src = temp_path("libio-copy-src");
        let dst = temp_path("libio-copy-dst");
        let payload: Vec<u8> = (0..BUFSIZ * 2 + 17).map(|i| (i % 251) as u8).collect();
        fs::write(&src, &payload).unwrap();

        assert_eq!(copy_file(&src, &dst).unwrap(), payload.len() as u64);
        assert_eq!(fs::read(&dst).unwrap(), payload);

        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&dst);
    }

    #[test]
    fn empty_source_creates_empty_destination() {
        let src = temp_path("libio-copy-empty");
        let dst = temp_path("libio-copy-empty-dst");
        fs::write(&src, b"").unwrap();
        assert_eq!(copy_file(&src, &dst).unwrap(), 0);
        assert!(fs::read(&dst).unwrap().is_empty());
        let _ = fs::remove_file(&src);
        let _ = fs::remove_file(&dst);
    }

    #[test]
    fn missing_source_is_open_error() {
        let src = temp_path("libio-copy-missing");
        let dst = temp_path("libio-copy-never");
        let err = copy_file(&src, &dst).unwrap_err();
        assert!(matches!(err, StdioError::Open { .. }));
        assert_eq!(err.errno(), errno::ENOENT);
        assert!(!dst.exists());
    }
}
