//! C entry point overhead: `libio_fputc` / `libio_fgetc` / `fputbits`
//! through the global stream table against a real temp file.

use std::ffi::CString;
use std::os::unix::ffi::OsStrExt;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use libio_abi::stdio_abi::{
    fgetbits, fputbits, libio_fclose, libio_fgetc, libio_fopen, libio_fputc, libio_rewind,
};

const OPS: usize = 4096;

fn bench_fputc_fgetc(c: &mut Criterion) {
    let path = std::env::temp_dir().join(format!("libio-abi-bench-{}", std::process::id()));
    let cpath = CString::new(path.as_os_str().as_bytes()).unwrap();
    let stream = unsafe { libio_fopen(cpath.as_ptr(), c"w+b".as_ptr()) };
    assert!(!stream.is_null());

    c.bench_function("libio_fputc_x4096", |b| {
        b.iter(|| {
            unsafe { libio_rewind(stream) };
            for i in 0..OPS {
                black_box(unsafe { libio_fputc((i & 0xFF) as libc::c_int, stream) });
            }
        });
    });

    c.bench_function("libio_fgetc_x4096", |b| {
        b.iter(|| {
            unsafe { libio_rewind(stream) };
            for _ in 0..OPS {
                black_box(unsafe { libio_fgetc(stream) });
            }
        });
    });

    c.bench_function("fputbits_13_x4096", |b| {
        b.iter(|| {
            unsafe { libio_rewind(stream) };
            for i in 0..OPS {
                black_box(unsafe { fputbits(stream, i as u64, 13) });
            }
        });
    });

    c.bench_function("fgetbits_13_x4096", |b| {
        let mut value = 0u64;
        b.iter(|| {
            unsafe { libio_rewind(stream) };
            for _ in 0..OPS {
                black_box(unsafe { fgetbits(stream, 13, &mut value) });
            }
        });
    });

    unsafe { libio_fclose(stream) };
    let _ = std::fs::remove_file(&path);
}

criterion_group!(benches, bench_fputc_fgetc);
criterion_main!(benches);
