#![no_main]
use libfuzzer_sys::fuzz_target;
use libio_core::stdio::{MemoryHandle, Stream};

fuzz_target!(|data: &[u8]| {
    // Each 9-byte chunk: width selector + little-endian value.
    let fields: Vec<(u32, u64)> = data
        .chunks_exact(9)
        .map(|chunk| {
            let width = u32::from(chunk[0] % 64) + 1;
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&chunk[1..]);
            let mask = if width == 64 { u64::MAX } else { (1u64 << width) - 1 };
            (width, u64::from_le_bytes(raw) & mask)
        })
        .collect();
    if fields.is_empty() {
        return;
    }

    let storage = MemoryHandle::new();
    let mut out = Stream::from_handle(storage.clone(), "fuzz", "wb").unwrap();
    for &(width, value) in &fields {
        out.put_bits(value, width).unwrap();
    }
    out.close().unwrap();

    let total_bits: u64 = fields.iter().map(|&(w, _)| u64::from(w)).sum();
    let bytes = storage.contents();
    assert_eq!(bytes.len() as u64, total_bits.div_ceil(8));

    let mut input = Stream::from_handle(storage, "fuzz", "rb").unwrap();
    for &(width, value) in &fields {
        assert_eq!(input.get_bits(width).unwrap(), value);
    }
});
