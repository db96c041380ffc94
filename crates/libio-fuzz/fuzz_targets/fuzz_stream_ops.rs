#![no_main]
use libfuzzer_sys::fuzz_target;
use libio_core::stdio::{MemoryHandle, SeekOrigin, Stream};

fuzz_target!(|data: &[u8]| {
    // Arbitrary op sequences on an update stream must never panic, and
    // tell() must stay consistent with the bytes seen through the handle.
    let storage = MemoryHandle::with_contents(b"seed contents".to_vec());
    let Ok(mut s) = Stream::from_handle(storage.clone(), "fuzz", "r+b") else {
        return;
    };

    for pair in data.chunks(2) {
        let arg = pair.get(1).copied().unwrap_or(0);
        match pair[0] % 10 {
            0 => {
                let _ = s.put_byte(arg);
            }
            1 => {
                let _ = s.get_byte();
            }
            2 => {
                let _ = s.put_bit(arg & 1 == 1);
            }
            3 => {
                let _ = s.get_bit();
            }
            4 => {
                let _ = s.put_bits(u64::from(arg), u32::from(arg % 70));
            }
            5 => {
                let _ = s.get_bits(u32::from(arg % 70));
            }
            6 => {
                let _ = s.seek(i64::from(arg as i8), SeekOrigin::Current);
            }
            7 => {
                let _ = s.unget_byte(arg);
            }
            8 => {
                let _ = s.flush();
            }
            _ => {
                let before = s.tell();
                if let Ok(at) = before {
                    let _ = s.seek(at as i64, SeekOrigin::Start);
                    if let Ok(again) = s.tell() {
                        assert_eq!(again, at);
                    }
                }
            }
        }
    }
    let _ = s.close();
    let _ = storage.contents();
});
