#![no_main]

use breathxplorer::formats::mzml::MzMLSource;
use breathxplorer::formats::ScanSource;
use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    // Malformed documents must surface as errors, never as panics
    let mut source = MzMLSource::new(Cursor::new(data));

    for _ in 0..100 {
        match source.next_scan() {
            Ok(Some(scan)) => {
                // Scans that do parse must be safe to feed to the extractor
                let _ = scan.validate(0);
            }
            Ok(None) | Err(_) => break,
        }
    }
});
