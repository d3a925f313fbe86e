#![no_main]

use breathxplorer::tandem::{parse_mgf, to_mgf_string};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    if let Ok(spectra) = parse_mgf(text) {
        // Whatever parses must write back and parse again to the same spectra
        let written = to_mgf_string(&spectra, f64::NEG_INFINITY);
        let reparsed = parse_mgf(&written).expect("written MGF must parse");
        assert_eq!(reparsed.len(), spectra.len());
    }
});
