#![no_main]

use libfuzzer_sys::fuzz_target;
use master_query::ServerRecord;

fuzz_target!(|data: &[u8]| {
    // Record decoding must never panic on hostile input
    if let Ok(record) = ServerRecord::decode(data) {
        let _ = record.to_string();
    }
});
