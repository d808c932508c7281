#![no_main]

use bytes::BytesMut;
use libfuzzer_sys::fuzz_target;
use master_query::core::codec::FrameCodec;
use tokio_util::codec::Decoder;

fuzz_target!(|data: &[u8]| {
    // Drain every complete frame; oversize headers must error, not allocate
    let mut buf = BytesMut::from(data);
    while let Ok(Some(_)) = FrameCodec.decode(&mut buf) {}
});
