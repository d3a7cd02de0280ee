//! Fuzz target for `RecordHeader::parse`
//!
//! Arbitrary bytes parsed as TLS and DTLS headers with any expected
//! connection ID length. Parsing should NEVER panic, and whatever parses
//! must write back to the same bytes.

#![no_main]

use libfuzzer_sys::fuzz_target;
use tlsrec_harness::RecordHeader;

fuzz_target!(|input: (bool, u8, &[u8])| {
    let (dtls, cid_len, data) = input;
    let Ok(header) = RecordHeader::parse(data, dtls, usize::from(cid_len % 32)) else {
        return;
    };

    let mut out = vec![0u8; header.encoded_len()];
    header.write(&mut out).expect("parsed header should write back");
    assert_eq!(&out[..], &data[..out.len()]);
});
