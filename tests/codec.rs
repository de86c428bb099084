use byteorder::{LittleEndian, WriteBytesExt};
use esm4_store::esm4::codec::compression::decompress_record_into;
use esm4_store::Esm4Error;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::io::Write;

fn payload(declared: u32, plain: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(plain).unwrap();
    let mut data = Vec::new();
    data.write_u32::<LittleEndian>(declared).unwrap();
    data.extend_from_slice(&encoder.finish().unwrap());
    data
}

#[test]
fn inflates_to_the_declared_size() {
    let plain = vec![7u8; 5000];
    let mut output = Vec::new();
    decompress_record_into(&mut output, &payload(5000, &plain)).unwrap();
    assert_eq!(output, plain);
}

#[test]
fn huge_declared_size_is_an_error_not_an_allocation() {
    let mut output = Vec::new();
    let err = decompress_record_into(&mut output, &payload(u32::MAX, b"tiny")).unwrap_err();
    assert!(matches!(
        err,
        Esm4Error::SizeMismatch {
            expected: 0xFFFF_FFFF,
            found: 4,
            ..
        }
    ));
    assert!(output.capacity() < 1 << 20);
}

#[test]
fn stream_longer_than_declared_stops_one_byte_past_it() {
    let mut output = Vec::new();
    let err = decompress_record_into(&mut output, &payload(4, &[1u8; 4096])).unwrap_err();
    assert!(matches!(err, Esm4Error::SizeMismatch { expected: 4, found: 5, .. }));
}

#[test]
fn missing_size_prefix_is_reported() {
    let mut output = Vec::new();
    assert!(matches!(
        decompress_record_into(&mut output, &[1, 2]),
        Err(Esm4Error::Decompression(_))
    ));
}
