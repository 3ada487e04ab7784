use bytes::{Bytes, BytesMut};
use igbinary::{Encoder, Error, Value};
use std::collections::BTreeMap;

fn enc<T: Value>(value: &T) -> String {
    let mut buf = BytesMut::new();
    {
        let mut encoder = Encoder::new(&mut buf);
        encoder.encode(value).unwrap();
    }
    hex::encode(&buf)
}

#[test]
fn test_encode_integers() {
    assert_eq!(enc(&0i64), "0600");
    assert_eq!(enc(&1i64), "0601");
    assert_eq!(enc(&-1i64), "0701");
    assert_eq!(enc(&255i64), "06ff");
    assert_eq!(enc(&-255i64), "07ff");
    assert_eq!(enc(&1000i64), "0803e8");
    assert_eq!(enc(&-1000i64), "0903e8");
    assert_eq!(enc(&100000i64), "0a000186a0");
    assert_eq!(enc(&-100000i32), "0b000186a0");
    assert_eq!(enc(&i8::MIN), "0780");
    assert_eq!(enc(&u32::MAX), "0affffffff");
    assert_eq!(enc(&256u16), "080100");
}

#[test]
fn test_encode_integer_beyond_32_bits_fails() {
    let mut buf = BytesMut::new();
    let mut encoder = Encoder::new(&mut buf);
    assert!(matches!(encoder.encode(&(1i64 << 32)), Err(Error::Encode(_))));
    assert!(matches!(encoder.encode(&u64::MAX), Err(Error::Encode(_))));
    assert!(matches!(encoder.encode(&i64::MIN), Err(Error::Encode(_))));
}

#[test]
fn test_encode_scalars() {
    assert_eq!(enc(&123.456f64), "0c405edd2f1a9fbe77");
    assert_eq!(enc(&true), "05");
    assert_eq!(enc(&false), "04");
}

#[test]
fn test_encode_strings() {
    assert_eq!(enc(&"foobar".to_string()), "1106666f6f626172");
    assert_eq!(enc(&String::new()), "0d");
    assert_eq!(enc(&b"ab".to_vec()), "11026162");
    assert_eq!(enc(&Bytes::from_static(b"ab")), "11026162");

    let long = "x".repeat(300);
    assert!(enc(&long).starts_with("12012c"));
}

#[test]
fn test_encode_string_back_references() {
    let mut buf = BytesMut::new();
    {
        let mut encoder = Encoder::new(&mut buf);
        encoder.encode_str("foo").unwrap();
        encoder.encode_str("").unwrap();
        encoder.encode_str("bar").unwrap();
        encoder.encode_str("foo").unwrap();
        encoder.encode_str("bar").unwrap();
    }
    // The empty string never takes a dictionary slot.
    assert_eq!(hex::encode(&buf), "1103666f6f0d11036261720e000e01");
}

#[test]
fn test_encode_wide_string_ids() {
    let mut buf = BytesMut::new();
    {
        let mut encoder = Encoder::new(&mut buf);
        for i in 0..257 {
            encoder.encode_str(&format!("s{}", i)).unwrap();
        }
        encoder.encode_str("s256").unwrap();
    }
    assert!(hex::encode(&buf).ends_with("0f0100"));
}

#[test]
fn test_encode_array_lengths() {
    let lens = [(10usize, "140a"), (300, "15012c"), (0xfffff, "16000fffff")];
    for (len, expected) in lens {
        let mut buf = BytesMut::new();
        Encoder::new(&mut buf).encode_array_len(len).unwrap();
        assert_eq!(hex::encode(&buf), expected);
    }
}

#[test]
fn test_encode_options_and_maps() {
    assert_eq!(enc(&None::<i32>), "00");
    assert_eq!(enc(&Some(5i32)), "0605");
    assert_eq!(enc(&Box::new(5i32)), "0605");

    let mut map = BTreeMap::new();
    map.insert("a".to_string(), 1i32);
    map.insert("b".to_string(), 2i32);
    assert_eq!(enc(&map), "140211016106011101620602");
    assert_eq!(enc(&BTreeMap::<String, i32>::new()), "1400");
}

#[test]
fn test_encode_unsupported_type() {
    let mut buf = BytesMut::new();
    let mut encoder = Encoder::new(&mut buf);
    let err = encoder.encode(&vec![1u32, 2]).unwrap_err();
    assert!(matches!(err, Error::Unsupported { op: "Encode", .. }));
    assert!(err.to_string().starts_with("igbinary: Encode(unsupported "));

    assert!(matches!(
        encoder.encode(&1.5f32),
        Err(Error::Unsupported { op: "Encode", .. })
    ));
}

#[test]
fn test_encode_into_full_sink() {
    let mut storage = [0u8; 1];
    let mut sink: &mut [u8] = &mut storage;
    let mut encoder = Encoder::new(&mut sink);
    assert!(matches!(encoder.encode(&1000i32), Err(Error::Io(_))));
}

#[test]
fn test_marshal_writes_header() {
    let bytes = igbinary::marshal(&"foobar".to_string()).unwrap();
    assert_eq!(hex::encode(&bytes), "000000021106666f6f626172");
}

#[test]
fn test_encode_width_edges_and_repeated_empty_string() {
    let mut buf = BytesMut::new();
    {
        let mut encoder = Encoder::new(&mut buf);
        encoder.encode(&String::new()).unwrap();
        encoder.encode(&String::new()).unwrap();
        encoder.encode(&65535u32).unwrap();
        encoder.encode(&65536u32).unwrap();
        encoder.encode(&-65536i64).unwrap();
    }
    assert_eq!(hex::encode(&buf), "0d0d08ffff0a000100000b00010000");
    assert_eq!(enc(&-65535i64), "09ffff");
    assert_eq!(enc(&-256i32), "090100");
}

#[test]
fn test_failed_string_write_takes_no_id() {
    let mut storage = [0u8; 4];
    let mut sink: &mut [u8] = &mut storage;
    let mut encoder = Encoder::new(&mut sink);
    // The length prefix fits, the payload does not.
    assert!(matches!(encoder.encode_str("abc"), Err(Error::Io(_))));
    // A back-reference would fit the remaining space; the string must be sent in full instead.
    assert!(matches!(encoder.encode_str("abc"), Err(Error::Io(_))));
}

#[test]
fn test_to_writer() {
    let mut out = Vec::new();
    igbinary::to_writer(&1000i32, &mut out).unwrap();
    assert_eq!(hex::encode(&out), "000000020803e8");

    struct Closed;

    impl std::io::Write for Closed {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    assert!(matches!(
        igbinary::to_writer(&1000i32, Closed),
        Err(Error::Io(_))
    ));
}
