#[cfg(feature = "indexmap")]
#[test]
fn test_indexmap_keeps_stream_order() {
    use indexmap::IndexMap;

    let mut map: IndexMap<String, i32> = IndexMap::new();
    map.insert("z".to_string(), 1);
    map.insert("a".to_string(), 2);
    let bytes = igbinary::marshal(&map).unwrap();
    assert_eq!(hex::encode(&bytes[4..]), "140211017a06011101610602");

    let decoded: IndexMap<String, i32> = igbinary::decode(&bytes).unwrap();
    let keys: Vec<&str> = decoded.keys().map(|k| k.as_str()).collect();
    assert_eq!(keys, vec!["z", "a"]);
}

#[cfg(feature = "smol_str")]
#[test]
fn test_smol_str_values() {
    use smol_str::SmolStr;

    let value = SmolStr::new("foobar");
    let bytes = igbinary::marshal(&value).unwrap();
    assert_eq!(&bytes[4..], b"\x11\x06foobar");
    let decoded: SmolStr = igbinary::decode(&bytes).unwrap();
    assert_eq!(decoded, value);
}
