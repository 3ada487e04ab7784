use igbinary::{
    decode, marshal, unmarshal, Decoder, Error, Field, RangeError, Record, RecordError, Shape,
    Value,
};
use std::collections::BTreeMap;

#[derive(Record, Default, Debug, PartialEq)]
struct User {
    id: u32,
    name: String,
    email: Option<String>,
    tags: BTreeMap<String, i32>,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Pair {
    a: String,
    b: String,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Renamed {
    #[igbinary(rename = "ID")]
    id: i32,
    #[igbinary(skip)]
    cache: String,
    r#type: String,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Wide {
    name: String,
    extra: BTreeMap<String, String>,
    label: String,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Narrow {
    name: String,
    label: String,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Counter {
    n: u8,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Flags {
    on: bool,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Node {
    value: i32,
    next: Option<Box<Node>>,
}

#[derive(Record, Default, Debug, PartialEq)]
struct Outer {
    user: User,
    users: BTreeMap<String, User>,
}

fn body(value: &impl Value) -> String {
    let bytes = marshal(value).unwrap();
    hex::encode(&bytes[4..])
}

#[test]
fn test_record_wire_format() {
    let user = User {
        id: 7,
        name: "ann".to_string(),
        email: None,
        tags: BTreeMap::new(),
    };
    assert_eq!(
        body(&user),
        "1404\
         110269640607\
         11046e616d651103616e6e\
         1105656d61696c00\
         1104746167731400"
    );
}

#[test]
fn test_record_round_trip() {
    let mut tags = BTreeMap::new();
    tags.insert("admin".to_string(), 1);
    tags.insert("name".to_string(), 2);
    let user = User {
        id: 42,
        name: "hello".to_string(),
        email: Some("hello@example.com".to_string()),
        tags,
    };
    let bytes = marshal(&user).unwrap();
    let decoded: User = decode(&bytes).unwrap();
    assert_eq!(user, decoded);
}

#[test]
fn test_field_names_share_the_string_table() {
    let pair = Pair {
        a: "x".to_string(),
        b: "a".to_string(),
    };
    // The value "a" is a back-reference to the field name "a".
    assert_eq!(body(&pair), "14021101611101781101620e00");
    assert_eq!(decode::<Pair>(&marshal(&pair).unwrap()).unwrap(), pair);
}

#[test]
fn test_rename_and_skip() {
    let value = Renamed {
        id: 1,
        cache: "zzz".to_string(),
        r#type: "t".to_string(),
    };
    assert_eq!(body(&value), "1402110249440601110474797065110174");

    let decoded: Renamed = decode(&marshal(&value).unwrap()).unwrap();
    assert_eq!(decoded.id, 1);
    assert_eq!(decoded.r#type, "t");
    assert_eq!(decoded.cache, "");
}

#[test]
fn test_schema_lists_wire_names() {
    let names: Vec<String> = Renamed::fields()
        .iter()
        .map(|f| f.name().to_string())
        .collect();
    assert_eq!(names, vec!["ID", "type"]);
}

#[test]
fn test_unknown_fields_are_skipped_by_default() {
    let mut extra = BTreeMap::new();
    extra.insert("k".to_string(), "x".to_string());
    let wide = Wide {
        name: "x".to_string(),
        extra,
        label: "k".to_string(),
    };
    let bytes = marshal(&wide).unwrap();

    // "k" is first sent inside the skipped field; `label` refers back to it.
    let narrow: Narrow = decode(&bytes).unwrap();
    assert_eq!(
        narrow,
        Narrow {
            name: "x".to_string(),
            label: "k".to_string(),
        }
    );
}

#[test]
fn test_unknown_fields_rejected_when_disallowed() {
    let bytes = marshal(&Wide::default()).unwrap();
    let mut decoder = Decoder::new(&bytes[4..]);
    decoder.disallow_unknown_fields(true);
    let mut narrow = Narrow::default();
    let err = decoder.decode(&mut narrow).unwrap_err();
    match err {
        Error::Record(RecordError::UnknownField { field, .. }) => assert_eq!(field, "extra"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unsigned_fields_through_dispatch() {
    // {"n" => <value>}
    let with = |value: &str| hex::decode(format!("140111016e{value}")).unwrap();

    assert_eq!(decode::<Counter>(&with("0700")).unwrap().n, 0);
    assert_eq!(decode::<Counter>(&with("0800ff")).unwrap().n, 255);
    assert!(matches!(
        decode::<Counter>(&with("0701")),
        Err(Error::Range(RangeError::Unsigned { value: -1, max: 255 }))
    ));
    assert!(matches!(
        decode::<Counter>(&with("080100")),
        Err(Error::Range(RangeError::Unsigned {
            value: 256,
            max: 255
        }))
    ));
}

#[test]
fn test_decode_merges_into_existing_record() {
    let mut user = User {
        id: 7,
        name: "ann".to_string(),
        ..Default::default()
    };
    // {"name" => "bob"}
    let data = hex::decode("140111046e616d651103626f62").unwrap();
    unmarshal(&data, &mut user).unwrap();
    assert_eq!(user.id, 7);
    assert_eq!(user.name, "bob");

    unmarshal(&[0x00], &mut user).unwrap();
    assert_eq!(user, User::default());
}

#[test]
fn test_nested_records() {
    let mut users = BTreeMap::new();
    users.insert(
        "second".to_string(),
        User {
            id: 2,
            name: "bob".to_string(),
            ..Default::default()
        },
    );
    let outer = Outer {
        user: User {
            id: 1,
            name: "ann".to_string(),
            email: Some("ann@example.com".to_string()),
            ..Default::default()
        },
        users,
    };
    let decoded: Outer = decode(&marshal(&outer).unwrap()).unwrap();
    assert_eq!(decoded, outer);
}

#[test]
fn test_self_referential_record() {
    let list = Node {
        value: 1,
        next: Some(Box::new(Node {
            value: 2,
            next: Some(Box::new(Node {
                value: 3,
                next: None,
            })),
        })),
    };
    let decoded: Node = decode(&marshal(&list).unwrap()).unwrap();
    assert_eq!(decoded, list);
}

#[test]
fn test_bool_field_is_unsupported() {
    let err = marshal(&Flags { on: true }).unwrap_err();
    assert!(matches!(
        err,
        Error::Unsupported {
            op: "Encode",
            type_name: "bool"
        }
    ));
}

#[derive(Default, Debug, PartialEq)]
struct Depth {
    depth: i32,
}

#[derive(Default, Debug, PartialEq)]
struct Lazy {
    inner: Option<Depth>,
}

impl Value for Lazy {
    fn shape() -> Shape<Self> {
        Shape::Record(<Self as Record>::fields)
    }
}

impl Record for Lazy {
    fn fields() -> Vec<Field> {
        vec![Field::new::<Self, i32>(
            "depth",
            |l| l.inner.as_ref().map(|i| &i.depth),
            |l| Some(&mut l.inner.get_or_insert_with(Depth::default).depth),
        )]
    }
}

#[test]
fn test_unreachable_field_encodes_nil() {
    assert_eq!(body(&Lazy { inner: None }), "14011105646570746800");

    let decoded: Lazy = decode(&hex::decode("1401110564657074680603").unwrap()).unwrap();
    assert_eq!(decoded.inner, Some(Depth { depth: 3 }));
}

#[derive(Debug, Default)]
struct Frozen {
    v: i32,
}

impl Value for Frozen {
    fn shape() -> Shape<Self> {
        Shape::Record(<Self as Record>::fields)
    }
}

impl Record for Frozen {
    fn fields() -> Vec<Field> {
        vec![Field::new::<Self, i32>("v", |f| Some(&f.v), |_| None)]
    }
}

#[test]
fn test_field_without_storage_fails_to_decode() {
    let data = hex::decode("14011101760601").unwrap();
    let err = decode::<Frozen>(&data).unwrap_err();
    match err {
        Error::Record(RecordError::UnreachableField { field, .. }) => assert_eq!(field, "v"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_unknown_object_fields_are_skipped() {
    // {"name" => "x", "extra" => <object Foo {}>, "label" => <back-reference to "Foo">}
    let data = hex::decode(
        "1403\
         11046e616d65110178\
         110565787472611703466f6f1400\
         11056c6162656c0e03",
    )
    .unwrap();
    let narrow: Narrow = decode(&data).unwrap();
    assert_eq!(narrow.name, "x");
    assert_eq!(narrow.label, "Foo");
}

#[test]
fn test_unknown_reference_fields_are_skipped() {
    // {"name" => "x", "extra" => <simple reference to 5>, "label" => "y"}
    let data = hex::decode(
        "1403\
         11046e616d65110178\
         11056578747261250605\
         11056c6162656c110179",
    )
    .unwrap();
    let narrow: Narrow = decode(&data).unwrap();
    assert_eq!(narrow.label, "y");
}

#[test]
fn test_default_record_strings_never_back_reference() {
    assert_eq!(
        body(&Wide::default()),
        "1403\
         11046e616d650d\
         110565787472611400\
         11056c6162656c0d"
    );
}
