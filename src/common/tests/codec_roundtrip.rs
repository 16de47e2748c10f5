// Copyright 2026 The eau2 Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use eau2_common::cell::ColumnType;
use eau2_common::codec::{decode, encode, CodecValue, ColumnMeta, RequestKind};
use eau2_common::key::Key;
use eau2_common::schema::Schema;
use proptest::prelude::*;

fn key_strategy() -> impl Strategy<Value = Key> {
    ("[a-zA-Z0-9_]{1,12}", 0usize..8).prop_map(|(name, home)| Key::new(name, home))
}

fn raw_string_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_ ]{0,16}"
}

proptest! {
    #[test]
    fn key_roundtrips(k in key_strategy()) {
        let v = CodecValue::Key(k);
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn string_roundtrips(s in raw_string_strategy()) {
        let v = CodecValue::Str(s);
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn int_vector_roundtrips(items in prop::collection::vec(-1000i64..1000, 0..8)) {
        let v = CodecValue::IntVector(items);
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn bool_vector_roundtrips(items in prop::collection::vec(any::<bool>(), 0..8)) {
        let v = CodecValue::BoolVector(items);
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn directory_roundtrips(
        addresses in prop::collection::vec(raw_string_strategy(), 0..4),
        indices in prop::collection::vec(0u64..8, 0..4),
    ) {
        let v = CodecValue::Directory { addresses, indices };
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn register_roundtrips(address in raw_string_strategy(), sender in 0u64..8) {
        let v = CodecValue::Register { address, sender };
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }

    #[test]
    fn chunk_ints_roundtrip(items in prop::collection::vec(-1000i32..1000, 0..8)) {
        let v = CodecValue::chunk_ints(ColumnType::Int, items);
        let decoded = decode(&encode(&v)).unwrap();
        prop_assert_eq!(decoded, v);
    }
}

#[test]
fn object_roundtrips() {
    let v = CodecValue::Object;
    assert_eq!(decode(&encode(&v)).unwrap(), v);
}

#[test]
fn ack_roundtrips() {
    let v = CodecValue::Ack;
    assert_eq!(decode(&encode(&v)).unwrap(), v);
}

#[test]
fn dataframe_meta_roundtrips() {
    let schema: Schema = [ColumnType::Int, ColumnType::String].into_iter().collect();
    let v = CodecValue::Dataframe {
        schema,
        columns: vec![
            ColumnMeta {
                ty: ColumnType::Int,
                length: 2048,
                chunks: vec![Key::new("df-c0-0", 0), Key::new("df-c0-1", 0)],
            },
            ColumnMeta {
                ty: ColumnType::String,
                length: 2048,
                chunks: vec![Key::new("df-c1-0", 1), Key::new("df-c1-1", 1)],
            },
        ],
    };
    let decoded = decode(&encode(&v)).unwrap();
    assert_eq!(decoded, v);
}

#[test]
fn get_and_wait_get_roundtrip() {
    let key = Key::new("widgets", 2);
    let get = CodecValue::Get { key: key.clone() };
    assert_eq!(decode(&encode(&get)).unwrap(), get);

    let wait_get = CodecValue::WaitGet { key };
    assert_eq!(decode(&encode(&wait_get)).unwrap(), wait_get);
}

#[test]
fn put_carries_opaque_nested_value() {
    let nested = CodecValue::chunk_ints(ColumnType::Int, vec![1, 2, 3]);
    let nested_bytes = encode(&nested).into_bytes();
    let put = CodecValue::Put {
        key: Key::new("chunk-0", 0),
        value: nested_bytes.clone(),
    };
    let decoded = decode(&encode(&put)).unwrap();
    match decoded {
        CodecValue::Put { key, value } => {
            assert_eq!(key, Key::new("chunk-0", 0));
            assert_eq!(value, nested_bytes);
            assert_eq!(decode(&String::from_utf8(value).unwrap()).unwrap(), nested);
        }
        other => panic!("expected Put, got {:?}", other),
    }
}

#[test]
fn reply_with_value_roundtrips() {
    let nested = CodecValue::chunk_bools(ColumnType::Bool, vec![true, false]);
    let reply = CodecValue::Reply {
        request: RequestKind::WaitGet,
        value: Some(encode(&nested).into_bytes()),
    };
    let decoded = decode(&encode(&reply)).unwrap();
    assert_eq!(decoded, reply);
}

#[test]
fn reply_with_no_value_roundtrips() {
    let reply = CodecValue::Reply {
        request: RequestKind::Get,
        value: None,
    };
    let decoded = decode(&encode(&reply)).unwrap();
    assert_eq!(decoded, reply);
}

#[test]
fn malformed_input_is_rejected() {
    assert!(decode("{type: bogus}").is_err());
    assert!(decode("{type: key, name: a, home: notanumber}").is_err());
    assert!(decode("{type: key, name: a, home: 0}trailing").is_err());
}
