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

//! Text serialization used for every value that crosses the wire or sits in
//! the local store: self-describing, brace-delimited, length-free. Every
//! value starts with `{type: <tag>, ...}`. Strings are raw (unescaped) and
//! end at the next `,`, `}` or `]` -- which is also why a raw string may not
//! itself contain any of those three characters. Nothing here tries to work
//! around that; it's a closed contract, not an oversight.
//!
//! Decoding is a recursive-descent parse over a cursor into the input
//! `&str`: one `read_<kind>` method per tag, each returning `EauResult`
//! instead of asserting and aborting on malformed input.

use crate::cell::ColumnType;
use crate::error::{EauError, EauResult};
use crate::key::Key;
use crate::schema::Schema;

/// Which request kind a `Reply` answers, so a node running both a `Get` and
/// a `WaitAndGet` concurrently can route the answer to the right waiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    WaitGet,
}

/// Per-column metadata carried inside a `Dataframe` value: the column's
/// type, its total length, and the ordered list of chunk keys. Chunk
/// *payloads* are never inlined here -- a dataframe's serialized form
/// lists each column's chunk keys, not the chunk contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub ty: ColumnType,
    pub length: usize,
    pub chunks: Vec<Key>,
}

/// The closed value domain the Codec can encode/decode.
#[derive(Debug, Clone, PartialEq)]
pub enum CodecValue {
    Object,
    Ack,
    Key(Key),
    Str(String),
    Vector(Vec<String>),
    IntVector(Vec<i64>),
    BoolVector(Vec<bool>),
    FloatVector(Vec<f32>),
    Dataframe {
        schema: Schema,
        columns: Vec<ColumnMeta>,
    },
    /// The cell payload of one stored chunk. Always concrete values --
    /// `Cell::Missing` is resolved to its type's default before a chunk is
    /// ever built, so there is no "missing" marker on the wire.
    Chunk {
        col_type: ColumnType,
        ints: Vec<i32>,
        bools: Vec<bool>,
        floats: Vec<f32>,
        strings: Vec<String>,
    },
    Register {
        address: String,
        sender: u64,
    },
    Directory {
        addresses: Vec<String>,
        indices: Vec<u64>,
    },
    Put {
        key: Key,
        value: Vec<u8>,
    },
    Get {
        key: Key,
    },
    WaitGet {
        key: Key,
    },
    Reply {
        request: RequestKind,
        value: Option<Vec<u8>>,
    },
}

impl CodecValue {
    pub fn chunk_ints(col_type: ColumnType, ints: Vec<i32>) -> Self {
        CodecValue::Chunk {
            col_type,
            ints,
            bools: Vec::new(),
            floats: Vec::new(),
            strings: Vec::new(),
        }
    }

    pub fn chunk_bools(col_type: ColumnType, bools: Vec<bool>) -> Self {
        CodecValue::Chunk {
            col_type,
            ints: Vec::new(),
            bools,
            floats: Vec::new(),
            strings: Vec::new(),
        }
    }

    pub fn chunk_floats(col_type: ColumnType, floats: Vec<f32>) -> Self {
        CodecValue::Chunk {
            col_type,
            ints: Vec::new(),
            bools: Vec::new(),
            floats,
            strings: Vec::new(),
        }
    }

    pub fn chunk_strings(col_type: ColumnType, strings: Vec<String>) -> Self {
        CodecValue::Chunk {
            col_type,
            ints: Vec::new(),
            bools: Vec::new(),
            floats: Vec::new(),
            strings,
        }
    }
}

const STOP_CHARS: [char; 3] = [',', '}', ']'];

fn fmt_float(f: f32) -> String {
    format!("{:.7}", f)
}

fn encode_key(k: &Key) -> String {
    format!("{{type: key, name: {}, home: {}}}", k.name, k.home)
}

fn encode_string_list(items: &[String]) -> String {
    let body = items.join(",");
    format!("[{}]", body)
}

fn encode_key_list(items: &[Key]) -> String {
    let body: Vec<String> = items.iter().map(encode_key).collect();
    format!("[{}]", body.join(","))
}

/// Serialize a value to its textual wire/store representation. Infallible
/// over the value domain above: every variant that exists can be encoded.
pub fn encode(value: &CodecValue) -> String {
    match value {
        CodecValue::Object => "{type: object}".to_string(),
        CodecValue::Ack => "{type: ack}".to_string(),
        CodecValue::Key(k) => encode_key(k),
        CodecValue::Str(s) => format!("{{type: string, value: {}}}", s),
        CodecValue::Vector(items) => {
            format!("{{type: vector, items: {}}}", encode_string_list(items))
        }
        CodecValue::IntVector(items) => {
            let body: Vec<String> = items.iter().map(|i| i.to_string()).collect();
            format!("{{type: int_vector, items: [{}]}}", body.join(","))
        }
        CodecValue::BoolVector(items) => {
            let body: Vec<String> = items.iter().map(|b| b.to_string()).collect();
            format!("{{type: bool_vector, items: [{}]}}", body.join(","))
        }
        CodecValue::FloatVector(items) => {
            let body: Vec<String> = items.iter().map(|f| fmt_float(*f)).collect();
            format!("{{type: float_vector, items: [{}]}}", body.join(","))
        }
        CodecValue::Dataframe { schema, columns } => {
            let cols: Vec<String> = columns.iter().map(encode_column_meta).collect();
            format!(
                "{{type: dataframe, schema: {}, columns: [{}]}}",
                schema.to_tag_string(),
                cols.join(",")
            )
        }
        CodecValue::Chunk {
            col_type,
            ints,
            bools,
            floats,
            strings,
        } => {
            let items = match col_type {
                ColumnType::Int => {
                    let body: Vec<String> = ints.iter().map(|i| i.to_string()).collect();
                    format!("[{}]", body.join(","))
                }
                ColumnType::Bool => {
                    let body: Vec<String> = bools.iter().map(|b| b.to_string()).collect();
                    format!("[{}]", body.join(","))
                }
                ColumnType::Float => {
                    let body: Vec<String> = floats.iter().map(|f| fmt_float(*f)).collect();
                    format!("[{}]", body.join(","))
                }
                ColumnType::String => encode_string_list(strings),
            };
            format!(
                "{{type: chunk, col_type: {}, items: {}}}",
                col_type.tag(),
                items
            )
        }
        CodecValue::Register { address, sender } => {
            format!(
                "{{type: register, address: {}, sender: {}}}",
                address, sender
            )
        }
        CodecValue::Directory { addresses, indices } => {
            let idx: Vec<String> = indices.iter().map(|i| i.to_string()).collect();
            format!(
                "{{type: directory, addresses: {}, indices: [{}]}}",
                encode_string_list(addresses),
                idx.join(",")
            )
        }
        CodecValue::Put { key, value } => {
            format!(
                "{{type: put, key: {}, value: {}}}",
                encode_key(key),
                String::from_utf8_lossy(value)
            )
        }
        CodecValue::Get { key } => format!("{{type: get, key: {}}}", encode_key(key)),
        CodecValue::WaitGet { key } => format!("{{type: wait_get, key: {}}}", encode_key(key)),
        CodecValue::Reply { request, value } => {
            let req = match request {
                RequestKind::Get => "get",
                RequestKind::WaitGet => "wait_get",
            };
            let val = match value {
                Some(bytes) => String::from_utf8_lossy(bytes).into_owned(),
                None => "{type: object}".to_string(),
            };
            format!("{{type: reply, request: {}, value: {}}}", req, val)
        }
    }
}

fn encode_column_meta(c: &ColumnMeta) -> String {
    let tag = match c.ty {
        ColumnType::Int => "int_column",
        ColumnType::Bool => "bool_column",
        ColumnType::Float => "float_column",
        ColumnType::String => "string_column",
    };
    format!(
        "{{type: {}, length: {}, chunks: {}}}",
        tag,
        c.length,
        encode_key_list(&c.chunks)
    )
}

/// Convenience: encode a bare key (used for log lines and tests).
pub fn encode_key_value(k: &Key) -> String {
    encode_key(k)
}

struct Parser<'a> {
    chars: Vec<char>,
    pos: usize,
    input: &'a str,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
            input,
        }
    }

    fn current(&self) -> EauResult<char> {
        self.chars
            .get(self.pos)
            .copied()
            .ok_or_else(|| EauError::Malformed("unexpected end of input".into()))
    }

    fn bump(&mut self) -> EauResult<char> {
        let c = self.current()?;
        self.pos += 1;
        Ok(c)
    }

    fn expect(&mut self, c: char) -> EauResult<()> {
        let got = self.bump()?;
        if got != c {
            return Err(EauError::Malformed(format!(
                "expected '{}', found '{}' at position {}",
                c, got, self.pos
            )));
        }
        Ok(())
    }

    fn expect_str(&mut self, s: &str) -> EauResult<()> {
        for c in s.chars() {
            self.expect(c)?;
        }
        Ok(())
    }

    /// Read raw characters up to (not including) the next structural
    /// character: `,`, `}` or `]`.
    fn read_raw(&mut self) -> EauResult<String> {
        let mut out = String::new();
        loop {
            let c = self.current()?;
            if STOP_CHARS.contains(&c) {
                break;
            }
            out.push(c);
            self.pos += 1;
        }
        Ok(out)
    }

    fn read_tag(&mut self) -> EauResult<String> {
        self.expect_str("{type: ")?;
        self.read_raw()
    }

    /// Read a `[elem,elem,...]` list of raw (string) elements.
    fn read_raw_list(&mut self) -> EauResult<Vec<String>> {
        self.expect('[')?;
        let mut items = Vec::new();
        while self.current()? != ']' {
            items.push(self.read_raw()?);
            if self.current()? == ',' {
                self.pos += 1;
            }
        }
        self.expect(']')?;
        Ok(items)
    }

    fn read_int_list(&mut self) -> EauResult<Vec<i64>> {
        self.read_raw_list()?
            .iter()
            .map(|s| {
                s.parse::<i64>()
                    .map_err(|_| EauError::Malformed(format!("not an integer: {}", s)))
            })
            .collect()
    }

    fn read_bool_list(&mut self) -> EauResult<Vec<bool>> {
        self.read_raw_list()?
            .iter()
            .map(|s| match s.as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(EauError::Malformed(format!("not a bool: {}", s))),
            })
            .collect()
    }

    fn read_float_list(&mut self) -> EauResult<Vec<f32>> {
        self.read_raw_list()?
            .iter()
            .map(|s| {
                s.parse::<f32>()
                    .map_err(|_| EauError::Malformed(format!("not a float: {}", s)))
            })
            .collect()
    }

    /// Capture the exact source span of the next value without
    /// interpreting it: used for `Put`/`Reply` payloads, which are opaque
    /// at this layer (the KV shard stores/forwards bytes, not structure).
    /// Delegates to a full structural decode rather than counting braces --
    /// a raw string may legally contain a `{`, so a brace counter alone
    /// can't tell where the value ends.
    fn read_balanced_span(&mut self) -> EauResult<String> {
        let start = self.pos;
        self.decode()?;
        Ok(self.chars[start..self.pos].iter().collect())
    }

    /// Byte offset into the original `&str` input corresponding to the
    /// parser's current char position. Used by callers that need a byte
    /// length rather than a char count (e.g. slicing a `&[u8]` buffer).
    fn consumed_bytes(&self) -> usize {
        self.input
            .char_indices()
            .nth(self.pos)
            .map(|(i, _)| i)
            .unwrap_or(self.input.len())
    }

    fn read_key(&mut self) -> EauResult<Key> {
        self.expect_str("{type: key, name: ")?;
        let name = self.read_raw()?;
        self.expect_str(", home: ")?;
        let home_str = self.read_raw()?;
        let home = home_str
            .parse::<usize>()
            .map_err(|_| EauError::Malformed(format!("not a node index: {}", home_str)))?;
        self.expect('}')?;
        Ok(Key::new(name, home))
    }

    fn read_key_list(&mut self) -> EauResult<Vec<Key>> {
        self.expect('[')?;
        let mut items = Vec::new();
        while self.current()? != ']' {
            items.push(self.read_key()?);
            if self.current()? == ',' {
                self.pos += 1;
            }
        }
        self.expect(']')?;
        Ok(items)
    }

    fn read_column_meta(&mut self) -> EauResult<ColumnMeta> {
        let (ty, tag) = {
            let save = self.pos;
            let tag = self.read_tag()?;
            let ty = match tag.as_str() {
                "int_column" => ColumnType::Int,
                "bool_column" => ColumnType::Bool,
                "float_column" => ColumnType::Float,
                "string_column" => ColumnType::String,
                other => {
                    self.pos = save;
                    return Err(EauError::Malformed(format!(
                        "expected a column tag, found {}",
                        other
                    )));
                }
            };
            (ty, tag)
        };
        let _ = tag;
        self.expect_str(", length: ")?;
        let length_str = self.read_raw()?;
        let length = length_str
            .parse::<usize>()
            .map_err(|_| EauError::Malformed(format!("not a length: {}", length_str)))?;
        self.expect_str(", chunks: ")?;
        let chunks = self.read_key_list()?;
        self.expect('}')?;
        Ok(ColumnMeta { ty, length, chunks })
    }

    fn decode(&mut self) -> EauResult<CodecValue> {
        let save = self.pos;
        let tag = self.read_tag()?;
        match tag.as_str() {
            "object" => {
                self.expect('}')?;
                Ok(CodecValue::Object)
            }
            "ack" => {
                self.expect('}')?;
                Ok(CodecValue::Ack)
            }
            "key" => {
                self.pos = save;
                Ok(CodecValue::Key(self.read_key()?))
            }
            "string" => {
                self.expect_str(", value: ")?;
                let s = self.read_raw()?;
                self.expect('}')?;
                Ok(CodecValue::Str(s))
            }
            "vector" => {
                self.expect_str(", items: ")?;
                let items = self.read_raw_list()?;
                self.expect('}')?;
                Ok(CodecValue::Vector(items))
            }
            "int_vector" => {
                self.expect_str(", items: ")?;
                let items = self.read_int_list()?;
                self.expect('}')?;
                Ok(CodecValue::IntVector(items))
            }
            "bool_vector" => {
                self.expect_str(", items: ")?;
                let items = self.read_bool_list()?;
                self.expect('}')?;
                Ok(CodecValue::BoolVector(items))
            }
            "float_vector" => {
                self.expect_str(", items: ")?;
                let items = self.read_float_list()?;
                self.expect('}')?;
                Ok(CodecValue::FloatVector(items))
            }
            "dataframe" => {
                self.expect_str(", schema: ")?;
                let schema_str = self.read_raw()?;
                let schema = Schema::from_tag_string(&schema_str).ok_or_else(|| {
                    EauError::Malformed(format!("invalid schema tag string: {}", schema_str))
                })?;
                self.expect_str(", columns: [")?;
                let mut columns = Vec::new();
                while self.current()? != ']' {
                    columns.push(self.read_column_meta()?);
                    if self.current()? == ',' {
                        self.pos += 1;
                    }
                }
                self.expect(']')?;
                self.expect('}')?;
                Ok(CodecValue::Dataframe { schema, columns })
            }
            "chunk" => {
                self.expect_str(", col_type: ")?;
                let tag_str = self.read_raw()?;
                let col_type = tag_str.chars().next().and_then(ColumnType::from_tag).ok_or_else(
                    || EauError::Malformed(format!("invalid column type tag: {}", tag_str)),
                )?;
                self.expect_str(", items: ")?;
                let value = match col_type {
                    ColumnType::Int => {
                        CodecValue::chunk_ints(col_type, self.read_int_list()?.into_iter().map(|i| i as i32).collect())
                    }
                    ColumnType::Bool => CodecValue::chunk_bools(col_type, self.read_bool_list()?),
                    ColumnType::Float => CodecValue::chunk_floats(col_type, self.read_float_list()?),
                    ColumnType::String => {
                        CodecValue::chunk_strings(col_type, self.read_raw_list()?)
                    }
                };
                self.expect('}')?;
                Ok(value)
            }
            "register" => {
                self.expect_str(", address: ")?;
                let address = self.read_raw()?;
                self.expect_str(", sender: ")?;
                let sender_str = self.read_raw()?;
                let sender = sender_str
                    .parse::<u64>()
                    .map_err(|_| EauError::Malformed(format!("not a node index: {}", sender_str)))?;
                self.expect('}')?;
                Ok(CodecValue::Register { address, sender })
            }
            "directory" => {
                self.expect_str(", addresses: ")?;
                let addresses = self.read_raw_list()?;
                self.expect_str(", indices: ")?;
                let indices = self
                    .read_int_list()?
                    .into_iter()
                    .map(|i| i as u64)
                    .collect();
                self.expect('}')?;
                Ok(CodecValue::Directory { addresses, indices })
            }
            "put" => {
                self.expect_str(", key: ")?;
                let key = self.read_key()?;
                self.expect_str(", value: ")?;
                let span = self.read_balanced_span()?;
                self.expect('}')?;
                Ok(CodecValue::Put {
                    key,
                    value: span.into_bytes(),
                })
            }
            "get" => {
                self.expect_str(", key: ")?;
                let key = self.read_key()?;
                self.expect('}')?;
                Ok(CodecValue::Get { key })
            }
            "wait_get" => {
                self.expect_str(", key: ")?;
                let key = self.read_key()?;
                self.expect('}')?;
                Ok(CodecValue::WaitGet { key })
            }
            "reply" => {
                self.expect_str(", request: ")?;
                let req_str = self.read_raw()?;
                let request = match req_str.as_str() {
                    "get" => RequestKind::Get,
                    "wait_get" => RequestKind::WaitGet,
                    other => {
                        return Err(EauError::Malformed(format!(
                            "unknown reply request kind: {}",
                            other
                        )))
                    }
                };
                self.expect_str(", value: ")?;
                let span = self.read_balanced_span()?;
                self.expect('}')?;
                let value = if span == "{type: object}" {
                    None
                } else {
                    Some(span.into_bytes())
                };
                Ok(CodecValue::Reply { request, value })
            }
            other => Err(EauError::Malformed(format!("unknown type tag: {}", other))),
        }
    }

    fn finish(&self) -> EauResult<()> {
        if self.pos != self.chars.len() {
            return Err(EauError::Malformed(format!(
                "trailing input after value: {}",
                &self.input[self.pos.min(self.input.len())..]
            )));
        }
        Ok(())
    }
}

/// Parse a value from its textual representation. Fails with
/// `EauError::Malformed` on any structural mismatch.
pub fn decode(input: &str) -> EauResult<CodecValue> {
    let mut p = Parser::new(input);
    let v = p.decode()?;
    p.finish()?;
    Ok(v)
}

/// Byte length of the first complete value at the front of `input`,
/// ignoring any trailing bytes. Lets a framing layer find message
/// boundaries by asking the grammar where a value ends instead of
/// re-implementing its structural rules as a byte-level brace scan --
/// which would have to special-case that a raw string may contain `{`.
/// Errs (e.g. on a partial value) the same way `decode` does.
pub fn frame_len(input: &str) -> EauResult<usize> {
    let mut p = Parser::new(input);
    p.decode()?;
    Ok(p.consumed_bytes())
}

/// Decode a single `{type: key, ...}` value.
pub fn decode_key(input: &str) -> EauResult<Key> {
    match decode(input)? {
        CodecValue::Key(k) => Ok(k),
        _ => Err(EauError::Malformed("expected a key value".into())),
    }
}

/// A value narrowed to the message-envelope tags: `ack`, `register`,
/// `directory`, `put`, `get`, `wait_get`, `reply`.
pub fn encode_message(value: &CodecValue) -> String {
    encode(value)
}

/// Decode a message-envelope value, rejecting the store-only tags
/// (`dataframe`, `chunk`, vectors, ...) that never travel as a whole message.
pub fn decode_message(input: &str) -> EauResult<CodecValue> {
    let v = decode(input)?;
    match v {
        CodecValue::Ack
        | CodecValue::Register { .. }
        | CodecValue::Directory { .. }
        | CodecValue::Put { .. }
        | CodecValue::Get { .. }
        | CodecValue::WaitGet { .. }
        | CodecValue::Reply { .. } => Ok(v),
        _ => Err(EauError::Malformed("expected a message value".into())),
    }
}

/// Serialize a chunk's cell payload, for storage under its chunk key.
pub fn encode_chunk(value: &CodecValue) -> EauResult<String> {
    match value {
        CodecValue::Chunk { .. } => Ok(encode(value)),
        _ => Err(EauError::Malformed("expected a chunk value".into())),
    }
}

/// Decode a chunk's cell payload.
pub fn decode_chunk(input: &str) -> EauResult<CodecValue> {
    match decode(input)? {
        v @ CodecValue::Chunk { .. } => Ok(v),
        _ => Err(EauError::Malformed("expected a chunk value".into())),
    }
}

/// Serialize a dataframe's metadata (schema + per-column chunk-key lists).
pub fn encode_dataframe_meta(schema: &Schema, columns: &[ColumnMeta]) -> String {
    encode(&CodecValue::Dataframe {
        schema: schema.clone(),
        columns: columns.to_vec(),
    })
}

/// Decode a dataframe's metadata.
pub fn decode_dataframe_meta(input: &str) -> EauResult<(Schema, Vec<ColumnMeta>)> {
    match decode(input)? {
        CodecValue::Dataframe { schema, columns } => Ok((schema, columns)),
        _ => Err(EauError::Malformed("expected a dataframe value".into())),
    }
}
