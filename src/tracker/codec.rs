//! 持久化格式 / Persisted format
//!
//! UTF-8 JSON 数组，元素以 `", "` 分隔，末尾换行：`[3, 7, 12]\n`
//! UTF-8 JSON array, elements separated by `", "`, trailing newline: `[3, 7, 12]\n`

use std::io;

use serde::Serialize;
use serde_json::ser::{Formatter, Serializer};

use super::identifier::Identifier;

/// 数组元素之间写入 `", "` / Writes `", "` between array elements
struct SpacedFormatter;

impl Formatter for SpacedFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

pub fn encode_ids<I: Identifier>(ids: &[I]) -> Result<Vec<u8>, serde_json::Error> {
    let mut out = Vec::with_capacity(ids.len() * 8 + 3);
    let mut serializer = Serializer::with_formatter(&mut out, SpacedFormatter);
    ids.serialize(&mut serializer)?;
    out.push(b'\n');
    Ok(out)
}

pub fn decode_ids<I: Identifier>(bytes: &[u8]) -> Result<Vec<I>, serde_json::Error> {
    serde_json::from_slice(bytes)
}
