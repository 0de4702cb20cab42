//! System File Object (`param.sfo`) reading, patching and writing.
//!
//! Layout (little-endian):
//!
//! ```text
//! 0x00  u32  magic "\0PSF"
//! 0x04  u32  version (0x101)
//! 0x08  u32  key table start
//! 0x0C  u32  data table start
//! 0x10  u32  entry count
//! 0x14  index entries, 0x10 each:
//!       u16 key offset, u16 format, u32 len, u32 max len, u32 data offset
//! ```
//!
//! Keys are NUL-terminated and the index must stay sorted by key; every
//! value occupies its full `max len` in the data table.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::SfoError;

pub const SFO_MAGIC: u32 = 0x4653_5000; // "\0PSF" read little-endian
const SFO_VERSION: u32 = 0x101;
const HEADER_SIZE: usize = 0x14;
const INDEX_SIZE: usize = 0x10;

const FMT_BYTES: u16 = 0x0004;
const FMT_STR: u16 = 0x0204;
const FMT_INT: u16 = 0x0404;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SfoValue {
    /// Non-terminated UTF-8 data (format 0x0004).
    Bytes(Vec<u8>, u32),
    /// NUL-terminated UTF-8 string and its reserved length (format 0x0204).
    Str(String, u32),
    /// 32-bit integer (format 0x0404).
    Int(u32),
}

impl SfoValue {
    fn len(&self) -> u32 {
        match self {
            SfoValue::Bytes(b, _) => b.len() as u32,
            SfoValue::Str(s, _) => s.len() as u32 + 1,
            SfoValue::Int(_) => 4,
        }
    }

    fn max_len(&self) -> u32 {
        match self {
            SfoValue::Bytes(_, max) => *max,
            SfoValue::Str(_, max) => *max,
            SfoValue::Int(_) => 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SfoEntry {
    pub key: String,
    pub value: SfoValue,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sfo {
    entries: Vec<SfoEntry>,
}

impl Sfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[SfoEntry] {
        &self.entries
    }

    pub fn parse(data: &[u8]) -> Result<Sfo, SfoError> {
        let need = |n: usize| {
            if data.len() < n {
                Err(SfoError::Truncated {
                    needed: n,
                    available: data.len(),
                })
            } else {
                Ok(())
            }
        };
        need(HEADER_SIZE)?;
        if LittleEndian::read_u32(&data[0x00..]) != SFO_MAGIC {
            return Err(SfoError::InvalidMagic);
        }
        let key_table = LittleEndian::read_u32(&data[0x08..]) as usize;
        let data_table = LittleEndian::read_u32(&data[0x0C..]) as usize;
        let count = LittleEndian::read_u32(&data[0x10..]) as usize;
        need(HEADER_SIZE + count * INDEX_SIZE)?;

        let mut entries = Vec::with_capacity(count);
        for i in 0..count {
            let idx = HEADER_SIZE + i * INDEX_SIZE;
            let key_off = LittleEndian::read_u16(&data[idx..]) as usize;
            let fmt = LittleEndian::read_u16(&data[idx + 2..]);
            let len = LittleEndian::read_u32(&data[idx + 4..]) as usize;
            let max_len = LittleEndian::read_u32(&data[idx + 8..]);
            let off = data_table + LittleEndian::read_u32(&data[idx + 12..]) as usize;
            need(off + len)?;

            let key_start = key_table + key_off;
            need(key_start + 1)?;
            let key_end = data[key_start..]
                .iter()
                .position(|&b| b == 0)
                .map(|p| key_start + p)
                .ok_or(SfoError::BadKey)?;
            let key = std::str::from_utf8(&data[key_start..key_end])
                .map_err(|_| SfoError::BadKey)?
                .to_string();

            let value = match fmt {
                FMT_BYTES => SfoValue::Bytes(data[off..off + len].to_vec(), max_len),
                FMT_STR => {
                    let raw = &data[off..off + len];
                    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
                    SfoValue::Str(
                        std::str::from_utf8(&raw[..end])
                            .map_err(|_| SfoError::BadKey)?
                            .to_string(),
                        max_len,
                    )
                }
                FMT_INT => SfoValue::Int(LittleEndian::read_u32(&data[off..])),
                other => return Err(SfoError::UnsupportedFormat(other)),
            };
            entries.push(SfoEntry { key, value });
        }
        Ok(Sfo { entries })
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut entries = self.entries.clone();
        entries.sort_by(|a, b| a.key.cmp(&b.key));

        let mut key_table = Vec::new();
        let mut key_offsets = Vec::with_capacity(entries.len());
        for e in &entries {
            key_offsets.push(key_table.len() as u16);
            key_table.extend_from_slice(e.key.as_bytes());
            key_table.push(0);
        }
        while key_table.len() % 4 != 0 {
            key_table.push(0);
        }

        let key_table_start = HEADER_SIZE + entries.len() * INDEX_SIZE;
        let data_table_start = key_table_start + key_table.len();
        let data_len: usize = entries.iter().map(|e| e.value.max_len() as usize).sum();

        let mut out = vec![0u8; data_table_start + data_len];
        LittleEndian::write_u32(&mut out[0x00..], SFO_MAGIC);
        LittleEndian::write_u32(&mut out[0x04..], SFO_VERSION);
        LittleEndian::write_u32(&mut out[0x08..], key_table_start as u32);
        LittleEndian::write_u32(&mut out[0x0C..], data_table_start as u32);
        LittleEndian::write_u32(&mut out[0x10..], entries.len() as u32);

        let mut data_off = 0u32;
        for (i, e) in entries.iter().enumerate() {
            let idx = HEADER_SIZE + i * INDEX_SIZE;
            let fmt = match &e.value {
                SfoValue::Bytes(..) => FMT_BYTES,
                SfoValue::Str(..) => FMT_STR,
                SfoValue::Int(_) => FMT_INT,
            };
            LittleEndian::write_u16(&mut out[idx..], key_offsets[i]);
            LittleEndian::write_u16(&mut out[idx + 2..], fmt);
            LittleEndian::write_u32(&mut out[idx + 4..], e.value.len());
            LittleEndian::write_u32(&mut out[idx + 8..], e.value.max_len());
            LittleEndian::write_u32(&mut out[idx + 12..], data_off);

            let at = data_table_start + data_off as usize;
            match &e.value {
                SfoValue::Bytes(b, _) => out[at..at + b.len()].copy_from_slice(b),
                SfoValue::Str(s, _) => {
                    out[at..at + s.len()].copy_from_slice(s.as_bytes());
                    // NUL terminator already zero
                }
                SfoValue::Int(v) => LittleEndian::write_u32(&mut out[at..], *v),
            }
            data_off += e.value.max_len();
        }
        out[key_table_start..key_table_start + key_table.len()].copy_from_slice(&key_table);
        out
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.entries.iter().find(|e| e.key == key).and_then(|e| {
            match &e.value {
                SfoValue::Str(s, _) => Some(s.as_str()),
                _ => None,
            }
        })
    }

    pub fn get_int(&self, key: &str) -> Option<u32> {
        self.entries.iter().find(|e| e.key == key).and_then(|e| {
            match &e.value {
                SfoValue::Int(v) => Some(*v),
                _ => None,
            }
        })
    }

    /// Set a string value, growing the reserved length when the new value
    /// does not fit (rounded up to 4 bytes).
    pub fn set_str(&mut self, key: &str, value: &str, default_max: u32) {
        let needed = ((value.len() as u32 + 1) + 3) & !3;
        if let Some(e) = self.entries.iter_mut().find(|e| e.key == key) {
            let max = match &e.value {
                SfoValue::Str(_, max) => (*max).max(needed),
                _ => default_max.max(needed),
            };
            e.value = SfoValue::Str(value.to_string(), max);
        } else {
            self.entries.push(SfoEntry {
                key: key.to_string(),
                value: SfoValue::Str(value.to_string(), default_max.max(needed)),
            });
        }
    }

    pub fn set_int(&mut self, key: &str, value: u32) {
        if let Some(e) = self.entries.iter_mut().find(|e| e.key == key) {
            e.value = SfoValue::Int(value);
        } else {
            self.entries.push(SfoEntry {
                key: key.to_string(),
                value: SfoValue::Int(value),
            });
        }
    }
}
