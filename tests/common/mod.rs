#![allow(dead_code)]

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const TOP: i32 = 0;
pub const WORLD_CHILDREN: i32 = 1;
pub const INTERIOR_BLOCK: i32 = 2;
pub const INTERIOR_SUB_BLOCK: i32 = 3;
pub const EXTERIOR_BLOCK: i32 = 4;
pub const EXTERIOR_SUB_BLOCK: i32 = 5;
pub const CELL_CHILDREN: i32 = 6;
pub const TOPIC_CHILDREN: i32 = 7;
pub const PERSISTENT: i32 = 8;
pub const TEMPORARY: i32 = 9;
pub const VISIBLE_DISTANT: i32 = 10;

pub const DELETED: u32 = 0x20;
pub const COMPRESSED: u32 = 0x0004_0000;

pub type Field = ([u8; 4], Vec<u8>);

/// Builds a content file byte by byte.
pub struct PluginBuilder {
    buf: Vec<u8>,
    long: bool,
    open_groups: Vec<usize>,
}

impl PluginBuilder {
    /// A file with 24-byte headers (format version 1.7).
    pub fn new(masters: &[&str]) -> Self {
        Self::with_layout(masters, true, 1.7, 0)
    }

    /// A file with 20-byte headers (format version 0.8).
    pub fn short(masters: &[&str]) -> Self {
        Self::with_layout(masters, false, 0.8, 0)
    }

    pub fn with_layout(masters: &[&str], long: bool, version: f32, flags: u32) -> Self {
        let mut builder = Self {
            buf: Vec::new(),
            long,
            open_groups: Vec::new(),
        };
        let mut hedr = Vec::new();
        hedr.write_f32::<LittleEndian>(version).unwrap();
        hedr.write_i32::<LittleEndian>(0).unwrap();
        hedr.write_u32::<LittleEndian>(0x800).unwrap();
        let mut fields = vec![(*b"HEDR", hedr), (*b"CNAM", zstring("tester"))];
        for master in masters {
            fields.push((*b"MAST", zstring(master)));
            fields.push((*b"DATA", vec![0; 8]));
        }
        builder.record(b"TES4", flags, 0, &fields);
        builder
    }

    pub fn begin_group(&mut self, label: [u8; 4], group_type: i32) -> &mut Self {
        self.open_groups.push(self.buf.len());
        self.buf.extend_from_slice(b"GRUP");
        self.buf.write_u32::<LittleEndian>(0).unwrap();
        self.buf.extend_from_slice(&label);
        self.buf.write_i32::<LittleEndian>(group_type).unwrap();
        self.buf.write_u32::<LittleEndian>(0).unwrap();
        if self.long {
            self.buf.write_u32::<LittleEndian>(0).unwrap();
        }
        self
    }

    pub fn end_group(&mut self) -> &mut Self {
        let start = self.open_groups.pop().expect("no open group");
        let size = (self.buf.len() - start) as u32;
        self.buf[start + 4..start + 8].copy_from_slice(&size.to_le_bytes());
        self
    }

    pub fn record(&mut self, tag: &[u8; 4], flags: u32, form_id: u32, fields: &[Field]) -> &mut Self {
        let data = encode_fields(fields);
        self.raw_record(tag, flags, form_id, &data)
    }

    /// A record whose data is zlib-compressed behind a size prefix.
    pub fn compressed_record(&mut self, tag: &[u8; 4], flags: u32, form_id: u32, fields: &[Field]) -> &mut Self {
        let plain = encode_fields(fields);
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&plain).unwrap();
        let mut data = Vec::new();
        data.write_u32::<LittleEndian>(plain.len() as u32).unwrap();
        data.extend_from_slice(&encoder.finish().unwrap());
        self.raw_record(tag, flags | COMPRESSED, form_id, &data)
    }

    pub fn raw_record(&mut self, tag: &[u8; 4], flags: u32, form_id: u32, data: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(tag);
        self.buf.write_u32::<LittleEndian>(data.len() as u32).unwrap();
        self.buf.write_u32::<LittleEndian>(flags).unwrap();
        self.buf.write_u32::<LittleEndian>(form_id).unwrap();
        self.buf.write_u32::<LittleEndian>(0).unwrap();
        if self.long {
            self.buf.write_u16::<LittleEndian>(0x83).unwrap();
            self.buf.write_u16::<LittleEndian>(0).unwrap();
        }
        self.buf.extend_from_slice(data);
        self
    }

    pub fn raw_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    // ---- structure shortcuts ---------------------------------------------

    pub fn top(&mut self, tag: &[u8; 4]) -> &mut Self {
        self.begin_group(*tag, TOP)
    }

    pub fn cell_children(&mut self, cell: u32, group_type: i32, refs: &[(u32, Vec<Field>)]) -> &mut Self {
        self.begin_group(cell.to_le_bytes(), group_type);
        for (id, fields) in refs {
            self.record(b"REFR", 0, *id, fields);
        }
        self.end_group()
    }

    pub fn build(&mut self) -> Vec<u8> {
        assert!(self.open_groups.is_empty(), "unclosed group");
        self.buf.clone()
    }

    pub fn write(&mut self, dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, self.build()).unwrap();
        path
    }
}

fn encode_fields(fields: &[Field]) -> Vec<u8> {
    let mut data = Vec::new();
    for (tag, body) in fields {
        if body.len() > u16::MAX as usize {
            data.extend_from_slice(b"XXXX");
            data.write_u16::<LittleEndian>(4).unwrap();
            data.write_u32::<LittleEndian>(body.len() as u32).unwrap();
            data.extend_from_slice(tag);
            data.write_u16::<LittleEndian>(0).unwrap();
        } else {
            data.extend_from_slice(tag);
            data.write_u16::<LittleEndian>(body.len() as u16).unwrap();
        }
        data.extend_from_slice(body);
    }
    data
}

// ---- field helpers -------------------------------------------------------

pub fn zstring(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    bytes.push(0);
    bytes
}

pub fn edid(text: &str) -> Field {
    (*b"EDID", zstring(text))
}

pub fn full(text: &str) -> Field {
    (*b"FULL", zstring(text))
}

pub fn u32_field(tag: &[u8; 4], value: u32) -> Field {
    (*tag, value.to_le_bytes().to_vec())
}

/// Base object of a reference.
pub fn name(base: u32) -> Field {
    u32_field(b"NAME", base)
}

pub fn cell_flags(flags: u8) -> Field {
    (*b"DATA", vec![flags])
}

pub fn xclc(x: i32, y: i32) -> Field {
    let mut body = Vec::new();
    body.write_i32::<LittleEndian>(x).unwrap();
    body.write_i32::<LittleEndian>(y).unwrap();
    body.write_u32::<LittleEndian>(0).unwrap();
    (*b"XCLC", body)
}

pub fn position(x: f32, y: f32, z: f32) -> Field {
    let mut body = Vec::new();
    for v in [x, y, z, 0.0, 0.0, 0.0] {
        body.write_f32::<LittleEndian>(v).unwrap();
    }
    (*b"DATA", body)
}

/// Teleport destination: door reference plus its placement.
pub fn xtel(door: u32) -> Field {
    let mut body = Vec::new();
    body.write_u32::<LittleEndian>(door).unwrap();
    for v in [1.0f32, 2.0, 3.0, 0.0, 0.0, 0.0] {
        body.write_f32::<LittleEndian>(v).unwrap();
    }
    (*b"XTEL", body)
}

/// Exterior block and sub-block labels store `(y, x)` as two i16.
pub fn grid_label(x: i16, y: i16) -> [u8; 4] {
    let mut label = [0u8; 4];
    label[..2].copy_from_slice(&y.to_le_bytes());
    label[2..].copy_from_slice(&x.to_le_bytes());
    label
}

pub fn form_label(id: u32) -> [u8; 4] {
    id.to_le_bytes()
}
