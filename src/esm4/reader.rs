//! Sequential cursor over one content file.
//!
//! The reader knows the file's header width and FormId map, keeps the
//! stack of groups it is currently inside, and can capture and restore a
//! [`ReadContext`] so that a group skipped during ingestion can be read
//! later exactly as if it had been read inline.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use log::trace;

use super::codec::compression;
use super::types::error::{Esm4Error, Result};
use super::types::formid::{FormId, FormIdMap};
use super::types::models::*;

pub const GROUP_TAG: [u8; 4] = *b"GRUP";

/// A resumable bookmark into a content file.
///
/// Restoring the context positions the reader on the group header at
/// `offset` with `groups` as the enclosing group stack, so the next
/// `read_group_header` sees the same nesting the original read did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadContext {
    pub file_index: usize,
    pub offset: u64,
    pub groups: Vec<GroupFrame>,
}

#[derive(Debug)]
pub struct Esm4Reader<R: Read + Seek> {
    source: R,
    file_index: usize,
    len: u64,
    width: HeaderWidth,
    form_ids: FormIdMap,
    groups: Vec<GroupFrame>,
}

impl<R: Read + Seek> Esm4Reader<R> {
    /// Wraps `source` as the file at load-order position `file_index`.
    ///
    /// Until the file header has been parsed the reader assumes the long
    /// header layout and a map without masters.
    pub fn new(mut source: R, file_index: usize) -> Result<Self> {
        let len = source.seek(SeekFrom::End(0))?;
        source.seek(SeekFrom::Start(0))?;
        Ok(Self {
            source,
            file_index,
            len,
            width: HeaderWidth::Long,
            form_ids: FormIdMap::standalone(file_index as u8),
            groups: Vec::new(),
        })
    }

    pub fn file_index(&self) -> usize {
        self.file_index
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&mut self) -> Result<u64> {
        Ok(self.source.stream_position()?)
    }

    pub fn header_width(&self) -> HeaderWidth {
        self.width
    }

    pub fn set_header_width(&mut self, width: HeaderWidth) {
        self.width = width;
    }

    pub fn form_ids(&self) -> &FormIdMap {
        &self.form_ids
    }

    pub fn set_form_ids(&mut self, form_ids: FormIdMap) {
        self.form_ids = form_ids;
    }

    pub fn adjust(&self, raw: u32) -> FormId {
        self.form_ids.adjust(raw)
    }

    /// Whether any bytes remain before the end of the innermost group,
    /// or the end of the file at top level.
    pub fn has_more(&mut self) -> Result<bool> {
        let limit = self.groups.last().map(|g| g.end).unwrap_or(self.len);
        Ok(self.position()? < limit)
    }

    /// Reads the next four bytes without consuming them.
    ///
    /// Returns `None` when fewer than four bytes remain in the file.
    pub fn peek_tag(&mut self) -> Result<Option<[u8; 4]>> {
        let pos = self.position()?;
        if pos + 4 > self.len {
            return Ok(None);
        }
        let tag = self.read_tag()?;
        self.source.seek(SeekFrom::Start(pos))?;
        Ok(Some(tag))
    }

    pub fn read_tag(&mut self) -> Result<[u8; 4]> {
        let mut tag = [0u8; 4];
        self.source.read_exact(&mut tag)?;
        Ok(tag)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.source.read_u16::<LittleEndian>()?)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.source.read_u32::<LittleEndian>()?)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.source.read_i32::<LittleEndian>()?)
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.source.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn skip_bytes(&mut self, len: u64) -> Result<()> {
        self.source.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }

    pub fn skip_to(&mut self, offset: u64) -> Result<()> {
        self.source.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Reads a record header, adjusting its identifier.
    ///
    /// # Header Structure
    /// ```text
    /// [4 bytes] Record type
    /// [4 bytes] Data size (excluding header)
    /// [4 bytes] Flags
    /// [4 bytes] FormId
    /// [4 bytes] Version control stamp
    /// [2 bytes] Form version   (long headers only)
    /// [2 bytes] Unknown        (long headers only)
    /// ```
    pub fn read_record_header(&mut self) -> Result<RecordHeader> {
        let tag = self.read_tag()?;
        if tag == GROUP_TAG {
            return Err(Esm4Error::InvalidFormat(format!(
                "Expected a record at offset {:#x}, found a group",
                self.position()? - 4
            )));
        }
        tag_to_string(&tag)?;
        let data_size = self.read_u32()?;
        let flags = RecordFlags(self.read_u32()?);
        let raw_id = self.read_u32()?;
        let version_control = self.read_u32()?;
        let form_version = match self.width {
            HeaderWidth::Short => None,
            HeaderWidth::Long => {
                let form_version = self.read_u16()?;
                let _unknown = self.read_u16()?;
                Some(form_version)
            }
        };
        let header = RecordHeader {
            record_type: RecordType::from_tag(tag),
            data_size,
            flags,
            form_id: self.adjust(raw_id),
            version_control,
            form_version,
        };
        trace!(
            "Record header: type={}, id={}, size={}, flags={:#010x}",
            header.record_type,
            header.form_id,
            header.data_size,
            header.flags.0
        );
        Ok(header)
    }

    /// Reads a group header into a frame without entering it.
    ///
    /// # Header Structure
    /// ```text
    /// [4 bytes] "GRUP"
    /// [4 bytes] Group size (including header)
    /// [4 bytes] Label (meaning depends on group type)
    /// [4 bytes] Group type
    /// [4 bytes] Stamp
    /// [4 bytes] Unknown        (long headers only)
    /// ```
    ///
    /// # Errors
    /// A group type outside the known hierarchy is structural corruption.
    pub fn read_group_header(&mut self) -> Result<GroupFrame> {
        let start = self.position()?;
        let tag = self.read_tag()?;
        if tag != GROUP_TAG {
            return Err(Esm4Error::InvalidFormat(format!(
                "Expected a group at offset {:#x}, found {:02x?}",
                start, tag
            )));
        }
        let group_size = self.read_u32()?;
        let mut label = [0u8; 4];
        self.source.read_exact(&mut label)?;
        let raw_type = self.read_i32()?;
        let group_type = GroupType::from_raw(raw_type).ok_or(Esm4Error::UnexpectedGroup {
            group_type: raw_type,
            offset: start,
        })?;
        let stamp = self.read_u32()?;
        if self.width == HeaderWidth::Long {
            let _unknown = self.read_u32()?;
        }

        if group_type == GroupType::Top {
            tag_to_string(&label)?;
        }

        let end = start + group_size as u64;
        if (group_size as u64) < self.width.header_size() || end > self.len {
            return Err(Esm4Error::InvalidFormat(format!(
                "Group at offset {:#x} declares size {} (file length {})",
                start, group_size, self.len
            )));
        }
        if let Some(parent) = self.groups.last() {
            if end > parent.end {
                return Err(Esm4Error::InvalidFormat(format!(
                    "Group at offset {:#x} overruns its parent ending at {:#x}",
                    start, parent.end
                )));
            }
        }

        trace!(
            "Group header: type={:?}, label={:02x?}, size={}",
            group_type,
            label,
            group_size
        );
        Ok(GroupFrame {
            header: GroupHeader {
                group_size,
                label: GroupLabel(label),
                group_type,
                stamp,
            },
            start,
            end,
        })
    }

    /// Reads the next group header, if any, and rewinds.
    pub fn peek_group_header(&mut self) -> Result<Option<GroupFrame>> {
        if !self.has_more()? || self.peek_tag()? != Some(GROUP_TAG) {
            return Ok(None);
        }
        let pos = self.position()?;
        let frame = self.read_group_header()?;
        self.source.seek(SeekFrom::Start(pos))?;
        Ok(Some(frame))
    }

    /// Reads a record's data, inflating it if the compressed flag is set.
    pub fn read_record_data(&mut self, header: &RecordHeader) -> Result<Vec<u8>> {
        let raw = self.read_bytes(header.data_size as usize)?;
        if !header.flags.is_compressed() {
            return Ok(raw);
        }
        let mut data = Vec::new();
        compression::decompress_record_into(&mut data, &raw)?;
        Ok(data)
    }

    pub fn skip_record_data(&mut self, header: &RecordHeader) -> Result<()> {
        self.skip_bytes(header.data_size as u64)
    }

    pub fn enter_group(&mut self, frame: GroupFrame) {
        self.groups.push(frame);
    }

    pub fn leave_group(&mut self) -> Option<GroupFrame> {
        self.groups.pop()
    }

    pub fn group_stack(&self) -> &[GroupFrame] {
        &self.groups
    }

    /// Innermost enclosing group of the given type.
    pub fn enclosing(&self, group_type: GroupType) -> Option<&GroupFrame> {
        self.groups
            .iter()
            .rev()
            .find(|g| g.header.group_type == group_type)
    }

    /// The cell whose children are currently being read.
    pub fn current_cell(&self) -> Option<FormId> {
        self.enclosing(GroupType::CellChildren)
            .map(|g| self.adjust(g.header.label.as_raw_form_id()))
    }

    /// The world whose children are currently being read.
    pub fn current_world(&self) -> Option<FormId> {
        self.enclosing(GroupType::WorldChildren)
            .map(|g| self.adjust(g.header.label.as_raw_form_id()))
    }

    /// Captures a context that resumes at the group header at `offset`.
    pub fn snapshot(&self, offset: u64) -> ReadContext {
        ReadContext {
            file_index: self.file_index,
            offset,
            groups: self.groups.clone(),
        }
    }

    /// Re-seeks to a captured context.
    ///
    /// # Errors
    /// Fails if the context was captured from another file.
    pub fn restore(&mut self, context: &ReadContext) -> Result<()> {
        if context.file_index != self.file_index {
            return Err(Esm4Error::InvalidFormat(format!(
                "Read context for file {} restored on file {}",
                context.file_index, self.file_index
            )));
        }
        self.source.seek(SeekFrom::Start(context.offset))?;
        self.groups = context.groups.clone();
        Ok(())
    }
}
