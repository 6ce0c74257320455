//! Text header scanner.
//!
//! Splits the header of a results file into its file tag, headings
//! (`LABEL = value;`) and the raw bracketed entries of the `VARIABLES:`
//! and `DATABLOCKS:` sections, and locates the start of the binary data
//! following `DATA:`.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::format::*;
use super::tokenizer::tokenize;
use crate::util::{Error, Result};

/// Header section an entry was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Section {
    /// Definitions only
    Variables,
    /// Per-step layout: object groups, references and definitions
    DataBlocks,
}

/// Bracket shape of an entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    /// `<...>`
    Variable,
    /// `[...]`
    ItemGroup,
    /// `{...}`
    ObjectGroup,
}

impl EntryKind {
    fn from_open(c: u8) -> Option<(Self, u8)> {
        match c {
            b'<' => Some((Self::Variable, b'>')),
            b'[' => Some((Self::ItemGroup, b']')),
            b'{' => Some((Self::ObjectGroup, b'}')),
            _ => None,
        }
    }
}

/// One tokenized header entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEntry {
    pub section: Section,
    pub kind: EntryKind,
    pub fields: Vec<String>,
}

/// Parsed text header of a results file.
#[derive(Clone, Debug, Default)]
pub struct FileHeader {
    /// File tag without the leading `#`
    pub tag: String,
    /// True if the tag line was plain text (no binary endian/checksum fields)
    pub text_tag: bool,
    pub endian: Endian,
    pub checksum: u64,
    pub module: String,
    pub date: u64,
    /// Entries in file order
    pub entries: Vec<RawEntry>,
    /// Byte offset of the first time step
    pub header_size: u64,
}

impl FileHeader {
    /// Parse the header from the leading bytes of a file.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut header = FileHeader::default();
        let mut pos = header.parse_tag(bytes)?;
        let mut section = None;

        loop {
            pos = skip_whitespace(bytes, pos);
            let Some(&c) = bytes.get(pos) else {
                return Err(Error::header("end of file before DATA section"));
            };

            if c == b'#' {
                pos = skip_line(bytes, pos);
                continue;
            }

            if let Some((kind, close)) = EntryKind::from_open(c) {
                let Some(section) = section else {
                    return Err(Error::header(format!("entry outside a section at byte {pos}")));
                };
                let tokens = tokenize(&bytes[pos..], c, close, b';')
                    .ok_or_else(|| Error::header(format!("unterminated entry at byte {pos}")))?;
                header.entries.push(RawEntry { section, kind, fields: tokens.fields });
                pos += tokens.consumed;
                continue;
            }

            let start = pos;
            while bytes.get(pos).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
                pos += 1;
            }
            if start == pos {
                pos = skip_line(bytes, pos);
                continue;
            }
            let label = String::from_utf8_lossy(&bytes[start..pos]).to_ascii_uppercase();
            pos = skip_blanks(bytes, pos);

            match bytes.get(pos) {
                Some(b':') => {
                    pos += 1;
                    match label.as_str() {
                        LABEL_VARIABLES => section = Some(Section::Variables),
                        LABEL_DATABLOCKS => section = Some(Section::DataBlocks),
                        LABEL_DATA => {
                            header.header_size = pos as u64;
                            return Ok(header);
                        }
                        _ => {
                            tracing::debug!(label, "ignoring unknown section");
                            section = None;
                        }
                    }
                }
                Some(b'=') => {
                    let end = bytes[pos..]
                        .iter()
                        .position(|&b| b == b';' || b == b'\n')
                        .map_or(bytes.len(), |n| pos + n);
                    let value = String::from_utf8_lossy(&bytes[pos + 1..end]);
                    let value = value.trim().trim_matches('"').to_string();
                    pos = end + 1;
                    match label.as_str() {
                        HEADING_MODULE => header.module = value,
                        HEADING_DATETIME => header.date = parse_date(&value),
                        _ => {}
                    }
                }
                _ => pos = skip_line(bytes, pos),
            }
        }
    }

    /// Validate the tag and the binary fields following it.
    /// Returns the position of the first header line.
    fn parse_tag(&mut self, bytes: &[u8]) -> Result<usize> {
        if bytes.first() != Some(&TAG_START) {
            return Err(Error::InvalidTag("missing leading '#'".into()));
        }

        let tag_end = TAG_LEN.min(bytes.len());
        if let Some(nl) = bytes[..tag_end].iter().position(|&b| b == b'\n') {
            self.tag = String::from_utf8_lossy(&bytes[1..nl]).trim().to_string();
            self.text_tag = true;
            self.endian = Endian::native();
            return Ok(nl + 1);
        }

        let fields_end = TAG_LEN + ENDIAN_LEN + CHECKSUM_LEN;
        if bytes.len() < fields_end {
            return Err(Error::UnexpectedEof(bytes.len() as u64));
        }
        self.tag = String::from_utf8_lossy(&bytes[1..TAG_LEN]).trim().to_string();
        self.endian = Endian::from_mark([bytes[TAG_LEN], bytes[TAG_LEN + 1]])
            .ok_or_else(|| Error::InvalidTag("unrecognised endian field".into()))?;

        let checksum = &bytes[TAG_LEN + ENDIAN_LEN..fields_end];
        self.checksum = match self.endian {
            Endian::Big => BigEndian::read_u64(checksum),
            Endian::Little => LittleEndian::read_u64(checksum),
        };

        Ok(skip_line(bytes, fields_end))
    }
}

/// True once `bytes` contains the `DATA:` label at the start of a line.
pub fn contains_data_label(bytes: &[u8]) -> bool {
    let label = b"\nDATA:";
    bytes.windows(label.len()).any(|w| w == label)
}

fn skip_whitespace(bytes: &[u8], mut pos: usize) -> usize {
    while bytes.get(pos).is_some_and(u8::is_ascii_whitespace) {
        pos += 1;
    }
    pos
}

fn skip_blanks(bytes: &[u8], mut pos: usize) -> usize {
    while matches!(bytes.get(pos), Some(b' ' | b'\t')) {
        pos += 1;
    }
    pos
}

fn skip_line(bytes: &[u8], pos: usize) -> usize {
    bytes[pos.min(bytes.len())..]
        .iter()
        .position(|&b| b == b'\n')
        .map_or(bytes.len(), |n| pos + n + 1)
}
