//! Results file writer.
//!
//! Produces files the reader understands: a binary tag, headings, the
//! `VARIABLES:` and `DATABLOCKS:` sections and fixed-width time steps.
//! Used by tests and demo tooling; the reader never writes back.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{BigEndian, LittleEndian, WriteBytesExt};

use super::format::*;
use crate::util::Result;

/// Builder for one results file.
#[derive(Clone, Debug)]
pub struct FrsWriter {
    tag: String,
    endian: Endian,
    module: String,
    datetime: Option<String>,
    variables: Vec<String>,
    datablocks: Vec<String>,
    data: Vec<u8>,
}

impl FrsWriter {
    pub fn new(module: impl Into<String>) -> Self {
        Self {
            tag: "FRS results database".into(),
            endian: Endian::native(),
            module: module.into(),
            datetime: None,
            variables: Vec::new(),
            datablocks: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn endian(mut self, endian: Endian) -> Self {
        self.endian = endian;
        self
    }

    /// Set the `DATETIME` heading, e.g. `"19 Oct 2026 12:00:00"`.
    pub fn datetime(mut self, value: impl Into<String>) -> Self {
        self.datetime = Some(value.into());
        self
    }

    /// Add a raw entry to the `VARIABLES:` section.
    pub fn variable(mut self, entry: impl Into<String>) -> Self {
        self.variables.push(entry.into());
        self
    }

    /// Add a raw entry to the `DATABLOCKS:` section.
    pub fn datablock(mut self, entry: impl Into<String>) -> Self {
        self.datablocks.push(entry.into());
        self
    }

    /// Start a time step record in this file's byte order.
    pub fn new_step(&self) -> StepBuffer {
        StepBuffer::new(self.endian)
    }

    /// Append one encoded time step.
    pub fn push_step(&mut self, step: StepBuffer) -> &mut Self {
        self.data.extend_from_slice(&step.bytes);
        self
    }

    /// Encode the text header, ending right after `DATA:`.
    pub fn header_bytes(&self) -> Vec<u8> {
        let mut out = format!("#{:<width$}", self.tag, width = TAG_LEN - 1).into_bytes();
        out.truncate(TAG_LEN);
        out.extend_from_slice(&self.endian.mark());
        out.extend_from_slice(&[0u8; CHECKSUM_LEN]);
        out.push(b'\n');

        let mut text = format!("{HEADING_MODULE} = {};\n", self.module);
        if let Some(date) = &self.datetime {
            text.push_str(&format!("{HEADING_DATETIME} = {date};\n"));
        }
        text.push_str(&format!("\n{LABEL_VARIABLES}:\n"));
        for entry in &self.variables {
            text.push_str(entry);
            text.push('\n');
        }
        text.push_str(&format!("\n{LABEL_DATABLOCKS}:\n"));
        for entry in &self.datablocks {
            text.push_str(entry);
            text.push('\n');
        }
        text.push_str(&format!("\n{LABEL_DATA}:"));

        out.extend_from_slice(text.as_bytes());
        out
    }

    /// Write header and all pushed steps to `path`.
    pub fn write(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        file.write_all(&self.header_bytes())?;
        file.write_all(&self.data)?;
        file.flush()?;
        Ok(())
    }
}

/// Append already encoded steps to an existing file, as a running solver does.
pub fn append_steps(path: impl AsRef<Path>, steps: &[StepBuffer]) -> Result<()> {
    let mut file = OpenOptions::new().append(true).open(path)?;
    for step in steps {
        file.write_all(&step.bytes)?;
    }
    file.flush()?;
    Ok(())
}

/// Encoder for one fixed-width time step record.
#[derive(Clone, Debug)]
pub struct StepBuffer {
    endian: Endian,
    bytes: Vec<u8>,
}

macro_rules! put {
    ($self:ident, $method:ident, $v:expr) => {{
        // Writing into a Vec cannot fail
        let _ = match $self.endian {
            Endian::Big => $self.bytes.$method::<BigEndian>($v),
            Endian::Little => $self.bytes.$method::<LittleEndian>($v),
        };
        $self
    }};
}

impl StepBuffer {
    pub fn new(endian: Endian) -> Self {
        Self { endian, bytes: Vec::new() }
    }

    pub fn f64(&mut self, v: f64) -> &mut Self {
        put!(self, write_f64, v)
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        put!(self, write_f32, v)
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        put!(self, write_i32, v)
    }

    pub fn f64s(&mut self, values: &[f64]) -> &mut Self {
        for &v in values {
            self.f64(v);
        }
        self
    }

    pub fn f32s(&mut self, values: &[f32]) -> &mut Self {
        for &v in values {
            self.f32(v);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frs::header::FileHeader;

    #[test]
    fn test_header_round_trip() {
        let w = FrsWriter::new("fedem_solver")
            .endian(Endian::Big)
            .datetime("19 Oct 2026 08:15:00")
            .variable(r#"<1;"Physical time";s;FLOAT;64;SCALAR;;>"#)
            .datablock("<1>");
        let bytes = w.header_bytes();

        let h = FileHeader::parse(&bytes).unwrap();
        assert_eq!(h.endian, Endian::Big);
        assert_eq!(h.module, "fedem_solver");
        assert_eq!(h.header_size, bytes.len() as u64);
        assert_eq!(h.entries.len(), 2);
        assert_eq!(h.entries[0].fields[1], "Physical time");
    }

    #[test]
    fn test_step_encoding() {
        let mut step = StepBuffer::new(Endian::Big);
        step.f64(1.0).i32(2).f32(0.5);
        assert_eq!(step.len(), 16);
        assert_eq!(&step.as_bytes()[8..12], &[0, 0, 0, 2]);
    }
}
