//! Variable descriptors.
//!
//! A [`Variable`] describes one named, typed, repeated quantity stored in
//! every time step. Descriptors are interned extractor-wide in a
//! [`VariableStore`], so equal variables read from different files share
//! one [`VariableId`].

use std::fmt;

use crate::frs::format::atoi;
use crate::frs::tokenizer::split_list;
use crate::util::{DataType, Handle, Interner};

/// Descriptor of one stored quantity.
///
/// Field order defines the total order used for interning.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Variable {
    pub name: String,
    pub unit: String,
    pub data_type: DataType,
    /// Bits per stored element
    pub data_size: u32,
    /// Dispatch tag such as `SCALAR`, `VEC3`, `TMAT34`
    pub data_class: String,
    pub block_sizes: Vec<u32>,
    pub block_descriptions: Vec<String>,
}

/// Shared handle to an interned variable.
pub type VariableId = Handle<Variable>;

/// Extractor-wide variable interner.
pub type VariableStore = Interner<Variable>;

impl Variable {
    pub fn new(
        name: impl Into<String>,
        unit: impl Into<String>,
        data_type: DataType,
        data_size: u32,
        data_class: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            unit: unit.into(),
            data_type,
            data_size,
            data_class: data_class.into(),
            ..Default::default()
        }
    }

    pub fn with_blocks(mut self, sizes: Vec<u32>, descriptions: Vec<String>) -> Self {
        self.block_sizes = sizes;
        self.block_descriptions = descriptions;
        self
    }

    /// Number of stored elements: 1 without a block shape, otherwise the
    /// product of the block sizes, which may be 0.
    pub fn repeats(&self) -> usize {
        if self.block_sizes.is_empty() {
            return 1;
        }
        self.block_sizes.iter().map(|&n| n as usize).product()
    }

    /// Bytes occupied in one time step.
    #[inline]
    pub fn byte_size(&self) -> u64 {
        self.repeats() as u64 * u64::from(self.data_size) / 8
    }

    /// Bytes per stored element.
    #[inline]
    pub fn element_size(&self) -> usize {
        self.data_size as usize / 8
    }

    /// Build from header fields `id;name;unit;type;bits;class[;(sizes)[;(descr)]]`.
    /// Returns the file-local id together with the variable, or `None` if
    /// fewer than six fields are present.
    pub fn from_fields(fields: &[String]) -> Option<(i32, Variable)> {
        if fields.len() < 6 {
            return None;
        }
        let block_sizes = fields
            .get(6)
            .map(|f| split_list(f, b'(', b')', b',').iter().map(|s| atoi(s).max(0) as u32).collect())
            .unwrap_or_default();
        let block_descriptions =
            fields.get(7).map(|f| split_list(f, b'(', b')', b',')).unwrap_or_default();

        let var = Variable {
            name: fields[1].clone(),
            unit: fields[2].clone(),
            data_type: DataType::parse(&fields[3]),
            data_size: atoi(&fields[4]).max(0) as u32,
            data_class: fields[5].clone(),
            block_sizes,
            block_descriptions,
        };
        Some((atoi(&fields[0]), var))
    }

    /// Header entry for this variable under the given local id.
    pub fn to_entry(&self, id: i32) -> String {
        format!(
            "<{id};\"{}\";\"{}\";{};{};{};({});({})>",
            self.name,
            self.unit,
            self.data_type,
            self.data_size,
            self.data_class,
            self.block_sizes.iter().map(u32::to_string).collect::<Vec<_>>().join(","),
            self.block_descriptions.join(","),
        )
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {} {}x{}", self.name, self.unit, self.data_class, self.repeats(), self.data_size)
    }
}
