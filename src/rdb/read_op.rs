//! Typed read operations.
//!
//! A [`ReadOpRegistry`] maps a variable's `(data class, bit width)` to a
//! constructor producing a decoder bound to one variable reference. The
//! registry is a plain value owned by the [`Extractor`]; tests and tools
//! can build their own with [`ReadOpRegistry::new`] and
//! [`ReadOpRegistry::register`].

use std::collections::HashMap;
use std::fmt;

use super::Extractor;
use crate::core::{EntryId, Variable};
use crate::util::{mat33_from_slice, mat34_from_slice, DAffine3, DMat3, DVec3, Error, Result, Tensor2, Tensor3};

/// A decoded result value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Scalar(f64),
    Vec3(DVec3),
    /// 3x3 matrix, stored column-major
    Mat33(DMat3),
    /// 3x4 transform: three axis columns followed by the translation
    Mat34(DAffine3),
    Vector(Vec<f64>),
    Tensor1(f64),
    Tensor2(Tensor2),
    Tensor3(Tensor3),
}

impl Value {
    /// Flatten to `f64`s in storage order.
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Value::Int(v) => vec![f64::from(*v)],
            Value::Scalar(v) | Value::Tensor1(v) => vec![*v],
            Value::Vec3(v) => v.to_array().to_vec(),
            Value::Mat33(m) => m.to_cols_array().to_vec(),
            Value::Mat34(m) => m.to_cols_array().to_vec(),
            Value::Vector(v) => v.clone(),
            Value::Tensor2(t) => t.0.to_vec(),
            Value::Tensor3(t) => t.0.to_vec(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{v}"),
            Value::Scalar(v) | Value::Tensor1(v) => write!(f, "{v}"),
            other => {
                let parts: Vec<String> = other.to_vec().iter().map(f64::to_string).collect();
                write!(f, "[{}]", parts.join(" "))
            }
        }
    }
}

/// Decoder bound to one variable reference.
pub trait ReadOperation: Send + Sync {
    /// The variable reference this operation reads.
    fn entry(&self) -> EntryId;

    /// Decode the value at the current time position. `None` if no data
    /// was read or the read was short.
    fn evaluate(&self, rdb: &Extractor) -> Option<Value>;

    /// True if the bound reference has data at exactly the current time.
    fn has_data(&self, rdb: &Extractor) -> bool {
        rdb.has_data_for_current_key(self.entry())
    }
}

/// Builds a read operation for one reference of the given variable.
pub type ReadOpConstructor = fn(EntryId, &Variable) -> Box<dyn ReadOperation>;

/// Fixed number of values shaped into a [`Value`].
struct ShapedRead {
    entry: EntryId,
    count: usize,
    shape: fn(&[f64]) -> Value,
}

impl ReadOperation for ShapedRead {
    fn entry(&self) -> EntryId {
        self.entry
    }

    fn evaluate(&self, rdb: &Extractor) -> Option<Value> {
        let mut buf = vec![0.0; self.count];
        let n = rdb.get_single_time_step_data(self.entry, &mut buf);
        (n == self.count).then(|| (self.shape)(&buf))
    }
}

/// All repeats of the variable.
struct VectorRead {
    entry: EntryId,
    repeats: usize,
}

impl ReadOperation for VectorRead {
    fn entry(&self) -> EntryId {
        self.entry
    }

    fn evaluate(&self, rdb: &Extractor) -> Option<Value> {
        let mut buf = vec![0.0; self.repeats];
        let n = rdb.get_single_time_step_data(self.entry, &mut buf);
        if n == 0 {
            return None;
        }
        buf.truncate(n);
        Some(Value::Vector(buf))
    }
}

struct IntRead {
    entry: EntryId,
}

impl ReadOperation for IntRead {
    fn entry(&self) -> EntryId {
        self.entry
    }

    fn evaluate(&self, rdb: &Extractor) -> Option<Value> {
        let mut buf = [0i32];
        (rdb.get_single_time_step_ints(self.entry, &mut buf) == 1).then(|| Value::Int(buf[0]))
    }
}

fn shaped(entry: EntryId, count: usize, shape: fn(&[f64]) -> Value) -> Box<dyn ReadOperation> {
    Box::new(ShapedRead { entry, count, shape })
}

fn int_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    Box::new(IntRead { entry })
}

fn scalar_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 1, |v| Value::Scalar(v[0]))
}

fn vec3_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 3, |v| Value::Vec3(DVec3::from_slice(v)))
}

fn mat33_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 9, |v| Value::Mat33(mat33_from_slice(v)))
}

fn mat34_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 12, |v| Value::Mat34(mat34_from_slice(v)))
}

fn vector_op(entry: EntryId, var: &Variable) -> Box<dyn ReadOperation> {
    Box::new(VectorRead { entry, repeats: var.repeats() })
}

fn tensor1_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 1, |v| Value::Tensor1(v[0]))
}

fn tensor2_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 3, |v| Value::Tensor2(Tensor2([v[0], v[1], v[2]])))
}

fn tensor3_op(entry: EntryId, _: &Variable) -> Box<dyn ReadOperation> {
    shaped(entry, 6, |v| Value::Tensor3(Tensor3([v[0], v[1], v[2], v[3], v[4], v[5]])))
}

/// `(data class, bit width)` keyed constructor table.
#[derive(Clone, Default)]
pub struct ReadOpRegistry {
    ops: HashMap<(String, u32), ReadOpConstructor>,
}

impl ReadOpRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the standard result classes.
    pub fn with_defaults() -> Self {
        let mut r = Self::new();
        r.register("NUMBER", 32, int_op);
        let both: [(&str, ReadOpConstructor); 9] = [
            ("SCALAR", scalar_op),
            ("VEC3", vec3_op),
            ("ROT3", vec3_op),
            ("TMAT33", mat33_op),
            ("TMAT34", mat34_op),
            ("VECTOR", vector_op),
            ("TENSOR1", tensor1_op),
            ("TENSOR2", tensor2_op),
            ("TENSOR3", tensor3_op),
        ];
        for (class, ctor) in both {
            r.register(class, 32, ctor);
            r.register(class, 64, ctor);
        }
        r
    }

    /// Add or replace the constructor for `(class, size)`.
    pub fn register(&mut self, class: &str, size: u32, ctor: ReadOpConstructor) {
        self.ops.insert((class.to_string(), size), ctor);
    }

    pub fn lookup(&self, class: &str, size: u32) -> Option<ReadOpConstructor> {
        self.ops.get(&(class.to_string(), size)).copied()
    }

    /// Build the operation for a reference to `var`.
    pub fn create(&self, entry: EntryId, var: &Variable) -> Result<Box<dyn ReadOperation>> {
        let ctor = self.lookup(&var.data_class, var.data_size).ok_or_else(|| Error::UnknownReadOp {
            class: var.data_class.clone(),
            size: var.data_size,
        })?;
        Ok(ctor(entry, var))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::DataType;

    #[test]
    fn test_defaults() {
        let r = ReadOpRegistry::with_defaults();
        assert_eq!(r.len(), 19);
        assert!(r.lookup("TMAT34", 64).is_some());
        assert!(r.lookup("TMAT34", 32).is_some());
        assert!(r.lookup("NUMBER", 64).is_none());
    }

    #[test]
    fn test_unknown_pair_is_error() {
        let r = ReadOpRegistry::with_defaults();
        let var = Variable::new("Spin", "", DataType::Float, 16, "QUAT");
        let err = r.create(EntryId::from_index(0), &var).err().unwrap();
        assert!(matches!(err, Error::UnknownReadOp { size: 16, .. }));
    }

    #[test]
    fn test_isolated_registry() {
        let mut r = ReadOpRegistry::new();
        assert!(r.is_empty());
        r.register("QUAT", 64, vector_op);
        let var = Variable::new("Spin", "", DataType::Float, 64, "QUAT").with_blocks(vec![4], vec![]);
        let op = r.create(EntryId::from_index(5), &var).unwrap();
        assert_eq!(op.entry(), EntryId::from_index(5));
        assert!(ReadOpRegistry::with_defaults().lookup("QUAT", 64).is_none());
    }

    #[test]
    fn test_value_layout() {
        let v: Vec<f64> = (1..=12).map(f64::from).collect();
        let m = Value::Mat34(mat34_from_slice(&v));
        assert_eq!(m.to_vec(), v);
        assert_eq!(Value::Vec3(DVec3::new(1.0, 2.0, 3.0)).to_string(), "[1 2 3]");
    }
}
