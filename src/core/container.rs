//! One open results file.
//!
//! A [`ResultContainer`] owns the file stream, the parsed header facts
//! (endian, date, header size), the fixed time-step size determined while
//! instantiating its schema, and the time index. Reads are positioned:
//! they address the step latched by the last positioning call.

use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use parking_lot::Mutex;

use super::time_index::{KeyStatus, TimeIndex};
use super::variable::Variable;
use crate::frs::format::{Endian, MODES_MODULE};
use crate::frs::header::{contains_data_label, FileHeader};
use crate::frs::reader::FrsStreams;
use crate::util::{DataType, Handle, Result};

/// Handle to a container owned by an extractor.
pub type ContainerId = Handle<ResultContainer>;

/// Numeric types values can be decoded into.
pub trait Sample: Copy + Default {
    fn from_f64(v: f64) -> Self;
    fn from_i64(v: i64) -> Self;
}

impl Sample for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }
    fn from_i64(v: i64) -> Self {
        v as f64
    }
}

impl Sample for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn from_i64(v: i64) -> Self {
        v as f32
    }
}

impl Sample for i32 {
    fn from_f64(v: f64) -> Self {
        v as i32
    }
    fn from_i64(v: i64) -> Self {
        v as i32
    }
}

/// Whole-step read-ahead buffer.
#[derive(Default)]
struct StepCache {
    step: Option<usize>,
    bytes: Vec<u8>,
}

pub struct ResultContainer {
    path: PathBuf,
    streams: FrsStreams,
    module: String,
    date: u64,
    endian: Endian,
    header_size: u64,
    step_size: u64,
    steps_read: usize,
    time_source: Option<(u64, Variable)>,
    times: TimeIndex,
    cache: Option<Mutex<StepCache>>,
    warnings: Vec<String>,
}

impl ResultContainer {
    /// Open `path` and parse its text header.
    pub fn open(path: impl AsRef<Path>, use_mmap: bool) -> Result<(Self, FileHeader)> {
        let path = path.as_ref();
        let streams = FrsStreams::open_opts(path, use_mmap)?;
        let header = match streams.mapped() {
            Some(bytes) => FileHeader::parse(bytes)?,
            None => FileHeader::parse(&streams.read_prefix_until(contains_data_label)?)?,
        };

        let container = Self {
            path: path.to_path_buf(),
            streams,
            module: header.module.clone(),
            date: header.date,
            endian: header.endian,
            header_size: header.header_size,
            step_size: 0,
            steps_read: 0,
            time_source: None,
            times: TimeIndex::new(),
            cache: None,
            warnings: Vec::new(),
        };
        Ok((container, header))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module(&self) -> &str {
        &self.module
    }

    /// Eigenmode files index steps by mode, not time.
    pub fn is_modes_file(&self) -> bool {
        self.module == MODES_MODULE
    }

    /// File creation date, comparable between containers.
    pub fn date(&self) -> u64 {
        self.date
    }

    pub fn endian(&self) -> Endian {
        self.endian
    }

    pub fn header_size(&self) -> u64 {
        self.header_size
    }

    pub fn step_size(&self) -> u64 {
        self.step_size
    }

    pub fn times(&self) -> &TimeIndex {
        &self.times
    }

    pub fn times_mut(&mut self) -> &mut TimeIndex {
        &mut self.times
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn add_warnings(&mut self, warnings: impl IntoIterator<Item = String>) {
        self.warnings.extend(warnings);
    }

    /// Number of complete steps in the file.
    pub fn step_count(&self) -> usize {
        if self.step_size == 0 {
            return 0;
        }
        (self.streams.size().saturating_sub(self.header_size) / self.step_size) as usize
    }

    /// True if at least one time step is indexed.
    pub fn has_data(&self) -> bool {
        !self.times.is_empty()
    }

    /// Record the step size and where each step's time key is stored,
    /// then index the steps present.
    pub fn set_layout(&mut self, step_size: u64, time_source: Option<(u64, Variable)>) -> usize {
        self.step_size = step_size;
        self.time_source = time_source;
        self.steps_read = 0;
        self.times = TimeIndex::new();
        self.index_new_steps()
    }

    /// Pick up steps appended since the last call. Returns how many were added.
    pub fn refresh(&mut self) -> Result<usize> {
        self.streams.refresh()?;
        if let Some(cache) = &self.cache {
            *cache.lock() = StepCache::default();
        }
        Ok(self.index_new_steps())
    }

    fn index_new_steps(&mut self) -> usize {
        let Some((offset, var)) = self.time_source.clone() else {
            return 0;
        };
        let count = self.step_count();
        let mut added = 0;
        for step in self.steps_read..count {
            let mut key = [0.0f64];
            if self.read_step(step, offset, &var, &mut key) != 1 {
                break;
            }
            if self.times.insert(key[0], step) {
                added += 1;
            } else {
                tracing::debug!(path = %self.path.display(), step, time = key[0], "duplicate time key ignored");
            }
            self.steps_read = step + 1;
        }
        added
    }

    /// Turn the whole-step read-ahead buffer on or off.
    pub fn set_pre_read(&mut self, enabled: bool) {
        self.cache = enabled.then(|| Mutex::new(StepCache::default()));
    }

    pub fn is_pre_reading(&self) -> bool {
        self.cache.is_some()
    }

    /// Latch the position for `time`.
    pub fn position_at_key(&mut self, time: f64, next_higher: bool) -> KeyStatus {
        self.times.position(time, next_higher)
    }

    /// Read the values of `var` stored at `offset` in the latched step.
    pub fn read_positioned<T: Sample>(&self, offset: u64, var: &Variable, out: &mut [T]) -> usize {
        match self.times.current_step() {
            Some(step) => self.read_step(step, offset, var, out),
            None => 0,
        }
    }

    /// Read the values of `var` stored at `offset` in `step`. Returns the
    /// number of values decoded, at most `min(out.len(), var.repeats())`.
    pub fn read_step<T: Sample>(&self, step: usize, offset: u64, var: &Variable, out: &mut [T]) -> usize {
        let elem = var.element_size();
        if var.data_type == DataType::None || !matches!(elem, 1 | 2 | 4 | 8) {
            return 0;
        }
        let n = out.len().min(var.repeats());
        if n == 0 || self.step_size == 0 || step >= self.step_count() {
            return 0;
        }

        let mut raw = vec![0u8; n * elem];
        let got = match &self.cache {
            Some(cache) => self.read_cached(cache, step, offset, &mut raw),
            None => {
                let pos = self.header_size + step as u64 * self.step_size + offset;
                self.streams.read_at(pos, &mut raw).unwrap_or_else(|e| {
                    tracing::warn!(path = %self.path.display(), error = %e, "read failed");
                    0
                })
            }
        };

        let count = got / elem;
        for (value, bytes) in out.iter_mut().zip(raw[..count * elem].chunks_exact(elem)) {
            *value = decode(bytes, var.data_type, self.endian);
        }
        count
    }

    fn read_cached(&self, cache: &Mutex<StepCache>, step: usize, offset: u64, raw: &mut [u8]) -> usize {
        let mut cache = cache.lock();
        if cache.step != Some(step) {
            let pos = self.header_size + step as u64 * self.step_size;
            cache.bytes.resize(self.step_size as usize, 0);
            match self.streams.read_at(pos, &mut cache.bytes) {
                Ok(len) => {
                    cache.bytes.truncate(len);
                    cache.step = Some(step);
                }
                Err(e) => {
                    tracing::warn!(path = %self.path.display(), error = %e, "pre-read failed");
                    *cache = StepCache::default();
                    return 0;
                }
            }
        }
        let start = (offset as usize).min(cache.bytes.len());
        let len = raw.len().min(cache.bytes.len() - start);
        raw[..len].copy_from_slice(&cache.bytes[start..start + len]);
        len
    }
}

fn decode<T: Sample>(bytes: &[u8], data_type: DataType, endian: Endian) -> T {
    macro_rules! read {
        ($method:ident) => {
            match endian {
                Endian::Big => BigEndian::$method(bytes),
                Endian::Little => LittleEndian::$method(bytes),
            }
        };
    }
    match (data_type, bytes.len()) {
        (DataType::Float, 4) => T::from_f64(f64::from(read!(read_f32))),
        (DataType::Float, 8) => T::from_f64(read!(read_f64)),
        (DataType::Int, 1) => T::from_i64(i64::from(bytes[0] as i8)),
        (DataType::Int, 2) => T::from_i64(i64::from(read!(read_i16))),
        (DataType::Int, 4) => T::from_i64(i64::from(read!(read_i32))),
        (DataType::Int, 8) => T::from_i64(read!(read_i64)),
        _ => T::default(),
    }
}
