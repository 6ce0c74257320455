//! Results files for integration tests.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use frs_rdb::frs::{Endian, FrsWriter, StepBuffer};

pub const TIME_VAR: &str = r#"<1;"Physical time";s;FLOAT;64;SCALAR;;>"#;

/// Write `w` with one step per time. Each step starts with the time key,
/// `fill` appends the rest.
pub fn write_steps(
    path: &Path,
    mut w: FrsWriter,
    times: &[f64],
    fill: impl Fn(&mut StepBuffer, f64),
) -> PathBuf {
    for &t in times {
        let mut step = w.new_step();
        step.f64(t);
        fill(&mut step, t);
        w.push_step(step);
    }
    w.write(path).unwrap();
    path.to_path_buf()
}

/// Translation of the triad position matrix at `t` in a file written with `base`.
pub fn triad_x(base: f64, t: f64) -> f64 {
    base + t
}

/// Triad with base id 3 holding a 3x4 position matrix. The translation
/// x component is `base + t`.
pub fn triad_file(dir: &Path, name: &str, times: &[f64], date: &str, base: f64) -> PathBuf {
    let w = FrsWriter::new("fedem_solver")
        .datetime(date)
        .variable(TIME_VAR)
        .variable(r#"<2;"Position matrix";"";FLOAT;64;TMAT34;(12);>"#)
        .datablock("<1>")
        .datablock(r#"{Triad;3;1;"Triad 1";<2>}"#);
    write_steps(&dir.join(name), w, times, |step, t| {
        step.f64s(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        step.f64s(&[triad_x(base, t), 0.0, 0.0]);
    })
}

/// Like [`triad_file`], with the matrix wrapped in an inline
/// `Position matrix` item group defined in place.
pub fn inline_triad_file(dir: &Path, name: &str, times: &[f64], date: &str, base: f64) -> PathBuf {
    let w = FrsWriter::new("fedem_solver")
        .datetime(date)
        .variable(TIME_VAR)
        .datablock("<1>")
        .datablock(r#"{Triad;3;1;"Triad 1";[0;"Position matrix";<2;Matrix;"";FLOAT;64;TMAT34;(12);>]}"#);
    write_steps(&dir.join(name), w, times, |step, t| {
        step.f64s(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        step.f64s(&[triad_x(base, t), 0.0, 0.0]);
    })
}

/// Spring with base id 5 holding a force vector `(10 t, 0, -1)`.
pub fn spring_force_file(dir: &Path, name: &str, times: &[f64], endian: Endian) -> PathBuf {
    let w = FrsWriter::new("fedem_solver")
        .endian(endian)
        .variable(TIME_VAR)
        .variable("<2;Force;N;FLOAT;64;VEC3;(3);>")
        .datablock("<1>")
        .datablock("{Spring;5;1;S1;<2>}");
    write_steps(&dir.join(name), w, times, |step, t| {
        step.f64s(&[10.0 * t, 0.0, -1.0]);
    })
}

/// Spring with base id 5 holding a length `100 + t`.
pub fn spring_length_file(dir: &Path, name: &str, times: &[f64]) -> PathBuf {
    let w = FrsWriter::new("fedem_solver")
        .variable(TIME_VAR)
        .variable("<2;Length;m;FLOAT;64;SCALAR;;>")
        .datablock("<1>")
        .datablock("{Spring;5;1;S1;<2>}");
    write_steps(&dir.join(name), w, times, |step, t| {
        step.f64(100.0 + t);
    })
}

/// Current key of every open container, in file order.
pub fn current_keys(rdb: &frs_rdb::Extractor) -> Vec<Option<f64>> {
    rdb.containers().map(|(_, c)| c.times().current_key()).collect()
}
