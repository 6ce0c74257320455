//! Integration tests for time positioning and positioned reads.

mod common;

use common::*;
use frs_rdb::frs::writer::append_steps;
use frs_rdb::frs::{Endian, FrsWriter, StepBuffer};
use frs_rdb::prelude::*;

const DAY1: &str = "1 Oct 2026 08:00:00";
const DAY2: &str = "2 Oct 2026 08:00:00";

fn read_x(rdb: &Extractor, entry: EntryId) -> Option<f64> {
    let mut m = [0.0; 12];
    (rdb.get_single_time_step_data(entry, &mut m) == 12).then_some(m[9])
}

#[test]
fn test_reads_from_the_container_holding_the_variable() {
    let dir = tempfile::tempdir().unwrap();
    let times: Vec<f64> = (0..=10).map(f64::from).collect();
    let a = spring_force_file(dir.path(), "a.frs", &times, Endian::native());
    let b = spring_length_file(dir.path(), "b.frs", &[0.0, 2.5, 5.5]);

    let mut rdb = Extractor::new();
    assert!(rdb.add_files([&a, &b]));
    assert_eq!(rdb.position(5.0), Some(5.0));

    let force = rdb.find("Spring", 5, &["Force"]).unwrap();
    let mut v = [0.0; 3];
    assert_eq!(rdb.get_single_time_step_data(force, &mut v), 3);
    assert_eq!(v, [50.0, 0.0, -1.0]);
    assert!(rdb.has_data_for_current_key(force));

    // Only the second file holds the length; it is latched at 2.5
    let length = rdb.find("Spring", 5, &["Length"]).unwrap();
    let mut l = [0.0];
    assert_eq!(rdb.get_single_time_step_data(length, &mut l), 1);
    assert_eq!(l[0], 102.5);
    assert!(!rdb.has_data_for_current_key(length));

    // Whole object group in field order
    let spring = rdb.object_group(5).unwrap();
    assert_eq!(rdb.value_count(spring), 4);
    let mut all = [0.0; 4];
    assert_eq!(rdb.get_single_time_step_data(spring, &mut all), 4);
    assert_eq!(all, [50.0, 0.0, -1.0, 102.5]);
}

#[test]
fn test_short_reads_are_counted() {
    let dir = tempfile::tempdir().unwrap();
    let a = triad_file(dir.path(), "a.frs", &[0.0], DAY1, 1.0);
    let mut rdb = Extractor::new();
    rdb.add_file(&a).unwrap();

    let entry = rdb.find("Triad", 3, &["Position matrix"]).unwrap();
    let mut small = [0.0; 4];
    assert_eq!(rdb.get_single_time_step_data(entry, &mut small), 4);
    let mut large = [0.0; 16];
    assert_eq!(rdb.get_single_time_step_data(entry, &mut large), 12);
}

#[test]
fn test_exact_match_prefers_latest_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = triad_file(dir.path(), "a.frs", &[0.0, 1.0, 2.0], DAY1, 100.0);
    let b = triad_file(dir.path(), "b.frs", &[0.0, 1.0, 2.0], DAY2, 200.0);

    // Add order must not matter
    for files in [[&a, &b], [&b, &a]] {
        let mut rdb = Extractor::new();
        assert!(rdb.add_files(files));
        let entry = rdb.find("Triad", 3, &["Position matrix"]).unwrap();
        rdb.position(1.0);
        assert_eq!(read_x(&rdb, entry), Some(triad_x(200.0, 1.0)));
    }
}

#[test]
fn test_restart_file_takes_over_after_its_start() {
    let dir = tempfile::tempdir().unwrap();
    let a = triad_file(dir.path(), "run.frs", &[0.0, 1.0, 2.0], DAY1, 100.0);
    let b = triad_file(dir.path(), "restart.frs", &[1.5, 2.5], DAY2, 200.0);

    let mut rdb = Extractor::new();
    assert!(rdb.add_files([&a, &b]));
    let entry = rdb.find("Triad", 3, &["Position matrix"]).unwrap();

    assert_eq!(rdb.position(1.0), Some(1.0));
    assert_eq!(read_x(&rdb, entry), Some(triad_x(100.0, 1.0)));

    assert_eq!(rdb.position(2.0), Some(2.0));
    assert_eq!(read_x(&rdb, entry), Some(triad_x(100.0, 2.0)));

    assert_eq!(rdb.position(2.5), Some(2.5));
    assert_eq!(read_x(&rdb, entry), Some(triad_x(200.0, 2.5)));

    // Between keys the closest latched key wins
    assert_eq!(rdb.position(1.6), Some(1.5));
    assert_eq!(read_x(&rdb, entry), Some(triad_x(200.0, 1.5)));
}

#[test]
fn test_position_snaps_to_nearest_key() {
    let dir = tempfile::tempdir().unwrap();
    let a = triad_file(dir.path(), "a.frs", &[0.0, 1.0, 2.0], DAY1, 0.0);
    let mut rdb = Extractor::new();
    rdb.add_file(&a).unwrap();

    assert_eq!(rdb.position(1.4), Some(1.0));
    assert_eq!(rdb.position_next_higher(1.4), Some(2.0));
    assert_eq!(rdb.position(-3.0), Some(0.0));
    assert_eq!(rdb.position(7.0), Some(2.0));
    assert_eq!(rdb.current_time(), Some(2.0));
    assert_eq!((rdb.first_time(), rdb.last_time()), (Some(0.0), Some(2.0)));
}

#[test]
fn test_increment_stops_at_shortest_file() {
    let dir = tempfile::tempdir().unwrap();
    let a = triad_file(dir.path(), "a.frs", &[0.0, 1.0, 2.0], DAY1, 100.0);
    let b = triad_file(dir.path(), "b.frs", &[0.0, 1.0], DAY2, 200.0);

    let mut rdb = Extractor::new();
    assert!(rdb.add_files([&a, &b]));
    assert_eq!(rdb.reset_positioning(), Some(0.0));

    assert!(rdb.increment());
    assert_eq!(rdb.current_time(), Some(1.0));
    let keys = current_keys(&rdb);
    assert_eq!(keys, [Some(1.0), Some(1.0)]);

    assert!(!rdb.increment());
    assert_eq!(rdb.current_time(), Some(1.0));
    assert_eq!(current_keys(&rdb), keys);
}

#[test]
fn test_step_through_staggered_keys() {
    let dir = tempfile::tempdir().unwrap();
    let a = triad_file(dir.path(), "a.frs", &[0.0, 2.0], DAY1, 100.0);
    let b = triad_file(dir.path(), "b.frs", &[1.0, 3.0], DAY2, 200.0);

    let mut rdb = Extractor::new();
    assert!(rdb.add_files([&a, &b]));
    assert_eq!(rdb.valid_keys(), [0.0, 1.0, 2.0, 3.0]);

    let entry = rdb.find("Triad", 3, &["Position matrix"]).unwrap();
    rdb.reset_positioning();
    let mut seen = vec![(rdb.current_time(), read_x(&rdb, entry))];
    while rdb.step_to_next_time() {
        seen.push((rdb.current_time(), read_x(&rdb, entry)));
    }
    assert_eq!(
        seen,
        [
            (Some(0.0), Some(100.0)),
            (Some(1.0), Some(201.0)),
            (Some(2.0), Some(102.0)),
            (Some(3.0), Some(203.0)),
        ]
    );
}

#[test]
fn test_read_operations() {
    let dir = tempfile::tempdir().unwrap();
    let w = FrsWriter::new("fedem_solver")
        .variable(TIME_VAR)
        .variable(r#"<2;"Time step number";;INT;32;NUMBER;;>"#)
        .variable(r#"<3;"Position matrix";"";FLOAT;64;TMAT34;(12);>"#)
        .variable("<4;Stress;Pa;FLOAT;32;TENSOR3;(6);>")
        .variable("<5;Spin;;FLOAT;64;QUAT;(4);>")
        .datablock("<1>")
        .datablock("<2>")
        .datablock(r#"{Beam;7;1;"Beam 1";<3><4><5>}"#);
    let path = write_steps(&dir.path().join("beam.frs"), w, &[0.0, 0.5], |step, t| {
        step.i32((t * 2.0) as i32 + 1);
        step.f64s(&[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, t, 2.0, 3.0]);
        step.f32s(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        step.f64s(&[0.0; 4]);
    });

    let mut rdb = Extractor::new();
    rdb.add_file(&path).unwrap();
    rdb.position(0.5);
    assert_eq!(rdb.current_step_number(), Some(2));

    let matrix = rdb.find("Beam", 7, &["Position matrix"]).unwrap();
    let op = rdb.read_operation(matrix).unwrap();
    assert_eq!(op.entry(), matrix);
    assert!(op.has_data(&rdb));
    let Some(Value::Mat34(m)) = op.evaluate(&rdb) else { panic!("expected a 3x4 matrix") };
    assert_eq!(m.translation.to_array(), [0.5, 2.0, 3.0]);

    let stress = rdb.find("Beam", 7, &["Stress"]).unwrap();
    let Some(Value::Tensor3(t)) = rdb.read_operation(stress).unwrap().evaluate(&rdb) else {
        panic!("expected a tensor")
    };
    assert_eq!(t.0, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);

    let spin = rdb.find("Beam", 7, &["Spin"]).unwrap();
    assert!(matches!(rdb.read_operation(spin), Err(Error::UnknownReadOp { size: 64, .. })));

    let beam = rdb.object_group(7).unwrap();
    assert!(matches!(rdb.read_operation(beam), Err(Error::NotAVariable(_))));
}

#[test]
fn test_big_endian_files_decode() {
    let dir = tempfile::tempdir().unwrap();
    let path = spring_force_file(dir.path(), "be.frs", &[0.0, 0.25], Endian::Big);

    for use_mmap in [true, false] {
        let config = ExtractorConfig { use_mmap, ..Default::default() };
        let mut rdb = Extractor::with_config(config);
        rdb.add_file(&path).unwrap();
        assert_eq!(rdb.valid_keys(), [0.0, 0.25]);

        rdb.position(0.25);
        let force = rdb.find("Spring", 5, &["Force"]).unwrap();
        let Some(Value::Vec3(v)) = rdb.read_operation(force).unwrap().evaluate(&rdb) else {
            panic!("expected a vector")
        };
        assert_eq!(v.to_array(), [2.5, 0.0, -1.0]);
    }
}

#[test]
fn test_pre_read_gives_same_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = triad_file(dir.path(), "a.frs", &[0.0, 1.0, 2.0], DAY1, 10.0);

    let mut rdb = Extractor::new();
    rdb.add_file(&path).unwrap();
    let entry = rdb.find("Triad", 3, &["Position matrix"]).unwrap();

    let mut plain = Vec::new();
    rdb.reset_positioning();
    loop {
        plain.push(read_x(&rdb, entry));
        if !rdb.increment() {
            break;
        }
    }

    rdb.set_pre_read(true);
    assert!(rdb.containers().all(|(_, c)| c.is_pre_reading()));
    let mut cached = Vec::new();
    rdb.reset_positioning();
    loop {
        cached.push(read_x(&rdb, entry));
        if !rdb.increment() {
            break;
        }
    }
    assert_eq!(plain, cached);
    assert_eq!(plain, [Some(10.0), Some(11.0), Some(12.0)]);

    rdb.disable_pre_read();
    assert!(rdb.containers().all(|(_, c)| !c.is_pre_reading()));
    assert_eq!(rdb.enable_pre_read([&path]), 1);
    assert!(rdb.containers().all(|(_, c)| c.is_pre_reading()));
}

#[test]
fn test_refresh_picks_up_appended_steps() {
    let dir = tempfile::tempdir().unwrap();
    let path = spring_force_file(dir.path(), "live.frs", &[0.0], Endian::native());

    let mut rdb = Extractor::new();
    rdb.add_file(&path).unwrap();
    assert_eq!(rdb.last_time(), Some(0.0));
    assert_eq!(rdb.refresh().unwrap(), 0);

    let steps: Vec<StepBuffer> = [1.0, 2.0]
        .iter()
        .map(|&t| {
            let mut step = StepBuffer::new(Endian::native());
            step.f64(t).f64s(&[10.0 * t, 0.0, -1.0]);
            step
        })
        .collect();
    append_steps(&path, &steps).unwrap();

    assert_eq!(rdb.refresh().unwrap(), 2);
    assert_eq!(rdb.last_time(), Some(2.0));
    assert_eq!(rdb.position(2.0), Some(2.0));
    let force = rdb.find("Spring", 5, &["Force"]).unwrap();
    let mut v = [0.0; 3];
    assert_eq!(rdb.get_single_time_step_data(force, &mut v), 3);
    assert_eq!(v[0], 20.0);
}

#[test]
fn test_file_without_time_has_no_steps() {
    let dir = tempfile::tempdir().unwrap();
    let w = FrsWriter::new("fedem_modes")
        .variable("<1;Frequency;Hz;FLOAT;64;SCALAR;;>")
        .datablock("<1>");
    let path = write_steps(&dir.path().join("modes.frs"), w, &[3.5], |_, _| {});

    let mut rdb = Extractor::new();
    let id = rdb.add_file(&path).unwrap();
    let c = rdb.container(id).unwrap();
    assert!(c.is_modes_file());
    assert_eq!(c.step_count(), 1);
    assert!(!c.has_data());
    assert_eq!(rdb.current_time(), None);
    assert!(!rdb.increment());
}
