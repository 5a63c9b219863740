//! Integration tests driving `execute()` against a loopback image file.
//! Direct I/O (`O_DIRECT`) isn't supported on every filesystem a CI runner
//! might place a temp dir on (tmpfs, in particular); tests skip rather than
//! fail when `Device::open` can't get direct I/O semantics there.

use flashbench::op::{Aggregate, OpNode};
use flashbench::{CoreError, Device, ExecContext, execute};

const IMAGE_SIZE: u64 = 4 * 1024 * 1024;

fn open_test_device() -> Option<Device> {
    let file = tempfile::NamedTempFile::new().expect("create temp file");
    file.as_file().set_len(IMAGE_SIZE).expect("set temp file length");
    let path = file.into_temp_path();
    // Keep the path alive for the Device's lifetime by leaking it; the OS
    // reclaims the file on process exit either way.
    let path_str = path.to_str().expect("utf8 temp path").to_string();
    std::mem::forget(path);
    match Device::open(&path_str) {
        Ok(dev) => Some(dev),
        Err(e) => {
            eprintln!("skipping: direct I/O unavailable on this filesystem: {e}");
            None
        }
    }
}

#[test]
fn sequence_with_print_executes_and_folds_to_scalar() {
    let Some(mut dev) = open_test_device() else { return };
    let mut program = vec![
        OpNode::sequence(1),
        OpNode::print("hi\n"),
        OpNode::end(),
    ];
    let ctx = ExecContext { offset: 0, max: IMAGE_SIZE, length: 0 };
    execute(&mut program, &mut dev, ctx).expect("sequence should run cleanly");
}

#[test]
fn reduce_min_over_off_lin_reads() {
    let Some(mut dev) = open_test_device() else { return };
    let mut program = vec![
        OpNode::reduce(Aggregate::Min),
        OpNode::off_lin(8, 4096),
        OpNode::read(),
    ];
    let ctx = ExecContext { offset: 0, max: IMAGE_SIZE, length: 512 };
    execute(&mut program, &mut dev, ctx).expect("reduce should run cleanly");
    match program[0].consume() {
        flashbench::Value::Ns(n) => assert!(n >= 0),
        other => panic!("expected a scalar Ns, got {other:?}"),
    }
}

#[test]
fn len_pow2_produces_four_ascending_formatted_lengths() {
    let Some(mut dev) = open_test_device() else { return };
    let mut program = vec![
        OpNode::len_pow2(4, 4096),
        OpNode::sequence(1),
        OpNode::format(),
        OpNode::length(),
        OpNode::end(),
    ];
    let ctx = ExecContext { offset: 0, max: IMAGE_SIZE, length: 1 };
    execute(&mut program, &mut dev, ctx).expect("len_pow2 should run cleanly");
    let result = program[0].consume();
    let flashbench::Value::Array { items, rows, cols } = result else {
        panic!("expected an array result");
    };
    assert_eq!(rows, 4);
    assert_eq!(cols, 0);
    // fixed_width_7's dynamic decimal precision (see DESIGN.md) produces
    // "4.00KiB" rather than spec.md's literal "4KiB" example; both satisfy
    // the 7-character contract, this is what the implemented formatter emits.
    let expected = ["4.00KiB", "8.00KiB", "16.0KiB", "32.0KiB"];
    for (item, want) in items.iter().zip(expected) {
        match item {
            flashbench::Value::Str(bytes) => {
                assert_eq!(std::str::from_utf8(bytes).unwrap(), want);
            }
            other => panic!("expected a formatted string, got {other:?}"),
        }
    }
}

#[test]
fn off_rand_visits_every_index_in_range_once() {
    let Some(mut dev) = open_test_device() else { return };
    // OFFSET (not LENGTH) is the leaf here: off_rand only varies the
    // inherited offset, so this is what exposes the distinct draws.
    let mut program = vec![OpNode::off_rand(256, 4096), OpNode::offset()];
    let ctx = ExecContext { offset: 0, max: 1024 * 1024, length: 1 };
    execute(&mut program, &mut dev, ctx).expect("off_rand should run cleanly");
    let flashbench::Value::Array { items, rows, .. } = program[0].consume() else {
        panic!("expected an array result");
    };
    // A width-8 LFSR cycles through 255 nonzero states (spec §4.2: "visits
    // every non-zero value exactly once") and never emits 0 itself, so
    // num=256 (the full 8-bit range) yields 255 draws, not 256.
    assert_eq!(rows, 255);
    let seen: std::collections::HashSet<_> = items
        .iter()
        .map(|v| match v {
            flashbench::Value::Bytes(n) => *n,
            other => panic!("expected Bytes, got {other:?}"),
        })
        .collect();
    assert_eq!(seen.len(), 255);
}

#[test]
fn bps_over_off_lin_writes_yields_256_entry_throughput_array() {
    let Some(mut dev) = open_test_device() else { return };
    let mut program = vec![
        OpNode::bps(),
        OpNode::off_lin(0, -1),
        OpNode::write_zero(),
    ];
    let ctx = ExecContext { offset: 0, max: 1024 * 1024, length: 4096 };
    execute(&mut program, &mut dev, ctx).expect("bps sweep should run cleanly");
    let flashbench::Value::Array { items, rows, cols } = program[0].consume() else {
        panic!("expected an array result");
    };
    assert_eq!(rows, 256);
    assert_eq!(cols, 0);
    for item in &items {
        assert!(matches!(item, flashbench::Value::Bps(_)));
    }
}

#[test]
fn mismatched_array_widths_fail_shape_mismatch() {
    let Some(mut dev) = open_test_device() else { return };
    let mut program = vec![
        OpNode::sequence(2),
        OpNode::off_lin(8, 4096),
        OpNode::read(),
        OpNode::off_lin(4, 4096),
        OpNode::read(),
        OpNode::end(),
    ];
    let ctx = ExecContext { offset: 0, max: IMAGE_SIZE, length: 512 };
    let err = execute(&mut program, &mut dev, ctx).unwrap_err();
    assert!(matches!(err, CoreError::ShapeMismatch));
}

#[test]
fn bad_arity_is_rejected_before_any_io() {
    let Some(mut dev) = open_test_device() else { return };
    // OFF_FIXED's mask is VAL only; attaching a `num` violates it.
    let mut program = vec![flashbench::OpNode {
        opcode: flashbench::Opcode::OffFixed,
        num: Some(1),
        val: Some(0),
        string: None,
        agg: None,
        result: flashbench::Value::None,
        size_x: 0,
        size_y: 0,
    }];
    let ctx = ExecContext { offset: 0, max: IMAGE_SIZE, length: 512 };
    let err = execute(&mut program, &mut dev, ctx).unwrap_err();
    assert!(matches!(err, CoreError::BadArity(_)));
}
