//! Interpreter core: descent over the flat pre-order operator array with
//! inherited `(offset, max, length)` context, result propagation, and
//! aggregation (spec §4.4).

use crate::device::{Device, WriteBuf};
use crate::error::CoreError;
use crate::lfsr;
use crate::op::{Opcode, OpNode, check_arity};
use crate::value::{self, Value};

/// Context inherited on descent: current offset, the span an iterator may
/// spread its children across, and the transfer length atoms use. Never
/// flows back up.
#[derive(Debug, Clone, Copy)]
pub struct ExecContext {
    pub offset: u64,
    pub max: u64,
    pub length: u64,
}

/// Run `program[0]` with the given context; subsequent siblings are reached
/// internally via each handler's returned successor index.
pub fn execute(program: &mut [OpNode], dev: &mut Device, ctx: ExecContext) -> Result<(), CoreError> {
    if program.is_empty() {
        return Err(CoreError::Internal("empty program"));
    }
    call(program, 0, dev, ctx)?;
    Ok(())
}

/// Dispatch the operator at `idx`, returning the index of its successor.
fn call(program: &mut [OpNode], idx: usize, dev: &mut Device, ctx: ExecContext) -> Result<usize, CoreError> {
    let opcode = program[idx].opcode;
    if opcode == Opcode::End {
        return Err(CoreError::Internal("END cannot be dispatched directly"));
    }
    if !check_arity(&program[idx]) {
        return Err(CoreError::BadArity(opcode));
    }
    if !program[idx].result.is_none() {
        return Err(CoreError::Internal("operator re-entered before its result was consumed"));
    }
    if let Some(n) = program[idx].num {
        if n > 0 {
            program[idx].result = Value::Array {
                items: vec![Value::None; n as usize],
                rows: n,
                cols: 0,
            };
        }
    }

    match opcode {
        Opcode::Read => {
            let ns = dev.time_read(ctx.offset, ctx.length as usize)?;
            program[idx].result = Value::Ns(ns);
            Ok(idx + 1)
        }
        Opcode::WriteZero => {
            let ns = dev.time_write(ctx.offset, ctx.length as usize, WriteBuf::Zero)?;
            program[idx].result = Value::Ns(ns);
            Ok(idx + 1)
        }
        Opcode::WriteOne => {
            let ns = dev.time_write(ctx.offset, ctx.length as usize, WriteBuf::One)?;
            program[idx].result = Value::Ns(ns);
            Ok(idx + 1)
        }
        Opcode::WriteRand => {
            let ns = dev.time_write(ctx.offset, ctx.length as usize, WriteBuf::Rand)?;
            program[idx].result = Value::Ns(ns);
            Ok(idx + 1)
        }
        Opcode::Erase => {
            let ns = dev.time_erase(ctx.offset, ctx.length)?;
            program[idx].result = Value::Ns(ns);
            Ok(idx + 1)
        }
        Opcode::Length => {
            program[idx].result = Value::Bytes(ctx.length as i64);
            Ok(idx + 1)
        }
        Opcode::Offset => {
            program[idx].result = Value::Bytes(ctx.offset as i64);
            Ok(idx + 1)
        }

        Opcode::Print => {
            let text = program[idx]
                .string
                .clone()
                .ok_or(CoreError::Internal("PRINT missing its literal"))?;
            print!("{text}");
            program[idx].result = Value::None;
            Ok(idx + 1)
        }
        Opcode::Newline => {
            println!();
            program[idx].result = Value::None;
            Ok(idx + 1)
        }
        Opcode::Format => {
            let next = call(program, idx + 1, dev, ctx)?;
            let child = program[idx + 1].consume();
            program[idx].result = value::format(&child)?;
            Ok(next)
        }
        Opcode::Printf => {
            let next = call(program, idx + 1, dev, ctx)?;
            let child = program[idx + 1].consume();
            print_value(&child);
            program[idx].result = child;
            Ok(next)
        }
        Opcode::Bps => {
            let next = call(program, idx + 1, dev, ctx)?;
            let child = program[idx + 1].consume();
            program[idx].result = value::bytes_per_second(&child, ctx.length)?;
            Ok(next)
        }

        Opcode::OffFixed => {
            let val = program[idx].val.expect("checked by check_arity");
            let child_ctx = ExecContext {
                offset: ctx.offset.wrapping_add(val as u64),
                ..ctx
            };
            let next = call(program, idx + 1, dev, child_ctx)?;
            program[idx].result = program[idx + 1].consume();
            Ok(next)
        }
        Opcode::LenFixed => {
            let val = program[idx].val.expect("checked by check_arity");
            let child_ctx = ExecContext {
                length: val as u64,
                ..ctx
            };
            let next = call(program, idx + 1, dev, child_ctx)?;
            program[idx].result = program[idx + 1].consume();
            Ok(next)
        }

        Opcode::OffLin => {
            let num = program[idx].num.expect("checked by check_arity");
            let val = program[idx].val.expect("checked by check_arity");
            let (count, stride) = if val == -1 {
                if !(ctx.length > 0 && ctx.max >= ctx.length) {
                    return Err(CoreError::EmptyRange);
                }
                let n = ctx.max / ctx.length;
                (n as u32, (ctx.max / n) as i64)
            } else {
                (num, val)
            };
            require_nonzero(count)?;
            // The preallocated array at the top of `call` used the node's
            // literal `num`, which is a don't-care placeholder in the
            // auto-stride case — reallocate to the count actually computed.
            program[idx].result = Value::Array {
                items: vec![Value::None; count as usize],
                rows: count,
                cols: 0,
            };

            let mut next = idx + 1;
            for i in 0..count {
                let child_offset = ctx.offset.wrapping_add((stride.wrapping_mul(i as i64)) as u64);
                let child_ctx = ExecContext { offset: child_offset, ..ctx };
                next = call(program, idx + 1, dev, child_ctx)?;
                aggregate_push_at(program, idx, idx + 1)?;
            }
            finish_aggregate(&mut program[idx], false);
            Ok(next)
        }
        Opcode::OffRand => {
            let num = program[idx].num.expect("checked by check_arity");
            let val = program[idx].val.expect("checked by check_arity");
            let draws = lfsr::draw_permutation(num);
            let count = draws.len() as u32;
            require_nonzero(count)?;
            // Drawn count can run short of `num` if the LFSR cycle closes
            // early; reallocate to the count actually drawn.
            program[idx].result = Value::Array {
                items: vec![Value::None; count as usize],
                rows: count,
                cols: 0,
            };

            let mut next = idx + 1;
            for draw in &draws {
                let child_offset = ctx.offset.wrapping_add(((*draw as i64).wrapping_mul(val)) as u64);
                let child_ctx = ExecContext { offset: child_offset, ..ctx };
                next = call(program, idx + 1, dev, child_ctx)?;
                aggregate_push_at(program, idx, idx + 1)?;
            }
            finish_aggregate(&mut program[idx], false);
            Ok(next)
        }
        Opcode::LenPow2 => {
            let num = program[idx].num.expect("checked by check_arity");
            let val = program[idx].val.expect("checked by check_arity");
            require_nonzero(num)?;

            let mut next = idx + 1;
            for j in 0..num {
                let len_i = if val > 0 {
                    ctx.length.wrapping_mul(val as u64).wrapping_mul(1u64 << j)
                } else {
                    let mag = (-val / 2) as u64;
                    let i = num - j;
                    ctx.length.wrapping_mul(mag).wrapping_mul(1u64 << i)
                };
                let child_ctx = ExecContext { length: len_i, ..ctx };
                next = call(program, idx + 1, dev, child_ctx)?;
                aggregate_push_at(program, idx, idx + 1)?;
            }
            finish_aggregate(&mut program[idx], false);
            Ok(next)
        }
        Opcode::Repeat => {
            let num = program[idx].num.expect("checked by check_arity");
            require_nonzero(num)?;

            let mut next = idx + 1;
            for _ in 0..num {
                next = call(program, idx + 1, dev, ctx)?;
                aggregate_push_at(program, idx, idx + 1)?;
            }
            finish_aggregate(&mut program[idx], false);
            Ok(next)
        }
        Opcode::Sequence => {
            let num = program[idx].num.expect("checked by check_arity");
            let mut cur = idx + 1;
            for _ in 0..num {
                let child_at = cur;
                let next = call(program, child_at, dev, ctx)?;
                aggregate_push_at(program, idx, child_at)?;
                cur = next;
            }
            if program.get(cur).map(|n| n.opcode) != Some(Opcode::End) {
                return Err(CoreError::SyntaxError);
            }
            finish_aggregate(&mut program[idx], true);
            Ok(cur + 1)
        }

        Opcode::Reduce => {
            let agg = program[idx].agg.expect("checked by check_arity");
            let next = call(program, idx + 1, dev, ctx)?;
            let child = program[idx + 1].consume();
            program[idx].result = reduce_value(&child, agg)?;
            Ok(next)
        }
        Opcode::Drop => {
            let next = call(program, idx + 1, dev, ctx)?;
            program[idx + 1].consume();
            program[idx].result = Value::None;
            Ok(next)
        }

        Opcode::End => unreachable!("filtered out above"),
    }
}

fn require_nonzero(count: u32) -> Result<(), CoreError> {
    if count == 0 {
        return Err(CoreError::Internal(
            "an iterator with zero iterations has no way to locate its successor",
        ));
    }
    Ok(())
}

fn reduce_value(v: &Value, agg: crate::op::Aggregate) -> Result<Value, CoreError> {
    match v {
        Value::Array { items, cols, .. } if *cols == 0 => value::reduce_scalar(items, agg),
        Value::Array { items, rows, cols } => {
            let cols = *cols as usize;
            let mut out = Vec::with_capacity(*rows as usize);
            for r in 0..*rows as usize {
                out.push(value::reduce_scalar(&items[r * cols..(r + 1) * cols], agg)?);
            }
            Ok(Value::Array { items: out, rows: *rows, cols: 0 })
        }
        _ => Err(CoreError::TypeMismatch),
    }
}

fn leaf_kind(v: &Value) -> Option<&'static str> {
    match v {
        Value::None => None,
        Value::Ns(_) => Some("ns"),
        Value::Bytes(_) => Some("bytes"),
        Value::Bps(_) => Some("bps"),
        Value::Str(_) => Some("str"),
        Value::Array { items, .. } => items.first().and_then(leaf_kind),
    }
}

/// Move `program[child_idx]`'s result into `program[parent_idx]`'s
/// pre-allocated array at the next free slot. `parent_idx` must precede
/// `child_idx` — true for every call site, since children always sit after
/// their parent in the pre-order array.
fn aggregate_push_at(program: &mut [OpNode], parent_idx: usize, child_idx: usize) -> Result<(), CoreError> {
    let (left, right) = program.split_at_mut(child_idx);
    aggregate_push(&mut left[parent_idx], &mut right[0])
}

/// One *aggregate* call-mode step (spec §4.4): move `child`'s result into
/// `parent`'s working array at slot `parent.size_x`, then advance the
/// cursor. A side-effect-only child (`Value::None` — `PRINT`, `NEWLINE`,
/// `DROP`) contributes nothing and is skipped outright: no slot is claimed
/// and the cursor doesn't move, so a `SEQUENCE` mixing prints with real
/// values still aggregates only the real ones and still folds to a scalar
/// when exactly one was produced. A 1-D array child promotes `parent` to
/// 2-D, caching the row width in `size_y`; conflicting widths, a 2-D child,
/// a scalar arriving after an array (or vice versa), or a kind mismatch
/// against the first-filled slot are all rejected.
fn aggregate_push(parent: &mut OpNode, child: &mut OpNode) -> Result<(), CoreError> {
    let value = child.consume();
    if value.is_none() {
        return Ok(());
    }
    let slot = parent.size_x as usize;

    let Value::Array { items, cols, .. } = &mut parent.result else {
        return Err(CoreError::Internal("aggregate called on a non-array parent"));
    };
    if slot >= items.len() {
        return Err(CoreError::Internal("aggregate slot overflow"));
    }
    let expected = if slot > 0 { leaf_kind(&items[0]) } else { None };
    let established_array = slot > 0 && matches!(items[0], Value::Array { .. });

    match value {
        Value::Array { items: inner, rows: irows, cols: icols } => {
            if icols != 0 {
                return Err(CoreError::ShapeMismatch);
            }
            if slot > 0 && !established_array {
                return Err(CoreError::ShapeMismatch);
            }
            if *cols == 0 {
                *cols = irows;
                parent.size_y = irows;
            } else if *cols != irows {
                return Err(CoreError::ShapeMismatch);
            }
            if slot > 0 && expected != inner.first().and_then(leaf_kind) {
                return Err(CoreError::TypeMismatch);
            }
            items[slot] = Value::Array { items: inner, rows: irows, cols: 0 };
        }
        scalar => {
            if *cols != 0 || established_array {
                return Err(CoreError::ShapeMismatch);
            }
            if slot > 0 && expected != leaf_kind(&scalar) {
                return Err(CoreError::TypeMismatch);
            }
            items[slot] = scalar;
        }
    }

    parent.size_x += 1;
    Ok(())
}

/// Flatten a finished aggregate's working array into row-major order and,
/// for `SEQUENCE` (`fold = true`), collapse a single filled slot down to a
/// bare scalar (spec §4.4 "folds itself into a scalar").
fn finish_aggregate(parent: &mut OpNode, fold: bool) {
    let rows = parent.size_x;
    let cols = parent.size_y;
    let Value::Array { mut items, .. } = std::mem::replace(&mut parent.result, Value::None) else {
        unreachable!("aggregate parent result is always an Array until finished");
    };
    // The working array is sized to the child *count*, but side-effect-only
    // children (skipped above) never claim a slot, so only the first `rows`
    // entries are real; the rest are still the initial `Value::None` filler.
    items.truncate(rows as usize);

    let flat: Vec<Value> = if cols > 0 {
        items
            .into_iter()
            .flat_map(|row| match row {
                Value::Array { items, .. } => items,
                other => vec![other],
            })
            .collect()
    } else {
        items
    };

    parent.result = if fold && rows == 1 {
        flat.into_iter().next().unwrap_or(Value::None)
    } else {
        Value::Array { items: flat, rows, cols }
    };
    parent.size_x = 0;
    parent.size_y = 0;
}

/// `PRINTF`'s rendering: scalars as their integer or string form, 1-D
/// arrays row-space-separated, 2-D arrays row-newline-separated (spec
/// §4.4).
fn print_value(v: &Value) {
    match v {
        Value::None => {}
        Value::Ns(n) | Value::Bytes(n) | Value::Bps(n) => print!("{n}"),
        Value::Str(bytes) => print!("{}", ascii_trimmed(bytes)),
        Value::Array { items, cols, .. } if *cols == 0 => {
            let parts: Vec<String> = items.iter().map(scalar_text).collect();
            print!("{}", parts.join(" "));
        }
        Value::Array { items, rows, cols } => {
            let cols = *cols as usize;
            for r in 0..*rows as usize {
                if r > 0 {
                    println!();
                }
                let row = &items[r * cols..(r + 1) * cols];
                let parts: Vec<String> = row.iter().map(scalar_text).collect();
                print!("{}", parts.join(" "));
            }
        }
    }
}

fn scalar_text(v: &Value) -> String {
    match v {
        Value::Ns(n) | Value::Bytes(n) | Value::Bps(n) => n.to_string(),
        Value::Str(bytes) => ascii_trimmed(bytes),
        _ => String::new(),
    }
}

fn ascii_trimmed(bytes: &[u8; 7]) -> String {
    std::str::from_utf8(bytes)
        .unwrap_or("")
        .trim_end()
        .to_string()
}
