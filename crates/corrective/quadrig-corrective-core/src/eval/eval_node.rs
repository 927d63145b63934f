//! Per-node evaluation.

use quadrig_api_core::{Value, WriteOp};

use crate::error::CorrectiveError;
use crate::rbf::state_key;
use crate::types::{Breakpoint, NodeKind, NodeSpec};

use super::network_runtime::NetworkRuntime;

pub(super) fn eval_node(
    node: &NodeSpec,
    runtime: &mut NetworkRuntime,
) -> Result<(), CorrectiveError> {
    match &node.kind {
        NodeKind::DriverChannel {
            path,
            channel,
            sign,
        } => {
            let staged = path.with_field(channel.name());
            let value = runtime
                .input(&staged)
                .map(Value::as_float)
                .unwrap_or_else(|| channel.neutral());
            runtime.set_output(&node.id, "out", Value::Float(sign * value));
        }

        NodeKind::DriverFrame { path } => {
            let value = runtime
                .input(path)
                .map(Value::as_transform)
                .unwrap_or_default();
            runtime.set_output(&node.id, "out", Value::Transform(value));
        }

        NodeKind::RampWeight {
            lo,
            hi,
            breakpoints,
            extrapolate,
        } => {
            let x = input_float(runtime, node, "in", 0.0);
            let weight = ramp_weight(x, *lo, *hi, breakpoints, *extrapolate);
            runtime.set_output(&node.id, "weight", Value::Float(weight));
        }

        NodeKind::PoseWeights { poses, solver } => {
            let current = input_transform(runtime, node, "in");
            let hash = state_key(poses, solver);
            let weights = runtime
                .rbf_state(&node.id, hash, poses, solver)?
                .weights(&current, solver);
            for (i, w) in weights.iter().enumerate() {
                runtime.set_output(&node.id, format!("w{:02}", i + 1), Value::Float(*w));
            }
        }

        NodeKind::PoseGain { delta } => {
            let w = input_float(runtime, node, "weight", 0.0);
            let t = delta.translate.map(|c| w * c);
            let r = delta.rotate.map(|c| w * c);
            let s = delta.scale.map(|c| 1.0 + w * (c - 1.0));
            runtime.set_output(&node.id, "translate", Value::Vec3(t));
            runtime.set_output(&node.id, "rotate", Value::Vec3(r));
            runtime.set_output(&node.id, "scale", Value::Vec3(s));
        }

        NodeKind::ChannelSum => {
            let mut total = [0.0f32; 3];
            for key in sorted_input_keys(node) {
                let v = input_vec3(runtime, node, &key, [0.0; 3]);
                for (acc, c) in total.iter_mut().zip(v) {
                    *acc += c;
                }
            }
            runtime.set_output(&node.id, "out", Value::Vec3(total));
        }

        NodeKind::ScaleLink => {
            let a = input_vec3(runtime, node, "a", [1.0; 3]);
            let b = input_vec3(runtime, node, "b", [1.0; 3]);
            let product = [a[0] * b[0], a[1] * b[1], a[2] * b[2]];
            runtime.set_output(&node.id, "out", Value::Vec3(product));
        }

        NodeKind::ChannelsOutput { path } => {
            let translate = input_vec3(runtime, node, "translate", [0.0; 3]);
            let rotate = input_vec3(runtime, node, "rotate", [0.0; 3]);
            let scale = input_vec3(runtime, node, "scale", [1.0; 3]);
            runtime.writes.push(WriteOp {
                path: path.with_field("translate"),
                value: Value::Vec3(translate),
            });
            runtime.writes.push(WriteOp {
                path: path.with_field("rotate"),
                value: Value::Vec3(rotate),
            });
            runtime.writes.push(WriteOp {
                path: path.with_field("scale"),
                value: Value::Vec3(scale),
            });
        }

        NodeKind::WeightOutput { path } => {
            let w = input_float(runtime, node, "weight", 0.0);
            runtime.writes.push(WriteOp {
                path: path.clone(),
                value: Value::Float(w),
            });
        }
    }
    Ok(())
}

/// Piecewise-linear ramp over the normalized domain.
///
/// `x` maps to `(x - lo) / (hi - lo)`; a degenerate domain collapses to a
/// step at `hi`. Outside 0..1 the ends are clamped unless `extrapolate`
/// extends the terminal segments.
fn ramp_weight(x: f32, lo: f32, hi: f32, breakpoints: &[Breakpoint], extrapolate: bool) -> f32 {
    let span = hi - lo;
    let t = if span.abs() <= f32::EPSILON {
        if x >= hi {
            1.0
        } else {
            0.0
        }
    } else {
        (x - lo) / span
    };
    sample_breakpoints(breakpoints, t, extrapolate)
}

fn sample_breakpoints(breakpoints: &[Breakpoint], t: f32, extrapolate: bool) -> f32 {
    let mut bps: Vec<Breakpoint> = breakpoints.to_vec();
    bps.sort_by(|a, b| a.position.total_cmp(&b.position));
    match bps.as_slice() {
        [] => 0.0,
        [only] => only.value,
        [first, .., last] => {
            if t <= first.position {
                return if extrapolate {
                    extend(&bps[0], &bps[1], t)
                } else {
                    first.value
                };
            }
            if t >= last.position {
                return if extrapolate {
                    extend(&bps[bps.len() - 2], &bps[bps.len() - 1], t)
                } else {
                    last.value
                };
            }
            for pair in bps.windows(2) {
                let (a, b) = (&pair[0], &pair[1]);
                if t <= b.position {
                    return extend(a, b, t);
                }
            }
            last.value
        }
    }
}

fn extend(a: &Breakpoint, b: &Breakpoint, t: f32) -> f32 {
    let span = b.position - a.position;
    if span.abs() <= f32::EPSILON {
        return b.value;
    }
    a.value + (b.value - a.value) * (t - a.position) / span
}

fn sorted_input_keys(node: &NodeSpec) -> Vec<String> {
    let mut keys: Vec<String> = node.inputs.keys().cloned().collect();
    keys.sort();
    keys
}

fn input_value<'r>(
    runtime: &'r NetworkRuntime,
    node: &NodeSpec,
    key: &str,
) -> Option<&'r Value> {
    let conn = node.inputs.get(key)?;
    runtime.output(&conn.node_id, &conn.output_key)
}

fn input_float(runtime: &NetworkRuntime, node: &NodeSpec, key: &str, default: f32) -> f32 {
    input_value(runtime, node, key)
        .map(Value::as_float)
        .unwrap_or(default)
}

fn input_vec3(runtime: &NetworkRuntime, node: &NodeSpec, key: &str, default: [f32; 3]) -> [f32; 3] {
    input_value(runtime, node, key)
        .map(Value::as_vec3)
        .unwrap_or(default)
}

fn input_transform(
    runtime: &NetworkRuntime,
    node: &NodeSpec,
    key: &str,
) -> quadrig_api_core::Transform {
    input_value(runtime, node, key)
        .map(Value::as_transform)
        .unwrap_or_default()
}
