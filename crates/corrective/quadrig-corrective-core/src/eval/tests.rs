use approx::assert_relative_eq;
use quadrig_api_core::{Channel, RigPath, Transform, Value};

use crate::calibration::PoseDelta;
use crate::eval::{evaluate_all, NetworkRuntime};
use crate::rbf::SolverConfig;
use crate::types::{Breakpoint, InputConnection, NetworkSpec, NodeKind, NodeSpec};

fn path(s: &str) -> RigPath {
    RigPath::parse(s).unwrap()
}

fn driver_node(id: &str, driver: &str, channel: Channel) -> NodeSpec {
    NodeSpec::new(
        id,
        NodeKind::DriverChannel {
            path: path(driver),
            channel,
            sign: 1.0,
        },
    )
}

fn rising_ramp(id: &str, lo: f32, hi: f32, from: &str) -> NodeSpec {
    let mut node = NodeSpec::new(
        id,
        NodeKind::RampWeight {
            lo,
            hi,
            breakpoints: vec![Breakpoint::new(0.0, 0.0), Breakpoint::new(1.0, 1.0)],
            extrapolate: false,
        },
    );
    node.inputs.insert("in".into(), InputConnection::new(from, "out"));
    node
}

fn gain(id: &str, delta: PoseDelta, from: &str) -> NodeSpec {
    let mut node = NodeSpec::new(id, NodeKind::PoseGain { delta });
    node.inputs
        .insert("weight".into(), InputConnection::new(from, "weight"));
    node
}

fn stage_rotate_z(runtime: &mut NetworkRuntime, driver: &str, degrees: f32) {
    runtime.set_input(
        path(driver).with_field(Channel::RotateZ.name()),
        Value::f(degrees),
    );
}

fn weight_at(net: &NetworkSpec, node_id: &str, degrees: f32) -> f32 {
    let mut runtime = NetworkRuntime::new();
    stage_rotate_z(&mut runtime, "l/knee", degrees);
    evaluate_all(net, &mut runtime).unwrap();
    runtime.output(node_id, "weight").unwrap().as_float()
}

/// One pose over [0, 90]: half the domain gives half the weight, and the
/// gain scales the calibrated delta by it.
#[test]
fn single_pose_ramps_and_scales_the_delta() {
    let mut net = NetworkSpec::new();
    net.upsert(driver_node("d", "l/knee", Channel::RotateZ));
    net.upsert(rising_ramp("ramp01", 0.0, 90.0, "d"));
    net.upsert(gain("gain01", PoseDelta::translate([2.0, 0.0, 0.0]), "ramp01"));

    let mut runtime = NetworkRuntime::new();
    stage_rotate_z(&mut runtime, "l/knee", 45.0);
    evaluate_all(&net, &mut runtime).unwrap();

    assert_relative_eq!(runtime.output("ramp01", "weight").unwrap().as_float(), 0.5);
    assert_eq!(
        runtime.output("gain01", "translate").unwrap().as_vec3(),
        [1.0, 0.0, 0.0]
    );
    // Neutral delta families stay neutral regardless of weight.
    assert_eq!(
        runtime.output("gain01", "scale").unwrap().as_vec3(),
        [1.0, 1.0, 1.0]
    );
}

/// Two chained poses, [0, 60] and [60, 90]. Appending the second patches
/// the first into a rise-then-fall ramp over [0, 90] peaking where the
/// successor starts, so weights cross-fade and always sum to one past the
/// handover point.
#[test]
fn chained_ramps_cross_fade_to_a_partition_of_unity() {
    let mut net = NetworkSpec::new();
    net.upsert(driver_node("d", "l/knee", Channel::RotateZ));
    // Patched predecessor: extended domain [0, 90], peak at 60/90.
    let mut ramp1 = NodeSpec::new(
        "ramp01",
        NodeKind::RampWeight {
            lo: 0.0,
            hi: 90.0,
            breakpoints: vec![
                Breakpoint::new(0.0, 0.0),
                Breakpoint::new(60.0 / 90.0, 1.0),
                Breakpoint::new(1.0, 0.0),
            ],
            extrapolate: false,
        },
    );
    ramp1
        .inputs
        .insert("in".into(), InputConnection::new("d", "out"));
    net.upsert(ramp1);
    net.upsert(rising_ramp("ramp02", 60.0, 90.0, "d"));

    // At the handover the first pose is fully on, the second fully off.
    assert_relative_eq!(weight_at(&net, "ramp01", 60.0), 1.0, epsilon = 1e-5);
    assert_relative_eq!(weight_at(&net, "ramp02", 60.0), 0.0, epsilon = 1e-5);

    // Mid cross-fade they split evenly; at the end the roles have swapped.
    assert_relative_eq!(weight_at(&net, "ramp01", 75.0), 0.5, epsilon = 1e-5);
    assert_relative_eq!(weight_at(&net, "ramp02", 75.0), 0.5, epsilon = 1e-5);
    assert_relative_eq!(weight_at(&net, "ramp01", 90.0), 0.0, epsilon = 1e-5);
    assert_relative_eq!(weight_at(&net, "ramp02", 90.0), 1.0, epsilon = 1e-5);

    // Sum stays exactly one across the shared span and never exceeds it.
    for deg in [60.0f32, 65.0, 72.5, 80.0, 90.0] {
        let sum = weight_at(&net, "ramp01", deg) + weight_at(&net, "ramp02", deg);
        assert_relative_eq!(sum, 1.0, epsilon = 1e-5);
    }
    for deg in [-20.0f32, 0.0, 30.0, 100.0] {
        let sum = weight_at(&net, "ramp01", deg) + weight_at(&net, "ramp02", deg);
        assert!(sum <= 1.0 + 1e-5, "sum {sum} at {deg}");
    }
}

/// A zero-span domain is a step at the threshold, not a divide-by-zero.
#[test]
fn degenerate_domain_steps_at_the_threshold() {
    let mut net = NetworkSpec::new();
    net.upsert(driver_node("d", "l/knee", Channel::RotateZ));
    net.upsert(rising_ramp("ramp01", 45.0, 45.0, "d"));

    assert_relative_eq!(weight_at(&net, "ramp01", 44.9), 0.0);
    assert_relative_eq!(weight_at(&net, "ramp01", 45.0), 1.0);
    assert_relative_eq!(weight_at(&net, "ramp01", 60.0), 1.0);
}

/// Below the domain the corrective is fully neutral: zero translate and
/// rotate sums, unit scale through the link chain.
#[test]
fn zero_weight_leaves_the_target_neutral() {
    let target = path("l/kneePush01");
    let mut net = NetworkSpec::new();
    net.upsert(driver_node("d", "l/knee", Channel::RotateZ));
    net.upsert(rising_ramp("ramp01", 30.0, 90.0, "d"));
    net.upsert(gain(
        "gain01",
        PoseDelta {
            translate: [1.0, 2.0, 3.0],
            rotate: [10.0, 0.0, 0.0],
            scale: [1.5, 1.0, 1.0],
        },
        "ramp01",
    ));

    let mut sum_t = NodeSpec::new("sumT", NodeKind::ChannelSum);
    sum_t
        .inputs
        .insert("i01".into(), InputConnection::new("gain01", "translate"));
    net.upsert(sum_t);
    let mut sum_r = NodeSpec::new("sumR", NodeKind::ChannelSum);
    sum_r
        .inputs
        .insert("i01".into(), InputConnection::new("gain01", "rotate"));
    net.upsert(sum_r);

    let mut out = NodeSpec::new("out", NodeKind::ChannelsOutput { path: target.clone() });
    out.inputs
        .insert("translate".into(), InputConnection::new("sumT", "out"));
    out.inputs
        .insert("rotate".into(), InputConnection::new("sumR", "out"));
    out.inputs
        .insert("scale".into(), InputConnection::new("gain01", "scale"));
    net.upsert(out);

    let mut runtime = NetworkRuntime::new();
    stage_rotate_z(&mut runtime, "l/knee", 0.0);
    evaluate_all(&net, &mut runtime).unwrap();

    assert_eq!(
        runtime.writes.find(&target.with_field("translate")),
        Some(&Value::vec3(0.0, 0.0, 0.0))
    );
    assert_eq!(
        runtime.writes.find(&target.with_field("rotate")),
        Some(&Value::vec3(0.0, 0.0, 0.0))
    );
    assert_eq!(
        runtime.writes.find(&target.with_field("scale")),
        Some(&Value::vec3(1.0, 1.0, 1.0))
    );
}

/// Scale links multiply: two poses at full weight compound their factors.
#[test]
fn scale_links_compound_multiplicatively() {
    let mut net = NetworkSpec::new();
    net.upsert(driver_node("d", "l/knee", Channel::RotateZ));
    net.upsert(rising_ramp("ramp01", 0.0, 10.0, "d"));
    net.upsert(rising_ramp("ramp02", 0.0, 10.0, "d"));
    net.upsert(gain(
        "gain01",
        PoseDelta {
            scale: [1.5, 1.0, 1.0],
            ..PoseDelta::neutral()
        },
        "ramp01",
    ));
    net.upsert(gain(
        "gain02",
        PoseDelta {
            scale: [2.0, 1.0, 1.0],
            ..PoseDelta::neutral()
        },
        "ramp02",
    ));
    let mut link = NodeSpec::new("link02", NodeKind::ScaleLink);
    link.inputs
        .insert("a".into(), InputConnection::new("gain01", "scale"));
    link.inputs
        .insert("b".into(), InputConnection::new("gain02", "scale"));
    net.upsert(link);

    let mut runtime = NetworkRuntime::new();
    stage_rotate_z(&mut runtime, "l/knee", 10.0);
    evaluate_all(&net, &mut runtime).unwrap();

    assert_eq!(
        runtime.output("link02", "out").unwrap().as_vec3(),
        [3.0, 1.0, 1.0]
    );
}

/// A mirrored driver sign flips the scalar before the ramp sees it.
#[test]
fn driver_sign_mirrors_the_scalar() {
    let mut net = NetworkSpec::new();
    net.upsert(NodeSpec::new(
        "d",
        NodeKind::DriverChannel {
            path: path("r/knee"),
            channel: Channel::RotateZ,
            sign: -1.0,
        },
    ));
    net.upsert(rising_ramp("ramp01", 0.0, 90.0, "d"));

    let mut runtime = NetworkRuntime::new();
    stage_rotate_z(&mut runtime, "r/knee", -45.0);
    evaluate_all(&net, &mut runtime).unwrap();
    assert_relative_eq!(runtime.output("ramp01", "weight").unwrap().as_float(), 0.5);
}

/// Matrix-distance path: staged driver frame at a calibrated pose returns
/// a one-hot weight vector through the network.
#[test]
fn pose_weights_are_exact_at_calibration() {
    let poses = vec![
        Transform::identity(),
        Transform::from_translation([0.0, 2.0, 0.0]),
    ];
    let mut net = NetworkSpec::new();
    net.upsert(NodeSpec::new(
        "frame",
        NodeKind::DriverFrame { path: path("l/knee") },
    ));
    let mut weights = NodeSpec::new(
        "weights",
        NodeKind::PoseWeights {
            poses: poses.clone(),
            solver: SolverConfig::default(),
        },
    );
    weights
        .inputs
        .insert("in".into(), InputConnection::new("frame", "out"));
    net.upsert(weights);

    let mut runtime = NetworkRuntime::new();
    runtime.set_input(path("l/knee"), Value::Transform(poses[1]));
    evaluate_all(&net, &mut runtime).unwrap();

    let w1 = runtime.output("weights", "w01").unwrap().as_float();
    let w2 = runtime.output("weights", "w02").unwrap().as_float();
    assert_relative_eq!(w1, 0.0, epsilon = 1e-4);
    assert_relative_eq!(w2, 1.0, epsilon = 1e-4);
}

/// An unstaged driver reads as neutral, so the whole network idles.
#[test]
fn missing_inputs_read_as_neutral() {
    let mut net = NetworkSpec::new();
    net.upsert(driver_node("d", "l/knee", Channel::RotateZ));
    net.upsert(rising_ramp("ramp01", 30.0, 90.0, "d"));

    let mut runtime = NetworkRuntime::new();
    evaluate_all(&net, &mut runtime).unwrap();
    assert_relative_eq!(runtime.output("ramp01", "weight").unwrap().as_float(), 0.0);
}
