//! End-to-end authoring and evaluation over a small hind-leg rig.

use approx::assert_relative_eq;
use quadrig_api_core::{Axis, Channel, ChannelValues, RigPath, Side, Value};
use quadrig_corrective_core::{
    evaluate_all, CorrectiveNetworkBuilder, MirrorTable, NetworkRuntime, PoseDelta, PushHandle,
    PushJointSpec, SceneGraph, SideRig,
};

fn path(s: &str) -> RigPath {
    RigPath::parse(s).unwrap()
}

fn leg_scene() -> SceneGraph {
    let mut scene = SceneGraph::new();
    for side in ["l", "r"] {
        scene
            .add(path(&format!("{side}/hind/femur")), None, ChannelValues::neutral())
            .unwrap();
        scene
            .add(
                path(&format!("{side}/hind/knee")),
                Some(path(&format!("{side}/hind/femur"))),
                ChannelValues::neutral(),
            )
            .unwrap();
        scene
            .add(
                path(&format!("{side}/hind/shin")),
                Some(path(&format!("{side}/hind/knee"))),
                ChannelValues::neutral(),
            )
            .unwrap();
    }
    scene
}

fn knee_spec() -> PushJointSpec {
    PushJointSpec {
        name: "kneePush".into(),
        region: "hind".into(),
        index: 1,
        offset_axis: Axis::X,
        offset: 1.5,
    }
}

fn side_rig(side: Side) -> SideRig {
    let t = side.token();
    SideRig {
        side,
        driver: path(&format!("{t}/hind/knee")),
        flank_a: path(&format!("{t}/hind/femur")),
        flank_b: path(&format!("{t}/hind/shin")),
    }
}

fn stage(runtime: &mut NetworkRuntime, handle: &PushHandle, degrees: f32) {
    runtime.set_input(
        handle.driver.with_field(Channel::RotateZ.name()),
        Value::f(degrees),
    );
}

#[test]
fn calibrated_push_tracks_the_driver() {
    let mut builder = CorrectiveNetworkBuilder::new(leg_scene());
    let handles =
        builder.create_push_setup(&knee_spec(), &[side_rig(Side::Left)], Channel::RotateZ);
    let handle = handles.into_iter().next().unwrap();
    builder
        .add_scalar_pose(&handle, 0.0, 90.0, PoseDelta::translate([2.0, 0.0, 0.0]))
        .unwrap();

    let mut runtime = NetworkRuntime::new();
    stage(&mut runtime, &handle, 45.0);
    evaluate_all(&builder.network, &mut runtime).unwrap();

    assert_eq!(
        runtime.writes.find(&handle.target.with_field("translate")),
        Some(&Value::vec3(1.0, 0.0, 0.0))
    );
    // Probe publishes the pose weight onto the driver.
    assert_eq!(
        runtime.writes.find(&handle.driver.with_field("pose01")),
        Some(&Value::f(0.5))
    );
}

#[test]
fn chained_poses_hand_over_cleanly() {
    let mut builder = CorrectiveNetworkBuilder::new(leg_scene());
    let handles =
        builder.create_push_setup(&knee_spec(), &[side_rig(Side::Left)], Channel::RotateZ);
    let handle = handles.into_iter().next().unwrap();
    builder
        .add_scalar_pose(&handle, 0.0, 60.0, PoseDelta::translate([1.0, 0.0, 0.0]))
        .unwrap();
    builder
        .add_scalar_pose(&handle, 60.0, 90.0, PoseDelta::translate([0.0, 1.0, 0.0]))
        .unwrap();

    let weight = |deg: f32, probe: &str| {
        let mut runtime = NetworkRuntime::new();
        stage(&mut runtime, &handle, deg);
        evaluate_all(&builder.network, &mut runtime).unwrap();
        runtime
            .writes
            .find(&handle.driver.with_field(probe))
            .unwrap()
            .as_float()
    };

    // At the handover the first pose owns the full weight.
    assert_relative_eq!(weight(60.0, "pose01"), 1.0, epsilon = 1e-5);
    assert_relative_eq!(weight(60.0, "pose02"), 0.0, epsilon = 1e-5);
    // Past it the poses cross-fade and their weights sum to one.
    for deg in [65.0f32, 75.0, 85.0, 90.0] {
        assert_relative_eq!(
            weight(deg, "pose01") + weight(deg, "pose02"),
            1.0,
            epsilon = 1e-5
        );
    }
    assert_relative_eq!(weight(90.0, "pose02"), 1.0, epsilon = 1e-5);
}

#[test]
fn auto_split_poses_pin_their_cross_fade_weights() {
    let mut builder = CorrectiveNetworkBuilder::new(leg_scene());
    let handles =
        builder.create_push_setup(&knee_spec(), &[side_rig(Side::Left)], Channel::RotateZ);
    let handle = handles.into_iter().next().unwrap();
    builder.auto_add_poses(&handle, 0.0, 90.0).unwrap();

    let weight = |deg: f32, probe: &str| {
        let mut runtime = NetworkRuntime::new();
        stage(&mut runtime, &handle, deg);
        evaluate_all(&builder.network, &mut runtime).unwrap();
        runtime
            .writes
            .find(&handle.driver.with_field(probe))
            .unwrap()
            .as_float()
    };

    assert_relative_eq!(weight(30.0, "pose01"), 1.0, epsilon = 1e-5);
    assert_relative_eq!(weight(30.0, "pose02"), 0.0, epsilon = 1e-5);
    assert_relative_eq!(weight(30.0, "pose03"), 0.0, epsilon = 1e-5);

    assert_relative_eq!(weight(45.0, "pose01"), 0.75, epsilon = 1e-5);
    assert_relative_eq!(weight(45.0, "pose02"), 0.5, epsilon = 1e-5);
    assert_relative_eq!(weight(45.0, "pose03"), 0.0, epsilon = 1e-5);

    assert_relative_eq!(weight(60.0, "pose01"), 0.5, epsilon = 1e-5);
    assert_relative_eq!(weight(60.0, "pose02"), 1.0, epsilon = 1e-5);
    assert_relative_eq!(weight(60.0, "pose03"), 0.0, epsilon = 1e-5);

    assert_relative_eq!(weight(75.0, "pose01"), 0.25, epsilon = 1e-5);
    assert_relative_eq!(weight(75.0, "pose02"), 0.5, epsilon = 1e-5);
    assert_relative_eq!(weight(75.0, "pose03"), 0.5, epsilon = 1e-5);

    assert_relative_eq!(weight(90.0, "pose01"), 0.0, epsilon = 1e-5);
    assert_relative_eq!(weight(90.0, "pose02"), 0.0, epsilon = 1e-5);
    assert_relative_eq!(weight(90.0, "pose03"), 1.0, epsilon = 1e-5);
}

#[test]
fn mirrored_side_responds_to_the_flipped_driver() {
    let mut builder = CorrectiveNetworkBuilder::new(leg_scene()).with_mirror_table(MirrorTable {
        driver_sign: -1.0,
        translate_signs: [-1.0, 1.0, 1.0],
        rotate_signs: [1.0, -1.0, -1.0],
    });
    let handles =
        builder.create_push_setup(&knee_spec(), &[side_rig(Side::Left)], Channel::RotateZ);
    let left = handles.into_iter().next().unwrap();
    builder
        .add_scalar_pose(&left, 0.0, 90.0, PoseDelta::translate([2.0, 0.0, 0.0]))
        .unwrap();
    let right = builder
        .mirror_push(&left, &knee_spec(), &side_rig(Side::Right))
        .unwrap();

    // The right knee bends the other way; the flipped driver sign maps it
    // into the same calibration domain.
    let mut runtime = NetworkRuntime::new();
    stage(&mut runtime, &right, -45.0);
    evaluate_all(&builder.network, &mut runtime).unwrap();

    assert_eq!(
        runtime.writes.find(&right.target.with_field("translate")),
        Some(&Value::vec3(-1.0, 0.0, 0.0))
    );
}

#[test]
fn frame_mode_reproduces_the_calibrated_pose() {
    let mut builder = CorrectiveNetworkBuilder::new(leg_scene());
    let handles =
        builder.create_push_setup(&knee_spec(), &[side_rig(Side::Left)], Channel::RotateZ);
    let handle = handles.into_iter().next().unwrap();
    let parent = path("l/hind/femur");
    let calibrations = [
        (0.0, PoseDelta::neutral()),
        (45.0, PoseDelta::translate([0.0, 1.0, 0.0])),
        (90.0, PoseDelta::neutral()),
    ];
    for (angle, delta) in calibrations {
        builder
            .add_frame_pose(&handle, &parent, &[(Channel::RotateZ, angle)], delta)
            .unwrap();
    }

    // Pose the driver exactly at the middle calibration and stage its
    // local frame: that pose's delta comes through undiluted.
    builder
        .scene
        .set_channel(&handle.driver, Channel::RotateZ, 45.0)
        .unwrap();
    let local = builder.scene.local_between(&handle.driver, &parent).unwrap();
    let mut runtime = NetworkRuntime::new();
    runtime.set_input(handle.driver.clone(), Value::Transform(local));
    evaluate_all(&builder.network, &mut runtime).unwrap();

    let written = runtime
        .writes
        .find(&handle.target.with_field("translate"))
        .unwrap()
        .as_vec3();
    assert_relative_eq!(written[0], 0.0, epsilon = 1e-3);
    assert_relative_eq!(written[1], 1.0, epsilon = 1e-3);
    assert_relative_eq!(written[2], 0.0, epsilon = 1e-3);
    assert_eq!(
        runtime.writes.find(&handle.target.with_field("scale")),
        Some(&Value::vec3(1.0, 1.0, 1.0))
    );
}
