use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use vizij_lipsync_core::{
    interp::functions::dot4, BoneId, BonePose, ChannelId, CurveSet, PhonemeMarker, Shape,
    ShapeLibrary, SynthesisConfig, Synthesizer, TangentMode,
};

fn approx(a: f32, b: f32, eps: f32) {
    assert!((a - b).abs() <= eps, "left={a} right={b} eps={eps}");
}

fn tight() -> SynthesisConfig {
    SynthesisConfig {
        tangent_mode: TangentMode::Tight,
        seed: Some(11),
        ..SynthesisConfig::default()
    }
}

fn synth(markers: &[PhonemeMarker], library: &ShapeLibrary) -> CurveSet {
    Synthesizer::new(tight())
        .unwrap()
        .synthesize(markers, library)
        .unwrap()
}

fn has_key_near(set: &CurveSet, channel: u32, time: f32) -> bool {
    set.channel_curve(ChannelId(channel))
        .unwrap()
        .keys()
        .iter()
        .any(|k| (k.time - time).abs() < 1e-5)
}

fn jaw(end_rotation: [f32; 3]) -> BonePose {
    BonePose {
        bone: BoneId(0),
        neutral_position: [0.0; 3],
        neutral_rotation: [0.0; 3],
        neutral_scale: [1.0; 3],
        end_position: [0.0, -0.02, 0.0],
        end_rotation,
        end_scale: [1.0; 3],
        locks: Default::default(),
    }
}

#[test]
fn single_marker_produces_seed_preroll_main_and_rest_keys() {
    let library = ShapeLibrary::new(vec![Shape::new("A").with_channel(0, 1.0)]);
    let set = synth(&[PhonemeMarker::new(0, 0.1, 1.0, false)], &library);

    let curve = set.channel_curve(ChannelId(0)).expect("channel 0 curve");
    let expected = [
        (-0.3, 0.0),
        (0.0, 0.0),
        (0.1, 1.0),
        (0.5, 1.0),
        (0.9, 0.0),
        (1.0, 0.0),
    ];
    assert_eq!(curve.len(), expected.len());
    for (key, (t, v)) in curve.keys().iter().zip(expected) {
        approx(key.time, t, 1e-6);
        approx(key.value, v, 1e-6);
        assert_eq!(key.in_tangent, 0.0);
        assert_eq!(key.out_tangent, 0.0);
    }
    assert_eq!(set.length, 1.0);
    assert!(set.bones.is_empty());
}

#[test]
fn tight_curves_hit_weight_times_intensity_at_each_marker() {
    let library = ShapeLibrary::new(vec![
        Shape::new("AI").with_channel(0, 1.0).with_channel(1, 0.4),
        Shape::new("E").with_channel(1, 0.8).with_channel(2, 0.6),
        Shape::new("O").with_channel(0, 0.5).with_channel(3, 0.9),
        Shape::new("rest").with_channel(0, 0.1),
    ]);
    let markers = vec![
        PhonemeMarker::new(0, 0.05, 0.9, false),
        PhonemeMarker::new(1, 0.15, 1.0, false),
        PhonemeMarker::new(0, 0.3, 0.7, false),
        PhonemeMarker::new(2, 0.62, 0.5, false),
        PhonemeMarker::new(1, 0.95, 1.2, false),
    ];
    let set = synth(&markers, &library);
    for m in &markers {
        let shape = library.get(m.phoneme_index).unwrap();
        for cw in &shape.channels {
            let curve = set.channel_curve(cw.channel).unwrap();
            approx(curve.evaluate(m.time), cw.weight * m.intensity, 1e-6);
        }
    }
    // channel 0 rests at the rest shape weight, not 0
    let c0 = set.channel_curve(ChannelId(0)).unwrap();
    approx(c0.evaluate(0.15), 0.1, 1e-6);
    approx(c0.evaluate(1.0), 0.1, 1e-6);
}

#[test]
fn rest_is_inserted_only_across_a_wide_gap() {
    let library = ShapeLibrary::new(vec![
        Shape::new("A").with_channel(0, 1.0),
        Shape::new("B").with_channel(1, 1.0),
    ]);
    let hold = 0.4;

    let near = synth(
        &[
            PhonemeMarker::new(0, 0.1, 1.0, false),
            PhonemeMarker::new(1, 0.45, 1.0, false),
        ],
        &library,
    );
    assert!(!has_key_near(&near, 0, 0.1 + hold));
    assert!(!has_key_near(&near, 0, 0.1 + 2.0 * hold));

    let far = synth(
        &[
            PhonemeMarker::new(0, 0.1, 1.0, false),
            PhonemeMarker::new(1, 0.8, 1.0, false),
        ],
        &library,
    );
    assert!(has_key_near(&far, 0, 0.1 + hold));
    assert!(has_key_near(&far, 0, 0.1 + 2.0 * hold));
    // the next marker's channel gets a neutral pre-roll
    assert!(has_key_near(&far, 1, 0.8 - hold));

    // next marker exactly rest + hold away: still no rest
    let config = tight();
    let edge_time = 0.1 + config.rest_time_normalized() + config.rest_hold_normalized();
    let edge = synth(
        &[
            PhonemeMarker::new(0, 0.1, 1.0, false),
            PhonemeMarker::new(1, edge_time, 1.0, false),
        ],
        &library,
    );
    assert!(!has_key_near(&edge, 0, 0.1 + hold));
    assert!(!has_key_near(&edge, 0, 0.1 + 2.0 * hold));
    assert!(!has_key_near(&edge, 1, edge_time - hold));
}

#[test]
fn sustain_suppresses_rest_between_same_phoneme_markers() {
    let library = ShapeLibrary::new(vec![Shape::new("MBP").with_channel(6, 1.0)]);
    let set = synth(
        &[
            PhonemeMarker::new(0, 0.1, 1.0, true),
            PhonemeMarker::new(0, 0.8, 1.0, false),
        ],
        &library,
    );
    assert!(!has_key_near(&set, 6, 0.5));
    assert!(!has_key_near(&set, 6, 0.9));
    let curve = set.channel_curve(ChannelId(6)).unwrap();
    for i in 1..10 {
        let t = 0.1 + 0.07 * i as f32;
        approx(curve.evaluate(t), 1.0, 1e-6);
    }
}

#[test]
fn unknown_phoneme_and_empty_shape_hold_neutral() {
    let library = ShapeLibrary::new(vec![
        Shape::new("A").with_channel(0, 1.0),
        Shape::new("silent"),
        Shape::new("rest").with_channel(0, 0.2),
    ]);
    let set = synth(
        &[
            PhonemeMarker::new(0, 0.1, 1.0, false),
            PhonemeMarker::new(1, 0.3, 1.0, false),
            PhonemeMarker::new(7, 0.6, 1.0, false),
        ],
        &library,
    );
    let curve = set.channel_curve(ChannelId(0)).unwrap();
    approx(curve.evaluate(0.3), 0.2, 1e-6);
    approx(curve.evaluate(0.6), 0.2, 1e-6);
    assert_eq!(set.channels.len(), 1);
}

#[test]
fn same_seed_reproduces_randomized_curves() {
    let library = ShapeLibrary::new(vec![
        Shape::new("A").with_channel(0, 1.0).with_bone(jaw([15.0, 0.0, 0.0])),
        Shape::new("B").with_channel(1, 0.7),
    ]);
    let markers = vec![
        PhonemeMarker::new(0, 0.1, 1.0, false).with_randomness(0.2, 0.3, 0.3, 0.3),
        PhonemeMarker::new(1, 0.4, 0.8, false).with_randomness(0.2, 0.3, 0.3, 0.3),
        PhonemeMarker::new(0, 0.7, 0.9, false).with_randomness(0.2, 0.3, 0.3, 0.3),
    ];
    let a = Synthesizer::new(tight()).unwrap().synthesize(&markers, &library).unwrap();
    let b = Synthesizer::new(tight()).unwrap().synthesize(&markers, &library).unwrap();
    assert_eq!(a, b);
}

#[test]
fn randomized_values_stay_within_range() {
    let library = ShapeLibrary::new(vec![Shape::new("A").with_channel(0, 0.5)]);
    let mut synth = Synthesizer::new(tight()).unwrap();
    for seed in 0..32 {
        synth.reseed(seed);
        let marker = PhonemeMarker::new(0, 0.5, 1.0, false).with_randomness(0.2, 0.4, 0.0, 0.0);
        let set = synth.synthesize(&[marker], &library).unwrap();
        let v = set.channel_curve(ChannelId(0)).unwrap().evaluate(0.5);
        // intensity in [0.9, 1.1], weight factor in [0.8, 1.2]
        assert!(v >= 0.5 * 0.9 * 0.8 - 1e-6 && v <= 0.5 * 1.1 * 1.2 + 1e-6, "v={v}");
    }
}

#[test]
fn bone_keys_follow_pose_and_locks() {
    let mut locked = jaw([20.0, 0.0, 0.0]);
    locked.locks.position = true;
    let library = ShapeLibrary::new(vec![Shape::new("A").with_bone(locked)]);
    let set = synth(&[PhonemeMarker::new(0, 0.2, 1.0, false)], &library);
    let curve = set.bone_curve(BoneId(0)).expect("bone curve");
    let at_marker = curve.evaluate(0.2);
    assert_eq!(at_marker.position, [0.0; 3]);
    let expected = vizij_lipsync_core::value::quat_from_euler_degrees([20.0, 0.0, 0.0]);
    for i in 0..4 {
        approx(at_marker.rotation[i], expected[i], 1e-5);
    }
    // rest hold keeps the pose, release returns to neutral
    approx(curve.evaluate(0.6).rotation[0], expected[0], 1e-5);
    assert_eq!(curve.evaluate(1.0).rotation, [0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn bone_rotation_keys_stay_in_one_hemisphere() {
    let mut rng = SmallRng::seed_from_u64(0x5eed);
    for _ in 0..20 {
        let shapes: Vec<Shape> = (0..4)
            .map(|i| {
                let rot = [
                    rng.random_range(-350.0..350.0),
                    rng.random_range(-350.0..350.0),
                    rng.random_range(-350.0..350.0),
                ];
                Shape::new(format!("S{i}")).with_bone(jaw(rot))
            })
            .collect();
        let library = ShapeLibrary::new(shapes);
        let mut markers: Vec<PhonemeMarker> = (0..8)
            .map(|_| {
                PhonemeMarker::new(
                    rng.random_range(0..4),
                    rng.random_range(0.0..1.0),
                    rng.random_range(0.2..1.0),
                    false,
                )
                .with_randomness(0.1, 0.3, 0.3, 0.6)
            })
            .collect();
        markers.sort_by(|a, b| a.time.total_cmp(&b.time));

        let set = Synthesizer::new(SynthesisConfig {
            seed: Some(rng.random()),
            ..SynthesisConfig::default()
        })
        .unwrap()
        .synthesize(&markers, &library)
        .unwrap();
        for track in &set.bones {
            for pair in track.curve.keys().windows(2) {
                assert!(dot4(pair[0].transform.rotation, pair[1].transform.rotation) >= 0.0);
            }
        }
    }
}

#[test]
fn unordered_input_is_sorted_before_synthesis() {
    let library = ShapeLibrary::new(vec![Shape::new("A").with_channel(0, 1.0)]);
    let ordered = synth(
        &[
            PhonemeMarker::new(0, 0.1, 1.0, false),
            PhonemeMarker::new(0, 0.9, 0.5, false),
        ],
        &library,
    );
    let shuffled = synth(
        &[
            PhonemeMarker::new(0, 0.9, 0.5, false),
            PhonemeMarker::new(0, 0.1, 1.0, false),
        ],
        &library,
    );
    assert_eq!(ordered, shuffled);
}
