// Host-side tests for clip playback and the idle/talk cross-fade.

use catalog_core::animation::{
    AnimationClip, AnimationMixer, Channel, ChannelValues, CharacterAnimator, Interpolation, LoopMode,
};
use catalog_core::model::primitives::ModelBuilder;
use catalog_core::model::ModelData;
use catalog_core::scene::{NodeId, Scene};
use glam::Vec3;

fn bob(name: &str, node: usize, duration: f32, height: f32) -> AnimationClip {
    AnimationClip {
        name: name.to_string(),
        duration,
        channels: vec![Channel {
            node,
            times: vec![0.0, duration],
            values: ChannelValues::Translation(vec![Vec3::ZERO, Vec3::new(0.0, height, 0.0)]),
            interpolation: Interpolation::Linear,
        }],
    }
}

fn rig(clips: Vec<AnimationClip>) -> (Scene, NodeId, AnimationMixer) {
    let mut b = ModelBuilder::new();
    b.node("Character", None, Vec3::ZERO, None);
    for c in clips {
        b.animation(c);
    }
    let model: ModelData = b.build();
    let mut scene = Scene::new();
    let inst = scene.instantiate(&model, "bg", None);
    let node = inst.nodes[0];
    let mixer = AnimationMixer::new(model.animations.clone(), inst.nodes, &scene);
    (scene, node, mixer)
}

#[test]
fn looping_clip_samples_linearly_and_wraps() {
    let (mut scene, node, mut mixer) = rig(vec![bob("Idle", 0, 2.0, 1.0)]);
    mixer.play(0, LoopMode::Repeat);
    mixer.update(0.5, &mut scene);
    assert!((scene.node(node).unwrap().translation.y - 0.25).abs() < 1e-5);
    mixer.update(2.0, &mut scene);
    assert!((scene.node(node).unwrap().translation.y - 0.25).abs() < 1e-5);
}

#[test]
fn once_clip_reports_finish_exactly_once() {
    let (mut scene, _, mut mixer) = rig(vec![bob("Wave", 0, 1.0, 1.0)]);
    mixer.play(0, LoopMode::Once);
    assert!(mixer.update(0.6, &mut scene).is_empty());
    assert_eq!(mixer.update(0.6, &mut scene), vec![0]);
    assert!(mixer.update(0.6, &mut scene).is_empty());
    assert_eq!(mixer.action(0).unwrap().time, 1.0);
}

#[test]
fn idle_prefers_named_clip() {
    let (_, _, mixer) = rig(vec![bob("Talk", 0, 1.0, 1.0), bob("IdleLoop", 0, 2.0, 0.2)]);
    let animator = CharacterAnimator::new(mixer);
    assert_eq!(animator.idle_clip(), Some(1));
    assert_eq!(animator.talk_clip(), Some(0));
    assert!(animator.mixer().action(1).unwrap().playing);
}

#[test]
fn talk_plays_once_then_idle_fades_back() {
    let (mut scene, _, mixer) = rig(vec![bob("idle", 0, 2.0, 0.2), bob("talk", 0, 1.0, 1.0)]);
    let mut animator = CharacterAnimator::new(mixer);
    animator.play_talk_once();
    assert!(animator.is_talking());

    animator.update(0.5, &mut scene);
    assert!(animator.is_talking());
    assert_eq!(animator.mixer().action(0).unwrap().weight, 0.0);

    animator.update(0.6, &mut scene);
    assert!(!animator.is_talking());
    let idle = animator.mixer().action(0).unwrap();
    assert!(idle.playing);
    assert_eq!(idle.weight, 0.0);

    animator.update(0.25, &mut scene);
    assert_eq!(animator.mixer().action(0).unwrap().weight, 1.0);
    assert!(!animator.mixer().action(1).unwrap().playing);
}

#[test]
fn talk_without_clip_is_a_no_op() {
    let (_, _, mixer) = rig(vec![bob("idle", 0, 2.0, 0.2)]);
    let mut animator = CharacterAnimator::new(mixer);
    animator.play_talk_once();
    assert!(!animator.is_talking());
}

#[test]
fn zero_length_talk_returns_to_idle() {
    let (mut scene, _, mixer) = rig(vec![bob("idle", 0, 2.0, 0.2), bob("talk", 0, 0.0, 1.0)]);
    let mut animator = CharacterAnimator::new(mixer);
    animator.play_talk_once();
    assert!(animator.is_talking());

    animator.update(1.0 / 60.0, &mut scene);
    assert!(!animator.is_talking());
    assert!(!animator.mixer().action(1).unwrap().playing);
    assert!(animator.mixer().action(0).unwrap().playing);

    animator.update(0.25, &mut scene);
    assert_eq!(animator.mixer().action(0).unwrap().weight, 1.0);
}
