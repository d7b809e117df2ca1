//! Keyframe clips and a small cross-fading mixer for the background character.

use crate::constants::{approach_factor, IDLE_FADE_IN_SEC, TALK_FADE_OUT_SEC};
use crate::scene::{NodeId, Scene};
use fnv::FnvHashMap;
use glam::{Quat, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interpolation {
    Step,
    Linear,
}

#[derive(Clone, Debug)]
pub enum ChannelValues {
    Translation(Vec<Vec3>),
    Rotation(Vec<Quat>),
    Scale(Vec<Vec3>),
}

/// Keyframes for one property of one model node.
#[derive(Clone, Debug)]
pub struct Channel {
    /// Index into `ModelData::nodes`.
    pub node: usize,
    pub times: Vec<f32>,
    pub values: ChannelValues,
    pub interpolation: Interpolation,
}

#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<Channel>,
}

/// Locate the key pair around `t` and the blend factor between them.
fn key_span(times: &[f32], t: f32, interpolation: Interpolation) -> Option<(usize, usize, f32)> {
    let last = times.len().checked_sub(1)?;
    if t <= times[0] {
        return Some((0, 0, 0.0));
    }
    if t >= times[last] {
        return Some((last, last, 0.0));
    }
    let hi = times.partition_point(|&k| k <= t).min(last);
    let lo = hi.saturating_sub(1);
    let span = times[hi] - times[lo];
    let f = match interpolation {
        Interpolation::Step => 0.0,
        Interpolation::Linear if span > 0.0 => (t - times[lo]) / span,
        Interpolation::Linear => 0.0,
    };
    Some((lo, hi, f))
}

#[derive(Clone, Copy, Debug)]
enum Sample {
    Translation(Vec3),
    Rotation(Quat),
    Scale(Vec3),
}

impl Channel {
    fn sample(&self, t: f32) -> Option<Sample> {
        let (a, b, f) = key_span(&self.times, t, self.interpolation)?;
        Some(match &self.values {
            ChannelValues::Translation(v) => Sample::Translation(v.get(a)?.lerp(*v.get(b)?, f)),
            ChannelValues::Scale(v) => Sample::Scale(v.get(a)?.lerp(*v.get(b)?, f)),
            ChannelValues::Rotation(v) => Sample::Rotation(v.get(a)?.slerp(*v.get(b)?, f)),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LoopMode {
    Repeat,
    Once,
}

#[derive(Clone, Debug)]
struct Fade {
    from: f32,
    to: f32,
    duration: f32,
    elapsed: f32,
}

#[derive(Clone, Debug)]
pub struct Action {
    pub clip: usize,
    pub time: f32,
    pub weight: f32,
    pub mode: LoopMode,
    pub clamp_when_finished: bool,
    pub playing: bool,
    fade: Option<Fade>,
}

impl Action {
    fn new(clip: usize) -> Self {
        Self {
            clip,
            time: 0.0,
            weight: 0.0,
            mode: LoopMode::Repeat,
            clamp_when_finished: false,
            playing: false,
            fade: None,
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct RestPose {
    translation: Vec3,
    rotation: Quat,
    scale: Vec3,
}

#[derive(Default, Clone, Copy)]
struct Accum {
    t: Vec3,
    t_w: f32,
    r: Option<Quat>,
    r_w: f32,
    s: Vec3,
    s_w: f32,
}

/// Plays clips against an instantiated model, blending by action weight.
pub struct AnimationMixer {
    clips: Vec<AnimationClip>,
    actions: Vec<Action>,
    targets: Vec<NodeId>,
    rest: FnvHashMap<NodeId, RestPose>,
}

impl AnimationMixer {
    /// `targets[i]` is the scene node created for model node `i`.
    pub fn new(clips: Vec<AnimationClip>, targets: Vec<NodeId>, scene: &Scene) -> Self {
        let mut rest = FnvHashMap::default();
        for clip in &clips {
            for ch in &clip.channels {
                if let Some(&id) = targets.get(ch.node) {
                    if let Some(n) = scene.node(id) {
                        rest.entry(id).or_insert(RestPose {
                            translation: n.translation,
                            rotation: n.rotation,
                            scale: n.scale,
                        });
                    }
                }
            }
        }
        let actions = (0..clips.len()).map(Action::new).collect();
        Self {
            clips,
            actions,
            targets,
            rest,
        }
    }

    pub fn clips(&self) -> &[AnimationClip] {
        &self.clips
    }

    pub fn action(&self, clip: usize) -> Option<&Action> {
        self.actions.get(clip)
    }

    /// Index of the first clip whose lowercase name contains any of `needles`.
    pub fn find_clip(&self, needles: &[&str]) -> Option<usize> {
        self.clips.iter().position(|c| {
            let name = c.name.to_ascii_lowercase();
            needles.iter().any(|n| name.contains(n))
        })
    }

    /// Restart a clip at full weight.
    pub fn play(&mut self, clip: usize, mode: LoopMode) {
        if let Some(a) = self.actions.get_mut(clip) {
            a.time = 0.0;
            a.weight = 1.0;
            a.mode = mode;
            a.clamp_when_finished = mode == LoopMode::Once;
            a.playing = true;
            a.fade = None;
        }
    }

    pub fn fade_in(&mut self, clip: usize, duration: f32) {
        if let Some(a) = self.actions.get_mut(clip) {
            a.playing = true;
            a.fade = Some(Fade {
                from: a.weight,
                to: 1.0,
                duration: duration.max(1e-4),
                elapsed: 0.0,
            });
        }
    }

    pub fn fade_out(&mut self, clip: usize, duration: f32) {
        if let Some(a) = self.actions.get_mut(clip) {
            a.fade = Some(Fade {
                from: a.weight,
                to: 0.0,
                duration: duration.max(1e-4),
                elapsed: 0.0,
            });
        }
    }

    /// Advance time, apply poses, and return the clips that finished this step.
    pub fn update(&mut self, dt: f32, scene: &mut Scene) -> Vec<usize> {
        let dt = dt.max(0.0);
        let mut finished = Vec::new();
        for a in self.actions.iter_mut().filter(|a| a.playing) {
            let duration = self.clips.get(a.clip).map(|c| c.duration).unwrap_or(0.0);
            let before = a.time;
            a.time += dt;
            if duration <= 0.0 {
                // nothing to play; a one-shot ends on its first step
                if a.mode == LoopMode::Once {
                    a.time = 0.0;
                    a.playing = false;
                    finished.push(a.clip);
                }
            } else if a.time >= duration {
                match a.mode {
                    LoopMode::Repeat => a.time %= duration,
                    LoopMode::Once => {
                        a.time = duration;
                        if !a.clamp_when_finished {
                            a.weight = 0.0;
                        }
                        a.playing = a.clamp_when_finished;
                        if before < duration {
                            finished.push(a.clip);
                        }
                    }
                }
            }
            if let Some(f) = a.fade.as_mut() {
                f.elapsed += dt;
                let k = (f.elapsed / f.duration).clamp(0.0, 1.0);
                a.weight = f.from + (f.to - f.from) * k;
                if k >= 1.0 {
                    if f.to <= 0.0 {
                        a.playing = false;
                    }
                    a.fade = None;
                }
            }
        }
        self.apply(scene);
        finished
    }

    fn apply(&self, scene: &mut Scene) {
        let mut acc: FnvHashMap<NodeId, Accum> = FnvHashMap::default();
        for a in self.actions.iter().filter(|a| a.playing && a.weight > 0.0) {
            let Some(clip) = self.clips.get(a.clip) else {
                continue;
            };
            for ch in &clip.channels {
                let Some(&id) = self.targets.get(ch.node) else {
                    continue;
                };
                let Some(sample) = ch.sample(a.time) else {
                    continue;
                };
                let e = acc.entry(id).or_default();
                match sample {
                    Sample::Translation(v) => {
                        e.t += v * a.weight;
                        e.t_w += a.weight;
                    }
                    Sample::Scale(v) => {
                        e.s += v * a.weight;
                        e.s_w += a.weight;
                    }
                    Sample::Rotation(q) => {
                        e.r = Some(match e.r {
                            None => q,
                            Some(prev) => {
                                let k = a.weight / (e.r_w + a.weight);
                                prev.slerp(q, k)
                            }
                        });
                        e.r_w += a.weight;
                    }
                }
            }
        }
        for (id, e) in acc {
            let Some(rest) = self.rest.get(&id).copied() else {
                continue;
            };
            let Some(n) = scene.node_mut(id) else {
                continue;
            };
            if e.t_w > 0.0 {
                let v = e.t / e.t_w;
                n.translation = rest.translation.lerp(v, e.t_w.min(1.0));
            }
            if e.s_w > 0.0 {
                let v = e.s / e.s_w;
                n.scale = rest.scale.lerp(v, e.s_w.min(1.0));
            }
            if let Some(q) = e.r {
                n.rotation = rest.rotation.slerp(q, e.r_w.min(1.0));
            }
        }
    }
}

/// Idle loop plus a one-shot talk clip for the shop character.
pub struct CharacterAnimator {
    mixer: AnimationMixer,
    idle: Option<usize>,
    talk: Option<usize>,
    talking: bool,
}

impl CharacterAnimator {
    pub fn new(mut mixer: AnimationMixer) -> Self {
        let idle = mixer
            .find_clip(&["idle", "loop"])
            .or(if mixer.clips().is_empty() { None } else { Some(0) });
        let talk = mixer.find_clip(&["talk"]);
        if let Some(i) = idle {
            mixer.play(i, LoopMode::Repeat);
        }
        log::info!(
            "[anim] {} clips, idle={:?} talk={:?}",
            mixer.clips().len(),
            idle.map(|i| mixer.clips()[i].name.clone()),
            talk.map(|i| mixer.clips()[i].name.clone())
        );
        Self {
            mixer,
            idle,
            talk,
            talking: false,
        }
    }

    pub fn idle_clip(&self) -> Option<usize> {
        self.idle
    }

    pub fn talk_clip(&self) -> Option<usize> {
        self.talk
    }

    pub fn is_talking(&self) -> bool {
        self.talking
    }

    pub fn mixer(&self) -> &AnimationMixer {
        &self.mixer
    }

    /// Fade idle out, play talk once, then return to idle. No-op without a talk clip.
    pub fn play_talk_once(&mut self) {
        let Some(talk) = self.talk else {
            return;
        };
        if let Some(idle) = self.idle.filter(|i| *i != talk) {
            self.mixer.fade_out(idle, TALK_FADE_OUT_SEC);
        }
        self.mixer.play(talk, LoopMode::Once);
        self.talking = true;
    }

    pub fn update(&mut self, dt: f32, scene: &mut Scene) {
        let finished = self.mixer.update(dt, scene);
        if let Some(talk) = self.talk.filter(|t| self.talking && finished.contains(t)) {
            self.talking = false;
            self.mixer.fade_out(talk, IDLE_FADE_IN_SEC);
            if let Some(idle) = self.idle.filter(|i| *i != talk) {
                self.mixer.play(idle, LoopMode::Repeat);
                if let Some(a) = self.mixer.actions.get_mut(idle) {
                    a.weight = 0.0;
                }
                self.mixer.fade_in(idle, IDLE_FADE_IN_SEC);
            }
        }
    }
}

/// Smoothly rotate `current` toward `target` at `rate` per second.
pub fn slerp_toward(current: Quat, target: Quat, rate: f32, dt: f32) -> Quat {
    current.slerp(target, approach_factor(rate, dt)).normalize()
}
