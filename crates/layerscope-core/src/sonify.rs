//! Token to sound mapping.
//!
//! [`SonificationMapper`] is pure apart from remembering the last instrument
//! used by the expressive policy. [`Sonifier`] pairs it with an optional
//! [`AudioSink`] and makes sure audio trouble never reaches the run.

use std::f32::consts::TAU;

use tracing::warn;

use crate::backend::TokenId;
use crate::config_types::SonificationPolicy;
use crate::error::AudioUnavailable;

/// Middle C, the root of the simple policy.
pub const SIMPLE_BASE_HZ: f32 = 261.6;

/// C3, the root of the expressive policy's three-octave span.
pub const EXPRESSIVE_BASE_HZ: f32 = 130.81;

/// Uncertainty at which the simple policy reaches full volume.
pub const UNCERTAINTY_CEILING: f32 = 10.0;

const MAJOR_SCALE: [u32; 7] = [0, 2, 4, 5, 7, 9, 11];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Square,
    Triangle,
}

impl Instrument {
    fn sample(self, phase: f32) -> f32 {
        let cycle = phase.rem_euclid(1.0);
        match self {
            Instrument::Square => {
                if cycle < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Instrument::Triangle => 1.0 - 4.0 * (cycle - 0.5).abs(),
        }
    }

    fn other(self) -> Self {
        match self {
            Instrument::Square => Instrument::Triangle,
            Instrument::Triangle => Instrument::Square,
        }
    }
}

/// Attack/decay/sustain/release shape, times in seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack_s: f32,
    pub decay_s: f32,
    pub sustain_level: f32,
    pub release_s: f32,
}

impl Envelope {
    /// Constant full-level envelope.
    pub fn flat() -> Self {
        Self {
            attack_s: 0.0,
            decay_s: 0.0,
            sustain_level: 1.0,
            release_s: 0.0,
        }
    }

    /// Gain in `[0, 1]` at time `t` into a note lasting `duration_s`.
    pub fn gain_at(&self, t: f32, duration_s: f32) -> f32 {
        let release_start = (duration_s - self.release_s).max(0.0);
        let gain = if t < self.attack_s {
            t / self.attack_s
        } else if t < self.attack_s + self.decay_s {
            let progress = (t - self.attack_s) / self.decay_s;
            1.0 - progress * (1.0 - self.sustain_level)
        } else {
            self.sustain_level
        };
        let gain = if self.release_s > 0.0 && t >= release_start {
            let remaining = ((duration_s - t) / self.release_s).clamp(0.0, 1.0);
            gain * remaining
        } else {
            gain
        };
        gain.clamp(0.0, 1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vibrato {
    pub rate_hz: f32,
    pub depth_semitones: f32,
}

/// One note to play for one generation step.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioEvent {
    pub pitch_hz: f32,
    /// In `[0, 1]`.
    pub volume: f32,
    pub duration_s: f32,
    pub instrument: Instrument,
    pub envelope: Envelope,
    pub vibrato: Option<Vibrato>,
    /// Emphasis of the upper partial, `0` for a plain tone.
    pub resonance: f32,
}

impl AudioEvent {
    /// Render the event to mono 16-bit PCM at `sample_rate`.
    pub fn render_pcm(&self, sample_rate: u32) -> Vec<i16> {
        if sample_rate == 0 || self.duration_s <= 0.0 || !self.duration_s.is_finite() {
            return Vec::new();
        }
        let rate = sample_rate as f32;
        let frames = (self.duration_s * rate) as usize;
        let mut phase = 0.0f32;
        let mut pcm = Vec::with_capacity(frames);
        for frame in 0..frames {
            let t = frame as f32 / rate;
            let pitch = match self.vibrato {
                Some(vibrato) => {
                    let bend = vibrato.depth_semitones * (TAU * vibrato.rate_hz * t).sin();
                    self.pitch_hz * 2f32.powf(bend / 12.0)
                }
                None => self.pitch_hz,
            };
            phase += pitch / rate;
            let fundamental = self.instrument.sample(phase);
            let overtone = self.instrument.sample(phase * 2.0);
            let tone = (fundamental + self.resonance * overtone) / (1.0 + self.resonance);
            let value = tone * self.volume * self.envelope.gain_at(t, self.duration_s);
            pcm.push((value.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16);
        }
        pcm
    }
}

/// Maps a sampled token and the step's uncertainty onto an [`AudioEvent`].
#[derive(Debug, Clone)]
pub struct SonificationMapper {
    policy: SonificationPolicy,
    duration_s: f32,
    last_instrument: Option<Instrument>,
}

impl SonificationMapper {
    pub fn new(policy: SonificationPolicy, duration_s: f32) -> Self {
        Self {
            policy,
            duration_s,
            last_instrument: None,
        }
    }

    pub fn policy(&self) -> SonificationPolicy {
        self.policy
    }

    pub fn map(&mut self, token_id: TokenId, uncertainty: f32) -> AudioEvent {
        let uncertainty = if uncertainty.is_nan() {
            0.0
        } else {
            uncertainty.max(0.0)
        };
        match self.policy {
            SonificationPolicy::Simple => self.simple(token_id, uncertainty),
            SonificationPolicy::Expressive => self.expressive(token_id, uncertainty),
        }
    }

    fn simple(&self, token_id: TokenId, uncertainty: f32) -> AudioEvent {
        let semitone = (token_id % 24) as f32;
        AudioEvent {
            pitch_hz: SIMPLE_BASE_HZ * 2f32.powf(semitone / 12.0),
            volume: (uncertainty / UNCERTAINTY_CEILING).clamp(0.0, 1.0),
            duration_s: self.duration_s,
            instrument: Instrument::Square,
            envelope: Envelope::flat(),
            vibrato: None,
            resonance: 0.0,
        }
    }

    fn expressive(&mut self, token_id: TokenId, uncertainty: f32) -> AudioEvent {
        let u = (uncertainty / UNCERTAINTY_CEILING).clamp(0.0, 1.0);
        let degree = MAJOR_SCALE[(token_id % 7) as usize];
        let octave = (token_id / 7) % 3;
        let semitone = (octave * 12 + degree) as f32;

        let instrument = match self.last_instrument {
            Some(previous) => previous.other(),
            None => Instrument::Square,
        };
        self.last_instrument = Some(instrument);

        // Uncertain steps get a softer attack, a longer tail and more wobble.
        let envelope = Envelope {
            attack_s: 0.005 + 0.02 * u,
            decay_s: 0.02 + 0.03 * u,
            sustain_level: 0.8 - 0.3 * u,
            release_s: 0.01 + 0.04 * u,
        };
        let vibrato = (u > 0.0).then_some(Vibrato {
            rate_hz: 4.0 + 4.0 * u,
            depth_semitones: 0.5 * u,
        });

        AudioEvent {
            pitch_hz: EXPRESSIVE_BASE_HZ * 2f32.powf(semitone / 12.0),
            volume: (0.35 + 0.5 * u).clamp(0.0, 1.0),
            duration_s: self.duration_s,
            instrument,
            envelope,
            vibrato,
            resonance: 0.6 * u,
        }
    }
}

/// Destination for audio events, typically a sound device.
pub trait AudioSink: Send {
    fn play(&mut self, event: &AudioEvent) -> Result<(), AudioUnavailable>;
}

/// Per-run pairing of a mapper and an optional sink.
///
/// A missing or failing sink disables audio for the rest of the run; the
/// problem is logged once.
pub struct Sonifier {
    mapper: SonificationMapper,
    sink: Option<Box<dyn AudioSink>>,
}

impl Sonifier {
    pub fn new(mapper: SonificationMapper, sink: Option<Box<dyn AudioSink>>) -> Self {
        if sink.is_none() {
            warn!("audio requested but no audio device is available; continuing without sound");
        }
        Self { mapper, sink }
    }

    pub fn is_active(&self) -> bool {
        self.sink.is_some()
    }

    pub fn observe(&mut self, token_id: TokenId, uncertainty: f32) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        let event = self.mapper.map(token_id, uncertainty);
        if let Err(err) = sink.play(&event) {
            warn!("{err}; disabling audio for the rest of the run");
            self.sink = None;
        }
    }
}
