// Minimal triangle-wave synthesizer with an ADSR envelope

use super::mix::MUTED_DB;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Envelope {
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
}

impl Default for Envelope {
    fn default() -> Self {
        Self {
            attack: 0.005,
            decay: 0.1,
            sustain: 0.3,
            release: 1.0,
        }
    }
}

impl Envelope {
    /// Level `t` seconds after note-on for a note held `held` seconds
    fn level(&self, t: f64, held: f64) -> f64 {
        if t < 0.0 {
            return 0.0;
        }
        if t >= held {
            let released = t - held;
            if released >= self.release {
                return 0.0;
            }
            return self.held_level(held) * (1.0 - released / self.release);
        }
        self.held_level(t)
    }

    fn held_level(&self, t: f64) -> f64 {
        if t < self.attack {
            t / self.attack
        } else if t < self.attack + self.decay {
            1.0 - (1.0 - self.sustain) * (t - self.attack) / self.decay
        } else {
            self.sustain
        }
    }
}

pub fn db_to_gain(db: f64) -> f64 {
    if db <= MUTED_DB {
        0.0
    } else {
        10f64.powf(db / 20.0)
    }
}

pub fn pitch_to_hz(pitch: u8) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - 69.0) / 12.0)
}

#[derive(Debug, Clone)]
struct Sounding {
    frequency: f64,
    /// Clock time of note-on
    start: f64,
    held: f64,
    velocity: f64,
}

/// One polyphonic instrument. Notes are placed on the session clock and
/// mixed into output blocks on demand.
#[derive(Debug, Clone)]
pub struct SynthVoice {
    volume_db: f64,
    envelope: Envelope,
    sounding: Vec<Sounding>,
}

impl SynthVoice {
    pub fn new(volume_db: f64) -> Self {
        Self {
            volume_db,
            envelope: Envelope::default(),
            sounding: Vec::new(),
        }
    }

    pub fn set_volume_db(&mut self, db: f64) {
        self.volume_db = db;
    }

    pub fn trigger_attack_release(&mut self, pitch: u8, duration: f64, at: f64, velocity: f32) {
        self.sounding.push(Sounding {
            frequency: pitch_to_hz(pitch),
            start: at,
            held: duration.max(0.0),
            velocity: velocity.clamp(0.0, 1.0) as f64,
        });
    }

    /// Notes not yet fully released
    pub fn active_notes(&self) -> usize {
        self.sounding.len()
    }

    /// Silence everything immediately
    pub fn release_all(&mut self) {
        self.sounding.clear();
    }

    /// Add this voice into `out`, whose first sample sits at clock `start`
    pub fn render(&mut self, out: &mut [f32], start: f64, sample_rate: u32) {
        let gain = db_to_gain(self.volume_db);
        let sr = sample_rate as f64;
        let end = start + out.len() as f64 / sr;

        if gain > 0.0 {
            for note in &self.sounding {
                for (i, sample) in out.iter_mut().enumerate() {
                    let t = start + i as f64 / sr - note.start;
                    let level = self.envelope.level(t, note.held);
                    if level <= 0.0 {
                        continue;
                    }
                    let phase = (note.frequency * t).fract();
                    let wave = 1.0 - 4.0 * (phase - 0.5).abs();
                    *sample += (wave * level * note.velocity * gain) as f32;
                }
            }
        }

        let release = self.envelope.release;
        self.sounding.retain(|n| n.start + n.held + release > end);
    }
}
