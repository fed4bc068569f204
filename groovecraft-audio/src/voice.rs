//! Voice lifecycle: allocation, same-instrument retrigger stealing, and
//! over-limit stealing by a release-progress/velocity/age score.
//!
//! Patterns here are generalized from an instrument+pitch keyed allocator
//! to an instrument-keyed one: this engine has no polyphonic pitched
//! sequencing (one base pitch per instrument), so a retrigger always
//! steals the instrument's currently sounding voice rather than hunting
//! for a pitch match.

use std::time::Instant;

/// Maximum simultaneous voices per instrument before the allocator starts
/// stealing by score rather than unconditionally on retrigger.
pub const MAX_VOICES_PER_INSTRUMENT: usize = 8;

/// One live voice: the generic envelope/lifecycle bookkeeping the
/// allocator needs, plus an opaque payload `V` owned by the caller (the
/// actual oscillator/sample-reader/filter state for this hit).
pub struct Voice<V> {
    pub id: u64,
    pub instrument: String,
    pub velocity: f32,
    pub spawn_time: Instant,
    /// Set once the envelope enters its release stage: `(released_at,
    /// release_duration_s)`.
    pub release_state: Option<(Instant, f32)>,
    pub payload: V,
}

/// Tracks and steals voices. Does not own any audio rendering itself —
/// callers drive `payload` directly and consult this allocator only for
/// lifecycle decisions.
pub struct VoiceAllocator<V> {
    voices: Vec<Voice<V>>,
    next_id: u64,
}

impl<V> Default for VoiceAllocator<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> VoiceAllocator<V> {
    pub fn new() -> Self {
        Self {
            voices: Vec::new(),
            next_id: 0,
        }
    }

    /// Reserve the next voice id. Callers construct the `Voice` themselves
    /// (they need the id to build the payload) then call `add`.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add(&mut self, voice: Voice<V>) {
        self.voices.push(voice);
    }

    /// Steal voices before spawning a new hit on `instrument`: the
    /// currently sounding voice for this instrument (if any) always steals
    /// on retrigger; if the instrument is additionally over its voice cap,
    /// the lowest-scored candidate is stolen too.
    pub fn steal_for_trigger(&mut self, instrument: &str) -> Vec<Voice<V>> {
        let mut stolen = Vec::new();

        if let Some(pos) = self.voices.iter().position(|v| v.instrument == instrument) {
            stolen.push(self.voices.remove(pos));
        }

        let active_count = self
            .voices
            .iter()
            .filter(|v| v.instrument == instrument && v.release_state.is_none())
            .count();
        if active_count >= MAX_VOICES_PER_INSTRUMENT {
            if let Some(pos) = self.find_steal_candidate(instrument) {
                stolen.push(self.voices.remove(pos));
            }
        }

        stolen
    }

    fn find_steal_candidate(&self, instrument: &str) -> Option<usize> {
        let now = Instant::now();
        self.voices
            .iter()
            .enumerate()
            .filter(|(_, v)| v.instrument == instrument)
            .min_by(|(_, a), (_, b)| {
                Self::steal_score(a, now)
                    .partial_cmp(&Self::steal_score(b, now))
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, _)| i)
    }

    /// Lower score = better steal target: voices deep into their release
    /// tail score lowest; among still-active voices, quiet and old voices
    /// score lower than loud, recently-triggered ones.
    fn steal_score(voice: &Voice<V>, now: Instant) -> f64 {
        if let Some((released_at, release_dur)) = voice.release_state {
            let elapsed = now.duration_since(released_at).as_secs_f64();
            let progress = if release_dur > 0.0 {
                (elapsed / release_dur as f64).min(1.0)
            } else {
                1.0
            };
            (1.0 - progress) * 999.0
        } else {
            let velocity_score = voice.velocity as f64 * 500.0;
            let age_secs = now.duration_since(voice.spawn_time).as_secs_f64();
            let age_score = 500.0 / (1.0 + age_secs);
            1000.0 + velocity_score + age_score
        }
    }

    /// Mark the active voice for `instrument` as entering release.
    pub fn mark_released(&mut self, instrument: &str, release_time_s: f32) {
        if let Some(voice) = self
            .voices
            .iter_mut()
            .find(|v| v.instrument == instrument && v.release_state.is_none())
        {
            voice.release_state = Some((Instant::now(), release_time_s));
        }
    }

    /// Remove voices whose release tail plus a small safety margin has
    /// fully elapsed.
    pub fn cleanup_expired(&mut self) -> Vec<Voice<V>> {
        let now = Instant::now();
        let mut expired = Vec::new();
        let mut i = 0;
        while i < self.voices.len() {
            let is_expired = match self.voices[i].release_state {
                Some((released_at, release_dur)) => {
                    now.duration_since(released_at).as_secs_f32() >= release_dur + 0.01
                }
                None => false,
            };
            if is_expired {
                expired.push(self.voices.remove(i));
            } else {
                i += 1;
            }
        }
        expired
    }

    pub fn drain_all(&mut self) -> Vec<Voice<V>> {
        self.voices.drain(..).collect()
    }

    pub fn drain_instrument(&mut self, instrument: &str) -> Vec<Voice<V>> {
        let mut drained = Vec::new();
        let mut i = 0;
        while i < self.voices.len() {
            if self.voices[i].instrument == instrument {
                drained.push(self.voices.remove(i));
            } else {
                i += 1;
            }
        }
        drained
    }

    pub fn voices(&self) -> &[Voice<V>] {
        &self.voices
    }

    pub fn voices_mut(&mut self) -> &mut [Voice<V>] {
        &mut self.voices
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn make_voice(alloc: &mut VoiceAllocator<()>, instrument: &str, velocity: f32) -> Voice<()> {
        Voice {
            id: alloc.next_id(),
            instrument: instrument.to_string(),
            velocity,
            spawn_time: Instant::now(),
            release_state: None,
            payload: (),
        }
    }

    #[test]
    fn retrigger_always_steals_the_sounding_voice() {
        let mut alloc = VoiceAllocator::new();
        let v = make_voice(&mut alloc, "kick", 0.8);
        alloc.add(v);
        let stolen = alloc.steal_for_trigger("kick");
        assert_eq!(stolen.len(), 1);
        assert!(alloc.voices().is_empty());
    }

    #[test]
    fn different_instruments_do_not_steal_each_other() {
        let mut alloc = VoiceAllocator::new();
        let kick = make_voice(&mut alloc, "kick", 0.8);
        alloc.add(kick);
        let stolen = alloc.steal_for_trigger("snare");
        assert!(stolen.is_empty());
        assert_eq!(alloc.voices().len(), 1);
    }

    #[test]
    fn cleanup_expired_removes_only_fully_released_voices() {
        let mut alloc = VoiceAllocator::new();
        let mut v1 = make_voice(&mut alloc, "kick", 0.8);
        v1.spawn_time = Instant::now() - Duration::from_secs(5);
        v1.release_state = Some((Instant::now() - Duration::from_secs(2), 0.1));
        alloc.add(v1);
        let v2 = make_voice(&mut alloc, "snare", 0.8);
        alloc.add(v2);

        let expired = alloc.cleanup_expired();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].instrument, "kick");
        assert_eq!(alloc.voices().len(), 1);
    }

    #[test]
    fn drain_instrument_only_removes_matching_voices() {
        let mut alloc = VoiceAllocator::new();
        let kick = make_voice(&mut alloc, "kick", 0.8);
        alloc.add(kick);
        let snare = make_voice(&mut alloc, "snare", 0.8);
        alloc.add(snare);
        let drained = alloc.drain_instrument("kick");
        assert_eq!(drained.len(), 1);
        assert_eq!(alloc.voices().len(), 1);
        assert_eq!(alloc.voices()[0].instrument, "snare");
    }
}
