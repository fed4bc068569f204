//! `cpal` output stream wiring: the triple buffer carrying pattern
//! snapshots from the host thread to the audio callback, the bounded
//! command queue carrying discrete trigger/transport events, and the
//! callback itself (§5, §10.2).
//!
//! The callback never allocates, locks, or logs. Anything it needs to tell
//! the host (an underrun, a malformed trigger) goes out on a second
//! bounded channel that the host thread drains on its own schedule.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use groovecraft_types::Pattern;

use crate::envelope::{Envelope, VoiceKind};
use crate::graph::{AudioGraph, VoiceRenderer};
use crate::triple_buffer::{triple_buffer_with, TripleBufferReader, TripleBufferWriter};
use crate::voice::{Voice, VoiceAllocator};

/// Real-time event sent from the host thread (scheduler) to the audio
/// callback. Carries only what the callback needs to spawn or release a
/// voice; everything else it reads from the pattern snapshot.
#[derive(Debug, Clone)]
pub enum AudioCommand {
    TriggerHit { instrument: String, velocity: f32 },
    ReleaseHit { instrument: String },
    SetVolume(f32),
    AllNotesOff,
}

/// Diagnostic posted back from the callback thread for the host to log.
/// Never blocks the callback: the host-side channel is drained opportunistically.
#[derive(Debug, Clone)]
pub enum AudioDiagnostic {
    CommandQueueOverflow,
    StreamUnderrun,
}

const COMMAND_QUEUE_CAPACITY: usize = 256;
const DIAGNOSTIC_QUEUE_CAPACITY: usize = 64;

/// Host-side handle to a running audio stream: the pattern snapshot
/// writer, the command sender, and the diagnostic receiver. Dropping this
/// (or calling `stop`) tears the stream down.
pub struct AudioDevice {
    stream: cpal::Stream,
    pattern_writer: TripleBufferWriter<Option<Arc<Pattern>>>,
    command_tx: Sender<AudioCommand>,
    diagnostics_rx: Receiver<AudioDiagnostic>,
    sample_rate: f32,
}

#[derive(Debug)]
pub enum DeviceError {
    NoOutputDevice,
    UnsupportedConfig(String),
    BuildStream(String),
    PlayStream(String),
}

impl std::fmt::Display for DeviceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceError::NoOutputDevice => write!(f, "no audio output device available"),
            DeviceError::UnsupportedConfig(msg) => write!(f, "unsupported output config: {msg}"),
            DeviceError::BuildStream(msg) => write!(f, "failed to build output stream: {msg}"),
            DeviceError::PlayStream(msg) => write!(f, "failed to start output stream: {msg}"),
        }
    }
}

impl std::error::Error for DeviceError {}

impl AudioDevice {
    /// Open the default output device and start streaming silence until
    /// the first pattern is pushed via `set_pattern`.
    pub fn open(initial_pattern: Option<Arc<Pattern>>) -> Result<Self, DeviceError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(DeviceError::NoOutputDevice)?;
        let config = device
            .default_output_config()
            .map_err(|e| DeviceError::UnsupportedConfig(e.to_string()))?;
        let sample_rate = config.sample_rate().0 as f32;

        let (pattern_writer, pattern_reader) = triple_buffer_with(initial_pattern);
        let (command_tx, command_rx) = crossbeam_channel::bounded(COMMAND_QUEUE_CAPACITY);
        let (diagnostics_tx, diagnostics_rx) = crossbeam_channel::bounded(DIAGNOSTIC_QUEUE_CAPACITY);

        let channels = config.channels() as usize;
        let sample_format = config.sample_format();
        let stream_config: cpal::StreamConfig = config.into();

        let callback_state = CallbackState::new(sample_rate, pattern_reader, command_rx, diagnostics_tx);

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &stream_config, channels, callback_state),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &stream_config, channels, callback_state),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &stream_config, channels, callback_state),
            other => return Err(DeviceError::UnsupportedConfig(format!("{other:?}"))),
        }?;

        stream.play().map_err(|e| DeviceError::PlayStream(e.to_string()))?;

        Ok(Self {
            stream,
            pattern_writer,
            command_tx,
            diagnostics_rx,
            sample_rate,
        })
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    /// Publish a new pattern snapshot. Safe to call from the host thread at
    /// any time; the callback picks it up on its next block.
    pub fn set_pattern(&self, pattern: Option<Arc<Pattern>>) {
        self.pattern_writer.write(pattern);
    }

    /// Enqueue a real-time event. Drops (and logs via the diagnostics
    /// channel, not directly) if the bounded queue is full rather than
    /// blocking the host thread.
    pub fn send_command(&self, command: AudioCommand) {
        let _ = self.command_tx.try_send(command);
    }

    /// Drain pending diagnostics for the host to log.
    pub fn drain_diagnostics(&self) -> Vec<AudioDiagnostic> {
        let mut out = Vec::new();
        while let Ok(d) = self.diagnostics_rx.try_recv() {
            out.push(d);
        }
        out
    }

    pub fn pause(&self) -> Result<(), DeviceError> {
        self.stream.pause().map_err(|e| DeviceError::PlayStream(e.to_string()))
    }

    pub fn resume(&self) -> Result<(), DeviceError> {
        self.stream.play().map_err(|e| DeviceError::PlayStream(e.to_string()))
    }
}

/// State owned entirely by the audio callback closure; never touched from
/// the host thread.
struct CallbackState {
    sample_rate: f32,
    pattern_reader: TripleBufferReader<Option<Arc<Pattern>>>,
    command_rx: Receiver<AudioCommand>,
    diagnostics_tx: Sender<AudioDiagnostic>,
    current_pattern: Option<Arc<Pattern>>,
    graph: Option<AudioGraph>,
    allocator: VoiceAllocator<VoiceRenderer>,
    volume: f32,
    dt_s: f32,
}

impl CallbackState {
    fn new(
        sample_rate: f32,
        pattern_reader: TripleBufferReader<Option<Arc<Pattern>>>,
        command_rx: Receiver<AudioCommand>,
        diagnostics_tx: Sender<AudioDiagnostic>,
    ) -> Self {
        Self {
            sample_rate,
            pattern_reader,
            command_rx,
            diagnostics_tx,
            current_pattern: None,
            graph: None,
            allocator: VoiceAllocator::new(),
            volume: 1.0,
            dt_s: 1.0 / sample_rate,
        }
    }

    fn refresh_pattern(&mut self) {
        if self.pattern_reader.has_fresh() {
            let next = self.pattern_reader.read();
            match (&next, &mut self.graph) {
                (Some(pattern), Some(graph)) => graph.reconfigure(pattern),
                (Some(pattern), None) => self.graph = Some(AudioGraph::from_pattern(pattern)),
                (None, _) => self.graph = None,
            }
            self.current_pattern = next;
        }
    }

    fn drain_commands(&mut self) {
        loop {
            match self.command_rx.try_recv() {
                Ok(AudioCommand::TriggerHit { instrument, velocity }) => self.trigger(instrument, velocity),
                Ok(AudioCommand::ReleaseHit { instrument }) => {
                    self.allocator.mark_released(&instrument, 0.05);
                }
                Ok(AudioCommand::SetVolume(v)) => self.volume = v,
                Ok(AudioCommand::AllNotesOff) => {
                    for voice in self.allocator.drain_all() {
                        drop(voice);
                    }
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => break,
            }
        }
    }

    fn trigger(&mut self, instrument: String, velocity: f32) {
        let Some(pattern) = &self.current_pattern else {
            return;
        };
        for stolen in self.allocator.steal_for_trigger(&instrument) {
            drop(stolen);
        }

        let kind = VoiceKind::for_instrument_name(&instrument);
        let envelope = pattern
            .envelope_modules
            .get(&instrument)
            .map(|cfg| Envelope::new(*cfg, self.sample_rate))
            .unwrap_or_else(|| Envelope::fallback_for_kind(kind, self.sample_rate));

        let sample_module = pattern.sample_modules.get(&instrument);
        let sample_name = sample_module.map(|m| m.sample.as_str()).unwrap_or(&instrument);
        let bank_frames = self.graph.as_ref().and_then(|g| g.sample(sample_name)).map(|s| s.frames.clone());

        let renderer = if let Some(frames) = bank_frames {
            let gain_linear = sample_module.map(|m| 10f32.powf(m.gain as f32 * 3.0 / 20.0)).unwrap_or(1.0);
            VoiceRenderer::for_sample(instrument.clone(), frames, envelope, velocity, gain_linear, self.sample_rate)
        } else {
            let note_hz = pattern
                .note_modules
                .get(&instrument)
                .map(|n| n.pitch_hz)
                .unwrap_or_else(|| crate::synth::default_note_hz(kind));
            VoiceRenderer::for_synth(instrument.clone(), kind, note_hz, envelope, velocity, self.sample_rate)
        };

        let id = self.allocator.next_id();
        self.allocator.add(Voice {
            id,
            instrument,
            velocity,
            spawn_time: std::time::Instant::now(),
            release_state: None,
            payload: renderer,
        });
    }

    /// Render one stereo frame.
    fn next_frame(&mut self) -> (f32, f32) {
        if let Some(graph) = &mut self.graph {
            graph.advance_lfos(self.dt_s);
        }

        let mut mix_l = 0.0f32;
        let mut mix_r = 0.0f32;

        for voice in self.allocator.voices_mut() {
            let sample = voice.payload.next_sample();
            let (l, r) = match self.graph.as_mut().and_then(|g| g.instrument_chain_mut(&voice.instrument)) {
                Some(chain) => chain.process(sample),
                None => (sample, sample),
            };
            mix_l += l;
            mix_r += r;
        }

        self.allocator.cleanup_expired();

        let (l, r) = match &mut self.graph {
            Some(graph) => graph.master.process(mix_l, mix_r),
            None => (mix_l, mix_r),
        };
        (l * self.volume, r * self.volume)
    }

    fn tick(&mut self) -> (f32, f32) {
        self.refresh_pattern();
        self.drain_commands();
        self.next_frame()
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut state: CallbackState,
) -> Result<cpal::Stream, DeviceError>
where
    T: SizedSample + FromSample<f32>,
{
    let diagnostics_tx = state.diagnostics_tx.clone();
    let err_fn = move |err| {
        let _ = diagnostics_tx.try_send(AudioDiagnostic::StreamUnderrun);
        let _ = err;
    };

    device
        .build_output_stream(
            config,
            move |output: &mut [T], _info: &cpal::OutputCallbackInfo| {
                for frame in output.chunks_mut(channels) {
                    let (l, r) = state.tick();
                    for (i, sample) in frame.iter_mut().enumerate() {
                        let value = if i % 2 == 0 { l } else { r };
                        *sample = T::from_sample(value);
                    }
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| DeviceError::BuildStream(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn callback_state_produces_silence_with_no_pattern() {
        let (_writer, reader) = triple_buffer_with(None);
        let (_tx, rx) = crossbeam_channel::bounded(8);
        let (dtx, _drx) = crossbeam_channel::bounded(8);
        let mut state = CallbackState::new(44_100.0, reader, rx, dtx);
        let (l, r) = state.tick();
        assert_eq!(l, 0.0);
        assert_eq!(r, 0.0);
    }

    #[test]
    fn trigger_without_pattern_is_a_no_op() {
        let (_writer, reader) = triple_buffer_with(None);
        let (tx, rx) = crossbeam_channel::bounded(8);
        let (dtx, _drx) = crossbeam_channel::bounded(8);
        let mut state = CallbackState::new(44_100.0, reader, rx, dtx);
        tx.send(AudioCommand::TriggerHit {
            instrument: "kick".to_string(),
            velocity: 1.0,
        })
        .unwrap();
        state.tick();
        assert!(state.allocator.voices().is_empty());
    }
}
