//! Software audio graph, voice rendering, and real-time output (§4.C, §5).
//!
//! There is no Web Audio API available outside a browser, so this crate
//! owns that role directly: the DSP graph, the voice allocator, the
//! procedural sample bank, and the `cpal` output stream, exposing a small
//! command/snapshot surface for the scheduler (in `groovecraft-engine`) to
//! drive from the host thread.

pub mod device;
pub mod effects;
pub mod envelope;
pub mod graph;
pub mod synth;
pub mod triple_buffer;
pub mod voice;

pub use device::{AudioCommand, AudioDevice, AudioDiagnostic, DeviceError};
pub use envelope::{Envelope, EnvelopeStage, VoiceKind};
pub use graph::{AudioGraph, InstrumentChain, MasterChain, VoiceRenderer};
pub use synth::{build_sample_bank, SampleBuffer, BUILTIN_SAMPLE_NAMES};
pub use voice::{Voice, VoiceAllocator, MAX_VOICES_PER_INSTRUMENT};
