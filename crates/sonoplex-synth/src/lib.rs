//! Sonoplex Synth - synthesized decoders and the PC-speaker tone engine
//!
//! Everything in this crate is a [`sonoplex_decode::Decoder`] whose samples
//! come from a synthesizer rather than a stored PCM stream: a Standard MIDI
//! File sequencer, the CMF/OPB/VGM chip-tracker family, and the MML-driven
//! PC-speaker square-wave generator.
//!
//! # Modules
//!
//! - [`sequencer`] - Standard MIDI File playback (`SequencerDecoder`)
//! - [`chipdecode`] - CMF, OPB, and VGM/VGZ chip-tracker decoders
//! - [`mml`] - MML text -> tone-event compiler
//! - [`pcspeaker`] - tone queue + square-wave decoder driven by MML/`sound`/`beep`
//!
//! Bit-exact chip emulation (OPL/YM/PSG) and General MIDI patch banks are
//! intentionally out of scope; these decoders implement the pull-based
//! contract and produce audible, deterministic output standing in for the
//! real synthesizer engines.

pub mod chipdecode;
pub mod error;
pub mod mml;
pub mod pcspeaker;
pub mod sequencer;

pub use chipdecode::{CmfDecoder, OpbDecoder, VgmDecoder};
pub use error::{Error, Result};
pub use mml::{Articulation, Event, MmlError, MmlProgram, MmlState, Tone};
pub use pcspeaker::{PcSpeakerDecoder, PcSpeakerStream, ToneQueue};
pub use sequencer::SequencerDecoder;

use sonoplex_decode::DecoderRegistry;

/// Register every synthesized-decoder sniffer/constructor in this crate
/// into `registry`, MIDI family first, then the chip-tracker formats. The
/// PC-speaker decoder is not registered here: it is never sniffed from a
/// byte stream, only created explicitly via `device.create_pc_speaker_stream()`.
pub fn register_synth_decoders(registry: &mut DecoderRegistry) {
    registry.register(SequencerDecoder::sniff, || Box::new(SequencerDecoder::new()));
    registry.register(CmfDecoder::sniff, || Box::new(CmfDecoder::new()));
    registry.register(OpbDecoder::sniff, || Box::new(OpbDecoder::new()));
    registry.register(VgmDecoder::sniff, || Box::new(VgmDecoder::new()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_synth_decoders_adds_four_entries() {
        let mut registry = DecoderRegistry::new();
        register_synth_decoders(&mut registry);
        assert_eq!(registry.len(), 4);
    }
}
