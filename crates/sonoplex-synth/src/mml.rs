//! MML (Music Macro Language) compiler: text in, a flat event list out.
//!
//! Single-pass, single-byte-lookahead parser in the style of a small
//! hand-rolled DSL reader — no external grammar crate, just a `Parser`
//! struct tracking a byte cursor. Non-strict mode degrades unknown commands
//! and out-of-range parameters to warnings and keeps going; strict mode
//! turns the same conditions into a [`MmlError`] carrying the byte position.

const C4_HZ: f32 = 261.63;

/// Articulation: how much of a note's nominal duration is actually sounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Articulation {
    Legato,
    Normal,
    Staccato,
}

impl Articulation {
    /// Fraction of a note's duration that is sounded (the rest is a gap).
    fn on_fraction(self) -> f32 {
        match self {
            Self::Legato => 1.0,
            Self::Normal => 0.875,
            Self::Staccato => 0.75,
        }
    }
}

/// Parser state, updated in place as commands are consumed.
#[derive(Debug, Clone, Copy)]
pub struct MmlState {
    pub octave: i32,
    pub tempo: u32,
    pub default_length: u32,
    pub volume: u8,
    pub articulation: Articulation,
}

impl Default for MmlState {
    fn default() -> Self {
        Self {
            octave: 4,
            tempo: 120,
            default_length: 4,
            volume: 8,
            articulation: Articulation::Normal,
        }
    }
}

/// A single compiled event: a note at a frequency, or a silent rest.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Note { freq_hz: f32, duration_ms: f32 },
    Rest { duration_ms: f32 },
}

/// A tone ready for the PC-speaker queue: `hz == 0.0` is silence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub hz: f32,
    pub duration_ms: u32,
}

/// Strict-mode parse failure with a byte position into the source text.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MmlError {
    #[error("unknown command '{ch}' at position {pos}")]
    UnknownCommand { pos: usize, ch: char },
    #[error("parameter out of range for '{command}' at position {pos}")]
    ParameterOutOfRange { pos: usize, command: char },
    #[error("unsupported articulation '{ch}' at position {pos}")]
    UnsupportedArticulation { pos: usize, ch: char },
}

/// Result of compiling MML text: the event list plus any non-strict warnings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MmlProgram {
    pub events: Vec<Event>,
    pub warnings: Vec<String>,
}

struct Parser<'a> {
    input: &'a [u8],
    pos: usize,
    strict: bool,
    state: MmlState,
    events: Vec<Event>,
    warnings: Vec<String>,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str, strict: bool) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
            strict,
            state: MmlState::default(),
            events: Vec::new(),
            warnings: Vec::new(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn peek_upper(&self) -> Option<u8> {
        self.peek().map(|b| b.to_ascii_uppercase())
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b) if b.is_ascii_whitespace()) {
            self.advance();
        }
    }

    /// Read an unsigned integer, if one starts at the current position.
    fn read_number(&mut self) -> Option<u32> {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_digit()) {
            self.advance();
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()
            .and_then(|s| s.parse().ok())
    }

    fn read_dots(&mut self) -> u32 {
        let mut dots = 0;
        while self.peek() == Some(b'.') {
            self.advance();
            dots += 1;
        }
        dots
    }

    fn note_ms(&mut self, pos: usize, length: Option<u32>, dots: u32) -> Option<f32> {
        let length = length.unwrap_or(self.state.default_length).max(1);
        let mut ms = 4.0 * 60_000.0 / (length as f32 * self.state.tempo as f32);
        let counted_dots = dots.min(2);
        for _ in 0..counted_dots {
            ms *= 1.5;
        }
        if dots > 2 {
            self.warn(pos, "extra MML dots beyond the second are ignored");
        }
        Some(ms)
    }

    fn warn(&mut self, pos: usize, message: &str) {
        self.warnings.push(format!("{message} at position {pos}"));
    }

    /// Consume a `cmd=...` variable-assignment form the original parser
    /// recognizes and ignores: skip to the next alphabetic or octave-shift
    /// token and emit a single warning, rather than tripping over the `=`
    /// as a malformed number.
    fn skip_assignment(&mut self, pos: usize) {
        self.advance(); // consume '='
        while matches!(self.peek(), Some(b) if !b.is_ascii_alphabetic() && b != b'<' && b != b'>') {
            self.advance();
        }
        self.warn(pos, "MML '=' assignment syntax is not supported and was skipped");
    }

    fn fail_or_warn(&mut self, pos: usize, err: MmlError) -> Result<(), MmlError> {
        if self.strict {
            Err(err)
        } else {
            self.warnings.push(err.to_string());
            Ok(())
        }
    }

    fn parse(&mut self) -> Result<(), MmlError> {
        loop {
            self.skip_ws();
            let Some(upper) = self.peek_upper() else {
                break;
            };
            let pos = self.pos;

            match upper {
                b'A'..=b'G' => self.parse_note(pos)?,
                b'R' | b'P' => self.parse_rest(pos)?,
                b'O' => self.parse_octave(pos)?,
                b'<' => {
                    self.advance();
                    self.state.octave = (self.state.octave - 1).clamp(0, 6);
                }
                b'>' => {
                    self.advance();
                    self.state.octave = (self.state.octave + 1).clamp(0, 6);
                }
                b'T' => self.parse_tempo(pos)?,
                b'L' => self.parse_default_length(pos)?,
                b'V' => self.parse_volume(pos)?,
                b'M' => self.parse_articulation(pos)?,
                other => {
                    self.advance();
                    self.fail_or_warn(
                        pos,
                        MmlError::UnknownCommand {
                            pos,
                            ch: other as char,
                        },
                    )?;
                }
            }
        }
        Ok(())
    }

    fn parse_note(&mut self, pos: usize) -> Result<(), MmlError> {
        let letter = self.peek_upper().unwrap();
        self.advance();

        let mut accidental = 0i32;
        match self.peek() {
            Some(b'#' | b'+') => {
                accidental = 1;
                self.advance();
            }
            Some(b'-') => {
                accidental = -1;
                self.advance();
            }
            _ => {}
        }

        let length = self.read_number();
        let dots = self.read_dots();
        let Some(duration_ms) = self.note_ms(pos, length, dots) else {
            return Ok(());
        };

        let freq_hz = note_frequency(letter as char, accidental, self.state.octave);
        self.events.push(Event::Note {
            freq_hz,
            duration_ms,
        });
        Ok(())
    }

    fn parse_rest(&mut self, pos: usize) -> Result<(), MmlError> {
        self.advance();
        let length = self.read_number();
        let dots = self.read_dots();
        let Some(duration_ms) = self.note_ms(pos, length, dots) else {
            return Ok(());
        };
        self.events.push(Event::Rest { duration_ms });
        Ok(())
    }

    fn parse_octave(&mut self, pos: usize) -> Result<(), MmlError> {
        self.advance();
        if self.peek() == Some(b'=') {
            self.skip_assignment(pos);
            return Ok(());
        }
        match self.read_number() {
            Some(n) if (0..=6).contains(&n) => self.state.octave = n as i32,
            Some(_) => {
                self.fail_or_warn(
                    pos,
                    MmlError::ParameterOutOfRange {
                        pos,
                        command: 'O',
                    },
                )?;
            }
            None => {
                self.fail_or_warn(
                    pos,
                    MmlError::ParameterOutOfRange {
                        pos,
                        command: 'O',
                    },
                )?;
            }
        }
        Ok(())
    }

    fn parse_tempo(&mut self, pos: usize) -> Result<(), MmlError> {
        self.advance();
        if self.peek() == Some(b'=') {
            self.skip_assignment(pos);
            return Ok(());
        }
        match self.read_number() {
            Some(n) if (32..=255).contains(&n) => self.state.tempo = n,
            Some(n) => {
                self.state.tempo = n.clamp(32, 255);
                self.warn(pos, "MML tempo out of range, clamped");
            }
            None => {
                self.fail_or_warn(
                    pos,
                    MmlError::ParameterOutOfRange {
                        pos,
                        command: 'T',
                    },
                )?;
            }
        }
        Ok(())
    }

    fn parse_default_length(&mut self, pos: usize) -> Result<(), MmlError> {
        self.advance();
        if self.peek() == Some(b'=') {
            self.skip_assignment(pos);
            return Ok(());
        }
        match self.read_number() {
            Some(n) if (1..=64).contains(&n) => self.state.default_length = n,
            _ => {
                self.state.default_length = 4;
                self.warn(pos, "invalid MML default length, reset to 4");
            }
        }
        Ok(())
    }

    fn parse_volume(&mut self, pos: usize) -> Result<(), MmlError> {
        self.advance();
        if self.peek() == Some(b'=') {
            self.skip_assignment(pos);
            return Ok(());
        }
        match self.read_number() {
            Some(n) if n <= 15 => self.state.volume = n as u8,
            Some(n) => {
                self.state.volume = n.clamp(0, 15) as u8;
                self.warn(pos, "MML volume out of range, clamped");
            }
            None => {
                self.fail_or_warn(
                    pos,
                    MmlError::ParameterOutOfRange {
                        pos,
                        command: 'V',
                    },
                )?;
            }
        }
        Ok(())
    }

    fn parse_articulation(&mut self, pos: usize) -> Result<(), MmlError> {
        self.advance();
        self.skip_ws();
        let Some(sub) = self.peek_upper() else {
            return self.fail_or_warn(
                pos,
                MmlError::UnsupportedArticulation { pos, ch: 'M' },
            );
        };
        self.advance();
        match sub {
            b'L' => self.state.articulation = Articulation::Legato,
            b'N' => self.state.articulation = Articulation::Normal,
            b'S' => self.state.articulation = Articulation::Staccato,
            b'F' | b'B' => {
                self.fail_or_warn(
                    pos,
                    MmlError::UnsupportedArticulation {
                        pos,
                        ch: sub as char,
                    },
                )?;
            }
            other => {
                self.fail_or_warn(
                    pos,
                    MmlError::UnsupportedArticulation {
                        pos,
                        ch: other as char,
                    },
                )?;
            }
        }
        Ok(())
    }
}

/// Equal-temperament note frequency; `octave == 4` and `accidental == 0`
/// reproduces `C4 == 261.63`.
#[must_use]
pub fn note_frequency(letter: char, accidental: i32, octave: i32) -> f32 {
    let base_semitone = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => 0,
    };
    let semitones = base_semitone + accidental + (octave - 4) * 12;
    C4_HZ * 2f32.powf(semitones as f32 / 12.0)
}

/// Compile `text` into an [`MmlProgram`]. In strict mode the first malformed
/// command aborts parsing with an [`MmlError`]; otherwise it is recorded as
/// a warning and parsing continues.
///
/// # Errors
///
/// Returns [`MmlError`] only when `strict` is `true`.
pub fn parse_mml(text: &str, strict: bool) -> Result<MmlProgram, MmlError> {
    let mut parser = Parser::new(text, strict);
    parser.parse()?;
    Ok(MmlProgram {
        events: parser.events,
        warnings: parser.warnings,
    })
}

/// Convert a compiled event list into PC-speaker tones, applying
/// `articulation` to every note (legato emits one tone with no trailing
/// gap; normal/staccato split into a sounded tone and a silent rest).
///
/// Tone/rest millisecond splits truncate rather than round, so the two
/// always sum back to the exact integer-millisecond event duration.
#[must_use]
pub fn events_to_tones(events: &[Event], articulation: Articulation) -> Vec<Tone> {
    let mut tones = Vec::with_capacity(events.len() * 2);
    for event in events {
        match *event {
            Event::Rest { duration_ms } => tones.push(Tone {
                hz: 0.0,
                duration_ms: duration_ms as u32,
            }),
            Event::Note {
                freq_hz,
                duration_ms,
            } => {
                let total_ms = duration_ms as u32;
                if articulation == Articulation::Legato {
                    tones.push(Tone {
                        hz: freq_hz,
                        duration_ms: total_ms,
                    });
                    continue;
                }
                let on_ms = (duration_ms * articulation.on_fraction()) as u32;
                let off_ms = total_ms - on_ms;
                tones.push(Tone {
                    hz: freq_hz,
                    duration_ms: on_ms,
                });
                if off_ms > 0 {
                    tones.push(Tone {
                        hz: 0.0,
                        duration_ms: off_ms,
                    });
                }
            }
        }
    }
    tones
}

/// Inverse of `note_frequency` over the range the parser can ever produce
/// (octaves 0..=6, natural/sharp/flat). Exhaustive rather than a log2
/// inversion so it never drifts from what `note_frequency` actually emits.
fn freq_to_note(freq_hz: f32) -> Option<(char, i32, i32)> {
    for octave in 0..=6i32 {
        for letter in ['C', 'D', 'E', 'F', 'G', 'A', 'B'] {
            for accidental in [0i32, 1, -1] {
                if (note_frequency(letter, accidental, octave) - freq_hz).abs() < 1e-3 {
                    return Some((letter, accidental, octave));
                }
            }
        }
    }
    None
}

/// Inverse of the length/dots duration formula in `Parser::note_ms`, over
/// the full tempo/length/dots range the parser accepts. Returns the first
/// `(tempo, length, dots)` triple whose duration matches `duration_ms`.
fn duration_to_tempo_length_dots(duration_ms: f32) -> Option<(u32, u32, u32)> {
    for tempo in 32..=255u32 {
        for length in 1..=64u32 {
            let mut ms = 4.0 * 60_000.0 / (length as f32 * tempo as f32);
            for dots in 0..=2u32 {
                if (ms - duration_ms).abs() < 1e-3 {
                    return Some((tempo, length, dots));
                }
                ms *= 1.5;
            }
        }
    }
    None
}

/// Render a compiled event list back to canonical MML text: every note/rest
/// is preceded by an explicit `T`/`L`/`O` reset so the emitted text carries
/// no state inherited from a previous event, making re-parsing it
/// independent of any particular default state. Used to check the
/// parse -> stringify -> parse idempotence law.
///
/// Returns `None` if any event's frequency or duration falls outside what
/// the parser's grammar can express (it always succeeds for events produced
/// by [`parse_mml`] itself).
#[must_use]
pub fn events_to_mml_text(events: &[Event]) -> Option<String> {
    let mut out = String::new();
    for event in events {
        match *event {
            Event::Note { freq_hz, duration_ms } => {
                let (letter, accidental, octave) = freq_to_note(freq_hz)?;
                let (tempo, length, dots) = duration_to_tempo_length_dots(duration_ms)?;
                out.push_str(&format!("O{octave}T{tempo}L{length}{letter}"));
                match accidental {
                    1 => out.push('#'),
                    -1 => out.push('-'),
                    _ => {}
                }
                out.extend(std::iter::repeat('.').take(dots as usize));
                out.push(' ');
            }
            Event::Rest { duration_ms } => {
                let (tempo, length, dots) = duration_to_tempo_length_dots(duration_ms)?;
                out.push_str(&format!("T{tempo}L{length}R"));
                out.extend(std::iter::repeat('.').take(dots as usize));
                out.push(' ');
            }
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn c4_is_261_63_hz() {
        let f = note_frequency('C', 0, 4);
        assert!((f - 261.63).abs() < 0.01);
    }

    #[test]
    fn octave_shift_doubles_frequency() {
        let c4 = note_frequency('C', 0, 4);
        let c5 = note_frequency('C', 0, 5);
        assert!((c5 - c4 * 2.0).abs() < 0.01);
    }

    #[test]
    fn tempo_120_l4_c_is_one_note_at_500ms() {
        let program = parse_mml("T120 L4 C", true).unwrap();
        assert_eq!(program.events.len(), 1);
        match program.events[0] {
            Event::Note {
                freq_hz,
                duration_ms,
            } => {
                assert!((freq_hz - 261.63).abs() < 0.01);
                assert!((duration_ms - 500.0).abs() < 0.01);
            }
            _ => panic!("expected a note event"),
        }
    }

    #[test]
    fn normal_articulation_splits_500ms_note_into_437_and_63() {
        let program = parse_mml("T120 L4 C", true).unwrap();
        let tones = events_to_tones(&program.events, Articulation::Normal);
        assert_eq!(tones.len(), 2);
        assert_eq!(tones[0].duration_ms, 437);
        assert!(tones[0].hz > 0.0);
        assert_eq!(tones[1].duration_ms, 63);
        assert_eq!(tones[1].hz, 0.0);
    }

    #[test]
    fn legato_emits_a_single_full_duration_tone() {
        let program = parse_mml("T120 L4 C", true).unwrap();
        let tones = events_to_tones(&program.events, Articulation::Legato);
        assert_eq!(tones.len(), 1);
        assert_eq!(tones[0].duration_ms, 500);
    }

    #[test]
    fn dots_multiply_duration_by_one_point_five_per_dot() {
        let program = parse_mml("T120 L4 C.", true).unwrap();
        let Event::Note { duration_ms, .. } = program.events[0] else {
            panic!("expected note");
        };
        assert!((duration_ms - 750.0).abs() < 0.01);
    }

    #[test]
    fn rest_command_emits_rest_event() {
        let program = parse_mml("R4", true).unwrap();
        assert_eq!(program.events.len(), 1);
        assert!(matches!(program.events[0], Event::Rest { .. }));
    }

    #[test]
    fn octave_shift_commands_clamp_at_bounds() {
        let program = parse_mml("<<<<<<<<<C", true).unwrap();
        let Event::Note { freq_hz, .. } = program.events[0] else {
            panic!("expected note");
        };
        let floor = note_frequency('C', 0, 0);
        assert!((freq_hz - floor).abs() < 0.01);
    }

    #[test]
    fn strict_mode_rejects_unknown_command() {
        let err = parse_mml("Z", true).unwrap_err();
        assert!(matches!(err, MmlError::UnknownCommand { pos: 0, ch: 'Z' }));
    }

    #[test]
    fn non_strict_mode_warns_and_continues_past_unknown_command() {
        let program = parse_mml("ZC", false).unwrap();
        assert_eq!(program.events.len(), 1);
        assert_eq!(program.warnings.len(), 1);
    }

    #[test]
    fn non_strict_mode_clamps_out_of_range_tempo_with_a_warning() {
        let program = parse_mml("T999 C", false).unwrap();
        assert_eq!(program.warnings.len(), 1);
        assert_eq!(program.events.len(), 1);
    }

    #[test]
    fn assignment_syntax_emits_one_warning_and_skips_to_next_command() {
        let program = parse_mml("T=120 C", false).unwrap();
        assert_eq!(program.warnings.len(), 1);
        assert_eq!(program.events.len(), 1);
        assert!(matches!(program.events[0], Event::Note { .. }));
    }

    #[test]
    fn foreground_background_articulation_warns_in_non_strict_mode() {
        let program = parse_mml("MF C", false).unwrap();
        assert_eq!(program.warnings.len(), 1);
    }

    #[test]
    fn strict_mode_rejects_foreground_background_articulation() {
        let err = parse_mml("MF", true).unwrap_err();
        assert!(matches!(
            err,
            MmlError::UnsupportedArticulation { ch: 'F', .. }
        ));
    }
}
