//! Morse text encoding.
//!
//! Turns a client text payload into the sequence of byte units queued for
//! the keyer: plain characters pass through one byte at a time, a handful of
//! punctuation characters map to prosign merges or substitutions, `+`/`-`
//! nudge the live speed by 2 WPM via buffered speed changes, and `~` opens a
//! word-gap span that pads the next emission with filler characters.
//!
//! The encoder is stateful only for the gap span, which may remain open at
//! the end of a payload and close on the first emission of a later one.

use crate::keyer::commands;

/// One keyer-bound transmission: a single character or a multi-byte inline
/// command. Queued in FIFO order and consumed exactly once.
pub type OutgoingUnit = Vec<u8>;

/// Inline speed nudges move in steps of 2 WPM.
const NUDGE_STEP: u8 = 2;
/// `+` stops nudging up once the live speed reaches this.
const NUDGE_CEILING: u8 = 90;
/// `-` stops nudging down once the live speed falls to this.
const NUDGE_FLOOR: u8 = 8;
/// Number of filler characters inserted for a `~` word gap.
const GAP_FILLERS: usize = 4;

/// Characters passed to the keyer unchanged, besides letters and digits.
const PLAIN_PUNCTUATION: &[u8] = b"')/:<=>?@| ,.\x08";

/// Stateful payload encoder. One instance lives for the daemon's lifetime so
/// a `~` span can straddle datagram boundaries.
#[derive(Debug, Default)]
pub struct TextEncoder {
    gap_pending: bool,
}

impl TextEncoder {
    pub fn new() -> Self {
        Self { gap_pending: false }
    }

    /// Encode one payload into outgoing units, mutating `speed` as inline
    /// nudges are applied so consecutive nudges compound.
    pub fn encode(&mut self, payload: &[u8], speed: &mut u8) -> Vec<OutgoingUnit> {
        let mut units = Vec::new();
        for &raw in payload {
            let c = raw.to_ascii_uppercase();
            match c {
                0x00 => break,
                b'~' => self.gap_pending = true,
                b'&' => self.emit(&mut units, commands::cmd_merge_prosign(b'A', b'S')),
                b'!' => self.emit(&mut units, commands::cmd_merge_prosign(b'S', b'N')),
                b'(' => self.emit(&mut units, vec![b')']),
                b'*' => self.emit(&mut units, vec![b'<']),
                b'+' => {
                    if *speed < NUDGE_CEILING {
                        *speed += NUDGE_STEP;
                        self.emit(&mut units, commands::cmd_buffered_speed(*speed));
                    }
                }
                b'-' => {
                    if *speed > NUDGE_FLOOR {
                        *speed -= NUDGE_STEP;
                        self.emit(&mut units, commands::cmd_buffered_speed(*speed));
                    }
                }
                c if is_plain(c) => self.emit(&mut units, vec![c]),
                _ => {} // unsupported character, silently dropped
            }
        }
        units
    }

    /// Append one unit, flushing a pending word gap first.
    fn emit(&mut self, units: &mut Vec<OutgoingUnit>, unit: OutgoingUnit) {
        if self.gap_pending {
            for _ in 0..GAP_FILLERS {
                units.push(vec![commands::GAP_FILLER]);
            }
            self.gap_pending = false;
        }
        units.push(unit);
    }
}

fn is_plain(c: u8) -> bool {
    c.is_ascii_digit() || c.is_ascii_uppercase() || PLAIN_PUNCTUATION.contains(&c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_one(payload: &[u8], speed: u8) -> (Vec<OutgoingUnit>, u8) {
        let mut enc = TextEncoder::new();
        let mut speed = speed;
        let units = enc.encode(payload, &mut speed);
        (units, speed)
    }

    #[test]
    fn plain_text_passes_through() {
        let (units, speed) = encode_one(b"CQ CQ", 24);
        let expected: Vec<OutgoingUnit> = vec![
            vec![b'C'],
            vec![b'Q'],
            vec![b' '],
            vec![b'C'],
            vec![b'Q'],
        ];
        assert_eq!(units, expected);
        assert_eq!(speed, 24);
    }

    #[test]
    fn lowercase_is_uppercased() {
        let (units, _) = encode_one(b"de", 24);
        assert_eq!(units, vec![vec![b'D'], vec![b'E']]);
    }

    #[test]
    fn decrements_compound_within_payload() {
        let (units, speed) = encode_one(b"TEST---", 24);
        assert_eq!(speed, 18);
        assert_eq!(
            units,
            vec![
                vec![b'T'],
                vec![b'E'],
                vec![b'S'],
                vec![b'T'],
                vec![0x1C, 22],
                vec![0x1C, 20],
                vec![0x1C, 18],
            ]
        );
    }

    #[test]
    fn increments_stop_at_ceiling() {
        let (units, speed) = encode_one(b"+++", 86);
        assert_eq!(speed, 90);
        assert_eq!(units, vec![vec![0x1C, 88], vec![0x1C, 90]]);
    }

    #[test]
    fn decrements_stop_at_floor() {
        let (units, speed) = encode_one(b"---", 10);
        assert_eq!(speed, 8);
        assert_eq!(units, vec![vec![0x1C, 8]]);
    }

    #[test]
    fn prosign_merges() {
        let (units, _) = encode_one(b"&!", 24);
        assert_eq!(units, vec![vec![0x1B, b'A', b'S'], vec![0x1B, b'S', b'N']]);
    }

    #[test]
    fn substitutions() {
        let (units, _) = encode_one(b"(*", 24);
        assert_eq!(units, vec![vec![b')'], vec![b'<']]);
    }

    #[test]
    fn nul_terminates_payload() {
        let (units, _) = encode_one(b"AB\x00CD", 24);
        assert_eq!(units, vec![vec![b'A'], vec![b'B']]);
    }

    #[test]
    fn unsupported_characters_are_dropped() {
        let (units, _) = encode_one(b"A#B$C", 24);
        assert_eq!(units, vec![vec![b'A'], vec![b'B'], vec![b'C']]);
    }

    #[test]
    fn gap_span_pads_next_emission_once() {
        let (units, _) = encode_one(b"~AB", 24);
        assert_eq!(
            units,
            vec![
                vec![b'|'],
                vec![b'|'],
                vec![b'|'],
                vec![b'|'],
                vec![b'A'],
                vec![b'B'],
            ]
        );
    }

    #[test]
    fn repeated_tildes_open_one_span() {
        let (units, _) = encode_one(b"~~~K", 24);
        assert_eq!(units.len(), 5);
        assert_eq!(units[4], vec![b'K']);
    }

    #[test]
    fn gap_span_survives_across_payloads() {
        let mut enc = TextEncoder::new();
        let mut speed = 24;
        assert!(enc.encode(b"~", &mut speed).is_empty());
        let units = enc.encode(b"R", &mut speed);
        assert_eq!(
            units,
            vec![vec![b'|'], vec![b'|'], vec![b'|'], vec![b'|'], vec![b'R']]
        );
    }

    #[test]
    fn gap_applies_before_inline_speed_change() {
        let (units, speed) = encode_one(b"~+", 24);
        assert_eq!(speed, 26);
        assert_eq!(units.len(), 5);
        assert_eq!(units[4], vec![0x1C, 26]);
    }
}
