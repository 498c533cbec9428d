//! WinKeyer host-interface command builders.
//!
//! This module provides functions to construct the byte sequences for the
//! keyer module's host commands (interface open/close, mode, weighting, pin
//! configuration, PTT timing, speed-pot range, speed, stop, tune).
//!
//! All functions are pure -- they produce byte vectors without performing any
//! I/O. The caller is responsible for writing the bytes over the serial
//! transport.
//!
//! # Command reference
//!
//! Commands are a one-byte opcode followed by zero or more argument bytes:
//!
//! - `0x00 0x02` -- open host interface
//! - `0x00 0x03` -- close host interface
//! - `0x0E <mode>` -- set keyer mode register
//! - `0x03 <weight>` -- set weighting (10..=90, 50 = unweighted)
//! - `0x09 <pincfg>` -- set pin/sidetone configuration
//! - `0x04 <lead> <tail>` -- set PTT lead-in/tail, units of 10 ms
//! - `0x05 <min> <range> 0` -- set speed-pot range
//! - `0x02 <wpm>` -- set keying speed immediately
//! - `0x1C <wpm>` -- buffered speed change (takes effect in sequence)
//! - `0x0A` -- stop keying, flush the keyer's buffer
//! - `0x0B <1|0>` -- tune (continuous carrier) on/off
//!
//! Two further opcodes appear inline inside *buffered* text rather than as
//! host commands: `0x1B <a> <b>` merges two characters into a prosign, and
//! `0x1C <wpm>` (above) changes speed mid-message.

/// Inline prosign-merge opcode valid inside buffered text.
pub const MERGE_PROSIGN: u8 = 0x1B;
/// Inline buffered speed-change opcode.
pub const BUFFERED_SPEED: u8 = 0x1C;
/// Half-dit-space filler character; four in a row make a word gap.
pub const GAP_FILLER: u8 = b'|';

/// Mode register: disable the paddle watchdog.
const MODE_WATCHDOG_DISABLE: u8 = 0x80;
/// Mode register: echo serial (buffered) characters back as they are keyed.
const MODE_SERIAL_ECHO: u8 = 0x04;
// Iambic-B is key-mode 00 in bits 5..4, so it contributes no bits.

/// Pin config: assert PTT on the PTT output pin.
const PIN_PTT: u8 = 0x01;
/// Pin config: enable the sidetone oscillator output.
const PIN_SIDETONE: u8 = 0x02;
/// Pin config: key output 1 active.
const PIN_KEY1: u8 = 0x04;

/// Build the "open host interface" command (`0x00 0x02`).
///
/// Until this is sent the keyer ignores host commands and operates
/// standalone.
pub fn cmd_host_open() -> Vec<u8> {
    vec![0x00, 0x02]
}

/// Build the "close host interface" command (`0x00 0x03`).
///
/// Returns the keyer to standalone operation.
pub fn cmd_host_close() -> Vec<u8> {
    vec![0x00, 0x03]
}

/// Build a "set keyer mode" command (`0x0E <mode>`).
///
/// The mode register is composed for iambic-B keying with the paddle
/// watchdog disabled; serial echo-back is enabled when `echo` is set so the
/// daemon can relay keyed characters to its clients.
pub fn cmd_set_mode(echo: bool) -> Vec<u8> {
    let mut mode = MODE_WATCHDOG_DISABLE;
    if echo {
        mode |= MODE_SERIAL_ECHO;
    }
    vec![0x0E, mode]
}

/// Build a "set weighting" command (`0x03 <weight>`).
///
/// The keyer accepts 10..=90; callers clamp before building.
pub fn cmd_set_weight(weight: u8) -> Vec<u8> {
    vec![0x03, weight]
}

/// Build a "set pin configuration" command (`0x09 <pincfg>`).
///
/// PTT and key output 1 are always driven; the sidetone oscillator is
/// enabled unless `mute` is set.
pub fn cmd_set_pin_config(mute: bool) -> Vec<u8> {
    let mut cfg = PIN_PTT | PIN_KEY1;
    if !mute {
        cfg |= PIN_SIDETONE;
    }
    vec![0x09, cfg]
}

/// Build a "set PTT lead-in/tail" command (`0x04 <lead> <tail>`).
///
/// Both values are in units of 10 ms.
pub fn cmd_set_ptt_timing(lead: u8, tail: u8) -> Vec<u8> {
    vec![0x04, lead, tail]
}

/// Build a "set speed-pot range" command (`0x05 <min> <range> 0`).
///
/// `min` is the pot's lowest WPM, `range` the span above it. The trailing
/// zero byte is fixed by the protocol.
pub fn cmd_set_pot_range(min: u8, range: u8) -> Vec<u8> {
    vec![0x05, min, range, 0]
}

/// Build a "set speed" command (`0x02 <wpm>`).
///
/// Takes effect immediately, even mid-character.
pub fn cmd_set_speed(wpm: u8) -> Vec<u8> {
    vec![0x02, wpm]
}

/// Build a buffered speed change (`0x1C <wpm>`).
///
/// Unlike [`cmd_set_speed`] this is queued with the text and takes effect
/// when the keyer reaches it in the buffer.
pub fn cmd_buffered_speed(wpm: u8) -> Vec<u8> {
    vec![BUFFERED_SPEED, wpm]
}

/// Build the "stop keying" command (`0x0A`).
///
/// Aborts the current transmission and flushes the keyer's own buffer.
pub fn cmd_stop() -> Vec<u8> {
    vec![0x0A]
}

/// Build a "tune" command (`0x0B <1|0>`).
///
/// `true` keys a continuous carrier, `false` releases it.
pub fn cmd_tune(on: bool) -> Vec<u8> {
    vec![0x0B, if on { 1 } else { 0 }]
}

/// Build a prosign merge (`0x1B <a> <b>`), keying two characters with no
/// inter-character space between them.
pub fn cmd_merge_prosign(a: u8, b: u8) -> Vec<u8> {
    vec![MERGE_PROSIGN, a, b]
}
