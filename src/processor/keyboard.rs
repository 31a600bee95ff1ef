//! Keyboard symbol decoding for `KeyboardType` batches.
//!
//! A symbol is a `u16` produced by the main MCU's keymap:
//!
//! ```text
//! 0xFFFF               untypeable code point, skipped
//! (s & 0x7F00) == 0    one key byte; bit 15 marks a dead key
//! otherwise            two key bytes, high byte first
//! ```
//!
//! Each key byte carries its modifiers in the top two bits.

use crate::app::ports::KeyboardPort;
use crate::error::KeyboardError;
use crate::interface::HidInterface;

pub const KEY_CTRL: u8 = 0x01;
pub const KEY_SHIFT: u8 = 0x02;
pub const KEY_RIGHT_ALT: u8 = 0x40;

pub const KEY_RETURN: u8 = 0x28;
pub const KEY_SPACE: u8 = 0x2C;
pub const KEY_DELETE: u8 = 0x4C;
/// Europe-2 as stored in the keymap; it collides with the modifier bits.
pub const KEY_EUROPE_2: u8 = 0x03;
/// Europe-2 as sent on the wire.
pub const KEY_EUROPE_2_REAL: u8 = 0x64;

pub const SHIFT_MASK: u8 = 0x80;
pub const ALTGR_MASK: u8 = 0x40;

const UNTYPEABLE: u16 = 0xFFFF;
const DEAD_KEY_BIT: u16 = 0x8000;
const SECOND_KEY_MASK: u16 = 0x7F00;

/// Key press derived from one stored key byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key: u8,
    pub modifier: u8,
}

impl KeyStroke {
    pub fn from_stored(byte: u8) -> Self {
        let masked = byte & (SHIFT_MASK | ALTGR_MASK);
        let mut modifier = 0;
        if masked & SHIFT_MASK != 0 {
            modifier |= KEY_SHIFT;
        }
        if masked & ALTGR_MASK != 0 {
            modifier |= KEY_RIGHT_ALT;
        }

        let key = if byte & 0x3F == KEY_EUROPE_2 {
            KEY_EUROPE_2_REAL
        } else {
            byte & !masked
        };
        Self { key, modifier }
    }
}

/// Strokes for one symbol, in typing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolStrokes {
    Skip,
    Single { stroke: KeyStroke, dead: bool },
    Pair(KeyStroke, KeyStroke),
}

impl SymbolStrokes {
    pub fn decode(symbol: u16) -> Self {
        if symbol == UNTYPEABLE {
            return Self::Skip;
        }
        let [hi, lo] = symbol.to_be_bytes();
        if symbol & SECOND_KEY_MASK == 0 {
            Self::Single {
                stroke: KeyStroke::from_stored(lo),
                dead: symbol & DEAD_KEY_BIT != 0,
            }
        } else {
            Self::Pair(KeyStroke::from_stored(hi), KeyStroke::from_stored(lo))
        }
    }
}

fn press<K: KeyboardPort + ?Sized>(
    kb: &mut K,
    iface: HidInterface,
    stroke: KeyStroke,
    delay_ms: u16,
) -> Result<(), KeyboardError> {
    kb.type_key_with_modifier(iface, stroke.key, stroke.modifier, delay_ms)
}

/// Type a zero-terminated batch, stopping at the first failed key.
pub fn type_symbols<K: KeyboardPort + ?Sized>(
    kb: &mut K,
    iface: HidInterface,
    delay_ms: u16,
    symbols: impl Iterator<Item = u16>,
) -> Result<(), KeyboardError> {
    for symbol in symbols {
        match SymbolStrokes::decode(symbol) {
            SymbolStrokes::Skip => {}
            SymbolStrokes::Single { stroke, dead } => {
                press(kb, iface, stroke, delay_ms)?;
                // Dead keys only combine once followed by a space
                if dead {
                    let space = KeyStroke {
                        key: KEY_SPACE,
                        modifier: 0,
                    };
                    press(kb, iface, space, delay_ms)?;
                }
            }
            SymbolStrokes::Pair(first, second) => {
                press(kb, iface, first, delay_ms)?;
                press(kb, iface, second, delay_ms)?;
            }
        }
    }
    Ok(())
}
