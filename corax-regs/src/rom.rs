//! Route ROM layout.
//!
//! Devices that carry a connection-validation ROM expose, for every input
//! crosspoint, four consecutive read-only 32-bit registers forming a 128-bit
//! bitmap: bit `b` set means output crosspoint `b` is a legal source for
//! that input.

use crate::regs;
use crate::xpt::{InputXpt, OutputXpt};

/// The four ROM registers describing an input crosspoint, in word order.
pub fn rom_registers(input: InputXpt) -> [u32; 4] {
    let base = regs::XPT_ROM_FIRST + 4 * (input.0 as u32 - InputXpt::FIRST.0 as u32);
    [base, base + 1, base + 2, base + 3]
}

/// Which input crosspoint and bitmap word a ROM register belongs to, if it
/// is one.
pub fn rom_register_owner(reg: u32) -> Option<(InputXpt, u8)> {
    if !(regs::XPT_ROM_FIRST..=regs::XPT_ROM_LAST).contains(&reg) {
        return None;
    }
    let offset = reg - regs::XPT_ROM_FIRST;
    let input = InputXpt(InputXpt::FIRST.0 + (offset / 4) as u8);
    if input > InputXpt::LAST {
        return None;
    }
    Some((input, (offset % 4) as u8))
}

/// The bitmap word and bit position encoding an output crosspoint.
pub fn word_and_bit(output: OutputXpt) -> (usize, u32) {
    ((output.0 / 32) as usize, 1 << (output.0 % 32))
}

/// Test an output crosspoint against a full 128-bit bitmap.
pub fn is_legal(bitmap: &[u32; 4], output: OutputXpt) -> bool {
    let (word, bit) = word_and_bit(output);
    bitmap[word] & bit != 0
}

/// All output crosspoints encoded in one bitmap word.
pub fn outputs_in_word(word: u8, value: u32) -> Vec<OutputXpt> {
    (0..32)
        .filter(|bit| value & (1u32 << bit) != 0)
        .map(|bit| OutputXpt(word * 32 + bit as u8))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn first_input_owns_the_first_four_registers() {
        assert_eq!(
            [regs::XPT_ROM_FIRST, regs::XPT_ROM_FIRST + 1, regs::XPT_ROM_FIRST + 2, regs::XPT_ROM_FIRST + 3],
            rom_registers(InputXpt::FIRST)
        );
        assert_eq!(Some((InputXpt::FIRST, 0)), rom_register_owner(regs::XPT_ROM_FIRST));
        assert_eq!(Some((InputXpt::FIRST, 3)), rom_register_owner(regs::XPT_ROM_FIRST + 3));
        assert_eq!(None, rom_register_owner(regs::XPT_ROM_FIRST - 1));
    }

    #[test]
    fn rom_block_covers_every_input() {
        let last = rom_registers(InputXpt::LAST);
        assert!(last[3] <= regs::XPT_ROM_LAST);
    }

    #[test]
    fn bitmap_membership() {
        let mut bitmap = [0u32; 4];
        let (word, bit) = word_and_bit(OutputXpt::SDI_IN3);
        bitmap[word] |= bit;
        assert!(is_legal(&bitmap, OutputXpt::SDI_IN3));
        assert!(!is_legal(&bitmap, OutputXpt::SDI_IN4));
        // black is bit zero of word zero
        assert_eq!((0, 1), word_and_bit(OutputXpt::BLACK));
    }

    #[test]
    fn word_decode_round_trips() {
        let outs = outputs_in_word(1, 0b101);
        assert_eq!(vec![OutputXpt(32), OutputXpt(34)], outs);
    }
}
