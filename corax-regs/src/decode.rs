//! Human-readable register value decoders.
//!
//! Every decoder is a pure function of `(register, value, device)`; none of
//! them touch hardware. An empty string means the decoder has nothing to add
//! beyond the raw value.

use crate::regs;
use crate::rom;
use crate::xpt::OutputXpt;
use crate::DeviceId;

/// The default decoder: nothing to add.
pub fn default(_reg: u32, _value: u32, _device: DeviceId) -> String {
    String::new()
}

pub fn global_control(_reg: u32, value: u32, _device: DeviceId) -> String {
    let gc = regs::GlobalControl::from(value);
    format!(
        "rate sel {}, geometry sel {}, standard sel {}, ref sel {}, writes {:?}",
        gc.frame_rate(),
        gc.geometry(),
        gc.standard(),
        gc.reference(),
        gc.write_mode(),
    )
}

pub fn global_control2(_reg: u32, value: u32, _device: DeviceId) -> String {
    let gc = regs::GlobalControl2::from(value);
    let mut parts = Vec::new();
    if gc.independent_mode() {
        parts.push("independent".to_string());
    }
    if gc.quad_mode() {
        parts.push("squares 1-4".to_string());
    }
    if gc.quad_mode2() {
        parts.push("squares 5-8".to_string());
    }
    for (bit, name) in [
        (gc.smpte425_12(), "tsi 1/2"),
        (gc.smpte425_34(), "tsi 3/4"),
        (gc.smpte425_56(), "tsi 5/6"),
        (gc.smpte425_78(), "tsi 7/8"),
    ] {
        if bit {
            parts.push(name.to_string());
        }
    }
    if gc.quad_quad_mode() {
        parts.push("quad-quad".to_string());
    }
    if gc.quad_quad_squares() {
        parts.push("quad-quad squares".to_string());
    }
    if parts.is_empty() {
        "no 4K transport flags".to_string()
    } else {
        parts.join(", ")
    }
}

pub fn channel_control(_reg: u32, value: u32, _device: DeviceId) -> String {
    let cc = regs::ChannelControl::from(value);
    format!(
        "{}, format sel {}, frame size {} MB{}",
        if cc.capture() { "capture" } else { "display" },
        cc.format(),
        cc.frame_size().byte_count() / 0x10_0000,
        if cc.disabled() { ", disabled" } else { "" },
    )
}

pub fn audio_control(_reg: u32, value: u32, _device: DeviceId) -> String {
    let ac = regs::AudioControl::from(value);
    format!(
        "capture {}, play {}, {} buffer{}",
        if ac.capture_enable() { "on" } else { "off" },
        if ac.play_enable() { "on" } else { "off" },
        if ac.buffer_4mb() { "4 MB" } else { "1 MB" },
        if ac.non_pcm() { ", non-PCM" } else { "" },
    )
}

pub fn nonpcm_detect(_reg: u32, value: u32, _device: DeviceId) -> String {
    if value == 0 {
        return "all pairs PCM".to_string();
    }
    let pairs: Vec<String> = (0..8)
        .filter(|bit| value & (1 << bit) != 0)
        .map(|bit| format!("{}/{}", bit * 2 + 1, bit * 2 + 2))
        .collect();
    format!("non-PCM pairs: {}", pairs.join(", "))
}

/// Decode a crosspoint select group register: the four cells and what each
/// connected input sees.
pub fn xpt_group(reg: u32, value: u32, _device: DeviceId) -> String {
    let cat = crate::catalog::catalog();
    let mut parts = Vec::new();
    for ndx in 0..4u8 {
        let Some(input) = cat.input_for_cell(reg, ndx) else {
            continue;
        };
        let sel = (value & regs::XPT_CELL_MASKS[ndx as usize]) >> regs::XPT_CELL_SHIFTS[ndx as usize];
        let output = OutputXpt(sel as u8);
        parts.push(format!("{} <== {}", input, output));
    }
    parts.join(", ")
}

/// Decode a route ROM register: which input crosspoint's bitmap word this
/// is, and the legal outputs it encodes.
pub fn xpt_rom(reg: u32, value: u32, _device: DeviceId) -> String {
    let Some((input, word)) = rom::rom_register_owner(reg) else {
        return String::new();
    };
    let outputs = rom::outputs_in_word(word, value);
    let names: Vec<String> = outputs.iter().map(|o| o.to_string()).collect();
    if names.is_empty() {
        format!("{} word {}: none", input, word)
    } else {
        format!("{} word {}: {}", input, word, names.join(", "))
    }
}

pub fn anc_ext_control(_reg: u32, value: u32, _device: DeviceId) -> String {
    let c = regs::AncExtControl::from(value);
    format!(
        "{}{}",
        if c.enabled() { "enabled" } else { "disabled" },
        if c.progressive() { ", progressive" } else { "" },
    )
}

pub fn anc_ins_control(_reg: u32, value: u32, _device: DeviceId) -> String {
    let c = regs::AncInsControl::from(value);
    let mut parts = Vec::new();
    for (bit, name) in [
        (c.hanc_y(), "HANC Y"),
        (c.hanc_c(), "HANC C"),
        (c.vanc_y(), "VANC Y"),
        (c.vanc_c(), "VANC C"),
    ] {
        if bit {
            parts.push(name);
        }
    }
    if c.progressive() {
        parts.push("progressive");
    }
    if c.sd_packet_split() {
        parts.push("SD split");
    }
    if parts.is_empty() {
        "all streams off".to_string()
    } else {
        parts.join(", ")
    }
}

/// Decode a register packing two 16-bit values.
pub fn value_pair(_reg: u32, value: u32, _device: DeviceId) -> String {
    format!("lo {}, hi {}", value & 0xFFFF, value >> 16)
}

pub fn sdi_status(_reg: u32, value: u32, _device: DeviceId) -> String {
    let s = regs::SdiInStatus::from(value);
    format!(
        "{}{}{}{}",
        if s.locked() { "locked" } else { "unlocked" },
        if s.vpid_valid_a() { ", VPID A" } else { "" },
        if s.vpid_valid_b() { ", VPID B" } else { "" },
        if s.frame_trs_error() { ", TRS error" } else { "" },
    )
}

/// HDR primaries pack two 16-bit 0.00002-unit chromaticity coordinates.
pub fn hdr_primary(reg: u32, value: u32, device: DeviceId) -> String {
    if reg == regs::HDMI_HDR_CONTROL {
        return if value & 1 != 0 { "enabled".into() } else { "disabled".into() };
    }
    value_pair(reg, value, device)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::xpt::InputXpt;

    #[test]
    fn xpt_group_names_cells() {
        let cat = crate::catalog::catalog();
        let (reg, ndx) = cat.xpt_cell(InputXpt::FRAME_BUFFER1).unwrap();
        let value = (OutputXpt::SDI_IN1.0 as u32) << regs::XPT_CELL_SHIFTS[ndx as usize];
        let text = xpt_group(reg, value, DeviceId::Corax88);
        assert!(text.contains("FB1 <== SDIIn1"), "{}", text);
    }

    #[test]
    fn value_pair_splits() {
        assert_eq!("lo 7, hi 3", value_pair(0, (3 << 16) | 7, DeviceId::Corax44));
    }

    #[test]
    fn sdi_status_flags() {
        let raw = u32::from(
            regs::SdiInStatus::new()
                .with_locked(true)
                .with_vpid_valid_a(true)
                .with_frame_trs_error(true),
        );
        assert_eq!("locked, VPID A, TRS error", sdi_status(0, raw, DeviceId::Corax88));
    }
}
