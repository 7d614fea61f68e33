//! Register numbers and bit layouts for the Corax register map.
//!
//! Numbers, masks and shifts here are the hardware contract: the driver and
//! the on-card firmware agree on them bit for bit. Per-channel register
//! families are exposed as lookup tables indexed by [crate::Channel].

use bitfield_struct::bitfield;

/// A trait describing a singleton register generically.
pub trait Register: From<u32> + Into<u32> {
    /// The register number of this register.
    const NUM: u32;
}

/// Global control: standard, geometry, frame rate, reference, write mode.
pub const GLOBAL_CONTROL: u32 = 0;
/// Second global control: quad/TSI/squares transport flags.
pub const GLOBAL_CONTROL2: u32 = 267;

/// Per-channel global control shadows for channels 2..8 (channel 1 uses
/// [GLOBAL_CONTROL]).
pub const GLOBAL_CONTROL_CH: [u32; 8] = [GLOBAL_CONTROL, 570, 571, 572, 573, 574, 575, 576];

/// Per-channel framestore control registers.
pub const CH_CONTROL: [u32; 8] = [1, 5, 129, 133, 369, 373, 377, 381];
/// Per-channel PCI access frame registers.
pub const CH_PCI_ACCESS_FRAME: [u32; 8] = [2, 6, 128, 132, 368, 372, 376, 380];
/// Per-channel output (playout) frame registers.
pub const CH_OUTPUT_FRAME: [u32; 8] = [3, 7, 130, 134, 370, 374, 378, 382];
/// Per-channel input (capture) frame registers.
pub const CH_INPUT_FRAME: [u32; 8] = [4, 8, 131, 135, 371, 375, 379, 383];

/// Per-audio-system control registers.
pub const AUD_CONTROL: [u32; 8] = [24, 240, 278, 280, 440, 444, 448, 452];
/// Per-audio-system source select registers.
pub const AUD_SOURCE_SELECT: [u32; 8] = [25, 241, 279, 281, 441, 445, 449, 453];
/// Per-audio-system non-PCM channel-pair detect registers.
///
/// Bit n set means channel pair (2n+1, 2n+2) currently carries non-PCM data.
pub const AUD_NONPCM_DETECT: [u32; 8] = [460, 461, 462, 463, 464, 465, 466, 467];

/// Per-channel RP188 timecode DBB registers; bits 0..31 of the timecode live
/// at DBB+1 and bits 32..63 at DBB+2.
pub const RP188_DBB: [u32; 8] = [29, 64, 320, 323, 326, 329, 332, 335];

/// Crosspoint select group registers, groups 1..35 (group 31 was never
/// assigned). Each packs four 8-bit output selectors.
pub const XPT_SELECT_GROUP: [u32; 34] = [
    136, 137, 138, 139, 140, 141, 142, 143, // groups 1-8
    236, 237, 238, 239, // groups 9-12
    264, 265, // groups 13-14
    284, 285, 286, 287, // groups 15-18
    268, 269, // groups 19-20
    347, // group 21
    427, 428, 429, 430, 431, 432, 433, 434, 435, // groups 22-30
    504, 505, 506, 507, // groups 32-35
];

/// Byte-lane masks for the four selector cells of a crosspoint register.
pub const XPT_CELL_MASKS: [u32; 4] = [0x0000_00FF, 0x0000_FF00, 0x00FF_0000, 0xFF00_0000];
/// Byte-lane shifts for the four selector cells of a crosspoint register.
pub const XPT_CELL_SHIFTS: [u8; 4] = [0, 8, 16, 24];

/// First register of the route ROM. Each input crosspoint owns four
/// consecutive 32-bit registers; bit b of register `FIRST + 4*(xpt-1) + b/32`
/// set means output crosspoint b is a legal source.
pub const XPT_ROM_FIRST: u32 = 3072;
/// Last register of the route ROM.
pub const XPT_ROM_LAST: u32 = 3583;

/// Per-input SDI status register blocks (6 registers each).
pub const RX_SDI_STATUS_BASE: [u32; 8] = [2050, 2058, 2066, 2074, 2082, 2090, 2098, 2106];
/// Offsets into an SDI status block.
pub const RX_SDI_STATUS: u32 = 0;
pub const RX_SDI_CRC_ERROR_COUNT: u32 = 1;
pub const RX_SDI_FRAME_COUNT_LO: u32 = 2;
pub const RX_SDI_FRAME_COUNT_HI: u32 = 3;
pub const RX_SDI_FRAME_REF_COUNT_LO: u32 = 4;
pub const RX_SDI_FRAME_REF_COUNT_HI: u32 = 5;
/// Free-running 48 MHz reference clock, low and high words.
pub const RX_SDI_FREE_RUNNING_CLOCK_LO: u32 = 2114;
pub const RX_SDI_FREE_RUNNING_CLOCK_HI: u32 = 2115;

/// Per-channel ancillary extractor register blocks.
pub const ANC_EXT_BASE: [u32; 8] = [
    0x1000, 0x1040, 0x1080, 0x10C0, 0x1100, 0x1140, 0x1180, 0x11C0,
];
/// Per-channel ancillary inserter register blocks.
pub const ANC_INS_BASE: [u32; 8] = [
    0x1200, 0x1240, 0x1280, 0x12C0, 0x1300, 0x1340, 0x1380, 0x13C0,
];

/// Offsets into an ancillary extractor block.
pub const ANC_EXT_CONTROL: u32 = 0;
pub const ANC_EXT_F1_START_ADDR: u32 = 1;
pub const ANC_EXT_F1_END_ADDR: u32 = 2;
pub const ANC_EXT_F2_START_ADDR: u32 = 3;
pub const ANC_EXT_F2_END_ADDR: u32 = 4;
pub const ANC_EXT_FIELD_CUTOFF_LINE: u32 = 5;
pub const ANC_EXT_TOTAL_STATUS: u32 = 6;
pub const ANC_EXT_F1_STATUS: u32 = 7;
pub const ANC_EXT_F2_STATUS: u32 = 8;
pub const ANC_EXT_VBL_START_LINE: u32 = 9;
pub const ANC_EXT_TOTAL_FRAME_LINES: u32 = 10;
pub const ANC_EXT_FID: u32 = 11;
pub const ANC_EXT_IGNORE_DID_1_4: u32 = 12;
pub const ANC_EXT_IGNORE_DID_5_8: u32 = 13;
pub const ANC_EXT_IGNORE_DID_9_12: u32 = 14;
pub const ANC_EXT_IGNORE_DID_13_16: u32 = 15;
pub const ANC_EXT_IGNORE_DID_17_20: u32 = 16;
pub const ANC_EXT_ANALOG_START_LINE: u32 = 17;
pub const ANC_EXT_F1_ANALOG_Y_FILTER: u32 = 18;
pub const ANC_EXT_F2_ANALOG_Y_FILTER: u32 = 19;
pub const ANC_EXT_F1_ANALOG_C_FILTER: u32 = 20;
pub const ANC_EXT_F2_ANALOG_C_FILTER: u32 = 21;
/// Number of registers in an extractor block.
pub const ANC_EXT_BLOCK_LEN: u32 = 22;

/// Offsets into an ancillary inserter block.
pub const ANC_INS_FIELD_BYTES: u32 = 0;
pub const ANC_INS_CONTROL: u32 = 1;
pub const ANC_INS_F1_START_ADDR: u32 = 2;
pub const ANC_INS_F2_START_ADDR: u32 = 3;
pub const ANC_INS_PIXEL_DELAY: u32 = 4;
pub const ANC_INS_ACTIVE_START: u32 = 5;
pub const ANC_INS_LINE_PIXELS: u32 = 6;
pub const ANC_INS_FRAME_LINES: u32 = 7;
pub const ANC_INS_FIELD_ID_LINES: u32 = 8;
pub const ANC_INS_PAYLOAD_ID_CONTROL: u32 = 9;
pub const ANC_INS_PAYLOAD_ID: u32 = 10;
pub const ANC_INS_BLANK_C_START_LINE: u32 = 11;
pub const ANC_INS_BLANK_F1_C_LINES: u32 = 12;
pub const ANC_INS_BLANK_F2_C_LINES: u32 = 13;
/// Number of registers in an inserter block.
pub const ANC_INS_BLOCK_LEN: u32 = 14;

/// Field masks inside [ANC_INS_FIELD_BYTES].
pub const ANC_INS_F1_BYTES_MASK: u32 = 0x0000_FFFF;
pub const ANC_INS_F1_BYTES_SHIFT: u8 = 0;
pub const ANC_INS_F2_BYTES_MASK: u32 = 0xFFFF_0000;
pub const ANC_INS_F2_BYTES_SHIFT: u8 = 16;

/// HDMI output HDR metadata registers.
pub const HDMI_HDR_GREEN_PRIMARY: u32 = 2120;
pub const HDMI_HDR_BLUE_PRIMARY: u32 = 2121;
pub const HDMI_HDR_RED_PRIMARY: u32 = 2122;
pub const HDMI_HDR_WHITE_POINT: u32 = 2123;
pub const HDMI_HDR_MASTERING_LUMINANCE: u32 = 2124;
pub const HDMI_HDR_LIGHT_LEVEL: u32 = 2125;
pub const HDMI_HDR_CONTROL: u32 = 2126;

/// First virtual (driver-backed, not on-card) register.
pub const VIRTUAL_START: u32 = 10000;
/// Number of virtual registers.
pub const VIRTUAL_COUNT: u32 = 1024;
/// Ancillary field 1 offset back from the end of the frame, in bytes.
pub const ANC_FIELD1_OFFSET: u32 = 10212;
/// Ancillary field 2 offset back from the end of the frame, in bytes.
pub const ANC_FIELD2_OFFSET: u32 = 10213;
/// Four-CC of the application holding the device, 0 if unclaimed.
pub const APP_SIGNATURE: u32 = 10008;
/// Process ID of the application holding the device.
pub const APP_PID: u32 = 10009;
/// Saved driver task mode.
pub const TASK_MODE: u32 = 10010;
/// Multi-raster viewer enable; the viewer borrows the last video channel's
/// framestore when set.
pub const MULTI_RASTER_ENABLE: u32 = 10011;

/// When register writes latch: immediately, at the next field boundary, or
/// at the next frame boundary.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WriteMode {
    #[default]
    Immediate = 0,
    AtFrame = 1,
    AtField = 2,
}

impl WriteMode {
    pub const fn into_bits(this: Self) -> u8 {
        this as u8
    }

    pub const fn from_bits(v: u8) -> Self {
        match v {
            1 => Self::AtFrame,
            2 => Self::AtField,
            _ => Self::Immediate,
        }
    }
}

/// 0 Global control.
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalControl {
    /// Frame rate selector.
    #[bits(4)]
    pub frame_rate: u8,
    /// Frame geometry selector.
    #[bits(4)]
    pub geometry: u8,
    /// Video standard selector.
    #[bits(4)]
    pub standard: u8,
    /// Reference source selector.
    #[bits(4)]
    pub reference: u8,
    #[bits(4)]
    __: u8,
    /// Register write latch mode.
    #[bits(2, from = WriteMode::from_bits, into = WriteMode::into_bits)]
    pub write_mode: WriteMode,
    #[bits(10)]
    __: u16,
}

impl Register for GlobalControl {
    const NUM: u32 = GLOBAL_CONTROL;
}

/// 267 Global control 2: 4K transport flags.
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlobalControl2 {
    #[bits(2)]
    __: u8,
    /// Channels run with independent formats.
    pub independent_mode: bool,
    /// Channels 1-4 carry one UHD raster as four squares.
    pub quad_mode: bool,
    /// Channels 5-8 carry one UHD raster as four squares.
    pub quad_mode2: bool,
    #[bits(5)]
    __: u8,
    /// Channels 1/2 carry one UHD raster two-sample-interleaved.
    pub smpte425_12: bool,
    /// Channels 3/4 carry one UHD raster two-sample-interleaved.
    pub smpte425_34: bool,
    /// Channels 5/6 carry one UHD raster two-sample-interleaved.
    pub smpte425_56: bool,
    /// Channels 7/8 carry one UHD raster two-sample-interleaved.
    pub smpte425_78: bool,
    __: bool,
    /// 8K: four channels carry one quad-quad raster.
    pub quad_quad_mode: bool,
    /// 8K carried as squares of squares.
    pub quad_quad_squares: bool,
    #[bits(15)]
    __: u16,
}

impl Register for GlobalControl2 {
    const NUM: u32 = GLOBAL_CONTROL2;
}

/// On-card frame buffer size selector, [ChannelControl::frame_size].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameSize {
    Fs2Mb = 0,
    Fs4Mb = 1,
    #[default]
    Fs8Mb = 2,
    Fs16Mb = 3,
}

impl FrameSize {
    pub const fn into_bits(this: Self) -> u8 {
        this as u8
    }

    pub const fn from_bits(v: u8) -> Self {
        match v {
            0 => Self::Fs2Mb,
            1 => Self::Fs4Mb,
            3 => Self::Fs16Mb,
            _ => Self::Fs8Mb,
        }
    }

    /// The size in bytes.
    pub const fn byte_count(self) -> u32 {
        match self {
            Self::Fs2Mb => 0x20_0000,
            Self::Fs4Mb => 0x40_0000,
            Self::Fs8Mb => 0x80_0000,
            Self::Fs16Mb => 0x100_0000,
        }
    }
}

/// Per-channel framestore control ([CH_CONTROL]).
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelControl {
    /// 1 = capture (write to SDRAM), 0 = display (read from SDRAM).
    pub capture: bool,
    /// Pixel format selector.
    #[bits(5)]
    pub format: u8,
    #[bits(14)]
    __: u16,
    /// On-card frame buffer size.
    #[bits(2, from = FrameSize::from_bits, into = FrameSize::into_bits)]
    pub frame_size: FrameSize,
    __: bool,
    /// Framestore disabled.
    pub disabled: bool,
    /// VANC lines carried in the frame buffer: 0 off, 1 tall, 2 taller.
    #[bits(2)]
    pub vanc: u8,
    /// Bidirectional SDI connector set to transmit.
    pub sdi_transmit: bool,
    #[bits(5)]
    __: u8,
}

/// Per-audio-system control ([AUD_CONTROL]).
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AudioControl {
    /// Audio input (capture) engine running.
    pub capture_enable: bool,
    /// Audio output (playout) engine running.
    pub play_enable: bool,
    #[bits(15)]
    __: u16,
    /// Whole-system non-PCM flag; overrides per-pair control.
    pub non_pcm: bool,
    #[bits(13)]
    __: u16,
    /// 4 MB on-card audio buffer (else 1 MB).
    pub buffer_4mb: bool,
}

/// Per-channel ancillary inserter control ([ANC_INS_CONTROL]).
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AncInsControl {
    pub hanc_y: bool,
    pub hanc_c: bool,
    pub vanc_y: bool,
    pub vanc_c: bool,
    #[bits(12)]
    __: u16,
    pub progressive: bool,
    #[bits(7)]
    __: u8,
    /// Split SD packets across chroma/luma streams.
    pub sd_packet_split: bool,
    #[bits(7)]
    __: u8,
}

/// Per-channel ancillary extractor control ([ANC_EXT_CONTROL]).
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AncExtControl {
    pub enabled: bool,
    #[bits(27)]
    __: u32,
    pub progressive: bool,
    #[bits(3)]
    __: u8,
}

/// Per-input SDI receiver status ([RX_SDI_STATUS]).
#[bitfield(u32)]
#[derive(PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SdiInStatus {
    /// Receiver locked to an input signal.
    pub locked: bool,
    #[bits(3)]
    __: u8,
    /// VPID on link A is valid.
    pub vpid_valid_a: bool,
    /// VPID on link B is valid.
    pub vpid_valid_b: bool,
    #[bits(2)]
    __: u8,
    /// TRS framing error seen this frame.
    pub frame_trs_error: bool,
    #[bits(23)]
    __: u32,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn cell_masks_and_shifts_agree() {
        for (mask, shift) in XPT_CELL_MASKS.iter().zip(XPT_CELL_SHIFTS) {
            assert_eq!(0xFF << shift, *mask);
        }
    }

    #[test]
    fn register_tables_have_no_duplicates() {
        let mut all: Vec<u32> = Vec::new();
        all.extend(CH_CONTROL);
        all.extend(CH_PCI_ACCESS_FRAME);
        all.extend(CH_OUTPUT_FRAME);
        all.extend(CH_INPUT_FRAME);
        all.extend(AUD_CONTROL);
        all.extend(AUD_SOURCE_SELECT);
        all.extend(AUD_NONPCM_DETECT);
        all.extend(XPT_SELECT_GROUP);
        all.extend(GLOBAL_CONTROL_CH);
        for dbb in RP188_DBB {
            all.extend([dbb, dbb + 1, dbb + 2]);
        }
        for base in RX_SDI_STATUS_BASE {
            all.extend(base..base + 6);
        }
        for base in ANC_EXT_BASE {
            all.extend(base..base + ANC_EXT_BLOCK_LEN);
        }
        for base in ANC_INS_BASE {
            all.extend(base..base + ANC_INS_BLOCK_LEN);
        }
        let count = all.len();
        all.sort_unstable();
        all.dedup();
        assert_eq!(count, all.len());
    }

    #[test]
    fn global_control_write_mode() {
        let gc = GlobalControl::new().with_write_mode(WriteMode::AtField);
        assert_eq!(0x0020_0000, u32::from(gc));
        assert_eq!(WriteMode::AtField, GlobalControl::from(0x0020_0000).write_mode());
    }

    #[test]
    fn channel_control_frame_size() {
        let cc = ChannelControl::new().with_frame_size(FrameSize::Fs16Mb);
        assert_eq!(0x0030_0000, u32::from(cc));
        assert_eq!(0x100_0000, cc.frame_size().byte_count());
    }

    #[test]
    fn quad_flags_round_trip() {
        let gc2 = GlobalControl2::new().with_smpte425_12(true).with_quad_quad_mode(true);
        let raw = u32::from(gc2);
        assert!(GlobalControl2::from(raw).smpte425_12());
        assert!(GlobalControl2::from(raw).quad_quad_mode());
        assert!(!GlobalControl2::from(raw).quad_mode());
    }
}
