//! The register catalog: names, classes, access, decoders, and the
//! canonical crosspoint cell table.
//!
//! The catalog is process-wide, built once on first use, and read-only
//! afterwards. Lookups never touch hardware.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use crate::decode;
use crate::regs;
use crate::xpt::{InputXpt, OutputXpt};
use crate::DeviceId;

/// Register class names.
pub const CLASS_ROUTING: &str = "Routing";
pub const CLASS_AUDIO: &str = "Audio";
pub const CLASS_ANC: &str = "Anc";
pub const CLASS_HDMI: &str = "HDMI";
pub const CLASS_HDR: &str = "HDR";
pub const CLASS_TIMECODE: &str = "Timecode";
pub const CLASS_SDI_ERROR: &str = "SDIError";
pub const CLASS_VIRTUAL: &str = "Virtual";
pub const CLASS_INPUT: &str = "Input";
pub const CLASS_OUTPUT: &str = "Output";
pub const CLASS_READ_ONLY: &str = "ReadOnly";
pub const CLASS_WRITE_ONLY: &str = "WriteOnly";

/// Per-channel class names, `Channel1` .. `Channel8`.
pub const CLASS_CHANNEL: [&str; 8] = [
    "Channel1", "Channel2", "Channel3", "Channel4", "Channel5", "Channel6", "Channel7", "Channel8",
];

/// Register access permission.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegisterAccess {
    ReadOnly,
    WriteOnly,
    #[default]
    ReadWrite,
}

/// How [Catalog::registers_with_name] matches the query.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MatchStyle {
    #[default]
    Exact,
    Contains,
    StartsWith,
    EndsWith,
}

/// A pure register-value decoder.
pub type Decoder = fn(u32, u32, DeviceId) -> String;

/// The crosspoint select cell table: one entry per select group register,
/// four cells each, in mask-index order. `None` marks a cell with no input
/// crosspoint behind it.
const XPT_GROUPS: [[Option<InputXpt>; 4]; 34] = {
    use InputXpt as I;
    [
        // group 1
        [Some(I::LUT1), Some(I::CSC1_VID), Some(I::CONVERSION), Some(I::COMPRESSION)],
        // group 2
        [Some(I::FRAME_BUFFER1), Some(I::FRAME_SYNC1), Some(I::FRAME_SYNC2), Some(I::DUAL_LINK_OUT1)],
        // group 3
        [Some(I::ANALOG_OUT), Some(I::SDI_OUT1), Some(I::SDI_OUT2), Some(I::CSC1_KEY)],
        // group 4
        [Some(I::MIXER1_FG_VID), Some(I::MIXER1_FG_KEY), Some(I::MIXER1_BG_VID), Some(I::MIXER1_BG_KEY)],
        // group 5
        [Some(I::FRAME_BUFFER2), Some(I::LUT2), Some(I::CSC2_VID), Some(I::CSC2_KEY)],
        // group 6
        [Some(I::WATER_MARKER1), Some(I::IICT1), Some(I::HDMI_OUT), Some(I::CONVERSION2)],
        // group 7
        [Some(I::WATER_MARKER2), Some(I::IICT2), Some(I::DUAL_LINK_OUT2), None],
        // group 8
        [Some(I::SDI_OUT3), Some(I::SDI_OUT4), Some(I::SDI_OUT5), None],
        // group 9
        [Some(I::MIXER2_FG_VID), Some(I::MIXER2_FG_KEY), Some(I::MIXER2_BG_VID), Some(I::MIXER2_BG_KEY)],
        // group 10
        [Some(I::SDI_OUT1_DS2), Some(I::SDI_OUT2_DS2), None, None],
        // group 11
        [Some(I::DUAL_LINK_IN1), Some(I::DUAL_LINK_IN1_DS), Some(I::DUAL_LINK_IN2), Some(I::DUAL_LINK_IN2_DS)],
        // group 12
        [Some(I::LUT3), Some(I::LUT4), Some(I::LUT5), None],
        // group 13
        [Some(I::FRAME_BUFFER3), None, Some(I::FRAME_BUFFER4), None],
        // group 14
        [None, Some(I::SDI_OUT3_DS2), Some(I::SDI_OUT5_DS2), Some(I::SDI_OUT4_DS2)],
        // group 15
        [Some(I::DUAL_LINK_IN3), Some(I::DUAL_LINK_IN3_DS), Some(I::DUAL_LINK_IN4), Some(I::DUAL_LINK_IN4_DS)],
        // group 16
        [Some(I::DUAL_LINK_OUT3), Some(I::DUAL_LINK_OUT4), Some(I::DUAL_LINK_OUT5), None],
        // group 17
        [Some(I::CSC3_VID), Some(I::CSC3_KEY), Some(I::CSC4_VID), Some(I::CSC4_KEY)],
        // group 18
        [Some(I::CSC5_VID), Some(I::CSC5_KEY), None, None],
        // group 19
        [Some(I::DC4K_Q1), Some(I::DC4K_Q2), Some(I::DC4K_Q3), Some(I::DC4K_Q4)],
        // group 20
        [None, Some(I::HDMI_OUT_Q2), Some(I::HDMI_OUT_Q3), Some(I::HDMI_OUT_Q4)],
        // group 21
        [Some(I::FRAME_BUFFER5), Some(I::FRAME_BUFFER6), Some(I::FRAME_BUFFER7), Some(I::FRAME_BUFFER8)],
        // group 22
        [Some(I::SDI_OUT6), Some(I::SDI_OUT6_DS2), Some(I::SDI_OUT7), Some(I::SDI_OUT7_DS2)],
        // group 23
        [Some(I::CSC7_VID), Some(I::CSC7_KEY), Some(I::CSC8_VID), Some(I::CSC8_KEY)],
        // group 24
        [Some(I::LUT6), Some(I::LUT7), Some(I::LUT8), None],
        // group 25
        [Some(I::DUAL_LINK_IN5), Some(I::DUAL_LINK_IN5_DS), Some(I::DUAL_LINK_IN6), Some(I::DUAL_LINK_IN6_DS)],
        // group 26
        [Some(I::DUAL_LINK_IN7), Some(I::DUAL_LINK_IN7_DS), Some(I::DUAL_LINK_IN8), Some(I::DUAL_LINK_IN8_DS)],
        // group 27
        [Some(I::DUAL_LINK_OUT6), Some(I::DUAL_LINK_OUT7), Some(I::DUAL_LINK_OUT8), None],
        // group 28
        [Some(I::MIXER3_FG_VID), Some(I::MIXER3_FG_KEY), Some(I::MIXER3_BG_VID), Some(I::MIXER3_BG_KEY)],
        // group 29
        [Some(I::MIXER4_FG_VID), Some(I::MIXER4_FG_KEY), Some(I::MIXER4_BG_VID), Some(I::MIXER4_BG_KEY)],
        // group 30
        [Some(I::SDI_OUT8), Some(I::SDI_OUT8_DS2), Some(I::CSC6_VID), Some(I::CSC6_KEY)],
        // group 32
        [Some(I::MUX425_1A), Some(I::MUX425_1B), Some(I::MUX425_2A), Some(I::MUX425_2B)],
        // group 33
        [Some(I::MUX425_3A), Some(I::MUX425_3B), Some(I::MUX425_4A), Some(I::MUX425_4B)],
        // group 34
        [Some(I::FRAME_BUFFER1_B), Some(I::FRAME_BUFFER2_B), Some(I::FRAME_BUFFER3_B), Some(I::FRAME_BUFFER4_B)],
        // group 35
        [Some(I::FRAME_BUFFER5_B), Some(I::FRAME_BUFFER6_B), Some(I::FRAME_BUFFER7_B), Some(I::FRAME_BUFFER8_B)],
    ]
};

const INPUT_XPT_NAMES: [(InputXpt, &str); 122] = {
    use InputXpt as I;
    [
        (I::LUT1, "LUT1"),
        (I::CSC1_VID, "CSC1Vid"),
        (I::CONVERSION, "Conversion"),
        (I::COMPRESSION, "Compression"),
        (I::FRAME_BUFFER1, "FB1"),
        (I::FRAME_SYNC1, "FrameSync1"),
        (I::FRAME_SYNC2, "FrameSync2"),
        (I::DUAL_LINK_OUT1, "DLOut1"),
        (I::ANALOG_OUT, "AnalogOut"),
        (I::SDI_OUT1, "SDIOut1"),
        (I::SDI_OUT2, "SDIOut2"),
        (I::CSC1_KEY, "CSC1Key"),
        (I::MIXER1_FG_VID, "Mixer1FGVid"),
        (I::MIXER1_FG_KEY, "Mixer1FGKey"),
        (I::MIXER1_BG_VID, "Mixer1BGVid"),
        (I::MIXER1_BG_KEY, "Mixer1BGKey"),
        (I::FRAME_BUFFER2, "FB2"),
        (I::LUT2, "LUT2"),
        (I::CSC2_VID, "CSC2Vid"),
        (I::CSC2_KEY, "CSC2Key"),
        (I::WATER_MARKER1, "WaterMarker1"),
        (I::IICT1, "IICT1"),
        (I::HDMI_OUT, "HDMIOut"),
        (I::CONVERSION2, "Conversion2"),
        (I::WATER_MARKER2, "WaterMarker2"),
        (I::IICT2, "IICT2"),
        (I::DUAL_LINK_OUT2, "DLOut2"),
        (I::SDI_OUT3, "SDIOut3"),
        (I::SDI_OUT4, "SDIOut4"),
        (I::SDI_OUT5, "SDIOut5"),
        (I::MIXER2_FG_VID, "Mixer2FGVid"),
        (I::MIXER2_FG_KEY, "Mixer2FGKey"),
        (I::MIXER2_BG_VID, "Mixer2BGVid"),
        (I::MIXER2_BG_KEY, "Mixer2BGKey"),
        (I::SDI_OUT1_DS2, "SDIOut1DS2"),
        (I::SDI_OUT2_DS2, "SDIOut2DS2"),
        (I::DUAL_LINK_IN1, "DLIn1"),
        (I::DUAL_LINK_IN1_DS, "DLIn1DS"),
        (I::DUAL_LINK_IN2, "DLIn2"),
        (I::DUAL_LINK_IN2_DS, "DLIn2DS"),
        (I::LUT3, "LUT3"),
        (I::LUT4, "LUT4"),
        (I::LUT5, "LUT5"),
        (I::FRAME_BUFFER3, "FB3"),
        (I::FRAME_BUFFER4, "FB4"),
        (I::SDI_OUT3_DS2, "SDIOut3DS2"),
        (I::SDI_OUT5_DS2, "SDIOut5DS2"),
        (I::SDI_OUT4_DS2, "SDIOut4DS2"),
        (I::DUAL_LINK_IN3, "DLIn3"),
        (I::DUAL_LINK_IN3_DS, "DLIn3DS"),
        (I::DUAL_LINK_IN4, "DLIn4"),
        (I::DUAL_LINK_IN4_DS, "DLIn4DS"),
        (I::DUAL_LINK_OUT3, "DLOut3"),
        (I::DUAL_LINK_OUT4, "DLOut4"),
        (I::DUAL_LINK_OUT5, "DLOut5"),
        (I::CSC3_VID, "CSC3Vid"),
        (I::CSC3_KEY, "CSC3Key"),
        (I::CSC4_VID, "CSC4Vid"),
        (I::CSC4_KEY, "CSC4Key"),
        (I::CSC5_VID, "CSC5Vid"),
        (I::CSC5_KEY, "CSC5Key"),
        (I::DC4K_Q1, "4KDCQ1"),
        (I::DC4K_Q2, "4KDCQ2"),
        (I::DC4K_Q3, "4KDCQ3"),
        (I::DC4K_Q4, "4KDCQ4"),
        (I::HDMI_OUT_Q2, "HDMIOutQ2"),
        (I::HDMI_OUT_Q3, "HDMIOutQ3"),
        (I::HDMI_OUT_Q4, "HDMIOutQ4"),
        (I::FRAME_BUFFER5, "FB5"),
        (I::FRAME_BUFFER6, "FB6"),
        (I::FRAME_BUFFER7, "FB7"),
        (I::FRAME_BUFFER8, "FB8"),
        (I::SDI_OUT6, "SDIOut6"),
        (I::SDI_OUT6_DS2, "SDIOut6DS2"),
        (I::SDI_OUT7, "SDIOut7"),
        (I::SDI_OUT7_DS2, "SDIOut7DS2"),
        (I::CSC7_VID, "CSC7Vid"),
        (I::CSC7_KEY, "CSC7Key"),
        (I::CSC8_VID, "CSC8Vid"),
        (I::CSC8_KEY, "CSC8Key"),
        (I::LUT6, "LUT6"),
        (I::LUT7, "LUT7"),
        (I::LUT8, "LUT8"),
        (I::DUAL_LINK_IN5, "DLIn5"),
        (I::DUAL_LINK_IN5_DS, "DLIn5DS"),
        (I::DUAL_LINK_IN6, "DLIn6"),
        (I::DUAL_LINK_IN6_DS, "DLIn6DS"),
        (I::DUAL_LINK_IN7, "DLIn7"),
        (I::DUAL_LINK_IN7_DS, "DLIn7DS"),
        (I::DUAL_LINK_IN8, "DLIn8"),
        (I::DUAL_LINK_IN8_DS, "DLIn8DS"),
        (I::DUAL_LINK_OUT6, "DLOut6"),
        (I::DUAL_LINK_OUT7, "DLOut7"),
        (I::DUAL_LINK_OUT8, "DLOut8"),
        (I::MIXER3_FG_VID, "Mixer3FGVid"),
        (I::MIXER3_FG_KEY, "Mixer3FGKey"),
        (I::MIXER3_BG_VID, "Mixer3BGVid"),
        (I::MIXER3_BG_KEY, "Mixer3BGKey"),
        (I::MIXER4_FG_VID, "Mixer4FGVid"),
        (I::MIXER4_FG_KEY, "Mixer4FGKey"),
        (I::MIXER4_BG_VID, "Mixer4BGVid"),
        (I::MIXER4_BG_KEY, "Mixer4BGKey"),
        (I::SDI_OUT8, "SDIOut8"),
        (I::SDI_OUT8_DS2, "SDIOut8DS2"),
        (I::CSC6_VID, "CSC6Vid"),
        (I::CSC6_KEY, "CSC6Key"),
        (I::MUX425_1A, "425Mux1A"),
        (I::MUX425_1B, "425Mux1B"),
        (I::MUX425_2A, "425Mux2A"),
        (I::MUX425_2B, "425Mux2B"),
        (I::MUX425_3A, "425Mux3A"),
        (I::MUX425_3B, "425Mux3B"),
        (I::MUX425_4A, "425Mux4A"),
        (I::MUX425_4B, "425Mux4B"),
        (I::FRAME_BUFFER1_B, "FB1B"),
        (I::FRAME_BUFFER2_B, "FB2B"),
        (I::FRAME_BUFFER3_B, "FB3B"),
        (I::FRAME_BUFFER4_B, "FB4B"),
        (I::FRAME_BUFFER5_B, "FB5B"),
        (I::FRAME_BUFFER6_B, "FB6B"),
        (I::FRAME_BUFFER7_B, "FB7B"),
        (I::FRAME_BUFFER8_B, "FB8B"),
    ]
};

const OUTPUT_XPT_NAMES: [(OutputXpt, &str); 116] = {
    use OutputXpt as O;
    [
        (O::BLACK, "Black"),
        (O::SDI_IN1, "SDIIn1"),
        (O::SDI_IN2, "SDIIn2"),
        (O::ANALOG_IN, "AnalogIn"),
        (O::LUT1, "LUT1"),
        (O::CSC1_VID_YUV, "CSC1VidYUV"),
        (O::CONVERSION, "Conversion"),
        (O::COMPRESSION, "Compression"),
        (O::FRAME_BUFFER1_YUV, "FB1YUV"),
        (O::FRAME_SYNC1, "FrameSync1"),
        (O::FRAME_SYNC2, "FrameSync2"),
        (O::DUAL_LINK_OUT1, "DLOut1"),
        (O::CSC1_KEY_YUV, "CSC1KeyYUV"),
        (O::MIXER1_VID_YUV, "Mixer1VidYUV"),
        (O::MIXER1_KEY_YUV, "Mixer1KeyYUV"),
        (O::FRAME_BUFFER2_YUV, "FB2YUV"),
        (O::CSC2_VID_YUV, "CSC2VidYUV"),
        (O::CSC2_KEY_YUV, "CSC2KeyYUV"),
        (O::LUT2, "LUT2"),
        (O::MIXER2_VID_YUV, "Mixer2VidYUV"),
        (O::MIXER2_KEY_YUV, "Mixer2KeyYUV"),
        (O::WATER_MARKER1, "WaterMarker1"),
        (O::IICT1, "IICT1"),
        (O::HDMI_IN1, "HDMIIn1"),
        (O::HDMI_IN1_Q2, "HDMIIn1Q2"),
        (O::HDMI_IN1_Q3, "HDMIIn1Q3"),
        (O::HDMI_IN1_Q4, "HDMIIn1Q4"),
        (O::LUT3, "LUT3"),
        (O::LUT4, "LUT4"),
        (O::LUT5, "LUT5"),
        (O::SDI_IN1_DS2, "SDIIn1DS2"),
        (O::SDI_IN2_DS2, "SDIIn2DS2"),
        (O::FRAME_BUFFER3_YUV, "FB3YUV"),
        (O::FRAME_BUFFER4_YUV, "FB4YUV"),
        (O::CSC3_VID_YUV, "CSC3VidYUV"),
        (O::CSC3_KEY_YUV, "CSC3KeyYUV"),
        (O::CSC4_VID_YUV, "CSC4VidYUV"),
        (O::CSC4_KEY_YUV, "CSC4KeyYUV"),
        (O::DUAL_LINK_OUT2, "DLOut2"),
        (O::DUAL_LINK_OUT3, "DLOut3"),
        (O::DUAL_LINK_OUT4, "DLOut4"),
        (O::DUAL_LINK_OUT5, "DLOut5"),
        (O::DUAL_LINK_IN1, "DLIn1"),
        (O::DUAL_LINK_IN2, "DLIn2"),
        (O::DUAL_LINK_IN3, "DLIn3"),
        (O::DUAL_LINK_IN4, "DLIn4"),
        (O::MIXER3_VID_YUV, "Mixer3VidYUV"),
        (O::MIXER3_KEY_YUV, "Mixer3KeyYUV"),
        (O::SDI_IN3, "SDIIn3"),
        (O::SDI_IN4, "SDIIn4"),
        (O::SDI_IN3_DS2, "SDIIn3DS2"),
        (O::SDI_IN4_DS2, "SDIIn4DS2"),
        (O::SDI_IN5, "SDIIn5"),
        (O::SDI_IN6, "SDIIn6"),
        (O::SDI_IN7, "SDIIn7"),
        (O::SDI_IN8, "SDIIn8"),
        (O::SDI_IN5_DS2, "SDIIn5DS2"),
        (O::SDI_IN6_DS2, "SDIIn6DS2"),
        (O::SDI_IN7_DS2, "SDIIn7DS2"),
        (O::SDI_IN8_DS2, "SDIIn8DS2"),
        (O::FRAME_BUFFER5_YUV, "FB5YUV"),
        (O::FRAME_BUFFER6_YUV, "FB6YUV"),
        (O::FRAME_BUFFER7_YUV, "FB7YUV"),
        (O::FRAME_BUFFER8_YUV, "FB8YUV"),
        (O::CSC5_VID_YUV, "CSC5VidYUV"),
        (O::CSC5_KEY_YUV, "CSC5KeyYUV"),
        (O::CSC6_VID_YUV, "CSC6VidYUV"),
        (O::CSC6_KEY_YUV, "CSC6KeyYUV"),
        (O::CSC7_VID_YUV, "CSC7VidYUV"),
        (O::CSC7_KEY_YUV, "CSC7KeyYUV"),
        (O::CSC8_VID_YUV, "CSC8VidYUV"),
        (O::CSC8_KEY_YUV, "CSC8KeyYUV"),
        (O::LUT6, "LUT6"),
        (O::LUT7, "LUT7"),
        (O::LUT8, "LUT8"),
        (O::MIXER4_VID_YUV, "Mixer4VidYUV"),
        (O::MIXER4_KEY_YUV, "Mixer4KeyYUV"),
        (O::DUAL_LINK_OUT6, "DLOut6"),
        (O::DUAL_LINK_OUT7, "DLOut7"),
        (O::DUAL_LINK_OUT8, "DLOut8"),
        (O::MUX425_1A_YUV, "425Mux1AYUV"),
        (O::MUX425_1B_YUV, "425Mux1BYUV"),
        (O::MUX425_2A_YUV, "425Mux2AYUV"),
        (O::MUX425_2B_YUV, "425Mux2BYUV"),
        (O::MUX425_3A_YUV, "425Mux3AYUV"),
        (O::MUX425_3B_YUV, "425Mux3BYUV"),
        (O::MUX425_4A_YUV, "425Mux4AYUV"),
        (O::MUX425_4B_YUV, "425Mux4BYUV"),
        (O::DUAL_LINK_IN5, "DLIn5"),
        (O::DUAL_LINK_IN6, "DLIn6"),
        (O::DUAL_LINK_IN7, "DLIn7"),
        (O::DUAL_LINK_IN8, "DLIn8"),
        (O::CSC1_VID_RGB, "CSC1VidRGB"),
        (O::CSC2_VID_RGB, "CSC2VidRGB"),
        (O::CSC3_VID_RGB, "CSC3VidRGB"),
        (O::CSC4_VID_RGB, "CSC4VidRGB"),
        (O::FRAME_BUFFER1_RGB, "FB1RGB"),
        (O::FRAME_BUFFER2_RGB, "FB2RGB"),
        (O::FRAME_BUFFER3_RGB, "FB3RGB"),
        (O::FRAME_BUFFER4_RGB, "FB4RGB"),
        (O::FRAME_BUFFER5_RGB, "FB5RGB"),
        (O::FRAME_BUFFER6_RGB, "FB6RGB"),
        (O::FRAME_BUFFER7_RGB, "FB7RGB"),
        (O::FRAME_BUFFER8_RGB, "FB8RGB"),
        (O::HDMI_IN1_RGB, "HDMIIn1RGB"),
        (O::HDMI_IN1_Q2_RGB, "HDMIIn1Q2RGB"),
        (O::HDMI_IN1_Q3_RGB, "HDMIIn1Q3RGB"),
        (O::HDMI_IN1_Q4_RGB, "HDMIIn1Q4RGB"),
        (O::MUX425_1A_RGB, "425Mux1ARGB"),
        (O::MUX425_1B_RGB, "425Mux1BRGB"),
        (O::MUX425_2A_RGB, "425Mux2ARGB"),
        (O::MUX425_2B_RGB, "425Mux2BRGB"),
        (O::MUX425_3A_RGB, "425Mux3ARGB"),
        (O::MUX425_3B_RGB, "425Mux3BRGB"),
        (O::MUX425_4A_RGB, "425Mux4ARGB"),
        (O::MUX425_4B_RGB, "425Mux4BRGB"),
    ]
};

/// The assembled catalog. Obtain the process-wide instance with [catalog()].
pub struct Catalog {
    names: BTreeMap<u32, String>,
    names_lower: BTreeMap<String, u32>,
    classes: BTreeMap<String, BTreeSet<u32>>,
    decoders: BTreeMap<u32, Decoder>,
    access: BTreeMap<u32, RegisterAccess>,
    xpt_cells: BTreeMap<InputXpt, (u32, u8)>,
    cell_xpts: BTreeMap<(u32, u8), InputXpt>,
    input_names: BTreeMap<u8, &'static str>,
    output_names: BTreeMap<u8, &'static str>,
}

/// The process-wide catalog, built on first use.
pub fn catalog() -> &'static Catalog {
    static CATALOG: OnceLock<Catalog> = OnceLock::new();
    CATALOG.get_or_init(Catalog::build)
}

impl Catalog {
    fn build() -> Catalog {
        let mut cat = Catalog {
            names: BTreeMap::new(),
            names_lower: BTreeMap::new(),
            classes: BTreeMap::new(),
            decoders: BTreeMap::new(),
            access: BTreeMap::new(),
            xpt_cells: BTreeMap::new(),
            cell_xpts: BTreeMap::new(),
            input_names: INPUT_XPT_NAMES.iter().map(|(x, n)| (x.0, *n)).collect(),
            output_names: OUTPUT_XPT_NAMES.iter().map(|(x, n)| (x.0, *n)).collect(),
        };
        cat.define_globals();
        cat.define_channels();
        cat.define_audio();
        cat.define_timecode();
        cat.define_xpt_select();
        cat.define_rom();
        cat.define_anc();
        cat.define_sdi_error();
        cat.define_hdmi();
        cat.define_virtuals();
        cat
    }

    fn define(
        &mut self,
        reg: u32,
        name: String,
        decoder: Decoder,
        access: RegisterAccess,
        classes: &[&str],
    ) {
        self.names_lower.entry(name.to_lowercase()).or_insert(reg);
        self.names.entry(reg).or_insert(name);
        self.decoders.insert(reg, decoder);
        self.access.insert(reg, access);
        for class in classes {
            self.classes.entry(class.to_string()).or_default().insert(reg);
        }
        match access {
            RegisterAccess::ReadOnly => self.class_insert(CLASS_READ_ONLY, reg),
            RegisterAccess::WriteOnly => self.class_insert(CLASS_WRITE_ONLY, reg),
            RegisterAccess::ReadWrite => {}
        }
    }

    fn class_insert(&mut self, class: &str, reg: u32) {
        self.classes.entry(class.to_string()).or_default().insert(reg);
    }

    fn define_globals(&mut self) {
        self.define(
            regs::GLOBAL_CONTROL,
            "GlobalControl".into(),
            decode::global_control,
            RegisterAccess::ReadWrite,
            &[CLASS_CHANNEL[0]],
        );
        self.define(
            regs::GLOBAL_CONTROL2,
            "GlobalControl2".into(),
            decode::global_control2,
            RegisterAccess::ReadWrite,
            &[],
        );
        for (ndx, reg) in regs::GLOBAL_CONTROL_CH.iter().enumerate().skip(1) {
            self.define(
                *reg,
                format!("GlobalControlCh{}", ndx + 1),
                decode::global_control,
                RegisterAccess::ReadWrite,
                &[CLASS_CHANNEL[ndx]],
            );
        }
    }

    fn define_channels(&mut self) {
        for ndx in 0..8 {
            let chl = CLASS_CHANNEL[ndx];
            self.define(
                regs::CH_CONTROL[ndx],
                format!("Ch{}Control", ndx + 1),
                decode::channel_control,
                RegisterAccess::ReadWrite,
                &[chl],
            );
            self.define(
                regs::CH_PCI_ACCESS_FRAME[ndx],
                format!("Ch{}PCIAccessFrame", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[chl],
            );
            self.define(
                regs::CH_OUTPUT_FRAME[ndx],
                format!("Ch{}OutputFrame", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[chl],
            );
            self.define(
                regs::CH_INPUT_FRAME[ndx],
                format!("Ch{}InputFrame", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[chl],
            );
        }
    }

    fn define_audio(&mut self) {
        for ndx in 0..8 {
            self.define(
                regs::AUD_CONTROL[ndx],
                format!("Aud{}Control", ndx + 1),
                decode::audio_control,
                RegisterAccess::ReadWrite,
                &[CLASS_AUDIO, CLASS_CHANNEL[ndx]],
            );
            self.define(
                regs::AUD_SOURCE_SELECT[ndx],
                format!("Aud{}SourceSelect", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[CLASS_AUDIO, CLASS_CHANNEL[ndx]],
            );
            self.define(
                regs::AUD_NONPCM_DETECT[ndx],
                format!("Aud{}NonPCMDetect", ndx + 1),
                decode::nonpcm_detect,
                RegisterAccess::ReadOnly,
                &[CLASS_AUDIO, CLASS_CHANNEL[ndx]],
            );
        }
    }

    fn define_timecode(&mut self) {
        for ndx in 0..8 {
            let dbb = regs::RP188_DBB[ndx];
            self.define(
                dbb,
                format!("RP188InOut{}DBB", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[CLASS_TIMECODE, CLASS_CHANNEL[ndx]],
            );
            self.define(
                dbb + 1,
                format!("RP188InOut{}Bits0_31", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[CLASS_TIMECODE, CLASS_CHANNEL[ndx]],
            );
            self.define(
                dbb + 2,
                format!("RP188InOut{}Bits32_63", ndx + 1),
                decode::default,
                RegisterAccess::ReadWrite,
                &[CLASS_TIMECODE, CLASS_CHANNEL[ndx]],
            );
        }
    }

    fn define_xpt_select(&mut self) {
        let mut group_number = 1u32;
        for (table_ndx, cells) in XPT_GROUPS.iter().enumerate() {
            if group_number == 31 {
                group_number += 1; // group 31 was never assigned
            }
            let reg = regs::XPT_SELECT_GROUP[table_ndx];
            self.define(
                reg,
                format!("XptSelectGroup{}", group_number),
                decode::xpt_group,
                RegisterAccess::ReadWrite,
                &[CLASS_ROUTING],
            );
            for (ndx, cell) in cells.iter().enumerate() {
                if let Some(xpt) = cell {
                    let key = (reg, ndx as u8);
                    // one cell per input crosspoint, one input crosspoint per cell
                    self.xpt_cells.entry(*xpt).or_insert(key);
                    self.cell_xpts.entry(key).or_insert(*xpt);
                }
            }
            group_number += 1;
        }
    }

    fn define_rom(&mut self) {
        for reg in regs::XPT_ROM_FIRST..=regs::XPT_ROM_LAST {
            self.define(
                reg,
                format!("XptValidROM{}", reg - regs::XPT_ROM_FIRST),
                decode::xpt_rom,
                RegisterAccess::ReadOnly,
                &[],
            );
        }
    }

    fn define_anc(&mut self) {
        const EXT_NAMES: [&str; regs::ANC_EXT_BLOCK_LEN as usize] = [
            "Control",
            "F1 Start Address",
            "F1 End Address",
            "F2 Start Address",
            "F2 End Address",
            "Field Cutoff Lines",
            "Memory Total",
            "F1 Memory Usage",
            "F2 Memory Usage",
            "V Blank Lines",
            "Lines Per Frame",
            "Field ID Lines",
            "Ignore DID 1-4",
            "Ignore DID 5-8",
            "Ignore DID 9-12",
            "Ignore DID 13-16",
            "Ignore DID 17-20",
            "Analog Start Line",
            "Analog F1 Y Filter",
            "Analog F2 Y Filter",
            "Analog F1 C Filter",
            "Analog F2 C Filter",
        ];
        const INS_NAMES: [&str; regs::ANC_INS_BLOCK_LEN as usize] = [
            "Field Bytes",
            "Control",
            "F1 Start Address",
            "F2 Start Address",
            "Pixel Delays",
            "First Active Lines",
            "Pixels Per Line",
            "Lines Per Frame",
            "Field ID Lines",
            "Payload ID Control",
            "Payload ID",
            "Chroma Blank Lines",
            "F1 C Blanking Mask",
            "F2 C Blanking Mask",
        ];
        for ndx in 0..8 {
            let chl = CLASS_CHANNEL[ndx];
            for (off, name) in EXT_NAMES.iter().enumerate() {
                let decoder = if off as u32 == regs::ANC_EXT_CONTROL {
                    decode::anc_ext_control
                } else {
                    decode::default
                };
                self.define(
                    regs::ANC_EXT_BASE[ndx] + off as u32,
                    format!("Extract {} {}", ndx + 1, name),
                    decoder,
                    RegisterAccess::ReadWrite,
                    &[CLASS_ANC, CLASS_INPUT, chl],
                );
            }
            for (off, name) in INS_NAMES.iter().enumerate() {
                let decoder = match off as u32 {
                    regs::ANC_INS_CONTROL => decode::anc_ins_control,
                    regs::ANC_INS_FIELD_BYTES => decode::value_pair,
                    _ => decode::default,
                };
                self.define(
                    regs::ANC_INS_BASE[ndx] + off as u32,
                    format!("Insert {} {}", ndx + 1, name),
                    decoder,
                    RegisterAccess::ReadWrite,
                    &[CLASS_ANC, CLASS_OUTPUT, chl],
                );
            }
        }
    }

    fn define_sdi_error(&mut self) {
        const SUFFIXES: [&str; 6] = [
            "Status",
            "CRCErrorCount",
            "FrameCountLow",
            "FrameCountHigh",
            "FrameRefCountLow",
            "FrameRefCountHigh",
        ];
        for ndx in 0..8 {
            for (off, suffix) in SUFFIXES.iter().enumerate() {
                let access = if off >= 4 {
                    RegisterAccess::ReadOnly
                } else {
                    RegisterAccess::ReadWrite
                };
                let decoder = match off as u32 {
                    regs::RX_SDI_STATUS => decode::sdi_status,
                    _ => decode::default,
                };
                self.define(
                    regs::RX_SDI_STATUS_BASE[ndx] + off as u32,
                    format!("RXSDI{}{}", ndx + 1, suffix),
                    decoder,
                    access,
                    &[CLASS_SDI_ERROR, CLASS_CHANNEL[ndx], CLASS_INPUT],
                );
            }
        }
        self.define(
            regs::RX_SDI_FREE_RUNNING_CLOCK_LO,
            "RXSDIFreeRunningClockLow".into(),
            decode::default,
            RegisterAccess::ReadOnly,
            &[CLASS_SDI_ERROR],
        );
        self.define(
            regs::RX_SDI_FREE_RUNNING_CLOCK_HI,
            "RXSDIFreeRunningClockHigh".into(),
            decode::default,
            RegisterAccess::ReadOnly,
            &[CLASS_SDI_ERROR],
        );
    }

    fn define_hdmi(&mut self) {
        const HDR: [(u32, &str); 7] = [
            (regs::HDMI_HDR_GREEN_PRIMARY, "HDMIHDRGreenPrimary"),
            (regs::HDMI_HDR_BLUE_PRIMARY, "HDMIHDRBluePrimary"),
            (regs::HDMI_HDR_RED_PRIMARY, "HDMIHDRRedPrimary"),
            (regs::HDMI_HDR_WHITE_POINT, "HDMIHDRWhitePoint"),
            (regs::HDMI_HDR_MASTERING_LUMINANCE, "HDMIHDRMasteringLuminance"),
            (regs::HDMI_HDR_LIGHT_LEVEL, "HDMIHDRLightLevel"),
            (regs::HDMI_HDR_CONTROL, "HDMIHDRControl"),
        ];
        for (reg, name) in HDR {
            self.define(
                reg,
                name.into(),
                decode::hdr_primary,
                RegisterAccess::ReadWrite,
                &[CLASS_HDMI, CLASS_OUTPUT, CLASS_HDR],
            );
        }
    }

    fn define_virtuals(&mut self) {
        for ndx in 0..regs::VIRTUAL_COUNT {
            let reg = regs::VIRTUAL_START + ndx;
            let name = match reg {
                regs::ANC_FIELD1_OFFSET => "AncField1Offset".into(),
                regs::ANC_FIELD2_OFFSET => "AncField2Offset".into(),
                regs::APP_SIGNATURE => "AppSignature".into(),
                regs::APP_PID => "AppPID".into(),
                regs::TASK_MODE => "TaskMode".into(),
                _ => format!("Virtual{}", ndx),
            };
            self.define(reg, name, decode::default, RegisterAccess::ReadWrite, &[CLASS_VIRTUAL]);
        }
    }

    /// The display name of a register.
    pub fn register_name(&self, reg: u32) -> String {
        match self.names.get(&reg) {
            Some(name) => name.clone(),
            None => format!("Register {} ({:#x})", reg, reg),
        }
    }

    /// All registers whose name matches the query, case-insensitively.
    pub fn registers_with_name(&self, query: &str, style: MatchStyle) -> BTreeSet<u32> {
        let query = query.to_lowercase();
        let mut result = BTreeSet::new();
        if let MatchStyle::Exact = style {
            if let Some(reg) = self.names_lower.get(&query) {
                result.insert(*reg);
            }
            return result;
        }
        for (name, reg) in &self.names_lower {
            let hit = match style {
                MatchStyle::Exact => unreachable!(),
                MatchStyle::Contains => name.contains(&query),
                MatchStyle::StartsWith => name.starts_with(&query),
                MatchStyle::EndsWith => name.ends_with(&query),
            };
            if hit {
                result.insert(*reg);
            }
        }
        result
    }

    /// All registers in a class.
    pub fn registers_for_class(&self, class: &str) -> BTreeSet<u32> {
        self.classes.get(class).cloned().unwrap_or_default()
    }

    /// All classes a register belongs to.
    pub fn register_classes(&self, reg: u32) -> Vec<String> {
        self.classes
            .iter()
            .filter(|(_, regs)| regs.contains(&reg))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// All class names the catalog knows.
    pub fn all_classes(&self) -> Vec<String> {
        self.classes.keys().cloned().collect()
    }

    /// The access permission of a register.
    pub fn register_access(&self, reg: u32) -> RegisterAccess {
        self.access.get(&reg).copied().unwrap_or_default()
    }

    /// Decode a register value for humans. Pure; never touches hardware.
    pub fn decode(&self, reg: u32, value: u32, device: DeviceId) -> String {
        match self.decoders.get(&reg) {
            Some(decoder) => decoder(reg, value, device),
            None => String::new(),
        }
    }

    /// All registers with a defined name, in order.
    pub fn defined_registers(&self) -> impl Iterator<Item = u32> + '_ {
        self.names.keys().copied()
    }

    /// The `(register, cell index)` selector location for an input
    /// crosspoint.
    pub fn xpt_cell(&self, xpt: InputXpt) -> Option<(u32, u8)> {
        self.xpt_cells.get(&xpt).copied()
    }

    /// The input crosspoint behind a `(register, cell index)` location.
    pub fn input_for_cell(&self, reg: u32, ndx: u8) -> Option<InputXpt> {
        self.cell_xpts.get(&(reg, ndx)).copied()
    }

    /// Every input crosspoint with a selector cell, in ID order.
    pub fn input_xpts(&self) -> impl Iterator<Item = InputXpt> + '_ {
        self.xpt_cells.keys().copied()
    }

    pub fn input_xpt_name(&self, xpt: InputXpt) -> Option<&'static str> {
        self.input_names.get(&xpt.0).copied()
    }

    pub fn output_xpt_name(&self, xpt: OutputXpt) -> Option<&'static str> {
        self.output_names.get(&xpt.0).copied()
    }

    /// Look an input crosspoint up by display name, case-insensitively.
    pub fn input_xpt_by_name(&self, name: &str) -> Option<InputXpt> {
        self.input_names
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| InputXpt(*id))
    }

    /// Look an output crosspoint up by display name, case-insensitively.
    pub fn output_xpt_by_name(&self, name: &str) -> Option<OutputXpt> {
        self.output_names
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name))
            .map(|(id, _)| OutputXpt(*id))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_input_xpt_has_exactly_one_cell() {
        let cat = catalog();
        for (xpt, _) in INPUT_XPT_NAMES {
            let cell = cat.xpt_cell(xpt);
            assert!(cell.is_some(), "no cell for {:?}", xpt);
            let (reg, ndx) = cell.unwrap();
            assert_eq!(Some(xpt), cat.input_for_cell(reg, ndx));
        }
        // and the inverse map is a bijection
        assert_eq!(cat.xpt_cells.len(), cat.cell_xpts.len());
    }

    #[test]
    fn cell_count_matches_group_table() {
        let defined: usize = XPT_GROUPS
            .iter()
            .map(|cells| cells.iter().filter(|c| c.is_some()).count())
            .sum();
        assert_eq!(defined, catalog().input_xpts().count());
        assert_eq!(defined, INPUT_XPT_NAMES.len());
    }

    #[test]
    fn routing_class_is_the_select_groups() {
        let routing = catalog().registers_for_class(CLASS_ROUTING);
        assert_eq!(regs::XPT_SELECT_GROUP.len(), routing.len());
        for reg in regs::XPT_SELECT_GROUP {
            assert!(routing.contains(&reg));
        }
    }

    #[test]
    fn name_lookup_styles() {
        let cat = catalog();
        let exact = cat.registers_with_name("ch1control", MatchStyle::Exact);
        assert_eq!(BTreeSet::from([regs::CH_CONTROL[0]]), exact);

        let contains = cat.registers_with_name("XptSelectGroup", MatchStyle::Contains);
        assert_eq!(regs::XPT_SELECT_GROUP.len(), contains.len());

        let starts = cat.registers_with_name("aud1", MatchStyle::StartsWith);
        assert!(starts.contains(&regs::AUD_CONTROL[0]));
        assert!(!starts.contains(&regs::AUD_CONTROL[1]));

        let ends = cat.registers_with_name("InputFrame", MatchStyle::EndsWith);
        assert_eq!(8, ends.len());
    }

    #[test]
    fn channel_classes_cover_channel_registers() {
        let cat = catalog();
        let ch3 = cat.registers_for_class(CLASS_CHANNEL[2]);
        assert!(ch3.contains(&regs::CH_CONTROL[2]));
        assert!(ch3.contains(&regs::AUD_CONTROL[2]));
        assert!(ch3.contains(&regs::RP188_DBB[2]));
        assert!(!ch3.contains(&regs::CH_CONTROL[3]));
    }

    #[test]
    fn rom_registers_are_read_only() {
        let cat = catalog();
        assert_eq!(RegisterAccess::ReadOnly, cat.register_access(regs::XPT_ROM_FIRST));
        assert!(cat
            .registers_for_class(CLASS_READ_ONLY)
            .contains(&regs::XPT_ROM_LAST));
    }

    #[test]
    fn virtual_registers_are_classed() {
        let cat = catalog();
        let virtuals = cat.registers_for_class(CLASS_VIRTUAL);
        assert_eq!(regs::VIRTUAL_COUNT as usize, virtuals.len());
        assert!(virtuals.contains(&regs::ANC_FIELD1_OFFSET));
        assert_eq!("AncField2Offset", cat.register_name(regs::ANC_FIELD2_OFFSET));
    }

    #[test]
    fn unknown_register_has_fallback_name() {
        assert_eq!("Register 9999 (0x270f)", catalog().register_name(9999));
    }
}
