//! Crosspoint identifiers and the widget model.
//!
//! An *input* crosspoint is a consumer port on a widget; an *output*
//! crosspoint is a producer port. Routing connects an input to an output by
//! writing the output's 8-bit selector value into the input's cell of a
//! crosspoint select register (see [crate::catalog]).

/// An input (consumer) crosspoint port.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct InputXpt(pub u8);

/// An output (producer) crosspoint port.
///
/// The selector value written into a crosspoint cell. `BLACK` (0) is the
/// universal "disconnected" source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputXpt(pub u8);

macro_rules! xpt_consts {
    ($ty:ident, $($name:ident = $val:expr;)*) => {
        impl $ty {
            $(pub const $name: $ty = $ty($val);)*
        }
    };
}

xpt_consts! { InputXpt,
    LUT1 = 0x01;
    CSC1_VID = 0x02;
    CONVERSION = 0x03;
    COMPRESSION = 0x04;
    FRAME_BUFFER1 = 0x05;
    FRAME_SYNC1 = 0x06;
    FRAME_SYNC2 = 0x07;
    DUAL_LINK_OUT1 = 0x08;
    ANALOG_OUT = 0x09;
    SDI_OUT1 = 0x0A;
    SDI_OUT2 = 0x0B;
    CSC1_KEY = 0x0C;
    MIXER1_FG_VID = 0x0D;
    MIXER1_FG_KEY = 0x0E;
    MIXER1_BG_VID = 0x0F;
    MIXER1_BG_KEY = 0x10;
    FRAME_BUFFER2 = 0x11;
    LUT2 = 0x12;
    CSC2_VID = 0x13;
    CSC2_KEY = 0x14;
    WATER_MARKER1 = 0x15;
    IICT1 = 0x16;
    HDMI_OUT = 0x17;
    CONVERSION2 = 0x18;
    WATER_MARKER2 = 0x19;
    IICT2 = 0x1A;
    DUAL_LINK_OUT2 = 0x1B;
    SDI_OUT3 = 0x1C;
    SDI_OUT4 = 0x1D;
    SDI_OUT5 = 0x1E;
    MIXER2_FG_VID = 0x1F;
    MIXER2_FG_KEY = 0x20;
    MIXER2_BG_VID = 0x21;
    MIXER2_BG_KEY = 0x22;
    SDI_OUT1_DS2 = 0x23;
    SDI_OUT2_DS2 = 0x24;
    DUAL_LINK_IN1 = 0x25;
    DUAL_LINK_IN1_DS = 0x26;
    DUAL_LINK_IN2 = 0x27;
    DUAL_LINK_IN2_DS = 0x28;
    LUT3 = 0x29;
    LUT4 = 0x2A;
    LUT5 = 0x2B;
    FRAME_BUFFER3 = 0x2C;
    FRAME_BUFFER4 = 0x2D;
    SDI_OUT3_DS2 = 0x2E;
    SDI_OUT5_DS2 = 0x2F;
    SDI_OUT4_DS2 = 0x30;
    DUAL_LINK_IN3 = 0x31;
    DUAL_LINK_IN3_DS = 0x32;
    DUAL_LINK_IN4 = 0x33;
    DUAL_LINK_IN4_DS = 0x34;
    DUAL_LINK_OUT3 = 0x35;
    DUAL_LINK_OUT4 = 0x36;
    DUAL_LINK_OUT5 = 0x37;
    CSC3_VID = 0x38;
    CSC3_KEY = 0x39;
    CSC4_VID = 0x3A;
    CSC4_KEY = 0x3B;
    CSC5_VID = 0x3C;
    CSC5_KEY = 0x3D;
    DC4K_Q1 = 0x3E;
    DC4K_Q2 = 0x3F;
    DC4K_Q3 = 0x40;
    DC4K_Q4 = 0x41;
    HDMI_OUT_Q2 = 0x42;
    HDMI_OUT_Q3 = 0x43;
    HDMI_OUT_Q4 = 0x44;
    FRAME_BUFFER5 = 0x45;
    FRAME_BUFFER6 = 0x46;
    FRAME_BUFFER7 = 0x47;
    FRAME_BUFFER8 = 0x48;
    SDI_OUT6 = 0x49;
    SDI_OUT6_DS2 = 0x4A;
    SDI_OUT7 = 0x4B;
    SDI_OUT7_DS2 = 0x4C;
    CSC7_VID = 0x4D;
    CSC7_KEY = 0x4E;
    CSC8_VID = 0x4F;
    CSC8_KEY = 0x50;
    LUT6 = 0x51;
    LUT7 = 0x52;
    LUT8 = 0x53;
    DUAL_LINK_IN5 = 0x54;
    DUAL_LINK_IN5_DS = 0x55;
    DUAL_LINK_IN6 = 0x56;
    DUAL_LINK_IN6_DS = 0x57;
    DUAL_LINK_IN7 = 0x58;
    DUAL_LINK_IN7_DS = 0x59;
    DUAL_LINK_IN8 = 0x5A;
    DUAL_LINK_IN8_DS = 0x5B;
    DUAL_LINK_OUT6 = 0x5C;
    DUAL_LINK_OUT7 = 0x5D;
    DUAL_LINK_OUT8 = 0x5E;
    MIXER3_FG_VID = 0x5F;
    MIXER3_FG_KEY = 0x60;
    MIXER3_BG_VID = 0x61;
    MIXER3_BG_KEY = 0x62;
    MIXER4_FG_VID = 0x63;
    MIXER4_FG_KEY = 0x64;
    MIXER4_BG_VID = 0x65;
    MIXER4_BG_KEY = 0x66;
    SDI_OUT8 = 0x67;
    SDI_OUT8_DS2 = 0x68;
    CSC6_VID = 0x69;
    CSC6_KEY = 0x6A;
    MUX425_1A = 0x6B;
    MUX425_1B = 0x6C;
    MUX425_2A = 0x6D;
    MUX425_2B = 0x6E;
    MUX425_3A = 0x6F;
    MUX425_3B = 0x70;
    MUX425_4A = 0x71;
    MUX425_4B = 0x72;
    FRAME_BUFFER1_B = 0x73;
    FRAME_BUFFER2_B = 0x74;
    FRAME_BUFFER3_B = 0x75;
    FRAME_BUFFER4_B = 0x76;
    FRAME_BUFFER5_B = 0x77;
    FRAME_BUFFER6_B = 0x78;
    FRAME_BUFFER7_B = 0x79;
    FRAME_BUFFER8_B = 0x7A;
}

impl InputXpt {
    /// The lowest valid input crosspoint ID.
    pub const FIRST: InputXpt = InputXpt::LUT1;
    /// The highest valid input crosspoint ID.
    pub const LAST: InputXpt = InputXpt::FRAME_BUFFER8_B;

    /// The framestore input for a channel's A-side raster.
    pub const fn frame_buffer(channel: crate::Channel) -> InputXpt {
        const TABLE: [InputXpt; 8] = [
            InputXpt::FRAME_BUFFER1,
            InputXpt::FRAME_BUFFER2,
            InputXpt::FRAME_BUFFER3,
            InputXpt::FRAME_BUFFER4,
            InputXpt::FRAME_BUFFER5,
            InputXpt::FRAME_BUFFER6,
            InputXpt::FRAME_BUFFER7,
            InputXpt::FRAME_BUFFER8,
        ];
        TABLE[channel.index()]
    }

    /// The framestore input for a channel's B-side raster (TSI).
    pub const fn frame_buffer_b(channel: crate::Channel) -> InputXpt {
        const TABLE: [InputXpt; 8] = [
            InputXpt::FRAME_BUFFER1_B,
            InputXpt::FRAME_BUFFER2_B,
            InputXpt::FRAME_BUFFER3_B,
            InputXpt::FRAME_BUFFER4_B,
            InputXpt::FRAME_BUFFER5_B,
            InputXpt::FRAME_BUFFER6_B,
            InputXpt::FRAME_BUFFER7_B,
            InputXpt::FRAME_BUFFER8_B,
        ];
        TABLE[channel.index()]
    }

    /// The SDI output widget's primary input for a channel.
    pub const fn sdi_out(channel: crate::Channel) -> InputXpt {
        const TABLE: [InputXpt; 8] = [
            InputXpt::SDI_OUT1,
            InputXpt::SDI_OUT2,
            InputXpt::SDI_OUT3,
            InputXpt::SDI_OUT4,
            InputXpt::SDI_OUT5,
            InputXpt::SDI_OUT6,
            InputXpt::SDI_OUT7,
            InputXpt::SDI_OUT8,
        ];
        TABLE[channel.index()]
    }

    /// The CSC video input for a channel.
    pub const fn csc_vid(channel: crate::Channel) -> InputXpt {
        const TABLE: [InputXpt; 8] = [
            InputXpt::CSC1_VID,
            InputXpt::CSC2_VID,
            InputXpt::CSC3_VID,
            InputXpt::CSC4_VID,
            InputXpt::CSC5_VID,
            InputXpt::CSC6_VID,
            InputXpt::CSC7_VID,
            InputXpt::CSC8_VID,
        ];
        TABLE[channel.index()]
    }

    /// The name of this input crosspoint, if it's a known one.
    pub fn name(self) -> Option<&'static str> {
        crate::catalog::catalog().input_xpt_name(self)
    }
}

impl core::fmt::Display for InputXpt {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "InputXpt({:#04x})", self.0),
        }
    }
}

xpt_consts! { OutputXpt,
    BLACK = 0x00;
    SDI_IN1 = 0x01;
    SDI_IN2 = 0x02;
    ANALOG_IN = 0x03;
    LUT1 = 0x04;
    CSC1_VID_YUV = 0x05;
    CONVERSION = 0x06;
    COMPRESSION = 0x07;
    FRAME_BUFFER1_YUV = 0x08;
    FRAME_SYNC1 = 0x09;
    FRAME_SYNC2 = 0x0A;
    DUAL_LINK_OUT1 = 0x0B;
    CSC1_KEY_YUV = 0x0C;
    MIXER1_VID_YUV = 0x0D;
    MIXER1_KEY_YUV = 0x0E;
    FRAME_BUFFER2_YUV = 0x0F;
    CSC2_VID_YUV = 0x10;
    CSC2_KEY_YUV = 0x11;
    LUT2 = 0x12;
    MIXER2_VID_YUV = 0x13;
    MIXER2_KEY_YUV = 0x14;
    WATER_MARKER1 = 0x15;
    IICT1 = 0x16;
    HDMI_IN1 = 0x17;
    HDMI_IN1_Q2 = 0x18;
    HDMI_IN1_Q3 = 0x19;
    HDMI_IN1_Q4 = 0x1A;
    LUT3 = 0x1B;
    LUT4 = 0x1C;
    LUT5 = 0x1D;
    SDI_IN1_DS2 = 0x1E;
    SDI_IN2_DS2 = 0x1F;
    FRAME_BUFFER3_YUV = 0x20;
    FRAME_BUFFER4_YUV = 0x21;
    CSC3_VID_YUV = 0x22;
    CSC3_KEY_YUV = 0x23;
    CSC4_VID_YUV = 0x24;
    CSC4_KEY_YUV = 0x25;
    DUAL_LINK_OUT2 = 0x26;
    DUAL_LINK_OUT3 = 0x27;
    DUAL_LINK_OUT4 = 0x28;
    DUAL_LINK_OUT5 = 0x29;
    DUAL_LINK_IN1 = 0x2A;
    DUAL_LINK_IN2 = 0x2B;
    DUAL_LINK_IN3 = 0x2C;
    DUAL_LINK_IN4 = 0x2D;
    MIXER3_VID_YUV = 0x2E;
    MIXER3_KEY_YUV = 0x2F;
    SDI_IN3 = 0x30;
    SDI_IN4 = 0x31;
    SDI_IN3_DS2 = 0x33;
    SDI_IN4_DS2 = 0x34;
    SDI_IN5 = 0x35;
    SDI_IN6 = 0x36;
    SDI_IN7 = 0x37;
    SDI_IN8 = 0x38;
    SDI_IN5_DS2 = 0x39;
    SDI_IN6_DS2 = 0x3A;
    SDI_IN7_DS2 = 0x3B;
    SDI_IN8_DS2 = 0x3C;
    FRAME_BUFFER5_YUV = 0x3D;
    FRAME_BUFFER6_YUV = 0x3E;
    FRAME_BUFFER7_YUV = 0x3F;
    FRAME_BUFFER8_YUV = 0x40;
    CSC5_VID_YUV = 0x41;
    CSC5_KEY_YUV = 0x42;
    CSC6_VID_YUV = 0x43;
    CSC6_KEY_YUV = 0x44;
    CSC7_VID_YUV = 0x45;
    CSC7_KEY_YUV = 0x46;
    CSC8_VID_YUV = 0x47;
    CSC8_KEY_YUV = 0x48;
    LUT6 = 0x49;
    LUT7 = 0x4A;
    LUT8 = 0x4B;
    MIXER4_VID_YUV = 0x4C;
    MIXER4_KEY_YUV = 0x4D;
    DUAL_LINK_OUT6 = 0x4E;
    DUAL_LINK_OUT7 = 0x4F;
    DUAL_LINK_OUT8 = 0x50;
    MUX425_1A_YUV = 0x51;
    MUX425_1B_YUV = 0x52;
    MUX425_2A_YUV = 0x53;
    MUX425_2B_YUV = 0x54;
    MUX425_3A_YUV = 0x55;
    MUX425_3B_YUV = 0x56;
    MUX425_4A_YUV = 0x57;
    MUX425_4B_YUV = 0x58;
    DUAL_LINK_IN5 = 0x59;
    DUAL_LINK_IN6 = 0x5A;
    DUAL_LINK_IN7 = 0x5B;
    DUAL_LINK_IN8 = 0x5C;
    CSC1_VID_RGB = 0x65;
    CSC2_VID_RGB = 0x66;
    CSC3_VID_RGB = 0x67;
    CSC4_VID_RGB = 0x68;
    FRAME_BUFFER1_RGB = 0x69;
    FRAME_BUFFER2_RGB = 0x6A;
    FRAME_BUFFER3_RGB = 0x6B;
    FRAME_BUFFER4_RGB = 0x6C;
    FRAME_BUFFER5_RGB = 0x6D;
    FRAME_BUFFER6_RGB = 0x6E;
    FRAME_BUFFER7_RGB = 0x6F;
    FRAME_BUFFER8_RGB = 0x70;
    HDMI_IN1_RGB = 0x71;
    HDMI_IN1_Q2_RGB = 0x72;
    HDMI_IN1_Q3_RGB = 0x73;
    HDMI_IN1_Q4_RGB = 0x74;
    MUX425_1A_RGB = 0x75;
    MUX425_1B_RGB = 0x76;
    MUX425_2A_RGB = 0x77;
    MUX425_2B_RGB = 0x78;
    MUX425_3A_RGB = 0x79;
    MUX425_3B_RGB = 0x7A;
    MUX425_4A_RGB = 0x7B;
    MUX425_4B_RGB = 0x7C;
}

impl OutputXpt {
    /// One past the highest valid output crosspoint ID.
    ///
    /// The route ROM carries one bit per output ID below this bound, spread
    /// across four 32-bit registers per input crosspoint.
    pub const LIMIT: u8 = 0x7D;

    /// The SDI input widget's output for a channel.
    pub const fn sdi_in(channel: crate::Channel) -> OutputXpt {
        const TABLE: [OutputXpt; 8] = [
            OutputXpt::SDI_IN1,
            OutputXpt::SDI_IN2,
            OutputXpt::SDI_IN3,
            OutputXpt::SDI_IN4,
            OutputXpt::SDI_IN5,
            OutputXpt::SDI_IN6,
            OutputXpt::SDI_IN7,
            OutputXpt::SDI_IN8,
        ];
        TABLE[channel.index()]
    }

    /// The framestore YUV output for a channel.
    pub const fn frame_buffer_yuv(channel: crate::Channel) -> OutputXpt {
        const TABLE: [OutputXpt; 8] = [
            OutputXpt::FRAME_BUFFER1_YUV,
            OutputXpt::FRAME_BUFFER2_YUV,
            OutputXpt::FRAME_BUFFER3_YUV,
            OutputXpt::FRAME_BUFFER4_YUV,
            OutputXpt::FRAME_BUFFER5_YUV,
            OutputXpt::FRAME_BUFFER6_YUV,
            OutputXpt::FRAME_BUFFER7_YUV,
            OutputXpt::FRAME_BUFFER8_YUV,
        ];
        TABLE[channel.index()]
    }

    /// The name of this output crosspoint, if it's a known one.
    pub fn name(self) -> Option<&'static str> {
        crate::catalog::catalog().output_xpt_name(self)
    }
}

impl core::fmt::Display for OutputXpt {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "OutputXpt({:#04x})", self.0),
        }
    }
}

/// A functional block inside the card.
///
/// Widgets group crosspoints: each widget exposes zero or more input ports
/// and zero or more output ports. Which widgets exist depends on the device
/// model. Ordinals are 0-based and bounded by the family maximums (8
/// framestores/SDI/CSC/LUT/dual-links, 4 mixers and muxes, 2 frame syncs
/// and watermarkers); port lookups panic past those bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Widget {
    FrameStore(u8),
    SdiIn(u8),
    SdiOut(u8),
    Csc(u8),
    Lut(u8),
    Mixer(u8),
    DualLinkIn(u8),
    DualLinkOut(u8),
    Mux425(u8),
    HdmiIn,
    HdmiOut,
    FrameSync(u8),
    Conversion,
    Compression,
    AnalogIn,
    AnalogOut,
    WaterMarker(u8),
    MultiRasterViewer,
}

impl Widget {
    /// The input crosspoints this widget exposes.
    pub fn inputs(self) -> Vec<InputXpt> {
        use InputXpt as I;
        match self {
            Widget::FrameStore(n) => {
                let ch = crate::Channel::new(n).expect("framestore ordinal");
                vec![I::frame_buffer(ch), I::frame_buffer_b(ch)]
            }
            Widget::SdiIn(_) => Vec::new(),
            Widget::SdiOut(n) => {
                let ch = crate::Channel::new(n).expect("sdi out ordinal");
                let ds2 = [
                    I::SDI_OUT1_DS2,
                    I::SDI_OUT2_DS2,
                    I::SDI_OUT3_DS2,
                    I::SDI_OUT4_DS2,
                    I::SDI_OUT5_DS2,
                    I::SDI_OUT6_DS2,
                    I::SDI_OUT7_DS2,
                    I::SDI_OUT8_DS2,
                ];
                vec![I::sdi_out(ch), ds2[ch.index()]]
            }
            Widget::Csc(n) => {
                let ch = crate::Channel::new(n).expect("csc ordinal");
                let keys = [
                    I::CSC1_KEY,
                    I::CSC2_KEY,
                    I::CSC3_KEY,
                    I::CSC4_KEY,
                    I::CSC5_KEY,
                    I::CSC6_KEY,
                    I::CSC7_KEY,
                    I::CSC8_KEY,
                ];
                vec![I::csc_vid(ch), keys[ch.index()]]
            }
            Widget::Lut(n) => {
                let luts = [
                    I::LUT1,
                    I::LUT2,
                    I::LUT3,
                    I::LUT4,
                    I::LUT5,
                    I::LUT6,
                    I::LUT7,
                    I::LUT8,
                ];
                vec![luts[n as usize]]
            }
            Widget::Mixer(n) => {
                let fgs = [
                    [I::MIXER1_FG_VID, I::MIXER1_FG_KEY, I::MIXER1_BG_VID, I::MIXER1_BG_KEY],
                    [I::MIXER2_FG_VID, I::MIXER2_FG_KEY, I::MIXER2_BG_VID, I::MIXER2_BG_KEY],
                    [I::MIXER3_FG_VID, I::MIXER3_FG_KEY, I::MIXER3_BG_VID, I::MIXER3_BG_KEY],
                    [I::MIXER4_FG_VID, I::MIXER4_FG_KEY, I::MIXER4_BG_VID, I::MIXER4_BG_KEY],
                ];
                fgs[n as usize].to_vec()
            }
            Widget::DualLinkIn(n) => {
                let ins = [
                    [I::DUAL_LINK_IN1, I::DUAL_LINK_IN1_DS],
                    [I::DUAL_LINK_IN2, I::DUAL_LINK_IN2_DS],
                    [I::DUAL_LINK_IN3, I::DUAL_LINK_IN3_DS],
                    [I::DUAL_LINK_IN4, I::DUAL_LINK_IN4_DS],
                    [I::DUAL_LINK_IN5, I::DUAL_LINK_IN5_DS],
                    [I::DUAL_LINK_IN6, I::DUAL_LINK_IN6_DS],
                    [I::DUAL_LINK_IN7, I::DUAL_LINK_IN7_DS],
                    [I::DUAL_LINK_IN8, I::DUAL_LINK_IN8_DS],
                ];
                ins[n as usize].to_vec()
            }
            Widget::DualLinkOut(n) => {
                let outs = [
                    I::DUAL_LINK_OUT1,
                    I::DUAL_LINK_OUT2,
                    I::DUAL_LINK_OUT3,
                    I::DUAL_LINK_OUT4,
                    I::DUAL_LINK_OUT5,
                    I::DUAL_LINK_OUT6,
                    I::DUAL_LINK_OUT7,
                    I::DUAL_LINK_OUT8,
                ];
                vec![outs[n as usize]]
            }
            Widget::Mux425(n) => {
                let muxes = [
                    [I::MUX425_1A, I::MUX425_1B],
                    [I::MUX425_2A, I::MUX425_2B],
                    [I::MUX425_3A, I::MUX425_3B],
                    [I::MUX425_4A, I::MUX425_4B],
                ];
                muxes[n as usize].to_vec()
            }
            Widget::HdmiIn => Vec::new(),
            Widget::HdmiOut => vec![I::HDMI_OUT, I::HDMI_OUT_Q2, I::HDMI_OUT_Q3, I::HDMI_OUT_Q4],
            Widget::FrameSync(n) => vec![[I::FRAME_SYNC1, I::FRAME_SYNC2][n as usize]],
            Widget::Conversion => vec![I::CONVERSION, I::CONVERSION2],
            Widget::Compression => vec![I::COMPRESSION],
            Widget::AnalogIn => Vec::new(),
            Widget::AnalogOut => vec![I::ANALOG_OUT],
            Widget::WaterMarker(n) => vec![[I::WATER_MARKER1, I::WATER_MARKER2][n as usize]],
            Widget::MultiRasterViewer => vec![I::DC4K_Q1, I::DC4K_Q2, I::DC4K_Q3, I::DC4K_Q4],
        }
    }

    /// The output crosspoints this widget exposes.
    pub fn outputs(self) -> Vec<OutputXpt> {
        use OutputXpt as O;
        match self {
            Widget::FrameStore(n) => {
                let ch = crate::Channel::new(n).expect("framestore ordinal");
                let rgbs = [
                    O::FRAME_BUFFER1_RGB,
                    O::FRAME_BUFFER2_RGB,
                    O::FRAME_BUFFER3_RGB,
                    O::FRAME_BUFFER4_RGB,
                    O::FRAME_BUFFER5_RGB,
                    O::FRAME_BUFFER6_RGB,
                    O::FRAME_BUFFER7_RGB,
                    O::FRAME_BUFFER8_RGB,
                ];
                vec![O::frame_buffer_yuv(ch), rgbs[ch.index()]]
            }
            Widget::SdiIn(n) => {
                let ch = crate::Channel::new(n).expect("sdi in ordinal");
                let ds2 = [
                    O::SDI_IN1_DS2,
                    O::SDI_IN2_DS2,
                    O::SDI_IN3_DS2,
                    O::SDI_IN4_DS2,
                    O::SDI_IN5_DS2,
                    O::SDI_IN6_DS2,
                    O::SDI_IN7_DS2,
                    O::SDI_IN8_DS2,
                ];
                vec![O::sdi_in(ch), ds2[ch.index()]]
            }
            Widget::SdiOut(_) => Vec::new(),
            Widget::Csc(n) => {
                let vids = [
                    O::CSC1_VID_YUV,
                    O::CSC2_VID_YUV,
                    O::CSC3_VID_YUV,
                    O::CSC4_VID_YUV,
                    O::CSC5_VID_YUV,
                    O::CSC6_VID_YUV,
                    O::CSC7_VID_YUV,
                    O::CSC8_VID_YUV,
                ];
                let keys = [
                    O::CSC1_KEY_YUV,
                    O::CSC2_KEY_YUV,
                    O::CSC3_KEY_YUV,
                    O::CSC4_KEY_YUV,
                    O::CSC5_KEY_YUV,
                    O::CSC6_KEY_YUV,
                    O::CSC7_KEY_YUV,
                    O::CSC8_KEY_YUV,
                ];
                let mut outs = vec![vids[n as usize], keys[n as usize]];
                // only the first four CSCs have an RGB tap
                let rgbs = [O::CSC1_VID_RGB, O::CSC2_VID_RGB, O::CSC3_VID_RGB, O::CSC4_VID_RGB];
                if (n as usize) < rgbs.len() {
                    outs.push(rgbs[n as usize]);
                }
                outs
            }
            Widget::Lut(n) => {
                let luts = [
                    O::LUT1,
                    O::LUT2,
                    O::LUT3,
                    O::LUT4,
                    O::LUT5,
                    O::LUT6,
                    O::LUT7,
                    O::LUT8,
                ];
                vec![luts[n as usize]]
            }
            Widget::Mixer(n) => {
                let vids = [O::MIXER1_VID_YUV, O::MIXER2_VID_YUV, O::MIXER3_VID_YUV, O::MIXER4_VID_YUV];
                let keys = [O::MIXER1_KEY_YUV, O::MIXER2_KEY_YUV, O::MIXER3_KEY_YUV, O::MIXER4_KEY_YUV];
                vec![vids[n as usize], keys[n as usize]]
            }
            Widget::DualLinkIn(n) => {
                let outs = [
                    O::DUAL_LINK_IN1,
                    O::DUAL_LINK_IN2,
                    O::DUAL_LINK_IN3,
                    O::DUAL_LINK_IN4,
                    O::DUAL_LINK_IN5,
                    O::DUAL_LINK_IN6,
                    O::DUAL_LINK_IN7,
                    O::DUAL_LINK_IN8,
                ];
                vec![outs[n as usize]]
            }
            Widget::DualLinkOut(n) => {
                let outs = [
                    O::DUAL_LINK_OUT1,
                    O::DUAL_LINK_OUT2,
                    O::DUAL_LINK_OUT3,
                    O::DUAL_LINK_OUT4,
                    O::DUAL_LINK_OUT5,
                    O::DUAL_LINK_OUT6,
                    O::DUAL_LINK_OUT7,
                    O::DUAL_LINK_OUT8,
                ];
                vec![outs[n as usize]]
            }
            Widget::Mux425(n) => {
                let yuvs = [
                    [O::MUX425_1A_YUV, O::MUX425_1B_YUV],
                    [O::MUX425_2A_YUV, O::MUX425_2B_YUV],
                    [O::MUX425_3A_YUV, O::MUX425_3B_YUV],
                    [O::MUX425_4A_YUV, O::MUX425_4B_YUV],
                ];
                let rgbs = [
                    [O::MUX425_1A_RGB, O::MUX425_1B_RGB],
                    [O::MUX425_2A_RGB, O::MUX425_2B_RGB],
                    [O::MUX425_3A_RGB, O::MUX425_3B_RGB],
                    [O::MUX425_4A_RGB, O::MUX425_4B_RGB],
                ];
                let mut outs = yuvs[n as usize].to_vec();
                outs.extend_from_slice(&rgbs[n as usize]);
                outs
            }
            Widget::HdmiIn => vec![
                O::HDMI_IN1,
                O::HDMI_IN1_Q2,
                O::HDMI_IN1_Q3,
                O::HDMI_IN1_Q4,
                O::HDMI_IN1_RGB,
                O::HDMI_IN1_Q2_RGB,
                O::HDMI_IN1_Q3_RGB,
                O::HDMI_IN1_Q4_RGB,
            ],
            Widget::HdmiOut => Vec::new(),
            Widget::FrameSync(n) => vec![[O::FRAME_SYNC1, O::FRAME_SYNC2][n as usize]],
            Widget::Conversion => vec![O::CONVERSION],
            Widget::Compression => vec![O::COMPRESSION],
            Widget::AnalogIn => vec![O::ANALOG_IN],
            Widget::AnalogOut => Vec::new(),
            Widget::WaterMarker(n) => vec![[O::WATER_MARKER1, O::IICT1][n as usize]],
            Widget::MultiRasterViewer => Vec::new(),
        }
    }

    /// Find the widget that produces a given output crosspoint.
    pub fn for_output(xpt: OutputXpt, widgets: &[Widget]) -> Option<Widget> {
        widgets.iter().copied().find(|w| w.outputs().contains(&xpt))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn channel_helpers_line_up() {
        assert_eq!(InputXpt::FRAME_BUFFER1, InputXpt::frame_buffer(crate::Channel::CH1));
        assert_eq!(InputXpt::FRAME_BUFFER8_B, InputXpt::frame_buffer_b(crate::Channel::CH8));
        assert_eq!(OutputXpt::SDI_IN4, OutputXpt::sdi_in(crate::Channel::CH4));
        assert_eq!(InputXpt::SDI_OUT5, InputXpt::sdi_out(crate::Channel::CH5));
    }

    #[test]
    fn output_ids_fit_the_rom() {
        // every defined output selector must be representable in the
        // 128-bit per-input ROM bitmap
        assert!(OutputXpt::LIMIT as u32 <= 128);
        assert!(OutputXpt::MUX425_4B_RGB.0 < OutputXpt::LIMIT);
    }

    #[test]
    fn widget_ports_are_disjoint_per_widget() {
        let w = Widget::Csc(0);
        let ins = w.inputs();
        let outs = w.outputs();
        assert_eq!(2, ins.len());
        assert_eq!(3, outs.len());
        assert!(ins.contains(&InputXpt::CSC1_VID));
        assert!(outs.contains(&OutputXpt::CSC1_VID_RGB));
    }

    #[test]
    fn output_widget_lookup() {
        let widgets = [Widget::SdiIn(0), Widget::FrameStore(0), Widget::Csc(0)];
        assert_eq!(
            Some(Widget::FrameStore(0)),
            Widget::for_output(OutputXpt::FRAME_BUFFER1_YUV, &widgets)
        );
        assert_eq!(None, Widget::for_output(OutputXpt::MIXER1_VID_YUV, &widgets));
    }
}
