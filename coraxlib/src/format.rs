//! The format model: raster timing families, frame rates, pixel formats,
//! and the byte-layout math used by DMA and buffer sizing.

/// A raster timing family.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Standard {
    Sd525,
    Sd625,
    Hd720,
    Hd1080i,
    Hd1080p,
    P2k1080,
    I2k1080,
    Uhd3840,
    Uhd4096,
    Uhd3840Hfr,
    Uhd4096Hfr,
}

impl Standard {
    /// Active raster width in pixels.
    pub const fn width(self) -> u32 {
        match self {
            Standard::Sd525 | Standard::Sd625 => 720,
            Standard::Hd720 => 1280,
            Standard::Hd1080i | Standard::Hd1080p => 1920,
            Standard::P2k1080 | Standard::I2k1080 => 2048,
            Standard::Uhd3840 | Standard::Uhd3840Hfr => 3840,
            Standard::Uhd4096 | Standard::Uhd4096Hfr => 4096,
        }
    }

    /// Active raster height in lines.
    pub const fn active_height(self) -> u32 {
        match self {
            Standard::Sd525 => 486,
            Standard::Sd625 => 576,
            Standard::Hd720 => 720,
            Standard::Hd1080i | Standard::Hd1080p | Standard::P2k1080 | Standard::I2k1080 => 1080,
            Standard::Uhd3840 | Standard::Uhd4096 | Standard::Uhd3840Hfr | Standard::Uhd4096Hfr => {
                2160
            }
        }
    }

    /// Total lines per frame including blanking.
    pub const fn total_lines(self) -> u32 {
        match self {
            Standard::Sd525 => 525,
            Standard::Sd625 => 625,
            Standard::Hd720 => 750,
            Standard::Hd1080i | Standard::Hd1080p | Standard::P2k1080 | Standard::I2k1080 => 1125,
            Standard::Uhd3840 | Standard::Uhd4096 | Standard::Uhd3840Hfr | Standard::Uhd4096Hfr => {
                2250
            }
        }
    }

    pub const fn is_progressive(self) -> bool {
        !matches!(self, Standard::Sd525 | Standard::Sd625 | Standard::Hd1080i | Standard::I2k1080)
    }

    pub const fn is_sd(self) -> bool {
        matches!(self, Standard::Sd525 | Standard::Sd625)
    }

    pub const fn is_quad(self) -> bool {
        matches!(
            self,
            Standard::Uhd3840 | Standard::Uhd4096 | Standard::Uhd3840Hfr | Standard::Uhd4096Hfr
        )
    }

    /// Extra raster lines added above active picture by a VANC mode.
    pub const fn vanc_lines(self, mode: VancMode) -> u32 {
        let (tall, taller) = match self {
            Standard::Sd525 => (21, 27),
            Standard::Sd625 => (24, 28),
            Standard::Hd720 => (26, 26),
            Standard::Hd1080i | Standard::Hd1080p | Standard::P2k1080 | Standard::I2k1080 => {
                (32, 41)
            }
            // quad rasters have no tall modes
            _ => (0, 0),
        };
        match mode {
            VancMode::Off => 0,
            VancMode::Tall => tall,
            VancMode::Taller => taller,
        }
    }

    /// The selector value written into the global control register.
    pub const fn selector(self) -> u8 {
        match self {
            Standard::Sd525 => 0,
            Standard::Sd625 => 1,
            Standard::Hd720 => 2,
            Standard::Hd1080i => 3,
            Standard::Hd1080p => 4,
            Standard::P2k1080 => 5,
            Standard::I2k1080 => 6,
            Standard::Uhd3840 => 7,
            Standard::Uhd4096 => 8,
            Standard::Uhd3840Hfr => 9,
            Standard::Uhd4096Hfr => 10,
        }
    }

    pub const fn from_selector(sel: u8) -> Option<Standard> {
        match sel {
            0 => Some(Standard::Sd525),
            1 => Some(Standard::Sd625),
            2 => Some(Standard::Hd720),
            3 => Some(Standard::Hd1080i),
            4 => Some(Standard::Hd1080p),
            5 => Some(Standard::P2k1080),
            6 => Some(Standard::I2k1080),
            7 => Some(Standard::Uhd3840),
            8 => Some(Standard::Uhd4096),
            9 => Some(Standard::Uhd3840Hfr),
            10 => Some(Standard::Uhd4096Hfr),
            _ => None,
        }
    }

    /// First active raster line of each field.
    pub const fn first_active_lines(self) -> (u32, u32) {
        match self {
            Standard::Sd525 => (21, 283),
            Standard::Sd625 => (23, 336),
            Standard::Hd720 => (26, 0),
            Standard::Hd1080i | Standard::I2k1080 => (21, 584),
            Standard::Hd1080p | Standard::P2k1080 => (42, 0),
            _ => (0, 0),
        }
    }
}

/// A frame rate. Fractional rates are the 1000/1001 broadcast pulldowns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameRate {
    F6000,
    F5994,
    F5000,
    F4800,
    F4795,
    F3000,
    F2997,
    F2500,
    F2400,
    F2398,
}

impl FrameRate {
    /// The rate as a rational number, `num/den` Hz.
    pub const fn ratio(self) -> (u32, u32) {
        match self {
            FrameRate::F6000 => (60, 1),
            FrameRate::F5994 => (60000, 1001),
            FrameRate::F5000 => (50, 1),
            FrameRate::F4800 => (48, 1),
            FrameRate::F4795 => (48000, 1001),
            FrameRate::F3000 => (30, 1),
            FrameRate::F2997 => (30000, 1001),
            FrameRate::F2500 => (25, 1),
            FrameRate::F2400 => (24, 1),
            FrameRate::F2398 => (24000, 1001),
        }
    }

    pub const fn is_fractional(self) -> bool {
        matches!(self, FrameRate::F5994 | FrameRate::F4795 | FrameRate::F2997 | FrameRate::F2398)
    }

    /// One frame time.
    pub fn frame_duration(self) -> std::time::Duration {
        let (num, den) = self.ratio();
        std::time::Duration::from_secs_f64(den as f64 / num as f64)
    }

    /// Display string, e.g. "59.94".
    pub const fn display(self) -> &'static str {
        match self {
            FrameRate::F6000 => "60",
            FrameRate::F5994 => "59.94",
            FrameRate::F5000 => "50",
            FrameRate::F4800 => "48",
            FrameRate::F4795 => "47.95",
            FrameRate::F3000 => "30",
            FrameRate::F2997 => "29.97",
            FrameRate::F2500 => "25",
            FrameRate::F2400 => "24",
            FrameRate::F2398 => "23.98",
        }
    }

    /// The selector value written into the global control register.
    pub const fn selector(self) -> u8 {
        match self {
            FrameRate::F6000 => 0,
            FrameRate::F5994 => 1,
            FrameRate::F5000 => 2,
            FrameRate::F4800 => 3,
            FrameRate::F4795 => 4,
            FrameRate::F3000 => 5,
            FrameRate::F2997 => 6,
            FrameRate::F2500 => 7,
            FrameRate::F2400 => 8,
            FrameRate::F2398 => 9,
        }
    }

    pub const fn from_selector(sel: u8) -> Option<FrameRate> {
        match sel {
            0 => Some(FrameRate::F6000),
            1 => Some(FrameRate::F5994),
            2 => Some(FrameRate::F5000),
            3 => Some(FrameRate::F4800),
            4 => Some(FrameRate::F4795),
            5 => Some(FrameRate::F3000),
            6 => Some(FrameRate::F2997),
            7 => Some(FrameRate::F2500),
            8 => Some(FrameRate::F2400),
            9 => Some(FrameRate::F2398),
            _ => None,
        }
    }

    /// The rate at double speed, where one exists (field rate of an
    /// interlaced format).
    pub const fn doubled(self) -> Option<FrameRate> {
        match self {
            FrameRate::F3000 => Some(FrameRate::F6000),
            FrameRate::F2997 => Some(FrameRate::F5994),
            FrameRate::F2500 => Some(FrameRate::F5000),
            FrameRate::F2400 => Some(FrameRate::F4800),
            FrameRate::F2398 => Some(FrameRate::F4795),
            _ => None,
        }
    }
}

/// A complete video format: timing family plus frame rate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VideoFormat {
    pub standard: Standard,
    pub frame_rate: FrameRate,
}

impl VideoFormat {
    pub const SD_525I_2997: VideoFormat = VideoFormat::new(Standard::Sd525, FrameRate::F2997);
    pub const SD_625I_2500: VideoFormat = VideoFormat::new(Standard::Sd625, FrameRate::F2500);
    pub const HD_720P_5994: VideoFormat = VideoFormat::new(Standard::Hd720, FrameRate::F5994);
    pub const HD_720P_6000: VideoFormat = VideoFormat::new(Standard::Hd720, FrameRate::F6000);
    pub const HD_1080I_2500: VideoFormat = VideoFormat::new(Standard::Hd1080i, FrameRate::F2500);
    pub const HD_1080I_2997: VideoFormat = VideoFormat::new(Standard::Hd1080i, FrameRate::F2997);
    pub const HD_1080P_2400: VideoFormat = VideoFormat::new(Standard::Hd1080p, FrameRate::F2400);
    pub const HD_1080P_2500: VideoFormat = VideoFormat::new(Standard::Hd1080p, FrameRate::F2500);
    pub const HD_1080P_2997: VideoFormat = VideoFormat::new(Standard::Hd1080p, FrameRate::F2997);
    pub const HD_1080P_5000: VideoFormat = VideoFormat::new(Standard::Hd1080p, FrameRate::F5000);
    pub const HD_1080P_5994: VideoFormat = VideoFormat::new(Standard::Hd1080p, FrameRate::F5994);
    pub const HD_1080P_6000: VideoFormat = VideoFormat::new(Standard::Hd1080p, FrameRate::F6000);
    pub const UHD_2160P_2500: VideoFormat = VideoFormat::new(Standard::Uhd3840, FrameRate::F2500);
    pub const UHD_2160P_2997: VideoFormat = VideoFormat::new(Standard::Uhd3840, FrameRate::F2997);
    pub const UHD_2160P_5000: VideoFormat =
        VideoFormat::new(Standard::Uhd3840Hfr, FrameRate::F5000);
    pub const UHD_2160P_5994: VideoFormat =
        VideoFormat::new(Standard::Uhd3840Hfr, FrameRate::F5994);
    pub const UHD_2160P_6000: VideoFormat =
        VideoFormat::new(Standard::Uhd3840Hfr, FrameRate::F6000);
    pub const UHD2_4096P_6000: VideoFormat =
        VideoFormat::new(Standard::Uhd4096Hfr, FrameRate::F6000);

    pub const fn new(standard: Standard, frame_rate: FrameRate) -> VideoFormat {
        VideoFormat { standard, frame_rate }
    }
}

impl core::fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        let s = self.standard;
        // interlaced formats are conventionally named by field rate
        let rate = if s.is_progressive() {
            self.frame_rate.display()
        } else {
            self.frame_rate.doubled().map(|r| r.display()).unwrap_or(self.frame_rate.display())
        };
        match s {
            Standard::Sd525 => write!(f, "525i{}", rate),
            Standard::Sd625 => write!(f, "625i{}", rate),
            Standard::Hd720 => write!(f, "720p{}", rate),
            Standard::Hd1080i => write!(f, "1080i{}", rate),
            Standard::Hd1080p => write!(f, "1080p{}", rate),
            Standard::P2k1080 => write!(f, "2048x1080p{}", rate),
            Standard::I2k1080 => write!(f, "2048x1080i{}", rate),
            Standard::Uhd3840 | Standard::Uhd3840Hfr => write!(f, "3840x2160p{}", rate),
            Standard::Uhd4096 | Standard::Uhd4096Hfr => write!(f, "4096x2160p{}", rate),
        }
    }
}

/// The in-memory layout of one video frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PixelFormat {
    /// 10-bit YCbCr 4:2:2, 6 pixels packed in 16 bytes.
    Ycbcr10,
    /// 8-bit YCbCr 4:2:2 (UYVY), 2 bytes per pixel.
    Ycbcr8,
    Rgba8,
    Argb8,
    Bgra8,
    /// DPX 10-bit RGB, 4 bytes per pixel.
    Rgb10Dpx,
    /// 48-bit RGB, 6 bytes per pixel.
    Rgb48,
    /// Planar 8-bit 4:2:0, two planes (luma + interleaved chroma).
    Yuv420Planar8,
    /// Planar 8-bit 4:2:2, two planes.
    Yuv422Planar8,
}

impl PixelFormat {
    /// The selector value written into the channel control register.
    pub const fn selector(self) -> u8 {
        match self {
            PixelFormat::Ycbcr10 => 0,
            PixelFormat::Ycbcr8 => 1,
            PixelFormat::Rgba8 => 2,
            PixelFormat::Argb8 => 3,
            PixelFormat::Bgra8 => 4,
            PixelFormat::Rgb10Dpx => 5,
            PixelFormat::Rgb48 => 6,
            PixelFormat::Yuv420Planar8 => 7,
            PixelFormat::Yuv422Planar8 => 8,
        }
    }

    pub const fn from_selector(sel: u8) -> Option<PixelFormat> {
        match sel {
            0 => Some(PixelFormat::Ycbcr10),
            1 => Some(PixelFormat::Ycbcr8),
            2 => Some(PixelFormat::Rgba8),
            3 => Some(PixelFormat::Argb8),
            4 => Some(PixelFormat::Bgra8),
            5 => Some(PixelFormat::Rgb10Dpx),
            6 => Some(PixelFormat::Rgb48),
            7 => Some(PixelFormat::Yuv420Planar8),
            8 => Some(PixelFormat::Yuv422Planar8),
            _ => None,
        }
    }

    pub const fn is_rgb(self) -> bool {
        matches!(
            self,
            PixelFormat::Rgba8
                | PixelFormat::Argb8
                | PixelFormat::Bgra8
                | PixelFormat::Rgb10Dpx
                | PixelFormat::Rgb48
        )
    }

    pub const fn is_planar(self) -> bool {
        matches!(self, PixelFormat::Yuv420Planar8 | PixelFormat::Yuv422Planar8)
    }

    /// Bytes per raster line of the first (or only) plane.
    ///
    /// 10-bit YCbCr packs 6 pixels in 16 bytes and always yields a
    /// multiple-of-16 row.
    pub const fn row_bytes(self, width: u32) -> u32 {
        match self {
            PixelFormat::Ycbcr10 => ((width + 5) / 6) * 16,
            PixelFormat::Ycbcr8 => width * 2,
            PixelFormat::Rgba8 | PixelFormat::Argb8 | PixelFormat::Bgra8 => width * 4,
            PixelFormat::Rgb10Dpx => width * 4,
            PixelFormat::Rgb48 => width * 6,
            PixelFormat::Yuv420Planar8 | PixelFormat::Yuv422Planar8 => width,
        }
    }

    /// Total bytes for a raster of `width` x `lines`, all planes.
    pub const fn raster_bytes(self, width: u32, lines: u32) -> u32 {
        match self {
            // luma plane + half-height interleaved chroma plane
            PixelFormat::Yuv420Planar8 => width * lines + width * lines / 2,
            // luma plane + full-height chroma plane
            PixelFormat::Yuv422Planar8 => width * lines * 2,
            _ => self.row_bytes(width) * lines,
        }
    }

    /// Whether a raster geometry is expressible in this format.
    pub const fn legal_geometry(self, width: u32, height: u32) -> bool {
        match self {
            PixelFormat::Yuv420Planar8 => width % 2 == 0 && height % 2 == 0,
            PixelFormat::Yuv422Planar8 => width % 2 == 0,
            PixelFormat::Ycbcr8 | PixelFormat::Ycbcr10 => width % 2 == 0,
            _ => true,
        }
    }
}

/// Whether the frame buffer carries VANC lines above active picture.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum VancMode {
    #[default]
    Off,
    Tall,
    Taller,
}

/// The derived byte geometry of a frame buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormatDescriptor {
    pub standard: Standard,
    pub pixel_format: PixelFormat,
    pub vanc_mode: VancMode,
    /// Raster width in pixels.
    pub raster_width: u32,
    /// Raster height in lines, including any VANC lines.
    pub raster_height: u32,
    /// Bytes per line of the first plane.
    pub row_bytes: u32,
    /// Total bytes in the frame buffer.
    pub frame_bytes: u32,
    /// Active picture lines in each field.
    pub active_lines_f1: u32,
    pub active_lines_f2: u32,
    /// First active raster line of each field.
    pub first_active_line_f1: u32,
    pub first_active_line_f2: u32,
    /// Buffer line offset of each field's first line (fields interleave in
    /// the buffer for interlaced standards).
    pub field1_line_offset: u32,
    pub field2_line_offset: u32,
}

impl FormatDescriptor {
    pub fn new(standard: Standard, pixel_format: PixelFormat, vanc_mode: VancMode) -> FormatDescriptor {
        let raster_width = standard.width();
        let active = standard.active_height();
        let vanc = standard.vanc_lines(vanc_mode);
        let raster_height = active + vanc;
        let row_bytes = pixel_format.row_bytes(raster_width);
        let frame_bytes = pixel_format.raster_bytes(raster_width, raster_height);
        let (f1, f2) = standard.first_active_lines();
        let (lines_f1, lines_f2) = if standard.is_progressive() {
            (active, 0)
        } else {
            (active / 2, active - active / 2)
        };
        FormatDescriptor {
            standard,
            pixel_format,
            vanc_mode,
            raster_width,
            raster_height,
            row_bytes,
            frame_bytes,
            active_lines_f1: lines_f1,
            active_lines_f2: lines_f2,
            first_active_line_f1: f1,
            first_active_line_f2: f2,
            field1_line_offset: 0,
            field2_line_offset: if standard.is_progressive() { 0 } else { 1 },
        }
    }
}

/// Minimum host buffer size for one frame of a format.
pub fn video_active_size(format: VideoFormat, pixel: PixelFormat, vanc: VancMode) -> usize {
    FormatDescriptor::new(format.standard, pixel, vanc).frame_bytes as usize
}

/// [video_active_size] rounded up to the next 4096-byte multiple, the
/// granularity DMA writes in.
pub fn video_write_size(format: VideoFormat, pixel: PixelFormat, vanc: VancMode) -> usize {
    let active = video_active_size(format, pixel, vanc);
    (active + 4095) & !4095
}

#[cfg(test)]
mod test {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn hd_10bit_row_and_frame_bytes() {
        let fd = FormatDescriptor::new(Standard::Hd1080i, PixelFormat::Ycbcr10, VancMode::Off);
        assert_eq!(5120, fd.row_bytes);
        assert_eq!(5120 * 1080, fd.frame_bytes);
        assert_eq!(540, fd.active_lines_f1);
        assert_eq!(540, fd.active_lines_f2);
        assert_eq!(21, fd.first_active_line_f1);
        assert_eq!(584, fd.first_active_line_f2);
        assert_eq!(1, fd.field2_line_offset);
    }

    #[test]
    fn uhd_8bit_row_and_frame_bytes() {
        let fd = FormatDescriptor::new(Standard::Uhd3840Hfr, PixelFormat::Ycbcr8, VancMode::Off);
        assert_eq!(7680, fd.row_bytes);
        assert_eq!(7680 * 2160, fd.frame_bytes);
        assert_eq!(2160, fd.active_lines_f1);
        assert_eq!(0, fd.active_lines_f2);
    }

    #[test]
    fn write_size_rounds_to_4096() {
        let active =
            video_active_size(VideoFormat::HD_1080I_2997, PixelFormat::Ycbcr10, VancMode::Off);
        let write =
            video_write_size(VideoFormat::HD_1080I_2997, PixelFormat::Ycbcr10, VancMode::Off);
        assert_eq!(5_529_600, active);
        assert_eq!(5_529_600, write); // already a 4K multiple
        let odd = video_write_size(VideoFormat::SD_525I_2997, PixelFormat::Ycbcr10, VancMode::Off);
        assert_eq!(0, odd % 4096);
        assert!(odd >= video_active_size(VideoFormat::SD_525I_2997, PixelFormat::Ycbcr10, VancMode::Off));
    }

    #[test]
    fn vanc_adds_lines() {
        let off = FormatDescriptor::new(Standard::Hd1080p, PixelFormat::Ycbcr8, VancMode::Off);
        let tall = FormatDescriptor::new(Standard::Hd1080p, PixelFormat::Ycbcr8, VancMode::Tall);
        let taller =
            FormatDescriptor::new(Standard::Hd1080p, PixelFormat::Ycbcr8, VancMode::Taller);
        assert_eq!(off.raster_height + 32, tall.raster_height);
        assert_eq!(off.raster_height + 41, taller.raster_height);
        assert!(taller.frame_bytes > tall.frame_bytes);
    }

    #[test]
    fn planar_sizes() {
        let fd420 = FormatDescriptor::new(Standard::Hd1080p, PixelFormat::Yuv420Planar8, VancMode::Off);
        assert_eq!(1920 * 1080 * 3 / 2, fd420.frame_bytes);
        let fd422 = FormatDescriptor::new(Standard::Hd1080p, PixelFormat::Yuv422Planar8, VancMode::Off);
        assert_eq!(1920 * 1080 * 2, fd422.frame_bytes);
        assert!(PixelFormat::Yuv420Planar8.legal_geometry(1920, 1080));
        assert!(!PixelFormat::Yuv420Planar8.legal_geometry(1920, 1081));
    }

    #[test]
    fn format_names() {
        assert_eq!("1080i59.94", VideoFormat::HD_1080I_2997.to_string());
        assert_eq!("3840x2160p60", VideoFormat::UHD_2160P_6000.to_string());
        assert_eq!("525i59.94", VideoFormat::SD_525I_2997.to_string());
    }

    #[quickcheck]
    fn ycbcr10_rows_are_multiple_of_16(width: u16) -> bool {
        PixelFormat::Ycbcr10.row_bytes(width as u32) % 16 == 0
    }

    #[quickcheck]
    fn pixel_selectors_round_trip(sel: u8) -> bool {
        match PixelFormat::from_selector(sel) {
            Some(pf) => pf.selector() == sel,
            None => sel > 8,
        }
    }
}
