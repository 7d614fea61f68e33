//! The open device: capability table, channel configuration, and the
//! register-level plumbing every higher layer goes through.

use std::sync::Mutex;

use corax_regs::regs::{
    self, ChannelControl, FrameSize, GlobalControl, GlobalControl2, WriteMode,
};
use corax_regs::{AudioSystem, Channel, DeviceId, Widget};

use crate::autocirc::ChannelShadow;
use crate::caps::{BoolCap, DeviceCaps, NumCap};
use crate::driver::Driver;
use crate::format::{FrameRate, PixelFormat, Standard, VancMode, VideoFormat};
use crate::{AbortFlag, Error, Result};

/// Framestore direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Capture,
    Display,
}

/// Where a logical frame of a channel lives in SDRAM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameInfo {
    /// Absolute byte address of the logical frame.
    pub address: u64,
    /// Byte length of the logical frame.
    pub length: u64,
    /// The base framestore size from the frame-size register.
    pub intrinsic_bytes: u32,
    pub squares: bool,
    pub tsi: bool,
    pub quad_quad: bool,
}

impl FrameInfo {
    /// Quad transport of either flavor.
    pub fn is_quad(&self) -> bool {
        self.squares || self.tsi
    }
}

/// An open Corax device.
///
/// Generic over the [Driver] so the same runtime drives real hardware and
/// the simulator. The capability table is populated once at open; decision
/// code reads it rather than re-deriving model quirks.
pub struct CoraxCard<D> {
    driver: D,
    id: DeviceId,
    caps: DeviceCaps,
    widgets: Vec<Widget>,
    pub(crate) ac_shadow: Mutex<[ChannelShadow; 8]>,
}

impl<D: Driver> CoraxCard<D> {
    /// Open a device through its driver.
    pub fn open(driver: D) -> Result<CoraxCard<D>> {
        let id = driver.device_id();
        // probe the register path before trusting the handle
        driver
            .read_register(regs::GLOBAL_CONTROL, u32::MAX, 0)
            .map_err(|_| Error::DeviceUnavailable)?;
        let caps = DeviceCaps::for_device(id);
        let widgets = caps.widgets();
        Ok(CoraxCard { driver, id, caps, widgets, ac_shadow: Mutex::default() })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn device_id(&self) -> DeviceId {
        self.id
    }

    pub fn caps(&self) -> &DeviceCaps {
        &self.caps
    }

    /// The widgets present on this device, cached at open.
    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    pub fn is_supported(&self, cap: BoolCap) -> bool {
        self.caps.is_supported(cap)
    }

    pub fn get_num_supported(&self, cap: NumCap) -> u32 {
        self.caps.get_num_supported(cap)
    }

    fn check_channel(&self, channel: Channel) -> Result<()> {
        if (channel.index() as u32) < self.caps.num_channels {
            Ok(())
        } else {
            Err(Error::UnsupportedOnDevice)
        }
    }

    fn check_register(&self, num: u32) -> Result<()> {
        let virtual_range = regs::VIRTUAL_START..regs::VIRTUAL_START + regs::VIRTUAL_COUNT;
        if num <= self.caps.max_register || virtual_range.contains(&num) {
            Ok(())
        } else {
            Err(Error::BadRegister(num))
        }
    }

    /// Read a register, masked and shifted.
    pub fn read_register(&self, num: u32, mask: u32, shift: u8) -> Result<u32> {
        self.check_register(num)?;
        self.driver.read_register(num, mask, shift)
    }

    /// Read-modify-write a register under the device's write-latch mode.
    pub fn write_register(&self, num: u32, value: u32, mask: u32, shift: u8) -> Result<()> {
        self.check_register(num)?;
        self.driver.write_register(num, value, mask, shift)
    }

    pub fn read_reg(&self, num: u32) -> Result<u32> {
        self.read_register(num, u32::MAX, 0)
    }

    pub fn write_reg(&self, num: u32, value: u32) -> Result<()> {
        self.write_register(num, value, u32::MAX, 0)
    }

    /// Claim the device for an application. Fails with [Error::Busy] if a
    /// different application holds it.
    pub fn acquire(&self, signature: u32, pid: u32) -> Result<()> {
        let holder = self.read_reg(regs::APP_SIGNATURE)?;
        if holder != 0 && holder != signature {
            return Err(Error::Busy);
        }
        self.write_reg(regs::APP_SIGNATURE, signature)?;
        self.write_reg(regs::APP_PID, pid)
    }

    /// Release a prior claim. Releasing somebody else's claim is refused.
    pub fn release(&self, signature: u32) -> Result<()> {
        let holder = self.read_reg(regs::APP_SIGNATURE)?;
        if holder != 0 && holder != signature {
            return Err(Error::Busy);
        }
        self.write_reg(regs::APP_SIGNATURE, 0)?;
        self.write_reg(regs::APP_PID, 0)
    }

    /// The driver task mode, saved by sessions and restored on quit.
    pub fn task_mode(&self) -> Result<u32> {
        self.read_reg(regs::TASK_MODE)
    }

    pub fn set_task_mode(&self, mode: u32) -> Result<()> {
        self.write_reg(regs::TASK_MODE, mode)
    }

    fn channel_control(&self, channel: Channel) -> Result<ChannelControl> {
        self.check_channel(channel)?;
        Ok(ChannelControl::from(self.read_reg(regs::CH_CONTROL[channel.index()])?))
    }

    fn update_channel_control(
        &self,
        channel: Channel,
        f: impl FnOnce(ChannelControl) -> ChannelControl,
    ) -> Result<()> {
        let control = self.channel_control(channel)?;
        self.write_reg(regs::CH_CONTROL[channel.index()], f(control).into())
    }

    pub fn enable_channel(&self, channel: Channel) -> Result<()> {
        self.update_channel_control(channel, |c| c.with_disabled(false))
    }

    pub fn disable_channel(&self, channel: Channel) -> Result<()> {
        self.update_channel_control(channel, |c| c.with_disabled(true))
    }

    pub fn is_channel_enabled(&self, channel: Channel) -> Result<bool> {
        Ok(!self.channel_control(channel)?.disabled())
    }

    pub fn set_mode(&self, channel: Channel, mode: Mode) -> Result<()> {
        self.update_channel_control(channel, |c| c.with_capture(matches!(mode, Mode::Capture)))
    }

    pub fn mode(&self, channel: Channel) -> Result<Mode> {
        Ok(if self.channel_control(channel)?.capture() { Mode::Capture } else { Mode::Display })
    }

    pub fn set_pixel_format(&self, channel: Channel, format: PixelFormat) -> Result<()> {
        self.update_channel_control(channel, |c| c.with_format(format.selector()))
    }

    pub fn pixel_format(&self, channel: Channel) -> Result<PixelFormat> {
        PixelFormat::from_selector(self.channel_control(channel)?.format())
            .ok_or(Error::InvalidState)
    }

    pub fn set_vanc_mode(&self, channel: Channel, mode: VancMode) -> Result<()> {
        let bits = match mode {
            VancMode::Off => 0,
            VancMode::Tall => 1,
            VancMode::Taller => 2,
        };
        self.update_channel_control(channel, |c| c.with_vanc(bits))
    }

    pub fn vanc_mode(&self, channel: Channel) -> Result<VancMode> {
        Ok(match self.channel_control(channel)?.vanc() {
            1 => VancMode::Tall,
            2 => VancMode::Taller,
            _ => VancMode::Off,
        })
    }

    /// Point a bidirectional SDI connector at receive or transmit.
    pub fn set_sdi_transmit_enable(&self, channel: Channel, transmit: bool) -> Result<()> {
        if !self.caps.bidirectional_sdi {
            return Err(Error::UnsupportedOnDevice);
        }
        self.update_channel_control(channel, |c| c.with_sdi_transmit(transmit))
    }

    /// The global-control register holding a channel's selectors. Models
    /// without per-channel shadows share the one global register.
    fn global_control_reg(&self, channel: Channel) -> u32 {
        let reg = regs::GLOBAL_CONTROL_CH[channel.index()];
        if reg > self.caps.max_register {
            regs::GLOBAL_CONTROL
        } else {
            reg
        }
    }

    /// Program a channel's video format: standard, rate and geometry
    /// selectors, and the frame-size the raster requires.
    pub fn set_video_format(&self, channel: Channel, format: VideoFormat) -> Result<()> {
        self.check_channel(channel)?;
        let reg = self.global_control_reg(channel);
        let gc = GlobalControl::from(self.read_reg(reg)?)
            .with_standard(format.standard.selector())
            .with_frame_rate(format.frame_rate.selector())
            .with_geometry(format.standard.selector());
        self.write_reg(reg, gc.into())?;
        // a quad raster's sub-image does not fit an 8 MB store
        let size = if format.standard.is_quad() { FrameSize::Fs16Mb } else { FrameSize::Fs8Mb };
        self.update_channel_control(channel, |c| c.with_frame_size(size))
    }

    pub fn video_format(&self, channel: Channel) -> Result<VideoFormat> {
        self.check_channel(channel)?;
        let gc = GlobalControl::from(self.read_reg(self.global_control_reg(channel))?);
        let standard = Standard::from_selector(gc.standard()).ok_or(Error::InvalidState)?;
        let rate = FrameRate::from_selector(gc.frame_rate()).ok_or(Error::InvalidState)?;
        Ok(VideoFormat::new(standard, rate))
    }

    /// The channel's register write-latch mode.
    pub fn set_register_write_mode(&self, channel: Channel, mode: WriteMode) -> Result<()> {
        self.check_channel(channel)?;
        let reg = self.global_control_reg(channel);
        let gc = GlobalControl::from(self.read_reg(reg)?).with_write_mode(mode);
        self.write_reg(reg, gc.into())
    }

    pub fn register_write_mode(&self, channel: Channel) -> Result<WriteMode> {
        self.check_channel(channel)?;
        let gc = GlobalControl::from(self.read_reg(self.global_control_reg(channel))?);
        Ok(gc.write_mode())
    }

    pub fn set_frame_buffer_size(&self, channel: Channel, size: FrameSize) -> Result<()> {
        self.update_channel_control(channel, |c| c.with_frame_size(size))
    }

    pub fn frame_buffer_size(&self, channel: Channel) -> Result<FrameSize> {
        Ok(self.channel_control(channel)?.frame_size())
    }

    pub fn input_frame(&self, channel: Channel) -> Result<u32> {
        self.check_channel(channel)?;
        self.read_reg(regs::CH_INPUT_FRAME[channel.index()])
    }

    pub fn set_input_frame(&self, channel: Channel, frame: u32) -> Result<()> {
        self.check_channel(channel)?;
        self.write_reg(regs::CH_INPUT_FRAME[channel.index()], frame)
    }

    pub fn output_frame(&self, channel: Channel) -> Result<u32> {
        self.check_channel(channel)?;
        self.read_reg(regs::CH_OUTPUT_FRAME[channel.index()])
    }

    pub fn set_output_frame(&self, channel: Channel, frame: u32) -> Result<()> {
        self.check_channel(channel)?;
        self.write_reg(regs::CH_OUTPUT_FRAME[channel.index()], frame)
    }

    fn global_control2(&self) -> Result<GlobalControl2> {
        Ok(GlobalControl2::from(self.read_reg(regs::GLOBAL_CONTROL2)?))
    }

    fn update_global_control2(
        &self,
        f: impl FnOnce(GlobalControl2) -> GlobalControl2,
    ) -> Result<()> {
        let gc2 = self.global_control2()?;
        self.write_reg(regs::GLOBAL_CONTROL2, f(gc2).into())
    }

    /// Squares transport for the channel's quad group (1-4 or 5-8).
    pub fn set_quad_squares(&self, channel: Channel, enabled: bool) -> Result<()> {
        self.check_channel(channel)?;
        self.update_global_control2(|gc2| {
            if channel.index() < 4 {
                gc2.with_quad_mode(enabled)
            } else {
                gc2.with_quad_mode2(enabled)
            }
        })
    }

    /// Two-sample-interleave transport for the channel's pair.
    pub fn set_tsi(&self, channel: Channel, enabled: bool) -> Result<()> {
        self.check_channel(channel)?;
        self.update_global_control2(|gc2| match channel.index() / 2 {
            0 => gc2.with_smpte425_12(enabled),
            1 => gc2.with_smpte425_34(enabled),
            2 => gc2.with_smpte425_56(enabled),
            _ => gc2.with_smpte425_78(enabled),
        })
    }

    pub fn set_quad_quad(&self, enabled: bool) -> Result<()> {
        self.update_global_control2(|gc2| gc2.with_quad_quad_mode(enabled))
    }

    pub fn is_squares(&self, channel: Channel) -> Result<bool> {
        let gc2 = self.global_control2()?;
        Ok(if channel.index() < 4 { gc2.quad_mode() } else { gc2.quad_mode2() })
    }

    pub fn is_tsi(&self, channel: Channel) -> Result<bool> {
        let gc2 = self.global_control2()?;
        Ok(match channel.index() / 2 {
            0 => gc2.smpte425_12(),
            1 => gc2.smpte425_34(),
            2 => gc2.smpte425_56(),
            _ => gc2.smpte425_78(),
        })
    }

    pub fn is_quad_quad(&self, _channel: Channel) -> Result<bool> {
        Ok(self.global_control2()?.quad_quad_mode())
    }

    /// Locate a channel's logical frame in SDRAM: base size from the
    /// frame-size register, expanded 4x for quad transports and 16x for
    /// quad-quad.
    pub fn device_frame_info(&self, channel: Channel, frame_number: u32) -> Result<FrameInfo> {
        let intrinsic = self.channel_control(channel)?.frame_size().byte_count();
        let squares = self.is_squares(channel)?;
        let tsi = self.is_tsi(channel)?;
        let quad_quad = self.is_quad_quad(channel)?;
        let multiplier: u64 = if quad_quad {
            16
        } else if squares || tsi {
            4
        } else {
            1
        };
        let length = intrinsic as u64 * multiplier;
        Ok(FrameInfo {
            address: frame_number as u64 * length,
            length,
            intrinsic_bytes: intrinsic,
            squares,
            tsi,
            quad_quad,
        })
    }

    /// Number of logical frames SDRAM holds for this channel's geometry.
    pub fn num_logical_frames(&self, channel: Channel) -> Result<u32> {
        let info = self.device_frame_info(channel, 0)?;
        Ok((self.caps.active_memory_bytes / info.length) as u32)
    }

    /// Sibling channels whose framestores are consumed by this channel's
    /// quad transport (squares groups 4, TSI pairs 2).
    pub fn quad_siblings(&self, channel: Channel) -> Result<Vec<Channel>> {
        let mut siblings = Vec::new();
        if self.is_squares(channel)? {
            let group = channel.index() / 4 * 4;
            for ndx in group..group + 4 {
                if ndx != channel.index() {
                    siblings.extend(Channel::new(ndx as u8));
                }
            }
        } else if self.is_tsi(channel)? {
            let pair = channel.index() / 2 * 2;
            for ndx in pair..pair + 2 {
                if ndx != channel.index() {
                    siblings.extend(Channel::new(ndx as u8));
                }
            }
        }
        Ok(siblings)
    }

    pub fn wait_for_input_vbi(&self, channel: Channel, count: u32, abort: &AbortFlag) -> Result<()> {
        self.check_channel(channel)?;
        self.driver.wait_for_input_vertical(channel, count, abort)
    }

    pub fn wait_for_output_vbi(
        &self,
        channel: Channel,
        count: u32,
        abort: &AbortFlag,
    ) -> Result<()> {
        self.check_channel(channel)?;
        self.driver.wait_for_output_vertical(channel, count, abort)
    }

    /// Whether the multi-raster viewer is borrowing the last video channel.
    pub fn is_multi_raster_enabled(&self) -> Result<bool> {
        if !self.caps.multi_raster {
            return Ok(false);
        }
        Ok(self.read_reg(regs::MULTI_RASTER_ENABLE)? != 0)
    }

    pub fn set_multi_raster_enabled(&self, enabled: bool) -> Result<()> {
        if !self.caps.multi_raster {
            return Err(Error::UnsupportedOnDevice);
        }
        self.write_reg(regs::MULTI_RASTER_ENABLE, enabled as u32)
    }

    /// The audio system conventionally paired with a channel.
    pub fn audio_system_for_channel(&self, channel: Channel) -> Option<AudioSystem> {
        if (channel.index() as u32) < self.caps.num_audio_systems {
            AudioSystem::new(channel.index() as u8)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimDriver;

    fn card() -> CoraxCard<SimDriver> {
        CoraxCard::open(SimDriver::new(DeviceId::Corax88)).unwrap()
    }

    #[test]
    fn open_populates_caps_and_widgets() {
        let card = card();
        assert_eq!(DeviceId::Corax88, card.device_id());
        assert!(card.is_supported(BoolCap::RouteRom));
        assert!(card.widgets().contains(&Widget::Mux425(0)));
    }

    #[test]
    fn bad_register_is_rejected_before_the_driver() {
        let card = card();
        assert_eq!(Err(Error::BadRegister(9000)), card.read_reg(9000));
        // virtual registers pass the gate
        assert!(card.read_reg(regs::ANC_FIELD1_OFFSET).is_ok());
    }

    #[test]
    fn acquire_then_busy_then_release() {
        let card = card();
        card.acquire(0x44454d4f, 1234).unwrap(); // 'DEMO'
        assert_eq!(Err(Error::Busy), card.acquire(0x4f504552, 77));
        card.release(0x44454d4f).unwrap();
        card.acquire(0x4f504552, 77).unwrap();
    }

    #[test]
    fn channel_modes_round_trip() {
        let card = card();
        card.enable_channel(Channel::CH3).unwrap();
        assert!(card.is_channel_enabled(Channel::CH3).unwrap());
        card.set_mode(Channel::CH3, Mode::Capture).unwrap();
        assert!(matches!(card.mode(Channel::CH3).unwrap(), Mode::Capture));
        card.set_pixel_format(Channel::CH3, PixelFormat::Ycbcr10).unwrap();
        assert_eq!(PixelFormat::Ycbcr10, card.pixel_format(Channel::CH3).unwrap());
    }

    #[test]
    fn video_format_round_trips_through_selectors() {
        let card = card();
        card.set_video_format(Channel::CH1, VideoFormat::HD_1080I_2997).unwrap();
        assert_eq!(VideoFormat::HD_1080I_2997, card.video_format(Channel::CH1).unwrap());
        assert_eq!(FrameSize::Fs8Mb, card.frame_buffer_size(Channel::CH1).unwrap());

        card.set_video_format(Channel::CH1, VideoFormat::UHD_2160P_6000).unwrap();
        assert_eq!(FrameSize::Fs16Mb, card.frame_buffer_size(Channel::CH1).unwrap());
    }

    #[test]
    fn frame_info_scales_with_transport() {
        let card = card();
        card.set_video_format(Channel::CH1, VideoFormat::HD_1080P_2997).unwrap();
        let plain = card.device_frame_info(Channel::CH1, 2).unwrap();
        assert_eq!(0x80_0000, plain.intrinsic_bytes);
        assert_eq!(0x100_0000, plain.address);

        card.set_tsi(Channel::CH1, true).unwrap();
        let tsi = card.device_frame_info(Channel::CH1, 1).unwrap();
        assert!(tsi.tsi);
        assert_eq!(4 * 0x80_0000, tsi.length);
        assert_eq!(vec![Channel::CH2], card.quad_siblings(Channel::CH1).unwrap());
    }

    #[test]
    fn unsupported_channel_is_refused() {
        let small = CoraxCard::open(SimDriver::new(DeviceId::CoraxLp)).unwrap();
        assert_eq!(Err(Error::UnsupportedOnDevice), small.enable_channel(Channel::CH5));
    }
}
