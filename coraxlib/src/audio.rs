//! Audio system programming: capture/playout control, on-card buffer
//! placement, the 48 kHz cadence tables, and non-PCM pair detection.

use std::collections::BTreeSet;

use corax_regs::regs::{self, AudioControl};
use corax_regs::AudioSystem;

use crate::caps::BoolCap;
use crate::device::CoraxCard;
use crate::driver::Driver;
use crate::format::FrameRate;
use crate::{Error, Result};

/// The only sample rate the family runs at.
pub const SAMPLE_RATE: u32 = 48_000;
/// Bytes per sample word.
pub const BYTES_PER_SAMPLE: u32 = 4;
/// Size of a stacked audio system's SDRAM region.
pub const AUDIO_REGION_BYTES: u64 = 0x80_0000;
/// Worst-case audio bytes per frame transfer.
pub const AUDIO_BYTES_MAX: usize = 401 * 1024;

/// Samples per frame, cycled by a running frame counter.
///
/// Fractional rates distribute the non-integer sample count over a 5-frame
/// cadence. The counter is kept in 64 bits, so the cadence index wraps only
/// with the counter itself and stays well-defined past 2^32 frames.
pub const fn cadence(rate: FrameRate) -> &'static [u32] {
    match rate {
        FrameRate::F6000 => &[800],
        FrameRate::F5994 => &[801, 801, 801, 801, 800],
        FrameRate::F5000 => &[960],
        FrameRate::F4800 => &[1000],
        FrameRate::F4795 => &[1001, 1001, 1001, 1001, 1000],
        FrameRate::F3000 => &[1600],
        FrameRate::F2997 => &[1602, 1601, 1602, 1601, 1602],
        FrameRate::F2500 => &[1920],
        FrameRate::F2400 => &[2000],
        FrameRate::F2398 => &[2002],
    }
}

/// Samples carried by frame number `frame` at `rate`.
pub fn samples_for_frame(rate: FrameRate, frame: u64) -> u32 {
    let table = cadence(rate);
    table[(frame % table.len() as u64) as usize]
}

/// A channel pair within an audio system, 0-based: pair 0 is channels 1/2.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ChannelPair(pub u8);

impl core::fmt::Display for ChannelPair {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{}/{}", self.0 * 2 + 1, self.0 * 2 + 2)
    }
}

/// Decode a non-PCM detect register into a pair set.
pub fn pairs_from_mask(mask: u32) -> BTreeSet<ChannelPair> {
    (0..8).filter(|bit| mask & (1 << bit) != 0).map(ChannelPair).collect()
}

impl<D: Driver> CoraxCard<D> {
    fn check_audio_system(&self, system: AudioSystem) -> Result<()> {
        if (system.index() as u32) < self.caps().num_audio_systems {
            Ok(())
        } else {
            Err(Error::UnsupportedOnDevice)
        }
    }

    fn audio_control(&self, system: AudioSystem) -> Result<AudioControl> {
        self.check_audio_system(system)?;
        Ok(AudioControl::from(self.read_reg(regs::AUD_CONTROL[system.index()])?))
    }

    fn update_audio_control(
        &self,
        system: AudioSystem,
        f: impl FnOnce(AudioControl) -> AudioControl,
    ) -> Result<()> {
        let control = self.audio_control(system)?;
        self.write_reg(regs::AUD_CONTROL[system.index()], f(control).into())
    }

    /// Configure an audio system to capture embedded audio from an input:
    /// source select, 4 MB buffer, capture engine armed.
    pub fn setup_audio_capture(&self, system: AudioSystem, source: corax_regs::Channel) -> Result<()> {
        self.check_audio_system(system)?;
        self.write_reg(regs::AUD_SOURCE_SELECT[system.index()], source.index() as u32)?;
        self.update_audio_control(system, |c| c.with_buffer_4mb(true).with_capture_enable(true))?;
        log::debug!(
            target: "audio",
            "{}: capture from SDI {} at {} Hz",
            system,
            source.number(),
            SAMPLE_RATE,
        );
        Ok(())
    }

    /// Configure an audio system for playout: 4 MB buffer, play engine armed.
    pub fn setup_audio_playout(&self, system: AudioSystem) -> Result<()> {
        self.update_audio_control(system, |c| c.with_buffer_4mb(true).with_play_enable(true))
    }

    pub fn stop_audio(&self, system: AudioSystem) -> Result<()> {
        self.update_audio_control(system, |c| c.with_capture_enable(false).with_play_enable(false))
    }

    pub fn is_audio_input_running(&self, system: AudioSystem) -> Result<bool> {
        Ok(self.audio_control(system)?.capture_enable())
    }

    pub fn is_audio_output_running(&self, system: AudioSystem) -> Result<bool> {
        Ok(self.audio_control(system)?.play_enable())
    }

    /// Translate an offset within an audio system's buffer to an absolute
    /// SDRAM address.
    ///
    /// Stacked-audio devices reserve one 8 MB region per system at the top
    /// of memory; legacy devices place audio in the last video frame.
    pub fn audio_memory_offset(&self, system: AudioSystem, byte_offset: u32) -> Result<u64> {
        self.check_audio_system(system)?;
        let memory = self.caps().active_memory_bytes;
        if self.is_supported(BoolCap::StackedAudio) {
            let base = memory - AUDIO_REGION_BYTES * (system.index() as u64 + 1);
            Ok(base + byte_offset as u64)
        } else {
            let intrinsic = self.frame_buffer_size(corax_regs::Channel::CH1)?.byte_count() as u64;
            let last_frame_base = memory - intrinsic;
            Ok(last_frame_base + byte_offset as u64)
        }
    }

    /// The channel pairs currently carrying non-PCM data on an input.
    pub fn input_audio_pairs_without_pcm(
        &self,
        system: AudioSystem,
    ) -> Result<BTreeSet<ChannelPair>> {
        self.check_audio_system(system)?;
        let reg = regs::AUD_NONPCM_DETECT[system.index()];
        if reg > self.caps().max_register {
            return Err(Error::UnsupportedOnDevice);
        }
        Ok(pairs_from_mask(self.read_reg(reg)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimDriver;
    use corax_regs::{Channel, DeviceId};
    use quickcheck_macros::quickcheck;

    #[test]
    fn cadences_sum_to_the_rational_rate() {
        // five frames at 29.97 carry exactly 8008 samples
        assert_eq!(8008u32, cadence(FrameRate::F2997).iter().sum());
        assert_eq!(4004u32, cadence(FrameRate::F5994).iter().sum());
        assert_eq!(5004u32, cadence(FrameRate::F4795).iter().sum());
        // integer rates are flat
        assert_eq!(&[800], cadence(FrameRate::F6000));
    }

    #[quickcheck]
    fn cadence_indexing_never_panics(frame: u64) -> bool {
        let s = samples_for_frame(FrameRate::F2997, frame);
        (1601..=1602).contains(&s)
    }

    #[test]
    fn cadence_is_periodic_across_the_wrap() {
        let near_wrap = u32::MAX as u64 - 2;
        for offset in 0..10u64 {
            let frame = near_wrap + offset;
            assert_eq!(
                samples_for_frame(FrameRate::F2997, frame % 5),
                samples_for_frame(FrameRate::F2997, frame)
            );
        }
    }

    #[test]
    fn stacked_audio_stacks_down_from_the_top() {
        let card = CoraxCard::open(SimDriver::new(DeviceId::Corax88)).unwrap();
        let sys1 = card.audio_memory_offset(AudioSystem::SYS1, 0).unwrap();
        let sys2 = card.audio_memory_offset(AudioSystem::SYS2, 0x100).unwrap();
        assert_eq!(0x2000_0000 - 0x80_0000, sys1);
        assert_eq!(0x2000_0000 - 2 * 0x80_0000 + 0x100, sys2);
    }

    #[test]
    fn legacy_audio_lives_in_the_last_video_frame() {
        let card = CoraxCard::open(SimDriver::new(DeviceId::CoraxLp)).unwrap();
        let base = card.audio_memory_offset(AudioSystem::SYS1, 0x40).unwrap();
        assert_eq!(0x0800_0000 - 0x80_0000 + 0x40, base);
        assert_eq!(
            Err(Error::UnsupportedOnDevice),
            card.audio_memory_offset(AudioSystem::SYS2, 0)
        );
    }

    #[test]
    fn capture_setup_marks_the_engine_running(){
        let card = CoraxCard::open(SimDriver::new(DeviceId::Corax44)).unwrap();
        card.setup_audio_capture(AudioSystem::SYS1, Channel::CH1).unwrap();
        assert!(card.is_audio_input_running(AudioSystem::SYS1).unwrap());
        assert!(!card.is_audio_output_running(AudioSystem::SYS1).unwrap());
        card.stop_audio(AudioSystem::SYS1).unwrap();
        assert!(!card.is_audio_input_running(AudioSystem::SYS1).unwrap());
    }

    #[test]
    fn pair_masks_decode() {
        let pairs = pairs_from_mask(0b101);
        assert_eq!(2, pairs.len());
        assert!(pairs.contains(&ChannelPair(0)));
        assert!(pairs.contains(&ChannelPair(2)));
        assert_eq!("1/2", ChannelPair(0).to_string());
        assert_eq!("5/6", ChannelPair(2).to_string());
    }
}
