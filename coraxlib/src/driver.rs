//! The driver gateway: the one interface allowed to touch device memory or
//! wait on device events.
//!
//! Individual register operations on one device are serialized in issue
//! order; batched forms are atomic with respect to concurrent batches on the
//! same device. No ordering is guaranteed across devices.

use bitflags::bitflags;

use crate::{AbortFlag, Channel, DeviceId, Result};

/// One read in a batched register read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterRead {
    pub num: u32,
    pub mask: u32,
    pub shift: u8,
}

impl RegisterRead {
    /// Read the whole register.
    pub const fn full(num: u32) -> RegisterRead {
        RegisterRead { num, mask: u32::MAX, shift: 0 }
    }
}

/// One write in a batched register write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegisterWrite {
    pub num: u32,
    pub value: u32,
    pub mask: u32,
    pub shift: u8,
}

impl RegisterWrite {
    /// Replace the whole register.
    pub const fn full(num: u32, value: u32) -> RegisterWrite {
        RegisterWrite { num, value, mask: u32::MAX, shift: 0 }
    }
}

/// DMA engine selection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DmaEngine {
    /// Let the driver pick any idle engine.
    #[default]
    FirstAvailable,
    /// A specific engine ordinal.
    Engine(u8),
}

/// A DMA transfer description. The host buffer rides alongside as a slice;
/// its length is the transfer length.
///
/// With `num_segments > 1` the transfer is strided: each segment is
/// `length / num_segments` bytes, advancing by `host_pitch` in host memory
/// and `card_pitch` on the card, which copies rectangular sub-images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DmaRequest {
    pub engine: DmaEngine,
    /// Frame number, in units of the device's intrinsic frame size.
    pub frame_number: u32,
    /// Byte offset from the start of that frame.
    pub card_offset: u32,
    pub num_segments: u32,
    pub host_pitch: u32,
    pub card_pitch: u32,
}

impl DmaRequest {
    /// A contiguous transfer within one frame.
    pub const fn frame(frame_number: u32, card_offset: u32) -> DmaRequest {
        DmaRequest {
            engine: DmaEngine::FirstAvailable,
            frame_number,
            card_offset,
            num_segments: 1,
            host_pitch: 0,
            card_pitch: 0,
        }
    }

    /// A contiguous transfer at an absolute card address.
    pub const fn absolute(card_address: u32) -> DmaRequest {
        DmaRequest::frame(0, card_address)
    }
}

bitflags! {
    /// AutoCirculate option bits, recorded at init time.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct AcOptions: u32 {
        const WITH_AUDIO = 1 << 0;
        const WITH_RP188 = 1 << 1;
        const WITH_ANC = 1 << 2;
        const WITH_LTC = 1 << 3;
        const WITH_FBF_CHANGE = 1 << 4;
        const WITH_FR_CHANGE = 1 << 5;
    }
}

/// AutoCirculate channel state, as reported in [AcStatus::state].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u32)]
pub enum AcState {
    #[default]
    Stopped = 0,
    Initialized = 1,
    Starting = 2,
    Running = 3,
    Paused = 4,
    Stopping = 5,
}

impl AcState {
    pub const fn from_raw(raw: u32) -> AcState {
        match raw {
            1 => AcState::Initialized,
            2 => AcState::Starting,
            3 => AcState::Running,
            4 => AcState::Paused,
            5 => AcState::Stopping,
            _ => AcState::Stopped,
        }
    }
}

/// Marker for "no audio system bound" in the status struct.
pub const AC_NO_AUDIO: u32 = u32::MAX;

/// AutoCirculate init parameters, as passed through the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcInit {
    /// True for capture (input), false for playout (output).
    pub capture: bool,
    pub start_frame: u32,
    pub end_frame: u32,
    /// Bound audio system ordinal, or [AC_NO_AUDIO].
    pub audio_system: u32,
    pub options: AcOptions,
}

/// AutoCirculate channel status. Field layout mirrors the kernel struct:
/// every field is 32 bits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcStatus {
    pub state: u32,
    pub start_frame: u32,
    pub end_frame: u32,
    pub active_frame: u32,
    pub rdtsc_per_frame_lo: u32,
    pub rdtsc_per_frame_hi: u32,
    pub frames_processed: u32,
    pub frames_dropped: u32,
    pub buffer_level: u32,
    pub audio_clock_current_time: u32,
    pub audio_system: u32,
    pub options: u32,
}

impl AcStatus {
    pub fn state(&self) -> AcState {
        AcState::from_raw(self.state)
    }

    pub fn is_stopped(&self) -> bool {
        self.state() == AcState::Stopped
    }

    pub fn is_running(&self) -> bool {
        self.state() == AcState::Running
    }

    /// Number of frames in the circulate ring.
    pub fn frame_count(&self) -> u32 {
        self.end_frame - self.start_frame + 1
    }

    pub fn options(&self) -> AcOptions {
        AcOptions::from_bits_truncate(self.options)
    }

    pub fn with_audio(&self) -> bool {
        self.audio_system != AC_NO_AUDIO && self.options().contains(AcOptions::WITH_AUDIO)
    }

    pub fn with_anc(&self) -> bool {
        self.options().contains(AcOptions::WITH_ANC)
    }

    /// For capture: at least one fully formed frame is ready to transfer.
    pub fn has_available_input_frame(&self) -> bool {
        self.is_running() && self.buffer_level > 0
    }

    /// For playout: the on-card ring can accept another frame.
    pub fn can_accept_more_output_frames(&self) -> bool {
        self.is_running() && self.buffer_level < self.frame_count() - 1
    }
}

/// Per-frame metadata handed out when the oldest pending frame is claimed
/// for transfer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcClaimedFrame {
    /// The on-card frame to transfer, in the channel's frame units.
    pub frame: u32,
    /// Bytes of audio captured for this frame.
    pub audio_bytes: u32,
    /// Bytes of field-1 ancillary data captured for this frame.
    pub anc_f1_bytes: u32,
    /// Bytes of field-2 ancillary data captured for this frame.
    pub anc_f2_bytes: u32,
}

/// The kernel boundary.
///
/// All methods take `&self`: the driver serializes kernel entry internally,
/// and each call is atomic with respect to other calls on the same device.
pub trait Driver: Send + Sync {
    /// The model of the attached device.
    fn device_id(&self) -> DeviceId;

    /// Read a register, masked and shifted.
    ///
    /// Fails with [crate::Error::BadRegister] if `num` exceeds the device's
    /// register space.
    fn read_register(&self, num: u32, mask: u32, shift: u8) -> Result<u32>;

    /// Read-modify-write a register under the device's current write-latch
    /// mode.
    fn write_register(&self, num: u32, value: u32, mask: u32, shift: u8) -> Result<()>;

    /// Batched register read; atomic against other batches.
    fn read_registers(&self, reads: &[RegisterRead]) -> Result<Vec<u32>>;

    /// Batched register write; atomic against other batches, and every
    /// write completes before any subsequent call observes the device.
    fn write_registers(&self, writes: &[RegisterWrite]) -> Result<()>;

    /// Suspend the caller until the `count`-th input vertical interrupt on
    /// `channel`, the abort flag, or an inner timeout of about two frame
    /// times (in which case it returns without the interrupt having fired,
    /// so the caller's loop can re-check state).
    fn wait_for_input_vertical(&self, channel: Channel, count: u32, abort: &AbortFlag)
        -> Result<()>;

    /// As [Driver::wait_for_input_vertical], for the output interrupt.
    fn wait_for_output_vertical(&self, channel: Channel, count: u32, abort: &AbortFlag)
        -> Result<()>;

    /// Synchronous DMA from card to host. Blocks until complete.
    fn dma_read(&self, req: &DmaRequest, buf: &mut [u8]) -> Result<()>;

    /// Synchronous DMA from host to card. Blocks until complete.
    fn dma_write(&self, req: &DmaRequest, buf: &[u8]) -> Result<()>;

    fn ac_init(&self, channel: Channel, init: &AcInit) -> Result<()>;
    fn ac_start(&self, channel: Channel) -> Result<()>;
    fn ac_stop(&self, channel: Channel) -> Result<()>;
    fn ac_pause(&self, channel: Channel) -> Result<()>;
    fn ac_resume(&self, channel: Channel) -> Result<()>;
    fn ac_status(&self, channel: Channel) -> Result<AcStatus>;

    /// Claim the oldest pending frame for transfer. Fails with
    /// [crate::Error::NoFrame] when nothing is pending (capture) or the ring
    /// is full (playout).
    fn ac_claim_frame(&self, channel: Channel) -> Result<AcClaimedFrame>;

    /// Release the claimed frame, advancing the host-visible head and
    /// incrementing the processed counter.
    fn ac_commit_frame(&self, channel: Channel) -> Result<()>;

    /// Convenience: read a whole register.
    fn read_reg(&self, num: u32) -> Result<u32> {
        self.read_register(num, u32::MAX, 0)
    }

    /// Convenience: replace a whole register.
    fn write_reg(&self, num: u32, value: u32) -> Result<()> {
        self.write_register(num, value, u32::MAX, 0)
    }
}

impl<D: Driver + ?Sized> Driver for std::sync::Arc<D> {
    fn device_id(&self) -> DeviceId {
        (**self).device_id()
    }

    fn read_register(&self, num: u32, mask: u32, shift: u8) -> Result<u32> {
        (**self).read_register(num, mask, shift)
    }

    fn write_register(&self, num: u32, value: u32, mask: u32, shift: u8) -> Result<()> {
        (**self).write_register(num, value, mask, shift)
    }

    fn read_registers(&self, reads: &[RegisterRead]) -> Result<Vec<u32>> {
        (**self).read_registers(reads)
    }

    fn write_registers(&self, writes: &[RegisterWrite]) -> Result<()> {
        (**self).write_registers(writes)
    }

    fn wait_for_input_vertical(
        &self,
        channel: Channel,
        count: u32,
        abort: &AbortFlag,
    ) -> Result<()> {
        (**self).wait_for_input_vertical(channel, count, abort)
    }

    fn wait_for_output_vertical(
        &self,
        channel: Channel,
        count: u32,
        abort: &AbortFlag,
    ) -> Result<()> {
        (**self).wait_for_output_vertical(channel, count, abort)
    }

    fn dma_read(&self, req: &DmaRequest, buf: &mut [u8]) -> Result<()> {
        (**self).dma_read(req, buf)
    }

    fn dma_write(&self, req: &DmaRequest, buf: &[u8]) -> Result<()> {
        (**self).dma_write(req, buf)
    }

    fn ac_init(&self, channel: Channel, init: &AcInit) -> Result<()> {
        (**self).ac_init(channel, init)
    }

    fn ac_start(&self, channel: Channel) -> Result<()> {
        (**self).ac_start(channel)
    }

    fn ac_stop(&self, channel: Channel) -> Result<()> {
        (**self).ac_stop(channel)
    }

    fn ac_pause(&self, channel: Channel) -> Result<()> {
        (**self).ac_pause(channel)
    }

    fn ac_resume(&self, channel: Channel) -> Result<()> {
        (**self).ac_resume(channel)
    }

    fn ac_status(&self, channel: Channel) -> Result<AcStatus> {
        (**self).ac_status(channel)
    }

    fn ac_claim_frame(&self, channel: Channel) -> Result<AcClaimedFrame> {
        (**self).ac_claim_frame(channel)
    }

    fn ac_commit_frame(&self, channel: Channel) -> Result<()> {
        (**self).ac_commit_frame(channel)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn status_frame_accounting() {
        let status = AcStatus {
            state: AcState::Running as u32,
            start_frame: 0,
            end_frame: 6,
            buffer_level: 1,
            audio_system: AC_NO_AUDIO,
            options: AcOptions::WITH_RP188.bits(),
            ..AcStatus::default()
        };
        assert_eq!(7, status.frame_count());
        assert!(status.has_available_input_frame());
        assert!(status.can_accept_more_output_frames());
        assert!(!status.with_audio());

        let full = AcStatus { buffer_level: 6, ..status };
        assert!(!full.can_accept_more_output_frames());
    }

    #[test]
    fn state_round_trip() {
        for state in [
            AcState::Stopped,
            AcState::Initialized,
            AcState::Starting,
            AcState::Running,
            AcState::Paused,
            AcState::Stopping,
        ] {
            assert_eq!(state, AcState::from_raw(state as u32));
        }
        assert_eq!(AcState::Stopped, AcState::from_raw(99));
    }
}
