//! The AutoCirculate engine: frame-range allocation, channel state
//! control, and the per-frame transfer that moves video, audio, ancillary
//! data and timecode between the card and host buffers.

use std::collections::{BTreeMap, BTreeSet};

use corax_regs::regs;
use corax_regs::{AudioSystem, Channel};

use crate::anc;
use crate::audio::{self, ChannelPair};
use crate::caps::BoolCap;
use crate::device::{CoraxCard, Mode};
use crate::driver::{AcInit, AcOptions, AcState, AcStatus, DmaRequest, Driver, AC_NO_AUDIO};
use crate::format;
use crate::timecode::{rp188_registers, TcIndex, Timecode};
use crate::{Error, Result};

/// Per-channel engine bookkeeping that lives host-side across transfers.
#[derive(Debug, Default)]
pub struct ChannelShadow {
    /// Last observed non-PCM channel-pair set, for transition diagnostics.
    nonpcm: BTreeSet<ChannelPair>,
}

/// Host buffers for one AutoCirculate transfer.
pub struct AcTransfer<'a> {
    pub video: &'a mut [u8],
    pub audio: Option<&'a mut [u8]>,
    pub anc_f1: Option<&'a mut [u8]>,
    pub anc_f2: Option<&'a mut [u8]>,
    pub timecodes: &'a mut BTreeMap<TcIndex, Timecode>,
}

/// What a transfer actually moved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AcTransferInfo {
    pub frame: u32,
    pub video_bytes: usize,
    pub audio_bytes: usize,
    pub anc_f1_bytes: usize,
    pub anc_f2_bytes: usize,
}

impl<D: Driver> CoraxCard<D> {
    /// Initialize capture AutoCirculate on a channel.
    ///
    /// Without an explicit range the engine auto-picks the first free run
    /// of `frame_count` logical frames (sized for the channel's current
    /// geometry) that collides with neither another channel's running range
    /// nor the audio regions. An explicit range is used verbatim after
    /// checking it against other channels' running ranges.
    pub fn ac_init_for_input(
        &self,
        channel: Channel,
        frame_count: u32,
        audio_system: Option<AudioSystem>,
        options: AcOptions,
        range: Option<(u32, u32)>,
    ) -> Result<()> {
        self.ac_init(channel, true, frame_count, audio_system, options, range)
    }

    /// Initialize playout AutoCirculate on a channel.
    pub fn ac_init_for_output(
        &self,
        channel: Channel,
        frame_count: u32,
        audio_system: Option<AudioSystem>,
        options: AcOptions,
        range: Option<(u32, u32)>,
    ) -> Result<()> {
        self.ac_init(channel, false, frame_count, audio_system, options, range)
    }

    fn ac_init(
        &self,
        channel: Channel,
        capture: bool,
        frame_count: u32,
        audio_system: Option<AudioSystem>,
        options: AcOptions,
        range: Option<(u32, u32)>,
    ) -> Result<()> {
        let total = self.num_logical_frames(channel)?;
        if frame_count < 2 || frame_count > total {
            return Err(Error::InvalidState);
        }
        let (start, end) = match range {
            Some((start, end)) => {
                if end < start || end - start + 1 != frame_count {
                    return Err(Error::InvalidState);
                }
                self.ac_check_range(channel, start, end)?;
                (start, end)
            }
            None => self.ac_pick_range(channel, frame_count)?,
        };
        self.set_mode(channel, if capture { Mode::Capture } else { Mode::Display })?;
        self.enable_channel(channel)?;
        let init = AcInit {
            capture,
            start_frame: start,
            end_frame: end,
            audio_system: audio_system.map(|s| s.index() as u32).unwrap_or(AC_NO_AUDIO),
            options,
        };
        self.driver().ac_init(channel, &init)?;
        {
            let mut shadow = self.ac_shadow.lock().unwrap();
            shadow[channel.index()] = ChannelShadow::default();
        }
        log::info!(
            target: "autocirc",
            "{}: init {} frames [{}..{}]{}",
            channel,
            frame_count,
            start,
            end,
            if capture { " for capture" } else { " for playout" },
        );
        Ok(())
    }

    /// The byte span of another channel's circulate range, if it is active.
    fn ac_busy_span(&self, channel: Channel) -> Result<Option<(u64, u64)>> {
        let status = self.driver().ac_status(channel)?;
        if status.is_stopped() {
            return Ok(None);
        }
        let start = self.device_frame_info(channel, status.start_frame)?;
        let end = self.device_frame_info(channel, status.end_frame)?;
        Ok(Some((start.address, end.address + end.length)))
    }

    fn ac_check_range(&self, channel: Channel, start: u32, end: u32) -> Result<()> {
        let info = self.device_frame_info(channel, start)?;
        let span = (info.address, info.address + (end - start + 1) as u64 * info.length);
        for other_ndx in 0..self.caps().num_channels {
            let other = Channel::new(other_ndx as u8).expect("channel ordinal");
            if other == channel {
                continue;
            }
            if let Some((busy_start, busy_end)) = self.ac_busy_span(other)? {
                if span.0 < busy_end && busy_start < span.1 {
                    log::error!(
                        target: "autocirc",
                        "{}: frames [{}..{}] overlap {}'s running range",
                        channel,
                        start,
                        end,
                        other,
                    );
                    return Err(Error::InvalidState);
                }
            }
        }
        Ok(())
    }

    fn ac_pick_range(&self, channel: Channel, frame_count: u32) -> Result<(u32, u32)> {
        let info = self.device_frame_info(channel, 0)?;
        let logical = info.length;
        let memory = self.caps().active_memory_bytes;

        let mut busy: Vec<(u64, u64)> = Vec::new();
        for other_ndx in 0..self.caps().num_channels {
            let other = Channel::new(other_ndx as u8).expect("channel ordinal");
            if other == channel {
                continue;
            }
            if let Some(span) = self.ac_busy_span(other)? {
                busy.push(span);
            }
        }
        // audio regions are never handed to video
        let audio_bottom = if self.is_supported(BoolCap::StackedAudio) {
            memory - audio::AUDIO_REGION_BYTES * self.caps().num_audio_systems as u64
        } else {
            memory - info.intrinsic_bytes as u64
        };
        busy.push((audio_bottom, memory));

        let total = (memory / logical) as u32;
        for start in 0..total.saturating_sub(frame_count - 1) {
            let span = (start as u64 * logical, (start + frame_count) as u64 * logical);
            let clear = busy.iter().all(|(b0, b1)| span.1 <= *b0 || *b1 <= span.0);
            if clear {
                return Ok((start, start + frame_count - 1));
            }
        }
        log::error!(
            target: "autocirc",
            "{}: no free run of {} frames",
            channel,
            frame_count,
        );
        Err(Error::InvalidState)
    }

    /// Begin circulating. Hardware latches on at the next vertical
    /// interrupt.
    pub fn ac_start(&self, channel: Channel) -> Result<()> {
        self.driver().ac_start(channel)?;
        log::info!(target: "autocirc", "{}: started", channel);
        Ok(())
    }

    /// Stop circulating and release the channel's frame range.
    pub fn ac_stop(&self, channel: Channel) -> Result<()> {
        self.driver().ac_stop(channel)?;
        log::info!(target: "autocirc", "{}: stopped", channel);
        Ok(())
    }

    pub fn ac_pause(&self, channel: Channel) -> Result<()> {
        self.driver().ac_pause(channel)
    }

    pub fn ac_resume(&self, channel: Channel) -> Result<()> {
        self.driver().ac_resume(channel)
    }

    pub fn ac_get_status(&self, channel: Channel) -> Result<AcStatus> {
        self.driver().ac_status(channel)
    }

    /// Move one frame between the card and the caller's buffers.
    ///
    /// Fails with [Error::NoFrame] when nothing is ready; the caller should
    /// wait for the next vertical interrupt and retry. For capture the
    /// transfer order is video, audio (clamped to the bytes hardware
    /// reports for this frame), anc field 1, anc field 2; playout runs the
    /// same order in the opposite direction.
    pub fn ac_transfer(&self, channel: Channel, xfer: &mut AcTransfer) -> Result<AcTransferInfo> {
        let status = self.ac_get_status(channel)?;
        let capture = matches!(self.mode(channel)?, Mode::Capture);
        match status.state() {
            AcState::Running | AcState::Paused => {}
            // playout rings preload before starting
            AcState::Initialized if !capture => {}
            _ => return Err(Error::InvalidState),
        }

        let video_bytes = format::video_active_size(
            self.video_format(channel)?,
            self.pixel_format(channel)?,
            self.vanc_mode(channel)?,
        );
        if xfer.video.len() < video_bytes {
            return Err(Error::BufferTooSmall { needed: video_bytes, got: xfer.video.len() });
        }

        let claim = self.driver().ac_claim_frame(channel)?;
        let info = self.device_frame_info(channel, claim.frame)?;
        let frame_addr = info.address as u32;
        let frame_end = (info.address + info.length) as u32;
        let (f1_off, f2_off) = anc::region_offsets(self)?;

        let mut moved = AcTransferInfo { frame: claim.frame, video_bytes, ..Default::default() };

        if capture {
            self.driver()
                .dma_read(&DmaRequest::absolute(frame_addr), &mut xfer.video[..video_bytes])?;

            if status.with_audio() {
                if let Some(audio_buf) = xfer.audio.as_deref_mut() {
                    let needed = claim.audio_bytes as usize;
                    if audio_buf.len() < needed {
                        return Err(Error::BufferTooSmall { needed, got: audio_buf.len() });
                    }
                    let system = AudioSystem::new(status.audio_system as u8)
                        .ok_or(Error::InvalidState)?;
                    let base = self.audio_memory_offset(system, 0)?;
                    self.driver()
                        .dma_read(&DmaRequest::absolute(base as u32), &mut audio_buf[..needed])?;
                    moved.audio_bytes = needed;
                }
            }

            if status.with_anc() {
                if let Some(anc_buf) = xfer.anc_f1.as_deref_mut() {
                    let bytes = (claim.anc_f1_bytes as usize).min(anc_buf.len());
                    self.driver().dma_read(
                        &DmaRequest::absolute(frame_end - f1_off),
                        &mut anc_buf[..bytes],
                    )?;
                    // stale data past what hardware captured must not leak
                    anc_buf[bytes..].fill(0);
                    moved.anc_f1_bytes = bytes;
                }
                if let Some(anc_buf) = xfer.anc_f2.as_deref_mut() {
                    let bytes = (claim.anc_f2_bytes as usize).min(anc_buf.len());
                    self.driver().dma_read(
                        &DmaRequest::absolute(frame_end - f2_off),
                        &mut anc_buf[..bytes],
                    )?;
                    anc_buf[bytes..].fill(0);
                    moved.anc_f2_bytes = bytes;
                }
            }

            self.ac_capture_timecodes(channel, status.options(), xfer.timecodes)?;
            self.ac_log_sdi_health(channel)?;
            if status.with_audio() {
                self.ac_note_nonpcm_transitions(channel, status.audio_system)?;
            }
        } else {
            self.driver()
                .dma_write(&DmaRequest::absolute(frame_addr), &xfer.video[..video_bytes])?;

            if status.with_audio() {
                if let Some(audio_buf) = xfer.audio.as_deref() {
                    let system = AudioSystem::new(status.audio_system as u8)
                        .ok_or(Error::InvalidState)?;
                    let base = self.audio_memory_offset(system, 0)?;
                    self.driver().dma_write(&DmaRequest::absolute(base as u32), audio_buf)?;
                    moved.audio_bytes = audio_buf.len();
                }
            }

            if status.with_anc() {
                if let Some(anc_buf) = xfer.anc_f1.as_deref() {
                    let bytes = anc_buf.len().min(f1_off.saturating_sub(f2_off) as usize);
                    self.driver()
                        .dma_write(&DmaRequest::absolute(frame_end - f1_off), &anc_buf[..bytes])?;
                    moved.anc_f1_bytes = bytes;
                }
                if let Some(anc_buf) = xfer.anc_f2.as_deref() {
                    let bytes = anc_buf.len().min(f2_off as usize);
                    self.driver()
                        .dma_write(&DmaRequest::absolute(frame_end - f2_off), &anc_buf[..bytes])?;
                    moved.anc_f2_bytes = bytes;
                }
            }
        }

        self.driver().ac_commit_frame(channel)?;
        Ok(moved)
    }

    /// Read every requested embedded timecode for a channel.
    fn ac_capture_timecodes(
        &self,
        channel: Channel,
        options: AcOptions,
        timecodes: &mut BTreeMap<TcIndex, Timecode>,
    ) -> Result<()> {
        timecodes.clear();
        let mut indices = Vec::new();
        if options.contains(AcOptions::WITH_RP188) {
            indices.push(TcIndex::sdi(channel));
        }
        if options.contains(AcOptions::WITH_LTC) {
            indices.push(TcIndex::sdi_ltc(channel));
        }
        for index in indices {
            let source = index.channel().unwrap_or(channel);
            let (dbb, lo, hi) = rp188_registers(source);
            let tc = Timecode {
                dbb: self.read_reg(dbb)?,
                low: self.read_reg(lo)?,
                high: self.read_reg(hi)?,
            };
            if tc.is_valid() {
                timecodes.insert(index, tc);
            }
        }
        Ok(())
    }

    /// Surface SDI receiver trouble for an SDI-sourced capture channel.
    fn ac_log_sdi_health(&self, channel: Channel) -> Result<()> {
        if !self.is_supported(BoolCap::SdiErrorChecks) {
            return Ok(());
        }
        let base = regs::RX_SDI_STATUS_BASE[channel.index()];
        let status = regs::SdiInStatus::from(self.read_reg(base + regs::RX_SDI_STATUS)?);
        let crc_tally = self.read_reg(base + regs::RX_SDI_CRC_ERROR_COUNT)?;
        if crc_tally != 0 || !status.vpid_valid_a() || status.frame_trs_error() {
            log::warn!(
                target: "capture",
                "SDI in {}: crcTallyA={} vpidValidA={} frameTRSError={}",
                channel.number(),
                crc_tally,
                status.vpid_valid_a(),
                status.frame_trs_error(),
            );
        }
        Ok(())
    }

    /// Diff the non-PCM channel-pair set against the previous transfer and
    /// log every pair that changed state.
    fn ac_note_nonpcm_transitions(&self, channel: Channel, audio_system: u32) -> Result<()> {
        let Some(system) = AudioSystem::new(audio_system as u8) else {
            return Ok(());
        };
        let pairs = match self.input_audio_pairs_without_pcm(system) {
            Ok(pairs) => pairs,
            Err(Error::UnsupportedOnDevice) => return Ok(()),
            Err(err) => return Err(err),
        };
        let mut shadow = self.ac_shadow.lock().unwrap();
        let previous = &shadow[channel.index()].nonpcm;
        for pair in pairs.difference(previous) {
            log::warn!(target: "audio", "{}: channel pair {} now non-PCM", system, pair);
        }
        for pair in previous.difference(&pairs) {
            log::info!(target: "audio", "{}: channel pair {} now PCM", system, pair);
        }
        shadow[channel.index()].nonpcm = pairs;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::format::{PixelFormat, VancMode, VideoFormat};
    use crate::sim::SimDriver;
    use corax_regs::DeviceId;

    fn card(id: DeviceId) -> CoraxCard<SimDriver> {
        CoraxCard::open(SimDriver::new(id)).unwrap()
    }

    fn capture_setup(card: &CoraxCard<SimDriver>, channel: Channel) {
        card.set_video_format(channel, VideoFormat::HD_1080I_2997).unwrap();
        card.set_pixel_format(channel, PixelFormat::Ycbcr10).unwrap();
        card.set_vanc_mode(channel, VancMode::Off).unwrap();
    }

    struct Buffers {
        video: Vec<u8>,
        audio: Vec<u8>,
        anc_f1: Vec<u8>,
        anc_f2: Vec<u8>,
        timecodes: BTreeMap<TcIndex, Timecode>,
    }

    impl Buffers {
        fn new(video: usize) -> Buffers {
            Buffers {
                video: vec![0; video],
                audio: vec![0; audio::AUDIO_BYTES_MAX],
                anc_f1: vec![0; 0x2000],
                anc_f2: vec![0; 0x2000],
                timecodes: BTreeMap::new(),
            }
        }

        fn xfer(&mut self) -> AcTransfer<'_> {
            AcTransfer {
                video: &mut self.video,
                audio: Some(&mut self.audio),
                anc_f1: Some(&mut self.anc_f1),
                anc_f2: Some(&mut self.anc_f2),
                timecodes: &mut self.timecodes,
            }
        }
    }

    const ALL_OPTS: AcOptions = AcOptions::WITH_AUDIO
        .union(AcOptions::WITH_RP188)
        .union(AcOptions::WITH_ANC);

    #[test]
    fn auto_pick_avoids_running_ranges_and_audio() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        capture_setup(&card, Channel::CH2);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        let first = card.ac_get_status(Channel::CH1).unwrap();
        assert_eq!((0, 6), (first.start_frame, first.end_frame));

        card.ac_init_for_input(Channel::CH2, 7, None, AcOptions::empty(), None).unwrap();
        let second = card.ac_get_status(Channel::CH2).unwrap();
        assert_eq!((7, 13), (second.start_frame, second.end_frame));

        // 64 frames total, top 8 reserved for audio: a 50-frame run no
        // longer exists alongside the two 7-frame rings
        capture_setup(&card, Channel::CH3);
        assert_eq!(
            Err(Error::InvalidState),
            card.ac_init_for_input(Channel::CH3, 50, None, AcOptions::empty(), None)
        );
        assert!(card
            .ac_init_for_input(Channel::CH3, 42, None, AcOptions::empty(), None)
            .is_ok());
    }

    #[test]
    fn explicit_overlapping_range_is_rejected() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        capture_setup(&card, Channel::CH2);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), Some((0, 6))).unwrap();
        assert_eq!(
            Err(Error::InvalidState),
            card.ac_init_for_output(Channel::CH2, 7, None, AcOptions::empty(), Some((5, 11)))
        );
        // a disjoint explicit range is fine
        card.ac_init_for_output(Channel::CH2, 7, None, AcOptions::empty(), Some((7, 13))).unwrap();
    }

    #[test]
    fn transfer_before_start_is_invalid() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        let mut bufs = Buffers::new(5_529_600);
        assert_eq!(Err(Error::InvalidState), card.ac_transfer(Channel::CH1, &mut bufs.xfer()));
    }

    #[test]
    fn transfer_with_no_pending_frame_reports_no_frame() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick(); // Starting -> Running, nothing captured yet
        let mut bufs = Buffers::new(5_529_600);
        assert_eq!(Err(Error::NoFrame), card.ac_transfer(Channel::CH1, &mut bufs.xfer()));
    }

    #[test]
    fn short_video_buffer_is_refused() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick_n(2);
        let mut bufs = Buffers::new(1024);
        assert_eq!(
            Err(Error::BufferTooSmall { needed: 5_529_600, got: 1024 }),
            card.ac_transfer(Channel::CH1, &mut bufs.xfer())
        );
        // the frame stays pending for a retry with a real buffer
        let mut ok = Buffers::new(5_529_600);
        assert!(card.ac_transfer(Channel::CH1, &mut ok.xfer()).is_ok());
    }

    #[test]
    fn steady_consumer_sees_every_frame() {
        // 600 interrupts with an unblocked consumer: all processed, none
        // dropped, audio byte counts inside the 29.97 cadence band, anc
        // inside its regions, a valid VITC on every frame
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(
            Channel::CH1,
            7,
            Some(AudioSystem::SYS1),
            ALL_OPTS,
            None,
        )
        .unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick();

        let mut bufs = Buffers::new(5_529_600);
        for _ in 0..600 {
            card.driver().tick();
            let info = card.ac_transfer(Channel::CH1, &mut bufs.xfer()).unwrap();
            assert!((102_464..=102_528).contains(&info.audio_bytes), "{}", info.audio_bytes);
            assert!(info.anc_f1_bytes <= 0x2000);
            assert!(info.anc_f2_bytes <= 0x2000);
            assert!(bufs.timecodes.contains_key(&TcIndex::sdi(Channel::CH1)));
        }
        let status = card.ac_get_status(Channel::CH1).unwrap();
        assert_eq!(600, status.frames_processed);
        assert_eq!(0, status.frames_dropped);
        assert_eq!(0, status.buffer_level);
    }

    #[test]
    fn stalled_consumer_accounts_every_drop() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick();

        card.driver().tick_n(600);
        let status = card.ac_get_status(Channel::CH1).unwrap();
        assert_eq!(0, status.frames_processed);
        assert_eq!(6, status.buffer_level);
        assert_eq!(594, status.frames_dropped);
    }

    #[test]
    fn slow_consumer_splits_frames_between_processed_and_dropped() {
        // a consumer draining every third interrupt
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick();

        let mut bufs = Buffers::new(5_529_600);
        for vbi in 0..600 {
            card.driver().tick();
            if vbi % 3 == 2 {
                card.ac_transfer(Channel::CH1, &mut bufs.xfer()).unwrap();
            }
        }
        let status = card.ac_get_status(Channel::CH1).unwrap();
        assert_eq!(200, status.frames_processed);
        // every interrupt either processed, dropped, or still queued
        assert_eq!(
            600,
            status.frames_processed + status.frames_dropped + status.buffer_level
        );
    }

    #[test]
    fn paused_channel_still_transfers() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(Channel::CH1, 7, None, AcOptions::empty(), None).unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick_n(3);
        card.ac_pause(Channel::CH1).unwrap();
        let mut bufs = Buffers::new(5_529_600);
        assert!(card.ac_transfer(Channel::CH1, &mut bufs.xfer()).is_ok());
        card.ac_resume(Channel::CH1).unwrap();
    }

    #[test]
    fn playout_preloads_then_circulates() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH4);
        card.ac_init_for_output(Channel::CH4, 7, None, AcOptions::empty(), None).unwrap();
        let mut bufs = Buffers::new(5_529_600);
        // preload three frames before starting
        for _ in 0..3 {
            card.ac_transfer(Channel::CH4, &mut bufs.xfer()).unwrap();
        }
        card.ac_start(Channel::CH4).unwrap();
        card.driver().tick();
        for _ in 0..10 {
            card.ac_transfer(Channel::CH4, &mut bufs.xfer()).unwrap();
            card.driver().tick();
        }
        let status = card.ac_get_status(Channel::CH4).unwrap();
        assert_eq!(13, status.frames_processed);
        assert_eq!(0, status.frames_dropped);
    }

    #[test]
    fn nonpcm_transitions_update_the_shadow() {
        let card = card(DeviceId::Corax88);
        capture_setup(&card, Channel::CH1);
        card.ac_init_for_input(
            Channel::CH1,
            7,
            Some(AudioSystem::SYS1),
            ALL_OPTS,
            None,
        )
        .unwrap();
        card.ac_start(Channel::CH1).unwrap();
        card.driver().tick_n(2);

        card.write_reg(regs::AUD_NONPCM_DETECT[0], 0b11).unwrap();
        let mut bufs = Buffers::new(5_529_600);
        card.ac_transfer(Channel::CH1, &mut bufs.xfer()).unwrap();
        {
            let shadow = card.ac_shadow.lock().unwrap();
            assert_eq!(2, shadow[0].nonpcm.len());
        }
        card.write_reg(regs::AUD_NONPCM_DETECT[0], 0).unwrap();
        card.driver().tick();
        card.ac_transfer(Channel::CH1, &mut bufs.xfer()).unwrap();
        let shadow = card.ac_shadow.lock().unwrap();
        assert!(shadow[0].nonpcm.is_empty());
    }
}
