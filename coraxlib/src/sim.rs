//! A software Corax device.
//!
//! `SimDriver` implements the [Driver] gateway over an in-memory register
//! file and a frame-accurate model of the kernel side: vertical interrupts,
//! AutoCirculate ring advancement with wrap/drop accounting, audio sample
//! cadence, ancillary byte counts, and per-frame timecode. Time advances
//! only on [SimDriver::tick] (or a [SimClock]), which keeps tests
//! deterministic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use corax_regs::catalog::catalog;
use corax_regs::regs::{self, ChannelControl, FrameSize, GlobalControl, WriteMode};
use corax_regs::rom;
use corax_regs::xpt::{InputXpt, OutputXpt};
use corax_regs::{Channel, DeviceId, Widget};

use crate::audio;
use crate::caps::DeviceCaps;
use crate::driver::{
    AcClaimedFrame, AcInit, AcOptions, AcState, AcStatus, Driver, RegisterRead, RegisterWrite,
    AC_NO_AUDIO,
};
use crate::format::FrameRate;
use crate::timecode::{rp188_registers, Timecode};
use crate::{AbortFlag, Error, Result};

/// Backing-store chunk size for sparse SDRAM.
const CHUNK: usize = 0x1_0000;

/// How often blocked interrupt waits re-check the abort flag.
const ABORT_POLL: Duration = Duration::from_millis(2);

#[derive(Clone, Copy, Debug, Default)]
struct FrameMeta {
    audio_bytes: u32,
    anc_f1_bytes: u32,
    anc_f2_bytes: u32,
    /// Global tick number the frame completed on, for timecode.
    tick: u64,
}

#[derive(Debug, Default)]
struct AcSim {
    state: AcState,
    capture: bool,
    start: u32,
    end: u32,
    /// The frame hardware is currently writing (capture) or scanning out
    /// (playout).
    active: u32,
    /// The oldest pending frame, next to hand to the host.
    head: u32,
    level: u32,
    processed: u32,
    dropped: u32,
    audio_system: u32,
    options: AcOptions,
    claimed: bool,
    meta: HashMap<u32, FrameMeta>,
    /// Running frame counter for the audio cadence.
    audio_frames: u64,
}

impl AcSim {
    fn frame_count(&self) -> u32 {
        self.end - self.start + 1
    }

    fn wrap(&self, frame: u32) -> u32 {
        if frame >= self.end {
            self.start
        } else {
            frame + 1
        }
    }
}

#[derive(Debug, Default)]
struct SimState {
    regs: HashMap<u32, u32>,
    /// Writes held back by a non-immediate latch mode, applied on the next
    /// frame boundary.
    latched: Vec<RegisterWrite>,
    input_vbis: [u64; 8],
    output_vbis: [u64; 8],
    ticks: u64,
    ac: [AcSim; 8],
    memory: HashMap<u64, Box<[u8]>>,
}

/// The software device.
pub struct SimDriver {
    id: DeviceId,
    caps: DeviceCaps,
    state: Mutex<SimState>,
    vbi: Condvar,
}

impl SimDriver {
    pub fn new(id: DeviceId) -> SimDriver {
        let caps = DeviceCaps::for_device(id);
        let driver =
            SimDriver { id, caps, state: Mutex::new(SimState::default()), vbi: Condvar::new() };
        driver.power_on_defaults();
        driver
    }

    fn power_on_defaults(&self) {
        let mut st = self.state.lock().unwrap();
        // anc regions: F1 sits above F2 at the end of each frame
        st.regs.insert(regs::ANC_FIELD1_OFFSET, 0x4000);
        st.regs.insert(regs::ANC_FIELD2_OFFSET, 0x2000);
        for ndx in 0..self.caps.num_channels as usize {
            let control = ChannelControl::new().with_disabled(true).with_frame_size(FrameSize::Fs8Mb);
            st.regs.insert(regs::CH_CONTROL[ndx], control.into());
            let gc = GlobalControl::new()
                .with_standard(crate::format::Standard::Hd1080i.selector())
                .with_frame_rate(FrameRate::F2997.selector());
            // models without per-channel shadows share the global register
            let reg = if regs::GLOBAL_CONTROL_CH[ndx] <= self.caps.max_register {
                regs::GLOBAL_CONTROL_CH[ndx]
            } else {
                regs::GLOBAL_CONTROL
            };
            st.regs.insert(reg, gc.into());
        }
        for ndx in 0..self.caps.num_sdi_inputs as usize {
            let status = regs::SdiInStatus::new().with_locked(true).with_vpid_valid_a(true);
            st.regs.insert(regs::RX_SDI_STATUS_BASE[ndx] + regs::RX_SDI_STATUS, status.into());
        }
        drop(st);
        if self.caps.has_route_rom {
            self.seed_route_rom();
        }
    }

    /// Populate the route ROM from the model's widget set. The family rule:
    /// a framestore output never feeds an SDI output directly (it must pass
    /// through a CSC or mux), and absent widgets contribute no sources.
    fn seed_route_rom(&self) {
        let widgets = self.caps.widgets();
        let present: Vec<OutputXpt> = widgets.iter().flat_map(|w| w.outputs()).collect();
        let fb_outputs: Vec<OutputXpt> = widgets
            .iter()
            .filter(|w| matches!(w, Widget::FrameStore(_)))
            .flat_map(|w| w.outputs())
            .collect();
        let sdi_out_inputs: Vec<InputXpt> = widgets
            .iter()
            .filter(|w| matches!(w, Widget::SdiOut(_)))
            .flat_map(|w| w.inputs())
            .collect();

        let mut st = self.state.lock().unwrap();
        for input in catalog().input_xpts() {
            let Some((cell_reg, _)) = catalog().xpt_cell(input) else {
                continue;
            };
            if cell_reg > self.caps.max_register {
                continue;
            }
            let mut bitmap = [0u32; 4];
            let (word, bit) = rom::word_and_bit(OutputXpt::BLACK);
            bitmap[word] |= bit;
            for output in &present {
                if sdi_out_inputs.contains(&input) && fb_outputs.contains(output) {
                    continue;
                }
                let (word, bit) = rom::word_and_bit(*output);
                bitmap[word] |= bit;
            }
            for (ndx, reg) in rom::rom_registers(input).into_iter().enumerate() {
                st.regs.insert(reg, bitmap[ndx]);
            }
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

    fn check_channel(&self, channel: Channel) -> Result<()> {
        if (channel.index() as u32) < self.caps.num_channels {
            Ok(())
        } else {
            Err(Error::UnsupportedOnDevice)
        }
    }

    fn apply_write(st: &mut SimState, write: &RegisterWrite) {
        let old = st.regs.get(&write.num).copied().unwrap_or(0);
        let new = (old & !write.mask) | ((write.value << write.shift) & write.mask);
        st.regs.insert(write.num, new);
    }

    fn write_mode(st: &SimState) -> WriteMode {
        GlobalControl::from(st.regs.get(&regs::GLOBAL_CONTROL).copied().unwrap_or(0)).write_mode()
    }

    fn frame_rate(st: &SimState, channel: Channel) -> FrameRate {
        let raw = st
            .regs
            .get(&regs::GLOBAL_CONTROL_CH[channel.index()])
            .or_else(|| st.regs.get(&regs::GLOBAL_CONTROL))
            .copied()
            .unwrap_or(0);
        FrameRate::from_selector(GlobalControl::from(raw).frame_rate()).unwrap_or(FrameRate::F2997)
    }

    fn intrinsic_bytes(st: &SimState) -> u64 {
        let raw = st.regs.get(&regs::CH_CONTROL[0]).copied().unwrap_or(0);
        ChannelControl::from(raw).frame_size().byte_count() as u64
    }

    /// Advance the device by one frame interval: latch pending writes, fire
    /// every channel's vertical interrupts, and run the AutoCirculate rings.
    pub fn tick(&self) {
        let mut st = self.state.lock().unwrap();
        st.ticks += 1;
        let now = st.ticks;

        let latched = std::mem::take(&mut st.latched);
        for write in &latched {
            Self::apply_write(&mut st, write);
        }

        let audio_channels = self.caps.audio_channels_per_system;
        let anc_f1_region = st.regs.get(&regs::ANC_FIELD1_OFFSET).copied().unwrap_or(0);
        let anc_f2_region = st.regs.get(&regs::ANC_FIELD2_OFFSET).copied().unwrap_or(0);
        let f1_size = anc_f1_region.saturating_sub(anc_f2_region);
        let f2_size = anc_f2_region;

        for ndx in 0..self.caps.num_channels as usize {
            st.input_vbis[ndx] += 1;
            st.output_vbis[ndx] += 1;
            let channel = Channel::new(ndx as u8).expect("channel index");
            let rate = Self::frame_rate(&st, channel);

            let ac = &mut st.ac[ndx];
            match ac.state {
                AcState::Starting => {
                    // hardware latches on to the ring at this interrupt
                    ac.state = AcState::Running;
                }
                AcState::Stopping => {
                    ac.state = AcState::Stopped;
                    ac.meta.clear();
                }
                AcState::Running if ac.capture => {
                    let samples = audio::samples_for_frame(rate, ac.audio_frames);
                    let meta = FrameMeta {
                        audio_bytes: if ac.audio_system == AC_NO_AUDIO {
                            0
                        } else {
                            samples * audio_channels * audio::BYTES_PER_SAMPLE
                        },
                        anc_f1_bytes: (512 + 128 * (now % 3) as u32).min(f1_size),
                        anc_f2_bytes: (256 + 64 * (now % 2) as u32).min(f2_size),
                        tick: now,
                    };
                    ac.meta.insert(ac.active, meta);
                    if ac.level == ac.frame_count() - 1 {
                        // wrap onto an undrained frame: overwrite the oldest
                        ac.meta.remove(&ac.head);
                        ac.head = ac.wrap(ac.head);
                        ac.dropped += 1;
                    } else {
                        ac.level += 1;
                    }
                    ac.active = ac.wrap(ac.active);
                    ac.audio_frames += 1;
                    let frame = ac.active;
                    st.regs.insert(regs::CH_INPUT_FRAME[ndx], frame);
                }
                AcState::Running => {
                    // playout: scan out the next queued frame, or starve
                    if ac.level > 0 {
                        ac.active = ac.wrap(ac.active);
                        ac.level -= 1;
                    } else {
                        ac.dropped += 1;
                    }
                    ac.audio_frames += 1;
                    let frame = ac.active;
                    st.regs.insert(regs::CH_OUTPUT_FRAME[ndx], frame);
                }
                _ => {}
            }

            // embedded timecode trails the input by one field
            let (dbb, lo, hi) = rp188_registers(channel);
            let tc = Timecode::from_frame_count(now, integer_fps(rate));
            st.regs.insert(dbb, 0x1_0000);
            st.regs.insert(lo, tc.low);
            st.regs.insert(hi, tc.high);
        }
        drop(st);
        self.vbi.notify_all();
    }

    /// Run [SimDriver::tick] `count` times.
    pub fn tick_n(&self, count: u32) {
        for _ in 0..count {
            self.tick();
        }
    }

    /// Drive ticks from a background thread until the handle drops.
    pub fn start_clock(self: &Arc<Self>, period: Duration) -> SimClock {
        let stop = Arc::new(AtomicBool::new(false));
        let driver = self.clone();
        let flag = stop.clone();
        let handle = std::thread::spawn(move || {
            while !flag.load(Ordering::SeqCst) {
                std::thread::sleep(period);
                driver.tick();
            }
        });
        SimClock { stop, handle: Some(handle) }
    }

    fn wait_for_vertical(
        &self,
        channel: Channel,
        count: u32,
        abort: &AbortFlag,
        input: bool,
    ) -> Result<()> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let rate = Self::frame_rate(&st, channel);
        let current = if input {
            st.input_vbis[channel.index()]
        } else {
            st.output_vbis[channel.index()]
        };
        let target = current + count as u64;
        let deadline = Instant::now() + rate.frame_duration() * 2 * count;
        loop {
            if abort.is_raised() {
                return Err(Error::Aborted);
            }
            let seen = if input {
                st.input_vbis[channel.index()]
            } else {
                st.output_vbis[channel.index()]
            };
            if seen >= target {
                return Ok(());
            }
            if Instant::now() >= deadline {
                // timed out; return so the caller's loop can re-check state
                return Ok(());
            }
            let (next, _) = self.vbi.wait_timeout(st, ABORT_POLL).unwrap();
            st = next;
        }
    }

    fn mem_copy(st: &mut SimState, mut addr: u64, buf: &mut [u8], write: Option<&[u8]>) {
        let mut done = 0usize;
        let total = if let Some(src) = write { src.len() } else { buf.len() };
        while done < total {
            let chunk_ndx = addr / CHUNK as u64;
            let offset = (addr % CHUNK as u64) as usize;
            let run = (CHUNK - offset).min(total - done);
            match write {
                Some(src) => {
                    let chunk = st
                        .memory
                        .entry(chunk_ndx)
                        .or_insert_with(|| vec![0u8; CHUNK].into_boxed_slice());
                    chunk[offset..offset + run].copy_from_slice(&src[done..done + run]);
                }
                None => match st.memory.get(&chunk_ndx) {
                    Some(chunk) => buf[done..done + run].copy_from_slice(&chunk[offset..offset + run]),
                    // never-written SDRAM reads back as zeros
                    None => buf[done..done + run].fill(0),
                },
            }
            addr += run as u64;
            done += run;
        }
    }

    fn dma(&self, req: &crate::driver::DmaRequest, buf: Option<&mut [u8]>, src: Option<&[u8]>) -> Result<()> {
        let mut st = self.state.lock().unwrap();
        let base =
            req.frame_number as u64 * Self::intrinsic_bytes(&st) + req.card_offset as u64;
        let total = src.map(|s| s.len()).or_else(|| buf.as_ref().map(|b| b.len())).unwrap_or(0);
        let segments = req.num_segments.max(1) as usize;
        let seg_len = total / segments;
        if seg_len == 0 {
            return Ok(());
        }
        let host_pitch = if req.host_pitch == 0 { seg_len } else { req.host_pitch as usize };
        let card_pitch = if req.card_pitch == 0 { seg_len as u64 } else { req.card_pitch as u64 };
        match (buf, src) {
            (Some(buf), None) => {
                for seg in 0..segments {
                    let host = seg * host_pitch;
                    Self::mem_copy(
                        &mut st,
                        base + seg as u64 * card_pitch,
                        &mut buf[host..host + seg_len],
                        None,
                    );
                }
            }
            (None, Some(src)) => {
                for seg in 0..segments {
                    let host = seg * host_pitch;
                    let mut empty: [u8; 0] = [];
                    Self::mem_copy(
                        &mut st,
                        base + seg as u64 * card_pitch,
                        &mut empty,
                        Some(&src[host..host + seg_len]),
                    );
                }
            }
            _ => {}
        }
        Ok(())
    }
}

fn integer_fps(rate: FrameRate) -> u32 {
    let (num, den) = rate.ratio();
    num.div_ceil(den)
}

impl Driver for SimDriver {
    fn device_id(&self) -> DeviceId {
        self.id
    }

    fn read_register(&self, num: u32, mask: u32, shift: u8) -> Result<u32> {
        self.check_register(num)?;
        let st = self.state.lock().unwrap();
        let raw = st.regs.get(&num).copied().unwrap_or(0);
        Ok((raw & mask) >> shift)
    }

    fn write_register(&self, num: u32, value: u32, mask: u32, shift: u8) -> Result<()> {
        self.check_register(num)?;
        let mut st = self.state.lock().unwrap();
        let write = RegisterWrite { num, value, mask, shift };
        let latch = Self::write_mode(&st) != WriteMode::Immediate
            && regs::XPT_SELECT_GROUP.contains(&num);
        if latch {
            st.latched.push(write);
        } else {
            Self::apply_write(&mut st, &write);
        }
        Ok(())
    }

    fn read_registers(&self, reads: &[RegisterRead]) -> Result<Vec<u32>> {
        for read in reads {
            self.check_register(read.num)?;
        }
        let st = self.state.lock().unwrap();
        Ok(reads
            .iter()
            .map(|r| (st.regs.get(&r.num).copied().unwrap_or(0) & r.mask) >> r.shift)
            .collect())
    }

    fn write_registers(&self, writes: &[RegisterWrite]) -> Result<()> {
        for write in writes {
            self.check_register(write.num)?;
        }
        let mut st = self.state.lock().unwrap();
        for write in writes {
            Self::apply_write(&mut st, write);
        }
        Ok(())
    }

    fn wait_for_input_vertical(
        &self,
        channel: Channel,
        count: u32,
        abort: &AbortFlag,
    ) -> Result<()> {
        self.wait_for_vertical(channel, count, abort, true)
    }

    fn wait_for_output_vertical(
        &self,
        channel: Channel,
        count: u32,
        abort: &AbortFlag,
    ) -> Result<()> {
        self.wait_for_vertical(channel, count, abort, false)
    }

    fn dma_read(&self, req: &crate::driver::DmaRequest, buf: &mut [u8]) -> Result<()> {
        self.dma(req, Some(buf), None)
    }

    fn dma_write(&self, req: &crate::driver::DmaRequest, buf: &[u8]) -> Result<()> {
        self.dma(req, None, Some(buf))
    }

    fn ac_init(&self, channel: Channel, init: &AcInit) -> Result<()> {
        self.check_channel(channel)?;
        if init.end_frame < init.start_frame {
            return Err(Error::InvalidState);
        }
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        match ac.state {
            AcState::Stopped | AcState::Initialized | AcState::Stopping => {}
            _ => return Err(Error::InvalidState),
        }
        *ac = AcSim {
            state: AcState::Initialized,
            capture: init.capture,
            start: init.start_frame,
            end: init.end_frame,
            active: init.start_frame,
            head: init.start_frame,
            audio_system: init.audio_system,
            options: init.options,
            ..AcSim::default()
        };
        let frame = init.start_frame;
        let reg = if init.capture {
            regs::CH_INPUT_FRAME[channel.index()]
        } else {
            regs::CH_OUTPUT_FRAME[channel.index()]
        };
        st.regs.insert(reg, frame);
        Ok(())
    }

    fn ac_start(&self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        if ac.state != AcState::Initialized {
            return Err(Error::InvalidState);
        }
        ac.state = AcState::Starting;
        Ok(())
    }

    fn ac_stop(&self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        match ac.state {
            AcState::Stopped => {}
            AcState::Initialized => ac.state = AcState::Stopped,
            _ => ac.state = AcState::Stopping,
        }
        Ok(())
    }

    fn ac_pause(&self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        if ac.state != AcState::Running {
            return Err(Error::InvalidState);
        }
        ac.state = AcState::Paused;
        Ok(())
    }

    fn ac_resume(&self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        if ac.state != AcState::Paused {
            return Err(Error::InvalidState);
        }
        ac.state = AcState::Running;
        Ok(())
    }

    fn ac_status(&self, channel: Channel) -> Result<AcStatus> {
        self.check_channel(channel)?;
        let st = self.state.lock().unwrap();
        let ac = &st.ac[channel.index()];
        Ok(AcStatus {
            state: ac.state as u32,
            start_frame: ac.start,
            end_frame: ac.end,
            active_frame: ac.active,
            rdtsc_per_frame_lo: 0,
            rdtsc_per_frame_hi: 0,
            frames_processed: ac.processed,
            frames_dropped: ac.dropped,
            buffer_level: ac.level,
            audio_clock_current_time: (st.ticks & 0xFFFF_FFFF) as u32,
            audio_system: ac.audio_system,
            options: ac.options.bits(),
        })
    }

    fn ac_claim_frame(&self, channel: Channel) -> Result<AcClaimedFrame> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        match (ac.capture, ac.state) {
            (_, AcState::Running | AcState::Paused) => {}
            // playout rings may be preloaded before starting
            (false, AcState::Initialized) => {}
            _ => return Err(Error::InvalidState),
        }
        if ac.capture {
            if ac.level == 0 {
                return Err(Error::NoFrame);
            }
            let meta = ac.meta.get(&ac.head).copied().unwrap_or_default();
            ac.claimed = true;
            let claim = AcClaimedFrame {
                frame: ac.head,
                audio_bytes: meta.audio_bytes,
                anc_f1_bytes: meta.anc_f1_bytes,
                anc_f2_bytes: meta.anc_f2_bytes,
            };
            // latch this frame's timecode for the transfer to read
            let rate = Self::frame_rate(&st, channel);
            let tc = Timecode::from_frame_count(meta.tick, integer_fps(rate));
            let (dbb, lo, hi) = rp188_registers(channel);
            st.regs.insert(dbb, 0x1_0000);
            st.regs.insert(lo, tc.low);
            st.regs.insert(hi, tc.high);
            Ok(claim)
        } else {
            if ac.level >= ac.frame_count() - 1 {
                return Err(Error::NoFrame);
            }
            // the slot past everything queued; before start, the active
            // frame itself has not been scanned out yet
            let steps = if ac.state == AcState::Initialized { ac.level } else { ac.level + 1 };
            let mut frame = ac.active;
            for _ in 0..steps {
                frame = ac.wrap(frame);
            }
            ac.claimed = true;
            Ok(AcClaimedFrame { frame, ..AcClaimedFrame::default() })
        }
    }

    fn ac_commit_frame(&self, channel: Channel) -> Result<()> {
        self.check_channel(channel)?;
        let mut st = self.state.lock().unwrap();
        let ac = &mut st.ac[channel.index()];
        if !ac.claimed {
            return Err(Error::InvalidState);
        }
        ac.claimed = false;
        if ac.capture {
            ac.meta.remove(&ac.head);
            ac.head = ac.wrap(ac.head);
            ac.level -= 1;
        } else {
            ac.level += 1;
        }
        ac.processed += 1;
        Ok(())
    }
}

/// Handle for a background tick thread; stops and joins on drop.
pub struct SimClock {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Drop for SimClock {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::DmaRequest;

    fn running_capture(driver: &SimDriver) {
        driver
            .ac_init(
                Channel::CH1,
                &AcInit {
                    capture: true,
                    start_frame: 0,
                    end_frame: 6,
                    audio_system: 0,
                    options: AcOptions::WITH_AUDIO | AcOptions::WITH_RP188,
                },
            )
            .unwrap();
        driver.ac_start(Channel::CH1).unwrap();
        driver.tick(); // Starting -> Running
    }

    #[test]
    fn masked_writes_read_back() {
        let driver = SimDriver::new(DeviceId::Corax88);
        driver.write_register(regs::XPT_SELECT_GROUP[1], 0x17, 0x0000_FF00, 8).unwrap();
        assert_eq!(0x17, driver.read_register(regs::XPT_SELECT_GROUP[1], 0x0000_FF00, 8).unwrap());
        assert_eq!(0x1700, driver.read_reg(regs::XPT_SELECT_GROUP[1]).unwrap());
    }

    #[test]
    fn register_bounds_are_enforced() {
        let driver = SimDriver::new(DeviceId::CoraxLp);
        assert_eq!(Err(Error::BadRegister(2050)), driver.read_reg(2050));
        assert!(driver.read_reg(regs::ANC_FIELD1_OFFSET).is_ok());
    }

    #[test]
    fn latched_routing_writes_apply_at_the_frame() {
        let driver = SimDriver::new(DeviceId::Corax88);
        let gc = GlobalControl::new()
            .with_standard(crate::format::Standard::Hd1080i.selector())
            .with_frame_rate(FrameRate::F2997.selector())
            .with_write_mode(WriteMode::AtFrame);
        driver.write_reg(regs::GLOBAL_CONTROL, gc.into()).unwrap();
        driver.write_register(regs::XPT_SELECT_GROUP[0], 0x08, 0xFF, 0).unwrap();
        assert_eq!(0, driver.read_register(regs::XPT_SELECT_GROUP[0], 0xFF, 0).unwrap());
        driver.tick();
        assert_eq!(0x08, driver.read_register(regs::XPT_SELECT_GROUP[0], 0xFF, 0).unwrap());
    }

    #[test]
    fn capture_ring_fills_and_drops() {
        let driver = SimDriver::new(DeviceId::Corax88);
        running_capture(&driver);

        driver.tick_n(3);
        let status = driver.ac_status(Channel::CH1).unwrap();
        assert_eq!(3, status.buffer_level);
        assert_eq!(0, status.frames_dropped);

        // 7-frame ring holds at most 6 pending; further ticks drop
        driver.tick_n(10);
        let status = driver.ac_status(Channel::CH1).unwrap();
        assert_eq!(6, status.buffer_level);
        assert_eq!(7, status.frames_dropped);
    }

    #[test]
    fn claim_then_commit_drains_in_order() {
        let driver = SimDriver::new(DeviceId::Corax88);
        running_capture(&driver);
        driver.tick_n(2);

        let first = driver.ac_claim_frame(Channel::CH1).unwrap();
        assert_eq!(0, first.frame);
        assert!(first.audio_bytes > 0);
        driver.ac_commit_frame(Channel::CH1).unwrap();
        let second = driver.ac_claim_frame(Channel::CH1).unwrap();
        assert_eq!(1, second.frame);
        driver.ac_commit_frame(Channel::CH1).unwrap();
        assert_eq!(Err(Error::NoFrame), driver.ac_claim_frame(Channel::CH1).map(|c| c.frame));
        assert_eq!(2, driver.ac_status(Channel::CH1).unwrap().frames_processed);
    }

    #[test]
    fn audio_bytes_follow_the_2997_cadence() {
        let driver = SimDriver::new(DeviceId::Corax88);
        running_capture(&driver);
        let mut sizes = Vec::new();
        for _ in 0..5 {
            driver.tick();
            let claim = driver.ac_claim_frame(Channel::CH1).unwrap();
            sizes.push(claim.audio_bytes);
            driver.ac_commit_frame(Channel::CH1).unwrap();
        }
        let expected: Vec<u32> =
            audio::cadence(FrameRate::F2997).iter().map(|s| s * 16 * 4).collect();
        assert_eq!(expected, sizes);
    }

    #[test]
    fn dma_write_reads_back() {
        let driver = SimDriver::new(DeviceId::Corax44);
        let data: Vec<u8> = (0..1024u32).map(|b| b as u8).collect();
        driver.dma_write(&DmaRequest::frame(3, 256), &data).unwrap();
        let mut back = vec![0u8; 1024];
        driver.dma_read(&DmaRequest::frame(3, 256), &mut back).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn segmented_dma_copies_a_rectangle() {
        let driver = SimDriver::new(DeviceId::Corax44);
        // card rows are 256 bytes apart; copy 4 rows of 64 bytes
        let src: Vec<u8> = (0..256u32).map(|b| b as u8).collect();
        let req = DmaRequest {
            num_segments: 4,
            host_pitch: 64,
            card_pitch: 256,
            ..DmaRequest::frame(0, 0)
        };
        driver.dma_write(&req, &src).unwrap();
        let mut row = vec![0u8; 64];
        driver.dma_read(&DmaRequest::frame(0, 512), &mut row).unwrap();
        assert_eq!(&src[128..192], &row[..]);
    }

    #[test]
    fn vbi_wait_aborts() {
        let driver = Arc::new(SimDriver::new(DeviceId::Corax88));
        let abort = Arc::new(AbortFlag::new());
        let waiter = {
            let driver = driver.clone();
            let abort = abort.clone();
            std::thread::spawn(move || driver.wait_for_input_vertical(Channel::CH1, 100, &abort))
        };
        abort.raise();
        assert_eq!(Err(Error::Aborted), waiter.join().unwrap());
    }

    #[test]
    fn stop_settles_through_stopping() {
        let driver = SimDriver::new(DeviceId::Corax88);
        running_capture(&driver);
        driver.ac_stop(Channel::CH1).unwrap();
        assert_eq!(AcState::Stopping, driver.ac_status(Channel::CH1).unwrap().state());
        driver.tick();
        assert_eq!(AcState::Stopped, driver.ac_status(Channel::CH1).unwrap().state());
    }
}
