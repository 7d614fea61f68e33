//! Capture and playout sessions: the producer/consumer thread pairs that
//! couple AutoCirculate to the host frame ring.
//!
//! A session owns its threads. Quitting raises the shared abort flag and
//! joins both; dropping a session does the same, so threads never outlive
//! the card they borrow.

use std::sync::Arc;
use std::thread::JoinHandle;

use corax_regs::Channel;

use crate::anc;
use crate::audio;
use crate::autocirc::AcTransfer;
use crate::device::CoraxCard;
use crate::driver::{AcOptions, AcStatus, Driver};
use crate::format::{self, PixelFormat, VancMode, VideoFormat};
use crate::ring::{FrameRing, FrameSlot, DEFAULT_RING_SLOTS};
use crate::router;
use crate::{AbortFlag, AudioSystem, Error, Result};

/// Configuration for a capture or playout session.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub channel: Channel,
    pub video_format: VideoFormat,
    pub pixel_format: PixelFormat,
    pub vanc_mode: VancMode,
    pub with_audio: bool,
    pub with_rp188: bool,
    pub with_anc: bool,
    /// Host ring depth.
    pub ring_slots: usize,
    /// On-card circulate ring depth.
    pub frame_count: u32,
    /// Claim the device under this application signature.
    pub app_signature: Option<u32>,
}

impl SessionConfig {
    pub fn new(channel: Channel, video_format: VideoFormat, pixel_format: PixelFormat) -> SessionConfig {
        SessionConfig {
            channel,
            video_format,
            pixel_format,
            vanc_mode: VancMode::Off,
            with_audio: true,
            with_rp188: true,
            with_anc: true,
            ring_slots: DEFAULT_RING_SLOTS,
            frame_count: DEFAULT_RING_SLOTS as u32,
            app_signature: None,
        }
    }

    fn options(&self) -> AcOptions {
        let mut options = AcOptions::empty();
        if self.with_audio {
            options |= AcOptions::WITH_AUDIO;
        }
        if self.with_rp188 {
            options |= AcOptions::WITH_RP188;
        }
        if self.with_anc {
            options |= AcOptions::WITH_ANC;
        }
        options
    }
}

fn allocate_slots<D: Driver>(
    card: &CoraxCard<D>,
    config: &SessionConfig,
) -> Result<Vec<FrameSlot>> {
    let video_bytes =
        format::video_write_size(config.video_format, config.pixel_format, config.vanc_mode);
    let audio_bytes = if config.with_audio { audio::AUDIO_BYTES_MAX } else { 0 };
    let (anc_f1, anc_f2) = if config.with_anc {
        let (f1, f2) = anc::buffer_sizes(card)?;
        (f1 as usize, f2 as usize)
    } else {
        (0, 0)
    };
    Ok((0..config.ring_slots)
        .map(|_| FrameSlot::with_sizes(video_bytes, audio_bytes, anc_f1, anc_f2))
        .collect())
}

fn configure_channel<D: Driver>(card: &CoraxCard<D>, config: &SessionConfig) -> Result<AudioSystemBinding> {
    if let Some(signature) = config.app_signature {
        card.acquire(signature, std::process::id())?;
    }
    let saved_task_mode = card.task_mode()?;
    card.enable_channel(config.channel)?;
    card.set_video_format(config.channel, config.video_format)?;
    card.set_pixel_format(config.channel, config.pixel_format)?;
    card.set_vanc_mode(config.channel, config.vanc_mode)?;
    let audio_system = if config.with_audio {
        card.audio_system_for_channel(config.channel)
    } else {
        None
    };
    Ok(AudioSystemBinding { audio_system, saved_task_mode })
}

struct AudioSystemBinding {
    audio_system: Option<AudioSystem>,
    saved_task_mode: u32,
}

fn teardown<D: Driver>(card: &CoraxCard<D>, config: &SessionConfig, saved_task_mode: u32) {
    let _ = card.set_task_mode(saved_task_mode);
    if let Some(signature) = config.app_signature {
        let _ = card.release(signature);
    }
}

/// A running capture: a producer thread transferring frames off the card
/// and a consumer thread handing each published slot to a callback.
pub struct CaptureSession<D: Driver + 'static> {
    card: Arc<CoraxCard<D>>,
    config: SessionConfig,
    abort: Arc<AbortFlag>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
    saved_task_mode: u32,
}

impl<D: Driver + 'static> CaptureSession<D> {
    /// Configure the channel, route the input, start AutoCirculate, and
    /// spawn the producer/consumer pair. `on_frame` runs on the consumer
    /// thread for every captured frame.
    pub fn start(
        card: Arc<CoraxCard<D>>,
        config: SessionConfig,
        mut on_frame: impl FnMut(&FrameSlot) + Send + 'static,
    ) -> Result<CaptureSession<D>> {
        let binding = configure_channel(&card, &config)?;
        if card.caps().bidirectional_sdi {
            card.set_sdi_transmit_enable(config.channel, false)?;
        }
        card.apply_signal_route(&router::simple_capture_connections(config.channel), false)?;
        if let Some(system) = binding.audio_system {
            card.setup_audio_capture(system, config.channel)?;
        }

        let abort = Arc::new(AbortFlag::new());
        let slots = allocate_slots(&card, &config)?;
        let ring = Arc::new(FrameRing::new(slots, abort.clone()));

        card.driver().ac_stop(config.channel).ok();
        card.ac_init_for_input(
            config.channel,
            config.frame_count,
            binding.audio_system,
            config.options(),
            None,
        )?;
        card.ac_start(config.channel)?;

        let producer = {
            let card = card.clone();
            let ring = ring.clone();
            let abort = abort.clone();
            let channel = config.channel;
            std::thread::spawn(move || capture_frames(&card, channel, &ring, &abort))
        };
        let consumer = {
            let ring = ring.clone();
            std::thread::spawn(move || {
                while let Ok(slot) = ring.start_consume() {
                    on_frame(&slot);
                    ring.end_consume(slot);
                }
            })
        };

        log::info!(
            target: "capture",
            "{}: capturing {} / {:?}",
            config.channel,
            config.video_format,
            config.pixel_format,
        );
        Ok(CaptureSession {
            card,
            config,
            abort,
            producer: Some(producer),
            consumer: Some(consumer),
            saved_task_mode: binding.saved_task_mode,
        })
    }

    /// Live AutoCirculate counters.
    pub fn status(&self) -> Result<AcStatus> {
        self.card.ac_get_status(self.config.channel)
    }

    /// Raise the abort flag, join both threads, stop the engine.
    pub fn quit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.abort.raise();
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
        let _ = self.card.ac_stop(self.config.channel);
        teardown(&self.card, &self.config, self.saved_task_mode);
        log::info!(target: "capture", "{}: capture ended", self.config.channel);
    }
}

impl<D: Driver + 'static> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if self.producer.is_some() || self.consumer.is_some() {
            self.shutdown();
        }
    }
}

/// The capture producer loop: poll status, transfer every ready frame into
/// a ring slot, otherwise sleep until the next input vertical.
fn capture_frames<D: Driver>(
    card: &CoraxCard<D>,
    channel: Channel,
    ring: &FrameRing,
    abort: &AbortFlag,
) {
    let mut pending: Option<FrameSlot> = None;
    while !abort.is_raised() {
        let Ok(status) = card.ac_get_status(channel) else {
            break;
        };
        if !(status.is_running() && status.has_available_input_frame()) {
            let _ = card.wait_for_input_vbi(channel, 1, abort);
            continue;
        }
        let mut slot = match pending.take() {
            Some(slot) => slot,
            None => match ring.start_produce() {
                Ok(slot) => slot,
                Err(_) => break,
            },
        };
        let mut xfer = AcTransfer {
            video: &mut slot.video,
            audio: Some(&mut slot.audio),
            anc_f1: Some(&mut slot.anc_f1),
            anc_f2: Some(&mut slot.anc_f2),
            timecodes: &mut slot.timecodes,
        };
        match card.ac_transfer(channel, &mut xfer) {
            Ok(info) => {
                slot.audio_bytes = info.audio_bytes;
                slot.anc_f1_bytes = info.anc_f1_bytes;
                slot.anc_f2_bytes = info.anc_f2_bytes;
                ring.end_produce(slot);
            }
            Err(Error::NoFrame) => {
                // raced the interrupt; hold the slot and wait
                pending = Some(slot);
                let _ = card.wait_for_input_vbi(channel, 1, abort);
            }
            Err(Error::Aborted) => break,
            Err(err) => {
                log::error!(target: "capture", "{}: transfer failed: {}", channel, err);
                pending = Some(slot);
                let _ = card.wait_for_input_vbi(channel, 1, abort);
            }
        }
    }
}

/// A running playout: a producer thread filling slots from a generator and
/// a consumer thread transferring them onto the card.
pub struct PlayoutSession<D: Driver + 'static> {
    card: Arc<CoraxCard<D>>,
    config: SessionConfig,
    abort: Arc<AbortFlag>,
    producer: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
    saved_task_mode: u32,
}

impl<D: Driver + 'static> PlayoutSession<D> {
    /// Configure the channel, start AutoCirculate, and spawn the thread
    /// pair. `fill_frame` runs on the producer thread; returning `false`
    /// ends the stream.
    pub fn start(
        card: Arc<CoraxCard<D>>,
        config: SessionConfig,
        mut fill_frame: impl FnMut(&mut FrameSlot) -> bool + Send + 'static,
    ) -> Result<PlayoutSession<D>> {
        let binding = configure_channel(&card, &config)?;
        if let Some(system) = binding.audio_system {
            card.setup_audio_playout(system)?;
        }

        let abort = Arc::new(AbortFlag::new());
        let slots = allocate_slots(&card, &config)?;
        let ring = Arc::new(FrameRing::new(slots, abort.clone()));

        card.driver().ac_stop(config.channel).ok();
        card.ac_init_for_output(
            config.channel,
            config.frame_count,
            binding.audio_system,
            config.options(),
            None,
        )?;
        card.ac_start(config.channel)?;

        let producer = {
            let ring = ring.clone();
            let abort = abort.clone();
            std::thread::spawn(move || {
                while let Ok(mut slot) = ring.start_produce() {
                    if !fill_frame(&mut slot) {
                        ring.end_consume(slot); // return unfilled and stop
                        abort.raise();
                        break;
                    }
                    ring.end_produce(slot);
                }
            })
        };
        let consumer = {
            let card = card.clone();
            let ring = ring.clone();
            let abort = abort.clone();
            let channel = config.channel;
            std::thread::spawn(move || playout_frames(&card, channel, &ring, &abort))
        };

        log::info!(
            target: "playout",
            "{}: playing {} / {:?}",
            config.channel,
            config.video_format,
            config.pixel_format,
        );
        Ok(PlayoutSession {
            card,
            config,
            abort,
            producer: Some(producer),
            consumer: Some(consumer),
            saved_task_mode: binding.saved_task_mode,
        })
    }

    pub fn status(&self) -> Result<AcStatus> {
        self.card.ac_get_status(self.config.channel)
    }

    pub fn quit(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.abort.raise();
        if let Some(handle) = self.producer.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.consumer.take() {
            let _ = handle.join();
        }
        let _ = self.card.ac_stop(self.config.channel);
        teardown(&self.card, &self.config, self.saved_task_mode);
        log::info!(target: "playout", "{}: playout ended", self.config.channel);
    }
}

impl<D: Driver + 'static> Drop for PlayoutSession<D> {
    fn drop(&mut self) {
        if self.producer.is_some() || self.consumer.is_some() {
            self.shutdown();
        }
    }
}

/// The playout consumer loop: push every published slot onto the card,
/// waiting for an output vertical when the on-card ring is full.
fn playout_frames<D: Driver>(
    card: &CoraxCard<D>,
    channel: Channel,
    ring: &FrameRing,
    abort: &AbortFlag,
) {
    while !abort.is_raised() {
        let Ok(mut slot) = ring.start_consume() else {
            break;
        };
        loop {
            let mut xfer = AcTransfer {
                video: &mut slot.video,
                audio: Some(&mut slot.audio),
                anc_f1: Some(&mut slot.anc_f1),
                anc_f2: Some(&mut slot.anc_f2),
                timecodes: &mut slot.timecodes,
            };
            match card.ac_transfer(channel, &mut xfer) {
                Ok(_) => break,
                Err(Error::NoFrame) => {
                    // on-card ring full; wait for a scanout
                    let _ = card.wait_for_output_vbi(channel, 1, abort);
                    if abort.is_raised() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        ring.end_consume(slot);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimDriver;
    use corax_regs::DeviceId;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{Duration, Instant};

    fn sd_config(channel: Channel) -> SessionConfig {
        SessionConfig::new(channel, VideoFormat::SD_525I_2997, PixelFormat::Ycbcr8)
    }

    fn wait_until(mut done: impl FnMut() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !done() {
            assert!(Instant::now() < deadline, "timed out");
            std::thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn capture_session_streams_frames_to_the_consumer() {
        let driver = Arc::new(SimDriver::new(DeviceId::Corax88));
        let card = Arc::new(CoraxCard::open(driver.clone()).unwrap());
        let _clock = driver.start_clock(Duration::from_millis(2));

        let consumed = Arc::new(AtomicU64::new(0));
        let audio_seen = Arc::new(AtomicU64::new(0));
        let session = {
            let consumed = consumed.clone();
            let audio_seen = audio_seen.clone();
            CaptureSession::start(card.clone(), sd_config(Channel::CH1), move |slot| {
                consumed.fetch_add(1, Ordering::SeqCst);
                audio_seen.store(slot.audio_bytes as u64, Ordering::SeqCst);
            })
            .unwrap()
        };

        wait_until(|| consumed.load(Ordering::SeqCst) >= 50);
        let status = session.status().unwrap();
        assert!(status.frames_processed >= 50);
        session.quit();

        // 29.97 cadence, 16 channels, 4 bytes
        let audio = audio_seen.load(Ordering::SeqCst);
        assert!((102_464..=102_528).contains(&audio), "{}", audio);
        // the session released the engine
        assert!(card.ac_get_status(Channel::CH1).unwrap().is_stopped()
            || card.ac_get_status(Channel::CH1).unwrap().state == 5);
    }

    #[test]
    fn capture_session_survives_a_slow_consumer() {
        let driver = Arc::new(SimDriver::new(DeviceId::Corax88));
        let card = Arc::new(CoraxCard::open(driver.clone()).unwrap());
        let _clock = driver.start_clock(Duration::from_millis(1));

        let consumed = Arc::new(AtomicU64::new(0));
        let session = {
            let consumed = consumed.clone();
            CaptureSession::start(card.clone(), sd_config(Channel::CH1), move |_slot| {
                std::thread::sleep(Duration::from_millis(10));
                consumed.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap()
        };

        wait_until(|| {
            session.status().map(|s| s.frames_processed + s.frames_dropped >= 100).unwrap_or(false)
        });
        let status = session.status().unwrap();
        session.quit();
        // the slow consumer forces drops, and nothing goes unaccounted
        assert!(status.frames_dropped > 0);
        assert!(status.frames_processed > 0);
    }

    #[test]
    fn playout_session_pushes_generated_frames() {
        let driver = Arc::new(SimDriver::new(DeviceId::Corax88));
        let card = Arc::new(CoraxCard::open(driver.clone()).unwrap());
        let _clock = driver.start_clock(Duration::from_millis(2));

        let generated = Arc::new(AtomicU64::new(0));
        let session = {
            let generated = generated.clone();
            let mut shade = 0u8;
            PlayoutSession::start(card.clone(), sd_config(Channel::CH2), move |slot| {
                shade = shade.wrapping_add(1);
                slot.video.fill(shade);
                generated.fetch_add(1, Ordering::SeqCst);
                true
            })
            .unwrap()
        };

        wait_until(|| session.status().map(|s| s.frames_processed >= 30).unwrap_or(false));
        session.quit();
        assert!(generated.load(Ordering::SeqCst) >= 30);
    }

    #[test]
    fn quit_joins_quickly_even_when_idle() {
        let driver = Arc::new(SimDriver::new(DeviceId::Corax44));
        let card = Arc::new(CoraxCard::open(driver.clone()).unwrap());
        // no clock at all; every wait must fall through to the abort flag
        let session =
            CaptureSession::start(card, sd_config(Channel::CH1), |_slot| {}).unwrap();
        let started = Instant::now();
        session.quit();
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
