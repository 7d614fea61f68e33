use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use coraxlib::format::{FrameRate, PixelFormat, Standard, VideoFormat};
use coraxlib::stream::{CaptureSession, SessionConfig};
use coraxlib::Channel;

#[derive(clap::Args, Debug)]
pub struct CaptureOpts {
    #[command(flatten)]
    device: crate::common::DeviceArgs,

    /// Channel to capture on (1-based).
    #[arg(short, long, default_value_t = 1)]
    channel: u8,

    /// Number of frames to capture.
    #[arg(short, long, default_value_t = 300)]
    frames: u64,

    /// Video format, e.g. 1080i59.94, 1080p25, 720p60.
    #[arg(long, default_value = "1080i59.94")]
    format: String,

    /// Pixel format: ycbcr10, ycbcr8, rgba8.
    #[arg(long, default_value = "ycbcr10")]
    pixel: String,

    /// Capture without audio.
    #[arg(long)]
    no_audio: bool,

    /// Capture without ancillary data.
    #[arg(long)]
    no_anc: bool,
}

fn parse_format(name: &str) -> anyhow::Result<VideoFormat> {
    let format = match name {
        "525i59.94" => VideoFormat::SD_525I_2997,
        "625i50" => VideoFormat::SD_625I_2500,
        "720p59.94" => VideoFormat::HD_720P_5994,
        "720p60" => VideoFormat::HD_720P_6000,
        "1080i50" => VideoFormat::HD_1080I_2500,
        "1080i59.94" => VideoFormat::HD_1080I_2997,
        "1080p24" => VideoFormat::HD_1080P_2400,
        "1080p25" => VideoFormat::HD_1080P_2500,
        "1080p29.97" => VideoFormat::HD_1080P_2997,
        "1080p50" => VideoFormat::HD_1080P_5000,
        "1080p59.94" => VideoFormat::HD_1080P_5994,
        "1080p60" => VideoFormat::HD_1080P_6000,
        "2160p60" | "3840x2160p60" => VideoFormat::UHD_2160P_6000,
        other => anyhow::bail!("unknown video format '{}'", other),
    };
    Ok(format)
}

fn parse_pixel(name: &str) -> anyhow::Result<PixelFormat> {
    let pixel = match name {
        "ycbcr10" => PixelFormat::Ycbcr10,
        "ycbcr8" => PixelFormat::Ycbcr8,
        "rgba8" => PixelFormat::Rgba8,
        "rgb10" => PixelFormat::Rgb10Dpx,
        other => anyhow::bail!("unknown pixel format '{}'", other),
    };
    Ok(pixel)
}

impl crate::ToolRun for CaptureOpts {
    fn run(&self) -> anyhow::Result<()> {
        let format = parse_format(&self.format)?;
        let pixel = parse_pixel(&self.pixel)?;
        let channel = Channel::new(self.channel.saturating_sub(1))
            .ok_or_else(|| anyhow::anyhow!("channel out of range"))?;
        if matches!(format.standard, Standard::Uhd3840 | Standard::Uhd3840Hfr) {
            anyhow::bail!("quad capture needs the TSI route; use `route --tsi` and channel 1");
        }

        let (driver, card) = self.device.open()?;
        let _clock = driver.start_clock(format.frame_rate.frame_duration());

        let mut config = SessionConfig::new(channel, format, pixel);
        config.with_audio = !self.no_audio;
        config.with_anc = !self.no_anc;
        config.app_signature = Some(u32::from_be_bytes(*b"CXTL"));

        let bar = crate::common::progress_bar(self.frames);
        let consumed = Arc::new(AtomicU64::new(0));
        let session = {
            let consumed = consumed.clone();
            let bar = bar.clone();
            CaptureSession::start(card.clone(), config, move |slot| {
                consumed.fetch_add(1, Ordering::SeqCst);
                bar.inc(1);
                if let Some(tc) = slot.timecodes.values().next() {
                    bar.set_message(tc.to_string());
                }
            })
            .map_err(|err| anyhow::anyhow!("capture setup failed: {}", err))?
        };

        while consumed.load(Ordering::SeqCst) < self.frames {
            std::thread::sleep(frame_poll(format.frame_rate));
        }
        let status = session.status().map_err(|err| anyhow::anyhow!("status failed: {}", err))?;
        session.quit();
        bar.finish();

        println!(
            "{} frames processed, {} dropped, buffer level {}",
            status.frames_processed, status.frames_dropped, status.buffer_level,
        );
        Ok(())
    }
}

fn frame_poll(rate: FrameRate) -> std::time::Duration {
    rate.frame_duration() / 2
}
