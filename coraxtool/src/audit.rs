use coraxlib::audit::SdramAuditor;
use coraxlib::driver::AcOptions;
use coraxlib::format::{PixelFormat, VideoFormat};
use coraxlib::Channel;

#[derive(clap::Args, Debug)]
pub struct AuditOpts {
    #[command(flatten)]
    device: crate::common::DeviceArgs,

    /// Treat stopped audio systems' regions as free.
    #[arg(long)]
    mark_stopped_audio_free: bool,

    /// Dump every 8 MB frame instead of coalesced regions.
    #[arg(long)]
    raw: bool,

    /// Start a demo capture ring of this many frames on channel 1 first,
    /// so the audit has something to show.
    #[arg(long)]
    demo_frames: Option<u32>,
}

impl crate::ToolRun for AuditOpts {
    fn run(&self) -> anyhow::Result<()> {
        let (driver, card) = self.device.open()?;

        if let Some(frames) = self.demo_frames {
            card.set_video_format(Channel::CH1, VideoFormat::HD_1080I_2997)
                .and_then(|_| card.set_pixel_format(Channel::CH1, PixelFormat::Ycbcr10))
                .and_then(|_| {
                    card.ac_init_for_input(Channel::CH1, frames, None, AcOptions::empty(), None)
                })
                .and_then(|_| card.ac_start(Channel::CH1))
                .map_err(|err| anyhow::anyhow!("demo capture setup failed: {}", err))?;
            driver.tick();
        }

        let auditor = SdramAuditor::assess(&card, self.mark_stopped_audio_free)
            .map_err(|err| anyhow::anyhow!("audit failed: {}", err))?;

        println!(
            "{}: {} x 8 MB frames, intrinsic frame {} MB",
            card.device_id(),
            auditor.num_frames(),
            auditor.intrinsic_bytes() / 0x10_0000,
        );
        if self.raw {
            print!("{}", auditor.raw_dump());
        } else {
            print!("{}", auditor.dump_blocks());
        }

        let regions = auditor.regions();
        if !regions.conflicting.is_empty() {
            println!("{} conflicting region(s)!", regions.conflicting.len());
        }
        Ok(())
    }
}
