use std::sync::Arc;

use coraxlib::sim::SimDriver;
use coraxlib::{CoraxCard, DeviceId};

#[derive(clap::Args, Debug, Clone)]
pub struct DeviceArgs {
    /// Device model to run against: corax88, corax44 or coraxlp.
    #[arg(short, long, default_value = "corax88")]
    device: String,
}

impl DeviceArgs {
    pub fn device_id(&self) -> anyhow::Result<DeviceId> {
        match self.device.to_lowercase().as_str() {
            "corax88" | "88" => Ok(DeviceId::Corax88),
            "corax44" | "44" => Ok(DeviceId::Corax44),
            "coraxlp" | "lp" => Ok(DeviceId::CoraxLp),
            other => anyhow::bail!("unknown device model '{}'", other),
        }
    }

    /// Open the software device. A kernel-backed driver slots in behind the
    /// same gateway trait.
    pub fn open(&self) -> anyhow::Result<(Arc<SimDriver>, Arc<CoraxCard<Arc<SimDriver>>>)> {
        let driver = Arc::new(SimDriver::new(self.device_id()?));
        let card = CoraxCard::open(driver.clone())
            .map_err(|err| anyhow::anyhow!("open failed: {}", err))?;
        Ok((driver, Arc::new(card)))
    }
}

pub fn progress_bar(frames: u64) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new(frames);
    bar.set_style(
        indicatif::ProgressStyle::with_template(
            "({spinner}) [{wide_bar}] {pos}/{len} frames ({per_sec}) {msg}",
        )
        .unwrap()
        .progress_chars("=> "),
    );
    bar
}
