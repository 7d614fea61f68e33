use corax_regs::catalog::catalog;
use coraxlib::router;
use coraxlib::Channel;

#[derive(clap::Args, Debug)]
pub struct RouteOpts {
    #[command(flatten)]
    device: crate::common::DeviceArgs,

    /// Apply the canonical 4K two-sample-interleave capture wiring first.
    #[arg(long)]
    tsi: bool,

    /// Apply the canonical 4K squares capture wiring first.
    #[arg(long)]
    squares: bool,

    /// Connect INPUT to OUTPUT (crosspoint display names, e.g. FB1 SDIIn1).
    #[arg(long, num_args = 2, value_names = ["INPUT", "OUTPUT"])]
    connect: Option<Vec<String>>,

    /// Clear the whole routing table first.
    #[arg(long)]
    clear: bool,

    /// Trace the path feeding this channel's SDI output (1-based).
    #[arg(long)]
    trace: Option<u8>,
}

impl crate::ToolRun for RouteOpts {
    fn run(&self) -> anyhow::Result<()> {
        let (_driver, card) = self.device.open()?;

        if self.clear {
            card.clear_routing().map_err(|err| anyhow::anyhow!("clear failed: {}", err))?;
        }
        if self.tsi {
            let failures = card
                .apply_signal_route(&router::tsi_capture_connections(), false)
                .map_err(|err| anyhow::anyhow!("route failed: {}", err))?;
            if failures != 0 {
                println!("{} connection(s) failed", failures);
            }
        }
        if self.squares {
            let failures = card
                .apply_signal_route(&router::squares_capture_connections(), false)
                .map_err(|err| anyhow::anyhow!("route failed: {}", err))?;
            if failures != 0 {
                println!("{} connection(s) failed", failures);
            }
        }
        if let Some(pair) = &self.connect {
            let input = catalog()
                .input_xpt_by_name(&pair[0])
                .ok_or_else(|| anyhow::anyhow!("unknown input crosspoint '{}'", pair[0]))?;
            let output = catalog()
                .output_xpt_by_name(&pair[1])
                .ok_or_else(|| anyhow::anyhow!("unknown output crosspoint '{}'", pair[1]))?;
            card.connect(input, output)
                .map_err(|err| anyhow::anyhow!("connect failed: {}", err))?;
        }

        if let Some(channel) = self.trace {
            let channel = Channel::new(channel.saturating_sub(1))
                .ok_or_else(|| anyhow::anyhow!("channel out of range"))?;
            let routing = card
                .routing_for_channel(channel)
                .map_err(|err| anyhow::anyhow!("trace failed: {}", err))?;
            println!("{} output path:", channel);
            for (input, output) in routing {
                println!("  {} <== {}", input, output);
            }
            return Ok(());
        }

        let connections =
            card.get_connections().map_err(|err| anyhow::anyhow!("read failed: {}", err))?;
        if connections.is_empty() {
            println!("no connections");
        }
        for (input, output) in connections {
            println!("{} <== {}", input, output);
        }
        Ok(())
    }
}
