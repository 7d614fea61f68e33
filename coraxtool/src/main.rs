mod audit;
mod capture;
mod common;
mod regs;
mod route;

trait ToolRun {
    fn run(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

#[derive(clap::Parser, Debug)]
#[command(version, about, long_about = None)]
struct ToolOptions {
    #[command(subcommand)]
    command: ToolCommand,
}

#[derive(clap::Subcommand, Debug)]
enum ToolCommand {
    /// Dump registers with decoded values.
    Regs(regs::RegsOpts),
    /// Audit on-card SDRAM ownership.
    Audit(audit::AuditOpts),
    /// Show or edit the crosspoint routing table.
    Route(route::RouteOpts),
    /// Run a capture against the software device.
    Capture(capture::CaptureOpts),
}

impl ToolRun for ToolCommand {
    fn run(&self) -> anyhow::Result<()> {
        use ToolCommand::*;
        match self {
            Regs(o) => o.run(),
            Audit(o) => o.run(),
            Route(o) => o.run(),
            Capture(o) => o.run(),
        }
    }
}

fn main() -> anyhow::Result<()> {
    use clap::Parser;
    env_logger::init();
    let opts = ToolOptions::parse();

    opts.command.run()
}
