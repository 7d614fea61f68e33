use std::collections::BTreeSet;

use corax_regs::catalog::{catalog, MatchStyle};

#[derive(clap::Args, Debug)]
pub struct RegsOpts {
    #[command(flatten)]
    device: crate::common::DeviceArgs,

    /// Only registers in this class (e.g. Routing, Audio, Anc, Channel3).
    #[arg(short, long)]
    class: Option<String>,

    /// Only registers whose name matches.
    #[arg(short, long)]
    name: Option<String>,

    /// How --name matches: exact, contains, starts-with, ends-with.
    #[arg(long, default_value = "contains")]
    match_style: String,

    /// Also list every class each register belongs to.
    #[arg(long)]
    classes: bool,
}

impl crate::ToolRun for RegsOpts {
    fn run(&self) -> anyhow::Result<()> {
        let (_driver, card) = self.device.open()?;
        let cat = catalog();

        let mut regs: BTreeSet<u32> = match &self.class {
            Some(class) => cat.registers_for_class(class),
            None => cat.defined_registers().collect(),
        };
        if let Some(name) = &self.name {
            let style = match self.match_style.as_str() {
                "exact" => MatchStyle::Exact,
                "starts-with" => MatchStyle::StartsWith,
                "ends-with" => MatchStyle::EndsWith,
                _ => MatchStyle::Contains,
            };
            let by_name = cat.registers_with_name(name, style);
            regs = regs.intersection(&by_name).copied().collect();
        }

        let device = card.device_id();
        let mut shown = 0usize;
        for reg in regs {
            // skip registers this model doesn't implement
            let Ok(value) = card.read_reg(reg) else {
                continue;
            };
            let decoded = cat.decode(reg, value, device);
            print!("{:>5}  {:<34} {:#010x}", reg, cat.register_name(reg), value);
            if !decoded.is_empty() {
                print!("  {}", decoded);
            }
            if self.classes {
                print!("  [{}]", cat.register_classes(reg).join(", "));
            }
            println!();
            shown += 1;
        }
        println!("{} register(s) on {}", shown, device);
        Ok(())
    }
}
