//! The signal router: crosspoint connections, ROM validation, and the
//! canonical multi-link route tables.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use corax_regs::catalog::{catalog, CLASS_ROUTING};
use corax_regs::regs::{XPT_CELL_MASKS, XPT_CELL_SHIFTS};
use corax_regs::rom;
use corax_regs::xpt::{InputXpt, OutputXpt, Widget};
use corax_regs::Channel;

use crate::caps::BoolCap;
use crate::device::CoraxCard;
use crate::driver::{Driver, RegisterRead};
use crate::{Error, Result};

/// A routing table: each input crosspoint's upstream source.
pub type Connections = BTreeMap<InputXpt, OutputXpt>;

impl<D: Driver> CoraxCard<D> {
    /// The selector cell for an input crosspoint, if this device has it.
    fn xpt_cell(&self, input: InputXpt) -> Result<(u32, u8)> {
        let (reg, ndx) = catalog().xpt_cell(input).ok_or(Error::UnsupportedOnDevice)?;
        if reg > self.caps().max_register {
            return Err(Error::UnsupportedOnDevice);
        }
        Ok((reg, ndx))
    }

    /// The input crosspoints this device implements, in ID order.
    fn device_input_xpts(&self) -> Vec<InputXpt> {
        let mut inputs = BTreeSet::new();
        for widget in self.widgets() {
            for input in widget.inputs() {
                if self.xpt_cell(input).is_ok() {
                    inputs.insert(input);
                }
            }
        }
        inputs.into_iter().collect()
    }

    /// What an input crosspoint is currently connected to; `BLACK` when
    /// disconnected.
    pub fn get_connected_output(&self, input: InputXpt) -> Result<OutputXpt> {
        let (reg, ndx) = self.xpt_cell(input)?;
        let value =
            self.read_register(reg, XPT_CELL_MASKS[ndx as usize], XPT_CELL_SHIFTS[ndx as usize])?;
        Ok(OutputXpt(value as u8))
    }

    /// Every input crosspoint currently fed by an output. Linear in the
    /// device's input crosspoint count.
    pub fn get_connected_inputs(&self, output: OutputXpt) -> Result<BTreeSet<InputXpt>> {
        let mut connected = BTreeSet::new();
        if output == OutputXpt::BLACK {
            return Ok(connected);
        }
        for input in self.device_input_xpts() {
            if self.get_connected_output(input)? == output {
                connected.insert(input);
            }
        }
        Ok(connected)
    }

    pub fn is_connected(&self, input: InputXpt) -> Result<bool> {
        Ok(self.get_connected_output(input)? != OutputXpt::BLACK)
    }

    pub fn is_connected_to(&self, input: InputXpt, output: OutputXpt) -> Result<bool> {
        Ok(self.get_connected_output(input)? == output)
    }

    /// Ask the route ROM about a connection. `None` when this device
    /// carries no ROM and the answer cannot be trusted.
    fn rom_can_connect(&self, input: InputXpt, output: OutputXpt) -> Result<Option<bool>> {
        if !self.is_supported(BoolCap::RouteRom) {
            return Ok(None);
        }
        self.xpt_cell(input)?;
        if output == OutputXpt::BLACK {
            return Ok(Some(true));
        }
        if output.0 >= OutputXpt::LIMIT {
            return Ok(Some(false));
        }
        let reads: Vec<RegisterRead> =
            rom::rom_registers(input).into_iter().map(RegisterRead::full).collect();
        let words = self.driver().read_registers(&reads)?;
        let bitmap = [words[0], words[1], words[2], words[3]];
        Ok(Some(rom::is_legal(&bitmap, output)))
    }

    /// Whether the ROM lists `output` as a legal source for `input`. On
    /// devices without a ROM the answer is unknowable and reported as
    /// `false`.
    pub fn can_connect(&self, input: InputXpt, output: OutputXpt) -> Result<bool> {
        match self.rom_can_connect(input, output)? {
            Some(answer) => Ok(answer),
            None => {
                log::debug!(
                    target: "routing",
                    "{}: no route ROM, cannot vouch for {} <== {}",
                    self.device_id(),
                    input,
                    output,
                );
                Ok(false)
            }
        }
    }

    /// Connect an input crosspoint to an output, validating against the
    /// route ROM when the device has one. Connecting to `BLACK` is always
    /// legal and identical to [CoraxCard::disconnect].
    ///
    /// Under a deferred write-latch mode the new selector reads back only
    /// once the field or frame boundary has passed.
    pub fn connect(&self, input: InputXpt, output: OutputXpt) -> Result<()> {
        self.connect_inner(input, output, true)
    }

    /// [CoraxCard::connect] without the ROM pre-check.
    pub fn connect_without_validation(&self, input: InputXpt, output: OutputXpt) -> Result<()> {
        self.connect_inner(input, output, false)
    }

    fn connect_inner(&self, input: InputXpt, output: OutputXpt, validate: bool) -> Result<()> {
        if output == OutputXpt::BLACK {
            return self.disconnect(input);
        }
        let (reg, ndx) = self.xpt_cell(input)?;
        if validate {
            if let Some(false) = self.rom_can_connect(input, output)? {
                log::error!(
                    target: "routing",
                    "{}: unsupported route {} <== {} (reg {} cell {})",
                    self.device_id(),
                    input,
                    output,
                    reg,
                    ndx,
                );
                return Err(Error::IllegalRoute { input, output });
            }
        }
        let previous = self.read_register(
            reg,
            XPT_CELL_MASKS[ndx as usize],
            XPT_CELL_SHIFTS[ndx as usize],
        )?;
        self.write_register(
            reg,
            output.0 as u32,
            XPT_CELL_MASKS[ndx as usize],
            XPT_CELL_SHIFTS[ndx as usize],
        )?;
        if previous != output.0 as u32 {
            log::info!(
                target: "routing",
                "{}: connected {} <== {}{}",
                self.device_id(),
                input,
                output,
                if previous == 0 {
                    " -- was disconnected".to_string()
                } else {
                    format!(" -- was from {}", OutputXpt(previous as u8))
                },
            );
        }
        Ok(())
    }

    /// Write `BLACK` into an input's selector cell. Idempotent.
    pub fn disconnect(&self, input: InputXpt) -> Result<()> {
        let (reg, ndx) = self.xpt_cell(input)?;
        self.write_register(
            reg,
            OutputXpt::BLACK.0 as u32,
            XPT_CELL_MASKS[ndx as usize],
            XPT_CELL_SHIFTS[ndx as usize],
        )
    }

    /// Zero every routing register this device implements.
    pub fn clear_routing(&self) -> Result<()> {
        let mut tally = 0u32;
        for reg in catalog().registers_for_class(CLASS_ROUTING) {
            if reg > self.caps().max_register {
                continue;
            }
            tally += self.read_reg(reg)?;
            self.write_reg(reg, 0)?;
        }
        if tally != 0 {
            log::info!(target: "routing", "{}: routing cleared", self.device_id());
        }
        Ok(())
    }

    /// Apply a batch of connections, optionally replacing the whole table.
    /// Individual failures don't abort the batch; the failure count comes
    /// back.
    pub fn apply_signal_route(&self, connections: &Connections, replace: bool) -> Result<u32> {
        if replace {
            self.clear_routing()?;
        }
        let validate = self.is_supported(BoolCap::RouteRom);
        let mut failures = 0;
        for (input, output) in connections {
            let result = if validate {
                self.connect(*input, *output)
            } else {
                self.connect_without_validation(*input, *output)
            };
            if let Err(err) = result {
                log::warn!(target: "routing", "{}: {}", self.device_id(), err);
                failures += 1;
            }
        }
        Ok(failures)
    }

    /// Disconnect a batch of connections; returns the failure count.
    pub fn remove_connections(&self, connections: &Connections) -> Result<u32> {
        let mut failures = 0;
        for input in connections.keys() {
            if self.disconnect(*input).is_err() {
                failures += 1;
            }
        }
        Ok(failures)
    }

    /// Snapshot the whole routing table: every connected input crosspoint
    /// and its source.
    pub fn get_connections(&self) -> Result<Connections> {
        let inputs = self.device_input_xpts();
        let reads: Vec<RegisterRead> = inputs
            .iter()
            .map(|input| {
                let (reg, ndx) = catalog().xpt_cell(*input).expect("device input has a cell");
                RegisterRead {
                    num: reg,
                    mask: XPT_CELL_MASKS[ndx as usize],
                    shift: XPT_CELL_SHIFTS[ndx as usize],
                }
            })
            .collect();
        let values = self.driver().read_registers(&reads)?;
        let mut connections = Connections::new();
        for (input, value) in inputs.into_iter().zip(values) {
            if value != 0 {
                connections.insert(input, OutputXpt(value as u8));
            }
        }
        Ok(connections)
    }

    /// Trace the signal path feeding a channel's SDI output, walking
    /// backward across widget boundaries.
    pub fn routing_for_channel(&self, channel: Channel) -> Result<Connections> {
        let mut routing = Connections::new();
        let mut queue: VecDeque<InputXpt> = VecDeque::new();
        queue.push_back(InputXpt::sdi_out(channel));

        while let Some(input) = queue.pop_front() {
            let Ok(output) = self.get_connected_output(input) else {
                continue;
            };
            if output == OutputXpt::BLACK || routing.contains_key(&input) {
                continue;
            }
            routing.insert(input, output);
            let Some(widget) = Widget::for_output(output, self.widgets()) else {
                continue;
            };
            for upstream in widget.inputs() {
                queue.push_back(upstream);
            }
        }
        log::debug!(
            target: "routing",
            "{}: {} routing has {} connection(s)",
            self.device_id(),
            channel,
            routing.len(),
        );
        Ok(routing)
    }
}

/// The canonical two-sample-interleave UHD capture wiring for channels 1/2:
/// four SDI inputs into the 425 muxes, mux outputs into the paired
/// framestore A/B inputs.
pub fn tsi_capture_connections() -> Connections {
    use InputXpt as I;
    use OutputXpt as O;
    Connections::from([
        (I::MUX425_1A, O::SDI_IN1),
        (I::MUX425_1B, O::SDI_IN2),
        (I::MUX425_2A, O::SDI_IN3),
        (I::MUX425_2B, O::SDI_IN4),
        (I::FRAME_BUFFER1, O::MUX425_1A_YUV),
        (I::FRAME_BUFFER1_B, O::MUX425_1B_YUV),
        (I::FRAME_BUFFER2, O::MUX425_2A_YUV),
        (I::FRAME_BUFFER2_B, O::MUX425_2B_YUV),
    ])
}

/// The squares UHD capture wiring: each SDI input carries one quadrant
/// straight into its framestore.
pub fn squares_capture_connections() -> Connections {
    use InputXpt as I;
    use OutputXpt as O;
    Connections::from([
        (I::FRAME_BUFFER1, O::SDI_IN1),
        (I::FRAME_BUFFER2, O::SDI_IN2),
        (I::FRAME_BUFFER3, O::SDI_IN3),
        (I::FRAME_BUFFER4, O::SDI_IN4),
    ])
}

/// Single-link capture wiring: one SDI input into one framestore.
pub fn simple_capture_connections(channel: Channel) -> Connections {
    Connections::from([(InputXpt::frame_buffer(channel), OutputXpt::sdi_in(channel))])
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimDriver;
    use corax_regs::regs::{GlobalControl, WriteMode};
    use corax_regs::DeviceId;

    fn card(id: DeviceId) -> CoraxCard<SimDriver> {
        CoraxCard::open(SimDriver::new(id)).unwrap()
    }

    #[test]
    fn connect_round_trips_every_legal_pair() {
        // every (input, output) pair the ROM allows must read back intact
        let card = card(DeviceId::Corax88);
        for input in catalog().input_xpts() {
            if card.xpt_cell(input).is_err() {
                continue;
            }
            for raw in [
                OutputXpt::SDI_IN1,
                OutputXpt::CSC1_VID_YUV,
                OutputXpt::MUX425_3B_YUV,
                OutputXpt::FRAME_BUFFER5_RGB,
            ] {
                if !card.can_connect(input, raw).unwrap() {
                    continue;
                }
                card.connect(input, raw).unwrap();
                assert_eq!(raw, card.get_connected_output(input).unwrap(), "input {}", input);
            }
        }
    }

    #[test]
    fn disconnect_is_idempotent() {
        let card = card(DeviceId::Corax88);
        card.connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap();
        card.disconnect(InputXpt::FRAME_BUFFER1).unwrap();
        assert_eq!(OutputXpt::BLACK, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
        card.disconnect(InputXpt::FRAME_BUFFER1).unwrap();
        assert_eq!(OutputXpt::BLACK, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
    }

    #[test]
    fn rom_and_connect_agree_everywhere() {
        // on a ROM device, validated connect succeeds exactly when the ROM
        // says it can
        let card = card(DeviceId::Corax44);
        for input in catalog().input_xpts() {
            if card.xpt_cell(input).is_err() {
                continue;
            }
            for raw in 1..OutputXpt::LIMIT {
                let output = OutputXpt(raw);
                let legal = card.can_connect(input, output).unwrap();
                let connected = card.connect(input, output).is_ok();
                assert_eq!(legal, connected, "{} <== {}", input, output);
            }
        }
    }

    #[test]
    fn illegal_route_leaves_the_register_alone() {
        let card = card(DeviceId::Corax88);
        card.connect(InputXpt::SDI_OUT1, OutputXpt::CSC1_VID_YUV).unwrap();
        // a framestore may not feed an SDI output directly on this family
        assert_eq!(
            Err(Error::IllegalRoute {
                input: InputXpt::SDI_OUT1,
                output: OutputXpt::FRAME_BUFFER1_YUV
            }),
            card.connect(InputXpt::SDI_OUT1, OutputXpt::FRAME_BUFFER1_YUV)
        );
        assert_eq!(
            OutputXpt::CSC1_VID_YUV,
            card.get_connected_output(InputXpt::SDI_OUT1).unwrap()
        );
    }

    #[test]
    fn legal_route_applies() {
        let card = card(DeviceId::Corax88);
        card.connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap();
        assert_eq!(OutputXpt::SDI_IN1, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
    }

    #[test]
    fn no_rom_device_skips_validation() {
        let card = card(DeviceId::CoraxLp);
        assert!(!card.can_connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap());
        // but connect still lands, unchecked
        card.connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap();
        assert_eq!(OutputXpt::SDI_IN1, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
    }

    #[test]
    fn unsupported_inputs_are_refused() {
        let card = card(DeviceId::CoraxLp);
        // group 32 sits beyond this device's register space
        assert_eq!(
            Err(Error::UnsupportedOnDevice),
            card.get_connected_output(InputXpt::MUX425_1A)
        );
    }

    #[test]
    fn connected_inputs_scan() {
        let card = card(DeviceId::Corax88);
        card.connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap();
        card.connect(InputXpt::CSC1_VID, OutputXpt::SDI_IN1).unwrap();
        card.connect(InputXpt::FRAME_BUFFER2, OutputXpt::SDI_IN2).unwrap();
        let fed = card.get_connected_inputs(OutputXpt::SDI_IN1).unwrap();
        assert_eq!(
            BTreeSet::from([InputXpt::FRAME_BUFFER1, InputXpt::CSC1_VID]),
            fed
        );
        assert!(card.get_connected_inputs(OutputXpt::BLACK).unwrap().is_empty());
    }

    #[test]
    fn replace_route_clears_first() {
        let card = card(DeviceId::Corax88);
        card.connect(InputXpt::FRAME_BUFFER3, OutputXpt::SDI_IN3).unwrap();
        let failures =
            card.apply_signal_route(&simple_capture_connections(Channel::CH1), true).unwrap();
        assert_eq!(0, failures);
        assert_eq!(OutputXpt::BLACK, card.get_connected_output(InputXpt::FRAME_BUFFER3).unwrap());
        assert_eq!(OutputXpt::SDI_IN1, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
    }

    #[test]
    fn tsi_route_shows_up_in_connections() {
        let card = card(DeviceId::Corax88);
        let failures = card.apply_signal_route(&tsi_capture_connections(), true).unwrap();
        assert_eq!(0, failures);
        assert_eq!(tsi_capture_connections(), card.get_connections().unwrap());
    }

    #[test]
    fn channel_routing_traces_across_widgets() {
        let card = card(DeviceId::Corax88);
        card.connect(InputXpt::SDI_OUT1, OutputXpt::CSC1_VID_YUV).unwrap();
        card.connect(InputXpt::CSC1_VID, OutputXpt::FRAME_BUFFER1_YUV).unwrap();
        card.connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap();
        let routing = card.routing_for_channel(Channel::CH1).unwrap();
        assert_eq!(3, routing.len());
        assert_eq!(Some(&OutputXpt::FRAME_BUFFER1_YUV), routing.get(&InputXpt::CSC1_VID));
    }

    #[test]
    fn latched_connects_read_back_after_the_frame_boundary() {
        let card = card(DeviceId::Corax88);
        let gc = GlobalControl::from(card.read_reg(0).unwrap()).with_write_mode(WriteMode::AtFrame);
        card.write_reg(0, gc.into()).unwrap();
        card.connect(InputXpt::FRAME_BUFFER1, OutputXpt::SDI_IN1).unwrap();
        // not yet latched
        assert_eq!(OutputXpt::BLACK, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
        card.driver().tick();
        assert_eq!(OutputXpt::SDI_IN1, card.get_connected_output(InputXpt::FRAME_BUFFER1).unwrap());
    }
}
