//! Per-model capability tables.
//!
//! Populated once when a device is opened; decision code reads the table
//! instead of dispatching on the device ID.

use corax_regs::{DeviceId, Widget};

/// Boolean capability kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BoolCap {
    /// The device carries a connection-validation route ROM.
    RouteRom,
    /// Audio buffers stack down from the top of SDRAM.
    StackedAudio,
    /// Per-channel ancillary extractor/inserter hardware.
    CustomAnc,
    /// Per-input CRC/VPID/TRS counters.
    SdiErrorChecks,
    /// A multi-raster viewer channel beyond the video channels.
    MultiRaster,
    /// SDI connectors switch between transmit and receive.
    BidirectionalSdi,
}

/// Numeric capability kinds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NumCap {
    VideoChannels,
    AudioSystems,
    AudioChannelsPerSystem,
    SdiInputs,
    SdiOutputs,
    HdmiInputs,
    Cscs,
    Luts,
    Mixers,
    Muxes425,
    DualLinks,
}

/// The capability set of one device model.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceCaps {
    pub id: DeviceId,
    pub num_channels: u32,
    pub num_audio_systems: u32,
    pub audio_channels_per_system: u32,
    pub num_sdi_inputs: u32,
    pub num_sdi_outputs: u32,
    pub num_hdmi_inputs: u32,
    pub num_cscs: u32,
    pub num_luts: u32,
    pub num_mixers: u32,
    pub num_muxes_425: u32,
    pub num_dual_links: u32,
    pub stacked_audio: bool,
    pub has_route_rom: bool,
    pub custom_anc: bool,
    pub sdi_error_checks: bool,
    pub multi_raster: bool,
    pub bidirectional_sdi: bool,
    /// Total on-card SDRAM available for frames and audio.
    pub active_memory_bytes: u64,
    /// Highest implemented on-card register number.
    pub max_register: u32,
}

impl DeviceCaps {
    /// The capability table for a device model.
    pub fn for_device(id: DeviceId) -> DeviceCaps {
        match id {
            DeviceId::Corax88 => DeviceCaps {
                id,
                num_channels: 8,
                num_audio_systems: 8,
                audio_channels_per_system: 16,
                num_sdi_inputs: 8,
                num_sdi_outputs: 8,
                num_hdmi_inputs: 1,
                num_cscs: 8,
                num_luts: 8,
                num_mixers: 4,
                num_muxes_425: 4,
                num_dual_links: 8,
                stacked_audio: true,
                has_route_rom: true,
                custom_anc: true,
                sdi_error_checks: true,
                multi_raster: true,
                bidirectional_sdi: true,
                active_memory_bytes: 0x2000_0000, // 512 MB
                max_register: 8191,
            },
            DeviceId::Corax44 => DeviceCaps {
                id,
                num_channels: 4,
                num_audio_systems: 4,
                audio_channels_per_system: 16,
                num_sdi_inputs: 4,
                num_sdi_outputs: 4,
                num_hdmi_inputs: 1,
                num_cscs: 4,
                num_luts: 4,
                num_mixers: 2,
                num_muxes_425: 2,
                num_dual_links: 4,
                stacked_audio: true,
                has_route_rom: true,
                custom_anc: true,
                sdi_error_checks: false,
                multi_raster: false,
                bidirectional_sdi: true,
                active_memory_bytes: 0x1000_0000, // 256 MB
                max_register: 6143,
            },
            DeviceId::CoraxLp => DeviceCaps {
                id,
                num_channels: 2,
                num_audio_systems: 1,
                audio_channels_per_system: 8,
                num_sdi_inputs: 2,
                num_sdi_outputs: 2,
                num_hdmi_inputs: 0,
                num_cscs: 2,
                num_luts: 2,
                num_mixers: 1,
                num_muxes_425: 0,
                num_dual_links: 2,
                stacked_audio: false,
                has_route_rom: false,
                custom_anc: false,
                sdi_error_checks: false,
                multi_raster: false,
                bidirectional_sdi: false,
                active_memory_bytes: 0x0800_0000, // 128 MB
                max_register: 283,
            },
        }
    }

    /// The capability-query interface: booleans.
    pub fn is_supported(&self, cap: BoolCap) -> bool {
        match cap {
            BoolCap::RouteRom => self.has_route_rom,
            BoolCap::StackedAudio => self.stacked_audio,
            BoolCap::CustomAnc => self.custom_anc,
            BoolCap::SdiErrorChecks => self.sdi_error_checks,
            BoolCap::MultiRaster => self.multi_raster,
            BoolCap::BidirectionalSdi => self.bidirectional_sdi,
        }
    }

    /// The capability-query interface: counts.
    pub fn get_num_supported(&self, cap: NumCap) -> u32 {
        match cap {
            NumCap::VideoChannels => self.num_channels,
            NumCap::AudioSystems => self.num_audio_systems,
            NumCap::AudioChannelsPerSystem => self.audio_channels_per_system,
            NumCap::SdiInputs => self.num_sdi_inputs,
            NumCap::SdiOutputs => self.num_sdi_outputs,
            NumCap::HdmiInputs => self.num_hdmi_inputs,
            NumCap::Cscs => self.num_cscs,
            NumCap::Luts => self.num_luts,
            NumCap::Mixers => self.num_mixers,
            NumCap::Muxes425 => self.num_muxes_425,
            NumCap::DualLinks => self.num_dual_links,
        }
    }

    /// Number of 8 MB quanta in on-card SDRAM.
    pub fn num_8mb_frames(&self) -> u32 {
        (self.active_memory_bytes / crate::audit::EIGHT_MB as u64) as u32
    }

    /// The widget set of this model.
    pub fn widgets(&self) -> Vec<Widget> {
        let mut widgets = Vec::new();
        for n in 0..self.num_channels as u8 {
            widgets.push(Widget::FrameStore(n));
        }
        for n in 0..self.num_sdi_inputs as u8 {
            widgets.push(Widget::SdiIn(n));
        }
        for n in 0..self.num_sdi_outputs as u8 {
            widgets.push(Widget::SdiOut(n));
        }
        for n in 0..self.num_cscs as u8 {
            widgets.push(Widget::Csc(n));
        }
        for n in 0..self.num_luts as u8 {
            widgets.push(Widget::Lut(n));
        }
        for n in 0..self.num_mixers as u8 {
            widgets.push(Widget::Mixer(n));
        }
        for n in 0..self.num_dual_links as u8 {
            widgets.push(Widget::DualLinkIn(n));
            widgets.push(Widget::DualLinkOut(n));
        }
        for n in 0..self.num_muxes_425 as u8 {
            widgets.push(Widget::Mux425(n));
        }
        if self.num_hdmi_inputs > 0 {
            widgets.push(Widget::HdmiIn);
            widgets.push(Widget::HdmiOut);
        }
        if self.multi_raster {
            widgets.push(Widget::MultiRasterViewer);
        }
        widgets
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn models_span_the_capability_axes() {
        let big = DeviceCaps::for_device(DeviceId::Corax88);
        let small = DeviceCaps::for_device(DeviceId::CoraxLp);
        assert!(big.is_supported(BoolCap::RouteRom));
        assert!(!small.is_supported(BoolCap::RouteRom));
        assert!(big.is_supported(BoolCap::StackedAudio));
        assert!(!small.is_supported(BoolCap::StackedAudio));
        assert_eq!(8, big.get_num_supported(NumCap::VideoChannels));
        assert_eq!(1, small.get_num_supported(NumCap::AudioSystems));
    }

    #[test]
    fn memory_partitions_into_8mb_frames() {
        assert_eq!(64, DeviceCaps::for_device(DeviceId::Corax88).num_8mb_frames());
        assert_eq!(32, DeviceCaps::for_device(DeviceId::Corax44).num_8mb_frames());
        assert_eq!(16, DeviceCaps::for_device(DeviceId::CoraxLp).num_8mb_frames());
    }

    #[test]
    fn widget_sets_scale_with_the_model() {
        let big = DeviceCaps::for_device(DeviceId::Corax88).widgets();
        let small = DeviceCaps::for_device(DeviceId::CoraxLp).widgets();
        assert!(big.contains(&Widget::Mux425(3)));
        assert!(big.contains(&Widget::MultiRasterViewer));
        assert!(!small.contains(&Widget::Mux425(0)));
        assert!(!small.contains(&Widget::HdmiIn));
        assert!(small.contains(&Widget::FrameStore(1)));
        assert!(!small.contains(&Widget::FrameStore(2)));
    }
}
