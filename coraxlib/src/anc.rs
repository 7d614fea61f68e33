//! Ancillary data plumbing: the end-of-frame anc regions, and extractor /
//! inserter programming.
//!
//! Both anc fields live at the tail of each frame buffer. The driver
//! reports two offsets back from the end of the frame: field 1's region
//! runs from `end - f1_offset` to `end - f2_offset`, field 2's from
//! `end - f2_offset` to the end.

use corax_regs::regs;
use corax_regs::Channel;

use crate::caps::BoolCap;
use crate::device::CoraxCard;
use crate::driver::Driver;
use crate::format::Standard;
use crate::{Error, Result};

/// The two end-of-frame offsets `(f1_offset, f2_offset)` in bytes.
pub fn region_offsets<D: Driver>(card: &CoraxCard<D>) -> Result<(u32, u32)> {
    let f1 = card.read_reg(regs::ANC_FIELD1_OFFSET)?;
    let f2 = card.read_reg(regs::ANC_FIELD2_OFFSET)?;
    Ok((f1, f2))
}

/// Worst-case host buffer sizes `(f1, f2)` for the two anc fields.
pub fn buffer_sizes<D: Driver>(card: &CoraxCard<D>) -> Result<(u32, u32)> {
    let (f1, f2) = region_offsets(card)?;
    Ok((f1.saturating_sub(f2), f2))
}

/// Per-standard extractor line parameters.
#[derive(Clone, Copy, Debug)]
struct ExtractorParams {
    field1_start_line: u32,
    field1_cutoff_line: u32,
    field2_start_line: u32,
    field2_cutoff_line: u32,
    total_lines: u32,
    fid_low: u32,
    fid_high: u32,
}

fn extractor_params(standard: Standard) -> ExtractorParams {
    match standard {
        Standard::Sd525 => ExtractorParams {
            field1_start_line: 264,
            field1_cutoff_line: 30,
            field2_start_line: 1,
            field2_cutoff_line: 293,
            total_lines: 525,
            fid_low: 3,
            fid_high: 265,
        },
        Standard::Sd625 => ExtractorParams {
            field1_start_line: 23,
            field1_cutoff_line: 625,
            field2_start_line: 336,
            field2_cutoff_line: 625,
            total_lines: 625,
            fid_low: 1,
            fid_high: 313,
        },
        Standard::Hd720 => ExtractorParams {
            field1_start_line: 746,
            field1_cutoff_line: 745,
            field2_start_line: 0,
            field2_cutoff_line: 0,
            total_lines: 750,
            fid_low: 0,
            fid_high: 0,
        },
        Standard::Hd1080i | Standard::I2k1080 => ExtractorParams {
            field1_start_line: 561,
            field1_cutoff_line: 26,
            field2_start_line: 1124,
            field2_cutoff_line: 588,
            total_lines: 1125,
            fid_low: 1125,
            fid_high: 563,
        },
        // every progressive HD and larger raster shares the 1080p numbers
        _ => ExtractorParams {
            field1_start_line: 1122,
            field1_cutoff_line: 1125,
            field2_start_line: 0,
            field2_cutoff_line: 0,
            total_lines: 1125,
            fid_low: 0,
            fid_high: 0,
        },
    }
}

impl<D: Driver> CoraxCard<D> {
    fn anc_ext_reg(&self, channel: Channel, offset: u32) -> u32 {
        regs::ANC_EXT_BASE[channel.index()] + offset
    }

    fn anc_ins_reg(&self, channel: Channel, offset: u32) -> u32 {
        regs::ANC_INS_BASE[channel.index()] + offset
    }

    fn check_custom_anc(&self) -> Result<()> {
        if self.is_supported(BoolCap::CustomAnc) {
            Ok(())
        } else {
            Err(Error::UnsupportedOnDevice)
        }
    }

    /// Program a channel's anc extractor for a raster standard.
    pub fn anc_extract_init(&self, channel: Channel, standard: Standard) -> Result<()> {
        self.check_custom_anc()?;
        let params = extractor_params(standard);
        let writes = [
            (regs::ANC_EXT_FIELD_CUTOFF_LINE, (params.field2_cutoff_line << 16) | params.field1_cutoff_line),
            (regs::ANC_EXT_VBL_START_LINE, (params.field2_start_line << 16) | params.field1_start_line),
            (regs::ANC_EXT_TOTAL_FRAME_LINES, params.total_lines),
            (regs::ANC_EXT_FID, (params.fid_high << 16) | params.fid_low),
        ];
        for (offset, value) in writes {
            self.write_reg(self.anc_ext_reg(channel, offset), value)?;
        }
        let control = regs::AncExtControl::new()
            .with_enabled(true)
            .with_progressive(standard.is_progressive());
        self.write_reg(self.anc_ext_reg(channel, regs::ANC_EXT_CONTROL), control.into())?;
        log::debug!(target: "anc", "{}: extractor armed for {:?}", channel, standard);
        Ok(())
    }

    /// Point a channel's anc extractor at the tail of a frame.
    pub fn anc_extract_set_frame(&self, channel: Channel, frame_number: u32) -> Result<()> {
        self.check_custom_anc()?;
        let info = self.device_frame_info(channel, frame_number)?;
        let (f1_off, f2_off) = region_offsets(self)?;
        let end = (info.address + info.length) as u32;
        let f1_start = end - f1_off;
        let f2_start = end - f2_off;
        self.write_reg(self.anc_ext_reg(channel, regs::ANC_EXT_F1_START_ADDR), f1_start)?;
        self.write_reg(self.anc_ext_reg(channel, regs::ANC_EXT_F1_END_ADDR), f2_start - 1)?;
        self.write_reg(self.anc_ext_reg(channel, regs::ANC_EXT_F2_START_ADDR), f2_start)?;
        self.write_reg(self.anc_ext_reg(channel, regs::ANC_EXT_F2_END_ADDR), end - 1)?;
        Ok(())
    }

    /// Program a channel's anc inserter for a raster standard.
    pub fn anc_insert_init(&self, channel: Channel, standard: Standard) -> Result<()> {
        self.check_custom_anc()?;
        let params = extractor_params(standard);
        self.write_reg(self.anc_ins_reg(channel, regs::ANC_INS_FRAME_LINES), params.total_lines)?;
        self.write_reg(
            self.anc_ins_reg(channel, regs::ANC_INS_FIELD_ID_LINES),
            (params.fid_high << 16) | params.fid_low,
        )?;
        let control = regs::AncInsControl::new()
            .with_hanc_y(true)
            .with_hanc_c(true)
            .with_vanc_y(true)
            .with_vanc_c(true)
            .with_progressive(standard.is_progressive())
            .with_sd_packet_split(standard.is_sd());
        self.write_reg(self.anc_ins_reg(channel, regs::ANC_INS_CONTROL), control.into())?;
        let (f1_size, f2_size) = buffer_sizes(self)?;
        self.anc_insert_set_field_bytes(channel, f1_size, f2_size)
    }

    pub fn anc_insert_set_field_bytes(&self, channel: Channel, f1: u32, f2: u32) -> Result<()> {
        self.check_custom_anc()?;
        let reg = self.anc_ins_reg(channel, regs::ANC_INS_FIELD_BYTES);
        self.write_register(reg, f1, regs::ANC_INS_F1_BYTES_MASK, regs::ANC_INS_F1_BYTES_SHIFT)?;
        self.write_register(reg, f2, regs::ANC_INS_F2_BYTES_MASK, regs::ANC_INS_F2_BYTES_SHIFT)
    }

    /// Point a channel's anc inserter at the regions it should read from a
    /// frame. Field 1 sits `f1_offset` back from the end of the *next*
    /// frame, field 2 `f2_offset` back.
    pub fn anc_insert_set_read_frame(&self, channel: Channel, frame_number: u32) -> Result<()> {
        self.check_custom_anc()?;
        let info = self.device_frame_info(channel, frame_number)?;
        let end = (info.address + info.length) as u32;
        let (f1_off, f2_off) = region_offsets(self)?;
        self.write_reg(self.anc_ins_reg(channel, regs::ANC_INS_F1_START_ADDR), end - f1_off)?;
        self.write_reg(self.anc_ins_reg(channel, regs::ANC_INS_F2_START_ADDR), end - f2_off)?;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimDriver;
    use corax_regs::DeviceId;

    fn card(id: DeviceId) -> CoraxCard<SimDriver> {
        CoraxCard::open(SimDriver::new(id)).unwrap()
    }

    #[test]
    fn buffer_sizes_come_from_the_offsets() {
        let card = card(DeviceId::Corax88);
        let (f1_off, f2_off) = region_offsets(&card).unwrap();
        assert!(f1_off > f2_off);
        let (f1, f2) = buffer_sizes(&card).unwrap();
        assert_eq!(f1_off - f2_off, f1);
        assert_eq!(f2_off, f2);
    }

    #[test]
    fn extractor_frame_regions_tile_the_frame_tail() {
        let card = card(DeviceId::Corax88);
        card.anc_extract_init(Channel::CH1, Standard::Hd1080i).unwrap();
        card.anc_extract_set_frame(Channel::CH1, 3).unwrap();
        let base = regs::ANC_EXT_BASE[0];
        let f1_start = card.read_reg(base + regs::ANC_EXT_F1_START_ADDR).unwrap();
        let f1_end = card.read_reg(base + regs::ANC_EXT_F1_END_ADDR).unwrap();
        let f2_start = card.read_reg(base + regs::ANC_EXT_F2_START_ADDR).unwrap();
        let f2_end = card.read_reg(base + regs::ANC_EXT_F2_END_ADDR).unwrap();
        let frame_end = 4 * 0x80_0000;
        assert_eq!(frame_end - 0x4000, f1_start);
        assert_eq!(f2_start - 1, f1_end);
        assert_eq!(frame_end - 0x2000, f2_start);
        assert_eq!(frame_end - 1, f2_end);
    }

    #[test]
    fn inserter_reads_both_field_regions_of_the_frame() {
        let card = card(DeviceId::Corax88);
        card.anc_insert_init(Channel::CH2, Standard::Hd1080p).unwrap();
        card.anc_insert_set_read_frame(Channel::CH2, 1).unwrap();
        let base = regs::ANC_INS_BASE[1];
        let f1 = card.read_reg(base + regs::ANC_INS_F1_START_ADDR).unwrap();
        let f2 = card.read_reg(base + regs::ANC_INS_F2_START_ADDR).unwrap();
        let frame_end = 2 * 0x80_0000;
        // field 2 reads from the field-2 region, not field 1's
        assert_eq!(frame_end - 0x4000, f1);
        assert_eq!(frame_end - 0x2000, f2);
        assert_ne!(f1, f2);
    }

    #[test]
    fn field_bytes_pack_into_one_register() {
        let card = card(DeviceId::Corax44);
        card.anc_insert_set_field_bytes(Channel::CH1, 0x1234, 0x0456).unwrap();
        let raw = card.read_reg(regs::ANC_INS_BASE[0] + regs::ANC_INS_FIELD_BYTES).unwrap();
        assert_eq!(0x0456_1234, raw);
    }

    #[test]
    fn anc_needs_the_hardware() {
        let card = card(DeviceId::CoraxLp);
        assert_eq!(
            Err(Error::UnsupportedOnDevice),
            card.anc_extract_init(Channel::CH1, Standard::Hd1080i)
        );
    }

    #[test]
    fn interlaced_and_progressive_params_differ() {
        let card = card(DeviceId::Corax88);
        card.anc_extract_init(Channel::CH1, Standard::Hd1080i).unwrap();
        let ctrl_i = regs::AncExtControl::from(
            card.read_reg(regs::ANC_EXT_BASE[0] + regs::ANC_EXT_CONTROL).unwrap(),
        );
        assert!(!ctrl_i.progressive());
        card.anc_extract_init(Channel::CH2, Standard::Uhd3840).unwrap();
        let ctrl_p = regs::AncExtControl::from(
            card.read_reg(regs::ANC_EXT_BASE[1] + regs::ANC_EXT_CONTROL).unwrap(),
        );
        assert!(ctrl_p.progressive());
    }
}
