//! The SDRAM auditor: reconcile what the host thinks it owns against what
//! the device is actually configured to use.
//!
//! Memory is walked in fixed 8 MB quanta. Every quantum collects the set of
//! owners using it; zero owners is free, one is in use, two or more is a
//! conflict a UI should surface before it turns into frame corruption.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;

use corax_regs::{Channel, DeviceId};

use crate::device::{CoraxCard, Mode};
use crate::driver::Driver;
use crate::{AudioSystem, Result};

/// The audit quantum.
pub const EIGHT_MB: u32 = 0x80_0000;

/// A run of consecutive 8 MB frames with one tag set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Region {
    pub start: u32,
    pub length: u32,
}

/// The coalesced audit result.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Regions {
    pub free: Vec<Region>,
    pub used: Vec<Region>,
    pub conflicting: Vec<Region>,
}

impl Regions {
    /// Total quanta across all three region kinds.
    pub fn total_frames(&self) -> u32 {
        self.free
            .iter()
            .chain(&self.used)
            .chain(&self.conflicting)
            .map(|r| r.length)
            .sum()
    }
}

/// One assessment of a device's SDRAM.
#[derive(Clone, Debug)]
pub struct SdramAuditor {
    device: DeviceId,
    frame_tags: BTreeMap<u32, BTreeSet<String>>,
    num_frames: u32,
    intrinsic_bytes: u32,
}

impl SdramAuditor {
    /// Walk the device's live engine state and tag every 8 MB quantum with
    /// its owners. With `mark_stopped_audio_free`, audio systems that are
    /// neither capturing nor playing leave their region untagged.
    pub fn assess<D: Driver>(
        card: &CoraxCard<D>,
        mark_stopped_audio_free: bool,
    ) -> Result<SdramAuditor> {
        let num_frames = card.caps().num_8mb_frames();
        let mut auditor = SdramAuditor {
            device: card.device_id(),
            frame_tags: (0..num_frames).map(|frm| (frm, BTreeSet::new())).collect(),
            num_frames,
            intrinsic_bytes: 0,
        };
        auditor.tag_audio_buffers(card, mark_stopped_audio_free)?;
        auditor.tag_video_frames(card)?;
        if auditor.intrinsic_bytes == 0 {
            auditor.intrinsic_bytes = card.frame_buffer_size(Channel::CH1)?.byte_count();
        }
        log::debug!(
            target: "sdram",
            "{}: assessed {} frames, intrinsic {} MB",
            auditor.device,
            auditor.num_frames,
            auditor.intrinsic_bytes / 0x10_0000,
        );
        Ok(auditor)
    }

    fn tag_audio_buffers<D: Driver>(
        &mut self,
        card: &CoraxCard<D>,
        mark_stopped_free: bool,
    ) -> Result<()> {
        for ndx in 0..card.caps().num_audio_systems {
            let system = AudioSystem::new(ndx as u8).expect("audio system ordinal");
            let addr = card.audio_memory_offset(system, 0)?;
            let reading = card.is_audio_output_running(system)?;
            let writing = card.is_audio_input_running(system)?;
            if mark_stopped_free && !reading && !writing {
                continue;
            }
            let mut tag = system.to_string();
            if reading {
                tag.push_str(" Read");
            }
            if writing {
                tag.push_str(" Write");
            }
            self.tag_memory_block(addr, EIGHT_MB as u64, &tag);
        }
        Ok(())
    }

    fn tag_video_frames<D: Driver>(&mut self, card: &CoraxCard<D>) -> Result<()> {
        let mut skip: BTreeSet<Channel> = BTreeSet::new();
        let multi_raster_channel = if card.is_multi_raster_enabled()? {
            Channel::new(card.caps().num_channels as u8 - 1)
        } else {
            None
        };
        for ndx in 0..card.caps().num_channels {
            let channel = Channel::new(ndx as u8).expect("channel ordinal");
            if skip.contains(&channel) {
                continue;
            }
            let status = card.driver().ac_status(channel)?;
            let mut touched = false;
            if !status.is_stopped() {
                let start = card.device_frame_info(channel, status.start_frame)?;
                let end = card.device_frame_info(channel, status.end_frame)?;
                self.intrinsic_bytes = start.intrinsic_bytes;
                let writing = matches!(card.mode(channel)?, Mode::Capture);
                let tag = format!("AC{} {}", channel.number(), if writing { "Write" } else { "Read" });
                self.tag_memory_block(start.address, end.address + end.length - start.address, &tag);
                touched = true;
            } else if card.is_channel_enabled(channel)? {
                let mode = card.mode(channel)?;
                let frame = match mode {
                    Mode::Capture => card.input_frame(channel)?,
                    Mode::Display => card.output_frame(channel)?,
                };
                let info = card.device_frame_info(channel, frame)?;
                self.intrinsic_bytes = info.intrinsic_bytes;
                let name = if multi_raster_channel == Some(channel) {
                    format!("MR{}", channel.number())
                } else {
                    format!("Ch{}", channel.number())
                };
                let tag = format!(
                    "{} {}",
                    name,
                    if matches!(mode, Mode::Capture) { "Write" } else { "Read" }
                );
                self.tag_memory_block(info.address, info.length, &tag);
                touched = true;
            }
            if touched {
                for sibling in card.quad_siblings(channel)? {
                    skip.insert(sibling);
                }
            }
        }
        Ok(())
    }

    /// Tag every 8 MB quantum covered by `[addr, addr+len)`. Quanta past
    /// the end of memory are additionally tagged `Invalid`.
    fn tag_memory_block(&mut self, addr: u64, len: u64, tag: &str) {
        if addr % EIGHT_MB as u64 != 0 || len % EIGHT_MB as u64 != 0 || tag.is_empty() {
            log::warn!(
                target: "sdram",
                "{}: ignoring unaligned block {:#x}+{:#x} '{}'",
                self.device,
                addr,
                len,
                tag,
            );
            return;
        }
        let start = (addr / EIGHT_MB as u64) as u32;
        let count = (len / EIGHT_MB as u64) as u32;
        for frame in start..start + count {
            let tags = self.frame_tags.entry(frame).or_default();
            tags.insert(tag.to_string());
            if frame >= self.num_frames {
                tags.insert("Invalid".to_string());
            }
        }
    }

    pub fn num_frames(&self) -> u32 {
        self.num_frames
    }

    /// The allocation unit inferred from the frame-size registers.
    pub fn intrinsic_bytes(&self) -> u32 {
        self.intrinsic_bytes
    }

    /// The owner set of one 8 MB quantum.
    pub fn tags_for_frame(&self, frame: u32) -> Option<&BTreeSet<String>> {
        self.frame_tags.get(&frame)
    }

    pub fn tag_count(&self, frame: u32) -> usize {
        self.frame_tags.get(&frame).map(|t| t.len()).unwrap_or(0)
    }

    /// Coalesce adjacent quanta with identical tag sets into regions and
    /// bucket them by owner count.
    pub fn regions(&self) -> Regions {
        let mut regions = Regions::default();
        let mut iter = self.frame_tags.iter();
        let Some((first, tags)) = iter.next() else {
            return regions;
        };
        let mut run_start = *first;
        let mut run_len = 1u32;
        let mut run_tags = tags;
        let mut push = |regions: &mut Regions, start: u32, length: u32, tags: &BTreeSet<String>| {
            let region = Region { start, length };
            match tags.len() {
                0 => regions.free.push(region),
                1 => regions.used.push(region),
                _ => regions.conflicting.push(region),
            }
        };
        for (frame, tags) in iter {
            if tags == run_tags {
                run_len += 1;
            } else {
                push(&mut regions, run_start, run_len, run_tags);
                run_start = *frame;
                run_len = 1;
                run_tags = tags;
            }
        }
        push(&mut regions, run_start, run_len, run_tags);
        regions
    }

    /// Translate 8 MB-unit regions into a caller's logical frame units.
    ///
    /// Starts round up to the next whole destination frame, lengths round
    /// down; when a destination frame equals one 8 MB quantum the input
    /// comes back unchanged.
    pub fn translate_regions(&self, src: &[Region], quad: bool, quad_quad: bool) -> Option<Vec<Region>> {
        if quad && quad_quad {
            return None;
        }
        let per_dest = (self.intrinsic_bytes / EIGHT_MB)
            * if quad { 4 } else { 1 }
            * if quad_quad { 16 } else { 1 };
        if per_dest == 0 {
            return None;
        }
        if per_dest == 1 {
            return Some(src.to_vec());
        }
        Some(
            src.iter()
                .map(|region| Region {
                    start: region.start / per_dest
                        + if region.start % per_dest != 0 { 1 } else { 0 },
                    length: region.length / per_dest,
                })
                .collect(),
        )
    }

    /// One line per quantum: index and owners.
    pub fn raw_dump(&self) -> String {
        let mut out = String::new();
        for (frame, tags) in &self.frame_tags {
            let owners: Vec<&str> = tags.iter().map(String::as_str).collect();
            let _ = writeln!(out, "{:03}: {}", frame, owners.join(", "));
        }
        out
    }

    /// One line per coalesced region.
    pub fn dump_blocks(&self) -> String {
        let regions = self.regions();
        let mut all: Vec<Region> = regions
            .free
            .iter()
            .chain(&regions.used)
            .chain(&regions.conflicting)
            .copied()
            .collect();
        all.sort_by_key(|r| r.start);
        let mut out = String::new();
        for region in all {
            let label = if region.length > 1 {
                format!("Frms {:03}-{:03}", region.start, region.start + region.length - 1)
            } else {
                format!("Frm  {:03}    ", region.start)
            };
            let tags = self.tags_for_frame(region.start).cloned().unwrap_or_default();
            let owners = if tags.is_empty() {
                "{free}".to_string()
            } else {
                tags.iter().cloned().collect::<Vec<_>>().join(", ")
            };
            let _ = writeln!(out, "{} : {}", label, owners);
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::driver::{AcInit, AcOptions, AC_NO_AUDIO};
    use crate::sim::SimDriver;

    fn card(id: DeviceId) -> CoraxCard<SimDriver> {
        CoraxCard::open(SimDriver::new(id)).unwrap()
    }

    fn run_ac(card: &CoraxCard<SimDriver>, channel: Channel, capture: bool, start: u32, end: u32) {
        card.set_mode(channel, if capture { Mode::Capture } else { Mode::Display }).unwrap();
        card.driver()
            .ac_init(
                channel,
                &AcInit {
                    capture,
                    start_frame: start,
                    end_frame: end,
                    audio_system: AC_NO_AUDIO,
                    options: AcOptions::empty(),
                },
            )
            .unwrap();
        card.driver().ac_start(channel).unwrap();
        card.driver().tick();
    }

    #[test]
    fn idle_device_is_mostly_free_with_audio_on_top() {
        let card = card(DeviceId::Corax88);
        let auditor = SdramAuditor::assess(&card, false).unwrap();
        assert_eq!(64, auditor.num_frames());
        // the top eight 8 MB frames belong to the eight audio systems
        assert_eq!(1, auditor.tag_count(63));
        assert!(auditor.tags_for_frame(63).unwrap().contains("Aud1"));
        assert!(auditor.tags_for_frame(56).unwrap().contains("Aud8"));
        assert_eq!(0, auditor.tag_count(0));
    }

    #[test]
    fn stopped_audio_can_be_marked_free() {
        let card = card(DeviceId::Corax88);
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        assert_eq!(0, auditor.tag_count(63));
        let regions = auditor.regions();
        assert_eq!(1, regions.free.len());
        assert_eq!(64, regions.free[0].length);
    }

    #[test]
    fn region_lengths_cover_all_of_memory() {
        let card = card(DeviceId::Corax88);
        run_ac(&card, Channel::CH1, true, 0, 6);
        card.setup_audio_capture(AudioSystem::SYS1, Channel::CH1).unwrap();
        let auditor = SdramAuditor::assess(&card, false).unwrap();
        let regions = auditor.regions();
        assert_eq!(auditor.num_frames(), regions.total_frames());
        // neighbouring coalesced regions never share a tag set
        let mut all: Vec<Region> = regions
            .free
            .iter()
            .chain(&regions.used)
            .chain(&regions.conflicting)
            .copied()
            .collect();
        all.sort_by_key(|r| r.start);
        for pair in all.windows(2) {
            assert_eq!(pair[0].start + pair[0].length, pair[1].start);
            assert_ne!(
                auditor.tags_for_frame(pair[0].start),
                auditor.tags_for_frame(pair[1].start)
            );
        }
    }

    #[test]
    fn overlapping_channels_conflict() {
        let card = card(DeviceId::Corax88);
        run_ac(&card, Channel::CH1, true, 0, 6);
        run_ac(&card, Channel::CH2, false, 5, 11);
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        let regions = auditor.regions();
        assert_eq!(
            vec![Region { start: 5, length: 2 }],
            regions.conflicting,
        );
        let tags = auditor.tags_for_frame(5).unwrap();
        assert_eq!(
            BTreeSet::from(["AC1 Write".to_string(), "AC2 Read".to_string()]),
            tags.clone()
        );
    }

    #[test]
    fn enabled_idle_channel_tags_its_pointed_frame() {
        let card = card(DeviceId::Corax44);
        card.enable_channel(Channel::CH3).unwrap();
        card.set_mode(Channel::CH3, Mode::Display).unwrap();
        card.set_output_frame(Channel::CH3, 9).unwrap();
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        assert!(auditor.tags_for_frame(9).unwrap().contains("Ch3 Read"));
    }

    #[test]
    fn multi_raster_channel_gets_the_mr_tag() {
        let card = card(DeviceId::Corax88);
        card.set_multi_raster_enabled(true).unwrap();
        card.enable_channel(Channel::CH8).unwrap();
        card.set_mode(Channel::CH8, Mode::Display).unwrap();
        card.set_output_frame(Channel::CH8, 20).unwrap();
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        assert!(auditor.tags_for_frame(20).unwrap().contains("MR8 Read"));
    }

    #[test]
    fn tsi_channels_expand_and_skip_siblings() {
        let card = card(DeviceId::Corax88);
        card.set_video_format(Channel::CH1, crate::format::VideoFormat::UHD_2160P_6000).unwrap();
        card.set_tsi(Channel::CH1, true).unwrap();
        // CH2 would double-count the shared frames if not skipped
        card.enable_channel(Channel::CH1).unwrap();
        card.enable_channel(Channel::CH2).unwrap();
        card.set_mode(Channel::CH1, Mode::Capture).unwrap();
        card.set_mode(Channel::CH2, Mode::Capture).unwrap();
        card.set_input_frame(Channel::CH1, 1).unwrap();
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        // logical frame 1 is 64 MB: 8 MB quanta 8..16
        for frame in 8..16 {
            assert_eq!(
                Some(&BTreeSet::from(["Ch1 Write".to_string()])),
                auditor.tags_for_frame(frame),
                "frame {}",
                frame
            );
        }
        assert_eq!(0, auditor.tag_count(16));
    }

    #[test]
    fn quad_quad_regions_translate_to_whole_frames() {
        let card = card(DeviceId::Corax88);
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        // a 16-quantum used run at a 16-quantum destination frame size
        let src = [Region { start: 16, length: 16 }];
        let dest = auditor.translate_regions(&src, false, true).unwrap();
        assert_eq!(vec![Region { start: 1, length: 1 }], dest);
        // identity when the destination frame is a single quantum
        assert_eq!(src.to_vec(), auditor.translate_regions(&src, false, false).unwrap());
        // a region can't be both quad and quad-quad
        assert!(auditor.translate_regions(&src, true, true).is_none());
    }

    #[test]
    fn dumps_render() {
        let card = card(DeviceId::Corax44);
        run_ac(&card, Channel::CH1, true, 0, 2);
        let auditor = SdramAuditor::assess(&card, true).unwrap();
        let raw = auditor.raw_dump();
        assert!(raw.contains("000: AC1 Write"));
        let blocks = auditor.dump_blocks();
        assert!(blocks.contains("Frms 000-002 : AC1 Write"));
        assert!(blocks.contains("{free}"));
    }
}
