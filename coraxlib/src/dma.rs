//! Frame-oriented DMA helpers over the gateway's synchronous transfer.

use crate::device::CoraxCard;
use crate::driver::{DmaRequest, Driver};
use crate::Result;

impl<D: Driver> CoraxCard<D> {
    /// Read a whole frame (or a prefix of it) into a host buffer.
    pub fn dma_read_frame(&self, frame_number: u32, buf: &mut [u8]) -> Result<()> {
        self.driver().dma_read(&DmaRequest::frame(frame_number, 0), buf)
    }

    /// Write a host buffer to the start of a frame.
    pub fn dma_write_frame(&self, frame_number: u32, buf: &[u8]) -> Result<()> {
        self.driver().dma_write(&DmaRequest::frame(frame_number, 0), buf)
    }

    /// Read from a byte offset within a frame.
    pub fn dma_read_offset(&self, frame_number: u32, offset: u32, buf: &mut [u8]) -> Result<()> {
        self.driver().dma_read(&DmaRequest::frame(frame_number, offset), buf)
    }

    /// Write to a byte offset within a frame.
    pub fn dma_write_offset(&self, frame_number: u32, offset: u32, buf: &[u8]) -> Result<()> {
        self.driver().dma_write(&DmaRequest::frame(frame_number, offset), buf)
    }

    /// Read a rectangular sub-image: `num_segments` rows, advancing by
    /// `host_pitch` in the buffer and `card_pitch` on the card.
    pub fn dma_read_segments(
        &self,
        frame_number: u32,
        offset: u32,
        buf: &mut [u8],
        num_segments: u32,
        host_pitch: u32,
        card_pitch: u32,
    ) -> Result<()> {
        let req = DmaRequest {
            num_segments,
            host_pitch,
            card_pitch,
            ..DmaRequest::frame(frame_number, offset)
        };
        self.driver().dma_read(&req, buf)
    }

    /// Write a rectangular sub-image; see [CoraxCard::dma_read_segments].
    pub fn dma_write_segments(
        &self,
        frame_number: u32,
        offset: u32,
        buf: &[u8],
        num_segments: u32,
        host_pitch: u32,
        card_pitch: u32,
    ) -> Result<()> {
        let req = DmaRequest {
            num_segments,
            host_pitch,
            card_pitch,
            ..DmaRequest::frame(frame_number, offset)
        };
        self.driver().dma_write(&req, buf)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::sim::SimDriver;
    use corax_regs::DeviceId;

    #[test]
    fn frame_round_trip() {
        let card = CoraxCard::open(SimDriver::new(DeviceId::Corax44)).unwrap();
        let data = vec![0xA5u8; 4096];
        card.dma_write_frame(2, &data).unwrap();
        let mut back = vec![0u8; 4096];
        card.dma_read_frame(2, &mut back).unwrap();
        assert_eq!(data, back);
    }

    #[test]
    fn offset_reads_see_offset_writes() {
        let card = CoraxCard::open(SimDriver::new(DeviceId::Corax44)).unwrap();
        card.dma_write_offset(0, 100, &[1, 2, 3, 4]).unwrap();
        let mut back = vec![0u8; 2];
        card.dma_read_offset(0, 102, &mut back).unwrap();
        assert_eq!(vec![3, 4], back);
    }

    #[test]
    fn segment_round_trip() {
        let card = CoraxCard::open(SimDriver::new(DeviceId::Corax44)).unwrap();
        let rect: Vec<u8> = (0..128u32).map(|b| b as u8).collect();
        card.dma_write_segments(1, 0, &rect, 4, 32, 1024).unwrap();
        let mut back = vec![0u8; 128];
        card.dma_read_segments(1, 0, &mut back, 4, 32, 1024).unwrap();
        assert_eq!(rect, back);
    }
}
