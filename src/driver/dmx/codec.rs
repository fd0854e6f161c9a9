//! DMX USB PRO frame codec
//!
//! 0x7e   0x06   0x01  0x02  0x00        ch1 .. ch512   0xe7
//! start  label  len_lsb  len_msb  start code  channel data  end
//!
//! The length field always announces 513 bytes. Short input is zero padded,
//! input longer than 512 bytes is cut at 512. Some units ignore the last four
//! channels (508..=511); they are framed like any other channel.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::Encoder;

use super::prelude::*;

/// Encoder for "send dmx packet" requests
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DmxProCodec;

impl<'a> Encoder<&'a [u8]> for DmxProCodec {
    type Error = std::io::Error;

    fn encode(&mut self, item: &'a [u8], dst: &mut BytesMut) -> Result<(), Self::Error> {
        let channels = &item[..item.len().min(DMX_CHANNEL_LEN)];
        let data_len = DMXPRO_DATA_SIZE as u16;

        dst.reserve(DMXPRO_PACKET_SIZE);
        dst.put_u8(DMXPRO_START_MSG);
        dst.put_u8(DMXPRO_SEND_LABEL);
        dst.put_u16_le(data_len);
        dst.put_u8(DMX_START_CODE);
        dst.put_slice(channels);
        dst.put_bytes(0, DMX_CHANNEL_LEN - channels.len());
        dst.put_u8(DMXPRO_END_MSG);
        Ok(())
    }
}

/// build a fresh 518 byte frame from channel data
pub fn encode_frame(channels: &[u8]) -> BytesMut {
    let mut frame = BytesMut::with_capacity(DMXPRO_PACKET_SIZE);
    // encoding into memory cannot fail
    let _ = DmxProCodec.encode(channels, &mut frame);
    frame
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_layout() {
        let channels: Vec<u8> = (0..DMX_CHANNEL_LEN).map(|i| (i % 256) as u8).collect();
        let frame = encode_frame(&channels);

        assert_eq!(frame.len(), DMXPRO_PACKET_SIZE);
        assert_eq!(frame[0], 0x7E);
        assert_eq!(frame[1], 6);
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 513);
        assert_eq!(frame[4], 0x00);
        assert_eq!(&frame[5..517], channels.as_slice());
        assert_eq!(frame[517], 0xE7);
    }

    #[test]
    fn test_short_input_is_zero_padded() {
        let frame = encode_frame(&[255, 128, 1]);
        assert_eq!(frame.len(), DMXPRO_PACKET_SIZE);
        assert_eq!(&frame[5..8], &[255, 128, 1]);
        assert!(frame[8..517].iter().all(|b| *b == 0));
        assert_eq!(u16::from_le_bytes([frame[2], frame[3]]), 513);
    }

    #[test]
    fn test_empty_input() {
        let frame = encode_frame(&[]);
        assert_eq!(frame.len(), DMXPRO_PACKET_SIZE);
        assert!(frame[4..517].iter().all(|b| *b == 0));
        assert_eq!(frame[517], DMXPRO_END_MSG);
    }

    #[test]
    fn test_long_input_is_truncated() {
        let frame = encode_frame(&[9u8; 600]);
        assert_eq!(frame.len(), DMXPRO_PACKET_SIZE);
        assert!(frame[5..517].iter().all(|b| *b == 9));
        assert_eq!(frame[517], DMXPRO_END_MSG);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let channels = [42u8; DMX_CHANNEL_LEN];
        assert_eq!(encode_frame(&channels), encode_frame(&channels));
    }

    #[test]
    fn test_encoder_appends() {
        let mut dst = BytesMut::new();
        DmxProCodec.encode(&[1u8, 2][..], &mut dst).unwrap();
        DmxProCodec.encode(&[3u8][..], &mut dst).unwrap();
        assert_eq!(dst.len(), DMXPRO_PACKET_SIZE * 2);
        assert_eq!(dst[DMXPRO_PACKET_SIZE], DMXPRO_START_MSG);
        assert_eq!(dst[DMXPRO_PACKET_SIZE + 5], 3);
    }
}
