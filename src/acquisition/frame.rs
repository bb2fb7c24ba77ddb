use super::AnalogChannel;
use crate::config::{BusConfig, ChannelSlotConfig};

/// Mask of the raw sample bits carried by one sub-word.
pub const RAW_MASK: u16 = 0x0FFF;

/// One accepted sample from a bus frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedSample {
    pub channel: AnalogChannel,
    pub tag: u8,
    pub raw: u16,
    pub value: f64,
}

/// Reads the tag and raw count of the sub-word starting at `offset`.
///
/// The sub-word is shifted one bit late on the wire: the tag sits in bits 6..3
/// of byte `offset`, the sample spans the low three bits of that byte, the
/// whole next byte and the top bit of the byte after it. Byte indices wrap
/// around the end of the frame.
pub fn read_sub_word(frame: &[u8], offset: usize) -> (u8, u16) {
    let len = frame.len();
    let head = frame[offset % len];
    let mid = frame[(offset + 1) % len];
    let tail = frame[(offset + 2) % len];

    let tag = (head & 0b0111_1000) >> 3;
    let raw = (u16::from(head & 0b0000_0111) << 9) | (u16::from(mid) << 1) | u16::from(tail >> 7);
    (tag, raw)
}

/// Inverse of [`read_sub_word`]; leaves the bits owned by neighbouring
/// sub-words untouched.
pub fn write_sub_word(frame: &mut [u8], offset: usize, tag: u8, raw: u16) {
    let len = frame.len();
    let raw = raw & RAW_MASK;
    let head = offset % len;
    let mid = (offset + 1) % len;
    let tail = (offset + 2) % len;

    frame[head] = (frame[head] & 0b1000_0000) | ((tag & 0x0F) << 3) | ((raw >> 9) as u8 & 0b111);
    frame[mid] = (raw >> 1) as u8;
    frame[tail] = (frame[tail] & 0b0111_1111) | (((raw & 1) as u8) << 7);
}

/// Routes bus sub-words to analog channels by tag and applies each
/// channel's affine calibration.
#[derive(Debug, Clone)]
pub struct FrameDecoder {
    frame_len: usize,
    slots: Vec<ChannelSlotConfig>,
}

impl FrameDecoder {
    pub fn new(config: &BusConfig) -> Self {
        Self {
            frame_len: config.frame_len,
            slots: config.slots.clone(),
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Decodes every slot whose tag is recognised. Slots carrying an
    /// unrecognised tag are skipped for this frame.
    pub fn decode(&self, frame: &[u8]) -> Vec<DecodedSample> {
        if frame.is_empty() {
            return Vec::new();
        }

        self.slots
            .iter()
            .filter_map(|slot| {
                let (tag, raw) = read_sub_word(frame, slot.byte_offset);
                if slot.tags.contains(&tag) {
                    Some(DecodedSample {
                        channel: slot.channel,
                        tag,
                        raw,
                        value: slot.gain * f64::from(raw) + slot.offset,
                    })
                } else {
                    log::trace!(
                        "dropping {:?} sample with unrecognised tag {}",
                        slot.channel,
                        tag
                    );
                    None
                }
            })
            .collect()
    }

    /// Builds a frame carrying `raw` counts for the given channels, each tagged
    /// with the first tag its slot accepts.
    pub fn encode(&self, samples: &[(AnalogChannel, u16)]) -> Vec<u8> {
        let mut frame = vec![0u8; self.frame_len];
        for &(channel, raw) in samples {
            if let Some(slot) = self.slot(channel) {
                let tag = slot.tags.first().copied().unwrap_or(0);
                write_sub_word(&mut frame, slot.byte_offset, tag, raw);
            }
        }
        frame
    }

    /// Raw count that decodes to `value` on `channel`, saturated to the
    /// sample width.
    pub fn raw_for(&self, channel: AnalogChannel, value: f64) -> Option<u16> {
        let slot = self.slot(channel)?;
        if slot.gain == 0.0 {
            return None;
        }
        let raw = ((value - slot.offset) / slot.gain).round();
        Some(raw.clamp(0.0, f64::from(RAW_MASK)) as u16)
    }

    fn slot(&self, channel: AnalogChannel) -> Option<&ChannelSlotConfig> {
        self.slots.iter().find(|slot| slot.channel == channel)
    }
}
