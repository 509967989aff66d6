use bytes::Bytes;
use std::time::SystemTime;

/// One rendered JPEG image pushed to stream consumers.
///
/// The payload is reference counted, so cloning a frame for every
/// connected client never copies the image bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Producer-assigned sequence number
    pub id: u64,
    /// Time the frame was produced
    pub timestamp: SystemTime,
    /// JPEG-encoded image data
    pub data: Bytes,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
}

impl Frame {
    pub fn new(id: u64, data: impl Into<Bytes>, width: u32, height: u32) -> Self {
        Self {
            id,
            timestamp: SystemTime::now(),
            data: data.into(),
            width,
            height,
        }
    }

    /// Size of the encoded payload in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Check for JPEG start/end markers
    pub fn is_valid_jpeg(&self) -> bool {
        self.data.len() >= 4
            && self.data[0] == 0xFF
            && self.data[1] == 0xD8
            && self.data[self.data.len() - 2] == 0xFF
            && self.data[self.data.len() - 1] == 0xD9
    }

    /// Milliseconds since the frame was produced
    pub fn age_ms(&self) -> u64 {
        SystemTime::now()
            .duration_since(self.timestamp)
            .unwrap_or_default()
            .as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_clone_shares_payload() {
        let frame = Frame::new(7, vec![0xFF, 0xD8, 0x00, 0xFF, 0xD9], 2, 2);
        let copy = frame.clone();

        assert_eq!(frame.data.as_ptr(), copy.data.as_ptr());
        assert_eq!(copy.size(), 5);
        assert!(copy.is_valid_jpeg());
    }

    #[test]
    fn test_invalid_jpeg_markers() {
        let frame = Frame::new(1, vec![0x00, 0x01, 0x02], 1, 1);
        assert!(!frame.is_valid_jpeg());
    }
}
