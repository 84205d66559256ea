use serde::{Deserialize, Serialize};

/// Transport type for an audio device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// A microphone available for capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioSource {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub transport_type: Option<AudioTransportType>,
}

/// Native encoding of the samples a host delivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Offset-binary bytes, 128 is the zero line (analyser byte data).
    Unsigned8,
    Signed16,
    Float32,
}

/// One fixed-size frame of time-domain samples, mono.
#[derive(Debug, Clone, PartialEq)]
pub enum SampleFrame {
    Unsigned8(Vec<u8>),
    Signed16(Vec<i16>),
    Float32(Vec<f32>),
}

impl SampleFrame {
    /// A frame of `len` samples sitting on the zero line.
    pub fn silence(encoding: SampleEncoding, len: usize) -> Self {
        match encoding {
            SampleEncoding::Unsigned8 => Self::Unsigned8(vec![128; len]),
            SampleEncoding::Signed16 => Self::Signed16(vec![0; len]),
            SampleEncoding::Float32 => Self::Float32(vec![0.0; len]),
        }
    }

    /// Build a frame from normalized `[-1.0, 1.0]` samples in the given encoding.
    pub fn from_normalized(encoding: SampleEncoding, samples: &[f32]) -> Self {
        match encoding {
            SampleEncoding::Unsigned8 => Self::Unsigned8(
                samples
                    .iter()
                    .map(|s| (s.clamp(-1.0, 1.0) * 128.0 + 128.0).round().clamp(0.0, 255.0) as u8)
                    .collect(),
            ),
            SampleEncoding::Signed16 => Self::Signed16(
                samples
                    .iter()
                    .map(|s| {
                        let scaled = (s.clamp(-1.0, 1.0) * 32768.0).round();
                        scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
                    })
                    .collect(),
            ),
            SampleEncoding::Float32 => Self::Float32(samples.to_vec()),
        }
    }

    pub fn encoding(&self) -> SampleEncoding {
        match self {
            Self::Unsigned8(_) => SampleEncoding::Unsigned8,
            Self::Signed16(_) => SampleEncoding::Signed16,
            Self::Float32(_) => SampleEncoding::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Unsigned8(s) => s.len(),
            Self::Signed16(s) => s.len(),
            Self::Float32(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silence_sits_on_zero_line() {
        assert_eq!(
            SampleFrame::silence(SampleEncoding::Unsigned8, 3),
            SampleFrame::Unsigned8(vec![128; 3])
        );
        assert_eq!(
            SampleFrame::silence(SampleEncoding::Signed16, 2),
            SampleFrame::Signed16(vec![0; 2])
        );
        assert!(SampleFrame::silence(SampleEncoding::Float32, 0).is_empty());
    }

    #[test]
    fn from_normalized_saturates_integer_encodings() {
        let frame = SampleFrame::from_normalized(SampleEncoding::Unsigned8, &[1.0, -1.0, 0.0]);
        assert_eq!(frame, SampleFrame::Unsigned8(vec![255, 0, 128]));

        let frame = SampleFrame::from_normalized(SampleEncoding::Signed16, &[1.0, -1.0, 2.0]);
        assert_eq!(frame, SampleFrame::Signed16(vec![i16::MAX, i16::MIN, i16::MAX]));
    }

    #[test]
    fn encoding_and_len() {
        let frame = SampleFrame::Float32(vec![0.1; 256]);
        assert_eq!(frame.encoding(), SampleEncoding::Float32);
        assert_eq!(frame.len(), 256);
    }
}
