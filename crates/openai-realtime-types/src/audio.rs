use base64::Engine;

/// Packs signed 16-bit samples into little-endian PCM16 bytes.
pub fn pcm16_bytes(samples: &[i16]) -> Vec<u8> {
    samples
        .iter()
        .flat_map(|&sample| sample.to_le_bytes())
        .collect()
}

pub fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

pub fn decode_base64(fragment: &str) -> Result<Vec<u8>, base64::DecodeError> {
    base64::engine::general_purpose::STANDARD.decode(fragment)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm16_is_little_endian() {
        let bytes = pcm16_bytes(&[1, -2, i16::MAX]);
        assert_eq!(bytes, vec![0x01, 0x00, 0xFE, 0xFF, 0xFF, 0x7F]);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_base64("not base64!").is_err());
        assert_eq!(decode_base64(&encode_base64(b"pcm")).unwrap(), b"pcm");
    }
}
