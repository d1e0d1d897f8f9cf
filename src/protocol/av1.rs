//! AV1 low-overhead bitstream format helpers

/// Temporal delimiter OBU with an explicit zero size: header `0x12`, size `0x00`.
pub const TEMPORAL_DELIMITER: [u8; 2] = [0x12, 0x00];

const OBU_FORBIDDEN_BIT: u8 = 0x80;
const OBU_HAS_SIZE_FIELD: u8 = 0x02;

/// Check if the payload already starts with a temporal delimiter OBU
pub fn starts_with_temporal_delimiter(payload: &[u8]) -> bool {
    payload.starts_with(&TEMPORAL_DELIMITER)
}

/// Check if `byte` is a plausible OBU header in low-overhead format:
/// forbidden bit clear and `obu_has_size_field` set.
pub fn is_low_overhead_obu_header(byte: u8) -> bool {
    byte & OBU_FORBIDDEN_BIT == 0 && byte & OBU_HAS_SIZE_FIELD != 0
}

/// OBU type from a header byte
pub fn obu_type(byte: u8) -> u8 {
    (byte >> 3) & 0x0F
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temporal_delimiter_header() {
        assert_eq!(obu_type(TEMPORAL_DELIMITER[0]), 2);
        assert!(is_low_overhead_obu_header(TEMPORAL_DELIMITER[0]));
        assert!(starts_with_temporal_delimiter(&[0x12, 0x00, 0x0A]));
        assert!(!starts_with_temporal_delimiter(&[0x0A, 0x0B]));
    }

    #[test]
    fn rejects_forbidden_bit_and_missing_size() {
        // sequence header OBU with size field
        assert!(is_low_overhead_obu_header(0x0A));
        assert_eq!(obu_type(0x0A), 1);
        // size field missing
        assert!(!is_low_overhead_obu_header(0x08));
        // forbidden bit set
        assert!(!is_low_overhead_obu_header(0x8A));
    }
}
