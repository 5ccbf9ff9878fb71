//! File-transfer fragment framing.
//!
//! One fragment travels per datagram: an ASCII header
//! `"<total>:<seq>:<size>:<filename>:"` followed immediately by the raw
//! payload bytes. The fourth colon terminates the header; nothing in the
//! header is length-prefixed, so the decoder scans for it. Malformed
//! datagrams are dropped by the caller, never NAKed.

use crate::constants::{FRAGMENT_DATA_LEN, MAX_FILENAME_LEN, MAX_HEADER_LEN};
use crate::error::FragmentError;

/// One unit of file payload with its addressing header.
///
/// `seq` is 1-based; `seq == total` marks the final fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub total: u32,
    pub seq: u32,
    pub filename: String,
    pub payload: Vec<u8>,
}

impl Fragment {
    pub fn new(
        total: u32,
        seq: u32,
        filename: impl Into<String>,
        payload: Vec<u8>,
    ) -> Result<Self, FragmentError> {
        let filename = filename.into();
        validate_filename(&filename)?;
        check_sequence(total, seq)?;
        if payload.len() > FRAGMENT_DATA_LEN {
            return Err(FragmentError::BadField(format!(
                "payload of {} bytes exceeds fragment capacity",
                payload.len()
            )));
        }
        Ok(Self {
            total,
            seq,
            filename,
            payload,
        })
    }

    pub fn is_last(&self) -> bool {
        self.seq == self.total
    }

    pub fn encode(&self) -> Vec<u8> {
        let header = format!(
            "{}:{}:{}:{}:",
            self.total,
            self.seq,
            self.payload.len(),
            self.filename
        );
        let mut buf = Vec::with_capacity(header.len() + self.payload.len());
        buf.extend_from_slice(header.as_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    pub fn decode(datagram: &[u8]) -> Result<Self, FragmentError> {
        let header_len = find_header_end(datagram)?;
        // header_len includes the fourth colon
        let header = std::str::from_utf8(&datagram[..header_len - 1])
            .map_err(|_| FragmentError::BadField("header is not ASCII".into()))?;

        let mut fields = header.splitn(4, ':');
        let total = parse_u32(fields.next(), "total_frag")?;
        let seq = parse_u32(fields.next(), "frag_no")?;
        let declared = parse_u32(fields.next(), "data_size")? as usize;
        let filename = fields
            .next()
            .ok_or_else(|| FragmentError::BadField("missing filename".into()))?;
        validate_filename(filename)?;
        check_sequence(total, seq)?;

        if declared > FRAGMENT_DATA_LEN {
            return Err(FragmentError::BadField(format!(
                "declared size {declared} exceeds fragment capacity"
            )));
        }
        let rest = &datagram[header_len..];
        if rest.len() < declared {
            return Err(FragmentError::ShortPayload {
                declared,
                actual: rest.len(),
            });
        }

        Ok(Self {
            total,
            seq,
            filename: filename.to_owned(),
            payload: rest[..declared].to_vec(),
        })
    }
}

/// Locate the byte just past the fourth colon.
fn find_header_end(datagram: &[u8]) -> Result<usize, FragmentError> {
    let mut colons = 0;
    for (i, &b) in datagram.iter().enumerate() {
        if i >= MAX_HEADER_LEN {
            return Err(FragmentError::HeaderTooLong(MAX_HEADER_LEN));
        }
        if b == b':' {
            colons += 1;
            if colons == 4 {
                return Ok(i + 1);
            }
        }
    }
    Err(FragmentError::TruncatedHeader)
}

fn check_sequence(total: u32, seq: u32) -> Result<(), FragmentError> {
    if total == 0 || seq == 0 || seq > total {
        return Err(FragmentError::BadField(format!(
            "fragment {seq} of {total} is out of range"
        )));
    }
    Ok(())
}

fn parse_u32(field: Option<&str>, name: &str) -> Result<u32, FragmentError> {
    field
        .and_then(|f| f.parse().ok())
        .ok_or_else(|| FragmentError::BadField(format!("{name} is not an unsigned decimal")))
}

/// Filenames travel raw inside the header, so anything that could break
/// header parsing or escape the output directory is rejected outright.
pub fn validate_filename(name: &str) -> Result<(), FragmentError> {
    if name.is_empty() {
        return Err(FragmentError::BadFilename("empty".into()));
    }
    if name.len() > MAX_FILENAME_LEN {
        return Err(FragmentError::BadFilename(format!(
            "{} bytes long (max {MAX_FILENAME_LEN})",
            name.len()
        )));
    }
    if name.contains([':', '/', '\0']) {
        return Err(FragmentError::BadFilename(format!(
            "{name:?} contains a reserved character"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_matches_wire_layout() {
        let frag = Fragment::new(3, 2, "x.bin", vec![0xab; 4]).unwrap();
        let wire = frag.encode();
        assert_eq!(&wire[..11], b"3:2:4:x.bin");
        assert_eq!(wire[11], b':');
        assert_eq!(&wire[12..], &[0xab; 4]);
    }

    #[test]
    fn roundtrip() {
        let frag = Fragment::new(7, 7, "notes.txt", b"tail".to_vec()).unwrap();
        let decoded = Fragment::decode(&frag.encode()).unwrap();
        assert_eq!(decoded, frag);
        assert!(decoded.is_last());
    }

    #[test]
    fn payload_may_contain_colons() {
        let frag = Fragment::new(1, 1, "a.bin", b"a:b:c:d:e".to_vec()).unwrap();
        let decoded = Fragment::decode(&frag.encode()).unwrap();
        assert_eq!(decoded.payload, b"a:b:c:d:e");
    }

    #[test]
    fn fewer_than_four_colons_is_truncated() {
        assert!(matches!(
            Fragment::decode(b"1:2:3:file-without-end"),
            Err(FragmentError::TruncatedHeader)
        ));
    }

    #[test]
    fn oversize_header_is_rejected() {
        let mut datagram = vec![b'9'; 600];
        datagram.extend_from_slice(b":1:1:f:");
        assert!(matches!(
            Fragment::decode(&datagram),
            Err(FragmentError::HeaderTooLong(_))
        ));
    }

    #[test]
    fn non_decimal_field_is_rejected() {
        assert!(matches!(
            Fragment::decode(b"one:1:0:f:"),
            Err(FragmentError::BadField(_))
        ));
    }

    #[test]
    fn declared_size_beyond_datagram_is_rejected() {
        assert!(matches!(
            Fragment::decode(b"1:1:50:f:short"),
            Err(FragmentError::ShortPayload { declared: 50, .. })
        ));
    }

    #[test]
    fn filename_rules() {
        assert!(validate_filename("report.pdf").is_ok());
        assert!(validate_filename("").is_err());
        assert!(validate_filename("a/b").is_err());
        assert!(validate_filename("a:b").is_err());
        assert!(validate_filename("a\0b").is_err());
        assert!(validate_filename(&"n".repeat(256)).is_err());
        assert!(Fragment::new(1, 1, "a/b", Vec::new()).is_err());
    }

    #[test]
    fn oversize_payload_is_rejected_at_build() {
        assert!(Fragment::new(1, 1, "f", vec![0; FRAGMENT_DATA_LEN + 1]).is_err());
    }

    #[test]
    fn sequence_numbers_are_range_checked() {
        assert!(Fragment::new(0, 1, "f", Vec::new()).is_err());
        assert!(Fragment::new(3, 0, "f", Vec::new()).is_err());
        assert!(Fragment::new(3, 4, "f", Vec::new()).is_err());
        assert!(matches!(
            Fragment::decode(b"2:3:0:f:"),
            Err(FragmentError::BadField(_))
        ));
    }
}
