//! codec.rs
//! Wire format between the telemetry server and the ingestion client.
//!
//! Newline-delimited JSON: one UTF-8 object per line, `\n` terminated.
//! Field names follow the pendulum rig (`Time`, `Setpoint`, `Valor Medido`,
//! `Error`, `P`, `I`, `D`); lowercase aliases are accepted on decode. Missing
//! numeric fields read as 0.0, a missing `Error` stays unset.
//!
//! `FrameDecoder` reassembles lines from arbitrary socket reads: a read may
//! hold half a record, several records, or the tail of one and the head of
//! the next.

use serde::{Deserialize, Serialize};

use crate::control::sample::Sample;
use crate::error::DecodeError;

pub const MAX_FRAME_LEN: usize = 64 * 1024;
const DELIMITER: u8 = b'\n';

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireRecord {
    #[serde(rename = "Time", alias = "time", default)]
    pub time: f64,
    #[serde(rename = "Setpoint", alias = "setpoint", default)]
    pub setpoint: f64,
    #[serde(rename = "Valor Medido", alias = "measured", default)]
    pub measured: f64,
    #[serde(
        rename = "Error",
        alias = "error",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub error: Option<f64>,
    #[serde(rename = "P", alias = "p", default)]
    pub p: f64,
    #[serde(rename = "I", alias = "i", default)]
    pub i: f64,
    #[serde(rename = "D", alias = "d", default)]
    pub d: f64,
}

impl From<WireRecord> for Sample {
    fn from(r: WireRecord) -> Self {
        Sample {
            time: r.time,
            setpoint: r.setpoint,
            measured: r.measured,
            error: r.error,
            p: r.p,
            i: r.i,
            d: r.d,
        }
    }
}

impl From<&Sample> for WireRecord {
    fn from(s: &Sample) -> Self {
        WireRecord {
            time: s.time,
            setpoint: s.setpoint,
            measured: s.measured,
            error: s.error,
            p: s.p,
            i: s.i,
            d: s.d,
        }
    }
}

/// Encodes one sample as a complete, newline-terminated frame.
pub fn encode_frame(sample: &Sample) -> serde_json::Result<Vec<u8>> {
    let mut frame = serde_json::to_vec(&WireRecord::from(sample))?;
    frame.push(DELIMITER);
    Ok(frame)
}

/// Decodes one frame body (delimiter already stripped).
pub fn decode_record(frame: &[u8]) -> Result<Sample, DecodeError> {
    let text = std::str::from_utf8(frame)?;
    let record: WireRecord = serde_json::from_str(text.trim())?;
    Ok(record.into())
}

/// Incremental line splitter with a per-frame size cap.
#[derive(Debug)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    max_len: usize,
    /// Set after an oversized frame was reported; bytes are dropped until
    /// the next delimiter.
    discarding: bool,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::with_max_len(MAX_FRAME_LEN)
    }
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Feeds one read's worth of bytes and returns every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Result<Vec<u8>, DecodeError>> {
        let mut frames = Vec::new();
        self.buf.extend_from_slice(chunk);

        let mut start = 0;
        while let Some(offset) = self.buf[start..].iter().position(|&b| b == DELIMITER) {
            let end = start + offset;
            let line = &self.buf[start..end];
            start = end + 1;

            if self.discarding {
                self.discarding = false;
                continue;
            }
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            if line.len() > self.max_len {
                frames.push(Err(DecodeError::FrameTooLong {
                    len: line.len(),
                    max: self.max_len,
                }));
                continue;
            }
            frames.push(Ok(line.to_vec()));
        }
        self.buf.drain(..start);

        if self.buf.len() > self.max_len {
            if !self.discarding {
                frames.push(Err(DecodeError::FrameTooLong {
                    len: self.buf.len(),
                    max: self.max_len,
                }));
            }
            self.discarding = true;
            self.buf.clear();
        }

        frames
    }

    /// Flushes an unterminated trailing frame once the peer has closed.
    pub fn finish(&mut self) -> Option<Result<Vec<u8>, DecodeError>> {
        let rest = std::mem::take(&mut self.buf);
        if std::mem::take(&mut self.discarding) {
            return None;
        }
        let rest = rest.strip_suffix(b"\r").unwrap_or(&rest);
        if rest.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(Ok(rest.to_vec()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frames_ok(results: Vec<Result<Vec<u8>, DecodeError>>) -> Vec<Vec<u8>> {
        results.into_iter().map(|r| r.unwrap()).collect()
    }

    #[test]
    fn sample_survives_the_wire() {
        let sample = Sample {
            time: 0.3,
            setpoint: 50.0,
            measured: 48.5,
            error: Some(1.5),
            p: 0.1,
            i: 0.05,
            d: 0.01,
        };
        let frame = encode_frame(&sample).unwrap();
        assert_eq!(frame.last(), Some(&b'\n'));

        let decoded = decode_record(&frame[..frame.len() - 1]).unwrap();
        assert_eq!(decoded, sample);
    }

    #[test]
    fn rig_field_names_are_used_on_the_wire() {
        let frame = encode_frame(&Sample::new(1.0, 2.0, 3.0)).unwrap();
        let text = String::from_utf8(frame).unwrap();
        assert!(text.contains("\"Valor Medido\":3.0"));
        assert!(text.contains("\"Setpoint\":2.0"));
        assert!(!text.contains("Error"));
    }

    #[test]
    fn partial_records_default_missing_fields() {
        let sample = decode_record(br#"{"Time": 2.5, "Setpoint": 50}"#).unwrap();
        assert_eq!(sample.time, 2.5);
        assert_eq!(sample.setpoint, 50.0);
        assert_eq!(sample.measured, 0.0);
        assert_eq!(sample.error, None);
        assert_eq!((sample.p, sample.i, sample.d), (0.0, 0.0, 0.0));

        let lower = decode_record(br#"{"measured": 4.0, "error": 1.0}"#).unwrap();
        assert_eq!(lower.measured, 4.0);
        assert_eq!(lower.error, Some(1.0));
    }

    #[test]
    fn malformed_payloads_are_decode_errors() {
        assert!(matches!(decode_record(b"{not json"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_record(b"[1, 2]"), Err(DecodeError::Json(_))));
        assert!(matches!(decode_record(&[0xff, 0xfe]), Err(DecodeError::Utf8(_))));
        assert!(matches!(
            decode_record(br#"{"Time": "soon"}"#),
            Err(DecodeError::Json(_))
        ));
    }

    #[test]
    fn split_and_concatenated_reads_reassemble() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"{\"Time\":1").is_empty());
        assert_eq!(decoder.pending(), 9);

        let frames = frames_ok(decoder.push(b"}\n{\"Time\":2}\n{\"Ti"));
        assert_eq!(frames, vec![b"{\"Time\":1}".to_vec(), b"{\"Time\":2}".to_vec()]);

        let frames = frames_ok(decoder.push(b"me\":3}\r\n\n"));
        assert_eq!(frames, vec![b"{\"Time\":3}".to_vec()]);
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn oversized_frame_is_reported_once_and_skipped() {
        let mut decoder = FrameDecoder::with_max_len(8);
        let results = decoder.push(b"0123456789");
        assert_eq!(results.len(), 1);
        assert!(matches!(
            results[0],
            Err(DecodeError::FrameTooLong { max: 8, .. })
        ));

        // Rest of the long line is dropped, the next line comes through.
        assert!(decoder.push(b"abcdef").is_empty());
        let frames = frames_ok(decoder.push(b"xyz\n{}\n"));
        assert_eq!(frames, vec![b"{}".to_vec()]);
    }

    #[test]
    fn finish_returns_unterminated_tail() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"{\"P\":0.1}").is_empty());
        let tail = decoder.finish().unwrap().unwrap();
        assert_eq!(decode_record(&tail).unwrap().p, 0.1);
        assert!(decoder.finish().is_none());
    }
}
