//! Body schema (§6.2): a tag byte, the `Header`, and the variant's own
//! fields, all little-endian, written in the order declared in §3.
//!
//! This is a small hand-rolled writer/reader rather than a derive —
//! matching the teacher's `core/frame.rs`, which serializes by slicing
//! a byte buffer directly instead of reaching for `serde`.

use crate::error::{Error, Result};
use crate::message::{ConfigRequestData, GpsData, Header, LocEstData, Message, PingData};

struct BodyWriter {
    buf: Vec<u8>,
}

impl BodyWriter {
    fn new(tag: u8) -> Self {
        Self { buf: vec![tag] }
    }

    fn u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn i32(&mut self, v: i32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f32(&mut self, v: f32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn f64(&mut self, v: f64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn bool(&mut self, v: bool) {
        self.buf.push(v as u8);
    }

    fn u32_list(&mut self, values: &[u32]) {
        self.u32(values.len() as u32);
        for &v in values {
            self.u32(v);
        }
    }

    fn header(&mut self, header: &Header) {
        self.u32(header.packet_id);
        self.bool(header.need_ack);
        self.u64(header.timestamp);
    }

    fn finish(self) -> Vec<u8> {
        self.buf
    }
}

struct BodyReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> BodyReader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.buf.len() < self.pos + n {
            return Err(Error::MalformedBody);
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bool(&mut self) -> Result<bool> {
        Ok(self.take(1)?[0] != 0)
    }

    fn u32_list(&mut self) -> Result<Vec<u32>> {
        let count = self.u32()? as usize;
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.u32()?);
        }
        Ok(out)
    }

    fn header(&mut self) -> Result<Header> {
        let packet_id = self.u32()?;
        let need_ack = self.bool()?;
        let timestamp = self.u64()?;
        Ok(Header {
            packet_id,
            need_ack,
            timestamp,
        })
    }

    fn expect_exhausted(&self) -> Result<()> {
        if self.pos != self.buf.len() {
            return Err(Error::MalformedBody);
        }
        Ok(())
    }
}

/// Serializes a message's body (tag + header + variant fields).
pub fn serialize(msg: &Message) -> Vec<u8> {
    let mut w = BodyWriter::new(msg.tag());
    w.header(msg.header());
    match msg {
        Message::Ack { ack_id, .. } => w.u32(*ack_id),
        Message::SyncRequest { .. } => {}
        Message::SyncResponse { success, .. } => w.bool(*success),
        Message::ConfigRequest { body, .. } => {
            w.f32(body.gain);
            w.u32(body.sampling_rate);
            w.u32(body.center_frequency);
            w.u32(body.run_num);
            w.bool(body.enable_test_data);
            w.u32(body.ping_width_ms);
            w.i32(body.ping_min_snr);
            w.f32(body.ping_max_len_mult);
            w.f32(body.ping_min_len_mult);
            w.u32_list(&body.target_frequencies);
        }
        Message::ConfigResponse { success, .. } => w.bool(*success),
        Message::GPS { body, .. } => {
            w.f64(body.easting);
            w.f64(body.northing);
            w.f64(body.altitude);
            w.f64(body.heading);
            w.u32(body.epsg_code);
        }
        Message::Ping { body, .. } => {
            w.u32(body.frequency);
            w.f64(body.amplitude);
            w.f64(body.easting);
            w.f64(body.northing);
            w.f64(body.altitude);
            w.u32(body.epsg_code);
        }
        Message::LocEst { body, .. } => {
            w.u32(body.frequency);
            w.f64(body.easting);
            w.f64(body.northing);
            w.u32(body.epsg_code);
        }
        Message::StartRequest { .. } => {}
        Message::StartResponse { success, .. } => w.bool(*success),
        Message::StopRequest { .. } => {}
        Message::StopResponse { success, .. } => w.bool(*success),
        Message::Error { .. } => {}
    }
    w.finish()
}

/// Parses a message body. `buf` excludes the framing (sync/length/crc).
pub fn deserialize(buf: &[u8]) -> Result<Message> {
    if buf.is_empty() {
        return Err(Error::MalformedBody);
    }
    let tag = buf[0];
    let mut r = BodyReader::new(&buf[1..]);
    let header = r.header()?;

    let msg = match tag {
        0 => {
            let ack_id = r.u32()?;
            r.expect_exhausted()?;
            Message::Ack { header, ack_id }
        }
        1 => {
            r.expect_exhausted()?;
            Message::SyncRequest { header }
        }
        2 => {
            let success = r.bool()?;
            r.expect_exhausted()?;
            Message::SyncResponse { header, success }
        }
        3 => {
            let gain = r.f32()?;
            let sampling_rate = r.u32()?;
            let center_frequency = r.u32()?;
            let run_num = r.u32()?;
            let enable_test_data = r.bool()?;
            let ping_width_ms = r.u32()?;
            let ping_min_snr = r.i32()?;
            let ping_max_len_mult = r.f32()?;
            let ping_min_len_mult = r.f32()?;
            let target_frequencies = r.u32_list()?;
            r.expect_exhausted()?;
            Message::ConfigRequest {
                header,
                body: ConfigRequestData {
                    gain,
                    sampling_rate,
                    center_frequency,
                    run_num,
                    enable_test_data,
                    ping_width_ms,
                    ping_min_snr,
                    ping_max_len_mult,
                    ping_min_len_mult,
                    target_frequencies,
                },
            }
        }
        4 => {
            let success = r.bool()?;
            r.expect_exhausted()?;
            Message::ConfigResponse { header, success }
        }
        5 => {
            let easting = r.f64()?;
            let northing = r.f64()?;
            let altitude = r.f64()?;
            let heading = r.f64()?;
            let epsg_code = r.u32()?;
            r.expect_exhausted()?;
            Message::GPS {
                header,
                body: GpsData {
                    easting,
                    northing,
                    altitude,
                    heading,
                    epsg_code,
                },
            }
        }
        6 => {
            let frequency = r.u32()?;
            let amplitude = r.f64()?;
            let easting = r.f64()?;
            let northing = r.f64()?;
            let altitude = r.f64()?;
            let epsg_code = r.u32()?;
            r.expect_exhausted()?;
            Message::Ping {
                header,
                body: PingData {
                    frequency,
                    amplitude,
                    easting,
                    northing,
                    altitude,
                    epsg_code,
                },
            }
        }
        7 => {
            let frequency = r.u32()?;
            let easting = r.f64()?;
            let northing = r.f64()?;
            let epsg_code = r.u32()?;
            r.expect_exhausted()?;
            Message::LocEst {
                header,
                body: LocEstData {
                    frequency,
                    easting,
                    northing,
                    epsg_code,
                },
            }
        }
        8 => {
            r.expect_exhausted()?;
            Message::StartRequest { header }
        }
        9 => {
            let success = r.bool()?;
            r.expect_exhausted()?;
            Message::StartResponse { header, success }
        }
        10 => {
            r.expect_exhausted()?;
            Message::StopRequest { header }
        }
        11 => {
            let success = r.bool()?;
            r.expect_exhausted()?;
            Message::StopResponse { header, success }
        }
        12 => {
            r.expect_exhausted()?;
            Message::Error { header }
        }
        other => return Err(Error::UnknownTag(other)),
    };

    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Header;

    fn header() -> Header {
        Header {
            packet_id: 1234,
            need_ack: false,
            timestamp: 999_999,
        }
    }

    #[test]
    fn ack_roundtrip() {
        let msg = Message::Ack {
            header: header(),
            ack_id: 5678,
        };
        let bytes = serialize(&msg);
        assert_eq!(deserialize(&bytes).unwrap(), msg);
    }

    #[test]
    fn config_request_roundtrip_with_list() {
        let msg = Message::ConfigRequest {
            header: header(),
            body: ConfigRequestData {
                gain: 10.5,
                sampling_rate: 2_000_000,
                center_frequency: 150_000_000,
                run_num: 3,
                enable_test_data: true,
                ping_width_ms: 25,
                ping_min_snr: 10,
                ping_max_len_mult: 1.5,
                ping_min_len_mult: 0.5,
                target_frequencies: vec![150_000_000, 151_000_000, 152_000_000],
            },
        };
        let bytes = serialize(&msg);
        assert_eq!(deserialize(&bytes).unwrap(), msg);
    }

    #[test]
    fn empty_target_frequencies_roundtrip() {
        let msg = Message::ConfigRequest {
            header: header(),
            body: ConfigRequestData {
                gain: 0.0,
                sampling_rate: 0,
                center_frequency: 0,
                run_num: 0,
                enable_test_data: false,
                ping_width_ms: 0,
                ping_min_snr: 0,
                ping_max_len_mult: 0.0,
                ping_min_len_mult: 0.0,
                target_frequencies: vec![],
            },
        };
        let bytes = serialize(&msg);
        assert_eq!(deserialize(&bytes).unwrap(), msg);
    }

    #[test]
    fn unknown_tag_rejected() {
        let mut bytes = serialize(&Message::SyncRequest { header: header() });
        bytes[0] = 0xFF;
        assert!(matches!(deserialize(&bytes), Err(Error::UnknownTag(0xFF))));
    }

    #[test]
    fn truncated_body_rejected() {
        let bytes = serialize(&Message::GPS {
            header: header(),
            body: GpsData {
                easting: 1.0,
                northing: 2.0,
                altitude: 3.0,
                heading: 4.0,
                epsg_code: 4326,
            },
        });
        let truncated = &bytes[..bytes.len() - 4];
        assert!(matches!(deserialize(truncated), Err(Error::MalformedBody)));
    }
}
