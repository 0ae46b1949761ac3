//! MultiWii Serial Protocol framing.
//!
//! Requests are `$M<` + size + code + payload + checksum, replies use `$M>` (or `$M!` when the
//! flight controller rejects the request). The checksum is the XOR of size, code and payload.

use std::io::Read;

use crate::error::HoverError;

const PREAMBLE: [u8; 2] = [b'$', b'M'];
const TO_FC: u8 = b'<';
const FROM_FC: u8 = b'>';
const REJECTED: u8 = b'!';

/// Message codes used by the hover controller
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum MspCode {
    Attitude = 108,
    SetRawRc = 200,
}

impl TryFrom<u8> for MspCode {
    type Error = HoverError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            108 => Ok(MspCode::Attitude),
            200 => Ok(MspCode::SetRawRc),
            _ => Err(HoverError::Protocol(format!("unexpected message code {}", code))),
        }
    }
}

fn checksum(size: u8, code: u8, payload: &[u8]) -> u8 {
    payload.iter().fold(size ^ code, |sum, byte| sum ^ byte)
}

/// Frame a request for the flight controller
pub fn encode_request(code: MspCode, payload: &[u8]) -> Result<Vec<u8>, HoverError> {
    let size = u8::try_from(payload.len())
        .map_err(|_| HoverError::Protocol(format!("payload of {} bytes is too long", payload.len())))?;
    let mut frame = Vec::with_capacity(payload.len() + 6);
    frame.extend_from_slice(&PREAMBLE);
    frame.push(TO_FC);
    frame.push(size);
    frame.push(code as u8);
    frame.extend_from_slice(payload);
    frame.push(checksum(size, code as u8, payload));
    Ok(frame)
}

/// Read one reply frame, returns its code and payload
pub fn read_reply<R: Read>(port: &mut R) -> Result<(u8, Vec<u8>), HoverError> {
    let mut header = [0; 5];
    port.read_exact(&mut header)?;
    if header[..2] != PREAMBLE {
        return Err(HoverError::Protocol(format!("bad preamble {:?}", &header[..2])));
    }
    let (direction, size, code) = (header[2], header[3], header[4]);

    let mut payload = vec![0; usize::from(size) + 1];
    port.read_exact(&mut payload)?;
    let received = payload.pop().unwrap_or_default();
    let expected = checksum(size, code, &payload);
    if received != expected {
        return Err(HoverError::Protocol(format!(
            "checksum mismatch on code {}: got {:#04x}, expected {:#04x}",
            code, received, expected
        )));
    }

    match direction {
        FROM_FC => Ok((code, payload)),
        REJECTED => Err(HoverError::Protocol(format!("flight controller rejected code {}", code))),
        other => Err(HoverError::Protocol(format!("bad direction byte {:#04x}", other))),
    }
}

/// Little endian u16 channel payload for `MSP_SET_RAW_RC`
pub fn rc_payload(channels: &[f64]) -> Vec<u8> {
    channels
        .iter()
        .flat_map(|channel| (channel.round().clamp(0.0, f64::from(u16::MAX)) as u16).to_le_bytes())
        .collect()
}

/// Decode an `MSP_ATTITUDE` payload into (roll, pitch, heading) degrees
pub fn attitude_payload(payload: &[u8]) -> Result<[f64; 3], HoverError> {
    if payload.len() < 6 {
        return Err(HoverError::Protocol(format!("attitude payload of {} bytes", payload.len())));
    }
    let word = |i: usize| f64::from(i16::from_le_bytes([payload[i], payload[i + 1]]));
    // angles come in tenths of degree, heading in degrees
    Ok([word(0) / 10.0, word(2) / 10.0, word(4)])
}

#[cfg(test)]
pub(crate) fn encode_reply(code: u8, payload: &[u8]) -> Vec<u8> {
    let size = payload.len() as u8;
    let mut frame = PREAMBLE.to_vec();
    frame.push(FROM_FC);
    frame.push(size);
    frame.push(code);
    frame.extend_from_slice(payload);
    frame.push(checksum(size, code, payload));
    frame
}
