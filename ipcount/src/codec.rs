//! Dotted-decimal IPv4 codec.
//!
//! Converts `a.b.c.d` text into the 32-bit address `a<<24 | b<<16 | c<<8 | d`
//! used to index the presence bitmap. Decoding works on raw bytes so the
//! parallel scanner can feed slices of mapped memory straight in.

use std::net::Ipv4Addr;
use thiserror::Error;

/// Longest valid literal, `255.255.255.255`.
pub const MAX_LITERAL_LEN: usize = 15;

/// Why a line failed to decode.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Malformed {
    #[error("expected 4 dot-separated parts")]
    PartCount,
    #[error("empty octet")]
    Empty,
    #[error("non-digit byte {0:#04x} in octet")]
    NotDigit(u8),
    #[error("octet has more than 3 digits")]
    TooLong,
    #[error("octet value {0} out of range")]
    OutOfRange(u16),
}

/// Decodes one dotted-decimal address.
///
/// Each octet is 1 to 3 ASCII digits in `[0, 255]`; leading zeros are
/// accepted. Surrounding whitespace is not trimmed here.
///
/// # Examples
///
/// ```
/// use ipcount::codec::decode;
///
/// assert_eq!(decode(b"1.2.3.4"), Ok(0x01020304));
/// assert!(decode(b"999.1.1.1").is_err());
/// ```
pub fn decode(text: &[u8]) -> Result<u32, Malformed> {
    let mut addr = 0u32;
    let mut parts = 0usize;

    for part in text.split(|&b| b == b'.') {
        if parts == 4 {
            return Err(Malformed::PartCount);
        }
        addr = (addr << 8) | u32::from(decode_octet(part)?);
        parts += 1;
    }

    if parts != 4 {
        return Err(Malformed::PartCount);
    }
    Ok(addr)
}

/// `&str` convenience wrapper around [`decode`].
pub fn decode_str(text: &str) -> Result<u32, Malformed> {
    decode(text.as_bytes())
}

fn decode_octet(part: &[u8]) -> Result<u8, Malformed> {
    if part.is_empty() {
        return Err(Malformed::Empty);
    }
    if part.len() > 3 {
        return Err(Malformed::TooLong);
    }

    let mut value = 0u16;
    for &b in part {
        if !b.is_ascii_digit() {
            return Err(Malformed::NotDigit(b));
        }
        value = value * 10 + u16::from(b - b'0');
    }

    u8::try_from(value).map_err(|_| Malformed::OutOfRange(value))
}

/// Formats an address back into dotted-decimal form.
pub fn encode(addr: u32) -> Ipv4Addr {
    Ipv4Addr::from(addr)
}
