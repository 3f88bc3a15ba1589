//! RFC 4648 base64 with `=` padding and no line wrapping.

const ALPHABET: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const PAD: u8 = b'=';
const INVALID: u8 = 0xFF;

const DECODE_TABLE: [u8; 256] = make_decode_table();

const fn make_decode_table() -> [u8; 256] {
    let mut table = [INVALID; 256];
    let mut i = 0;
    while i < 64 {
        table[ALPHABET[i] as usize] = i as u8;
        i += 1;
    }
    table
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Base64Error {
    #[error("base64 input is empty")]
    Empty,

    #[error("base64 input length {0} is not a multiple of 4")]
    Length(usize),

    #[error("invalid base64 byte {byte:#04x} at offset {offset}")]
    InvalidByte { offset: usize, byte: u8 },

    #[error("misplaced base64 padding at offset {0}")]
    Padding(usize),
}

pub const fn encoded_len(len: usize) -> usize {
    (len + 2) / 3 * 4
}

pub fn encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(encoded_len(bytes.len()));

    for chunk in bytes.chunks(3) {
        let b0 = chunk[0] as u32;
        let b1 = chunk.get(1).copied().unwrap_or(0) as u32;
        let b2 = chunk.get(2).copied().unwrap_or(0) as u32;
        let triple = (b0 << 16) | (b1 << 8) | b2;

        out.push(ALPHABET[(triple >> 18) as usize & 0x3F] as char);
        out.push(ALPHABET[(triple >> 12) as usize & 0x3F] as char);
        out.push(if chunk.len() > 1 {
            ALPHABET[(triple >> 6) as usize & 0x3F] as char
        } else {
            PAD as char
        });
        out.push(if chunk.len() > 2 {
            ALPHABET[triple as usize & 0x3F] as char
        } else {
            PAD as char
        });
    }

    out
}

pub fn decode<T: AsRef<[u8]> + ?Sized>(input: &T) -> Result<Vec<u8>, Base64Error> {
    let input = input.as_ref();

    if input.is_empty() {
        return Err(Base64Error::Empty);
    }
    if input.len() % 4 != 0 {
        return Err(Base64Error::Length(input.len()));
    }

    let padding = input.iter().rev().take_while(|&&b| b == PAD).count();
    if padding > 2 {
        return Err(Base64Error::Padding(input.len() - padding));
    }
    let body = &input[..input.len() - padding];

    let mut out = Vec::with_capacity(input.len() / 4 * 3 - padding);
    let mut acc: u32 = 0;
    let mut bits = 0;

    for (offset, &byte) in body.iter().enumerate() {
        let value = DECODE_TABLE[byte as usize];
        if value == INVALID {
            if byte == PAD {
                return Err(Base64Error::Padding(offset));
            }
            return Err(Base64Error::InvalidByte { offset, byte });
        }

        acc = (acc << 6) | value as u32;
        bits += 6;
        if bits >= 8 {
            bits -= 8;
            out.push((acc >> bits) as u8);
            acc &= (1 << bits) - 1;
        }
    }

    Ok(out)
}
