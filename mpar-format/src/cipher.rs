use std::fmt;
use std::str::FromStr;

pub mod constants {
    pub const CIPHER_XOR: &str = "XOR";
    pub const CIPHER_ROT: &str = "ROT";
}

use self::constants::*;

/// Reversible byte obfuscation. Not encryption in any cryptographic sense.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Cipher {
    Xor,
    Rot,
    Unknown(String),
}

impl Cipher {
    pub const fn available_variants() -> &'static [&'static str] {
        &[CIPHER_XOR, CIPHER_ROT]
    }

    pub fn name(&self) -> &str {
        match self {
            Cipher::Xor => CIPHER_XOR,
            Cipher::Rot => CIPHER_ROT,
            Cipher::Unknown(name) => name,
        }
    }
}

impl fmt::Display for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cipher::Unknown(name) => write!(f, "Unknown({:?})", name),
            known => f.write_str(known.name()),
        }
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl FromStr for Cipher {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            CIPHER_XOR => Cipher::Xor,
            CIPHER_ROT => Cipher::Rot,
            other => Cipher::Unknown(other.to_string()),
        })
    }
}

// Both transforms pick the key byte from the buffer *length*, not the byte
// position, so every byte of a buffer is shifted by the same key element.
// Archives in the wild depend on this.
#[inline]
fn key_index(len: usize, key_len: usize) -> usize {
    len % key_len
}

pub fn xor_in_place(bytes: &mut [u8], key: &[u8]) {
    if key.is_empty() {
        return;
    }
    let k = key[key_index(bytes.len(), key.len())];
    for b in bytes.iter_mut() {
        *b ^= k;
    }
}

/// Adds the selected key element to each byte, modulo 256. Pass `negate` to
/// undo a previous rotation.
pub fn rot_in_place(bytes: &mut [u8], key: &[i32], negate: bool) {
    if key.is_empty() {
        return;
    }
    let k = key[key_index(bytes.len(), key.len())];
    let k = if negate { k.wrapping_neg() } else { k };
    for b in bytes.iter_mut() {
        *b = (*b as i32).wrapping_add(k) as u8;
    }
}

/// What to do with one cipher's key in a [`CipherConfig::apply`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyChange<T> {
    Keep,
    Set(T),
    Disable,
}

impl<T> Default for KeyChange<T> {
    fn default() -> Self {
        KeyChange::Keep
    }
}

/// Keys for the two ciphers. `None` disables a cipher; an empty key keeps it
/// enabled but leaves bytes unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CipherConfig {
    xor_key: Option<Vec<u8>>,
    rot_key: Option<Vec<i32>>,
}

impl CipherConfig {
    pub fn new(xor_key: Option<Vec<u8>>, rot_key: Option<Vec<i32>>) -> CipherConfig {
        CipherConfig { xor_key, rot_key }
    }

    pub fn xor_key(&self) -> Option<&[u8]> {
        self.xor_key.as_deref()
    }

    pub fn rot_key(&self) -> Option<&[i32]> {
        self.rot_key.as_deref()
    }

    pub fn set_xor_key(&mut self, key: Option<Vec<u8>>) {
        self.xor_key = key;
    }

    pub fn set_rot_key(&mut self, key: Option<Vec<i32>>) {
        self.rot_key = key;
    }

    pub fn apply(&mut self, xor: KeyChange<Vec<u8>>, rot: KeyChange<Vec<i32>>) {
        match xor {
            KeyChange::Keep => {}
            KeyChange::Set(key) => self.xor_key = Some(key),
            KeyChange::Disable => self.xor_key = None,
        }
        match rot {
            KeyChange::Keep => {}
            KeyChange::Set(key) => self.rot_key = Some(key),
            KeyChange::Disable => self.rot_key = None,
        }
    }

    pub fn is_enabled(&self, cipher: &Cipher) -> bool {
        match cipher {
            Cipher::Xor => self.xor_key.is_some(),
            Cipher::Rot => self.rot_key.is_some(),
            Cipher::Unknown(_) => false,
        }
    }

    /// Enabled ciphers in application order.
    pub fn active(&self) -> Vec<Cipher> {
        let mut active = Vec::with_capacity(2);
        if self.xor_key.is_some() {
            active.push(Cipher::Xor);
        }
        if self.rot_key.is_some() {
            active.push(Cipher::Rot);
        }
        active
    }

    /// XOR, then ROT.
    pub fn encrypt(&self, bytes: &mut [u8]) {
        if let Some(key) = &self.xor_key {
            xor_in_place(bytes, key);
        }
        if let Some(key) = &self.rot_key {
            rot_in_place(bytes, key, false);
        }
    }

    /// Inverse of [`CipherConfig::encrypt`], restricted to the ciphers in
    /// `declared`.
    pub fn decrypt(&self, bytes: &mut [u8], declared: &[Cipher]) {
        if let Some(key) = self.rot_key.as_deref().filter(|_| declared.contains(&Cipher::Rot)) {
            rot_in_place(bytes, key, true);
        }
        if let Some(key) = self.xor_key.as_deref().filter(|_| declared.contains(&Cipher::Xor)) {
            xor_in_place(bytes, key);
        }
    }
}
