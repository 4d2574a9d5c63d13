//! Encryption schemes supported by the voice server's secure RTP
//! negotiation, and the per-packet nonce discipline each one imposes.

use std::num::Wrapping;

use aes_gcm::Aes256Gcm;
use discortp::rtp::RtpPacket;
use xsalsa20poly1305::aead::generic_array::GenericArray;
use xsalsa20poly1305::aead::{AeadInPlace, Error as CryptoError};
use xsalsa20poly1305::{KeyInit, Nonce, Tag, XSalsa20Poly1305, KEY_SIZE, NONCE_SIZE, TAG_SIZE};

/// Width of an AES-GCM nonce: the 12-byte RTP header is used directly.
pub const GCM_NONCE_SIZE: usize = 12;

/// Length of the AES-GCM authentication tag, appended to the ciphertext.
pub const GCM_TAG_SIZE: usize = 16;

/// Variants of encryption negotiable with the voice server.
///
/// Only [`Lite`] is advertised during protocol selection; the remaining
/// modes are kept for interoperability, and a server answering with a mode
/// other than the one requested fails the handshake loudly.
///
/// [`Lite`]: #variant.Lite
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum CryptoMode {
    /// The RTP header is zero-padded out to the full 24-byte nonce.
    ///
    /// No extra packet overhead: the sequence number and timestamp are the
    /// varying quantities.
    Normal,
    /// A fresh random 24-byte nonce per packet, appended in full.
    ///
    /// Full nonce width at an extra 24B per packet (~1.2 kB/s).
    Suffix,
    /// A little-endian u32 counter as the nonce head, its 4 bytes appended
    /// as a packet trailer.
    ///
    /// Nonce width of 32 bits at an extra 4B per packet (~0.2 kB/s).
    Lite,
    /// AEAD AES-256-GCM; the 12-byte RTP header is the nonce, and the
    /// primitive's tag follows the ciphertext.
    Aes256Gcm,
}

impl CryptoMode {
    /// Returns the name of a mode as it appears during negotiation.
    pub fn to_request_str(self) -> &'static str {
        use CryptoMode::*;
        match self {
            Normal => "xsalsa20_poly1305",
            Suffix => "xsalsa20_poly1305_suffix",
            Lite => "xsalsa20_poly1305_lite",
            Aes256Gcm => "aead_aes256_gcm",
        }
    }

    /// Bytes reserved between the RTP header and the ciphertext.
    pub(crate) fn payload_prefix_len(self) -> usize {
        match self {
            CryptoMode::Aes256Gcm => 0,
            _ => TAG_SIZE,
        }
    }

    /// Bytes of nonce material trailing the ciphertext.
    pub(crate) fn nonce_trailer_len(self) -> usize {
        use CryptoMode::*;
        match self {
            Normal | Aes256Gcm => 0,
            Suffix => NONCE_SIZE,
            Lite => 4,
        }
    }

    /// Offset at which a plaintext frame is written before sealing.
    pub(crate) fn payload_offset(self) -> usize {
        RtpPacket::minimum_packet_size() + self.payload_prefix_len()
    }
}

/// Per-direction nonce state for one encrypted flow.
///
/// The reference implementation staged send and receive nonces through one
/// shared buffer; each direction here owns its state outright.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum CryptoState {
    Normal,
    Suffix,
    Lite(Wrapping<u32>),
    Aes256Gcm,
}

impl From<CryptoMode> for CryptoState {
    fn from(mode: CryptoMode) -> Self {
        use CryptoMode::*;
        match mode {
            Normal => CryptoState::Normal,
            Suffix => CryptoState::Suffix,
            Lite => CryptoState::Lite(Wrapping(0)),
            Aes256Gcm => CryptoState::Aes256Gcm,
        }
    }
}

impl CryptoState {
    pub(crate) fn kind(&self) -> CryptoMode {
        use CryptoState::*;
        match self {
            Normal => CryptoMode::Normal,
            Suffix => CryptoMode::Suffix,
            Lite(_) => CryptoMode::Lite,
            Aes256Gcm => CryptoMode::Aes256Gcm,
        }
    }
}

/// A negotiated session cipher.
#[derive(Clone)]
pub(crate) enum Cipher {
    XSalsa(XSalsa20Poly1305),
    Aes(Aes256Gcm),
}

impl Cipher {
    /// Builds the cipher for `mode` from a session key, if the key has the
    /// right length.
    pub(crate) fn new(mode: CryptoMode, key: &[u8]) -> Option<Self> {
        if key.len() != KEY_SIZE {
            return None;
        }

        Some(match mode {
            CryptoMode::Aes256Gcm => Cipher::Aes(Aes256Gcm::new(GenericArray::from_slice(key))),
            _ => Cipher::XSalsa(XSalsa20Poly1305::new(GenericArray::from_slice(key))),
        })
    }
}

impl std::fmt::Debug for Cipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Cipher::XSalsa(_) => "Cipher::XSalsa",
            Cipher::Aes(_) => "Cipher::Aes",
        })
    }
}

/// Seals the frame of `frame_len` bytes sitting at the mode's payload
/// offset of `packet`, whose first 12 bytes must already carry the stamped
/// RTP header.
///
/// Advances the nonce state where the mode keeps one. Returns the total
/// datagram length: header, tag, ciphertext, and any nonce trailer.
pub(crate) fn encrypt_in_place(
    state: &mut CryptoState,
    cipher: &Cipher,
    packet: &mut [u8],
    frame_len: usize,
) -> Result<usize, CryptoError> {
    let header_len = RtpPacket::minimum_packet_size();

    match cipher {
        Cipher::XSalsa(cipher) => {
            let payload_start = header_len + TAG_SIZE;
            let payload_end = payload_start + frame_len;

            let mut nonce = Nonce::default();
            let trailer_len = match state {
                CryptoState::Normal => {
                    nonce[..header_len].copy_from_slice(&packet[..header_len]);
                    0
                },
                CryptoState::Suffix => {
                    let suffix: [u8; NONCE_SIZE] = rand::random();
                    nonce.copy_from_slice(&suffix);
                    packet[payload_end..payload_end + NONCE_SIZE].copy_from_slice(&suffix);
                    NONCE_SIZE
                },
                CryptoState::Lite(counter) => {
                    // The counter advances before use: the first packet of a
                    // session carries nonce 1.
                    *counter += Wrapping(1);
                    let bytes = counter.0.to_le_bytes();
                    nonce[..bytes.len()].copy_from_slice(&bytes);
                    packet[payload_end..payload_end + bytes.len()].copy_from_slice(&bytes);
                    bytes.len()
                },
                CryptoState::Aes256Gcm => return Err(CryptoError),
            };

            let tag =
                cipher.encrypt_in_place_detached(&nonce, b"", &mut packet[payload_start..payload_end])?;
            packet[header_len..payload_start].copy_from_slice(&tag);

            Ok(payload_end + trailer_len)
        },
        Cipher::Aes(cipher) => {
            if !matches!(state, CryptoState::Aes256Gcm) {
                return Err(CryptoError);
            }

            let payload_end = header_len + frame_len;

            let mut nonce = [0u8; GCM_NONCE_SIZE];
            nonce.copy_from_slice(&packet[..GCM_NONCE_SIZE]);

            let tag = cipher.encrypt_in_place_detached(
                GenericArray::from_slice(&nonce),
                b"",
                &mut packet[header_len..payload_end],
            )?;
            packet[payload_end..payload_end + GCM_TAG_SIZE].copy_from_slice(&tag);

            Ok(payload_end + GCM_TAG_SIZE)
        },
    }
}

/// Opens a full inbound datagram in place, reconstructing the nonce from
/// wherever `mode` put it.
///
/// Returns the offset and length of the decrypted payload within `packet`.
pub(crate) fn decrypt_in_place(
    mode: CryptoMode,
    cipher: &Cipher,
    packet: &mut [u8],
) -> Result<(usize, usize), CryptoError> {
    let header_len = RtpPacket::minimum_packet_size();
    let len = packet.len();
    let trailer_len = mode.nonce_trailer_len();

    let tag_len = match cipher {
        Cipher::XSalsa(_) => TAG_SIZE,
        Cipher::Aes(_) => GCM_TAG_SIZE,
    };
    if len < header_len + tag_len + trailer_len {
        return Err(CryptoError);
    }

    let mut nonce = Nonce::default();
    match mode {
        CryptoMode::Normal | CryptoMode::Aes256Gcm => {
            nonce[..header_len].copy_from_slice(&packet[..header_len]);
        },
        CryptoMode::Suffix => {
            nonce.copy_from_slice(&packet[len - NONCE_SIZE..]);
        },
        CryptoMode::Lite => {
            nonce[..trailer_len].copy_from_slice(&packet[len - trailer_len..]);
        },
    }

    let body = &mut packet[header_len..len - trailer_len];

    match cipher {
        Cipher::XSalsa(cipher) => {
            if mode == CryptoMode::Aes256Gcm {
                return Err(CryptoError);
            }

            let (tag_bytes, ciphertext) = body.split_at_mut(TAG_SIZE);
            let tag = Tag::from_slice(tag_bytes);
            let ciphertext_len = ciphertext.len();

            cipher.decrypt_in_place_detached(&nonce, b"", ciphertext, tag)?;

            Ok((header_len + TAG_SIZE, ciphertext_len))
        },
        Cipher::Aes(cipher) => {
            if mode != CryptoMode::Aes256Gcm {
                return Err(CryptoError);
            }

            let split = body.len() - GCM_TAG_SIZE;
            let (ciphertext, tag_bytes) = body.split_at_mut(split);

            cipher.decrypt_in_place_detached(
                GenericArray::from_slice(&nonce[..GCM_NONCE_SIZE]),
                b"",
                ciphertext,
                GenericArray::from_slice(tag_bytes),
            )?;

            Ok((header_len, split))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::*;
    use discortp::rtp::MutableRtpPacket;

    fn stamped_packet(sequence: u16, timestamp: u32, ssrc: u32) -> [u8; VOICE_PACKET_MAX] {
        let mut packet = [0u8; VOICE_PACKET_MAX];
        let mut rtp = MutableRtpPacket::new(&mut packet[..]).unwrap();
        rtp.set_version(RTP_VERSION);
        rtp.set_payload_type(RTP_PROFILE_TYPE);
        rtp.set_sequence(sequence.into());
        rtp.set_timestamp(timestamp.into());
        rtp.set_ssrc(ssrc);
        packet
    }

    fn cipher_pair(mode: CryptoMode) -> (Cipher, CryptoState) {
        let key = [0u8; KEY_SIZE];
        (Cipher::new(mode, &key).unwrap(), CryptoState::from(mode))
    }

    #[test]
    fn request_strings_match_negotiation() {
        assert_eq!(CryptoMode::Normal.to_request_str(), "xsalsa20_poly1305");
        assert_eq!(CryptoMode::Suffix.to_request_str(), "xsalsa20_poly1305_suffix");
        assert_eq!(CryptoMode::Lite.to_request_str(), "xsalsa20_poly1305_lite");
        assert_eq!(CryptoMode::Aes256Gcm.to_request_str(), "aead_aes256_gcm");
    }

    #[test]
    fn short_keys_are_rejected() {
        assert!(Cipher::new(CryptoMode::Lite, &[0u8; 16]).is_none());
        assert!(Cipher::new(CryptoMode::Lite, &[0u8; KEY_SIZE]).is_some());
    }

    #[test]
    fn lite_packet_layout() {
        let (cipher, mut state) = cipher_pair(CryptoMode::Lite);
        let mut packet = stamped_packet(0, 0, 1);

        let offset = CryptoMode::Lite.payload_offset();
        packet[offset..offset + 20].copy_from_slice(&[0x55; 20]);

        let total = encrypt_in_place(&mut state, &cipher, &mut packet[..], 20).unwrap();

        assert_eq!(total, 12 + TAG_SIZE + 20 + 4);
        assert_eq!(
            &packet[..12],
            &[0x80, 0x78, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1],
        );
        // First nonce of a session is 1, placed little-endian.
        assert_eq!(&packet[total - 4..total], &[0x01, 0x00, 0x00, 0x00]);
        assert_eq!(state, CryptoState::Lite(std::num::Wrapping(1)));

        let (start, len) = decrypt_in_place(CryptoMode::Lite, &cipher, &mut packet[..total]).unwrap();
        assert_eq!((start, len), (28, 20));
        assert_eq!(&packet[start..start + len], &[0x55; 20][..]);
    }

    #[test]
    fn lite_counter_wraps_to_zero() {
        let (cipher, _) = cipher_pair(CryptoMode::Lite);
        let mut state = CryptoState::Lite(std::num::Wrapping(u32::MAX));
        let mut packet = stamped_packet(0, 0, 1);

        let total = encrypt_in_place(&mut state, &cipher, &mut packet[..], 20).unwrap();

        assert_eq!(&packet[total - 4..total], &[0x00, 0x00, 0x00, 0x00]);
        assert_eq!(state, CryptoState::Lite(std::num::Wrapping(0)));

        let (start, len) = decrypt_in_place(CryptoMode::Lite, &cipher, &mut packet[..total]).unwrap();
        assert_eq!(&packet[start..start + len], &[0u8; 20][..]);
    }

    #[test]
    fn every_mode_round_trips() {
        for &mode in &[
            CryptoMode::Normal,
            CryptoMode::Suffix,
            CryptoMode::Lite,
            CryptoMode::Aes256Gcm,
        ] {
            let (cipher, mut state) = cipher_pair(mode);
            let mut packet = stamped_packet(99, 4800, 0xDEAD_BEEF);

            let offset = mode.payload_offset();
            let frame: Vec<u8> = (0..OPUS_FRAME_SIZE).map(|i| i as u8).collect();
            packet[offset..offset + frame.len()].copy_from_slice(&frame);

            let total =
                encrypt_in_place(&mut state, &cipher, &mut packet[..], frame.len()).unwrap();
            let (start, len) =
                decrypt_in_place(mode, &cipher, &mut packet[..total]).unwrap();

            assert_eq!(len, frame.len(), "mode {:?}", mode);
            assert_eq!(&packet[start..start + len], &frame[..], "mode {:?}", mode);
        }
    }

    #[test]
    fn tampered_packets_fail_to_open() {
        let (cipher, mut state) = cipher_pair(CryptoMode::Lite);
        let mut packet = stamped_packet(0, 0, 1);

        let total = encrypt_in_place(&mut state, &cipher, &mut packet[..], 20).unwrap();
        packet[mem_offset(total)] ^= 0x01;

        assert!(decrypt_in_place(CryptoMode::Lite, &cipher, &mut packet[..total]).is_err());
    }

    fn mem_offset(total: usize) -> usize {
        // Flip a ciphertext byte, not the trailer.
        total - 8
    }

    #[test]
    fn truncated_packets_fail_to_open() {
        let (cipher, _) = cipher_pair(CryptoMode::Lite);
        let mut short = [0u8; 16];

        assert!(decrypt_in_place(CryptoMode::Lite, &cipher, &mut short[..]).is_err());
    }
}
