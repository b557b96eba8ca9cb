//! Defines the Address Validation token and the validator that decides whether an
//! inbound token proves the peer owns the address it's sending from.

use crate::inet::{SocketAddress, SocketAddressV4, SocketAddressV6, Unspecified};
use core::mem::size_of;
use s2n_codec::{decoder_value, DecoderBuffer, DecoderError, Encoder, EncoderValue};

/// QUIC connection ids are at most 20 bytes (RFC 9000 section 17.2).
pub const MAX_CONNECTION_ID_LEN: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenType {
    RetryToken,
    NewToken,
}

impl<'a> EncoderValue for TokenType {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        match self {
            TokenType::RetryToken => 0u8.encode(buffer),
            TokenType::NewToken => 1u8.encode(buffer),
        }
    }
}

decoder_value!(
    impl<'a> TokenType {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (value, buffer) = buffer.decode::<u8>()?;
            match value {
                0x00 => Ok((TokenType::RetryToken, buffer)),
                0x01 => Ok((TokenType::NewToken, buffer)),
                _ => Err(DecoderError::InvariantViolation("Invalid token type")),
            }
        }
    }
);

/// The client's original destination connection id, carried inside a RETRY token so
/// it can be echoed back in the server's transport parameters once the handshake
/// completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OriginalDestinationConnectionId {
    len: u8,
    bytes: [u8; MAX_CONNECTION_ID_LEN],
}

impl OriginalDestinationConnectionId {
    pub fn try_from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_CONNECTION_ID_LEN {
            return None;
        }
        let mut storage = [0u8; MAX_CONNECTION_ID_LEN];
        storage[..bytes.len()].copy_from_slice(bytes);
        Some(Self {
            len: bytes.len() as u8,
            bytes: storage,
        })
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<'a> EncoderValue for OriginalDestinationConnectionId {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.len);
        buffer.encode(&self.as_bytes());
        // pad out to a fixed wire size so every token has the same length
        buffer.write_repeated(MAX_CONNECTION_ID_LEN - self.len(), 0);
    }
}

decoder_value!(
    impl<'a> OriginalDestinationConnectionId {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (len, buffer) = buffer.decode::<u8>()?;
            if len as usize > MAX_CONNECTION_ID_LEN {
                return Err(DecoderError::InvariantViolation(
                    "connection id exceeds maximum length",
                ));
            }
            let (id_slice, buffer) = buffer.decode_slice(MAX_CONNECTION_ID_LEN)?;
            let id_slice: &[u8] = id_slice.into_less_safe_slice();
            let mut bytes = [0u8; MAX_CONNECTION_ID_LEN];
            bytes[..len as usize].copy_from_slice(&id_slice[..len as usize]);

            Ok((Self { len, bytes }, buffer))
        }
    }
);

//= https://tools.ietf.org/html/draft-ietf-quic-transport-29.txt#8.1.4
//#   There is no need for a single well-defined format for the token
//#   because the server that generates the token also consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressValidationToken {
    //= https://tools.ietf.org/html/draft-ietf-quic-transport-29.txt#8.1.1
    //#   A token sent in a NEW_TOKEN frames or a Retry packet MUST be
    //#   constructed in a way that allows the server to identify how it was
    //#   provided to a client.  These tokens are carried in the same field,
    //#   but require different handling from servers.
    token_type: TokenType,

    //= https://tools.ietf.org/html/draft-ietf-quic-transport-29.txt#8.1.4
    //#   Tokens sent in Retry packets SHOULD include information that allows the
    //#   server to verify that the source IP address and port in client
    //#   packets remain constant.
    ipv4_peer_address: Option<SocketAddressV4>,
    ipv6_peer_address: Option<SocketAddressV6>,

    /// The client's original destination connection id. Only meaningful for
    /// `TokenType::RetryToken`.
    original_destination_connection_id: OriginalDestinationConnectionId,

    //= https://tools.ietf.org/html/draft-ietf-quic-transport-29.txt#21.2
    //#   An attacker might be able to receive an address validation token
    //#   (Section 8) from a server and then release the IP address it used to
    //#   acquire that token.
    //#   Servers SHOULD provide mitigations for this attack by limiting the
    //#   usage and lifetime of address validation tokens
    lifetime: u64,

    //= https://tools.ietf.org/html/draft-ietf-quic-transport-29.txt#8.1.3
    //#   An address validation token MUST be difficult to guess.  Including a
    //#   large enough random value in the token would be sufficient, but this
    //#   depends on the server remembering the value it sends to clients.
    nonce: [u8; 16],

    //= https://tools.ietf.org/html/draft-ietf-quic-transport-29.txt#8.1.3
    //#   A token-based scheme allows the server to offload any state
    //#   associated with validation to the client.  For this design to work,
    //#   the token MUST be covered by integrity protection against
    //#   modification or falsification by clients.  Without integrity
    //#   protection, malicious clients could generate or guess values for
    //#   tokens that would be accepted by the server.  Only the server
    //#   requires access to the integrity protection key for tokens.
    mac: [u8; 32],
}

/// The serialized size of an [`AddressValidationToken`], before encryption.
pub const TOKEN_LEN: usize = size_of::<u8>() // token type
    + size_of::<SocketAddressV4>()
    + size_of::<SocketAddressV6>()
    + 1
    + MAX_CONNECTION_ID_LEN // original_destination_connection_id
    + size_of::<u64>() // lifetime
    + 16 // nonce
    + 32; // mac

/// The largest AEAD authentication tag a [`TokenKey`] is expected to append.
/// Large enough for every tag size in this crate's AEAD suites (at most 16 bytes).
pub const MAX_TOKEN_KEY_TAG_LEN: usize = 16;

const SEALED_TOKEN_LEN: usize = TOKEN_LEN + MAX_TOKEN_KEY_TAG_LEN;

impl AddressValidationToken {
    pub fn new_retry(
        peer_address: SocketAddress,
        original_destination_connection_id: OriginalDestinationConnectionId,
        lifetime: u64,
        nonce: [u8; 16],
        mac: [u8; 32],
    ) -> Self {
        let (ipv4_peer_address, ipv6_peer_address) = match peer_address {
            SocketAddress::IpV4(addr) => (Some(addr), None),
            SocketAddress::IpV6(addr) => (None, Some(addr)),
        };
        Self {
            token_type: TokenType::RetryToken,
            ipv4_peer_address,
            ipv6_peer_address,
            original_destination_connection_id,
            lifetime,
            nonce,
            mac,
        }
    }

    #[inline]
    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    #[inline]
    pub fn original_destination_connection_id(&self) -> &OriginalDestinationConnectionId {
        &self.original_destination_connection_id
    }

    /// The peer address this token is bound to, if any.
    #[inline]
    pub fn peer_address(&self) -> Option<SocketAddress> {
        self.ipv4_peer_address
            .map(SocketAddress::from)
            .or_else(|| self.ipv6_peer_address.map(SocketAddress::from))
    }
}

impl<'a> EncoderValue for AddressValidationToken {
    fn encode<E: Encoder>(&self, buffer: &mut E) {
        buffer.encode(&self.token_type);
        if let Some(ip) = self.ipv4_peer_address.as_ref() {
            buffer.encode(ip);
        } else {
            buffer.write_repeated(size_of::<SocketAddressV4>(), 0);
        }

        if let Some(ip) = self.ipv6_peer_address.as_ref() {
            buffer.encode(ip);
        } else {
            buffer.write_repeated(size_of::<SocketAddressV6>(), 0);
        }

        buffer.encode(&self.original_destination_connection_id);
        buffer.encode(&self.lifetime);
        buffer.encode(&self.nonce.as_ref());
        buffer.encode(&self.mac.as_ref());
    }
}

impl From<&[u8]> for AddressValidationToken {
    fn from(bytes: &[u8]) -> Self {
        let decoder = DecoderBuffer::new(bytes);
        let (decoded_token, _) = decoder.decode::<AddressValidationToken>().unwrap();
        decoded_token
    }
}

decoder_value!(
    impl<'a> AddressValidationToken {
        fn decode(buffer: Buffer) -> Result<Self> {
            let (token_type, buffer) = buffer.decode::<TokenType>()?;
            let (ipv4_peer_address, buffer) = buffer.decode::<SocketAddressV4>()?;
            let ipv4_peer_address = ipv4_peer_address.filter_unspecified();
            let (ipv6_peer_address, buffer) = buffer.decode::<SocketAddressV6>()?;
            let ipv6_peer_address = ipv6_peer_address.filter_unspecified();
            let (original_destination_connection_id, buffer) =
                buffer.decode::<OriginalDestinationConnectionId>()?;
            let (lifetime, buffer) = buffer.decode::<u64>()?;
            let (nonce_slice, buffer) = buffer.decode_slice(16)?;
            let nonce_slice: &[u8] = nonce_slice.into_less_safe_slice();
            let mut nonce: [u8; 16] = [0; 16];
            nonce[..16].copy_from_slice(nonce_slice);
            let (mac_slice, buffer) = buffer.decode_slice(32)?;
            let mac_slice: &[u8] = mac_slice.into_less_safe_slice();
            let mut mac: [u8; 32] = [0; 32];
            mac[..32].copy_from_slice(mac_slice);

            let token = Self {
                token_type,
                ipv4_peer_address,
                ipv6_peer_address,
                original_destination_connection_id,
                lifetime,
                nonce,
                mac,
            };

            Ok((token, buffer))
        }
    }
);

/// The long-lived server-side key used to decrypt and verify address validation
/// tokens. Implementations are expected to wrap an AEAD keyed from a secret the
/// server rotates on its own schedule; this crate only needs the open/seal seam.
pub trait TokenKey: Send {
    /// Decrypts `sealed` in place. `sealed` holds the ciphertext followed by its
    /// authentication tag; on success, the plaintext (minus tag) occupies the front
    /// of the slice.
    fn open(&self, sealed: &mut [u8]) -> Result<(), TokenKeyError>;

    /// Encrypts `payload` in place, appending the authentication tag.
    fn seal(&self, payload: &mut [u8]) -> Result<(), TokenKeyError>;

    /// Length of the appended authentication tag.
    fn tag_len(&self) -> usize;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenKeyError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationOutcome {
    Valid,
    Invalid,
}

impl ValidationOutcome {
    #[inline]
    pub fn is_valid(self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Validates address validation tokens received on inbound Initial packets.
///
/// Per RFC 9000 section 8.1.3, an invalid token must never cause the packet to be
/// dropped or the connection attempt to fail: a client legitimately presents a
/// NEW_TOKEN issued by a *different* server, which looks exactly like a forged RETRY
/// token to this one. [`Validator::validate`] therefore returns an outcome rather
/// than a `Result` — there is no error path a caller is allowed to propagate.
pub struct Validator<K> {
    key: K,
}

impl<K: TokenKey> Validator<K> {
    pub fn new(key: K) -> Self {
        Self { key }
    }

    /// Validates `token_bytes` received from `source_address`, for use as proof of
    /// address ownership. `max_cid_length` bounds the original destination
    /// connection id the token may carry.
    pub fn validate(
        &self,
        source_address: &SocketAddress,
        token_bytes: &[u8],
        max_cid_length: usize,
    ) -> ValidationOutcome {
        let tag_len = self.key.tag_len();
        if tag_len > MAX_TOKEN_KEY_TAG_LEN || token_bytes.len() != TOKEN_LEN + tag_len {
            return ValidationOutcome::Invalid;
        }

        let mut sealed = [0u8; SEALED_TOKEN_LEN];
        sealed[..token_bytes.len()].copy_from_slice(token_bytes);
        if self.key.open(&mut sealed[..token_bytes.len()]).is_err() {
            return ValidationOutcome::Invalid;
        }

        let decoder = DecoderBuffer::new(&sealed[..TOKEN_LEN]);
        let token = match decoder.decode::<AddressValidationToken>() {
            Ok((token, _)) => token,
            Err(_) => return ValidationOutcome::Invalid,
        };

        // NEW_TOKEN is not bound to an address; it is invalid for the purposes of
        // address validation, even though it decrypted successfully.
        if token.token_type == TokenType::NewToken {
            return ValidationOutcome::Invalid;
        }

        if token.original_destination_connection_id.len() > max_cid_length {
            return ValidationOutcome::Invalid;
        }

        match token.peer_address() {
            Some(bound_address) if &bound_address == source_address => ValidationOutcome::Valid,
            _ => ValidationOutcome::Invalid,
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;

    /// A `TokenKey` that performs no actual cryptography, for use in unit tests that
    /// only care about the validator's decision logic.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct NoopTokenKey {
        pub fail_open: bool,
    }

    impl TokenKey for NoopTokenKey {
        fn open(&self, sealed: &mut [u8]) -> Result<(), TokenKeyError> {
            if self.fail_open {
                return Err(TokenKeyError);
            }
            Ok(())
        }

        fn seal(&self, _payload: &mut [u8]) -> Result<(), TokenKeyError> {
            Ok(())
        }

        fn tag_len(&self) -> usize {
            0
        }
    }
}

#[cfg(test)]
mod token_tests {
    use super::*;
    use crate::inet::SocketAddressV4;
    use s2n_codec::{DecoderBufferMut, EncoderBuffer};

    fn sample_token(token_type: TokenType, peer: SocketAddress) -> AddressValidationToken {
        let (ipv4_peer_address, ipv6_peer_address) = match peer {
            SocketAddress::IpV4(addr) => (Some(addr), None),
            SocketAddress::IpV6(addr) => (None, Some(addr)),
        };
        AddressValidationToken {
            token_type,
            ipv4_peer_address,
            ipv6_peer_address,
            original_destination_connection_id: OriginalDestinationConnectionId::try_from_bytes(
                &[9; 8],
            )
            .unwrap(),
            lifetime: 0,
            nonce: [1; 16],
            mac: [2; 32],
        }
    }

    #[test]
    fn test_encoding() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let token = sample_token(TokenType::NewToken, peer);

        let mut b = vec![0; TOKEN_LEN + 16];
        let mut encoder = EncoderBuffer::new(&mut b);
        token.encode(&mut encoder);

        let decoder = DecoderBufferMut::new(&mut b);
        let (decoded_token, _) = decoder.decode::<AddressValidationToken>().unwrap();

        assert_eq!(token, decoded_token);
    }

    #[test]
    fn new_token_is_invalid_for_address_validation() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let token = sample_token(TokenType::NewToken, peer);

        let mut bytes = vec![0; TOKEN_LEN];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        token.encode(&mut encoder);

        let validator = Validator::new(testing::NoopTokenKey::default());
        assert_eq!(
            validator.validate(&peer, &bytes, MAX_CONNECTION_ID_LEN),
            ValidationOutcome::Invalid
        );
    }

    #[test]
    fn retry_token_valid_when_address_matches() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let token = sample_token(TokenType::RetryToken, peer);

        let mut bytes = vec![0; TOKEN_LEN];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        token.encode(&mut encoder);

        let validator = Validator::new(testing::NoopTokenKey::default());
        assert_eq!(
            validator.validate(&peer, &bytes, MAX_CONNECTION_ID_LEN),
            ValidationOutcome::Valid
        );
    }

    #[test]
    fn retry_token_invalid_when_address_mismatches() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let other = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 2], 80));
        let token = sample_token(TokenType::RetryToken, peer);

        let mut bytes = vec![0; TOKEN_LEN];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        token.encode(&mut encoder);

        let validator = Validator::new(testing::NoopTokenKey::default());
        assert_eq!(
            validator.validate(&other, &bytes, MAX_CONNECTION_ID_LEN),
            ValidationOutcome::Invalid
        );
    }

    #[test]
    fn decrypt_failure_is_invalid() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let token = sample_token(TokenType::RetryToken, peer);

        let mut bytes = vec![0; TOKEN_LEN];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        token.encode(&mut encoder);

        let validator = Validator::new(testing::NoopTokenKey { fail_open: true });
        assert_eq!(
            validator.validate(&peer, &bytes, MAX_CONNECTION_ID_LEN),
            ValidationOutcome::Invalid
        );
    }

    #[test]
    fn wrong_length_is_invalid() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let validator = Validator::new(testing::NoopTokenKey::default());
        assert_eq!(
            validator.validate(&peer, &[0u8; 4], MAX_CONNECTION_ID_LEN),
            ValidationOutcome::Invalid
        );
    }

    #[test]
    fn oversized_original_connection_id_is_invalid() {
        let peer = SocketAddress::IpV4(SocketAddressV4::new([127, 0, 0, 1], 80));
        let token = sample_token(TokenType::RetryToken, peer);

        let mut bytes = vec![0; TOKEN_LEN];
        let mut encoder = EncoderBuffer::new(&mut bytes);
        token.encode(&mut encoder);

        let validator = Validator::new(testing::NoopTokenKey::default());
        // token carries an 8 byte original dcid; request a stricter max of 4
        assert_eq!(
            validator.validate(&peer, &bytes, 4),
            ValidationOutcome::Invalid
        );
    }
}
