// src/cert_decoder.rs
use crate::error::{DecodeError, DecodeStage};
use crate::types::DecodedIdentity;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;
use x509_parser::der_parser::parse_der;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::pem::parse_x509_pem;
use x509_parser::prelude::*;

/// Length of the fixed MerkleTreeLeaf header: version, leaf type, timestamp, entry type
const LEAF_HEADER_LEN: usize = 12;
const ISSUER_KEY_HASH_LEN: usize = 32;

/// What the envelope step produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PayloadKind {
    /// Full X.509 certificate
    Certificate,
    /// Bare TBSCertificate from a precert_entry
    PrecertTbs,
}

#[derive(Debug)]
struct Payload<'a> {
    kind: PayloadKind,
    der: Cow<'a, [u8]>,
}

/// Turns encoded log leaves into certificate identities
pub struct CertificateDecoder;

impl CertificateDecoder {
    /// Decode a base64 leaf into the subject CN and DNS alternative names.
    ///
    /// Each step is tried in order: base64, envelope (PEM or RFC 6962
    /// MerkleTreeLeaf), certificate parse, then a raw DER read that only
    /// classifies why the certificate parse failed.
    pub fn decode(encoded_leaf: &str) -> Result<DecodedIdentity, DecodeError> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded_leaf.trim())
            .map_err(|e| DecodeError::new(DecodeStage::Base64, e.to_string()))?;

        let payload = Self::unwrap_envelope(&bytes)?;
        let identity = Self::parse_payload(&payload)?;

        if identity.is_empty() {
            return Err(DecodeError::new(
                DecodeStage::EmptyIdentity,
                "certificate has no common name and no DNS alternative names",
            ));
        }

        Ok(identity)
    }

    fn unwrap_envelope(bytes: &[u8]) -> Result<Payload<'_>, DecodeError> {
        if bytes.trim_ascii_start().starts_with(b"-----BEGIN") {
            return Self::unwrap_pem(bytes);
        }

        // MerkleTreeLeaf starts with version v1 (0) and leaf type timestamped_entry (0).
        // Bare DER always starts with a SEQUENCE tag. A rejected leaf is
        // classified like any other unparsable payload.
        if bytes.len() >= 2 && bytes[0] == 0 && bytes[1] == 0 {
            return Self::unwrap_merkle_leaf(bytes)
                .map_err(|e| Self::classify_failure(bytes, e.detail));
        }

        Ok(Payload {
            kind: PayloadKind::Certificate,
            der: Cow::Borrowed(bytes),
        })
    }

    fn unwrap_pem(bytes: &[u8]) -> Result<Payload<'_>, DecodeError> {
        let (_, pem) = parse_x509_pem(bytes.trim_ascii_start())
            .map_err(|e| DecodeError::new(DecodeStage::Envelope, format!("invalid PEM block: {:?}", e)))?;

        Ok(Payload {
            kind: PayloadKind::Certificate,
            der: Cow::Owned(pem.contents),
        })
    }

    fn unwrap_merkle_leaf(bytes: &[u8]) -> Result<Payload<'_>, DecodeError> {
        if bytes.len() < LEAF_HEADER_LEN {
            return Err(DecodeError::new(
                DecodeStage::Envelope,
                format!("leaf input too short: {} bytes", bytes.len()),
            ));
        }

        let entry_type = u16::from_be_bytes([bytes[10], bytes[11]]);

        let (kind, body) = match entry_type {
            0 => (PayloadKind::Certificate, &bytes[LEAF_HEADER_LEN..]),
            1 => {
                let body = bytes.get(LEAF_HEADER_LEN + ISSUER_KEY_HASH_LEN..).ok_or_else(|| {
                    DecodeError::new(DecodeStage::Envelope, "precert_entry too short for issuer key hash")
                })?;
                (PayloadKind::PrecertTbs, body)
            }
            other => {
                return Err(DecodeError::new(
                    DecodeStage::Envelope,
                    format!("unknown entry type: {}", other),
                ));
            }
        };

        let der = Self::read_u24_prefixed(body)?;

        Ok(Payload {
            kind,
            der: Cow::Borrowed(der),
        })
    }

    fn read_u24_prefixed(body: &[u8]) -> Result<&[u8], DecodeError> {
        if body.len() < 3 {
            return Err(DecodeError::new(DecodeStage::Envelope, "missing certificate length"));
        }

        let len = ((body[0] as usize) << 16) | ((body[1] as usize) << 8) | (body[2] as usize);

        body.get(3..3 + len).ok_or_else(|| {
            DecodeError::new(
                DecodeStage::Envelope,
                format!("certificate truncated: expected {} bytes, have {}", len, body.len() - 3),
            )
        })
    }

    fn parse_payload(payload: &Payload<'_>) -> Result<DecodedIdentity, DecodeError> {
        let der: &[u8] = &payload.der;

        let parsed = match payload.kind {
            PayloadKind::Certificate => {
                X509Certificate::from_der(der).map(|(_, cert)| Self::identity_from_tbs(&cert.tbs_certificate))
            }
            PayloadKind::PrecertTbs => {
                TbsCertificate::from_der(der).map(|(_, tbs)| Self::identity_from_tbs(&tbs))
            }
        };

        match parsed {
            Ok(mut identity) => {
                identity.fingerprint = Self::fingerprint(der);
                Ok(identity)
            }
            Err(cert_err) => Err(Self::classify_failure(der, cert_err)),
        }
    }

    /// Well-formed DER that is not a certificate is reported separately from garbage.
    /// Well-formed means one DER record spanning the whole payload.
    fn classify_failure(der: &[u8], cause: impl fmt::Display) -> DecodeError {
        match parse_der(der) {
            Ok((rest, _)) if rest.is_empty() => DecodeError::new(
                DecodeStage::UnrecognizedFormat,
                format!("well-formed DER but not a certificate: {}", cause),
            ),
            Ok((rest, _)) => DecodeError::new(
                DecodeStage::MalformedBinary,
                format!("{}; {} trailing bytes after DER record", cause, rest.len()),
            ),
            Err(der_err) => DecodeError::new(
                DecodeStage::MalformedBinary,
                format!("{}; not valid DER: {}", cause, der_err),
            ),
        }
    }

    fn identity_from_tbs(tbs: &TbsCertificate<'_>) -> DecodedIdentity {
        let common_name = tbs
            .subject()
            .iter_common_name()
            .find_map(|attr| attr.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let mut subject_alt_names = Vec::new();

        for ext in tbs.extensions() {
            if let ParsedExtension::SubjectAlternativeName(san) = ext.parsed_extension() {
                for general_name in &san.general_names {
                    if let GeneralName::DNSName(dns_name) = general_name {
                        subject_alt_names.push(dns_name.to_string());
                    }
                }
            }
        }

        DecodedIdentity::new(common_name, subject_alt_names)
    }

    fn fingerprint(der: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(der);
        hex::encode(hasher.finalize())
    }
}
