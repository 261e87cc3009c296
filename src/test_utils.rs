//! Synthetic certificate builders (compiled only during testing).
#![allow(dead_code)]

use base64::Engine;

const OID_COMMON_NAME: &[u8] = &[0x55, 0x04, 0x03];
const OID_SUBJECT_ALT_NAME: &[u8] = &[0x55, 0x1D, 0x11];
const OID_SHA256_WITH_RSA: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x0B];
const OID_RSA_ENCRYPTION: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x0D, 0x01, 0x01, 0x01];

/// Encode a single TLV
pub fn der(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = content.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes: Vec<u8> = len
            .to_be_bytes()
            .iter()
            .copied()
            .skip_while(|b| *b == 0)
            .collect();
        out.push(0x80 | bytes.len() as u8);
        out.extend_from_slice(&bytes);
    }
    out.extend_from_slice(content);
    out
}

pub fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    der(0x30, &parts.concat())
}

fn algorithm(oid: &[u8]) -> Vec<u8> {
    seq(&[der(0x06, oid), der(0x05, &[])])
}

fn name(cn: Option<&str>) -> Vec<u8> {
    match cn {
        Some(cn) => seq(&[der(
            0x31,
            &seq(&[der(0x06, OID_COMMON_NAME), der(0x0C, cn.as_bytes())]),
        )]),
        None => seq(&[]),
    }
}

fn san_extension(sans: &[&str]) -> Vec<u8> {
    let general_names: Vec<Vec<u8>> = sans.iter().map(|s| der(0x82, s.as_bytes())).collect();
    seq(&[
        der(0x06, OID_SUBJECT_ALT_NAME),
        der(0x04, &seq(&general_names)),
    ])
}

/// DER TBSCertificate with the given subject CN and DNS alternative names
pub fn tbs_der(cn: Option<&str>, sans: &[&str]) -> Vec<u8> {
    let modulus = [
        0x00, 0xC3, 0x5A, 0x11, 0x9E, 0x42, 0x7B, 0x08, 0xD1, 0x6F, 0x23, 0x90, 0x4C, 0xAB,
        0x17, 0xE5, 0x3D,
    ];
    let rsa_key = seq(&[der(0x02, &modulus), der(0x02, &[0x01, 0x00, 0x01])]);
    let mut key_bits = vec![0x00];
    key_bits.extend_from_slice(&rsa_key);

    let mut parts = vec![
        der(0xA0, &der(0x02, &[0x02])),
        der(0x02, &[0x01, 0x2C]),
        algorithm(OID_SHA256_WITH_RSA),
        name(Some("Test CA")),
        seq(&[der(0x17, b"250101000000Z"), der(0x17, b"350101000000Z")]),
        name(cn),
        seq(&[algorithm(OID_RSA_ENCRYPTION), der(0x03, &key_bits)]),
    ];

    if !sans.is_empty() {
        parts.push(der(0xA3, &seq(&[san_extension(sans)])));
    }

    seq(&parts)
}

/// DER X.509 certificate wrapping [`tbs_der`]
pub fn certificate_der(cn: Option<&str>, sans: &[&str]) -> Vec<u8> {
    let mut signature = vec![0x00];
    signature.extend_from_slice(&[0x5A; 32]);

    seq(&[
        tbs_der(cn, sans),
        algorithm(OID_SHA256_WITH_RSA),
        der(0x03, &signature),
    ])
}

/// PEM block (64-column base64 body)
pub fn pem(label: &str, der: &[u8]) -> String {
    let body = base64::engine::general_purpose::STANDARD.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap());
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

fn leaf_header(entry_type: u16) -> Vec<u8> {
    let mut out = vec![0x00, 0x00];
    out.extend_from_slice(&1_700_000_000_000u64.to_be_bytes());
    out.extend_from_slice(&entry_type.to_be_bytes());
    out
}

fn u24(len: usize) -> [u8; 3] {
    [(len >> 16) as u8, (len >> 8) as u8, len as u8]
}

/// RFC 6962 MerkleTreeLeaf carrying an x509_entry
pub fn merkle_leaf_x509(cert_der: &[u8]) -> Vec<u8> {
    let mut out = leaf_header(0);
    out.extend_from_slice(&u24(cert_der.len()));
    out.extend_from_slice(cert_der);
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

/// RFC 6962 MerkleTreeLeaf carrying a precert_entry
pub fn merkle_leaf_precert(tbs_der: &[u8]) -> Vec<u8> {
    let mut out = leaf_header(1);
    out.extend_from_slice(&[0xAB; 32]);
    out.extend_from_slice(&u24(tbs_der.len()));
    out.extend_from_slice(tbs_der);
    out.extend_from_slice(&[0x00, 0x00]);
    out
}

pub fn b64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

/// base64 MerkleTreeLeaf for a certificate with the given names
pub fn leaf_input(cn: &str, sans: &[&str]) -> String {
    b64(&merkle_leaf_x509(&certificate_der(Some(cn), sans)))
}
