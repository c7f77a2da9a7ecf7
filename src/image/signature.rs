//! Schema 1 manifest signing
//!
//! Produces the "pretty JWS" form registries expect for signed schema 1
//! manifests: the indented manifest JSON with a `signatures` array spliced
//! in before the closing brace. The protected header records where the
//! splice happened (`formatLength` / `formatTail`) so a verifier can rebuild
//! the signed payload byte for byte.

use crate::error::{PusherError, Result};
use crate::image::manifest::Manifest;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{SecondsFormat, Utc};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::EncodePublicKey;
use rand::rngs::OsRng;
use serde::Serialize;
use sha2::{Digest, Sha256};

const INDENT: &[u8] = b"   ";
const ALGORITHM: &str = "ES256";

/// A signed manifest ready to be pushed
#[derive(Debug, Clone)]
pub struct SignedManifest {
    /// Exact bytes to send to the registry
    pub raw: Vec<u8>,
    /// Key id of the ephemeral signing key
    pub key_id: String,
}

#[derive(Serialize)]
struct Jwk {
    crv: &'static str,
    kid: String,
    kty: &'static str,
    x: String,
    y: String,
}

#[derive(Serialize)]
struct JwsHeader {
    jwk: Jwk,
    alg: &'static str,
}

#[derive(Serialize)]
struct JwsSignature {
    header: JwsHeader,
    signature: String,
    protected: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Protected {
    format_length: usize,
    format_tail: String,
    time: String,
}

/// Sign `manifest` with a freshly generated P-256 key.
pub fn sign_manifest(manifest: &Manifest) -> Result<SignedManifest> {
    let key = SigningKey::random(&mut OsRng);
    sign_with_key(manifest, &key)
}

fn sign_with_key(manifest: &Manifest, key: &SigningKey) -> Result<SignedManifest> {
    let payload = to_indented_json(manifest)?;
    let format_length = format_length(&payload)?;
    let format_tail = &payload[format_length..];

    let protected = Protected {
        format_length,
        format_tail: URL_SAFE_NO_PAD.encode(format_tail),
        time: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    };
    let protected = serde_json::to_vec(&protected)
        .map_err(|e| PusherError::Signing(format!("Cannot encode protected header: {}", e)))?;
    let protected = URL_SAFE_NO_PAD.encode(protected);

    let signing_input = format!("{}.{}", protected, URL_SAFE_NO_PAD.encode(&payload));
    let signature: Signature = key
        .try_sign(signing_input.as_bytes())
        .map_err(|e| PusherError::Signing(format!("Signature computation failed: {}", e)))?;

    let jwk = public_jwk(key)?;
    let key_id = jwk.kid.clone();
    let signatures = vec![JwsSignature {
        header: JwsHeader { jwk, alg: ALGORITHM },
        signature: URL_SAFE_NO_PAD.encode(signature.to_bytes()),
        protected,
    }];

    let raw = pretty_signature(&payload, format_length, &signatures)?;
    Ok(SignedManifest { raw, key_id })
}

fn to_indented_json<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value
        .serialize(&mut serializer)
        .map_err(|e| PusherError::Signing(format!("Cannot serialize manifest: {}", e)))?;
    Ok(buf)
}

/// Offset just past the last value byte before the closing brace
fn format_length(payload: &[u8]) -> Result<usize> {
    let close = payload
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .filter(|&i| payload[i] == b'}')
        .ok_or_else(|| PusherError::Signing("Manifest payload is not a JSON object".to_string()))?;
    let last = payload[..close]
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .filter(|&i| payload[i] != b',' && payload[i] != b'{')
        .ok_or_else(|| PusherError::Signing("Manifest payload has no fields".to_string()))?;
    Ok(last + 1)
}

fn pretty_signature(
    payload: &[u8],
    format_length: usize,
    signatures: &[JwsSignature],
) -> Result<Vec<u8>> {
    let sigs = to_indented_json(&signatures)?;
    let sigs = String::from_utf8(sigs)
        .map_err(|e| PusherError::Signing(format!("Signature JSON is not UTF-8: {}", e)))?;
    let indent = std::str::from_utf8(INDENT).unwrap_or("   ");
    let sigs = sigs.replace('\n', &format!("\n{}", indent));

    let mut out = Vec::with_capacity(payload.len() + sigs.len() + 32);
    out.extend_from_slice(&payload[..format_length]);
    out.extend_from_slice(b",\n");
    out.extend_from_slice(INDENT);
    out.extend_from_slice(b"\"signatures\": ");
    out.extend_from_slice(sigs.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(&payload[format_length..]);
    Ok(out)
}

fn public_jwk(key: &SigningKey) -> Result<Jwk> {
    let verifying_key = key.verifying_key();
    let point = verifying_key.to_encoded_point(false);
    let (x, y) = point
        .x()
        .zip(point.y())
        .ok_or_else(|| PusherError::Signing("Public key has no affine coordinates".to_string()))?;

    let der = verifying_key
        .to_public_key_der()
        .map_err(|e| PusherError::Signing(format!("Cannot encode public key: {}", e)))?;

    Ok(Jwk {
        crv: "P-256",
        kid: key_id(der.as_bytes()),
        kty: "EC",
        x: URL_SAFE_NO_PAD.encode(x),
        y: URL_SAFE_NO_PAD.encode(y),
    })
}

/// libtrust key id: base32 of the first 240 bits of SHA-256(SPKI DER), in groups of four
fn key_id(spki_der: &[u8]) -> String {
    let hash = Sha256::digest(spki_der);
    let encoded = base32(&hash[..30]);
    encoded
        .as_bytes()
        .chunks(4)
        .map(|chunk| String::from_utf8_lossy(chunk).into_owned())
        .collect::<Vec<_>>()
        .join(":")
}

/// RFC 4648 base32 without padding
fn base32(data: &[u8]) -> String {
    const ALPHABET: &[u8; 32] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ234567";
    let mut out = String::with_capacity(data.len().div_ceil(5) * 8);
    let mut buffer: u32 = 0;
    let mut bits = 0;
    for &byte in data {
        buffer = (buffer << 8) | u32::from(byte);
        bits += 8;
        while bits >= 5 {
            bits -= 5;
            out.push(ALPHABET[((buffer >> bits) & 0x1f) as usize] as char);
        }
    }
    if bits > 0 {
        out.push(ALPHABET[((buffer << (5 - bits)) & 0x1f) as usize] as char);
    }
    out
}
