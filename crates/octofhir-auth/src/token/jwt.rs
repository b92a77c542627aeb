//! JWT signing keys and JWKS types.
//!
//! Signing keys are loaded from private JSON Web Keys (RFC 7517) and converted
//! into `jsonwebtoken` encoding keys once, at load time. Only the algorithms
//! accepted by SMART Backend Services token endpoints are supported:
//!
//! - **RS384**: RSA with SHA-384 (SMART on FHIR preferred)
//! - **ES384**: ECDSA with P-384 curve (SMART on FHIR preferred, smaller keys)
//! - **RS256**: RSA with SHA-256 (accepted by some servers)

use std::fmt;
use std::str::FromStr;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use p384::SecretKey as EcSecretKey;
use p384::ecdsa::SigningKey as EcSigningKey;
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use rsa::{BigUint, RsaPrivateKey};
use serde::{Deserialize, Serialize};

use crate::AuthResult;
use crate::error::AuthError;

// ============================================================================
// Signing Algorithm
// ============================================================================

/// Supported signing algorithms for client assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SigningAlgorithm {
    /// RSA with SHA-256.
    RS256,
    /// RSA with SHA-384.
    RS384,
    /// ECDSA with P-384 curve.
    ES384,
}

impl SigningAlgorithm {
    /// Converts to the `jsonwebtoken` Algorithm type.
    #[must_use]
    pub fn to_jwt_algorithm(self) -> Algorithm {
        match self {
            Self::RS256 => Algorithm::RS256,
            Self::RS384 => Algorithm::RS384,
            Self::ES384 => Algorithm::ES384,
        }
    }

    /// Returns the algorithm name as used in JWK/JWT headers.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RS256 => "RS256",
            Self::RS384 => "RS384",
            Self::ES384 => "ES384",
        }
    }

    /// Returns `true` if this is an RSA-based algorithm.
    #[must_use]
    pub fn is_rsa(&self) -> bool {
        matches!(self, Self::RS256 | Self::RS384)
    }
}

impl fmt::Display for SigningAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SigningAlgorithm {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RS256" => Ok(Self::RS256),
            "RS384" => Ok(Self::RS384),
            "ES384" => Ok(Self::ES384),
            other => Err(AuthError::key_material(format!(
                "Unsupported signing algorithm: {other}"
            ))),
        }
    }
}

// ============================================================================
// JWKS Types
// ============================================================================

/// Public JSON Web Key Set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwks {
    /// The keys in this set.
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Creates a new empty JWKS.
    #[must_use]
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    /// Adds a key to the set.
    pub fn add_key(&mut self, key: Jwk) {
        self.keys.push(key);
    }
}

impl Default for Jwks {
    fn default() -> Self {
        Self::new()
    }
}

/// Public JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Jwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    pub kid: String,

    /// Key use ("sig" for signing).
    #[serde(rename = "use")]
    pub use_: String,

    /// Algorithm.
    pub alg: String,

    // RSA-specific fields
    /// RSA modulus (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n: Option<String>,

    /// RSA exponent (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub e: Option<String>,

    // EC-specific fields
    /// EC curve name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crv: Option<String>,

    /// EC x coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<String>,

    /// EC y coordinate (base64url encoded).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<String>,
}

/// Private JSON Web Key as stored in the key set file.
#[derive(Clone, Deserialize)]
pub struct PrivateJwk {
    /// Key type ("RSA" or "EC").
    pub kty: String,

    /// Key ID.
    #[serde(default)]
    pub kid: Option<String>,

    /// Key use. Keys with a use other than "sig" are ignored.
    #[serde(rename = "use", default)]
    pub use_: Option<String>,

    /// Algorithm. Defaults to RS384 for RSA and ES384 for EC.
    #[serde(default)]
    pub alg: Option<String>,

    #[serde(default)]
    pub n: Option<String>,
    #[serde(default)]
    pub e: Option<String>,
    #[serde(default)]
    pub d: Option<String>,
    #[serde(default)]
    pub p: Option<String>,
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub crv: Option<String>,
    #[serde(default)]
    pub x: Option<String>,
    #[serde(default)]
    pub y: Option<String>,
}

impl PrivateJwk {
    /// Returns `true` if the key may be used for signing.
    #[must_use]
    pub fn is_signing_key(&self) -> bool {
        self.use_.as_deref().is_none_or(|u| u == "sig")
    }
}

// Private components must never reach the logs.
impl fmt::Debug for PrivateJwk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateJwk")
            .field("kty", &self.kty)
            .field("kid", &self.kid)
            .field("use", &self.use_)
            .field("alg", &self.alg)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// A signing key loaded from a private JWK.
pub struct SigningKeyPair {
    /// Key ID.
    pub kid: String,

    /// Signing algorithm.
    pub algorithm: SigningAlgorithm,

    /// Encoding key (private key) for signing.
    encoding_key: EncodingKey,

    /// Public half for JWKS export.
    public_jwk: Jwk,
}

impl SigningKeyPair {
    /// Builds a signing key from a private JWK.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::KeyMaterial` if the key is missing components,
    /// uses an unsupported type or curve, or is internally inconsistent.
    pub fn from_jwk(jwk: &PrivateJwk) -> AuthResult<Self> {
        let kid = jwk
            .kid
            .clone()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AuthError::key_material("Key is missing 'kid'"))?;

        match jwk.kty.as_str() {
            "RSA" => Self::rsa_from_jwk(kid, jwk),
            "EC" => Self::ec_from_jwk(kid, jwk),
            other => Err(AuthError::key_material(format!(
                "Key '{kid}' has unsupported key type: {other}"
            ))),
        }
    }

    fn rsa_from_jwk(kid: String, jwk: &PrivateJwk) -> AuthResult<Self> {
        let algorithm = match jwk.alg.as_deref() {
            Some(alg) => alg.parse()?,
            None => SigningAlgorithm::RS384,
        };
        if !algorithm.is_rsa() {
            return Err(AuthError::key_material(format!(
                "Key '{kid}': algorithm {algorithm} is not RSA-based"
            )));
        }

        let n = component(&kid, "n", &jwk.n)?;
        let e = component(&kid, "e", &jwk.e)?;
        let d = component(&kid, "d", &jwk.d)?;
        let p = component(&kid, "p", &jwk.p)?;
        let q = component(&kid, "q", &jwk.q)?;

        let private_key = RsaPrivateKey::from_components(
            BigUint::from_bytes_be(&n),
            BigUint::from_bytes_be(&e),
            BigUint::from_bytes_be(&d),
            vec![BigUint::from_bytes_be(&p), BigUint::from_bytes_be(&q)],
        )
        .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;
        private_key
            .validate()
            .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;
        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;

        let public_jwk = Jwk {
            kty: "RSA".to_string(),
            kid: kid.clone(),
            use_: "sig".to_string(),
            alg: algorithm.as_str().to_string(),
            n: Some(URL_SAFE_NO_PAD.encode(&n)),
            e: Some(URL_SAFE_NO_PAD.encode(&e)),
            crv: None,
            x: None,
            y: None,
        };

        Ok(Self {
            kid,
            algorithm,
            encoding_key,
            public_jwk,
        })
    }

    fn ec_from_jwk(kid: String, jwk: &PrivateJwk) -> AuthResult<Self> {
        if let Some(alg) = jwk.alg.as_deref()
            && alg != "ES384"
        {
            return Err(AuthError::key_material(format!(
                "Key '{kid}': EC keys must use ES384, found {alg}"
            )));
        }
        if jwk.crv.as_deref() != Some("P-384") {
            return Err(AuthError::key_material(format!(
                "Key '{kid}': only the P-384 curve is supported"
            )));
        }

        let d = component(&kid, "d", &jwk.d)?;
        let x = component(&kid, "x", &jwk.x)?;
        let y = component(&kid, "y", &jwk.y)?;

        let secret_key = EcSecretKey::from_slice(&d)
            .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;

        // The private scalar must produce the published point.
        let point = EcSigningKey::from(&secret_key)
            .verifying_key()
            .to_encoded_point(false);
        let matches = point.x().is_some_and(|px| px.as_slice() == x.as_slice())
            && point.y().is_some_and(|py| py.as_slice() == y.as_slice());
        if !matches {
            return Err(AuthError::key_material(format!(
                "Key '{kid}': private key does not match public coordinates"
            )));
        }

        let private_pem = secret_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;
        let encoding_key = EncodingKey::from_ec_pem(private_pem.as_bytes())
            .map_err(|err| AuthError::key_material(format!("Key '{kid}': {err}")))?;

        let public_jwk = Jwk {
            kty: "EC".to_string(),
            kid: kid.clone(),
            use_: "sig".to_string(),
            alg: SigningAlgorithm::ES384.as_str().to_string(),
            n: None,
            e: None,
            crv: Some("P-384".to_string()),
            x: Some(URL_SAFE_NO_PAD.encode(&x)),
            y: Some(URL_SAFE_NO_PAD.encode(&y)),
        };

        Ok(Self {
            kid,
            algorithm: SigningAlgorithm::ES384,
            encoding_key,
            public_jwk,
        })
    }

    /// Signs claims into a compact JWT with `typ: JWT` and this key's `kid`.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Signing` if encoding fails.
    pub fn sign<T: Serialize>(&self, claims: &T) -> AuthResult<String> {
        let mut header = Header::new(self.algorithm.to_jwt_algorithm());
        header.typ = Some("JWT".to_string());
        header.kid = Some(self.kid.clone());

        encode(&header, claims, &self.encoding_key).map_err(|e| AuthError::signing(e.to_string()))
    }

    /// Exports the public key as a JWK.
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        self.public_jwk.clone()
    }
}

impl fmt::Debug for SigningKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKeyPair")
            .field("kid", &self.kid)
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

fn component(kid: &str, name: &str, value: &Option<String>) -> AuthResult<Vec<u8>> {
    let encoded = value
        .as_deref()
        .ok_or_else(|| AuthError::key_material(format!("Key '{kid}' is missing '{name}'")))?;
    URL_SAFE_NO_PAD
        .decode(encoded.trim_end_matches('='))
        .map_err(|_| AuthError::key_material(format!("Key '{kid}': '{name}' is not base64url")))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use p384::elliptic_curve::sec1::ToEncodedPoint;
    use rand::rngs::OsRng;

    fn ec_jwk(kid: &str) -> PrivateJwk {
        let secret = EcSecretKey::random(&mut OsRng);
        let point = secret.public_key().to_encoded_point(false);
        PrivateJwk {
            kty: "EC".to_string(),
            kid: Some(kid.to_string()),
            use_: Some("sig".to_string()),
            alg: Some("ES384".to_string()),
            n: None,
            e: None,
            d: Some(URL_SAFE_NO_PAD.encode(secret.to_bytes())),
            p: None,
            q: None,
            crv: Some("P-384".to_string()),
            x: point.x().map(|x| URL_SAFE_NO_PAD.encode(x)),
            y: point.y().map(|y| URL_SAFE_NO_PAD.encode(y)),
        }
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(
            "RS384".parse::<SigningAlgorithm>().unwrap(),
            SigningAlgorithm::RS384
        );
        assert_eq!(
            "ES384".parse::<SigningAlgorithm>().unwrap(),
            SigningAlgorithm::ES384
        );
        assert!("HS256".parse::<SigningAlgorithm>().is_err());
    }

    #[test]
    fn test_ec_key_sign_and_verify() {
        let jwk = ec_jwk("ec-1");
        let key = SigningKeyPair::from_jwk(&jwk).unwrap();
        assert_eq!(key.algorithm, SigningAlgorithm::ES384);

        let token = key
            .sign(&serde_json::json!({"sub": "client", "exp": 4_102_444_800_i64}))
            .unwrap();

        let public = key.to_jwk();
        let decoding_key =
            DecodingKey::from_ec_components(public.x.as_deref().unwrap(), public.y.as_deref().unwrap())
                .unwrap();
        let mut validation = Validation::new(Algorithm::ES384);
        validation.validate_aud = false;
        let data = decode::<serde_json::Value>(&token, &decoding_key, &validation).unwrap();
        assert_eq!(data.claims["sub"], "client");
        assert_eq!(data.header.kid.as_deref(), Some("ec-1"));
        assert_eq!(data.header.typ.as_deref(), Some("JWT"));
    }

    #[test]
    fn test_ec_key_mismatched_point_rejected() {
        let mut jwk = ec_jwk("ec-1");
        let other = ec_jwk("ec-2");
        jwk.x = other.x;
        let err = SigningKeyPair::from_jwk(&jwk).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }

    #[test]
    fn test_missing_kid_rejected() {
        let mut jwk = ec_jwk("ec-1");
        jwk.kid = None;
        let err = SigningKeyPair::from_jwk(&jwk).unwrap_err();
        assert!(matches!(err, AuthError::KeyMaterial { .. }));
    }

    #[test]
    fn test_missing_private_component_rejected() {
        let mut jwk = ec_jwk("ec-1");
        jwk.d = None;
        let err = SigningKeyPair::from_jwk(&jwk).unwrap_err();
        assert!(err.to_string().contains("'d'"));
    }

    #[test]
    fn test_unsupported_key_type() {
        let mut jwk = ec_jwk("oct-1");
        jwk.kty = "oct".to_string();
        assert!(SigningKeyPair::from_jwk(&jwk).is_err());
    }

    #[test]
    fn test_private_jwk_debug_redacts_secret() {
        let jwk = ec_jwk("ec-1");
        let debug = format!("{jwk:?}");
        assert!(debug.contains("ec-1"));
        assert!(!debug.contains(jwk.d.as_deref().unwrap()));
    }

    #[test]
    fn test_public_jwk_has_no_private_fields() {
        let key = SigningKeyPair::from_jwk(&ec_jwk("ec-1")).unwrap();
        let json = serde_json::to_value(key.to_jwk()).unwrap();
        assert!(json.get("d").is_none());
        assert_eq!(json["use"], "sig");
        assert_eq!(json["crv"], "P-384");
    }
}
