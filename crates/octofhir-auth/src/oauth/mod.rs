//! OAuth 2.0 client credentials flow with JWT client assertions.
//!
//! - [`client_assertion`] - RFC 7523 assertion claims and signing
//! - [`token`] - Token endpoint exchange and access tokens

pub mod client_assertion;
pub mod token;

pub use client_assertion::{AssertionClaims, AssertionSigner};
pub use token::{AccessToken, ClientCredentialsRequest, TokenExchanger, TokenResponse};
