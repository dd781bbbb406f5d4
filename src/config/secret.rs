//! Secret handling for OAuth material
//!
//! Client secrets, access tokens and refresh tokens are held in
//! `secrecy::Secret` so they are zeroed on drop and redacted from `Debug`
//! output, which keeps them out of the structured logs.
//!
//! # Example
//!
//! ```rust
//! use invoicer::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let token = secret_string("ya29.a0Af".to_string());
//! assert_eq!(token.expose_secret().as_ref(), "ya29.a0Af");
//! assert!(!format!("{token:?}").contains("ya29"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// String newtype that satisfies the `Secret` trait bounds
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A secret string: zeroed on drop, redacted in Debug, serialized verbatim
pub type SecretString = Secret<SecretValue>;

/// Wraps a `String` as a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}
