use anyhow::{anyhow, Context, Result};
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{local, Local};
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use std::time::Duration;
use uuid::Uuid;

/// Tokens expire 1440 minutes after issuance and are not renewable.
pub const TOKEN_EXPIRATION_MINUTES: u64 = 1440;

/// Issues and verifies v4.local session tokens carrying the user id.
///
/// The 32-byte key is derived from the configured secret, tokens issued with
/// one secret are invalid under any other.
pub struct TokenSigner {
    key: SymmetricKey<V4>,
}

impl TokenSigner {
    /// # Errors
    /// Returns an error if the key cannot be derived from the secret.
    pub fn new(secret: &SecretString) -> Result<Self> {
        let digest = Sha256::digest(secret.expose_secret().as_bytes());
        let key = SymmetricKey::<V4>::from(digest.as_slice())
            .map_err(|_| anyhow!("failed to derive token key"))?;

        Ok(Self { key })
    }

    /// Issue a token for the given user id.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be built or encrypted.
    pub fn issue(&self, user_id: Uuid) -> Result<String> {
        let mut claims =
            Claims::new_expires_in(&Duration::from_secs(TOKEN_EXPIRATION_MINUTES * 60))
                .map_err(|_| anyhow!("failed to build token claims"))?;

        claims
            .subject(&user_id.to_string())
            .map_err(|_| anyhow!("failed to set token subject"))?;

        local::encrypt(&self.key, &claims, None, None).map_err(|_| anyhow!("failed to seal token"))
    }

    /// Verify a token and return the user id it was issued for.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, tampered with, or expired.
    pub fn verify(&self, token: &str) -> Result<Uuid> {
        let untrusted =
            UntrustedToken::<Local, V4>::try_from(token).map_err(|_| anyhow!("malformed token"))?;

        let rules = ClaimsValidationRules::new();
        let trusted = local::decrypt(&self.key, &untrusted, &rules, None, None)
            .map_err(|_| anyhow!("invalid or expired token"))?;

        let claims = trusted
            .payload_claims()
            .ok_or_else(|| anyhow!("token has no claims"))?;

        let subject = claims
            .get_claim("sub")
            .and_then(|value| value.as_str())
            .ok_or_else(|| anyhow!("token has no subject"))?;

        Uuid::parse_str(subject).context("token subject is not a user id")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::format_description::well_known::Rfc3339;
    use time::OffsetDateTime;

    fn signer(secret: &str) -> TokenSigner {
        TokenSigner::new(&SecretString::from(secret.to_string())).unwrap()
    }

    #[test]
    fn test_issue_and_verify_round_trip() {
        let signer = signer("s3cr3t");
        let user_id = Uuid::new_v4();

        let token = signer.issue(user_id).unwrap();
        assert_eq!(signer.verify(&token).unwrap(), user_id);
    }

    #[test]
    fn test_expiration_is_1440_minutes() {
        let signer = signer("s3cr3t");
        let token = signer.issue(Uuid::new_v4()).unwrap();

        let untrusted = UntrustedToken::<Local, V4>::try_from(token.as_str()).unwrap();
        let trusted =
            local::decrypt(&signer.key, &untrusted, &ClaimsValidationRules::new(), None, None)
                .unwrap();
        let claims = trusted.payload_claims().unwrap();
        let exp = claims.get_claim("exp").and_then(|v| v.as_str()).unwrap();

        let exp = OffsetDateTime::parse(exp, &Rfc3339).unwrap();
        let expected = OffsetDateTime::now_utc()
            + time::Duration::minutes(i64::try_from(TOKEN_EXPIRATION_MINUTES).unwrap());
        let jitter = (exp - expected).whole_seconds().abs();
        assert!(jitter < 60, "expiration off by {jitter}s");
    }

    #[test]
    fn test_token_from_other_secret_rejected() {
        let token = signer("first-secret").issue(Uuid::new_v4()).unwrap();
        assert!(signer("second-secret").verify(&token).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let signer = signer("s3cr3t");

        let past = (OffsetDateTime::now_utc() - time::Duration::minutes(5))
            .format(&Rfc3339)
            .unwrap();
        let mut claims = Claims::new().unwrap();
        claims.subject(&Uuid::new_v4().to_string()).unwrap();
        claims.expiration(&past).unwrap();

        let token = local::encrypt(&signer.key, &claims, None, None).unwrap();
        assert!(signer.verify(&token).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(signer("s3cr3t").verify("v4.local.not-a-token").is_err());
        assert!(signer("s3cr3t").verify("").is_err());
    }
}
