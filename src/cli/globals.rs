use secrecy::SecretString;

#[derive(Debug, Clone)]
pub struct GlobalArgs {
    pub api_key: SecretString,
    pub token_secret: SecretString,
    pub model_url: String,
    pub model: String,
}

impl GlobalArgs {
    #[must_use]
    pub fn new(api_key: SecretString, token_secret: SecretString) -> Self {
        Self {
            api_key,
            token_secret,
            model_url: String::new(),
            model: String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_global_args() {
        let args = GlobalArgs::new(
            SecretString::from("api-key".to_string()),
            SecretString::from("token-secret".to_string()),
        );
        assert_eq!(args.api_key.expose_secret(), "api-key");
        assert_eq!(args.token_secret.expose_secret(), "token-secret");
        assert_eq!(args.model_url, "");
        assert_eq!(args.model, "");
    }
}
