//! Rule table errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("Invalid selector `{selector}`: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("Invalid redirect target `{target}`: {source}")]
    InvalidRedirect {
        target: String,
        #[source]
        source: url::ParseError,
    },

    #[error("Redirect target `{target}` matches blocked path `{path}`")]
    RedirectLoop { target: String, path: String },

    #[error("Invalid config: {0}")]
    Config(#[from] toml::de::Error),
}
