//! AI backend failures. `Display` is the text shown to chat users.

use thiserror::Error;

use crate::error::MissingSecret;

#[derive(Debug, Error)]
pub enum AiError {
    #[error(transparent)]
    MissingSecret(#[from] MissingSecret),

    #[error("Could not reach the {0} service. {1}")]
    Unreachable(&'static str, &'static str),

    #[error(
        "Blocked by the ngrok free-tier browser warning (403).\n\n\
         Fixes:\n\
         1. Use a static ngrok domain: ngrok http 11434 --domain=your-domain.ngrok-free.app\n\
         2. Or open the ngrok URL once in a browser to set the cookie\n\
         3. Or switch to another tunnel such as cloudflared\n\n\
         ngrok URL: {base_url}"
    )]
    NgrokInterstitial { base_url: String },

    #[error("ngrok refused the connection (403): {0}")]
    Forbidden(String),

    #[error("{service} API error: {status}")]
    Status {
        service: &'static str,
        status: reqwest::StatusCode,
    },

    #[error("OpenAI API key is invalid or expired")]
    InvalidKey,

    #[error("OpenAI API quota exhausted or rate limited")]
    RateLimited,

    #[error("OpenAI service is temporarily unavailable, try again later")]
    Unavailable,

    #[error("OpenAI API error: {0}")]
    Api(String),

    #[error("{0} API returned an unexpected response: {1}")]
    Format(&'static str, &'static str),
}
