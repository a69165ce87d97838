//! Share links carrying a token in the `token` query parameter.

use url::Url;

use crate::error::ShareError;

pub const DEFAULT_BASE_URL: &str = "https://jwtdeck.local/";

const TOKEN_PARAM: &str = "token";

/// Build `<base_url>?token=<token>`, replacing any `token` already present.
///
/// Other query parameters and the fragment are kept.
pub fn share_link(base_url: &str, token: &str) -> Result<String, ShareError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(ShareError::EmptyToken);
    }

    let mut url = Url::parse(base_url)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != TOKEN_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(TOKEN_PARAM, token);
    Ok(url.into())
}

/// Extract the token from a share link.
pub fn token_from_link(link: &str) -> Result<String, ShareError> {
    let url = Url::parse(link.trim())?;
    url.query_pairs()
        .find(|(k, _)| k == TOKEN_PARAM)
        .map(|(_, v)| v.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or(ShareError::MissingToken)
}
