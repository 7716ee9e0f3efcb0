// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Recipient-facing link formats.
//!
//! - sign: `<base>/sign/<token>`
//! - completion: `<base>/sign/<token>/complete`
//! - asset: `<base>/api/v1/esign/signing/assets/<token>`
//!
//! Tokens are URL-escaped. Links never carry object-storage keys.

fn base(public_base_url: &str) -> &str {
    public_base_url.trim_end_matches('/')
}

pub fn sign_link(public_base_url: &str, token: &str) -> String {
    format!("{}/sign/{}", base(public_base_url), urlencoding::encode(token))
}

pub fn completion_link(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/sign/{}/complete",
        base(public_base_url),
        urlencoding::encode(token)
    )
}

pub fn asset_link(public_base_url: &str, token: &str) -> String {
    format!(
        "{}/api/v1/esign/signing/assets/{}",
        base(public_base_url),
        urlencoding::encode(token)
    )
}

/// Token of a sign or completion link.
pub fn token_from_link(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/sign/")?;
    let raw = rest.strip_suffix("/complete").unwrap_or(rest);
    if raw.is_empty() || raw.contains('/') {
        return None;
    }
    urlencoding::decode(raw).ok().map(|token| token.into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_formats() {
        assert_eq!(
            sign_link("http://localhost:8082/", "t 1"),
            "http://localhost:8082/sign/t%201"
        );
        assert_eq!(
            completion_link("https://sign.example.com", "abc"),
            "https://sign.example.com/sign/abc/complete"
        );
        assert_eq!(
            asset_link("https://sign.example.com", "abc"),
            "https://sign.example.com/api/v1/esign/signing/assets/abc"
        );
    }

    #[test]
    fn test_token_from_link() {
        let url = completion_link("http://localhost:8082", "t/1");
        assert_eq!(token_from_link(&url).as_deref(), Some("t/1"));
        assert_eq!(
            token_from_link("http://localhost:8082/sign/abc").as_deref(),
            Some("abc")
        );
        assert_eq!(token_from_link("http://localhost:8082/other/abc"), None);
    }
}
