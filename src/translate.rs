//! Client for the Baidu general translation API.
//!
//! Requests are plain GETs signed with `md5(appid + q + salt + secret)`.

use md5::{Digest, Md5};
use rand::Rng;
use serde::Deserialize;
use url::Url;

use crate::config::Config;
use crate::error::{TranslateError, TranslateResult};
use crate::unicode::decode_unicode_escapes;

/// `error_code` the service uses for success on some endpoints.
const SUCCESS_CODE: &str = "52000";

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(default)]
    trans_result: Vec<TranslateItem>,
    #[serde(default)]
    error_code: Option<serde_json::Value>,
    #[serde(default)]
    error_msg: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranslateItem {
    #[allow(dead_code)]
    src: String,
    dst: String,
}

/// Lowercase hex MD5 of `appid + text + salt + secret` over UTF-8 bytes.
pub fn sign(appid: &str, text: &str, salt: &str, secret: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(appid.as_bytes());
    hasher.update(text.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

pub fn random_salt() -> String {
    rand::thread_rng().gen_range(0..100_000).to_string()
}

/// Extracts the text to display from a response body.
pub fn parse_response(body: &str) -> TranslateResult<String> {
    let parsed: TranslateResponse = serde_json::from_str(body)?;

    if let Some(code) = parsed.error_code {
        let code = match code {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        if code != SUCCESS_CODE {
            return Err(TranslateError::Api {
                code,
                message: parsed.error_msg.unwrap_or_default(),
            });
        }
    }

    parsed
        .trans_result
        .into_iter()
        .next()
        .map(|item| decode_unicode_escapes(&item.dst).into_owned())
        .ok_or(TranslateError::EmptyResult)
}

/// The string the window shows for a finished request.
pub fn display_text(result: TranslateResult<String>) -> String {
    match result {
        Ok(text) => text,
        Err(e) => e.fallback_text(),
    }
}

pub struct Translator {
    client: reqwest::Client,
    endpoint: String,
    appid: String,
    secret: String,
    from: String,
    to: String,
}

impl Translator {
    pub fn new(cfg: &Config) -> TranslateResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.request_timeout())
            .build()?;
        Ok(Self {
            client,
            endpoint: cfg.endpoint.clone(),
            appid: cfg.appid.clone(),
            secret: cfg.secret.clone(),
            from: cfg.from.clone(),
            to: cfg.to.clone(),
        })
    }

    /// Full request URL for `text` with the given salt.
    pub fn request_url(&self, text: &str, salt: &str) -> TranslateResult<Url> {
        let sign = sign(&self.appid, text, salt, &self.secret);
        let url = Url::parse_with_params(
            &self.endpoint,
            &[
                ("q", text),
                ("from", self.from.as_str()),
                ("to", self.to.as_str()),
                ("appid", self.appid.as_str()),
                ("salt", salt),
                ("sign", sign.as_str()),
            ],
        )?;
        Ok(url)
    }

    pub async fn translate(&self, text: &str) -> TranslateResult<String> {
        let salt = random_salt();
        let url = self.request_url(text, &salt)?;
        tracing::debug!(
            "translating {} chars {} -> {}",
            text.chars().count(),
            self.from,
            self.to
        );

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_response(&body)
    }
}
