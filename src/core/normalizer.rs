use crate::domain::model::{ImageAsset, DEFAULT_MIME_TYPE};
use crate::utils::error::{CutoutError, Result};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use regex::Regex;
use std::sync::LazyLock;

static DATA_URI: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^data:image/([A-Za-z0-9.+-]+);base64,(.+)$").expect("valid data-uri regex")
});

// 殘缺的前綴，例如 `data:image/;base64,` 或 `data:;base64,`
static PARTIAL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^data:(?:image/[^;,]*)?(?:;[^,]*)?,").expect("valid prefix regex")
});

const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_padding_mode(DecodePaddingMode::Indifferent)
        .with_decode_allow_trailing_bits(true),
);

/// 將呼叫端傳入的圖片字串轉成 [`ImageAsset`]
///
/// 接受 `data:image/<subtype>;base64,<data>` 或沒有前綴的 base64。
/// 無法辨識 MIME 時退回 `image/jpeg`，只有空字串才回傳錯誤；
/// 解不出的內容照樣交給上游，由 Orchestrator 決定降級。
pub fn normalize(payload: &str) -> Result<ImageAsset> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(CutoutError::validation("Missing image data"));
    }

    let (mime_type, data) = match DATA_URI.captures(payload) {
        Some(caps) => (
            format!("image/{}", caps[1].to_ascii_lowercase()),
            caps.get(2).map(|m| m.as_str()).unwrap_or_default(),
        ),
        None => {
            let stripped = PARTIAL_PREFIX
                .find(payload)
                .map(|m| &payload[m.end()..])
                .unwrap_or(payload);
            (DEFAULT_MIME_TYPE.to_string(), stripped)
        }
    };

    let encoded: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if encoded.is_empty() {
        return Err(CutoutError::validation("Missing image data"));
    }

    let bytes = decode_lenient(&encoded);
    if bytes.is_empty() {
        tracing::warn!("⚠️ Image payload has no decodable base64 content, forwarding as-is");
    }

    tracing::debug!(
        "Normalized image payload: {} ({} bytes)",
        mime_type,
        bytes.len()
    );

    Ok(ImageAsset::new(bytes, mime_type, encoded))
}

/// 盡量取回位元組：略過字母表以外的字元，URL-safe 字元視同標準字元，
/// 第一個 `=` 之後不再讀取，多出的單一字元捨棄
fn decode_lenient(encoded: &str) -> Vec<u8> {
    let mut cleaned: String = encoded
        .split('=')
        .next()
        .unwrap_or_default()
        .chars()
        .filter_map(|c| match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '+' | '/' => Some(c),
            '-' => Some('+'),
            '_' => Some('/'),
            _ => None,
        })
        .collect();
    if cleaned.len() % 4 == 1 {
        cleaned.pop();
    }

    match LENIENT.decode(&cleaned) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("⚠️ Could not decode image payload: {}", e);
            Vec::new()
        }
    }
}
