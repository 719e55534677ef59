//! Текст, которым пользователи обмениваются вручную.
//!
//! Формат: JSON `{ sdp, id, ts }` → gzip → base64. Голый JSON описания
//! (`{"type":"offer","sdp":"..."}`) тоже принимается, чтобы браузерный
//! собеседник мог вставить свой `localDescription` как есть.

use crate::error::SignalError;
use crate::utils::random_id;
use base64::{engine::general_purpose, Engine as _};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::io::{Read, Write};
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Предел распакованного JSON; настоящий SDP занимает единицы килобайт
pub const MAX_SIGNAL_BYTES: usize = 1 << 20;

/// Полезная нагрузка SDP с метаданными
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SdpPayload {
    pub sdp: RTCSessionDescription,
    pub id: String,
    pub ts: i64,
}

impl SdpPayload {
    /// Новый сеанс (сторона offer)
    pub fn new(sdp: RTCSessionDescription) -> Self {
        Self::reply(sdp, random_id())
    }

    /// Ответ в рамках существующего сеанса
    pub fn reply(sdp: RTCSessionDescription, id: String) -> Self {
        Self {
            sdp,
            id,
            ts: chrono::Utc::now().timestamp(),
        }
    }
}

pub fn encode(payload: &SdpPayload) -> Result<String, SignalError> {
    let json = serde_json::to_vec(payload)?;
    let mut gz = GzEncoder::new(Vec::new(), Compression::best());
    gz.write_all(&json)?;
    let compressed = gz.finish()?;
    Ok(general_purpose::STANDARD.encode(compressed))
}

pub fn decode(text: &str) -> Result<SdpPayload, SignalError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(SignalError::Empty);
    }

    if text.starts_with('{') {
        return decode_json(text.as_bytes());
    }

    // переносы строк могли появиться при пересылке через мессенджер
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let compressed = general_purpose::STANDARD.decode(compact)?;
    let mut json = Vec::new();
    GzDecoder::new(compressed.as_slice())
        .take(MAX_SIGNAL_BYTES as u64 + 1)
        .read_to_end(&mut json)?;
    if json.len() > MAX_SIGNAL_BYTES {
        return Err(SignalError::TooLarge(MAX_SIGNAL_BYTES));
    }
    decode_json(&json)
}

fn decode_json(json: &[u8]) -> Result<SdpPayload, SignalError> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Incoming {
        Payload(SdpPayload),
        Bare(RTCSessionDescription),
    }

    Ok(match serde_json::from_slice(json)? {
        Incoming::Payload(p) => p,
        Incoming::Bare(sdp) => SdpPayload::new(sdp),
    })
}

/// Короткий код для сверки вслух: совпал ли вставленный текст
pub fn fingerprint(text: &str) -> String {
    let digest = Sha256::digest(text.trim().as_bytes());
    hex::encode(&digest[..6])
        .as_bytes()
        .chunks(4)
        .map(|c| String::from_utf8_lossy(c).to_uppercase())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use webrtc::peer_connection::sdp::sdp_type::RTCSdpType;

    const SDP: &str = "v=0\r\no=- 1 2 IN IP4 127.0.0.1\r\ns=-\r\nt=0 0\r\n";

    fn offer() -> RTCSessionDescription {
        let mut d = RTCSessionDescription::default();
        d.sdp_type = RTCSdpType::Offer;
        d.sdp = SDP.to_string();
        d
    }

    #[test]
    fn encoded_text_decodes_back() {
        let payload = SdpPayload::new(offer());
        let text = encode(&payload).unwrap();
        assert!(!text.contains('{'));

        let back = decode(&text).unwrap();
        assert_eq!(back.id, payload.id);
        assert_eq!(back.ts, payload.ts);
        assert_eq!(back.sdp.sdp_type, RTCSdpType::Offer);
        assert_eq!(back.sdp.sdp, SDP);
    }

    #[test]
    fn tolerates_wrapped_lines() {
        let text = encode(&SdpPayload::new(offer())).unwrap();
        let (a, b) = text.split_at(text.len() / 2);
        let wrapped = format!("  {a}\n{b}\n");
        assert_eq!(decode(&wrapped).unwrap().sdp.sdp, SDP);
    }

    #[test]
    fn accepts_browser_json() {
        let json = serde_json::json!({ "type": "answer", "sdp": SDP }).to_string();
        let p = decode(&json).unwrap();
        assert_eq!(p.sdp.sdp_type, RTCSdpType::Answer);
        assert_eq!(p.id.len(), 16);
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(decode("   "), Err(SignalError::Empty)));
        assert!(matches!(decode("not base64!!"), Err(SignalError::Base64(_))));
        let not_gzip = general_purpose::STANDARD.encode(b"plain");
        assert!(matches!(decode(&not_gzip), Err(SignalError::Compression(_))));
        assert!(matches!(decode("{\"hello\":1}"), Err(SignalError::Json(_))));
    }

    #[test]
    fn rejects_oversized_decompression() {
        let mut gz = GzEncoder::new(Vec::new(), Compression::best());
        gz.write_all(&vec![b' '; MAX_SIGNAL_BYTES * 4]).unwrap();
        let text = general_purpose::STANDARD.encode(gz.finish().unwrap());
        // несколько килобайт текста, мегабайты после распаковки
        assert!(text.len() < 64 * 1024);
        assert!(matches!(
            decode(&text),
            Err(SignalError::TooLarge(MAX_SIGNAL_BYTES))
        ));
    }

    #[test]
    fn fingerprint_is_short_and_stable() {
        let fp = fingerprint("abc");
        assert_eq!(fp, fingerprint("  abc\n"));
        assert_eq!(fp.len(), 14);
        assert_eq!(fp.matches('-').count(), 2);
        assert_ne!(fp, fingerprint("abd"));
    }
}
