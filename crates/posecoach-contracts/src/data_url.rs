//! `data:<mime>;base64,<payload>` encoding for image bytes stored as JSON text.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

pub fn sniff_mime(bytes: &[u8]) -> &'static str {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        return "image/png";
    }
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return "image/jpeg";
    }
    if bytes.len() >= 12 && &bytes[..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return "image/webp";
    }
    if bytes.starts_with(b"GIF8") {
        return "image/gif";
    }
    "application/octet-stream"
}

/// File extension matching [`sniff_mime`].
pub fn extension_for(bytes: &[u8]) -> &'static str {
    match sniff_mime(bytes) {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/webp" => "webp",
        "image/gif" => "gif",
        _ => "bin",
    }
}

pub fn encode(bytes: &[u8]) -> String {
    format!("data:{};base64,{}", sniff_mime(bytes), BASE64.encode(bytes))
}

/// Decodes a data URL. A bare base64 payload without the `data:` prefix is
/// accepted too.
pub fn decode(raw: &str) -> Result<Vec<u8>, String> {
    let trimmed = raw.trim();
    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => {
            let (header, payload) = rest
                .split_once(',')
                .ok_or_else(|| "data URL is missing ','".to_string())?;
            if !header.ends_with(";base64") {
                return Err(format!("unsupported data URL encoding '{header}'"));
            }
            payload
        }
        None => trimmed,
    };
    BASE64
        .decode(payload.as_bytes())
        .map_err(|err| format!("invalid base64 image payload: {err}"))
}

pub(crate) mod bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::encode(value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::decode(&raw).map_err(serde::de::Error::custom)
    }
}

pub(crate) mod option_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(bytes) => serializer.serialize_some(&super::encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.filter(|value| !value.trim().is_empty())
            .map(|value| super::decode(&value).map_err(serde::de::Error::custom))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, sniff_mime};

    #[test]
    fn encode_uses_sniffed_mime() {
        let png = [0x89, b'P', b'N', b'G', 0x0D, 0x0A];
        assert!(encode(&png).starts_with("data:image/png;base64,"));
        assert_eq!(sniff_mime(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_mime(b"hello"), "application/octet-stream");
    }

    #[test]
    fn decode_accepts_prefixed_and_bare_payloads() {
        let bytes = vec![0xFF, 0xD8, 0xFF, 0x01, 0x02];
        assert_eq!(decode(&encode(&bytes)), Ok(bytes.clone()));
        assert_eq!(decode("/9j/AQI="), Ok(bytes));
    }

    #[test]
    fn decode_rejects_non_base64_data_url() {
        assert!(decode("data:image/png,rawtext").is_err());
        assert!(decode("data:image/png;base64").is_err());
        assert!(decode("data:image/png;base64,@@@").is_err());
    }
}
