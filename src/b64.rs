use base64::engine::general_purpose;
use base64::Engine;

/// Subscription publishers mix standard and url-safe alphabets, with or without padding.
pub fn decode_lenient(s: &str) -> Option<Vec<u8>> {
  let cleaned: String = s.chars().filter(|c| !c.is_whitespace()).collect();
  if cleaned.is_empty() {
    return None;
  }
  let mut candidates = Vec::with_capacity(2);
  let rem = cleaned.len() % 4;
  if rem != 0 {
    candidates.push(format!("{cleaned}{}", "=".repeat(4 - rem)));
  }
  candidates.push(cleaned);

  for cand in candidates {
    for engine in [&general_purpose::STANDARD, &general_purpose::URL_SAFE] {
      if let Ok(bytes) = engine.decode(&cand) {
        return Some(bytes);
      }
    }
  }
  None
}

pub fn decode_to_utf8(s: &str) -> Option<String> {
  let bytes = decode_lenient(s)?;
  let txt = String::from_utf8(bytes).ok()?;
  if txt.trim().is_empty() {
    None
  } else {
    Some(txt)
  }
}

pub fn encode_standard(data: &[u8]) -> String {
  general_purpose::STANDARD.encode(data)
}

/// Alphabet safe inside URI userinfo and path segments.
pub fn encode_url_safe(data: &[u8]) -> String {
  general_purpose::URL_SAFE_NO_PAD.encode(data)
}

/// Cheap pre-check before attempting a whole-body decode.
pub fn looks_like_base64(text: &str) -> bool {
  let s = text.trim();
  if s.len() < 16 {
    return false;
  }
  let lower = s.to_ascii_lowercase();
  if lower.starts_with("http://") || lower.starts_with("https://") {
    return false;
  }
  s.chars()
    .all(|c| c.is_whitespace() || c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn decodes_unpadded_and_url_safe() {
    // "subscription?>>" contains bytes that differ between alphabets
    let raw = b"subscription?>>";
    let std = general_purpose::STANDARD.encode(raw);
    let url = general_purpose::URL_SAFE_NO_PAD.encode(raw);
    assert_eq!(decode_lenient(&std).unwrap(), raw);
    assert_eq!(decode_lenient(&url).unwrap(), raw);
    assert_eq!(decode_lenient(&format!("{}\n{}", &std[..8], &std[8..])).unwrap(), raw);
  }

  #[test]
  fn rejects_garbage() {
    assert!(decode_lenient("").is_none());
    assert!(decode_lenient("not base64 at all!").is_none());
    assert!(decode_to_utf8("   ").is_none());
  }

  #[test]
  fn base64_precheck() {
    assert!(looks_like_base64("dmxlc3M6Ly91dWlkQGguZXhhbXBsZTo0NDM="));
    assert!(!looks_like_base64("https://example.com/sub"));
    assert!(!looks_like_base64("short"));
    assert!(!looks_like_base64("vless://uuid@h.example:443#name"));
  }
}
