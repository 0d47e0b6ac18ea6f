mod clash;
mod shadowsocks;
mod ssr;
mod uri;
mod vmess;

pub use clash::{convert, node_from_map, parse_clash_yaml};

use crate::error::CodecError;
use crate::node::{CanonicalNode, NodeSettings, Protocol};
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde_json::Value as JsonValue;

/// Everything but RFC 3986 unreserved characters.
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// Parses one node URI. The scheme picks the decoder; unknown schemes are rejected.
pub fn parse(uri: &str) -> Result<CanonicalNode, CodecError> {
  let raw = uri.trim();
  let Some((scheme, rest)) = raw.split_once("://") else {
    return Err(CodecError::UnsupportedScheme(raw.chars().take(16).collect()));
  };
  let protocol =
    Protocol::from_scheme(scheme).ok_or_else(|| CodecError::UnsupportedScheme(scheme.to_string()))?;
  match protocol {
    Protocol::Vmess => vmess::parse(rest),
    Protocol::Vless | Protocol::Trojan | Protocol::Hysteria2 => uri::parse(protocol, raw),
    Protocol::Shadowsocks => shadowsocks::parse(rest),
    Protocol::ShadowsocksR => ssr::parse(rest),
  }
}

/// Emits the wire URI for a node. Missing fields become empty segments.
pub fn serialize(node: &CanonicalNode) -> String {
  match &node.settings {
    NodeSettings::Vmess(s) => vmess::serialize(node, s),
    NodeSettings::Vless(s) => uri::serialize_vless(node, s),
    NodeSettings::Trojan(s) => uri::serialize_trojan(node, s),
    NodeSettings::Hysteria2(s) => uri::serialize_hysteria2(node, s),
    NodeSettings::Shadowsocks(s) => shadowsocks::serialize(node, s),
    NodeSettings::ShadowsocksR(s) => ssr::serialize(node, s),
  }
}

pub(crate) fn encode_component(s: &str) -> String {
  utf8_percent_encode(s, COMPONENT).to_string()
}

pub(crate) fn decode_component(s: &str) -> String {
  match percent_decode_str(s).decode_utf8() {
    Ok(cow) => cow.to_string(),
    Err(_) => s.to_string(),
  }
}

pub(crate) fn opt(s: &str) -> Option<String> {
  let t = s.trim();
  if t.is_empty() {
    None
  } else {
    Some(t.to_string())
  }
}

pub(crate) fn to_bool(v: &str) -> bool {
  let s = v.trim().to_lowercase();
  matches!(s.as_str(), "1" | "true" | "yes" | "y" | "on")
}

/// Brackets bare IPv6 literals so the port separator stays unambiguous.
pub(crate) fn format_host(server: &str) -> String {
  if server.contains(':') && !server.starts_with('[') {
    format!("[{server}]")
  } else {
    server.to_string()
  }
}

pub(crate) fn strip_brackets(host: &str) -> &str {
  host
    .strip_prefix('[')
    .and_then(|h| h.strip_suffix(']'))
    .unwrap_or(host)
}

/// Splits `host:port`, `[v6]:port` or a bare host (port falls back to `default_port`).
pub(crate) fn split_host_port(
  s: &str,
  default_port: u16,
  scheme: &'static str,
) -> Result<(String, u16), CodecError> {
  let s = s.trim();
  let (host, port_raw) = if let Some(rest) = s.strip_prefix('[') {
    let (host, tail) = rest
      .split_once(']')
      .ok_or_else(|| CodecError::malformed(scheme, "unterminated IPv6 literal"))?;
    (host, tail.strip_prefix(':'))
  } else {
    match s.rsplit_once(':') {
      Some((h, p)) => (h, Some(p)),
      None => (s, None),
    }
  };
  if host.trim().is_empty() {
    return Err(CodecError::malformed(scheme, "missing server"));
  }
  let port = match port_raw.map(str::trim).filter(|p| !p.is_empty()) {
    None => default_port,
    Some(p) => parse_port(p, scheme)?,
  };
  Ok((host.trim().to_string(), port))
}

pub(crate) fn parse_port(p: &str, scheme: &'static str) -> Result<u16, CodecError> {
  match p.trim().parse::<u16>() {
    Ok(0) | Err(_) => Err(CodecError::malformed(scheme, format!("invalid port: {p}"))),
    Ok(n) => Ok(n),
  }
}

pub(crate) fn json_str(obj: &JsonValue, key: &str) -> String {
  let v = obj.get(key);
  if let Some(s) = v.and_then(|x| x.as_str()) {
    return s.trim().to_string();
  }
  if let Some(n) = v.and_then(|x| x.as_i64()) {
    return n.to_string();
  }
  if let Some(b) = v.and_then(|x| x.as_bool()) {
    return if b { "true".to_string() } else { "false".to_string() };
  }
  String::new()
}

/// First non-empty value among `keys`.
pub(crate) fn json_str_any(obj: &JsonValue, keys: &[&str]) -> String {
  keys
    .iter()
    .map(|k| json_str(obj, k))
    .find(|s| !s.is_empty())
    .unwrap_or_default()
}

/// Walks nested maps, e.g. `ws-opts` / `headers` / `Host`.
pub(crate) fn json_str_at(obj: &JsonValue, path: &[&str]) -> String {
  let Some((last, parents)) = path.split_last() else {
    return String::new();
  };
  let mut cur = obj;
  for key in parents {
    match cur.get(*key) {
      Some(v) => cur = v,
      None => return String::new(),
    }
  }
  json_str(cur, last)
}

/// `None` when absent or empty; `Some(Err)` when present but not a usable port.
pub(crate) fn json_port(obj: &JsonValue, key: &str) -> Option<Result<u16, ()>> {
  let v = obj.get(key)?;
  if let Some(n) = v.as_u64() {
    return Some(u16::try_from(n).ok().filter(|p| *p > 0).ok_or(()));
  }
  if let Some(s) = v.as_str() {
    let t = s.trim();
    if t.is_empty() {
      return None;
    }
    return Some(t.parse::<u16>().ok().filter(|p| *p > 0).ok_or(()));
  }
  if v.is_null() {
    return None;
  }
  Some(Err(()))
}

pub(crate) fn json_u32(obj: &JsonValue, key: &str) -> Option<u32> {
  let v = obj.get(key)?;
  if let Some(n) = v.as_u64() {
    return u32::try_from(n).ok();
  }
  if let Some(s) = v.as_str() {
    return s.trim().parse::<u32>().ok();
  }
  None
}

pub(crate) fn json_bool(obj: &JsonValue, key: &str) -> Option<bool> {
  let x = obj.get(key)?;
  if let Some(b) = x.as_bool() {
    return Some(b);
  }
  if let Some(n) = x.as_i64() {
    return Some(n != 0);
  }
  if let Some(s) = x.as_str() {
    let t = s.trim();
    if t.is_empty() {
      return None;
    }
    return Some(to_bool(t) || t.eq_ignore_ascii_case("tls"));
  }
  None
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::node::*;

  fn round_trip(node: CanonicalNode) {
    let uri = serialize(&node);
    let back = parse(&uri).unwrap_or_else(|e| panic!("{uri}: {e}"));
    assert_eq!(back, node, "uri: {uri}");
  }

  #[test]
  fn round_trips_vless() {
    round_trip(CanonicalNode::new(
      "🇯🇵 Tokyo #1",
      "jp.example.net",
      8443,
      NodeSettings::Vless(VlessSettings {
        uuid: "12345678-1234-1234-1234-123456789abc".to_string(),
        network: "ws".to_string(),
        security: Some("tls".to_string()),
        sni: Some("cdn.example.net".to_string()),
        host: Some("cdn.example.net".to_string()),
        path: Some("/ray?ed=2048".to_string()),
        ..Default::default()
      }),
    ));
  }

  #[test]
  fn round_trips_vless_reality() {
    round_trip(CanonicalNode::new(
      "reality",
      "203.0.113.9",
      443,
      NodeSettings::Vless(VlessSettings {
        uuid: "u".to_string(),
        security: Some("reality".to_string()),
        flow: Some("xtls-rprx-vision".to_string()),
        fingerprint: Some("chrome".to_string()),
        public_key: Some("pk+/=".to_string()),
        short_id: Some("ab12".to_string()),
        sni: Some("www.microsoft.com".to_string()),
        ..Default::default()
      }),
    ));
  }

  #[test]
  fn round_trips_trojan() {
    round_trip(CanonicalNode::new(
      "Trojan节点",
      "example.com",
      443,
      NodeSettings::Trojan(TrojanSettings {
        password: "p@ss:word/with#stuff".to_string(),
        sni: Some("example.com".to_string()),
        allow_insecure: true,
        ..Default::default()
      }),
    ));
  }

  #[test]
  fn round_trips_hysteria2() {
    round_trip(CanonicalNode::new(
      "Hysteria2节点",
      "2001:db8::1",
      36712,
      NodeSettings::Hysteria2(Hysteria2Settings {
        password: "test_password".to_string(),
        sni: Some("example.com".to_string()),
        insecure: true,
        obfs: Some("salamander".to_string()),
        obfs_password: Some("o b f s".to_string()),
      }),
    ));
  }

  #[test]
  fn round_trips_shadowsocks() {
    round_trip(CanonicalNode::new(
      "SS节点",
      "example.com",
      8388,
      NodeSettings::Shadowsocks(ShadowsocksSettings {
        cipher: "aes-256-gcm".to_string(),
        password: "test:password".to_string(),
        plugin: Some("obfs-local;obfs=http;obfs-host=www.bing.com".to_string()),
      }),
    ));
  }

  #[test]
  fn round_trips_shadowsocksr() {
    round_trip(CanonicalNode::new(
      "SSR节点",
      "example.com",
      8388,
      NodeSettings::ShadowsocksR(ShadowsocksRSettings {
        protocol: "auth_aes128_md5".to_string(),
        cipher: "aes-256-cfb".to_string(),
        obfs: "tls1.2_ticket_auth".to_string(),
        password: "test_password".to_string(),
        obfs_param: Some("download.windowsupdate.com".to_string()),
        protocol_param: None,
        group: Some("free".to_string()),
      }),
    ));
  }

  #[test]
  fn vmess_round_trips_field_set() {
    let node = CanonicalNode::new(
      "测试节点",
      "example.com",
      443,
      NodeSettings::Vmess(VmessSettings {
        uuid: "12345678-1234-1234-1234-123456789abc".to_string(),
        alter_id: 0,
        cipher: "auto".to_string(),
        network: "ws".to_string(),
        tls: true,
        sni: Some("example.com".to_string()),
        host: Some("example.com".to_string()),
        path: Some("/v".to_string()),
      }),
    );
    let uri = serialize(&node);
    assert!(uri.starts_with("vmess://"));
    assert_eq!(parse(&uri).unwrap(), node);
  }

  #[test]
  fn padded_names_are_kept_verbatim() {
    let name = " HK 01 ";
    let settings = [
      NodeSettings::Vmess(VmessSettings {
        uuid: "u".to_string(),
        ..Default::default()
      }),
      NodeSettings::Vless(VlessSettings {
        uuid: "u".to_string(),
        ..Default::default()
      }),
      NodeSettings::Shadowsocks(ShadowsocksSettings {
        cipher: "aes-256-gcm".to_string(),
        password: "pw".to_string(),
        plugin: None,
      }),
      NodeSettings::ShadowsocksR(ShadowsocksRSettings {
        cipher: "aes-256-cfb".to_string(),
        password: "pw".to_string(),
        ..Default::default()
      }),
    ];
    for s in settings {
      let port = s.protocol().default_port();
      round_trip(CanonicalNode::new(name, "hk.example", port, s));
    }
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    assert_eq!(
      parse("tuic://uuid:pw@h:443"),
      Err(CodecError::UnsupportedScheme("tuic".to_string()))
    );
    assert!(matches!(parse("just text"), Err(CodecError::UnsupportedScheme(_))));
  }

  #[test]
  fn missing_credential_keeps_userinfo_separator() {
    let node = CanonicalNode::new("", "h.example", 443, NodeSettings::Vless(VlessSettings::default()));
    let uri = serialize(&node);
    assert!(uri.starts_with("vless://@h.example:443"), "{uri}");
  }

  #[test]
  fn host_port_splitting() {
    assert_eq!(split_host_port("h:80", 1, "t").unwrap(), ("h".to_string(), 80));
    assert_eq!(split_host_port("[::1]:80", 1, "t").unwrap(), ("::1".to_string(), 80));
    assert_eq!(split_host_port("h", 443, "t").unwrap(), ("h".to_string(), 443));
    assert!(split_host_port("h:0", 1, "t").is_err());
    assert!(split_host_port(":80", 1, "t").is_err());
  }
}
