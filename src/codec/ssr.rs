//! `ssr://BASE64URL(host:port:protocol:method:obfs:BASE64URL(password)/?obfsparam=..&protoparam=..&remarks=..&group=..)`
//!
//! Every parameter value is itself base64url; the whole body is base64url again.

use super::{opt, parse_port, strip_brackets};
use crate::b64;
use crate::error::CodecError;
use crate::node::{CanonicalNode, NodeSettings, ShadowsocksRSettings};

const SCHEME: &str = "ssr";

fn decode_field(s: &str) -> String {
  if s.trim().is_empty() {
    return String::new();
  }
  b64::decode_lenient(s)
    .and_then(|b| String::from_utf8(b).ok())
    .unwrap_or_default()
}

pub(super) fn parse(rest: &str) -> Result<CanonicalNode, CodecError> {
  let body = b64::decode_to_utf8(rest.trim()).ok_or_else(|| CodecError::malformed(SCHEME, "invalid base64"))?;
  let body = body.trim();
  let (main, query) = match body.split_once("/?") {
    Some((m, q)) => (m, q),
    None => match body.split_once('?') {
      Some((m, q)) => (m, q),
      None => (body.trim_end_matches('/'), ""),
    },
  };

  // Split from the right so IPv6 hosts keep their colons.
  let fields: Vec<&str> = main.rsplitn(6, ':').collect();
  let [password_b64, obfs, method, protocol, port, host] = fields[..] else {
    return Err(CodecError::malformed(SCHEME, "expected host:port:protocol:method:obfs:password"));
  };
  let server = strip_brackets(host.trim()).to_string();
  if server.is_empty() {
    return Err(CodecError::malformed(SCHEME, "missing server"));
  }
  let port = parse_port(port, SCHEME)?;

  let mut name = String::new();
  let mut settings = ShadowsocksRSettings {
    protocol: protocol.trim().to_string(),
    cipher: method.trim().to_string(),
    obfs: obfs.trim().to_string(),
    password: decode_field(password_b64),
    ..Default::default()
  };
  for pair in query.split('&') {
    let Some((k, v)) = pair.split_once('=') else {
      continue;
    };
    let value = decode_field(v);
    match k {
      "remarks" => name = value,
      "obfsparam" => settings.obfs_param = opt(&value),
      "protoparam" => settings.protocol_param = opt(&value),
      "group" => settings.group = opt(&value),
      _ => {}
    }
  }

  Ok(CanonicalNode::new(name, server, port, NodeSettings::ShadowsocksR(settings)))
}

pub(super) fn serialize(node: &CanonicalNode, s: &ShadowsocksRSettings) -> String {
  let mut params = Vec::new();
  let fields = [
    ("obfsparam", s.obfs_param.as_deref()),
    ("protoparam", s.protocol_param.as_deref()),
    ("remarks", Some(node.name.as_str())),
    ("group", s.group.as_deref()),
  ];
  for (key, value) in fields {
    if let Some(v) = value.filter(|v| !v.is_empty()) {
      params.push(format!("{key}={}", b64::encode_url_safe(v.as_bytes())));
    }
  }
  let body = format!(
    "{}:{}:{}:{}:{}:{}/?{}",
    node.server,
    node.port,
    s.protocol,
    s.cipher,
    s.obfs,
    b64::encode_url_safe(s.password.as_bytes()),
    params.join("&")
  );
  format!("ssr://{}", b64::encode_url_safe(body.as_bytes()))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec;

  #[test]
  fn whole_uri_is_opaque() {
    let node = CanonicalNode::new(
      "SSR节点",
      "example.com",
      8388,
      NodeSettings::ShadowsocksR(ShadowsocksRSettings {
        cipher: "aes-256-cfb".to_string(),
        password: "test_password".to_string(),
        ..Default::default()
      }),
    );
    let uri = codec::serialize(&node);
    assert!(uri.starts_with("ssr://"));
    assert!(!uri.contains("example.com"));
    let body = b64::decode_to_utf8(&uri["ssr://".len()..]).unwrap();
    assert!(body.starts_with("example.com:8388:origin:aes-256-cfb:plain:"));
  }

  #[test]
  fn parses_publisher_link_with_padding() {
    let pw = b64::encode_url_safe(b"pw");
    let remarks = b64::encode_url_safe("香港".as_bytes());
    let body = format!("1.2.3.4:443:auth_sha1_v4:chacha20:http_simple:{pw}/?remarks={remarks}");
    let uri = format!("ssr://{}", b64::encode_standard(body.as_bytes()));
    let node = codec::parse(&uri).unwrap();
    assert_eq!(node.server, "1.2.3.4");
    assert_eq!(node.port, 443);
    assert_eq!(node.name, "香港");
    let NodeSettings::ShadowsocksR(s) = node.settings else {
      panic!("expected ssr");
    };
    assert_eq!(s.protocol, "auth_sha1_v4");
    assert_eq!(s.obfs, "http_simple");
    assert_eq!(s.password, "pw");
  }

  #[test]
  fn too_few_fields_is_malformed() {
    let uri = format!("ssr://{}", b64::encode_url_safe(b"host:443:origin"));
    assert!(matches!(codec::parse(&uri), Err(CodecError::MalformedPayload { .. })));
  }
}
