use super::{json_port, json_str, json_str_any, json_u32, opt, to_bool};
use crate::b64;
use crate::error::CodecError;
use crate::node::{CanonicalNode, NodeSettings, Protocol, VmessSettings};
use serde_json::{json, Value as JsonValue};

const SCHEME: &str = "vmess";

/// Payload is base64(JSON) in the v2rayN "v": "2" layout.
pub(super) fn parse(rest: &str) -> Result<CanonicalNode, CodecError> {
  // A few publishers append "#name" outside the blob; the JSON `ps` wins.
  let b64 = rest.split('#').next().unwrap_or("").trim();
  let bytes = b64::decode_lenient(b64).ok_or_else(|| CodecError::malformed(SCHEME, "invalid base64"))?;
  let json_text = String::from_utf8(bytes).map_err(|_| CodecError::malformed(SCHEME, "payload is not utf-8"))?;
  let obj: JsonValue =
    serde_json::from_str(&json_text).map_err(|e| CodecError::malformed(SCHEME, format!("invalid json: {e}")))?;
  if !obj.is_object() {
    return Err(CodecError::malformed(SCHEME, "json payload is not an object"));
  }

  let server = json_str(&obj, "add");
  if server.is_empty() {
    return Err(CodecError::malformed(SCHEME, "missing server"));
  }
  let port = match json_port(&obj, "port") {
    None => Protocol::Vmess.default_port(),
    Some(Ok(p)) => p,
    Some(Err(())) => return Err(CodecError::malformed(SCHEME, format!("invalid port: {}", json_str(&obj, "port")))),
  };

  let cipher = json_str_any(&obj, &["scy", "cipher"]);
  let network = json_str(&obj, "net");
  let tls = json_str(&obj, "tls");

  // The name is kept verbatim; every other field is trimmed.
  let name = match obj.get("ps").and_then(|v| v.as_str()) {
    Some(ps) => ps.to_string(),
    None => json_str(&obj, "ps"),
  };

  Ok(CanonicalNode::new(
    name,
    server,
    port,
    NodeSettings::Vmess(VmessSettings {
      uuid: json_str(&obj, "id"),
      alter_id: json_u32(&obj, "aid").unwrap_or(0),
      cipher: if cipher.is_empty() { "auto".to_string() } else { cipher },
      network: if network.is_empty() { "tcp".to_string() } else { network },
      tls: tls.eq_ignore_ascii_case("tls") || to_bool(&tls),
      sni: opt(&json_str_any(&obj, &["sni", "serverName"])),
      host: opt(&json_str(&obj, "host")),
      path: opt(&json_str(&obj, "path")),
    }),
  ))
}

pub(super) fn serialize(node: &CanonicalNode, s: &VmessSettings) -> String {
  let payload = json!({
    "v": "2",
    "ps": node.name,
    "add": node.server,
    "port": node.port.to_string(),
    "id": s.uuid,
    "aid": s.alter_id.to_string(),
    "scy": s.cipher,
    "net": s.network,
    "type": "none",
    "host": s.host.as_deref().unwrap_or(""),
    "path": s.path.as_deref().unwrap_or(""),
    "tls": if s.tls { "tls" } else { "" },
    "sni": s.sni.as_deref().unwrap_or(""),
  });
  format!("vmess://{}", b64::encode_standard(payload.to_string().as_bytes()))
}
