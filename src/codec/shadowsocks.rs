//! `ss://` URIs.
//!
//! Serialize always emits SIP002 with a base64url `method:password` userinfo:
//! `ss://BASE64URL(method:password)@host:port[/?plugin=..]#name`.
//!
//! Parse accepts three forms:
//! - SIP002 with base64 userinfo (what serialize emits),
//! - SIP002 with percent-encoded plaintext userinfo `method:password@host:port`,
//! - legacy `ss://BASE64(method:password@host:port)#name`.

use super::{decode_component, encode_component, format_host, opt, split_host_port};
use crate::b64;
use crate::error::CodecError;
use crate::node::{CanonicalNode, NodeSettings, Protocol, ShadowsocksSettings};
use url::form_urlencoded;

const SCHEME: &str = "ss";

pub(super) fn parse(rest: &str) -> Result<CanonicalNode, CodecError> {
  let (before_hash, name) = match rest.split_once('#') {
    Some((a, b)) => (a, decode_component(b)),
    None => (rest, String::new()),
  };
  let (main, query) = match before_hash.split_once('?') {
    Some((a, q)) => (a, Some(q)),
    None => (before_hash, None),
  };
  let main = main.trim().trim_end_matches('/');
  if main.is_empty() {
    return Err(CodecError::malformed(SCHEME, "empty payload"));
  }

  let (userinfo, hostport) = match main.rsplit_once('@') {
    Some((u, h)) => (u.to_string(), h.to_string()),
    None => {
      let decoded = b64::decode_to_utf8(main).ok_or_else(|| CodecError::malformed(SCHEME, "invalid base64"))?;
      let (u, h) = decoded
        .trim()
        .rsplit_once('@')
        .ok_or_else(|| CodecError::malformed(SCHEME, "missing '@' in legacy payload"))?;
      (u.to_string(), h.to_string())
    }
  };

  let (cipher, password) = split_userinfo(&userinfo)?;
  let (server, port) = split_host_port(&hostport, Protocol::Shadowsocks.default_port(), SCHEME)?;
  let plugin = query.and_then(|q| {
    form_urlencoded::parse(q.as_bytes())
      .find(|(k, _)| k == "plugin")
      .and_then(|(_, v)| opt(&v))
  });

  Ok(CanonicalNode::new(
    name,
    server,
    port,
    NodeSettings::Shadowsocks(ShadowsocksSettings {
      cipher,
      password,
      plugin,
    }),
  ))
}

fn split_userinfo(userinfo: &str) -> Result<(String, String), CodecError> {
  let plain = decode_component(userinfo);
  let creds = if plain.contains(':') {
    plain
  } else {
    b64::decode_to_utf8(userinfo).ok_or_else(|| CodecError::malformed(SCHEME, "invalid base64 userinfo"))?
  };
  let (method, password) = creds
    .split_once(':')
    .ok_or_else(|| CodecError::malformed(SCHEME, "userinfo is not method:password"))?;
  Ok((method.trim().to_string(), password.to_string()))
}

pub(super) fn serialize(node: &CanonicalNode, s: &ShadowsocksSettings) -> String {
  let userinfo = b64::encode_url_safe(format!("{}:{}", s.cipher, s.password).as_bytes());
  let mut out = format!("ss://{userinfo}@{}:{}", format_host(&node.server), node.port);
  if let Some(plugin) = s.plugin.as_deref().filter(|p| !p.is_empty()) {
    out.push_str("/?");
    out.push_str(
      &form_urlencoded::Serializer::new(String::new())
        .append_pair("plugin", plugin)
        .finish(),
    );
  }
  if !node.name.is_empty() {
    out.push('#');
    out.push_str(&encode_component(&node.name));
  }
  out
}
