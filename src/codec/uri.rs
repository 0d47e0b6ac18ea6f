use super::{decode_component, encode_component, format_host, strip_brackets, to_bool};
use crate::error::CodecError;
use crate::node::{CanonicalNode, Hysteria2Settings, NodeSettings, Protocol, TrojanSettings, VlessSettings};
use std::collections::HashMap;
use url::form_urlencoded;
use url::Url;

/// The parts shared by `scheme://credential@host:port?query#name` URIs.
#[derive(Debug)]
struct UriCommon {
  name: String,
  host: String,
  port: u16,
  credential: String,
  params: HashMap<String, String>,
}

impl UriCommon {
  /// First present key wins. Values are kept verbatim; an empty value counts as absent.
  fn param(&self, keys: &[&str]) -> Option<String> {
    keys
      .iter()
      .find_map(|k| self.params.get(*k))
      .filter(|v| !v.is_empty())
      .cloned()
  }

  fn flag(&self, keys: &[&str]) -> bool {
    keys
      .iter()
      .find_map(|k| self.params.get(*k))
      .map(|v| to_bool(v))
      .unwrap_or(false)
  }
}

fn parse_uri_common(protocol: Protocol, uri: &str) -> Result<UriCommon, CodecError> {
  let scheme = protocol.scheme();
  let u = Url::parse(uri).map_err(|e| CodecError::malformed(scheme, e.to_string()))?;
  let name = u.fragment().map(decode_component).unwrap_or_default();
  // Non-special schemes keep opaque hosts, so non-ASCII names arrive percent-encoded.
  let host = decode_component(strip_brackets(u.host_str().unwrap_or("").trim()));
  if host.is_empty() {
    return Err(CodecError::malformed(scheme, "missing server"));
  }
  let port = match u.port() {
    Some(0) => return Err(CodecError::malformed(scheme, "invalid port: 0")),
    Some(p) => p,
    None => protocol.default_port(),
  };
  // An unescaped ':' in the credential splits it into user and password.
  let mut credential = decode_component(u.username());
  if let Some(pw) = u.password() {
    credential.push(':');
    credential.push_str(&decode_component(pw));
  }
  let params = u
    .query_pairs()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
  Ok(UriCommon {
    name,
    host,
    port,
    credential,
    params,
  })
}

pub(super) fn parse(protocol: Protocol, uri: &str) -> Result<CanonicalNode, CodecError> {
  let u = parse_uri_common(protocol, uri)?;
  let settings = match protocol {
    Protocol::Vless => NodeSettings::Vless(VlessSettings {
      uuid: u.credential.clone(),
      network: u.param(&["type"]).unwrap_or_else(|| "tcp".to_string()),
      security: u.param(&["security"]),
      sni: u.param(&["sni", "serverName"]),
      flow: u.param(&["flow"]),
      fingerprint: u.param(&["fp"]),
      public_key: u.param(&["pbk"]),
      short_id: u.param(&["sid"]),
      host: u.param(&["host"]),
      path: u.param(&["path"]),
      service_name: u.param(&["serviceName"]),
    }),
    Protocol::Trojan => NodeSettings::Trojan(TrojanSettings {
      password: u.credential.clone(),
      network: u.param(&["type"]).unwrap_or_else(|| "tcp".to_string()),
      security: u.param(&["security"]).unwrap_or_else(|| "tls".to_string()),
      sni: u.param(&["sni", "peer"]),
      allow_insecure: u.flag(&["allowInsecure", "allow_insecure", "insecure"]),
      host: u.param(&["host"]),
      path: u.param(&["path"]),
      service_name: u.param(&["serviceName"]),
    }),
    Protocol::Hysteria2 => NodeSettings::Hysteria2(Hysteria2Settings {
      password: u.credential.clone(),
      sni: u.param(&["sni", "peer"]),
      insecure: u.flag(&["insecure", "allowInsecure"]),
      obfs: u.param(&["obfs"]),
      obfs_password: u.param(&["obfs-password", "obfsPassword"]),
    }),
    other => return Err(CodecError::UnsupportedScheme(other.scheme().to_string())),
  };
  Ok(CanonicalNode::new(u.name, u.host, u.port, settings))
}

/// Query builder that skips absent values.
struct Query(form_urlencoded::Serializer<'static, String>);

impl Query {
  fn new() -> Self {
    Self(form_urlencoded::Serializer::new(String::new()))
  }

  fn put(&mut self, key: &str, value: &str) -> &mut Self {
    self.0.append_pair(key, value);
    self
  }

  fn put_opt(&mut self, key: &str, value: &Option<String>) -> &mut Self {
    if let Some(v) = value.as_deref().filter(|v| !v.is_empty()) {
      self.0.append_pair(key, v);
    }
    self
  }

  fn put_flag(&mut self, key: &str, on: bool) -> &mut Self {
    if on {
      self.0.append_pair(key, "1");
    }
    self
  }

  fn finish(&mut self) -> String {
    self.0.finish()
  }
}

fn assemble(scheme: &str, credential: &str, node: &CanonicalNode, query: String) -> String {
  let mut out = format!(
    "{scheme}://{}@{}:{}",
    encode_component(credential),
    format_host(&node.server),
    node.port
  );
  if !query.is_empty() {
    out.push('?');
    out.push_str(&query);
  }
  if !node.name.is_empty() {
    out.push('#');
    out.push_str(&encode_component(&node.name));
  }
  out
}

pub(super) fn serialize_vless(node: &CanonicalNode, s: &VlessSettings) -> String {
  let query = Query::new()
    .put("encryption", "none")
    .put_opt("security", &s.security)
    .put_opt("sni", &s.sni)
    .put_opt("fp", &s.fingerprint)
    .put_opt("pbk", &s.public_key)
    .put_opt("sid", &s.short_id)
    .put_opt("flow", &s.flow)
    .put("type", &s.network)
    .put_opt("host", &s.host)
    .put_opt("path", &s.path)
    .put_opt("serviceName", &s.service_name)
    .finish();
  assemble("vless", &s.uuid, node, query)
}

pub(super) fn serialize_trojan(node: &CanonicalNode, s: &TrojanSettings) -> String {
  let query = Query::new()
    .put("security", &s.security)
    .put_opt("sni", &s.sni)
    .put_flag("allowInsecure", s.allow_insecure)
    .put("type", &s.network)
    .put_opt("host", &s.host)
    .put_opt("path", &s.path)
    .put_opt("serviceName", &s.service_name)
    .finish();
  assemble("trojan", &s.password, node, query)
}

pub(super) fn serialize_hysteria2(node: &CanonicalNode, s: &Hysteria2Settings) -> String {
  let query = Query::new()
    .put_opt("sni", &s.sni)
    .put_flag("insecure", s.insecure)
    .put_opt("obfs", &s.obfs)
    .put_opt("obfs-password", &s.obfs_password)
    .finish();
  assemble("hysteria2", &s.password, node, query)
}
