use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
  Vmess,
  Vless,
  Trojan,
  #[serde(rename = "ss")]
  Shadowsocks,
  #[serde(rename = "ssr")]
  ShadowsocksR,
  Hysteria2,
}

impl Protocol {
  /// URI scheme emitted on serialize.
  pub fn scheme(&self) -> &'static str {
    match self {
      Protocol::Vmess => "vmess",
      Protocol::Vless => "vless",
      Protocol::Trojan => "trojan",
      Protocol::Shadowsocks => "ss",
      Protocol::ShadowsocksR => "ssr",
      Protocol::Hysteria2 => "hysteria2",
    }
  }

  pub fn default_port(&self) -> u16 {
    match self {
      Protocol::Shadowsocks | Protocol::ShadowsocksR => 8388,
      _ => 443,
    }
  }

  /// Maps a URI scheme (case-insensitive) to a protocol. `hy2` is an alias of `hysteria2`.
  pub fn from_scheme(scheme: &str) -> Option<Protocol> {
    match scheme.trim().to_ascii_lowercase().as_str() {
      "vmess" => Some(Protocol::Vmess),
      "vless" => Some(Protocol::Vless),
      "trojan" => Some(Protocol::Trojan),
      "ss" => Some(Protocol::Shadowsocks),
      "ssr" => Some(Protocol::ShadowsocksR),
      "hysteria2" | "hy2" => Some(Protocol::Hysteria2),
      _ => None,
    }
  }
}

impl fmt::Display for Protocol {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.scheme())
  }
}

/// Accepts scheme names and the Clash `type` spellings.
impl FromStr for Protocol {
  type Err = CodecError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let lower = s.trim().to_ascii_lowercase();
    match lower.as_str() {
      "shadowsocks" => Ok(Protocol::Shadowsocks),
      "shadowsocksr" => Ok(Protocol::ShadowsocksR),
      other => Protocol::from_scheme(other).ok_or_else(|| CodecError::UnsupportedProtocol(s.trim().to_string())),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VmessSettings {
  pub uuid: String,
  #[serde(rename = "alterId", default)]
  pub alter_id: u32,
  pub cipher: String,
  pub network: String,
  #[serde(default)]
  pub tls: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sni: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
}

impl Default for VmessSettings {
  fn default() -> Self {
    Self {
      uuid: String::new(),
      alter_id: 0,
      cipher: "auto".to_string(),
      network: "tcp".to_string(),
      tls: false,
      sni: None,
      host: None,
      path: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlessSettings {
  pub uuid: String,
  pub network: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub security: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sni: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub flow: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub fingerprint: Option<String>,
  #[serde(rename = "publicKey", default, skip_serializing_if = "Option::is_none")]
  pub public_key: Option<String>,
  #[serde(rename = "shortId", default, skip_serializing_if = "Option::is_none")]
  pub short_id: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(rename = "serviceName", default, skip_serializing_if = "Option::is_none")]
  pub service_name: Option<String>,
}

impl Default for VlessSettings {
  fn default() -> Self {
    Self {
      uuid: String::new(),
      network: "tcp".to_string(),
      security: None,
      sni: None,
      flow: None,
      fingerprint: None,
      public_key: None,
      short_id: None,
      host: None,
      path: None,
      service_name: None,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrojanSettings {
  pub password: String,
  pub network: String,
  pub security: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sni: Option<String>,
  #[serde(rename = "allowInsecure", default)]
  pub allow_insecure: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub host: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub path: Option<String>,
  #[serde(rename = "serviceName", default, skip_serializing_if = "Option::is_none")]
  pub service_name: Option<String>,
}

impl Default for TrojanSettings {
  fn default() -> Self {
    Self {
      password: String::new(),
      network: "tcp".to_string(),
      security: "tls".to_string(),
      sni: None,
      allow_insecure: false,
      host: None,
      path: None,
      service_name: None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksSettings {
  pub cipher: String,
  pub password: String,
  /// SIP003 plugin spec, `name;opts`.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub plugin: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShadowsocksRSettings {
  pub protocol: String,
  pub cipher: String,
  pub obfs: String,
  pub password: String,
  #[serde(rename = "obfsParam", default, skip_serializing_if = "Option::is_none")]
  pub obfs_param: Option<String>,
  #[serde(rename = "protocolParam", default, skip_serializing_if = "Option::is_none")]
  pub protocol_param: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub group: Option<String>,
}

impl Default for ShadowsocksRSettings {
  fn default() -> Self {
    Self {
      protocol: "origin".to_string(),
      cipher: String::new(),
      obfs: "plain".to_string(),
      password: String::new(),
      obfs_param: None,
      protocol_param: None,
      group: None,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hysteria2Settings {
  pub password: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub sni: Option<String>,
  #[serde(default)]
  pub insecure: bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub obfs: Option<String>,
  #[serde(rename = "obfsPassword", default, skip_serializing_if = "Option::is_none")]
  pub obfs_password: Option<String>,
}

/// Per-protocol fields. The variant is the protocol discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeSettings {
  Vmess(VmessSettings),
  Vless(VlessSettings),
  Trojan(TrojanSettings),
  #[serde(rename = "ss")]
  Shadowsocks(ShadowsocksSettings),
  #[serde(rename = "ssr")]
  ShadowsocksR(ShadowsocksRSettings),
  Hysteria2(Hysteria2Settings),
}

impl NodeSettings {
  pub fn protocol(&self) -> Protocol {
    match self {
      NodeSettings::Vmess(_) => Protocol::Vmess,
      NodeSettings::Vless(_) => Protocol::Vless,
      NodeSettings::Trojan(_) => Protocol::Trojan,
      NodeSettings::Shadowsocks(_) => Protocol::Shadowsocks,
      NodeSettings::ShadowsocksR(_) => Protocol::ShadowsocksR,
      NodeSettings::Hysteria2(_) => Protocol::Hysteria2,
    }
  }

  /// The uuid or password identifying the user on the server.
  pub fn credential(&self) -> &str {
    match self {
      NodeSettings::Vmess(s) => &s.uuid,
      NodeSettings::Vless(s) => &s.uuid,
      NodeSettings::Trojan(s) => &s.password,
      NodeSettings::Shadowsocks(s) => &s.password,
      NodeSettings::ShadowsocksR(s) => &s.password,
      NodeSettings::Hysteria2(s) => &s.password,
    }
  }
}

/// Protocol-agnostic node record every scheme parses into and serializes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalNode {
  pub name: String,
  pub server: String,
  pub port: u16,
  #[serde(flatten)]
  pub settings: NodeSettings,
}

impl CanonicalNode {
  pub fn new(name: impl Into<String>, server: impl Into<String>, port: u16, settings: NodeSettings) -> Self {
    Self {
      name: name.into(),
      server: server.into(),
      port,
      settings,
    }
  }

  pub fn protocol(&self) -> Protocol {
    self.settings.protocol()
  }

  /// Identity used to drop the same server published under different names.
  pub fn identity_key(&self) -> String {
    format!(
      "{}|{}|{}|{}",
      self.protocol(),
      self.server.to_ascii_lowercase(),
      self.port,
      self.settings.credential()
    )
  }
}
