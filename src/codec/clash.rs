use super::{json_bool, json_port, json_str, json_str_any, json_str_at, json_u32, opt, serialize};
use crate::error::CodecError;
use crate::node::{
  CanonicalNode, Hysteria2Settings, NodeSettings, Protocol, ShadowsocksRSettings, ShadowsocksSettings,
  TrojanSettings, VlessSettings, VmessSettings,
};
use serde_json::Value as JsonValue;
use serde_yaml::Value as YamlValue;

/// Builds a node from a Clash-style proxy map (`type`, `name`, `server`, `port`, ...).
///
/// Unknown `type` is rejected. Every other missing field gets a placeholder or the
/// protocol default so a sparse map still converts.
pub fn node_from_map(map: &JsonValue) -> Result<CanonicalNode, CodecError> {
  if !map.is_object() {
    return Err(CodecError::malformed("proxy", "proxy entry is not a map"));
  }
  let protocol: Protocol = json_str(map, "type").parse()?;
  let name = json_str(map, "name");
  let server = json_str(map, "server");
  let port = match json_port(map, "port") {
    Some(Ok(p)) => p,
    Some(Err(())) => {
      return Err(CodecError::malformed("proxy", format!("invalid port: {}", json_str(map, "port"))))
    }
    None => protocol.default_port(),
  };

  let insecure = json_bool(map, "skip-cert-verify")
    .or_else(|| json_bool(map, "skipCertVerify"))
    .or_else(|| json_bool(map, "allowInsecure"))
    .unwrap_or(false);
  let tls = json_bool(map, "tls").unwrap_or(false);
  let sni = opt(&json_str_any(map, &["servername", "sni"]));
  let network = {
    let n = json_str(map, "network");
    if n.is_empty() {
      "tcp".to_string()
    } else {
      n
    }
  };
  let ws_host = opt(&json_str_at(map, &["ws-opts", "headers", "Host"]));
  let ws_path = opt(&json_str_at(map, &["ws-opts", "path"]));
  let grpc_service = opt(&json_str_at(map, &["grpc-opts", "grpc-service-name"]));

  let settings = match protocol {
    Protocol::Vmess => NodeSettings::Vmess(VmessSettings {
      uuid: json_str(map, "uuid"),
      alter_id: json_u32(map, "alterId").unwrap_or(0),
      cipher: {
        let c = json_str(map, "cipher");
        if c.is_empty() {
          "auto".to_string()
        } else {
          c
        }
      },
      network,
      tls,
      sni,
      host: ws_host,
      path: ws_path,
    }),
    Protocol::Vless => {
      let public_key = opt(&json_str_at(map, &["reality-opts", "public-key"]));
      let security = opt(&json_str(map, "security")).or_else(|| {
        if public_key.is_some() {
          Some("reality".to_string())
        } else if tls {
          Some("tls".to_string())
        } else {
          None
        }
      });
      NodeSettings::Vless(VlessSettings {
        uuid: json_str(map, "uuid"),
        network,
        security,
        sni,
        flow: opt(&json_str(map, "flow")),
        fingerprint: opt(&json_str(map, "client-fingerprint")),
        public_key,
        short_id: opt(&json_str_at(map, &["reality-opts", "short-id"])),
        host: ws_host,
        path: ws_path,
        service_name: grpc_service,
      })
    }
    Protocol::Trojan => NodeSettings::Trojan(TrojanSettings {
      password: json_str(map, "password"),
      network,
      security: "tls".to_string(),
      sni: opt(&json_str_any(map, &["sni", "servername"])),
      allow_insecure: insecure,
      host: ws_host,
      path: ws_path,
      service_name: grpc_service,
    }),
    Protocol::Shadowsocks => NodeSettings::Shadowsocks(ShadowsocksSettings {
      cipher: json_str_any(map, &["cipher", "method"]),
      password: json_str(map, "password"),
      plugin: plugin_spec(map),
    }),
    Protocol::ShadowsocksR => NodeSettings::ShadowsocksR(ShadowsocksRSettings {
      protocol: opt(&json_str(map, "protocol")).unwrap_or_else(|| "origin".to_string()),
      cipher: json_str_any(map, &["cipher", "method"]),
      obfs: opt(&json_str(map, "obfs")).unwrap_or_else(|| "plain".to_string()),
      password: json_str(map, "password"),
      obfs_param: opt(&json_str_any(map, &["obfs-param", "obfsparam"])),
      protocol_param: opt(&json_str_any(map, &["protocol-param", "protoparam"])),
      group: opt(&json_str(map, "group")),
    }),
    Protocol::Hysteria2 => NodeSettings::Hysteria2(Hysteria2Settings {
      password: json_str_any(map, &["password", "auth", "auth-str"]),
      sni: opt(&json_str_any(map, &["sni", "servername"])),
      insecure,
      obfs: opt(&json_str(map, "obfs")),
      obfs_password: opt(&json_str(map, "obfs-password")),
    }),
  };

  Ok(CanonicalNode::new(name, server, port, settings))
}

/// Clash splits SIP003 into `plugin` + `plugin-opts` map; the URI form is `name;k=v;k=v`.
fn plugin_spec(map: &JsonValue) -> Option<String> {
  let name = opt(&json_str(map, "plugin"))?;
  let mut joined = name;
  if let Some(opts) = map.get("plugin-opts").and_then(|v| v.as_object()) {
    for key in opts.keys() {
      let v = json_str(&map["plugin-opts"], key);
      if !v.is_empty() {
        joined.push_str(&format!(";{key}={v}"));
      }
    }
  }
  Some(joined)
}

/// Converts one loose proxy map straight to its wire URI.
pub fn convert(map: &JsonValue) -> Result<String, CodecError> {
  node_from_map(map).map(|node| serialize(&node))
}

/// Reads the `proxies:` list of a Clash YAML document. One result per entry.
pub fn parse_clash_yaml(text: &str) -> Vec<Result<CanonicalNode, CodecError>> {
  let doc: YamlValue = match serde_yaml::from_str(text) {
    Ok(v) => v,
    Err(_) => return vec![],
  };
  let Some(proxies) = doc.get("proxies").and_then(|v| v.as_sequence()) else {
    return vec![];
  };
  proxies
    .iter()
    .map(|p| {
      let json = serde_json::to_value(p).map_err(|e| CodecError::malformed("proxy", e.to_string()))?;
      node_from_map(&json)
    })
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::codec;
  use serde_json::json;

  #[test]
  fn convert_unknown_type_is_unsupported() {
    let proxy = json!({"type": "invalid", "name": "无效节点", "server": "example.com", "port": 443});
    assert_eq!(
      convert(&proxy),
      Err(CodecError::UnsupportedProtocol("invalid".to_string()))
    );
    assert!(matches!(
      convert(&json!({"name": "no type"})),
      Err(CodecError::UnsupportedProtocol(_))
    ));
  }

  #[test]
  fn convert_sparse_vmess_still_produces_uri() {
    let uri = convert(&json!({"type": "vmess", "name": "测试节点"})).unwrap();
    assert!(uri.starts_with("vmess://"));
  }

  #[test]
  fn convert_each_supported_type() {
    let cases = [
      (json!({"type": "vmess", "name": "a", "server": "example.com", "port": 443,
              "uuid": "12345678-1234-1234-1234-123456789abc", "alterId": 0, "cipher": "auto",
              "network": "tcp", "tls": true}), "vmess://"),
      (json!({"type": "vless", "name": "b", "server": "example.com", "port": 443,
              "uuid": "u", "network": "ws", "tls": true}), "vless://"),
      (json!({"type": "trojan", "name": "c", "server": "example.com", "port": 443,
              "password": "test_password", "sni": "example.com"}), "trojan://"),
      (json!({"type": "ss", "name": "d", "server": "example.com", "port": 8388,
              "cipher": "aes-256-gcm", "password": "test_password"}), "ss://"),
      (json!({"type": "ssr", "name": "e", "server": "example.com", "port": 8388,
              "protocol": "origin", "cipher": "aes-256-cfb", "password": "p", "obfs": "plain"}), "ssr://"),
      (json!({"type": "hysteria2", "name": "f", "server": "example.com", "port": 443,
              "password": "test_password", "sni": "example.com"}), "hysteria2://"),
    ];
    for (proxy, prefix) in cases {
      let uri = convert(&proxy).unwrap();
      assert!(uri.starts_with(prefix), "{uri}");
      let node = codec::parse(&uri).unwrap();
      assert_eq!(node.server, "example.com");
      assert_eq!(node.name, proxy["name"].as_str().unwrap());
    }
  }

  #[test]
  fn vless_reality_and_tls_flags() {
    let node = node_from_map(&json!({
      "type": "vless", "server": "r.example", "port": "443", "uuid": "u",
      "reality-opts": {"public-key": "PK", "short-id": "01"}
    }))
    .unwrap();
    let NodeSettings::Vless(s) = node.settings else {
      panic!("expected vless");
    };
    assert_eq!(s.security.as_deref(), Some("reality"));
    assert_eq!(s.public_key.as_deref(), Some("PK"));
  }

  #[test]
  fn yaml_proxies_keep_per_entry_errors() {
    let text = r#"
proxies:
  - {name: hk, type: ss, server: hk.example, port: 8388, cipher: aes-128-gcm, password: pw, plugin: obfs, plugin-opts: {mode: http, host: bing.com}}
  - {name: odd, type: wireguard, server: wg.example, port: 51820}
  - name: ws
    type: vmess
    server: v.example
    port: 443
    uuid: id
    network: ws
    ws-opts:
      path: /ray
      headers:
        Host: cdn.example
"#;
    let results = parse_clash_yaml(text);
    assert_eq!(results.len(), 3);
    let ss = results[0].as_ref().unwrap();
    let NodeSettings::Shadowsocks(s) = &ss.settings else {
      panic!("expected ss");
    };
    assert_eq!(s.plugin.as_deref(), Some("obfs;host=bing.com;mode=http"));
    assert!(matches!(results[1], Err(CodecError::UnsupportedProtocol(_))));
    let NodeSettings::Vmess(v) = &results[2].as_ref().unwrap().settings else {
      panic!("expected vmess");
    };
    assert_eq!(v.host.as_deref(), Some("cdn.example"));
    assert_eq!(v.path.as_deref(), Some("/ray"));
  }

  #[test]
  fn not_yaml_yields_nothing() {
    assert!(parse_clash_yaml("::: not yaml [").is_empty());
    assert!(parse_clash_yaml("key: value").is_empty());
  }
}
