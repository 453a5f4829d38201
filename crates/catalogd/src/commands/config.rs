//! Configuration inspection commands: `config dump` and `config schema`.

use anyhow::{Context, Result};
use catalogd_config::Config;

/// Prints the effective configuration — defaults layered under the
/// project's `catalogd.toml` / `catalogd.local.toml` and environment
/// overrides — in the requested format.
pub fn dump(project: &str, format: &str) -> Result<()> {
    let config = Config::load_from_dir(project).context("failed to load configuration")?;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&config)?),
        "toml" => print!("{}", toml::to_string_pretty(&config)?),
        "text" => print_text(&config),
        other => anyhow::bail!("unknown format {other:?}; expected text, toml, or json"),
    }

    Ok(())
}

fn print_text(config: &Config) {
    println!("catalogd configuration");
    println!("=======================\n");

    println!("catalog:");
    println!("  address:    {}", config.catalog.address);
    println!("  datacenter: {}", config.catalog.datacenter);
    println!(
        "  token:      {}",
        if config.catalog.token.is_some() { "<set>" } else { "<unset>" }
    );
    println!();

    println!("domains:");
    println!("  node:    {}", config.domains.node);
    println!("  service: {}", config.domains.service);
    println!();

    println!("hosts:");
    println!("  enabled: {}", config.hosts.enabled);
    println!("  file:    {}", config.hosts.file.display());
    println!();

    println!("gateway:");
    println!("  enabled:    {}", config.gateway.enabled);
    println!("  key_prefix: {}", config.gateway.key_prefix);
    println!("  http_file:  {}", config.gateway.http_file.display());
    println!("  exec:       {}", config.gateway.exec);
    println!();

    println!("dns:");
    println!("  enabled:  {}", config.dns.enabled);
    println!("  domains:  {:?}", config.dns.domains);
    println!("  dry_run:  {}", config.dns.dry_run);
}

struct Field {
    path: &'static str,
    kind: &'static str,
    default: &'static str,
    doc: &'static str,
}

const SCHEMA: &[Field] = &[
    Field {
        path: "catalog.address",
        kind: "string",
        default: "127.0.0.1:8500",
        doc: "host:port of the catalog's HTTP API.",
    },
    Field {
        path: "catalog.token",
        kind: "string, optional",
        default: "unset",
        doc: "Bearer token sent as X-Catalog-Token on every request.",
    },
    Field {
        path: "catalog.datacenter",
        kind: "string",
        default: "dc1",
        doc: "Datacenter selector passed to every long-poll request.",
    },
    Field {
        path: "domains.node",
        kind: "string",
        default: "node.internal",
        doc: "Suffix appended to a public node's name for its hosts alias.",
    },
    Field {
        path: "domains.service",
        kind: "string",
        default: "service.internal",
        doc: "Suffix used when a listener needs a fully-qualified service name.",
    },
    Field {
        path: "hosts.enabled",
        kind: "bool",
        default: "true",
        doc: "Whether the hosts-file listener is registered.",
    },
    Field {
        path: "hosts.file",
        kind: "path",
        default: "/etc/hosts",
        doc: "Target file the hosts listener renders into.",
    },
    Field {
        path: "gateway.enabled",
        kind: "bool",
        default: "false",
        doc: "Whether the gateway listener is registered.",
    },
    Field {
        path: "gateway.key_prefix",
        kind: "string",
        default: "gateway/http",
        doc: "KV prefix holding one route template per domain.",
    },
    Field {
        path: "gateway.http_file",
        kind: "path",
        default: "/etc/gateway/conf.d/catalogd.conf",
        doc: "Target file the gateway listener renders into.",
    },
    Field {
        path: "gateway.exec",
        kind: "string",
        default: "(empty)",
        doc: "Shell command run after the rendered file changes; skipped if empty.",
    },
    Field {
        path: "dns.enabled",
        kind: "bool",
        default: "false",
        doc: "Whether the DNS reconciler listener is registered.",
    },
    Field {
        path: "dns.registrar.api_key",
        kind: "string",
        default: "(empty)",
        doc: "Registrar API key.",
    },
    Field {
        path: "dns.registrar.secret_key",
        kind: "string",
        default: "(empty)",
        doc: "Registrar API secret.",
    },
    Field {
        path: "dns.domains",
        kind: "list of string",
        default: "[]",
        doc: "Domains the reconciler is authoritative for.",
    },
    Field {
        path: "dns.dry_run",
        kind: "bool",
        default: "false",
        doc: "Compute the create/delete diff but never call the registrar.",
    },
];

/// Prints a description of every configuration field, for operators
/// writing a `catalogd.toml`.
pub fn schema(format: &str) -> Result<()> {
    match format {
        "json" => {
            let fields: Vec<_> = SCHEMA
                .iter()
                .map(|f| {
                    serde_json::json!({
                        "path": f.path,
                        "type": f.kind,
                        "default": f.default,
                        "doc": f.doc,
                    })
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&fields)?);
        }
        "text" => {
            for field in SCHEMA {
                println!("{} ({}, default: {})", field.path, field.kind, field.default);
                println!("    {}", field.doc);
            }
        }
        other => anyhow::bail!("unknown format {other:?}; expected text or json"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dump_rejects_unknown_format() {
        let dir = tempfile::tempdir().unwrap();
        let err = dump(dir.path().to_str().unwrap(), "yaml").unwrap_err();
        assert!(err.to_string().contains("unknown format"));
    }

    #[test]
    fn schema_lists_every_listener_section() {
        let paths: Vec<&str> = SCHEMA.iter().map(|f| f.path).collect();
        assert!(paths.iter().any(|p| p.starts_with("hosts.")));
        assert!(paths.iter().any(|p| p.starts_with("gateway.")));
        assert!(paths.iter().any(|p| p.starts_with("dns.")));
    }
}
