//! The values a job's templates are rendered against.

use std::net::IpAddr;

use serde_json::{Map, Value, json};
use tracing::debug;

use super::TemplateError;
use super::parser::Resolver;
use crate::manifest::{DeploymentManifest, ManifestJob};
use crate::release::{JobSpec, Release};

/// Caller-supplied values that take precedence over the manifest.
#[derive(Debug, Clone, Default)]
pub struct BindingOverrides {
  pub index: Option<u32>,
  pub ip: Option<String>,
}

/// Binding context of one job template render.
#[derive(Debug, Clone)]
pub struct BindingContext {
  pub job_name: String,
  pub index: u32,
  pub ip: String,
  pub network: Option<String>,
  pub properties: Value,
  tree: Value,
}

impl BindingContext {
  /// Build the context for rendering `spec` as part of manifest job `job`.
  ///
  /// `index` comes from the override, then the manifest, then 0. `ip` comes
  /// from the override, then the manifest's static assignment, then
  /// `host_ip`. Properties merge the spec defaults under the manifest's
  /// global properties under the job's own properties.
  pub fn build(
    manifest: &DeploymentManifest,
    job: &ManifestJob,
    release: &Release,
    spec: &JobSpec,
    overrides: &BindingOverrides,
    host_ip: impl FnOnce() -> IpAddr,
  ) -> Result<Self, TemplateError> {
    let index = overrides.index.or(job.index).unwrap_or(0);
    let ip = match &overrides.ip {
      Some(ip) => ip.clone(),
      None => manifest
        .static_ip(job, index)
        .unwrap_or_else(|| host_ip().to_string()),
    };
    let network = job.primary_network().map(|n| n.name.clone());

    let mut properties = spec_defaults(spec)?;
    deep_merge(&mut properties, yaml_to_json(&manifest.properties)?);
    deep_merge(&mut properties, yaml_to_json(&job.properties)?);

    let mut networks = Map::new();
    for net in &job.networks {
      networks.insert(net.name.clone(), json!({ "ip": ip }));
    }

    let deployment = manifest.name.clone().unwrap_or_default();
    let release_value = json!({ "name": release.name, "version": release.version });

    let tree = json!({
      "name": job.name,
      "index": index,
      "ip": ip,
      "network": network,
      "properties": properties,
      "release": release_value,
      "spec": {
        "name": job.name,
        "index": index,
        "ip": ip,
        "deployment": deployment,
        "job": { "name": job.name, "template": spec.name },
        "networks": networks,
        "properties": properties,
        "release": release_value,
      },
    });

    debug!(job = %job.name, template = %spec.name, index, ip = %ip, "built binding context");

    Ok(Self {
      job_name: job.name.clone(),
      index,
      ip,
      network,
      properties,
      tree,
    })
  }

  /// The whole binding tree.
  pub fn tree(&self) -> &Value {
    &self.tree
  }
}

impl Resolver for BindingContext {
  fn lookup(&self, path: &[String]) -> Option<&Value> {
    path.iter().try_fold(&self.tree, |value, seg| value.get(seg))
  }

  fn property(&self, key: &str) -> Option<&Value> {
    lookup_dotted(&self.properties, key)
  }
}

/// Look up `a.b.c`, also accepting flat keys that contain dots.
fn lookup_dotted<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
  if let Some(found) = value.get(key) {
    return Some(found);
  }
  let (head, tail) = key.split_once('.')?;
  lookup_dotted(value.get(head)?, tail)
}

/// Nest the spec's dotted property defaults into a tree.
fn spec_defaults(spec: &JobSpec) -> Result<Value, TemplateError> {
  let mut root = Value::Object(Map::new());
  for (key, definition) in &spec.properties {
    let Some(default) = &definition.default else {
      continue;
    };
    let default = serde_json::to_value(default)
      .map_err(|e| TemplateError::Properties(format!("default of {key} in job {}: {e}", spec.name)))?;

    let nested = key.rsplit('.').fold(default, |inner, segment| {
      let mut map = Map::new();
      map.insert(segment.to_string(), inner);
      Value::Object(map)
    });
    deep_merge(&mut root, nested);
  }
  Ok(root)
}

/// Merge `overlay` into `base`; objects merge per key, everything else replaces.
pub fn deep_merge(base: &mut Value, overlay: Value) {
  match (base, overlay) {
    (Value::Object(base), Value::Object(overlay)) => {
      for (key, value) in overlay {
        match base.get_mut(&key) {
          Some(existing) => deep_merge(existing, value),
          None if value.is_null() => {}
          None => {
            base.insert(key, value);
          }
        }
      }
    }
    (_, Value::Null) => {}
    (base, overlay) => *base = overlay,
  }
}

fn yaml_to_json(value: &serde_yaml::Value) -> Result<Value, TemplateError> {
  serde_json::to_value(value).map_err(|e| TemplateError::Properties(e.to_string()))
}
