use std::net::Ipv4Addr;

use serde::Deserialize;

use crate::release::VersionString;

/// A BOSH-style deployment manifest, reduced to what a single-host install needs.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeploymentManifest {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub release: Option<ReleaseRef>,
  #[serde(default)]
  pub releases: Vec<ReleaseRef>,
  #[serde(default)]
  pub networks: Vec<Network>,
  #[serde(default)]
  pub jobs: Vec<ManifestJob>,
  #[serde(default)]
  pub properties: serde_yaml::Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReleaseRef {
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub version: Option<VersionString>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Network {
  pub name: String,
  #[serde(default)]
  pub subnets: Vec<Subnet>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Subnet {
  #[serde(default, rename = "static")]
  pub static_ips: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManifestJob {
  pub name: String,
  #[serde(default)]
  pub template: Option<OneOrMany>,
  #[serde(default)]
  pub templates: Vec<TemplateRef>,
  #[serde(default)]
  pub index: Option<u32>,
  #[serde(default)]
  pub instances: Option<u32>,
  #[serde(default)]
  pub networks: Vec<JobNetwork>,
  #[serde(default)]
  pub properties: serde_yaml::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
  One(String),
  Many(Vec<String>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TemplateRef {
  Name(String),
  Named { name: String },
}

impl TemplateRef {
  pub fn name(&self) -> &str {
    match self {
      TemplateRef::Name(name) | TemplateRef::Named { name } => name,
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobNetwork {
  pub name: String,
  #[serde(default)]
  pub static_ips: Vec<String>,
}

impl ManifestJob {
  /// Release jobs rendered for this manifest job, in declaration order.
  ///
  /// Defaults to a single release job with the manifest job's own name.
  pub fn template_names(&self) -> Vec<String> {
    let mut names: Vec<String> = match &self.template {
      Some(OneOrMany::One(name)) => vec![name.clone()],
      Some(OneOrMany::Many(names)) => names.clone(),
      None => Vec::new(),
    };
    names.extend(self.templates.iter().map(|t| t.name().to_string()));
    if names.is_empty() {
      names.push(self.name.clone());
    }
    names
  }

  /// The network the job is attached to first, if any.
  pub fn primary_network(&self) -> Option<&JobNetwork> {
    self.networks.first()
  }
}

impl DeploymentManifest {
  /// Release version pinned by the manifest; `latest` counts as unpinned.
  pub fn release_version(&self) -> Option<String> {
    self
      .release
      .iter()
      .chain(self.releases.iter())
      .filter_map(|r| r.version.as_ref())
      .map(VersionString::as_string)
      .find(|v| v != "latest")
  }

  pub fn network(&self, name: &str) -> Option<&Network> {
    self.networks.iter().find(|n| n.name == name)
  }

  /// Static address for instance `index` of `job`.
  ///
  /// Looks at the job's own `static_ips` first, then at the static pool of
  /// the network it is attached to. An index past the job's own addresses
  /// falls through to the pool.
  pub fn static_ip(&self, job: &ManifestJob, index: u32) -> Option<String> {
    let network = job.primary_network()?;
    let index = u64::from(index);

    let own_count = static_ip_count(&network.static_ips);
    if index < own_count {
      return nth_static_ip(&network.static_ips, index);
    }

    let pool: Vec<&String> = self
      .network(&network.name)?
      .subnets
      .iter()
      .flat_map(|s| s.static_ips.iter())
      .collect();
    nth_static_ip(pool, index)
  }
}

/// One `static` entry: a single address or an inclusive `a - b` range.
enum StaticEntry<'a> {
  Single(&'a str),
  Range(u32, u32),
}

impl<'a> StaticEntry<'a> {
  fn parse(entry: &'a str) -> Self {
    if let Some((start, end)) = entry.split_once('-')
      && let (Ok(start), Ok(end)) = (start.trim().parse::<Ipv4Addr>(), end.trim().parse::<Ipv4Addr>())
      && u32::from(start) <= u32::from(end)
    {
      return StaticEntry::Range(start.into(), end.into());
    }
    StaticEntry::Single(entry.trim())
  }

  fn len(&self) -> u64 {
    match self {
      StaticEntry::Single(_) => 1,
      StaticEntry::Range(start, end) => u64::from(end - start) + 1,
    }
  }
}

fn static_ip_count(entries: &[String]) -> u64 {
  entries.iter().map(|e| StaticEntry::parse(e).len()).sum()
}

/// The `index`th address of `entries`, counting each range by its size.
fn nth_static_ip<'a>(entries: impl IntoIterator<Item = &'a String>, mut index: u64) -> Option<String> {
  for entry in entries {
    let entry = StaticEntry::parse(entry);
    let len = entry.len();
    if index < len {
      return Some(match entry {
        StaticEntry::Single(ip) => ip.to_string(),
        StaticEntry::Range(start, _) => Ipv4Addr::from(start + index as u32).to_string(),
      });
    }
    index -= len;
  }
  None
}
