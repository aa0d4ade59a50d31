//! Service description loading and validation
//!
//! This module parses TOML service descriptions into `schema::ServiceSpec`
//! values, applies defaults (via serde defaults on schema types), and
//! performs strict validation with field-path error messages. The
//! [`DirLoader`] turns a directory of `<name>.toml` files into a
//! [`ServiceLoader`](crate::supervisor::ServiceLoader) for the service set.

use crate::error::LoadError;
use crate::supervisor::ServiceLoader;
use schema::{DependencySpec, ServiceFlags, ServiceSpec};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// On-disk shape of one service description
///
/// The service name is the file stem, not a field:
///
/// ```toml
/// # db.toml
/// autoRestart = true
///
/// [[depends]]
/// service = "net"
/// type = "regular"
/// ```
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ServiceFile {
    #[serde(default)]
    depends: Vec<DependencySpec>,
    #[serde(default)]
    auto_restart: bool,
    #[serde(default)]
    smooth_recovery: bool,
    #[serde(default)]
    flags: ServiceFlags,
    chain_to: Option<String>,
}

/// Parse one TOML service description for the named service
pub fn parse_service_toml(name: &str, text: &str) -> Result<ServiceSpec, LoadError> {
    let file: ServiceFile = toml::from_str(text).map_err(|e| LoadError::Parse {
        service: name.to_string(),
        detail: e.to_string(),
    })?;

    let spec = ServiceSpec {
        name: name.to_string(),
        depends: file.depends,
        auto_restart: file.auto_restart,
        smooth_recovery: file.smooth_recovery,
        flags: file.flags,
        chain_to: file.chain_to,
    };
    validate_spec(&spec)?;
    Ok(spec)
}

/// Validate a service description
pub fn validate_spec(spec: &ServiceSpec) -> Result<(), LoadError> {
    if spec.name.trim().is_empty() {
        return Err(LoadError::Validation {
            service: spec.name.clone(),
            detail: "name cannot be empty".to_string(),
        });
    }

    for (i, dep) in spec.depends.iter().enumerate() {
        if dep.service.trim().is_empty() {
            return Err(LoadError::Validation {
                service: spec.name.clone(),
                detail: format!("depends[{i}].service cannot be empty"),
            });
        }
        if dep.service == spec.name {
            return Err(LoadError::Validation {
                service: spec.name.clone(),
                detail: format!("depends[{i}]: service cannot depend on itself"),
            });
        }
        if spec.depends[..i].iter().any(|d| d.service == dep.service) {
            return Err(LoadError::Validation {
                service: spec.name.clone(),
                detail: format!("depends[{i}]: duplicate dependency on '{}'", dep.service),
            });
        }
    }

    if let Some(chain) = &spec.chain_to {
        if chain.trim().is_empty() {
            return Err(LoadError::Validation {
                service: spec.name.clone(),
                detail: "chainTo cannot be empty".to_string(),
            });
        }
    }

    Ok(())
}

/// Loader reading `<dir>/<name>.toml` service descriptions
#[derive(Debug, Clone)]
pub struct DirLoader {
    dir: PathBuf,
}

impl DirLoader {
    /// Create a loader rooted at the given directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory descriptions are read from
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl ServiceLoader for DirLoader {
    fn load(&mut self, name: &str) -> Result<ServiceSpec, LoadError> {
        // Service names are file stems; reject anything that could escape
        // the description directory.
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(LoadError::Validation {
                service: name.to_string(),
                detail: "invalid service name".to_string(),
            });
        }

        let path = self.dir.join(format!("{name}.toml"));
        debug!("Loading service description {:?}", path);

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(LoadError::NotFound(name.to_string()));
            }
            Err(e) => return Err(LoadError::Io(e)),
        };

        parse_service_toml(name, &text)
    }
}
