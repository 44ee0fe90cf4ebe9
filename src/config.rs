// This Source Code Form is subject to the terms of the Mozilla Public License,
// v. 2.0. If a copy of the MPL was not distributed with this file, You can
// obtain one at https://mozilla.org/MPL/2.0/.

//! Build environment the packer runs in.
//!
//! `TOP` (or `ANDROID_BUILD_TOP`) names the source tree and `OUT` the build
//! output directory. Payload names in an entry list are looked up relative to
//! the current directory first and `OUT` second.

use std::{
    env,
    path::{Path, PathBuf},
};

use log::debug;
use thiserror::Error;

pub const TOP_VAR: &str = "TOP";
pub const ANDROID_TOP_VAR: &str = "ANDROID_BUILD_TOP";
pub const OUT_VAR: &str = "OUT";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Environment variable TOP not set or invalid")]
    InvalidTop,
    #[error("Environment variable OUT not set or invalid")]
    InvalidOut,
    #[error("File {} does not exist", .0.display())]
    MissingFile(PathBuf),
}

fn existing_dir(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| p.is_dir())
}

/// Checks that `out` is set and is a directory.
pub fn out_dir(out: Option<PathBuf>) -> Result<PathBuf, ConfigError> {
    existing_dir(out).ok_or(ConfigError::InvalidOut)
}

/// Validated `TOP`/`OUT` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackEnv {
    pub top: PathBuf,
    pub out: PathBuf,
}

impl PackEnv {
    /// Validates `top` and `out`. An unusable `top` falls back to
    /// `$ANDROID_BUILD_TOP`.
    pub fn new(top: Option<PathBuf>, out: Option<PathBuf>) -> Result<Self, ConfigError> {
        let top = existing_dir(top)
            .or_else(|| existing_dir(env::var_os(ANDROID_TOP_VAR).map(PathBuf::from)))
            .ok_or(ConfigError::InvalidTop)?;
        let out = out_dir(out)?;

        debug!("TOP={}, OUT={}", top.display(), out.display());

        Ok(Self { top, out })
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::new(env::var_os(TOP_VAR).map(PathBuf::from), env::var_os(OUT_VAR).map(PathBuf::from))
    }

    pub fn resolver(&self) -> FileResolver {
        FileResolver::new(&self.out)
    }
}

/// Maps payload names from an entry list to files on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileResolver {
    search_dir: PathBuf,
}

impl FileResolver {
    pub fn new(search_dir: impl Into<PathBuf>) -> Self {
        Self { search_dir: search_dir.into() }
    }

    /// `name` itself if it is a file, otherwise `name` under the search
    /// directory.
    pub fn resolve(&self, name: &str) -> Result<PathBuf, ConfigError> {
        let direct = Path::new(name);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        let fallback = self.search_dir.join(name);
        if fallback.is_file() {
            Ok(fallback)
        } else {
            Err(ConfigError::MissingFile(fallback))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_falls_back_to_search_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("payload.bin"), b"x").unwrap();

        let resolver = FileResolver::new(dir.path());
        assert_eq!(resolver.resolve("payload.bin").unwrap(), dir.path().join("payload.bin"));

        let direct = dir.path().join("payload.bin");
        assert_eq!(resolver.resolve(direct.to_str().unwrap()).unwrap(), direct);

        assert_eq!(
            resolver.resolve("missing.bin").unwrap_err(),
            ConfigError::MissingFile(dir.path().join("missing.bin"))
        );
    }

    #[test]
    fn pack_env_requires_directories() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("file");
        std::fs::write(&file, b"").unwrap();

        let env = PackEnv::new(Some(dir.path().into()), Some(dir.path().into())).unwrap();
        assert_eq!(env.out, dir.path());
        assert_eq!(env.resolver(), FileResolver::new(dir.path()));

        assert_eq!(PackEnv::new(Some(dir.path().into()), Some(file.clone())), Err(ConfigError::InvalidOut));
        assert_eq!(PackEnv::new(Some(dir.path().into()), None), Err(ConfigError::InvalidOut));
        assert_eq!(out_dir(Some(file)), Err(ConfigError::InvalidOut));
    }
}
