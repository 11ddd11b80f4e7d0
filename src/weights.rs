//! Download-once caching of the wav2vec 2.0 and NOMAD checkpoints.
//!
//! A checkpoint is looked up by exact filename in the cache directory. When it
//! is missing it is fetched into a temporary sibling file, optionally checked
//! against a SHA-256, and renamed into place. A failed transfer removes the
//! temporary file, so a later run never sees a truncated checkpoint.

use std::{
    collections::HashSet,
    fs::File,
    io::{Read, Write},
    path::{Path, PathBuf},
};

use sha2::{Digest, Sha256};
use tracing::{debug, info};
use url::Url;

use crate::config::WeightSettings;
use crate::error::{NomadError, Result};
use crate::http_client;

pub const WAV2VEC_FILE_NAME: &str = "wav2vec_small.pt";
pub const WAV2VEC_URL: &str = "https://dl.fbaipublicfiles.com/fairseq/wav2vec/wav2vec_small.pt";
pub const NOMAD_FILE_NAME: &str = "nomad_best_model.pt";
pub const NOMAD_URL: &str = "https://www.dropbox.com/scl/fi/uws3wk327adbwqo22cr0p/nomad_best_model.pt?rlkey=cco21iba6xxi81a0dm9lpa7zj&dl=1";

/// Hosts the checkpoints may be fetched from without extra configuration.
pub const DEFAULT_ALLOWED_HOSTS: &[&str] = &[
    "dl.fbaipublicfiles.com",
    "www.dropbox.com",
    "dl.dropboxusercontent.com",
];

const MAX_CHECKPOINT_BYTES: u64 = 2 * 1024 * 1024 * 1024;

/// Local paths of both cached checkpoints.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeightPaths {
    pub wav2vec: PathBuf,
    pub nomad: PathBuf,
}

/// One remote checkpoint and the filename it is cached under.
#[derive(Clone, Debug)]
pub struct CheckpointSource {
    pub file_name: String,
    pub url: String,
    pub sha256: Option<String>,
}

impl CheckpointSource {
    pub fn wav2vec(settings: &WeightSettings) -> Self {
        Self {
            file_name: WAV2VEC_FILE_NAME.to_string(),
            url: settings.wav2vec_url.clone(),
            sha256: settings.wav2vec_sha256.clone(),
        }
    }

    pub fn nomad(settings: &WeightSettings) -> Self {
        Self {
            file_name: NOMAD_FILE_NAME.to_string(),
            url: settings.nomad_url.clone(),
            sha256: settings.nomad_sha256.clone(),
        }
    }
}

/// Network side of provisioning: stream the body at `url` into `dest`.
pub trait Fetcher {
    /// Returns the number of bytes written.
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64>;
}

/// Blocking HTTPS fetcher backed by the shared `ureq` agent.
#[derive(Clone, Copy, Debug, Default)]
pub struct HttpFetcher;

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &mut dyn Write) -> Result<u64> {
        let response = match http_client::agent().get(url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => {
                return Err(NomadError::download(url, format!("HTTP {code}")));
            }
            Err(err) => return Err(NomadError::download(url, err.to_string())),
        };
        http_client::stream_capped(response, dest, MAX_CHECKPOINT_BYTES)
            .map_err(|err| NomadError::download(url, err.to_string()))
    }
}

/// Fetches missing checkpoints into a cache directory.
pub struct Provisioner<F = HttpFetcher> {
    fetcher: F,
    allowed_hosts: HashSet<String>,
}

impl Provisioner<HttpFetcher> {
    pub fn new(extra_hosts: &[String]) -> Self {
        Self::with_fetcher(HttpFetcher, extra_hosts)
    }
}

impl<F: Fetcher> Provisioner<F> {
    pub fn with_fetcher(fetcher: F, extra_hosts: &[String]) -> Self {
        let mut allowed_hosts: HashSet<String> = DEFAULT_ALLOWED_HOSTS
            .iter()
            .map(|host| host.to_string())
            .collect();
        for host in extra_hosts {
            let host = host.trim();
            if !host.is_empty() {
                allowed_hosts.insert(host.to_ascii_lowercase());
            }
        }
        Self {
            fetcher,
            allowed_hosts,
        }
    }

    /// Return the cached path of `source`, downloading it first when absent.
    ///
    /// An existing file is trusted as is and causes no network traffic.
    pub fn ensure_cached(&self, source: &CheckpointSource, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir).map_err(|err| NomadError::io(dir, err))?;
        let dest = dir.join(&source.file_name);
        if dest.is_file() {
            debug!("Using cached checkpoint {}", dest.display());
            return Ok(dest);
        }

        validate_url(&source.url, &self.allowed_hosts)?;
        let expected = source
            .sha256
            .as_deref()
            .map(|value| normalize_sha256(value).map_err(|detail| NomadError::download(&source.url, detail)))
            .transpose()?;

        info!("Downloading {} to {}", source.url, dest.display());
        let mut tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", source.file_name))
            .suffix(".part")
            .tempfile_in(dir)
            .map_err(|err| NomadError::io(dir, err))?;
        let bytes = self.fetcher.fetch(&source.url, tmp.as_file_mut())?;
        tmp.as_file_mut()
            .flush()
            .map_err(|err| NomadError::io(tmp.path(), err))?;

        if let Some(expected) = expected {
            let actual = sha256_file(tmp.path())?;
            if actual != expected {
                return Err(NomadError::download(
                    &source.url,
                    format!("SHA-256 mismatch: expected {expected}, got {actual}"),
                ));
            }
        }
        tmp.persist(&dest)
            .map_err(|err| NomadError::io(&dest, err.error))?;
        info!("Saved {} ({bytes} bytes)", dest.display());
        Ok(dest)
    }

    /// Make sure both checkpoints named in `settings` are present in `dir`.
    pub fn ensure_weights(&self, settings: &WeightSettings, dir: &Path) -> Result<WeightPaths> {
        Ok(WeightPaths {
            wav2vec: self.ensure_cached(&CheckpointSource::wav2vec(settings), dir)?,
            nomad: self.ensure_cached(&CheckpointSource::nomad(settings), dir)?,
        })
    }
}

/// Provision both checkpoints over HTTPS.
pub fn ensure_weights(settings: &WeightSettings, dir: &Path) -> Result<WeightPaths> {
    Provisioner::new(&settings.extra_allowed_hosts).ensure_weights(settings, dir)
}

fn validate_url(url: &str, allowed_hosts: &HashSet<String>) -> Result<()> {
    let parsed = Url::parse(url).map_err(|err| NomadError::download(url, format!("invalid URL: {err}")))?;
    if parsed.scheme() != "https" {
        return Err(NomadError::download(url, "checkpoint URLs must use https"));
    }
    let host = parsed
        .host_str()
        .ok_or_else(|| NomadError::download(url, "URL is missing a host"))?;
    if !allowed_hosts.contains(&host.to_ascii_lowercase()) {
        return Err(NomadError::download(
            url,
            format!("host '{host}' is not allowlisted; add it to weights.extra_allowed_hosts"),
        ));
    }
    Ok(())
}

fn normalize_sha256(value: &str) -> std::result::Result<String, String> {
    let trimmed = value.trim();
    if trimmed.len() != 64 || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(format!(
            "Invalid SHA-256 value; expected 64 hex characters, got '{trimmed}'"
        ));
    }
    Ok(trimmed.to_ascii_lowercase())
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|err| NomadError::io(path, err))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|err| NomadError::io(path, err))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}
