//! # pdfium-auto
//!
//! Locate, download and cache the [PDFium](https://pdfium.googlesource.com/pdfium/)
//! shared library that `drawing-ocr` rasterises pages with.
//!
//! Resolution order for [`ensure_pdfium_library`]:
//!
//! 1. `PDFIUM_LIB_PATH`, if it names an existing file.
//! 2. The per-version cache directory (see [`pdfium_cache_dir`]).
//! 3. A download of the platform archive from
//!    [bblanchon/pdfium-binaries](https://github.com/bblanchon/pdfium-binaries),
//!    unpacked into the cache directory.
//!
//! ```rust,no_run
//! let path = pdfium_auto::ensure_pdfium_library(None)?;
//! let pdfium = pdfium_auto::bind_pdfium_from_path(&path)?;
//! # Ok::<(), pdfium_auto::PdfiumAutoError>(())
//! ```
//!
//! ## Environment variables
//!
//! - `PDFIUM_LIB_PATH`: existing pdfium library; skips the download.
//! - `PDFIUM_AUTO_CACHE_DIR`: root directory for the cache.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use pdfium_render::prelude::Pdfium;
use thiserror::Error;

/// pdfium-binaries release tag (`chromium/7690`).
pub const PDFIUM_VERSION: &str = "7690";

const RELEASE_URL: &str = "https://github.com/bblanchon/pdfium-binaries/releases/download";

/// Directory name under the user cache root.
const CACHE_NAMESPACE: &str = "drawing-ocr";

const LIB_PATH_ENV: &str = "PDFIUM_LIB_PATH";
const CACHE_DIR_ENV: &str = "PDFIUM_AUTO_CACHE_DIR";

#[derive(Error, Debug)]
pub enum PdfiumAutoError {
    #[error("No PDFium build for {os}/{arch}")]
    UnsupportedPlatform { os: String, arch: String },

    #[error("Cache directory {path}: {source}")]
    Cache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Download(String),

    #[error("Archive extraction failed: {0}")]
    Extract(String),

    #[error("Failed to bind PDFium from '{path}': {reason}")]
    Bind { path: PathBuf, reason: String },
}

/// Release asset and library file for one OS/arch pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Asset {
    archive: &'static str,
    member: &'static str,
}

impl Asset {
    /// File name the library is cached under.
    fn lib_name(&self) -> &'static str {
        self.member.rsplit('/').next().unwrap_or(self.member)
    }
}

const MAC_LIB: &str = "lib/libpdfium.dylib";
const LINUX_LIB: &str = "lib/libpdfium.so";
const WINDOWS_LIB: &str = "bin/pdfium.dll";

fn asset_for(os: &str, arch: &str) -> Result<Asset, PdfiumAutoError> {
    let (archive, member) = match (os, arch) {
        ("macos", "aarch64") => ("pdfium-mac-arm64.tgz", MAC_LIB),
        ("macos", "x86_64") => ("pdfium-mac-x64.tgz", MAC_LIB),
        ("linux", "x86_64") => ("pdfium-linux-x64.tgz", LINUX_LIB),
        ("linux", "aarch64") => ("pdfium-linux-arm64.tgz", LINUX_LIB),
        ("windows", "x86_64") => ("pdfium-win-x64.tgz", WINDOWS_LIB),
        ("windows", "aarch64") => ("pdfium-win-arm64.tgz", WINDOWS_LIB),
        ("windows", "x86") => ("pdfium-win-x86.tgz", WINDOWS_LIB),
        _ => {
            return Err(PdfiumAutoError::UnsupportedPlatform {
                os: os.to_string(),
                arch: arch.to_string(),
            })
        }
    };
    Ok(Asset { archive, member })
}

fn current_asset() -> Result<Asset, PdfiumAutoError> {
    asset_for(std::env::consts::OS, std::env::consts::ARCH)
}

/// Per-version cache directory for the library.
///
/// Defaults to `<user cache dir>/drawing-ocr/pdfium-{VERSION}`, e.g.
/// `~/.cache/drawing-ocr/pdfium-7690` on Linux. `PDFIUM_AUTO_CACHE_DIR`
/// replaces the `<user cache dir>/drawing-ocr` part.
pub fn pdfium_cache_dir() -> PathBuf {
    cache_dir_from(std::env::var_os(CACHE_DIR_ENV).map(PathBuf::from))
}

fn cache_dir_from(override_root: Option<PathBuf>) -> PathBuf {
    let root = override_root.unwrap_or_else(|| {
        dirs::cache_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".cache")))
            .unwrap_or_else(std::env::temp_dir)
            .join(CACHE_NAMESPACE)
    });
    root.join(format!("pdfium-{PDFIUM_VERSION}"))
}

fn env_library() -> Option<PathBuf> {
    std::env::var_os(LIB_PATH_ENV)
        .map(PathBuf::from)
        .filter(|p| p.is_file())
}

/// `true` when [`ensure_pdfium_library`] will not touch the network.
pub fn is_pdfium_cached() -> bool {
    env_library().is_some()
        || current_asset()
            .map(|asset| pdfium_cache_dir().join(asset.lib_name()).is_file())
            .unwrap_or(false)
}

static RESOLVED: OnceLock<PathBuf> = OnceLock::new();

/// Return a path to a usable pdfium library, downloading it if needed.
///
/// `on_progress` receives `(bytes_downloaded, content_length)` while the
/// archive streams in. The resolved path is memoised for the process.
pub fn ensure_pdfium_library(
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = RESOLVED.get() {
        return Ok(path.clone());
    }
    let path = resolve(on_progress)?;
    Ok(RESOLVED.get_or_init(|| path).clone())
}

/// Load the pdfium library at `path`.
pub fn bind_pdfium_from_path(path: &Path) -> Result<Pdfium, PdfiumAutoError> {
    Pdfium::bind_to_library(path)
        .map(Pdfium::new)
        .map_err(|e| PdfiumAutoError::Bind {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

fn resolve(on_progress: Option<&dyn Fn(u64, Option<u64>)>) -> Result<PathBuf, PdfiumAutoError> {
    if let Some(path) = env_library() {
        return Ok(path);
    }
    if let Some(missing) = std::env::var_os(LIB_PATH_ENV) {
        eprintln!(
            "pdfium-auto: {LIB_PATH_ENV} '{}' does not exist; using the cache",
            Path::new(&missing).display()
        );
    }

    let asset = current_asset()?;
    let dir = pdfium_cache_dir();
    let lib_path = dir.join(asset.lib_name());
    if lib_path.is_file() {
        return Ok(lib_path);
    }

    std::fs::create_dir_all(&dir).map_err(|source| PdfiumAutoError::Cache {
        path: dir.clone(),
        source,
    })?;

    let url = format!("{RELEASE_URL}/chromium%2F{PDFIUM_VERSION}/{}", asset.archive);
    let archive = download(&url, on_progress)?;
    unpack_member(&archive, asset.member, &lib_path)?;
    Ok(lib_path)
}

fn download(
    url: &str,
    on_progress: Option<&dyn Fn(u64, Option<u64>)>,
) -> Result<Vec<u8>, PdfiumAutoError> {
    let client = reqwest::blocking::Client::builder()
        .user_agent(concat!("pdfium-auto/", env!("CARGO_PKG_VERSION")))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| PdfiumAutoError::Download(e.to_string()))?;

    let mut response = client
        .get(url)
        .send()
        .map_err(|e| PdfiumAutoError::Download(format!("GET {url}: {e}")))?;
    let status = response.status();
    if !status.is_success() {
        return Err(PdfiumAutoError::Download(format!("HTTP {status} for {url}")));
    }

    let total = response.content_length();
    let mut body = Vec::with_capacity(total.unwrap_or(32 << 20) as usize);
    let mut chunk = [0u8; 64 * 1024];
    loop {
        let n = match response.read(&mut chunk) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(PdfiumAutoError::Download(format!("{url}: {e}"))),
        };
        body.extend_from_slice(&chunk[..n]);
        if let Some(cb) = on_progress {
            cb(body.len() as u64, total);
        }
    }
    Ok(body)
}

/// Copy `member` out of a `.tgz` into `dest`.
///
/// The bytes land in a sibling temp file first, so an interrupted run never
/// leaves a truncated library where [`is_pdfium_cached`] would find it.
fn unpack_member(archive: &[u8], member: &str, dest: &Path) -> Result<(), PdfiumAutoError> {
    let extract_err = |e: std::io::Error| PdfiumAutoError::Extract(e.to_string());

    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(archive));
    for entry in tar.entries().map_err(extract_err)? {
        let mut entry = entry.map_err(extract_err)?;
        let matches = entry
            .path()
            .map(|p| p.to_string_lossy().trim_start_matches("./") == member)
            .map_err(extract_err)?;
        if !matches {
            continue;
        }

        let partial = dest.with_extension("partial");
        let mut out = std::fs::File::create(&partial).map_err(extract_err)?;
        std::io::copy(&mut entry, &mut out).map_err(extract_err)?;
        out.flush().map_err(extract_err)?;
        drop(out);
        std::fs::rename(&partial, dest).map_err(extract_err)?;
        return Ok(());
    }

    Err(PdfiumAutoError::Extract(format!(
        "'{member}' not found in archive"
    )))
}
