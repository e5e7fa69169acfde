//! Catalog loading
//!
//! A catalog comes from a local CSV file or from a public Yandex Disk link.
//! Downloads are resolved through the public resources API, streamed into a
//! `.part` file and renamed into place once complete.

use futures::{Stream, StreamExt};
use prodcards_kernel::{Catalog, CatalogError, CatalogResult};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

pub const YANDEX_DOWNLOAD_API: &str =
    "https://cloud-api.yandex.net/v1/disk/public/resources/download";

/// Public share link of the default catalog
pub const DEFAULT_CATALOG_URL: &str = "https://disk.yandex.ru/d/3Y1rogh78wVtAw";

/// File name of the catalog inside the data directory
pub const CATALOG_FILE: &str = "products.csv";

/// Where a catalog comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Local(PathBuf),
    YandexDisk { public_url: String, dest: PathBuf },
}

impl CatalogSource {
    pub fn describe(&self) -> String {
        match self {
            Self::Local(path) => format!("local file {}", path.display()),
            Self::YandexDisk { public_url, .. } => format!("Yandex Disk {}", public_url),
        }
    }
}

#[derive(Debug, Deserialize)]
struct DownloadLink {
    href: String,
}

/// Loads catalogs and downloads them when needed
#[derive(Debug, Clone)]
pub struct CatalogLoader {
    client: reqwest::Client,
    api_url: String,
    delimiter: u8,
}

impl CatalogLoader {
    pub fn new() -> CatalogResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| CatalogError::Download(e.to_string()))?;
        Ok(Self {
            client,
            api_url: YANDEX_DOWNLOAD_API.to_string(),
            delimiter: b',',
        })
    }

    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a catalog from `source`, downloading first if needed
    pub async fn load(&self, source: &CatalogSource) -> CatalogResult<Catalog> {
        info!("Loading catalog from {}", source.describe());
        let path = match source {
            CatalogSource::Local(path) => path.clone(),
            CatalogSource::YandexDisk { public_url, dest } => {
                self.download_public_file(public_url, dest).await?;
                dest.clone()
            }
        };
        let catalog = read_csv(&path, self.delimiter)?;
        info!(
            "Catalog loaded: {} rows, {} columns",
            catalog.len(),
            catalog.column_count()
        );
        Ok(catalog)
    }

    /// Use `data_dir/products.csv` when present, otherwise download it
    pub async fn ensure_local(
        &self,
        data_dir: &Path,
        public_url: &str,
        force_download: bool,
    ) -> CatalogResult<Catalog> {
        let dest = data_dir.join(CATALOG_FILE);
        let source = if dest.exists() && !force_download {
            CatalogSource::Local(dest)
        } else {
            CatalogSource::YandexDisk {
                public_url: public_url.to_string(),
                dest,
            }
        };
        self.load(&source).await
    }

    /// Resolve a public link and stream the file to `dest`
    pub async fn download_public_file(&self, public_url: &str, dest: &Path) -> CatalogResult<()> {
        let link: DownloadLink = self
            .client
            .get(&self.api_url)
            .query(&[("public_key", public_url)])
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::Download(format!("resolve {}: {}", public_url, e)))?
            .json()
            .await
            .map_err(|e| CatalogError::Download(format!("bad download link response: {}", e)))?;
        debug!("Download link resolved for {}", public_url);

        let resp = self
            .client
            .get(&link.href)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| CatalogError::Download(e.to_string()))?;

        if let Some(parent) = dest.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let written = save_stream(resp.bytes_stream(), dest).await?;
        info!("Downloaded {} bytes to {}", written, dest.display());
        Ok(())
    }
}

/// Stream a body into `dest.part`, then rename it to `dest`.
///
/// On any failure the partial file is removed.
async fn save_stream<S, B, E>(stream: S, dest: &Path) -> CatalogResult<usize>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let part = dest.with_extension("part");
    let result = async {
        let written = write_part(stream, &part).await?;
        tokio::fs::rename(&part, dest).await?;
        Ok::<_, CatalogError>(written)
    }
    .await;

    if result.is_err()
        && let Err(e) = tokio::fs::remove_file(&part).await
        && e.kind() != std::io::ErrorKind::NotFound
    {
        warn!("Could not remove {}: {}", part.display(), e);
    }
    result
}

async fn write_part<S, B, E>(stream: S, part: &Path) -> CatalogResult<usize>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = tokio::fs::File::create(part).await?;
    let mut written = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| CatalogError::Download(e.to_string()))?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len();
    }
    file.flush().await?;
    Ok(written)
}

/// Parse CSV text with a header row
pub fn parse_csv(reader: impl std::io::Read, delimiter: u8) -> CatalogResult<Catalog> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .map_err(|e| CatalogError::Csv(e.to_string()))?
        .iter()
        .map(|h| h.trim().trim_start_matches('\u{feff}').to_string())
        .collect();
    if headers.is_empty() || headers.iter().all(String::is_empty) {
        return Err(CatalogError::NoColumns);
    }

    let mut rows = Vec::new();
    for record in rdr.records() {
        let record = record.map_err(|e| CatalogError::Csv(e.to_string()))?;
        rows.push(record.iter().map(str::to_string).collect::<Vec<_>>());
    }

    Catalog::from_string_rows(headers, rows)
}

/// Read a CSV file from disk
pub fn read_csv(path: &Path, delimiter: u8) -> CatalogResult<Catalog> {
    let file = std::fs::File::open(path)?;
    parse_csv(std::io::BufReader::new(file), delimiter)
}
