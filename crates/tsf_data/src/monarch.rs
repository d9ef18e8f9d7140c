//! Monash Time Series Forecasting Repository support.
//!
//! [`Monarch`] keeps a cached table of the datasets published on
//! <https://forecastingdata.org/> and downloads them from Zenodo.
//!
//! # Example
//!
//! ```rust,ignore
//! use tsf_data::Monarch;
//!
//! let monarch = Monarch::new("monarch.json", tsf_data::monarch::BASE_URL, false)?;
//! let data = monarch.generate_dataset("data/monash", "4656222")?;
//! println!("{} series at {:?}", data.series.len(), data.frequency);
//! ```

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};
use crate::freq::Frequency;
use crate::tsf_file::{convert_tsf_to_dataframe, TsfData};

/// Web page listing the repository datasets.
pub const BASE_URL: &str = "https://forecastingdata.org/";

/// Zenodo record API.
pub const ZENODO_API: &str = "https://zenodo.org/api/records";

/// Value column name used for Monash series.
pub const VALUE_COLUMN: &str = "series_value";

/// Datasets of the Monash archive, available offline.
pub const FORECASTING_DATASETS: &[(&str, &str)] = &[
    ("m1_yearly", "4656193"),
    ("m1_quarterly", "4656154"),
    ("m1_monthly", "4656159"),
    ("m3_yearly", "4656222"),
    ("m3_quarterly", "4656262"),
    ("m3_monthly", "4656298"),
    ("m3_other", "4656335"),
    ("m4_yearly", "4656379"),
    ("m4_quarterly", "4656410"),
    ("m4_monthly", "4656480"),
    ("m4_weekly", "4656522"),
    ("m4_daily", "4656548"),
    ("m4_hourly", "4656589"),
    ("tourism_yearly", "4656103"),
    ("tourism_quarterly", "4656093"),
    ("tourism_monthly", "4656096"),
    ("nn5_daily", "4656110"),
    ("nn5_weekly", "4656125"),
    ("cif_2016", "4656042"),
    ("electricity_hourly", "4656140"),
    ("electricity_weekly", "4656141"),
    ("solar_10_minutes", "4656144"),
    ("solar_weekly", "4656151"),
    ("australian_electricity_demand", "4659727"),
    ("traffic_hourly", "4656132"),
    ("traffic_weekly", "4656135"),
    ("pedestrian_counts", "4656626"),
    ("weather", "4654822"),
    ("covid_deaths", "4656009"),
    ("sunspot", "4654773"),
    ("saugeenday", "4656058"),
    ("us_births", "4656049"),
    ("fred_md", "4654833"),
    ("bitcoin", "5121965"),
    ("hospital", "4656014"),
    ("car_parts", "4656022"),
];

/// Offline list of the archive datasets as `(name, zenodo_id)`.
pub fn list_forecasting_datasets() -> impl Iterator<Item = (&'static str, &'static str)> {
    FORECASTING_DATASETS.iter().copied()
}

/// One downloadable dataset of the repository table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonarchEntry {
    /// Dataset name.
    pub name: String,
    /// Application domain.
    pub domain: String,
    /// Monash frequency name, empty when not found.
    pub frequency: String,
    /// Number of series, when stated.
    pub n_series: Option<usize>,
    /// Zenodo record id.
    pub zenodo_id: String,
    /// Text of the download link, distinguishing dataset variants.
    pub variant: String,
}

/// Cached table of the Monash repository.
#[derive(Debug, Clone)]
pub struct Monarch {
    filename: PathBuf,
    table: Vec<MonarchEntry>,
}

impl Monarch {
    /// Load the table from `filename`, downloading it from `base_url` when the
    /// file is missing or `rebuild` is set.
    pub fn new(filename: impl AsRef<Path>, base_url: &str, rebuild: bool) -> Result<Self> {
        let filename = filename.as_ref().to_path_buf();
        if filename.exists() && !rebuild {
            let table = Self::load(&filename)?;
            return Ok(Self { filename, table });
        }
        let monarch = Self {
            table: Self::get_table(base_url)?,
            filename,
        };
        monarch.save()?;
        Ok(monarch)
    }

    /// Wrap an already known table.
    #[must_use]
    pub fn from_table(filename: impl AsRef<Path>, table: Vec<MonarchEntry>) -> Self {
        Self {
            filename: filename.as_ref().to_path_buf(),
            table,
        }
    }

    /// The dataset table.
    #[must_use]
    pub fn table(&self) -> &[MonarchEntry] {
        &self.table
    }

    /// Find an entry by Zenodo id.
    #[must_use]
    pub fn find(&self, zenodo_id: &str) -> Option<&MonarchEntry> {
        self.table.iter().find(|e| e.zenodo_id == zenodo_id)
    }

    /// Download the repository page and extract the dataset table.
    pub fn get_table(base_url: &str) -> Result<Vec<MonarchEntry>> {
        tracing::info!(url = base_url, "downloading dataset table");
        let html = ureq::get(base_url)
            .call()
            .map_err(|e| DataError::Download(format!("Failed to download {base_url}: {e}")))?
            .into_string()?;
        let table = parse_table(&html)?;
        if table.is_empty() {
            return Err(DataError::Parse(format!("no dataset found at {base_url}")));
        }
        Ok(table)
    }

    /// Write the table as JSON.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.filename.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(&self.filename)?;
        serde_json::to_writer_pretty(file, &self.table)?;
        Ok(())
    }

    /// Read a table written by [`Monarch::save`].
    pub fn load(filename: impl AsRef<Path>) -> Result<Vec<MonarchEntry>> {
        let file = File::open(filename.as_ref())?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Download and extract the Zenodo record `id` into `path/id`.
    ///
    /// Skipped when a `.tsf` file is already there, unless `rebuild`.
    /// Returns the path of the `.tsf` file.
    ///
    /// # Errors
    ///
    /// [`DataError::InvalidInput`] when `id` is not a numeric record id.
    pub fn download_dataset(&self, path: impl AsRef<Path>, id: &str, rebuild: bool) -> Result<PathBuf> {
        check_record_id(id)?;
        let dest_dir = path.as_ref().join(id);
        if !rebuild {
            if let Ok(tsf) = find_tsf_file(&dest_dir) {
                tracing::debug!(path = %tsf.display(), "dataset already downloaded");
                return Ok(tsf);
            }
        }
        fs::create_dir_all(&dest_dir)?;

        let record_url = format!("{ZENODO_API}/{id}");
        let record: serde_json::Value = serde_json::from_reader(
            ureq::get(&record_url)
                .call()
                .map_err(|e| DataError::Download(format!("Failed to download {record_url}: {e}")))?
                .into_reader(),
        )?;
        let files = record_files(&record)?;
        for (key, url) in files {
            tracing::info!(file = %key, id, "downloading dataset");
            let target = dest_dir.join(&key);
            download_file(&url, &target)?;
            if key.ends_with(".zip") {
                extract_zip(&target, &dest_dir)?;
                fs::remove_file(&target)?;
            }
        }
        find_tsf_file(&dest_dir)
    }

    /// Download a dataset if needed and parse it.
    pub fn generate_dataset(&self, path: impl AsRef<Path>, id: &str) -> Result<TsfData> {
        let tsf = self.download_dataset(path, id, false)?;
        convert_tsf_to_dataframe(tsf, None, VALUE_COLUMN)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| DataError::Parse(format!("invalid pattern {pattern}: {e}")))
}

fn strip_tags(tags: &Regex, html: &str) -> String {
    tags.replace_all(html, " ")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn monash_frequency(text: &str) -> Option<String> {
    let candidate = text.trim().to_lowercase().replace([' ', '-'], "_");
    Frequency::get_freq(&candidate).ok().map(|_| candidate)
}

/// Extract dataset entries from the repository page.
///
/// Every table row linking a Zenodo record yields one entry per link. The
/// first cell is the name, the second the domain, the first integer cell the
/// number of series and the first cell naming a Monash frequency the
/// frequency.
pub fn parse_table(html: &str) -> Result<Vec<MonarchEntry>> {
    let row_re = compile(r"(?is)<tr[^>]*>(.*?)</tr>")?;
    let cell_re = compile(r"(?is)<td[^>]*>(.*?)</td>")?;
    let link_re = compile(r#"(?is)<a[^>]*href="https?://zenodo\.org/records?/(\d+)[^"]*"[^>]*>(.*?)</a>"#)?;
    let tags = compile(r"<[^>]*>")?;

    let mut entries = Vec::new();
    for row in row_re.captures_iter(html) {
        let row = &row[1];
        let texts: Vec<String> = cell_re
            .captures_iter(row)
            .map(|c| strip_tags(&tags, &c[1]))
            .collect();
        if texts.len() < 2 {
            continue;
        }
        let n_series = texts[2..]
            .iter()
            .find_map(|t| t.replace(',', "").parse::<usize>().ok());
        let frequency = texts.iter().find_map(|t| monash_frequency(t)).unwrap_or_default();

        for link in link_re.captures_iter(row) {
            entries.push(MonarchEntry {
                name: texts[0].clone(),
                domain: texts[1].clone(),
                frequency: frequency.clone(),
                n_series,
                zenodo_id: link[1].to_string(),
                variant: strip_tags(&tags, &link[2]),
            });
        }
    }
    Ok(entries)
}

/// `(file name, download url)` of every file in a Zenodo record.
fn check_record_id(id: &str) -> Result<()> {
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) {
        return Err(DataError::InvalidInput(format!("'{id}' is not a Zenodo record id")));
    }
    Ok(())
}

fn record_files(record: &serde_json::Value) -> Result<Vec<(String, String)>> {
    let files = record
        .get("files")
        .and_then(|f| f.as_array())
        .ok_or_else(|| DataError::Parse("Zenodo record without files".to_string()))?;
    files
        .iter()
        .map(|f| {
            let key = f.get("key").and_then(|k| k.as_str());
            let url = f
                .get("links")
                .and_then(|l| l.get("self").or_else(|| l.get("content")))
                .and_then(|u| u.as_str());
            match (key, url) {
                (Some(k), _) if k.contains(['/', '\\']) || k.starts_with('.') => {
                    Err(DataError::Parse(format!("Zenodo file with unsafe name '{k}'")))
                }
                (Some(k), Some(u)) => Ok((k.to_string(), u.to_string())),
                _ => Err(DataError::Parse("Zenodo file without key or link".to_string())),
            }
        })
        .collect()
}

fn download_file(url: &str, path: &Path) -> Result<()> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| DataError::Download(format!("Failed to download {url}: {e}")))?;

    if response.status() != 200 {
        return Err(DataError::Download(format!(
            "HTTP {} for {}",
            response.status(),
            url
        )));
    }

    let mut file = File::create(path)?;
    let mut reader = response.into_reader();
    std::io::copy(&mut reader, &mut file)?;
    Ok(())
}

fn extract_zip(zip_path: &Path, dest_dir: &Path) -> Result<()> {
    let zip_file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(zip_file)
        .map_err(|e| DataError::FormatError(format!("Failed to read zip: {e}")))?;

    for i in 0..archive.len() {
        let mut file = archive
            .by_index(i)
            .map_err(|e| DataError::FormatError(format!("Failed to extract: {e}")))?;
        if file.name().ends_with('/') {
            continue;
        }
        let Some(name) = file.enclosed_name().and_then(|p| p.file_name().map(|n| n.to_owned())) else {
            continue;
        };
        let mut outfile = File::create(dest_dir.join(name))?;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)?;
        std::io::Write::write_all(&mut outfile, &buffer)?;
    }
    Ok(())
}

fn find_tsf_file(dir: &Path) -> Result<PathBuf> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().is_some_and(|ext| ext == "tsf") {
            return Ok(path);
        }
    }
    Err(DataError::InvalidInput(format!(
        "No .tsf file found in {}",
        dir.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
<table>
<tr><th>Dataset</th><th>Domain</th><th>No: of Series</th><th>Frequency</th><th>Download</th></tr>
<tr>
  <td><b>M1</b> Yearly</td><td>Multiple</td><td>181</td><td>Yearly</td>
  <td><a href="https://zenodo.org/record/4656193">Download</a></td>
</tr>
<tr>
  <td>Weather</td><td>Nature</td><td>3,010</td><td>Daily</td>
  <td><a href="https://zenodo.org/records/4654822?x=1">With Missing</a>
      <a href="https://zenodo.org/record/4654999">Without Missing</a></td>
</tr>
<tr><td>No link</td><td>Other</td><td>1</td><td>Hourly</td></tr>
</table>"#;

    #[test]
    fn test_parse_table() {
        let table = parse_table(PAGE).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table[0].name, "M1 Yearly");
        assert_eq!(table[0].domain, "Multiple");
        assert_eq!(table[0].n_series, Some(181));
        assert_eq!(table[0].frequency, "yearly");
        assert_eq!(table[0].zenodo_id, "4656193");

        assert_eq!(table[1].n_series, Some(3010));
        assert_eq!(table[1].variant, "With Missing");
        assert_eq!(table[2].zenodo_id, "4654999");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("monarch.json");
        let monarch = Monarch::from_table(&path, parse_table(PAGE).unwrap());
        monarch.save().unwrap();

        let reloaded = Monarch::new(&path, "http://unreachable.invalid/", false).unwrap();
        assert_eq!(reloaded.table(), monarch.table());
        assert_eq!(reloaded.find("4654822").unwrap().name, "Weather");
    }

    #[test]
    fn test_download_skips_existing() {
        let dir = tempfile::tempdir().unwrap();
        let dataset_dir = dir.path().join("123");
        fs::create_dir_all(&dataset_dir).unwrap();
        fs::write(dataset_dir.join("toy.tsf"), "@attribute a string\n@frequency daily\n@data\nA:1,2\n").unwrap();

        let monarch = Monarch::from_table(dir.path().join("t.json"), Vec::new());
        let data = monarch.generate_dataset(dir.path(), "123").unwrap();
        assert_eq!(data.series.len(), 1);
        assert_eq!(data.relation.as_deref(), Some("toy"));
    }

    #[test]
    fn test_download_rejects_non_numeric_id() {
        let dir = tempfile::tempdir().unwrap();
        let monarch = Monarch::from_table(dir.path().join("t.json"), Vec::new());
        for id in ["../escape", "", "12a", "/tmp"] {
            assert!(matches!(
                monarch.download_dataset(dir.path(), id, false),
                Err(DataError::InvalidInput(_))
            ));
        }
        assert!(!dir.path().join("escape").exists());
    }

    #[test]
    fn test_record_files() {
        let record = serde_json::json!({
            "files": [{"key": "m1.zip", "links": {"self": "https://zenodo.org/api/files/m1.zip"}}]
        });
        let files = record_files(&record).unwrap();
        assert_eq!(files, vec![("m1.zip".to_string(), "https://zenodo.org/api/files/m1.zip".to_string())]);
        assert!(record_files(&serde_json::json!({})).is_err());

        let unsafe_key = serde_json::json!({
            "files": [{"key": "../m1.zip", "links": {"self": "https://zenodo.org/api/files/m1.zip"}}]
        });
        assert!(record_files(&unsafe_key).is_err());
    }

    #[test]
    fn test_offline_list() {
        assert!(list_forecasting_datasets().any(|(name, _)| name == "nn5_daily"));
    }
}
