//! Public long horizon benchmarks (ETT, electricity, traffic, ...).
//!
//! The files come from the `all_six_datasets` archive shared with the
//! Autoformer benchmarks. It must be downloaded manually and unpacked under
//! the dataset path.

use std::path::Path;

use crate::error::{DataError, Result};
use crate::frame::TimeFrame;

/// Location of the `all_six_datasets` archive.
pub const ARCHIVE_URL: &str = "https://drive.google.com/drive/folders/1ZOYpTUa82_jCcxIdTmyr0LXQfvaM9vIy";

/// Folder expected under the dataset path.
pub const ARCHIVE_FOLDER: &str = "all_six_datasets";

/// Name of the target column after loading.
pub const TARGET_COLUMN: &str = "y";

/// Supported datasets and their file inside the archive.
pub const PUBLIC_DATASETS: &[(&str, &str)] = &[
    ("electricity", "electricity/electricity.csv"),
    ("etth1", "ETT-small/ETTh1.csv"),
    ("etth2", "ETT-small/ETTh2.csv"),
    ("ettm1", "ETT-small/ETTm1.csv"),
    ("ettm2", "ETT-small/ETTm2.csv"),
    ("exchange_rate", "exchange_rate/exchange_rate.csv"),
    ("illness", "illness/national_illness.csv"),
    ("traffic", "traffic/traffic.csv"),
    ("weather", "weather/weather.csv"),
];

/// Read a public benchmark.
///
/// The `date` column becomes the time axis and `OT` the target `y`. Returns
/// the frame and the names of the remaining columns, usable as past
/// covariates.
///
/// # Errors
///
/// [`DataError::Download`] when the archive folder is missing and
/// [`DataError::InvalidInput`] for an unknown dataset.
pub fn read_public_dataset(path: impl AsRef<Path>, dataset: &str) -> Result<(TimeFrame, Vec<String>)> {
    let key = dataset.to_lowercase();
    let relative = PUBLIC_DATASETS
        .iter()
        .find_map(|(name, file)| (*name == key).then_some(*file))
        .ok_or_else(|| {
            let names: Vec<&str> = PUBLIC_DATASETS.iter().map(|(n, _)| *n).collect();
            DataError::InvalidInput(format!("unknown dataset '{dataset}', expected one of {names:?}"))
        })?;

    let root = path.as_ref().join(ARCHIVE_FOLDER);
    if !root.is_dir() {
        return Err(DataError::Download(format!(
            "{} not found: download the archive from {ARCHIVE_URL} and unpack it there",
            root.display()
        )));
    }

    let mut frame = TimeFrame::read_csv(root.join(relative), "date", None)?;
    let target = frame
        .remove_column("OT")
        .ok_or_else(|| DataError::ColumnNotFound("OT".to_string()))?;
    frame.add_column(TARGET_COLUMN, target)?;
    let covariates: Vec<String> = frame
        .column_names()
        .iter()
        .filter(|c| c.as_str() != TARGET_COLUMN)
        .cloned()
        .collect();
    tracing::info!(dataset, rows = frame.len(), covariates = covariates.len(), "loaded public dataset");
    Ok((frame, covariates))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_read_ett() {
        let dir = tempfile::tempdir().unwrap();
        let ett = dir.path().join(ARCHIVE_FOLDER).join("ETT-small");
        fs::create_dir_all(&ett).unwrap();
        fs::write(
            ett.join("ETTh1.csv"),
            "date,HUFL,HULL,OT\n2016-07-01 00:00:00,5.8,2.0,30.5\n2016-07-01 01:00:00,5.6,2.1,27.8\n",
        )
        .unwrap();

        let (frame, covariates) = read_public_dataset(dir.path(), "ETTh1").unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(covariates, vec!["HUFL".to_string(), "HULL".to_string()]);
        assert_eq!(frame.column(TARGET_COLUMN).unwrap(), &[30.5, 27.8]);
        assert!(!frame.has_column("OT"));
    }

    #[test]
    fn test_missing_archive() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_public_dataset(dir.path(), "traffic").unwrap_err();
        assert!(matches!(err, DataError::Download(_)));
    }

    #[test]
    fn test_unknown_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_public_dataset(dir.path(), "m4").unwrap_err();
        assert!(matches!(err, DataError::InvalidInput(_)));
    }
}
