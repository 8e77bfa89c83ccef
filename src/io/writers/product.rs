//! Merged dataset output.
//!
//! A merged dataset is written as a JSON document next to the requested
//! `.nc` name (same stem, `.json` extension). Writes go through a temporary
//! file in the destination directory and are renamed into place, so a reader
//! never sees a partial product.
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::core::merge::{MergedDataset, VariableStats};
use crate::io::dataset::AttrValue;
use crate::io::document::{GeolocationDoc, VariableDoc};
use crate::io::writers::WriterError;

#[derive(Serialize)]
struct MergedDocument<'a> {
    product_names: &'a [String; 2],
    geolocation: GeolocationDoc,
    variables: BTreeMap<&'a str, VariableDoc>,
    attributes: serde_json::Map<String, serde_json::Value>,
    statistics: &'a [VariableStats],
}

fn attribute_to_json(value: &AttrValue) -> serde_json::Value {
    match value {
        AttrValue::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        AttrValue::Text(s) => serde_json::Value::String(s.clone()),
    }
}

/// Path the merged dataset for `requested` ends up at.
pub fn output_path(requested: &Path) -> PathBuf {
    requested.with_extension("json")
}

pub fn write_merged_dataset(ds: &MergedDataset, requested: &Path) -> Result<PathBuf, WriterError> {
    let path = output_path(requested);
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(|e| WriterError::io(parent, e))?;

    let document = MergedDocument {
        product_names: &ds.product_names,
        geolocation: GeolocationDoc::from(&ds.geolocation),
        variables: ds
            .variables
            .iter()
            .map(|(k, v)| (k.as_str(), VariableDoc::from(v)))
            .collect(),
        attributes: ds
            .attributes
            .iter()
            .map(|(k, v)| (k.clone(), attribute_to_json(v)))
            .collect(),
        statistics: &ds.statistics,
    };

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| WriterError::io(parent, e))?;
    serde_json::to_writer_pretty(&mut tmp, &document).map_err(|source| {
        WriterError::Serialize {
            path: path.display().to_string(),
            source,
        }
    })?;
    tmp.flush().map_err(|e| WriterError::io(&path, e))?;
    tmp.persist(&path)
        .map_err(|e| WriterError::io(&path, e.error))?;
    info!("Merged dataset written to {:?}", path);
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::dataset::Geolocation;
    use ndarray::{Array1, array};

    fn sample() -> MergedDataset {
        MergedDataset {
            product_names: ["a".into(), "b".into()],
            geolocation: Geolocation::Regular {
                lon: Array1::from(vec![0.0, 1.0]),
                lat: Array1::from(vec![10.0]),
            },
            variables: BTreeMap::from([(
                "wind_speed_1".to_string(),
                array![[5.0, f64::NAN]],
            )]),
            attributes: BTreeMap::from([
                ("Bias".to_string(), AttrValue::Number(f64::NAN)),
                ("sourceProduct_1".to_string(), AttrValue::from("a.nc")),
            ]),
            statistics: Vec::new(),
        }
    }

    #[test]
    fn writes_json_next_to_requested_name() {
        let dir = tempfile::tempdir().unwrap();
        let requested = dir.path().join("out").join("sat_coloc_a__b.nc");
        let written = write_merged_dataset(&sample(), &requested).unwrap();
        assert_eq!(written, dir.path().join("out").join("sat_coloc_a__b.json"));

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(value["variables"]["wind_speed_1"][0][0], 5.0);
        assert!(value["variables"]["wind_speed_1"][0][1].is_null());
        assert!(value["attributes"]["Bias"].is_null());
        assert_eq!(value["attributes"]["sourceProduct_1"], "a.nc");
        assert_eq!(value["geolocation"]["kind"], "regular");
    }

    #[test]
    fn rewriting_replaces_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let requested = dir.path().join("m.nc");
        write_merged_dataset(&sample(), &requested).unwrap();
        let mut second = sample();
        second.product_names = ["c".into(), "d".into()];
        let written = write_merged_dataset(&second, &requested).unwrap();
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written).unwrap()).unwrap();
        assert_eq!(value["product_names"][0], "c");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
