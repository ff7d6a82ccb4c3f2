use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

use super::error::StoreError;
use super::types::{CatalogRef, InventoryRow, TableRow, Variant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Json,
}

pub fn detect_data_format(path: &Path, fallback: DataFormat) -> DataFormat {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("csv") => DataFormat::Csv,
        Some("json") => DataFormat::Json,
        _ => fallback,
    }
}

/// Where each table of a run lives under the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    pub inventory: PathBuf,
    pub updated_inventory: PathBuf,
    pub bad_products: PathBuf,
    pub catalogs: Option<PathBuf>,
    pub unlisted_dir: PathBuf,
}

impl FileLayout {
    pub fn new(dir: &Path, variant: Variant) -> Self {
        match variant {
            Variant::Default => Self {
                inventory: dir.join("difox.csv"),
                updated_inventory: dir.join("difox-parse.csv"),
                bad_products: dir.join("bad-products.csv"),
                catalogs: Some(dir.join("catalogs.csv")),
                unlisted_dir: dir.join("category_of_interest"),
            },
            Variant::Italia => Self {
                inventory: dir.join("difox-italia.csv"),
                updated_inventory: dir.join("difox-italia-parse.csv"),
                bad_products: dir.join("italia-bad-products.csv"),
                catalogs: None,
                unlisted_dir: dir.join("category_of_interest"),
            },
        }
    }
}

type RawRow = BTreeMap<String, String>;

fn load_raw_rows(path: &Path) -> Result<Vec<RawRow>, StoreError> {
    match detect_data_format(path, DataFormat::Csv) {
        DataFormat::Csv => load_raw_csv(path),
        DataFormat::Json => load_raw_json(path),
    }
}

fn load_raw_csv(path: &Path) -> Result<Vec<RawRow>, StoreError> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
    let headers = reader
        .headers()
        .map_err(csv_err)?
        .iter()
        .map(|h| h.trim().to_string())
        .collect::<Vec<_>>();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(csv_err)?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect::<RawRow>();
        rows.push(row);
    }
    Ok(rows)
}

fn load_raw_json(path: &Path) -> Result<Vec<RawRow>, StoreError> {
    let file = File::open(path).map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<serde_json::Map<String, Value>> =
        serde_json::from_reader(BufReader::new(file)).map_err(|source| StoreError::Json {
            path: path.to_path_buf(),
            source,
        })?;

    Ok(records
        .into_iter()
        .map(|record| {
            record
                .into_iter()
                .map(|(k, v)| {
                    let text = match v {
                        Value::String(s) => s,
                        Value::Null => String::new(),
                        other => other.to_string(),
                    };
                    (k, text)
                })
                .collect()
        })
        .collect())
}

/// Column lookup that tolerates case differences in the header row.
fn take_column(row: &mut RawRow, column: &str) -> Option<String> {
    let key = row
        .keys()
        .find(|k| k.eq_ignore_ascii_case(column))
        .cloned()?;
    row.remove(&key)
}

fn require_columns(
    path: &Path,
    rows: &[RawRow],
    columns: &[&'static str],
) -> Result<(), StoreError> {
    let Some(first) = rows.first() else {
        return Ok(());
    };
    for column in columns {
        if !first.keys().any(|k| k.eq_ignore_ascii_case(column)) {
            return Err(StoreError::MissingColumn {
                path: path.to_path_buf(),
                column,
            });
        }
    }
    Ok(())
}

/// Inventory rows with EAN kept as text so leading zeros survive.
pub fn load_inventory(path: &Path) -> Result<Vec<InventoryRow>, StoreError> {
    let rows = load_raw_rows(path)?;
    require_columns(path, &rows, &["EAN", "url"])?;
    Ok(rows
        .into_iter()
        .map(|mut row| {
            let ean = take_column(&mut row, "EAN").unwrap_or_default().trim().to_string();
            let url = take_column(&mut row, "url").unwrap_or_default().trim().to_string();
            InventoryRow {
                ean,
                url,
                extra: row,
            }
        })
        .collect())
}

pub fn load_catalogs(path: &Path) -> Result<Vec<CatalogRef>, StoreError> {
    let rows = load_raw_rows(path)?;
    require_columns(path, &rows, &["url"])?;
    Ok(rows
        .into_iter()
        .map(|mut row| CatalogRef {
            url: take_column(&mut row, "url").unwrap_or_default().trim().to_string(),
            name: take_column(&mut row, "name").unwrap_or_default(),
            filename: take_column(&mut row, "filename").filter(|f| !f.trim().is_empty()),
        })
        .filter(|catalog| !catalog.url.is_empty())
        .collect())
}

pub fn save_rows<T: TableRow>(path: &Path, rows: &[T]) -> Result<(), StoreError> {
    let io_err = |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    match detect_data_format(path, DataFormat::Csv) {
        DataFormat::Csv => {
            let csv_err = |source| StoreError::Csv {
                path: path.to_path_buf(),
                source,
            };
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_path(path)
                .map_err(csv_err)?;
            writer.write_record(T::HEADERS).map_err(csv_err)?;
            for row in rows {
                writer.serialize(row).map_err(csv_err)?;
            }
            writer.flush().map_err(io_err)?;
        }
        DataFormat::Json => {
            let file = File::create(path).map_err(io_err)?;
            let mut out = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut out, rows).map_err(|source| StoreError::Json {
                path: path.to_path_buf(),
                source,
            })?;
            out.write_all(b"\n").map_err(io_err)?;
            out.flush().map_err(io_err)?;
        }
    }
    Ok(())
}

/// Number of rows whose EAN already appeared earlier in the inventory.
pub fn duplicate_ean_count(rows: &[InventoryRow]) -> usize {
    let mut seen = HashMap::<&str, usize>::new();
    for row in rows {
        *seen.entry(row.ean.as_str()).or_insert(0) += 1;
    }
    seen.values().map(|n| n - 1).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::types::{BadProductRow, UpdatedRow};

    fn row(ean: &str) -> InventoryRow {
        InventoryRow {
            ean: ean.to_string(),
            url: format!("https://shop.test/p/{ean}"),
            ..InventoryRow::default()
        }
    }

    #[test]
    fn inventory_keeps_leading_zeros_and_extra_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("difox.csv");
        fs::write(
            &path,
            "EAN,url,supplier\n0041234,https://shop.test/p/1,Acme\n0099,https://shop.test/p/2,\n",
        )
        .unwrap();

        let rows = load_inventory(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].ean, "0041234");
        assert_eq!(rows[0].url, "https://shop.test/p/1");
        assert_eq!(rows[0].extra.get("supplier").map(String::as_str), Some("Acme"));
        assert_eq!(rows[1].ean, "0099");
    }

    #[test]
    fn inventory_without_url_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("difox.csv");
        fs::write(&path, "EAN,name\n1,x\n").unwrap();

        let err = load_inventory(&path).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { column: "url", .. }));
    }

    #[test]
    fn json_inventory_numbers_become_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("inventory.json");
        fs::write(&path, r#"[{"EAN": "0012", "url": "u1", "stock": 3}]"#).unwrap();

        let rows = load_inventory(&path).unwrap();
        assert_eq!(rows[0].ean, "0012");
        assert_eq!(rows[0].extra.get("stock").map(String::as_str), Some("3"));
    }

    #[test]
    fn catalogs_default_missing_filename() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalogs.csv");
        fs::write(
            &path,
            concat!(
                "url,name,filename\n",
                "https://shop.test/c/1,Phones,phones.csv\n",
                "https://shop.test/c/2,Audio,\n",
            ),
        )
        .unwrap();

        let catalogs = load_catalogs(&path).unwrap();
        assert_eq!(catalogs.len(), 2);
        assert_eq!(catalogs[0].output_name(), "phones.csv");
        assert_eq!(catalogs[1].name, "Audio");
        assert_eq!(catalogs[1].output_name(), "Unnamed");
    }

    #[test]
    fn saved_csv_has_headers_even_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("bad-products.csv");

        save_rows::<BadProductRow>(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "EAN,error,url\n");
    }

    #[test]
    fn saved_csv_rows_follow_headers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("difox-parse.csv");
        let rows = vec![UpdatedRow {
            ean: "0041".to_string(),
            price: 1234.56,
            quantity: 5,
        }];

        save_rows(&path, &rows).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "EAN,price,quantity\n0041,1234.56,5\n"
        );
    }

    #[test]
    fn extensionless_output_falls_back_to_csv() {
        assert_eq!(detect_data_format(Path::new("Unnamed"), DataFormat::Csv), DataFormat::Csv);
        assert_eq!(detect_data_format(Path::new("x.JSON"), DataFormat::Csv), DataFormat::Json);
    }

    #[test]
    fn layouts_resolve_under_working_directory() {
        let dir = Path::new("/data");
        let default = FileLayout::new(dir, Variant::Default);
        assert_eq!(default.inventory, dir.join("difox.csv"));
        assert_eq!(default.catalogs, Some(dir.join("catalogs.csv")));
        let italia = FileLayout::new(dir, Variant::Italia);
        assert_eq!(italia.bad_products, dir.join("italia-bad-products.csv"));
        assert_eq!(italia.catalogs, None);
    }

    #[test]
    fn duplicates_count_extra_occurrences() {
        let rows = vec![row("1"), row("2"), row("1"), row("1"), row("3"), row("2")];
        assert_eq!(duplicate_ean_count(&rows), 3);
        assert_eq!(duplicate_ean_count(&[row("1"), row("2")]), 0);
    }
}
