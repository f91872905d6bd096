//! Column dictionary loaded from CSV and rendered as prompt text.

use serde::Deserialize;
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

/// One documented column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DictionaryEntry {
    /// Column name as it appears in the table.
    #[serde(rename = "Column Header")]
    pub column: String,
    /// Business-facing name.
    #[serde(rename = "Business Header", default)]
    pub business_name: String,
    /// What the column means.
    #[serde(rename = "Definition", default)]
    pub definition: String,
    /// Example value.
    #[serde(rename = "Example", default)]
    pub example: String,
}

/// Every documented column, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnDictionary {
    entries: Vec<DictionaryEntry>,
}

impl ColumnDictionary {
    /// Reads a dictionary from CSV text with a header row.
    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, csv::Error> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let entries = rdr
            .deserialize::<DictionaryEntry>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Reads a dictionary from a CSV file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, csv::Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Returns the entries.
    #[must_use]
    pub fn entries(&self) -> &[DictionaryEntry] {
        &self.entries
    }

    /// Renders the dictionary as one bullet per column.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::from(
            "This is the data dictionary. It explains the columns in the database tables:\n",
        );
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "- Column '{}' (also called '{}'): {}. Example: {}",
                entry.column, entry.business_name, entry.definition, entry.example
            );
        }
        out
    }
}

/// Loads and renders the dictionary at `path`.
///
/// Never fails: a missing or unreadable file degrades to a short note so
/// extraction can proceed without it.
#[must_use]
pub fn describe_dictionary(path: impl AsRef<Path>) -> String {
    let path = path.as_ref();
    if !path.exists() {
        warn!(path = %path.display(), "Data dictionary not found");
        return "Data dictionary file not found. I will proceed without it.".to_string();
    }

    match ColumnDictionary::load(path) {
        Ok(dictionary) => dictionary.render(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read data dictionary");
            format!("Error reading data dictionary: {e}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    const CSV: &str = "Column Header,Business Header,Definition,Example\n\
Make,Manufacturer,The vehicle manufacturer,TESLA\n\
Model Year,Year,\"Model year, as reported\",2022\n";

    #[test]
    fn test_parse_and_render() {
        let dictionary = ColumnDictionary::from_reader(CSV.as_bytes()).unwrap();
        assert_eq!(dictionary.entries().len(), 2);
        assert_eq!(dictionary.entries()[1].definition, "Model year, as reported");

        let text = dictionary.render();
        assert!(text.starts_with("This is the data dictionary."));
        assert!(text.contains(
            "- Column 'Make' (also called 'Manufacturer'): The vehicle manufacturer. Example: TESLA\n"
        ));
    }

    #[test]
    fn test_describe_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CSV.as_bytes()).unwrap();

        let text = describe_dictionary(file.path());
        assert!(text.contains("Column 'Model Year'"));
    }

    #[test]
    fn test_missing_file_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let text = describe_dictionary(dir.path().join("missing.csv"));
        assert_eq!(
            text,
            "Data dictionary file not found. I will proceed without it."
        );
    }

    #[test]
    fn test_missing_column_header_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"Name,Meaning\nMake,Manufacturer\n").unwrap();

        let text = describe_dictionary(file.path());
        assert!(text.starts_with("Error reading data dictionary"));
    }
}
