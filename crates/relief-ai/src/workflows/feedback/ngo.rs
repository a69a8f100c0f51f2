use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Read;
use std::path::Path;

use crate::workflows::catalog::{split_tags, CatalogError, Table};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NgoCapability {
    pub name: String,
    pub country: String,
    pub focus_areas: BTreeSet<String>,
}

impl NgoCapability {
    pub fn new<I, S>(name: impl Into<String>, country: impl Into<String>, focus_areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            country: country.into(),
            focus_areas: focus_areas.into_iter().map(Into::into).collect(),
        }
    }

    pub fn serves(&self, country: &str) -> bool {
        self.country.trim().eq_ignore_ascii_case(country.trim())
    }

    /// True when any focus area contains one of `tags`, ignoring case, so "Protection"
    /// covers "Refugee Protection".
    pub fn focuses_on(&self, tags: &[&str]) -> bool {
        self.focus_areas.iter().any(|area| {
            let area = area.to_lowercase();
            tags.iter()
                .any(|tag| area.contains(tag.trim().to_lowercase().as_str()))
        })
    }
}

/// Responding organisations, loaded once and read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NgoCatalog {
    organisations: Vec<NgoCapability>,
}

impl NgoCatalog {
    pub fn new(organisations: Vec<NgoCapability>) -> Self {
        Self { organisations }
    }

    pub fn organisations(&self) -> &[NgoCapability] {
        &self.organisations
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(file)
    }

    /// Columns: `name`, `country`, `focus_areas` (`;`-separated).
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, CatalogError> {
        let table = Table::read(reader)?;
        let mut organisations = Vec::new();
        for row in table.rows() {
            organisations.push(NgoCapability {
                name: row.required("name")?.to_string(),
                country: row.required("country")?.to_string(),
                focus_areas: split_tags(row.get("focus_areas").unwrap_or("")),
            });
        }
        Ok(Self { organisations })
    }

    pub fn builtin() -> Self {
        Self::new(vec![
            NgoCapability::new("Action Against Hunger", "Kenya", ["Food Security"]),
            NgoCapability::new("CARE International", "Ethiopia", ["Humanitarian Aid"]),
            NgoCapability::new("UNHCR", "Kenya", ["Refugee Protection"]),
            NgoCapability::new("Amel Association", "Ethiopia", ["Health"]),
        ])
    }

    /// Names of organisations in `country` carrying any of `tags`, in catalog order.
    pub fn responders(&self, country: &str, tags: &[&str]) -> Vec<String> {
        self.organisations
            .iter()
            .filter(|ngo| ngo.serves(country) && ngo.focuses_on(tags))
            .map(|ngo| ngo.name.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_focus_areas_from_csv() {
        let csv = "name,country,focus_areas\nMedics Abroad,Kenya,Health; Medical\nShelterBox,Uganda,\n";
        let catalog = NgoCatalog::from_reader(csv.as_bytes()).expect("load");
        assert_eq!(catalog.organisations().len(), 2);
        assert!(catalog.organisations()[0].focus_areas.contains("Medical"));
        assert!(catalog.organisations()[1].focus_areas.is_empty());
    }

    #[test]
    fn rows_without_a_name_are_rejected() {
        let csv = "name,country,focus_areas\n,Kenya,Health\n";
        let error = NgoCatalog::from_reader(csv.as_bytes()).expect_err("blank name");
        assert!(matches!(error, CatalogError::EmptyValue { ref column, .. } if column == "name"));
    }

    #[test]
    fn responders_match_country_and_tags_case_insensitively() {
        let catalog = NgoCatalog::builtin();
        assert_eq!(
            catalog.responders("kenya", &["food security", "Humanitarian Aid"]),
            vec!["Action Against Hunger".to_string()]
        );
        assert!(catalog.responders("Uganda", &["Health"]).is_empty());
    }

    #[test]
    fn broader_focus_areas_contain_category_tags() {
        let catalog = NgoCatalog::builtin();
        assert_eq!(
            catalog.responders("Kenya", &["Protection", "Safety"]),
            vec!["UNHCR".to_string()]
        );

        let unhcr = NgoCapability::new("UNHCR", "Kenya", ["Refugee Protection"]);
        assert!(unhcr.focuses_on(&["protection"]));
        assert!(!unhcr.focuses_on(&["Refugee Protection Services"]));
        assert!(!unhcr.focuses_on(&["Health"]));
    }
}
