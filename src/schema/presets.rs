//! Built-in collection schemas
//!
//! The standard report collections and the row checks that cannot be
//! expressed as a column type (an IOC's value must match its declared
//! indicator type, CVSS scores stay within 0..=10, and so on).

use super::collection::CollectionSchema;
use super::field::{one_of, FieldKind, FieldSpec};
use crate::error::{Result, SecLoadError};
use crate::ingest::{CsvRow, RowPredicate, RowValidation, Validator};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

static CVE_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(?i)CVE-\d{4}-\d{4,}$").unwrap());

const SEVERITIES: &[&str] = &["low", "medium", "high", "critical"];

/// Asset inventory
pub fn assets() -> CollectionSchema {
    CollectionSchema::new("assets", "assets")
        .field(FieldSpec::required("hostname", FieldKind::Text))
        .field(FieldSpec::required("ip_address", FieldKind::IpAddress))
        .field(FieldSpec::required("bu", FieldKind::Text))
        .field(FieldSpec::required(
            "asset_type",
            one_of(&["server", "workstation", "network", "cloud", "mobile", "other"]),
        ))
        .field(FieldSpec::new("owner", FieldKind::Email))
        .field(FieldSpec::new("criticality", one_of(SEVERITIES)))
        .key(&["hostname", "bu"])
}

/// Control-level compliance scores per business unit
pub fn compliance_scores() -> CollectionSchema {
    CollectionSchema::new("compliance-scores", "compliance-scores")
        .field(FieldSpec::required("bu", FieldKind::Text))
        .field(FieldSpec::required("framework", FieldKind::Text))
        .field(FieldSpec::required("control_id", FieldKind::Text))
        .field(FieldSpec::required("score", FieldKind::Percentage))
        .field(FieldSpec::required("assessed_on", FieldKind::Date))
        .field(FieldSpec::new("assessor", FieldKind::Text))
        .key(&["bu", "framework", "control_id", "assessed_on"])
}

/// Threat category breakdown per reporting period
pub fn threat_composition() -> CollectionSchema {
    CollectionSchema::new("threat-composition", "threat-composition")
        .field(FieldSpec::required("bu", FieldKind::Text))
        .field(FieldSpec::required("period", FieldKind::Date))
        .field(FieldSpec::required("threat_type", FieldKind::Text))
        .field(FieldSpec::required("count", FieldKind::Integer))
        .field(FieldSpec::new("percentage", FieldKind::Percentage))
        .key(&["bu", "period", "threat_type"])
}

/// Security alerts
pub fn alerts() -> CollectionSchema {
    CollectionSchema::new("alerts", "alerts")
        .field(FieldSpec::required("alert_id", FieldKind::Text))
        .field(FieldSpec::required("title", FieldKind::Text))
        .field(FieldSpec::required("severity", one_of(SEVERITIES)))
        .field(FieldSpec::new(
            "status",
            one_of(&["open", "investigating", "resolved", "closed"]),
        ))
        .field(FieldSpec::new("source", FieldKind::Text))
        .field(FieldSpec::required("bu", FieldKind::Text))
        .field(FieldSpec::required("detected_at", FieldKind::DateTime))
        .key(&["alert_id"])
}

/// Indicators of compromise
pub fn iocs() -> CollectionSchema {
    CollectionSchema::new("iocs", "iocs")
        .field(FieldSpec::required("indicator", FieldKind::Text))
        .field(FieldSpec::required("ioc_type", one_of(&["hash", "ip", "domain", "url"])))
        .field(FieldSpec::new("threat_actor", FieldKind::Text))
        .field(FieldSpec::new("confidence", FieldKind::Percentage))
        .field(FieldSpec::new("first_seen", FieldKind::Date))
        .field(FieldSpec::new("bu", FieldKind::Text))
        .key(&["indicator", "ioc_type"])
}

/// Vulnerability findings
pub fn vulnerabilities() -> CollectionSchema {
    CollectionSchema::new("vulnerabilities", "vulnerabilities")
        .field(FieldSpec::required("cve_id", FieldKind::Text))
        .field(FieldSpec::required("hostname", FieldKind::Text))
        .field(FieldSpec::required("cvss_score", FieldKind::Float))
        .field(FieldSpec::new("severity", one_of(SEVERITIES)))
        .field(FieldSpec::new("bu", FieldKind::Text))
        .field(FieldSpec::new("discovered_on", FieldKind::Date))
        .key(&["cve_id", "hostname"])
}

/// An IOC's value must parse as the kind its `ioc_type` declares
pub fn ioc_matches_type(row: &CsvRow) -> RowValidation {
    let (Some(indicator), Some(ioc_type)) = (row.non_empty("indicator"), row.non_empty("ioc_type"))
    else {
        return RowValidation::ok();
    };

    let kind = match ioc_type.trim().to_ascii_lowercase().as_str() {
        "hash" => FieldKind::Hash,
        "ip" => FieldKind::IpAddress,
        "domain" => FieldKind::Domain,
        "url" => FieldKind::Url,
        _ => return RowValidation::ok(),
    };

    if kind.coerce(indicator).is_some() {
        RowValidation::ok()
    } else {
        RowValidation::invalid(format!(
            "indicator '{}' is not {} as its ioc_type requires",
            indicator.trim(),
            kind.describe()
        ))
    }
}

/// CVE identifiers are well-formed and CVSS scores lie within 0..=10
pub fn vulnerability_is_plausible(row: &CsvRow) -> RowValidation {
    if let Some(cve) = row.non_empty("cve_id") {
        if !CVE_PATTERN.is_match(cve.trim()) {
            return RowValidation::invalid(format!("'{}' is not a CVE identifier", cve.trim()));
        }
    }
    if let Some(score) = row.non_empty("cvss_score").and_then(|s| s.trim().parse::<f64>().ok()) {
        if !(0.0..=10.0).contains(&score) {
            return RowValidation::invalid(format!("cvss_score {} outside 0..=10", score));
        }
    }
    RowValidation::ok()
}

/// A collection schema plus its optional row check
#[derive(Clone)]
pub struct Collection {
    /// Column layout
    pub schema: CollectionSchema,
    /// Check run on every row after type coercion
    pub predicate: Option<RowPredicate>,
}

impl Collection {
    /// Collection without a row check
    pub fn new(schema: CollectionSchema) -> Self {
        Self {
            schema,
            predicate: None,
        }
    }

    /// Build the validator for this collection
    pub fn validator(&self) -> Validator {
        let validator = Validator::new(self.schema.clone());
        match &self.predicate {
            Some(predicate) => validator.with_shared_predicate(Arc::clone(predicate)),
            None => validator,
        }
    }
}

/// Named collections available to the CLI
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    collections: BTreeMap<String, Collection>,
}

impl SchemaRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every built-in collection
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.insert(Collection::new(assets()));
        registry.insert(Collection::new(compliance_scores()));
        registry.insert(Collection::new(threat_composition()));
        registry.insert(Collection::new(alerts()));
        registry.insert(Collection {
            schema: iocs(),
            predicate: Some(Arc::new(ioc_matches_type)),
        });
        registry.insert(Collection {
            schema: vulnerabilities(),
            predicate: Some(Arc::new(vulnerability_is_plausible)),
        });
        registry
    }

    /// Add a collection after checking its schema, replacing one of the same name
    pub fn register(&mut self, collection: Collection) -> Result<()> {
        collection.schema.check()?;
        self.insert(collection);
        Ok(())
    }

    fn insert(&mut self, collection: Collection) {
        self.collections
            .insert(collection.schema.name.clone(), collection);
    }

    /// Look up a collection by name
    pub fn get(&self, name: &str) -> Result<&Collection> {
        self.collections
            .get(name)
            .ok_or_else(|| SecLoadError::UnknownCollection(name.to_string()))
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    /// All collections, sorted by name
    pub fn iter(&self) -> impl Iterator<Item = &Collection> {
        self.collections.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::CsvParser;

    #[test]
    fn test_builtin_schemas_are_consistent() {
        let registry = SchemaRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![
                "alerts",
                "assets",
                "compliance-scores",
                "iocs",
                "threat-composition",
                "vulnerabilities"
            ]
        );
        for collection in registry.iter() {
            collection.schema.check().unwrap();
        }
    }

    #[test]
    fn test_unknown_collection() {
        let registry = SchemaRegistry::builtin();
        assert!(matches!(
            registry.get("firewalls"),
            Err(SecLoadError::UnknownCollection(_))
        ));
    }

    #[test]
    fn test_register_rejects_bad_schema() {
        let mut registry = SchemaRegistry::new();
        let bad = CollectionSchema::new("x", "").field(FieldSpec::new("a", FieldKind::Text));
        assert!(registry.register(Collection::new(bad)).is_err());
        assert!(registry.names().is_empty());
    }

    #[test]
    fn test_ioc_indicator_must_match_type() {
        let parsed = CsvParser::new()
            .parse_str(
                "indicator,ioc_type,confidence\n\
                 8.8.8.8,ip,90\n\
                 evil.example.com,ip,80\n\
                 d41d8cd98f00b204e9800998ecf8427e,hash,\n\
                 https://bad.example/x,url,50\n",
            )
            .unwrap();
        let registry = SchemaRegistry::builtin();
        let report = registry.get("iocs").unwrap().validator().validate(&parsed).unwrap();
        assert_eq!(report.valid.len(), 3);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].line, 2);
        assert!(report.rejected[0].reason.contains("an IP address"));
    }

    #[test]
    fn test_vulnerability_checks() {
        let parsed = CsvParser::new()
            .parse_str(
                "cve_id,hostname,cvss_score\n\
                 CVE-2024-3094,build-01,10.0\n\
                 CVE-24-1,build-02,5\n\
                 CVE-2021-44228,app-01,11\n",
            )
            .unwrap();
        let registry = SchemaRegistry::builtin();
        let report = registry
            .get("vulnerabilities")
            .unwrap()
            .validator()
            .validate(&parsed)
            .unwrap();
        assert_eq!(report.valid.len(), 1);
        assert!(report.rejected[0].reason.contains("not a CVE identifier"));
        assert!(report.rejected[1].reason.contains("outside 0..=10"));
    }

    #[test]
    fn test_assets_reject_bad_ip() {
        let parsed = CsvParser::new()
            .parse_str(
                "hostname,ip_address,bu,asset_type\n\
                 web-01,10.1.1.1,Retail,server\n\
                 web-02,10.1.1.300,Retail,server\n",
            )
            .unwrap();
        let report = Collection::new(assets()).validator().validate(&parsed).unwrap();
        assert_eq!(report.valid.len(), 1);
        assert!(report.rejected[0].reason.contains("ip_address"));
    }
}
