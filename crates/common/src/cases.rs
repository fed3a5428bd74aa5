//! Loading test cases from YAML and JSON files

use serde::Deserialize;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::TestCase;

/// A case file holds either one case or a list of them
#[derive(Deserialize)]
#[serde(untagged)]
enum CaseFile {
    Many { cases: Vec<TestCase> },
    List(Vec<TestCase>),
    One(TestCase),
}

impl CaseFile {
    fn into_cases(self) -> Vec<TestCase> {
        match self {
            CaseFile::Many { cases } | CaseFile::List(cases) => cases,
            CaseFile::One(case) => vec![case],
        }
    }
}

/// Parse test cases from a YAML string (JSON is valid YAML)
pub fn from_yaml(yaml: &str) -> Result<Vec<TestCase>> {
    let file: CaseFile = serde_yaml::from_str(yaml)?;
    Ok(file.into_cases())
}

/// Parse test cases from a JSON string
pub fn from_json(json: &str) -> Result<Vec<TestCase>> {
    let file: CaseFile = serde_json::from_str(json)?;
    Ok(file.into_cases())
}

/// Parse test cases from a file, choosing the format by extension
pub fn from_file(path: &Path) -> Result<Vec<TestCase>> {
    let content = std::fs::read_to_string(path)?;
    let parsed = match path.extension().and_then(|e| e.to_str()) {
        Some("json") => from_json(&content),
        _ => from_yaml(&content),
    };
    parsed.map_err(|e| Error::CaseParse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn is_case_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext == "yaml" || ext == "yml" || ext == "json")
        .unwrap_or(false)
}

/// Load all cases from a file, or from every case file under a directory
pub fn load_all(path: &Path) -> Result<Vec<TestCase>> {
    if path.is_file() {
        return from_file(path);
    }

    let mut files: Vec<_> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file() && is_case_file(e.path()))
        .map(|e| e.into_path())
        .collect();
    files.sort();

    let mut cases = Vec::new();
    for file in files {
        let loaded = from_file(&file)?;
        tracing::debug!("Loaded {} case(s) from {}", loaded.len(), file.display());
        cases.extend(loaded);
    }

    Ok(cases)
}

/// Pick the case with `id`
pub fn find(cases: &[TestCase], id: &str) -> Result<TestCase> {
    cases
        .iter()
        .find(|c| c.id == id)
        .cloned()
        .ok_or_else(|| Error::CaseNotFound(id.to_string()))
}

/// Keep only cases carrying `tag`
pub fn filter_by_tag(cases: Vec<TestCase>, tag: &str) -> Vec<TestCase> {
    cases.into_iter().filter(|c| c.has_tag(tag)).collect()
}
