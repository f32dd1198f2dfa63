//! Configuration loading integration tests.
//!
//! Covers from_file() for TOML/YAML/JSON, discover() across parent directories, and
//! rejection of incomplete or invalid files.

use figtab::{CaptionDirection, ExtractorConfig, FigtabError, FilterSpec, RegionExtractor, UnknownPolicy};
use std::fs;
use tempfile::TempDir;

const MINIMAL_TOML: &str = r#"
max_threads = 2
filters = [
    { type = "size", min_area = 50.0, max_page_fraction = 0.5 },
    { type = "unclassified", policy = "keep" },
]

[clustering]
epsilon = 2.5
page_tolerance = 0.0

[matching]
min_overlap_ratio = 0.3
max_gap_fraction = 0.1
figure_direction = "below"
table_direction = "above"

[estimation]
sample_pages = 3

[[captions]]
kind = "figure"
pattern = 'Abb\.\s*(\d+)'
numbering = "decimal"
case_insensitive = false
"#;

#[test]
fn test_from_file_toml_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("figtab.toml");
    fs::write(&config_path, MINIMAL_TOML).unwrap();

    let config = ExtractorConfig::from_file(&config_path).unwrap();
    assert_eq!(config.clustering.epsilon, 2.5);
    assert_eq!(config.matching.figure_direction, CaptionDirection::Below);
    assert_eq!(config.matching.table_direction, CaptionDirection::Above);
    assert_eq!(config.estimation.sample_pages, 3);
    assert_eq!(config.captions.len(), 1);
    assert_eq!(config.max_threads, Some(2));
    assert_eq!(
        config.filters,
        vec![
            FilterSpec::Size {
                min_area: 50.0,
                max_page_fraction: 0.5
            },
            FilterSpec::Unclassified {
                policy: UnknownPolicy::Keep
            },
        ]
    );
    assert!(config.validate().is_ok());
}

#[test]
fn test_from_file_yaml_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("figtab.yml");

    let yaml_content = r#"
clustering:
  epsilon: 0.0
  page_tolerance: 2.0
matching:
  min_overlap_ratio: 0.5
  max_gap_fraction: 0.05
  figure_direction: either
  table_direction: either
estimation:
  sample_pages: 5
captions:
  - kind: table
    pattern: 'Tabelle\s*(\d+)'
    numbering: decimal
    case_insensitive: true
filters:
  - type: min_height
    min_height: 5.0
"#;
    fs::write(&config_path, yaml_content).unwrap();

    let config = ExtractorConfig::from_file(&config_path).unwrap();
    assert_eq!(config.clustering.epsilon, 0.0);
    assert_eq!(config.clustering.page_tolerance, 2.0);
    assert_eq!(config.filters, vec![FilterSpec::MinHeight { min_height: 5.0 }]);
    assert_eq!(config.max_threads, None);
}

#[test]
fn test_from_file_json_succeeds() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("figtab.json");

    let mut config = ExtractorConfig::standard();
    config.clustering.epsilon = 4.0;
    config.matching.max_gap_fraction = 0.0625;
    fs::write(&config_path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

    let loaded = ExtractorConfig::from_file(&config_path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_from_file_unsupported_extension() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("figtab.ini");
    fs::write(&config_path, "epsilon=1").unwrap();

    let err = ExtractorConfig::from_file(&config_path).unwrap_err();
    assert!(matches!(err, FigtabError::Configuration { .. }));
    assert!(err.to_string().contains("Unsupported config file format"));
}

#[test]
fn test_from_file_missing_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = ExtractorConfig::from_file(temp_dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, FigtabError::Configuration { .. }));
}

#[test]
fn test_missing_section_is_rejected() {
    let without_estimation = MINIMAL_TOML.replace("[estimation]\nsample_pages = 3\n", "");
    let err = ExtractorConfig::from_toml_str(&without_estimation).unwrap_err();
    assert!(matches!(err, FigtabError::Configuration { .. }));
    assert!(err.to_string().contains("estimation"));
}

#[test]
fn test_unknown_filter_type_is_rejected() {
    let toml = MINIMAL_TOML.replace(r#"type = "size""#, r#"type = "colour""#);
    assert!(ExtractorConfig::from_toml_str(&toml).is_err());
}

#[test]
fn test_invalid_values_fail_at_construction() {
    let negative_epsilon = MINIMAL_TOML.replace("epsilon = 2.5", "epsilon = -1.0");
    let config = ExtractorConfig::from_toml_str(&negative_epsilon).unwrap();
    let err = RegionExtractor::new(config).unwrap_err();
    assert!(err.to_string().contains("epsilon"));

    let two_groups = MINIMAL_TOML.replace(r"'Abb\.\s*(\d+)'", r"'(Abb)\.\s*(\d+)'");
    let config = ExtractorConfig::from_toml_str(&two_groups).unwrap();
    assert!(RegionExtractor::new(config).is_err());

    let no_rules = MINIMAL_TOML.replace(
        "[[captions]]\nkind = \"figure\"\npattern = 'Abb\\.\\s*(\\d+)'\nnumbering = \"decimal\"\ncase_insensitive = false\n",
        "",
    );
    let no_rules = no_rules.replace("max_threads = 2\n", "max_threads = 2\ncaptions = []\n");
    let config = ExtractorConfig::from_toml_str(&no_rules).unwrap();
    assert!(config.captions.is_empty());
    assert!(matches!(
        RegionExtractor::new(config).unwrap_err(),
        FigtabError::Configuration { .. }
    ));
}

#[test]
#[serial_test::serial]
fn test_discover_in_current_dir() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("figtab.toml"), MINIMAL_TOML).unwrap();

    let original_dir = std::env::current_dir().unwrap();
    std::env::set_current_dir(temp_dir.path()).unwrap();
    let result = ExtractorConfig::discover();
    std::env::set_current_dir(original_dir).unwrap();

    let config = result.unwrap().expect("config should be discovered");
    assert_eq!(config.clustering.epsilon, 2.5);
}

#[test]
#[serial_test::serial]
fn test_discover_in_parent_dir() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("figtab.toml"), MINIMAL_TOML).unwrap();
    let sub_dir = temp_dir.path().join("papers").join("2024");
    fs::create_dir_all(&sub_dir).unwrap();

    let original_dir = std::env::current_dir().unwrap();
    std::env::set_current_dir(&sub_dir).unwrap();
    let result = ExtractorConfig::discover();
    std::env::set_current_dir(original_dir).unwrap();

    let config = result.unwrap().expect("config should be discovered in a parent");
    assert_eq!(config.estimation.sample_pages, 3);
}

#[test]
#[serial_test::serial]
fn test_discover_invalid_file_errors() {
    let temp_dir = TempDir::new().unwrap();
    fs::write(temp_dir.path().join("figtab.toml"), "[clustering\nepsilon = ").unwrap();

    let original_dir = std::env::current_dir().unwrap();
    std::env::set_current_dir(temp_dir.path()).unwrap();
    let result = ExtractorConfig::discover();
    std::env::set_current_dir(original_dir).unwrap();

    assert!(matches!(result, Err(FigtabError::Configuration { .. })));
}
