//! BLE adapter configuration.

use serde::Deserialize;

/// How to find and connect to the peripheral.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BleConfig {
    /// How long to scan before giving up on finding the peripheral, in seconds.
    pub scan_duration_secs: u16,
    /// Upper bound on the GATT connection attempt, in seconds.
    pub connect_timeout_secs: u16,
    /// Case-insensitive substring of the advertised local name.
    pub name_filter: Option<String>,
    /// MAC address allowlist (e.g. `["00:A0:50:12:34:56"]`).
    ///
    /// When empty together with `name_filter`, the first peripheral
    /// advertising a supported service is used.
    pub address_filter: Vec<String>,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            scan_duration_secs: 10,
            connect_timeout_secs: 15,
            name_filter: None,
            address_filter: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_fill_missing_fields_with_defaults() {
        let config: BleConfig = toml::from_str("name_filter = \"CY Smart\"").unwrap();
        assert_eq!(config.scan_duration_secs, 10);
        assert_eq!(config.connect_timeout_secs, 15);
        assert_eq!(config.name_filter.as_deref(), Some("CY Smart"));
        assert!(config.address_filter.is_empty());
    }

    #[test]
    fn should_parse_address_allowlist() {
        let config: BleConfig = toml::from_str(
            r#"
            scan_duration_secs = 5
            address_filter = ["00:A0:50:12:34:56", "00:a0:50:ab:cd:ef"]
            "#,
        )
        .unwrap();
        assert_eq!(config.scan_duration_secs, 5);
        assert_eq!(config.address_filter.len(), 2);
    }
}
