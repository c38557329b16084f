//! Virtual device definitions.

use std::collections::HashSet;
use std::path::Path;

use anvil_protocol::{DeviceParameter, ParamType, MAX_LIST_ENTRIES, MAX_STRING_LEN, NOT_FOUND_ID};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SimError, SimResult};

/// One virtual device: the port identity it answers on and its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Port identity, e.g. `ttyMock1`.
    pub port: String,
    /// Parameter table loaded on open.
    pub parameters: Vec<DeviceParameter>,
}

impl DeviceProfile {
    /// Create a profile.
    pub fn new(port: impl Into<String>, parameters: Vec<DeviceParameter>) -> Self {
        DeviceProfile {
            port: port.into(),
            parameters,
        }
    }
}

/// The set of devices a simulator can open.
///
/// ```yaml
/// devices:
///   - port: ttyBench
///     parameters:
///       - { id: 1, type: toggle, name: Power, value: 1.0, min: 0.0, max: 1.0 }
///       - { id: 2, type: string, name: Label, string_value: bench }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCatalog {
    /// Devices in listing order.
    pub devices: Vec<DeviceProfile>,
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::presets()
    }
}

impl DeviceCatalog {
    /// The three built-in devices `ttyMock1`, `ttyMock2` and `ttyMock3`.
    pub fn presets() -> Self {
        use ParamType::{Numeric, Slider, Toggle};
        let num = DeviceParameter::numeric;

        DeviceCatalog {
            devices: vec![
                DeviceProfile::new(
                    "ttyMock1",
                    vec![
                        num(0, Toggle, "Mock1 Power", 1.0, 0.0, 1.0),
                        num(1, Slider, "Mock1 Level", 50.0, 0.0, 100.0),
                    ],
                ),
                DeviceProfile::new(
                    "ttyMock2",
                    vec![
                        num(10, Toggle, "Mock2 Turbo", 0.0, 0.0, 1.0),
                        num(11, Toggle, "Mock2 LED", 1.0, 0.0, 1.0),
                        num(12, Slider, "Mock2 Speed", 25.0, 0.0, 200.0),
                        num(13, Numeric, "Mock2 Goal", 150.0, 0.0, 500.0),
                    ],
                ),
                DeviceProfile::new(
                    "ttyMock3",
                    vec![
                        num(20, Toggle, "Tgl 1", 0.0, 0.0, 1.0),
                        num(21, Toggle, "Tgl 2", 1.0, 0.0, 1.0),
                        num(22, Slider, "Sld 1", 10.0, 0.0, 100.0),
                        num(23, Slider, "Sld 2", 80.0, 0.0, 100.0),
                        num(24, Numeric, "Num 1", 123.0, 0.0, 1000.0),
                        num(25, Numeric, "Num 2", 456.0, 0.0, 1000.0),
                        DeviceParameter::text(26, "Str 1", "Hello"),
                        DeviceParameter::text(27, "Str 2", "World"),
                    ],
                ),
            ],
        }
    }

    /// Parse and validate a catalog from YAML text.
    pub fn from_yaml_str(yaml: &str) -> SimResult<Self> {
        let catalog: DeviceCatalog = serde_yaml::from_str(yaml)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog from a YAML file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> SimResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let catalog = Self::from_yaml_str(&text)?;
        debug!(
            "Loaded device catalog from {} ({} devices)",
            path.display(),
            catalog.devices.len()
        );
        Ok(catalog)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> SimResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Check every device fits the wire format.
    pub fn validate(&self) -> SimResult<()> {
        let mut ports = HashSet::new();
        for device in &self.devices {
            if device.port.is_empty() {
                return Err(SimError::invalid("device with empty port name"));
            }
            if !ports.insert(device.port.as_str()) {
                return Err(SimError::invalid(format!("duplicate port {}", device.port)));
            }
            if device.parameters.len() > MAX_LIST_ENTRIES {
                return Err(SimError::invalid(format!(
                    "{} has {} parameters, maximum is {}",
                    device.port,
                    device.parameters.len(),
                    MAX_LIST_ENTRIES
                )));
            }

            let mut ids = HashSet::new();
            for p in &device.parameters {
                if p.id == NOT_FOUND_ID {
                    return Err(SimError::invalid(format!(
                        "{}: id {} is reserved",
                        device.port, NOT_FOUND_ID
                    )));
                }
                if !ids.insert(p.id) {
                    return Err(SimError::invalid(format!(
                        "{}: duplicate parameter id {}",
                        device.port, p.id
                    )));
                }
                if p.name.len() > MAX_STRING_LEN || p.string_value.len() > MAX_STRING_LEN {
                    return Err(SimError::invalid(format!(
                        "{}: parameter {} has a string longer than {} bytes",
                        device.port, p.id, MAX_STRING_LEN
                    )));
                }
                if p.param_type.is_text() {
                    continue;
                }
                if !p.min.is_finite() || !p.max.is_finite() {
                    return Err(SimError::invalid(format!(
                        "{}: parameter {} has a non-finite range",
                        device.port, p.id
                    )));
                }
                if p.min > p.max {
                    return Err(SimError::invalid(format!(
                        "{}: parameter {} has min > max",
                        device.port, p.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Look up a device by port identity.
    pub fn get(&self, port: &str) -> Option<&DeviceProfile> {
        self.devices.iter().find(|d| d.port == port)
    }

    /// Port identities in listing order.
    pub fn ports(&self) -> Vec<String> {
        self.devices.iter().map(|d| d.port.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        let catalog = DeviceCatalog::presets();
        assert_eq!(catalog.ports(), vec!["ttyMock1", "ttyMock2", "ttyMock3"]);
        catalog.validate().unwrap();

        let mock3 = catalog.get("ttyMock3").unwrap();
        assert_eq!(mock3.parameters.len(), 8);
        let strings: Vec<&str> = mock3
            .parameters
            .iter()
            .filter(|p| p.param_type == ParamType::String)
            .map(|p| p.string_value.as_str())
            .collect();
        assert_eq!(strings, vec!["Hello", "World"]);

        let goal = &catalog.get("ttyMock2").unwrap().parameters[3];
        assert_eq!(goal.name, "Mock2 Goal");
        assert_eq!(goal.value, 150.0);
        assert_eq!(goal.max, 500.0);
    }

    #[test]
    fn test_yaml_catalog() {
        let yaml = r#"
devices:
  - port: ttyBench
    parameters:
      - { id: 1, type: toggle, name: Power, value: 1.0, min: 0.0, max: 1.0 }
      - { id: 2, type: string, name: Label, string_value: bench }
"#;
        let catalog = DeviceCatalog::from_yaml_str(yaml).unwrap();
        let bench = catalog.get("ttyBench").unwrap();
        assert_eq!(bench.parameters[0].param_type, ParamType::Toggle);
        assert_eq!(bench.parameters[1].string_value, "bench");
        assert_eq!(bench.parameters[1].max, 0.0);
        assert!(catalog.get("ttyMock1").is_none());
    }

    #[test]
    fn test_yaml_roundtrip_of_presets() {
        let presets = DeviceCatalog::presets();
        let loaded = DeviceCatalog::from_yaml_str(&presets.to_yaml().unwrap()).unwrap();
        assert_eq!(loaded.ports(), presets.ports());
        for (a, b) in loaded.devices.iter().zip(&presets.devices) {
            let wire = |d: &DeviceProfile| -> Vec<_> {
                d.parameters
                    .iter()
                    .map(|p| (p.id, p.param_type, p.name.clone(), p.current_value(), p.min, p.max))
                    .collect()
            };
            assert_eq!(wire(a), wire(b));
        }
    }

    #[test]
    fn test_validation_errors() {
        let dup = DeviceCatalog {
            devices: vec![DeviceProfile::new(
                "ttyX",
                vec![
                    DeviceParameter::numeric(1, ParamType::Toggle, "A", 0.0, 0.0, 1.0),
                    DeviceParameter::numeric(1, ParamType::Toggle, "B", 0.0, 0.0, 1.0),
                ],
            )],
        };
        assert!(matches!(dup.validate(), Err(SimError::InvalidCatalog(_))));

        let reserved = DeviceCatalog {
            devices: vec![DeviceProfile::new(
                "ttyX",
                vec![DeviceParameter::numeric(0xFF, ParamType::Toggle, "A", 0.0, 0.0, 1.0)],
            )],
        };
        assert!(reserved.validate().is_err());

        let inverted = DeviceCatalog {
            devices: vec![DeviceProfile::new(
                "ttyX",
                vec![DeviceParameter::numeric(1, ParamType::Slider, "A", 5.0, 100.0, 0.0)],
            )],
        };
        assert!(inverted.validate().is_err());

        let nan_range = r#"
devices:
  - port: ttyX
    parameters:
      - { id: 1, type: slider, name: A, value: 1.0, min: .nan, max: 10.0 }
"#;
        assert!(matches!(
            DeviceCatalog::from_yaml_str(nan_range),
            Err(SimError::InvalidCatalog(_))
        ));

        let bad_yaml = "devices: [ { port: ttyX, parameters: [ { id: 1, type: dial, name: A } ] } ]";
        assert!(matches!(DeviceCatalog::from_yaml_str(bad_yaml), Err(SimError::Yaml(_))));
    }
}
