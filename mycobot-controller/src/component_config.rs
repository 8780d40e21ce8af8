use crate::resource::{Api, Model, ResourceName};
use serde::{de::Error as _, Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::{convert::TryFrom, fmt, fs, path::Path};
use thiserror::Error;

/// Serial device of the Raspberry Pi's on-board UART
pub const DEFAULT_SERIAL_PATH: &str = "/dev/ttyAMA0";
pub const DEFAULT_BAUD_RATE: u32 = 1_000_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("speed must be between 1 and 100, got {0}")]
    SpeedOutOfRange(f64),
    #[error("{name} must be an integer, got {value}")]
    NotAnInteger { name: &'static str, value: f64 },
    #[error("{0} is required")]
    MissingAttribute(&'static str),
    #[error("invalid attributes: {0}")]
    InvalidAttributes(#[source] serde_json::Error),
    #[error("error while accessing configuration")]
    IoError(#[from] std::io::Error),
    #[error("error while parsing json")]
    JsonError(#[from] serde_json::Error),
    #[error("error while parsing yaml")]
    YamlError(#[from] serde_yaml::Error),
}

type Result<T> = std::result::Result<T, ConfigError>;

/// Motion speed as the vendor SDK understands it, percent of maximum
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "f64", into = "u8")]
pub struct Speed(u8);

impl Speed {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 100;
    pub const DEFAULT: Speed = Speed(20);

    pub fn new(value: u8) -> Result<Speed> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Speed(value))
        } else {
            Err(ConfigError::SpeedOutOfRange(value as f64))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for Speed {
    fn default() -> Self {
        Speed::DEFAULT
    }
}

/// Attribute maps travel as protobuf structs where every number is a double.
/// `20.0` is a valid speed, `20.5` is not.
impl TryFrom<f64> for Speed {
    type Error = ConfigError;

    fn try_from(value: f64) -> Result<Self> {
        if !value.is_finite() || value.fract() != 0.0 {
            return Err(ConfigError::NotAnInteger {
                name: "speed",
                value,
            });
        }
        if value < Self::MIN as f64 || value > Self::MAX as f64 {
            return Err(ConfigError::SpeedOutOfRange(value));
        }
        Ok(Speed(value as u8))
    }
}

impl TryFrom<i64> for Speed {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self> {
        u8::try_from(value)
            .map_err(|_| ConfigError::SpeedOutOfRange(value as f64))
            .and_then(Speed::new)
    }
}

impl From<Speed> for u8 {
    fn from(speed: Speed) -> u8 {
        speed.0
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn default_serial_path() -> String {
    DEFAULT_SERIAL_PATH.to_owned()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn positive_integer<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    if !value.is_finite() || value.fract() != 0.0 || value < 1.0 || value > u32::MAX as f64 {
        return Err(D::Error::custom(format!(
            "expected a positive integer, got {}",
            value
        )));
    }
    Ok(value as u32)
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ArmConfig {
    #[serde(default)]
    pub default_speed: Speed,
    #[serde(default = "default_serial_path")]
    pub serial_path: String,
    #[serde(default = "default_baud_rate", deserialize_with = "positive_integer")]
    pub baud_rate: u32,
}

impl Default for ArmConfig {
    fn default() -> Self {
        ArmConfig {
            default_speed: Speed::DEFAULT,
            serial_path: default_serial_path(),
            baud_rate: DEFAULT_BAUD_RATE,
        }
    }
}

impl ArmConfig {
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<ArmConfig> {
        serde_json::from_value(Value::Object(attributes.clone()))
            .map_err(ConfigError::InvalidAttributes)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GripperConfig {
    /// Name of the sibling arm component driving this gripper
    pub arm_name: String,
    #[serde(default)]
    pub default_speed: Speed,
}

impl GripperConfig {
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<GripperConfig> {
        match attributes.get("arm_name") {
            None | Some(Value::Null) => return Err(ConfigError::MissingAttribute("arm_name")),
            Some(Value::String(name)) if name.trim().is_empty() => {
                return Err(ConfigError::MissingAttribute("arm_name"))
            }
            _ => (),
        }
        serde_json::from_value(Value::Object(attributes.clone()))
            .map_err(ConfigError::InvalidAttributes)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ComponentConfig {
    pub name: String,
    pub api: Api,
    pub model: Model,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    /// Explicit dependencies on top of the ones implied by the attributes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
}

impl ComponentConfig {
    pub fn new(name: &str, api: Api, model: Model) -> ComponentConfig {
        ComponentConfig {
            name: name.to_owned(),
            api,
            model,
            attributes: Map::new(),
            depends_on: vec![],
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> ComponentConfig {
        self.attributes.insert(key.to_owned(), value.into());
        self
    }

    pub fn resource_name(&self) -> ResourceName {
        ResourceName::new(self.api, &self.name)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MachineConfig {
    #[serde(default)]
    pub components: Vec<ComponentConfig>,
}

impl MachineConfig {
    /// myCobot comes with an included machine config.
    ///
    /// This file is packaged with the binary
    /// This method retrieves this included version
    pub fn included() -> Result<MachineConfig> {
        MachineConfig::parse_json(include_str!("../config/mycobot.json"))
    }

    pub fn parse_json(text: &str) -> Result<MachineConfig> {
        let config: MachineConfig = serde_json::from_str(text)?;
        Ok(config)
    }

    pub fn parse_yaml(text: &str) -> Result<MachineConfig> {
        let config: MachineConfig = serde_yaml::from_str(text)?;
        Ok(config)
    }

    pub fn serialize_to_json(&self) -> Result<String> {
        let json = serde_json::to_string_pretty(self)?;
        Ok(json)
    }

    pub fn serialize_to_yaml(&self) -> Result<String> {
        let yaml = serde_yaml::to_string(self)?;
        Ok(yaml)
    }

    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.serialize_to_json()?)?;
        Ok(())
    }

    pub fn save_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        fs::write(path, self.serialize_to_yaml()?)?;
        Ok(())
    }

    pub fn load_json(path: impl AsRef<Path>) -> Result<MachineConfig> {
        let text = fs::read_to_string(path)?;
        MachineConfig::parse_json(&text)
    }

    pub fn load_yaml(path: impl AsRef<Path>) -> Result<MachineConfig> {
        let text = fs::read_to_string(path)?;
        MachineConfig::parse_yaml(&text)
    }

    /// Picks the parser from the file extension, json unless it says yaml
    pub fn load(path: impl AsRef<Path>) -> Result<MachineConfig> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => MachineConfig::load_yaml(path),
            _ => MachineConfig::load_json(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn attributes(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("attributes must be an object"),
        }
    }

    #[test]
    fn arm_defaults_when_empty() {
        let config = ArmConfig::from_attributes(&Map::new()).unwrap();
        assert_eq!(config, ArmConfig::default());
        assert_eq!(config.default_speed.get(), 20);
        assert_eq!(config.serial_path, "/dev/ttyAMA0");
        assert_eq!(config.baud_rate, 1_000_000);
    }

    #[test]
    fn arm_accepts_integral_float_speed() {
        let config = ArmConfig::from_attributes(&attributes(json!({"default_speed": 55.0}))).unwrap();
        assert_eq!(config.default_speed.get(), 55);
    }

    #[test]
    fn arm_accepts_speed_bounds() {
        for speed in [1_u8, 100] {
            let config =
                ArmConfig::from_attributes(&attributes(json!({ "default_speed": speed }))).unwrap();
            assert_eq!(config.default_speed.get(), speed);
        }
    }

    #[test]
    fn arm_rejects_speed_out_of_range() {
        for speed in [-20.0, -1.0, 0.0, 101.0, 255.0, 1000.0] {
            let result = ArmConfig::from_attributes(&attributes(json!({ "default_speed": speed })));
            assert!(result.is_err(), "speed {} was accepted", speed);
        }
    }

    #[test]
    fn arm_rejects_fractional_speed() {
        let result = ArmConfig::from_attributes(&attributes(json!({"default_speed": 20.5})));
        assert!(result.is_err());
    }

    #[test]
    fn arm_rejects_string_speed() {
        let result = ArmConfig::from_attributes(&attributes(json!({"default_speed": "20"})));
        assert!(matches!(result, Err(ConfigError::InvalidAttributes(_))));
    }

    #[test]
    fn arm_ignores_unknown_attributes() {
        let config =
            ArmConfig::from_attributes(&attributes(json!({"color": "blue", "default_speed": 30})))
                .unwrap();
        assert_eq!(config.default_speed.get(), 30);
    }

    #[test]
    fn arm_reads_serial_settings() {
        let config = ArmConfig::from_attributes(&attributes(
            json!({"serial_path": "/dev/ttyUSB0", "baud_rate": 115200.0}),
        ))
        .unwrap();
        assert_eq!(config.serial_path, "/dev/ttyUSB0");
        assert_eq!(config.baud_rate, 115_200);
    }

    #[test]
    fn arm_rejects_zero_baud_rate() {
        let result = ArmConfig::from_attributes(&attributes(json!({"baud_rate": 0})));
        assert!(result.is_err());
    }

    #[test]
    fn gripper_requires_arm_name() {
        let result = GripperConfig::from_attributes(&attributes(json!({"default_speed": 20})));
        assert!(matches!(
            result,
            Err(ConfigError::MissingAttribute("arm_name"))
        ));
    }

    #[test]
    fn gripper_rejects_blank_arm_name() {
        let result = GripperConfig::from_attributes(&attributes(json!({"arm_name": "  "})));
        assert!(matches!(
            result,
            Err(ConfigError::MissingAttribute("arm_name"))
        ));
    }

    #[test]
    fn gripper_defaults_speed() {
        let config = GripperConfig::from_attributes(&attributes(json!({"arm_name": "arm"}))).unwrap();
        assert_eq!(config.arm_name, "arm");
        assert_eq!(config.default_speed, Speed::DEFAULT);
    }

    #[test]
    fn gripper_rejects_speed_out_of_range() {
        for speed in [0, 101] {
            let result = GripperConfig::from_attributes(&attributes(
                json!({"arm_name": "arm", "default_speed": speed}),
            ));
            assert!(result.is_err(), "speed {} was accepted", speed);
        }
    }

    #[test]
    fn speed_from_integer() {
        assert_eq!(Speed::try_from(42_i64).unwrap().get(), 42);
        assert!(Speed::try_from(0_i64).is_err());
        assert!(Speed::try_from(300_i64).is_err());
        assert!(Speed::try_from(-5_i64).is_err());
    }

    #[test]
    fn check_included() {
        let config = MachineConfig::included().unwrap();
        assert_eq!(config.components.len(), 2);
    }

    #[test]
    fn serialize_to_json() {
        let config = MachineConfig::included().unwrap();
        let json = config.serialize_to_json().unwrap();
        let parsed_config = MachineConfig::parse_json(&json).unwrap();
        assert_eq!(config, parsed_config);
    }

    #[test]
    fn parse_from_yaml() {
        let yaml = r#"
components:
  - name: arm
    api: rdk:component:arm
    model: hipsterbrown:arm:mycobot280
    attributes:
      default_speed: 40
"#;
        let config = MachineConfig::parse_yaml(yaml).unwrap();
        assert_eq!(config.components.len(), 1);
        let arm = &config.components[0];
        assert_eq!(arm.api, Api::Arm);
        assert_eq!(arm.attributes.get("default_speed"), Some(&json!(40)));
    }

    #[test]
    fn load_picks_parser_from_extension() {
        let dir = tempfile::tempdir().unwrap();
        let config = MachineConfig::included().unwrap();

        let yaml_path = dir.path().join("machine.yaml");
        config.save_yaml(&yaml_path).unwrap();
        assert_eq!(MachineConfig::load(&yaml_path).unwrap(), config);

        let json_path = dir.path().join("machine.json");
        config.save_json(&json_path).unwrap();
        assert_eq!(MachineConfig::load(&json_path).unwrap(), config);
    }

    #[test]
    fn component_without_attributes() {
        let json = r#"{"name": "arm", "api": "rdk:component:arm", "model": "hipsterbrown:arm:mycobot280"}"#;
        let config: ComponentConfig = serde_json::from_str(json).unwrap();
        assert!(config.attributes.is_empty());
        assert!(config.depends_on.is_empty());
    }
}
