use strum_macros::EnumIter;

/// Semantic category of a sensor unit string
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum UnitClass {
    /// Temperatures, reported as "degrees C"
    Temperature,

    /// Voltages, reported as "Volts"
    Voltage,

    /// Currents, reported as "Amps"
    Current,

    /// Power draw, reported as "Watts"
    Power,

    /// Fan speeds, reported as "RPM"
    Rotation,

    /// Ratios, reported as "%"
    Percent,

    /// Anything else, kept as-is in the reports
    Unknown,
}

impl UnitClass {
    /// Classifies a free-text unit string as reported by the sensor utility.
    ///
    /// Matching is case-insensitive and ignores extra whitespace. Unit strings
    /// outside the known set are not an error, they classify as [`UnitClass::Unknown`].
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_ipmi_monitor::UnitClass;
    ///
    /// assert_eq!(UnitClass::classify("degrees C"), UnitClass::Temperature);
    /// assert_eq!(UnitClass::classify("VOLTS"), UnitClass::Voltage);
    /// assert_eq!(UnitClass::classify("CFM"), UnitClass::Unknown);
    /// ```
    pub fn classify(unit: &str) -> UnitClass {
        let unit = unit.to_lowercase();
        let unit = unit.split_whitespace().collect::<Vec<_>>().join(" ");

        match unit.as_str() {
            "degrees c" => UnitClass::Temperature,
            "volts" => UnitClass::Voltage,
            "amps" => UnitClass::Current,
            "watts" => UnitClass::Power,
            "rpm" => UnitClass::Rotation,
            "%" => UnitClass::Percent,
            _ => UnitClass::Unknown,
        }
    }

    /// Device class helps Home Assistant to know how to interpret the reported values.
    ///
    /// Fan speeds, ratios and unknown units have no device class.
    ///
    /// See <https://www.home-assistant.io/integrations/sensor#device-class> for possible values here
    pub fn device_class(&self) -> Option<&'static str> {
        match self {
            UnitClass::Temperature => Some("temperature"),
            UnitClass::Voltage => Some("voltage"),
            UnitClass::Current => Some("current"),
            UnitClass::Power => Some("power"),
            UnitClass::Rotation | UnitClass::Percent | UnitClass::Unknown => None,
        }
    }

    /// Display unit shown by Home Assistant, or `None` for unknown units
    /// which keep the utility's own unit text.
    pub fn unit_of_measurement(&self) -> Option<&'static str> {
        match self {
            UnitClass::Temperature => Some("°C"),
            UnitClass::Voltage => Some("V"),
            UnitClass::Current => Some("A"),
            UnitClass::Power => Some("W"),
            UnitClass::Rotation => Some("RPM"),
            UnitClass::Percent => Some("%"),
            UnitClass::Unknown => None,
        }
    }
}

/// One sensor reading parsed from a line of utility output
///
/// A reading without a value is still a valid sensor definition: it is
/// announced to Home Assistant but produces no state report until the
/// utility reports a number for it.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    /// Sensor label as reported by the utility
    pub name: String,

    /// Numeric reading, or `None` when the utility reports no reading ("na")
    pub value: Option<f64>,

    /// Unit text as reported by the utility
    pub unit_raw: String,

    /// Semantic category derived from the unit text
    pub unit_class: UnitClass,
}

impl SensorReading {
    /// Parses one line of `ipmitool sensor` output.
    ///
    /// Lines are pipe-delimited with the sensor name, the value and the unit
    /// in the first three columns; the status and threshold columns are
    /// ignored. Header lines, separators, blank lines and rows without a
    /// name are not data rows and return `None`.
    ///
    /// ## Example
    ///
    /// ```
    /// use mqtt_ipmi_monitor::{SensorReading, UnitClass};
    ///
    /// let reading = SensorReading::parse_line("CPU1 Temp | 45.000 | degrees C | ok")
    ///     .expect("Not a data row");
    ///
    /// assert_eq!(reading.name, "CPU1 Temp");
    /// assert_eq!(reading.value, Some(45.0));
    /// assert_eq!(reading.unit_class, UnitClass::Temperature);
    /// ```
    pub fn parse_line(line: &str) -> Option<SensorReading> {
        let fields: Vec<&str> = line.split('|').map(str::trim).collect();
        if fields.len() < 3 {
            return None;
        }

        let name = fields[0];
        if name.is_empty() {
            return None;
        }

        Some(SensorReading {
            name: name.to_string(),
            value: fields[1].parse().ok(),
            unit_raw: fields[2].to_string(),
            unit_class: UnitClass::classify(fields[2]),
        })
    }

    /// State payload body for this reading, or `None` when there is no value.
    ///
    /// Integral values keep one decimal so that a temperature of 45 reports
    /// as `45.0`.
    pub fn state_payload(&self) -> Option<String> {
        self.value.map(|value| {
            if value.fract() == 0.0 {
                format!("{value:.1}")
            } else {
                value.to_string()
            }
        })
    }
}

/// Parses all data rows out of the raw utility output.
pub fn parse_output(output: &str) -> Vec<SensorReading> {
    output.lines().filter_map(SensorReading::parse_line).collect()
}
