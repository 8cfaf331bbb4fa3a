//! Line protocol for feeding the node from a sensor driver.
//!
//! One line per input:
//!
//! ```text
//! temperature,21.5,C,3      reading: sensor_type,value,unit,endpoint_id
//! !sync                     short press of the sync button
//! !sync-all                 long press: sync every pending reading
//! !status                   log a status snapshot
//! ```
//!
//! Blank lines and lines starting with `#` are ignored.

use std::str::FromStr;

/// One parsed input line.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Reading {
        sensor_type: String,
        value: f64,
        unit: String,
        endpoint_id: i64,
    },
    SyncButton {
        long_press: bool,
    },
    Status,
}

/// Why a line was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IngestError {
    #[error("expected 4 fields (sensor_type,value,unit,endpoint_id), got {0}")]
    FieldCount(usize),
    #[error("sensor type cannot be empty")]
    EmptySensorType,
    #[error("invalid value '{0}'")]
    Value(String),
    #[error("invalid endpoint id '{0}'")]
    EndpointId(String),
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
}

/// Parse one line; `Ok(None)` for lines to skip.
pub fn parse_line(line: &str) -> Result<Option<Input>, IngestError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    if let Some(command) = line.strip_prefix('!') {
        return match command.trim() {
            "sync" => Ok(Some(Input::SyncButton { long_press: false })),
            "sync-all" => Ok(Some(Input::SyncButton { long_press: true })),
            "status" => Ok(Some(Input::Status)),
            other => Err(IngestError::UnknownCommand(other.to_string())),
        };
    }
    line.parse().map(Some)
}

impl FromStr for Input {
    type Err = IngestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(',').map(str::trim).collect();
        let [sensor_type, value, unit, endpoint_id] = fields[..] else {
            return Err(IngestError::FieldCount(fields.len()));
        };

        if sensor_type.is_empty() {
            return Err(IngestError::EmptySensorType);
        }
        let value = value
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| IngestError::Value(value.to_string()))?;
        let endpoint_id = endpoint_id
            .parse::<i64>()
            .map_err(|_| IngestError::EndpointId(endpoint_id.to_string()))?;

        Ok(Input::Reading {
            sensor_type: sensor_type.to_string(),
            value,
            unit: unit.to_string(),
            endpoint_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reading() {
        assert_eq!(
            parse_line(" temperature, 21.5 ,C,3\n").unwrap(),
            Some(Input::Reading {
                sensor_type: "temperature".to_string(),
                value: 21.5,
                unit: "C".to_string(),
                endpoint_id: 3,
            })
        );
    }

    #[test]
    fn test_parse_commands_and_skips() {
        assert_eq!(
            parse_line("!sync-all").unwrap(),
            Some(Input::SyncButton { long_press: true })
        );
        assert_eq!(parse_line("!status").unwrap(), Some(Input::Status));
        assert_eq!(parse_line("   ").unwrap(), None);
        assert_eq!(parse_line("# comment").unwrap(), None);
        assert!(matches!(
            parse_line("!reboot"),
            Err(IngestError::UnknownCommand(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(parse_line("co2,800,ppm"), Err(IngestError::FieldCount(3)));
        assert_eq!(parse_line(",1,C,1"), Err(IngestError::EmptySensorType));
        assert_eq!(
            parse_line("co2,NaN,ppm,1"),
            Err(IngestError::Value("NaN".to_string()))
        );
        assert_eq!(
            parse_line("co2,800,ppm,x"),
            Err(IngestError::EndpointId("x".to_string()))
        );
    }
}
