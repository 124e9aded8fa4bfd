use super::ConfigError;
use serde::{Deserialize, Deserializer, Serializer};

/// Parse a byte size such as `10485760`, `"512KB"`, `"10MB"` or `"1GB"`.
///
/// Units are binary multiples and case-insensitive; `KiB` style suffixes are
/// accepted too.
pub fn parse_size(input: &str) -> Result<u64, String> {
    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (digits, unit) = trimmed.split_at(split);

    let value: u64 = digits
        .parse()
        .map_err(|_| format!("invalid size '{input}'"))?;
    let multiplier: u64 = match unit.trim().to_ascii_uppercase().as_str() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        other => return Err(format!("unknown size unit '{other}' in '{input}'")),
    };

    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size '{input}' is too large"))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum SizeRepr {
    Bytes(u64),
    Text(String),
}

impl SizeRepr {
    fn into_bytes<E: serde::de::Error>(self) -> Result<u64, E> {
        match self {
            SizeRepr::Bytes(bytes) => Ok(bytes),
            SizeRepr::Text(text) => parse_size(&text).map_err(E::custom),
        }
    }
}

/// `#[serde(with = "byte_size")]` for `u64` sizes written as numbers or strings.
pub mod byte_size {
    use super::*;

    pub fn serialize<S>(bytes: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(*bytes)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        SizeRepr::deserialize(deserializer)?.into_bytes()
    }
}

/// Same as [`byte_size`] for `Option<u64>`.
pub mod opt_byte_size {
    use super::*;

    pub fn serialize<S>(bytes: &Option<u64>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match bytes {
            Some(bytes) => serializer.serialize_some(bytes),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<SizeRepr>::deserialize(deserializer)?
            .map(SizeRepr::into_bytes)
            .transpose()
    }
}

/// Helper function to load and parse an environment variable.
/// Returns Ok(()) if the variable doesn't exist (keeps default).
pub fn load_env_var<T>(name: &str, target: &mut T) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        *target = value
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Like [`load_env_var`] for an optional target.
pub fn load_env_var_opt<T>(name: &str, target: &mut Option<T>) -> Result<(), ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    if let Ok(value) = std::env::var(name) {
        let parsed = value
            .parse()
            .map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
        *target = Some(parsed);
    }
    Ok(())
}

/// Load a byte size (`"10MB"`, `1048576`, ...) from the environment.
pub fn load_env_size(name: &str, target: &mut u64) -> Result<(), ConfigError> {
    if let Ok(value) = std::env::var(name) {
        *target = parse_size(&value).map_err(|e| ConfigError::EnvError(format!("Invalid {name}: {e}")))?;
    }
    Ok(())
}

/// Helper function to load a string environment variable.
pub fn load_env_string(name: &str, target: &mut String) {
    if let Ok(value) = std::env::var(name) {
        *target = value;
    }
}

/// Helper function to load a PathBuf environment variable.
pub fn load_env_path(name: &str, target: &mut std::path::PathBuf) {
    if let Ok(value) = std::env::var(name) {
        *target = std::path::PathBuf::from(value);
    }
}
