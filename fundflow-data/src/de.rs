use serde::Deserialize;

/// Deserialize a numeric string (eg/ `"16578.50"`) as an `f64`.
pub fn de_str_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::de::Deserializer<'de>,
{
    let raw = <&str>::deserialize(deserializer)?;
    raw.trim().parse::<f64>().map_err(serde::de::Error::custom)
}
