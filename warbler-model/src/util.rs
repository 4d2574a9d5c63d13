/// Snowflake-style identifiers ride as strings (a raw u64 overflows the
/// number type of JSON-reading peers), while lenient parsing accepts either
/// form on the way in.
pub(crate) mod json_safe_u64 {
    use serde::de::{Deserializer, Error};
    use serde::ser::Serializer;
    use serde::Deserialize;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber<'a> {
        Text(&'a str),
        Int(u64),
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::Text(s) => s.parse().map_err(D::Error::custom),
            StringOrNumber::Int(n) => Ok(n),
        }
    }

    pub fn serialize<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(value)
    }
}
