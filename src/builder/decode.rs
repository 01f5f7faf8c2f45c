// ABOUTME: Structured decoder turning rendered YAML into a caller-supplied destination
// ABOUTME: Reads only the first document of the rendered stream

use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::error::{BuilderError, Result};

/// Decode the first YAML document of `text` into `destination`.
///
/// On error the destination is left untouched; callers must still treat the
/// build as failed.
pub fn decode<T>(text: &str, destination: &mut T) -> Result<()>
where
    T: DeserializeOwned,
{
    let document = serde_yaml::Deserializer::from_str(text)
        .next()
        .ok_or(BuilderError::EmptyDocument)?;

    *destination = T::deserialize(document)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[derive(Debug, Default, PartialEq, Deserialize)]
    struct Route {
        name: String,
        #[serde(default)]
        weight: u32,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[test]
    fn test_decode_typed_record() {
        let mut route = Route::default();
        decode("name: GET\nweight: 3\ntags:\n  - a\n  - b\n", &mut route).unwrap();

        assert_eq!(
            route,
            Route {
                name: "GET".to_string(),
                weight: 3,
                tags: vec!["a".to_string(), "b".to_string()],
            }
        );
    }

    #[test]
    fn test_decode_into_map() {
        let mut map: BTreeMap<String, serde_yaml::Value> = BTreeMap::new();
        decode("a: 1\nb: [x, y]\n", &mut map).unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(map["a"], serde_yaml::Value::from(1));
    }

    #[test]
    fn test_decode_reads_first_document_only() {
        let mut route = Route::default();
        decode("name: first\n---\nname: second\n", &mut route).unwrap();
        assert_eq!(route.name, "first");
    }

    #[test]
    fn test_decode_shape_mismatch() {
        let mut route = Route::default();
        let err = decode("- just\n- a list\n", &mut route).unwrap_err();
        assert!(matches!(err, BuilderError::DecodeError(_)));
    }

    #[test]
    fn test_decode_syntax_error() {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        assert!(decode("a: [unclosed\n", &mut map).is_err());
    }

    #[test]
    fn test_decode_empty_output() {
        let mut map: BTreeMap<String, String> = BTreeMap::new();
        assert!(decode("", &mut map).is_err());
    }
}
