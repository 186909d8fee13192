//! Typed view over a single metadata object.
//!
//! Every object carries a `_pbtype` tag. Only the tags the scanner and the
//! index care about get a dedicated variant; the rest pass through as
//! [`Object::Other`].

use serde_json::{Map, Value};

/// Type tag of an image placed on a slide.
pub const IMAGE_ARCHIVE: &str = "TSD.ImageArchive";
/// Type tag of a slide style (background fill).
pub const SLIDE_STYLE_ARCHIVE: &str = "KN.SlideStyleArchive";
/// Type tag of the document root carrying the slide size.
pub const SHOW_ARCHIVE: &str = "KN.ShowArchive";
/// Type tag of the package metadata listing all data files.
pub const PACKAGE_METADATA: &str = "TSP.PackageMetadata";

const TYPE_KEY: &str = "_pbtype";

/// Width and height in points, rounded up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Parse `{ "width": .., "height": .. }`. Non-positive sizes are treated as unknown.
    fn from_value(value: &Value) -> Option<Self> {
        let width = value.get("width")?.as_f64()?;
        let height = value.get("height")?.as_f64()?;
        if !(width > 0.0 && height > 0.0) || !width.is_finite() || !height.is_finite() {
            return None;
        }
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let size = Self::new(width.ceil() as u32, height.ceil() as u32);
        Some(size)
    }
}

/// Fill of a slide style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fill {
    /// Image fill; the identifier may still be missing.
    Image { identifier: Option<u64> },
    /// Color, gradient or anything that is not an image.
    Other,
}

/// One `datas` entry of the package metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataEntry {
    pub identifier: Option<u64>,
    pub file_name: Option<String>,
    pub size: Option<u64>,
}

/// A metadata object, classified by its type tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Image {
        identifier: Option<u64>,
        display: Option<Size>,
    },
    SlideStyle {
        fill: Option<Fill>,
    },
    Show {
        size: Option<Size>,
    },
    PackageMetadata {
        datas: Vec<DataEntry>,
    },
    Other {
        pbtype: Option<String>,
    },
}

impl Object {
    /// Classify a raw JSON object.
    pub fn from_map(map: &Map<String, Value>) -> Self {
        let pbtype = map.get(TYPE_KEY).and_then(Value::as_str);
        match pbtype {
            Some(IMAGE_ARCHIVE) => Self::Image {
                identifier: lookup(map, &["data", "identifier"]).and_then(identifier),
                display: lookup(map, &["super", "geometry", "size"]).and_then(Size::from_value),
            },
            Some(SLIDE_STYLE_ARCHIVE) => Self::SlideStyle {
                fill: lookup(map, &["slideProperties", "fill"]).map(fill),
            },
            Some(SHOW_ARCHIVE) => Self::Show {
                size: map.get("size").and_then(Size::from_value),
            },
            Some(PACKAGE_METADATA) => Self::PackageMetadata {
                datas: map
                    .get("datas")
                    .and_then(Value::as_array)
                    .map(|datas| datas.iter().map(data_entry).collect())
                    .unwrap_or_default(),
            },
            other => Self::Other {
                pbtype: other.map(str::to_string),
            },
        }
    }

    /// Type tag this object was classified from.
    pub fn pbtype(&self) -> Option<&str> {
        match self {
            Self::Image { .. } => Some(IMAGE_ARCHIVE),
            Self::SlideStyle { .. } => Some(SLIDE_STYLE_ARCHIVE),
            Self::Show { .. } => Some(SHOW_ARCHIVE),
            Self::PackageMetadata { .. } => Some(PACKAGE_METADATA),
            Self::Other { pbtype } => pbtype.as_deref(),
        }
    }
}

/// Follow a key path through nested objects.
fn lookup<'a>(map: &'a Map<String, Value>, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter().try_fold(map.get(*first)?, |value, key| value.get(key))
}

/// Identifiers are 64-bit and may be serialized as numbers or decimal strings.
fn identifier(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn fill(value: &Value) -> Fill {
    match value.get("image") {
        Some(image) => Fill::Image {
            identifier: image
                .get("imagedata")
                .and_then(|data| data.get("identifier"))
                .and_then(identifier),
        },
        None => Fill::Other,
    }
}

fn data_entry(value: &Value) -> DataEntry {
    DataEntry {
        identifier: value.get("identifier").and_then(identifier),
        file_name: value
            .get("fileName")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .map(str::to_string),
        size: value.get("size").and_then(identifier),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(value: Value) -> Object {
        Object::from_map(value.as_object().unwrap())
    }

    #[test]
    fn test_image_archive() {
        let object = classify(json!({
            "_pbtype": "TSD.ImageArchive",
            "super": { "geometry": { "size": { "width": 320.4, "height": 200 } } },
            "data": { "identifier": 7 }
        }));
        assert_eq!(
            object,
            Object::Image {
                identifier: Some(7),
                display: Some(Size::new(321, 200)),
            }
        );
    }

    #[test]
    fn test_identifier_as_string() {
        let object = classify(json!({
            "_pbtype": "TSD.ImageArchive",
            "data": { "identifier": "18446744073709551615" }
        }));
        assert_eq!(
            object,
            Object::Image {
                identifier: Some(u64::MAX),
                display: None,
            }
        );
    }

    #[test]
    fn test_slide_style_color_fill() {
        let object = classify(json!({
            "_pbtype": "KN.SlideStyleArchive",
            "slideProperties": { "fill": { "color": { "r": 1.0 } } }
        }));
        assert_eq!(object, Object::SlideStyle { fill: Some(Fill::Other) });
    }

    #[test]
    fn test_slide_style_image_fill() {
        let object = classify(json!({
            "_pbtype": "KN.SlideStyleArchive",
            "slideProperties": { "fill": { "image": { "imagedata": { "identifier": 12 } } } }
        }));
        assert_eq!(
            object,
            Object::SlideStyle {
                fill: Some(Fill::Image { identifier: Some(12) })
            }
        );
    }

    #[test]
    fn test_slide_style_without_fill() {
        let object = classify(json!({ "_pbtype": "KN.SlideStyleArchive" }));
        assert_eq!(object, Object::SlideStyle { fill: None });
    }

    #[test]
    fn test_package_metadata() {
        let object = classify(json!({
            "_pbtype": "TSP.PackageMetadata",
            "datas": [
                { "identifier": 1, "fileName": "a.png", "size": 10 },
                { "identifier": 2, "fileName": "" }
            ]
        }));
        let Object::PackageMetadata { datas } = object else {
            panic!("expected package metadata");
        };
        assert_eq!(datas[0].file_name.as_deref(), Some("a.png"));
        assert_eq!(datas[0].size, Some(10));
        assert_eq!(datas[1].file_name, None);
    }

    #[test]
    fn test_unknown_and_untagged() {
        assert_eq!(
            classify(json!({ "_pbtype": "TSWP.StorageArchive" })).pbtype(),
            Some("TSWP.StorageArchive")
        );
        assert_eq!(classify(json!({ "text": "x" })), Object::Other { pbtype: None });
    }

    #[test]
    fn test_invalid_size_is_unknown() {
        let object = classify(json!({
            "_pbtype": "KN.ShowArchive",
            "size": { "width": 0, "height": 768 }
        }));
        assert_eq!(object, Object::Show { size: None });
    }
}
