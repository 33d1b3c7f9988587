//! Profile photo resolution.

pub mod placeholder;
pub mod resolver;

use base64::Engine;
use serde::Serialize;

pub use placeholder::Placeholder;
pub use resolver::{PhotoSlot, ProfileImageResolver};

/// An image must be larger than this to count; bodies of this size or less
/// are error stubs, whatever their content-type.
pub const MIN_IMAGE_BYTES: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoImage {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoImage {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type,
            base64::engine::general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    /// Extension matching the content-type, for saving to disk.
    pub fn extension(&self) -> &'static str {
        match self.content_type.as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

/// What the presentation layer shows. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileImage {
    Photo(PhotoImage),
    Placeholder(Placeholder),
}

impl ProfileImage {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, ProfileImage::Placeholder(_))
    }

    pub fn data_uri(&self) -> String {
        match self {
            ProfileImage::Photo(photo) => photo.data_uri(),
            ProfileImage::Placeholder(placeholder) => placeholder.data_uri(),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
enum ProfileImageRepr<'a> {
    Photo { src: String },
    Placeholder {
        src: String,
        #[serde(flatten)]
        placeholder: &'a Placeholder,
    },
}

impl Serialize for ProfileImage {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            ProfileImage::Photo(photo) => ProfileImageRepr::Photo {
                src: photo.data_uri(),
            },
            ProfileImage::Placeholder(placeholder) => ProfileImageRepr::Placeholder {
                src: placeholder.data_uri(),
                placeholder,
            },
        };
        repr.serialize(serializer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_photo_data_uri() {
        let photo = PhotoImage {
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };
        assert_eq!(photo.data_uri(), "data:image/png;base64,AQID");
        assert_eq!(photo.extension(), "png");
    }

    #[test]
    fn test_placeholder_serializes_with_initials() {
        let image = ProfileImage::Placeholder(Placeholder::for_name("Asha Rao"));
        let value = serde_json::to_value(&image).unwrap();
        assert_eq!(value["kind"], "placeholder");
        assert_eq!(value["initials"], "AR");
        assert!(value["src"].as_str().unwrap().starts_with("data:image/svg+xml"));
    }
}
