use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into() }
    }
}

/// Body returned when the external detector exits unsuccessfully.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ProcessingErrorResponse {
    pub message: String,
    pub error: String,
    pub output: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HealthResponse {
    pub status: String,
    pub pending_results: usize,
}

/// One row of the detector's predictions table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Prediction {
    pub filename: String,
    pub label: String,
    pub confidence: f32,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum ImageExtension {
    Jpg,
    Jpeg,
    Png,
    Gif,
}

impl ImageExtension {
    /// Extension after the last `.` of `filename`, if it is on the allow-list.
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        ext.parse().ok()
    }

    pub fn allowed() -> String {
        Self::iter()
            .map(|ext| ext.to_string().to_uppercase())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(ImageExtension::from_filename("a.JPG"), Some(ImageExtension::Jpg));
        assert_eq!(ImageExtension::from_filename("a.b.JpEg"), Some(ImageExtension::Jpeg));
        assert_eq!(ImageExtension::from_filename("x.png"), Some(ImageExtension::Png));
        assert_eq!(ImageExtension::from_filename("x.gif"), Some(ImageExtension::Gif));
    }

    #[test]
    fn extension_rejects_unknown_or_missing() {
        assert_eq!(ImageExtension::from_filename("photo.bmp"), None);
        assert_eq!(ImageExtension::from_filename("jpg"), None);
        assert_eq!(ImageExtension::from_filename("archive.jpg.exe"), None);
        assert_eq!(ImageExtension::from_filename("trailing."), None);
    }

    #[test]
    fn allowed_lists_every_extension() {
        assert_eq!(ImageExtension::allowed(), "JPG, JPEG, PNG, GIF");
    }
}
