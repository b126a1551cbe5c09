//! Wire types exchanged with the gallery data service.
//!
//! Requests and responses derive serde so they can be proxied between
//! processes as JSON.

use std::fmt::Display;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Correlation id issued by the data service.
pub type RequestId = u64;

/// Returned by `submit` when the request could not be sent.
pub const NULL_REQUEST_ID: RequestId = 0;

/// Identifies an art object across the collections the service knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArtObjectId {
    /// Object from the Metropolitan Museum of Art open access collection
    Met(i64),
    /// Object from Wikidata, by Q-number
    Wikidata(i64),
}

impl ArtObjectId {
    /// Public page for this object.
    pub fn url(&self) -> String {
        match self {
            ArtObjectId::Met(id) => {
                format!("https://www.metmuseum.org/art/collection/search/{id}")
            }
            ArtObjectId::Wikidata(qid) => format!("https://www.wikidata.org/wiki/Q{qid}"),
        }
    }
}

impl Display for ArtObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ArtObjectId::Met(id) => write!(f, "met:{id}"),
            ArtObjectId::Wikidata(qid) => write!(f, "Q{qid}"),
        }
    }
}

/// Resolution tier of a fetched image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageSize {
    Small,
    Large,
}

impl Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSize::Small => write!(f, "small"),
            ImageSize::Large => write!(f, "large"),
        }
    }
}

/// An art object placed on a gallery wall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub object_id: ArtObjectId,
    pub title: String,
    pub artist: String,
    pub medium: String,
    pub date: String,
    pub collection: String,
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

/// A request to the data service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RequestKind {
    FetchImage {
        object_id: ArtObjectId,
        size: ImageSize,
    },
    CountObjects {
        filter: Option<String>,
    },
    ObjectsForWall {
        gallery_id: i64,
        wall_id: String,
    },
    Layout {
        walls_json: String,
        filter: Option<String>,
        dense: bool,
    },
    /// Fire-and-forget; the service sends no response.
    MoveArtObject {
        object_id: ArtObjectId,
        gallery_id: i64,
        wall_id: String,
        x: f64,
        y: f64,
    },
    Migrate,
    /// Replace the placements in galleries with non-positive ids, which hold
    /// hand-arranged walls that automatic layout leaves alone.
    ImportNonPositiveLayout {
        json_content: String,
    },
    /// Placements in galleries with non-positive ids, as JSON.
    ExportNonPositiveLayout,
}

impl RequestKind {
    /// Short name used in log messages.
    pub fn name(&self) -> &'static str {
        match self {
            RequestKind::FetchImage { .. } => "fetch_image",
            RequestKind::CountObjects { .. } => "count_objects",
            RequestKind::ObjectsForWall { .. } => "objects_for_wall",
            RequestKind::Layout { .. } => "layout",
            RequestKind::MoveArtObject { .. } => "move_art_object",
            RequestKind::Migrate => "migrate",
            RequestKind::ImportNonPositiveLayout { .. } => "import_non_positive_layout",
            RequestKind::ExportNonPositiveLayout => "export_non_positive_layout",
        }
    }

    /// Whether the service answers this request.
    pub fn expects_response(&self) -> bool {
        !matches!(self, RequestKind::MoveArtObject { .. })
    }
}

/// Payload of a response; its shape depends on the request kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResponseBody {
    Objects(Vec<ObjectRecord>),
    Integer(i64),
    Image(Option<PathBuf>),
    Json(String),
    Empty,
}

impl ResponseBody {
    /// Short name used in log messages.
    pub fn shape(&self) -> &'static str {
        match self {
            ResponseBody::Objects(_) => "objects",
            ResponseBody::Integer(_) => "integer",
            ResponseBody::Image(_) => "image",
            ResponseBody::Json(_) => "json",
            ResponseBody::Empty => "empty",
        }
    }
}

/// A response tagged with the id of the request it answers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub request_id: RequestId,
    pub body: ResponseBody,
}

/// Empty filters mean "no filter".
pub fn to_optional_filter(filter: &str) -> Option<String> {
    if filter.is_empty() {
        None
    } else {
        Some(filter.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_urls() {
        assert_eq!(
            ArtObjectId::Met(436535).url(),
            "https://www.metmuseum.org/art/collection/search/436535"
        );
        assert_eq!(
            ArtObjectId::Wikidata(12418).url(),
            "https://www.wikidata.org/wiki/Q12418"
        );
    }

    #[test]
    fn test_image_size_display() {
        assert_eq!(ImageSize::Small.to_string(), "small");
        assert_eq!(ImageSize::Large.to_string(), "large");
    }

    #[test]
    fn test_move_is_fire_and_forget() {
        let kind = RequestKind::MoveArtObject {
            object_id: ArtObjectId::Met(1),
            gallery_id: 2,
            wall_id: "north".to_string(),
            x: 0.5,
            y: 1.0,
        };
        assert!(!kind.expects_response());
        assert!(RequestKind::Migrate.expects_response());
        assert!(RequestKind::ExportNonPositiveLayout.expects_response());
    }

    #[test]
    fn test_layout_transfer_names() {
        let import = RequestKind::ImportNonPositiveLayout {
            json_content: "[]".to_string(),
        };
        assert_eq!(import.name(), "import_non_positive_layout");
        assert_eq!(
            RequestKind::ExportNonPositiveLayout.name(),
            "export_non_positive_layout"
        );
        assert_eq!(ResponseBody::Json("[]".to_string()).shape(), "json");
    }

    #[test]
    fn test_empty_filter_is_none() {
        assert_eq!(to_optional_filter(""), None);
        assert_eq!(
            to_optional_filter("artist:Vermeer"),
            Some("artist:Vermeer".to_string())
        );
    }

    #[test]
    fn test_request_json_shape() {
        let kind = RequestKind::FetchImage {
            object_id: ArtObjectId::Met(42),
            size: ImageSize::Small,
        };
        let json = serde_json::to_string(&kind).unwrap();
        let parsed: RequestKind = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, kind);
        assert!(json.contains("FetchImage"));
    }
}
