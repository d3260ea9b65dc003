use serde::{Serialize, Deserialize};
use serde_with::{serde_as, skip_serializing_none, NoneAsEmptyString};
use std::{fmt, str::FromStr};

/// Sentinel option value that unlocks the paired "custom" free-text field.
pub const OTHER: &str = "other";
/// Embellishment option meaning "no embellishments at all".
pub const NONE: &str = "none";
pub const YES: &str = "yes";
pub const NO: &str = "no";
/// Fabric option that unlocks the custom fabric image sub-flow.
pub const CUSTOM_FABRIC: &str = "customFabric";

/// Where a client-supplied fabric image should be applied on the dress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FabricPlacement {
    Full,
    Bodice,
    Skirt,
    Sleeves,
    Custom,
}

impl FabricPlacement {
    pub const ALL: [FabricPlacement; 5] = [Self::Full, Self::Bodice, Self::Skirt, Self::Sleeves, Self::Custom];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Bodice => "bodice",
            Self::Skirt => "skirt",
            Self::Sleeves => "sleeves",
            Self::Custom => "custom",
        }
    }
}

impl fmt::Display for FabricPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for FabricPlacement {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| format!("unknown fabric placement '{s}'"))
    }
}

/// Every questionnaire response, accumulated across the wizard's lifetime.
///
/// Wire names are camelCase so the record round-trips unchanged between the
/// browser, the durable snapshot and the relay endpoints. Single-choice and
/// yes/no fields use the empty string for "not answered yet".
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnswerAggregate {
    pub dress_type: String,
    pub dress_type_custom: Option<String>,
    pub dress_length: String,
    pub dress_length_custom: Option<String>,

    pub skirt_shape: String,
    pub skirt_shape_custom: Option<String>,

    pub neckline_type: String,
    pub neckline_type_custom: Option<String>,
    pub sleeve_type: String,
    pub sleeve_type_custom: Option<String>,

    pub fabric_type: String,
    pub fabric_type_custom: Option<String>,
    pub custom_fabric_image: Option<String>,
    #[serde_as(as = "NoneAsEmptyString")]
    pub fabric_placement: Option<FabricPlacement>,
    pub fabric_placement_details: Option<String>,
    pub has_transparent_parts: String,
    pub transparent_parts_location: Option<String>,

    pub embellishments: Vec<String>,
    pub embellishments_custom: Option<String>,
    pub embellishment_placement: Option<String>,
    pub shine_level: String,
    pub shine_level_custom: Option<String>,

    pub primary_color: String,
    pub has_additional_colors: String,
    pub additional_colors: Option<String>,

    pub additional_notes: Option<String>,
}

/// Addressable questionnaire fields. Paired "custom" texts are not listed:
/// they are written alongside their selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    DressType,
    DressLength,
    SkirtShape,
    NecklineType,
    SleeveType,
    FabricType,
    CustomFabricImage,
    FabricPlacement,
    FabricPlacementDetails,
    HasTransparentParts,
    TransparentPartsLocation,
    Embellishments,
    EmbellishmentPlacement,
    ShineLevel,
    PrimaryColor,
    HasAdditionalColors,
    AdditionalColors,
    AdditionalNotes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKind {
    Choice,
    MultiChoice,
    YesNo,
    Text,
    Image,
    Placement,
}

impl Field {
    pub fn kind(&self) -> FieldKind {
        use Field::*;
        match self {
            DressType | DressLength | SkirtShape | NecklineType | SleeveType | FabricType | ShineLevel => FieldKind::Choice,
            Embellishments => FieldKind::MultiChoice,
            HasTransparentParts | HasAdditionalColors => FieldKind::YesNo,
            CustomFabricImage => FieldKind::Image,
            FabricPlacement => FieldKind::Placement,
            FabricPlacementDetails | TransparentPartsLocation | EmbellishmentPlacement | PrimaryColor
            | AdditionalColors | AdditionalNotes => FieldKind::Text,
        }
    }

    /// True when the field carries a paired `<field>Custom` text.
    pub fn has_custom_pair(&self) -> bool {
        use Field::*;
        matches!(self, DressType | DressLength | SkirtShape | NecklineType | SleeveType | FabricType | Embellishments | ShineLevel)
    }
}

/// A value supplied for one field: a single string or a set of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    One(String),
    Many(Vec<String>),
}

impl From<&str> for AnswerValue {
    fn from(v: &str) -> Self { AnswerValue::One(v.to_string()) }
}

impl From<String> for AnswerValue {
    fn from(v: String) -> Self { AnswerValue::One(v) }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(v: Vec<&str>) -> Self { AnswerValue::Many(v.into_iter().map(str::to_string).collect()) }
}

// --- Relay envelopes ---

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EnhancePromptRequest {
    /// Legacy free-text description, used only when no answers are sent.
    pub description: Option<String>,
    pub questionnaire_answers: Option<AnswerAggregate>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EnhancePromptResponse {
    pub enhanced_prompt: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerateImageRequest {
    pub prompt: String,
    pub fabric_image: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EditDesignRequest {
    pub original_image_url: String,
    pub edit_request: String,
}

/// Success payload shared by generate-image and edit-design.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImageResponse {
    pub image_data: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ErrorEnvelope {
    pub error: String,
}

// --- Design gallery envelopes ---

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CreateDesignRequest {
    pub questionnaire_answers: AnswerAggregate,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct EditStoredDesignRequest {
    pub edit_request: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn answers_use_camel_case_and_skip_unset_optionals() {
        let answers = AnswerAggregate {
            dress_type: "wedding".into(),
            embellishments: vec!["beads".into()],
            fabric_placement: Some(FabricPlacement::Bodice),
            ..Default::default()
        };
        let json = serde_json::to_value(&answers).unwrap();
        assert_eq!(json["dressType"], "wedding");
        assert_eq!(json["embellishments"][0], "beads");
        assert_eq!(json["fabricPlacement"], "bodice");
        assert!(json.get("dressTypeCustom").is_none());
        assert!(json.get("additionalNotes").is_none());
    }

    #[test]
    fn empty_fabric_placement_reads_as_unset() {
        let answers: AnswerAggregate = serde_json::from_str(r#"{"dressType":"party","fabricPlacement":""}"#).unwrap();
        assert_eq!(answers.fabric_placement, None);
        assert_eq!(answers.dress_type, "party");
        assert!(answers.embellishments.is_empty());
    }

    #[test]
    fn answer_value_accepts_string_or_list() {
        let one: AnswerValue = serde_json::from_str(r#""lace""#).unwrap();
        let many: AnswerValue = serde_json::from_str(r#"["beads","stones"]"#).unwrap();
        assert_eq!(one, AnswerValue::from("lace"));
        assert_eq!(many, AnswerValue::from(vec!["beads", "stones"]));
    }

    #[test]
    fn custom_pairs_only_on_selectors() {
        assert!(Field::DressType.has_custom_pair());
        assert!(Field::Embellishments.has_custom_pair());
        assert!(!Field::PrimaryColor.has_custom_pair());
        assert!(!Field::HasTransparentParts.has_custom_pair());
    }
}
