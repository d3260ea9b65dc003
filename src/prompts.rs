//! Fixed instructional templates sent upstream. Each template is filled by
//! plain placeholder substitution.

use crate::models::{AnswerAggregate, FabricPlacement, Field, YES};
use crate::wizard::conditions;

/// Placeholders: {client_answers}
pub const ENHANCE_TEMPLATE: &str = r#"Your task is to create a detailed, professional, couture-level dress description based ONLY on the client's answers below.

IMPORTANT RULES:
- Describe the DRESS ONLY.
- Do NOT describe any background, environment, room, mannequin, lighting, camera position, or logo. These elements are handled separately.
- You may enhance clarity and professionalism, but you must NOT invent new features that the client did not imply.
- All improvements must reflect the client's intended style, materials, preferences, and notes.
- The goal is to transform the client's selections into one cohesive luxury-fashion description suitable for insertion into an AI image-generation prompt.

Your output must be a single polished paragraph describing ONLY:
• silhouette
• proportions
• fabrics
• materials
• neckline
• sleeves
• skirt shape
• waist shape
• embellishments
• transparency details
• colors
• movement & textile behavior
• aesthetic style

Do NOT mention questionnaires, choices, user inputs, or any meta context.
Write in the tone of an elite fashion designer describing a couture dress.

---

Client Answers:

{client_answers}

---

Now transform all the information above into one refined, elegant paragraph that describes ONLY the dress design with expert-level precision and coherent structure."#;

pub const FABRIC_INSTRUCTION: &str = r#"

FABRIC INSTRUCTION (CRITICAL - HIGHEST PRIORITY):
• A custom fabric image has been provided by the client (attached below)
• You MUST use the EXACT fabric pattern, texture, colors, and design from the attached custom fabric image
• Apply this fabric EXACTLY as specified in the dress description above
• Do NOT modify, recolor, or alter the fabric pattern in ANY way
• Do NOT change the pattern repeat, print, texture, or any visual characteristic
• Maintain photorealistic accuracy when applying the fabric to the dress
• The fabric should drape naturally and realistically on the dress with proper folds and textile behavior
• Ensure the fabric pattern aligns correctly and looks professionally tailored
• The custom fabric is the PRIMARY design element - treat it with utmost precision"#;

/// Placeholders: {prompt}, {fabric_instruction}
pub const IMAGE_TEMPLATE: &str = r#"Generate a high-quality, fully coherent fashion design image of a dress based on the following enhanced client description:

{prompt}{fabric_instruction}

---

Dress Rendering Requirements:
• The dress must appear as a complete, continuous, non-deformed garment with no missing parts.
• Maintain clean, symmetrical construction with a realistic silhouette.
• Ensure all fabric edges are intact, smooth, and not cut off.
• Highly detailed couture fashion design.
• Realistic textile rendering with natural folds, fabric texture, fabric flow, and proper reflections.
• Accurate color reproduction.
• The dress must fit the mannequin naturally and consistently.

Mannequin (fixed for all generations):
• Beige/cream fabric torso.
• No arms.
• Identical proportions and pose every time.
• Headless mannequin.

Branding / Logo Requirements:
• Logo on the wall behind the mannequin.
• Text: "yasmin-alsham"
• Style: luxury, elegant, high-end.
• Font: Playfair Display serif.
• Color: metallic gold (#C9A85A).
• Centered above the mannequin.
• Above the text: a small hand-drawn minimal couture dress sketch in soft black line-art.
• Logo and sketch must remain identical across all images (size, placement, and styling).

Background & Environment:
• Minimal luxury fashion studio.
• Soft beige/cream gradient background.
• Clean soft shadows under the mannequin.
• Consistent neutral lighting.
• No extra props or clutter.

Rendering Specifications:
• 4K photorealistic output.
• Centered full-body view of the mannequin.
• Clean composition, sharp edges, editorial quality.
• Strict consistency for mannequin, background, lighting, and logo.
• Only the dress design changes based on the enhanced client description.
• Photo size: 9:16 aspect ratio.

Hard Rules (must follow):
• Do NOT crop the dress.
• Do NOT generate torn, incomplete, fragmented, or unrealistic fabric.
• Do NOT distort proportions.
• Dress must always be smooth, clean, symmetrical, and fully constructed.
• The garment must look wearable and professionally tailored.

Output:
A full-body mannequin wearing the complete dress, centered, with the "yasmin-alsham" gold logo and the couture sketch above it."#;

/// Placeholders: {edit_request}
pub const EDIT_TEMPLATE: &str = r#"You are an expert fashion design AI assistant specializing in precise design modifications. You have been given an existing dress design image and a specific modification request from the client.

**CRITICAL INSTRUCTIONS:**
• Make ONLY the requested modification with surgical precision
• Do NOT change any other details, elements, or aspects of the design
• Maintain the exact same:
  - Overall silhouette and proportions
  - Lighting, shadows, and studio setup
  - Background and presentation
  - Mannequin pose and positioning
  - Fabric textures (except where modification is requested)
  - All embellishments and details (except where modification is requested)
  - Color scheme (except where modification is requested)
  - The "yasmin-alsham" gold logo and couture sketch positioning

**Client's Modification Request:**
{edit_request}

**Design Consistency Requirements:**
• The modified dress must look like a natural evolution of the original design
• Maintain the same level of quality, detail, and professionalism
• Keep the same photorealistic rendering style
• Preserve the luxury couture aesthetic
• Ensure the modification blends seamlessly with unchanged elements

**Technical Specifications:**
• 4K photorealistic output
• Centered full-body view of the mannequin
• Clean composition, sharp edges, editorial quality
• Same lighting setup and studio environment
• Photo size: 9:16 aspect ratio

**Hard Rules:**
• Do NOT crop the dress
• Do NOT generate torn, incomplete, or fragmented fabric
• Do NOT distort proportions
• The garment must remain smooth, clean, symmetrical, and professionally tailored
• The modification must be the ONLY visible change from the original

Please generate a new version of this dress design that incorporates ONLY the requested modification while keeping everything else identical to the original design."#;

pub fn enhance_prompt(client_answers: &str) -> String {
    ENHANCE_TEMPLATE.replace("{client_answers}", client_answers)
}

/// Legacy input: a single free-text description instead of answers.
pub fn describe_free_text(description: &str) -> String {
    format!("Client Description: {}", description.trim())
}

/// Block inserted into the image prompt when a fabric photo is attached.
pub fn fabric_instruction() -> &'static str { FABRIC_INSTRUCTION }

pub fn image_prompt(prompt: &str, with_fabric: bool) -> String {
    let fabric = if with_fabric { fabric_instruction() } else { "" };
    IMAGE_TEMPLATE
        .replace("{fabric_instruction}", fabric)
        .replace("{prompt}", prompt.trim())
}

pub fn edit_prompt(edit_request: &str) -> String {
    EDIT_TEMPLATE.replace("{edit_request}", edit_request.trim())
}

fn with_custom(value: &str, a: &AnswerAggregate, field: Field) -> String {
    match conditions::custom_text(a, field) {
        Some(custom) => format!("{value} ({custom})"),
        None => value.to_string(),
    }
}

fn placement_text(a: &AnswerAggregate) -> String {
    match a.fabric_placement {
        Some(FabricPlacement::Full) | None => "the full dress".to_string(),
        Some(FabricPlacement::Bodice) => "the bodice".to_string(),
        Some(FabricPlacement::Skirt) => "the skirt".to_string(),
        Some(FabricPlacement::Sleeves) => "the sleeves".to_string(),
        Some(FabricPlacement::Custom) => a
            .fabric_placement_details
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .unwrap_or("a client-specified area")
            .to_string(),
    }
}

/// Renders answers as one `**Label:** value` line per item. Custom texts and
/// conditional sub-fields appear only when they are meaningful.
pub fn format_answers(a: &AnswerAggregate) -> String {
    let mut parts = Vec::new();

    parts.push(format!("**Dress Type:** {}", with_custom(&a.dress_type, a, Field::DressType)));
    parts.push(format!("**Dress Length:** {}", with_custom(&a.dress_length, a, Field::DressLength)));
    parts.push(format!("**Skirt Shape:** {}", with_custom(&a.skirt_shape, a, Field::SkirtShape)));
    parts.push(format!("**Neckline Type:** {}", with_custom(&a.neckline_type, a, Field::NecklineType)));
    parts.push(format!("**Sleeve Type:** {}", with_custom(&a.sleeve_type, a, Field::SleeveType)));

    parts.push(format!("**Fabric Type:** {}", with_custom(&a.fabric_type, a, Field::FabricType)));
    if conditions::fabric_placement_applies(a) {
        parts.push(format!("**Custom Fabric:** client-supplied fabric image, applied to {}", placement_text(a)));
    }
    match a.transparent_parts_location.as_deref().map(str::trim) {
        Some(location) if conditions::transparent_location_applies(a) && !location.is_empty() => {
            parts.push(format!("**Transparent Parts:** Yes, at {location}"));
        }
        _ => parts.push("**Transparent Parts:** No".to_string()),
    }

    if !a.embellishments.is_empty() {
        let mut line = format!("**Embellishments:** {}", with_custom(&a.embellishments.join(", "), a, Field::Embellishments));
        if let Some(placement) = a.embellishment_placement.as_deref().map(str::trim) {
            if conditions::embellishment_placement_applies(a) && !placement.is_empty() {
                line.push_str(&format!(" - Placement: {placement}"));
            }
        }
        parts.push(line);
    }
    parts.push(format!("**Shine Level:** {}", with_custom(&a.shine_level, a, Field::ShineLevel)));

    parts.push(format!("**Primary Color:** {}", a.primary_color.trim()));
    if a.has_additional_colors == YES {
        if let Some(colors) = a.additional_colors.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            parts.push(format!("**Additional Colors:** {colors}"));
        }
    }

    if let Some(notes) = a.additional_notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        parts.push(format!("**Additional Notes:** {notes}"));
    }

    parts.join("\n")
}
