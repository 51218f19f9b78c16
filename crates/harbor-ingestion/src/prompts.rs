//! Prompt construction for metadata and classification extraction

use crate::taxonomy;

/// Upper bound on document text sent to the model, in characters
pub const MAX_PROMPT_CHARS: usize = 60_000;

/// Type-specific guidance keyed by document type
const TYPE_HINTS: &[(&str, &str)] = &[
    (
        "Safety Management Certificate",
        "Capture the company name and IMO company number, the ISM Code reference and \
         the administration or recognised organisation that issued it. Expiry is usually \
         five years from issue.",
    ),
    (
        "International Oil Pollution Prevention Certificate",
        "Capture the MARPOL Annex I reference, the form type (A or B) of the supplement \
         and the date of the last annual survey endorsement.",
    ),
    (
        "Certificate of Registry",
        "Capture the official number, port of registry, call sign and the registered owner. \
         Permanent registries often carry no expiry date.",
    ),
    (
        "International Load Line Certificate",
        "Capture the freeboard values, the assigned load line marks and the annual survey \
         endorsements.",
    ),
    (
        "Certificate of Class",
        "Capture the class notation, the classification society and the due dates of the \
         next special survey.",
    ),
    (
        "Certificate of Competency",
        "Capture the seafarer's full name, rank or capacity, the STCW regulation, any \
         limitations and the issuing administration.",
    ),
    (
        "Seafarer Medical Certificate",
        "Capture the seafarer's name, fitness for look-out duties, any restrictions and the \
         examining practitioner. Validity is usually two years.",
    ),
    (
        "P&I Certificate of Entry",
        "Capture the club name, the policy year, the entered tonnage and the assured \
         parties. The certificate normally ends at noon GMT on 20 February.",
    ),
    (
        "Bill of Lading",
        "Capture the shipper, consignee, notify party, port of loading, port of discharge \
         and the cargo description. A bill of lading has no expiry date.",
    ),
    (
        "PSC Inspection Report",
        "Capture the port, the inspecting authority, the number of deficiencies and whether \
         the ship was detained.",
    ),
];

/// Guidance for a caller-declared document type, when one is known
pub fn type_hint_for(document_type: &str) -> Option<&'static str> {
    let wanted = document_type.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    TYPE_HINTS
        .iter()
        .find(|(name, _)| {
            let name = name.to_lowercase();
            name.contains(&wanted) || wanted.contains(&name)
        })
        .map(|(_, hint)| *hint)
}

const RESPONSE_SHAPE: &str = r#"{
  "metadata": {
    "title": string | null,
    "documentType": string | null,
    "issuer": string | null,
    "certificateNumber": string | null,
    "issueDate": "DD/MM/YYYY" | null,
    "expiryDate": "DD/MM/YYYY" | null,
    "vesselName": string | null,
    "imoNumber": string | null
  },
  "classification": {
    "primaryCategory": one of the category keys,
    "subcategory": one of that category's subcategory keys,
    "specificDocumentType": string,
    "confidence": "High" | "Medium" | "Low",
    "explanation": one sentence
  },
  "keyValuePairs": [{"key": string, "value": string}]
}"#;

pub fn system_prompt(type_hint: Option<&str>) -> String {
    let mut prompt = format!(
        "You are a maritime compliance analyst. You read vessel documents and return \
         structured metadata and a classification.\n\n\
         Classify every document into exactly one category and one subcategory from this \
         taxonomy, using the keys shown:\n{}\n\
         Rules:\n\
         - Use only the category and subcategory keys listed above.\n\
         - Write all dates as DD/MM/YYYY.\n\
         - Use null for any field the document does not state. Do not guess expiry dates.\n\
         - keyValuePairs holds other labelled facts printed on the document.\n\
         - Respond with a single JSON object of this shape and nothing else:\n{}\n",
        taxonomy::prompt_description(),
        RESPONSE_SHAPE
    );

    if let Some(hint) = type_hint.and_then(type_hint_for) {
        prompt.push_str("\nDocument-specific guidance: ");
        prompt.push_str(hint);
        prompt.push('\n');
    }
    prompt
}

/// User turn for text already extracted from a PDF
pub fn text_prompt(text: &str, document_type: Option<&str>) -> String {
    let text = truncate_chars(text, MAX_PROMPT_CHARS);
    match document_type {
        Some(declared) => format!(
            "The uploader says this is a \"{}\". Analyze the document text below.\n\n---\n{}\n---",
            declared, text
        ),
        None => format!("Analyze the document text below.\n\n---\n{}\n---", text),
    }
}

/// User turn for an image that needs OCR
pub fn image_prompt(document_type: Option<&str>) -> String {
    let declared = document_type
        .map(|d| format!(" The uploader says this is a \"{}\".", d))
        .unwrap_or_default();
    format!(
        "Transcribe all legible text in this scanned document image and analyze it.{} \
         Add a top-level \"fullText\" string with the complete transcription to the JSON \
         object.",
        declared
    )
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
