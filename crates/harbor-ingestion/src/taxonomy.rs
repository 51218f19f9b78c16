//! Maritime document taxonomy
//!
//! A closed, immutable table of six categories, each with an ordered list of
//! subcategories and example document types. The first subcategory of each
//! category is its default.

use harbor_core::DocumentCategory;
use once_cell::sync::Lazy;

/// A subcategory and the document types that usually belong to it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubcategoryDefinition {
    pub key: &'static str,
    pub label: &'static str,
    pub examples: &'static [&'static str],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryDefinition {
    pub category: DocumentCategory,
    pub label: &'static str,
    pub description: &'static str,
    pub subcategories: &'static [SubcategoryDefinition],
}

const fn sub(
    key: &'static str,
    label: &'static str,
    examples: &'static [&'static str],
) -> SubcategoryDefinition {
    SubcategoryDefinition {
        key,
        label,
        examples,
    }
}

static TAXONOMY: [CategoryDefinition; 6] = [
    CategoryDefinition {
        category: DocumentCategory::Statutory,
        label: "Statutory Certificates",
        description: "Certificates issued by or on behalf of the flag state under IMO conventions",
        subcategories: &[
            sub(
                "safety",
                "Safety",
                &[
                    "Safety Management Certificate",
                    "Safety Equipment Certificate",
                    "Safety Construction Certificate",
                    "Passenger Ship Safety Certificate",
                ],
            ),
            sub(
                "environmental",
                "Environmental",
                &[
                    "International Oil Pollution Prevention Certificate",
                    "International Air Pollution Prevention Certificate",
                    "International Sewage Pollution Prevention Certificate",
                    "Ballast Water Management Certificate",
                ],
            ),
            sub(
                "registration",
                "Registration & Manning",
                &[
                    "Certificate of Registry",
                    "International Tonnage Certificate",
                    "Minimum Safe Manning Document",
                    "Continuous Synopsis Record",
                ],
            ),
            sub(
                "load_line",
                "Load Line",
                &["International Load Line Certificate", "Load Line Exemption Certificate"],
            ),
            sub(
                "security",
                "Security & Radio",
                &[
                    "International Ship Security Certificate",
                    "Safety Radio Certificate",
                    "Ship Station Licence",
                ],
            ),
        ],
    },
    CategoryDefinition {
        category: DocumentCategory::Classification,
        label: "Classification Society",
        description: "Documents issued by the vessel's classification society",
        subcategories: &[
            sub(
                "class_certificates",
                "Class Certificates",
                &["Certificate of Class", "Hull Certificate", "Machinery Certificate"],
            ),
            sub(
                "survey_reports",
                "Survey Reports",
                &[
                    "Annual Survey Report",
                    "Intermediate Survey Report",
                    "Special Survey Report",
                    "Thickness Measurement Report",
                ],
            ),
            sub(
                "conditions",
                "Conditions & Memoranda",
                &["Condition of Class", "Memorandum to Owners", "Class Status Report"],
            ),
            sub(
                "approvals",
                "Approvals",
                &["Type Approval Certificate", "Plan Approval Letter"],
            ),
        ],
    },
    CategoryDefinition {
        category: DocumentCategory::Crew,
        label: "Crew",
        description: "Seafarer certification, medical fitness and employment records",
        subcategories: &[
            sub(
                "competency",
                "Certificates of Competency",
                &[
                    "Certificate of Competency",
                    "Certificate of Proficiency",
                    "GMDSS Operator Certificate",
                    "Flag State Endorsement",
                ],
            ),
            sub(
                "medical",
                "Medical",
                &["Seafarer Medical Certificate", "Drug and Alcohol Test Report"],
            ),
            sub(
                "training",
                "Training",
                &["STCW Basic Safety Training Certificate", "Training Record Book"],
            ),
            sub(
                "employment",
                "Employment",
                &["Seafarer Employment Agreement", "Crew List", "Seaman's Book"],
            ),
        ],
    },
    CategoryDefinition {
        category: DocumentCategory::Commercial,
        label: "Commercial",
        description: "Chartering, cargo, insurance and financial paperwork",
        subcategories: &[
            sub(
                "chartering",
                "Chartering",
                &["Charter Party", "Fixture Recap", "Notice of Readiness"],
            ),
            sub(
                "cargo",
                "Cargo",
                &["Bill of Lading", "Cargo Manifest", "Mate's Receipt"],
            ),
            sub(
                "insurance",
                "Insurance",
                &[
                    "P&I Certificate of Entry",
                    "Hull and Machinery Insurance Policy",
                    "Certificate of Financial Responsibility",
                ],
            ),
            sub(
                "financial",
                "Financial",
                &["Invoice", "Statement of Facts", "Bunker Delivery Note"],
            ),
        ],
    },
    CategoryDefinition {
        category: DocumentCategory::Inspection,
        label: "Inspections & Audits",
        description: "Reports from port state, flag state, vetting and internal inspections",
        subcategories: &[
            sub(
                "port_state_control",
                "Port State Control",
                &["PSC Inspection Report", "PSC Form A", "PSC Form B"],
            ),
            sub(
                "vetting",
                "Vetting",
                &["SIRE Inspection Report", "CDI Inspection Report"],
            ),
            sub(
                "flag_state",
                "Flag State",
                &["Flag State Inspection Report"],
            ),
            sub(
                "audits",
                "Audits",
                &["ISM Audit Report", "ISPS Audit Report", "MLC Inspection Report"],
            ),
        ],
    },
    CategoryDefinition {
        category: DocumentCategory::General,
        label: "General",
        description: "Anything that does not fit another category",
        subcategories: &[
            sub(
                "correspondence",
                "Correspondence",
                &["Letter", "Circular", "Email Printout"],
            ),
            sub(
                "manuals",
                "Manuals & Procedures",
                &["Safety Management Manual", "Operations Manual"],
            ),
            sub(
                "drawings",
                "Drawings & Plans",
                &["General Arrangement Plan", "Capacity Plan", "Fire Control Plan"],
            ),
            sub("other", "Other", &["Miscellaneous Document"]),
        ],
    },
];

/// All category definitions in display order
pub fn categories() -> &'static [CategoryDefinition] {
    &TAXONOMY
}

pub fn definition(category: DocumentCategory) -> &'static CategoryDefinition {
    // The table is indexed in `DocumentCategory::ALL` order.
    let index = DocumentCategory::ALL
        .iter()
        .position(|c| *c == category)
        .unwrap_or(TAXONOMY.len() - 1);
    &TAXONOMY[index]
}

pub fn subcategories_of(category: DocumentCategory) -> impl Iterator<Item = &'static str> {
    definition(category).subcategories.iter().map(|s| s.key)
}

/// The subcategory used when the model's choice is missing or invalid
pub fn default_subcategory(category: DocumentCategory) -> &'static str {
    definition(category).subcategories[0].key
}

/// Canonical subcategory key, tolerant of case, spaces and hyphens
pub fn canonical_subcategory(category: DocumentCategory, value: &str) -> Option<&'static str> {
    let normalized = value.trim().to_lowercase().replace([' ', '-'], "_");
    subcategories_of(category).find(|key| *key == normalized)
}

pub fn is_valid(category: &str, subcategory: &str) -> bool {
    category
        .parse::<DocumentCategory>()
        .map(|c| canonical_subcategory(c, subcategory).is_some())
        .unwrap_or(false)
}

/// Taxonomy rendered for the classification prompt
pub fn prompt_description() -> &'static str {
    static DESCRIPTION: Lazy<String> = Lazy::new(|| {
        let mut out = String::new();
        for definition in categories() {
            out.push_str(&format!(
                "- {} ({}): {}\n",
                definition.category, definition.label, definition.description
            ));
            for sub in definition.subcategories {
                out.push_str(&format!(
                    "    - {} ({}): e.g. {}\n",
                    sub.key,
                    sub.label,
                    sub.examples.join(", ")
                ));
            }
        }
        out
    });
    &DESCRIPTION
}
