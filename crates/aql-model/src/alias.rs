//! Short aliases used in the JSON encoding of RM objects
//!
//! Attribute names and type names are replaced by aliases when RM objects are flattened
//! into structure rows. Path extraction therefore has to translate AQL attribute names
//! into these keys.

use crate::structure::StructureRmType;
use aql_diagnostics::{AqlError, Result, AQL0100};
use std::collections::HashMap;
use std::sync::LazyLock;

/// JSON key holding the type alias of an encoded object
pub const TYPE_ATTRIBUTE: &str = "T";

const ATTRIBUTE_ALIASES: &[(&str, &str)] = &[
    // single letter aliases for structural attributes
    ("activities", "a"),
    ("content", "c"),
    ("context", "x"),
    ("data", "d"),
    ("description", "t"),
    ("events", "e"),
    ("instruction_details", "n"),
    ("item", "j"),
    ("items", "i"),
    ("other_context", "o"),
    ("protocol", "p"),
    ("rows", "r"),
    ("state", "s"),
    ("summary", "y"),
    ("wf_details", "w"),
    ("feeder_audit", "f"),
    ("accuracy", "ay"),
    ("accuracy_is_percent", "ayp"),
    ("action_archetype_id", "aa"),
    ("activity_id", "ac"),
    ("alternate_text", "at"),
    ("archetype_details", "ad"),
    ("archetype_id", "aX"),
    ("archetype_node_id", "A"),
    ("assigner", "as"),
    ("attestations", "att"),
    ("attested_view", "atv"),
    ("careflow_step", "cf"),
    ("category", "ca"),
    ("change_type", "ct"),
    ("charset", "ch"),
    ("code_string", "cd"),
    ("committer", "co"),
    ("commit_audit", "cau"),
    ("composer", "cp"),
    ("compression_algorithm", "calg"),
    ("contribution", "con"),
    ("current_state", "cu"),
    ("defining_code", "df"),
    ("denominator", "de"),
    ("details", "dt"),
    ("domain_concept", "dc"),
    ("duration", "du"),
    ("encoding", "ec"),
    ("end_time", "et"),
    ("expiry_time", "ex"),
    ("external_ref", "er"),
    ("feeder_system_audit", "fs"),
    ("feeder_system_item_ids", "fX"),
    ("folders", "fo"),
    ("formalism", "fm"),
    ("formatting", "fr"),
    ("function", "fu"),
    ("guideline_id", "gX"),
    ("health_care_facility", "hc"),
    ("hyperlink", "hy"),
    ("id", "X"),
    ("identifiers", "Xs"),
    ("instruction_id", "iX"),
    ("integrity_check", "ic"),
    ("integrity_check_algorithm", "ica"),
    ("interval", "in"),
    ("ism_transition", "it"),
    ("issuer", "is"),
    ("is_modifiable", "im"),
    ("is_pending", "ip"),
    ("is_queryable", "iq"),
    ("is_terminal", "il"),
    ("language", "la"),
    ("lifecycle_state", "ls"),
    ("links", "lk"),
    ("location", "lc"),
    ("lower", "l"),
    ("lower_included", "li"),
    ("lower_unbounded", "lu"),
    ("magnitude", "m"),
    ("magnitude_status", "ms"),
    ("mappings", "mp"),
    ("match", "ma"),
    ("math_function", "mf"),
    ("meaning", "me"),
    ("media_type", "mt"),
    ("mode", "mo"),
    ("name", "N"),
    ("namespace", "ns"),
    ("narrative", "nv"),
    ("normal_range", "nr"),
    ("normal_status", "nt"),
    ("null_flavour", "nf"),
    ("null_reason", "nl"),
    ("numerator", "nu"),
    ("origin", "og"),
    ("original_content", "oc"),
    ("originating_system_audit", "oa"),
    ("originating_system_item_ids", "os"),
    ("other_details", "od"),
    ("other_input_version_uids", "oX"),
    ("other_participations", "op"),
    ("other_reference_ranges", "or"),
    ("participations", "pp"),
    ("path", "pa"),
    ("performer", "pf"),
    ("period", "pe"),
    ("preceding_version_uid", "pX"),
    ("precision", "pc"),
    ("preferred_term", "pt"),
    ("proof", "prf"),
    ("property", "pr"),
    ("provider", "pv"),
    ("purpose", "pu"),
    ("qualified_rm_entity", "qr"),
    ("range", "ra"),
    ("reason", "re"),
    ("relationship", "rs"),
    ("rm_entity", "rm"),
    ("rm_name", "rn"),
    ("rm_originator", "ro"),
    ("rm_version", "rv"),
    ("sample_count", "sn"),
    ("scheme", "sc"),
    ("setting", "se"),
    ("signature", "sig"),
    ("size", "si"),
    ("specialisation", "sp"),
    ("start_time", "st"),
    ("subject", "su"),
    ("symbol", "sy"),
    ("system_id", "sX"),
    ("target", "ta"),
    ("template_id", "tm"),
    ("terminology_id", "te"),
    ("territory", "ty"),
    ("thumbnail", "th"),
    ("time", "ti"),
    ("time_asserted", "ts"),
    ("time_committed", "tc"),
    ("timing", "tg"),
    ("transition", "tr"),
    ("type", "tp"),
    ("uid", "U"),
    ("units", "un"),
    ("units_display_name", "ud"),
    ("units_system", "us"),
    ("upper", "u"),
    ("upper_included", "ui"),
    ("upper_unbounded", "uu"),
    ("uri", "ur"),
    ("value", "V"),
    ("version_id", "vX"),
    ("wf_definition", "wd"),
    ("width", "wi"),
    ("workflow_id", "wX"),
    // technical attributes of the encoding
    ("_index", "I"),
    ("_magnitude", "M"),
    ("_type", "T"),
];

const TYPE_ALIASES: &[(&str, &str)] = &[
    ("ARCHETYPED", "AR"),
    ("ARCHETYPE_ID", "AX"),
    ("ATTESTATION", "AT"),
    ("AUDIT_DETAILS", "AD"),
    ("CODE_PHRASE", "C"),
    ("DV_BOOLEAN", "b"),
    ("DV_CODED_TEXT", "c"),
    ("DV_COUNT", "co"),
    ("DV_DATE", "d"),
    ("DV_DATE_TIME", "dt"),
    ("DV_DURATION", "du"),
    ("DV_EHR_URI", "eu"),
    ("DV_IDENTIFIER", "id"),
    ("DV_INTERVAL", "iv"),
    ("DV_MULTIMEDIA", "mu"),
    ("DV_ORDINAL", "o"),
    ("DV_PARAGRAPH", "p"),
    ("DV_PARSABLE", "pa"),
    ("DV_PROPORTION", "pr"),
    ("DV_QUANTITY", "q"),
    ("DV_SCALE", "sc"),
    ("DV_STATE", "st"),
    ("DV_TEXT", "x"),
    ("DV_TIME", "t"),
    ("DV_URI", "u"),
    ("GENERIC_ID", "GX"),
    ("HIER_OBJECT_ID", "HX"),
    ("INTERNET_ID", "IX"),
    ("INTERVAL", "IV"),
    ("ISM_TRANSITION", "IT"),
    ("LINK", "LK"),
    ("LOCATABLE_REF", "LR"),
    ("OBJECT_REF", "OR"),
    ("OBJECT_VERSION_ID", "OV"),
    ("PARTICIPATION", "PA"),
    ("PARTY_IDENTIFIED", "PI"),
    ("PARTY_REF", "PF"),
    ("PARTY_RELATED", "PR"),
    ("PARTY_SELF", "PS"),
    ("REFERENCE_RANGE", "RR"),
    ("TEMPLATE_ID", "TP"),
    ("TERMINOLOGY_ID", "T"),
    ("TERM_MAPPING", "TM"),
    ("UUID", "U"),
];

static ATTRIBUTE_TO_ALIAS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| ATTRIBUTE_ALIASES.iter().copied().collect());

static ALIAS_TO_ATTRIBUTE: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| ATTRIBUTE_ALIASES.iter().map(|(a, b)| (*b, *a)).collect());

static TYPE_TO_ALIAS: LazyLock<HashMap<&'static str, &'static str>> =
    LazyLock::new(|| TYPE_ALIASES.iter().copied().collect());

/// Attribute name aliases
pub struct RmAttributeAlias;

impl RmAttributeAlias {
    /// The alias of an attribute; unknown attributes are an error
    pub fn get_alias(attribute: &str) -> Result<&'static str> {
        ATTRIBUTE_TO_ALIAS.get(attribute).copied().ok_or_else(|| {
            AqlError::semantic(AQL0100, format!("Unknown attribute: {attribute}"))
        })
    }

    /// The attribute an alias stands for
    pub fn get_attribute(alias: &str) -> Option<&'static str> {
        ALIAS_TO_ATTRIBUTE.get(alias).copied()
    }

    pub fn is_alias(alias: &str) -> bool {
        ALIAS_TO_ATTRIBUTE.contains_key(alias)
    }

    /// Translate attribute names into JSON keys
    pub fn rm_to_json_path_parts<'a>(
        attributes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<&'static str>> {
        attributes.into_iter().map(Self::get_alias).collect()
    }
}

/// Type name aliases, as stored in the `T` key
pub struct RmTypeAlias;

impl RmTypeAlias {
    /// The alias of a type; structure types use their `rm_entity` alias
    pub fn get_alias(rm_type: &str) -> Option<&'static str> {
        StructureRmType::by_type_name(rm_type)
            .map(|s| s.alias())
            .or_else(|| TYPE_TO_ALIAS.get(rm_type).copied())
    }

    /// The alias, or the type name when no alias is defined
    pub fn optional_alias(rm_type: &str) -> String {
        Self::get_alias(rm_type)
            .map(str::to_string)
            .unwrap_or_else(|| rm_type.to_string())
    }
}
