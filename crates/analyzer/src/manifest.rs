//! Package manifest generation and rendering.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;
use trailpack_common::{Error, Result};
use trailpack_schema::{
    validate_manifest, ApiVersion, CategorizedComponents, ManifestFormat, PackageManifest,
    TypeBlock,
};

pub const DEFAULT_API_VERSION: &str = "65.0";
pub const DEFAULT_NAMESPACE: &str = "http://soap.sforce.com/2006/04/metadata";

/// Order of type blocks in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeOrder {
    /// The order in which each type was first extracted.
    #[default]
    FirstSeen,
    /// Case-insensitive by type name.
    Alphabetical,
}

/// The configurable parts of the manifest wire format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifestOptions {
    pub namespace: String,
    pub format: ManifestFormat,
    pub type_order: TypeOrder,
    /// Accepted metadata types. Empty accepts any type.
    pub allowed_types: Vec<String>,
}

impl Default for ManifestOptions {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            format: ManifestFormat::Xml,
            type_order: TypeOrder::FirstSeen,
            allowed_types: Vec::new(),
        }
    }
}

/// Case-insensitive order, ties broken by exact byte order so that names
/// differing only in case still sort the same way every run.
fn member_order(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Build the manifest for `categorized` at `api_version`.
///
/// Members are sorted case-insensitively; type blocks follow
/// `options.type_order`. An empty input gives a manifest with no type
/// blocks. Fails with a format error on a malformed version, a type outside
/// `options.allowed_types`, a name holding a character XML 1.0 cannot carry,
/// or a manifest that violates the manifest schema.
pub fn generate(
    categorized: &CategorizedComponents,
    api_version: &str,
    options: &ManifestOptions,
) -> Result<PackageManifest> {
    let api_version: ApiVersion = api_version.parse()?;

    let mut types = Vec::with_capacity(categorized.categories().len());
    for category in categorized.categories() {
        if category.components.is_empty() {
            continue;
        }
        if !options.allowed_types.is_empty()
            && !options
                .allowed_types
                .iter()
                .any(|t| t == &category.component_type)
        {
            return Err(Error::format(format!(
                "metadata type {} is not in the allowed type list",
                category.component_type
            )));
        }
        check_xml_chars("metadata type", &category.component_type)?;
        for component in &category.components {
            check_xml_chars("member", &component.name)?;
        }

        let mut members: Vec<String> = category
            .components
            .iter()
            .map(|c| c.name.clone())
            .collect();
        members.sort_by(|a, b| member_order(a, b));

        types.push(TypeBlock {
            name: category.component_type.clone(),
            members,
        });
    }

    if options.type_order == TypeOrder::Alphabetical {
        types.sort_by(|a, b| member_order(&a.name, &b.name));
    }

    let manifest = PackageManifest { api_version, types };
    check_schema(&manifest)?;

    debug!(
        "Generated manifest: {} type(s), {} member(s)",
        manifest.types.len(),
        manifest.member_count()
    );
    Ok(manifest)
}

/// Characters outside the XML 1.0 `Char` production cannot be escaped.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= '\u{20}' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

fn check_xml_chars(what: &str, value: &str) -> Result<()> {
    match value.chars().find(|c| !is_xml_char(*c)) {
        Some(c) => Err(Error::format(format!(
            "{} {:?} contains U+{:04X}, which XML does not allow",
            what, value, c as u32
        ))),
        None => Ok(()),
    }
}

fn check_schema(manifest: &PackageManifest) -> Result<()> {
    let value = serde_json::to_value(manifest)?;
    let result = validate_manifest(&value).map_err(|e| Error::format(e.to_string()))?;
    if !result.valid {
        return Err(Error::format(format!(
            "manifest failed schema validation: {}",
            result.error_summary()
        )));
    }
    for warning in &result.warnings {
        debug!("Manifest: {}", warning);
    }
    Ok(())
}

/// Render in the format selected by `options`.
pub fn render(manifest: &PackageManifest, options: &ManifestOptions) -> Result<String> {
    match options.format {
        ManifestFormat::Xml => Ok(render_xml(manifest, &options.namespace)),
        ManifestFormat::Json => render_json(manifest),
    }
}

/// Render as a package.xml document.
pub fn render_xml(manifest: &PackageManifest, namespace: &str) -> String {
    let mut xml = String::new();

    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<Package xmlns=\"{}\">\n", escape_xml(namespace)));

    for block in &manifest.types {
        xml.push_str("    <types>\n");
        for member in &block.members {
            xml.push_str(&format!("        <members>{}</members>\n", escape_xml(member)));
        }
        xml.push_str(&format!("        <name>{}</name>\n", escape_xml(&block.name)));
        xml.push_str("    </types>\n");
    }

    xml.push_str(&format!(
        "    <version>{}</version>\n",
        escape_xml(manifest.api_version.as_str())
    ));
    xml.push_str("</Package>\n");

    xml
}

/// Render as pretty-printed JSON.
pub fn render_json(manifest: &PackageManifest) -> Result<String> {
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    Ok(json)
}

fn escape_xml(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
