//! Schema-mapping compiler.
//!
//! Turns a mapping document into a [`SchemaMappingModel`]. The document is an
//! XSD with two top-level `xs:element` sections:
//!
//! ```xml
//! <xs:schema xmlns:xs="http://www.w3.org/2001/XMLSchema">
//!   <xs:element name="MongoDBUser">            <!-- document-store section -->
//!     <xs:complexType><xs:sequence>
//!       <xs:element name="account_id" type="xs:string"/>
//!       <xs:element name="name" type="xs:string"/>
//!     </xs:sequence></xs:complexType>
//!   </xs:element>
//!   <xs:element name="Neo4jNodes">             <!-- graph-store section -->
//!     <xs:complexType><xs:sequence>
//!       <xs:element name="Payment">
//!         <xs:annotation><xs:appinfo>path: (a:Account)-[:MADE_PAYMENT]-&gt;(p:Payment)</xs:appinfo></xs:annotation>
//!         <xs:complexType><xs:sequence>
//!           <xs:element name="amount" type="xs:string"/>
//!         </xs:sequence></xs:complexType>
//!       </xs:element>
//!     </xs:sequence></xs:complexType>
//!   </xs:element>
//! </xs:schema>
//! ```
//!
//! Compilation is purely structural; no store is contacted.

use std::path::Path;

use super::document::{parse_document, XmlElement};
use super::errors::SchemaParseError;
use super::model::{SchemaMappingBuilder, SchemaMappingModel};
use super::path_template::PathTemplate;

const PATH_PREFIX: &str = "path:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerOptions {
    pub anchor_label: String,
    pub anchor_id_field: String,
    /// Name of the top-level element listing document-store fields.
    pub document_section: String,
    /// Name of the top-level element listing graph labels.
    pub graph_section: String,
    /// Reject duplicate field declarations instead of warning.
    pub strict_field_ownership: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            anchor_label: "Account".to_string(),
            anchor_id_field: "account_id".to_string(),
            document_section: "MongoDBUser".to_string(),
            graph_section: "Neo4jNodes".to_string(),
            strict_field_ownership: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SchemaCompiler {
    options: CompilerOptions,
}

impl SchemaCompiler {
    pub fn new(options: CompilerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn compile_file<P: AsRef<Path>>(&self, path: P) -> Result<SchemaMappingModel, SchemaParseError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| SchemaParseError::Io {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        log::debug!("Compiling schema mapping from {}", path.display());
        self.compile_str(&content)
    }

    pub fn compile_str(&self, content: &str) -> Result<SchemaMappingModel, SchemaParseError> {
        let root = parse_document(content)?;
        if root.name != "schema" {
            return Err(SchemaParseError::missing_element("schema", "document root"));
        }

        let mut builder = SchemaMappingModel::builder(
            self.options.anchor_label.clone(),
            self.options.anchor_id_field.clone(),
        )
        .strict(self.options.strict_field_ownership);

        // Document section first so it wins ownership ties.
        let sections: Vec<(&XmlElement, &str)> = root
            .children_named("element")
            .map(|element| element_name(element, "schema").map(|name| (element, name)))
            .collect::<Result<_, _>>()?;

        for (element, _) in sections
            .iter()
            .filter(|(_, name)| *name == self.options.document_section)
        {
            self.compile_document_section(element, &mut builder)?;
        }
        for (element, _) in sections
            .iter()
            .filter(|(_, name)| *name == self.options.graph_section)
        {
            self.compile_graph_section(element, &mut builder)?;
        }

        let model = builder.build();
        log::info!(
            "Compiled schema mapping: {} fields, {} graph labels",
            model.field_count(),
            model.labels().len()
        );
        Ok(model)
    }

    fn compile_document_section(
        &self,
        section: &XmlElement,
        builder: &mut SchemaMappingBuilder,
    ) -> Result<(), SchemaParseError> {
        let Some(sequence) = sequence_of(section, &self.options.document_section)? else {
            return Ok(());
        };
        for field in sequence.children_named("element") {
            builder.document_field(element_name(field, &self.options.document_section)?)?;
        }
        Ok(())
    }

    fn compile_graph_section(
        &self,
        section: &XmlElement,
        builder: &mut SchemaMappingBuilder,
    ) -> Result<(), SchemaParseError> {
        let Some(sequence) = sequence_of(section, &self.options.graph_section)? else {
            return Ok(());
        };
        for label_element in sequence.children_named("element") {
            let label = element_name(label_element, &self.options.graph_section)?;
            builder.label(label);

            if let Some(pattern) = path_annotation(label_element) {
                let path = PathTemplate::compile(label, pattern, &self.options.anchor_label)?;
                log::debug!("Label `{}` reached via {}", label, path.pattern());
                builder.path(path);
            } else if label != self.options.anchor_label {
                log::debug!("Label `{}` has no traversal path", label);
            }

            let Some(fields) = sequence_of(label_element, label)? else {
                continue;
            };
            for field in fields.children_named("element") {
                let name = element_name(field, label)?;
                if name == "id" {
                    let namespaced = format!("{}_id", label.to_lowercase());
                    builder.graph_field(label, &namespaced, name)?;
                } else {
                    builder.graph_field(label, name, name)?;
                }
            }
        }
        Ok(())
    }
}

fn element_name<'a>(element: &'a XmlElement, parent: &str) -> Result<&'a str, SchemaParseError> {
    element
        .attribute("name")
        .ok_or_else(|| SchemaParseError::MissingAttribute {
            element: element.name.clone(),
            parent: parent.to_string(),
        })
}

/// The `complexType/sequence` of an element. A missing `complexType` means the
/// element declares nothing; a `complexType` without a `sequence` is malformed.
fn sequence_of<'a>(
    element: &'a XmlElement,
    owner: &str,
) -> Result<Option<&'a XmlElement>, SchemaParseError> {
    let Some(complex_type) = element.child("complexType") else {
        return Ok(None);
    };
    complex_type
        .child("sequence")
        .map(Some)
        .ok_or_else(|| SchemaParseError::missing_element("sequence", owner))
}

fn path_annotation(element: &XmlElement) -> Option<&str> {
    let text = element.find_path(&["annotation", "appinfo"])?.text.trim();
    text.strip_prefix(PATH_PREFIX).map(str::trim)
}
