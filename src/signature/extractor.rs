//! Exported-symbol extraction using tree-sitter
//!
//! Walks the top-level statements of a TypeScript module and produces one
//! [`Signature`] per exported symbol:
//! - Functions: everything up to the body (name, generics, params, return type)
//! - Classes: heritage plus non-private properties and methods
//! - Interfaces, type aliases, enums: the full declaration
//! - Variables and constants: the declarator including its initializer

use super::{Signature, SymbolType};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tree_sitter::{Node, Parser, Tree};

/// Name used for anonymous `export default` declarations
const DEFAULT_EXPORT: &str = "default";

/// Supported source grammars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    TypeScript,
    Tsx,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" | "js" | "jsx" | "mjs" | "cjs" => Some(Language::Tsx),
            _ => None,
        }
    }

    /// Detect language from a path
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Get the tree-sitter language for this language
    pub fn tree_sitter_language(&self) -> tree_sitter::Language {
        match self {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Language::TypeScript => write!(f, "typescript"),
            Language::Tsx => write!(f, "tsx"),
        }
    }
}

/// Extracts exported signatures from TypeScript sources
pub struct SignatureExtractor {
    typescript_parser: Parser,
    tsx_parser: Parser,
}

impl SignatureExtractor {
    /// Create a new extractor
    pub fn new() -> Result<Self> {
        let mut typescript_parser = Parser::new();
        typescript_parser
            .set_language(&Language::TypeScript.tree_sitter_language())
            .map_err(|e| Error::parse("<grammar>", format!("failed to load TypeScript grammar: {e}")))?;

        let mut tsx_parser = Parser::new();
        tsx_parser
            .set_language(&Language::Tsx.tree_sitter_language())
            .map_err(|e| Error::parse("<grammar>", format!("failed to load TSX grammar: {e}")))?;

        Ok(Self {
            typescript_parser,
            tsx_parser,
        })
    }

    /// Read a file from disk and extract its exported signatures
    pub fn extract_file(&mut self, path: &Path) -> Result<Vec<Signature>> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::FileNotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(Error::Io(e)),
        };

        let language = Language::from_path(path).ok_or_else(|| Error::UnsupportedLanguage {
            ext: path
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("")
                .to_string(),
        })?;

        self.extract_with(language, path, &content)
    }

    /// Extract exported signatures from in-memory TypeScript text
    pub fn extract_source(&mut self, source: &str) -> Result<Vec<Signature>> {
        self.extract_with(Language::TypeScript, Path::new("<source>"), source)
    }

    /// Extract exported signatures from text in the given grammar
    pub fn extract_with(
        &mut self,
        language: Language,
        path: &Path,
        source: &str,
    ) -> Result<Vec<Signature>> {
        let tree = self.parse(language, path, source)?;

        let mut signatures = Vec::new();
        let root = tree.root_node();
        let mut cursor = root.walk();
        for node in root.named_children(&mut cursor) {
            if node.kind() == "export_statement" {
                extract_export(node, source, &mut signatures);
            }
        }

        tracing::debug!("Extracted {} signatures from {:?}", signatures.len(), path);
        Ok(signatures)
    }

    /// Parse source, rejecting trees that contain syntax errors
    fn parse(&mut self, language: Language, path: &Path, source: &str) -> Result<Tree> {
        let parser = match language {
            Language::TypeScript => &mut self.typescript_parser,
            Language::Tsx => &mut self.tsx_parser,
        };

        let tree = parser
            .parse(source, None)
            .ok_or_else(|| Error::parse(path, "tree-sitter returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            let reason = first_error(root)
                .map(|node| {
                    let pos = node.start_position();
                    format!("syntax error at line {}, column {}", pos.row + 1, pos.column + 1)
                })
                .unwrap_or_else(|| "syntax error".to_string());
            return Err(Error::parse(path, reason));
        }

        Ok(tree)
    }
}

/// Locate the first ERROR or MISSING node
fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.has_error() || child.is_missing() {
            if let Some(found) = first_error(child) {
                return Some(found);
            }
        }
    }
    None
}

/// Handle one `export ...` statement
fn extract_export(node: Node<'_>, source: &str, out: &mut Vec<Signature>) {
    if let Some(declaration) = node.child_by_field_name("declaration") {
        extract_declaration(declaration, source, out);
        return;
    }

    // `export default function () {}` / `export default class {}` parse as values
    if has_child_kind(node, "default") {
        if let Some(value) = node.child_by_field_name("value") {
            match value.kind() {
                "function_expression" | "function" | "generator_function" => {
                    out.extend(extract_function(value, source));
                }
                "class" => out.extend(extract_class(value, source)),
                _ => {}
            }
        }
    }
}

/// Dispatch on declaration kind
fn extract_declaration(node: Node<'_>, source: &str, out: &mut Vec<Signature>) {
    match node.kind() {
        "function_declaration" | "generator_function_declaration" | "function_signature" => {
            out.extend(extract_function(node, source));
        }
        "class_declaration" | "abstract_class_declaration" => {
            out.extend(extract_class(node, source));
        }
        "interface_declaration" => out.extend(extract_whole(node, source, SymbolType::Interface)),
        "type_alias_declaration" => out.extend(extract_whole(node, source, SymbolType::TypeAlias)),
        "enum_declaration" => out.extend(extract_whole(node, source, SymbolType::Enum)),
        "lexical_declaration" | "variable_declaration" => extract_variables(node, source, out),
        "ambient_declaration" => {
            // `export declare ...` wraps the real declaration
            let mut cursor = node.walk();
            for child in node.named_children(&mut cursor) {
                extract_declaration(child, source, out);
            }
        }
        _ => {}
    }
}

/// Function signature: everything before the body
fn extract_function(node: Node<'_>, source: &str) -> Option<Signature> {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or(DEFAULT_EXPORT);

    let end = node
        .child_by_field_name("body")
        .map_or(node.end_byte(), |body| body.start_byte());
    let text = source.get(node.start_byte()..end)?;

    Some(Signature::new(
        name,
        SymbolType::Function,
        trim_declaration(text),
        true,
    ))
}

/// Class signature: header plus the non-private members
fn extract_class(node: Node<'_>, source: &str) -> Option<Signature> {
    let name = node
        .child_by_field_name("name")
        .map(|n| node_text(n, source))
        .unwrap_or(DEFAULT_EXPORT);
    let body = node.child_by_field_name("body")?;

    let mut header = String::from(if node.kind() == "abstract_class_declaration" {
        "abstract class"
    } else {
        "class"
    });
    header.push(' ');
    header.push_str(name);
    if let Some(type_parameters) = node.child_by_field_name("type_parameters") {
        header.push_str(node_text(type_parameters, source));
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if child.kind() == "class_heritage" {
            header.push(' ');
            header.push_str(node_text(child, source));
        }
    }

    let mut properties = Vec::new();
    let mut methods = Vec::new();

    let mut cursor = body.walk();
    for member in body.named_children(&mut cursor) {
        match member.kind() {
            "method_definition" | "method_signature" | "abstract_method_signature" => {
                if is_private_member(member, source) {
                    continue;
                }
                let end = member
                    .child_by_field_name("body")
                    .map_or(member.end_byte(), |b| b.start_byte());
                if let Some(text) = source.get(member.start_byte()..end) {
                    methods.push(trim_declaration(text).to_string());
                }
            }
            "public_field_definition" => {
                if is_private_member(member, source) {
                    continue;
                }
                // The initializer is an implementation detail of the class
                let end = member
                    .child_by_field_name("value")
                    .map_or(member.end_byte(), |v| v.start_byte());
                if let Some(text) = source.get(member.start_byte()..end) {
                    let text = trim_declaration(text).trim_end_matches('=').trim_end();
                    properties.push(text.to_string());
                }
            }
            _ => {}
        }
    }

    let signature = format!(
        "{} {{ {}; {} }}",
        header,
        properties.join("; "),
        methods.join("; ")
    );

    Some(Signature::new(name, SymbolType::Class, &signature, true))
}

/// Whole-declaration signature (interfaces, type aliases, enums)
fn extract_whole(node: Node<'_>, source: &str, symbol_type: SymbolType) -> Option<Signature> {
    let name = node_text(node.child_by_field_name("name")?, source);
    let text = node_text(node, source);
    Some(Signature::new(name, symbol_type, trim_declaration(text), true))
}

/// One signature per `name = value` declarator
fn extract_variables(node: Node<'_>, source: &str, out: &mut Vec<Signature>) {
    let symbol_type = if node.kind() == "lexical_declaration" && has_child_kind(node, "const") {
        SymbolType::Const
    } else {
        SymbolType::Variable
    };

    let mut cursor = node.walk();
    for declarator in node.named_children(&mut cursor) {
        if declarator.kind() != "variable_declarator" {
            continue;
        }
        let Some(name_node) = declarator.child_by_field_name("name") else {
            continue;
        };
        // Destructuring patterns have no single symbol name
        if name_node.kind() != "identifier" {
            continue;
        }

        out.push(Signature::new(
            node_text(name_node, source),
            symbol_type,
            node_text(declarator, source),
            true,
        ));
    }
}

/// `private` members and `#private` names are not part of the public shape
fn is_private_member(member: Node<'_>, source: &str) -> bool {
    if member
        .child_by_field_name("name")
        .is_some_and(|n| n.kind() == "private_property_identifier")
    {
        return true;
    }

    let mut cursor = member.walk();
    let is_private = member
        .children(&mut cursor)
        .any(|c| c.kind() == "accessibility_modifier" && node_text(c, source) == "private");
    is_private
}

fn has_child_kind(node: Node<'_>, kind: &str) -> bool {
    let mut cursor = node.walk();
    let found = node.children(&mut cursor).any(|c| c.kind() == kind);
    found
}

fn node_text<'a>(node: Node<'_>, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn trim_declaration(text: &str) -> &str {
    text.trim().trim_end_matches(';').trim_end()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{find_symbol, hash};

    fn extract(code: &str) -> Vec<Signature> {
        let mut extractor = SignatureExtractor::new().unwrap();
        extractor.extract_source(code).unwrap()
    }

    #[test]
    fn test_extract_exported_function() {
        let sigs = extract("export function add(a: number, b: number): number { return a+b; }");

        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].symbol_name, "add");
        assert_eq!(sigs[0].symbol_type, SymbolType::Function);
        assert_eq!(sigs[0].signature_text, "function add(a: number, b: number): number");
        assert!(sigs[0].is_exported);
    }

    #[test]
    fn test_non_exported_symbols_are_invisible() {
        let sigs = extract(
            r#"
function helper(x: number): number { return x; }
const internal = 1;
export function visible(): void {}
"#,
        );

        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].symbol_name, "visible");
    }

    #[test]
    fn test_class_skips_private_members() {
        let sigs = extract(
            r#"
export class UserService extends BaseService {
  private cache: Map<string, User>;
  #secret = 1;
  protected retries: number = 3;
  constructor(db: Db) { super(); }
  async find(id: string): Promise<User> { return this.db.get(id); }
  private helper(): void {}
}
"#,
        );

        assert_eq!(sigs.len(), 1);
        let class = &sigs[0];
        assert_eq!(class.symbol_type, SymbolType::Class);
        assert!(class.signature_text.starts_with("class UserService extends BaseService"));
        assert!(class.signature_text.contains("find(id: string): Promise<User>"));
        assert!(class.signature_text.contains("protected retries: number"));
        assert!(!class.signature_text.contains("= 3"));
        assert!(!class.signature_text.contains("helper"));
        assert!(!class.signature_text.contains("cache"));
        assert!(!class.signature_text.contains("secret"));
    }

    #[test]
    fn test_interface_type_enum_and_variables() {
        let sigs = extract(
            r#"
export interface User { id: number; name?: string }
export type Id = string | number;
export enum Color { Red, Green }
export const API_URL = "https://api.example.com";
export let counter: number = 0;
"#,
        );

        let kinds: Vec<(&str, SymbolType)> = sigs
            .iter()
            .map(|s| (s.symbol_name.as_str(), s.symbol_type))
            .collect();
        assert_eq!(
            kinds,
            vec![
                ("User", SymbolType::Interface),
                ("Id", SymbolType::TypeAlias),
                ("Color", SymbolType::Enum),
                ("API_URL", SymbolType::Const),
                ("counter", SymbolType::Variable),
            ]
        );

        let api = find_symbol(&sigs, "API_URL").unwrap();
        assert!(api.signature_text.contains("api.example.com"));
    }

    #[test]
    fn test_default_and_ambient_exports() {
        let sigs = extract(
            r#"
export default function (input: string): string { return input; }
export declare function version(): string;
"#,
        );

        let default = find_symbol(&sigs, "default").unwrap();
        assert_eq!(default.symbol_type, SymbolType::Function);
        assert!(default.signature_text.contains("(input: string): string"));

        let version = find_symbol(&sigs, "version").unwrap();
        assert_eq!(version.signature_text, "function version(): string");
    }

    #[test]
    fn test_formatting_does_not_change_fingerprint() {
        let a = extract("export function add(a: number, b: number): number { return a+b; }");
        let b = extract(
            "export function add(\n  a: number, // first\n  b:number\n):number {\n  return a * b;\n}",
        );

        assert_eq!(hash(&a[0]), hash(&b[0]));

        let pairs = [
            ("export type Id = string|number;", "export type Id =\n  string\n  | number;"),
            (
                "export function load(id: string): Promise<User> { return get(id); }",
                "export function load(id: string): Promise< User > { return get(id); }",
            ),
            ("export const TIMEOUT=30;", "export const TIMEOUT = 30;"),
        ];
        for (a, b) in pairs {
            assert_eq!(hash(&extract(a)[0]), hash(&extract(b)[0]), "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn test_signature_changes_change_fingerprint() {
        let base = extract("export function add(a: number, b: number): number { return a+b; }");
        let variants = [
            "export function add(a: string, b: number): number { return 0; }",
            "export function add(a: number, b: number, c: number): number { return 0; }",
            "export function add(a: number, b: number): string { return ''; }",
        ];

        for variant in variants {
            let changed = extract(variant);
            assert_ne!(hash(&base[0]), hash(&changed[0]), "no drift for {variant}");
        }
    }

    #[test]
    fn test_const_value_change_is_drift() {
        let a = extract("export const TIMEOUT = 30;");
        let b = extract("export const TIMEOUT = 60;");
        assert_ne!(hash(&a[0]), hash(&b[0]));
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let mut extractor = SignatureExtractor::new().unwrap();
        let err = extractor
            .extract_source("export function broken(a: number { return a; }")
            .unwrap_err();

        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn test_extract_file_missing_and_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let mut extractor = SignatureExtractor::new().unwrap();

        let missing = extractor.extract_file(&dir.path().join("gone.ts")).unwrap_err();
        assert!(matches!(missing, Error::FileNotFound { .. }));

        let py = dir.path().join("script.py");
        std::fs::write(&py, "def f(): pass\n").unwrap();
        let unsupported = extractor.extract_file(&py).unwrap_err();
        assert!(matches!(unsupported, Error::UnsupportedLanguage { .. }));
    }

    #[test]
    fn test_extract_tsx_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Button.tsx");
        std::fs::write(
            &path,
            "export function Button(props: { label: string }) { return <button>{props.label}</button>; }\n",
        )
        .unwrap();

        let mut extractor = SignatureExtractor::new().unwrap();
        let sigs = extractor.extract_file(&path).unwrap();
        assert_eq!(sigs.len(), 1);
        assert_eq!(sigs[0].signature_text, "function Button(props: {label: string})");
    }
}
