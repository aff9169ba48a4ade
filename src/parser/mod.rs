//! Object parser: recursive descent over the token stream
//!
//! ## Grammar
//!
//! ```text
//! document   := object
//! object     := TypeName [QuotedName] '{' body '}'
//!             | TypeName QuotedName [';']          (typed reference)
//!             | 'USE' QuotedName | QuotedName      (reference)
//!             | Name                               (reference, if not a type)
//!             | 'CLONE' QuotedName QuotedName ['{' body '}']
//!             | '<' QuotedPath '>'                 (include)
//! body       := (constants | templates)* (field (',' field)* [','])?
//! constants  := ['CONSTANTS' ':'] '[' (Name ':' QuotedString [','])* ']'
//! templates  := 'TEMPLATES' ':' '[' (object [','])* ']'
//! field      := FieldName ':' value
//! ```
//!
//! `$NAME` anywhere inside a body is replaced by the text of the constant
//! `NAME` from the innermost enclosing scope that defines it; the
//! replacement is tokenized in turn, so constants may refer to constants.
//!
//! Any failure aborts the whole parse; no partial graph is returned.

mod scope;
mod source;

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, trace};

use crate::coder;
use crate::config::ParseOptions;
use crate::deps::DependencyEdge;
use crate::error::{ErrorKind, ParseError, Result, SourceLocation, STRING_SOURCE};
use crate::instance::InstanceRef;
use crate::registry::Registry;
use crate::spec::{FieldSpec, ObjectSpec};
use crate::tokenizer::{Token, TokenKind};
use crate::value::{Value, ValueType};

use scope::Scopes;
use source::TokenSource;

/// Result of a successful parse
#[derive(Debug)]
pub struct ParseOutput {
    pub root: InstanceRef,
    /// One edge per include resolved, in encounter order
    pub dependencies: Vec<DependencyEdge>,
}

/// Entry point for parsing files and strings against a registry
pub struct Parser<'r> {
    registry: &'r Registry,
    options: ParseOptions,
}

impl<'r> Parser<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self::with_options(registry, ParseOptions::default())
    }

    pub fn with_options(registry: &'r Registry, options: ParseOptions) -> Self {
        Self { registry, options }
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn parse_file(&self, path: impl AsRef<Path>) -> Result<ParseOutput> {
        let mut session = Session::new(self.registry, &self.options);
        let root = session.parse_file(path.as_ref())?;
        Ok(ParseOutput {
            root,
            dependencies: session.dependencies,
        })
    }

    /// Parses in-memory text; relative includes resolve against
    /// [`ParseOptions::base_dir`].
    pub fn parse_str(&self, text: &str) -> Result<ParseOutput> {
        let mut session = Session::new(self.registry, &self.options);
        let root = session.parse_document(
            PathBuf::from(STRING_SOURCE),
            self.options.string_base_dir(),
            text.to_string(),
        )?;
        Ok(ParseOutput {
            root,
            dependencies: session.dependencies,
        })
    }

    /// Parses a file whose root must be `type_name` or derived from it.
    pub fn parse_file_as(&self, path: impl AsRef<Path>, type_name: &str) -> Result<ParseOutput> {
        let path = path.as_ref();
        let output = self.parse_file(path)?;
        let actual = output.root.borrow().type_name().to_string();
        if !self.registry.is_derived_from(&actual, type_name) {
            return Err(ParseError::syntax(format!(
                "Expected a {type_name}; got {actual}"
            ))
            .at(SourceLocation::new(path, 1, 1)));
        }
        Ok(output)
    }
}

// ============================================================================
// Session: state shared by a root document and everything it includes
// ============================================================================

struct Session<'p> {
    registry: &'p Registry,
    options: &'p ParseOptions,
    dependencies: Vec<DependencyEdge>,
    open_files: Vec<PathBuf>,
}

impl<'p> Session<'p> {
    fn new(registry: &'p Registry, options: &'p ParseOptions) -> Self {
        Self {
            registry,
            options,
            dependencies: Vec::new(),
            open_files: Vec::new(),
        }
    }

    fn parse_file(&mut self, path: &Path) -> Result<InstanceRef> {
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if self.open_files.contains(&key) {
            return Err(ParseError::include(format!(
                "Include cycle: '{}' includes itself",
                path.display()
            )));
        }
        if self.open_files.len() >= self.options.max_include_depth {
            return Err(ParseError::include(format!(
                "Includes nested more than {} deep at '{}'",
                self.options.max_include_depth,
                path.display()
            )));
        }
        let text = fs::read_to_string(path).map_err(|e| {
            ParseError::include(format!("Failed to open file '{}': {e}", path.display()))
        })?;

        debug!("Parsing file {}", path.display());
        let base_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        self.open_files.push(key);
        let result = self.parse_document(path.to_path_buf(), base_dir, text);
        self.open_files.pop();
        result
    }

    fn parse_document(
        &mut self,
        source_name: PathBuf,
        base_dir: PathBuf,
        text: String,
    ) -> Result<InstanceRef> {
        let mut doc = DocumentParser {
            registry: self.registry,
            max_substitution_depth: self.options.max_substitution_depth,
            session: self,
            source: TokenSource::new(source_name, text),
            scopes: Scopes::new(),
            base_dir,
        };
        let root = doc.parse_object(Binding::Instance)?;
        let tok = doc.peek()?;
        if !tok.is_eof() {
            return Err(doc.syntax_error(&tok, format!("Expected end of input, got {tok}")));
        }
        Ok(root)
    }
}

// ============================================================================
// DocumentParser: one file or string
// ============================================================================

/// Where a completed named object is recorded
#[derive(Clone, Copy, PartialEq, Eq)]
enum Binding {
    Instance,
    Template,
}

struct DocumentParser<'s, 'p> {
    registry: &'p Registry,
    max_substitution_depth: usize,
    session: &'s mut Session<'p>,
    source: TokenSource,
    scopes: Scopes,
    base_dir: PathBuf,
}

impl<'s, 'p> DocumentParser<'s, 'p> {
    // ------------------------------------------------------------------
    // Token helpers
    // ------------------------------------------------------------------

    fn location(&self, token: &Token) -> SourceLocation {
        self.source.location_of(token)
    }

    fn syntax_error(&self, token: &Token, message: String) -> ParseError {
        ParseError::syntax(message).at(self.location(token))
    }

    /// Next token after expanding any `$NAME` substitutions.
    fn peek(&mut self) -> Result<Token> {
        loop {
            let tok = self.source.peek()?.clone();
            if !tok.is_punct('$') {
                return Ok(tok);
            }
            self.source.next()?;
            let name = self.source.next()?;
            if name.kind != TokenKind::Identifier {
                return Err(self.syntax_error(
                    &name,
                    format!("Expected constant name after '$', got {name}"),
                ));
            }
            let Some(value) = self.scopes.constant(&name.text).map(str::to_string) else {
                return Err(self.syntax_error(
                    &name,
                    format!("Unknown constant '{}'", name.text),
                ));
            };
            if self.source.substitution_depth() >= self.max_substitution_depth {
                return Err(self.syntax_error(
                    &name,
                    format!("Constant substitution too deep expanding '{}'", name.text),
                ));
            }
            trace!(constant = %name.text, "substituting constant");
            self.source.push_substitution(&value, tok.line, tok.column);
        }
    }

    fn next(&mut self) -> Result<Token> {
        self.peek()?;
        self.source.next()
    }

    fn expect_punct(&mut self, c: char) -> Result<Token> {
        let tok = self.next()?;
        if tok.is_punct(c) {
            Ok(tok)
        } else {
            Err(self.syntax_error(&tok, format!("Expected '{c}', got {tok}")))
        }
    }

    fn expect_quoted(&mut self, what: &str) -> Result<Token> {
        let tok = self.next()?;
        if tok.kind == TokenKind::QuotedString {
            Ok(tok)
        } else {
            Err(self.syntax_error(&tok, format!("Expected quoted {what}, got {tok}")))
        }
    }

    /// Consumes a ',' or leaves the closing character in place.
    fn separator(&mut self, close: char) -> Result<()> {
        let tok = self.peek()?;
        if tok.is_punct(',') {
            self.next()?;
            Ok(())
        } else if tok.is_punct(close) {
            Ok(())
        } else {
            Err(self.syntax_error(&tok, format!("Expected ',' or '{close}', got {tok}")))
        }
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    fn parse_object(&mut self, binding: Binding) -> Result<InstanceRef> {
        let tok = self.peek()?;
        match tok.kind {
            TokenKind::Punct('<') => self.parse_include(binding),
            TokenKind::Identifier if tok.text == "CLONE" => self.parse_clone(binding),
            TokenKind::Identifier if tok.text == "USE" => {
                self.next()?;
                let name = self.expect_quoted("object name after USE")?;
                self.resolve(&name)
            }
            TokenKind::QuotedString => {
                self.next()?;
                self.resolve(&tok)
            }
            // Bare identifier naming an instance; registered type names win
            TokenKind::Identifier
                if !self.registry.contains(&tok.text)
                    && self.scopes.resolve(&tok.text).is_some() =>
            {
                self.next()?;
                self.resolve(&tok)
            }
            TokenKind::Identifier => self.parse_typed_object(binding),
            TokenKind::Eof => Err(self.syntax_error(
                &tok,
                "Invalid empty name for object type".to_string(),
            )),
            _ => Err(self.syntax_error(&tok, format!("Invalid name {tok} for object type"))),
        }
    }

    fn parse_typed_object(&mut self, binding: Binding) -> Result<InstanceRef> {
        let type_tok = self.next()?;
        let registry = self.registry;
        let spec = registry
            .lookup(&type_tok.text)
            .map_err(|e| e.at(self.location(&type_tok)))?;

        let name = if self.peek()?.kind == TokenKind::QuotedString {
            Some(self.next()?.text)
        } else {
            None
        };

        let tok = self.peek()?;
        if !tok.is_punct('{') {
            return match name {
                Some(name) => {
                    if tok.is_punct(';') {
                        self.next()?;
                    }
                    self.resolve_typed(spec, &name, &type_tok)
                }
                None => Err(self.syntax_error(&tok, format!("Expected '{{', got {tok}"))),
            };
        }

        if spec.is_abstract() {
            return Err(ParseError::new(
                ErrorKind::UnknownType,
                format!("Cannot create instance of abstract type '{}'", spec.type_name()),
            )
            .at(self.location(&type_tok)));
        }

        let mut instance = spec.create();
        if let Some(name) = &name {
            instance.set_name(name.as_str());
        }
        instance.set_location(self.location(&type_tok));
        let instance = instance.into_ref();
        self.parse_body(spec, &instance)?;
        self.bind(&instance, binding, &type_tok)?;
        Ok(instance)
    }

    fn parse_clone(&mut self, binding: Binding) -> Result<InstanceRef> {
        let clone_tok = self.next()?;
        let template_name = self.expect_quoted("template name after CLONE")?;
        let new_name = self.expect_quoted("name for the clone")?;

        let template = self.scopes.template(&template_name.text).ok_or_else(|| {
            ParseError::reference(format!(
                "Missing template object with name '{}'",
                template_name.text
            ))
            .at(self.location(&template_name))
        })?;

        let registry = self.registry;
        let clone = registry
            .clone_instance(&template, true)
            .map_err(|e| e.at(self.location(&clone_tok)))?;
        let type_name = {
            let mut c = clone.borrow_mut();
            c.set_name(new_name.text.as_str());
            c.set_location(self.location(&clone_tok));
            c.type_name().to_string()
        };
        debug!(
            "Cloned {} \"{}\" as \"{}\"",
            type_name, template_name.text, new_name.text
        );

        if self.peek()?.is_punct('{') {
            let spec = registry
                .lookup(&type_name)
                .map_err(|e| e.at(self.location(&clone_tok)))?;
            self.parse_body(spec, &clone)?;
        }
        self.bind(&clone, binding, &clone_tok)?;
        Ok(clone)
    }

    fn parse_include(&mut self, binding: Binding) -> Result<InstanceRef> {
        let open = self.expect_punct('<')?;
        let path_tok = self.next()?;
        if path_tok.kind != TokenKind::QuotedString {
            return Err(self.syntax_error(
                &path_tok,
                format!("Expected quoted path after '<', got {path_tok}"),
            ));
        }
        if path_tok.text.is_empty() {
            return Err(ParseError::include("Invalid empty path for included file")
                .at(self.location(&path_tok)));
        }
        self.expect_punct('>')?;

        let path = self.base_dir.join(&path_tok.text);
        let edge = DependencyEdge::new(self.source.source_name(), path.clone());
        trace!(
            including = %edge.including_path.display(),
            included = %edge.included_path.display(),
            "recording include dependency"
        );
        self.session.dependencies.push(edge);

        let root = self
            .session
            .parse_file(&path)
            .map_err(|e| e.at(self.location(&open)))?;
        self.bind(&root, binding, &open)?;
        Ok(root)
    }

    /// Records a completed object under its name, if it has one.
    fn bind(&mut self, instance: &InstanceRef, binding: Binding, at: &Token) -> Result<()> {
        let name = instance.borrow().name().map(str::to_string);
        match (name, binding) {
            (Some(name), Binding::Instance) => self.scopes.define(&name, instance),
            (Some(name), Binding::Template) => self.scopes.define_template(&name, instance),
            (None, Binding::Instance) => {}
            (None, Binding::Template) => {
                return Err(self.syntax_error(at, "Template object must have a name".to_string()));
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &Token) -> Result<InstanceRef> {
        self.scopes.resolve(&name.text).ok_or_else(|| {
            ParseError::reference(format!("Missing object with name '{}'", name.text))
                .at(self.location(name))
        })
    }

    fn resolve_typed(&self, spec: &ObjectSpec, name: &str, type_tok: &Token) -> Result<InstanceRef> {
        let found = self.scopes.resolve(name).filter(|inst| {
            self.registry
                .is_derived_from(inst.borrow().type_name(), spec.type_name())
        });
        found.ok_or_else(|| {
            ParseError::reference(format!(
                "Invalid reference to object of type '{}' with name '{}'",
                spec.type_name(),
                name
            ))
            .at(self.location(type_tok))
        })
    }

    // ------------------------------------------------------------------
    // Bodies and fields
    // ------------------------------------------------------------------

    fn parse_body(&mut self, spec: &ObjectSpec, instance: &InstanceRef) -> Result<()> {
        self.expect_punct('{')?;
        self.scopes.push();
        let result = self.parse_fields(spec, instance);
        self.scopes.pop();
        result
    }

    fn parse_fields(&mut self, spec: &ObjectSpec, instance: &InstanceRef) -> Result<()> {
        let mut seen_field = false;
        loop {
            let tok = self.peek()?;
            match &tok.kind {
                TokenKind::Punct('}') => {
                    self.next()?;
                    return Ok(());
                }
                TokenKind::Punct('[') => {
                    self.reject_after_fields(seen_field, &tok, "Constants")?;
                    self.parse_constants()?;
                }
                TokenKind::Identifier if tok.text == "CONSTANTS" => {
                    self.reject_after_fields(seen_field, &tok, "Constants")?;
                    self.next()?;
                    self.expect_punct(':')?;
                    self.parse_constants()?;
                }
                TokenKind::Identifier if tok.text == "TEMPLATES" => {
                    self.reject_after_fields(seen_field, &tok, "Templates")?;
                    self.next()?;
                    self.expect_punct(':')?;
                    self.parse_templates()?;
                }
                TokenKind::Identifier => {
                    self.parse_field(spec, instance)?;
                    seen_field = true;
                }
                _ => {
                    return Err(self.syntax_error(
                        &tok,
                        format!("Expected field name or '}}', got {tok}"),
                    ));
                }
            }
            self.separator('}')?;
        }
    }

    fn reject_after_fields(&self, seen_field: bool, tok: &Token, what: &str) -> Result<()> {
        if seen_field {
            Err(self.syntax_error(tok, format!("{what} must appear before fields")))
        } else {
            Ok(())
        }
    }

    fn parse_constants(&mut self) -> Result<()> {
        self.expect_punct('[')?;
        loop {
            let tok = self.next()?;
            if tok.is_punct(']') {
                return Ok(());
            }
            if tok.kind != TokenKind::Identifier {
                return Err(self.syntax_error(
                    &tok,
                    format!("Expected constant name or ']', got {tok}"),
                ));
            }
            self.expect_punct(':')?;
            let value = self.expect_quoted("string value for constant")?;
            trace!(constant = %tok.text, value = %value.text, "defining constant");
            self.scopes.define_constant(tok.text, value.text);
            self.separator(']')?;
        }
    }

    fn parse_templates(&mut self) -> Result<()> {
        self.expect_punct('[')?;
        loop {
            if self.peek()?.is_punct(']') {
                self.next()?;
                return Ok(());
            }
            self.parse_object(Binding::Template)?;
            self.separator(']')?;
        }
    }

    fn parse_field(&mut self, spec: &ObjectSpec, instance: &InstanceRef) -> Result<()> {
        let name = self.next()?;
        let field = spec.find_field(&name.text).ok_or_else(|| {
            ParseError::new(
                ErrorKind::UnknownField,
                format!(
                    "Unknown field '{}' in object of type '{}'",
                    name.text,
                    spec.type_name()
                ),
            )
            .at(self.location(&name))
        })?;
        self.expect_punct(':')?;

        let value_tok = self.peek()?;
        let values = self.parse_field_value(field)?;
        field
            .store(&mut instance.borrow_mut(), values)
            .map_err(|e| e.at(self.location(&value_tok)))
    }

    fn parse_field_value(&mut self, field: &FieldSpec) -> Result<Vec<Value>> {
        match field.value_type() {
            ValueType::Object => {
                let tok = self.peek()?;
                let obj = self.parse_object(Binding::Instance)?;
                self.check_object_type(field, &obj, &tok)?;
                Ok(vec![Value::Object(obj)])
            }
            ValueType::ObjectList => {
                self.expect_punct('[')?;
                let mut list = Vec::new();
                while !self.peek()?.is_punct(']') {
                    let tok = self.peek()?;
                    let obj = self.parse_object(Binding::Instance)?;
                    self.check_object_type(field, &obj, &tok)?;
                    list.push(obj);
                    self.separator(']')?;
                }
                self.next()?;
                Ok(vec![Value::ObjectList(list)])
            }
            scalar if field.is_list() => {
                self.expect_punct('[')?;
                let mut values = Vec::new();
                while !self.peek()?.is_punct(']') {
                    values.push(self.parse_scalar(scalar)?);
                    self.separator(']')?;
                }
                self.next()?;
                Ok(values)
            }
            scalar => (0..field.arity())
                .map(|_| self.parse_scalar(scalar))
                .collect(),
        }
    }

    fn check_object_type(&self, field: &FieldSpec, obj: &InstanceRef, at: &Token) -> Result<()> {
        let Some(required) = field.object_type() else {
            return Ok(());
        };
        let actual = obj.borrow().type_name().to_string();
        if self.registry.is_derived_from(&actual, required) {
            Ok(())
        } else {
            Err(ParseError::conversion(format!(
                "Incorrect object type '{actual}' for field '{}'; expected '{required}'",
                field.name()
            ))
            .at(self.location(at)))
        }
    }

    fn parse_scalar(&mut self, value_type: ValueType) -> Result<Value> {
        let tok = self.next()?;
        let quoted = tok.kind == TokenKind::QuotedString;
        // Bool and numeric text may be bare or quoted
        let text = quoted || matches!(tok.kind, TokenKind::Identifier | TokenKind::Number);
        let value = match value_type {
            ValueType::Bool if text => coder::decode_bool(&tok.text).map(Value::Bool),
            ValueType::Bool => Err(ParseError::conversion(format!("Invalid bool value {tok}"))),
            ValueType::Int if text => coder::decode_int(&tok.text).map(Value::Int),
            ValueType::Int => Err(ParseError::conversion(format!("Invalid integer value {tok}"))),
            ValueType::UInt if text => coder::decode_uint(&tok.text).map(Value::UInt),
            ValueType::UInt => Err(ParseError::conversion(format!(
                "Invalid unsigned integer value {tok}"
            ))),
            ValueType::Float if text => coder::decode_float(&tok.text).map(Value::Float),
            ValueType::Float => Err(ParseError::conversion(format!("Invalid float value {tok}"))),
            ValueType::String if quoted => Ok(Value::String(tok.text.clone())),
            ValueType::String => Err(ParseError::conversion(format!(
                "Expected quoted string, got {tok}"
            ))),
            ValueType::Object | ValueType::ObjectList => Err(ParseError::syntax(format!(
                "Expected scalar value, got {tok}"
            ))),
        };
        value.map_err(|e| e.at(self.location(&tok)))
    }
}
