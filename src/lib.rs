//! objgraph - Declarative Object-Graph Description Language
//!
//! Reads and writes text files that describe a graph of typed, optionally
//! named objects. Consumer types register their fields once; the parser then
//! builds instances, resolves references and clones, splices in constants
//! and included files, and the writer serializes a graph back out.
//!
//! ## Pipeline
//! Text -> Tokenizer -> Object Parser (scopes, constants, includes)
//!      -> Registry field specs -> Instance graph -> Writer -> Text
//!
//! ## Quick Start
//!
//! ```rust
//! use objgraph::{field, view, Field, Parser, Registry, SpecBuilder};
//!
//! #[derive(Default)]
//! struct Light {
//!     intensity: Field<f32>,
//! }
//!
//! let mut registry = Registry::new();
//! registry
//!     .add_type(
//!         SpecBuilder::<Light>::new()
//!             .add_float("intensity", field!(Light, intensity))
//!             .build("Light"),
//!     )
//!     .unwrap();
//!
//! let output = Parser::new(&registry)
//!     .parse_str(r#"Light "Sun" { intensity: 2.5 }"#)
//!     .unwrap();
//! assert_eq!(*view::<Light>(&output.root).unwrap().intensity, 2.5);
//! ```

// Core error handling
pub mod error;

// Lexing and scalar text conversion
pub mod coder;
pub mod tokenizer;

// Values, instances and registered type descriptions
pub mod instance;
pub mod registry;
pub mod spec;
pub mod value;

// Parsing, writing and include tracking
pub mod config;
pub mod deps;
pub mod parser;
pub mod writer;

// Application helpers
pub mod loader;
pub mod store;

// Essential error types
pub use error::{ErrorKind, ParseError, Result, SourceLocation};

// Data model
pub use instance::{instance_id, same_instance, view, view_mut, Instance, InstanceRef};
pub use registry::{global, Registry};
pub use spec::{Accessor, FieldSpec, ObjectSpec, SpecBuilder};
pub use value::{Field, Scalar, Value, ValueType};

// Reading and writing
pub use config::ParseOptions;
pub use deps::{DependencyEdge, DependencyGraph};
pub use parser::{ParseOutput, Parser};
pub use store::InstanceStore;
pub use tokenizer::{Token, TokenKind, Tokenizer};
pub use writer::{WriteError, WriteOptions, Writer};
