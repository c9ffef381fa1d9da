//! # glm-core: GLM Model Core
//!
//! Typed in-memory representation of a GLM power-distribution network
//! description, with a schema registry, a validated mutation API, comment
//! side tables, and a topology graph projection.
//!
//! ## Design Philosophy
//!
//! A GLM file is a flat namespace of class instances plus a small amount
//! of simulation scaffolding (clock, directives, schedules). The model
//! mirrors that:
//!
//! - **Schema first**: every attribute write passes through the
//!   [`schema::SchemaRegistry`], which maps declared primitive kinds onto
//!   closed [`value::AttributeValue`] variants
//! - **Lenient by policy**: anomalies (unknown attributes, dangling
//!   references, identity clashes) accumulate in
//!   [`diagnostics::Diagnostics`] instead of aborting
//! - **Comments as data**: user comments survive a round trip through the
//!   positional side tables in [`comments`]
//! - **Graph projection**: edge-class instances and `parent` containment
//!   become a petgraph `UnGraph` for structural queries
//!
//! ## Quick Start
//!
//! ```rust
//! use glm_core::{Diagnostics, Model};
//!
//! let mut diag = Diagnostics::new();
//! let mut model = Model::with_bundled_schema(&mut diag).unwrap();
//!
//! model.add_object("node", "feeder_head", &[("bustype", "SWING")], &mut diag);
//! model.add_object("meter", "m1", &[("parent", "feeder_head")], &mut diag);
//! model.set_clock("'2023-07-01 00:00:00'", "'2023-07-02 00:00:00'", "EST+5EDT");
//!
//! let topo = glm_core::graph::build_graph(&model, &mut diag);
//! assert_eq!(topo.stats().node_count, 2);
//! ```
//!
//! ## Modules
//!
//! - [`model`] - Entity stores, the [`model::Model`] aggregate, mutation API
//! - [`schema`] - Class/attribute registry loaded from declarative JSON
//! - [`value`] - Semantic kinds and the closed attribute value enum
//! - [`comments`] - Positional comment side tables
//! - [`graph`] - Topology graph builder, stats, DOT export
//! - [`diagnostics`] - Warning/error accumulation and parse statistics
//! - [`error`] - Fatal error enum and result alias
//!
//! ## Integration with glm-io
//!
//! The glm-io crate provides the block parser and serializer that move
//! [`model::Model`] values to and from GLM text.

pub mod comments;
pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod model;
pub mod schema;
pub mod value;

pub use comments::{CommentTables, EntityComments, KEY_LAST, KEY_NAME};
pub use diagnostics::{DiagnosticIssue, Diagnostics, ParseStats, Severity};
pub use error::{GlmError, GlmResult};
pub use graph::{build_graph, GraphStats, TopologyGraph};
pub use model::{EntityStore, Instance, Model};
pub use schema::{is_edge_class, is_node_class, AttributeDescriptor, ClassSchema, SchemaRegistry};
pub use value::{AttributeValue, SemanticKind};
