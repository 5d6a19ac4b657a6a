//! Domain types shared by every stage of a run.

pub mod identifier;
pub mod ids;
pub mod request;
pub mod table;

pub use identifier::{Identifier, IdentifierType};
pub use ids::SessionId;
pub use request::{Catalog, OutputFormat, RequestDescriptor, Session, TerminalIdentity};
pub use table::{render_cell, Row, Table};
