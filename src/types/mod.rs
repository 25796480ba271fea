//! Entity model: identifiers, vertices, edges, contexts and the alphabet.

pub mod ids;
pub mod vertex;
pub mod edge;
pub mod context;
pub mod alphabet;

pub use ids::{ContextId, EdgeId, ElementId, IdGenerator, VertexId};
pub use vertex::Vertex;
pub use edge::{Edge, IDENTITY_RELATION};
pub use context::{Context, Polarity};
pub use alphabet::Alphabet;
