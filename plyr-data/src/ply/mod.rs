//! PLY header parsing and data decoding

mod binding;
mod header;
mod loader;
mod source;
mod vertex;
mod walker;

pub use binding::{BindingTable, BufferId, ListCapacity, PropertyBuffer};
pub use header::{Element, Format, Header, Property};
pub use loader::{load_vertices_from_ply, ply_has_faces, read_header};
pub use vertex::PlyVertex;
pub use walker::DataWalker;
