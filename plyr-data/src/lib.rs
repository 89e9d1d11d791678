//! Plyr Data Crate
//!
//! Schema-driven decoding of PLY files. The header is parsed into
//! [`Header`]; callers bind the properties they want to typed buffers in a
//! [`BindingTable`] and a [`DataWalker`] fills them from ASCII or binary data.
//!
//! ```no_run
//! use std::fs::File;
//! use std::io::BufReader;
//! use plyr_data::{BindingTable, DataType, DataWalker, Header, ListCapacity};
//!
//! # fn main() -> plyr_data::Result<()> {
//! let mut reader = BufReader::new(File::open("mesh.ply")?);
//! let header = Header::parse(&mut reader)?;
//!
//! let mut bindings = BindingTable::new();
//! let xyz = bindings.bind_scalars(&header, "vertex", &["x", "y", "z"], DataType::Float32)?;
//! let faces = bindings.bind_list(&header, "face", "vertex_indices", DataType::UInt32, ListCapacity::Growable)?;
//!
//! DataWalker::new(&header).read(&mut reader, &mut bindings)?;
//! let positions: Vec<f32> = bindings.buffer(xyz).to_vec()?;
//! let indices: Vec<u32> = bindings.buffer(faces).to_vec()?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod ply;
pub mod types;

pub use error::{PlyError, Result};
pub use ply::{
    BindingTable, BufferId, DataWalker, Element, Format, Header, ListCapacity, PlyVertex, Property,
    PropertyBuffer, load_vertices_from_ply, ply_has_faces, read_header,
};
pub use types::{ByteOrder, DataType, Scalar};
