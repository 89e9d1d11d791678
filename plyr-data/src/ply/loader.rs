//! PLY file loading functions

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::error::{PlyError, Result};
use crate::ply::{BindingTable, DataWalker, Element, Header, PlyVertex};
use crate::types::DataType;

const COLOR_NAMES: [[&str; 3]; 2] = [["red", "green", "blue"], ["r", "g", "b"]];

/// Read only the header of a PLY file.
pub fn read_header(path: impl AsRef<Path>) -> Result<Header> {
    let mut reader = BufReader::new(File::open(path)?);
    Header::parse(&mut reader)
}

/// Load vertex positions and colors from a PLY file.
///
/// Requires `x`, `y`, `z` on the `vertex` element. Colors come from
/// `red/green/blue` or `r/g/b`; integer channels are scaled from 0-255.
#[tracing::instrument(skip_all, fields(path = %path.as_ref().display()))]
pub fn load_vertices_from_ply(path: impl AsRef<Path>) -> Result<Vec<PlyVertex>> {
    debug!("Loading PLY vertices");
    let mut reader = BufReader::new(File::open(path.as_ref())?);
    let header = Header::parse(&mut reader)?;
    let vertex = header
        .element("vertex")
        .ok_or_else(|| PlyError::UnknownElement("vertex".to_string()))?;

    let mut bindings = BindingTable::new();
    let positions = bindings.bind_scalars(&header, "vertex", &["x", "y", "z"], DataType::Float32)?;

    let color_channels = COLOR_NAMES
        .iter()
        .find(|names| names.iter().all(|name| vertex.property(name).is_some()));
    let colors = match color_channels {
        Some(names) => Some((
            bindings.bind_scalars(&header, "vertex", names, DataType::Float32)?,
            color_divisor(vertex, names[0]),
        )),
        None => {
            warn!("No color information found, using default color");
            None
        }
    };

    DataWalker::new(&header).read(&mut reader, &mut bindings)?;

    let positions = bindings.buffer(positions).to_vec::<f32>()?;
    let colors = match colors {
        Some((id, divisor)) => Some((bindings.buffer(id).to_vec::<f32>()?, divisor)),
        None => None,
    };

    let vertices: Vec<PlyVertex> = positions
        .chunks_exact(3)
        .enumerate()
        .map(|(i, p)| {
            let color = match &colors {
                Some((rgb, divisor)) => Vec3::from_slice(&rgb[i * 3..i * 3 + 3]) / *divisor,
                None => PlyVertex::DEFAULT_COLOR,
            };
            PlyVertex::new(Vec3::from_slice(p), color)
        })
        .collect();

    info!(
        "PLY file parsed: {} vertices, faces: {}",
        vertices.len(),
        header.has_element("face")
    );
    Ok(vertices)
}

/// Check if a PLY file declares face data without reading the data section.
pub fn ply_has_faces(path: impl AsRef<Path>) -> Result<bool> {
    let header = read_header(path)?;
    Ok(header.element("face").is_some_and(|face| face.count > 0))
}

fn color_divisor(vertex: &Element, channel: &str) -> f32 {
    match vertex.property(channel) {
        Some(p) if p.data_type.is_float() => 1.0,
        _ => 255.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(contents: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_ascii_with_colors() {
        let file = write_temp(
            b"ply\nformat ascii 1.0\n\
              element vertex 2\n\
              property float x\nproperty float y\nproperty float z\n\
              property uchar red\nproperty uchar green\nproperty uchar blue\n\
              element face 1\nproperty list uchar int vertex_indices\n\
              end_header\n\
              0 0 0 255 0 0\n\
              1 2 3 0 255 51\n\
              2 0 1\n",
        );

        let vertices = load_vertices_from_ply(file.path()).unwrap();
        assert_eq!(vertices.len(), 2);
        assert_eq!(vertices[0].color, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(vertices[1].position, Vec3::new(1.0, 2.0, 3.0));
        assert!((vertices[1].color - Vec3::new(0.0, 1.0, 0.2)).length() < 1e-6);
        assert!(ply_has_faces(file.path()).unwrap());
    }

    #[test]
    fn test_load_binary_without_colors() {
        let mut doc = b"ply\nformat binary_little_endian 1.0\n\
            element vertex 1\nproperty float x\nproperty float y\nproperty float z\n\
            end_header\n"
            .to_vec();
        for v in [4.0f32, 5.0, 6.0] {
            doc.extend_from_slice(&v.to_le_bytes());
        }
        let file = write_temp(&doc);

        let vertices = load_vertices_from_ply(file.path()).unwrap();
        assert_eq!(
            vertices,
            vec![PlyVertex::new(Vec3::new(4.0, 5.0, 6.0), PlyVertex::DEFAULT_COLOR)]
        );
        assert!(!ply_has_faces(file.path()).unwrap());
    }

    #[test]
    fn test_missing_vertex_element() {
        let file = write_temp(b"ply\nformat ascii 1.0\nelement face 0\nend_header\n");
        assert!(matches!(
            load_vertices_from_ply(file.path()),
            Err(PlyError::UnknownElement(_))
        ));
    }
}
