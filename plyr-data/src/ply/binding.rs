//! Destination buffers and the table that binds them to header properties

use std::collections::HashMap;

use bytemuck::Pod;
use tracing::debug;

use crate::error::{PlyError, Result};
use crate::ply::header::{Element, Header, Property};
use crate::types::{DataType, Scalar};

/// Typed destination storage with a checked write cursor.
///
/// Values are stored in host byte order as `data_type`. A buffer with a
/// limit rejects writes past that many values instead of growing. Buffers
/// bound to list properties also record the length of every list.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyBuffer {
    data_type: DataType,
    bytes: Vec<u8>,
    limit: Option<usize>,
    list_lengths: Vec<usize>,
}

/// Write position of a buffer, used to undo a partially decoded instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    values: usize,
    lists: usize,
}

/// Upper bound on bytes reserved before any data is read. Counts come from
/// the header, so larger buffers grow as values arrive.
const MAX_RESERVE_BYTES: usize = 64 << 20;

fn reserve_bytes(data_type: DataType, values: usize) -> usize {
    values
        .saturating_mul(data_type.width())
        .min(MAX_RESERVE_BYTES)
}

impl PropertyBuffer {
    /// A buffer that holds at most `values` values.
    ///
    /// Storage is reserved up front, up to a fixed ceiling.
    pub fn with_capacity(data_type: DataType, values: usize) -> Self {
        Self {
            data_type,
            bytes: Vec::with_capacity(reserve_bytes(data_type, values)),
            limit: Some(values),
            list_lengths: Vec::new(),
        }
    }

    /// A buffer without a value limit.
    pub fn growable(data_type: DataType) -> Self {
        Self {
            data_type,
            bytes: Vec::new(),
            limit: None,
            list_lengths: Vec::new(),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Number of values written so far.
    pub fn len(&self) -> usize {
        self.bytes.len() / self.data_type.width()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Length of each decoded list, in instance order. Empty for scalars.
    pub fn list_lengths(&self) -> &[usize] {
        &self.list_lengths
    }

    /// Values of every list, split using [`Self::list_lengths`].
    pub fn lists(&self) -> impl Iterator<Item = Vec<Scalar>> + '_ {
        let mut start = 0;
        self.list_lengths.iter().map(move |&len| {
            let list = (start..start + len).filter_map(|i| self.get(i)).collect();
            start += len;
            list
        })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Value at `index`, decoded as the destination type.
    pub fn get(&self, index: usize) -> Option<Scalar> {
        let width = self.data_type.width();
        let start = index.checked_mul(width)?;
        let bytes = self.bytes.get(start..start.checked_add(width)?)?;
        Some(Scalar::from_ne_bytes(self.data_type, bytes))
    }

    /// Copy the contents out as `T`, which must match the destination width.
    pub fn to_vec<T: Pod>(&self) -> Result<Vec<T>> {
        let size = std::mem::size_of::<T>();
        if size != self.data_type.width() {
            return Err(PlyError::TypeWidthMismatch {
                data_type: self.data_type,
                size,
            });
        }
        Ok(self
            .bytes
            .chunks_exact(size)
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    /// Convert and append one value. Returns `false` when the buffer is full.
    pub(crate) fn push(&mut self, value: Scalar) -> bool {
        if self.limit.is_some_and(|limit| self.len() >= limit) {
            return false;
        }
        value.write_to(self.data_type, &mut self.bytes);
        true
    }

    pub(crate) fn begin_list(&mut self, len: usize) {
        self.list_lengths.push(len);
    }

    pub(crate) fn mark(&self) -> Mark {
        Mark {
            values: self.len(),
            lists: self.list_lengths.len(),
        }
    }

    pub(crate) fn rollback(&mut self, mark: Mark) {
        self.bytes.truncate(mark.values * self.data_type.width());
        self.list_lengths.truncate(mark.lists);
    }
}

/// Handle to a buffer registered in a [`BindingTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId(usize);

/// How much room a list binding gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListCapacity {
    /// At most this many values across all instances.
    Bounded(usize),
    Growable,
}

/// Maps `(element, property)` pairs to destination buffers for one decode.
#[derive(Debug, Default)]
pub struct BindingTable {
    buffers: Vec<PropertyBuffer>,
    slots: HashMap<(String, String), BufferId>,
}

impl BindingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind scalar properties of one element to a shared buffer.
    ///
    /// Values are interleaved per instance in file order, so binding
    /// `["x", "y", "z"]` yields `x0 y0 z0 x1 y1 z1 ...`.
    pub fn bind_scalars(
        &mut self,
        header: &Header,
        element: &str,
        properties: &[&str],
        data_type: DataType,
    ) -> Result<BufferId> {
        let el = find_element(header, element)?;
        for (i, name) in properties.iter().enumerate() {
            let property = find_property(el, name)?;
            if property.is_list() {
                return Err(mismatch(el, property, "list property bound as scalar"));
            }
            self.check_unbound(el, property)?;
            if properties[..i].contains(name) {
                return Err(PlyError::DuplicateBinding {
                    element: el.name.clone(),
                    property: property.name.clone(),
                });
            }
        }

        let values = el
            .count
            .checked_mul(properties.len())
            .filter(|&values| values.checked_mul(data_type.width()).is_some())
            .ok_or_else(|| count_overflow(el))?;
        let id = self.register(PropertyBuffer::with_capacity(data_type, values));
        for name in properties {
            self.slots
                .insert((el.name.clone(), name.to_string()), id);
        }
        debug!(
            "Bound {}.{:?} as {} ({} values)",
            el.name, properties, data_type, values
        );
        Ok(id)
    }

    /// Bind a list property; every list entry of every instance is appended.
    pub fn bind_list(
        &mut self,
        header: &Header,
        element: &str,
        property: &str,
        data_type: DataType,
        capacity: ListCapacity,
    ) -> Result<BufferId> {
        let el = find_element(header, element)?;
        let prop = find_property(el, property)?;
        if !prop.is_list() {
            return Err(mismatch(el, prop, "scalar property bound as list"));
        }
        let buffer = match capacity {
            ListCapacity::Bounded(values) => PropertyBuffer::with_capacity(data_type, values),
            ListCapacity::Growable => PropertyBuffer::growable(data_type),
        };
        self.bind_buffer(header, element, property, buffer)
    }

    /// Bind a caller-supplied buffer to one property.
    pub fn bind_buffer(
        &mut self,
        header: &Header,
        element: &str,
        property: &str,
        mut buffer: PropertyBuffer,
    ) -> Result<BufferId> {
        let el = find_element(header, element)?;
        let prop = find_property(el, property)?;
        self.check_unbound(el, prop)?;

        if !prop.is_list() {
            let width = buffer.data_type.width();
            let required = el
                .count
                .checked_add(buffer.len())
                .filter(|&required| required.checked_mul(width).is_some())
                .ok_or_else(|| count_overflow(el))?;
            if let Some(capacity) = buffer.limit.filter(|&limit| limit < required) {
                return Err(PlyError::InsufficientCapacity {
                    element: el.name.clone(),
                    property: prop.name.clone(),
                    capacity,
                    required,
                });
            }
            buffer
                .bytes
                .reserve(reserve_bytes(buffer.data_type, el.count));
        }

        let id = self.register(buffer);
        self.slots.insert((el.name.clone(), prop.name.clone()), id);
        debug!("Bound {}.{} to buffer {:?}", el.name, prop.name, id);
        Ok(id)
    }

    /// Buffer bound to `element.property`, if any.
    pub fn lookup(&self, element: &str, property: &str) -> Option<BufferId> {
        self.slots
            .get(&(element.to_string(), property.to_string()))
            .copied()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn buffer(&self, id: BufferId) -> &PropertyBuffer {
        &self.buffers[id.0]
    }

    /// Take a populated buffer out, leaving an empty one in its place.
    pub fn take(&mut self, id: BufferId) -> PropertyBuffer {
        let slot = &mut self.buffers[id.0];
        let empty = PropertyBuffer {
            data_type: slot.data_type,
            bytes: Vec::new(),
            limit: slot.limit,
            list_lengths: Vec::new(),
        };
        std::mem::replace(slot, empty)
    }

    pub(crate) fn buffer_mut(&mut self, id: BufferId) -> &mut PropertyBuffer {
        &mut self.buffers[id.0]
    }

    fn register(&mut self, buffer: PropertyBuffer) -> BufferId {
        self.buffers.push(buffer);
        BufferId(self.buffers.len() - 1)
    }

    fn check_unbound(&self, element: &Element, property: &Property) -> Result<()> {
        if self.lookup(&element.name, &property.name).is_some() {
            return Err(PlyError::DuplicateBinding {
                element: element.name.clone(),
                property: property.name.clone(),
            });
        }
        Ok(())
    }
}

fn find_element<'h>(header: &'h Header, name: &str) -> Result<&'h Element> {
    header
        .element(name)
        .ok_or_else(|| PlyError::UnknownElement(name.to_string()))
}

fn find_property<'e>(element: &'e Element, name: &str) -> Result<&'e Property> {
    element
        .property(name)
        .ok_or_else(|| PlyError::UnknownProperty {
            element: element.name.clone(),
            property: name.to_string(),
        })
}

fn count_overflow(element: &Element) -> PlyError {
    PlyError::CountOverflow {
        element: element.name.clone(),
        count: element.count,
    }
}

fn mismatch(element: &Element, property: &Property, message: &str) -> PlyError {
    PlyError::BindingMismatch {
        element: element.name.clone(),
        property: property.name.clone(),
        message: message.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header() -> Header {
        let text = "ply\nformat ascii 1.0\n\
            element vertex 4\nproperty float x\nproperty float y\n\
            element face 2\nproperty list uchar int vertex_indices\n\
            end_header\n";
        Header::parse(&mut Cursor::new(text.as_bytes())).unwrap()
    }

    #[test]
    fn test_bind_scalars_presizes() {
        let header = header();
        let mut table = BindingTable::new();
        let id = table
            .bind_scalars(&header, "vertex", &["x", "y"], DataType::Float32)
            .unwrap();
        let buffer = table.buffer(id);
        assert_eq!(buffer.limit(), Some(8));
        assert!(buffer.bytes.capacity() >= 32);
        assert_eq!(table.lookup("vertex", "x"), Some(id));
        assert_eq!(table.lookup("vertex", "y"), Some(id));
    }

    #[test]
    fn test_unknown_names() {
        let header = header();
        let mut table = BindingTable::new();
        assert!(matches!(
            table.bind_scalars(&header, "edge", &["x"], DataType::Float32),
            Err(PlyError::UnknownElement(_))
        ));
        assert!(matches!(
            table.bind_scalars(&header, "vertex", &["w"], DataType::Float32),
            Err(PlyError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn test_kind_mismatch() {
        let header = header();
        let mut table = BindingTable::new();
        assert!(matches!(
            table.bind_scalars(&header, "face", &["vertex_indices"], DataType::Int32),
            Err(PlyError::BindingMismatch { .. })
        ));
        assert!(matches!(
            table.bind_list(&header, "vertex", "x", DataType::Float32, ListCapacity::Growable),
            Err(PlyError::BindingMismatch { .. })
        ));
    }

    #[test]
    fn test_duplicate_binding() {
        let header = header();
        let mut table = BindingTable::new();
        table
            .bind_scalars(&header, "vertex", &["x"], DataType::Float32)
            .unwrap();
        assert!(matches!(
            table.bind_scalars(&header, "vertex", &["y", "x"], DataType::Float32),
            Err(PlyError::DuplicateBinding { .. })
        ));
        // The failed call must not leave `y` half-bound.
        assert_eq!(table.lookup("vertex", "y"), None);
    }

    #[test]
    fn test_get_out_of_range() {
        let mut buffer = PropertyBuffer::growable(DataType::UInt16);
        assert!(buffer.push(Scalar::UInt16(7)));
        assert_eq!(buffer.get(0), Some(Scalar::UInt16(7)));
        assert_eq!(buffer.get(1), None);
        assert_eq!(buffer.get(usize::MAX / 2), None);
        assert_eq!(buffer.get(usize::MAX), None);
    }

    #[test]
    fn test_repeated_name_in_one_call() {
        let header = header();
        let mut table = BindingTable::new();
        assert!(matches!(
            table.bind_scalars(&header, "vertex", &["x", "x"], DataType::Float32),
            Err(PlyError::DuplicateBinding { ref property, .. }) if property == "x"
        ));
        assert!(table.is_empty());
        assert_eq!(table.lookup("vertex", "x"), None);
    }

    fn header_with_count(count: usize) -> Header {
        let text = format!(
            "ply\nformat binary_little_endian 1.0\n\
             element vertex {}\nproperty float x\nproperty float y\n\
             end_header\n",
            count
        );
        Header::parse(&mut Cursor::new(text.into_bytes())).unwrap()
    }

    #[test]
    fn test_huge_count_is_rejected() {
        let header = header_with_count(usize::MAX / 2);
        let mut table = BindingTable::new();
        assert!(matches!(
            table.bind_scalars(&header, "vertex", &["x", "y"], DataType::Float32),
            Err(PlyError::CountOverflow { count, .. }) if count == usize::MAX / 2
        ));
        assert!(matches!(
            table.bind_buffer(
                &header,
                "vertex",
                "x",
                PropertyBuffer::growable(DataType::Float32)
            ),
            Err(PlyError::CountOverflow { .. })
        ));
        assert!(table.is_empty());
    }

    #[test]
    fn test_large_count_reserves_bounded_storage() {
        let header = header_with_count(100_000_000_000);
        let mut table = BindingTable::new();
        let id = table
            .bind_scalars(&header, "vertex", &["x", "y"], DataType::Float64)
            .unwrap();
        let buffer = table.buffer(id);
        assert_eq!(buffer.limit(), Some(200_000_000_000));
        assert!(buffer.bytes.capacity() <= MAX_RESERVE_BYTES);

        // The walker still reports the missing data instead of allocating it.
        let result = crate::ply::DataWalker::new(&header).read_bytes(&[0u8; 4], &mut table);
        assert!(matches!(result, Err(PlyError::BufferUnderrun { .. })));
        assert_eq!(table.buffer(id).len(), 0);
    }

    #[test]
    fn test_caller_buffer_too_small() {
        let header = header();
        let mut table = BindingTable::new();
        let err = table
            .bind_buffer(
                &header,
                "vertex",
                "x",
                PropertyBuffer::with_capacity(DataType::Float64, 3),
            )
            .unwrap_err();
        assert!(matches!(
            err,
            PlyError::InsufficientCapacity {
                capacity: 3,
                required: 4,
                ..
            }
        ));
    }

    #[test]
    fn test_push_respects_limit() {
        let mut buffer = PropertyBuffer::with_capacity(DataType::UInt16, 2);
        assert!(buffer.push(Scalar::UInt8(1)));
        assert!(buffer.push(Scalar::Float32(2.7)));
        assert!(!buffer.push(Scalar::UInt8(3)));
        assert_eq!(buffer.to_vec::<u16>().unwrap(), vec![1, 2]);
        assert_eq!(buffer.get(1), Some(Scalar::UInt16(2)));
        assert_eq!(buffer.get(2), None);
    }

    #[test]
    fn test_rollback_restores_lists() {
        let mut buffer = PropertyBuffer::growable(DataType::Int32);
        buffer.begin_list(2);
        buffer.push(Scalar::Int32(1));
        buffer.push(Scalar::Int32(2));
        let mark = buffer.mark();
        buffer.begin_list(3);
        buffer.push(Scalar::Int32(3));
        buffer.rollback(mark);

        assert_eq!(buffer.list_lengths(), &[2]);
        let lists: Vec<Vec<Scalar>> = buffer.lists().collect();
        assert_eq!(lists, vec![vec![Scalar::Int32(1), Scalar::Int32(2)]]);
    }

    #[test]
    fn test_to_vec_checks_width() {
        let buffer = PropertyBuffer::growable(DataType::Float32);
        assert!(matches!(
            buffer.to_vec::<f64>(),
            Err(PlyError::TypeWidthMismatch { size: 8, .. })
        ));
    }
}
