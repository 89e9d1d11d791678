//! Data section walker
//!
//! Visits every element, instance and property in file order. Bound
//! properties are converted into their destination buffers; everything else
//! is skipped so the source stays aligned for the elements that follow.

use std::io::Read;

use tracing::{debug, info};

use crate::error::{PlyError, Result};
use crate::ply::binding::{BindingTable, BufferId};
use crate::ply::header::{Element, Header, Property};
use crate::ply::source::{AsciiSource, BinarySource, SourceError, ValueSource};

/// Decodes the data section described by a [`Header`].
pub struct DataWalker<'h> {
    header: &'h Header,
}

impl<'h> DataWalker<'h> {
    pub fn new(header: &'h Header) -> Self {
        Self { header }
    }

    /// Read the rest of `reader` as the data section.
    ///
    /// `reader` must be positioned right after `end_header`, which is where
    /// [`Header::parse`] leaves it.
    pub fn read<R: Read>(&self, reader: &mut R, bindings: &mut BindingTable) -> Result<()> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.read_bytes(&data, bindings)
    }

    /// Decode a contiguous data section that starts at its first record.
    #[tracing::instrument(skip_all, fields(format = ?self.header.format, len = data.len()))]
    pub fn read_bytes(&self, data: &[u8], bindings: &mut BindingTable) -> Result<()> {
        match self.header.format.byte_order() {
            Some(order) => self.walk(&mut BinarySource::new(data, order), bindings),
            None => {
                let text = String::from_utf8_lossy(data);
                self.walk(&mut AsciiSource::new(&text), bindings)
            }
        }
    }

    fn walk<S: ValueSource>(&self, source: &mut S, bindings: &mut BindingTable) -> Result<()> {
        let mut marks = Vec::new();

        for element in &self.header.elements {
            let slots: Vec<Option<BufferId>> = element
                .properties
                .iter()
                .map(|p| bindings.lookup(&element.name, &p.name))
                .collect();

            let mut bound: Vec<BufferId> = slots.iter().flatten().copied().collect();
            bound.dedup();

            if bound.is_empty() && skip_fixed_rows(source, element) {
                debug!("Skipped element '{}' ({} rows)", element.name, element.count);
                continue;
            }

            for instance in 0..element.count {
                marks.clear();
                marks.extend(bound.iter().map(|&id| bindings.buffer(id).mark()));

                if let Err(err) = read_instance(source, element, &slots, instance, bindings) {
                    // Drop the partial instance so buffers only hold whole records.
                    for (&id, &mark) in bound.iter().zip(&marks) {
                        bindings.buffer_mut(id).rollback(mark);
                    }
                    return Err(err);
                }
            }

            debug!(
                "Walked element '{}': {} instances, {} bound properties",
                element.name,
                element.count,
                slots.iter().filter(|s| s.is_some()).count()
            );
        }

        if source.has_trailing() {
            debug!("Ignoring data after the last element");
        }
        info!("Decoded {} elements", self.header.elements.len());
        Ok(())
    }
}

/// Skip a whole element of fixed-width binary rows in one step.
fn skip_fixed_rows<S: ValueSource>(source: &mut S, element: &Element) -> bool {
    match element.row_width() {
        Some(width) => match width.checked_mul(element.count) {
            Some(len) => source.skip_bytes(len),
            None => false,
        },
        None => false,
    }
}

fn read_instance<S: ValueSource>(
    source: &mut S,
    element: &Element,
    slots: &[Option<BufferId>],
    instance: usize,
    bindings: &mut BindingTable,
) -> Result<()> {
    for (property, slot) in element.properties.iter().zip(slots) {
        let at = Location {
            element,
            property,
            instance,
        };

        let len = match property.list_count_type {
            Some(count_type) => {
                let count = source.read(count_type).map_err(|e| at.error(e))?;
                count
                    .as_count()
                    .ok_or_else(|| at.malformed(format!("invalid list count {}", count)))?
            }
            None => 1,
        };

        match slot {
            Some(id) => {
                let buffer = bindings.buffer_mut(*id);
                if property.is_list() {
                    buffer.begin_list(len);
                }
                for _ in 0..len {
                    let value = source.read(property.data_type).map_err(|e| at.error(e))?;
                    if !buffer.push(value) {
                        return Err(PlyError::BufferOverflow {
                            element: element.name.clone(),
                            property: property.name.clone(),
                            limit: buffer.limit().unwrap_or(buffer.len()),
                        });
                    }
                }
            }
            None => source
                .skip_many(property.data_type, len)
                .map_err(|e| at.error(e))?,
        }
    }
    Ok(())
}

struct Location<'a> {
    element: &'a Element,
    property: &'a Property,
    instance: usize,
}

impl Location<'_> {
    fn error(&self, err: SourceError) -> PlyError {
        match err {
            SourceError::Underrun {
                offset,
                needed,
                available,
            } => PlyError::BufferUnderrun {
                element: self.element.name.clone(),
                property: self.property.name.clone(),
                instance: self.instance,
                offset,
                needed,
                available,
            },
            SourceError::Malformed(reason) => self.malformed(reason),
        }
    }

    fn malformed(&self, reason: String) -> PlyError {
        PlyError::MalformedData {
            element: self.element.name.clone(),
            property: self.property.name.clone(),
            instance: self.instance,
            reason,
        }
    }
}
