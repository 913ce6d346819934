//! Levels of detail
//!
//! A LOD owns its buffers and an ordered section list. Sections partition the
//! vertex and index ranges contiguously, so per-section views are produced by
//! cutting the flat buffers at each section's first id.

mod skeletal_lod;
mod static_lod;

pub use skeletal_lod::{KdiBuffers, SkeletalLod};
pub use static_lod::StaticLod;

use crate::error::{Error, Result};

/// Cut `values` into one slice per section, starting at each of `first_ids`.
///
/// The last section runs to the end of `values`. Cut points past the end or
/// before the previous cut yield empty slices rather than panicking.
#[must_use]
pub fn split_per_section<T: Clone>(values: &[T], first_ids: &[u32]) -> Vec<Vec<T>> {
    let mut cuts: Vec<usize> = Vec::with_capacity(first_ids.len() + 1);
    for &id in first_ids {
        let prev = cuts.last().copied().unwrap_or(0);
        cuts.push((id as usize).clamp(prev, values.len()));
    }
    cuts.push(values.len());
    cuts.windows(2).map(|w| values[w[0]..w[1]].to_vec()).collect()
}

/// Cut a LOD-wide index list per section and rebase each slice so its values
/// are local to the section (`index - first_vertex_id`, never below zero).
#[must_use]
pub fn split_indices(indices: &[u32], first_index_ids: &[u32], first_vertex_ids: &[u32]) -> Vec<Vec<u32>> {
    split_per_section(indices, first_index_ids)
        .into_iter()
        .zip(first_vertex_ids)
        .map(|(ids, &base)| ids.into_iter().map(|id| id.saturating_sub(base)).collect())
        .collect()
}

/// Truncate `items` to `len`, or grow it by cloning the last element.
pub fn resize_by_cloning_last<T: Clone>(items: &mut Vec<T>, len: usize) -> Result<()> {
    match items.last().cloned() {
        Some(last) => items.resize(len, last),
        None if len == 0 => {}
        None => {
            return Err(Error::InvalidInterchange {
                message: "can't grow an empty section list".to_string(),
            });
        }
    }
    Ok(())
}

/// Largest number of non-zero weights on any vertex.
fn max_influences(weights: &[[f32; 4]], weights2: Option<&[[f32; 4]]>) -> u32 {
    (0..weights.len())
        .map(|i| {
            let primary = weights[i].iter().filter(|&&w| w > 0.0).count();
            let secondary = weights2.map_or(0, |w2| w2[i].iter().filter(|&&w| w > 0.0).count());
            (primary + secondary) as u32
        })
        .max()
        .unwrap_or(0)
}
