// THEORY:
// Reference color assignment pairs each detected object with one of a small set
// of registered colors (for example, the marker colors of known devices), so a
// caller can tell which registered color an object most likely carries.
//
// Every object must get a distinct reference, so matching is a joint decision:
// the assignment with the lowest total HSL distance wins. The search is
// exhaustive with branch-and-bound pruning, which is cheap for the handful of
// references this is meant for and is capped at `MAX_REFERENCE_COLORS`.

use serde::{Deserialize, Serialize};

use crate::core_modules::color::{Hsl, Pixel, Rgb, hsl_distance};
use crate::core_modules::descriptor::ObjectDescriptor;
use crate::error::ColorMatchError;

pub const MAX_REFERENCE_COLORS: usize = 10;

/// A registered color and the caller's label for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceColor {
    pub label: u32,
    pub rgb: Rgb,
}

/// The reference chosen for one descriptor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorAssignment {
    /// Index into the descriptor slice.
    pub descriptor: usize,
    pub identifier: Option<u64>,
    /// Index into the reference slice.
    pub reference: usize,
    pub label: u32,
    pub distance: f32,
}

/// Assigns a distinct reference color to every descriptor, minimizing the total
/// HSL distance.
///
/// Returns `Ok(None)` when there are more descriptors than references.
pub fn assign_reference_colors(
    descriptors: &[ObjectDescriptor],
    references: &[ReferenceColor],
) -> Result<Option<Vec<ColorAssignment>>, ColorMatchError> {
    if references.len() > MAX_REFERENCE_COLORS {
        return Err(ColorMatchError::TooManyReferences {
            max: MAX_REFERENCE_COLORS,
            actual: references.len(),
        });
    }
    if descriptors.len() > references.len() {
        return Ok(None);
    }

    let detected: Vec<Hsl> = descriptors
        .iter()
        .map(|d| Pixel::from(d.average_color).to_hsl())
        .collect();
    let registered: Vec<Hsl> = references
        .iter()
        .map(|r| Pixel::from(r.rgb).to_hsl())
        .collect();
    let costs: Vec<Vec<f32>> = detected
        .iter()
        .map(|d| registered.iter().map(|r| hsl_distance(d, r)).collect())
        .collect();

    let choice = optimal_assignment(&costs, references.len());
    Ok(Some(
        choice
            .into_iter()
            .enumerate()
            .map(|(i, reference)| ColorAssignment {
                descriptor: i,
                identifier: descriptors[i].identifier,
                reference,
                label: references[reference].label,
                distance: costs[i][reference],
            })
            .collect(),
    ))
}

/// Minimum-total-cost injective mapping of rows onto `columns` columns.
///
/// Among equal totals, the first one found in row-major search order wins.
fn optimal_assignment(costs: &[Vec<f32>], columns: usize) -> Vec<usize> {
    struct Search<'a> {
        costs: &'a [Vec<f32>],
        used: Vec<bool>,
        current: Vec<usize>,
        best: Vec<usize>,
        best_total: f32,
    }

    impl Search<'_> {
        fn descend(&mut self, row: usize, total: f32) {
            if total >= self.best_total {
                return;
            }
            if row == self.costs.len() {
                self.best_total = total;
                self.best = self.current.clone();
                return;
            }
            for column in 0..self.used.len() {
                if self.used[column] {
                    continue;
                }
                self.used[column] = true;
                self.current.push(column);
                self.descend(row + 1, total + self.costs[row][column]);
                self.current.pop();
                self.used[column] = false;
            }
        }
    }

    let mut search = Search {
        costs,
        used: vec![false; columns],
        current: Vec::with_capacity(costs.len()),
        best: Vec::new(),
        best_total: f32::INFINITY,
    };
    search.descend(0, 0.0);
    search.best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::contour::{Contour, Point};

    fn detected(rgb: Rgb, identifier: u64) -> ObjectDescriptor {
        ObjectDescriptor {
            contour: Contour::from_points(vec![Point::new(0, 0)]),
            area: 10.0,
            centroid: (0.0, 0.0),
            average_color: rgb,
            identifier: Some(identifier),
        }
    }

    fn references() -> Vec<ReferenceColor> {
        vec![
            ReferenceColor { label: 1, rgb: [255, 0, 0] },
            ReferenceColor { label: 2, rgb: [0, 255, 0] },
            ReferenceColor { label: 3, rgb: [0, 0, 255] },
        ]
    }

    #[test]
    fn matches_each_object_to_its_nearest_reference() {
        let descriptors = vec![
            detected([20, 30, 220], 7),
            detected([230, 40, 30], 8),
            detected([40, 200, 60], 9),
        ];
        let assignments = assign_reference_colors(&descriptors, &references())
            .unwrap()
            .unwrap();
        let labels: Vec<u32> = assignments.iter().map(|a| a.label).collect();
        assert_eq!(labels, vec![3, 1, 2]);
        assert_eq!(assignments[0].identifier, Some(7));
    }

    #[test]
    fn fewer_objects_than_references_is_fine() {
        let descriptors = vec![detected([10, 240, 10], 1)];
        let assignments = assign_reference_colors(&descriptors, &references())
            .unwrap()
            .unwrap();
        assert_eq!(assignments.len(), 1);
        assert_eq!(assignments[0].reference, 1);
    }

    #[test]
    fn more_objects_than_references_yields_none() {
        let descriptors: Vec<ObjectDescriptor> =
            (0..4).map(|i| detected([255, 0, 0], i)).collect();
        assert_eq!(assign_reference_colors(&descriptors, &references()), Ok(None));
    }

    #[test]
    fn reference_count_is_capped() {
        let many: Vec<ReferenceColor> = (0..=MAX_REFERENCE_COLORS as u32)
            .map(|label| ReferenceColor { label, rgb: [0, 0, 0] })
            .collect();
        assert_eq!(
            assign_reference_colors(&[], &many),
            Err(ColorMatchError::TooManyReferences {
                max: MAX_REFERENCE_COLORS,
                actual: MAX_REFERENCE_COLORS + 1,
            })
        );
    }

    #[test]
    fn joint_optimum_beats_per_row_greedy() {
        // Greedy would give row 0 column 0 (0.10) and row 1 column 1 (5.0).
        let costs = vec![vec![0.10, 0.15], vec![0.12, 5.0]];
        assert_eq!(optimal_assignment(&costs, 2), vec![1, 0]);
    }

    #[test]
    fn empty_input_assigns_nothing() {
        assert_eq!(assign_reference_colors(&[], &references()), Ok(Some(Vec::new())));
    }
}
