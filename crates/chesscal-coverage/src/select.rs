use crate::area::{board_polygon, CoverageAccumulator};
use chesscal_core::CornerSet;
use geo::Polygon;
use log::debug;
use rayon::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Greedily pick at most `k` valid sets that together cover the most image area.
///
/// Invalid sets are dropped first. A valid pool of at most `k` sets is
/// returned as is. Otherwise each of the `k` rounds scores every remaining
/// candidate in parallel by the union area it would produce and commits the
/// best one; ties go to the candidate that appears first in `pool`.
///
/// This is the usual greedy approximation to maximum coverage, not an
/// optimal subset search.
#[cfg_attr(feature = "tracing", instrument(level = "info", skip(pool), fields(pool = pool.len())))]
pub fn select(pool: &[CornerSet], k: usize) -> Vec<CornerSet> {
    let valid: Vec<&CornerSet> = pool.iter().filter(|s| s.is_valid()).collect();
    if valid.len() <= k {
        return valid.into_iter().cloned().collect();
    }

    let polygons: Vec<Option<Polygon<f64>>> = valid.par_iter().map(|s| board_polygon(s)).collect();
    let mut remaining: Vec<usize> = (0..valid.len()).collect();
    let mut chosen = Vec::with_capacity(k);
    let mut acc = CoverageAccumulator::new();

    for round in 0..k {
        let current = acc.area();
        let mut scored: Vec<(usize, f64)> = remaining
            .par_iter()
            .map(|&i| {
                let area = polygons[i]
                    .as_ref()
                    .map_or(current, |poly| acc.area_with(poly));
                (i, area)
            })
            .collect();
        // Stable: equal scores keep pool order.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let Some(&(best, area)) = scored.first() else {
            break;
        };
        debug!("round {}: picked view {} (coverage {:.1} px^2)", round, best, area);

        if let Some(poly) = polygons[best].clone() {
            acc.add_polygon(poly);
        }
        remaining.retain(|&i| i != best);
        chosen.push(best);
    }

    chosen.into_iter().map(|i| valid[i].clone()).collect()
}
