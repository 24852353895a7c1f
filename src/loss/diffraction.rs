use arrayvec::ArrayVec;
use ordered_float::OrderedFloat;

use crate::geometry::{FloatType, WorldPoint};

use super::{LinkParameters, fspl_db};

/// Fresnel-Kirchhoff diffraction parameter of `edge` on the path from `a` to `b`.
pub fn fresnel_kirchhoff_v(
    a: &WorldPoint,
    b: &WorldPoint,
    edge: &WorldPoint,
    wavelength: FloatType,
) -> FloatType {
    let r1 = (edge - a).norm();
    let r2 = (b - edge).norm();
    let distance = (b - a).norm();

    let clearance = r1 * (edge - a).angle(&(b - a)).sin();
    clearance * (2.0 * distance / (wavelength * r1 * r2)).sqrt()
}

/// Single knife edge loss in dB for the diffraction parameter `v`.
pub fn knife_edge_db(v: FloatType) -> FloatType {
    6.9 + 20.0 * (((v - 0.1).powi(2) + 1.0).sqrt() + v - 0.1).log10()
}

/// Loss of a path bent over `edges`, on top of the free space loss between tx and rx.
/// Edges may come in any order.
pub fn diffracted_loss_db(
    tx: &WorldPoint,
    rx: &WorldPoint,
    edges: &[WorldPoint],
    link: &LinkParameters,
) -> FloatType {
    let wavelength = link.wavelength();
    let v = |a: &WorldPoint, b: &WorldPoint, edge: &WorldPoint| {
        fresnel_kirchhoff_v(a, b, edge, wavelength)
    };

    let mut edges = edges.to_vec();
    order_along_path(tx, rx, &mut edges);

    let baseline = fspl_db((rx - tx).norm(), link.frequency_hz);

    match edges.as_slice() {
        [] => baseline,
        [edge] => baseline + knife_edge_db(v(tx, rx, edge)),
        [near_tx, near_rx] => {
            let near_tx_v = v(tx, rx, near_tx);
            let near_rx_v = v(tx, rx, near_rx);

            let (main, support) = if near_tx_v > near_rx_v {
                (near_tx_v, v(near_tx, rx, near_rx))
            } else {
                (near_rx_v, v(tx, near_rx, near_tx))
            };

            baseline + knife_edge_db(main) + finite_or_zero(knife_edge_db(support))
        }
        _ => {
            let strongest = strongest_three(tx, rx, &edges, wavelength);
            let &[near_tx, center, near_rx] = strongest.as_slice() else {
                unreachable!("there are always at least three edges here");
            };

            let near_tx_v = v(tx, rx, &near_tx);
            let center_v = v(tx, rx, &center);
            let near_rx_v = v(tx, rx, &near_rx);
            let max_v = near_tx_v.max(center_v).max(near_rx_v);

            let (main, support1, support2) = if near_tx_v == max_v {
                (
                    near_tx_v,
                    v(&near_tx, &near_rx, &center),
                    v(&center, rx, &near_rx),
                )
            } else if near_rx_v == max_v {
                (
                    near_rx_v,
                    v(tx, &center, &near_tx),
                    v(&near_tx, &near_rx, &center),
                )
            } else {
                (center_v, v(tx, &center, &near_tx), v(&center, rx, &near_rx))
            };

            baseline
                + knife_edge_db(main)
                + finite_or_zero(knife_edge_db(support1))
                + finite_or_zero(knife_edge_db(support2))
        }
    }
}

/// Sorts edges by their distance from tx, projected on the tx-rx direction.
fn order_along_path(tx: &WorldPoint, rx: &WorldPoint, edges: &mut [WorldPoint]) {
    let direction = rx - tx;
    edges.sort_by_key(|edge| OrderedFloat((edge - tx).dot(&direction)));
}

/// Three edges with the largest diffraction parameter, in order along the path.
fn strongest_three(
    tx: &WorldPoint,
    rx: &WorldPoint,
    edges: &[WorldPoint],
    wavelength: FloatType,
) -> ArrayVec<WorldPoint, 3> {
    if let [a, b, c] = edges {
        return ArrayVec::from([*a, *b, *c]);
    }

    let mut by_v = edges.to_vec();
    by_v.sort_by_cached_key(|edge| {
        std::cmp::Reverse(OrderedFloat(fresnel_kirchhoff_v(tx, rx, edge, wavelength)))
    });

    let mut strongest: ArrayVec<WorldPoint, 3> = by_v.into_iter().take(3).collect();
    order_along_path(tx, rx, &mut strongest);
    strongest
}

fn finite_or_zero(x: FloatType) -> FloatType {
    if x.is_finite() { x } else { 0.0 }
}
