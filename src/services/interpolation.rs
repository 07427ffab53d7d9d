//! Price interpolation engine
//!
//! Synthesizes a price from stored neighbors when the oracle has nothing:
//! linear interpolation when the target is bracketed, bounded extrapolation
//! when all usable points sit on one side. Every synthesized value carries a
//! confidence score; anything under the configured threshold is declined.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::config::InterpolationConfig;
use crate::errors::StoreError;
use crate::models::price::{
    InterpolationDetails, InterpolationMethod, Network, PricePoint, PriceRecord, Provenance,
};
use crate::services::store::PriceStore;

/// Extrapolated prices are floored here; the engine must never emit a
/// non-positive price.
const MIN_EXTRAPOLATED_PRICE: f64 = 0.0001;

#[derive(Debug, Clone, Copy)]
struct Point {
    ts_ms: i64,
    usd: f64,
}

pub struct InterpolationEngine {
    store: Arc<dyn PriceStore>,
    config: InterpolationConfig,
}

impl InterpolationEngine {
    pub fn new(store: Arc<dyn PriceStore>, config: InterpolationConfig) -> Self {
        Self { store, config }
    }

    /// Fetch neighbors around `target` and try to synthesize. `Ok(None)`
    /// means the engine declines and the caller should fall through.
    pub async fn interpolate(
        &self,
        token: &str,
        network: Network,
        target: DateTime<Utc>,
    ) -> Result<Option<PriceRecord>, StoreError> {
        let neighbors = self
            .store
            .get_nearest_prices(token, network, target, self.config.max_data_points)
            .await?;
        Ok(self.synthesize(token, network, target, &neighbors))
    }

    pub fn synthesize(
        &self,
        token: &str,
        network: Network,
        target: DateTime<Utc>,
        neighbors: &[PriceRecord],
    ) -> Option<PriceRecord> {
        let window = Duration::hours(self.config.max_time_gap_hours);
        let target_ms = target.timestamp_millis();

        let mut usable: Vec<Point> = neighbors
            .iter()
            .filter(|r| {
                let gap = r.timestamp - target;
                gap.abs() <= window
            })
            .map(|r| Point {
                ts_ms: r.timestamp.timestamp_millis(),
                usd: r.usd,
            })
            .collect();
        usable.sort_by_key(|p| p.ts_ms);

        if usable.len() < 2 {
            tracing::debug!(
                token = %token,
                network = %network,
                usable = usable.len(),
                "interpolation declined: not enough points in window"
            );
            return None;
        }

        let before: Vec<Point> = usable.iter().copied().filter(|p| p.ts_ms <= target_ms).collect();
        let after: Vec<Point> = usable.iter().copied().filter(|p| p.ts_ms >= target_ms).collect();

        let (usd, confidence, method, used) = if !before.is_empty() && !after.is_empty() {
            let b = *before.last().expect("non-empty");
            let a = after[0];
            let (usd, ratio) = linear_interpolate(b, a, target_ms);
            let confidence = combine(linear_time_confidence(ratio), volatility_confidence(b.usd, a.usd));
            (usd, confidence, InterpolationMethod::Linear, vec![b, a])
        } else {
            let side = if after.is_empty() { &before } else { &after };
            let (anchor, other) = adjacent_pair(side, target_ms)?;
            let (usd, time_confidence) = extrapolate(
                anchor,
                other,
                target_ms,
                self.config.extrapolation_max_change_percent,
            )?;
            let confidence = combine(time_confidence, volatility_confidence(other.usd, anchor.usd));
            (
                usd,
                confidence,
                InterpolationMethod::Extrapolation,
                vec![other, anchor],
            )
        };

        if confidence < self.config.min_confidence_threshold {
            tracing::debug!(
                token = %token,
                network = %network,
                confidence,
                threshold = self.config.min_confidence_threshold,
                "interpolation declined: confidence below threshold"
            );
            return None;
        }
        if usd <= 0.0 {
            return None;
        }

        let data_points_used = used
            .into_iter()
            .map(|p| PricePoint {
                timestamp: DateTime::from_timestamp_millis(p.ts_ms).unwrap_or(target),
                usd: p.usd,
                source: "fromDB".to_string(),
            })
            .collect();

        Some(PriceRecord {
            token: token.to_lowercase(),
            network,
            timestamp: target,
            usd,
            last_updated: Utc::now(),
            symbol: None,
            name: None,
            decimals: None,
            total_supply: None,
            logo_uri: None,
            provenance: Provenance::Interpolated,
            interpolation: Some(InterpolationDetails {
                method,
                confidence,
                data_points_used,
            }),
        })
    }
}

/// Nearest point on the side (the anchor) plus its adjacent point. None when
/// the side has fewer than two points.
fn adjacent_pair(side: &[Point], target_ms: i64) -> Option<(Point, Point)> {
    if side.len() < 2 {
        return None;
    }
    if side[0].ts_ms > target_ms {
        // future side, sorted ascending: anchor first
        Some((side[0], side[1]))
    } else {
        // past side: anchor last
        Some((side[side.len() - 1], side[side.len() - 2]))
    }
}

fn linear_interpolate(before: Point, after: Point, target_ms: i64) -> (f64, f64) {
    let span = after.ts_ms - before.ts_ms;
    let ratio = if span == 0 {
        0.0
    } else {
        (target_ms - before.ts_ms) as f64 / span as f64
    };
    let usd = before.usd + (after.usd - before.usd) * ratio;
    (usd, ratio)
}

/// Linear rate between `other` and `anchor` applied across the gap from the
/// anchor to the target, clamped to ±`max_change_percent` of the anchor
/// price and floored at MIN_EXTRAPOLATED_PRICE. None when the two reference
/// timestamps coincide (no rate exists).
fn extrapolate(
    anchor: Point,
    other: Point,
    target_ms: i64,
    max_change_percent: f64,
) -> Option<(f64, f64)> {
    let time_diff = anchor.ts_ms - other.ts_ms;
    if time_diff == 0 {
        return None;
    }
    let rate = (anchor.usd - other.usd) / time_diff as f64;
    let gap = (target_ms - anchor.ts_ms) as f64;
    let raw = anchor.usd + rate * gap;

    let k = max_change_percent / 100.0;
    let low = anchor.usd * (1.0 - k);
    let high = anchor.usd * (1.0 + k);
    let usd = raw.clamp(low, high).max(MIN_EXTRAPOLATED_PRICE);

    let span = time_diff.abs() as f64;
    let distance = gap.abs();
    let time_confidence = if span == 0.0 {
        0.1
    } else {
        (1.0 - distance / span).max(0.1)
    };

    Some((usd, time_confidence))
}

/// 1 at the midpoint, falling to 0 at either reference point.
fn linear_time_confidence(ratio: f64) -> f64 {
    1.0 - 2.0 * (0.5 - ratio).abs()
}

/// 1 for identical prices, falling with the relative move between the two
/// reference points; 0 when the mean price is zero.
fn volatility_confidence(a: f64, b: f64) -> f64 {
    let mean = (a + b) / 2.0;
    if mean <= 0.0 {
        return 0.0;
    }
    (1.0 - (b - a).abs() / mean).max(0.0)
}

fn combine(time_confidence: f64, volatility_confidence: f64) -> f64 {
    ((time_confidence + volatility_confidence) / 2.0).min(1.0)
}
