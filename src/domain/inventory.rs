//! Per-instrument FIFO inventory of open lots.

use crate::domain::trade::TradeId;
use std::collections::VecDeque;

/// Relative tolerance below which a leftover quantity counts as zero.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// True when `remaining` is float noise relative to `scale`.
pub fn is_negligible(remaining: f64, scale: f64) -> bool {
    remaining <= QUANTITY_EPSILON * scale.abs().max(1.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MovementType {
    LongEntry,
    LongExit,
    ShortEntry,
    ShortExit,
}

impl MovementType {
    /// The exit movement that offsets an entry movement.
    pub fn exit_of(self) -> MovementType {
        match self {
            MovementType::LongEntry | MovementType::LongExit => MovementType::LongExit,
            MovementType::ShortEntry | MovementType::ShortExit => MovementType::ShortExit,
        }
    }
}

/// A quantity entered at a given unit price, tracked until fully offset.
#[derive(Debug, Clone, PartialEq)]
pub struct Lot {
    pub trade_id: TradeId,
    pub movement: MovementType,
    pub unit_price: f64,
    pub remaining: f64,
}

/// One lot (partially) consumed by an offsetting trade.
#[derive(Debug, Clone, PartialEq)]
pub struct LotMatch {
    pub trade_id: TradeId,
    pub quantity: f64,
    pub entry_unit_price: f64,
    pub remaining_after: f64,
}

#[derive(Debug, Clone, Default)]
pub struct Inventory {
    long: VecDeque<Lot>,
    short: VecDeque<Lot>,
}

impl Inventory {
    pub fn long_lots(&self) -> &VecDeque<Lot> {
        &self.long
    }

    pub fn short_lots(&self) -> &VecDeque<Lot> {
        &self.short
    }

    pub fn open_long_quantity(&self) -> f64 {
        self.long.iter().map(|l| l.remaining).sum()
    }

    pub fn open_short_quantity(&self) -> f64 {
        self.short.iter().map(|l| l.remaining).sum()
    }

    /// Long remaining minus short remaining.
    pub fn net_quantity(&self) -> f64 {
        self.open_long_quantity() - self.open_short_quantity()
    }

    pub fn is_flat(&self) -> bool {
        self.long.is_empty() && self.short.is_empty()
    }

    fn queue_mut(&mut self, entry: MovementType) -> &mut VecDeque<Lot> {
        match entry {
            MovementType::LongEntry | MovementType::LongExit => &mut self.long,
            MovementType::ShortEntry | MovementType::ShortExit => &mut self.short,
        }
    }

    /// Enqueue a new entry lot behind all existing lots of the same direction.
    pub fn open(&mut self, lot: Lot) {
        self.queue_mut(lot.movement).push_back(lot);
    }

    /// Consume up to `quantity` from the `entry` queue, oldest lot first.
    /// Fully consumed lots leave the queue. Returns the matches and the
    /// quantity left unmatched. Leftovers within [`QUANTITY_EPSILON`] of zero
    /// are snapped to zero.
    pub fn close_fifo(&mut self, entry: MovementType, quantity: f64) -> (Vec<LotMatch>, f64) {
        let queue = self.queue_mut(entry);
        let mut outstanding = quantity;
        let mut matches = Vec::new();

        while outstanding > 0.0 {
            let Some(lot) = queue.front_mut() else {
                break;
            };
            let matched = outstanding.min(lot.remaining);
            let lot_scale = lot.remaining;
            lot.remaining -= matched;
            if is_negligible(lot.remaining, lot_scale) {
                lot.remaining = 0.0;
            }
            outstanding -= matched;
            if is_negligible(outstanding, quantity) {
                outstanding = 0.0;
            }
            matches.push(LotMatch {
                trade_id: lot.trade_id,
                quantity: matched,
                entry_unit_price: lot.unit_price,
                remaining_after: lot.remaining,
            });
            if lot.remaining <= 0.0 {
                queue.pop_front();
            }
        }

        (matches, outstanding)
    }
}
