//! Fuel for the reducer

/// Bounds how many reduction steps a single top-level evaluation may take.
#[derive(Debug, Clone)]
pub struct Fuel {
    fuel: i32,
}

impl Fuel {
    pub fn empty() -> Self {
        Self { fuel: 0 }
    }

    /// Refills fuel up to a given maximum.
    ///
    /// Called by the interpreter before every top-level evaluation so one
    /// runaway expression cannot starve the next.
    pub fn refill(&mut self, fuel: i32, max_fuel: i32) {
        self.fuel = self.fuel.saturating_add(fuel).min(max_fuel);
    }

    /// Add to or subtract from the current remaining fuel.
    fn adjust(&mut self, fuel: i32) {
        self.fuel = self.fuel.saturating_add(fuel);
    }

    /// Subtract from the current remaining fuel.
    ///
    /// This is a convenience method that is equivalent to `self.adjust(-fuel)`.
    pub fn consume(&mut self, fuel: i32) {
        self.adjust(fuel.saturating_neg());
    }

    /// Returns true if we have positive fuel remaining
    pub fn should_continue(&self) -> bool {
        self.fuel > 0
    }
}

#[cfg(test)]
mod tests {
    use assert2::check;

    use super::Fuel;

    #[test]
    fn refill_is_capped() {
        let mut fuel = Fuel::empty();
        check!(!fuel.should_continue());
        fuel.refill(10, 8);
        fuel.consume(7);
        check!(fuel.should_continue());
        fuel.consume(1);
        check!(!fuel.should_continue());
        fuel.refill(3, 8);
        check!(fuel.should_continue());
    }

    #[test]
    fn consume_saturates() {
        let mut fuel = Fuel::empty();
        // negating i32::MIN saturates to i32::MAX instead of wrapping
        fuel.consume(i32::MIN);
        check!(fuel.should_continue());
        fuel.consume(i32::MAX - 1);
        check!(fuel.should_continue());
        fuel.consume(1);
        check!(!fuel.should_continue());
    }
}
