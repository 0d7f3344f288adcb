use std::collections::BTreeMap;

use bt_types::{Bar, Error, Strategy, StrategyInitContext, Symbol};

/// Takes a fixed target position per symbol at `initialize` and never
/// changes it — the simplest possible strategy, useful as a scenario
/// fixture and as a baseline for comparing risk/optimizer behavior.
#[derive(Clone, Debug, Default)]
pub struct BuyAndHoldStrategy {
    target: BTreeMap<Symbol, i64>,
    positions: BTreeMap<Symbol, i64>,
    running: bool,
}

impl BuyAndHoldStrategy {
    pub fn new(target: BTreeMap<Symbol, i64>) -> Self {
        BuyAndHoldStrategy { target, positions: BTreeMap::new(), running: false }
    }
}

impl Strategy for BuyAndHoldStrategy {
    fn initialize(&mut self, _ctx: &StrategyInitContext) -> Result<(), Error> {
        self.positions = self.target.clone();
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.running = false;
        Ok(())
    }

    fn on_data(&mut self, _bars: &[Bar]) -> Result<(), Error> {
        if !self.running {
            return Err(Error::NotInitialized("BuyAndHoldStrategy::start was never called".into()));
        }
        Ok(())
    }

    fn get_positions(&self) -> BTreeMap<Symbol, i64> {
        self.positions.clone()
    }
}

/// Always flat. Useful as a null strategy for isolating the effect of risk
/// scaling and the optimizer from strategy-driven position changes.
#[derive(Clone, Debug, Default)]
pub struct FlatStrategy {
    running: bool,
}

impl Strategy for FlatStrategy {
    fn initialize(&mut self, _ctx: &StrategyInitContext) -> Result<(), Error> {
        Ok(())
    }

    fn start(&mut self) -> Result<(), Error> {
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.running = false;
        Ok(())
    }

    fn on_data(&mut self, _bars: &[Bar]) -> Result<(), Error> {
        if !self.running {
            return Err(Error::NotInitialized("FlatStrategy::start was never called".into()));
        }
        Ok(())
    }

    fn get_positions(&self) -> BTreeMap<Symbol, i64> {
        BTreeMap::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buy_and_hold_keeps_its_target_position_across_days() {
        let mut target = BTreeMap::new();
        target.insert(Symbol::new("ES"), 5);
        let mut strategy = BuyAndHoldStrategy::new(target.clone());
        let ctx = StrategyInitContext { symbols: vec![Symbol::new("ES")], initial_capital: 1_000_000.0 };
        strategy.initialize(&ctx).unwrap();
        strategy.start().unwrap();
        strategy.on_data(&[]).unwrap();
        assert_eq!(strategy.get_positions(), target);
    }

    #[test]
    fn on_data_before_start_is_rejected() {
        let mut strategy = FlatStrategy::default();
        let ctx = StrategyInitContext { symbols: vec![], initial_capital: 0.0 };
        strategy.initialize(&ctx).unwrap();
        assert!(matches!(strategy.on_data(&[]), Err(Error::NotInitialized(_))));
    }

    #[test]
    fn flat_strategy_never_holds_a_position() {
        let mut strategy = FlatStrategy::default();
        strategy.start().unwrap();
        strategy.on_data(&[]).unwrap();
        assert!(strategy.get_positions().is_empty());
    }
}
