//! Lot rounding and allocation bounds across policies.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tradegate_core::{CandidateStock, Position, TradingConfig};
use tradegate_portfolio::{shares_for, AllocationMethod, PortfolioManager};

fn candidates() -> Vec<CandidateStock> {
    vec![
        CandidateStock::new("600519", "Spirits", 85.0, dec!(1800)),
        CandidateStock::new("600036", "Bank", 80.0, dec!(38.50)),
        CandidateStock::new("000333", "Appliances", 78.0, dec!(61.20)),
        CandidateStock::new("601318", "Insurer", 72.0, dec!(44.05)),
    ]
}

#[test]
fn quantity_never_exceeds_affordable_lots() {
    let qty = shares_for(dec!(24.50), dec!(2600), 100);
    assert_eq!(qty % 100, 0);
    assert!(qty <= 100);
    assert_eq!(qty, 100);
}

#[test]
fn every_policy_emits_whole_lots_within_cash() {
    let pm = PortfolioManager::new(&TradingConfig::default());
    let positions = vec![Position::new("600483", "Utility", 1000, dec!(24.50)).with_current_price(dec!(23.30))];
    let cash = pm.calculate_available_cash(&positions, None);

    for method in [
        AllocationMethod::EqualWeight,
        AllocationMethod::ScoreWeighted,
        AllocationMethod::FractionalKelly,
    ] {
        let recs = pm.allocate_positions(&candidates(), cash, &positions, method);
        let spent: Decimal = recs.iter().map(|r| r.amount).sum();
        assert!(spent <= cash, "{method} spent {spent} of {cash}");
        for rec in &recs {
            assert_eq!(rec.quantity % 100, 0, "{method} {}", rec.code);
            assert!(rec.amount >= dec!(5000));
            assert!(rec.position_ratio <= 0.2 + 1e-9);
        }
    }
}

#[test]
fn optimize_keeps_allocations_inside_limits() {
    let pm = PortfolioManager::new(&TradingConfig::default());
    let recs = pm.allocate_positions(&candidates(), dec!(60000), &[], AllocationMethod::ScoreWeighted);
    let optimized = pm.optimize_portfolio(recs.clone(), &[]);
    assert_eq!(optimized, recs);
}
