//! Property-based tests for the backtest invariants:
//!
//! - the index starts at exactly 100 per instrument
//! - non-empty portfolios are fully invested
//! - widening the quantile band never shrinks the selection
//! - selection and weighting are deterministic
//! - an equal-weight portfolio of a common-return universe tracks the index

use std::collections::BTreeSet;

use criba_eval::{Backtest, BacktestConfig, PerformanceEvaluator, build_index};
use criba_select::{WEIGHT_TOLERANCE, WeightingScheme, equal_weight, select};
use criba_traits::{Date, InstrumentId, Observation, Panel};
use proptest::prelude::*;

const FACTOR: &str = "p2b";

fn date(period: usize) -> Date {
    Date::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Months::new(period as u32)
}

fn instrument(i: usize) -> InstrumentId {
    format!("S{i:02}")
}

/// Build a complete panel from row-major `(close, factor)` cells.
fn complete_panel(instruments: usize, dates: usize, cells: &[(f64, f64)]) -> Panel {
    let observations = (0..instruments).flat_map(|i| {
        (0..dates).map(move |t| {
            let (close, factor) = cells[i * dates + t];
            Observation::new(instrument(i), date(t), close).with_factor(FACTOR, factor)
        })
    });
    Panel::from_observations(observations.collect::<Vec<_>>()).unwrap()
}

/// Generate a complete panel of 1..8 instruments over 1..8 dates.
fn arb_panel() -> impl Strategy<Value = Panel> {
    (1usize..8, 1usize..8).prop_flat_map(|(n, m)| {
        prop::collection::vec((1.0f64..1_000.0, -10.0f64..10.0), n * m)
            .prop_map(move |cells| complete_panel(n, m, &cells))
    })
}

/// Generate a panel with 2..8 dates where every instrument earns the same
/// return each period.
fn arb_common_return_panel() -> impl Strategy<Value = Panel> {
    (
        prop::collection::vec(1.0f64..500.0, 1..8),
        prop::collection::vec(-0.5f64..0.5, 1..7),
    )
        .prop_map(|(bases, growth)| {
            let dates = growth.len() + 1;
            let cells: Vec<(f64, f64)> = bases
                .iter()
                .enumerate()
                .flat_map(|(i, base)| {
                    let mut close = *base;
                    let mut prices = vec![(close, i as f64)];
                    for g in &growth {
                        close *= 1.0 + g;
                        prices.push((close, i as f64));
                    }
                    prices
                })
                .collect();
            complete_panel(bases.len(), dates, &cells)
        })
}

/// Generate `0 <= a <= b <= c <= d <= 1`.
fn arb_nested_bands() -> impl Strategy<Value = [f64; 4]> {
    prop::array::uniform4(0.0f64..=1.0).prop_map(|mut q| {
        q.sort_by(f64::total_cmp);
        q
    })
}

fn window_start(panel: &Panel) -> Date {
    panel.min_date().unwrap() - chrono::Days::new(1)
}

fn select_band(panel: &Panel, lower: f64, upper: f64) -> BTreeSet<InstrumentId> {
    let as_of = panel.max_date().unwrap();
    select(panel, FACTOR, window_start(panel), as_of, lower, upper).unwrap()
}

proptest! {
    #[test]
    fn prop_index_base_is_exact(panel in arb_panel()) {
        let index = build_index(&panel);
        let expected = 100.0 * panel.instruments().len() as f64;
        prop_assert_eq!(index.base_value(), Some(expected));
        prop_assert_eq!(index.len(), panel.dates().len());
    }

    #[test]
    fn prop_portfolios_are_fully_invested(
        panel in arb_panel(),
        bands in arb_nested_bands(),
        scheme in prop_oneof![
            Just(WeightingScheme::Equal),
            Just(WeightingScheme::Factor),
            Just(WeightingScheme::InverseVol),
        ],
    ) {
        let backtest = Backtest::new(&panel).unwrap();
        let outcome = backtest.run(&BacktestConfig {
            factor: FACTOR.to_string(),
            window_start: window_start(&panel),
            as_of: panel.max_date().unwrap(),
            lower_quantile: bands[0],
            upper_quantile: bands[3],
            weighting: scheme,
            ..Default::default()
        }).unwrap();

        let portfolio = &outcome.portfolio;
        if !portfolio.is_empty() {
            prop_assert!((portfolio.total_weight() - 1.0).abs() <= WEIGHT_TOLERANCE);
        }
        prop_assert!(portfolio.iter().all(|(_, w)| w >= 0.0));
    }

    #[test]
    fn prop_widening_band_never_shrinks_selection(
        panel in arb_panel(),
        bands in arb_nested_bands(),
    ) {
        let inner = select_band(&panel, bands[1], bands[2]);
        let outer = select_band(&panel, bands[0], bands[3]);
        prop_assert!(inner.is_subset(&outer));
    }

    #[test]
    fn prop_full_band_selects_everyone_at_as_of(panel in arb_panel()) {
        let selected = select_band(&panel, 0.0, 1.0);
        let everyone: BTreeSet<InstrumentId> = panel.instruments().iter().cloned().collect();
        prop_assert_eq!(selected, everyone);
    }

    #[test]
    fn prop_select_and_weigh_is_deterministic(
        panel in arb_panel(),
        bands in arb_nested_bands(),
    ) {
        let first = equal_weight(&select_band(&panel, bands[0], bands[3]));
        let second = equal_weight(&select_band(&panel, bands[0], bands[3]));
        let bits = |p: &criba_select::Portfolio| {
            p.iter().map(|(id, w)| (id.clone(), w.to_bits())).collect::<Vec<_>>()
        };
        prop_assert_eq!(bits(&first), bits(&second));
    }

    #[test]
    fn prop_equal_weight_universe_tracks_index(panel in arb_common_return_panel()) {
        let backtest = Backtest::new(&panel).unwrap();
        let everyone: BTreeSet<InstrumentId> = panel.instruments().iter().cloned().collect();
        let portfolio = equal_weight(&everyone);

        let series = PerformanceEvaluator::default().portfolio_returns(&portfolio, backtest.returns());
        let index = build_index(&panel);
        let realized = index.realized_returns();

        prop_assert_eq!(series.dates(), &index.dates()[1..]);
        for (ours, theirs) in series.returns().iter().zip(&realized) {
            prop_assert!((ours - theirs).abs() <= 1e-9, "{} vs {}", ours, theirs);
        }
    }
}
