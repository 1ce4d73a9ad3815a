use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

use super::money::{line_total, TotalOverflow};
use super::TenderRequirement;

/// Sealed bid against one requirement line.
/// At most one bid exists per (requirement, contractor).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Bid {
    pub id: Uuid,
    pub tender_id: Uuid,
    pub requirement_id: Uuid,
    pub contractor_id: Uuid,
    pub amount: Decimal,
    pub proposal: Option<String>,
    pub is_final: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request DTO for placing a single bid
#[derive(Debug, Clone, Deserialize)]
pub struct CreateBidRequest {
    pub requirement_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub proposal: Option<String>,
}

/// Request DTO for updating a bid
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateBidRequest {
    pub amount: Decimal,
    #[serde(default)]
    pub proposal: Option<String>,
}

/// One entry of a bulk submission
#[derive(Debug, Clone, Deserialize)]
pub struct BidLine {
    pub requirement_id: Uuid,
    pub amount: Decimal,
    #[serde(default)]
    pub proposal: Option<String>,
}

/// Request DTO for submitting a full bid set
#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAllBidsRequest {
    pub bids: Vec<BidLine>,
}

/// Bid as shown in a contractor's row of the bid matrix
#[derive(Debug, Clone, Serialize)]
pub struct BidLineSummary {
    pub bid_id: Uuid,
    pub requirement_id: Uuid,
    pub requirement_name: String,
    pub quantity: Decimal,
    pub amount: Decimal,
    pub line_total: Decimal,
}

/// Per-contractor bid summary used by customers to rank contractors
#[derive(Debug, Clone, Serialize)]
pub struct ContractorBidSummary {
    pub contractor_id: Uuid,
    pub bids: Vec<BidLineSummary>,
    /// Σ(amount × requirement quantity)
    pub total: Decimal,
    /// True when the contractor priced every current requirement line
    pub is_complete: bool,
}

/// Quantity-weighted total of a contractor's bids.
///
/// Bids whose requirement line is retired (or unknown) do not count.
pub fn weighted_total<'a>(
    bids: impl IntoIterator<Item = &'a Bid>,
    requirements: &HashMap<Uuid, &TenderRequirement>,
) -> Result<Decimal, TotalOverflow> {
    bids.into_iter()
        .filter_map(|bid| {
            requirements
                .get(&bid.requirement_id)
                .filter(|req| req.is_current)
                .map(|req| line_total(bid.amount, req.quantity))
        })
        .try_fold(Decimal::ZERO, |total, line| {
            total.checked_add(line?).ok_or(TotalOverflow)
        })
}

/// Group bids by contractor and compute each contractor's weighted total.
/// Summaries are ordered by ascending total, ties broken by contractor id.
pub fn summarize_by_contractor(
    bids: &[Bid],
    requirements: &[TenderRequirement],
) -> Result<Vec<ContractorBidSummary>, TotalOverflow> {
    let current: HashMap<Uuid, &TenderRequirement> = requirements
        .iter()
        .filter(|r| r.is_current)
        .map(|r| (r.id, r))
        .collect();

    let mut grouped: BTreeMap<Uuid, Vec<&Bid>> = BTreeMap::new();
    for bid in bids {
        if current.contains_key(&bid.requirement_id) {
            grouped.entry(bid.contractor_id).or_default().push(bid);
        }
    }

    let mut summaries = Vec::with_capacity(grouped.len());
    for (contractor_id, bids) in grouped {
        let total = weighted_total(bids.iter().copied(), &current)?;
        let lines = bids
            .iter()
            .map(|bid| {
                let req = current[&bid.requirement_id];
                Ok(BidLineSummary {
                    bid_id: bid.id,
                    requirement_id: bid.requirement_id,
                    requirement_name: req.name.clone(),
                    quantity: req.quantity,
                    amount: bid.amount,
                    line_total: line_total(bid.amount, req.quantity)?,
                })
            })
            .collect::<Result<Vec<_>, TotalOverflow>>()?;
        summaries.push(ContractorBidSummary {
            contractor_id,
            is_complete: lines.len() == current.len(),
            bids: lines,
            total,
        });
    }

    summaries.sort_by(|a, b| {
        a.total
            .cmp(&b.total)
            .then_with(|| a.contractor_id.cmp(&b.contractor_id))
    });
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn requirement(quantity: Decimal, is_current: bool) -> TenderRequirement {
        TenderRequirement {
            id: Uuid::new_v4(),
            tender_id: Uuid::nil(),
            requirement_type_id: Uuid::new_v4(),
            name: "Tiles".to_string(),
            quantity,
            unit: "m2".to_string(),
            is_critical: false,
            description: None,
            version: 1,
            is_current,
            created_at: Utc::now(),
        }
    }

    fn bid(requirement: &TenderRequirement, contractor_id: Uuid, amount: Decimal) -> Bid {
        Bid {
            id: Uuid::new_v4(),
            tender_id: Uuid::nil(),
            requirement_id: requirement.id,
            contractor_id,
            amount,
            proposal: None,
            is_final: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_totals_are_quantity_weighted() {
        let tiles = requirement(dec!(12), true);
        let paint = requirement(dec!(3), true);
        let contractor = Uuid::new_v4();
        let bids = vec![
            bid(&tiles, contractor, dec!(25.50)),
            bid(&paint, contractor, dec!(40)),
        ];

        let summaries = summarize_by_contractor(&bids, &[tiles, paint]).unwrap();
        assert_eq!(summaries.len(), 1);
        // 12 * 25.50 + 3 * 40
        assert_eq!(summaries[0].total, dec!(426.00));
        assert!(summaries[0].is_complete);
    }

    #[test]
    fn test_retired_lines_do_not_count() {
        let old = requirement(dec!(10), false);
        let new = requirement(dec!(20), true);
        let contractor = Uuid::new_v4();
        let bids = vec![bid(&old, contractor, dec!(5)), bid(&new, contractor, dec!(5))];

        let summaries = summarize_by_contractor(&bids, &[old, new]).unwrap();
        assert_eq!(summaries[0].total, dec!(100));
        assert_eq!(summaries[0].bids.len(), 1);
    }

    #[test]
    fn test_summaries_sorted_by_total() {
        let line = requirement(dec!(2), true);
        let cheap = Uuid::new_v4();
        let pricey = Uuid::new_v4();
        let bids = vec![bid(&line, pricey, dec!(90)), bid(&line, cheap, dec!(10))];

        let summaries = summarize_by_contractor(&bids, &[line]).unwrap();
        assert_eq!(summaries[0].contractor_id, cheap);
        assert_eq!(summaries[1].contractor_id, pricey);
    }

    #[test]
    fn test_total_overflow_is_an_error() {
        let line = requirement(dec!(1000), true);
        let contractor = Uuid::new_v4();
        let bids = vec![bid(&line, contractor, Decimal::MAX / dec!(2))];

        assert_eq!(
            summarize_by_contractor(&bids, &[line]).unwrap_err(),
            TotalOverflow
        );
    }
}
