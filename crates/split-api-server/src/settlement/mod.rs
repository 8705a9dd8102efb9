//! Settlement engine: fair-share and minimal-transfer computation.
//!
//! Pure and deterministic; works in integer minor units (cents) internally
//! so share and transfer arithmetic is exact.

use serde::Serialize;

use crate::database::Participant;

#[derive(Debug, Clone, Serialize)]
pub struct Settlement {
    pub total: f64,
    pub shares: Vec<ShareEntry>,
    pub transfers: Vec<Transfer>,
}

/// Target fair share for one participant, in input order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShareEntry {
    pub name: String,
    pub paid: f64,
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transfer {
    pub from: String,
    pub to: String,
    pub amount: f64,
}

struct Normalized {
    name: String,
    cents: i64,
    position: usize,
}

/// Round-half-away-from-zero conversion to minor units.
fn to_minor_units(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

fn to_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Compute the fair per-participant share and a greedy minimal transfer plan
/// (at most n-1 transfers) for a participant list.
///
/// Entries that normalize to a negative amount are dropped; blank names get
/// a positional placeholder. Remainder cents are handed out one each to the
/// participants who paid the most, ties broken by name then input position,
/// so the same input always yields the same share assignment.
pub fn settle(participants: &[Participant]) -> Settlement {
    let normalized: Vec<Normalized> = participants
        .iter()
        .enumerate()
        .filter_map(|(position, p)| {
            let cents = to_minor_units(p.amount);
            if cents < 0 {
                return None;
            }
            let name = if p.name.trim().is_empty() {
                format!("Participant {}", position + 1)
            } else {
                p.name.clone()
            };
            Some(Normalized {
                name,
                cents,
                position,
            })
        })
        .collect();

    if normalized.is_empty() {
        return Settlement {
            total: 0.0,
            shares: Vec::new(),
            transfers: Vec::new(),
        };
    }

    let n = normalized.len() as i64;
    let total: i64 = normalized.iter().map(|p| p.cents).sum();
    let base_share = total / n;
    let remainder = (total - base_share * n) as usize;

    // Rank for the extra cent: paid desc, then name asc, then input position.
    let mut ranking: Vec<usize> = (0..normalized.len()).collect();
    ranking.sort_by(|&a, &b| {
        normalized[b]
            .cents
            .cmp(&normalized[a].cents)
            .then_with(|| normalized[a].name.cmp(&normalized[b].name))
            .then_with(|| normalized[a].position.cmp(&normalized[b].position))
    });

    let mut shares = vec![base_share; normalized.len()];
    for &i in ranking.iter().take(remainder) {
        shares[i] += 1;
    }

    let mut creditors: Vec<(String, i64)> = Vec::new();
    let mut debtors: Vec<(String, i64)> = Vec::new();
    for (i, p) in normalized.iter().enumerate() {
        let balance = p.cents - shares[i];
        if balance > 0 {
            creditors.push((p.name.clone(), balance));
        } else if balance < 0 {
            debtors.push((p.name.clone(), balance));
        }
    }
    creditors.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    debtors.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

    // Greedy matching: largest creditor against largest debtor, advancing
    // past whichever side reaches zero.
    let mut transfers = Vec::new();
    let (mut ci, mut di) = (0, 0);
    while ci < creditors.len() && di < debtors.len() {
        let amount = creditors[ci].1.min(-debtors[di].1);
        if amount > 0 {
            transfers.push(Transfer {
                from: debtors[di].0.clone(),
                to: creditors[ci].0.clone(),
                amount: to_decimal(amount),
            });
        }
        creditors[ci].1 -= amount;
        debtors[di].1 += amount;
        if creditors[ci].1 == 0 {
            ci += 1;
        }
        if debtors[di].1 == 0 {
            di += 1;
        }
    }

    Settlement {
        total: to_decimal(total),
        shares: normalized
            .iter()
            .zip(shares.iter())
            .map(|(p, &share)| ShareEntry {
                name: p.name.clone(),
                paid: to_decimal(p.cents),
                share: to_decimal(share),
            })
            .collect(),
        transfers,
    }
}
