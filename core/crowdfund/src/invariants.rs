#![allow(dead_code)]

use crate::types::{Campaign, CheckoutStatus, FundingPlan, FundingProgress};

/// INV-1: a funding plan must charge something.
pub fn assert_plan_amount_positive(plan: &FundingPlan) {
    assert!(
        !plan.amount.is_zero(),
        "INV-1 violated: plan {} has a zero amount",
        plan.id
    );
}

/// INV-2: the progress bar never exceeds 100 while the raised figure is
/// reported unclamped.
pub fn assert_progress_clamped(campaign: &Campaign, progress: &FundingProgress) {
    assert!(
        progress.progress_percent <= 100,
        "INV-2 violated: campaign {} progress bar at {}%",
        campaign.id,
        progress.progress_percent
    );
    assert_eq!(
        progress.raised, campaign.collected,
        "INV-2 violated: raised figure for campaign {} was altered",
        campaign.id
    );
}

/// INV-3: the collected amount must be unchanged after a failed attempt.
pub fn assert_collected_unchanged(before: &Campaign, after: &Campaign) {
    assert_eq!(
        before.collected, after.collected,
        "INV-3 violated: campaign {} collected amount changed from {} to {}",
        before.id, before.collected, after.collected
    );
}

/// INV-4: only edges of the checkout state machine may be taken.
pub fn assert_valid_status_transition(from: CheckoutStatus, to: CheckoutStatus) {
    assert!(
        from.can_transition_to(to),
        "INV-4 violated: invalid checkout transition from {from} to {to}"
    );
}

/// INV-5: a recorded status history walks the state machine edge by edge
/// and never leaves a terminal state except to start a new attempt.
pub fn assert_status_history(history: &[CheckoutStatus]) {
    for pair in history.windows(2) {
        assert_valid_status_transition(pair[0], pair[1]);
    }
}

/// INV-6: a plan offered for a campaign belongs to that campaign.
pub fn assert_plan_belongs(plan: &FundingPlan, campaign: &Campaign) {
    assert!(
        plan.belongs_to(campaign),
        "INV-6 violated: plan {} belongs to campaign {}, not {}",
        plan.id,
        plan.campaign_id,
        campaign.id
    );
}
