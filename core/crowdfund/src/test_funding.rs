use crate::invariants::{assert_plan_amount_positive, assert_progress_clamped};
use crate::{percent_funded, Amount, Campaign, Error, FundingPlan};

fn campaign(goal: u64, collected: u64) -> Campaign {
    Campaign {
        id: "c1".to_string(),
        title: "Clean water".to_string(),
        description: "Wells for three villages".to_string(),
        goal: Amount(goal),
        collected: Amount(collected),
        organization: Some("WaterAid".to_string()),
        image: None,
        status: None,
        created_at: None,
    }
}

fn plan(amount: u64) -> FundingPlan {
    FundingPlan {
        id: "p1".to_string(),
        campaign_id: "c1".to_string(),
        title: "Supporter".to_string(),
        amount: Amount(amount),
        interval: "monthly".to_string(),
        provider_plan_id: "plan_abc".to_string(),
    }
}

#[test]
fn test_quarter_funded() {
    let c = campaign(10_000, 2_500);
    let progress = c.progress();
    assert_eq!(progress.percent, 25);
    assert_eq!(progress.progress_percent, 25);
    assert!(!progress.is_fully_funded());
    assert_progress_clamped(&c, &progress);
}

#[test]
fn test_overfunded_progress_clamps_but_raised_does_not() {
    let c = campaign(10_000, 10_500);
    let progress = c.progress();
    assert_eq!(progress.percent, 105);
    assert_eq!(progress.progress_percent, 100);
    assert_eq!(progress.raised, Amount(10_500));
    assert!(progress.is_fully_funded());
    assert_progress_clamped(&c, &progress);
}

#[test]
fn test_percent_rounds_half_up() {
    assert_eq!(percent_funded(Amount(200), Amount(1)), 1);
    assert_eq!(percent_funded(Amount(300), Amount(1)), 0);
    assert_eq!(percent_funded(Amount(3), Amount(2)), 67);
}

#[test]
fn test_zero_goal_is_zero_percent() {
    assert_eq!(percent_funded(Amount::ZERO, Amount(5_000)), 0);
}

#[test]
fn test_huge_amounts_do_not_overflow() {
    assert_eq!(percent_funded(Amount(u64::MAX), Amount(u64::MAX)), 100);
}

#[test]
fn test_amount_formats_as_major_units() {
    assert_eq!(Amount(50_000).to_string(), "500.00");
    assert_eq!(Amount(1_205).format_major("INR"), "₹12.05");
    assert_eq!(Amount(7).format_major("GBP"), "GBP 0.07");
}

#[test]
fn test_plan_validation() {
    let p = plan(50_000);
    assert_plan_amount_positive(&p);
    assert!(p.validate().is_ok());
    assert_eq!(
        plan(0).validate(),
        Err(Error::NonPositiveAmount("p1".to_string()))
    );
}

#[test]
fn test_plan_membership() {
    let c = campaign(10_000, 0);
    let mut p = plan(100);
    assert!(p.belongs_to(&c));
    p.campaign_id = "c2".to_string();
    assert!(!p.belongs_to(&c));
}

#[test]
fn test_decodes_upstream_campaign_shape() {
    let json = serde_json::json!({
        "_id": "c1",
        "title": "Clean water",
        "description": "Wells",
        "goal_amount": 10000,
        "collected_amount": 2500,
        "ngo_name": "WaterAid",
        "status": "active"
    });
    let c: Campaign = serde_json::from_value(json).unwrap();
    assert_eq!(c.id, "c1");
    assert_eq!(c.goal, Amount(10_000));
    assert_eq!(c.collected, Amount(2_500));
    assert_eq!(c.organization.as_deref(), Some("WaterAid"));
    assert_eq!(c.image, None);
}

#[test]
fn test_decodes_upstream_plan_shape() {
    let json = serde_json::json!({
        "_id": "p1",
        "campaign_id": "c1",
        "title": "Supporter",
        "amount_cents": 50000,
        "interval": "monthly",
        "ps_provider_plan_id": "plan_abc"
    });
    let p: FundingPlan = serde_json::from_value(json).unwrap();
    assert_eq!(p, plan(50_000));
}

#[test]
fn test_plan_listing_without_campaign_id_decodes() {
    let json = r#"{"_id":"p1","title":"Supporter","amount_cents":50000,"interval":"monthly","ps_provider_plan_id":"plan_abc"}"#;
    let p: FundingPlan = serde_json::from_str(json).unwrap();
    assert_eq!(p.id, "p1");
    assert_eq!(p.campaign_id, "");
    assert_eq!(p.amount, Amount(50_000));
}
