//! Fakes for the collaborator traits, shared by the unit and scenario tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use crowdfund::{Amount, Campaign, FundingPlan};

use crate::errors::ServiceError;
use crate::gateway::{GatewayError, HostedWidget, PaymentGateway, WidgetSession};
use crate::identity::AuthenticatedUser;
use crate::orchestrator::Collaborators;
use crate::services::{
    AuthApi, AuthUser, CampaignApi, FundingPlanApi, LoginRequest, OrderDescriptor, OrderRequest,
    OrderService, RegisterRequest, VerificationRequest, VerificationResponse,
    VerificationService,
};

#[derive(Debug, Clone)]
pub enum OrderBehaviour {
    Succeed,
    Reject(String),
    /// Backend charges a different amount than the plan.
    WrongAmount(Amount),
}

pub struct FakeOrders {
    pub behaviour: Mutex<OrderBehaviour>,
    pub requests: Mutex<Vec<OrderRequest>>,
    calls: AtomicUsize,
}

impl FakeOrders {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set(&self, behaviour: OrderBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }
}

#[async_trait]
impl OrderService for FakeOrders {
    async fn create_order(&self, request: &OrderRequest) -> Result<OrderDescriptor, ServiceError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.requests.lock().unwrap().push(request.clone());
        // Let a racing caller observe the in-flight status.
        tokio::task::yield_now().await;

        let behaviour = self.behaviour.lock().unwrap().clone();
        let amount = match behaviour {
            OrderBehaviour::Succeed => request.amount,
            OrderBehaviour::WrongAmount(amount) => amount,
            OrderBehaviour::Reject(message) => {
                return Err(ServiceError::Rejected {
                    status: 400,
                    message,
                })
            }
        };
        Ok(OrderDescriptor {
            order_id: format!("ord_{n}"),
            gateway_order_id: format!("o{n}"),
            amount,
            currency: "INR".to_string(),
        })
    }
}

#[derive(Debug, Clone)]
pub enum VerifyBehaviour {
    Verified,
    NotVerified(String),
    Rejected(String),
    Unreachable,
}

pub struct FakeVerifier {
    pub behaviour: Mutex<VerifyBehaviour>,
    pub requests: Mutex<Vec<VerificationRequest>>,
}

impl FakeVerifier {
    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn set(&self, behaviour: VerifyBehaviour) {
        *self.behaviour.lock().unwrap() = behaviour;
    }
}

#[async_trait]
impl VerificationService for FakeVerifier {
    async fn verify_payment(
        &self,
        request: &VerificationRequest,
    ) -> Result<VerificationResponse, ServiceError> {
        self.requests.lock().unwrap().push(request.clone());
        let behaviour = self.behaviour.lock().unwrap().clone();
        match behaviour {
            VerifyBehaviour::Verified => Ok(VerificationResponse {
                verified: true,
                message: "Payment verified".to_string(),
            }),
            VerifyBehaviour::NotVerified(message) => Ok(VerificationResponse {
                verified: false,
                message,
            }),
            VerifyBehaviour::Rejected(message) => Err(ServiceError::Rejected {
                status: 400,
                message,
            }),
            VerifyBehaviour::Unreachable => Err(ServiceError::Decode("connection reset".to_string())),
        }
    }
}

/// Campaign and plan catalogue backed by in-memory maps.
pub struct FakeCatalogue {
    pub campaigns: Mutex<HashMap<String, Campaign>>,
    pub plans: Mutex<Vec<FundingPlan>>,
    pub unavailable: Mutex<bool>,
    gets: AtomicUsize,
}

impl FakeCatalogue {
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }

    /// Simulate the backend committing a donation.
    pub fn credit(&self, campaign_id: &str, amount: Amount) {
        if let Some(c) = self.campaigns.lock().unwrap().get_mut(campaign_id) {
            c.collected = Amount(c.collected.0 + amount.0);
        }
    }
}

#[async_trait]
impl CampaignApi for FakeCatalogue {
    async fn get_campaign(&self, id: &str) -> Result<Campaign, ServiceError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if *self.unavailable.lock().unwrap() {
            return Err(ServiceError::Decode("backend down".to_string()));
        }
        self.campaigns
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| ServiceError::NotFound(format!("campaign {id}")))
    }

    async fn list_campaigns(&self) -> Result<Vec<Campaign>, ServiceError> {
        let mut all: Vec<_> = self.campaigns.lock().unwrap().values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }
}

#[async_trait]
impl FundingPlanApi for FakeCatalogue {
    async fn plans_for_campaign(&self, campaign_id: &str) -> Result<Vec<FundingPlan>, ServiceError> {
        Ok(self
            .plans
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.campaign_id == campaign_id)
            .cloned()
            .collect())
    }
}

/// Counts widget openings; can be told to fail.
pub struct FakeGateway {
    inner: HostedWidget,
    pub fail_open: Mutex<bool>,
    opens: AtomicUsize,
}

impl FakeGateway {
    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn create_session(
        &self,
        order: &OrderDescriptor,
        campaign: &Campaign,
        plan: &FundingPlan,
    ) -> WidgetSession {
        self.inner.create_session(order, campaign, plan)
    }

    async fn open(&self, _session: &WidgetSession) -> Result<(), GatewayError> {
        if *self.fail_open.lock().unwrap() {
            return Err(GatewayError::Unavailable("script blocked".to_string()));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Accepts password "secret" for anyone and logs them in as "u1".
pub struct FakeAuth;

#[async_trait]
impl AuthApi for FakeAuth {
    async fn register(&self, request: &RegisterRequest) -> Result<AuthUser, ServiceError> {
        Ok(AuthUser {
            id: "u-new".to_string(),
            name: request.name.clone(),
            email: request.email.clone(),
        })
    }

    async fn login(&self, request: &LoginRequest) -> Result<AuthUser, ServiceError> {
        if request.password != "secret" {
            return Err(ServiceError::Rejected {
                status: 401,
                message: "Invalid credentials".to_string(),
            });
        }
        Ok(AuthUser {
            id: "u1".to_string(),
            name: "Asha".to_string(),
            email: request.email.clone(),
        })
    }
}

pub fn campaign(id: &str, goal: u64, collected: u64) -> Campaign {
    Campaign {
        id: id.to_string(),
        title: format!("Campaign {id}"),
        description: "Wells for three villages".to_string(),
        goal: Amount(goal),
        collected: Amount(collected),
        organization: Some("WaterAid".to_string()),
        image: None,
        status: Some("active".to_string()),
        created_at: None,
    }
}

pub fn plan(id: &str, campaign_id: &str, amount: u64) -> FundingPlan {
    FundingPlan {
        id: id.to_string(),
        campaign_id: campaign_id.to_string(),
        title: "Supporter".to_string(),
        amount: Amount(amount),
        interval: "one-time".to_string(),
        provider_plan_id: format!("plan_{id}"),
    }
}

pub struct Fixture {
    pub services: Collaborators,
    pub orders: Arc<FakeOrders>,
    pub verifier: Arc<FakeVerifier>,
    pub catalogue: Arc<FakeCatalogue>,
    pub gateway: Arc<FakeGateway>,
    pub user: AuthenticatedUser,
    pub campaign: Campaign,
    pub plan: FundingPlan,
}

/// User "u1", campaign "c1" (goal 10_000_000, collected 2_500_000) and plan
/// "p1" of 50_000.
pub fn fixture() -> Fixture {
    let c1 = campaign("c1", 10_000_000, 2_500_000);
    let p1 = plan("p1", "c1", 50_000);

    let orders = Arc::new(FakeOrders {
        behaviour: Mutex::new(OrderBehaviour::Succeed),
        requests: Mutex::new(Vec::new()),
        calls: AtomicUsize::new(0),
    });
    let verifier = Arc::new(FakeVerifier {
        behaviour: Mutex::new(VerifyBehaviour::Verified),
        requests: Mutex::new(Vec::new()),
    });
    let catalogue = Arc::new(FakeCatalogue {
        campaigns: Mutex::new(HashMap::from([
            (c1.id.clone(), c1.clone()),
            ("c2".to_string(), campaign("c2", 20_000, 20_500)),
        ])),
        plans: Mutex::new(vec![p1.clone(), plan("p2", "c2", 10_000)]),
        unavailable: Mutex::new(false),
        gets: AtomicUsize::new(0),
    });
    let gateway = Arc::new(FakeGateway {
        inner: HostedWidget::new("rzp_test_key", "NGO Crowdfunding"),
        fail_open: Mutex::new(false),
        opens: AtomicUsize::new(0),
    });

    let services = Collaborators {
        orders: orders.clone(),
        verifier: verifier.clone(),
        campaigns: catalogue.clone(),
        gateway: gateway.clone(),
    };

    Fixture {
        services,
        orders,
        verifier,
        catalogue,
        gateway,
        user: AuthenticatedUser {
            user_id: "u1".to_string(),
            expires_at: Utc::now() + Duration::hours(1),
        },
        campaign: c1,
        plan: p1,
    }
}
