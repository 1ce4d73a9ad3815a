//! Shared fixtures for engine tests
//!
//! Every test gets its own engine over the in-process store, a manual clock
//! and recording collaborators, so nothing touches Postgres or Redis.

#![allow(dead_code)]

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use uuid::Uuid;

use tenderworks_backend::clock::{Clock, ManualClock};
use tenderworks_backend::config::EngineSettings;
use tenderworks_backend::domain::*;
use tenderworks_backend::engine::TenderEngine;
use tenderworks_backend::services::{MemoryContractorDirectory, RecordingNotifier, StaticCatalog};
use tenderworks_backend::store::{MemoryTenderStore, TenderStore};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

pub fn window_start() -> DateTime<Utc> {
    t0() + Duration::hours(1)
}

pub fn window_end() -> DateTime<Utc> {
    t0() + Duration::days(7)
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub struct Harness {
    pub engine: TenderEngine,
    pub store: Arc<MemoryTenderStore>,
    pub clock: Arc<ManualClock>,
    pub catalog: Arc<StaticCatalog>,
    pub directory: Arc<MemoryContractorDirectory>,
    pub notifier: Arc<RecordingNotifier>,
    pub service_id: Uuid,
    /// Tiling, plumbing, electrical
    pub requirement_types: Vec<Uuid>,
    pub customer: Caller,
    pub supervisor: Caller,
    /// Capability pool of `service_id`
    pub contractors: Vec<Caller>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(EngineSettings::default())
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryTenderStore::new(clock.clone()));
        let catalog = Arc::new(StaticCatalog::new());
        let directory = Arc::new(MemoryContractorDirectory::new());
        let notifier = Arc::new(RecordingNotifier::new());

        let contractors: Vec<Caller> = (0..3).map(|_| Caller::contractor(Uuid::new_v4())).collect();
        let service_id = Uuid::new_v4();
        catalog.add_service(service_id, contractors.iter().map(|c| c.user_id));
        let requirement_types = vec![
            catalog.add_requirement_type(service_id, "Wall tiling", "m2"),
            catalog.add_requirement_type(service_id, "Pipe rerouting", "m"),
            catalog.add_requirement_type(service_id, "Socket install", "unit"),
        ];

        let engine = TenderEngine::new(
            store.clone(),
            catalog.clone(),
            directory.clone(),
            notifier.clone(),
            clock.clone(),
            settings,
        );

        Self {
            engine,
            store,
            clock,
            catalog,
            directory,
            notifier,
            service_id,
            requirement_types,
            customer: Caller::customer(Uuid::new_v4()),
            supervisor: Caller::supervisor(Uuid::new_v4()),
            contractors,
        }
    }

    pub fn contractor(&self, i: usize) -> Caller {
        self.contractors[i]
    }

    pub async fn draft(&self) -> Tender {
        self.engine
            .create_tender(
                &self.customer,
                CreateTenderRequest {
                    title: "Bathroom renovation".to_string(),
                    description: Some("Full strip-out and refit".to_string()),
                    service_id: self.service_id,
                    location: "12 Mill Lane, York".to_string(),
                    budget: Some(dec!(8000)),
                    priority: TenderPriority::High,
                    supervisor_id: Some(self.supervisor.user_id),
                    contractor_limit: None,
                },
            )
            .await
            .unwrap()
    }

    /// Draft with three lines: 10 m2 tiling, 2.5 m pipe, 4 sockets.
    pub async fn draft_with_lines(&self) -> (Tender, Vec<TenderRequirement>) {
        let tender = self.draft().await;
        let mut lines = Vec::new();
        for (type_id, quantity) in self
            .requirement_types
            .iter()
            .zip([dec!(10), dec!(2.5), dec!(4)])
        {
            lines.push(self.add_line(tender.id, *type_id, quantity).await);
        }
        (tender, lines)
    }

    pub async fn add_line(
        &self,
        tender_id: Uuid,
        requirement_type_id: Uuid,
        quantity: Decimal,
    ) -> TenderRequirement {
        self.engine
            .add_requirement(
                &self.customer,
                tender_id,
                AddRequirementRequest {
                    requirement_type_id,
                    quantity,
                    unit: None,
                    is_critical: false,
                    description: None,
                },
            )
            .await
            .unwrap()
    }

    pub fn window() -> PublishTenderRequest {
        PublishTenderRequest {
            start_time: window_start(),
            end_time: window_end(),
        }
    }

    /// Published tender with the whole pool invited, clock still before the window.
    pub async fn published(&self) -> (Tender, Vec<TenderRequirement>) {
        let (tender, lines) = self.draft_with_lines().await;
        let tender = self
            .engine
            .publish_tender(&self.customer, tender.id, Self::window())
            .await
            .unwrap();
        (tender, lines)
    }

    /// Published tender with the clock inside the bidding window.
    pub async fn bidding(&self) -> (Tender, Vec<TenderRequirement>) {
        let published = self.published().await;
        self.clock.set(window_start() + Duration::hours(2));
        published
    }

    pub async fn bid_all(
        &self,
        contractor: &Caller,
        tender_id: Uuid,
        lines: &[TenderRequirement],
        amounts: &[Decimal],
    ) -> Vec<Bid> {
        self.engine
            .submit_all_bids(
                contractor,
                tender_id,
                SubmitAllBidsRequest {
                    bids: lines
                        .iter()
                        .zip(amounts)
                        .map(|(line, amount)| BidLine {
                            requirement_id: line.id,
                            amount: *amount,
                            proposal: None,
                        })
                        .collect(),
                },
            )
            .await
            .unwrap()
    }

    pub fn selection(&self, contractor: &Caller) -> SelectContractorRequest {
        SelectContractorRequest {
            contractor_id: contractor.user_id,
            start_date: date(2026, 3, 16),
            due_date: date(2026, 4, 30),
            comment: Some("Best value".to_string()),
        }
    }

    /// In-progress tender with contractor 0 selected after full bids from 0 and 1.
    pub async fn in_progress(&self) -> (Tender, Vec<TenderRequirement>) {
        let (tender, lines) = self.bidding().await;
        let winner = self.contractor(0);
        self.bid_all(&winner, tender.id, &lines, &[dec!(45), dec!(120), dec!(60)])
            .await;
        self.bid_all(&self.contractor(1), tender.id, &lines, &[dec!(50), dec!(100), dec!(55)])
            .await;
        self.engine
            .select_contractor(&self.customer, tender.id, self.selection(&winner))
            .await
            .unwrap();
        let tender = self.tender(tender.id).await;
        (tender, lines)
    }

    pub async fn tender(&self, tender_id: Uuid) -> Tender {
        self.store.load(tender_id).await.unwrap().unwrap().tender
    }

    pub async fn invitations(&self, tender_id: Uuid) -> Vec<Invitation> {
        self.store.load(tender_id).await.unwrap().unwrap().invitations
    }

    pub async fn bids(&self, tender_id: Uuid) -> Vec<Bid> {
        self.store.load(tender_id).await.unwrap().unwrap().bids
    }

    pub fn clock_date(&self) -> NaiveDate {
        self.clock.now().date_naive()
    }

    pub async fn store_audit_len(&self, tender_id: Uuid) -> usize {
        self.store.audit_log(tender_id).await.unwrap().len()
    }

    pub async fn invitation_of(&self, tender_id: Uuid, contractor: &Caller) -> Invitation {
        self.invitations(tender_id)
            .await
            .into_iter()
            .find(|i| i.contractor_id == contractor.user_id)
            .unwrap()
    }
}
