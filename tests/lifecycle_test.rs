mod common;

use common::*;
use rust_decimal_macros::dec;
use uuid::Uuid;

use tenderworks_backend::domain::*;
use tenderworks_backend::engine::EngineError;
use tenderworks_backend::store::TenderStore;

#[tokio::test]
async fn test_create_tender_starts_in_draft() {
    let h = Harness::new();
    let tender = h.draft().await;

    assert_eq!(tender.status, TenderStatus::Draft);
    assert_eq!(tender.version, 1);
    assert_eq!(tender.customer_id, h.customer.user_id);
    assert!(tender.selected_contractor.is_none());

    let log = h.store.audit_log(tender.id).await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sequence, 1);
    assert_eq!(log[0].action, AuditAction::TenderCreate);
}

#[tokio::test]
async fn test_only_customers_create_tenders() {
    let h = Harness::new();
    let err = h
        .engine
        .create_tender(
            &h.contractor(0),
            CreateTenderRequest {
                title: "Loft".to_string(),
                description: None,
                service_id: h.service_id,
                location: "Hull".to_string(),
                budget: None,
                priority: TenderPriority::Low,
                supervisor_id: None,
                contractor_limit: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn test_unknown_service_is_rejected() {
    let h = Harness::new();
    let err = h
        .engine
        .create_tender(
            &h.customer,
            CreateTenderRequest {
                title: "Loft".to_string(),
                description: None,
                service_id: Uuid::new_v4(),
                location: "Hull".to_string(),
                budget: None,
                priority: TenderPriority::Low,
                supervisor_id: None,
                contractor_limit: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NotFound("service")));
}

#[tokio::test]
async fn test_publish_requires_requirement_lines() {
    let h = Harness::new();
    let tender = h.draft().await;

    let err = h
        .engine
        .publish_tender(&h.customer, tender.id, Harness::window())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoRequirements));
    assert_eq!(h.tender(tender.id).await.status, TenderStatus::Draft);
}

#[tokio::test]
async fn test_publish_rejects_inverted_window() {
    let h = Harness::new();
    let (tender, _) = h.draft_with_lines().await;

    let err = h
        .engine
        .publish_tender(
            &h.customer,
            tender.id,
            PublishTenderRequest {
                start_time: window_end(),
                end_time: window_start(),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidDateRange));
}

#[tokio::test]
async fn test_publish_opens_window_and_invites_pool() {
    let h = Harness::new();
    let (tender, _) = h.published().await;

    assert_eq!(tender.status, TenderStatus::Published);
    assert_eq!(tender.start_time, Some(window_start()));
    assert_eq!(tender.end_time, Some(window_end()));
    assert_eq!(tender.published_at, Some(t0()));

    let invitations = h.invitations(tender.id).await;
    assert_eq!(invitations.len(), 3);
    assert!(invitations
        .iter()
        .all(|i| i.status == InvitationStatus::Invited));
    for contractor in &h.contractors {
        assert_eq!(h.notifier.sent_to(contractor.user_id).len(), 1);
    }
}

#[tokio::test]
async fn test_publish_twice_is_invalid_state() {
    let h = Harness::new();
    let (tender, _) = h.published().await;

    let err = h
        .engine
        .publish_tender(&h.customer, tender.id, Harness::window())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_before_selection() {
    let h = Harness::new();
    let (tender, _) = h.published().await;

    let cancelled = h.engine.cancel_tender(&h.customer, tender.id).await.unwrap();
    assert_eq!(cancelled.status, TenderStatus::Cancelled);
    assert!(cancelled.version > tender.version);

    // terminal
    let err = h
        .engine
        .publish_tender(&h.customer, tender.id, Harness::window())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_cancel_after_selection_is_invalid_state() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;

    let err = h
        .engine
        .cancel_tender(&h.customer, tender.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let after = h.tender(tender.id).await;
    assert_eq!(after.status, TenderStatus::InProgress);
    assert_eq!(after.version, tender.version);
}

#[tokio::test]
async fn test_supervisor_cannot_cancel() {
    let h = Harness::new();
    let (tender, _) = h.published().await;

    let err = h
        .engine
        .cancel_tender(&h.supervisor, tender.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));
}

#[tokio::test]
async fn test_complete_closes_out_assignment_and_progress() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;

    let completed = h
        .engine
        .complete_tender(&h.customer, tender.id)
        .await
        .unwrap();
    assert_eq!(completed.status, TenderStatus::Completed);
    assert_eq!(completed.selected_contractor, Some(h.contractor(0).user_id));

    let assignment = h
        .engine
        .get_assignment(&h.customer, tender.id)
        .await
        .unwrap();
    assert_eq!(assignment.actual_completion_date, Some(t0().date_naive()));

    let progress = h
        .engine
        .get_progress(&h.customer, tender.id)
        .await
        .unwrap()
        .progress
        .unwrap();
    assert_eq!(progress.percent_complete, 100);
    assert_eq!(progress.current_phase, ProgressPhase::Review);
}

#[tokio::test]
async fn test_complete_requires_in_progress() {
    let h = Harness::new();
    let (tender, _) = h.published().await;

    let err = h
        .engine
        .complete_tender(&h.customer, tender.id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_requirement_edit_after_publish_creates_new_version() {
    let h = Harness::new();
    let (tender, lines) = h.published().await;
    let tiling = &lines[0];

    let edited = h
        .engine
        .update_requirement(
            &h.supervisor,
            tiling.id,
            UpdateRequirementRequest {
                quantity: Some(dec!(12)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_ne!(edited.id, tiling.id);
    assert_eq!(edited.version, tiling.version + 1);
    assert_eq!(edited.quantity, dec!(12));

    let aggregate = h.store.load(tender.id).await.unwrap().unwrap();
    let old = aggregate.requirement(tiling.id).unwrap();
    assert!(!old.is_current);
    assert_eq!(old.quantity, dec!(10));
    assert_eq!(aggregate.current_requirements().count(), 3);

    // The retired line can no longer be edited
    let err = h
        .engine
        .update_requirement(&h.customer, tiling.id, UpdateRequirementRequest::default())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));
}

#[tokio::test]
async fn test_requirement_edit_in_draft_is_in_place() {
    let h = Harness::new();
    let (tender, lines) = h.draft_with_lines().await;

    let edited = h
        .engine
        .update_requirement(
            &h.customer,
            lines[1].id,
            UpdateRequirementRequest {
                is_critical: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(edited.id, lines[1].id);
    assert_eq!(edited.version, 1);

    let aggregate = h.store.load(tender.id).await.unwrap().unwrap();
    assert_eq!(aggregate.requirements.len(), 3);
}

#[tokio::test]
async fn test_delete_requirement() {
    let h = Harness::new();
    let (tender, lines) = h.draft_with_lines().await;

    h.engine
        .delete_requirement(&h.customer, lines[2].id)
        .await
        .unwrap();
    let aggregate = h.store.load(tender.id).await.unwrap().unwrap();
    assert!(aggregate.requirement(lines[2].id).is_none());

    h.engine
        .publish_tender(&h.customer, tender.id, Harness::window())
        .await
        .unwrap();
    h.engine
        .delete_requirement(&h.customer, lines[1].id)
        .await
        .unwrap();

    // Published lines are only retired, and the last one stays
    let aggregate = h.store.load(tender.id).await.unwrap().unwrap();
    assert!(!aggregate.requirement(lines[1].id).unwrap().is_current);
    let err = h
        .engine
        .delete_requirement(&h.customer, lines[0].id)
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::NoRequirements));
}

#[tokio::test]
async fn test_requirement_type_checks() {
    let h = Harness::new();
    let (tender, _) = h.draft_with_lines().await;

    let err = h
        .engine
        .add_requirement(
            &h.customer,
            tender.id,
            AddRequirementRequest {
                requirement_type_id: h.requirement_types[0],
                quantity: dec!(1),
                unit: None,
                is_critical: false,
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::DuplicateRequirement));

    let foreign = h
        .catalog
        .add_requirement_type(Uuid::new_v4(), "Roof felt", "m2");
    let err = h
        .engine
        .add_requirement(
            &h.customer,
            tender.id,
            AddRequirementRequest {
                requirement_type_id: foreign,
                quantity: dec!(1),
                unit: None,
                is_critical: false,
                description: None,
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn test_quantity_and_budget_must_fit_their_columns() {
    let h = Harness::new();
    let tender = h.draft().await;
    let line = |quantity| AddRequirementRequest {
        requirement_type_id: h.requirement_types[0],
        quantity,
        unit: None,
        is_critical: false,
        description: None,
    };

    for quantity in [dec!(100000000000), dec!(1.0005)] {
        let err = h
            .engine
            .add_requirement(&h.customer, tender.id, line(quantity))
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }
    let stored = h
        .engine
        .add_requirement(&h.customer, tender.id, line(dec!(99999999999.999)))
        .await
        .unwrap();
    assert_eq!(stored.quantity, dec!(99999999999.999));

    let err = h
        .engine
        .update_tender(
            &h.customer,
            tender.id,
            UpdateTenderRequest {
                budget: Some(dec!(1000000000000)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn test_requirement_unit_defaults_from_catalog() {
    let h = Harness::new();
    let tender = h.draft().await;
    let line = h.add_line(tender.id, h.requirement_types[0], dec!(3)).await;
    assert_eq!(line.unit, "m2");
    assert_eq!(line.name, "Wall tiling");
}

#[tokio::test]
async fn test_attachments_are_audited() {
    let h = Harness::new();
    let tender = h.draft().await;

    let attachment = h
        .engine
        .add_attachment(
            &h.customer,
            tender.id,
            AddAttachmentRequest {
                file_name: "floorplan.pdf".to_string(),
                url: "https://media.example.com/floorplan.pdf".to_string(),
                content_type: Some("application/pdf".to_string()),
            },
        )
        .await
        .unwrap();
    h.engine
        .delete_attachment(&h.customer, attachment.id)
        .await
        .unwrap();

    let kinds: Vec<&str> = h
        .store
        .audit_log(tender.id)
        .await
        .unwrap()
        .iter()
        .map(|e| e.action.kind())
        .collect();
    assert_eq!(kinds, vec!["tender_create", "attachment_add", "attachment_delete"]);
}

#[tokio::test]
async fn test_update_tender_content() {
    let h = Harness::new();
    let tender = h.draft().await;

    let updated = h
        .engine
        .update_tender(
            &h.customer,
            tender.id,
            UpdateTenderRequest {
                title: Some("Ensuite renovation".to_string()),
                budget: Some(dec!(9500)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Ensuite renovation");
    assert_eq!(updated.budget, Some(dec!(9500)));
    assert_eq!(updated.version, tender.version + 1);

    let err = h
        .engine
        .update_tender(
            &h.customer,
            tender.id,
            UpdateTenderRequest {
                budget: Some(dec!(-1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
}

#[tokio::test]
async fn test_version_strictly_increases_through_lifecycle() {
    let h = Harness::new();
    let (tender, _) = h.draft_with_lines().await;
    let mut versions = vec![h.tender(tender.id).await.version];

    h.engine
        .publish_tender(&h.customer, tender.id, Harness::window())
        .await
        .unwrap();
    versions.push(h.tender(tender.id).await.version);

    h.clock.set(window_start());
    let lines = h
        .engine
        .list_requirements(&h.customer, tender.id)
        .await
        .unwrap();
    h.bid_all(&h.contractor(0), tender.id, &lines, &[dec!(1), dec!(2), dec!(3)])
        .await;
    h.engine
        .select_contractor(&h.customer, tender.id, h.selection(&h.contractor(0)))
        .await
        .unwrap();
    versions.push(h.tender(tender.id).await.version);

    h.engine
        .complete_tender(&h.customer, tender.id)
        .await
        .unwrap();
    versions.push(h.tender(tender.id).await.version);

    assert!(versions.windows(2).all(|w| w[0] < w[1]), "{versions:?}");
}

#[tokio::test]
async fn test_snapshots_are_numbered_per_tender() {
    let h = Harness::new();
    let (first, _) = h.in_progress().await;
    let (second, _) = h.draft_with_lines().await;

    // 3 requirement adds, publish, selection
    let snapshots = h.engine.versions(&h.customer, first.id).await.unwrap();
    let numbers: Vec<i32> = snapshots.iter().map(|s| s.version_number).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5]);
    let reasons: Vec<&str> = snapshots.iter().map(|s| s.reason.as_str()).collect();
    assert_eq!(
        reasons,
        vec![
            "requirement_add",
            "requirement_add",
            "requirement_add",
            "publish",
            "contractor_select"
        ]
    );

    let selection = snapshots.last().unwrap();
    assert_eq!(selection.tender_version, first.version);
    assert_eq!(selection.state["tender"]["status"], "in_progress");

    let other = h.engine.versions(&h.customer, second.id).await.unwrap();
    assert_eq!(other.first().map(|s| s.version_number), Some(1));
}

#[tokio::test]
async fn test_audit_sequence_is_gapless() {
    let h = Harness::new();
    let (tender, _) = h.in_progress().await;

    let log = h.engine.audit_log(&h.supervisor, tender.id).await.unwrap();
    let sequences: Vec<i64> = log.iter().map(|e| e.sequence).collect();
    let expected: Vec<i64> = (1..=log.len() as i64).collect();
    assert_eq!(sequences, expected);

    let select = log
        .iter()
        .find(|e| e.action.kind() == "contractor_select")
        .unwrap();
    assert_eq!(select.old_value.as_ref().unwrap()["status"], "published");
    assert_eq!(select.new_value.as_ref().unwrap()["status"], "in_progress");
}

#[tokio::test]
async fn test_failed_operation_writes_no_audit() {
    let h = Harness::new();
    let tender = h.draft().await;
    let before = h.store.audit_log(tender.id).await.unwrap().len();

    let _ = h
        .engine
        .publish_tender(&h.customer, tender.id, Harness::window())
        .await
        .unwrap_err();
    let _ = h
        .engine
        .cancel_tender(&h.contractor(0), tender.id)
        .await
        .unwrap_err();

    assert_eq!(h.store.audit_log(tender.id).await.unwrap().len(), before);
}

#[tokio::test]
async fn test_list_tenders_is_scoped_by_role() {
    let h = Harness::new();
    let (published, _) = h.published().await;
    let draft = h.draft().await;

    let (mine, total) = h
        .engine
        .list_tenders(&h.customer, &TenderQuery::default(), 20, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(mine.len(), 2);

    // Contractors only see tenders they were invited to
    let (invited, total) = h
        .engine
        .list_tenders(&h.contractor(1), &TenderQuery::default(), 20, 0)
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(invited[0].id, published.id);

    let (drafts, _) = h
        .engine
        .list_tenders(
            &h.customer,
            &TenderQuery {
                status: Some(TenderStatus::Draft),
            },
            20,
            0,
        )
        .await
        .unwrap();
    assert_eq!(drafts.len(), 1);
    assert_eq!(drafts[0].id, draft.id);

    let (_, total) = h
        .engine
        .list_tenders(&h.supervisor, &TenderQuery::default(), 20, 0)
        .await
        .unwrap();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_uninvited_contractor_cannot_view() {
    let h = Harness::new();
    let (tender, _) = h.published().await;
    let stranger = Caller::contractor(Uuid::new_v4());

    let err = h.engine.get_tender(&stranger, tender.id).await.unwrap_err();
    assert!(matches!(err, EngineError::Forbidden(_)));

    let detail = h.engine.get_tender(&h.contractor(2), tender.id).await.unwrap();
    assert_eq!(detail.requirements.len(), 3);
}
